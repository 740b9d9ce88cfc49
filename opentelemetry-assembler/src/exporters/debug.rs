//! The `debug` exporter: writes every signal to stdout.

use std::any::Any;

use opentelemetry_sdk::metrics::Temporality;
use serde::Deserialize;

use crate::error::BoxError;
use crate::exporters::{
    deserialize_temporality, BuiltExporter, ExporterConfig, SharedLogExporter,
    SharedMetricExporter, SharedSpanExporter, SignalExporters,
};
use crate::scope::Scope;

/// Registry type name.
pub const TYPE_NAME: &str = "debug";

/// Stdout exporter settings.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Temporality of exported metrics.
    #[serde(default, deserialize_with = "deserialize_temporality")]
    pub temporality: Option<Temporality>,
}

impl ExporterConfig for DebugConfig {
    fn build(&self, _scope: &Scope) -> Result<BuiltExporter, BoxError> {
        let mut metrics = opentelemetry_stdout::MetricExporter::builder();
        if let Some(temporality) = self.temporality {
            metrics = metrics.with_temporality(temporality);
        }

        let exporters = SignalExporters::new()
            .with_traces(SharedSpanExporter::new(
                opentelemetry_stdout::SpanExporter::default(),
            ))
            .with_metrics(SharedMetricExporter::new(metrics.build()))
            .with_logs(SharedLogExporter::new(
                opentelemetry_stdout::LogExporter::default(),
            ));
        Ok(BuiltExporter::new(exporters))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
