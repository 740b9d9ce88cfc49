//! The `otlphttp` exporter: OTLP over HTTP with protobuf payloads.

use std::any::Any;
use std::collections::HashMap;
use std::time::Duration;

use opentelemetry_otlp::{
    LogExporter, MetricExporter, SpanExporter, WithExportConfig, WithHttpConfig,
};
use opentelemetry_sdk::metrics::Temporality;
use serde::Deserialize;

use crate::error::BoxError;
use crate::exporters::{
    deserialize_temporality, BuiltExporter, ExporterConfig, SharedLogExporter,
    SharedMetricExporter, SharedSpanExporter, SignalExporters,
};
use crate::opaque::OpaqueString;
use crate::scope::Scope;

/// Registry type name.
pub const TYPE_NAME: &str = "otlphttp";

const TRACES_PATH: &str = "/v1/traces";
const METRICS_PATH: &str = "/v1/metrics";
const LOGS_PATH: &str = "/v1/logs";

/// OTLP/HTTP exporter settings.
///
/// Each signal is sent to its own URL: the per-signal endpoint when set,
/// otherwise `endpoint` followed by the signal path (`/v1/traces`,
/// `/v1/metrics` or `/v1/logs`). When neither is set the exporter defaults
/// apply, which honor the `OTEL_EXPORTER_OTLP_*` environment variables.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtlpHttpConfig {
    /// Base URL of the collector, e.g. `http://localhost:4318`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Full URL for traces.
    #[serde(default)]
    pub traces_endpoint: Option<String>,
    /// Full URL for metrics.
    #[serde(default)]
    pub metrics_endpoint: Option<String>,
    /// Full URL for logs.
    #[serde(default)]
    pub logs_endpoint: Option<String>,
    /// Sent as HTTP headers with every request.
    #[serde(default)]
    pub headers: HashMap<String, OpaqueString>,
    /// Per-request timeout.
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    pub timeout: Option<Duration>,
    /// Temporality of exported metrics.
    #[serde(default, deserialize_with = "deserialize_temporality")]
    pub temporality: Option<Temporality>,
}

impl OtlpHttpConfig {
    fn signal_endpoint(&self, signal_endpoint: &Option<String>, path: &str) -> Option<String> {
        signal_endpoint.clone().or_else(|| {
            self.endpoint
                .as_ref()
                .map(|base| format!("{}{path}", base.trim_end_matches('/')))
        })
    }

    fn headers(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .map(|(key, value)| (key.clone(), value.expose().to_string()))
            .collect()
    }

    fn span_exporter(&self) -> Result<SpanExporter, BoxError> {
        let mut builder = SpanExporter::builder()
            .with_http()
            .with_headers(self.headers());
        if let Some(endpoint) = self.signal_endpoint(&self.traces_endpoint, TRACES_PATH) {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.with_timeout(timeout);
        }
        Ok(builder.build()?)
    }

    fn metric_exporter(&self) -> Result<MetricExporter, BoxError> {
        let mut builder = MetricExporter::builder()
            .with_http()
            .with_headers(self.headers());
        if let Some(temporality) = self.temporality {
            builder = builder.with_temporality(temporality);
        }
        if let Some(endpoint) = self.signal_endpoint(&self.metrics_endpoint, METRICS_PATH) {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.with_timeout(timeout);
        }
        Ok(builder.build()?)
    }

    fn log_exporter(&self) -> Result<LogExporter, BoxError> {
        let mut builder = LogExporter::builder()
            .with_http()
            .with_headers(self.headers());
        if let Some(endpoint) = self.signal_endpoint(&self.logs_endpoint, LOGS_PATH) {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.with_timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

impl ExporterConfig for OtlpHttpConfig {
    fn build(&self, _scope: &Scope) -> Result<BuiltExporter, BoxError> {
        let exporters = SignalExporters::new()
            .with_traces(SharedSpanExporter::new(self.span_exporter()?))
            .with_metrics(SharedMetricExporter::new(self.metric_exporter()?))
            .with_logs(SharedLogExporter::new(self.log_exporter()?));
        Ok(BuiltExporter::new(exporters))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
