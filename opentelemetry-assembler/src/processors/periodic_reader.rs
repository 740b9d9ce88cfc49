//! The `periodic_reader` processor: collects and pushes metrics on a fixed
//! interval.

use std::any::Any;
use std::time::Duration;

use opentelemetry_sdk::metrics::PeriodicReader;
use serde::Deserialize;

use crate::error::BoxError;
use crate::pipeline::MetricsPipeline;
use crate::processors::ProcessorConfig;

/// Registry type name.
pub const TYPE_NAME: &str = "periodic_reader";

/// Reader settings. Unset fields keep the SDK defaults, which honor
/// `OTEL_METRIC_EXPORT_INTERVAL` and `OTEL_METRIC_EXPORT_TIMEOUT`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PeriodicReaderConfig {
    /// Time between two collections.
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    pub interval: Option<Duration>,
    /// Upper bound on one collect and export cycle.
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    pub timeout: Option<Duration>,
}

impl ProcessorConfig for PeriodicReaderConfig {
    fn apply_metrics(&self, pipeline: &mut MetricsPipeline) -> Result<(), BoxError> {
        if self.interval == Some(Duration::ZERO) {
            return Err("interval must be greater than zero".into());
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err("timeout must be greater than zero".into());
        }
        for exporter in pipeline.claim_exporters() {
            let (interval, timeout) = (self.interval, self.timeout);
            pipeline.push(move |builder| {
                let mut reader = PeriodicReader::builder(exporter);
                if let Some(interval) = interval {
                    reader = reader.with_interval(interval);
                }
                if let Some(timeout) = timeout {
                    reader = reader.with_timeout(timeout);
                }
                builder.with_reader(reader.build())
            });
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
