//! The `batcher` processor: exports spans and log records in batches from a
//! background thread.

use std::any::Any;
use std::time::Duration;

use opentelemetry_sdk::logs::{self, BatchLogProcessor};
use opentelemetry_sdk::trace::{self, BatchSpanProcessor};
use serde::Deserialize;

use crate::error::BoxError;
use crate::pipeline::{LogsPipeline, TracesPipeline};
use crate::processors::ProcessorConfig;

/// Registry type name.
pub const TYPE_NAME: &str = "batcher";

/// Batching settings. Unset fields keep the SDK defaults, which honor the
/// `OTEL_BSP_*` and `OTEL_BLRP_*` environment variables.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Records buffered before new ones are dropped.
    #[serde(default)]
    pub max_queue_size: Option<usize>,
    /// Records sent per export call.
    #[serde(default)]
    pub max_export_batch_size: Option<usize>,
    /// Delay between two consecutive exports.
    #[serde(
        default,
        alias = "batch_timeout",
        deserialize_with = "crate::duration::deserialize_option"
    )]
    pub scheduled_delay: Option<Duration>,
    /// Upper bound on a single span export. Log batches keep the SDK
    /// deadline.
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    pub export_timeout: Option<Duration>,
}

impl BatchConfig {
    fn validate(&self) -> Result<(), BoxError> {
        if self.max_queue_size == Some(0) {
            return Err("max_queue_size must be greater than zero".into());
        }
        if self.max_export_batch_size == Some(0) {
            return Err("max_export_batch_size must be greater than zero".into());
        }
        if self.export_timeout == Some(Duration::ZERO) {
            return Err("export_timeout must be greater than zero".into());
        }
        Ok(())
    }

    fn span_config(&self) -> trace::BatchConfig {
        let mut builder = trace::BatchConfigBuilder::default();
        if let Some(size) = self.max_queue_size {
            builder = builder.with_max_queue_size(size);
        }
        if let Some(size) = self.max_export_batch_size {
            builder = builder.with_max_export_batch_size(size);
        }
        if let Some(delay) = self.scheduled_delay {
            builder = builder.with_scheduled_delay(delay);
        }
        if let Some(timeout) = self.export_timeout {
            builder = builder.with_max_export_timeout(timeout);
        }
        builder.build()
    }

    fn log_config(&self) -> logs::BatchConfig {
        let mut builder = logs::BatchConfigBuilder::default();
        if let Some(size) = self.max_queue_size {
            builder = builder.with_max_queue_size(size);
        }
        if let Some(size) = self.max_export_batch_size {
            builder = builder.with_max_export_batch_size(size);
        }
        if let Some(delay) = self.scheduled_delay {
            builder = builder.with_scheduled_delay(delay);
        }
        builder.build()
    }
}

impl ProcessorConfig for BatchConfig {
    fn apply_traces(&self, pipeline: &mut TracesPipeline) -> Result<(), BoxError> {
        self.validate()?;
        for exporter in pipeline.claim_exporters() {
            let settings = self.clone();
            pipeline.push(move |builder| {
                builder.with_span_processor(
                    BatchSpanProcessor::builder(exporter)
                        .with_batch_config(settings.span_config())
                        .build(),
                )
            });
        }
        Ok(())
    }

    fn apply_logs(&self, pipeline: &mut LogsPipeline) -> Result<(), BoxError> {
        self.validate()?;
        for exporter in pipeline.claim_exporters() {
            let settings = self.clone();
            pipeline.push(move |builder| {
                builder.with_log_processor(
                    BatchLogProcessor::builder(exporter)
                        .with_batch_config(settings.log_config())
                        .build(),
                )
            });
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode() {
        let config: BatchConfig = serde_yaml::from_str(
            r#"
            max_queue_size: 4096
            max_export_batch_size: 256
            scheduled_delay: 2s
            export_timeout: 10s
            "#,
        )
        .unwrap();
        assert_eq!(config.max_queue_size, Some(4096));
        assert_eq!(config.max_export_batch_size, Some(256));
        assert_eq!(config.scheduled_delay, Some(Duration::from_secs(2)));
        assert_eq!(config.export_timeout, Some(Duration::from_secs(10)));
        assert!(config.validate().is_ok());

        let aliased: BatchConfig = serde_yaml::from_str("batch_timeout: 100").unwrap();
        assert_eq!(aliased.scheduled_delay, Some(Duration::from_millis(100)));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(serde_yaml::from_str::<BatchConfig>("blocking: true").is_err());
    }

    #[test]
    fn zero_sizes_are_invalid() {
        let config = BatchConfig {
            max_queue_size: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_export_timeout_is_invalid() {
        let config: BatchConfig = serde_yaml::from_str("export_timeout: 0s").unwrap();
        assert_eq!(config.export_timeout, Some(Duration::ZERO));
        assert!(config.validate().is_err());
    }

    #[test]
    fn export_timeout_only_bounds_spans() {
        let config = BatchConfig {
            export_timeout: Some(Duration::from_secs(3)),
            ..Default::default()
        };
        assert!(format!("{:?}", config.span_config()).contains("3s"));
        assert!(!format!("{:?}", config.log_config()).contains("3s"));
    }
}
