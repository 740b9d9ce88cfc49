//! The `resource` processor: describes the entity producing telemetry.

use std::any::Any;

use opentelemetry::{otel_warn, KeyValue};
use opentelemetry_sdk::resource::{
    EnvResourceDetector, ResourceDetector, SdkProvidedResourceDetector, TelemetryResourceDetector,
};
use opentelemetry_sdk::Resource;
use serde::Deserialize;

use crate::attribute::Attribute;
use crate::error::BoxError;
use crate::pipeline::{LogsPipeline, MetricsPipeline, Pipeline, TracesPipeline};
use crate::processors::ProcessorConfig;
use crate::signal::Signal;

/// Registry type name.
pub const TYPE_NAME: &str = "resource";

/// Resource attributes and detectors.
///
/// Attributes are applied first, then detectors in list order; a later source
/// overrides an earlier one on a shared key. Several `resource` processors on
/// one provider merge the same way, in list order.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    /// Explicit attributes.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Detector names: `env`, `service` or `telemetry.sdk`. Other names are
    /// skipped with a warning.
    #[serde(default)]
    pub detectors: Vec<String>,
}

fn detector(name: &str) -> Option<Box<dyn ResourceDetector>> {
    match name {
        "env" => Some(Box::new(EnvResourceDetector::new())),
        "service" => Some(Box::new(SdkProvidedResourceDetector)),
        "telemetry.sdk" => Some(Box::new(TelemetryResourceDetector)),
        _ => None,
    }
}

impl ResourceConfig {
    /// Builds the resource.
    pub fn resource(&self) -> Resource {
        let mut builder = Resource::builder_empty().with_attributes(
            self.attributes
                .iter()
                .cloned()
                .map(KeyValue::from)
                .collect::<Vec<_>>(),
        );
        for name in &self.detectors {
            match detector(name) {
                Some(detector) => builder = builder.with_detector(detector),
                None => {
                    otel_warn!(name: "Resource.UnknownDetector", detector = name.as_str());
                }
            }
        }
        builder.build()
    }

    fn contribute<S: Signal>(&self, pipeline: &mut Pipeline<S>) -> Result<(), BoxError> {
        pipeline.merge_resource(self.resource());
        Ok(())
    }
}

impl ProcessorConfig for ResourceConfig {
    fn apply_traces(&self, pipeline: &mut TracesPipeline) -> Result<(), BoxError> {
        self.contribute(pipeline)
    }

    fn apply_metrics(&self, pipeline: &mut MetricsPipeline) -> Result<(), BoxError> {
        self.contribute(pipeline)
    }

    fn apply_logs(&self, pipeline: &mut LogsPipeline) -> Result<(), BoxError> {
        self.contribute(pipeline)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
