//! # Signals
//!
//! Binds each telemetry signal to the SDK types the resolver assembles for it:
//! the provider builder, the provider, and the shared exporter handle that
//! processors attach to the builder.

use std::fmt;

use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::logs::{LoggerProviderBuilder, SdkLoggerProvider};
use opentelemetry_sdk::metrics::{MeterProviderBuilder, SdkMeterProvider};
use opentelemetry_sdk::trace::{SdkTracerProvider, TracerProviderBuilder};
use opentelemetry_sdk::Resource;

use crate::error::BoxError;
use crate::exporters::{Exporter, SharedLogExporter, SharedMetricExporter, SharedSpanExporter};
use crate::pipeline::Pipeline;
use crate::processors::ProcessorConfig;

/// One of the three telemetry signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Spans.
    Traces,
    /// Metric data points.
    Metrics,
    /// Log records.
    Logs,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Traces => f.write_str("traces"),
            SignalKind::Metrics => f.write_str("metrics"),
            SignalKind::Logs => f.write_str("logs"),
        }
    }
}

/// A deferred change to a provider builder.
///
/// Options are applied in contribution order, so a later option overrides an
/// earlier one wherever the builder itself is last-write-wins.
pub type ProviderOption<B> = Box<dyn FnOnce(B) -> B>;

/// Ties a signal to its SDK builder, provider and exporter handle.
pub trait Signal: Sized + 'static {
    /// Which signal this is.
    const KIND: SignalKind;

    /// Type part of this signal's provider identifiers, e.g. `tracer`.
    const PROVIDER_TYPE: &'static str;

    /// Shared exporter handle attached to providers of this signal.
    type Exporter: Clone + fmt::Debug + Send + Sync + 'static;

    /// The SDK provider builder options are folded over.
    type Builder;

    /// The SDK provider handed out to callers.
    type Provider: Clone + fmt::Debug + Send + Sync + 'static;

    /// The exporter handle an instantiated exporter offers for this signal.
    fn exporter_of(exporter: &dyn Exporter) -> Option<Self::Exporter>;

    /// Lets a processor contribute options for this signal.
    fn contribute(
        processor: &dyn ProcessorConfig,
        pipeline: &mut Pipeline<Self>,
    ) -> Result<(), BoxError>;

    /// A fresh builder.
    fn builder() -> Self::Builder;

    /// Attaches an exporter without batching.
    fn with_simple_exporter(builder: Self::Builder, exporter: Self::Exporter) -> Self::Builder;

    /// Sets the resource describing the provider's telemetry source.
    fn with_resource(builder: Self::Builder, resource: Resource) -> Self::Builder;

    /// Finishes the builder.
    fn build(builder: Self::Builder) -> Self::Provider;

    /// Erases the provider type for caching.
    fn into_any(provider: Self::Provider) -> AnyProvider;

    /// Recovers the provider type from the cache.
    fn from_any(provider: &AnyProvider) -> Option<Self::Provider>;
}

/// Marker for the traces signal.
#[derive(Debug)]
pub struct Traces;

/// Marker for the metrics signal.
#[derive(Debug)]
pub struct Metrics;

/// Marker for the logs signal.
#[derive(Debug)]
pub struct Logs;

impl Signal for Traces {
    const KIND: SignalKind = SignalKind::Traces;
    const PROVIDER_TYPE: &'static str = "tracer";

    type Exporter = SharedSpanExporter;
    type Builder = TracerProviderBuilder;
    type Provider = SdkTracerProvider;

    fn exporter_of(exporter: &dyn Exporter) -> Option<Self::Exporter> {
        exporter.span_exporter()
    }

    fn contribute(
        processor: &dyn ProcessorConfig,
        pipeline: &mut Pipeline<Self>,
    ) -> Result<(), BoxError> {
        processor.apply_traces(pipeline)
    }

    fn builder() -> Self::Builder {
        SdkTracerProvider::builder()
    }

    fn with_simple_exporter(builder: Self::Builder, exporter: Self::Exporter) -> Self::Builder {
        builder.with_simple_exporter(exporter)
    }

    fn with_resource(builder: Self::Builder, resource: Resource) -> Self::Builder {
        builder.with_resource(resource)
    }

    fn build(builder: Self::Builder) -> Self::Provider {
        builder.build()
    }

    fn into_any(provider: Self::Provider) -> AnyProvider {
        AnyProvider::Tracer(provider)
    }

    fn from_any(provider: &AnyProvider) -> Option<Self::Provider> {
        match provider {
            AnyProvider::Tracer(provider) => Some(provider.clone()),
            _ => None,
        }
    }
}

impl Signal for Metrics {
    const KIND: SignalKind = SignalKind::Metrics;
    const PROVIDER_TYPE: &'static str = "meter";

    type Exporter = SharedMetricExporter;
    type Builder = MeterProviderBuilder;
    type Provider = SdkMeterProvider;

    fn exporter_of(exporter: &dyn Exporter) -> Option<Self::Exporter> {
        exporter.metric_exporter()
    }

    fn contribute(
        processor: &dyn ProcessorConfig,
        pipeline: &mut Pipeline<Self>,
    ) -> Result<(), BoxError> {
        processor.apply_metrics(pipeline)
    }

    fn builder() -> Self::Builder {
        SdkMeterProvider::builder()
    }

    // Meter providers have no synchronous export path; the closest thing to a
    // simple processor is a periodic reader with default settings.
    fn with_simple_exporter(builder: Self::Builder, exporter: Self::Exporter) -> Self::Builder {
        builder.with_periodic_exporter(exporter)
    }

    fn with_resource(builder: Self::Builder, resource: Resource) -> Self::Builder {
        builder.with_resource(resource)
    }

    fn build(builder: Self::Builder) -> Self::Provider {
        builder.build()
    }

    fn into_any(provider: Self::Provider) -> AnyProvider {
        AnyProvider::Meter(provider)
    }

    fn from_any(provider: &AnyProvider) -> Option<Self::Provider> {
        match provider {
            AnyProvider::Meter(provider) => Some(provider.clone()),
            _ => None,
        }
    }
}

impl Signal for Logs {
    const KIND: SignalKind = SignalKind::Logs;
    const PROVIDER_TYPE: &'static str = "logger";

    type Exporter = SharedLogExporter;
    type Builder = LoggerProviderBuilder;
    type Provider = SdkLoggerProvider;

    fn exporter_of(exporter: &dyn Exporter) -> Option<Self::Exporter> {
        exporter.log_exporter()
    }

    fn contribute(
        processor: &dyn ProcessorConfig,
        pipeline: &mut Pipeline<Self>,
    ) -> Result<(), BoxError> {
        processor.apply_logs(pipeline)
    }

    fn builder() -> Self::Builder {
        SdkLoggerProvider::builder()
    }

    fn with_simple_exporter(builder: Self::Builder, exporter: Self::Exporter) -> Self::Builder {
        builder.with_simple_exporter(exporter)
    }

    fn with_resource(builder: Self::Builder, resource: Resource) -> Self::Builder {
        builder.with_resource(resource)
    }

    fn build(builder: Self::Builder) -> Self::Provider {
        builder.build()
    }

    fn into_any(provider: Self::Provider) -> AnyProvider {
        AnyProvider::Logger(provider)
    }

    fn from_any(provider: &AnyProvider) -> Option<Self::Provider> {
        match provider {
            AnyProvider::Logger(provider) => Some(provider.clone()),
            _ => None,
        }
    }
}

/// A built provider of any signal.
#[derive(Clone, Debug)]
pub enum AnyProvider {
    /// A tracer provider.
    Tracer(SdkTracerProvider),
    /// A meter provider.
    Meter(SdkMeterProvider),
    /// A logger provider.
    Logger(SdkLoggerProvider),
}

impl AnyProvider {
    /// Which signal the provider serves.
    pub fn kind(&self) -> SignalKind {
        match self {
            AnyProvider::Tracer(_) => SignalKind::Traces,
            AnyProvider::Meter(_) => SignalKind::Metrics,
            AnyProvider::Logger(_) => SignalKind::Logs,
        }
    }

    /// Flushes and shuts the provider down.
    pub fn shutdown(&self) -> OTelSdkResult {
        match self {
            AnyProvider::Tracer(provider) => provider.shutdown(),
            AnyProvider::Meter(provider) => provider.shutdown(),
            AnyProvider::Logger(provider) => provider.shutdown(),
        }
    }
}
