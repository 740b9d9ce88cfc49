//! # Exporters
//!
//! An exporter entry produces the sink that providers ship telemetry to. Its
//! configuration implements [`ExporterConfig`]; building it yields an
//! [`Exporter`] instance, which the resolver creates at most once per
//! identifier and attaches to every provider referencing it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry_sdk::metrics::Temporality;
use serde::{Deserialize, Deserializer};

use crate::error::BoxError;
use crate::scope::Scope;

pub mod debug;
pub mod otlp;
pub mod otlp_http;
mod shared;

pub use shared::{SharedLogExporter, SharedMetricExporter, SharedSpanExporter};

/// Deferred start function returned alongside an exporter instance.
pub type StartFn = Box<dyn FnOnce(&Scope) -> Result<(), BoxError> + Send>;

/// Typed configuration of one exporter entry.
pub trait ExporterConfig: fmt::Debug + Send + Sync + 'static {
    /// Instantiates the exporter.
    ///
    /// Called at most once per identifier. Blocking work such as opening a
    /// connection belongs either here or in the returned start function, and
    /// should respect `scope`.
    fn build(&self, scope: &Scope) -> Result<BuiltExporter, BoxError>;

    /// Enables downcasting to the concrete configuration type.
    fn as_any(&self) -> &dyn Any;
}

/// A live exporter instance.
///
/// Each `*_exporter` method returns the handle serving that signal, or `None`
/// when the exporter cannot serve it. Handles returned for the same signal
/// must wrap the same underlying exporter.
pub trait Exporter: fmt::Debug + Send + Sync {
    /// Handle for tracer providers.
    fn span_exporter(&self) -> Option<SharedSpanExporter> {
        None
    }

    /// Handle for meter providers.
    fn metric_exporter(&self) -> Option<SharedMetricExporter> {
        None
    }

    /// Handle for logger providers.
    fn log_exporter(&self) -> Option<SharedLogExporter> {
        None
    }

    /// Releases the exporter. Called at most once.
    fn shutdown(&self, timeout: Duration) -> Result<(), BoxError>;
}

/// Result of [`ExporterConfig::build`].
pub struct BuiltExporter {
    /// The instance.
    pub exporter: Arc<dyn Exporter>,
    /// Optional work to run when the resolver is started.
    pub start: Option<StartFn>,
}

impl BuiltExporter {
    /// An instance with nothing to start.
    pub fn new<E: Exporter + 'static>(exporter: E) -> Self {
        BuiltExporter {
            exporter: Arc::new(exporter),
            start: None,
        }
    }

    /// Attaches a start function.
    pub fn with_start<F>(mut self, start: F) -> Self
    where
        F: FnOnce(&Scope) -> Result<(), BoxError> + Send + 'static,
    {
        self.start = Some(Box::new(start));
        self
    }
}

impl fmt::Debug for BuiltExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltExporter")
            .field("exporter", &self.exporter)
            .field("start", &self.start.is_some())
            .finish()
    }
}

/// An [`Exporter`] made of one SDK exporter per supported signal.
#[derive(Clone, Debug, Default)]
pub struct SignalExporters {
    traces: Option<SharedSpanExporter>,
    metrics: Option<SharedMetricExporter>,
    logs: Option<SharedLogExporter>,
}

impl SignalExporters {
    /// An exporter serving no signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves traces through `exporter`.
    pub fn with_traces(mut self, exporter: SharedSpanExporter) -> Self {
        self.traces = Some(exporter);
        self
    }

    /// Serves metrics through `exporter`.
    pub fn with_metrics(mut self, exporter: SharedMetricExporter) -> Self {
        self.metrics = Some(exporter);
        self
    }

    /// Serves logs through `exporter`.
    pub fn with_logs(mut self, exporter: SharedLogExporter) -> Self {
        self.logs = Some(exporter);
        self
    }
}

impl Exporter for SignalExporters {
    fn span_exporter(&self) -> Option<SharedSpanExporter> {
        self.traces.clone()
    }

    fn metric_exporter(&self) -> Option<SharedMetricExporter> {
        self.metrics.clone()
    }

    fn log_exporter(&self) -> Option<SharedLogExporter> {
        self.logs.clone()
    }

    // Every signal is closed; the first failure is reported.
    fn shutdown(&self, timeout: Duration) -> Result<(), BoxError> {
        let results = [
            self.traces.as_ref().map(|e| e.close(timeout)),
            self.metrics.as_ref().map(|e| e.close(timeout)),
            self.logs.as_ref().map(|e| e.close(timeout)),
        ];
        for result in results.into_iter().flatten() {
            result?;
        }
        Ok(())
    }
}

/// Deserializes an optional metric temporality from `cumulative` or `delta`.
pub(crate) fn deserialize_temporality<'de, D>(
    deserializer: D,
) -> Result<Option<Temporality>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => match s.trim().to_lowercase().as_str() {
            "cumulative" => Ok(Some(Temporality::Cumulative)),
            "delta" => Ok(Some(Temporality::Delta)),
            "lowmemory" | "low_memory" => Ok(Some(Temporality::LowMemory)),
            _ => Err(serde::de::Error::custom(format!("invalid temporality: {s}"))),
        },
        None => Ok(None),
    }
}
