//! # Processors
//!
//! A processor entry shapes how providers handle telemetry (batching,
//! resource attribution) without shipping data itself. Its configuration
//! implements [`ProcessorConfig`] and contributes builder options to the
//! pipeline of every provider that lists it.
//!
//! Each hook defaults to contributing nothing, so a processor only implements
//! the signals it supports and is skipped for the others.

use std::any::Any;
use std::fmt;

use crate::error::BoxError;
use crate::pipeline::{LogsPipeline, MetricsPipeline, TracesPipeline};

pub mod batch;
pub mod periodic_reader;
pub mod resource;

/// Typed configuration of one processor entry.
pub trait ProcessorConfig: fmt::Debug + Send + Sync + 'static {
    /// Contributes options to a tracer provider.
    fn apply_traces(&self, _pipeline: &mut TracesPipeline) -> Result<(), BoxError> {
        Ok(())
    }

    /// Contributes options to a meter provider.
    fn apply_metrics(&self, _pipeline: &mut MetricsPipeline) -> Result<(), BoxError> {
        Ok(())
    }

    /// Contributes options to a logger provider.
    fn apply_logs(&self, _pipeline: &mut LogsPipeline) -> Result<(), BoxError> {
        Ok(())
    }

    /// Enables downcasting to the concrete configuration type.
    fn as_any(&self) -> &dyn Any;
}
