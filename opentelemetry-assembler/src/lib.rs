//! # OpenTelemetry assembler
//!
//! Builds OpenTelemetry SDK providers from a declarative description of
//! processors, exporters and the providers that use them.
//!
//! Every component is named by an [`Identifier`] of the form `type[/name]`.
//! The type selects a decoder from a [`Registry`], so new processor and
//! exporter kinds plug in without changes to the decoder or the resolver.
//! A [`Resolver`] then builds each requested provider once, sharing exporter
//! instances between the providers that reference them, and manages their
//! start and shutdown as a unit.
//!
//! ```no_run
//! use opentelemetry::trace::{Tracer, TracerProvider};
//! use opentelemetry_assembler::{Config, Resolver, Scope};
//!
//! # fn main() -> Result<(), opentelemetry_assembler::Error> {
//! let config = Config::from_yaml(
//!     r#"
//!     enabled: true
//!     exporters:
//!       debug:
//!     providers:
//!       tracer:
//!         exporters: [debug]
//!     "#,
//! )?;
//!
//! let resolver = Resolver::new(config);
//! let scope = Scope::new();
//! let provider = resolver.tracer_provider(&scope, "")?;
//! resolver.start(&scope)?;
//!
//! provider.tracer("example").in_span("work", |_| {});
//!
//! resolver.shutdown(&scope)?;
//! # Ok(())
//! # }
//! ```

pub mod attribute;
pub mod config;
mod duration;
pub mod error;
pub mod exporters;
pub mod identifier;
pub mod opaque;
pub mod pipeline;
pub mod processors;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod signal;

pub use attribute::{decode_attribute_value, Attribute, AttributeValue};
pub use config::{Config, ProviderConfig};
pub use error::{BoxError, Error, Errors, Result};
pub use exporters::{BuiltExporter, Exporter, ExporterConfig, SignalExporters};
pub use identifier::Identifier;
pub use pipeline::{LogsPipeline, MetricsPipeline, Pipeline, TracesPipeline};
pub use processors::ProcessorConfig;
pub use registry::{
    decode_as, default_exporters, default_processors, ExporterRegistry, ProcessorRegistry,
    Registries, Registry,
};
pub use resolver::Resolver;
pub use scope::Scope;
pub use signal::{AnyProvider, Signal, SignalKind};
