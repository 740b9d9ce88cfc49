//! # Decoder registries
//!
//! A [`Registry`] maps the type part of an identifier to the decoder that
//! turns the entry's raw node into a typed configuration. New processor and
//! exporter kinds are supported by registering a decoder under a new type
//! name; the config decoder and the resolver never name concrete types.
//!
//! The default registries hold the built-in kinds. They are immutable:
//! [`default_processors`] and [`default_exporters`] hand out copies that the
//! caller extends with [`Registry::set`] or [`Registry::merge`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::exporters::{debug, otlp, otlp_http, ExporterConfig};
use crate::processors::{batch, periodic_reader, resource, ProcessorConfig};

/// Turns a raw configuration node into a `T`.
pub trait ConfigDecoder<T>: Send + Sync {
    /// Decodes `node`.
    fn decode(&self, node: &Value) -> Result<T, serde_yaml::Error>;
}

impl<T, F> ConfigDecoder<T> for F
where
    F: Fn(&Value) -> Result<T, serde_yaml::Error> + Send + Sync,
{
    fn decode(&self, node: &Value) -> Result<T, serde_yaml::Error> {
        self(node)
    }
}

/// Maps a type name to a decoder producing `T`.
pub struct Registry<T> {
    decoders: HashMap<String, Arc<dyn ConfigDecoder<T>>>,
}

/// Registry of processor decoders.
pub type ProcessorRegistry = Registry<Box<dyn ProcessorConfig>>;

/// Registry of exporter decoders.
pub type ExporterRegistry = Registry<Box<dyn ExporterConfig>>;

impl<T> Registry<T> {
    /// An empty registry.
    pub fn new() -> Self {
        Registry {
            decoders: HashMap::new(),
        }
    }

    /// The decoder registered for `type_name`.
    pub fn get(&self, type_name: &str) -> Option<&dyn ConfigDecoder<T>> {
        self.decoders.get(type_name).map(|decoder| decoder.as_ref())
    }

    /// Registers `decoder` under `type_name`, replacing any previous one.
    pub fn set<D>(&mut self, type_name: impl Into<String>, decoder: D)
    where
        D: ConfigDecoder<T> + 'static,
    {
        self.decoders.insert(type_name.into(), Arc::new(decoder));
    }

    /// Builder-style [`set`](Registry::set).
    pub fn with<D>(mut self, type_name: impl Into<String>, decoder: D) -> Self
    where
        D: ConfigDecoder<T> + 'static,
    {
        self.set(type_name, decoder);
        self
    }

    /// The union of `a` and `b`; on a type name present in both, `b` wins.
    pub fn merge(a: &Registry<T>, b: &Registry<T>) -> Registry<T> {
        let mut merged = a.clone();
        merged.decoders.extend(
            b.decoders
                .iter()
                .map(|(name, decoder)| (name.clone(), Arc::clone(decoder))),
        );
        merged
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Registry {
            decoders: self.decoders.clone(),
        }
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.type_names())
            .finish()
    }
}

/// Boxes a deserialized `C` as the trait object stored in a registry.
pub trait DecodeAs<C> {
    /// Performs the conversion.
    fn boxed(config: C) -> Self;
}

impl<C: ProcessorConfig> DecodeAs<C> for Box<dyn ProcessorConfig> {
    fn boxed(config: C) -> Self {
        Box::new(config)
    }
}

impl<C: ExporterConfig> DecodeAs<C> for Box<dyn ExporterConfig> {
    fn boxed(config: C) -> Self {
        Box::new(config)
    }
}

/// A decoder that deserializes the node into `C` with serde.
///
/// A null node, as produced by an entry with no fields (`debug:`), decodes
/// like an empty mapping.
pub fn decode_as<C, T>() -> impl ConfigDecoder<T>
where
    C: DeserializeOwned,
    T: DecodeAs<C>,
{
    |node: &Value| -> Result<T, serde_yaml::Error> {
        let config: C = match node {
            Value::Null => serde_yaml::from_value(Value::Mapping(Mapping::new()))?,
            node => serde_yaml::from_value(node.clone())?,
        };
        Ok(T::boxed(config))
    }
}

static DEFAULT_PROCESSORS: Lazy<ProcessorRegistry> = Lazy::new(|| {
    Registry::new()
        .with(batch::TYPE_NAME, decode_as::<batch::BatchConfig, _>())
        .with(
            periodic_reader::TYPE_NAME,
            decode_as::<periodic_reader::PeriodicReaderConfig, _>(),
        )
        .with(resource::TYPE_NAME, decode_as::<resource::ResourceConfig, _>())
});

static DEFAULT_EXPORTERS: Lazy<ExporterRegistry> = Lazy::new(|| {
    Registry::new()
        .with(debug::TYPE_NAME, decode_as::<debug::DebugConfig, _>())
        .with(otlp::TYPE_NAME, decode_as::<otlp::OtlpConfig, _>())
        .with(otlp_http::TYPE_NAME, decode_as::<otlp_http::OtlpHttpConfig, _>())
});

/// A copy of the built-in processor registry.
pub fn default_processors() -> ProcessorRegistry {
    DEFAULT_PROCESSORS.clone()
}

/// A copy of the built-in exporter registry.
pub fn default_exporters() -> ExporterRegistry {
    DEFAULT_EXPORTERS.clone()
}

/// The processor and exporter registries used to decode a configuration.
#[derive(Clone, Debug)]
pub struct Registries {
    /// Processor decoders.
    pub processors: ProcessorRegistry,
    /// Exporter decoders.
    pub exporters: ExporterRegistry,
}

impl Default for Registries {
    fn default() -> Self {
        Registries {
            processors: default_processors(),
            exporters: default_exporters(),
        }
    }
}
