//! # Configuration
//!
//! Decodes the configuration document:
//!
//! ```yaml
//! enabled: true
//! processors:
//!   batcher:
//!     scheduled_delay: 5s
//!   resource:
//!     attributes:
//!       - key: service.name
//!         value: checkout
//! exporters:
//!   otlp:
//!     endpoint: http://localhost:4317
//! providers:
//!   tracer:
//!     processors: [batcher, resource]
//!     exporters: [otlp]
//! ```
//!
//! Processor and exporter bodies are open-ended: each entry is decoded by the
//! decoder registered for its identifier's type. Decoding is lenient, so one
//! bad entry is reported without preventing the rest from loading.

use std::collections::BTreeMap;
use std::path::Path;

use opentelemetry::{otel_debug, otel_warn};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Errors, Result};
use crate::exporters::ExporterConfig;
use crate::identifier::Identifier;
use crate::processors::ProcessorConfig;
use crate::registry::{Registries, Registry};

/// Processors and exporters of one provider, in the order they are applied.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Processors contributing options, in contribution order.
    #[serde(default)]
    pub processors: Vec<Identifier>,
    /// Exporters the provider sends to.
    #[serde(default)]
    pub exporters: Vec<Identifier>,
}

/// A decoded configuration.
///
/// A disabled configuration has empty maps.
#[derive(Debug, Default)]
pub struct Config {
    /// Whether telemetry is enabled at all.
    pub enabled: bool,
    /// Processors by identifier.
    pub processors: BTreeMap<Identifier, Box<dyn ProcessorConfig>>,
    /// Exporters by identifier.
    pub exporters: BTreeMap<Identifier, Box<dyn ExporterConfig>>,
    /// Providers by identifier, e.g. `tracer` or `logger/audit`.
    pub providers: BTreeMap<Identifier, ProviderConfig>,
}

// The document with component bodies left undecoded.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    processors: Option<Mapping>,
    #[serde(default)]
    exporters: Option<Mapping>,
    #[serde(default)]
    providers: Option<BTreeMap<Identifier, ProviderConfig>>,
}

impl Config {
    /// Decodes `node` with the default registries.
    ///
    /// See [`decode_with`](Config::decode_with).
    pub fn decode(node: &Value) -> (Config, Result<()>) {
        Self::decode_with(node, &Registries::default())
    }

    /// Decodes `node`, dispatching component bodies through `registries`.
    ///
    /// Returns every entry that decoded, together with the failures of the
    /// others: processor failures grouped under `processor`, exporter failures
    /// under `exporter`. A null node, or one with `enabled` unset or false,
    /// yields an empty configuration without looking at anything else.
    pub fn decode_with(node: &Value, registries: &Registries) -> (Config, Result<()>) {
        let raw: RawConfig = match node {
            Value::Null => RawConfig::default(),
            node => match serde_yaml::from_value(node.clone()) {
                Ok(raw) => raw,
                Err(err) => {
                    otel_warn!(name: "Config.DecodeFailed", error = err.to_string());
                    return (Config::default(), Err(err.into()));
                }
            },
        };

        if !raw.enabled {
            otel_debug!(name: "Config.Disabled");
            return (Config::default(), Ok(()));
        }

        let mut config = Config {
            enabled: true,
            providers: raw.providers.unwrap_or_default(),
            ..Default::default()
        };

        let mut errors = Errors::new();
        let processor_errors = decode_entries(
            raw.processors.unwrap_or_default(),
            &registries.processors,
            &mut config.processors,
        );
        if let Some(err) = processor_errors.into_error() {
            errors.push(err.tagged("processor"));
        }
        let exporter_errors = decode_entries(
            raw.exporters.unwrap_or_default(),
            &registries.exporters,
            &mut config.exporters,
        );
        if let Some(err) = exporter_errors.into_error() {
            errors.push(err.tagged("exporter"));
        }

        otel_debug!(
            name: "Config.Decoded",
            processors = config.processors.len(),
            exporters = config.exporters.len(),
            providers = config.providers.len()
        );
        (config, errors.into_result())
    }

    /// Parses YAML text and decodes it with the default registries, failing on
    /// any error.
    pub fn from_yaml(text: &str) -> Result<Config> {
        Self::from_yaml_with(text, &Registries::default())
    }

    /// Parses YAML text and decodes it with `registries`, failing on any
    /// error.
    pub fn from_yaml_with(text: &str, registries: &Registries) -> Result<Config> {
        let node: Value = serde_yaml::from_str(text)?;
        let (config, result) = Self::decode_with(&node, registries);
        result.map(|()| config)
    }

    /// Reads and decodes a YAML file with the default registries, failing on
    /// any error.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Config> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}

fn decode_entries<T>(
    raw: Mapping,
    registry: &Registry<T>,
    decoded: &mut BTreeMap<Identifier, T>,
) -> Errors {
    let mut errors = Errors::new();
    for (key, node) in raw {
        match decode_entry(&key, &node, registry) {
            Ok((id, config)) => {
                if decoded.contains_key(&id) {
                    errors.push(Error::InvalidIdentifier {
                        text: id.to_string(),
                        reason: "duplicate identifier",
                    });
                    continue;
                }
                decoded.insert(id, config);
            }
            Err(err) => {
                otel_warn!(name: "Config.DecodeFailed", error = err.to_string());
                errors.push(err);
            }
        }
    }
    errors
}

fn decode_entry<T>(key: &Value, node: &Value, registry: &Registry<T>) -> Result<(Identifier, T)> {
    let id = match key {
        Value::String(text) => Identifier::parse(text)?,
        other => {
            return Err(Error::InvalidIdentifier {
                text: format!("{other:?}"),
                reason: "identifier must be a string",
            })
        }
    };
    let Some(decoder) = registry.get(id.type_name()) else {
        return Err(Error::UnknownType { id });
    };
    match decoder.decode(node) {
        Ok(config) => Ok((id, config)),
        Err(source) => Err(Error::Decode { id, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporters::debug::DebugConfig;
    use crate::processors::batch::BatchConfig;

    fn id(text: &str) -> Identifier {
        Identifier::parse(text).unwrap()
    }

    #[test]
    fn disabled_short_circuits() {
        let (config, result) = Config::decode(
            &serde_yaml::from_str(
                r#"
                enabled: false
                processors:
                  unknown_type: {}
                "#,
            )
            .unwrap(),
        );
        assert!(result.is_ok());
        assert!(!config.enabled);
        assert!(config.processors.is_empty());
        assert!(config.providers.is_empty());
    }

    #[test]
    fn empty_document_is_disabled() {
        let (config, result) = Config::decode(&Value::Null);
        assert!(result.is_ok());
        assert!(!config.enabled);
    }

    #[test]
    fn typed_entries() {
        let config = Config::from_yaml(
            r#"
            enabled: true
            processors:
              batcher/fast:
                max_queue_size: 8
            exporters:
              debug:
            providers:
              tracer:
                processors: [batcher/fast]
                exporters: [debug]
              logger/audit:
                exporters: [debug]
            "#,
        )
        .unwrap();

        let batcher = config.processors[&id("batcher/fast")]
            .as_any()
            .downcast_ref::<BatchConfig>()
            .unwrap();
        assert_eq!(batcher.max_queue_size, Some(8));
        assert!(config.exporters[&id("debug")]
            .as_any()
            .downcast_ref::<DebugConfig>()
            .is_some());

        let logger = &config.providers[&id("logger/audit")];
        assert!(logger.processors.is_empty());
        assert_eq!(logger.exporters, vec![id("debug")]);
    }

    #[test]
    fn bad_keys_are_reported_per_entry() {
        let (config, result) = Config::decode(
            &serde_yaml::from_str(
                r#"
                enabled: true
                processors:
                  batcher: {}
                  1batcher: {}
                  42: {}
                "#,
            )
            .unwrap(),
        );
        assert_eq!(config.processors.len(), 1);

        let err = result.unwrap_err();
        assert!(matches!(err, Error::Tagged { tag: "processor", .. }));
        let leaves = err.leaves();
        assert_eq!(leaves.len(), 2);
        assert!(leaves
            .iter()
            .all(|e| matches!(e, Error::InvalidIdentifier { .. })));
    }

    #[test]
    fn duplicate_after_normalization() {
        let (config, result) = Config::decode(
            &serde_yaml::from_str(
                r#"
                enabled: true
                exporters:
                  debug/a: {}
                  "debug / a": {}
                "#,
            )
            .unwrap(),
        );
        assert_eq!(config.exporters.len(), 1);
        assert!(matches!(
            result.unwrap_err().leaves()[..],
            [Error::InvalidIdentifier {
                reason: "duplicate identifier",
                ..
            }]
        ));
    }

    #[test]
    fn malformed_shape_is_a_hard_error() {
        assert!(matches!(
            Config::from_yaml("enabled: true\nproviders: [tracer]"),
            Err(Error::Yaml(_))
        ));
        assert!(matches!(
            Config::from_yaml("enabled: true\nunknown_section: {}"),
            Err(Error::Yaml(_))
        ));
        assert!(matches!(Config::from_yaml("enabled: [true"), Err(Error::Yaml(_))));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            Config::from_yaml_file("does/not/exist.yaml"),
            Err(Error::Io(_))
        ));
    }
}
