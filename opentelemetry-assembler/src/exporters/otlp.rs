//! The `otlp` exporter: OTLP over gRPC.
//!
//! The gRPC channel connects lazily on the first export, so building the
//! exporter does no I/O. It must however happen inside a Tokio runtime, which
//! drives the channel.

use std::any::Any;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use opentelemetry_otlp::{
    Compression, LogExporter, MetricExporter, SpanExporter, WithExportConfig, WithTonicConfig,
};
use opentelemetry_sdk::metrics::Temporality;
use serde::{Deserialize, Deserializer};
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};

use crate::error::BoxError;
use crate::exporters::{
    deserialize_temporality, BuiltExporter, ExporterConfig, SharedLogExporter,
    SharedMetricExporter, SharedSpanExporter, SignalExporters,
};
use crate::opaque::OpaqueString;
use crate::scope::Scope;

/// Registry type name.
pub const TYPE_NAME: &str = "otlp";

/// OTLP/gRPC exporter settings. Unset fields keep the exporter defaults, which
/// honor the `OTEL_EXPORTER_OTLP_*` environment variables.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtlpConfig {
    /// Collector address, e.g. `http://localhost:4317`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// `gzip` or `zstd`.
    #[serde(default, deserialize_with = "deserialize_compression")]
    pub compression: Option<Compression>,
    /// Sent as gRPC metadata with every request.
    #[serde(default)]
    pub headers: HashMap<String, OpaqueString>,
    /// Per-request timeout.
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    pub timeout: Option<Duration>,
    /// Temporality of exported metrics.
    #[serde(default, deserialize_with = "deserialize_temporality")]
    pub temporality: Option<Temporality>,
}

fn deserialize_compression<'de, D>(deserializer: D) -> Result<Option<Compression>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => Compression::from_str(s.trim())
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid compression: {s}"))),
        None => Ok(None),
    }
}

impl OtlpConfig {
    fn metadata(&self) -> Result<MetadataMap, BoxError> {
        let mut metadata = MetadataMap::with_capacity(self.headers.len());
        for (key, value) in &self.headers {
            let key = MetadataKey::from_bytes(key.to_ascii_lowercase().as_bytes())
                .map_err(|err| format!("header {key:?}: {err}"))?;
            let value = MetadataValue::try_from(value.expose())
                .map_err(|err| format!("header {key:?}: {err}"))?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }

    fn span_exporter(&self) -> Result<SpanExporter, BoxError> {
        let mut builder = SpanExporter::builder()
            .with_tonic()
            .with_metadata(self.metadata()?);
        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(compression) = self.compression {
            builder = builder.with_compression(compression);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.with_timeout(timeout);
        }
        Ok(builder.build()?)
    }

    fn metric_exporter(&self) -> Result<MetricExporter, BoxError> {
        let mut builder = MetricExporter::builder()
            .with_tonic()
            .with_metadata(self.metadata()?);
        if let Some(temporality) = self.temporality {
            builder = builder.with_temporality(temporality);
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(compression) = self.compression {
            builder = builder.with_compression(compression);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.with_timeout(timeout);
        }
        Ok(builder.build()?)
    }

    fn log_exporter(&self) -> Result<LogExporter, BoxError> {
        let mut builder = LogExporter::builder()
            .with_tonic()
            .with_metadata(self.metadata()?);
        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(compression) = self.compression {
            builder = builder.with_compression(compression);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.with_timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

impl ExporterConfig for OtlpConfig {
    fn build(&self, _scope: &Scope) -> Result<BuiltExporter, BoxError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err("the otlp exporter must be built inside a Tokio runtime".into());
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        endpoint: http://localhost:4317
        compression: gzip
        headers:
          Authorization: Bearer secret
        timeout: 3s
        temporality: delta
    "#;

    #[test]
    fn decode() {
        let config: OtlpConfig = serde_yaml::from_str(CONFIG).unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:4317"));
        assert!(matches!(config.compression, Some(Compression::Gzip)));
        assert_eq!(config.timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.temporality, Some(Temporality::Delta));
        assert!(!format!("{config:?}").contains("secret"));

        let metadata = config.metadata().unwrap();
        assert_eq!(
            metadata.get("authorization").unwrap().to_str().unwrap(),
            "Bearer secret"
        );
    }

    #[test]
    fn rejects_bad_fields() {
        assert!(serde_yaml::from_str::<OtlpConfig>("compression: brotli").is_err());
        assert!(serde_yaml::from_str::<OtlpConfig>("insecure: true").is_err());
    }

    #[test]
    fn rejects_bad_header_names() {
        let config: OtlpConfig = serde_yaml::from_str("headers: {'bad key': v}").unwrap();
        assert!(config.metadata().is_err());
    }

    #[test]
    fn requires_runtime() {
        let config: OtlpConfig = serde_yaml::from_str(CONFIG).unwrap();
        let err = config.build(&Scope::new()).unwrap_err();
        assert!(err.to_string().contains("Tokio runtime"));
    }

    #[tokio::test]
    async fn builds_inside_runtime() {
        let config: OtlpConfig = serde_yaml::from_str(CONFIG).unwrap();
        let built = config.build(&Scope::new()).unwrap();
        assert!(built.exporter.span_exporter().is_some());
        assert!(built.exporter.metric_exporter().is_some());
        assert!(built.exporter.log_exporter().is_some());
    }
}
