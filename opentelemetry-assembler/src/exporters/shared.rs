//! Shareable exporter handles.
//!
//! SDK providers take ownership of the exporters attached to them. A handle
//! keeps one exporter instance behind an `Arc`, so the same instance can be
//! attached to any number of providers. Shutting a provider down does not shut
//! the exporter down: the handle's SDK-facing shutdown does nothing and the
//! owner calls [`close`](SharedSpanExporter::close) exactly once instead.
//!
//! Span and log exporters learn their resource through `set_resource`, once
//! per provider. Each attached handle keeps the resource of its own provider
//! and hands it to the exporter right before every export, under the same
//! lock, so a batch always leaves with the resource of the provider that
//! produced it. Metric batches carry their resource already.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::lock::Mutex;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::logs::{LogBatch, LogExporter};
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::Temporality;
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use opentelemetry_sdk::Resource;

trait DynSpanExporter: Send + Sync + fmt::Debug {
    fn export<'a>(
        &'a self,
        resource: Option<&'a Resource>,
        batch: Vec<SpanData>,
    ) -> BoxFuture<'a, OTelSdkResult>;
    fn force_flush(&self) -> OTelSdkResult;
    fn close(&self, timeout: Duration) -> OTelSdkResult;
}

impl<E: SpanExporter + 'static> DynSpanExporter for Mutex<E> {
    fn export<'a>(
        &'a self,
        resource: Option<&'a Resource>,
        batch: Vec<SpanData>,
    ) -> BoxFuture<'a, OTelSdkResult> {
        Box::pin(async move {
            let mut exporter = self.lock().await;
            if let Some(resource) = resource {
                exporter.set_resource(resource);
            }
            exporter.export(batch).await
        })
    }

    fn force_flush(&self) -> OTelSdkResult {
        futures_executor::block_on(self.lock()).force_flush()
    }

    fn close(&self, timeout: Duration) -> OTelSdkResult {
        futures_executor::block_on(self.lock()).shutdown_with_timeout(timeout)
    }
}

/// A span exporter that can be attached to several tracer providers.
#[derive(Clone)]
pub struct SharedSpanExporter {
    inner: Arc<dyn DynSpanExporter>,
    resource: Option<Resource>,
}

impl SharedSpanExporter {
    /// Wraps an SDK span exporter.
    pub fn new<E: SpanExporter + 'static>(exporter: E) -> Self {
        SharedSpanExporter {
            inner: Arc::new(Mutex::new(exporter)),
            resource: None,
        }
    }

    /// Whether both handles wrap the same exporter instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Shuts the wrapped exporter down.
    pub fn close(&self, timeout: Duration) -> OTelSdkResult {
        self.inner.close(timeout)
    }
}

impl fmt::Debug for SharedSpanExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSpanExporter")
            .field("inner", &self.inner)
            .field("resource", &self.resource)
            .finish()
    }
}

impl SpanExporter for SharedSpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        self.inner.export(self.resource.as_ref(), batch).await
    }

    fn force_flush(&mut self) -> OTelSdkResult {
        self.inner.force_flush()
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = Some(resource.clone());
    }
}

trait DynLogExporter: Send + Sync + fmt::Debug {
    fn export<'a>(
        &'a self,
        resource: Option<&'a Resource>,
        batch: LogBatch<'a>,
    ) -> BoxFuture<'a, OTelSdkResult>;
    fn close(&self, timeout: Duration) -> OTelSdkResult;
}

impl<E: LogExporter + 'static> DynLogExporter for Mutex<E> {
    fn export<'a>(
        &'a self,
        resource: Option<&'a Resource>,
        batch: LogBatch<'a>,
    ) -> BoxFuture<'a, OTelSdkResult> {
        Box::pin(async move {
            let mut exporter = self.lock().await;
            if let Some(resource) = resource {
                exporter.set_resource(resource);
            }
            exporter.export(batch).await
        })
    }

    fn close(&self, timeout: Duration) -> OTelSdkResult {
        futures_executor::block_on(self.lock()).shutdown_with_timeout(timeout)
    }
}

/// A log exporter that can be attached to several logger providers.
#[derive(Clone)]
pub struct SharedLogExporter {
    inner: Arc<dyn DynLogExporter>,
    resource: Option<Resource>,
}

impl SharedLogExporter {
    /// Wraps an SDK log exporter.
    pub fn new<E: LogExporter + 'static>(exporter: E) -> Self {
        SharedLogExporter {
            inner: Arc::new(Mutex::new(exporter)),
            resource: None,
        }
    }

    /// Whether both handles wrap the same exporter instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Shuts the wrapped exporter down.
    pub fn close(&self, timeout: Duration) -> OTelSdkResult {
        self.inner.close(timeout)
    }
}

impl fmt::Debug for SharedLogExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLogExporter")
            .field("inner", &self.inner)
            .field("resource", &self.resource)
            .finish()
    }
}

impl LogExporter for SharedLogExporter {
    async fn export(&self, batch: LogBatch<'_>) -> OTelSdkResult {
        self.inner.export(self.resource.as_ref(), batch).await
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = Some(resource.clone());
    }
}

trait DynMetricExporter: Send + Sync {
    fn export<'a>(&'a self, metrics: &'a ResourceMetrics) -> BoxFuture<'a, OTelSdkResult>;
    fn force_flush(&self) -> OTelSdkResult;
    fn close(&self, timeout: Duration) -> OTelSdkResult;
    fn temporality(&self) -> Temporality;
}

impl<E: PushMetricExporter> DynMetricExporter for E {
    fn export<'a>(&'a self, metrics: &'a ResourceMetrics) -> BoxFuture<'a, OTelSdkResult> {
        Box::pin(PushMetricExporter::export(self, metrics))
    }

    fn force_flush(&self) -> OTelSdkResult {
        PushMetricExporter::force_flush(self)
    }

    fn close(&self, timeout: Duration) -> OTelSdkResult {
        PushMetricExporter::shutdown_with_timeout(self, timeout)
    }

    fn temporality(&self) -> Temporality {
        PushMetricExporter::temporality(self)
    }
}

/// A push metric exporter that can be attached to several meter providers.
#[derive(Clone)]
pub struct SharedMetricExporter {
    inner: Arc<dyn DynMetricExporter>,
}

impl SharedMetricExporter {
    /// Wraps an SDK push metric exporter.
    pub fn new<E: PushMetricExporter>(exporter: E) -> Self {
        SharedMetricExporter {
            inner: Arc::new(exporter),
        }
    }

    /// Whether both handles wrap the same exporter instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Shuts the wrapped exporter down.
    pub fn close(&self, timeout: Duration) -> OTelSdkResult {
        self.inner.close(timeout)
    }
}

impl fmt::Debug for SharedMetricExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMetricExporter")
            .field("temporality", &self.inner.temporality())
            .finish_non_exhaustive()
    }
}

impl PushMetricExporter for SharedMetricExporter {
    async fn export(&self, metrics: &ResourceMetrics) -> OTelSdkResult {
        self.inner.export(metrics).await
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.inner.force_flush()
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        Ok(())
    }

    fn temporality(&self) -> Temporality {
        self.inner.temporality()
    }
}
