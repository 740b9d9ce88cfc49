use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use opentelemetry::metrics::MeterProvider;
use opentelemetry::trace::{Tracer, TracerProvider};
use opentelemetry::{Key, Value as AttrValue};
use opentelemetry_assembler::exporters::{SharedMetricExporter, SharedSpanExporter};
use opentelemetry_assembler::{
    BoxError, BuiltExporter, Config, Error, Exporter, ExporterConfig, Identifier, Registries,
    Resolver, Scope, SignalExporters, SignalKind,
};
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::metrics::InMemoryMetricExporter;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SpanData, SpanExporter};
use opentelemetry_sdk::Resource;
use serde::Deserialize;
use serde_yaml::Value;

type Events = Arc<Mutex<Vec<String>>>;

/// Span exporter recording each exported span with the `service.name` of the
/// resource it was exported under.
#[derive(Clone, Debug, Default)]
struct ResourceRecorder {
    resource: Arc<Mutex<Option<Resource>>>,
    exported: Arc<Mutex<Vec<(String, Option<AttrValue>)>>>,
}

impl ResourceRecorder {
    fn exported(&self) -> Vec<(String, Option<AttrValue>)> {
        self.exported.lock().unwrap().clone()
    }
}

impl SpanExporter for ResourceRecorder {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        let service = self
            .resource
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|resource| resource.get(&Key::from_static_str("service.name")));
        let mut exported = self.exported.lock().unwrap();
        for span in batch {
            exported.push((span.name.into_owned(), service.clone()));
        }
        Ok(())
    }

    fn set_resource(&mut self, resource: &Resource) {
        *self.resource.lock().unwrap() = Some(resource.clone());
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MockSettings {
    label: String,
    #[serde(default)]
    fail_build: bool,
    #[serde(default)]
    fail_start: bool,
    #[serde(default)]
    fail_shutdown: bool,
    #[serde(default)]
    metrics: bool,
    #[serde(default)]
    record_resource: bool,
}

struct MockExporterConfig {
    settings: MockSettings,
    sinks: Sinks,
}

impl fmt::Debug for MockExporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MockExporterConfig")
            .field(&self.settings)
            .finish()
    }
}

impl ExporterConfig for MockExporterConfig {
    fn build(&self, _scope: &Scope) -> Result<BuiltExporter, BoxError> {
        let label = self.settings.label.clone();
        self.sinks.record(format!("build {label}"));
        if self.settings.fail_build {
            return Err(format!("{label} refused to build").into());
        }

        let spans = if self.settings.record_resource {
            SharedSpanExporter::new(self.sinks.recorder.clone())
        } else {
            SharedSpanExporter::new(self.sinks.spans.clone())
        };
        let mut signals = SignalExporters::new().with_traces(spans);
        if self.settings.metrics {
            signals = signals.with_metrics(SharedMetricExporter::new(self.sinks.metrics.clone()));
        }

        let exporter = MockExporter {
            label: label.clone(),
            fail_shutdown: self.settings.fail_shutdown,
            events: Arc::clone(&self.sinks.events),
            signals,
        };
        let events = Arc::clone(&self.sinks.events);
        let fail_start = self.settings.fail_start;
        Ok(BuiltExporter::new(exporter).with_start(move |_scope| {
            events.lock().unwrap().push(format!("start {label}"));
            if fail_start {
                Err(format!("{label} refused to start").into())
            } else {
                Ok(())
            }
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
struct MockExporter {
    label: String,
    fail_shutdown: bool,
    events: Events,
    signals: SignalExporters,
}

impl Exporter for MockExporter {
    fn span_exporter(&self) -> Option<SharedSpanExporter> {
        self.signals.span_exporter()
    }

    fn metric_exporter(&self) -> Option<SharedMetricExporter> {
        self.signals.metric_exporter()
    }

    fn shutdown(&self, _timeout: Duration) -> Result<(), BoxError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("shutdown {}", self.label));
        if self.fail_shutdown {
            Err(format!("{} refused to stop", self.label).into())
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Default)]
struct Sinks {
    events: Events,
    spans: InMemorySpanExporter,
    metrics: InMemoryMetricExporter,
    recorder: ResourceRecorder,
}

impl Sinks {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn count(&self, event: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == event)
            .count()
    }

    fn registries(&self) -> Registries {
        let mut registries = Registries::default();
        let sinks = self.clone();
        registries.exporters.set(
            "mock",
            move |node: &Value| -> Result<Box<dyn ExporterConfig>, serde_yaml::Error> {
                Ok(Box::new(MockExporterConfig {
                    settings: serde_yaml::from_value(node.clone())?,
                    sinks: sinks.clone(),
                }))
            },
        );
        registries
    }

    fn resolver(&self, yaml: &str) -> Resolver {
        Resolver::new(Config::from_yaml_with(yaml, &self.registries()).unwrap())
    }
}

fn id(text: &str) -> Identifier {
    Identifier::parse(text).unwrap()
}

#[test]
fn shared_exporter_is_built_once() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        exporters:
          mock/shared: {label: shared}
        providers:
          tracer/a:
            exporters: [mock/shared]
          tracer/b:
            exporters: [mock/shared]
        "#,
    );
    let scope = Scope::new();

    let a = resolver.tracer_provider(&scope, "a").unwrap();
    let first = resolver.exporter(&id("mock/shared")).unwrap().unwrap();
    let b = resolver.tracer_provider(&scope, "b").unwrap();
    let second = resolver.exporter(&id("mock/shared")).unwrap().unwrap();

    assert_eq!(sinks.count("build shared"), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(first
        .span_exporter()
        .unwrap()
        .ptr_eq(&second.span_exporter().unwrap()));

    a.tracer("a").in_span("from-a", |_| {});
    b.tracer("b").in_span("from-b", |_| {});

    let mut names: Vec<String> = sinks
        .spans
        .get_finished_spans()
        .unwrap()
        .into_iter()
        .map(|span| span.name.into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["from-a", "from-b"]);

    resolver.shutdown(&scope).unwrap();
    assert_eq!(sinks.count("shutdown shared"), 1);
}

#[test]
fn providers_are_cached() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        exporters:
          mock: {label: only}
        providers:
          tracer:
            exporters: [mock]
        "#,
    );
    let scope = Scope::new();

    resolver.tracer_provider(&scope, "").unwrap();
    resolver.tracer_provider(&scope, "").unwrap();
    assert_eq!(sinks.count("build only"), 1);
}

#[test]
fn concurrent_requests_share_one_instance() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        exporters:
          mock: {label: contended, metrics: true}
        providers:
          tracer:
            exporters: [mock]
          tracer/other:
            exporters: [mock]
          meter:
            exporters: [mock]
        "#,
    );
    let scope = Scope::new();

    std::thread::scope(|threads| {
        for i in 0..8 {
            let (resolver, scope) = (&resolver, &scope);
            threads.spawn(move || match i % 3 {
                0 => drop(resolver.tracer_provider(scope, "").unwrap()),
                1 => drop(resolver.tracer_provider(scope, "other").unwrap()),
                _ => drop(resolver.meter_provider(scope, "").unwrap()),
            });
        }
    });

    assert_eq!(sinks.count("build contended"), 1);
    resolver.shutdown(&scope).unwrap();
}

#[test]
fn lookup_failures() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        exporters:
          mock/traces_only: {label: traces_only}
          mock/broken: {label: broken, fail_build: true}
        providers:
          tracer:
            exporters: [mock/traces_only]
          tracer/missing_exporter:
            exporters: [mock/nowhere]
          tracer/missing_processor:
            processors: [batcher/nowhere]
            exporters: [mock/traces_only]
          tracer/broken:
            exporters: [mock/broken]
          meter:
            exporters: [mock/traces_only]
        "#,
    );
    let scope = Scope::new();

    assert!(matches!(
        resolver.tracer_provider(&scope, "absent"),
        Err(Error::ProviderNotFound(provider)) if provider == id("tracer/absent")
    ));
    assert!(matches!(
        resolver.logger_provider(&scope, ""),
        Err(Error::ProviderNotFound(_))
    ));
    assert!(matches!(
        resolver.tracer_provider(&scope, "missing_exporter"),
        Err(Error::ExporterNotFound(exporter)) if exporter == id("mock/nowhere")
    ));
    assert!(matches!(
        resolver.tracer_provider(&scope, "missing_processor"),
        Err(Error::ProcessorNotFound(processor)) if processor == id("batcher/nowhere")
    ));
    assert!(matches!(
        resolver.meter_provider(&scope, ""),
        Err(Error::ExporterUnsupported { signal: SignalKind::Metrics, .. })
    ));

    let err = resolver.tracer_provider(&scope, "broken").unwrap_err();
    assert!(matches!(&err, Error::Construction { id: exporter, .. } if *exporter == id("mock/broken")));
    assert!(err.to_string().contains("broken refused to build"));

    // Failures above leave other providers usable.
    assert!(resolver.tracer_provider(&scope, "").is_ok());
    assert_eq!(sinks.count("build traces_only"), 1);
}

#[test]
fn disabled_config_has_no_providers() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: false
        exporters:
          mock: {label: never}
        providers:
          tracer:
            exporters: [mock]
        "#,
    );
    assert!(matches!(
        resolver.tracer_provider(&Scope::new(), ""),
        Err(Error::ProviderNotFound(_))
    ));
    assert_eq!(sinks.count("build never"), 0);
}

#[test]
fn start_runs_each_exporter_once() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        exporters:
          mock: {label: once}
        providers:
          tracer:
            exporters: [mock]
        "#,
    );
    let scope = Scope::new();

    resolver.start(&scope).unwrap();
    assert_eq!(sinks.count("start once"), 0);

    resolver.tracer_provider(&scope, "").unwrap();
    resolver.start(&scope).unwrap();
    resolver.start(&scope).unwrap();
    assert_eq!(sinks.count("start once"), 1);
}

#[test]
fn failed_start_rolls_back() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        exporters:
          mock/a: {label: a}
          mock/b: {label: b, fail_start: true}
          mock/c: {label: c}
        providers:
          tracer:
            exporters: [mock/a, mock/b, mock/c]
        "#,
    );
    let scope = Scope::new();
    resolver.tracer_provider(&scope, "").unwrap();

    let err = resolver.start(&scope).unwrap_err();
    assert!(matches!(&err, Error::Start { id: exporter, .. } if *exporter == id("mock/b")));
    assert_eq!(sinks.count("start a"), 1);
    assert_eq!(sinks.count("start c"), 0);
    assert_eq!(sinks.count("shutdown a"), 1);

    // The rolled-back exporter is not shut down a second time.
    resolver.shutdown(&scope).unwrap();
    assert_eq!(sinks.count("shutdown a"), 1);
    assert_eq!(sinks.count("shutdown b"), 1);
    assert_eq!(sinks.count("shutdown c"), 1);
}

#[test]
fn rollback_failures_are_joined() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        exporters:
          mock/a: {label: a, fail_shutdown: true}
          mock/b: {label: b, fail_start: true}
        providers:
          tracer:
            exporters: [mock/a, mock/b]
        "#,
    );
    let scope = Scope::new();
    resolver.tracer_provider(&scope, "").unwrap();

    let err = resolver.start(&scope).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("b refused to start"), "{message}");
    assert!(message.contains("rollback"), "{message}");
    assert!(message.contains("a refused to stop"), "{message}");

    let leaves = err.leaves();
    assert_eq!(leaves.len(), 2);
    assert!(matches!(leaves[0], Error::Start { .. }));
    assert!(matches!(leaves[1], Error::Shutdown { .. }));
}

#[test]
fn shutdown_attempts_everything() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        exporters:
          mock/a: {label: a}
          mock/b: {label: b, fail_shutdown: true}
          mock/c: {label: c}
        providers:
          tracer:
            exporters: [mock/a, mock/b, mock/c]
        "#,
    );
    let scope = Scope::new();
    resolver.tracer_provider(&scope, "").unwrap();
    resolver.start(&scope).unwrap();

    let err = resolver.shutdown(&scope).unwrap_err();
    assert!(err.to_string().contains("\"mock/b\""));
    assert!(matches!(
        err.leaves()[..],
        [Error::Shutdown { id: exporter, .. }] if *exporter == id("mock/b")
    ));
    for label in ["a", "b", "c"] {
        assert_eq!(sinks.count(&format!("shutdown {label}")), 1);
    }

    // Everything was attempted once; a second call has nothing left to do.
    resolver.shutdown(&scope).unwrap();
    assert_eq!(sinks.count("shutdown b"), 1);
}

#[test]
fn ended_scope_stops_work() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        exporters:
          mock/a: {label: a}
          mock/b: {label: b}
        providers:
          tracer/a:
            exporters: [mock/a]
          tracer/b:
            exporters: [mock/b]
        "#,
    );
    let live = Scope::new();
    resolver.tracer_provider(&live, "a").unwrap();

    let canceled = Scope::new();
    canceled.cancel();
    assert!(matches!(
        resolver.tracer_provider(&canceled, "b"),
        Err(Error::Canceled)
    ));
    assert_eq!(sinks.count("build b"), 0);

    assert!(matches!(resolver.start(&canceled), Err(Error::Canceled)));
    assert_eq!(sinks.count("start a"), 0);

    let expired = Scope::with_timeout(Duration::ZERO);
    let err = resolver.shutdown(&expired).unwrap_err();
    assert!(err
        .leaves()
        .iter()
        .all(|leaf| matches!(leaf, Error::Shutdown { .. })));
    assert!(err.to_string().contains("deadline exceeded"));
    assert_eq!(sinks.count("shutdown a"), 0);

    // Components skipped by an ended scope are still shut down later.
    resolver.shutdown(&live).unwrap();
    assert_eq!(sinks.count("shutdown a"), 1);
}

#[test]
fn batcher_takes_over_exporters() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        processors:
          batcher:
            scheduled_delay: 1h
        exporters:
          mock: {label: batched}
        providers:
          tracer:
            processors: [batcher]
            exporters: [mock]
        "#,
    );
    let scope = Scope::new();
    let provider = resolver.tracer_provider(&scope, "").unwrap();

    provider.tracer("batched").in_span("queued", |_| {});
    assert!(sinks.spans.get_finished_spans().unwrap().is_empty());

    provider.force_flush().unwrap();
    let spans = sinks.spans.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "queued");

    resolver.shutdown(&scope).unwrap();
}

#[test]
fn resource_reaches_exporters() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        processors:
          resource:
            attributes:
              - key: service.name
                value: checkout
              - key: ports
                value: [8080, 8443]
          resource/override:
            attributes:
              - key: service.name
                value: payments
        exporters:
          mock: {label: recorder, record_resource: true}
        providers:
          tracer:
            processors: [resource, resource/override]
            exporters: [mock]
        "#,
    );
    let scope = Scope::new();
    let provider = resolver.tracer_provider(&scope, "").unwrap();
    provider.tracer("checkout").in_span("charge", |_| {});

    assert_eq!(
        sinks.recorder.exported(),
        [("charge".to_string(), Some(AttrValue::from("payments")))]
    );
    let resource = sinks.recorder.resource.lock().unwrap().clone().unwrap();
    assert_eq!(
        resource.get(&Key::from_static_str("service.name")),
        Some(AttrValue::from("payments"))
    );
    assert_eq!(
        resource.get(&Key::from_static_str("ports")),
        Some(AttrValue::Array(vec![8080_i64, 8443].into()))
    );
    resolver.shutdown(&scope).unwrap();
}

#[test]
fn shared_exporter_keeps_each_provider_resource() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        processors:
          resource/a:
            attributes:
              - key: service.name
                value: svc-a
          resource/b:
            attributes:
              - key: service.name
                value: svc-b
        exporters:
          mock: {label: recorder, record_resource: true}
        providers:
          tracer/a:
            processors: [resource/a]
            exporters: [mock]
          tracer/b:
            processors: [resource/b]
            exporters: [mock]
        "#,
    );
    let scope = Scope::new();
    let a = resolver.tracer_provider(&scope, "a").unwrap();
    let b = resolver.tracer_provider(&scope, "b").unwrap();

    a.tracer("a").in_span("span-from-a", |_| {});
    b.tracer("b").in_span("span-from-b", |_| {});
    a.tracer("a").in_span("span-from-a-again", |_| {});

    assert_eq!(
        sinks.recorder.exported(),
        [
            ("span-from-a".to_string(), Some(AttrValue::from("svc-a"))),
            ("span-from-b".to_string(), Some(AttrValue::from("svc-b"))),
            ("span-from-a-again".to_string(), Some(AttrValue::from("svc-a"))),
        ]
    );
    assert_eq!(sinks.count("build recorder"), 1);
    resolver.shutdown(&scope).unwrap();
}

#[test]
fn meter_provider_reads_periodically() {
    let sinks = Sinks::default();
    let resolver = sinks.resolver(
        r#"
        enabled: true
        processors:
          periodic_reader:
            interval: 1h
          batcher:
        exporters:
          mock: {label: metrics, metrics: true}
        providers:
          meter:
            processors: [batcher, periodic_reader]
            exporters: [mock]
        "#,
    );
    let scope = Scope::new();
    let provider = resolver.meter_provider(&scope, "").unwrap();

    let counter = provider.meter("requests").u64_counter("handled").build();
    counter.add(3, &[]);
    provider.force_flush().unwrap();

    let exported = sinks.metrics.get_finished_metrics().unwrap();
    assert!(!exported.is_empty());
    resolver.shutdown(&scope).unwrap();
}
