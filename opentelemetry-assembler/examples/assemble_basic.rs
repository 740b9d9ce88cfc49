//! Assembles a tracer, a meter and a logger provider that print to stdout,
//! emits one item of each signal and shuts everything down.
//!
//! Run with `cargo run --example assemble_basic`.

use std::time::Duration;

use opentelemetry::logs::{AnyValue, LogRecord, Logger, LoggerProvider, Severity};
use opentelemetry::metrics::MeterProvider;
use opentelemetry::trace::{Tracer, TracerProvider};
use opentelemetry::KeyValue;
use opentelemetry_assembler::{Config, Resolver, Scope};

const CONFIG: &str = r#"
enabled: true

processors:
  batcher:
    scheduled_delay: 500ms
  periodic_reader:
    interval: 1s
  resource:
    attributes:
      - key: service.name
        value: assemble-basic
      - key: service.instance.ports
        value: [8080, 8443]
    detectors: [telemetry.sdk]

exporters:
  debug:
    temporality: delta

providers:
  tracer:
    processors: [batcher, resource]
    exporters: [debug]
  meter:
    processors: [periodic_reader, resource]
    exporters: [debug]
  logger:
    processors: [resource]
    exporters: [debug]
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_yaml(CONFIG)?;
    let resolver = Resolver::new(config);
    let scope = Scope::with_timeout(Duration::from_secs(5));

    let tracer_provider = resolver.tracer_provider(&scope, "")?;
    let meter_provider = resolver.meter_provider(&scope, "")?;
    let logger_provider = resolver.logger_provider(&scope, "")?;
    resolver.start(&scope)?;

    let counter = meter_provider
        .meter("assemble-basic")
        .u64_counter("jobs.processed")
        .build();
    let logger = logger_provider.logger("assemble-basic");

    tracer_provider
        .tracer("assemble-basic")
        .in_span("process-job", |_cx| {
            counter.add(1, &[KeyValue::new("queue", "default")]);

            let mut record = logger.create_log_record();
            record.set_severity_number(Severity::Info);
            record.set_body(AnyValue::from("job processed"));
            logger.emit(record);
        });

    resolver.shutdown(&scope)?;
    Ok(())
}
