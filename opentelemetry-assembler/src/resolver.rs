//! # Resolver
//!
//! Builds providers on demand from a [`Config`] and owns the lifecycle of
//! everything it built.
//!
//! Exporters are instantiated the first time any provider references them and
//! cached by identifier, so an exporter listed by several providers is one
//! instance serving all of them. Providers are cached by identifier as well.
//! [`Resolver::start`] and [`Resolver::shutdown`] act on whatever has been
//! resolved so far.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use opentelemetry::{otel_debug, otel_warn};
use opentelemetry_sdk::error::OTelSdkError;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;

use crate::config::Config;
use crate::error::{Error, Errors, Result};
use crate::exporters::{Exporter, StartFn};
use crate::identifier::Identifier;
use crate::pipeline::Pipeline;
use crate::scope::Scope;
use crate::signal::{AnyProvider, Logs, Metrics, Signal, Traces};

/// Assembles providers from a [`Config`].
///
/// All state sits behind one lock that is held for the whole of a provider
/// build, so concurrent requests are serialized and no exporter is ever
/// instantiated twice.
pub struct Resolver {
    config: Config,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    exporters: BTreeMap<Identifier, ExporterEntry>,
    providers: BTreeMap<Identifier, ProviderEntry>,
}

struct ExporterEntry {
    exporter: Arc<dyn Exporter>,
    start: Option<StartFn>,
    shut_down: bool,
}

struct ProviderEntry {
    provider: AnyProvider,
    shut_down: bool,
}

impl Resolver {
    /// A resolver over `config`. Nothing is built until requested.
    pub fn new(config: Config) -> Self {
        Resolver {
            config,
            state: Mutex::new(State::default()),
        }
    }

    /// The configuration providers are built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The tracer provider `tracer/<name>`, or `tracer` for an empty name.
    pub fn tracer_provider(&self, scope: &Scope, name: &str) -> Result<SdkTracerProvider> {
        self.provider::<Traces>(scope, name)
    }

    /// The meter provider `meter/<name>`, or `meter` for an empty name.
    pub fn meter_provider(&self, scope: &Scope, name: &str) -> Result<SdkMeterProvider> {
        self.provider::<Metrics>(scope, name)
    }

    /// The logger provider `logger/<name>`, or `logger` for an empty name.
    pub fn logger_provider(&self, scope: &Scope, name: &str) -> Result<SdkLoggerProvider> {
        self.provider::<Logs>(scope, name)
    }

    /// The provider of signal `S` named `name`, built on first request.
    ///
    /// Building resolves the provider's exporters (instantiating those not yet
    /// cached), lets its processors contribute options in list order, attaches
    /// the exporters without batching when no processor claimed them, and
    /// caches the result. A failure leaves this provider unbuilt and does not
    /// affect others; exporters instantiated along the way stay cached.
    pub fn provider<S: Signal>(&self, scope: &Scope, name: &str) -> Result<S::Provider> {
        let id = Identifier::from_static_type(S::PROVIDER_TYPE).with_name(name);
        let mut state = self.state.lock()?;

        if let Some(entry) = state.providers.get(&id) {
            return S::from_any(&entry.provider)
                .ok_or_else(|| Error::Internal(format!("provider {id:?} has another signal")));
        }

        let provider_config = self
            .config
            .providers
            .get(&id)
            .ok_or_else(|| Error::ProviderNotFound(id.clone()))?;

        let mut exporters = Vec::with_capacity(provider_config.exporters.len());
        for exporter_id in &provider_config.exporters {
            let exporter = state.resolve_exporter(&self.config, scope, exporter_id)?;
            let handle =
                S::exporter_of(exporter.as_ref()).ok_or_else(|| Error::ExporterUnsupported {
                    id: exporter_id.clone(),
                    signal: S::KIND,
                })?;
            exporters.push((exporter_id.clone(), handle));
        }

        let mut pipeline = Pipeline::<S>::new(id.clone(), exporters);
        for processor_id in &provider_config.processors {
            let processor = self
                .config
                .processors
                .get(processor_id)
                .ok_or_else(|| Error::ProcessorNotFound(processor_id.clone()))?;
            S::contribute(processor.as_ref(), &mut pipeline).map_err(|source| {
                Error::Processor {
                    id: processor_id.clone(),
                    source,
                }
            })?;
        }

        if !pipeline.exporters_claimed() && !pipeline.exporters().is_empty() {
            otel_debug!(
                name: "Resolver.SimpleWiring",
                provider = id.to_string(),
                exporters = pipeline.exporters().len()
            );
        }

        let provider = pipeline.build();
        otel_debug!(name: "Resolver.ProviderBuilt", provider = id.to_string());
        state.providers.insert(
            id,
            ProviderEntry {
                provider: S::into_any(provider.clone()),
                shut_down: false,
            },
        );
        Ok(provider)
    }

    /// The cached instance of exporter `id`, if some provider resolved it.
    pub fn exporter(&self, id: &Identifier) -> Result<Option<Arc<dyn Exporter>>> {
        let state = self.state.lock()?;
        Ok(state
            .exporters
            .get(id)
            .map(|entry| Arc::clone(&entry.exporter)))
    }

    /// Runs the pending start function of every exporter resolved so far.
    ///
    /// Each start function runs at most once over the resolver's life. When
    /// one fails, or the scope ends before it runs, every exporter started by
    /// this call is shut down again and the failure is returned together with
    /// any errors from that rollback. Start functions not reached stay pending.
    pub fn start(&self, scope: &Scope) -> Result<()> {
        let mut state = self.state.lock()?;
        let mut started: Vec<Identifier> = Vec::new();
        let mut failure = None;

        for (id, entry) in state.exporters.iter_mut() {
            if entry.start.is_none() {
                continue;
            }
            if let Err(err) = scope.check() {
                failure = Some(err);
                break;
            }
            let Some(start) = entry.start.take() else {
                continue;
            };
            match start(scope) {
                Ok(()) => {
                    otel_debug!(name: "Resolver.ExporterStarted", id = id.to_string());
                    started.push(id.clone());
                }
                Err(source) => {
                    otel_warn!(
                        name: "Resolver.StartFailed",
                        id = id.to_string(),
                        error = source.to_string()
                    );
                    failure = Some(Error::Start {
                        id: id.clone(),
                        source,
                    });
                    break;
                }
            }
        }

        let Some(failure) = failure else {
            return Ok(());
        };

        let timeout = scope.shutdown_timeout();
        let mut rollback = Errors::new();
        for id in started {
            let Some(entry) = state.exporters.get_mut(&id) else {
                continue;
            };
            entry.shut_down = true;
            otel_debug!(name: "Resolver.RollingBack", id = id.to_string());
            if let Err(source) = entry.exporter.shutdown(timeout) {
                rollback.push(Error::Shutdown { id, source });
            }
        }

        match rollback.into_error() {
            None => Err(failure),
            Some(err) => Err(Error::Joined(
                vec![failure, err.tagged("rollback")].into(),
            )),
        }
    }

    /// Shuts down every provider built so far, then every exporter resolved
    /// so far.
    ///
    /// Each component is shut down at most once over the resolver's life, and
    /// one failure never keeps the others from being attempted. Exporters get
    /// the scope's remaining time as their timeout. Components reached after
    /// the scope ended are left running and reported with
    /// [`Error::Canceled`] or [`Error::DeadlineExceeded`] under their
    /// identifier. All failures are returned joined.
    pub fn shutdown(&self, scope: &Scope) -> Result<()> {
        let mut state = self.state.lock()?;
        let mut errors = Errors::new();

        for (id, entry) in state.providers.iter_mut() {
            if entry.shut_down {
                continue;
            }
            if let Err(err) = scope.check() {
                errors.push(shutdown_error(id, err));
                continue;
            }
            entry.shut_down = true;
            match entry.provider.shutdown() {
                Ok(()) | Err(OTelSdkError::AlreadyShutdown) => {
                    otel_debug!(name: "Resolver.ProviderShutdown", id = id.to_string());
                }
                Err(err) => errors.push(shutdown_error(id, err)),
            }
        }

        for (id, entry) in state.exporters.iter_mut() {
            if entry.shut_down {
                continue;
            }
            if let Err(err) = scope.check() {
                errors.push(shutdown_error(id, err));
                continue;
            }
            entry.shut_down = true;
            match entry.exporter.shutdown(scope.shutdown_timeout()) {
                Ok(()) => {
                    otel_debug!(name: "Resolver.ExporterShutdown", id = id.to_string());
                }
                Err(source) => errors.push(Error::Shutdown {
                    id: id.clone(),
                    source,
                }),
            }
        }

        if !errors.is_empty() {
            otel_warn!(name: "Resolver.ShutdownFailed", errors = errors.len());
        }
        errors.into_result()
    }
}

fn shutdown_error<E>(id: &Identifier, err: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::Shutdown {
        id: id.clone(),
        source: Box::new(err),
    }
}

impl State {
    fn resolve_exporter(
        &mut self,
        config: &Config,
        scope: &Scope,
        id: &Identifier,
    ) -> Result<Arc<dyn Exporter>> {
        if let Some(entry) = self.exporters.get(id) {
            return Ok(Arc::clone(&entry.exporter));
        }

        let exporter_config = config
            .exporters
            .get(id)
            .ok_or_else(|| Error::ExporterNotFound(id.clone()))?;
        scope.check()?;

        let built = exporter_config
            .build(scope)
            .map_err(|source| Error::Construction {
                id: id.clone(),
                source,
            })?;
        otel_debug!(
            name: "Resolver.ExporterResolved",
            id = id.to_string(),
            deferred_start = built.start.is_some()
        );

        let exporter = Arc::clone(&built.exporter);
        self.exporters.insert(
            id.clone(),
            ExporterEntry {
                exporter: built.exporter,
                start: built.start,
                shut_down: false,
            },
        );
        Ok(exporter)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Resolver");
        debug.field("config", &self.config);
        if let Ok(state) = self.state.try_lock() {
            debug
                .field("exporters", &state.exporters.keys().collect::<Vec<_>>())
                .field("providers", &state.providers.keys().collect::<Vec<_>>());
        }
        debug.finish_non_exhaustive()
    }
}
