//! Per-provider assembly state handed to processors.

use std::fmt;

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;

use crate::identifier::Identifier;
use crate::signal::{Logs, Metrics, ProviderOption, Signal, Traces};

/// Collects the options that build one provider.
///
/// The resolver fills in the provider's exporters, then lets each referenced
/// processor contribute options in order. A processor that wires exporters
/// into the provider takes them with [`claim_exporters`](Pipeline::claim_exporters);
/// when no processor does, the resolver attaches them without batching.
///
/// Resources contributed through [`merge_resource`](Pipeline::merge_resource)
/// are merged in contribution order and set on the provider once, after all
/// other options.
pub struct Pipeline<S: Signal> {
    provider: Identifier,
    exporters: Vec<(Identifier, S::Exporter)>,
    options: Vec<ProviderOption<S::Builder>>,
    resource: Option<Resource>,
    claimed: bool,
}

/// Pipeline of a tracer provider.
pub type TracesPipeline = Pipeline<Traces>;
/// Pipeline of a meter provider.
pub type MetricsPipeline = Pipeline<Metrics>;
/// Pipeline of a logger provider.
pub type LogsPipeline = Pipeline<Logs>;

impl<S: Signal> Pipeline<S> {
    pub(crate) fn new(provider: Identifier, exporters: Vec<(Identifier, S::Exporter)>) -> Self {
        Pipeline {
            provider,
            exporters,
            options: Vec::new(),
            resource: None,
            claimed: false,
        }
    }

    /// The provider being assembled.
    pub fn provider(&self) -> &Identifier {
        &self.provider
    }

    /// The provider's exporters, in declaration order.
    pub fn exporters(&self) -> &[(Identifier, S::Exporter)] {
        &self.exporters
    }

    /// Returns the exporters and records that a processor wired them.
    pub fn claim_exporters(&mut self) -> Vec<S::Exporter> {
        self.claimed = true;
        self.exporters
            .iter()
            .map(|(_, exporter)| exporter.clone())
            .collect()
    }

    /// Whether any processor claimed the exporters.
    pub fn exporters_claimed(&self) -> bool {
        self.claimed
    }

    /// Appends a builder option.
    pub fn push<F>(&mut self, option: F)
    where
        F: FnOnce(S::Builder) -> S::Builder + 'static,
    {
        self.options.push(Box::new(option));
    }

    /// Merges `update` into the provider's resource; on a shared key the
    /// value from `update` wins.
    pub fn merge_resource(&mut self, update: Resource) {
        let merged = match self.resource.take() {
            None => update,
            Some(base) => Resource::builder_empty()
                .with_attributes(attributes_of(&base))
                .with_attributes(attributes_of(&update))
                .build(),
        };
        self.resource = Some(merged);
    }

    /// The resource merged so far.
    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    /// Number of options contributed so far.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Whether no option was contributed.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    // Attaches unclaimed exporters directly, then folds every option over a
    // fresh builder.
    pub(crate) fn build(mut self) -> S::Provider {
        if !self.claimed {
            for exporter in self.claim_exporters() {
                self.options
                    .push(Box::new(move |builder| S::with_simple_exporter(builder, exporter)));
            }
        }
        if let Some(resource) = self.resource.take() {
            self.options
                .push(Box::new(move |builder| S::with_resource(builder, resource)));
        }
        let builder = self
            .options
            .into_iter()
            .fold(S::builder(), |builder, option| option(builder));
        S::build(builder)
    }
}

fn attributes_of(resource: &Resource) -> Vec<KeyValue> {
    resource
        .iter()
        .map(|(key, value)| KeyValue::new(key.clone(), value.clone()))
        .collect()
}

impl<S: Signal> fmt::Debug for Pipeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("signal", &S::KIND)
            .field("provider", &self.provider)
            .field(
                "exporters",
                &self.exporters.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            )
            .field("options", &self.options.len())
            .field("resource", &self.resource)
            .field("claimed", &self.claimed)
            .finish()
    }
}
