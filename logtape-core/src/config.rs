//! Configuration Lifecycle
//!
//! Declarative wiring of the logger tree: named sinks, named filters, and
//! per-category bindings, applied atomically.
//!
//! ## Overview
//!
//! [`configure`] (async) and [`configure_sync`] install a [`Config`]. The
//! apply is build-then-swap: every sink and filter id is resolved and
//! every binding validated against a scratch plan before the live tree is
//! touched, so a validation failure leaves the previous configuration
//! fully intact. Only a valid plan drains the prior epoch's disposables,
//! resets the tree, and wires the new bindings.
//!
//! The synchronous variant refuses any sink or filter that requires
//! asynchronous disposal, whether newly supplied or still held by the
//! prior configuration.
//!
//! ## Usage
//!
//! ```ignore
//! use logtape_core::{configure, Config, LoggerConfig, Level};
//!
//! let config = Config::builder()
//!     .sink("console", my_console_sink)
//!     .filter("important", Level::Warning)
//!     .logger(
//!         LoggerConfig::new(["my-app"])
//!             .with_sinks(["console"])
//!             .with_lowest_level(Level::Info),
//!     )
//!     .build();
//! configure(config).await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use serde_json::json;

use logtape_bridge::{ContextLocalStorage, ExitHooks};

use crate::category::Category;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterSpec};
use crate::level::LevelThreshold;
use crate::logger::{get_logger, node_for, root, NamedSink, ParentSinkPolicy};
use crate::message::Message;
use crate::record::Properties;
use crate::sink::{default_console_sink, DisposalMode, Sink};

/// Declarative logging configuration.
///
/// Build with [`Config::builder`]. Sinks and filters are registered under
/// string ids that logger bindings reference; registration order is the
/// disposal order for synchronously released resources.
pub struct Config {
    /// Named sinks, in registration order.
    pub sinks: Vec<(String, Arc<dyn Sink>)>,
    /// Named filters, in registration order.
    pub filters: Vec<(String, FilterSpec)>,
    /// Per-category bindings, applied in order.
    pub loggers: Vec<LoggerConfig>,
    /// Ambient-context provider installed on the root logger.
    pub context_local_storage: Option<Arc<dyn ContextLocalStorage>>,
    /// Shutdown-hook registrar used to drain disposables at host exit.
    pub exit_hooks: Option<Arc<dyn ExitHooks>>,
    /// Allow replacing an existing configuration.
    pub reset: bool,
}

impl Config {
    /// Creates a builder for a new configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration without applying it: duplicate
    /// categories and unresolved sink or filter ids are rejected.
    pub fn validate(&self) -> Result<()> {
        Plan::build(self).map(|_| ())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "sinks",
                &self.sinks.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            )
            .field(
                "filters",
                &self.filters.iter().map(|(id, _)| id).collect::<Vec<_>>(),
            )
            .field("loggers", &self.loggers)
            .field(
                "context_local_storage",
                &self.context_local_storage.as_ref().map(|_| ".."),
            )
            .field("exit_hooks", &self.exit_hooks.as_ref().map(|_| ".."))
            .field("reset", &self.reset)
            .finish()
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    sinks: Vec<(String, Arc<dyn Sink>)>,
    filters: Vec<(String, FilterSpec)>,
    loggers: Vec<LoggerConfig>,
    context_local_storage: Option<Arc<dyn ContextLocalStorage>>,
    exit_hooks: Option<Arc<dyn ExitHooks>>,
    reset: bool,
}

impl ConfigBuilder {
    /// Registers a sink under `id`, replacing any earlier sink with the
    /// same id.
    pub fn sink(mut self, id: impl Into<String>, sink: Arc<dyn Sink>) -> Self {
        let id = id.into();
        self.sinks.retain(|(existing, _)| *existing != id);
        self.sinks.push((id, sink));
        self
    }

    /// Registers a filter (a predicate or a severity) under `id`,
    /// replacing any earlier filter with the same id.
    pub fn filter(mut self, id: impl Into<String>, filter: impl Into<FilterSpec>) -> Self {
        let id = id.into();
        self.filters.retain(|(existing, _)| *existing != id);
        self.filters.push((id, filter.into()));
        self
    }

    /// Adds a logger binding.
    pub fn logger(mut self, logger: LoggerConfig) -> Self {
        self.loggers.push(logger);
        self
    }

    /// Installs an ambient-context provider on the root logger.
    pub fn context_local_storage(mut self, storage: Arc<dyn ContextLocalStorage>) -> Self {
        self.context_local_storage = Some(storage);
        self
    }

    /// Registers disposal draining with the host's shutdown hooks.
    pub fn exit_hooks(mut self, hooks: Arc<dyn ExitHooks>) -> Self {
        self.exit_hooks = Some(hooks);
        self
    }

    /// Permits replacing an already-installed configuration.
    pub fn reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> Config {
        Config {
            sinks: self.sinks,
            filters: self.filters,
            loggers: self.loggers,
            context_local_storage: self.context_local_storage,
            exit_hooks: self.exit_hooks,
            reset: self.reset,
        }
    }
}

/// One logger binding inside a [`Config`].
#[derive(Clone)]
pub struct LoggerConfig {
    /// Category the binding applies to.
    pub category: Category,
    /// Ids of sinks attached to this logger.
    pub sinks: Vec<String>,
    /// Ids of filters attached to this logger.
    pub filters: Vec<String>,
    /// Whether ancestor sinks also receive this logger's records.
    pub parent_sinks: ParentSinkPolicy,
    /// Severity threshold; `None` keeps the default (accept all).
    pub lowest_level: Option<LevelThreshold>,
}

impl LoggerConfig {
    /// A binding for `category` with no sinks, no filters, and defaults.
    pub fn new(category: impl Into<Category>) -> Self {
        LoggerConfig {
            category: category.into(),
            sinks: Vec::new(),
            filters: Vec::new(),
            parent_sinks: ParentSinkPolicy::default(),
            lowest_level: None,
        }
    }

    /// Sets the sink ids this logger emits to.
    pub fn with_sinks<I>(mut self, sinks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.sinks = sinks.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the filter ids gating this logger.
    pub fn with_filters<I>(mut self, filters: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the parent-sink policy.
    pub fn with_parent_sinks(mut self, policy: ParentSinkPolicy) -> Self {
        self.parent_sinks = policy;
        self
    }

    /// Sets the severity threshold.
    pub fn with_lowest_level(mut self, threshold: impl Into<LevelThreshold>) -> Self {
        self.lowest_level = Some(threshold.into());
        self
    }

    /// Disables this logger entirely.
    pub fn disabled(mut self) -> Self {
        self.lowest_level = Some(LevelThreshold::Disabled);
        self
    }
}

impl std::fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("category", &self.category)
            .field("sinks", &self.sinks)
            .field("filters", &self.filters)
            .field("parent_sinks", &self.parent_sinks)
            .field("lowest_level", &self.lowest_level)
            .finish()
    }
}

// ========================
// === Scratch planning ===
// ========================

struct Plan {
    bindings: Vec<ResolvedBinding>,
    disposables: Vec<Disposable>,
    attach_meta_fallback: bool,
    sink_count: usize,
    filter_count: usize,
}

struct ResolvedBinding {
    category: Category,
    sinks: Vec<NamedSink>,
    filters: Vec<Arc<dyn Filter>>,
    parent_sinks: ParentSinkPolicy,
    lowest_level: LevelThreshold,
}

struct Disposable {
    kind: &'static str,
    id: String,
    resource: DisposableResource,
}

enum DisposableResource {
    Sink(Arc<dyn Sink>),
    Filter(Arc<dyn Filter>),
}

impl Disposable {
    fn mode(&self) -> DisposalMode {
        match &self.resource {
            DisposableResource::Sink(sink) => sink.disposal(),
            DisposableResource::Filter(filter) => filter.disposal(),
        }
    }

    fn dispose_sync(&self) {
        match &self.resource {
            DisposableResource::Sink(sink) => sink.dispose(),
            DisposableResource::Filter(filter) => filter.dispose(),
        }
    }

    async fn dispose_async(&self) {
        match &self.resource {
            DisposableResource::Sink(sink) => sink.dispose_async().await,
            DisposableResource::Filter(filter) => filter.dispose_async().await,
        }
    }
}

impl Plan {
    /// Resolves every binding against the named sinks and filters.
    /// Nothing here touches the live tree.
    fn build(config: &Config) -> Result<Plan> {
        let sinks_by_id: HashMap<&str, &Arc<dyn Sink>> = config
            .sinks
            .iter()
            .map(|(id, sink)| (id.as_str(), sink))
            .collect();
        let filters_by_id: HashMap<&str, &FilterSpec> = config
            .filters
            .iter()
            .map(|(id, filter)| (id.as_str(), filter))
            .collect();

        let mut seen_categories = HashSet::new();
        let mut bindings = Vec::with_capacity(config.loggers.len());
        for logger in &config.loggers {
            if !seen_categories.insert(logger.category.clone()) {
                return Err(Error::DuplicateLogger(logger.category.clone()));
            }

            let mut sinks = Vec::with_capacity(logger.sinks.len());
            for id in &logger.sinks {
                let sink = sinks_by_id
                    .get(id.as_str())
                    .ok_or_else(|| Error::SinkNotFound(id.clone()))?;
                sinks.push(NamedSink::new(id.as_str(), Arc::clone(sink)));
            }

            let mut filters = Vec::with_capacity(logger.filters.len());
            for id in &logger.filters {
                let spec = filters_by_id
                    .get(id.as_str())
                    .ok_or_else(|| Error::FilterNotFound(id.clone()))?;
                filters.push((*spec).clone().into_filter());
            }

            bindings.push(ResolvedBinding {
                category: logger.category.clone(),
                sinks,
                filters,
                parent_sinks: logger.parent_sinks,
                lowest_level: logger.lowest_level.unwrap_or_default(),
            });
        }

        let mut disposables = Vec::new();
        for (id, sink) in &config.sinks {
            if sink.disposal() != DisposalMode::None {
                disposables.push(Disposable {
                    kind: "Sink",
                    id: id.clone(),
                    resource: DisposableResource::Sink(Arc::clone(sink)),
                });
            }
        }
        for (id, spec) in &config.filters {
            if let FilterSpec::Filter(filter) = spec {
                if filter.disposal() != DisposalMode::None {
                    disposables.push(Disposable {
                        kind: "Filter",
                        id: id.clone(),
                        resource: DisposableResource::Filter(Arc::clone(filter)),
                    });
                }
            }
        }

        let meta_covered = config.loggers.iter().any(|logger| {
            logger.category.is_root()
                || logger.category == Category::from("logtape")
                || logger.category == Category::meta()
        });

        Ok(Plan {
            bindings,
            disposables,
            attach_meta_fallback: !meta_covered,
            sink_count: config.sinks.len(),
            filter_count: config.filters.len(),
        })
    }

    /// Rejects any resource the synchronous lifecycle cannot release.
    fn ensure_sync_disposal(&self) -> Result<()> {
        for disposable in &self.disposables {
            if disposable.mode() == DisposalMode::Async {
                return Err(Error::AsyncDisposalRequired {
                    kind: disposable.kind,
                    id: disposable.id.clone(),
                });
            }
        }
        Ok(())
    }
}

// ====================
// === Active epoch ===
// ====================

struct ActiveConfiguration {
    disposables: Vec<Disposable>,
    /// Strong references keeping configured nodes alive across the epoch.
    #[allow(dead_code)]
    pinned: Vec<Arc<crate::logger::LoggerNode>>,
}

impl ActiveConfiguration {
    fn has_async_disposables(&self) -> bool {
        self.disposables
            .iter()
            .any(|d| d.mode() == DisposalMode::Async)
    }

    fn first_async_disposable(&self) -> Option<&Disposable> {
        self.disposables
            .iter()
            .find(|d| d.mode() == DisposalMode::Async)
    }

    /// Synchronous resources release in insertion order; asynchronous
    /// ones release concurrently.
    async fn drain(self) {
        let mut pending = Vec::new();
        for disposable in &self.disposables {
            match disposable.mode() {
                DisposalMode::None => {}
                DisposalMode::Sync => disposable.dispose_sync(),
                DisposalMode::Async => pending.push(disposable),
            }
        }
        join_all(pending.iter().map(|d| d.dispose_async())).await;
    }

    fn drain_sync(self) {
        for disposable in &self.disposables {
            if disposable.mode() == DisposalMode::Sync {
                disposable.dispose_sync();
            }
        }
    }
}

static ACTIVE: Mutex<Option<ActiveConfiguration>> = Mutex::new(None);
static EXIT_HOOK_REGISTERED: AtomicBool = AtomicBool::new(false);

/// Whether a configuration is currently installed.
pub fn is_configured() -> bool {
    ACTIVE.lock().unwrap().is_some()
}

/// Installs `config`, draining the previous configuration's disposables
/// first.
///
/// Fails without touching the live tree when a configuration is already
/// installed and `reset` is not set, when two bindings name the same
/// category, or when a binding references an unknown sink or filter id.
pub async fn configure(config: Config) -> Result<()> {
    ensure_replaceable(config.reset)?;
    let plan = Plan::build(&config)?;
    let prior = take_prior(config.reset)?;
    if let Some(prior) = prior {
        prior.drain().await;
    }
    apply(plan, &config);
    Ok(())
}

/// Synchronous [`configure`]: identical semantics, but refuses sinks and
/// filters that require asynchronous disposal, and refuses to replace a
/// prior configuration still holding asynchronous disposables.
pub fn configure_sync(config: Config) -> Result<()> {
    ensure_replaceable(config.reset)?;
    let plan = Plan::build(&config)?;
    plan.ensure_sync_disposal()?;
    {
        let active = ACTIVE.lock().unwrap();
        if let Some(active) = active.as_ref() {
            if let Some(outstanding) = active.first_async_disposable() {
                return Err(Error::AsyncDisposalRequired {
                    kind: outstanding.kind,
                    id: outstanding.id.clone(),
                });
            }
        }
    }
    let prior = take_prior(config.reset)?;
    if let Some(prior) = prior {
        prior.drain_sync();
    }
    apply(plan, &config);
    Ok(())
}

/// Drains the active configuration's disposables and restores the logger
/// tree to its default state.
pub async fn reset() {
    let prior = ACTIVE.lock().unwrap().take();
    if let Some(prior) = prior {
        prior.drain().await;
    }
    clear_tree();
}

/// Synchronous [`reset`]; fails when the active configuration holds
/// asynchronous disposables.
pub fn reset_sync() -> Result<()> {
    {
        let active = ACTIVE.lock().unwrap();
        if let Some(active) = active.as_ref() {
            if let Some(outstanding) = active.first_async_disposable() {
                return Err(Error::AsyncDisposalRequired {
                    kind: outstanding.kind,
                    id: outstanding.id.clone(),
                });
            }
        }
    }
    let prior = ACTIVE.lock().unwrap().take();
    if let Some(prior) = prior {
        prior.drain_sync();
    }
    clear_tree();
    Ok(())
}

fn ensure_replaceable(reset: bool) -> Result<()> {
    if ACTIVE.lock().unwrap().is_some() && !reset {
        return Err(Error::AlreadyConfigured);
    }
    Ok(())
}

fn take_prior(reset: bool) -> Result<Option<ActiveConfiguration>> {
    let mut active = ACTIVE.lock().unwrap();
    if active.is_some() && !reset {
        return Err(Error::AlreadyConfigured);
    }
    Ok(active.take())
}

fn clear_tree() {
    let root = root();
    root.reset_descendants();
    root.set_context_storage(None);
}

fn apply(plan: Plan, config: &Config) {
    clear_tree();

    let mut pinned = Vec::with_capacity(plan.bindings.len() + 1);
    for binding in plan.bindings {
        let node = node_for(&binding.category);
        node.set_parent_sinks(binding.parent_sinks);
        node.set_lowest_level(binding.lowest_level);
        for sink in binding.sinks {
            node.add_sink(sink);
        }
        for filter in binding.filters {
            node.add_filter(filter);
        }
        pinned.push(node);
    }

    if let Some(storage) = &config.context_local_storage {
        root().set_context_storage(Some(Arc::clone(storage)));
    }

    if let Some(hooks) = &config.exit_hooks {
        register_exit_hook(hooks);
    }

    if plan.attach_meta_fallback {
        let meta = node_for(&Category::meta());
        meta.add_sink(NamedSink::new("logtape-meta-console", default_console_sink()));
        pinned.push(meta);
    }

    *ACTIVE.lock().unwrap() = Some(ActiveConfiguration {
        disposables: plan.disposables,
        pinned,
    });

    let mut properties = Properties::new();
    properties.insert("sinks".to_string(), json!(plan.sink_count));
    properties.insert("filters".to_string(), json!(plan.filter_count));
    properties.insert("loggers".to_string(), json!(config.loggers.len()));
    get_logger(Category::meta()).info(Message::fmt(
        "Logging configured with {sinks} sink(s), {filters} filter(s), and {loggers} logger(s)",
        properties,
    ));
}

/// The drain hook reads the active epoch at shutdown time, so one
/// registration covers every later configuration.
fn register_exit_hook(hooks: &Arc<dyn ExitHooks>) {
    if EXIT_HOOK_REGISTERED.swap(true, Ordering::SeqCst) {
        return;
    }
    hooks.register(Box::new(|| {
        let active = ACTIVE.lock().unwrap().take();
        if let Some(active) = active {
            // Asynchronous resources cannot be awaited during a
            // synchronous shutdown; hosts needing them drained call
            // reset() before exiting.
            active.drain_sync();
        }
    }));
}
