//! Logger Tree and Dispatch
//!
//! The hierarchical logger registry and the emit pipeline.
//!
//! ## Overview
//!
//! One node exists per category path, created lazily by
//! [`get_logger`] and living for the process lifetime; configuration pins
//! the nodes it touches and resetting restores node state without removing
//! nodes. [`Logger`] is a cheap cloneable handle onto a node, optionally
//! carrying bound properties (a context view).
//!
//! ## Emit pipeline
//!
//! 1. Prepend the ambient category prefix, if any.
//! 2. Drop the record when the node's lowest level rejects it.
//! 3. Run the node's own filters; every filter must accept. A node with
//!    no filters of its own delegates to its parent's chain; an empty
//!    chain at the root accepts.
//! 4. Fan out to sinks collected root-down. A node with the `Override`
//!    parent-sink policy stops the upward walk; an ancestor whose lowest
//!    level rejects the record contributes no sinks.
//! 5. A sink failure is diverted to the meta logger (category
//!    `logtape.meta`) as a fatal record, with the failing sink added to a
//!    bypass set so a misrouted meta logger cannot recurse forever.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, Weak};

use serde_json::{json, Value};

use logtape_bridge::ContextLocalStorage;

use crate::category::Category;
use crate::filter::Filter;
use crate::level::{Level, LevelThreshold};
use crate::message::Message;
use crate::record::{merge_properties, LogRecord, Properties, RawMessage};
use crate::sink::{Sink, SinkError};
use crate::template::{parse_template, render_template};

/// Whether a node's emit walks its ancestors' sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentSinkPolicy {
    /// Ancestor sinks receive the record too.
    #[default]
    Inherit,
    /// Only this node's own sinks receive the record.
    Override,
}

/// A sink with the label used in failure diagnostics.
#[derive(Clone)]
pub(crate) struct NamedSink {
    pub(crate) label: Arc<str>,
    pub(crate) sink: Arc<dyn Sink>,
}

impl NamedSink {
    pub(crate) fn new(label: impl Into<Arc<str>>, sink: Arc<dyn Sink>) -> Self {
        NamedSink {
            label: label.into(),
            sink,
        }
    }
}

/// Sinks excluded from fan-out while recovering from their own failures.
/// Identity is by pointer, so the same sink registered under two ids is
/// still bypassed.
#[derive(Clone, Default)]
pub(crate) struct BypassSinks(Vec<Arc<dyn Sink>>);

impl BypassSinks {
    fn contains(&self, sink: &Arc<dyn Sink>) -> bool {
        self.0.iter().any(|known| Arc::ptr_eq(known, sink))
    }

    fn with(&self, sink: Arc<dyn Sink>) -> Self {
        let mut sinks = self.0.clone();
        sinks.push(sink);
        BypassSinks(sinks)
    }
}

/// One node of the logger tree.
pub(crate) struct LoggerNode {
    category: Category,
    parent: Weak<LoggerNode>,
    children: RwLock<HashMap<String, Arc<LoggerNode>>>,
    sinks: RwLock<Vec<NamedSink>>,
    filters: RwLock<Vec<Arc<dyn Filter>>>,
    parent_sinks: RwLock<ParentSinkPolicy>,
    lowest_level: RwLock<LevelThreshold>,
    /// Ambient-context provider; installed on the root node only.
    context_storage: RwLock<Option<Arc<dyn ContextLocalStorage>>>,
}

static ROOT: OnceLock<Arc<LoggerNode>> = OnceLock::new();

/// The process-wide root node.
pub(crate) fn root() -> Arc<LoggerNode> {
    ROOT.get_or_init(|| Arc::new(LoggerNode::new(Category::root(), Weak::new())))
        .clone()
}

/// The node at `category`, creating missing nodes along the path.
pub(crate) fn node_for(category: &Category) -> Arc<LoggerNode> {
    let mut node = root();
    for segment in category.segments() {
        node = LoggerNode::child_of(&node, segment);
    }
    node
}

/// The ambient-context provider installed on the root, if any.
pub(crate) fn root_context_storage() -> Option<Arc<dyn ContextLocalStorage>> {
    root().context_storage.read().unwrap().clone()
}

impl LoggerNode {
    fn new(category: Category, parent: Weak<LoggerNode>) -> Self {
        LoggerNode {
            category,
            parent,
            children: RwLock::new(HashMap::new()),
            sinks: RwLock::new(Vec::new()),
            filters: RwLock::new(Vec::new()),
            parent_sinks: RwLock::new(ParentSinkPolicy::default()),
            lowest_level: RwLock::new(LevelThreshold::default()),
            context_storage: RwLock::new(None),
        }
    }

    pub(crate) fn category(&self) -> &Category {
        &self.category
    }

    fn child_of(parent: &Arc<LoggerNode>, segment: &str) -> Arc<LoggerNode> {
        if let Some(child) = parent.children.read().unwrap().get(segment) {
            return Arc::clone(child);
        }
        let mut children = parent.children.write().unwrap();
        Arc::clone(children.entry(segment.to_string()).or_insert_with(|| {
            Arc::new(LoggerNode::new(
                parent.category.child(segment),
                Arc::downgrade(parent),
            ))
        }))
    }

    /// Restores this node to its default state.
    pub(crate) fn reset(&self) {
        self.sinks.write().unwrap().clear();
        self.filters.write().unwrap().clear();
        *self.parent_sinks.write().unwrap() = ParentSinkPolicy::default();
        *self.lowest_level.write().unwrap() = LevelThreshold::default();
    }

    /// Restores this node and every descendant to default state. Nodes
    /// stay in the tree; only their routing state is cleared.
    pub(crate) fn reset_descendants(&self) {
        self.reset();
        for child in self.children.read().unwrap().values() {
            child.reset_descendants();
        }
    }

    pub(crate) fn add_sink(&self, sink: NamedSink) {
        self.sinks.write().unwrap().push(sink);
    }

    pub(crate) fn add_filter(&self, filter: Arc<dyn Filter>) {
        self.filters.write().unwrap().push(filter);
    }

    pub(crate) fn set_parent_sinks(&self, policy: ParentSinkPolicy) {
        *self.parent_sinks.write().unwrap() = policy;
    }

    pub(crate) fn set_lowest_level(&self, threshold: LevelThreshold) {
        *self.lowest_level.write().unwrap() = threshold;
    }

    pub(crate) fn lowest_level(&self) -> LevelThreshold {
        *self.lowest_level.read().unwrap()
    }

    pub(crate) fn set_context_storage(&self, storage: Option<Arc<dyn ContextLocalStorage>>) {
        *self.context_storage.write().unwrap() = storage;
    }

    /// Routes one record through threshold, filters, and sink fan-out.
    pub(crate) fn emit(&self, record: &LogRecord, bypass: &BypassSinks) {
        if !self.lowest_level().accepts(record.level()) {
            return;
        }
        if !self.filter_chain_accepts(record) {
            return;
        }

        let mut sinks = Vec::new();
        self.visible_sinks(record.level(), &mut sinks);
        for named in &sinks {
            if bypass.contains(&named.sink) {
                continue;
            }
            if let Err(error) = named.sink.emit(record) {
                report_sink_failure(named, error, record, bypass);
            }
        }
    }

    /// Every own filter must accept; a node with no filters of its own
    /// inherits its parent's gating.
    fn filter_chain_accepts(&self, record: &LogRecord) -> bool {
        let filters = self.filters.read().unwrap();
        if filters.is_empty() {
            drop(filters);
            match self.parent.upgrade() {
                Some(parent) => parent.filter_chain_accepts(record),
                None => true,
            }
        } else {
            filters.iter().all(|filter| filter.accepts(record))
        }
    }

    /// Collects sinks root-down. The upward walk stops at a node with the
    /// `Override` policy; a node whose threshold rejects `level`
    /// contributes no sinks but the walk continues past it.
    fn visible_sinks(&self, level: Level, out: &mut Vec<NamedSink>) {
        if *self.parent_sinks.read().unwrap() == ParentSinkPolicy::Inherit {
            if let Some(parent) = self.parent.upgrade() {
                parent.visible_sinks(level, out);
            }
        }
        if self.lowest_level().accepts(level) {
            out.extend(self.sinks.read().unwrap().iter().cloned());
        }
    }
}

/// Emits the sink-failure diagnostic to the meta logger, excluding the
/// failing sink so a meta logger routed through it cannot recurse.
fn report_sink_failure(
    named: &NamedSink,
    error: SinkError,
    record: &LogRecord,
    bypass: &BypassSinks,
) {
    let bypass = bypass.with(Arc::clone(&named.sink));
    let mut properties = Properties::new();
    properties.insert("sink".to_string(), Value::String(named.label.to_string()));
    properties.insert("error".to_string(), Value::String(error.to_string()));
    properties.insert(
        "record".to_string(),
        serde_json::to_value(record).unwrap_or(Value::Null),
    );

    let template = "Failed to emit a log record to sink {sink}: {error}";
    let meta_record = LogRecord::eager(
        Category::meta(),
        Level::Fatal,
        parse_template(template, &properties),
        RawMessage::Template(template.to_string()),
        properties,
    );
    node_for(&Category::meta()).emit(&meta_record, &bypass);
}

/// Returns the logger for `category`, creating it on first use.
///
/// Loggers are identified by category: two calls with the same category
/// observe the same underlying node.
///
/// # Example
///
/// ```
/// use logtape_core::get_logger;
///
/// let logger = get_logger(["my-app", "sql"]);
/// logger.debug("query planned");
/// ```
pub fn get_logger(category: impl Into<Category>) -> Logger {
    Logger {
        node: node_for(&category.into()),
        bound: Properties::new(),
        lazy_bound: Vec::new(),
    }
}

/// The root logger.
pub fn root_logger() -> Logger {
    Logger {
        node: root(),
        bound: Properties::new(),
        lazy_bound: Vec::new(),
    }
}

#[derive(Clone)]
struct LazyBinding {
    key: String,
    thunk: Arc<dyn Fn() -> Value + Send + Sync>,
}

/// Handle onto a logger node, optionally carrying bound properties.
///
/// Handles are cheap to clone. [`Logger::with`] produces a context view:
/// a handle whose bound properties are merged behind every call's own
/// properties (the call wins on key conflicts).
#[derive(Clone)]
pub struct Logger {
    node: Arc<LoggerNode>,
    bound: Properties,
    lazy_bound: Vec<LazyBinding>,
}

impl Logger {
    /// Category of this logger.
    pub fn category(&self) -> &Category {
        self.node.category()
    }

    /// The parent logger, keeping this handle's bound properties. `None`
    /// at the root.
    pub fn parent(&self) -> Option<Logger> {
        self.node.parent.upgrade().map(|node| Logger {
            node,
            bound: self.bound.clone(),
            lazy_bound: self.lazy_bound.clone(),
        })
    }

    /// A descendant logger. `sub` may be a single segment or a deeper
    /// path; bound properties carry over to the child handle.
    pub fn child(&self, sub: impl Into<Category>) -> Logger {
        let mut node = Arc::clone(&self.node);
        for segment in sub.into().segments() {
            node = LoggerNode::child_of(&node, segment);
        }
        Logger {
            node,
            bound: self.bound.clone(),
            lazy_bound: self.lazy_bound.clone(),
        }
    }

    /// A view of this logger with `properties` bound. Bound properties
    /// are merged behind per-call properties; later `with` calls win over
    /// earlier ones.
    pub fn with(&self, properties: Properties) -> Logger {
        Logger {
            node: Arc::clone(&self.node),
            bound: merge_properties(self.bound.clone(), properties),
            lazy_bound: self.lazy_bound.clone(),
        }
    }

    /// A view of this logger with a bound property computed at record
    /// construction time.
    pub fn with_lazy(
        &self,
        key: impl Into<String>,
        thunk: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Logger {
        let mut lazy_bound = self.lazy_bound.clone();
        lazy_bound.push(LazyBinding {
            key: key.into(),
            thunk: Arc::new(thunk),
        });
        Logger {
            node: Arc::clone(&self.node),
            bound: self.bound.clone(),
            lazy_bound,
        }
    }

    /// Whether two handles refer to the same logger node.
    pub fn same_as(&self, other: &Logger) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// This logger's severity threshold.
    pub fn lowest_level(&self) -> LevelThreshold {
        self.node.lowest_level()
    }

    /// Emits at an explicit severity.
    pub fn log(&self, level: Level, message: impl Into<Message>) {
        self.dispatch(level, message.into());
    }

    /// Emits at `trace` severity.
    pub fn trace(&self, message: impl Into<Message>) {
        self.dispatch(Level::Trace, message.into());
    }

    /// Emits at `debug` severity.
    pub fn debug(&self, message: impl Into<Message>) {
        self.dispatch(Level::Debug, message.into());
    }

    /// Emits at `info` severity.
    pub fn info(&self, message: impl Into<Message>) {
        self.dispatch(Level::Info, message.into());
    }

    /// Emits at `warning` severity.
    pub fn warning(&self, message: impl Into<Message>) {
        self.dispatch(Level::Warning, message.into());
    }

    /// Emits at `error` severity.
    pub fn error(&self, message: impl Into<Message>) {
        self.dispatch(Level::Error, message.into());
    }

    /// Emits at `fatal` severity.
    pub fn fatal(&self, message: impl Into<Message>) {
        self.dispatch(Level::Fatal, message.into());
    }

    /// Emits `error` at `warning` severity, rendering its message.
    pub fn warning_err(&self, error: &(dyn std::error::Error + 'static)) {
        self.log_error(Level::Warning, error, Properties::new());
    }

    /// Like [`Logger::warning_err`], with extra properties merged in.
    pub fn warning_err_with(
        &self,
        error: &(dyn std::error::Error + 'static),
        properties: Properties,
    ) {
        self.log_error(Level::Warning, error, properties);
    }

    /// Emits at `warning` severity with a custom template; the error is
    /// available to the template as `{error}`.
    pub fn warning_err_fmt(&self, template: &str, error: &(dyn std::error::Error + 'static)) {
        self.log_error_fmt(Level::Warning, template, error);
    }

    /// Emits `error` at `error` severity, rendering its message.
    pub fn error_err(&self, error: &(dyn std::error::Error + 'static)) {
        self.log_error(Level::Error, error, Properties::new());
    }

    /// Like [`Logger::error_err`], with extra properties merged in.
    pub fn error_err_with(
        &self,
        error: &(dyn std::error::Error + 'static),
        properties: Properties,
    ) {
        self.log_error(Level::Error, error, properties);
    }

    /// Emits at `error` severity with a custom template; the error is
    /// available to the template as `{error}`.
    pub fn error_err_fmt(&self, template: &str, error: &(dyn std::error::Error + 'static)) {
        self.log_error_fmt(Level::Error, template, error);
    }

    /// Emits `error` at `fatal` severity, rendering its message.
    pub fn fatal_err(&self, error: &(dyn std::error::Error + 'static)) {
        self.log_error(Level::Fatal, error, Properties::new());
    }

    /// Like [`Logger::fatal_err`], with extra properties merged in.
    pub fn fatal_err_with(
        &self,
        error: &(dyn std::error::Error + 'static),
        properties: Properties,
    ) {
        self.log_error(Level::Fatal, error, properties);
    }

    /// Emits at `fatal` severity with a custom template; the error is
    /// available to the template as `{error}`.
    pub fn fatal_err_fmt(&self, template: &str, error: &(dyn std::error::Error + 'static)) {
        self.log_error_fmt(Level::Fatal, template, error);
    }

    fn log_error(
        &self,
        level: Level,
        error: &(dyn std::error::Error + 'static),
        extra: Properties,
    ) {
        let mut properties = Properties::new();
        properties.insert("error".to_string(), error_value(error));
        let properties = merge_properties(properties, extra);
        self.dispatch(level, Message::fmt("{error.message}", properties));
    }

    fn log_error_fmt(
        &self,
        level: Level,
        template: &str,
        error: &(dyn std::error::Error + 'static),
    ) {
        let mut properties = Properties::new();
        properties.insert("error".to_string(), error_value(error));
        self.dispatch(level, Message::fmt(template, properties));
    }

    /// Ambient, bound, and lazily-bound properties in precedence order
    /// (later layers win).
    fn base_properties(&self, ambient: Properties) -> Properties {
        let mut base = merge_properties(ambient, self.bound.clone());
        for binding in &self.lazy_bound {
            base.insert(binding.key.clone(), (binding.thunk)());
        }
        base
    }

    fn dispatch(&self, level: Level, message: Message) {
        let frame = root_context_storage().and_then(|storage| storage.frame());
        let (ambient, prefix) = match frame {
            Some(frame) => (frame.properties, frame.category_prefix),
            None => (Properties::new(), Vec::new()),
        };
        let category = self.node.category().prefixed_with(&prefix);
        let base = self.base_properties(ambient);

        let record = match message {
            Message::Template { fragments, values } => LogRecord::eager(
                category,
                level,
                render_template(&fragments, &values),
                RawMessage::Fragments(fragments),
                base,
            ),
            Message::Format {
                template,
                properties,
            } => {
                let merged = merge_properties(base, properties);
                LogRecord::eager(
                    category,
                    level,
                    parse_template(&template, &merged),
                    RawMessage::Template(template),
                    merged,
                )
            }
            Message::LazyFormat { template, thunk } => {
                LogRecord::deferred_format(category, level, template, base, thunk)
            }
            Message::LazyTemplate { thunk } => {
                LogRecord::deferred_template(category, level, base, thunk)
            }
            Message::Properties(properties) => {
                let merged = merge_properties(base, properties);
                LogRecord::eager(
                    category,
                    level,
                    parse_template("{*}", &merged),
                    RawMessage::Template("{*}".to_string()),
                    merged,
                )
            }
        };

        self.node.emit(&record, &BypassSinks::default());
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("category", self.category())
            .field("bound", &self.bound)
            .field("lazy_bound", &self.lazy_bound.len())
            .finish()
    }
}

fn error_value(error: &(dyn std::error::Error + 'static)) -> Value {
    json!({ "message": error.to_string() })
}
