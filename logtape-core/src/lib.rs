//! # logtape-core
//!
//! Record routing and rendering engine for structured, hierarchical
//! logging.
//!
//! ## Overview
//!
//! Loggers form a tree keyed by category path. Each node carries ordered
//! sinks, ordered filters, a severity threshold, and a parent-sink
//! policy; records route from the emitting node through threshold and
//! filter gating, then fan out to the sinks collected from the root down.
//! The engine reports its own failures (misrouted sinks, misconfiguration)
//! through a reserved meta logger at category `logtape.meta`.
//!
//! ## Usage
//!
//! ```ignore
//! use logtape_core::{configure, get_logger, Config, Level, LoggerConfig};
//! use serde_json::Map;
//!
//! configure(
//!     Config::builder()
//!         .sink("console", my_sink)
//!         .logger(
//!             LoggerConfig::new(["my-app"])
//!                 .with_sinks(["console"])
//!                 .with_lowest_level(Level::Info),
//!         )
//!         .build(),
//! )
//! .await?;
//!
//! let logger = get_logger(["my-app", "sql"]);
//! let mut props = Map::new();
//! props.insert("dur".to_string(), 1200.into());
//! logger.info(logtape_core::Message::fmt("slow query {dur}ms", props));
//! ```
//!
//! ## Modules
//!
//! - [`level`] - Severity levels and thresholds
//! - [`category`] - Hierarchical logger identifiers
//! - [`record`] - The immutable record type with deferred construction
//! - [`template`] - The named-placeholder template parser
//! - [`filter`] - Record predicates
//! - [`sink`] - The sink contract and composition utilities
//! - [`logger`] - The logger tree, dispatch, and emit pipeline
//! - [`context`] - Ambient context scopes
//! - [`config`] - The atomic configuration lifecycle

pub mod category;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod level;
pub mod logger;
pub mod message;
pub mod record;
pub mod sink;
pub mod template;

pub use category::Category;
pub use config::{
    configure, configure_sync, is_configured, reset, reset_sync, Config, ConfigBuilder,
    LoggerConfig,
};
pub use context::{with_category_prefix, with_context};
pub use error::{Error, Result};
pub use filter::{level_filter, to_filter, Filter, FilterSpec};
pub use level::{Level, LevelThreshold};
pub use logger::{get_logger, root_logger, Logger, ParentSinkPolicy};
pub use message::Message;
pub use record::{LogRecord, MessagePart, Properties, RawMessage};
pub use sink::{
    console_sink, default_console_sink, from_async_sink, with_filter, AsyncSink, BufferedSink,
    DisposalMode, Sink, SinkError,
};
pub use template::parse_template;
