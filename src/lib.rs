//! Workspace facade crate.
//!
//! This crate re-exports the public API of the individual workspace
//! crates so host applications can depend on `logtape` alone: the engine
//! from `logtape-core` and the host capability traits from
//! `logtape-bridge`.

pub use logtape_core::{
    category, config, context, error, filter, level, logger, message, record, sink, template,
};

pub use logtape_core::{
    configure, configure_sync, console_sink, default_console_sink, from_async_sink, get_logger,
    is_configured, level_filter, parse_template, reset, reset_sync, root_logger, to_filter,
    with_category_prefix, with_context, with_filter, AsyncSink, BufferedSink, Category, Config,
    ConfigBuilder, DisposalMode, Error, Filter, FilterSpec, Level, LevelThreshold, LogRecord,
    Logger, LoggerConfig, Message, MessagePart, ParentSinkPolicy, Properties, RawMessage, Result,
    Sink, SinkError,
};

/// Host capability traits and their default in-process implementations.
pub mod bridge {
    pub use logtape_bridge::{
        Console, ContextFrame, ContextLocalStorage, ExitHooks, ManualExitHooks, StderrConsole,
        ThreadLocalContextStorage,
    };
}
