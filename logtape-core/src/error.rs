use thiserror::Error;

use crate::category::Category;

/// Errors raised by the configuration lifecycle and by severity parsing.
///
/// Logging calls themselves never raise: misbehaving sinks are diverted to
/// the meta logger instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "Logging is already configured. Set reset: true in the new configuration \
         to replace the existing one"
    )]
    AlreadyConfigured,

    #[error("Duplicate logger configuration for category {0}")]
    DuplicateLogger(Category),

    #[error("Sink not found: {0}")]
    SinkNotFound(String),

    #[error("Filter not found: {0}")]
    FilterNotFound(String),

    #[error(
        "{kind} {id} requires asynchronous disposal; use configure() instead of configure_sync()"
    )]
    AsyncDisposalRequired { kind: &'static str, id: String },

    #[error("Invalid severity level: {0}")]
    InvalidLevel(String),
}

pub type Result<T> = std::result::Result<T, Error>;
