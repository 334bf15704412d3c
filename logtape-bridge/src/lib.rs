//! # Host Capability Traits
//!
//! Environment abstraction traits implemented by the host embedding the
//! logging engine.
//!
//! ## Overview
//!
//! This crate defines the contract between `logtape-core` and the
//! environment it runs in. Each trait represents a capability the engine
//! needs but that differs per host: where ambient context lives (task-local
//! storage, thread-local storage, a test harness), where fallback console
//! output goes, and how shutdown hooks are registered.
//!
//! The engine never detects its platform; the host injects capabilities
//! through the configuration API instead.
//!
//! ## Traits
//!
//! - [`ContextLocalStorage`](context::ContextLocalStorage) - Ambient
//!   context propagation for scoped properties and category prefixes
//! - [`Console`](console::Console) - Line-oriented console output used by
//!   the fallback meta-logger sink
//! - [`ExitHooks`](exit::ExitHooks) - Registration of shutdown callbacks
//!   that drain sink resources
//!
//! ## Default implementations
//!
//! Every trait ships with an in-process default so tests and simple hosts
//! work out of the box: [`ThreadLocalContextStorage`],
//! [`StderrConsole`], and [`ManualExitHooks`]. Hosts with richer
//! environments (an async runtime with task-local storage, a GUI event
//! loop, a service manager) provide their own adapters.
//!
//! ## Thread safety
//!
//! All capability traits require `Send + Sync` so they can be shared
//! behind `Arc` across threads and async tasks.

pub mod console;
pub mod context;
pub mod exit;

pub use console::{Console, StderrConsole};
pub use context::{ContextFrame, ContextLocalStorage, ThreadLocalContextStorage};
pub use exit::{ExitHooks, ManualExitHooks};
