//! Shutdown Hook Capability
//!
//! Lets the engine register callbacks that release sink resources when the
//! host shuts down. How "shutdown" is detected is a host concern: a
//! service manager signal, a GUI unload event, or an explicit call at the
//! end of `main`.

use std::fmt;
use std::sync::Mutex;

/// A registered shutdown callback.
pub type ExitHook = Box<dyn FnOnce() + Send>;

/// Registrar for shutdown callbacks.
///
/// Implementations must run each registered hook at most once.
pub trait ExitHooks: Send + Sync {
    /// Registers a callback to run at host shutdown.
    fn register(&self, hook: ExitHook);
}

/// [`ExitHooks`] implementation that collects hooks for the host to run
/// explicitly.
///
/// Suitable for hosts without a process-exit mechanism of their own and
/// for tests: call [`ManualExitHooks::run`] at the point your application
/// considers shutdown.
#[derive(Default)]
pub struct ManualExitHooks {
    hooks: Mutex<Vec<ExitHook>>,
}

impl ManualExitHooks {
    /// Creates an empty registrar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs and discards every registered hook, in registration order.
    pub fn run(&self) {
        let hooks = std::mem::take(&mut *self.hooks.lock().unwrap());
        for hook in hooks {
            hook();
        }
    }

    /// Number of hooks currently registered.
    pub fn len(&self) -> usize {
        self.hooks.lock().unwrap().len()
    }

    /// Whether no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExitHooks for ManualExitHooks {
    fn register(&self, hook: ExitHook) {
        self.hooks.lock().unwrap().push(hook);
    }
}

impl fmt::Debug for ManualExitHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualExitHooks")
            .field("hooks", &self.len())
            .finish()
    }
}
