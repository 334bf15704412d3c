//! Ambient Context Storage
//!
//! Provides the injectable storage slot used to propagate scoped logging
//! context (extra record properties and a category prefix) across the
//! dynamic extent of a callback.

use std::cell::RefCell;
use std::fmt;

use serde_json::{Map, Value};

/// Properties carried by an ambient context frame.
pub type FrameProperties = Map<String, Value>;

/// A snapshot of ambient logging context.
///
/// Frames are immutable once installed; nested scopes compose by copying
/// the parent frame and layering their additions on top.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextFrame {
    /// Properties merged into every record emitted inside the scope.
    pub properties: FrameProperties,
    /// Segments prepended to every record's category inside the scope.
    pub category_prefix: Vec<String>,
}

impl ContextFrame {
    /// Creates a frame carrying only properties.
    pub fn with_properties(properties: FrameProperties) -> Self {
        Self {
            properties,
            category_prefix: Vec::new(),
        }
    }

    /// Creates a frame carrying only a category prefix.
    pub fn with_category_prefix(category_prefix: Vec<String>) -> Self {
        Self {
            properties: FrameProperties::new(),
            category_prefix,
        }
    }

    /// Returns a child frame with `extra` layered over this frame's
    /// properties. Keys in `extra` win on conflict.
    pub fn extended_with(&self, extra: FrameProperties) -> Self {
        let mut properties = self.properties.clone();
        for (key, value) in extra {
            properties.insert(key, value);
        }
        Self {
            properties,
            category_prefix: self.category_prefix.clone(),
        }
    }

    /// Returns a child frame with `prefix` appended to this frame's
    /// category prefix.
    pub fn prefixed_with(&self, prefix: Vec<String>) -> Self {
        let mut category_prefix = self.category_prefix.clone();
        category_prefix.extend(prefix);
        Self {
            properties: self.properties.clone(),
            category_prefix,
        }
    }
}

/// Storage slot for ambient logging context.
///
/// Modeled on task-local storage: `run` installs a frame for the duration
/// of a callback, `frame` reads the frame installed for the current
/// logical task, if any.
///
/// The engine treats this as an opaque host capability. Hosts running on
/// an async runtime typically adapt their runtime's task-local mechanism;
/// synchronous hosts and tests can use [`ThreadLocalContextStorage`].
///
/// # Example
///
/// ```
/// use logtape_bridge::{ContextFrame, ContextLocalStorage, ThreadLocalContextStorage};
///
/// let storage = ThreadLocalContextStorage::default();
/// let mut observed = None;
/// storage.run(ContextFrame::default(), &mut || {
///     observed = storage.frame();
/// });
/// assert_eq!(observed, Some(ContextFrame::default()));
/// assert_eq!(storage.frame(), None);
/// ```
pub trait ContextLocalStorage: Send + Sync {
    /// Runs `callback` with `frame` installed as the ambient context.
    ///
    /// The previous frame (if any) must be restored when the callback
    /// returns, including on panic where the host can manage it.
    fn run(&self, frame: ContextFrame, callback: &mut dyn FnMut());

    /// Returns the ambient frame for the current logical task.
    fn frame(&self) -> Option<ContextFrame>;
}

thread_local! {
    static FRAME_STACK: RefCell<Vec<ContextFrame>> = const { RefCell::new(Vec::new()) };
}

/// Thread-local [`ContextLocalStorage`] implementation.
///
/// Keeps a per-thread stack of frames. Suitable for synchronous hosts and
/// tests; async hosts that migrate tasks between threads should supply a
/// task-local adapter instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLocalContextStorage;

impl ContextLocalStorage for ThreadLocalContextStorage {
    fn run(&self, frame: ContextFrame, callback: &mut dyn FnMut()) {
        FRAME_STACK.with(|stack| stack.borrow_mut().push(frame));
        let guard = PopGuard;
        callback();
        drop(guard);
    }

    fn frame(&self) -> Option<ContextFrame> {
        FRAME_STACK.with(|stack| stack.borrow().last().cloned())
    }
}

/// Pops the top frame even when the callback unwinds.
struct PopGuard;

impl Drop for PopGuard {
    fn drop(&mut self) {
        FRAME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl fmt::Display for ContextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContextFrame({} properties, prefix {:?})",
            self.properties.len(),
            self.category_prefix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(pairs: &[(&str, Value)]) -> FrameProperties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_run_installs_and_removes_frame() {
        let storage = ThreadLocalContextStorage;
        assert_eq!(storage.frame(), None);

        let frame = ContextFrame::with_properties(props(&[("request", json!("r1"))]));
        let mut seen = None;
        storage.run(frame.clone(), &mut || {
            seen = storage.frame();
        });

        assert_eq!(seen, Some(frame));
        assert_eq!(storage.frame(), None);
    }

    #[test]
    fn test_nested_frames_shadow_and_restore() {
        let storage = ThreadLocalContextStorage;
        let outer = ContextFrame::with_properties(props(&[("a", json!(1))]));
        let inner = outer.extended_with(props(&[("b", json!(2))]));

        storage.run(outer.clone(), &mut || {
            storage.run(inner.clone(), &mut || {
                assert_eq!(storage.frame(), Some(inner.clone()));
            });
            assert_eq!(storage.frame(), Some(outer.clone()));
        });
    }

    #[test]
    fn test_extended_with_overrides_parent_keys() {
        let parent = ContextFrame::with_properties(props(&[("a", json!(1)), ("b", json!(2))]));
        let child = parent.extended_with(props(&[("b", json!(3)), ("c", json!(4))]));

        assert_eq!(child.properties.get("a"), Some(&json!(1)));
        assert_eq!(child.properties.get("b"), Some(&json!(3)));
        assert_eq!(child.properties.get("c"), Some(&json!(4)));
    }

    #[test]
    fn test_prefixed_with_concatenates() {
        let parent = ContextFrame::with_category_prefix(vec!["svc".into()]);
        let child = parent.prefixed_with(vec!["worker".into()]);
        assert_eq!(child.category_prefix, vec!["svc", "worker"]);
    }
}
