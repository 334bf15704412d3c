//! Ambient Context
//!
//! Scoped record enrichment: [`with_context`] merges extra properties into
//! every record emitted during a callback, and [`with_category_prefix`]
//! prepends segments to every record's category. Both ride on the
//! host-supplied [`ContextLocalStorage`](logtape_bridge::ContextLocalStorage)
//! installed by configuration; nested scopes compose by copying the parent
//! frame.
//!
//! Ambient properties sit at the bottom of the precedence order: bound
//! properties of a context view override them, and per-call properties
//! override both.

use std::sync::Arc;

use logtape_bridge::{ContextFrame, ContextLocalStorage};

use crate::category::Category;
use crate::logger::{get_logger, root_context_storage};
use crate::record::Properties;

/// Runs `callback` with `extra` merged into the ambient context.
///
/// Every record emitted inside the callback gains the ambient keys, with
/// per-call properties winning on conflicts. Without a configured
/// ambient-context provider the callback still runs, and a warning is
/// emitted to the meta logger.
///
/// # Example
///
/// ```no_run
/// use logtape_core::{context::with_context, get_logger};
/// use serde_json::Map;
///
/// let mut extra = Map::new();
/// extra.insert("request_id".to_string(), "r-17".into());
/// with_context(extra, || {
///     get_logger(["my-app"]).info("handling request");
/// });
/// ```
pub fn with_context<R>(extra: Properties, callback: impl FnOnce() -> R) -> R {
    match root_context_storage() {
        Some(storage) => {
            let frame = parent_frame(&storage).extended_with(extra);
            run_scoped(&storage, frame, callback)
        }
        None => {
            warn_no_storage();
            callback()
        }
    }
}

/// Runs `callback` with `prefix` prepended to the ambient category
/// prefix. Every record emitted inside the callback carries the prefixed
/// category.
pub fn with_category_prefix<R>(prefix: impl Into<Category>, callback: impl FnOnce() -> R) -> R {
    match root_context_storage() {
        Some(storage) => {
            let segments = prefix.into().segments().to_vec();
            let frame = parent_frame(&storage).prefixed_with(segments);
            run_scoped(&storage, frame, callback)
        }
        None => {
            warn_no_storage();
            callback()
        }
    }
}

fn parent_frame(storage: &Arc<dyn ContextLocalStorage>) -> ContextFrame {
    storage.frame().unwrap_or_default()
}

/// Bridges the object-safe `FnMut` callback shape back to `FnOnce -> R`.
fn run_scoped<R>(
    storage: &Arc<dyn ContextLocalStorage>,
    frame: ContextFrame,
    callback: impl FnOnce() -> R,
) -> R {
    let mut callback = Some(callback);
    let mut result = None;
    storage.run(frame, &mut || {
        if let Some(callback) = callback.take() {
            result = Some(callback());
        }
    });
    match result {
        Some(result) => result,
        // The provider never invoked the callback; run it directly so the
        // caller's code still executes.
        None => match callback.take() {
            Some(callback) => callback(),
            None => unreachable!("scoped callback consumed without producing a result"),
        },
    }
}

fn warn_no_storage() {
    get_logger(Category::meta()).warning(
        "Ambient context was requested, but no context-local storage is configured. \
         Set context_local_storage in the configuration to enable it.",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::root;
    use logtape_bridge::ThreadLocalContextStorage;
    use serde_json::json;

    fn props(pairs: &[(&str, serde_json::Value)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_with_context_without_storage_still_runs() {
        // No storage installed by default.
        let ran = with_context(Properties::new(), || 41 + 1);
        assert_eq!(ran, 42);
    }

    #[test]
    fn test_run_scoped_returns_callback_result() {
        let storage: Arc<dyn ContextLocalStorage> = Arc::new(ThreadLocalContextStorage);
        let result = run_scoped(&storage, ContextFrame::default(), || "done");
        assert_eq!(result, "done");
    }

    #[test]
    fn test_nested_frames_compose_by_copying() {
        let storage: Arc<dyn ContextLocalStorage> = Arc::new(ThreadLocalContextStorage);
        // Install on the shared root only for the duration of this test's
        // scoped runs; the frame stack itself is thread-local.
        root().set_context_storage(Some(Arc::clone(&storage)));

        let mut seen = None;
        with_context(props(&[("a", json!(1))]), || {
            with_context(props(&[("b", json!(2))]), || {
                seen = storage.frame();
            });
        });

        root().set_context_storage(None);

        let frame = seen.unwrap();
        assert_eq!(frame.properties.get("a"), Some(&json!(1)));
        assert_eq!(frame.properties.get("b"), Some(&json!(2)));
    }
}
