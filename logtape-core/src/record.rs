//! Log Records
//!
//! The immutable value type flowing through the pipeline. A record carries
//! its category, severity, rendered message, the raw template it was
//! rendered from, a capture timestamp, and structured properties.
//!
//! ## Deferred construction
//!
//! When the caller supplies a properties callback (or a lazy template
//! closure), message and properties are not computed until a sink first
//! observes them. Gating by threshold or filter therefore never pays the
//! rendering cost, and the callback runs at most once even when several
//! sinks observe the same record.

use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::category::Category;
use crate::level::Level;
use crate::template::{parse_template, render_template};

/// Structured properties attached to a record.
pub type Properties = serde_json::Map<String, Value>;

/// Thunk producing properties on first access.
pub type PropertiesThunk = Box<dyn Fn() -> Properties + Send + Sync>;

/// Thunk producing template fragments and interpolated values on first
/// access.
pub type TemplateThunk = Box<dyn Fn() -> (Vec<String>, Vec<Value>) + Send + Sync>;

/// One element of a rendered message.
///
/// A rendered message alternates `Text` and `Value` parts, always starting
/// and ending with `Text` (so its length is odd). Serialization is
/// untagged: a serialized message is the plain alternating array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessagePart {
    Text(String),
    Value(Value),
}

impl MessagePart {
    /// Convenience constructor for a literal fragment.
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text(text.into())
    }

    /// Convenience constructor for an interpolated value.
    pub fn value(value: impl Into<Value>) -> Self {
        MessagePart::Value(value.into())
    }
}

/// The message a record was constructed from, preserved for structured
/// exporters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawMessage {
    /// Original named-placeholder template string.
    Template(String),
    /// Literal fragments of an interleaved (template-literal style) call.
    Fragments(Vec<String>),
}

/// An immutable log record.
#[derive(Clone)]
pub struct LogRecord {
    category: Category,
    level: Level,
    timestamp: i64,
    body: RecordBody,
}

#[derive(Clone)]
enum RecordBody {
    Eager {
        message: Vec<MessagePart>,
        raw: RawMessage,
        properties: Properties,
    },
    Deferred(Arc<DeferredBody>),
}

struct DeferredBody {
    source: DeferredSource,
    resolved: OnceLock<Resolved>,
}

enum DeferredSource {
    /// Named-placeholder template rendered against properties computed on
    /// first access. `base` holds ambient and bound properties captured at
    /// the call site; the thunk's output wins on key conflicts.
    Format {
        template: String,
        base: Properties,
        thunk: PropertiesThunk,
    },
    /// Fragments and values computed on first access.
    Template {
        properties: Properties,
        thunk: TemplateThunk,
    },
}

struct Resolved {
    message: Vec<MessagePart>,
    raw: RawMessage,
    properties: Properties,
}

impl DeferredSource {
    fn resolve(&self) -> Resolved {
        match self {
            DeferredSource::Format {
                template,
                base,
                thunk,
            } => {
                let properties = merge_properties(base.clone(), thunk());
                Resolved {
                    message: parse_template(template, &properties),
                    raw: RawMessage::Template(template.clone()),
                    properties,
                }
            }
            DeferredSource::Template { properties, thunk } => {
                let (fragments, values) = thunk();
                Resolved {
                    message: render_template(&fragments, &values),
                    raw: RawMessage::Fragments(fragments),
                    properties: properties.clone(),
                }
            }
        }
    }
}

impl LogRecord {
    /// Builds a record by parsing `template` against `properties` now.
    pub fn new(
        category: impl Into<Category>,
        level: Level,
        template: &str,
        properties: Properties,
    ) -> Self {
        let message = parse_template(template, &properties);
        Self::eager(
            category.into(),
            level,
            message,
            RawMessage::Template(template.to_string()),
            properties,
        )
    }

    pub(crate) fn eager(
        category: Category,
        level: Level,
        message: Vec<MessagePart>,
        raw: RawMessage,
        properties: Properties,
    ) -> Self {
        LogRecord {
            category,
            level,
            timestamp: Utc::now().timestamp_millis(),
            body: RecordBody::Eager {
                message,
                raw,
                properties,
            },
        }
    }

    pub(crate) fn deferred_format(
        category: Category,
        level: Level,
        template: String,
        base: Properties,
        thunk: PropertiesThunk,
    ) -> Self {
        LogRecord {
            category,
            level,
            timestamp: Utc::now().timestamp_millis(),
            body: RecordBody::Deferred(Arc::new(DeferredBody {
                source: DeferredSource::Format {
                    template,
                    base,
                    thunk,
                },
                resolved: OnceLock::new(),
            })),
        }
    }

    pub(crate) fn deferred_template(
        category: Category,
        level: Level,
        properties: Properties,
        thunk: TemplateThunk,
    ) -> Self {
        LogRecord {
            category,
            level,
            timestamp: Utc::now().timestamp_millis(),
            body: RecordBody::Deferred(Arc::new(DeferredBody {
                source: DeferredSource::Template { properties, thunk },
                resolved: OnceLock::new(),
            })),
        }
    }

    /// Category the record was emitted under, including any ambient
    /// category prefix.
    pub fn category(&self) -> &Category {
        &self.category
    }

    /// Severity of the record.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Milliseconds since the Unix epoch, captured at construction.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Rendered message: literal fragments alternating with interpolated
    /// values. Resolves a deferred body on first access.
    pub fn message(&self) -> &[MessagePart] {
        match &self.body {
            RecordBody::Eager { message, .. } => message,
            RecordBody::Deferred(deferred) => &deferred.resolve_ref().message,
        }
    }

    /// The template string or fragment list the message was built from.
    pub fn raw_message(&self) -> &RawMessage {
        match &self.body {
            RecordBody::Eager { raw, .. } => raw,
            RecordBody::Deferred(deferred) => &deferred.resolve_ref().raw,
        }
    }

    /// Structured properties. Resolves a deferred body on first access.
    pub fn properties(&self) -> &Properties {
        match &self.body {
            RecordBody::Eager { properties, .. } => properties,
            RecordBody::Deferred(deferred) => &deferred.resolve_ref().properties,
        }
    }

    /// Message rendered to plain text. Interpolated strings render
    /// verbatim; other values render as compact JSON.
    pub fn rendered(&self) -> String {
        let mut out = String::new();
        for part in self.message() {
            match part {
                MessagePart::Text(text) => out.push_str(text),
                MessagePart::Value(Value::String(text)) => out.push_str(text),
                MessagePart::Value(value) => {
                    out.push_str(&serde_json::to_string(value).unwrap_or_default())
                }
            }
        }
        out
    }
}

impl DeferredBody {
    fn resolve_ref(&self) -> &Resolved {
        self.resolved.get_or_init(|| self.source.resolve())
    }
}

/// Layers `over` on top of `base`; keys in `over` win.
pub(crate) fn merge_properties(mut base: Properties, over: Properties) -> Properties {
    for (key, value) in over {
        base.insert(key, value);
    }
    base
}

impl fmt::Debug for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("LogRecord");
        debug
            .field("category", &self.category)
            .field("level", &self.level)
            .field("timestamp", &self.timestamp);
        match &self.body {
            RecordBody::Eager {
                message,
                raw,
                properties,
            } => {
                debug
                    .field("message", message)
                    .field("raw_message", raw)
                    .field("properties", properties);
            }
            RecordBody::Deferred(deferred) => match deferred.resolved.get() {
                Some(resolved) => {
                    debug
                        .field("message", &resolved.message)
                        .field("raw_message", &resolved.raw)
                        .field("properties", &resolved.properties);
                }
                None => {
                    // Debug output must not force the thunk.
                    debug.field("message", &"<deferred>");
                }
            },
        }
        debug.finish()
    }
}

impl Serialize for LogRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("LogRecord", 6)?;
        state.serialize_field("category", &self.category)?;
        state.serialize_field("level", &self.level)?;
        state.serialize_field("message", self.message())?;
        state.serialize_field("raw_message", self.raw_message())?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("properties", self.properties())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn props(pairs: &[(&str, Value)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_eager_record_fields() {
        let record = LogRecord::new(
            ["my-app", "sql"],
            Level::Info,
            "slow query {dur}ms",
            props(&[("dur", json!(1200))]),
        );

        assert_eq!(record.category(), &Category::from(["my-app", "sql"]));
        assert_eq!(record.level(), Level::Info);
        assert_eq!(
            record.message(),
            &[
                MessagePart::text("slow query "),
                MessagePart::value(1200),
                MessagePart::text("ms"),
            ]
        );
        assert_eq!(
            record.raw_message(),
            &RawMessage::Template("slow query {dur}ms".to_string())
        );
        assert_eq!(record.properties(), &props(&[("dur", json!(1200))]));
        assert!(record.timestamp() > 0);
    }

    #[test]
    fn test_message_parity_invariant() {
        let record = LogRecord::new(
            "app",
            Level::Debug,
            "{a} and {b}",
            props(&[("a", json!(1)), ("b", json!(2))]),
        );
        let message = record.message();
        assert_eq!(message.len() % 2, 1);
        for (index, part) in message.iter().enumerate() {
            match part {
                MessagePart::Text(_) => assert_eq!(index % 2, 0),
                MessagePart::Value(_) => assert_eq!(index % 2, 1),
            }
        }
    }

    #[test]
    fn test_deferred_format_resolves_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let record = LogRecord::deferred_format(
            Category::from("app"),
            Level::Info,
            "hello {name}".to_string(),
            Properties::new(),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                props(&[("name", json!("Ada"))])
            }),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(record.rendered(), "hello Ada");
        assert_eq!(record.properties().get("name"), Some(&json!("Ada")));
        assert_eq!(record.message().len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deferred_format_clone_shares_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let record = LogRecord::deferred_format(
            Category::from("app"),
            Level::Info,
            "{n}".to_string(),
            Properties::new(),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                props(&[("n", json!(7))])
            }),
        );

        let clone = record.clone();
        assert_eq!(record.rendered(), "7");
        assert_eq!(clone.rendered(), "7");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_deferred_format_thunk_wins_over_base() {
        let record = LogRecord::deferred_format(
            Category::from("app"),
            Level::Info,
            "{who}".to_string(),
            props(&[("who", json!("ambient")), ("keep", json!(true))]),
            Box::new(|| props(&[("who", json!("call"))])),
        );

        assert_eq!(record.rendered(), "call");
        assert_eq!(record.properties().get("keep"), Some(&json!(true)));
    }

    #[test]
    fn test_deferred_template_raw_message() {
        let record = LogRecord::deferred_template(
            Category::from("app"),
            Level::Info,
            Properties::new(),
            Box::new(|| {
                (
                    vec!["took ".to_string(), "ms".to_string()],
                    vec![json!(42)],
                )
            }),
        );

        assert_eq!(
            record.raw_message(),
            &RawMessage::Fragments(vec!["took ".to_string(), "ms".to_string()])
        );
        assert_eq!(
            record.message(),
            &[
                MessagePart::text("took "),
                MessagePart::value(42),
                MessagePart::text("ms"),
            ]
        );
    }

    #[test]
    fn test_serialized_message_is_alternating_array() {
        let record = LogRecord::new(
            "app",
            Level::Warning,
            "hi {name}",
            props(&[("name", json!("Ada"))]),
        );
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["message"], json!(["hi ", "Ada", ""]));
        assert_eq!(value["raw_message"], json!("hi {name}"));
        assert_eq!(value["level"], json!("warning"));
        assert_eq!(value["category"], json!(["app"]));
    }

    #[test]
    fn test_debug_does_not_force_deferred_body() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let record = LogRecord::deferred_format(
            Category::from("app"),
            Level::Info,
            "{x}".to_string(),
            Properties::new(),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Properties::new()
            }),
        );

        let _ = format!("{record:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rendered_keeps_strings_unquoted() {
        let record = LogRecord::new(
            "app",
            Level::Info,
            "{who} sent {count} items",
            props(&[("who", json!("ada")), ("count", json!(3))]),
        );
        assert_eq!(record.rendered(), "ada sent 3 items");
    }
}
