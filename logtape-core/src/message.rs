//! Message Construction
//!
//! The single tagged union behind every logging entry point. Each logging
//! method accepts `impl Into<Message>`, so the construction mode is chosen
//! by the constructor (or conversion) used at the call site:
//!
//! - [`Message::template`] — pre-split literal fragments interleaved with
//!   values, no parsing.
//! - [`Message::fmt`] — a named-placeholder template rendered against an
//!   eager properties map (also what `"plain text"` converts into).
//! - [`Message::fmt_with`] — a template whose properties are computed by a
//!   callback only if the record survives threshold and filter gating.
//! - [`Message::lazy`] — fragments and values computed by a callback under
//!   the same deferral rule.
//! - [`Message::properties`] — properties only, rendered through the `{*}`
//!   wildcard (also what a bare properties map converts into).

use serde_json::Value;

use crate::record::{Properties, PropertiesThunk, TemplateThunk};

/// One log call's payload, before record construction.
pub enum Message {
    /// Literal fragments interleaved with interpolated values.
    Template {
        fragments: Vec<String>,
        values: Vec<Value>,
    },
    /// Named-placeholder template with eager properties.
    Format {
        template: String,
        properties: Properties,
    },
    /// Named-placeholder template with properties computed on demand.
    LazyFormat {
        template: String,
        thunk: PropertiesThunk,
    },
    /// Fragments and values computed on demand.
    LazyTemplate { thunk: TemplateThunk },
    /// Properties only; rendered through the `{*}` wildcard.
    Properties(Properties),
}

impl Message {
    /// Interleaves `fragments` with `values`. The rendered message keeps
    /// the fragments as its raw message.
    pub fn template<F, V>(fragments: F, values: V) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<Value>,
    {
        Message::Template {
            fragments: fragments.into_iter().map(Into::into).collect(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// A template rendered against an eager properties map.
    pub fn fmt(template: impl Into<String>, properties: Properties) -> Self {
        Message::Format {
            template: template.into(),
            properties,
        }
    }

    /// A template whose properties come from `thunk`, invoked at most once
    /// and only if the record is not dropped by threshold or filter.
    pub fn fmt_with(
        template: impl Into<String>,
        thunk: impl Fn() -> Properties + Send + Sync + 'static,
    ) -> Self {
        Message::LazyFormat {
            template: template.into(),
            thunk: Box::new(thunk),
        }
    }

    /// Fragments and values from `thunk`, invoked at most once and only if
    /// the record is not dropped by threshold or filter.
    pub fn lazy(
        thunk: impl Fn() -> (Vec<String>, Vec<Value>) + Send + Sync + 'static,
    ) -> Self {
        Message::LazyTemplate {
            thunk: Box::new(thunk),
        }
    }

    /// Properties only; equivalent to `Message::fmt("{*}", properties)`.
    pub fn properties(properties: Properties) -> Self {
        Message::Properties(properties)
    }
}

impl From<&str> for Message {
    fn from(template: &str) -> Self {
        Message::fmt(template, Properties::new())
    }
}

impl From<String> for Message {
    fn from(template: String) -> Self {
        Message::fmt(template, Properties::new())
    }
}

impl From<Properties> for Message {
    fn from(properties: Properties) -> Self {
        Message::Properties(properties)
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Template { fragments, values } => f
                .debug_struct("Message::Template")
                .field("fragments", fragments)
                .field("values", values)
                .finish(),
            Message::Format {
                template,
                properties,
            } => f
                .debug_struct("Message::Format")
                .field("template", template)
                .field("properties", properties)
                .finish(),
            Message::LazyFormat { template, .. } => f
                .debug_struct("Message::LazyFormat")
                .field("template", template)
                .finish_non_exhaustive(),
            Message::LazyTemplate { .. } => {
                f.debug_struct("Message::LazyTemplate").finish_non_exhaustive()
            }
            Message::Properties(properties) => {
                f.debug_tuple("Message::Properties").field(properties).finish()
            }
        }
    }
}
