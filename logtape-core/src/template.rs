//! Message Template Parser
//!
//! Compiles a named-placeholder template plus a properties map into the
//! alternating literal/value message sequence carried by records.
//!
//! ## Grammar
//!
//! - `{{` and `}}` escape to literal `{` and `}`.
//! - `{key}` substitutes the property named `key`; unknown keys render as
//!   the absent marker (`null`), never an error.
//! - Keys tolerate surrounding ASCII whitespace: when the exact key is
//!   absent the trimmed key is consulted.
//! - `{*}` is a wildcard: the `*` property if present, otherwise the whole
//!   properties map.
//! - Keys may be nested paths: dot access (`user.name`), numeric index
//!   (`users[0]`), quoted bracket (`user["full-name"]` with JS-style
//!   escapes), and optional chaining (`user?.profile?.email`). The
//!   segments `__proto__`, `prototype` and `constructor` are blocked.
//! - An opening `{` with no closing `}` is literal text.
//!
//! Parsing is total: any input produces a message sequence.

use serde_json::Value;

use crate::record::{MessagePart, Properties};

/// Segments that nested-path resolution refuses to follow.
const BLOCKED_SEGMENTS: [&str; 3] = ["__proto__", "prototype", "constructor"];

/// Parses `template` against `properties` into an alternating message
/// sequence: `[lit, value, lit, …, lit]`, always odd in length.
pub fn parse_template(template: &str, properties: &Properties) -> Vec<MessagePart> {
    let chars: Vec<char> = template.chars().collect();
    let mut parts: Vec<MessagePart> = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '{' => {
                if let Some(close) = chars[i + 1..].iter().position(|&c| c == '}') {
                    let close = i + 1 + close;
                    let key: String = chars[i + 1..close].iter().collect();
                    parts.push(MessagePart::Text(std::mem::take(&mut literal)));
                    parts.push(MessagePart::Value(resolve_key(&key, properties)));
                    i = close + 1;
                } else {
                    // Unterminated placeholder: the brace is literal text.
                    literal.push('{');
                    i += 1;
                }
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    parts.push(MessagePart::Text(literal));
    parts
}

/// Interleaves literal fragments with interpolated values, preserving the
/// alternation invariant. Surplus fragments are folded into the trailing
/// literal; missing fragments become empty literals.
pub(crate) fn render_template(fragments: &[String], values: &[Value]) -> Vec<MessagePart> {
    let mut parts = Vec::with_capacity(values.len() * 2 + 1);
    for (index, value) in values.iter().enumerate() {
        parts.push(MessagePart::Text(
            fragments.get(index).cloned().unwrap_or_default(),
        ));
        parts.push(MessagePart::Value(value.clone()));
    }
    let tail = if fragments.len() > values.len() {
        fragments[values.len()..].join("")
    } else {
        String::new()
    };
    parts.push(MessagePart::Text(tail));
    parts
}

fn resolve_key(key: &str, properties: &Properties) -> Value {
    if key.trim() == "*" {
        return match properties.get("*") {
            Some(value) => value.clone(),
            None => Value::Object(properties.clone()),
        };
    }
    if let Some(value) = properties.get(key) {
        return value.clone();
    }
    let trimmed = key.trim();
    if let Some(value) = properties.get(trimmed) {
        return value.clone();
    }
    resolve_path(trimmed, properties).unwrap_or(Value::Null)
}

enum Accessor {
    Key(String),
    Index(usize),
}

/// Resolves a nested path against the properties map. Returns `None` for
/// absent values and for malformed paths alike; resolution never fails.
fn resolve_path(path: &str, properties: &Properties) -> Option<Value> {
    let accessors = parse_path(path)?;
    let mut iter = accessors.into_iter();

    let mut current: &Value = match iter.next()? {
        Accessor::Key(key) => {
            if BLOCKED_SEGMENTS.contains(&key.as_str()) {
                return None;
            }
            properties.get(&key)?
        }
        Accessor::Index(_) => return None,
    };

    for accessor in iter {
        current = match accessor {
            Accessor::Key(key) => {
                if BLOCKED_SEGMENTS.contains(&key.as_str()) {
                    return None;
                }
                match current {
                    Value::Object(map) => map.get(&key)?,
                    Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                    _ => return None,
                }
            }
            Accessor::Index(index) => match current {
                Value::Array(items) => items.get(index)?,
                Value::Object(map) => map.get(&index.to_string())?,
                _ => return None,
            },
        };
    }

    Some(current.clone())
}

fn parse_path(path: &str) -> Option<Vec<Accessor>> {
    let chars: Vec<char> = path.chars().collect();
    if chars.is_empty() || matches!(chars[0], '.' | '?' | '[') {
        return None;
    }

    let mut accessors = Vec::new();
    let mut i = 0;
    accessors.push(Accessor::Key(read_identifier(&chars, &mut i)?));

    while i < chars.len() {
        match chars[i] {
            '?' => {
                // Optional chaining: resolution already treats every miss
                // as absent, so `?.` only affects the accepted syntax.
                if chars.get(i + 1) != Some(&'.') {
                    return None;
                }
                i += 2;
                if chars.get(i) == Some(&'[') {
                    accessors.push(read_bracket(&chars, &mut i)?);
                } else {
                    accessors.push(Accessor::Key(read_identifier(&chars, &mut i)?));
                }
            }
            '.' => {
                i += 1;
                accessors.push(Accessor::Key(read_identifier(&chars, &mut i)?));
            }
            '[' => {
                accessors.push(read_bracket(&chars, &mut i)?);
            }
            _ => return None,
        }
    }

    Some(accessors)
}

fn read_identifier(chars: &[char], i: &mut usize) -> Option<String> {
    let start = *i;
    while *i < chars.len() && !matches!(chars[*i], '.' | '[' | '?') {
        *i += 1;
    }
    if *i == start {
        return None;
    }
    Some(chars[start..*i].iter().collect())
}

/// Reads a `[…]` accessor starting at the opening bracket. Numeric
/// contents index arrays; quoted contents are object keys with JS-style
/// escape sequences.
fn read_bracket(chars: &[char], i: &mut usize) -> Option<Accessor> {
    *i += 1;
    match *chars.get(*i)? {
        quote @ ('"' | '\'') => {
            *i += 1;
            let key = read_quoted(chars, i, quote)?;
            if chars.get(*i) != Some(&']') {
                return None;
            }
            *i += 1;
            Some(Accessor::Key(key))
        }
        _ => {
            let start = *i;
            while *i < chars.len() && chars[*i] != ']' {
                *i += 1;
            }
            if *i >= chars.len() {
                return None;
            }
            let content: String = chars[start..*i].iter().collect();
            *i += 1;
            let content = content.trim();
            if content.is_empty() || !content.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            Some(Accessor::Index(content.parse().ok()?))
        }
    }
}

fn read_quoted(chars: &[char], i: &mut usize, quote: char) -> Option<String> {
    let mut out = String::new();
    loop {
        let c = *chars.get(*i)?;
        if c == quote {
            *i += 1;
            return Some(out);
        }
        if c == '\\' {
            *i += 1;
            let escape = *chars.get(*i)?;
            match escape {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{0008}'),
                'f' => out.push('\u{000C}'),
                'v' => out.push('\u{000B}'),
                '0' => out.push('\0'),
                '\\' => out.push('\\'),
                '"' => out.push('"'),
                '\'' => out.push('\''),
                'u' => {
                    let digits = chars.get(*i + 1..*i + 5)?;
                    let hex: String = digits.iter().collect();
                    let code = u32::from_str_radix(&hex, 16).ok()?;
                    out.push(char::from_u32(code)?);
                    *i += 4;
                }
                other => out.push(other),
            }
            *i += 1;
        } else {
            out.push(c);
            *i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MessagePart as Part;
    use serde_json::json;

    fn props(pairs: &[(&str, Value)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_plain_text_is_single_literal() {
        let parts = parse_template("nothing to interpolate", &props(&[("x", json!(1))]));
        assert_eq!(parts, vec![Part::text("nothing to interpolate")]);
    }

    #[test]
    fn test_simple_substitution() {
        let parts = parse_template("Hello, {name}!", &props(&[("name", json!("Ada"))]));
        assert_eq!(
            parts,
            vec![Part::text("Hello, "), Part::value("Ada"), Part::text("!")]
        );
    }

    #[test]
    fn test_adjacent_placeholders_keep_parity() {
        let parts = parse_template("{a}{b}", &props(&[("a", json!(1)), ("b", json!(2))]));
        assert_eq!(
            parts,
            vec![
                Part::text(""),
                Part::value(1),
                Part::text(""),
                Part::value(2),
                Part::text(""),
            ]
        );
    }

    #[test]
    fn test_unknown_key_renders_absent_marker() {
        let parts = parse_template("{missing}", &props(&[]));
        assert_eq!(
            parts,
            vec![Part::text(""), Part::Value(Value::Null), Part::text("")]
        );
    }

    #[test]
    fn test_brace_escapes() {
        let parts = parse_template("{{literal}} {n}", &props(&[("n", json!(5))]));
        assert_eq!(
            parts,
            vec![Part::text("{literal} "), Part::value(5), Part::text("")]
        );
    }

    #[test]
    fn test_unterminated_brace_is_literal() {
        let parts = parse_template("open { brace", &props(&[]));
        assert_eq!(parts, vec![Part::text("open { brace")]);
    }

    #[test]
    fn test_lone_closing_brace_is_literal() {
        let parts = parse_template("close } brace", &props(&[]));
        assert_eq!(parts, vec![Part::text("close } brace")]);
    }

    #[test]
    fn test_whitespace_falls_back_to_trimmed_key() {
        let parts = parse_template("{ user }", &props(&[("user", json!("u1"))]));
        assert_eq!(
            parts,
            vec![Part::text(""), Part::value("u1"), Part::text("")]
        );
    }

    #[test]
    fn test_exact_key_with_whitespace_wins_over_trimmed() {
        let parts = parse_template(
            "{ user }",
            &props(&[(" user ", json!("exact")), ("user", json!("trimmed"))]),
        );
        assert_eq!(parts[1], Part::value("exact"));
    }

    #[test]
    fn test_wildcard_substitutes_whole_map() {
        let map = props(&[("a", json!(1))]);
        let parts = parse_template("{*}", &map);
        assert_eq!(parts[1], Part::Value(Value::Object(map)));
    }

    #[test]
    fn test_wildcard_prefers_star_key() {
        let parts = parse_template("{*}", &props(&[("*", json!("star"))]));
        assert_eq!(parts[1], Part::value("star"));
    }

    #[test]
    fn test_dot_path() {
        let parts = parse_template(
            "{user.name} logged in from {ip}",
            &props(&[("user", json!({"name": "Ada"})), ("ip", json!("10.0.0.1"))]),
        );
        assert_eq!(
            parts,
            vec![
                Part::text(""),
                Part::value("Ada"),
                Part::text(" logged in from "),
                Part::value("10.0.0.1"),
                Part::text(""),
            ]
        );
    }

    #[test]
    fn test_exact_dotted_key_wins_over_path() {
        let parts = parse_template(
            "{user.name}",
            &props(&[
                ("user.name", json!("flat")),
                ("user", json!({"name": "nested"})),
            ]),
        );
        assert_eq!(parts[1], Part::value("flat"));
    }

    #[test]
    fn test_array_index_path() {
        let parts = parse_template("{users[1]}", &props(&[("users", json!(["a", "b"]))]));
        assert_eq!(parts[1], Part::value("b"));
    }

    #[test]
    fn test_out_of_bounds_index_is_absent() {
        let parts = parse_template("{users[9]}", &props(&[("users", json!(["a"]))]));
        assert_eq!(parts[1], Part::Value(Value::Null));
    }

    #[test]
    fn test_quoted_bracket_key() {
        let parts = parse_template(
            "{user[\"full-name\"]}",
            &props(&[("user", json!({"full-name": "Ada Lovelace"}))]),
        );
        assert_eq!(parts[1], Part::value("Ada Lovelace"));
    }

    #[test]
    fn test_single_quoted_bracket_key() {
        let parts = parse_template(
            "{user['first name']}",
            &props(&[("user", json!({"first name": "Ada"}))]),
        );
        assert_eq!(parts[1], Part::value("Ada"));
    }

    #[test]
    fn test_quoted_key_escape_sequences() {
        let parts = parse_template(
            "{m[\"a\\nb\"]}",
            &props(&[("m", json!({"a\nb": "escaped"}))]),
        );
        assert_eq!(parts[1], Part::value("escaped"));
    }

    #[test]
    fn test_quoted_key_unicode_escape() {
        let parts = parse_template(
            "{m[\"\\u0041\"]}",
            &props(&[("m", json!({"A": "unicode"}))]),
        );
        assert_eq!(parts[1], Part::value("unicode"));
    }

    #[test]
    fn test_malformed_unicode_escape_is_absent() {
        let parts = parse_template("{m[\"\\u00\"]}", &props(&[("m", json!({"x": 1}))]));
        assert_eq!(parts[1], Part::Value(Value::Null));
    }

    #[test]
    fn test_optional_chaining() {
        let properties = props(&[("user", json!({"profile": {"email": "a@b.c"}}))]);
        let parts = parse_template("{user?.profile?.email}", &properties);
        assert_eq!(parts[1], Part::value("a@b.c"));

        let parts = parse_template("{user?.missing?.email}", &properties);
        assert_eq!(parts[1], Part::Value(Value::Null));
    }

    #[test]
    fn test_prototype_access_is_blocked() {
        let properties = props(&[("a", json!({"__proto__": "leak", "ok": 1}))]);
        assert_eq!(
            parse_template("{a.__proto__}", &properties)[1],
            Part::Value(Value::Null)
        );
        assert_eq!(
            parse_template("{a.constructor}", &properties)[1],
            Part::Value(Value::Null)
        );
        assert_eq!(
            parse_template("{a.prototype}", &properties)[1],
            Part::Value(Value::Null)
        );
        assert_eq!(parse_template("{a.ok}", &properties)[1], Part::value(1));
    }

    #[test]
    fn test_malformed_paths_are_absent_not_errors() {
        let properties = props(&[("a", json!({"b": 1}))]);
        for template in [
            "{a..b}",
            "{a.b[}",
            "{a.b[unclosed}",
            "{a.b[\"unterminated]}",
            "{a.[0]}",
            "{.a}",
            "{a?b}",
            "{[0]}",
        ] {
            let parts = parse_template(template, &properties);
            assert_eq!(parts.len(), 3, "template {template:?}");
            assert_eq!(parts[1], Part::Value(Value::Null), "template {template:?}");
        }
    }

    #[test]
    fn test_parse_is_total_on_arbitrary_input() {
        for template in ["", "{", "}", "{{", "}}", "{}", "{ }", "a{b", "a}b{", "{a{b}c}"] {
            let parts = parse_template(template, &props(&[]));
            assert_eq!(parts.len() % 2, 1, "template {template:?}");
        }
    }

    #[test]
    fn test_index_on_object_with_numeric_key() {
        let parts = parse_template("{m[0]}", &props(&[("m", json!({"0": "zero"}))]));
        assert_eq!(parts[1], Part::value("zero"));
    }

    #[test]
    fn test_render_template_interleaves() {
        let parts = render_template(
            &["took ".to_string(), "ms".to_string()],
            &[json!(42)],
        );
        assert_eq!(
            parts,
            vec![Part::text("took "), Part::value(42), Part::text("ms")]
        );
    }

    #[test]
    fn test_render_template_pads_missing_fragments() {
        let parts = render_template(&[], &[json!(1), json!(2)]);
        assert_eq!(
            parts,
            vec![
                Part::text(""),
                Part::value(1),
                Part::text(""),
                Part::value(2),
                Part::text(""),
            ]
        );
    }
}
