//! Utility functions for the renderer.
//!
//! - HTML text and attribute escaping
//! - Tag and attribute classification tables
//! - Cache key construction

use serde_json::Value;

// ---------------------------------------------------------------------------
// HTML Escaping
// ---------------------------------------------------------------------------

/// Escape text for safe embedding in element content or a quoted attribute.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tag / Attribute Tables
// ---------------------------------------------------------------------------

const UNARY_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "frame", "hr", "img", "input", "isindex", "keygen",
    "link", "meta", "param", "source", "track", "wbr",
];

const BOOLEAN_ATTRS: &[&str] = &[
    "allowfullscreen",
    "async",
    "autofocus",
    "autoplay",
    "checked",
    "compact",
    "controls",
    "declare",
    "default",
    "defaultchecked",
    "defaultmuted",
    "defaultselected",
    "defer",
    "disabled",
    "enabled",
    "formnovalidate",
    "hidden",
    "indeterminate",
    "inert",
    "ismap",
    "itemscope",
    "loop",
    "multiple",
    "muted",
    "nohref",
    "noresize",
    "noshade",
    "novalidate",
    "nowrap",
    "open",
    "pauseonexit",
    "readonly",
    "required",
    "reversed",
    "scoped",
    "seamless",
    "selected",
    "sortable",
    "translate",
    "truespeed",
    "typemustmatch",
    "visible",
];

const ENUMERATED_ATTRS: &[&str] = &["contenteditable", "draggable", "spellcheck"];

/// HTML void elements: no children, no end tag.
pub fn is_unary_tag(tag: &str) -> bool {
    UNARY_TAGS.contains(&tag)
}

pub fn is_boolean_attr(name: &str) -> bool {
    BOOLEAN_ATTRS.contains(&name)
}

pub fn is_enumerated_attr(name: &str) -> bool {
    ENUMERATED_ATTRS.contains(&name)
}

/// `null` and `false` suppress an attribute.
pub fn is_falsy_attr_value(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Bool(false))
}

/// Loose truthiness used by directive values.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a JSON value as attribute or text content.
/// Strings are taken as-is rather than JSON-quoted.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Cache Keys
// ---------------------------------------------------------------------------

/// `name::key`: the component name scopes the per-state key.
pub fn cache_key(name: &str, key: &str) -> String {
    format!("{name}::{key}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
