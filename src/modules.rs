//! Built-in markup contributors.
//!
//! A module inspects an element's data and returns the attribute text it
//! contributes to the start tag, or `None`. Modules run in registration
//! order, after directives have had a chance to mutate the data.

use std::sync::Arc;

use serde_json::Value;

use crate::utils::{
    escape_html, is_boolean_attr, is_enumerated_attr, is_falsy_attr_value, is_truthy,
    value_to_text,
};
use crate::vnode::ElementNode;

pub type ModuleFn = Arc<dyn Fn(&ElementNode) -> Option<String> + Send + Sync>;

/// attrs, class, style, in that order.
pub fn default_modules() -> Vec<ModuleFn> {
    vec![
        Arc::new(render_attrs) as ModuleFn,
        Arc::new(render_class) as ModuleFn,
        Arc::new(render_style) as ModuleFn,
    ]
}

fn non_empty(markup: String) -> Option<String> {
    (!markup.is_empty()).then_some(markup)
}

// ---------------------------------------------------------------------------
// attrs
// ---------------------------------------------------------------------------

pub fn render_attrs(node: &ElementNode) -> Option<String> {
    let mut markup = String::new();
    for (key, value) in &node.data.attrs {
        if is_boolean_attr(key) {
            if !is_falsy_attr_value(value) {
                markup.push_str(&format!(r#" {key}="{key}""#));
            }
        } else if is_enumerated_attr(key) {
            let on = !is_falsy_attr_value(value) && value != &Value::String("false".into());
            markup.push_str(&format!(r#" {key}="{on}""#));
        } else if !is_falsy_attr_value(value) {
            markup.push_str(&format!(
                r#" {key}="{}""#,
                escape_html(&value_to_text(value))
            ));
        }
    }
    non_empty(markup)
}

// ---------------------------------------------------------------------------
// class
// ---------------------------------------------------------------------------

/// Flatten a class binding: strings as-is, arrays recursively, objects by
/// their truthy keys.
pub fn stringify_class(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(stringify_class)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map
            .iter()
            .filter(|(_, on)| is_truthy(on))
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

pub fn render_class(node: &ElementNode) -> Option<String> {
    let dynamic = node.data.class.as_ref().map(stringify_class);
    let classes: Vec<&str> = [node.data.static_class.as_deref(), dynamic.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
    if classes.is_empty() {
        return None;
    }
    Some(format!(r#" class="{}""#, escape_html(&classes.join(" "))))
}

// ---------------------------------------------------------------------------
// style
// ---------------------------------------------------------------------------

pub fn render_style(node: &ElementNode) -> Option<String> {
    if node.data.style.is_empty() {
        return None;
    }
    let decls: String = node
        .data
        .style
        .iter()
        .map(|(prop, value)| format!("{prop}:{value};"))
        .collect();
    Some(format!(r#" style="{}""#, escape_html(&decls)))
}
