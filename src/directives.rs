//! Built-in directive handlers.
//!
//! A directive handler runs before the module pass and may rewrite the
//! element's data; modules then serialize whatever the handler left behind.

use std::collections::HashMap;
use std::sync::Arc;

use crate::utils::is_truthy;
use crate::vnode::{DirectiveBinding, ElementNode};

pub type DirectiveFn = Arc<dyn Fn(&mut ElementNode, &DirectiveBinding) + Send + Sync>;

pub fn default_directives() -> HashMap<String, DirectiveFn> {
    let mut directives: HashMap<String, DirectiveFn> = HashMap::new();
    directives.insert("show".into(), Arc::new(show));
    directives
}

/// `show`: a falsy value hides the element with `display:none`.
pub fn show(node: &mut ElementNode, binding: &DirectiveBinding) {
    if !is_truthy(&binding.value) {
        node.data.style.insert("display".into(), "none".into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn show_false_hides() {
        let mut el = ElementNode::new("div").style("color", "red");
        show(&mut el, &DirectiveBinding::new("show", json!(false)));
        assert_eq!(el.data.style.get("display").map(String::as_str), Some("none"));
        assert_eq!(el.data.style.len(), 2);
    }

    #[test]
    fn show_true_leaves_style_alone() {
        let mut el = ElementNode::new("div");
        show(&mut el, &DirectiveBinding::new("show", json!(true)));
        assert!(el.data.style.is_empty());
    }

    #[test]
    fn registry_contains_show() {
        assert!(default_directives().contains_key("show"));
    }
}
