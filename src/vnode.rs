//! Renderable tree nodes.
//!
//! A [`VNode`] is one of four kinds: a component reference, a tagged
//! element, a comment or a text run. Elements and component references carry
//! the instance that produced them (`context`) and, when they are the root of
//! a component's rendered output, a [`ParentLink`] back to the component
//! reference that embedded them.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::component::{ComponentOptions, InstanceRef};

// ---------------------------------------------------------------------------
// VNode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum VNode {
    Component(ComponentNode),
    Element(ElementNode),
    Comment(String),
    Text { text: String, raw: bool },
}

impl VNode {
    /// Literal text, escaped on output.
    pub fn text(text: impl Into<String>) -> Self {
        VNode::Text {
            text: text.into(),
            raw: false,
        }
    }

    /// Pre-escaped markup, written verbatim.
    pub fn raw(html: impl Into<String>) -> Self {
        VNode::Text {
            text: html.into(),
            raw: true,
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        VNode::Comment(text.into())
    }

    /// Link this node to the component reference that rendered it.
    /// Only elements and component references keep the link.
    pub fn set_parent(&mut self, link: Arc<ParentLink>) {
        match self {
            VNode::Element(el) => el.parent = Some(link),
            VNode::Component(c) => c.parent = Some(link),
            VNode::Comment(_) | VNode::Text { .. } => {}
        }
    }
}

impl From<ElementNode> for VNode {
    fn from(el: ElementNode) -> Self {
        VNode::Element(el)
    }
}

impl From<ComponentNode> for VNode {
    fn from(c: ComponentNode) -> Self {
        VNode::Component(c)
    }
}

// ---------------------------------------------------------------------------
// Element data
// ---------------------------------------------------------------------------

/// A directive attached to an element, e.g. `show` with a boolean value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveBinding {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub arg: Option<String>,
}

impl DirectiveBinding {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            arg: None,
        }
    }
}

/// Attribute and module data for an element.
/// Directive handlers may mutate it before the module pass reads it.
/// `attrs` and `style` serialize in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VNodeData {
    #[serde(default)]
    pub attrs: IndexMap<String, Value>,
    #[serde(default)]
    pub static_class: Option<String>,
    /// Dynamic class binding: a string, an array of bindings, or an object
    /// mapping class names to truthy/falsy values.
    #[serde(default)]
    pub class: Option<Value>,
    #[serde(default)]
    pub style: IndexMap<String, String>,
    #[serde(default)]
    pub directives: Vec<DirectiveBinding>,
}

// ---------------------------------------------------------------------------
// ElementNode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: String,
    pub data: VNodeData,
    pub children: Vec<VNode>,
    /// Instance whose render step created this element.
    pub context: Option<InstanceRef>,
    pub parent: Option<Arc<ParentLink>>,
}

impl ElementNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            data: VNodeData::default(),
            children: Vec::new(),
            context: None,
            parent: None,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.attrs.insert(name.into(), value.into());
        self
    }

    pub fn static_class(mut self, class: impl Into<String>) -> Self {
        self.data.static_class = Some(class.into());
        self
    }

    pub fn class(mut self, class: Value) -> Self {
        self.data.class = Some(class);
        self
    }

    pub fn style(mut self, prop: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.style.insert(prop.into(), value.into());
        self
    }

    pub fn directive(mut self, binding: DirectiveBinding) -> Self {
        self.data.directives.push(binding);
        self
    }

    pub fn child(mut self, node: impl Into<VNode>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn children(mut self, nodes: impl IntoIterator<Item = VNode>) -> Self {
        self.children.extend(nodes);
        self
    }

    pub fn owned_by(mut self, instance: &InstanceRef) -> Self {
        self.context = Some(Arc::clone(instance));
        self
    }

    /// Whether `instance` is the one that rendered this element.
    pub fn is_owned_by(&self, instance: &InstanceRef) -> bool {
        self.context
            .as_ref()
            .is_some_and(|ctx| Arc::ptr_eq(ctx, instance))
    }

    /// Scope ids of the owning instance followed by those of every
    /// component reference up the parent chain, innermost first.
    pub fn scope_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        if let Some(id) = self.context.as_ref().and_then(|c| c.scope_id()) {
            ids.push(id);
        }
        let mut link = self.parent.as_deref();
        while let Some(l) = link {
            if let Some(id) = l.context.as_ref().and_then(|c| c.scope_id()) {
                ids.push(id);
            }
            link = l.parent.as_deref();
        }
        ids
    }
}

// ---------------------------------------------------------------------------
// ComponentNode
// ---------------------------------------------------------------------------

/// A reference to a component, expanded at render time.
#[derive(Debug, Clone)]
pub struct ComponentNode {
    pub options: Arc<ComponentOptions>,
    pub props: Value,
    /// Tag the component was referenced by, used in error messages.
    pub tag: Option<String>,
    pub context: Option<InstanceRef>,
    pub parent: Option<Arc<ParentLink>>,
}

impl ComponentNode {
    pub fn new(options: Arc<ComponentOptions>, props: Value) -> Self {
        Self {
            options,
            props,
            tag: None,
            context: None,
            parent: None,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn owned_by(mut self, instance: &InstanceRef) -> Self {
        self.context = Some(Arc::clone(instance));
        self
    }
}

// ---------------------------------------------------------------------------
// ParentLink
// ---------------------------------------------------------------------------

/// Back-reference from a component's root node to the component reference
/// that embedded it. Chains upward through nested component roots.
#[derive(Debug, Clone)]
pub struct ParentLink {
    pub context: Option<InstanceRef>,
    pub parent: Option<Arc<ParentLink>>,
}

impl ParentLink {
    pub fn from_component(node: &ComponentNode) -> Arc<Self> {
        Arc::new(Self {
            context: node.context.clone(),
            parent: node.parent.clone(),
        })
    }
}
