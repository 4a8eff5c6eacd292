//! JSON templates.
//!
//! A small template format whose text is a JSON node tree. It gives the CLI
//! and tests a real [`TemplateCompiler`] without pulling in an HTML template
//! language:
//!
//! ```json
//! { "type": "element", "tag": "p", "children": [
//!     { "type": "text", "text": "Hello, " },
//!     { "type": "prop", "name": "who" },
//!     { "type": "component", "name": "badge", "bind": { "label": "who" } }
//! ] }
//! ```
//!
//! Component references are looked up by name in a [`ComponentRegistry`]
//! when the render step runs, so components may be registered in any order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::compiler::TemplateCompiler;
use crate::component::{ComponentOptions, InstanceRef, RenderFn};
use crate::utils::value_to_text;
use crate::vnode::{ComponentNode, DirectiveBinding, ElementNode, VNode};
use crate::RenderError;

// ---------------------------------------------------------------------------
// NodeSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeSpec {
    Element {
        tag: String,
        #[serde(default)]
        attrs: IndexMap<String, Value>,
        #[serde(default)]
        static_class: Option<String>,
        #[serde(default)]
        class: Option<Value>,
        #[serde(default)]
        style: IndexMap<String, String>,
        #[serde(default)]
        directives: Vec<DirectiveBinding>,
        #[serde(default)]
        children: Vec<NodeSpec>,
    },
    Text {
        text: String,
        #[serde(default)]
        raw: bool,
    },
    Comment {
        text: String,
    },
    /// Text taken from one of the instance's props.
    Prop {
        name: String,
    },
    Component {
        name: String,
        #[serde(default)]
        props: Map<String, Value>,
        /// Child prop name → parent prop name.
        #[serde(default)]
        bind: BTreeMap<String, String>,
    },
}

impl NodeSpec {
    pub fn parse(template: &str) -> Result<Self, RenderError> {
        serde_json::from_str(template).map_err(|e| RenderError::Compile {
            template: template.to_string(),
            reason: e.to_string(),
        })
    }

    /// Build the node tree for one render of `vm`.
    pub fn instantiate(&self, vm: &InstanceRef, registry: &ComponentRegistry) -> VNode {
        match self {
            NodeSpec::Element {
                tag,
                attrs,
                static_class,
                class,
                style,
                directives,
                children,
            } => {
                let mut el = ElementNode::new(tag.clone()).owned_by(vm);
                el.data.attrs = attrs.clone();
                el.data.static_class = static_class.clone();
                el.data.class = class.clone();
                el.data.style = style.clone();
                el.data.directives = directives.clone();
                el.children = children
                    .iter()
                    .map(|child| child.instantiate(vm, registry))
                    .collect();
                el.into()
            }
            NodeSpec::Text { text, raw: false } => VNode::text(text.clone()),
            NodeSpec::Text { text, raw: true } => VNode::raw(text.clone()),
            NodeSpec::Comment { text } => VNode::comment(text.clone()),
            NodeSpec::Prop { name } => {
                VNode::text(vm.prop(name).map(value_to_text).unwrap_or_default())
            }
            NodeSpec::Component { name, props, bind } => match registry.get(name) {
                Some(options) => {
                    let mut bound = props.clone();
                    for (child_key, parent_key) in bind {
                        let value = vm.prop(parent_key).cloned().unwrap_or(Value::Null);
                        bound.insert(child_key.clone(), value);
                    }
                    ComponentNode::new(options, Value::Object(bound))
                        .tag(name.clone())
                        .owned_by(vm)
                        .into()
                }
                None => {
                    tracing::debug!(component = %name, "unknown component in template");
                    VNode::comment(format!("unknown component: {name}"))
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Component descriptors by name.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: DashMap<String, Arc<ComponentOptions>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        options: ComponentOptions,
    ) -> Arc<ComponentOptions> {
        let options = Arc::new(options);
        self.components.insert(name.into(), Arc::clone(&options));
        options
    }

    pub fn get(&self, name: &str) -> Option<Arc<ComponentOptions>> {
        self.components.get(name).map(|r| Arc::clone(r.value()))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

// ---------------------------------------------------------------------------
// JsonTemplateCompiler
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct JsonTemplateCompiler {
    registry: Arc<ComponentRegistry>,
}

impl JsonTemplateCompiler {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }
}

impl fmt::Debug for JsonTemplateCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonTemplateCompiler")
            .field("components", &self.registry.len())
            .finish()
    }
}

impl TemplateCompiler for JsonTemplateCompiler {
    fn compile(&self, template: &str) -> Result<RenderFn, RenderError> {
        let spec = NodeSpec::parse(template)?;
        let registry = Arc::clone(&self.registry);
        Ok(Arc::new(move |vm: &InstanceRef| spec.instantiate(vm, &registry)))
    }
}

// ---------------------------------------------------------------------------
// Page description
// ---------------------------------------------------------------------------

/// A component definition as written in a page description.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
    pub template: Value,
    #[serde(default)]
    pub scope_id: Option<String>,
    /// Prop whose value keys the component's cache entries.
    #[serde(default)]
    pub cache_key: Option<String>,
    /// Register without a declared name (the cache then refuses it).
    #[serde(default)]
    pub anonymous: bool,
}

impl ComponentSpec {
    pub fn into_options(self, name: &str) -> ComponentOptions {
        let mut options = ComponentOptions::new().template(self.template.to_string());
        if !self.anonymous {
            options = options.name(name);
        }
        if let Some(scope_id) = self.scope_id {
            options = options.scope_id(scope_id);
        }
        if let Some(prop) = self.cache_key {
            options = options.server_cache_key(move |props: &Value| {
                props.get(&prop).map(value_to_text).unwrap_or_default()
            });
        }
        options
    }
}

/// A whole page: named components plus the root.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageSpec {
    #[serde(default)]
    pub components: BTreeMap<String, ComponentSpec>,
    pub root: ComponentSpec,
    #[serde(default)]
    pub props: Value,
}

impl PageSpec {
    /// Register every component and return the root's descriptor.
    pub fn install(self, registry: &ComponentRegistry) -> (Arc<ComponentOptions>, Value) {
        for (name, spec) in self.components {
            let options = spec.into_options(&name);
            registry.register(name, options);
        }
        (Arc::new(self.root.into_options("root")), self.props)
    }
}
