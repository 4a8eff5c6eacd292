//! Component descriptors and per-render instances.
//!
//! [`ComponentOptions`] is the static descriptor shared by every reference
//! to a component. A [`ComponentInstance`] is created for each rendered
//! reference, owns the resolved render step and is dropped once its subtree
//! has been serialized.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::vnode::{ComponentNode, VNode};
use crate::RenderError;

/// A render step: produces exactly one node for an instance.
pub type RenderFn = Arc<dyn Fn(&InstanceRef) -> VNode + Send + Sync>;

/// Maps bound props to the per-state part of a cache key.
pub type CacheKeyFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

pub type InstanceRef = Arc<ComponentInstance>;

// ---------------------------------------------------------------------------
// ComponentOptions
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct ComponentOptions {
    /// Declared name. Required for caching: it prefixes the cache key.
    pub name: Option<String>,
    pub render: Option<RenderFn>,
    /// Template text handed to the compiler when `render` is absent.
    pub template: Option<String>,
    pub server_cache_key: Option<CacheKeyFn>,
    /// Styling-scope attribute added to every element this component owns.
    pub scope_id: Option<String>,
}

impl ComponentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn render<F>(mut self, render: F) -> Self
    where
        F: Fn(&InstanceRef) -> VNode + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(render));
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn server_cache_key<F>(mut self, key: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.server_cache_key = Some(Arc::new(key));
        self
    }

    pub fn scope_id(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }
}

impl fmt::Debug for ComponentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentOptions")
            .field("name", &self.name)
            .field("render", &self.render.is_some())
            .field("template", &self.template)
            .field("server_cache_key", &self.server_cache_key.is_some())
            .field("scope_id", &self.scope_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentInstance
// ---------------------------------------------------------------------------

pub struct ComponentInstance {
    options: Arc<ComponentOptions>,
    props: Value,
    parent: Option<InstanceRef>,
    tag: Option<String>,
    /// Render step compiled from the template, when `options.render` is unset.
    compiled: OnceLock<RenderFn>,
}

impl ComponentInstance {
    pub fn new(
        options: Arc<ComponentOptions>,
        props: Value,
        parent: Option<InstanceRef>,
        tag: Option<String>,
    ) -> InstanceRef {
        Arc::new(Self {
            options,
            props,
            parent,
            tag,
            compiled: OnceLock::new(),
        })
    }

    /// A top-level instance with no parent, as passed to `Renderer::render`.
    pub fn root(options: Arc<ComponentOptions>, props: Value) -> InstanceRef {
        Self::new(options, props, None, None)
    }

    pub fn options(&self) -> &Arc<ComponentOptions> {
        &self.options
    }

    pub fn props(&self) -> &Value {
        &self.props
    }

    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }

    pub fn parent(&self) -> Option<&InstanceRef> {
        self.parent.as_ref()
    }

    pub fn scope_id(&self) -> Option<&str> {
        self.options.scope_id.as_deref()
    }

    /// Name for diagnostics: declared name, then referencing tag.
    pub fn display_name(&self) -> &str {
        self.options
            .name
            .as_deref()
            .or(self.tag.as_deref())
            .unwrap_or("anonymous")
    }

    pub fn render_fn(&self) -> Option<&RenderFn> {
        self.options.render.as_ref().or_else(|| self.compiled.get())
    }

    /// Install a compiled render step. The first installation wins.
    pub fn install_render(&self, render: RenderFn) -> &RenderFn {
        self.compiled.get_or_init(|| render)
    }

    /// Run the resolved render step.
    pub fn render(self: &Arc<Self>) -> Result<VNode, RenderError> {
        let render = self.render_fn().ok_or_else(|| RenderError::MissingRender {
            component: self.display_name().to_string(),
        })?;
        Ok(render(self))
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.display_name())
            .field("props", &self.props)
            .field("scope_id", &self.options.scope_id)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// InstanceFactory
// ---------------------------------------------------------------------------

/// Creates the instance for a component reference.
/// `parent` is the instance that was active when the reference was reached.
pub trait InstanceFactory: Send + Sync {
    fn create(&self, node: &ComponentNode, parent: Option<&InstanceRef>) -> InstanceRef;
}

/// Binds the reference's props to a fresh instance; no lifecycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultInstanceFactory;

impl InstanceFactory for DefaultInstanceFactory {
    fn create(&self, node: &ComponentNode, parent: Option<&InstanceRef>) -> InstanceRef {
        ComponentInstance::new(
            Arc::clone(&node.options),
            node.props.clone(),
            parent.cloned(),
            node.tag.clone(),
        )
    }
}
