//! The render engine.
//!
//! Expands a component tree into markup and feeds it to a [`Sink`]:
//!
//! 1. Resolve the root instance's render step (compiling its template if needed)
//! 2. Walk the produced tree depth-first, left to right
//! 3. For each component reference, consult the cache when it is cacheable,
//!    otherwise instantiate it and walk its rendered node
//! 4. For each element, run directives, then modules, then append scope ids
//!
//! **Ordering.** Every fragment is written only after the previous one has
//! been accepted by the sink, and a sibling is started only after the
//! previous sibling's subtree (including any cache round-trip) completed.
//!
//! **Active instance.** The instance currently rendering is passed down as an
//! argument. Leaving a component's subtree simply drops back to the caller's
//! value, on success and on error alike.
//!
//! **Capture.** A cache-capturing render borrows a fresh buffer for its own
//! subtree only. When it completes, the buffer is stored under the
//! component's key and appended to the enclosing capture, if any, so nested
//! cacheable components each get an entry holding exactly their own markup.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cache::RenderCache;
use crate::compiler::{CompilationCache, TemplateCompiler};
use crate::component::{DefaultInstanceFactory, InstanceFactory, InstanceRef};
use crate::directives::{default_directives, DirectiveFn};
use crate::modules::{default_modules, ModuleFn};
use crate::sink::{ChannelSink, Sink, StringSink};
use crate::utils::{self, escape_html};
use crate::vnode::{ComponentNode, ElementNode, ParentLink, VNode};
use crate::{Diagnostic, DiagnosticLevel, RenderError, RenderReport};

pub type UnaryTagFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Attribute forced onto the document root so the client can detect
/// server-rendered markup.
pub const SERVER_RENDERED_ATTR: &str = "server-rendered";

// ---------------------------------------------------------------------------
// RendererOptions
// ---------------------------------------------------------------------------

/// Describes HOW to render.
#[derive(Clone)]
pub struct RendererOptions {
    /// Start-tag contributors, run in order for every element.
    pub modules: Vec<ModuleFn>,
    /// Directive handlers by directive name.
    pub directives: HashMap<String, DirectiveFn>,
    pub is_unary_tag: UnaryTagFn,
    pub cache: Option<RenderCache>,
    pub instance_factory: Arc<dyn InstanceFactory>,
    /// Shared compiled-template memo. Reuse one across renderers to compile
    /// each template once per process.
    pub compilation: Arc<CompilationCache>,
}

impl RendererOptions {
    /// No modules, no directives, no void tags.
    pub fn bare() -> Self {
        Self {
            modules: Vec::new(),
            directives: HashMap::new(),
            is_unary_tag: Arc::new(|_: &str| false),
            cache: None,
            instance_factory: Arc::new(DefaultInstanceFactory),
            compilation: Arc::new(CompilationCache::default()),
        }
    }

    pub fn with_modules(mut self, modules: Vec<ModuleFn>) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_module<F>(mut self, module: F) -> Self
    where
        F: Fn(&ElementNode) -> Option<String> + Send + Sync + 'static,
    {
        self.modules.push(Arc::new(module));
        self
    }

    pub fn with_directive<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut ElementNode, &crate::vnode::DirectiveBinding) + Send + Sync + 'static,
    {
        self.directives.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn with_unary_tag<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.is_unary_tag = Arc::new(predicate);
        self
    }

    pub fn with_cache(mut self, cache: RenderCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_instance_factory(mut self, factory: Arc<dyn InstanceFactory>) -> Self {
        self.instance_factory = factory;
        self
    }

    /// Use `compiler` with a fresh compiled-template memo.
    pub fn with_compiler(mut self, compiler: Arc<dyn TemplateCompiler>) -> Self {
        self.compilation = Arc::new(CompilationCache::new(compiler));
        self
    }

    pub fn with_compilation_cache(mut self, compilation: Arc<CompilationCache>) -> Self {
        self.compilation = compilation;
        self
    }
}

/// HTML defaults: attrs/class/style modules, the `show` directive and the
/// HTML void-element table.
impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            modules: default_modules(),
            directives: default_directives(),
            is_unary_tag: Arc::new(utils::is_unary_tag),
            ..Self::bare()
        }
    }
}

impl fmt::Debug for RendererOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut directives: Vec<&String> = self.directives.keys().collect();
        directives.sort();
        f.debug_struct("RendererOptions")
            .field("modules", &self.modules.len())
            .field("directives", &directives)
            .field("cache", &self.cache)
            .field("compilation", &self.compilation)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Per-render state
// ---------------------------------------------------------------------------

/// State that lives for exactly one top-level render.
#[derive(Default)]
struct Session {
    warned: HashSet<String>,
    report: RenderReport,
}

impl Session {
    fn warn_once(&mut self, message: String, context: Option<String>) {
        if !self.warned.insert(message.clone()) {
            return;
        }
        warn!(context = context.as_deref().unwrap_or(""), "{}", message);
        self.report.diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Warning,
            message,
            context,
        });
    }
}

/// Write handle threaded through the walk. While a cacheable component is
/// rendering, `capture` points at that component's buffer.
struct Output<'a> {
    sink: &'a mut dyn Sink,
    capture: Option<&'a mut String>,
    session: &'a mut Session,
}

impl<'a> Output<'a> {
    async fn write(&mut self, chunk: String) -> Result<(), RenderError> {
        if let Some(buf) = self.capture.as_deref_mut() {
            buf.push_str(&chunk);
        }
        self.sink.write(chunk).await
    }

    /// Same sink and session, capturing into `buf` instead of the current buffer.
    fn capture_into<'b>(&'b mut self, buf: &'b mut String) -> Output<'b> {
        Output {
            sink: &mut *self.sink,
            capture: Some(buf),
            session: &mut *self.session,
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

pub struct Renderer {
    modules: Vec<ModuleFn>,
    directives: HashMap<String, DirectiveFn>,
    is_unary_tag: UnaryTagFn,
    cache: Option<RenderCache>,
    instance_factory: Arc<dyn InstanceFactory>,
    compilation: Arc<CompilationCache>,
}

impl Renderer {
    pub fn new(options: RendererOptions) -> Self {
        Self {
            modules: options.modules,
            directives: options.directives,
            is_unary_tag: options.is_unary_tag,
            cache: options.cache,
            instance_factory: options.instance_factory,
            compilation: options.compilation,
        }
    }

    pub fn cache(&self) -> Option<&RenderCache> {
        self.cache.as_ref()
    }

    pub fn compilation(&self) -> &Arc<CompilationCache> {
        &self.compilation
    }

    /// Render `root` into `sink`.
    ///
    /// All markup flows through the sink; the returned report carries the
    /// warnings raised during this call and cache statistics. Warnings are
    /// deduplicated per call, not across calls.
    pub async fn render(
        &self,
        root: &InstanceRef,
        sink: &mut dyn Sink,
    ) -> Result<RenderReport, RenderError> {
        let mut session = Session::default();
        self.compilation.resolve(root)?;
        let node = root.render()?;
        {
            let mut out = Output {
                sink: &mut *sink,
                capture: None,
                session: &mut session,
            };
            self.render_node(node, &mut out, Some(Arc::clone(root)), true)
                .await?;
        }
        sink.finish().await?;
        Ok(session.report)
    }

    pub async fn render_to_string(&self, root: &InstanceRef) -> Result<String, RenderError> {
        let mut sink = StringSink::new();
        self.render(root, &mut sink).await?;
        Ok(sink.into_string())
    }

    /// Render on a spawned task, yielding fragments as they are produced.
    /// A render error arrives as the last item.
    pub fn render_to_stream(
        self: &Arc<Self>,
        root: InstanceRef,
        capacity: usize,
    ) -> mpsc::Receiver<Result<String, RenderError>> {
        let (mut sink, rx) = ChannelSink::channel(capacity.max(1));
        let renderer = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = renderer.render(&root, &mut sink).await {
                debug!(error = %err, "stream render failed");
                sink.fail(err).await;
            }
        });
        rx
    }

    // -----------------------------------------------------------------------
    // Node dispatch
    // -----------------------------------------------------------------------

    fn render_node<'a>(
        &'a self,
        node: VNode,
        out: &'a mut Output<'_>,
        active: Option<InstanceRef>,
        is_root: bool,
    ) -> BoxFuture<'a, Result<(), RenderError>> {
        async move {
            match node {
                VNode::Component(component) => {
                    self.render_component_node(component, out, active, is_root)
                        .await
                }
                VNode::Element(el) => self.render_element(el, out, active, is_root).await,
                VNode::Comment(text) => out.write(format!("<!--{text}-->")).await,
                VNode::Text { text, raw: true } => out.write(text).await,
                VNode::Text { text, raw: false } => out.write(escape_html(&text)).await,
            }
        }
        .boxed()
    }

    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    async fn render_component_node(
        &self,
        node: ComponentNode,
        out: &mut Output<'_>,
        active: Option<InstanceRef>,
        is_root: bool,
    ) -> Result<(), RenderError> {
        let options = Arc::clone(&node.options);
        let Some(get_key) = options.server_cache_key.as_ref() else {
            return self.render_component(node, out, active, is_root).await;
        };

        match (&self.cache, options.name.as_deref()) {
            (Some(cache), Some(name)) => {
                let key = utils::cache_key(name, &get_key(&node.props));
                self.render_from_cache(node, key, cache, out, active, is_root)
                    .await
            }
            (cache, name) => {
                if cache.is_none() {
                    out.session.warn_once(
                        format!(
                            "[zenith-ssr] Component {} implemented server_cache_key, \
                             but no cache was provided to the renderer.",
                            name.unwrap_or("(anonymous)")
                        ),
                        node.tag.clone(),
                    );
                }
                if name.is_none() {
                    out.session.warn_once(
                        "[zenith-ssr] Components that implement \"server_cache_key\" \
                         must also define a unique \"name\" option."
                            .to_string(),
                        node.tag.clone(),
                    );
                }
                self.render_component(node, out, active, is_root).await
            }
        }
    }

    /// Serve from the cache when possible, otherwise render and capture.
    async fn render_from_cache(
        &self,
        node: ComponentNode,
        key: String,
        cache: &RenderCache,
        out: &mut Output<'_>,
        active: Option<InstanceRef>,
        is_root: bool,
    ) -> Result<(), RenderError> {
        let cached = match cache.has_op() {
            Some(has) => {
                if has.call(&key).await? {
                    let hit = cache.get(&key).await?;
                    if hit.is_none() {
                        out.session.warn_once(
                            format!(
                                "[zenith-ssr] Cache reported a hit for {key} but get \
                                 returned nothing; rendering the component instead."
                            ),
                            node.tag.clone(),
                        );
                    }
                    hit
                } else {
                    None
                }
            }
            None => cache.get(&key).await?.filter(|html| !html.is_empty()),
        };

        match cached {
            Some(html) => {
                debug!(key = %key, bytes = html.len(), "component cache hit");
                out.session.report.cache_hits += 1;
                out.write(html).await
            }
            None => {
                self.render_with_cache(node, key, cache, out, active, is_root)
                    .await
            }
        }
    }

    async fn render_with_cache(
        &self,
        node: ComponentNode,
        key: String,
        cache: &RenderCache,
        out: &mut Output<'_>,
        active: Option<InstanceRef>,
        is_root: bool,
    ) -> Result<(), RenderError> {
        let mut buf = String::new();
        {
            let mut capture = out.capture_into(&mut buf);
            self.render_component(node, &mut capture, active, is_root)
                .await?;
        }

        debug!(key = %key, bytes = buf.len(), "storing component markup");
        if let Some(outer) = out.capture.as_deref_mut() {
            outer.push_str(&buf);
        }
        cache.set(key, buf);
        out.session.report.cache_writes += 1;
        Ok(())
    }

    async fn render_component(
        &self,
        node: ComponentNode,
        out: &mut Output<'_>,
        active: Option<InstanceRef>,
        is_root: bool,
    ) -> Result<(), RenderError> {
        let instance = self.instance_factory.create(&node, active.as_ref());
        self.compilation.resolve(&instance)?;
        let mut child = instance.render()?;
        child.set_parent(ParentLink::from_component(&node));
        self.render_node(child, out, Some(instance), is_root).await
    }

    // -----------------------------------------------------------------------
    // Elements
    // -----------------------------------------------------------------------

    async fn render_element(
        &self,
        mut el: ElementNode,
        out: &mut Output<'_>,
        active: Option<InstanceRef>,
        is_root: bool,
    ) -> Result<(), RenderError> {
        if is_root {
            el.data
                .attrs
                .insert(SERVER_RENDERED_ATTR.into(), Value::String("true".into()));
        }
        let start_tag = self.render_start_tag(&mut el, active.as_ref());
        if (self.is_unary_tag)(el.tag.as_str()) {
            return out.write(start_tag).await;
        }

        let end_tag = format!("</{}>", el.tag);
        if el.children.is_empty() {
            return out.write(start_tag + &end_tag).await;
        }

        out.write(start_tag).await?;
        for child in std::mem::take(&mut el.children) {
            self.render_node(child, out, active.clone(), false).await?;
        }
        out.write(end_tag).await
    }

    fn render_start_tag(&self, el: &mut ElementNode, active: Option<&InstanceRef>) -> String {
        let mut markup = format!("<{}", el.tag);

        // directives mutate the node's data, which modules then serialize
        if !el.data.directives.is_empty() {
            let bindings = el.data.directives.clone();
            for binding in &bindings {
                if let Some(handler) = self.directives.get(&binding.name) {
                    handler(&mut *el, binding);
                }
            }
        }

        for module in &self.modules {
            if let Some(fragment) = module(&*el) {
                markup.push_str(&fragment);
            }
        }

        // slot content rendered inside another component
        if let Some(active) = active {
            if !el.is_owned_by(active) {
                if let Some(scope_id) = active.scope_id() {
                    markup.push(' ');
                    markup.push_str(scope_id);
                }
            }
        }
        for scope_id in el.scope_ids() {
            markup.push(' ');
            markup.push_str(scope_id);
        }

        markup.push('>');
        markup
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("modules", &self.modules.len())
            .field("directives", &self.directives.len())
            .field("cache", &self.cache)
            .finish()
    }
}
