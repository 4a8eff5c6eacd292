//! Template compilation seam.
//!
//! The renderer never parses templates itself. A [`TemplateCompiler`] turns
//! template text into a [`RenderFn`]; [`CompilationCache`] memoizes the
//! result by exact template text so every instance of a component (and every
//! component sharing a template) reuses one compiled step.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::component::{InstanceRef, RenderFn};
use crate::RenderError;

pub trait TemplateCompiler: Send + Sync {
    fn compile(&self, template: &str) -> Result<RenderFn, RenderError>;
}

impl<F> TemplateCompiler for F
where
    F: Fn(&str) -> Result<RenderFn, RenderError> + Send + Sync,
{
    fn compile(&self, template: &str) -> Result<RenderFn, RenderError> {
        self(template)
    }
}

/// Rejects every template. Used when no compiler is configured, so only
/// components with an explicit render step can be rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompiler;

impl TemplateCompiler for NoCompiler {
    fn compile(&self, template: &str) -> Result<RenderFn, RenderError> {
        Err(RenderError::Compile {
            template: template.to_string(),
            reason: "no template compiler configured".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// CompilationCache
// ---------------------------------------------------------------------------

/// Compiled render steps keyed by template text.
pub struct CompilationCache {
    compiler: Arc<dyn TemplateCompiler>,
    compiled: DashMap<String, RenderFn>,
}

impl CompilationCache {
    pub fn new(compiler: Arc<dyn TemplateCompiler>) -> Self {
        Self {
            compiler,
            compiled: DashMap::new(),
        }
    }

    /// Return the memoized step for `template`, compiling it on first use.
    pub fn get_or_compile(&self, template: &str) -> Result<RenderFn, RenderError> {
        if let Some(hit) = self.compiled.get(template) {
            return Ok(Arc::clone(hit.value()));
        }
        let render = self.compiler.compile(template)?;
        tracing::trace!(len = template.len(), "compiled template");
        let entry = self
            .compiled
            .entry(template.to_string())
            .or_insert(render);
        Ok(Arc::clone(entry.value()))
    }

    /// Make sure `instance` has a render step, compiling its template if
    /// it was not given one directly.
    pub fn resolve(&self, instance: &InstanceRef) -> Result<RenderFn, RenderError> {
        if let Some(render) = instance.render_fn() {
            return Ok(Arc::clone(render));
        }
        match instance.options().template.as_deref() {
            Some(template) => {
                let render = self.get_or_compile(template)?;
                Ok(Arc::clone(instance.install_render(render)))
            }
            None => Err(RenderError::MissingRender {
                component: instance.display_name().to_string(),
            }),
        }
    }

    /// Number of distinct templates compiled so far.
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    pub fn clear(&self) {
        self.compiled.clear();
    }
}

impl Default for CompilationCache {
    fn default() -> Self {
        Self::new(Arc::new(NoCompiler))
    }
}

impl fmt::Debug for CompilationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationCache")
            .field("templates", &self.compiled.len())
            .finish()
    }
}
