//! # Zenith SSR
//!
//! Server-side renderer that expands a component tree into HTML.
//!
//! The renderer walks a [`VNode`] tree depth-first, left to right, and hands
//! every markup fragment to a [`Sink`] in document order. Components that
//! declare a `server_cache_key` are looked up in an optional, possibly
//! network-backed [`RenderCache`]; a miss renders the component while
//! capturing its markup so the fragment can be stored for the next request.
//!
//! Cache round-trips and sink writes are suspension points. Ordering holds
//! because a sibling is never started before the previous sibling's future
//! has completed.
//!
//! ```text
//! root instance → render step → VNode tree → Renderer → Sink (string / channel / stdout)
//!                                               ↕
//!                                          RenderCache
//! ```

pub mod cache;
pub mod compiler;
pub mod component;
pub mod directives;
pub mod modules;
pub mod renderer;
pub mod sink;
pub mod template;
pub mod utils;
pub mod vnode;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cache::memory::MemoryCache;
pub use cache::{CacheOp, CacheStore, RenderCache, RenderCacheBuilder};
pub use compiler::{CompilationCache, TemplateCompiler};
pub use component::{
    ComponentInstance, ComponentOptions, DefaultInstanceFactory, InstanceFactory, InstanceRef,
    RenderFn,
};
pub use renderer::{Renderer, RendererOptions};
pub use sink::{ChannelSink, Sink, StringSink, WriterSink};
pub use vnode::{ComponentNode, DirectiveBinding, ElementNode, ParentLink, VNode, VNodeData};

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic emitted during rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

// ---------------------------------------------------------------------------
// RenderReport
// ---------------------------------------------------------------------------

/// Summary of a completed top-level render.
/// The markup itself has already gone through the sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderReport {
    /// Advisory warnings, deduplicated for this render.
    pub diagnostics: Vec<Diagnostic>,
    /// Components served straight from the cache.
    pub cache_hits: usize,
    /// Cache entries written during this render.
    pub cache_writes: usize,
}

impl RenderReport {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
    }
}

// ---------------------------------------------------------------------------
// RenderError
// ---------------------------------------------------------------------------

/// Errors that abort the render.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer cache must implement at least get & set.")]
    CacheConfig,

    #[error("render function or template not defined in component: {component}")]
    MissingRender { component: String },

    #[error("Template compilation failed: {reason}")]
    Compile { template: String, reason: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
