//! Component cache adapter.
//!
//! A cache may be backed by anything: an in-process map, a network store,
//! a callback API. [`CacheOp`] normalizes a synchronous lookup and an
//! asynchronous one into a single awaitable shape, so the renderer always
//! treats a lookup as a suspension point regardless of how it is served.
//!
//! `get` and `set` are mandatory; `has` is optional. When `has` is present
//! the renderer asks it first and only calls `get` on a hit.

pub mod memory;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};

use crate::RenderError;

type SyncFn<T> = Arc<dyn Fn(&str) -> T + Send + Sync>;
type AsyncFn<T> = Arc<dyn Fn(String) -> BoxFuture<'static, Result<T, RenderError>> + Send + Sync>;
type SetFn = Arc<dyn Fn(String, String) + Send + Sync>;

// ---------------------------------------------------------------------------
// CacheOp
// ---------------------------------------------------------------------------

/// A cache lookup that is either answered in place or completes later.
pub enum CacheOp<T> {
    Sync(SyncFn<T>),
    Async(AsyncFn<T>),
}

impl<T> Clone for CacheOp<T> {
    fn clone(&self) -> Self {
        match self {
            CacheOp::Sync(f) => CacheOp::Sync(Arc::clone(f)),
            CacheOp::Async(f) => CacheOp::Async(Arc::clone(f)),
        }
    }
}

impl<T: Send + 'static> CacheOp<T> {
    pub fn from_sync<F>(f: F) -> Self
    where
        F: Fn(&str) -> T + Send + Sync + 'static,
    {
        CacheOp::Sync(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, RenderError>> + Send + 'static,
    {
        CacheOp::Async(Arc::new(move |key: String| f(key).boxed()))
    }

    pub async fn call(&self, key: &str) -> Result<T, RenderError> {
        match self {
            CacheOp::Sync(f) => Ok(f(key)),
            CacheOp::Async(f) => f(key.to_string()).await,
        }
    }
}

impl<T> fmt::Debug for CacheOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheOp::Sync(_) => f.write_str("CacheOp::Sync"),
            CacheOp::Async(_) => f.write_str("CacheOp::Async"),
        }
    }
}

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// A cache answered synchronously, e.g. [`memory::MemoryCache`].
pub trait CacheStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    /// Whether `has` should be consulted before `get`.
    fn supports_has(&self) -> bool {
        false
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// A cache whose lookups complete asynchronously, e.g. over the network.
/// Writes are fire-and-forget, matching the renderer's use of `set`.
#[async_trait]
pub trait AsyncCacheStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, RenderError>;

    fn set(&self, key: &str, value: String);

    fn supports_has(&self) -> bool {
        false
    }

    async fn has(&self, key: &str) -> Result<bool, RenderError> {
        Ok(self.get(key).await?.is_some())
    }
}

// ---------------------------------------------------------------------------
// RenderCache
// ---------------------------------------------------------------------------

/// The normalized cache handed to the renderer.
#[derive(Clone)]
pub struct RenderCache {
    get: CacheOp<Option<String>>,
    has: Option<CacheOp<bool>>,
    set: SetFn,
}

impl RenderCache {
    pub fn builder() -> RenderCacheBuilder {
        RenderCacheBuilder::default()
    }

    pub fn from_store<S: CacheStore>(store: Arc<S>) -> Self {
        let get_store = Arc::clone(&store);
        let set_store = Arc::clone(&store);
        let has = store.supports_has().then(|| {
            let has_store = Arc::clone(&store);
            CacheOp::from_sync(move |key: &str| has_store.has(key))
        });
        Self {
            get: CacheOp::from_sync(move |key: &str| get_store.get(key)),
            has,
            set: Arc::new(move |key: String, value: String| set_store.set(&key, value)),
        }
    }

    pub fn from_async_store<S: AsyncCacheStore>(store: Arc<S>) -> Self {
        let get_store = Arc::clone(&store);
        let set_store = Arc::clone(&store);
        let has = store.supports_has().then(|| {
            let has_store = Arc::clone(&store);
            CacheOp::from_async(move |key: String| {
                let store = Arc::clone(&has_store);
                async move { store.has(&key).await }
            })
        });
        Self {
            get: CacheOp::from_async(move |key: String| {
                let store = Arc::clone(&get_store);
                async move { store.get(&key).await }
            }),
            has,
            set: Arc::new(move |key: String, value: String| set_store.set(&key, value)),
        }
    }

    pub fn has_op(&self) -> Option<&CacheOp<bool>> {
        self.has.as_ref()
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, RenderError> {
        self.get.call(key).await
    }

    pub fn set(&self, key: String, value: String) {
        (self.set)(key, value)
    }
}

impl fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCache")
            .field("get", &self.get)
            .field("has", &self.has)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RenderCacheBuilder
// ---------------------------------------------------------------------------

/// Assembles a [`RenderCache`] from loose operations.
/// `build` fails unless both `get` and `set` were supplied.
#[derive(Default)]
pub struct RenderCacheBuilder {
    get: Option<CacheOp<Option<String>>>,
    has: Option<CacheOp<bool>>,
    set: Option<SetFn>,
}

impl RenderCacheBuilder {
    pub fn get<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.get = Some(CacheOp::from_sync(f));
        self
    }

    pub fn get_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<String>, RenderError>> + Send + 'static,
    {
        self.get = Some(CacheOp::from_async(f));
        self
    }

    pub fn has<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.has = Some(CacheOp::from_sync(f));
        self
    }

    pub fn has_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, RenderError>> + Send + 'static,
    {
        self.has = Some(CacheOp::from_async(f));
        self
    }

    pub fn set<F>(mut self, f: F) -> Self
    where
        F: Fn(String, String) + Send + Sync + 'static,
    {
        self.set = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<RenderCache, RenderError> {
        match (self.get, self.set) {
            (Some(get), Some(set)) => Ok(RenderCache {
                get,
                has: self.has,
                set,
            }),
            _ => Err(RenderError::CacheConfig),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[test]
    fn build_requires_get_and_set() {
        let missing_both = RenderCache::builder().build();
        assert!(matches!(missing_both, Err(RenderError::CacheConfig)));

        let missing_set = RenderCache::builder().get(|_| None).build();
        assert!(matches!(missing_set, Err(RenderError::CacheConfig)));

        let missing_get = RenderCache::builder().set(|_, _| {}).has(|_| true).build();
        let err = missing_get.unwrap_err();
        assert_eq!(err.to_string(), "renderer cache must implement at least get & set.");
    }

    #[tokio::test]
    async fn sync_and_async_ops_answer_alike() {
        let sync_op: CacheOp<Option<String>> =
            CacheOp::from_sync(|key: &str| Some(format!("sync:{key}")));
        let async_op: CacheOp<Option<String>> = CacheOp::from_async(|key: String| async move {
            tokio::task::yield_now().await;
            Ok(Some(format!("async:{key}")))
        });

        assert!(matches!(sync_op, CacheOp::Sync(_)));
        assert!(matches!(async_op, CacheOp::Async(_)));
        assert_eq!(sync_op.call("k").await.unwrap().as_deref(), Some("sync:k"));
        assert_eq!(async_op.call("k").await.unwrap().as_deref(), Some("async:k"));
    }

    #[tokio::test]
    async fn async_errors_propagate() {
        let op: CacheOp<bool> =
            CacheOp::from_async(|_key: String| async { Err(RenderError::Cache("down".into())) });
        let err = op.call("k").await.unwrap_err();
        assert_eq!(err.to_string(), "Cache error: down");
    }

    #[tokio::test]
    async fn builder_wires_set_through() {
        let store = Arc::new(Mutex::new(HashMap::<String, String>::new()));
        let reader = Arc::clone(&store);
        let writer = Arc::clone(&store);
        let cache = RenderCache::builder()
            .get(move |key| reader.lock().unwrap().get(key).cloned())
            .set(move |key, value| {
                writer.lock().unwrap().insert(key, value);
            })
            .build()
            .unwrap();

        assert!(cache.has_op().is_none());
        assert_eq!(cache.get("a").await.unwrap(), None);
        cache.set("a".into(), "<p>a</p>".into());
        assert_eq!(cache.get("a").await.unwrap().as_deref(), Some("<p>a</p>"));
    }

    struct SlowStore {
        inner: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl AsyncCacheStore for SlowStore {
        async fn get(&self, key: &str) -> Result<Option<String>, RenderError> {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            Ok(self.inner.lock().unwrap().get(key).cloned())
        }

        fn set(&self, key: &str, value: String) {
            self.inner.lock().unwrap().insert(key.to_string(), value);
        }

        fn supports_has(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn async_store_has_defaults_to_get() {
        let cache = RenderCache::from_async_store(Arc::new(SlowStore {
            inner: Mutex::new(HashMap::new()),
        }));
        let has = cache.has_op().expect("has wired");
        assert!(matches!(has, CacheOp::Async(_)));
        assert!(!has.call("x").await.unwrap());
        cache.set("x".into(), "X".into());
        assert!(has.call("x").await.unwrap());
    }
}
