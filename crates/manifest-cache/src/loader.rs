//! Manifest loader - main entry point
//!
//! Loads manifests and page bootstraps for the active module and publishes
//! the outcome as a [`ManifestState`].
//!
//! # Ordering
//! Every load takes a [`LoadTicket`]. Starting a new load (or calling
//! [`ManifestLoader::cancel_pending`]) invalidates all earlier tickets; a
//! response that arrives for an invalidated ticket is dropped without touching
//! the published state. The last *requested* load wins, not the last to
//! arrive.

use crate::bootstrap::BootstrapSnapshot;
use crate::cache::ManifestCache;
use crate::compile::ManifestCompiler;
use crate::error::{LoadError, LoadResult};
use crate::source::{BootstrapRequest, ManifestSource};
use manifest_model::{CompiledManifest, ManifestHash};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Published load state of the active module
#[derive(Debug, Clone, Default)]
pub enum ManifestState {
    /// Nothing requested yet
    #[default]
    Idle,
    /// Load in flight
    Loading {
        /// Module being loaded
        module_id: String,
    },
    /// Manifest available
    Ready {
        /// Loaded module
        module_id: String,
        /// Compiled manifest
        compiled: Arc<CompiledManifest>,
    },
    /// Load failed; terminal for the surface until the next load
    Failed {
        /// Module that failed
        module_id: String,
        /// Message for display
        message: String,
    },
}

impl ManifestState {
    /// Compiled manifest, if ready
    #[must_use]
    pub fn compiled(&self) -> Option<&Arc<CompiledManifest>> {
        match self {
            Self::Ready { compiled, .. } => Some(compiled),
            _ => None,
        }
    }

    /// Module the state refers to
    #[must_use]
    pub fn module_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Loading { module_id }
            | Self::Ready { module_id, .. }
            | Self::Failed { module_id, .. } => Some(module_id),
        }
    }
}

/// Cancellation flag for one load
#[derive(Debug, Clone)]
pub struct LoadTicket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl LoadTicket {
    /// Whether no newer load has been started since this one
    #[inline]
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// Generation number of this ticket
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Manifest and bootstrap loader for the active module
pub struct ManifestLoader {
    source: Arc<dyn ManifestSource>,
    cache: ManifestCache,
    compiler: ManifestCompiler,
    generation: Arc<AtomicU64>,
    bootstrap_version: AtomicU64,
    state: watch::Sender<ManifestState>,
}

impl fmt::Debug for ManifestLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestLoader")
            .field("cache", &self.cache.stats())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("bootstrap_version", &self.bootstrap_version.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl ManifestLoader {
    /// Create loader over a manifest source
    #[must_use]
    pub fn new(source: Arc<dyn ManifestSource>, cache: ManifestCache) -> Self {
        let (state, _) = watch::channel(ManifestState::Idle);
        Self {
            source,
            cache,
            compiler: ManifestCompiler::new(),
            generation: Arc::new(AtomicU64::new(0)),
            bootstrap_version: AtomicU64::new(0),
            state,
        }
    }

    /// Subscribe to state changes
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ManifestState> {
        self.state.subscribe()
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> ManifestState {
        self.state.borrow().clone()
    }

    /// Underlying cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ManifestCache {
        &self.cache
    }

    /// Start a new load generation
    #[must_use]
    pub fn begin(&self) -> LoadTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        LoadTicket {
            generation,
            current: Arc::clone(&self.generation),
        }
    }

    /// Invalidate every in-flight load (e.g. the surface unmounted)
    pub fn cancel_pending(&self) {
        let _ = self.begin();
    }

    /// Load and compile a module manifest
    ///
    /// # Errors
    /// - [`LoadError::Superseded`] if a newer load started meanwhile
    /// - fetch and compile errors otherwise
    pub async fn load_manifest(&self, module_id: &str) -> LoadResult<Arc<CompiledManifest>> {
        let ticket = self.begin();
        self.state.send_replace(ManifestState::Loading {
            module_id: module_id.to_string(),
        });
        tracing::info!(module_id, generation = ticket.generation(), "loading manifest");

        let result = self
            .cache
            .try_get_or_insert_with(module_id, || async {
                let payload = self.source.get_manifest(module_id).await?;
                let hash = payload.manifest_hash.map(ManifestHash::from_remote);
                Ok::<_, LoadError>(self.compiler.compile(payload.manifest, hash)?)
            })
            .await;

        self.settle(&ticket, module_id, result, |compiled| compiled)
    }

    /// Load manifest plus prefetched list/record in one round trip
    ///
    /// The compiled manifest is also placed in the cache so a later
    /// [`ManifestLoader::load_manifest`] for the module does not refetch.
    ///
    /// # Errors
    /// Same as [`ManifestLoader::load_manifest`].
    pub async fn load_bootstrap(
        &self,
        request: &BootstrapRequest,
    ) -> LoadResult<(Arc<CompiledManifest>, BootstrapSnapshot)> {
        let module_id = request.module_id.as_str();
        let ticket = self.begin();
        self.state.send_replace(ManifestState::Loading {
            module_id: module_id.to_string(),
        });
        tracing::info!(
            module_id,
            page_id = request.page_id.as_deref(),
            view_id = request.view_id.as_deref(),
            record_id = request.record_id.as_deref(),
            "loading page bootstrap"
        );

        let result = async {
            let payload = self.source.get_page_bootstrap(request).await?;
            let hash = payload.manifest_hash.map(ManifestHash::from_remote);
            let compiled = Arc::new(self.compiler.compile(payload.manifest, hash)?);
            self.cache.insert(module_id, Arc::clone(&compiled)).await;

            let snapshot = BootstrapSnapshot {
                view_id: payload.view_id.or_else(|| request.view_id.clone()),
                page_id: payload.page_id.or_else(|| request.page_id.clone()),
                record_id: request.record_id.clone(),
                list: payload.list,
                record: payload.record,
                manifest_hash: compiled.hash().clone(),
                version: self.bootstrap_version.fetch_add(1, Ordering::SeqCst) + 1,
            };
            Ok((compiled, snapshot))
        }
        .await;

        self.settle(&ticket, module_id, result, |(compiled, _)| compiled)
    }

    /// Use an already-materialized manifest (design-time preview)
    ///
    /// Bypasses the source and the cache but still produces a compiled index.
    ///
    /// # Errors
    /// Returns compile errors, or [`LoadError::Superseded`].
    pub fn load_materialized(
        &self,
        module_id: &str,
        manifest: Value,
    ) -> LoadResult<Arc<CompiledManifest>> {
        let ticket = self.begin();
        let result = self
            .compiler
            .compile(manifest, None)
            .map(Arc::new)
            .map_err(LoadError::from);
        self.settle(&ticket, module_id, result, |compiled| compiled)
    }

    /// Load a manifest without taking a ticket or publishing state
    ///
    /// Used for lookups in other modules while the active module stays put.
    ///
    /// # Errors
    /// Returns fetch and compile errors.
    pub async fn load_detached(&self, module_id: &str) -> LoadResult<Arc<CompiledManifest>> {
        tracing::debug!(module_id, "loading detached manifest");
        self.cache
            .try_get_or_insert_with(module_id, || async {
                let payload = self.source.get_manifest(module_id).await?;
                let hash = payload.manifest_hash.map(ManifestHash::from_remote);
                Ok::<_, LoadError>(self.compiler.compile(payload.manifest, hash)?)
            })
            .await
    }

    /// Drop the cached manifest of a module
    pub async fn invalidate(&self, module_id: &str) {
        self.cache.invalidate(module_id).await;
    }

    fn settle<T>(
        &self,
        ticket: &LoadTicket,
        module_id: &str,
        result: LoadResult<T>,
        compiled_of: impl Fn(&T) -> &Arc<CompiledManifest>,
    ) -> LoadResult<T> {
        if !ticket.is_current() {
            tracing::debug!(
                module_id,
                generation = ticket.generation(),
                "dropping superseded manifest response"
            );
            return Err(LoadError::Superseded(module_id.to_string()));
        }

        match &result {
            Ok(value) => {
                let compiled = compiled_of(value);
                tracing::info!(module_id, hash = compiled.hash().short(), "manifest ready");
                self.state.send_replace(ManifestState::Ready {
                    module_id: module_id.to_string(),
                    compiled: Arc::clone(compiled),
                });
            }
            Err(err) => {
                tracing::error!(module_id, error = %err, "manifest load failed");
                self.state.send_replace(ManifestState::Failed {
                    module_id: module_id.to_string(),
                    message: err.to_string(),
                });
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{BootstrapPayload, ManifestPayload};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeSource {
        delays_ms: HashMap<String, u64>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn with_delay(mut self, module: &str, ms: u64) -> Self {
            self.delays_ms.insert(module.to_string(), ms);
            self
        }

        fn manifest_for(module_id: &str) -> Value {
            json!({"app": {"title": module_id}, "entities": [{"id": "product"}]})
        }
    }

    #[async_trait]
    impl ManifestSource for FakeSource {
        async fn get_manifest(&self, module_id: &str) -> Result<ManifestPayload, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ms) = self.delays_ms.get(module_id) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            if module_id == "broken" {
                return Err(LoadError::fetch(module_id, "HTTP 500"));
            }
            Ok(ManifestPayload {
                manifest: Self::manifest_for(module_id),
                ..ManifestPayload::default()
            })
        }

        async fn get_page_bootstrap(
            &self,
            request: &BootstrapRequest,
        ) -> Result<BootstrapPayload, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(BootstrapPayload {
                manifest: Self::manifest_for(&request.module_id),
                view_id: request.view_id.clone(),
                list: Some(vec![json!({"id": "p1"}).as_object().cloned().unwrap()]),
                manifest_hash: Some("remote-hash".into()),
                ..BootstrapPayload::default()
            })
        }
    }

    fn loader(source: FakeSource) -> (ManifestLoader, Arc<FakeSource>) {
        let source = Arc::new(source);
        let loader = ManifestLoader::new(source.clone(), ManifestCache::new(16));
        (loader, source)
    }

    fn title(state: &ManifestState) -> Option<String> {
        state.compiled()?.manifest().app.title.clone()
    }

    #[tokio::test]
    async fn load_publishes_ready_state() {
        let (loader, _) = loader(FakeSource::default());
        let compiled = loader.load_manifest("shop").await.unwrap();
        assert_eq!(compiled.index().entity_count(), 1);
        assert_eq!(title(&loader.state()).as_deref(), Some("shop"));
    }

    #[tokio::test]
    async fn second_load_hits_cache() {
        let (loader, source) = loader(FakeSource::default());
        loader.load_manifest("shop").await.unwrap();
        loader.load_manifest("shop").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_for_previous_module_is_dropped() {
        let (loader, _) = loader(FakeSource::default().with_delay("a", 100).with_delay("b", 10));

        let (a, b) = tokio::join!(loader.load_manifest("a"), loader.load_manifest("b"));

        assert!(matches!(a, Err(LoadError::Superseded(ref m)) if m == "a"));
        assert!(b.is_ok());
        assert_eq!(loader.state().module_id(), Some("b"));
        assert_eq!(title(&loader.state()).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn failure_is_reported_and_retryable() {
        let (loader, source) = loader(FakeSource::default());
        assert!(loader.load_manifest("broken").await.is_err());
        assert!(matches!(loader.state(), ManifestState::Failed { .. }));

        assert!(loader.load_manifest("broken").await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn detached_load_keeps_active_state() {
        let (loader, _) = loader(FakeSource::default());
        loader.load_manifest("shop").await.unwrap();
        let ticket = loader.begin();
        let crm = loader.load_detached("crm").await.unwrap();

        assert_eq!(crm.manifest().app.title.as_deref(), Some("crm"));
        assert!(ticket.is_current());
        assert_eq!(loader.state().module_id(), Some("shop"));
    }

    #[tokio::test]
    async fn cancel_pending_drops_result() {
        let (loader, _) = loader(FakeSource::default());
        let ticket = loader.begin();
        loader.cancel_pending();
        assert!(!ticket.is_current());
    }

    #[tokio::test]
    async fn bootstrap_versions_increase_and_populate_cache() {
        let (loader, source) = loader(FakeSource::default());
        let request = BootstrapRequest::view("shop", "product.list");

        let (compiled, first) = loader.load_bootstrap(&request).await.unwrap();
        let (_, second) = loader.load_bootstrap(&request).await.unwrap();

        assert_eq!(compiled.hash().as_str(), "remote-hash");
        assert_eq!(first.view_id.as_deref(), Some("product.list"));
        assert!(second.version > first.version);

        loader.load_manifest("shop").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn materialized_manifest_bypasses_source() {
        let (loader, source) = loader(FakeSource::default());
        let compiled = loader
            .load_materialized("preview", json!({"entities": [{"id": "a"}, {"id": "b"}]}))
            .unwrap();
        assert_eq!(compiled.index().entity_count(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(loader.state().module_id(), Some("preview"));
    }
}
