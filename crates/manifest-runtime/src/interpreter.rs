//! Interpreter session
//!
//! Ties the manifest loader, target resolver, preview sandbox, view
//! surfaces, action executor and autosave together for one host.
//!
//! # Lifecycle
//! 1. [`Interpreter::enter`] loads the module (bootstrap round trip when a
//!    target is known, plain manifest otherwise) and resolves the target
//!    with fallback. A superseded load never replaces the active session.
//! 2. Surfaces are created for the resolved views and loaded through
//!    [`Interpreter::load_list`] / [`Interpreter::load_form`].
//! 3. Actions run through [`Interpreter::executor`]; their refresh requests
//!    bump the shared [`RefreshSignal`].

use crate::actions::{decorate_actions, ActionExecutor, DecoratedAction};
use crate::autosave::{autosave_applies, AutosaveCoordinator, AutosaveEvent, AutosaveHandle, RecordSaver};
use crate::config::RuntimeConfig;
use crate::dialog::Dialogs;
use crate::error::{RuntimeError, RuntimeResult};
use crate::flash::ErrorFlash;
use crate::invalidation::{InvalidationCoalescer, RefreshSignal};
use crate::resolver::{resolve_in_manifest, Resolution};
use crate::sandbox::PreviewSandbox;
use crate::transport::{Presenter, Services};
use crate::validation::FormValidator;
use crate::view::{FormSources, FormSurface, ListSources, ListSurface, LoadState, RecordContext};
use futures::future::join_all;
use manifest_cache::{
    BootstrapLedger, BootstrapRequest, BootstrapSnapshot, ManifestCache, ManifestLoader,
};
use manifest_model::{
    ActionRef, CompiledManifest, EntityId, Record, Route, Target, TargetError, TargetKind,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Module entered by the interpreter
#[derive(Debug)]
pub struct Session {
    /// Active module
    pub module_id: String,
    /// Compiled manifest of the module
    pub compiled: Arc<CompiledManifest>,
    /// Bootstrap payload fetched at entry, if any
    pub bootstrap: Option<BootstrapSnapshot>,
    /// Resolved target
    pub resolution: Resolution,
    /// Active record
    pub record_id: Option<String>,
    generation: u64,
    consumed: BootstrapLedger,
}

impl Session {
    /// Snapshot rows for a new list surface, if still unconsumed
    ///
    /// Nothing is offered once the refresh generation moved past entry.
    fn bootstrap_list(&self, view_id: &str, generation: u64) -> Option<&BootstrapSnapshot> {
        if generation != self.generation {
            return None;
        }
        self.consumed.claim_list(self.bootstrap.as_ref(), view_id)
    }

    fn bootstrap_record(
        &self,
        view_id: &str,
        record_id: Option<&str>,
        generation: u64,
    ) -> Option<&BootstrapSnapshot> {
        if generation != self.generation {
            return None;
        }
        self.consumed
            .claim_record(self.bootstrap.as_ref(), view_id, record_id?)
    }

    /// Route of the resolved target
    #[must_use]
    pub fn route(&self) -> Route {
        let route = Route::new(self.module_id.clone(), self.resolution.target.clone());
        match &self.record_id {
            Some(id) => route.with_record(id.clone()),
            None => route,
        }
    }
}

/// Manifest interpreter
pub struct Interpreter {
    config: RuntimeConfig,
    loader: ManifestLoader,
    services: Services,
    sandbox: Arc<PreviewSandbox>,
    presenter: Arc<dyn Presenter>,
    dialogs: Dialogs,
    refresh: RefreshSignal,
    session: RwLock<Option<Arc<Session>>>,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("config", &self.config)
            .field("session", &self.session.read().as_ref().map(|s| s.module_id.clone()))
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    /// Create interpreter
    #[must_use]
    pub fn new(
        config: RuntimeConfig,
        services: Services,
        presenter: Arc<dyn Presenter>,
        dialogs: Dialogs,
    ) -> Self {
        let cache = ManifestCache::with_ttl(config.manifest_cache_capacity, config.manifest_cache_ttl());
        let loader = ManifestLoader::new(Arc::clone(&services.manifests), cache);
        Self {
            config,
            loader,
            services,
            sandbox: Arc::new(PreviewSandbox::new()),
            presenter,
            dialogs,
            refresh: RefreshSignal::new(),
            session: RwLock::new(None),
        }
    }

    /// Runtime configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Manifest loader
    #[inline]
    #[must_use]
    pub fn loader(&self) -> &ManifestLoader {
        &self.loader
    }

    /// Preview record store
    #[inline]
    #[must_use]
    pub fn sandbox(&self) -> &Arc<PreviewSandbox> {
        &self.sandbox
    }

    /// Shared refresh signal
    #[inline]
    #[must_use]
    pub fn refresh(&self) -> &RefreshSignal {
        &self.refresh
    }

    /// Active session
    #[must_use]
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.read().clone()
    }

    /// Enter a module at a target (`None` = app home)
    ///
    /// # Errors
    /// - load errors (a superseded load reports [`crate::ErrorCode::Cancelled`])
    /// - resolver errors: missing home, invalid target, nothing found
    pub async fn enter(
        &self,
        module_id: &str,
        target: Option<&str>,
        record_id: Option<String>,
    ) -> RuntimeResult<Arc<Session>> {
        let record_id = record_id.filter(|id| !id.is_empty());
        let (compiled, bootstrap) = match self.bootstrap_request(module_id, target, record_id.clone()) {
            Some(request) => {
                let (compiled, snapshot) = self.loader.load_bootstrap(&request).await?;
                (compiled, Some(snapshot))
            }
            None => (self.loader.load_manifest(module_id).await?, None),
        };
        self.settle_session(module_id, target, record_id, compiled, bootstrap)
    }

    /// Enter the module and target a route points at
    ///
    /// # Errors
    /// Same as [`Interpreter::enter`].
    pub async fn enter_route(&self, route: &Route) -> RuntimeResult<Arc<Session>> {
        let target = route.target.to_string();
        self.enter(&route.module_id, Some(&target), route.record_id.clone())
            .await
    }

    /// Enter from an `/apps/...` path
    ///
    /// # Errors
    /// [`RuntimeError::InvalidTarget`] for paths that are not app routes, then
    /// the errors of [`Interpreter::enter`].
    pub async fn enter_path(&self, path: &str) -> RuntimeResult<Arc<Session>> {
        let route = Route::parse_path(path, &self.config.record_param)
            .ok_or_else(|| TargetError::Invalid(path.to_string()))?;
        self.enter_route(&route).await
    }

    /// Enter a design-time preview of an already-materialized manifest
    ///
    /// # Errors
    /// Compile and resolver errors.
    pub fn preview(
        &self,
        module_id: &str,
        manifest: Value,
        target: Option<&str>,
    ) -> RuntimeResult<Arc<Session>> {
        let compiled = self.loader.load_materialized(module_id, manifest)?;
        self.sandbox.reset();
        self.settle_session(module_id, target, None, compiled, None)
    }

    /// Leave the active module; in-flight loads are dropped
    pub fn leave(&self) {
        self.loader.cancel_pending();
        *self.session.write() = None;
    }

    fn bootstrap_request(
        &self,
        module_id: &str,
        target: Option<&str>,
        record_id: Option<String>,
    ) -> Option<BootstrapRequest> {
        if !self.config.use_bootstrap || self.config.preview.is_preview() {
            return None;
        }
        let target = target?.trim().parse::<Target>().ok()?;
        let request = match target.kind {
            TargetKind::Page => BootstrapRequest::page(module_id, target.id),
            TargetKind::View => BootstrapRequest::view(module_id, target.id),
        };
        Some(request.with_record(record_id))
    }

    fn settle_session(
        &self,
        module_id: &str,
        target: Option<&str>,
        record_id: Option<String>,
        compiled: Arc<CompiledManifest>,
        bootstrap: Option<BootstrapSnapshot>,
    ) -> RuntimeResult<Arc<Session>> {
        let manifest = compiled.manifest();
        let resolution = resolve_in_manifest(target, manifest.app.home.as_deref(), manifest)?;
        tracing::info!(
            module_id,
            target = %resolution.target,
            fell_back = resolution.fell_back,
            bootstrap = bootstrap.is_some(),
            "entered module"
        );
        let session = Arc::new(Session {
            module_id: module_id.to_string(),
            compiled,
            bootstrap,
            resolution,
            record_id,
            generation: self.refresh.current(),
            consumed: BootstrapLedger::new(),
        });
        *self.session.write() = Some(Arc::clone(&session));
        Ok(session)
    }

    fn active(&self) -> RuntimeResult<Arc<Session>> {
        self.session().ok_or(RuntimeError::Cancelled)
    }

    fn preview_sandbox(&self) -> Option<&PreviewSandbox> {
        self.config.preview.is_preview().then_some(&*self.sandbox)
    }

    /// List surface for a view of the active module
    ///
    /// # Errors
    /// No active session, unknown view, or a view without entity.
    pub fn list_surface(&self, view_id: &str) -> RuntimeResult<ListSurface> {
        ListSurface::new(&self.active()?.compiled, view_id)
    }

    /// Form surface for a view of the active module (`None` = new record)
    ///
    /// # Errors
    /// No active session, unknown view, or a view without entity.
    pub fn form_surface(&self, view_id: &str, record_id: Option<String>) -> RuntimeResult<FormSurface> {
        FormSurface::new(&self.active()?.compiled, view_id, record_id)
    }

    /// Load a list surface at the current refresh generation
    pub async fn load_list(&self, surface: &mut ListSurface) -> LoadState {
        let session = self.session();
        let generation = self.refresh.current();
        let sandbox = self.preview_sandbox();
        let bootstrap = session
            .as_ref()
            .filter(|_| sandbox.is_none())
            .and_then(|s| s.bootstrap_list(surface.view_id(), generation));
        let sources = ListSources {
            sandbox,
            bootstrap,
            records: self.services.records.as_ref(),
        };
        surface.load(sources, generation).await.clone()
    }

    /// Load a form surface, optionally from an embedded record context
    pub async fn load_form(
        &self,
        surface: &mut FormSurface,
        context: Option<&RecordContext>,
    ) -> LoadState {
        let session = self.session();
        let sandbox = self.preview_sandbox();
        let bootstrap = session
            .as_ref()
            .filter(|_| sandbox.is_none() && context.is_none())
            .and_then(|s| {
                s.bootstrap_record(&surface.view().id, surface.record_id(), self.refresh.current())
            });
        let sources = FormSources {
            sandbox,
            context,
            bootstrap,
            records: self.services.records.as_ref(),
        };
        surface.load(sources).await.clone()
    }

    /// Action executor bound to the active module
    ///
    /// # Errors
    /// No active session.
    pub fn executor(&self) -> RuntimeResult<ActionExecutor> {
        let session = self.active()?;
        Ok(ActionExecutor::new(
            Arc::clone(&session.compiled),
            Arc::clone(&self.services.actions),
            self.dialogs.clone(),
            Arc::clone(&self.presenter),
            self.refresh.clone(),
        )
        .with_preview(self.config.preview, Arc::clone(&self.sandbox)))
    }

    /// Header actions decorated for the rendering layer
    ///
    /// # Errors
    /// No active session.
    pub fn decorated_actions(&self, refs: &[ActionRef], draft: &Record) -> RuntimeResult<Vec<DecoratedAction>> {
        Ok(decorate_actions(self.active()?.compiled.manifest(), refs, draft))
    }

    /// Validator for a form surface
    ///
    /// # Errors
    /// No active session.
    pub fn validator(&self, surface: &FormSurface) -> RuntimeResult<FormValidator> {
        Ok(FormValidator::for_view(&self.active()?.compiled, surface.view()))
    }

    /// Start autosave for a form surface when it applies
    ///
    /// The surface's loaded record is the baseline; feed the returned events
    /// back through [`FormSurface::apply_autosave`].
    pub fn autosave_for(
        &self,
        surface: &FormSurface,
    ) -> Option<(AutosaveHandle, mpsc::UnboundedReceiver<AutosaveEvent>)> {
        let view = surface.view();
        if !autosave_applies(view, surface.record_id(), self.config.preview) {
            return None;
        }
        let session = self.session()?;
        let record_id = surface.record_id()?;
        let debounce = self.config.autosave_debounce(view.auto_save_debounce_ms);
        tracing::debug!(view_id = %view.id, record_id, ?debounce, "autosave enabled");
        let saver = RecordSaver::new(
            Arc::clone(&self.services.records),
            surface.entity().clone(),
            record_id,
        );
        let validator = FormValidator::for_view(&session.compiled, view);
        let coordinator = AutosaveCoordinator::new(debounce, validator, Arc::new(saver))
            .with_baseline(surface.initial().clone())
            .with_presenter(Arc::clone(&self.presenter));
        Some(coordinator.spawn())
    }

    /// Coalescer feeding the shared refresh signal
    #[must_use]
    pub fn coalescer(&self) -> InvalidationCoalescer {
        InvalidationCoalescer::spawn(self.config.invalidation_debounce(), self.refresh.clone())
    }

    /// Error flash with the configured hold window
    #[must_use]
    pub fn error_flash(&self) -> ErrorFlash {
        ErrorFlash::new(self.config.error_flash_hold())
    }

    /// Route opening a new-record form for an entity
    ///
    /// The active module is used when it declares the entity; otherwise the
    /// registry is asked for modules declaring it.
    ///
    /// # Errors
    /// [`RuntimeError::EntityNotFound`] if no module offers a form for it.
    pub async fn open_create(&self, entity: &EntityId) -> RuntimeResult<Route> {
        let session = self.active()?;
        let manifest = session.compiled.manifest();
        if manifest.entity(entity).is_some() {
            return manifest
                .default_form_target(entity)
                .map(|target| Route::new(session.module_id.clone(), target))
                .ok_or_else(|| RuntimeError::EntityNotFound(entity.to_string()));
        }

        let Some(registry) = &self.services.registry else {
            return Err(RuntimeError::EntityNotFound(entity.to_string()));
        };
        let modules = registry.list_modules().await?;
        let (mut declaring, others): (Vec<_>, Vec<_>) = modules
            .into_iter()
            .filter(|m| m.module_id != session.module_id)
            .partition(|m| m.entities.contains(entity));
        if declaring.is_empty() {
            declaring = others;
        }
        tracing::debug!(entity = %entity, candidates = declaring.len(), "cross-module create lookup");

        let loads = declaring.iter().map(|m| self.loader.load_detached(&m.module_id));
        let found = declaring
            .iter()
            .zip(join_all(loads).await)
            .find_map(|(module, loaded)| match loaded {
                Ok(compiled) => compiled
                    .manifest()
                    .default_form_target(entity)
                    .filter(|_| compiled.manifest().entity(entity).is_some())
                    .map(|target| Route::new(module.module_id.clone(), target)),
                Err(err) => {
                    tracing::warn!(module_id = %module.module_id, error = %err, "skipping module");
                    None
                }
            });
        found.ok_or_else(|| RuntimeError::EntityNotFound(entity.to_string()))
    }
}
