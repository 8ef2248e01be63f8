//! List surface
//!
//! Rows come from, in priority order: the preview sandbox (in preview mode),
//! an unconsumed bootstrap snapshot for this view, or a live fetch projected
//! to the view's columns plus the entity display field.

use super::{LoadSeq, LoadState, RenderMarker, Sequencer};
use crate::error::{ErrorCode, RuntimeError, RuntimeResult};
use crate::sandbox::PreviewSandbox;
use crate::transport::RecordApi;
use manifest_cache::{BootstrapMarker, BootstrapSnapshot};
use manifest_model::{record_id, CompiledManifest, EntityId, ModelError, Record};
use std::collections::BTreeSet;

/// Where a list load may take its rows from
#[derive(Clone, Copy)]
pub struct ListSources<'a> {
    /// Preview sandbox, when previewing
    pub sandbox: Option<&'a PreviewSandbox>,
    /// Bootstrap snapshot of the current entry
    pub bootstrap: Option<&'a BootstrapSnapshot>,
    /// Live record store
    pub records: &'a dyn RecordApi,
}

/// State of one list view instance
#[derive(Debug)]
pub struct ListSurface {
    view_id: String,
    entity: EntityId,
    fields: Vec<String>,
    state: LoadState,
    rows: Vec<Record>,
    selection: BTreeSet<String>,
    bootstrap: BootstrapMarker,
    seq: Sequencer,
    loading_generation: u64,
    generation: Option<u64>,
    rendered: RenderMarker<u64>,
}

impl ListSurface {
    /// Create surface for a list view
    ///
    /// # Errors
    /// - [`ModelError::UnknownView`] if the view is not declared
    /// - [`RuntimeError::EntityNotFound`] if the view has no entity
    pub fn new(compiled: &CompiledManifest, view_id: &str) -> RuntimeResult<Self> {
        let view = compiled
            .manifest()
            .view(view_id)
            .ok_or_else(|| ModelError::UnknownView(view_id.to_string()))?;
        let entity = view
            .entity
            .clone()
            .ok_or_else(|| RuntimeError::EntityNotFound(format!("view '{view_id}' has no entity")))?;
        Ok(Self {
            view_id: view_id.to_string(),
            entity,
            fields: compiled.list_projection(view),
            state: LoadState::Idle,
            rows: Vec::new(),
            selection: BTreeSet::new(),
            bootstrap: BootstrapMarker::new(),
            seq: Sequencer::default(),
            loading_generation: 0,
            generation: None,
            rendered: RenderMarker::default(),
        })
    }

    /// View id
    #[inline]
    #[must_use]
    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    /// Entity listed
    #[inline]
    #[must_use]
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    /// Projected fields requested from the record store
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Loaded rows
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Refresh generation of the loaded rows
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    /// Load rows for refresh `generation`
    pub async fn load(&mut self, sources: ListSources<'_>, generation: u64) -> &LoadState {
        let seq = self.begin_load(generation);
        let result = self.fetch(sources).await;
        self.finish_load(seq, result);
        &self.state
    }

    /// Enter `Loading` and return the ticket for the completion
    pub fn begin_load(&mut self, generation: u64) -> LoadSeq {
        self.state = LoadState::Loading;
        self.loading_generation = generation;
        self.seq.next()
    }

    /// Apply a completed load; ignored (returns false) if superseded or cancelled
    pub fn finish_load(&mut self, seq: LoadSeq, result: RuntimeResult<Vec<Record>>) -> bool {
        if !self.seq.is_current(seq) {
            tracing::debug!(view_id = %self.view_id, "ignoring stale list completion");
            return false;
        }
        match result {
            Ok(rows) => {
                self.rows = rows;
                self.selection.clear();
                self.generation = Some(self.loading_generation);
                self.state = LoadState::Ok;
            }
            Err(err) => {
                let message = if err.code() == ErrorCode::EntityNotFound {
                    format!("Entity not found: {}", self.entity)
                } else {
                    format!("Failed to load records: {err}")
                };
                tracing::warn!(view_id = %self.view_id, error = %err, "list load failed");
                self.state = LoadState::from_error(&err, message);
            }
        }
        true
    }

    /// Ignore any in-flight completion (surface unmounted or navigated away)
    pub fn cancel(&mut self) {
        self.seq.cancel();
        if self.state.is_loading() {
            self.state = LoadState::Idle;
        }
    }

    async fn fetch(&mut self, sources: ListSources<'_>) -> RuntimeResult<Vec<Record>> {
        if let Some(sandbox) = sources.sandbox {
            return Ok(sandbox.list(&self.entity));
        }
        if let Some(rows) = self.bootstrap.take_list(sources.bootstrap, &self.view_id) {
            tracing::debug!(view_id = %self.view_id, rows = rows.len(), "list served from bootstrap");
            return Ok(rows);
        }
        if let Some(snapshot) = sources.bootstrap {
            self.bootstrap.retire(snapshot.version);
        }
        Ok(sources.records.list(&self.entity, &self.fields).await?)
    }

    /// Toggle a row; returns whether it is now selected
    pub fn toggle_selection(&mut self, id: &str) -> bool {
        if self.selection.remove(id) {
            false
        } else {
            self.selection.insert(id.to_string());
            true
        }
    }

    /// Select every loaded row
    pub fn select_all(&mut self) {
        self.selection = self.rows.iter().filter_map(record_id).collect();
    }

    /// Clear the selection
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected row ids
    #[must_use]
    pub fn selected_ids(&self) -> Vec<String> {
        self.selection.iter().cloned().collect()
    }

    /// Signal "rendered"; true at most once per refresh generation
    pub fn mark_rendered(&mut self) -> bool {
        match (self.state.is_ok(), self.generation) {
            (true, Some(generation)) => self.rendered.fire(generation),
            _ => false,
        }
    }
}
