//! Form surface
//!
//! The record comes from, in priority order: the preview sandbox, an
//! externally supplied record context (a content block embedding the form),
//! an unconsumed bootstrap snapshot, or a live fetch. Without a record id the
//! form edits a new record and nothing is fetched.
//!
//! The surface owns the draft and the initial snapshot it is compared with;
//! the form is dirty whenever the two differ.

use super::{LoadSeq, LoadState, RenderMarker, Sequencer};
use crate::autosave::AutosaveEvent;
use crate::error::{ErrorCode, RuntimeError, RuntimeResult};
use crate::sandbox::PreviewSandbox;
use crate::transport::RecordApi;
use manifest_cache::{BootstrapMarker, BootstrapSnapshot};
use manifest_model::{
    merge_patch, CompiledManifest, EntityId, ModelError, PatchUndo, Record, View,
};
use serde_json::Value;

/// Record supplied by the embedding surface
#[derive(Debug, Clone, PartialEq)]
pub enum RecordContext {
    /// Embedding surface is still loading
    Loading,
    /// Embedding surface failed
    Failed(String),
    /// Record available
    Ready(Record),
}

/// Where a form load may take its record from
#[derive(Clone, Copy)]
pub struct FormSources<'a> {
    /// Preview sandbox, when previewing
    pub sandbox: Option<&'a PreviewSandbox>,
    /// Record supplied by an embedding content block
    pub context: Option<&'a RecordContext>,
    /// Bootstrap snapshot of the current entry
    pub bootstrap: Option<&'a BootstrapSnapshot>,
    /// Live record store
    pub records: &'a dyn RecordApi,
}

/// State of one form view instance
#[derive(Debug)]
pub struct FormSurface {
    view: View,
    entity: EntityId,
    record_id: Option<String>,
    state: LoadState,
    draft: Record,
    initial: Record,
    bootstrap: BootstrapMarker,
    seq: Sequencer,
    rendered: RenderMarker<Option<String>>,
}

impl FormSurface {
    /// Create surface for a form view and record (`None` = new record)
    ///
    /// # Errors
    /// - [`ModelError::UnknownView`] if the view is not declared
    /// - [`RuntimeError::EntityNotFound`] if the view has no entity
    pub fn new(
        compiled: &CompiledManifest,
        view_id: &str,
        record_id: Option<String>,
    ) -> RuntimeResult<Self> {
        let view = compiled
            .manifest()
            .view(view_id)
            .ok_or_else(|| ModelError::UnknownView(view_id.to_string()))?;
        let entity = view
            .entity
            .clone()
            .ok_or_else(|| RuntimeError::EntityNotFound(format!("view '{view_id}' has no entity")))?;
        Ok(Self {
            view: view.clone(),
            entity,
            record_id: record_id.filter(|id| !id.is_empty()),
            state: LoadState::Idle,
            draft: Record::new(),
            initial: Record::new(),
            bootstrap: BootstrapMarker::new(),
            seq: Sequencer::default(),
            rendered: RenderMarker::default(),
        })
    }

    /// View declaration
    #[inline]
    #[must_use]
    pub fn view(&self) -> &View {
        &self.view
    }

    /// Entity edited
    #[inline]
    #[must_use]
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    /// Record being edited
    #[inline]
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    /// Whether the form edits a not-yet-created record
    #[inline]
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.record_id.is_none()
    }

    /// Lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Working copy
    #[inline]
    #[must_use]
    pub fn draft(&self) -> &Record {
        &self.draft
    }

    /// Snapshot the draft is compared with
    #[inline]
    #[must_use]
    pub fn initial(&self) -> &Record {
        &self.initial
    }

    /// Whether the draft differs from the initial snapshot
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.draft != self.initial
    }

    /// Switch to another record; pending loads are dropped
    pub fn set_record_id(&mut self, record_id: Option<String>) {
        let record_id = record_id.filter(|id| !id.is_empty());
        if record_id == self.record_id {
            return;
        }
        self.seq.cancel();
        self.record_id = record_id;
        self.state = LoadState::Idle;
        self.draft.clear();
        self.initial.clear();
    }

    /// Load the record
    pub async fn load(&mut self, sources: FormSources<'_>) -> &LoadState {
        let seq = self.seq.next();
        self.state = LoadState::Loading;

        let Some(record_id) = self.record_id.clone() else {
            let seeded = match sources.context {
                Some(RecordContext::Ready(record)) => record.clone(),
                _ => Record::new(),
            };
            self.finish_load(seq, Ok(seeded));
            return &self.state;
        };

        if let Some(sandbox) = sources.sandbox {
            let result = sandbox
                .get(&self.entity, &record_id)
                .ok_or_else(|| RuntimeError::RecordNotFound(record_id.clone()));
            self.finish_load(seq, result);
            return &self.state;
        }

        match sources.context {
            Some(RecordContext::Loading) => return &self.state,
            Some(RecordContext::Failed(message)) => {
                self.state = LoadState::Error {
                    code: ErrorCode::LoadFailed,
                    message: message.clone(),
                };
                return &self.state;
            }
            Some(RecordContext::Ready(record)) => {
                self.finish_load(seq, Ok(record.clone()));
                return &self.state;
            }
            None => {}
        }

        if let Some(record) = self
            .bootstrap
            .take_record(sources.bootstrap, &self.view.id, &record_id)
        {
            tracing::debug!(view_id = %self.view.id, record_id = %record_id, "record served from bootstrap");
            self.finish_load(seq, Ok(record));
            return &self.state;
        }
        if let Some(snapshot) = sources.bootstrap {
            self.bootstrap.retire(snapshot.version);
        }

        let result = sources
            .records
            .get(&self.entity, &record_id)
            .await
            .map_err(RuntimeError::from);
        self.finish_load(seq, result);
        &self.state
    }

    /// Start a load whose completion is delivered later
    pub fn begin_load(&mut self) -> LoadSeq {
        self.state = LoadState::Loading;
        self.seq.next()
    }

    /// Apply a completed load; ignored (returns false) if superseded or cancelled
    pub fn finish_load(&mut self, seq: LoadSeq, result: RuntimeResult<Record>) -> bool {
        if !self.seq.is_current(seq) {
            tracing::debug!(view_id = %self.view.id, "ignoring stale form completion");
            return false;
        }
        match result {
            Ok(record) => {
                self.initial.clone_from(&record);
                self.draft = record;
                self.state = LoadState::Ok;
            }
            Err(err) => {
                let message = match err.code() {
                    ErrorCode::RecordNotFound => "Record not found".to_string(),
                    ErrorCode::EntityNotFound => format!("Entity not found: {}", self.entity),
                    _ => format!("Failed to load record: {err}"),
                };
                tracing::warn!(view_id = %self.view.id, error = %err, "form load failed");
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

    /// Set one field of the draft
    pub fn set_field(&mut self, field: impl Into<String>, value: Value) {
        self.draft.insert(field.into(), value);
    }

    /// Merge a patch into the draft, returning what is needed to undo it
    pub fn apply_patch(&mut self, patch: &Record) -> PatchUndo {
        merge_patch(&mut self.draft, patch)
    }

    /// Undo a previously applied patch
    pub fn rollback(&mut self, undo: PatchUndo) {
        undo.rollback(&mut self.draft);
    }

    /// Mutable draft, for callers that patch it directly
    #[inline]
    pub fn draft_mut(&mut self) -> &mut Record {
        &mut self.draft
    }

    /// Discard edits
    pub fn revert(&mut self) {
        self.draft.clone_from(&self.initial);
    }

    /// Accept a save; the stored record (if returned) becomes the new baseline
    pub fn mark_saved(&mut self, saved: Option<Record>) {
        match saved {
            Some(record) => {
                self.initial.clone_from(&record);
                self.draft = record;
            }
            None => self.initial.clone_from(&self.draft),
        }
    }

    /// Follow autosave progress
    ///
    /// A saved record becomes the new baseline; edits made while the save was
    /// in flight stay in the draft. A failed save reverts the draft.
    pub fn apply_autosave(&mut self, event: &AutosaveEvent) {
        match event {
            AutosaveEvent::Saved(stored) => {
                let edits: Vec<(String, Value)> = self
                    .draft
                    .iter()
                    .filter(|(field, value)| self.initial.get(*field) != Some(*value))
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect();
                self.initial.clone_from(stored);
                self.draft.clone_from(stored);
                for (field, value) in edits {
                    if stored.get(&field) != Some(&value) {
                        self.draft.insert(field, value);
                    }
                }
            }
            AutosaveEvent::Failed(_) => self.revert(),
            AutosaveEvent::Saving | AutosaveEvent::Skipped(_) => {}
        }
    }

    /// Signal "rendered"; true at most once per record id
    pub fn mark_rendered(&mut self) -> bool {
        self.state.is_ok() && self.rendered.fire(self.record_id.clone())
    }
}
