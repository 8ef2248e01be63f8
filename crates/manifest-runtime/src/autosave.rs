//! Autosave coordinator
//!
//! One actor task per form instance. Every change that leaves the draft
//! dirty (different from the last loaded or saved baseline) restarts the
//! debounce timer; a change back to the baseline cancels it. When the timer
//! fires the latest draft is validated and, if complete, saved.
//!
//! A failed save is reported as an error notice; the form reverts its draft
//! through [`FormSurface::apply_autosave`](crate::view::FormSurface::apply_autosave).
//!
//! # Concurrency
//! At most one save is in flight. A save requested while another is running
//! sets the `pending` flag; when the running save completes exactly one
//! follow-up save of the latest draft is started (re-validated first).
//! Incomplete drafts are skipped silently.

use crate::config::PreviewMode;
use crate::error::ApiError;
use crate::transport::{Notice, Presenter, RecordApi};
use crate::validation::{FormValidator, ValidationErrors};
use async_trait::async_trait;
use manifest_model::{EntityId, Record, View};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Persists a form draft
#[async_trait]
pub trait DraftSaver: Send + Sync {
    /// Save the draft, returning the stored record
    async fn save(&self, draft: Record) -> Result<Record, ApiError>;
}

/// Saves through the record store (`PUT /records/{entity}/{id}`)
pub struct RecordSaver {
    records: Arc<dyn RecordApi>,
    entity: EntityId,
    record_id: String,
}

impl RecordSaver {
    /// Saver for one record
    #[must_use]
    pub fn new(records: Arc<dyn RecordApi>, entity: EntityId, record_id: impl Into<String>) -> Self {
        Self {
            records,
            entity,
            record_id: record_id.into(),
        }
    }
}

#[async_trait]
impl DraftSaver for RecordSaver {
    async fn save(&self, draft: Record) -> Result<Record, ApiError> {
        self.records.update(&self.entity, &self.record_id, &draft).await
    }
}

/// Whether autosave applies: auto-save form view, existing record, no preview
#[must_use]
pub fn autosave_applies(view: &View, record_id: Option<&str>, preview: PreviewMode) -> bool {
    manifest_model::CompiledManifest::is_auto_save_form(view)
        && record_id.is_some_and(|id| !id.is_empty())
        && !preview.is_preview()
}

/// Progress reported by the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum AutosaveEvent {
    /// Draft incomplete, save skipped
    Skipped(ValidationErrors),
    /// Save started
    Saving,
    /// Save completed
    Saved(Record),
    /// Save failed
    Failed(String),
}

enum Command {
    Changed(Record),
    Flush,
}

/// Handle to a running coordinator; dropping it stops the actor
#[derive(Debug)]
pub struct AutosaveHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Changed(_) => f.write_str("Changed"),
            Self::Flush => f.write_str("Flush"),
        }
    }
}

impl AutosaveHandle {
    /// Report the current draft after a change
    pub fn draft_changed(&self, draft: Record) {
        if self.commands.send(Command::Changed(draft)).is_err() {
            tracing::debug!("autosave stopped, ignoring draft change");
        }
    }

    /// Save now instead of waiting for the debounce
    pub fn flush(&self) {
        let _ = self.commands.send(Command::Flush);
    }

    /// Stop the coordinator; pending timers are cancelled
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Autosave actor
pub struct AutosaveCoordinator {
    debounce: Duration,
    validator: FormValidator,
    saver: Arc<dyn DraftSaver>,
    baseline: Record,
    presenter: Option<Arc<dyn Presenter>>,
}

impl AutosaveCoordinator {
    /// Create coordinator
    #[must_use]
    pub fn new(debounce: Duration, validator: FormValidator, saver: Arc<dyn DraftSaver>) -> Self {
        Self {
            debounce,
            validator,
            saver,
            baseline: Record::new(),
            presenter: None,
        }
    }

    /// With the record the draft starts from
    #[must_use]
    pub fn with_baseline(mut self, baseline: Record) -> Self {
        self.baseline = baseline;
        self
    }

    /// With the presenter receiving save-failure notices
    #[must_use]
    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Spawn on the current runtime
    #[must_use]
    pub fn spawn(self) -> (AutosaveHandle, mpsc::UnboundedReceiver<AutosaveEvent>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx, events));
        (AutosaveHandle { commands, task }, events_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<AutosaveEvent>,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Result<Record, ApiError>>();
        let mut latest: Option<Record> = None;
        let mut deadline: Option<Instant> = None;
        let mut in_flight = false;
        let mut pending = false;

        loop {
            let fire = tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Changed(draft)) => {
                        deadline = if draft == self.baseline && !in_flight {
                            tracing::debug!("draft back at baseline, autosave cancelled");
                            None
                        } else {
                            Some(Instant::now() + self.debounce)
                        };
                        latest = Some(draft);
                        false
                    }
                    Some(Command::Flush) => {
                        deadline = None;
                        latest.is_some()
                    }
                    None => break,
                },
                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    true
                }
                Some(result) = done_rx.recv(), if in_flight => {
                    in_flight = false;
                    let event = match result {
                        Ok(saved) => {
                            self.baseline.clone_from(&saved);
                            AutosaveEvent::Saved(saved)
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "autosave failed");
                            if let Some(presenter) = &self.presenter {
                                presenter.notify(Notice::error(format!("Autosave failed: {err}")));
                            }
                            latest = None;
                            deadline = None;
                            pending = false;
                            AutosaveEvent::Failed(err.to_string())
                        }
                    };
                    let _ = events.send(event);
                    std::mem::take(&mut pending)
                }
            };

            if !fire {
                continue;
            }
            let Some(draft) = latest.clone() else {
                continue;
            };
            if draft == self.baseline && !in_flight {
                continue;
            }

            let errors = self.validator.validate(&draft);
            if !errors.is_empty() {
                tracing::debug!(missing = errors.len(), "autosave skipped, draft incomplete");
                let _ = events.send(AutosaveEvent::Skipped(errors));
                continue;
            }

            if in_flight {
                tracing::debug!("save in flight, marking follow-up");
                pending = true;
                continue;
            }

            in_flight = true;
            let _ = events.send(AutosaveEvent::Saving);
            let saver = Arc::clone(&self.saver);
            let done = done_tx.clone();
            tokio::spawn(async move {
                let _ = done.send(saver.save(draft).await);
            });
        }
    }
}
