//! Refresh signal and background invalidation
//!
//! [`RefreshSignal`] is the monotonically increasing refresh generation that
//! list and form surfaces watch. Record-store change notifications enter the
//! [`InvalidationCoalescer`], which debounces them and emits one
//! [`Invalidation`] per quiet window, bumping the refresh generation once.

use manifest_model::EntityId;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Shared refresh generation
#[derive(Debug, Clone)]
pub struct RefreshSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl RefreshSignal {
    /// Create a signal at generation 0
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Request a refresh, returning the new generation
    pub fn bump(&self) -> u64 {
        let mut next = 0;
        self.tx.send_modify(|generation| {
            *generation += 1;
            next = *generation;
        });
        next
    }

    /// Current generation
    #[inline]
    #[must_use]
    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Subscribe to generation changes
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for RefreshSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw change notification from the record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Entity that changed
    pub entity: EntityId,
    /// Changed record, if known
    pub record_id: Option<String>,
}

impl ChangeEvent {
    /// Change of an entity
    #[inline]
    #[must_use]
    pub fn entity(entity: EntityId) -> Self {
        Self {
            entity,
            record_id: None,
        }
    }
}

/// Coalesced invalidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    /// Entities changed during the window
    pub entities: BTreeSet<EntityId>,
    /// Refresh generation after the bump
    pub generation: u64,
}

/// Handle to the running coalescer
#[derive(Debug)]
pub struct InvalidationCoalescer {
    events: mpsc::UnboundedSender<ChangeEvent>,
    invalidations: broadcast::Sender<Invalidation>,
    task: JoinHandle<()>,
}

impl InvalidationCoalescer {
    /// Spawn the coalescer on the current runtime
    #[must_use]
    pub fn spawn(debounce: Duration, refresh: RefreshSignal) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let (invalidations, _) = broadcast::channel(16);
        let task = tokio::spawn(run(debounce, refresh, rx, invalidations.clone()));
        Self {
            events,
            invalidations,
            task,
        }
    }

    /// Feed a raw change event
    pub fn notify(&self, event: ChangeEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("invalidation coalescer stopped, dropping change event");
        }
    }

    /// Sender for change-feed adapters
    #[inline]
    #[must_use]
    pub fn sender(&self) -> mpsc::UnboundedSender<ChangeEvent> {
        self.events.clone()
    }

    /// Subscribe to coalesced invalidations
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.invalidations.subscribe()
    }
}

impl Drop for InvalidationCoalescer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    debounce: Duration,
    refresh: RefreshSignal,
    mut rx: mpsc::UnboundedReceiver<ChangeEvent>,
    out: broadcast::Sender<Invalidation>,
) {
    let mut pending: BTreeSet<EntityId> = BTreeSet::new();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    pending.insert(event.entity);
                    deadline = Some(Instant::now() + debounce);
                }
                None => break,
            },
            () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                let generation = refresh.bump();
                let entities = std::mem::take(&mut pending);
                tracing::debug!(entities = entities.len(), generation, "coalesced invalidation");
                let _ = out.send(Invalidation { entities, generation });
            }
        }
    }
}
