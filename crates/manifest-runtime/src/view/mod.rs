//! View state machines
//!
//! Each list or form instance owns an explicit state record:
//!
//! ```text
//! Idle → Loading → Ok
//!            ↘→ Error
//! ```
//!
//! Transitions happen only on well-defined events (load requested, load
//! completed, cancelled). Every load is tagged with a sequence number; a
//! completion carrying an outdated sequence is ignored, so a cancelled or
//! superseded fetch never mutates the surface.

pub mod form;
pub mod list;

pub use form::{FormSources, FormSurface, RecordContext};
pub use list::{ListSources, ListSurface};

use crate::error::{ErrorCode, RuntimeError};

/// Lifecycle of one view instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing loaded yet
    #[default]
    Idle,
    /// Load in flight
    Loading,
    /// Data available
    Ok,
    /// Load failed
    Error {
        /// Classification
        code: ErrorCode,
        /// Message for display
        message: String,
    },
}

impl LoadState {
    /// Error state from a runtime error
    #[must_use]
    pub fn from_error(err: &RuntimeError, message: impl Into<String>) -> Self {
        Self::Error {
            code: err.code(),
            message: message.into(),
        }
    }

    /// Whether a load is in flight
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Whether data is available
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Error message, if failed
    #[inline]
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Ticket for one load of a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSeq(u64);

/// Sequence counter shared by list and form surfaces
#[derive(Debug, Clone, Copy, Default)]
struct Sequencer {
    current: u64,
}

impl Sequencer {
    fn next(&mut self) -> LoadSeq {
        self.current += 1;
        LoadSeq(self.current)
    }

    fn is_current(self, seq: LoadSeq) -> bool {
        self.current == seq.0
    }

    fn cancel(&mut self) {
        self.current += 1;
    }
}

/// One-shot "rendered" marker keyed by a value
#[derive(Debug, Clone, Default)]
struct RenderMarker<K> {
    last: Option<K>,
}

impl<K: PartialEq> RenderMarker<K> {
    /// Returns true the first time `key` is seen in a row
    fn fire(&mut self, key: K) -> bool {
        if self.last.as_ref() == Some(&key) {
            return false;
        }
        self.last = Some(key);
        true
    }
}
