//! Confirm/prompt side channel
//!
//! The interpreter asks the presentation layer for confirmation by sending a
//! [`DialogRequest`] and suspending until the attached responder is resolved.
//! A responder resolves at most once; a dropped responder (or a presentation
//! layer that went away) counts as declined.

use manifest_model::ConfirmPrompt;
use tokio::sync::{mpsc, oneshot};

/// Resolve-once answer slot
#[derive(Debug)]
pub struct DialogResponder<T> {
    tx: Option<oneshot::Sender<T>>,
}

impl<T> DialogResponder<T> {
    fn new(tx: oneshot::Sender<T>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Resolve the dialog; returns false if it was already resolved
    pub fn resolve(&mut self, value: T) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Whether the dialog is still waiting for an answer
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

/// Request sent to the presentation layer
#[derive(Debug)]
pub enum DialogRequest {
    /// Yes/no confirmation
    Confirm {
        /// Prompt content
        prompt: ConfirmPrompt,
        /// Answer slot
        responder: DialogResponder<bool>,
    },
    /// Free-text prompt
    Prompt {
        /// Dialog title
        title: String,
        /// Prefilled value
        initial: Option<String>,
        /// Answer slot (`None` = cancelled)
        responder: DialogResponder<Option<String>>,
    },
}

/// Interpreter side of the dialog channel
#[derive(Debug, Clone)]
pub struct Dialogs {
    tx: mpsc::Sender<DialogRequest>,
}

impl Dialogs {
    /// Create the channel; the receiver goes to the presentation layer
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DialogRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Ask for confirmation and wait for the answer
    pub async fn confirm(&self, prompt: ConfirmPrompt) -> bool {
        let (tx, rx) = oneshot::channel();
        let request = DialogRequest::Confirm {
            prompt,
            responder: DialogResponder::new(tx),
        };
        if self.tx.send(request).await.is_err() {
            tracing::warn!("no dialog presenter attached, treating confirmation as declined");
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Ask for a text value and wait for the answer
    pub async fn prompt(&self, title: impl Into<String>, initial: Option<String>) -> Option<String> {
        let (tx, rx) = oneshot::channel();
        let request = DialogRequest::Prompt {
            title: title.into(),
            initial,
            responder: DialogResponder::new(tx),
        };
        if self.tx.send(request).await.is_err() {
            tracing::warn!("no dialog presenter attached, treating prompt as cancelled");
            return None;
        }
        rx.await.ok().flatten()
    }
}
