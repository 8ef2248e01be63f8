//! Page bootstrap snapshots
//!
//! A bootstrap carries the list rows or record prefetched together with the
//! manifest when a page/view is entered directly. Each snapshot has a
//! version; a surface applies a given version at most once, tracked by its
//! [`BootstrapMarker`]. Once a live refresh has happened the marker already
//! holds that version, so the stale snapshot is never re-applied.
//!
//! Surfaces created later in the same session start with a fresh marker, so
//! the session keeps a [`BootstrapLedger`] as well: each version is handed to
//! one list and one form surface per view, never twice.

use manifest_model::{record_id, ManifestHash, Record};
use parking_lot::Mutex;
use std::collections::HashSet;

/// Prefetched payload for the surface being entered
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSnapshot {
    /// View the payload belongs to
    pub view_id: Option<String>,
    /// Page being entered
    pub page_id: Option<String>,
    /// Record requested at entry
    pub record_id: Option<String>,
    /// Prefetched list rows
    pub list: Option<Vec<Record>>,
    /// Prefetched record
    pub record: Option<Record>,
    /// Fingerprint of the manifest the payload was computed against
    pub manifest_hash: ManifestHash,
    /// Monotonic version token
    pub version: u64,
}

impl BootstrapSnapshot {
    fn serves_view(&self, view_id: &str) -> bool {
        self.view_id.as_deref() == Some(view_id)
    }

    fn serves_record(&self, wanted: &str) -> bool {
        self.record_id.as_deref() == Some(wanted)
            || self
                .record
                .as_ref()
                .and_then(record_id)
                .is_some_and(|id| id == wanted)
    }
}

/// Per-surface "used version" marker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapMarker {
    used_version: Option<u64>,
}

impl BootstrapMarker {
    /// Fresh marker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last version consumed by this surface
    #[inline]
    #[must_use]
    pub fn used_version(&self) -> Option<u64> {
        self.used_version
    }

    /// Record that the surface moved past `version` without consuming it
    ///
    /// Called after a live load so a late-arriving snapshot of the same
    /// version cannot overwrite fresher data.
    pub fn retire(&mut self, version: u64) {
        self.used_version = Some(self.used_version.map_or(version, |v| v.max(version)));
    }

    fn is_fresh(&self, snapshot: &BootstrapSnapshot) -> bool {
        self.used_version.map_or(true, |used| snapshot.version > used)
    }

    /// Consume prefetched list rows for `view_id`
    pub fn take_list(
        &mut self,
        snapshot: Option<&BootstrapSnapshot>,
        view_id: &str,
    ) -> Option<Vec<Record>> {
        let snapshot = snapshot.filter(|s| self.is_fresh(s) && s.serves_view(view_id))?;
        let rows = snapshot.list.clone()?;
        self.used_version = Some(snapshot.version);
        Some(rows)
    }

    /// Consume the prefetched record for `view_id` / `record_id`
    pub fn take_record(
        &mut self,
        snapshot: Option<&BootstrapSnapshot>,
        view_id: &str,
        record_id: &str,
    ) -> Option<Record> {
        let snapshot = snapshot
            .filter(|s| self.is_fresh(s) && s.serves_view(view_id) && s.serves_record(record_id))?;
        let record = snapshot.record.clone()?;
        self.used_version = Some(snapshot.version);
        Some(record)
    }
}

/// Surface kind a snapshot is claimed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// List surface consuming prefetched rows
    List,
    /// Form surface consuming the prefetched record
    Form,
}

/// Session-wide record of snapshot versions already handed out
#[derive(Debug, Default)]
pub struct BootstrapLedger {
    claimed: Mutex<HashSet<(SurfaceKind, String, u64)>>,
}

impl BootstrapLedger {
    /// Empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the prefetched rows of `view_id` for one list surface
    pub fn claim_list<'s>(
        &self,
        snapshot: Option<&'s BootstrapSnapshot>,
        view_id: &str,
    ) -> Option<&'s BootstrapSnapshot> {
        let snapshot = snapshot.filter(|s| s.serves_view(view_id) && s.list.is_some())?;
        self.claim(SurfaceKind::List, view_id, snapshot)
    }

    /// Claim the prefetched record of `view_id` for one form surface
    pub fn claim_record<'s>(
        &self,
        snapshot: Option<&'s BootstrapSnapshot>,
        view_id: &str,
        record_id: &str,
    ) -> Option<&'s BootstrapSnapshot> {
        let snapshot = snapshot.filter(|s| {
            s.serves_view(view_id) && s.record.is_some() && s.serves_record(record_id)
        })?;
        self.claim(SurfaceKind::Form, view_id, snapshot)
    }

    /// Whether `version` was already claimed for `kind` / `view_id`
    #[must_use]
    pub fn is_claimed(&self, kind: SurfaceKind, view_id: &str, version: u64) -> bool {
        self.claimed
            .lock()
            .contains(&(kind, view_id.to_string(), version))
    }

    fn claim<'s>(
        &self,
        kind: SurfaceKind,
        view_id: &str,
        snapshot: &'s BootstrapSnapshot,
    ) -> Option<&'s BootstrapSnapshot> {
        let fresh = self
            .claimed
            .lock()
            .insert((kind, view_id.to_string(), snapshot.version));
        if !fresh {
            tracing::debug!(view_id, version = snapshot.version, ?kind, "bootstrap already consumed");
        }
        fresh.then_some(snapshot)
    }
}
