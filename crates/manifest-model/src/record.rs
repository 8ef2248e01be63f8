//! Records and drafts
//!
//! Records are plain JSON objects. The helpers here cover the few operations
//! the runtime needs: missing-value checks, id extraction and shallow patch
//! merging with undo information.

use serde_json::{Map, Value};

/// A record as returned by the record API
pub type Record = Map<String, Value>;

/// Field holding the record id
pub const ID_FIELD: &str = "id";

/// Whether a field value counts as missing (absent, null or `""`)
#[inline]
#[must_use]
pub fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Read the record id as a string (numeric ids are stringified)
#[must_use]
pub fn record_id(record: &Record) -> Option<String> {
    match record.get(ID_FIELD)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Previous values of the fields touched by a patch
///
/// `None` means the field was absent before the patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchUndo {
    previous: Vec<(String, Option<Value>)>,
}

impl PatchUndo {
    /// Whether the patch touched nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }

    /// Restore the record to its pre-patch state
    pub fn rollback(self, record: &mut Record) {
        for (key, previous) in self.previous.into_iter().rev() {
            match previous {
                Some(value) => {
                    record.insert(key, value);
                }
                None => {
                    record.remove(&key);
                }
            }
        }
    }
}

/// Shallow-merge `patch` into `record`, returning the undo information
pub fn merge_patch(record: &mut Record, patch: &Record) -> PatchUndo {
    let previous = patch
        .iter()
        .map(|(key, value)| (key.clone(), record.insert(key.clone(), value.clone())))
        .collect();
    PatchUndo { previous }
}
