//! Preview sandbox
//!
//! In-memory record store standing in for the backend while a manifest is
//! previewed. Each entity keeps its records plus an order list; creates go to
//! the head of the order, updates keep their position.
//!
//! Every mutation bumps a store version published through a `watch` channel;
//! surfaces re-read the sandbox when the version changes.

use manifest_model::{EntityId, Record, ID_FIELD};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::watch;
use ulid::Ulid;

/// Prefix of synthesized record ids
pub const PREVIEW_ID_PREFIX: &str = "preview-";

#[derive(Debug, Default)]
struct EntityStore {
    records: HashMap<String, Record>,
    order: Vec<String>,
}

/// In-memory per-entity record store
#[derive(Debug)]
pub struct PreviewSandbox {
    stores: Mutex<HashMap<EntityId, EntityStore>>,
    version: watch::Sender<u64>,
}

impl PreviewSandbox {
    /// Create an empty sandbox
    #[must_use]
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            stores: Mutex::new(HashMap::new()),
            version,
        }
    }

    /// Records of an entity, most recently created first
    #[must_use]
    pub fn list(&self, entity: &EntityId) -> Vec<Record> {
        let stores = self.stores.lock();
        stores
            .get(entity)
            .map(|store| {
                store
                    .order
                    .iter()
                    .filter_map(|id| store.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// One record
    #[must_use]
    pub fn get(&self, entity: &EntityId, record_id: &str) -> Option<Record> {
        self.stores.lock().get(entity)?.records.get(record_id).cloned()
    }

    /// Create or overwrite a record, returning the stored copy
    ///
    /// Without an id a fresh one is synthesized and the record goes to the
    /// head of the entity's order. An existing id is overwritten in place.
    pub fn upsert(&self, entity: &EntityId, record_id: Option<&str>, record: Record) -> Record {
        let id = record_id.map_or_else(synthesize_id, str::to_string);

        let mut stored = Record::new();
        stored.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        stored.extend(record.into_iter().filter(|(key, _)| key != ID_FIELD));

        {
            let mut stores = self.stores.lock();
            let store = stores.entry(entity.clone()).or_default();
            if store.records.insert(id.clone(), stored.clone()).is_none() {
                store.order.insert(0, id.clone());
            }
        }

        let version = self.bump();
        tracing::debug!(entity = %entity, record_id = %id, version, "preview upsert");
        stored
    }

    /// Replace an entity's records (initial preview data), keeping the given order
    pub fn seed(&self, entity: &EntityId, records: Vec<Record>) {
        {
            let mut stores = self.stores.lock();
            let store = stores.entry(entity.clone()).or_default();
            store.records.clear();
            store.order.clear();
            for mut record in records {
                let id = manifest_model::record_id(&record).unwrap_or_else(synthesize_id);
                record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                if store.records.insert(id.clone(), record).is_none() {
                    store.order.push(id);
                }
            }
        }
        self.bump();
    }

    /// Drop all records
    pub fn reset(&self) {
        self.stores.lock().clear();
        self.bump();
    }

    /// Current store version
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Subscribe to version changes
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn bump(&self) -> u64 {
        let mut next = 0;
        self.version.send_modify(|v| {
            *v += 1;
            next = *v;
        });
        next
    }
}

impl Default for PreviewSandbox {
    fn default() -> Self {
        Self::new()
    }
}

fn synthesize_id() -> String {
    format!("{PREVIEW_ID_PREFIX}{}", Ulid::new().to_string().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn entity() -> EntityId {
        EntityId::parse("product").unwrap()
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn create_then_get() {
        let sandbox = PreviewSandbox::new();
        let stored = sandbox.upsert(&entity(), None, record(json!({"name": "Lamp"})));
        let id = manifest_model::record_id(&stored).unwrap();
        assert!(id.starts_with(PREVIEW_ID_PREFIX));

        let fetched = sandbox.get(&entity(), &id).unwrap();
        assert_eq!(fetched, record(json!({"id": id, "name": "Lamp"})));
    }

    #[test]
    fn list_is_most_recent_first() {
        let sandbox = PreviewSandbox::new();
        let a = sandbox.upsert(&entity(), None, record(json!({"name": "a"})));
        let b = sandbox.upsert(&entity(), None, record(json!({"name": "b"})));
        let names: Vec<_> = sandbox
            .list(&entity())
            .iter()
            .map(|r| r["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("b"), json!("a")]);

        sandbox.upsert(
            &entity(),
            manifest_model::record_id(&a).as_deref(),
            record(json!({"name": "a2"})),
        );
        let ids: Vec<_> = sandbox.list(&entity()).iter().filter_map(manifest_model::record_id).collect();
        assert_eq!(
            ids,
            vec![
                manifest_model::record_id(&b).unwrap(),
                manifest_model::record_id(&a).unwrap()
            ]
        );
        assert_eq!(sandbox.list(&entity())[1]["name"], json!("a2"));
    }

    #[test]
    fn entities_are_isolated() {
        let sandbox = PreviewSandbox::new();
        sandbox.upsert(&entity(), None, Record::new());
        assert!(sandbox.list(&EntityId::parse("order").unwrap()).is_empty());
    }

    #[test]
    fn version_increases_on_every_mutation() {
        let sandbox = PreviewSandbox::new();
        let rx = sandbox.subscribe();
        assert_eq!(sandbox.version(), 0);
        sandbox.upsert(&entity(), None, Record::new());
        sandbox.seed(&entity(), vec![record(json!({"id": "p1"}))]);
        assert_eq!(sandbox.version(), 2);
        assert_eq!(*rx.borrow(), 2);
    }

    #[test]
    fn seed_keeps_order_and_ids() {
        let sandbox = PreviewSandbox::new();
        sandbox.seed(
            &entity(),
            vec![record(json!({"id": "p1"})), record(json!({"id": 2}))],
        );
        let ids: Vec<_> = sandbox.list(&entity()).iter().filter_map(manifest_model::record_id).collect();
        assert_eq!(ids, vec!["p1", "2"]);
    }

    proptest! {
        #[test]
        fn creates_list_in_reverse_order(names in proptest::collection::vec("[a-z]{1,6}", 1..12)) {
            let sandbox = PreviewSandbox::new();
            for name in &names {
                sandbox.upsert(&entity(), None, record(json!({"name": name})));
            }
            let listed: Vec<String> = sandbox
                .list(&entity())
                .iter()
                .filter_map(|r| r["name"].as_str().map(str::to_string))
                .collect();
            let mut expected = names.clone();
            expected.reverse();
            prop_assert_eq!(listed, expected);
        }
    }
}
