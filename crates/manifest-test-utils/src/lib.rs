//! Testing utilities for the manifest interpreter workspace
//!
//! Shared fixtures (the `shop` module), in-memory fakes of the remote
//! services, and a presenter that records what it was asked to show.

#![allow(missing_docs)]

use async_trait::async_trait;
use dashmap::DashMap;
use manifest_cache::{BootstrapPayload, BootstrapRequest, LoadError, ManifestPayload, ManifestSource};
use manifest_model::{record_id, CompiledManifest, EntityId, Manifest, Record, Route};
use manifest_runtime::{
    ActionApi, ActionRequest, ActionResult, ApiError, DialogRequest, Dialogs, Interpreter,
    ModuleSummary, Notice, Presenter, RecordApi, RegistryApi, RuntimeConfig, Services,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// `shop` module: home page missing, one product list and an auto-saving form
pub fn shop_manifest() -> Value {
    json!({
        "app": {"title": "Shop", "home": "page:home"},
        "entities": [{
            "id": "entity.product",
            "display_field": "name",
            "fields": [
                {"id": "name", "label": "Name", "required": true},
                {"id": "price", "label": "Price"},
                {"id": "currency", "required": true, "default": "EUR"}
            ]
        }],
        "views": [
            {"id": "product.list", "kind": "list", "entity": "entity.product", "columns": ["name", "price"],
             "header": {"actions": [{"action_id": "new_product"}]}},
            {"id": "product.form", "kind": "form", "entity": "product", "auto_save": true, "auto_save_debounce_ms": 100}
        ],
        "actions": [
            {"id": "new_product", "kind": "create_record", "label": "New product", "entity": "entity.product"}
        ]
    })
}

pub fn shop_compiled() -> Arc<CompiledManifest> {
    let manifest = Manifest::from_value(shop_manifest()).unwrap();
    Arc::new(CompiledManifest::compile(manifest).unwrap())
}

pub fn product() -> EntityId {
    EntityId::parse("entity.product").unwrap()
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

/// Manifest source serving fixed module manifests
#[derive(Default)]
pub struct FakeManifestSource {
    modules: DashMap<String, Value>,
    delay: Option<Duration>,
    pub manifest_calls: AtomicUsize,
    pub bootstrap_calls: AtomicUsize,
}

impl FakeManifestSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, module_id: &str, manifest: Value) -> Self {
        self.modules.insert(module_id.to_string(), manifest);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn module(&self, module_id: &str) -> Result<Value, LoadError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.modules
            .get(module_id)
            .map(|m| m.value().clone())
            .ok_or_else(|| LoadError::ModuleNotFound(module_id.to_string()))
    }
}

#[async_trait]
impl ManifestSource for FakeManifestSource {
    async fn get_manifest(&self, module_id: &str) -> Result<ManifestPayload, LoadError> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ManifestPayload {
            manifest: self.module(module_id).await?,
            compiled: None,
            manifest_hash: None,
        })
    }

    async fn get_page_bootstrap(
        &self,
        request: &BootstrapRequest,
    ) -> Result<BootstrapPayload, LoadError> {
        self.bootstrap_calls.fetch_add(1, Ordering::SeqCst);
        Ok(BootstrapPayload {
            manifest: self.module(&request.module_id).await?,
            compiled: None,
            view_id: request.view_id.clone(),
            page_id: request.page_id.clone(),
            list: None,
            record: None,
            manifest_hash: None,
        })
    }
}

/// In-memory record store with call counters and a save log
#[derive(Default)]
pub struct FakeRecordApi {
    records: DashMap<EntityId, Vec<Record>>,
    next_id: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    saves: Mutex<Vec<(Instant, Record)>>,
    reject_saves: AtomicBool,
}

impl FakeRecordApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(self, entity: &EntityId, records: Vec<Record>) -> Self {
        self.records.insert(entity.clone(), records);
        self
    }

    /// Answer every update with a network error
    pub fn rejecting_saves(self) -> Self {
        self.reject_saves.store(true, Ordering::SeqCst);
        self
    }

    /// Updates received, with the (tokio) time they arrived
    pub fn saves(&self) -> Vec<(Instant, Record)> {
        self.saves.lock().clone()
    }
}

#[async_trait]
impl RecordApi for FakeRecordApi {
    async fn list(&self, entity: &EntityId, fields: &[String]) -> Result<Vec<Record>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let rows = self
            .records
            .get(entity)
            .ok_or_else(|| ApiError::EntityNotFound(entity.to_string()))?;
        Ok(rows
            .iter()
            .map(|row| {
                row.iter()
                    .filter(|(key, _)| key.as_str() == "id" || fields.is_empty() || fields.contains(key))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .collect())
    }

    async fn get(&self, entity: &EntityId, id: &str) -> Result<Record, ApiError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.records
            .get(entity)
            .and_then(|rows| {
                rows.iter()
                    .find(|r| record_id(r).as_deref() == Some(id))
                    .cloned()
            })
            .ok_or_else(|| ApiError::RecordNotFound {
                entity: entity.to_string(),
                id: id.to_string(),
            })
    }

    async fn create(&self, entity: &EntityId, record: &Record) -> Result<Record, ApiError> {
        let id = format!("r{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut stored = record.clone();
        stored.insert("id".into(), Value::String(id));
        self.records
            .entry(entity.clone())
            .or_default()
            .insert(0, stored.clone());
        Ok(stored)
    }

    async fn update(&self, entity: &EntityId, id: &str, record: &Record) -> Result<Record, ApiError> {
        self.saves.lock().push((Instant::now(), record.clone()));
        if self.reject_saves.load(Ordering::SeqCst) {
            return Err(ApiError::Network("connection reset".into()));
        }
        let mut rows = self.records.entry(entity.clone()).or_default();
        let mut stored = record.clone();
        stored.insert("id".into(), Value::String(id.to_string()));
        let position = rows.iter().position(|r| record_id(r).as_deref() == Some(id));
        match position {
            Some(index) => rows[index] = stored.clone(),
            None => rows.push(stored.clone()),
        }
        Ok(stored)
    }

    async fn delete(&self, entity: &EntityId, id: &str) -> Result<(), ApiError> {
        if let Some(mut rows) = self.records.get_mut(entity) {
            rows.retain(|r| record_id(r).as_deref() != Some(id));
        }
        Ok(())
    }
}

/// Action pipeline answering with queued results
#[derive(Default)]
pub struct FakeActionApi {
    responses: Mutex<VecDeque<Result<ActionResult, ApiError>>>,
    requests: Mutex<Vec<ActionRequest>>,
}

impl FakeActionApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: Result<ActionResult, ApiError>) -> Self {
        self.responses.lock().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<ActionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ActionApi for FakeActionApi {
    async fn run(&self, request: &ActionRequest) -> Result<ActionResult, ApiError> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ActionResult::default()))
    }
}

/// Registry listing a fixed set of modules
#[derive(Default)]
pub struct FakeRegistry {
    pub modules: Vec<ModuleSummary>,
}

#[async_trait]
impl RegistryApi for FakeRegistry {
    async fn list_modules(&self) -> Result<Vec<ModuleSummary>, ApiError> {
        Ok(self.modules.clone())
    }
}

/// Presenter that records notices and navigations
#[derive(Default)]
pub struct RecordingPresenter {
    notices: Mutex<Vec<Notice>>,
    routes: Mutex<Vec<Route>>,
}

impl RecordingPresenter {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().clone()
    }

    pub fn last_route(&self) -> Option<Route> {
        self.routes.lock().last().cloned()
    }
}

impl Presenter for RecordingPresenter {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }

    fn navigate(&self, route: Route) {
        self.routes.lock().push(route);
    }
}

/// Answer every confirmation with `answer`
pub fn auto_confirm(mut requests: mpsc::Receiver<DialogRequest>, answer: bool) {
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            match request {
                DialogRequest::Confirm { mut responder, .. } => {
                    responder.resolve(answer);
                }
                DialogRequest::Prompt {
                    initial,
                    mut responder,
                    ..
                } => {
                    responder.resolve(if answer { initial } else { None });
                }
            }
        }
    });
}

/// Interpreter wired to fakes
pub struct Fixture {
    pub interpreter: Interpreter,
    pub source: Arc<FakeManifestSource>,
    pub records: Arc<FakeRecordApi>,
    pub actions: Arc<FakeActionApi>,
    pub presenter: Arc<RecordingPresenter>,
}

impl Fixture {
    /// `shop` module with fake services; confirmations are accepted
    pub fn shop(config: RuntimeConfig, records: FakeRecordApi, actions: FakeActionApi) -> Self {
        let source = Arc::new(FakeManifestSource::new().with_module("shop", shop_manifest()));
        Self::with_source(config, source, records, actions)
    }

    pub fn with_source(
        config: RuntimeConfig,
        source: Arc<FakeManifestSource>,
        records: FakeRecordApi,
        actions: FakeActionApi,
    ) -> Self {
        let records = Arc::new(records);
        let actions = Arc::new(actions);
        let presenter = Arc::new(RecordingPresenter::default());
        let services = Services::new(source.clone(), records.clone(), actions.clone());
        let (dialogs, requests) = Dialogs::channel(8);
        auto_confirm(requests, true);
        let interpreter = Interpreter::new(config, services, presenter.clone(), dialogs);
        Self {
            interpreter,
            source,
            records,
            actions,
            presenter,
        }
    }
}
