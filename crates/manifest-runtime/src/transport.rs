//! External collaborators
//!
//! Remote services (records, action pipeline, module registry) and the
//! presentation layer (notices, navigation) are traits; the runtime never
//! talks to a transport or a UI directly.

use crate::error::ApiError;
use async_trait::async_trait;
use manifest_cache::ManifestSource;
use manifest_model::{EntityId, Record, Route};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Record store (`/records/{entity}[/{id}]`)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordApi: Send + Sync {
    /// List records, optionally projected to `fields`
    async fn list(&self, entity: &EntityId, fields: &[String]) -> Result<Vec<Record>, ApiError>;

    /// Fetch one record
    async fn get(&self, entity: &EntityId, id: &str) -> Result<Record, ApiError>;

    /// Create a record
    async fn create(&self, entity: &EntityId, record: &Record) -> Result<Record, ApiError>;

    /// Replace a record
    async fn update(&self, entity: &EntityId, id: &str, record: &Record)
        -> Result<Record, ApiError>;

    /// Delete a record
    async fn delete(&self, entity: &EntityId, id: &str) -> Result<(), ApiError>;
}

/// Ambient context sent with an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
    /// Active record
    pub record_id: Option<String>,
    /// Current draft of the active record
    pub record_draft: Option<Record>,
    /// Ids checked in the list
    #[serde(default)]
    pub selected_ids: Vec<String>,
}

/// Body of `POST /actions/run`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Module owning the action
    pub module_id: String,
    /// Canonical action id
    pub action_id: String,
    /// Ambient context
    pub context: ActionContext,
}

/// Structured result of the action pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionResult {
    /// `navigate`, `open_form`, ...
    pub kind: Option<String>,
    /// Navigation target or form view
    pub target: Option<String>,
    /// Record created or touched
    pub record_id: Option<String>,
    /// Field values to merge into the draft
    pub patch: Option<Record>,
    /// Records changed server-side
    pub updated: bool,
}

impl ActionResult {
    /// Result of the given kind
    #[inline]
    #[must_use]
    pub fn of_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Whether `kind` equals `expected`
    #[inline]
    #[must_use]
    pub fn is_kind(&self, expected: &str) -> bool {
        self.kind.as_deref() == Some(expected)
    }
}

/// Remote action pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionApi: Send + Sync {
    /// Run an action
    async fn run(&self, request: &ActionRequest) -> Result<ActionResult, ApiError>;
}

/// Module listed by the registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSummary {
    /// Module id
    pub module_id: String,
    /// Display name
    pub name: Option<String>,
    /// Entities declared by the module, when the registry knows them
    pub entities: Vec<EntityId>,
}

/// Module registry, used for cross-module lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// All installed modules
    async fn list_modules(&self) -> Result<Vec<ModuleSummary>, ApiError>;
}

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    /// Informational
    Info,
    /// Operation succeeded
    Success,
    /// Operation failed
    Error,
}

/// Transient, dismissible message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text
    pub message: String,
}

impl Notice {
    /// Informational notice
    #[inline]
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Success notice
    #[inline]
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// Error notice
    #[inline]
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Presentation layer hooks
#[cfg_attr(test, mockall::automock)]
pub trait Presenter: Send + Sync {
    /// Show a notice
    fn notify(&self, notice: Notice);

    /// Navigate to a route
    fn navigate(&self, route: Route);
}

/// Remote services used by an interpreter session
#[derive(Clone)]
pub struct Services {
    /// Manifest and bootstrap source
    pub manifests: Arc<dyn ManifestSource>,
    /// Record store
    pub records: Arc<dyn RecordApi>,
    /// Action pipeline
    pub actions: Arc<dyn ActionApi>,
    /// Module registry, if cross-module lookup is available
    pub registry: Option<Arc<dyn RegistryApi>>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("registry", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Create services without a registry
    #[must_use]
    pub fn new(
        manifests: Arc<dyn ManifestSource>,
        records: Arc<dyn RecordApi>,
        actions: Arc<dyn ActionApi>,
    ) -> Self {
        Self {
            manifests,
            records,
            actions,
            registry: None,
        }
    }

    /// With module registry
    #[inline]
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn RegistryApi>) -> Self {
        self.registry = Some(registry);
        self
    }
}
