//! Remote manifest contracts
//!
//! The transport is opaque: implementations may call HTTP endpoints, read
//! fixtures, or serve a design-time preview.

use crate::error::LoadError;
use async_trait::async_trait;
use manifest_model::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response of `getManifest(moduleId)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestPayload {
    /// Raw manifest
    pub manifest: Value,
    /// Server-side compiled index (ignored; rebuilt locally)
    #[serde(default)]
    pub compiled: Option<Value>,
    /// Server fingerprint
    #[serde(default)]
    pub manifest_hash: Option<String>,
}

/// Request of `getPageBootstrap`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BootstrapRequest {
    /// Module being entered
    pub module_id: String,
    /// Page being entered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    /// View being entered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_id: Option<String>,
    /// Active record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl BootstrapRequest {
    /// Bootstrap request for a page
    #[must_use]
    pub fn page(module_id: impl Into<String>, page_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            page_id: Some(page_id.into()),
            ..Self::default()
        }
    }

    /// Bootstrap request for a view
    #[must_use]
    pub fn view(module_id: impl Into<String>, view_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            view_id: Some(view_id.into()),
            ..Self::default()
        }
    }

    /// With active record
    #[must_use]
    pub fn with_record(mut self, record_id: Option<String>) -> Self {
        self.record_id = record_id;
        self
    }
}

/// Response of `getPageBootstrap`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootstrapPayload {
    /// Raw manifest
    pub manifest: Value,
    /// Server-side compiled index (ignored; rebuilt locally)
    #[serde(default)]
    pub compiled: Option<Value>,
    /// View the prefetched data belongs to
    #[serde(default)]
    pub view_id: Option<String>,
    /// Page being entered
    #[serde(default)]
    pub page_id: Option<String>,
    /// Prefetched list rows
    #[serde(default)]
    pub list: Option<Vec<Record>>,
    /// Prefetched record
    #[serde(default)]
    pub record: Option<Record>,
    /// Server fingerprint
    #[serde(default)]
    pub manifest_hash: Option<String>,
}

/// Source of manifests and page bootstraps
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch a module manifest
    async fn get_manifest(&self, module_id: &str) -> Result<ManifestPayload, LoadError>;

    /// Fetch manifest plus prefetched list/record in one round trip
    async fn get_page_bootstrap(
        &self,
        request: &BootstrapRequest,
    ) -> Result<BootstrapPayload, LoadError>;
}
