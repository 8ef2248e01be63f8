//! Runtime configuration
//!
//! [`RuntimeConfig`] is plain serde data; hosts build it in code with the
//! `with_*` methods or load it from TOML.

use crate::error::{RuntimeError, RuntimeResult};
use manifest_model::DEFAULT_RECORD_PARAM;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Design-time preview mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewMode {
    /// Live backend
    #[default]
    Off,
    /// Preview with navigation disabled; actions are inert
    ReadOnly,
    /// Preview with navigation; writes go to the preview sandbox
    Interactive,
}

impl PreviewMode {
    /// Whether any preview mode is active
    #[inline]
    #[must_use]
    pub fn is_preview(self) -> bool {
        self != Self::Off
    }

    /// Whether the preview allows navigation and sandbox writes
    #[inline]
    #[must_use]
    pub fn allows_navigation(self) -> bool {
        self != Self::ReadOnly
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Preview mode
    pub preview: PreviewMode,
    /// Query parameter carrying the active record id
    pub record_param: String,
    /// Debounce window for background change notifications
    pub invalidation_debounce_ms: u64,
    /// Default autosave debounce (views may override)
    pub autosave_debounce_ms: u64,
    /// How long the latest error stays visible after it clears
    pub error_flash_hold_ms: u64,
    /// Maximum cached compiled manifests
    pub manifest_cache_capacity: u64,
    /// Compiled-manifest time to live
    pub manifest_cache_ttl_secs: u64,
    /// Use the combined bootstrap round trip on direct entry
    pub use_bootstrap: bool,
}

impl RuntimeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML configuration
    ///
    /// # Errors
    /// Returns [`RuntimeError::Config`] on malformed TOML.
    pub fn from_toml_str(content: &str) -> RuntimeResult<Self> {
        toml::from_str(content).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Load TOML configuration from a file
    ///
    /// # Errors
    /// Returns [`RuntimeError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RuntimeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// With preview mode
    #[inline]
    #[must_use]
    pub fn with_preview(mut self, preview: PreviewMode) -> Self {
        self.preview = preview;
        self
    }

    /// With record query parameter name
    #[inline]
    #[must_use]
    pub fn with_record_param(mut self, param: impl Into<String>) -> Self {
        self.record_param = param.into();
        self
    }

    /// With autosave debounce
    #[inline]
    #[must_use]
    pub fn with_autosave_debounce(mut self, debounce: Duration) -> Self {
        self.autosave_debounce_ms = millis(debounce);
        self
    }

    /// With invalidation debounce
    #[inline]
    #[must_use]
    pub fn with_invalidation_debounce(mut self, debounce: Duration) -> Self {
        self.invalidation_debounce_ms = millis(debounce);
        self
    }

    /// With or without the bootstrap round trip
    #[inline]
    #[must_use]
    pub fn with_bootstrap(mut self, enabled: bool) -> Self {
        self.use_bootstrap = enabled;
        self
    }

    /// Invalidation debounce window
    #[inline]
    #[must_use]
    pub fn invalidation_debounce(&self) -> Duration {
        Duration::from_millis(self.invalidation_debounce_ms)
    }

    /// Autosave debounce, honoring a per-view override
    #[inline]
    #[must_use]
    pub fn autosave_debounce(&self, view_override_ms: Option<u64>) -> Duration {
        Duration::from_millis(view_override_ms.unwrap_or(self.autosave_debounce_ms))
    }

    /// Error flash hold window
    #[inline]
    #[must_use]
    pub fn error_flash_hold(&self) -> Duration {
        Duration::from_millis(self.error_flash_hold_ms)
    }

    /// Compiled-manifest time to live
    #[inline]
    #[must_use]
    pub fn manifest_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.manifest_cache_ttl_secs)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            preview: PreviewMode::Off,
            record_param: DEFAULT_RECORD_PARAM.to_string(),
            invalidation_debounce_ms: 300,
            autosave_debounce_ms: 750,
            error_flash_hold_ms: 2500,
            manifest_cache_capacity: 64,
            manifest_cache_ttl_secs: 300,
            use_bootstrap: true,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
