//! Error types for manifest loading
//!
//! Load errors are reported to the caller as messages; none of them poisons
//! the cache, so a later load of the same module retries from scratch.

use manifest_model::{HashError, ModelError};

/// Errors while turning manifest JSON into a compiled manifest
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Manifest JSON did not match the schema
    #[error("invalid manifest: {0}")]
    Invalid(#[from] ModelError),

    /// Manifest root was not a JSON object
    #[error("manifest must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Hashing failed
    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    /// Manifest text was not valid JSON
    #[error("JSON parse error: {0}")]
    Syntax(#[from] serde_json::Error),
}

/// Errors during manifest / bootstrap loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Remote fetch failed
    #[error("failed to load '{module_id}': {message}")]
    Fetch {
        /// Module being loaded
        module_id: String,
        /// Transport or server message
        message: String,
    },

    /// Module does not exist
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// Payload could not be compiled
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// A newer load was requested before this one finished
    #[error("load of '{0}' superseded by a newer request")]
    Superseded(String),
}

impl LoadError {
    /// Create fetch error for module
    pub fn fetch(module_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            module_id: module_id.into(),
            message: message.into(),
        }
    }

    /// Whether the result was dropped rather than failed
    #[inline]
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded(_))
    }
}

/// Result type alias for load operations
pub type LoadResult<T> = Result<T, LoadError>;
