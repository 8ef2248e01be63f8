//! Error types for the manifest runtime
//!
//! Provides error handling for:
//! - Target resolution (missing home, malformed or unknown targets)
//! - Remote record/action calls
//! - Manifest and bootstrap loading
//! - Validation and action execution

use manifest_cache::LoadError;
use manifest_model::{ModelError, TargetError};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Stable error classification surfaced to the rendering layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No target and no default home
    MissingHome,
    /// Target string is not `page:<id>` / `view:<id>`
    InvalidTarget,
    /// Neither the target nor any fallback exists
    TargetNotFound,
    /// Entity unknown to the record store or manifest
    EntityNotFound,
    /// Record unknown to the record store
    RecordNotFound,
    /// Required fields missing
    Validation,
    /// Action pipeline reported a failure
    ActionFailed,
    /// Transport failure
    Network,
    /// Manifest or bootstrap could not be loaded
    LoadFailed,
    /// Superseded by a newer request
    Cancelled,
}

impl ErrorCode {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingHome => "MISSING_HOME",
            Self::InvalidTarget => "INVALID_TARGET",
            Self::TargetNotFound => "TARGET_NOT_FOUND",
            Self::EntityNotFound => "ENTITY_NOT_FOUND",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::ActionFailed => "ACTION_FAILED",
            Self::Network => "NETWORK",
            Self::LoadFailed => "LOAD_FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors of the remote record/action/registry contracts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Entity unknown to the record store
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// Record unknown to the record store
    #[error("record not found: {entity}/{id}")]
    RecordNotFound {
        /// Entity searched
        entity: String,
        /// Missing record id
        id: String,
    },

    /// Server rejected the request
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// HTTP-like status code
        status: u16,
        /// Server message
        message: String,
    },

    /// Transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Response did not match the contract
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Main runtime error type
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// No target requested and no default home configured
    #[error("no target requested and no default home configured")]
    MissingHome,

    /// Target string could not be parsed
    #[error(transparent)]
    InvalidTarget(#[from] TargetError),

    /// Neither the target nor any fallback exists in the manifest
    #[error("no page or view found for '{0}'")]
    TargetNotFound(String),

    /// Entity not declared / not served
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// Record not found
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// Required fields missing
    #[error("required fields missing: {}", fields.join(", "))]
    Validation {
        /// Missing field ids
        fields: Vec<String>,
    },

    /// Action execution failed
    #[error("action failed: {0}")]
    ActionFailed(String),

    /// Remote contract failure
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Manifest or bootstrap load failure
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Manifest model error
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl RuntimeError {
    /// Error classification
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingHome => ErrorCode::MissingHome,
            Self::InvalidTarget(_) | Self::Model(ModelError::Target(_)) => ErrorCode::InvalidTarget,
            Self::TargetNotFound(_) => ErrorCode::TargetNotFound,
            Self::EntityNotFound(_)
            | Self::Api(ApiError::EntityNotFound(_))
            | Self::Model(ModelError::UnknownEntity(_) | ModelError::EmptyEntityId) => {
                ErrorCode::EntityNotFound
            }
            Self::RecordNotFound(_) | Self::Api(ApiError::RecordNotFound { .. }) => {
                ErrorCode::RecordNotFound
            }
            Self::Validation { .. } => ErrorCode::Validation,
            Self::ActionFailed(_) | Self::Api(ApiError::Rejected { .. }) | Self::Model(_) => {
                ErrorCode::ActionFailed
            }
            Self::Api(_) => ErrorCode::Network,
            Self::Load(err) if err.is_superseded() => ErrorCode::Cancelled,
            Self::Load(_) | Self::Config(_) => ErrorCode::LoadFailed,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }

    /// Check if error is retryable (by refresh or re-navigation)
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.code(), ErrorCode::Network | ErrorCode::LoadFailed)
    }
}

/// Result alias for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_taxonomy() {
        assert_eq!(RuntimeError::MissingHome.code(), ErrorCode::MissingHome);
        assert_eq!(
            RuntimeError::from(TargetError::Invalid("x".into())).code(),
            ErrorCode::InvalidTarget
        );
        assert_eq!(
            RuntimeError::from(ApiError::EntityNotFound("entity.x".into())).code(),
            ErrorCode::EntityNotFound
        );
        assert_eq!(
            RuntimeError::from(ApiError::Network("reset".into())).code(),
            ErrorCode::Network
        );
        assert_eq!(
            RuntimeError::from(LoadError::Superseded("shop".into())).code(),
            ErrorCode::Cancelled
        );
    }

    #[test]
    fn retryable_errors() {
        assert!(RuntimeError::from(ApiError::Network("reset".into())).is_retryable());
        assert!(RuntimeError::from(LoadError::ModuleNotFound("shop".into())).is_retryable());
        assert!(!RuntimeError::MissingHome.is_retryable());
        assert!(!RuntimeError::Validation { fields: vec!["name".into()] }.is_retryable());
    }

    #[test]
    fn display() {
        let err = RuntimeError::Validation {
            fields: vec!["name".into(), "price".into()],
        };
        assert_eq!(err.to_string(), "required fields missing: name, price");
        assert_eq!(ErrorCode::MissingHome.to_string(), "MISSING_HOME");
    }
}
