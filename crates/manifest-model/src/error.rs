//! Error types for the manifest model

/// Target string did not match `page:<id>` / `view:<id>`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    /// Malformed target string
    #[error("invalid target: '{0}'")]
    Invalid(String),
}

/// Errors raised while interpreting manifest content
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Entity id was blank
    #[error("entity id is empty")]
    EmptyEntityId,

    /// Referenced entity is not declared
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Referenced view is not declared
    #[error("unknown view: {0}")]
    UnknownView(String),

    /// Action reference points at a missing action
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Manifest JSON did not match the expected shape
    #[error("malformed manifest: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Target parsing failed
    #[error(transparent)]
    Target(#[from] TargetError),
}

/// Errors when computing a manifest hash
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Manifest could not be serialized for hashing
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_error_display() {
        let err = TargetError::Invalid("home".to_string());
        assert_eq!(err.to_string(), "invalid target: 'home'");
    }

    #[test]
    fn model_error_from_target() {
        let err: ModelError = TargetError::Invalid("x".to_string()).into();
        assert!(matches!(err, ModelError::Target(_)));
    }
}
