//! Error types for the Ghost Kubernetes operator.

use crate::dependent::DependentKind;
use thiserror::Error;

/// Errors that can occur during operator operations.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kubernetes API error that has no more specific classification.
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// Resource not found where one was required (status writes).
    #[error("Resource not found: {kind}/{name} in namespace {namespace}")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// Resource namespace.
        namespace: String,
    },

    /// Write rejected because the object changed since it was read.
    #[error("Conflict writing {kind}/{name}: {message}")]
    Conflict {
        /// Dependent kind (or `GhostApp`).
        kind: String,
        /// Object name.
        name: String,
        /// Message returned by the store.
        message: String,
    },

    /// The controller owner reference could not be set.
    #[error("Cannot set owner reference on {kind}/{name}: {reason}")]
    OwnerReference {
        /// Dependent kind.
        kind: DependentKind,
        /// Object name.
        name: String,
        /// Why stamping failed.
        reason: String,
    },

    /// Transient infrastructure fault in the object store.
    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),

    /// Invalid operator configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// GhostApp spec validation error.
    #[error("GhostApp validation failed: {0}")]
    ValidationError(String),

    /// A live object came back as a different kind than requested.
    #[error("Unexpected object kind: expected {expected}, got {actual}")]
    UnexpectedKind {
        /// Kind the caller asked for.
        expected: DependentKind,
        /// Kind the store returned.
        actual: DependentKind,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

impl OperatorError {
    /// Errors that will not go away by retrying; the user has to edit the resource.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OperatorError::ValidationError(_) | OperatorError::InvalidConfig(_)
        )
    }

    /// Optimistic-concurrency rejection.
    pub fn is_conflict(&self) -> bool {
        matches!(self, OperatorError::Conflict { .. })
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for OperatorError {
    fn from(err: serde_yaml::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_fatal() {
        assert!(OperatorError::ValidationError("tls without hosts".into()).is_fatal());
        assert!(OperatorError::InvalidConfig("bad".into()).is_fatal());
        assert!(!OperatorError::StoreUnavailable("timeout".into()).is_fatal());
    }

    #[test]
    fn conflict_message_names_object() {
        let err = OperatorError::Conflict {
            kind: "Deployment".into(),
            name: "blog".into(),
            message: "the object has been modified".into(),
        };
        assert!(err.is_conflict());
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Conflict writing Deployment/blog: the object has been modified"
        );
    }

    #[test]
    fn owner_reference_error_display() {
        let err = OperatorError::OwnerReference {
            kind: DependentKind::ConfigMap,
            name: "blog-ghost-config".into(),
            reason: "owner has no uid".into(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot set owner reference on ConfigMap/blog-ghost-config: owner has no uid"
        );
    }
}
