//! Operator configuration.

use crate::error::{OperatorError, OperatorResult};
use std::time::Duration;

/// Default field manager used for every write.
pub const DEFAULT_FIELD_MANAGER: &str = "ghost-operator";

/// Runtime settings shared by every reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace to watch; `None` watches all namespaces.
    pub namespace: Option<String>,
    /// Field manager recorded on created and replaced objects.
    pub field_manager: String,
    /// Requeue delay after a retryable failure.
    pub error_requeue: Duration,
    /// Requeue delay after an optimistic-concurrency conflict.
    pub conflict_requeue: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            error_requeue: Duration::from_secs(30),
            conflict_requeue: Duration::ZERO,
        }
    }
}

impl OperatorConfig {
    /// Restrict the operator to one namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the field manager.
    pub fn with_field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    /// Set the requeue delay after retryable failures.
    pub fn with_error_requeue(mut self, delay: Duration) -> Self {
        self.error_requeue = delay;
        self
    }

    /// Set the requeue delay after conflicts.
    pub fn with_conflict_requeue(mut self, delay: Duration) -> Self {
        self.conflict_requeue = delay;
        self
    }

    /// Reject settings the API server would refuse.
    pub fn validate(&self) -> OperatorResult<()> {
        if self.field_manager.trim().is_empty() {
            return Err(OperatorError::InvalidConfig(
                "field manager must not be empty".into(),
            ));
        }
        if self.field_manager.len() > 128 {
            return Err(OperatorError::InvalidConfig(
                "field manager must be at most 128 characters".into(),
            ));
        }
        if matches!(self.namespace.as_deref(), Some("")) {
            return Err(OperatorError::InvalidConfig(
                "namespace must not be empty".into(),
            ));
        }
        Ok(())
    }
}
