//! Kubernetes controller for GhostApp resources.
//!
//! - [`GhostAppController`]: reconciles a GhostApp into its dependents
//! - [`ensure`]: create-or-update of one dependent
//! - [`PIPELINE`]: the ordered dependent steps
//!
//! # Usage with kube-runtime
//!
//! ```ignore
//! use ghost_operator::controller::{error_policy, reconcile};
//!
//! Controller::new(apps, watcher_config)
//!     .run(reconcile, error_policy, context)
//!     .for_each(|_| futures::future::ready(()))
//!     .await;
//! ```

mod app;
mod ensure;
mod pipeline;
mod status;

pub use app::{GhostAppController, error_policy, reconcile, validate_spec};
pub use ensure::{EnsureOutcome, ensure};
pub use pipeline::{PIPELINE, Step, run_pipeline};
pub use status::{next_status, update_status};

use crate::config::OperatorConfig;
use crate::error::OperatorError;
use crate::store::ObjectStore;
use kube::runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;

/// Shared context for controllers.
pub struct ControllerContext {
    /// Object store used for every read and write.
    pub store: Arc<dyn ObjectStore>,
    /// Operator settings.
    pub config: OperatorConfig,
    /// Parent span of every reconciliation.
    pub span: tracing::Span,
}

impl ControllerContext {
    /// Create a new controller context.
    pub fn new(store: Arc<dyn ObjectStore>, config: OperatorConfig) -> Self {
        Self {
            store,
            config,
            span: tracing::info_span!("ghost_operator"),
        }
    }

    /// Parent reconciliation spans under `span`.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }
}

/// Result type for reconciliation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Requeue after the specified duration.
    Requeue(Duration),
    /// Don't requeue until the resource or one of its dependents changes.
    Done,
}

impl ReconcileAction {
    /// Action for a failed reconciliation.
    ///
    /// Fatal errors wait for the user to edit the resource. Conflicts retry
    /// after `conflict_requeue`, everything else after `error_requeue`.
    pub fn for_error(error: &OperatorError, config: &OperatorConfig) -> Self {
        if error.is_fatal() {
            Self::Done
        } else if error.is_conflict() {
            Self::Requeue(config.conflict_requeue)
        } else {
            Self::Requeue(config.error_requeue)
        }
    }
}

impl From<ReconcileAction> for Action {
    fn from(action: ReconcileAction) -> Self {
        match action {
            ReconcileAction::Requeue(duration) => Action::requeue(duration),
            ReconcileAction::Done => Action::await_change(),
        }
    }
}
