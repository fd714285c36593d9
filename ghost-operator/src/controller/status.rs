//! GhostApp status writes.

use crate::crd::{GhostApp, GhostAppPhase, GhostAppStatus};
use crate::error::OperatorResult;
use crate::store::ObjectStore;
use kube::ResourceExt;

/// Status to record for `phase`.
///
/// `Running` reports the spec's replica count and the generation it was
/// reached at. Other phases keep those fields from the previous status.
pub fn next_status(
    app: &GhostApp,
    phase: GhostAppPhase,
    reason: Option<String>,
) -> GhostAppStatus {
    let previous = app.status.clone().unwrap_or_default();
    match phase {
        GhostAppPhase::Running => GhostAppStatus {
            replicas: app.spec.replicas,
            phase: Some(phase),
            reason,
            observed_generation: app.metadata.generation,
        },
        _ => GhostAppStatus {
            phase: Some(phase),
            reason,
            ..previous
        },
    }
}

/// Write the status subresource. Skipped when it would not change anything.
pub async fn update_status(
    store: &dyn ObjectStore,
    app: &GhostApp,
    phase: GhostAppPhase,
    reason: Option<String>,
) -> OperatorResult<()> {
    let status = next_status(app, phase, reason);
    if app.status.as_ref() == Some(&status) {
        return Ok(());
    }

    let namespace = app.namespace().unwrap_or_default();
    tracing::debug!(phase = %phase, reason = ?status.reason, "Updating status");
    store
        .patch_app_status(&namespace, &app.name_any(), &status)
        .await
}
