//! The ordered list of dependents a GhostApp reconciles.

use super::ensure::{EnsureOutcome, ensure};
use crate::crd::{GhostApp, GhostAppSpec};
use crate::dependent::DependentKind;
use crate::error::OperatorResult;
use crate::store::ObjectStore;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::Ingress;

/// One pipeline step.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    /// Step name used in logs.
    pub name: &'static str,
    /// Dependent the step ensures.
    pub kind: DependentKind,
    /// Whether the step runs for a given spec.
    pub enabled: fn(&GhostAppSpec) -> bool,
}

fn always(_: &GhostAppSpec) -> bool {
    true
}

fn persistence_enabled(spec: &GhostAppSpec) -> bool {
    spec.persistent.enabled
}

fn ingress_enabled(spec: &GhostAppSpec) -> bool {
    spec.ingress.enabled
}

/// Steps in execution order. The ConfigMap and PVC come before the
/// Deployment that mounts them.
pub const PIPELINE: [Step; 5] = [
    Step {
        name: "config",
        kind: DependentKind::ConfigMap,
        enabled: always,
    },
    Step {
        name: "content-volume",
        kind: DependentKind::PersistentVolumeClaim,
        enabled: persistence_enabled,
    },
    Step {
        name: "workload",
        kind: DependentKind::Deployment,
        enabled: always,
    },
    Step {
        name: "service",
        kind: DependentKind::Service,
        enabled: always,
    },
    Step {
        name: "ingress",
        kind: DependentKind::Ingress,
        enabled: ingress_enabled,
    },
];

impl Step {
    /// Ensure this step's dependent.
    pub async fn run(
        &self,
        store: &dyn ObjectStore,
        app: &GhostApp,
    ) -> OperatorResult<EnsureOutcome> {
        match self.kind {
            DependentKind::ConfigMap => ensure::<ConfigMap>(store, app).await,
            DependentKind::PersistentVolumeClaim => {
                ensure::<PersistentVolumeClaim>(store, app).await
            }
            DependentKind::Deployment => ensure::<Deployment>(store, app).await,
            DependentKind::Service => ensure::<Service>(store, app).await,
            DependentKind::Ingress => ensure::<Ingress>(store, app).await,
        }
    }
}

/// Run every enabled step in order, stopping at the first error.
pub async fn run_pipeline(
    store: &dyn ObjectStore,
    app: &GhostApp,
) -> OperatorResult<Vec<(DependentKind, EnsureOutcome)>> {
    let mut outcomes = Vec::with_capacity(PIPELINE.len());
    for step in PIPELINE.iter() {
        if !(step.enabled)(&app.spec) {
            tracing::debug!(step = step.name, "Step disabled, skipping");
            continue;
        }
        let outcome = step.run(store, app).await.inspect_err(|e| {
            tracing::warn!(step = step.name, error = %e, "Step failed");
        })?;
        outcomes.push((step.kind, outcome));
    }
    Ok(outcomes)
}
