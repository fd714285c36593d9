//! GhostApp controller.
//!
//! Reconciles a GhostApp into its ConfigMap, PVC, Deployment, Service and
//! Ingress, and reports progress in the GhostApp status.

use super::pipeline::run_pipeline;
use super::status::update_status;
use super::{ControllerContext, ReconcileAction};
use crate::crd::{DatabaseClient, GhostApp, GhostAppPhase, GhostAppSpec};
use crate::error::{OperatorError, OperatorResult};
use crate::resources::is_valid_quantity;
use kube::ResourceExt;
use kube::runtime::controller::Action;
use std::sync::Arc;
use tracing::Instrument;

/// Controller for GhostApp resources.
#[derive(Clone)]
pub struct GhostAppController {
    ctx: Arc<ControllerContext>,
}

impl GhostAppController {
    /// Create a new GhostApp controller.
    pub fn new(ctx: Arc<ControllerContext>) -> Self {
        Self { ctx }
    }

    /// Reconcile the GhostApp handed over by the watcher.
    pub async fn reconcile(&self, app: Arc<GhostApp>) -> OperatorResult<ReconcileAction> {
        let name = app.name_any();
        let namespace = app
            .namespace()
            .ok_or_else(|| OperatorError::InvalidConfig("GhostApp must be namespaced".into()))?;
        self.reconcile_key(&namespace, &name).await
    }

    /// Reconcile the GhostApp stored under `namespace/name`.
    ///
    /// 1. Loads the latest GhostApp; absent or deleting means nothing to do
    /// 2. Validates the spec
    /// 3. Records `Creating` or `Updating` when entering those phases
    /// 4. Ensures each enabled dependent in order
    /// 5. Records `Running`, or `Failure` with the error as reason
    pub async fn reconcile_key(
        &self,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<ReconcileAction> {
        let span = tracing::info_span!(
            parent: &self.ctx.span,
            "reconcile",
            namespace = %namespace,
            name = %name
        );
        self.reconcile_inner(namespace, name).instrument(span).await
    }

    async fn reconcile_inner(
        &self,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<ReconcileAction> {
        let store = self.ctx.store.as_ref();

        let Some(app) = store.get_app(namespace, name).await? else {
            tracing::debug!("GhostApp not found, nothing to do");
            return Ok(ReconcileAction::Done);
        };
        if app.metadata.deletion_timestamp.is_some() {
            tracing::debug!("GhostApp is being deleted, leaving teardown to garbage collection");
            return Ok(ReconcileAction::Done);
        }

        tracing::info!(
            replicas = app.spec.replicas,
            image = %app.spec.image,
            persistent = app.spec.persistent.enabled,
            ingress = app.spec.ingress.enabled,
            "Reconciling GhostApp"
        );

        if let Err(err) = validate_spec(&app.spec) {
            tracing::warn!(error = %err, "Rejecting GhostApp spec");
            let reason = Some(err.to_string());
            update_status(store, &app, GhostAppPhase::Failure, reason).await?;
            return Err(err);
        }

        if let Some(phase) = transitional_phase(&app) {
            update_status(store, &app, phase, None).await?;
        }

        match run_pipeline(store, &app).await {
            Ok(outcomes) => {
                tracing::debug!(?outcomes, "Pipeline finished");
                update_status(store, &app, GhostAppPhase::Running, None).await?;
                Ok(ReconcileAction::Done)
            }
            Err(err) => {
                tracing::error!(error = %err, "GhostApp reconciliation failed");
                let reason = Some(err.to_string());
                update_status(store, &app, GhostAppPhase::Failure, reason).await?;
                Err(err)
            }
        }
    }
}

/// Phase to record before running the pipeline, if any.
///
/// A fresh resource is `Creating`. A `Running` resource whose spec changed
/// since it was last reconciled is `Updating`.
fn transitional_phase(app: &GhostApp) -> Option<GhostAppPhase> {
    match app.phase() {
        None => Some(GhostAppPhase::Creating),
        Some(GhostAppPhase::Running) => {
            let observed = app.status.as_ref().and_then(|s| s.observed_generation);
            (app.metadata.generation != observed).then_some(GhostAppPhase::Updating)
        }
        Some(_) => None,
    }
}

/// Validate a GhostApp spec.
pub fn validate_spec(spec: &GhostAppSpec) -> OperatorResult<()> {
    if spec.replicas < 0 {
        return Err(OperatorError::ValidationError(
            "replicas must not be negative".into(),
        ));
    }

    if spec.image.trim().is_empty() {
        return Err(OperatorError::ValidationError(
            "image must not be empty".into(),
        ));
    }

    if spec.persistent.enabled && spec.persistent.size.trim().is_empty() {
        return Err(OperatorError::ValidationError(
            "persistent.size is required when persistence is enabled".into(),
        ));
    }

    if spec.persistent.enabled && !is_valid_quantity(&spec.persistent.size) {
        return Err(OperatorError::ValidationError(format!(
            "persistent.size {:?} is not a valid quantity",
            spec.persistent.size
        )));
    }

    let tls = &spec.ingress.tls;
    if spec.ingress.enabled && tls.enabled {
        if spec.ingress.hosts.is_empty() {
            return Err(OperatorError::ValidationError(
                "ingress TLS requires at least one host".into(),
            ));
        }
        if tls.secret_name.trim().is_empty() {
            return Err(OperatorError::ValidationError(
                "ingress TLS requires a secretName".into(),
            ));
        }
    }

    let connection = &spec.config.database.connection;
    match spec.config.database.client {
        DatabaseClient::Sqlite3 if connection.filename.is_none() => {
            tracing::warn!("sqlite3 database without a filename; Ghost will use its default");
        }
        DatabaseClient::Mysql if connection.host.is_none() => {
            tracing::warn!("mysql database without a host; Ghost will use localhost");
        }
        _ => {}
    }

    Ok(())
}

/// Reconcile entry point for [`kube::runtime::Controller`].
pub async fn reconcile(
    app: Arc<GhostApp>,
    ctx: Arc<ControllerContext>,
) -> OperatorResult<Action> {
    let controller = GhostAppController::new(ctx);
    controller.reconcile(app).await.map(Action::from)
}

/// Handle errors during reconciliation.
pub fn error_policy(
    app: Arc<GhostApp>,
    error: &OperatorError,
    ctx: Arc<ControllerContext>,
) -> Action {
    let action = ReconcileAction::for_error(error, &ctx.config);
    tracing::error!(
        name = %app.name_any(),
        namespace = ?app.namespace(),
        error = %error,
        ?action,
        "Reconciliation error"
    );
    action.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;
    use crate::crd::GhostAppStatus;
    use crate::resources::fixtures;
    use crate::store::MockObjectStore;

    #[test]
    fn valid_fixture_passes() {
        assert!(validate_spec(&fixtures::app("blog").spec).is_ok());
    }

    #[test]
    fn negative_replicas_rejected() {
        let mut spec = fixtures::app("blog").spec;
        spec.replicas = -1;
        assert!(validate_spec(&spec).unwrap_err().is_fatal());
    }

    #[test]
    fn zero_replicas_allowed() {
        let mut spec = fixtures::app("blog").spec;
        spec.replicas = 0;
        assert!(validate_spec(&spec).is_ok());
    }

    #[test]
    fn tls_without_hosts_rejected() {
        let mut spec = fixtures::app("blog").spec;
        spec.ingress.enabled = true;
        spec.ingress.tls.enabled = true;
        spec.ingress.tls.secret_name = "blog-tls".into();
        let err = validate_spec(&spec).unwrap_err();
        assert!(err.to_string().contains("at least one host"));

        spec.ingress.hosts = vec!["blog.example.test".into()];
        assert!(validate_spec(&spec).is_ok());
    }

    #[test]
    fn tls_ignored_while_ingress_disabled() {
        let mut spec = fixtures::app("blog").spec;
        spec.ingress.tls.enabled = true;
        assert!(validate_spec(&spec).is_ok());
    }

    #[test]
    fn empty_size_rejected_only_with_persistence() {
        let mut spec = fixtures::app("blog").spec;
        spec.persistent.size = String::new();
        assert!(validate_spec(&spec).is_ok());
        spec.persistent.enabled = true;
        assert!(validate_spec(&spec).is_err());
    }

    #[test]
    fn malformed_size_rejected() {
        let mut spec = fixtures::app("blog").spec;
        spec.persistent.enabled = true;
        spec.persistent.size = "ten gigs".into();
        let err = validate_spec(&spec).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("not a valid quantity"));

        spec.persistent.size = "1.5Gi".into();
        assert!(validate_spec(&spec).is_ok());
    }

    #[test]
    fn transitional_phases() {
        let mut app = fixtures::app("blog");
        app.metadata.generation = Some(2);
        assert_eq!(transitional_phase(&app), Some(GhostAppPhase::Creating));

        app.status = Some(GhostAppStatus {
            replicas: 1,
            phase: Some(GhostAppPhase::Running),
            reason: None,
            observed_generation: Some(1),
        });
        assert_eq!(transitional_phase(&app), Some(GhostAppPhase::Updating));

        app.metadata.generation = Some(1);
        assert_eq!(transitional_phase(&app), None);

        app.status.as_mut().unwrap().phase = Some(GhostAppPhase::Failure);
        app.metadata.generation = Some(5);
        assert_eq!(transitional_phase(&app), None);
    }

    #[tokio::test]
    async fn running_status_failure_is_propagated() {
        let mut app = fixtures::app("blog");
        app.metadata.generation = Some(1);
        app.status = Some(GhostAppStatus {
            replicas: 1,
            phase: Some(GhostAppPhase::Failure),
            reason: Some("earlier".into()),
            observed_generation: None,
        });

        let mut store = MockObjectStore::new();
        store
            .expect_get_app()
            .returning(move |_, _| Ok(Some(app.clone())));
        store.expect_get().returning(|_, _, _| Ok(None));
        store
            .expect_create()
            .times(3)
            .returning(|object| Ok(object.clone()));
        store
            .expect_patch_app_status()
            .times(1)
            .returning(|_, _, _| Err(OperatorError::StoreUnavailable("etcd timeout".into())));

        let ctx = ControllerContext::new(Arc::new(store), OperatorConfig::default());
        let err = GhostAppController::new(Arc::new(ctx))
            .reconcile_key("blogs", "blog")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Object store unavailable: etcd timeout");
    }
}
