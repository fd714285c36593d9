//! Ghost Kubernetes Operator binary.
//!
//! Watches GhostApp resources and the objects they own, and reconciles each
//! GhostApp into a running Ghost blog.

use clap::Parser;
use futures::StreamExt;
use ghost_operator::config::{DEFAULT_FIELD_MANAGER, OperatorConfig};
use ghost_operator::controller::{ControllerContext, error_policy, reconcile};
use ghost_operator::crd::GhostApp;
use ghost_operator::observability::{TracingConfig, init_tracing};
use ghost_operator::store::KubeStore;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::Controller;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, CustomResourceExt, Resource};
use std::sync::Arc;
use std::time::Duration;

/// Kubernetes operator for Ghost blogs.
#[derive(Debug, Parser)]
#[command(name = "ghost-operator", version, about)]
struct Cli {
    /// Watch only this namespace (default: all namespaces).
    #[arg(long, env = "GHOST_OPERATOR_NAMESPACE")]
    namespace: Option<String>,

    /// Field manager recorded on every write.
    #[arg(long, env = "GHOST_OPERATOR_FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    field_manager: String,

    /// Seconds to wait before retrying a failed reconciliation.
    #[arg(long, env = "GHOST_OPERATOR_ERROR_REQUEUE_SECS", default_value_t = 30)]
    error_requeue_secs: u64,

    /// Seconds to wait before retrying after a write conflict.
    #[arg(long, env = "GHOST_OPERATOR_CONFLICT_REQUEUE_SECS", default_value_t = 0)]
    conflict_requeue_secs: u64,

    /// Print the CRD as YAML and exit.
    #[arg(long)]
    generate_crds: bool,
}

impl Cli {
    fn operator_config(&self) -> OperatorConfig {
        let config = OperatorConfig::default()
            .with_field_manager(&self.field_manager)
            .with_error_requeue(Duration::from_secs(self.error_requeue_secs))
            .with_conflict_requeue(Duration::from_secs(self.conflict_requeue_secs));
        match &self.namespace {
            Some(namespace) => config.with_namespace(namespace),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.generate_crds {
        generate_crds()?;
        return Ok(());
    }

    init_tracing(&TracingConfig::from_env())?;

    let config = cli.operator_config();
    config.validate()?;

    tracing::info!(
        namespace = config.namespace.as_deref().unwrap_or("*"),
        field_manager = %config.field_manager,
        "Starting Ghost Kubernetes Operator"
    );

    let client = Client::try_default().await?;
    tracing::info!("Connected to Kubernetes cluster");

    let store = Arc::new(KubeStore::new(client.clone(), &config.field_manager));
    let span = tracing::info_span!(
        "ghost_operator",
        namespace = config.namespace.as_deref().unwrap_or("*"),
        field_manager = %config.field_manager
    );
    let ctx = Arc::new(ControllerContext::new(store, config.clone()).with_span(span));

    run_controller(client, &config, ctx).await;

    tracing::info!("Ghost operator stopped");
    Ok(())
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Run the GhostApp controller until a shutdown signal arrives.
async fn run_controller(client: Client, config: &OperatorConfig, ctx: Arc<ControllerContext>) {
    let namespace = config.namespace.as_deref();
    let watcher_config = WatcherConfig::default();

    Controller::new(scoped_api::<GhostApp>(&client, namespace), watcher_config.clone())
        .owns(scoped_api::<ConfigMap>(&client, namespace), watcher_config.clone())
        .owns(
            scoped_api::<PersistentVolumeClaim>(&client, namespace),
            watcher_config.clone(),
        )
        .owns(scoped_api::<Deployment>(&client, namespace), watcher_config.clone())
        .owns(scoped_api::<Service>(&client, namespace), watcher_config.clone())
        .owns(scoped_api::<Ingress>(&client, namespace), watcher_config)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    tracing::debug!(
                        name = %obj.name,
                        namespace = ?obj.namespace,
                        ?action,
                        "Reconciled GhostApp"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "GhostApp controller stream error");
                }
            }
        })
        .await;
}

/// Print the CRD YAML.
fn generate_crds() -> anyhow::Result<()> {
    println!("---");
    println!("{}", serde_yaml::to_string(&GhostApp::crd())?);
    Ok(())
}
