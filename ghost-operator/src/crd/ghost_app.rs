//! GhostApp Custom Resource Definition.
//!
//! Defines a Ghost blog deployment in Kubernetes.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// GhostApp is the Schema for the ghostapps API.
///
/// A GhostApp represents a single Ghost blog. The operator creates the
/// ConfigMap, PersistentVolumeClaim, Deployment, Service and Ingress needed
/// to run it and keeps them in sync with this spec.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "ghost.fossil.or.id",
    version = "v1alpha1",
    kind = "GhostApp",
    plural = "ghostapps",
    shortname = "ghost",
    namespaced,
    status = "GhostAppStatus",
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GhostAppSpec {
    /// Number of Ghost pods.
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Ghost container image.
    #[serde(default = "default_image")]
    pub image: String,

    /// Ghost configuration, rendered into `config.production.json`.
    pub config: GhostConfigSpec,

    /// Content persistence.
    #[serde(default)]
    pub persistent: GhostPersistentSpec,

    /// Ingress exposure.
    #[serde(default)]
    pub ingress: GhostIngressSpec,
}

fn default_replicas() -> i32 {
    1
}

fn default_image() -> String {
    "ghost".to_string()
}

/// Ghost application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GhostConfigSpec {
    /// Public URL of the blog.
    pub url: String,

    /// Database settings.
    pub database: GhostDatabaseSpec,

    /// Server bind address. The operator always renders 0.0.0.0:2368.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<GhostServerSpec>,
}

/// Ghost database settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GhostDatabaseSpec {
    /// Database client driver.
    pub client: DatabaseClient,

    /// Connection parameters.
    #[serde(default)]
    pub connection: GhostDatabaseConnectionSpec,
}

/// Supported Ghost database drivers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseClient {
    /// Embedded SQLite file.
    Sqlite3,
    /// External MySQL server.
    Mysql,
}

/// Database connection parameters. Which fields matter depends on the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GhostDatabaseConnectionSpec {
    /// SQLite database file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// MySQL host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// MySQL port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<IntOrString>,

    /// MySQL user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// MySQL password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// MySQL database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

/// Ghost server bind address.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GhostServerSpec {
    /// Bind host.
    pub host: String,

    /// Bind port.
    pub port: IntOrString,
}

/// Content persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GhostPersistentSpec {
    /// Back the content volume with a PersistentVolumeClaim.
    #[serde(default)]
    pub enabled: bool,

    /// Storage class name; the cluster default is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Requested size (e.g., "10Gi").
    #[serde(default = "default_storage_size")]
    pub size: String,
}

impl Default for GhostPersistentSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            storage_class: None,
            size: default_storage_size(),
        }
    }
}

fn default_storage_size() -> String {
    "10Gi".to_string()
}

/// Ingress configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GhostIngressSpec {
    /// Create an Ingress for the blog.
    #[serde(default)]
    pub enabled: bool,

    /// Hostnames routed to the blog. Empty means any host.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    /// TLS termination.
    #[serde(default)]
    pub tls: GhostIngressTlsSpec,

    /// Annotations copied onto the Ingress.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Ingress TLS configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GhostIngressTlsSpec {
    /// Terminate TLS at the ingress.
    #[serde(default)]
    pub enabled: bool,

    /// Secret holding the certificate.
    #[serde(default)]
    pub secret_name: String,
}

/// GhostApp status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GhostAppStatus {
    /// Replica count requested from the Deployment.
    #[serde(default)]
    pub replicas: i32,

    /// Current phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<GhostAppPhase>,

    /// Human-readable reason for the current phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Generation last reconciled to Running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// GhostApp phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum GhostAppPhase {
    /// Dependents are being created for the first time.
    Creating,
    /// Every dependent matches the spec.
    Running,
    /// A spec change is being rolled out.
    Updating,
    /// The last reconciliation failed; see `reason`.
    Failure,
}

impl std::fmt::Display for GhostAppPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GhostAppPhase::Creating => "Creating",
            GhostAppPhase::Running => "Running",
            GhostAppPhase::Updating => "Updating",
            GhostAppPhase::Failure => "Failure",
        };
        f.write_str(s)
    }
}

impl GhostApp {
    /// Current phase, if any status has been written.
    pub fn phase(&self) -> Option<GhostAppPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }
}
