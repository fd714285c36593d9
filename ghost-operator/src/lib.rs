//! Ghost Kubernetes Operator
//!
//! This crate provides a Kubernetes operator that runs Ghost blogs from
//! `GhostApp` custom resources.
//!
//! # Custom Resource Definitions
//!
//! - **GhostApp**: one Ghost blog. The operator keeps a ConfigMap, an
//!   optional PersistentVolumeClaim, a Deployment, a Service and an optional
//!   Ingress in line with it.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: ghost.fossil.or.id/v1alpha1
//! kind: GhostApp
//! metadata:
//!   name: blog
//! spec:
//!   replicas: 1
//!   image: ghost:3
//!   config:
//!     url: https://blog.example.test
//!     database:
//!       client: sqlite3
//!       connection:
//!         filename: /var/lib/ghost/content/data/ghost.db
//!   persistent:
//!     enabled: true
//!     size: 10Gi
//!   ingress:
//!     enabled: true
//!     hosts: [blog.example.test]
//!     tls:
//!       enabled: true
//!       secretName: blog-tls
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod dependent;
pub mod error;
pub mod observability;
pub mod resources;
pub mod store;

pub use config::OperatorConfig;
pub use crd::{GhostApp, GhostAppPhase, GhostAppSpec, GhostAppStatus};
pub use error::{OperatorError, OperatorResult};
