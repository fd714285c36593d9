//! Access to the Kubernetes object store.
//!
//! The reconciler only needs a narrow keyed get/create/replace contract plus
//! status writes. [`KubeStore`] implements it against the API server;
//! [`MemoryStore`] implements it in memory for tests and local runs.

mod api;
mod memory;

pub use api::KubeStore;
pub use memory::{Fault, MemoryStore, StoreOp, StoreWrite};

use crate::crd::{GhostApp, GhostAppStatus};
use crate::dependent::{DependentKind, DependentObject};
use crate::error::OperatorResult;
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Keyed object store with optimistic concurrency.
///
/// Reads return `Ok(None)` for missing objects. Replacing an object whose
/// `resourceVersion` is stale fails with [`crate::OperatorError::Conflict`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a GhostApp.
    async fn get_app(&self, namespace: &str, name: &str) -> OperatorResult<Option<GhostApp>>;

    /// Write the status subresource of a GhostApp.
    async fn patch_app_status(
        &self,
        namespace: &str,
        name: &str,
        status: &GhostAppStatus,
    ) -> OperatorResult<()>;

    /// Fetch a dependent object.
    async fn get(
        &self,
        kind: DependentKind,
        namespace: &str,
        name: &str,
    ) -> OperatorResult<Option<DependentObject>>;

    /// Create a dependent object; fails if it already exists.
    async fn create(&self, object: &DependentObject) -> OperatorResult<DependentObject>;

    /// Replace an existing dependent object.
    async fn replace(&self, object: &DependentObject) -> OperatorResult<DependentObject>;
}
