//! Custom Resource Definitions for the Ghost Kubernetes operator.
//!
//! - [`GhostApp`]: a Ghost blog deployment

mod ghost_app;

pub use ghost_app::{
    DatabaseClient, GhostApp, GhostAppPhase, GhostAppSpec, GhostAppStatus, GhostConfigSpec,
    GhostDatabaseConnectionSpec, GhostDatabaseSpec, GhostIngressSpec, GhostIngressTlsSpec,
    GhostPersistentSpec, GhostServerSpec,
};
