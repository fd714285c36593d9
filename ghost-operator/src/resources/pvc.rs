//! PersistentVolumeClaim backing Ghost content.

use super::{object_meta, pvc_name};
use crate::crd::GhostApp;
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Only one node may mount the content volume read-write.
pub const ACCESS_MODE: &str = "ReadWriteOnce";

/// Build the `<name>-ghost-content-pvc` claim.
pub fn build_pvc(app: &GhostApp) -> PersistentVolumeClaim {
    let persistent = &app.spec.persistent;

    PersistentVolumeClaim {
        metadata: object_meta(app, pvc_name(&app.name_any())),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec![ACCESS_MODE.to_string()]),
            storage_class_name: persistent.storage_class.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(persistent.size.clone()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
