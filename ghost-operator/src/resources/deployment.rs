//! Deployment running the Ghost container.

use super::{
    CONFIG_FILE, CONFIG_MOUNT_PATH, CONTENT_MOUNT_PATH, GHOST_PORT, HTTP_PORT_NAME,
    RUNTIME_CONFIG_PATH, config_map_name, labels, object_meta, pvc_name,
};
use crate::crd::GhostApp;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, ExecAction, Lifecycle,
    LifecycleHandler, PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;

/// Name of the single Ghost container.
pub const CONTAINER_NAME: &str = "ghost";

const CONFIG_VOLUME: &str = "ghost-config";
const CONTENT_VOLUME: &str = "ghost-content";

/// Build the Deployment, named after the GhostApp.
pub fn build_deployment(app: &GhostApp) -> Deployment {
    let labels = labels(app);

    Deployment {
        metadata: object_meta(app, app.name_any()),
        spec: Some(DeploymentSpec {
            replicas: Some(app.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![ghost_container(app)],
                    volumes: Some(volumes(app)),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn ghost_container(app: &GhostApp) -> Container {
    // Ghost only reads config from its working directory.
    let link = format!("ln -sf {CONFIG_MOUNT_PATH}/{CONFIG_FILE} {RUNTIME_CONFIG_PATH}");

    Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(app.spec.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports: Some(vec![ContainerPort {
            name: Some(HTTP_PORT_NAME.to_string()),
            container_port: GHOST_PORT,
            ..Default::default()
        }]),
        lifecycle: Some(Lifecycle {
            post_start: Some(LifecycleHandler {
                exec: Some(ExecAction {
                    command: Some(vec!["/bin/sh".to_string(), "-c".to_string(), link]),
                }),
                ..Default::default()
            }),
            ..Default::default()
        }),
        volume_mounts: Some(vec![
            VolumeMount {
                name: CONFIG_VOLUME.to_string(),
                mount_path: CONFIG_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: CONTENT_VOLUME.to_string(),
                mount_path: CONTENT_MOUNT_PATH.to_string(),
                read_only: Some(false),
                ..Default::default()
            },
        ]),
        ..Default::default()
    }
}

fn volumes(app: &GhostApp) -> Vec<Volume> {
    let name = app.name_any();

    let config = Volume {
        name: CONFIG_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map_name(&name).into(),
            ..Default::default()
        }),
        ..Default::default()
    };

    let content = if app.spec.persistent.enabled {
        Volume {
            name: CONTENT_VOLUME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: pvc_name(&name),
                ..Default::default()
            }),
            ..Default::default()
        }
    } else {
        Volume {
            name: CONTENT_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }
    };

    vec![config, content]
}
