//! Service in front of the Ghost pods.

use super::{GHOST_PORT, HTTP_PORT_NAME, labels, object_meta};
use crate::crd::GhostApp;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;

/// Service type used when the blog is only reachable inside the cluster.
pub const CLUSTER_IP: &str = "ClusterIP";

/// Service type used when an Ingress fronts the blog.
pub const NODE_PORT: &str = "NodePort";

/// Build the Service, named after the GhostApp.
pub fn build_service(app: &GhostApp) -> Service {
    let service_type = if app.spec.ingress.enabled {
        NODE_PORT
    } else {
        CLUSTER_IP
    };

    Service {
        metadata: object_meta(app, app.name_any()),
        spec: Some(ServiceSpec {
            selector: Some(labels(app)),
            type_: Some(service_type.to_string()),
            ports: Some(vec![ServicePort {
                name: Some(HTTP_PORT_NAME.to_string()),
                protocol: Some("TCP".to_string()),
                port: GHOST_PORT,
                target_port: Some(IntOrString::Int(GHOST_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
