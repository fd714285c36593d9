//! Ingress routing external traffic to the Ghost Service.

use super::{GHOST_PORT, object_meta};
use crate::crd::GhostApp;
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use kube::ResourceExt;

/// Build the Ingress, named after the GhostApp.
///
/// One rule per configured host, or a single host-less rule when no hosts
/// are configured. TLS with no hosts is rejected before this is called.
pub fn build_ingress(app: &GhostApp) -> Ingress {
    let name = app.name_any();
    let ingress = &app.spec.ingress;

    let http = HTTPIngressRuleValue {
        paths: vec![HTTPIngressPath {
            path: Some("/".to_string()),
            path_type: "Prefix".to_string(),
            backend: IngressBackend {
                service: Some(IngressServiceBackend {
                    name: name.clone(),
                    port: Some(ServiceBackendPort {
                        number: Some(GHOST_PORT),
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            },
        }],
    };

    let rules = if ingress.hosts.is_empty() {
        vec![IngressRule {
            host: None,
            http: Some(http),
        }]
    } else {
        ingress
            .hosts
            .iter()
            .map(|host| IngressRule {
                host: Some(host.clone()),
                http: Some(http.clone()),
            })
            .collect()
    };

    let tls = ingress.tls.enabled.then(|| {
        vec![IngressTLS {
            hosts: Some(ingress.hosts.clone()),
            secret_name: Some(ingress.tls.secret_name.clone()),
        }]
    });

    let mut metadata = object_meta(app, name);
    if !ingress.annotations.is_empty() {
        metadata.annotations = Some(ingress.annotations.clone());
    }

    Ingress {
        metadata,
        spec: Some(IngressSpec {
            rules: Some(rules),
            tls,
            ..Default::default()
        }),
        ..Default::default()
    }
}
