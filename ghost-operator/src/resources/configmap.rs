//! ConfigMap carrying the rendered Ghost configuration.

use super::{CONFIG_FILE, GHOST_PORT, config_map_name, object_meta};
use crate::crd::{GhostApp, GhostConfigSpec, GhostServerSpec};
use crate::error::OperatorResult;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use std::collections::BTreeMap;

/// Render the Ghost config as two-space indented JSON.
///
/// The server block is pinned to 0.0.0.0 on the Ghost port so that it always
/// matches the container port, whatever the resource asks for.
pub fn render_config(config: &GhostConfigSpec) -> OperatorResult<String> {
    let config = GhostConfigSpec {
        server: Some(GhostServerSpec {
            host: "0.0.0.0".to_string(),
            port: IntOrString::Int(GHOST_PORT),
        }),
        ..config.clone()
    };
    Ok(serde_json::to_string_pretty(&config)?)
}

/// Build the `<name>-ghost-config` ConfigMap.
pub fn build_configmap(app: &GhostApp) -> OperatorResult<ConfigMap> {
    let rendered = render_config(&app.spec.config)?;

    Ok(ConfigMap {
        metadata: object_meta(app, config_map_name(&app.name_any())),
        data: Some(BTreeMap::from([(CONFIG_FILE.to_string(), rendered)])),
        ..Default::default()
    })
}
