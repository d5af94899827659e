//! Compilation orchestrator.
//!
//! This module coordinates the overall compile flow, managing the
//! journey from a topology or update request on disk through module
//! emission to the files the deployment engine consumes. All file I/O
//! lives here; the compiler itself stays pure.

use crate::compiler::{self, ModulePlan, TemplateKind};
use crate::config::Settings;
use crate::deployment::DeploymentManifest;
use crate::topology::types::{Topology, UpdateRequest};
use crate::utils::ids::generate_deployment_id;
use chrono::Utc;
use color_eyre::eyre::WrapErr;
use std::path::Path;

/// Caller-supplied knobs for one compile run.
#[derive(Debug, Default)]
pub struct BuildOptions {
    /// Public IP of the operator, allow-listed on the entry point
    pub caller_ip: String,
    /// Reuse an identifier instead of generating one
    pub deployment_id: Option<String>,
    /// Deployment lifetime override in seconds
    pub expires_in_secs: Option<u64>,
}

/// Compile a full-build topology file and write the output artifacts.
pub fn run_full_build(
    topology_path: &Path,
    output_dir: &Path,
    settings: &Settings,
    options: &BuildOptions,
) -> color_eyre::Result<()> {
    let content = std::fs::read_to_string(topology_path)
        .wrap_err_with(|| format!("Failed to read topology file '{}'", topology_path.display()))?;
    let topology: Topology = serde_json::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse topology file '{}'", topology_path.display()))?;

    println!(
        "Loaded topology from '{}' with {} nodes and {} edges",
        topology_path.display(),
        topology.nodes.len(),
        topology.edges.len()
    );

    let deployment_id = options
        .deployment_id
        .clone()
        .unwrap_or_else(|| generate_deployment_id(&settings.build_prefix));

    compile_and_write(&topology, None, deployment_id, output_dir, settings, options)
}

/// Compile an incremental-update request and write the output
/// artifacts. The request is normalized into a full topology (existing
/// nodes locked) so the update profile runs the identical pipeline.
pub fn run_update(
    update_path: &Path,
    output_dir: &Path,
    settings: &Settings,
    options: &BuildOptions,
) -> color_eyre::Result<()> {
    let content = std::fs::read_to_string(update_path)
        .wrap_err_with(|| format!("Failed to read update request '{}'", update_path.display()))?;
    let request: UpdateRequest = serde_json::from_str(&content)
        .wrap_err_with(|| format!("Failed to parse update request '{}'", update_path.display()))?;

    println!(
        "Loaded update request for '{}': {} new node(s) against {} existing",
        request.deployment_id,
        request.new_nodes.len(),
        request.existing_nodes.len()
    );

    let deployment_id = options
        .deployment_id
        .clone()
        .unwrap_or_else(|| request.deployment_id.clone());
    let scenario = request.scenario.clone();
    let topology = request.into_topology();

    compile_and_write(
        &topology,
        scenario,
        deployment_id,
        output_dir,
        settings,
        options,
    )
}

fn compile_and_write(
    topology: &Topology,
    scenario: Option<String>,
    deployment_id: String,
    output_dir: &Path,
    settings: &Settings,
    options: &BuildOptions,
) -> color_eyre::Result<()> {
    let plan = compiler::compile(topology, settings, &options.caller_ip)
        .wrap_err("Topology compilation failed")?;

    std::fs::create_dir_all(output_dir).wrap_err_with(|| {
        format!("Failed to create output directory '{}'", output_dir.display())
    })?;

    let modules_path = output_dir.join("modules.json");
    let modules_json = serde_json::to_string_pretty(&plan.modules)?;
    std::fs::write(&modules_path, &modules_json)
        .wrap_err_with(|| format!("Failed to write '{}'", modules_path.display()))?;

    let admin_username = topology
        .credentials
        .as_ref()
        .map(|c| c.admin_username.as_str())
        .unwrap_or_default();
    let manifest = DeploymentManifest::new(
        deployment_id,
        scenario,
        &plan,
        settings,
        admin_username,
        &options.caller_ip,
        options.expires_in_secs,
        Utc::now(),
    );

    let manifest_path = output_dir.join("manifest.json");
    let manifest_json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(&manifest_path, &manifest_json)
        .wrap_err_with(|| format!("Failed to write '{}'", manifest_path.display()))?;

    print_summary(&plan, &manifest, &modules_path, &manifest_path);
    Ok(())
}

fn print_summary(plan: &ModulePlan, manifest: &DeploymentManifest, modules: &Path, record: &Path) {
    println!("Generated module plan at {:?}", modules);
    println!("  - Deployment ID: {}", manifest.deployment_id);
    println!("  - Total modules: {}", plan.modules.len());
    println!(
        "  - Virtual networks: {}",
        plan.count_of(TemplateKind::VirtualNetwork)
    );
    println!(
        "  - Domain controllers: {} root, {} sub",
        plan.count_of(TemplateKind::RootDomainController),
        plan.count_of(TemplateKind::SubDomainController)
    );
    println!(
        "  - Servers: {} standalone, {} certificate authorities",
        plan.count_of(TemplateKind::StandaloneServer),
        plan.count_of(TemplateKind::CertificateAuthority)
    );
    if plan.count_of(TemplateKind::Jumpbox) > 0 {
        println!("  - Jumpbox included");
    }
    println!("  - Expires: {}", manifest.expires);
    println!("  - Deployment record written to {:?}", record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TOPOLOGY: &str = r#"{
        "nodes": [
            {"id": "dc1", "type": "domainController",
             "data": {"privateIPAddress": "10.10.0.5", "domainName": "a.com", "domainControllerName": "DC01"}},
            {"id": "ws1", "type": "workstation",
             "data": {"privateIPAddress": "10.10.0.6", "workstationName": "WS01", "hasPublicIP": true}}
        ],
        "edges": [{"source": "ws1", "target": "dc1"}],
        "credentials": {"enterpriseAdminUsername": "labadmin", "enterpriseAdminPassword": "S3cureP@ss"}
    }"#;

    #[test]
    fn test_full_build_writes_artifacts() {
        let dir = tempdir().unwrap();
        let topology_path = dir.path().join("topology.json");
        std::fs::write(&topology_path, TOPOLOGY).unwrap();
        let output_dir = dir.path().join("out");

        let options = BuildOptions {
            caller_ip: "198.51.100.7".to_string(),
            deployment_id: Some("BuildLab-TEST1".to_string()),
            expires_in_secs: None,
        };
        run_full_build(&topology_path, &output_dir, &Settings::default(), &options).unwrap();

        let modules = std::fs::read_to_string(output_dir.join("modules.json")).unwrap();
        assert!(modules.contains("\"moduleName\": \"DC01\""));
        assert!(modules.contains("\"moduleName\": \"vnet10\""));

        let manifest = std::fs::read_to_string(output_dir.join("manifest.json")).unwrap();
        assert!(manifest.contains("\"deploymentID\": \"BuildLab-TEST1\""));
        assert!(!manifest.to_lowercase().contains("password"));
    }

    #[test]
    fn test_update_profile_writes_artifacts() {
        let update = r#"{
            "deploymentID": "BuildLab-TEST2",
            "scenario": "Build-TEST2",
            "newNodes": [
                {"id": "ws2", "type": "workstation",
                 "data": {"privateIPAddress": "10.10.0.7", "workstationName": "WS02"}}
            ],
            "newEdges": [{"source": "ws2", "target": "dc1"}],
            "existingNodes": [
                {"id": "dc1", "type": "domainController",
                 "data": {"privateIPAddress": "10.10.0.5", "domainName": "a.com", "domainControllerName": "DC01", "hasPublicIP": true}}
            ],
            "credentials": {"enterpriseAdminUsername": "labadmin", "enterpriseAdminPassword": "S3cureP@ss"}
        }"#;

        let dir = tempdir().unwrap();
        let update_path = dir.path().join("update.json");
        std::fs::write(&update_path, update).unwrap();
        let output_dir = dir.path().join("out");

        let options = BuildOptions::default();
        run_update(&update_path, &output_dir, &Settings::default(), &options).unwrap();

        let modules = std::fs::read_to_string(output_dir.join("modules.json")).unwrap();
        // Only the new workstation produces a module; the locked DC and
        // its VNet already exist
        assert!(modules.contains("\"moduleName\": \"WS02\""));
        assert!(!modules.contains("\"moduleName\": \"DC01\""));
        assert!(!modules.contains("\"moduleName\": \"vnet10\""));

        let manifest = std::fs::read_to_string(output_dir.join("manifest.json")).unwrap();
        assert!(manifest.contains("\"deploymentID\": \"BuildLab-TEST2\""));
        assert!(manifest.contains("\"scenario\": \"Build-TEST2\""));
    }
}
