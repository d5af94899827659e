//! Topology compilation pipeline.
//!
//! This module turns a validated topology into a dependency-ordered
//! list of infrastructure module descriptors. The same pipeline serves
//! both call profiles: a from-scratch build (no locked nodes) and an
//! incremental update of a running deployment (locked nodes seed plan
//! state, new nodes produce modules).
//!
//! The pipeline is synchronous, CPU-bound, and touches no network or
//! filesystem state; a failed compile can simply be corrected and
//! retried.

pub mod emitter;
pub mod planner;
pub mod resolver;


pub use emitter::{ModuleDescriptor, ModuleId, TemplateKind};
pub use planner::{PeeringPlan, PeeringState};

use crate::config::Settings;
use crate::net::{classify, VNetId};
use crate::topology::graph::NodeGraph;
use crate::topology::types::{Node, NodeKind, Topology};
use crate::utils::validation::validate_topology;
use emitter::{EmitContext, NodeEmission, VnetFlags};
use resolver::Batch;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Compilation failures. All of them are local and recoverable: no
/// cloud or filesystem state has been touched when one is raised, and
/// no partial module list is ever returned.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A node is missing an attribute its kind requires
    #[error("Node '{node_id}' is missing required field '{field}'")]
    Validation { node_id: String, field: &'static str },
    /// The topology is structurally unusable
    #[error("Invalid topology: {reason}")]
    Topology { reason: String },
    /// The emitted dependency graph is not a DAG
    #[error("Dependency cycle among modules: {modules:?}")]
    DependencyCycle { modules: Vec<String> },
}

/// The compiled output of one pass: an ordered module list whose
/// `dependsOn` relation is a verified DAG.
#[derive(Debug)]
pub struct ModulePlan {
    pub modules: Vec<ModuleDescriptor>,
}

impl ModulePlan {
    /// Number of modules using a given template.
    pub fn count_of(&self, template: TemplateKind) -> usize {
        self.modules
            .iter()
            .filter(|m| m.template == template)
            .count()
    }

    pub fn module(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|m| m.module_name == name)
    }
}

/// Compile a topology into its module plan.
///
/// Locked nodes (prior passes) contribute peering state only; every
/// non-locked node yields exactly one module, preceded by modules for
/// any virtual network this pass introduces.
pub fn compile(
    topology: &Topology,
    settings: &Settings,
    caller_ip: &str,
) -> Result<ModulePlan, CompileError> {
    validate_topology(topology)?;

    let graph = NodeGraph::new(&topology.nodes, &topology.edges);
    let locked: Vec<&Node> = topology.nodes.iter().filter(|n| n.is_locked()).collect();
    let new: Vec<&Node> = topology.nodes.iter().filter(|n| !n.is_locked()).collect();
    let root = graph.root_dc();

    log::info!(
        "Compiling topology: {} new node(s), {} locked node(s)",
        new.len(),
        locked.len()
    );

    let ordered_new = processing_order(&graph, &new)?;

    // VNets already present on the deployment vs. introduced now
    let existing_vnets: BTreeSet<VNetId> = locked
        .iter()
        .filter_map(|n| classify(&n.data.private_ip))
        .collect();
    let new_vnets: BTreeSet<VNetId> = new
        .iter()
        .filter_map(|n| classify(&n.data.private_ip))
        .filter(|vnet| !existing_vnets.contains(vnet))
        .collect();

    let plan = planner::plan(&graph, &locked, &ordered_new, root)?;

    let batch = Batch {
        new_ids: new.iter().map(|n| n.id.as_str()).collect(),
        new_sub_dcs: ordered_new
            .iter()
            .copied()
            .filter(|n| n.kind == NodeKind::DomainController && !graph.is_root_dc(n))
            .collect(),
        new_vnets: new_vnets.clone(),
    };

    // Display names for every module this pass can depend on
    let mut names: BTreeMap<ModuleId, String> = BTreeMap::new();
    for node in &new {
        names.insert(ModuleId::node(&node.id), emitter::required_name(node)?);
    }
    for vnet in VNetId::ALL {
        names.insert(ModuleId::vnet(vnet), vnet.template().module_name.to_string());
    }

    let mut vnet_flags = VnetFlags::default();
    for node in graph.nodes() {
        if let Some(vnet) = classify(&node.data.private_ip) {
            vnet_flags.set(vnet);
        }
    }

    let admin_username = topology
        .credentials
        .as_ref()
        .map(|c| c.admin_username.as_str())
        .unwrap_or_default();

    let ctx = EmitContext {
        settings,
        admin_username,
        caller_ip,
        vnet_flags,
        jumpbox_ip: graph
            .jumpbox()
            .map(|jb| jb.data.private_ip.clone())
            .unwrap_or_default(),
        jumpbox_connected_ip: graph
            .jumpbox_connected_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_default(),
    };

    let mut modules = Vec::new();
    for vnet in &new_vnets {
        modules.push(emitter::emit_vnet(*vnet, &ctx));
    }

    for &node in &ordered_new {
        let resolution = resolver::resolve(node, &graph, &plan, &batch, root)?;
        let depends_on = resolution
            .depends_on
            .iter()
            .filter_map(|id| names.get(id).cloned())
            .collect();
        modules.push(emitter::emit(
            &NodeEmission {
                node,
                parent: resolution.parent,
                root,
                depends_on,
                skip_parent_peering: resolution.skip_parent_peering,
                skip_root_peering: resolution.skip_root_peering,
                skip_peering: resolution.skip_peering,
            },
            &ctx,
        )?);
    }

    verify_acyclic(&modules)?;

    log::info!("Compiled {} module(s)", modules.len());
    Ok(ModulePlan { modules })
}

/// Canonical processing order for the new-node batch: root DCs, sub
/// DCs strictly after their in-batch parent, workstations/CAs in
/// declared order, jump boxes last.
///
/// The order decides peering ownership, so it must be stable across
/// repeated compiles of the same input.
fn processing_order<'a>(
    graph: &NodeGraph<'a>,
    new_nodes: &[&'a Node],
) -> Result<Vec<&'a Node>, CompileError> {
    let mut ordered = Vec::with_capacity(new_nodes.len());

    for node in new_nodes {
        if node.kind == NodeKind::DomainController && graph.is_root_dc(node) {
            ordered.push(*node);
        }
    }

    let subs: Vec<&Node> = new_nodes
        .iter()
        .copied()
        .filter(|n| n.kind == NodeKind::DomainController && !graph.is_root_dc(n))
        .collect();
    let sub_ids: HashSet<&str> = subs.iter().map(|n| n.id.as_str()).collect();
    let mut placed: HashSet<&str> = HashSet::new();

    while placed.len() < subs.len() {
        let mut progressed = false;
        for node in &subs {
            if placed.contains(node.id.as_str()) {
                continue;
            }
            let waiting_on_parent = graph
                .parent_of(node)
                .map(|parent| {
                    sub_ids.contains(parent.id.as_str()) && !placed.contains(parent.id.as_str())
                })
                .unwrap_or(false);
            if !waiting_on_parent {
                ordered.push(*node);
                placed.insert(node.id.as_str());
                progressed = true;
            }
        }
        if !progressed {
            let stuck: Vec<String> = subs
                .iter()
                .filter(|n| !placed.contains(n.id.as_str()))
                .map(|n| n.id.clone())
                .collect();
            return Err(CompileError::Topology {
                reason: format!(
                    "circular parent relationship among domain controllers: {:?}",
                    stuck
                ),
            });
        }
    }

    for node in new_nodes {
        if matches!(
            node.kind,
            NodeKind::Workstation | NodeKind::Standalone | NodeKind::CertificateAuthority
        ) {
            ordered.push(*node);
        }
    }

    for node in new_nodes {
        if node.kind == NodeKind::Jumpbox {
            ordered.push(*node);
        }
    }

    Ok(ordered)
}

/// Defensive acyclicity check over the emitted `dependsOn` relation.
///
/// Peering alone cannot produce a cycle, but the plan is unusable if a
/// future change introduces one, so fail loudly rather than emit it.
fn verify_acyclic(modules: &[ModuleDescriptor]) -> Result<(), CompileError> {
    let names: HashSet<&str> = modules.iter().map(|m| m.module_name.as_str()).collect();

    let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for module in modules {
        indegree.entry(module.module_name.as_str()).or_insert(0);
        for dep in &module.depends_on {
            // Dependencies outside this pass are already provisioned
            if names.contains(dep.as_str()) {
                *indegree.entry(module.module_name.as_str()).or_insert(0) += 1;
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(module.module_name.as_str());
            }
        }
    }

    let mut queue: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&name, _)| name)
        .collect();
    let mut visited = 0usize;

    while let Some(name) = queue.pop_front() {
        visited += 1;
        if let Some(children) = dependents.get(name) {
            for &child in children {
                let degree = indegree.get_mut(child).ok_or_else(|| CompileError::Topology {
                    reason: format!("unknown module '{}' in dependency graph", child),
                })?;
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(child);
                }
            }
        }
    }

    if visited != modules.len() {
        let cyclic: Vec<String> = indegree
            .iter()
            .filter(|(_, &degree)| degree > 0)
            .map(|(&name, _)| name.to_string())
            .collect();
        return Err(CompileError::DependencyCycle { modules: cyclic });
    }

    Ok(())
}
