//! Peering plan computation.
//!
//! A compile pass needs to know, for every pair of virtual networks the
//! topology spans, whether the peering between them already exists on
//! the running deployment or which module will create it. Locked nodes
//! seed the existing set; new nodes then claim ownership first come,
//! first served, in the canonical processing order. Exactly one module
//! creates any given peering.

use crate::compiler::emitter::ModuleId;
use crate::compiler::CompileError;
use crate::net::{classify, PeeringKey};
use crate::topology::graph::NodeGraph;
use crate::topology::types::{Node, NodeKind};
use std::collections::BTreeMap;

/// State of one required peering within a compile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeeringState {
    /// Provisioned by a prior pass; nobody creates it again
    AlreadyExists,
    /// Created by exactly this module in the current pass
    OwnedBy(ModuleId),
}

/// The global peering plan for one compile pass.
#[derive(Debug, Default)]
pub struct PeeringPlan {
    entries: BTreeMap<PeeringKey, PeeringState>,
}

impl PeeringPlan {
    pub fn state(&self, key: PeeringKey) -> Option<&PeeringState> {
        self.entries.get(&key)
    }

    /// All entries in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PeeringKey, &PeeringState)> {
        self.entries.iter()
    }

    fn mark_existing(&mut self, key: PeeringKey) {
        // An existing peering always wins over a claim
        self.entries.insert(key, PeeringState::AlreadyExists);
    }

    /// Claim a peering for `owner` unless it is already accounted for.
    fn claim(&mut self, key: PeeringKey, owner: &ModuleId) {
        if !self.entries.contains_key(&key) {
            log::debug!("Peering {} will be created by {}", key, owner);
            self.entries
                .insert(key, PeeringState::OwnedBy(owner.clone()));
        }
    }
}

/// The peering keys one node requires: against its parent, and (for
/// sub domain controllers) against the forest root, which AD trust
/// traffic must be able to reach.
pub(crate) struct PeeringNeeds {
    pub parent: Option<PeeringKey>,
    pub root: Option<PeeringKey>,
}

pub(crate) fn peering_needs(node: &Node, parent: &Node, root: Option<&Node>) -> PeeringNeeds {
    let node_vnet = classify(&node.data.private_ip);
    let parent_vnet = classify(&parent.data.private_ip);

    let parent_key = match (node_vnet, parent_vnet) {
        (Some(a), Some(b)) => PeeringKey::between(a, b),
        _ => None,
    };

    // Only sub DCs evaluate the root pair, and only when their parent
    // is not the root itself
    let root_key = match (node.kind, root) {
        (NodeKind::DomainController, Some(root)) if root.id != parent.id => {
            match (node_vnet, classify(&root.data.private_ip)) {
                (Some(a), Some(b)) => PeeringKey::between(a, b),
                _ => None,
            }
        }
        _ => None,
    };

    PeeringNeeds {
        parent: parent_key,
        root: root_key,
    }
}

/// Resolve a node's parent DC, falling back to the deployment root.
///
/// The fallback guarantees a plan is always produced, at the cost of a
/// possibly wrong parent when naming conventions are violated; with no
/// root DC at all the topology cannot be compiled.
pub(crate) fn resolve_parent<'a>(
    graph: &NodeGraph<'a>,
    node: &Node,
    root: Option<&'a Node>,
) -> Result<&'a Node, CompileError> {
    graph
        .parent_of(node)
        .or(root)
        .ok_or_else(|| CompileError::Topology {
            reason: format!(
                "no resolvable root domain controller to serve as parent for node '{}'",
                node.id
            ),
        })
}

/// Compute the peering plan for one compile pass.
///
/// `locked` are the already-provisioned nodes, `ordered_new` the new
/// nodes in canonical processing order (root DCs, sub DCs parent before
/// child, then workstations and CAs). The ordering is a correctness
/// requirement: it decides which module saw each peering key first, and
/// it must be stable across repeated compiles of the same input.
pub fn plan(
    graph: &NodeGraph,
    locked: &[&Node],
    ordered_new: &[&Node],
    root: Option<&Node>,
) -> Result<PeeringPlan, CompileError> {
    let mut plan = PeeringPlan::default();

    // Pass 1: locked nodes record which peerings the running deployment
    // already has. They never claim ownership of anything.
    for node in locked {
        if !node.kind.joins_domain() {
            continue;
        }
        if graph.is_root_dc(node) {
            continue;
        }
        let parent = match graph.parent_of(node).or(root) {
            Some(parent) => parent,
            None => {
                log::warn!(
                    "Locked node '{}' has no resolvable parent; no existing peering recorded",
                    node.id
                );
                continue;
            }
        };
        if parent.id == node.id {
            continue;
        }
        let needs = peering_needs(node, parent, root);
        if let Some(key) = needs.parent {
            log::debug!("Existing peering {} from locked node '{}'", key, node.id);
            plan.mark_existing(key);
        }
        if let Some(key) = needs.root {
            log::debug!("Existing root peering {} from locked node '{}'", key, node.id);
            plan.mark_existing(key);
        }
    }

    // Pass 2: new nodes claim creation of whatever is still missing.
    // First claimant wins; everyone later skips and depends on it.
    for node in ordered_new {
        if !node.kind.joins_domain() {
            continue;
        }
        if graph.is_root_dc(node) {
            continue;
        }
        let parent = resolve_parent(graph, node, root)?;
        if parent.id == node.id {
            continue;
        }
        let owner = ModuleId::node(&node.id);
        let needs = peering_needs(node, parent, root);
        if let Some(key) = needs.parent {
            plan.claim(key, &owner);
        }
        if let Some(key) = needs.root {
            plan.claim(key, &owner);
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::VNetId;
    use crate::topology::types::{Edge, NodeData};

    fn dc(id: &str, ip: &str, domain: &str, locked: bool) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::DomainController,
            data: NodeData {
                private_ip: ip.to_string(),
                domain_name: Some(domain.to_string()),
                domain_controller_name: Some(id.to_uppercase()),
                locked: Some(locked),
                ..Default::default()
            },
            status: None,
        }
    }

    fn workstation(id: &str, ip: &str, locked: bool) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::Workstation,
            data: NodeData {
                private_ip: ip.to_string(),
                workstation_name: Some(id.to_uppercase()),
                locked: Some(locked),
                ..Default::default()
            },
            status: None,
        }
    }

    fn edge(source: &str, target: &str) -> Edge {
        Edge {
            source: source.to_string(),
            target: target.to_string(),
        }
    }

    fn key(a: VNetId, b: VNetId) -> PeeringKey {
        PeeringKey::between(a, b).unwrap()
    }

    #[test]
    fn test_first_claimant_owns_peering() {
        let nodes = vec![
            dc("root", "10.10.0.5", "a.com", false),
            dc("sub1", "172.16.0.5", "b.a.com", false),
            dc("sub2", "172.16.0.6", "c.a.com", false),
        ];
        let edges = vec![edge("sub1", "root"), edge("sub2", "root")];
        let graph = NodeGraph::new(&nodes, &edges);
        let root = graph.root_dc();
        let ordered: Vec<&Node> = nodes.iter().collect();

        let plan = plan(&graph, &[], &ordered, root).unwrap();

        assert_eq!(
            plan.state(key(VNetId::V10, VNetId::V172)),
            Some(&PeeringState::OwnedBy(ModuleId::node("sub1")))
        );
        // Only one entry exists for the pair, whoever needed it later
        // shares it
        assert_eq!(plan.iter().count(), 1);
    }

    #[test]
    fn test_locked_nodes_seed_already_exists() {
        let nodes = vec![
            dc("root", "10.10.0.5", "a.com", true),
            dc("sub", "172.16.0.5", "b.a.com", true),
            workstation("ws2", "172.16.0.7", false),
        ];
        let edges = vec![edge("sub", "root"), edge("ws2", "root")];
        let graph = NodeGraph::new(&nodes, &edges);
        let root = graph.root_dc();
        let locked: Vec<&Node> = nodes.iter().filter(|n| n.is_locked()).collect();
        let new: Vec<&Node> = nodes.iter().filter(|n| !n.is_locked()).collect();

        let plan = plan(&graph, &locked, &new, root).unwrap();

        // The locked sub DC already spans the pair, so the new
        // workstation must not claim it
        assert_eq!(
            plan.state(key(VNetId::V10, VNetId::V172)),
            Some(&PeeringState::AlreadyExists)
        );
    }

    #[test]
    fn test_sub_dc_evaluates_root_pair() {
        // mid sits in V172 under root (V10); leaf sits in V192 under
        // mid, so leaf needs both the V172 pair and the V10 root pair
        let nodes = vec![
            dc("root", "10.10.0.5", "a.com", false),
            dc("mid", "172.16.0.5", "b.a.com", false),
            dc("leaf", "192.168.0.5", "c.b.a.com", false),
        ];
        let edges = vec![edge("mid", "root"), edge("leaf", "mid")];
        let graph = NodeGraph::new(&nodes, &edges);
        let root = graph.root_dc();
        let ordered: Vec<&Node> = nodes.iter().collect();

        let plan = plan(&graph, &[], &ordered, root).unwrap();

        assert_eq!(
            plan.state(key(VNetId::V10, VNetId::V172)),
            Some(&PeeringState::OwnedBy(ModuleId::node("mid")))
        );
        assert_eq!(
            plan.state(key(VNetId::V172, VNetId::V192)),
            Some(&PeeringState::OwnedBy(ModuleId::node("leaf")))
        );
        assert_eq!(
            plan.state(key(VNetId::V10, VNetId::V192)),
            Some(&PeeringState::OwnedBy(ModuleId::node("leaf")))
        );
    }

    #[test]
    fn test_same_vnet_needs_no_peering() {
        let nodes = vec![
            dc("root", "10.10.0.5", "a.com", false),
            workstation("ws1", "10.10.0.6", false),
        ];
        let edges = vec![edge("ws1", "root")];
        let graph = NodeGraph::new(&nodes, &edges);
        let root = graph.root_dc();
        let ordered: Vec<&Node> = nodes.iter().collect();

        let plan = plan(&graph, &[], &ordered, root).unwrap();
        assert_eq!(plan.iter().count(), 0);
    }

    #[test]
    fn test_unclassifiable_ip_joins_no_peering() {
        let nodes = vec![
            dc("root", "10.10.0.5", "a.com", false),
            workstation("ws1", "203.0.113.9", false),
        ];
        let edges = vec![edge("ws1", "root")];
        let graph = NodeGraph::new(&nodes, &edges);
        let root = graph.root_dc();
        let ordered: Vec<&Node> = nodes.iter().collect();

        let plan = plan(&graph, &[], &ordered, root).unwrap();
        assert_eq!(plan.iter().count(), 0);
    }

    #[test]
    fn test_missing_root_fails_for_orphan_node() {
        let nodes = vec![workstation("ws1", "10.10.0.6", false)];
        let graph = NodeGraph::new(&nodes, &[]);
        let ordered: Vec<&Node> = nodes.iter().collect();

        let result = plan(&graph, &[], &ordered, None);
        assert!(matches!(result, Err(CompileError::Topology { .. })));
    }
}
