//! Per-node dependency resolution.
//!
//! Given the global peering plan, this file works out what each new
//! node's module has to wait on: creation of its virtual network, the
//! promotion of its parent domain controller, and the modules that own
//! the peerings it needs but does not create itself.

use crate::compiler::emitter::ModuleId;
use crate::compiler::planner::{peering_needs, resolve_parent, PeeringPlan, PeeringState};
use crate::compiler::CompileError;
use crate::net::{classify, VNetId};
use crate::topology::graph::NodeGraph;
use crate::topology::types::{Node, NodeKind};
use std::collections::{BTreeSet, HashSet};

/// The new-node batch of one compile pass.
pub struct Batch<'a> {
    /// Ids of all nodes provisioned by this pass
    pub new_ids: HashSet<&'a str>,
    /// New sub domain controllers in processing order
    pub new_sub_dcs: Vec<&'a Node>,
    /// VNets first introduced by this pass
    pub new_vnets: BTreeSet<VNetId>,
}

/// Resolution result for one node.
pub struct Resolution<'a> {
    /// Modules this node's module waits on, in resolution order,
    /// without duplicates
    pub depends_on: Vec<ModuleId>,
    pub skip_parent_peering: bool,
    pub skip_root_peering: bool,
    pub skip_peering: bool,
    /// Resolved parent DC (root fallback applied); `None` for root DCs
    /// and jump boxes
    pub parent: Option<&'a Node>,
}

fn push_unique(deps: &mut Vec<ModuleId>, id: ModuleId) {
    if !deps.contains(&id) {
        deps.push(id);
    }
}

/// Evaluate one peering key against the plan.
///
/// Returns `(skip, owner)`: whether this module skips creating the
/// peering, and the owning module to depend on when someone else
/// creates it.
fn evaluate_key(
    plan: &PeeringPlan,
    key: crate::net::PeeringKey,
    me: &ModuleId,
) -> (bool, Option<ModuleId>) {
    match plan.state(key) {
        Some(PeeringState::AlreadyExists) => (true, None),
        Some(PeeringState::OwnedBy(owner)) if owner == me => (false, None),
        Some(PeeringState::OwnedBy(owner)) => (true, Some(owner.clone())),
        None => (false, None),
    }
}

/// Resolve the dependency set and peering flags for one new node.
pub fn resolve<'a>(
    node: &'a Node,
    graph: &NodeGraph<'a>,
    plan: &PeeringPlan,
    batch: &Batch<'a>,
    root: Option<&'a Node>,
) -> Result<Resolution<'a>, CompileError> {
    let me = ModuleId::node(&node.id);
    let mut depends_on = Vec::new();

    // A VNet first introduced by this pass must exist before anything
    // is placed into it
    if let Some(vnet) = classify(&node.data.private_ip) {
        if batch.new_vnets.contains(&vnet) {
            depends_on.push(ModuleId::vnet(vnet));
        }
    }

    let mut resolution = Resolution {
        depends_on: Vec::new(),
        skip_parent_peering: false,
        skip_root_peering: false,
        skip_peering: false,
        parent: None,
    };

    match node.kind {
        NodeKind::Jumpbox => {}
        NodeKind::DomainController if graph.is_root_dc(node) => {}
        NodeKind::DomainController => {
            let parent = resolve_parent(graph, node, root)?;
            resolution.parent = Some(parent);

            // A parent promoted in the same batch must finish first
            if batch.new_ids.contains(parent.id.as_str()) {
                push_unique(&mut depends_on, ModuleId::node(&parent.id));
            }

            let needs = peering_needs(node, parent, root);
            if let Some(key) = needs.parent {
                let (skip, owner) = evaluate_key(plan, key, &me);
                resolution.skip_parent_peering = skip;
                if let Some(owner) = owner {
                    log::debug!(
                        "{} skips parent peering {}, depending on its owner",
                        node.id,
                        key
                    );
                    push_unique(&mut depends_on, owner);
                }
            }
            if let Some(key) = needs.root {
                let (skip, owner) = evaluate_key(plan, key, &me);
                resolution.skip_root_peering = skip;
                if let Some(owner) = owner {
                    log::debug!(
                        "{} skips root peering {}, depending on its owner",
                        node.id,
                        key
                    );
                    push_unique(&mut depends_on, owner);
                }
            }
        }
        NodeKind::Workstation | NodeKind::Standalone | NodeKind::CertificateAuthority => {
            let parent = resolve_parent(graph, node, root)?;
            resolution.parent = Some(parent);

            // Domain join requires every DC promotion of this pass to
            // have settled, not just the one DC being joined
            for sub_dc in &batch.new_sub_dcs {
                if sub_dc.id != node.id {
                    push_unique(&mut depends_on, ModuleId::node(&sub_dc.id));
                }
            }

            let needs = peering_needs(node, parent, root);
            if let Some(key) = needs.parent {
                let (skip, owner) = evaluate_key(plan, key, &me);
                resolution.skip_peering = skip;
                if let Some(owner) = owner {
                    log::debug!("{} skips peering {}, depending on its owner", node.id, key);
                    push_unique(&mut depends_on, owner);
                }
            }
        }
    }

    resolution.depends_on = depends_on;
    Ok(resolution)
}
