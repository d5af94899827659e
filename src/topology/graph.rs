//! Node graph queries.
//!
//! This file builds an indexed view over a topology's nodes and edges
//! and answers the structural questions compilation needs: who is a
//! node's parent domain controller, which DC is the deployment root,
//! and where the jump box connects.
//!
//! Parent resolution follows one fixed order everywhere: edges first,
//! then the domain-suffix heuristic, with the root DC as the caller's
//! fallback of last resort.

use crate::topology::types::{Edge, Node, NodeKind};
use std::collections::HashMap;

/// Strip the leftmost DNS label: `"b.a.com"` -> `Some("a.com")`.
///
/// Returns `None` for single-label names, which have no parent domain.
pub fn parent_domain(domain: &str) -> Option<&str> {
    let (_, rest) = domain.split_once('.')?;
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

/// Indexed view over a topology's nodes and edges.
///
/// Construction order is preserved: iteration and every "first match"
/// rule below follow the declared node/edge order, which keeps repeated
/// compiles of the same input deterministic.
pub struct NodeGraph<'a> {
    nodes: Vec<&'a Node>,
    by_id: HashMap<&'a str, usize>,
    /// Edge-order adjacency: node id -> neighbor ids
    neighbors: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> NodeGraph<'a> {
    pub fn new(nodes: &'a [Node], edges: &'a [Edge]) -> Self {
        let node_refs: Vec<&Node> = nodes.iter().collect();
        let mut by_id = HashMap::new();
        for (index, node) in node_refs.iter().enumerate() {
            by_id.insert(node.id.as_str(), index);
        }

        let mut neighbors: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in edges {
            if by_id.contains_key(edge.source.as_str()) && by_id.contains_key(edge.target.as_str())
            {
                neighbors
                    .entry(edge.source.as_str())
                    .or_default()
                    .push(edge.target.as_str());
                neighbors
                    .entry(edge.target.as_str())
                    .or_default()
                    .push(edge.source.as_str());
            } else {
                log::warn!(
                    "Edge {} -> {} references an unknown node, ignoring",
                    edge.source,
                    edge.target
                );
            }
        }

        NodeGraph {
            nodes: node_refs,
            by_id,
            neighbors,
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a Node> {
        self.by_id.get(id).map(|&index| self.nodes[index])
    }

    /// All nodes in declared order.
    pub fn nodes(&self) -> impl Iterator<Item = &'a Node> + '_ {
        self.nodes.iter().copied()
    }

    /// Edge neighbors of a node, in edge declaration order.
    pub fn neighbors<'s>(&'s self, id: &str) -> impl Iterator<Item = &'a Node> + 's {
        self.neighbors
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(move |&neighbor_id| self.get(neighbor_id))
    }

    /// Whether a domain controller is the root of its forest.
    ///
    /// An explicit `isSub` marker wins; without one, a DC with no
    /// resolvable parent DC is the root.
    pub fn is_root_dc(&self, node: &Node) -> bool {
        if node.kind != NodeKind::DomainController {
            return false;
        }
        match node.data.is_sub {
            Some(is_sub) => !is_sub,
            None => self.parent_of(node).is_none(),
        }
    }

    /// The deployment's root domain controller: the first root DC in
    /// declared order.
    pub fn root_dc(&self) -> Option<&'a Node> {
        self.nodes().find(|node| self.is_root_dc(node))
    }

    /// Resolve a node's logical parent domain controller, without the
    /// root fallback.
    ///
    /// Resolution order, applied uniformly for every caller:
    /// 1. edge-neighbor DCs: for a DC child, a neighbor whose domain
    ///    equals `parent_domain(child)` wins, then any neighbor whose
    ///    domain is a proper suffix of the child's; for other kinds the
    ///    first DC neighbor wins;
    /// 2. the domain-suffix heuristic over all DCs in declared order.
    ///
    /// Callers that require a parent fall back to [`Self::root_dc`].
    pub fn parent_of(&self, node: &Node) -> Option<&'a Node> {
        match node.kind {
            NodeKind::DomainController => self.parent_of_dc(node),
            NodeKind::Workstation | NodeKind::Standalone | NodeKind::CertificateAuthority => {
                self.parent_of_member(node)
            }
            NodeKind::Jumpbox => None,
        }
    }

    fn parent_of_dc(&self, node: &Node) -> Option<&'a Node> {
        let domain = node.data.domain_name.as_deref();
        let parent = domain.and_then(parent_domain);

        let dc_neighbors: Vec<&'a Node> = self
            .neighbors(&node.id)
            .filter(|n| n.kind == NodeKind::DomainController && n.id != node.id)
            .collect();

        // Exact hierarchy match via an edge
        if let Some(parent) = parent {
            if let Some(found) = dc_neighbors
                .iter()
                .copied()
                .find(|n| n.data.domain_name.as_deref() == Some(parent))
            {
                return Some(found);
            }
        }

        // Any edge neighbor higher up the same domain tree. The suffix
        // guard stops a mid-tier DC from picking its own child.
        if let Some(domain) = domain {
            if let Some(found) = dc_neighbors.iter().copied().find(|n| {
                n.data
                    .domain_name
                    .as_deref()
                    .map(|d| domain.ends_with(&format!(".{}", d)))
                    .unwrap_or(false)
            }) {
                return Some(found);
            }
        }

        // Domain-suffix heuristic over all DCs
        if let Some(parent) = parent {
            return self.nodes().find(|n| {
                n.kind == NodeKind::DomainController
                    && n.id != node.id
                    && n.data.domain_name.as_deref() == Some(parent)
            });
        }

        None
    }

    fn parent_of_member(&self, node: &Node) -> Option<&'a Node> {
        // First DC reachable over an edge
        if let Some(found) = self
            .neighbors(&node.id)
            .find(|n| n.kind == NodeKind::DomainController)
        {
            return Some(found);
        }

        // A member's own domainName names the domain it joins
        if let Some(domain) = node.data.domain_name.as_deref() {
            return self.nodes().find(|n| {
                n.kind == NodeKind::DomainController
                    && n.data.domain_name.as_deref() == Some(domain)
            });
        }

        None
    }

    /// The first jump box in the topology, if any.
    pub fn jumpbox(&self) -> Option<&'a Node> {
        self.nodes().find(|n| n.kind == NodeKind::Jumpbox)
    }

    /// Private IP of the node the jump box connects to, resolved from
    /// the first edge touching the jump box.
    pub fn jumpbox_connected_ip(&self) -> Option<&'a str> {
        let jumpbox = self.jumpbox()?;
        self.neighbors(&jumpbox.id)
            .next()
            .map(|n| n.data.private_ip.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::types::NodeData;

    fn dc(id: &str, ip: &str, domain: &str) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::DomainController,
            data: NodeData {
                private_ip: ip.to_string(),
                domain_name: Some(domain.to_string()),
                domain_controller_name: Some(id.to_uppercase()),
                ..Default::default()
            },
            status: None,
        }
    }

    fn workstation(id: &str, ip: &str) -> Node {
        Node {
            id: id.to_string(),
            kind: NodeKind::Workstation,
            data: NodeData {
                private_ip: ip.to_string(),
                workstation_name: Some(id.to_uppercase()),
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

    #[test]
    fn test_parent_domain() {
        assert_eq!(parent_domain("b.a.com"), Some("a.com"));
        assert_eq!(parent_domain("a.com"), Some("com"));
        assert_eq!(parent_domain("com"), None);
        assert_eq!(parent_domain(""), None);
    }

    #[test]
    fn test_parent_via_edge() {
        let nodes = vec![
            dc("root", "10.10.0.5", "a.com"),
            dc("sub", "172.16.0.5", "b.a.com"),
        ];
        let edges = vec![edge("sub", "root")];
        let graph = NodeGraph::new(&nodes, &edges);

        let parent = graph.parent_of(graph.get("sub").unwrap()).unwrap();
        assert_eq!(parent.id, "root");
    }

    #[test]
    fn test_parent_via_suffix_without_edge() {
        let nodes = vec![
            dc("root", "10.10.0.5", "a.com"),
            dc("sub", "172.16.0.5", "b.a.com"),
        ];
        let graph = NodeGraph::new(&nodes, &[]);

        let parent = graph.parent_of(graph.get("sub").unwrap()).unwrap();
        assert_eq!(parent.id, "root");
    }

    #[test]
    fn test_mid_tier_dc_does_not_pick_its_own_child() {
        // mid has edges to both its parent and its child; the suffix
        // guard must select the parent
        let nodes = vec![
            dc("root", "10.10.0.5", "a.com"),
            dc("mid", "172.16.0.5", "b.a.com"),
            dc("leaf", "192.168.0.5", "c.b.a.com"),
        ];
        let edges = vec![edge("leaf", "mid"), edge("mid", "root")];
        let graph = NodeGraph::new(&nodes, &edges);

        let parent = graph.parent_of(graph.get("mid").unwrap()).unwrap();
        assert_eq!(parent.id, "root");
        let parent = graph.parent_of(graph.get("leaf").unwrap()).unwrap();
        assert_eq!(parent.id, "mid");
    }

    #[test]
    fn test_member_parent_via_edge_then_domain() {
        let mut ws = workstation("ws1", "172.16.0.6");
        ws.data.domain_name = Some("b.a.com".to_string());
        let nodes = vec![
            dc("root", "10.10.0.5", "a.com"),
            dc("sub", "172.16.0.5", "b.a.com"),
            ws,
        ];

        // With an edge, the edge wins
        let edges = vec![edge("ws1", "sub")];
        let graph = NodeGraph::new(&nodes, &edges);
        assert_eq!(graph.parent_of(graph.get("ws1").unwrap()).unwrap().id, "sub");

        // Without one, the workstation's domainName finds its DC
        let graph = NodeGraph::new(&nodes, &[]);
        assert_eq!(graph.parent_of(graph.get("ws1").unwrap()).unwrap().id, "sub");
    }

    #[test]
    fn test_root_dc_detection() {
        let nodes = vec![
            dc("sub", "172.16.0.5", "b.a.com"),
            dc("root", "10.10.0.5", "a.com"),
        ];
        let graph = NodeGraph::new(&nodes, &[]);

        assert!(!graph.is_root_dc(graph.get("sub").unwrap()));
        assert!(graph.is_root_dc(graph.get("root").unwrap()));
        assert_eq!(graph.root_dc().unwrap().id, "root");
    }

    #[test]
    fn test_explicit_is_sub_marker_wins() {
        let mut node = dc("dc1", "10.10.0.5", "a.com");
        node.data.is_sub = Some(true);
        let nodes = vec![node];
        let graph = NodeGraph::new(&nodes, &[]);

        // No parent exists, but the explicit marker says sub
        assert!(!graph.is_root_dc(graph.get("dc1").unwrap()));
        assert!(graph.root_dc().is_none());
    }

    #[test]
    fn test_jumpbox_connection() {
        let jumpbox = Node {
            id: "jb".to_string(),
            kind: NodeKind::Jumpbox,
            data: NodeData {
                private_ip: "10.10.0.100".to_string(),
                ..Default::default()
            },
            status: None,
        };
        let nodes = vec![dc("root", "10.10.0.5", "a.com"), jumpbox];
        let edges = vec![edge("jb", "root")];
        let graph = NodeGraph::new(&nodes, &edges);

        assert_eq!(graph.jumpbox().unwrap().id, "jb");
        assert_eq!(graph.jumpbox_connected_ip(), Some("10.10.0.5"));
    }
}
