//! Topology type definitions.
//!
//! This file defines the external topology contract: the node/edge JSON
//! shape submitted by the range designer frontend and stored in
//! deployment records. Field names are a compatibility contract and
//! must not change.

use serde::{Deserialize, Serialize};

/// Kind of machine a topology node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Active Directory domain controller (root or sub, see `isSub`)
    #[serde(rename = "domainController")]
    DomainController,
    /// AD certificate services host, attached to a root DC
    #[serde(rename = "certificateAuthority")]
    CertificateAuthority,
    /// Domain-joined workstation
    #[serde(rename = "workstation")]
    Workstation,
    /// Attacker entry point (Kali)
    #[serde(rename = "jumpbox")]
    Jumpbox,
    /// Domain-joined standalone server
    #[serde(rename = "standalone")]
    Standalone,
}

impl NodeKind {
    /// True for node kinds that join a domain and therefore resolve a
    /// parent domain controller.
    pub fn joins_domain(self) -> bool {
        matches!(
            self,
            NodeKind::DomainController
                | NodeKind::CertificateAuthority
                | NodeKind::Workstation
                | NodeKind::Standalone
        )
    }
}

/// Per-node attributes, nested under `data` in the wire format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeData {
    /// Private IP address inside the deployment's address space
    #[serde(rename = "privateIPAddress", default)]
    pub private_ip: String,
    /// DNS domain name (domain controllers, CAs, workstations)
    #[serde(rename = "domainName", skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    /// Machine name for domain controllers
    #[serde(rename = "domainControllerName", skip_serializing_if = "Option::is_none")]
    pub domain_controller_name: Option<String>,
    /// Machine name for workstations and standalone servers
    #[serde(rename = "workstationName", skip_serializing_if = "Option::is_none")]
    pub workstation_name: Option<String>,
    /// Machine name for certificate authorities
    #[serde(rename = "caName", skip_serializing_if = "Option::is_none")]
    pub ca_name: Option<String>,
    /// Explicit root/sub marker for domain controllers
    #[serde(rename = "isSub", skip_serializing_if = "Option::is_none")]
    pub is_sub: Option<bool>,
    /// Whether the machine gets a public IP address
    #[serde(rename = "hasPublicIP", skip_serializing_if = "Option::is_none")]
    pub has_public_ip: Option<bool>,
    /// Whether the machine was provisioned in a prior compile pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
}

/// One node of the user-authored topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub data: NodeData,
    /// Deployment status stamped onto nodes of a running deployment;
    /// `"deployed"` marks the node locked just like `data.locked`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Node {
    /// Whether this node represents already-provisioned infrastructure.
    ///
    /// Locked nodes are immutable input: they seed the peering plan but
    /// never produce modules or dependencies of their own.
    pub fn is_locked(&self) -> bool {
        self.data.locked.unwrap_or(false) || self.status.as_deref() == Some("deployed")
    }

    pub fn has_public_ip(&self) -> bool {
        self.data.has_public_ip.unwrap_or(false)
    }

    /// The machine name carried in the kind-specific data field.
    pub fn machine_name(&self) -> Option<&str> {
        match self.kind {
            NodeKind::DomainController => self.data.domain_controller_name.as_deref(),
            NodeKind::Workstation | NodeKind::Standalone => self.data.workstation_name.as_deref(),
            NodeKind::CertificateAuthority => self.data.ca_name.as_deref(),
            NodeKind::Jumpbox => Some("Jumpbox"),
        }
    }

    /// NetBIOS name derived from the leftmost DNS label of the domain.
    pub fn netbios(&self) -> Option<&str> {
        self.data
            .domain_name
            .as_deref()
            .and_then(|d| d.split('.').next())
    }
}

/// Undirected connection between two nodes: domain-hierarchy parentage
/// or network adjacency (jumpbox to target, CA to DC).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    /// The opposite endpoint of this edge, if `id` is one of them.
    pub fn other(&self, id: &str) -> Option<&str> {
        if self.source == id {
            Some(&self.target)
        } else if self.target == id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Enterprise admin credentials supplied at the topology top level.
///
/// The password is consumed by the deployment engine only; the compiler
/// never writes it into any emitted artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "enterpriseAdminUsername")]
    pub admin_username: String,
    #[serde(rename = "enterpriseAdminPassword")]
    pub admin_password: String,
}

/// A complete topology: the full-build request body, and the merged
/// form the update profile is normalized into.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl Topology {
    /// Nodes already provisioned in a prior pass.
    pub fn locked_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_locked())
    }

    /// Nodes to be provisioned by this compile pass.
    pub fn new_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| !n.is_locked())
    }
}

/// Request body of the incremental-update profile: new nodes and edges
/// to graft onto a running deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(rename = "deploymentID")]
    pub deployment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(rename = "newNodes", default)]
    pub new_nodes: Vec<Node>,
    #[serde(rename = "newEdges", default)]
    pub new_edges: Vec<Edge>,
    #[serde(rename = "existingNodes", default)]
    pub existing_nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl UpdateRequest {
    /// Normalize into a [`Topology`]: existing nodes are forced locked
    /// regardless of their own flags, then concatenated with the new
    /// nodes so both call profiles run the identical pipeline.
    pub fn into_topology(self) -> Topology {
        let mut nodes = self.existing_nodes;
        for node in &mut nodes {
            node.data.locked = Some(true);
        }
        nodes.extend(self.new_nodes);
        Topology {
            nodes,
            edges: self.new_edges,
            credentials: self.credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_wire_format() {
        let json = r#"{
            "id": "n1",
            "type": "domainController",
            "data": {
                "privateIPAddress": "10.10.0.5",
                "domainName": "corp.local",
                "domainControllerName": "DC01",
                "hasPublicIP": true
            }
        }"#;

        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.id, "n1");
        assert_eq!(node.kind, NodeKind::DomainController);
        assert_eq!(node.data.private_ip, "10.10.0.5");
        assert_eq!(node.data.domain_name.as_deref(), Some("corp.local"));
        assert!(node.has_public_ip());
        assert!(!node.is_locked());
        assert_eq!(node.machine_name(), Some("DC01"));
        assert_eq!(node.netbios(), Some("corp"));
    }

    #[test]
    fn test_locked_markers() {
        let mut node: Node = serde_json::from_str(
            r#"{"id": "n1", "type": "workstation", "data": {"privateIPAddress": "10.10.0.9", "locked": true}}"#,
        )
        .unwrap();
        assert!(node.is_locked());

        node.data.locked = None;
        assert!(!node.is_locked());

        node.status = Some("deployed".to_string());
        assert!(node.is_locked());
    }

    #[test]
    fn test_edge_other_endpoint() {
        let edge = Edge {
            source: "a".to_string(),
            target: "b".to_string(),
        };
        assert_eq!(edge.other("a"), Some("b"));
        assert_eq!(edge.other("b"), Some("a"));
        assert_eq!(edge.other("c"), None);
    }

    #[test]
    fn test_update_request_normalization() {
        let json = r#"{
            "deploymentID": "BuildLab-AB12C",
            "scenario": "Build-AB12C",
            "newNodes": [
                {"id": "ws2", "type": "workstation", "data": {"privateIPAddress": "172.16.0.7", "workstationName": "WS02"}}
            ],
            "newEdges": [{"source": "ws2", "target": "dc1"}],
            "existingNodes": [
                {"id": "dc1", "type": "domainController", "data": {"privateIPAddress": "10.10.0.5", "domainName": "a.com", "domainControllerName": "DC01"}}
            ]
        }"#;

        let request: UpdateRequest = serde_json::from_str(json).unwrap();
        let topology = request.into_topology();

        assert_eq!(topology.nodes.len(), 2);
        assert!(topology.nodes[0].is_locked());
        assert!(!topology.nodes[1].is_locked());
        assert_eq!(topology.locked_nodes().count(), 1);
        assert_eq!(topology.new_nodes().count(), 1);
    }
}
