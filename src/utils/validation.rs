//! Topology validation utilities.
//!
//! This module provides validation for compile requests: required
//! per-kind attributes, address and name formats, duplicates, and
//! structural rules. Validation is atomic: the first violation fails
//! the whole compile, so a caller can never deploy a partial plan.

use crate::compiler::CompileError;
use crate::topology::graph::NodeGraph;
use crate::topology::types::{Node, NodeKind, Topology};
use regex::Regex;
use std::collections::HashSet;

/// Check that a string is a well-formed dotted-quad IPv4 address.
pub fn is_valid_ip(ip: &str) -> bool {
    let pattern = Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$")
        .expect("Invalid ip address regex");
    match pattern.captures(ip) {
        Some(captures) => (1..=4).all(|i| {
            captures
                .get(i)
                .and_then(|m| m.as_str().parse::<u16>().ok())
                .map(|octet| octet <= 255)
                .unwrap_or(false)
        }),
        None => false,
    }
}

/// Check that a string is a plausible DNS domain name.
pub fn is_valid_domain(domain: &str) -> bool {
    let pattern = Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)*$")
        .expect("Invalid domain name regex");
    !domain.is_empty() && domain.len() <= 253 && pattern.is_match(domain)
}

fn missing(node: &Node, field: &'static str) -> CompileError {
    CompileError::Validation {
        node_id: node.id.clone(),
        field,
    }
}

/// Validate one node's kind-specific required attributes.
fn validate_node(node: &Node) -> Result<(), CompileError> {
    if node.data.private_ip.is_empty() || !is_valid_ip(&node.data.private_ip) {
        return Err(missing(node, "privateIPAddress"));
    }

    match node.kind {
        NodeKind::DomainController => {
            match node.data.domain_name.as_deref() {
                Some(domain) if !domain.is_empty() => {
                    if !is_valid_domain(domain) {
                        log::warn!("Node '{}' has unusual domain name '{}'", node.id, domain);
                    }
                }
                _ => return Err(missing(node, "domainName")),
            }
            if node
                .data
                .domain_controller_name
                .as_deref()
                .unwrap_or_default()
                .is_empty()
            {
                return Err(missing(node, "domainControllerName"));
            }
        }
        NodeKind::Workstation | NodeKind::Standalone => {
            if node
                .data
                .workstation_name
                .as_deref()
                .unwrap_or_default()
                .is_empty()
            {
                return Err(missing(node, "workstationName"));
            }
        }
        NodeKind::CertificateAuthority => {
            if node.data.ca_name.as_deref().unwrap_or_default().is_empty() {
                return Err(missing(node, "caName"));
            }
        }
        NodeKind::Jumpbox => {}
    }

    Ok(())
}

/// Validate a complete compile request.
///
/// Covers required fields for every node, credential presence,
/// duplicate ids/addresses/names, and the certificate-authority
/// placement rule. The jumpbox-or-public-IP entry-point rule is
/// advisory: a plan without an entry point compiles but is unusable as
/// a range, so it logs a warning.
pub fn validate_topology(topology: &Topology) -> Result<(), CompileError> {
    if topology.nodes.is_empty() {
        return Err(CompileError::Topology {
            reason: "no nodes provided in the topology".to_string(),
        });
    }

    let credentials_ok = topology
        .credentials
        .as_ref()
        .map(|c| !c.admin_username.is_empty() && !c.admin_password.is_empty())
        .unwrap_or(false);
    if !credentials_ok {
        return Err(CompileError::Topology {
            reason: "missing enterprise admin credentials".to_string(),
        });
    }

    let mut seen_ids = HashSet::new();
    let mut seen_ips = HashSet::new();
    let mut seen_names = HashSet::new();
    for node in &topology.nodes {
        validate_node(node)?;

        if !seen_ids.insert(node.id.as_str()) {
            return Err(CompileError::Topology {
                reason: format!("duplicate node id '{}'", node.id),
            });
        }
        if !seen_ips.insert(node.data.private_ip.as_str()) {
            return Err(CompileError::Topology {
                reason: format!(
                    "duplicate private IP address '{}' on node '{}'",
                    node.data.private_ip, node.id
                ),
            });
        }
        if let Some(name) = node.machine_name() {
            if node.kind != NodeKind::Jumpbox && !seen_names.insert(name.to_string()) {
                return Err(CompileError::Topology {
                    reason: format!("duplicate machine name '{}' on node '{}'", name, node.id),
                });
            }
        }
    }

    let graph = NodeGraph::new(&topology.nodes, &topology.edges);

    // A CA hangs off the forest root; certificate services against a
    // child domain are not supported by the templates
    for node in &topology.nodes {
        if node.kind == NodeKind::CertificateAuthority {
            if let Some(parent) = graph.parent_of(node) {
                if !graph.is_root_dc(parent) {
                    return Err(CompileError::Topology {
                        reason: format!(
                            "certificate authority '{}' must be connected to a root domain controller",
                            node.id
                        ),
                    });
                }
            }
        }
    }

    let jumpbox_count = topology
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Jumpbox)
        .count();
    if jumpbox_count > 1 {
        return Err(CompileError::Topology {
            reason: format!("topology has {} jumpboxes, at most one is supported", jumpbox_count),
        });
    }

    let has_entry_point = topology.nodes.iter().any(|n| n.kind == NodeKind::Jumpbox)
        || topology
            .nodes
            .iter()
            .any(|n| n.kind != NodeKind::Jumpbox && n.has_public_ip());
    if !has_entry_point {
        log::warn!(
            "Topology has neither a jumpbox nor a public-IP node; the deployed range will be unreachable"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::types::{Credentials, Edge, NodeData};

    fn credentials() -> Option<Credentials> {
        Some(Credentials {
            admin_username: "labadmin".to_string(),
            admin_password: "S3cureP@ss".to_string(),
        })
    }

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

    #[test]
    fn test_ip_format() {
        assert!(is_valid_ip("10.10.0.5"));
        assert!(is_valid_ip("255.255.255.255"));
        assert!(!is_valid_ip("10.10.0"));
        assert!(!is_valid_ip("10.10.0.256"));
        assert!(!is_valid_ip("not.an.ip.addr"));
        assert!(!is_valid_ip(""));
    }

    #[test]
    fn test_domain_format() {
        assert!(is_valid_domain("a.com"));
        assert!(is_valid_domain("b.a.com"));
        assert!(is_valid_domain("corp-01.local"));
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("-bad.com"));
        assert!(!is_valid_domain("a..com"));
    }

    #[test]
    fn test_dc_requires_domain_name() {
        let mut node = dc("dc1", "10.10.0.5", "a.com");
        node.data.domain_name = None;
        let topology = Topology {
            nodes: vec![node],
            edges: Vec::new(),
            credentials: credentials(),
        };

        let result = validate_topology(&topology);
        assert!(matches!(
            result,
            Err(CompileError::Validation { field: "domainName", .. })
        ));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let topology = Topology {
            nodes: vec![dc("dc1", "10.10.0.5", "a.com")],
            edges: Vec::new(),
            credentials: None,
        };

        let result = validate_topology(&topology);
        assert!(matches!(result, Err(CompileError::Topology { .. })));
    }

    #[test]
    fn test_duplicate_ip_rejected() {
        let topology = Topology {
            nodes: vec![
                dc("dc1", "10.10.0.5", "a.com"),
                dc("dc2", "10.10.0.5", "b.a.com"),
            ],
            edges: Vec::new(),
            credentials: credentials(),
        };

        let result = validate_topology(&topology);
        match result {
            Err(CompileError::Topology { reason }) => {
                assert!(reason.contains("duplicate private IP"));
            }
            other => panic!("expected Topology error, got {:?}", other),
        }
    }

    #[test]
    fn test_ca_must_attach_to_root_dc() {
        let ca = Node {
            id: "ca1".to_string(),
            kind: NodeKind::CertificateAuthority,
            data: NodeData {
                private_ip: "10.10.0.9".to_string(),
                ca_name: Some("CA01".to_string()),
                ..Default::default()
            },
            status: None,
        };
        let mut sub = dc("sub", "172.16.0.5", "b.a.com");
        sub.data.is_sub = Some(true);

        let topology = Topology {
            nodes: vec![dc("root", "10.10.0.5", "a.com"), sub, ca],
            edges: vec![Edge {
                source: "ca1".to_string(),
                target: "sub".to_string(),
            }],
            credentials: credentials(),
        };

        let result = validate_topology(&topology);
        match result {
            Err(CompileError::Topology { reason }) => {
                assert!(reason.contains("root domain controller"));
            }
            other => panic!("expected Topology error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_topology_passes() {
        let topology = Topology {
            nodes: vec![
                dc("root", "10.10.0.5", "a.com"),
                dc("sub", "172.16.0.5", "b.a.com"),
            ],
            edges: vec![Edge {
                source: "sub".to_string(),
                target: "root".to_string(),
            }],
            credentials: credentials(),
        };
        assert!(validate_topology(&topology).is_ok());
    }
}
