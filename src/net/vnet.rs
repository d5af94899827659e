//! Virtual-network identifiers and the fixed prefix table.
//!
//! Deployments place every machine into one of three address-space
//! buckets, each backed by its own virtual network. Classification is
//! table-driven on the IP prefix; addresses outside the table belong to
//! no VNet and never participate in peering.

use serde::Serialize;
use std::fmt;

/// One of the fixed virtual networks a deployment can span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum VNetId {
    /// The 10.10.0.0/16 network
    V10,
    /// The 172.16.0.0/16 network
    V172,
    /// The 192.168.0.0/16 network
    V192,
}

/// Static configuration for one virtual network: resource name, module
/// name, and address prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VnetTemplate {
    pub vnet_name: &'static str,
    pub module_name: &'static str,
    pub address_prefix: &'static str,
    pub subnet_prefix: &'static str,
}

impl VNetId {
    /// All VNets in canonical order.
    pub const ALL: [VNetId; 3] = [VNetId::V10, VNetId::V172, VNetId::V192];

    /// The fixed template parameters for this VNet.
    pub fn template(self) -> VnetTemplate {
        match self {
            VNetId::V10 => VnetTemplate {
                vnet_name: "vnet-10",
                module_name: "vnet10",
                address_prefix: "10.10.0.0/16",
                subnet_prefix: "10.10.0.0/24",
            },
            VNetId::V172 => VnetTemplate {
                vnet_name: "vnet-172",
                module_name: "vnet172",
                address_prefix: "172.16.0.0/16",
                subnet_prefix: "172.16.0.0/24",
            },
            VNetId::V192 => VnetTemplate {
                vnet_name: "vnet-192",
                module_name: "vnet192",
                address_prefix: "192.168.0.0/16",
                subnet_prefix: "192.168.0.0/24",
            },
        }
    }
}

impl fmt::Display for VNetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template().vnet_name)
    }
}

/// Classify an IP address into its virtual network.
///
/// Pure and table-driven: `10.10.*` maps to [`VNetId::V10`], `172.16.*`
/// to [`VNetId::V172`], `192.168.*` to [`VNetId::V192`]. Any other
/// prefix returns `None`; such addresses take part in no peering.
///
/// # Examples
/// ```
/// use rangeforge::net::{classify, VNetId};
///
/// assert_eq!(classify("10.10.0.5"), Some(VNetId::V10));
/// assert_eq!(classify("172.16.4.20"), Some(VNetId::V172));
/// assert_eq!(classify("203.0.113.7"), None);
/// ```
pub fn classify(ip: &str) -> Option<VNetId> {
    if ip.starts_with("10.10.") {
        Some(VNetId::V10)
    } else if ip.starts_with("172.16.") {
        Some(VNetId::V172)
    } else if ip.starts_with("192.168.") {
        Some(VNetId::V192)
    } else {
        None
    }
}

/// Canonical unordered pair of two distinct VNets that must be peered.
///
/// Stored sorted so that `(a, b)` and `(b, a)` compare equal, which is
/// what lets a single map entry track each required peering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeeringKey(VNetId, VNetId);

impl PeeringKey {
    /// Build the canonical key for a pair of VNets, or `None` when both
    /// sides sit in the same VNet and no peering is needed.
    pub fn between(a: VNetId, b: VNetId) -> Option<PeeringKey> {
        if a == b {
            None
        } else if a < b {
            Some(PeeringKey(a, b))
        } else {
            Some(PeeringKey(b, a))
        }
    }

    pub fn first(&self) -> VNetId {
        self.0
    }

    pub fn second(&self) -> VNetId {
        self.1
    }
}

impl fmt::Display for PeeringKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.0, self.1)
    }
}
