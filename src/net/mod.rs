//! Virtual-network classification.
//!
//! This module maps private IP addresses onto the fixed set of virtual
//! networks a deployment can span, and defines the canonical peering
//! key used to track cross-VNet connectivity.

pub mod vnet;

pub use vnet::{classify, PeeringKey, VNetId, VnetTemplate};
