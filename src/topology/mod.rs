//! Topology input model.
//!
//! This module contains the external topology contract (nodes, edges,
//! credentials) and the node graph used to answer parent/child and
//! root-domain-controller queries during compilation.

pub mod graph;
pub mod types;

// Re-export key types for easier access
pub use graph::{parent_domain, NodeGraph};
pub use types::{Credentials, Edge, Node, NodeData, NodeKind, Topology, UpdateRequest};
