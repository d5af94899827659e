//! # Rangeforge - Topology compiler for AD attack-range deployments
//!
//! This library compiles a user-authored network topology (domain
//! controllers, certificate authorities, workstations, jump boxes, and
//! their connectivity) into a dependency-ordered set of declarative
//! infrastructure module descriptors, ready for an external template
//! compiler and cloud deployment engine.
//!
//! ## Overview
//!
//! A topology is a graph of nodes and edges. Each machine lands in one
//! of three fixed virtual networks derived from its private IP; when a
//! child sits in a different VNet than its parent, the two VNets must
//! be peered before domain traffic can flow. The compiler works out
//! which peerings are needed, which already exist on a running
//! deployment, which single module creates each missing one, and what
//! every module therefore has to wait on - for both a from-scratch
//! build and an incremental "add nodes to a running range" update.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `topology`: the external node/edge contract and the node graph
//! - `net`: virtual-network classification and peering keys
//! - `compiler`: the planner, resolver, and emitter pipeline
//! - `config`: deployment settings and YAML loading
//! - `deployment`: deployment identifiers and manifest records
//! - `orchestrator`: file I/O around the pure compiler
//! - `utils`: validation, duration parsing, id generation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rangeforge::{compiler, config::Settings};
//! use rangeforge::topology::types::Topology;
//!
//! let topology: Topology = serde_json::from_str(r#"{"nodes": [], "edges": []}"#)?;
//! let plan = compiler::compile(&topology, &Settings::default(), "203.0.113.7")?;
//! for module in &plan.modules {
//!     println!("{} depends on {:?}", module.module_name, module.depends_on);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! The compiler returns typed [`compiler::CompileError`] values and
//! fails atomically - no partial module list is ever produced. The
//! binary surfaces them through `color_eyre` with context.

pub mod compiler;
pub mod config;
pub mod deployment;
pub mod net;
pub mod orchestrator;
pub mod topology;
pub mod utils;
