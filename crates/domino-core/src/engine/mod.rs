//! # Engine Module
//!
//! The stateful inference machinery: enumeration of clique assignments,
//! restraint potentials and min-sum message passing over a junction tree.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Enumeration quotas, solution count and root choice
//! - **Enumeration** ([`enumeration`]) - Assignment tables and the subset filters that prune them
//! - **Junction Tree** ([`tree`]) - Clique nodes, separator edges and the inference state machine
//! - **State Tracking** ([`state`]) - Tree lifecycle and scored assignments
//! - **Progress Monitoring** ([`progress`]) - Progress events for callers
//! - **Error Handling** ([`error`]) - The engine error taxonomy
//!
//! ## Key Capabilities
//!
//! - **Exact inference** whose cost is linear in the number of cliques
//! - **Memoized scoring** so a restraint is evaluated once per distinct projection
//! - **Parallel enumeration and scoring** behind the `parallel` feature
//! - **Deterministic results** including tie handling and quota truncation

pub(crate) mod cache;
pub mod config;
pub mod enumeration;
pub mod error;
pub mod progress;
pub mod state;
pub mod tree;
