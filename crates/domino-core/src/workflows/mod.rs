//! # Workflows Module
//!
//! High-level entry points that run a complete optimization, from the
//! variables and restraints of a problem to its ranked optimal assignments.
//!
//! - **Optimization Workflow** ([`optimize`]) - Builds the junction tree from
//!   the restraints' interaction graph, enumerates, scores and infers.

pub mod optimize;
