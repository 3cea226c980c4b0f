//! # Core Module
//!
//! The stateless foundation of DOMINO: how an optimization problem is described
//! before any inference runs.
//!
//! ## Overview
//!
//! A problem consists of variables with finite candidate states and restraints
//! that score small groups of those variables. The core module holds these
//! descriptions together with the structural analysis that turns them into a
//! junction tree layout.
//!
//! ## Architecture
//!
//! - **Problem Data** ([`models`]) - Variables, subsets and assignments
//! - **State Spaces** ([`space`]) - Per-variable candidate states and sampling strategies
//! - **Scoring** ([`scoring`]) - Oracle contract, restraints and bundled oracles
//! - **Structure** ([`graph`]) - Interaction graphs and junction tree construction
//!
//! ## Key Capabilities
//!
//! - **Value-semantics assignments** with packed hash keys and conflict-checked merges
//! - **Pluggable state spaces** through a single [`space::DiscreteSpace`] contract
//! - **Deterministic tree decomposition** by triangulation and maximum spanning trees

pub mod graph;
pub mod models;
pub mod scoring;
pub mod space;
