//! # DOMINO Core Library
//!
//! Exact discrete optimization over restraint networks by min-sum message
//! passing on a junction tree.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture so that data, machinery and
//! entry points stay separate and testable on their own.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`VariableRegistry`,
//!   `Subset`, `Assignment`), the `DiscreteSpace` and `ScoringOracle`
//!   contracts the engine is parameterized by, and the construction of
//!   junction tree topologies from interaction graphs.
//!
//! - **[`engine`]: The Logic Core.** The stateful layer. It enumerates clique
//!   assignments under filters and quotas, folds restraints into clique
//!   potentials, and runs collect/distribute evidence followed by the
//!   reconstruction of optimal assignments on the `JunctionTree`.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures tying `core` and
//!   `engine` together: from a set of variables, a space and restraints to a
//!   ranked list of optimal assignments.

pub mod core;
pub mod engine;
pub mod workflows;
