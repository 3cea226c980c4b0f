//! # Core Models Module
//!
//! Value types describing an optimization problem independently of how it is solved.
//!
//! ## Key Components
//!
//! - [`ids`] - Stable identifiers for variables and the state index type
//! - [`variable`] - The registry owning every named variable
//! - [`subset`] - Sorted variable sets used for cliques, separators and restraint footprints
//! - [`assignment`] - Immutable joint state choices with packed hash keys
//!
//! ## Usage
//!
//! ```ignore
//! use domino::core::models::{assignment::Assignment, variable::VariableRegistry};
//!
//! let mut registry = VariableRegistry::new();
//! let a = registry.add_variable("A")?;
//! let b = registry.add_variable("B")?;
//!
//! let choice = Assignment::new(&[a, b], &[0, 1])?;
//! ```

pub mod assignment;
pub mod ids;
pub mod subset;
pub mod variable;
