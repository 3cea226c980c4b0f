//! # Discrete Space Module
//!
//! The contract through which the inference engine enumerates candidate states
//! and materializes them for scoring.
//!
//! A [`DiscreteSpace`] reports how many states each variable has and writes a
//! chosen state into a caller-owned [`Configuration`]. The engine never touches
//! variable data directly: every scoring call sees only what was loaded.
//!
//! Concrete enumeration policies (Cartesian grids, shared permutation pools,
//! rigid-body transformations) live in [`strategies`] as plain functions that
//! produce [`states::StateTable`]s for a [`states::VariableStatesTable`].

pub mod configuration;
pub mod states;
pub mod strategies;

use crate::core::models::assignment::Assignment;
use crate::core::models::ids::{StateIndex, VariableId};
use configuration::Configuration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpaceError {
    #[error("Variable {0:?} has no discrete space")]
    UnknownVariable(VariableId),
    #[error("State {state} is out of range for variable {variable:?} ({size} states)")]
    StateOutOfRange {
        variable: VariableId,
        state: StateIndex,
        size: usize,
    },
    #[error("State row {row} has {found} values but {expected} attributes are declared")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Attribute '{0}' is declared more than once")]
    DuplicateAttribute(String),
}

/// Finite candidate states for every variable of a problem.
///
/// Implementations must be immutable once handed to a junction tree: the tree
/// caches enumerations derived from `size`.
pub trait DiscreteSpace: Send + Sync {
    /// Number of candidate states of `variable`; zero for unknown variables.
    fn size(&self, variable: VariableId) -> usize;

    /// Writes state `state` of `variable` into `configuration`.
    fn load_state(
        &self,
        variable: VariableId,
        state: StateIndex,
        configuration: &mut Configuration,
    ) -> Result<(), SpaceError>;

    /// Reads a named attribute of a state without loading it.
    fn state_value(&self, _variable: VariableId, _state: StateIndex, _attribute: &str) -> Option<f64> {
        None
    }

    fn load_assignment(
        &self,
        assignment: &Assignment,
        configuration: &mut Configuration,
    ) -> Result<(), SpaceError> {
        for &(variable, state) in assignment.entries() {
            self.load_state(variable, state, configuration)?;
        }
        Ok(())
    }
}
