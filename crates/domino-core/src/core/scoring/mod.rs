//! # Scoring Module
//!
//! The scoring side of the problem: oracles that turn the currently loaded
//! states of a few variables into a scalar score, and restraints that bind an
//! oracle to the variables it reads.
//!
//! Oracles are pure functions of a [`Configuration`]. The engine loads the
//! states it wants evaluated and then asks for a score; it never expects an
//! oracle to mutate anything.

pub mod oracles;

use crate::core::models::ids::VariableId;
use crate::core::models::subset::Subset;
use crate::core::space::configuration::Configuration;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("No state is loaded for variable {0:?}")]
    StateNotLoaded(VariableId),
    #[error("Attribute '{attribute}' is missing on the loaded state of variable {variable:?}")]
    AttributeMissing {
        variable: VariableId,
        attribute: String,
    },
    #[error("Oracle expected {expected} variables but received {found}")]
    Arity { expected: usize, found: usize },
    #[error("Scoring failed: {0}")]
    Evaluation(String),
}

/// Scores a small group of variables in their currently loaded states.
pub trait ScoringOracle: Send + Sync {
    fn score(&self, variables: &[VariableId], configuration: &Configuration) -> Result<f64, ScoringError>;
}

/// An oracle bound to the variables it reads.
#[derive(Clone)]
pub struct Restraint {
    name: String,
    variables: Subset,
    oracle: Arc<dyn ScoringOracle>,
    maximum_score: Option<f64>,
}

impl Restraint {
    pub fn new(name: &str, variables: Subset, oracle: Arc<dyn ScoringOracle>) -> Self {
        Self {
            name: name.to_string(),
            variables,
            oracle,
            maximum_score: None,
        }
    }

    /// Sub-assignments scoring above `maximum` are pruned by score filters.
    pub fn with_maximum_score(mut self, maximum: f64) -> Self {
        self.maximum_score = Some(maximum);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &Subset {
        &self.variables
    }

    pub fn maximum_score(&self) -> Option<f64> {
        self.maximum_score
    }

    pub fn evaluate(&self, configuration: &Configuration) -> Result<f64, ScoringError> {
        self.oracle.score(self.variables.as_slice(), configuration)
    }
}

impl fmt::Debug for Restraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Restraint")
            .field("name", &self.name)
            .field("variables", &self.variables)
            .field("maximum_score", &self.maximum_score)
            .finish_non_exhaustive()
    }
}
