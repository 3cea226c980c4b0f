use super::config::ConfigError;
use crate::core::graph::GraphError;
use crate::core::models::assignment::AssignmentError;
use crate::core::models::ids::{StateIndex, VariableId};
use crate::core::scoring::ScoringError;
use crate::core::space::SpaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Malformed assignment: {0}")]
    Shape(AssignmentError),

    #[error("Conflicting states for variable {variable:?}: {existing} vs {incoming}")]
    Conflict {
        variable: VariableId,
        existing: StateIndex,
        incoming: StateIndex,
    },

    #[error("Lookup of {key} failed in {location}")]
    Lookup { location: String, key: String },

    #[error("No feasible assignment in node {node}: {reason}")]
    Infeasible { node: usize, reason: String },

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error(
        "Interaction graph is disconnected ({components} components); no single junction tree exists"
    )]
    DisconnectedGraph { components: usize },

    #[error("Invalid junction tree topology: {0}")]
    InvalidTopology(String),

    #[error("Restraint '{restraint}' is not contained in any node of the junction tree")]
    UncoveredRestraint { restraint: String },

    #[error("Junction tree construction failed: {source}")]
    Graph { source: GraphError },

    #[error("Restraint scoring failed: {source}")]
    Scoring {
        #[from]
        source: ScoringError,
    },

    #[error("Discrete space error: {source}")]
    Space {
        #[from]
        source: SpaceError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl From<AssignmentError> for EngineError {
    fn from(error: AssignmentError) -> Self {
        match error {
            AssignmentError::Conflict {
                variable,
                existing,
                incoming,
            } => EngineError::Conflict {
                variable,
                existing,
                incoming,
            },
            other => EngineError::Shape(other),
        }
    }
}

impl From<GraphError> for EngineError {
    fn from(error: GraphError) -> Self {
        match error {
            GraphError::Disconnected { components } => EngineError::DisconnectedGraph { components },
            other => EngineError::Graph { source: other },
        }
    }
}
