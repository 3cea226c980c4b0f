use super::{ScoringError, ScoringOracle};
use crate::core::models::ids::{StateIndex, VariableId};
use crate::core::space::configuration::Configuration;
use std::collections::HashMap;

#[inline]
pub fn harmonic(dist: f64, mean: f64, k: f64) -> f64 {
    let diff = dist - mean;
    0.5 * k * diff * diff
}

#[inline]
pub fn harmonic_upper_bound(dist: f64, mean: f64, k: f64) -> f64 {
    if dist <= mean {
        return 0.0;
    }
    harmonic(dist, mean, k)
}

/// Explicit potential table over the state indices of its variables.
///
/// Keys list one state per variable, in the order the variables are passed to
/// [`ScoringOracle::score`]. Missing keys fall back to the default score.
#[derive(Debug, Clone, Default)]
pub struct TableOracle {
    scores: HashMap<Vec<StateIndex>, f64>,
    default_score: f64,
}

impl TableOracle {
    pub fn new(default_score: f64) -> Self {
        Self {
            scores: HashMap::new(),
            default_score,
        }
    }

    pub fn with_score(mut self, states: &[StateIndex], score: f64) -> Self {
        self.scores.insert(states.to_vec(), score);
        self
    }

    pub fn insert(&mut self, states: &[StateIndex], score: f64) {
        self.scores.insert(states.to_vec(), score);
    }
}

impl ScoringOracle for TableOracle {
    fn score(&self, variables: &[VariableId], configuration: &Configuration) -> Result<f64, ScoringError> {
        let states = variables
            .iter()
            .map(|&v| configuration.state_of(v).ok_or(ScoringError::StateNotLoaded(v)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.scores.get(&states).copied().unwrap_or(self.default_score))
    }
}

/// Adapts a closure into an oracle.
pub struct FnOracle<F>(pub F);

impl<F> ScoringOracle for FnOracle<F>
where
    F: Fn(&[VariableId], &Configuration) -> Result<f64, ScoringError> + Send + Sync,
{
    fn score(&self, variables: &[VariableId], configuration: &Configuration) -> Result<f64, ScoringError> {
        (self.0)(variables, configuration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceForm {
    Harmonic,
    UpperBound,
}

/// Distance restraint between the loaded positions of two variables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceOracle {
    pub mean: f64,
    pub k: f64,
    pub form: DistanceForm,
}

impl DistanceOracle {
    pub fn harmonic(mean: f64, k: f64) -> Self {
        Self {
            mean,
            k,
            form: DistanceForm::Harmonic,
        }
    }

    pub fn upper_bound(mean: f64, k: f64) -> Self {
        Self {
            mean,
            k,
            form: DistanceForm::UpperBound,
        }
    }
}

impl ScoringOracle for DistanceOracle {
    fn score(&self, variables: &[VariableId], configuration: &Configuration) -> Result<f64, ScoringError> {
        let [a, b] = variables else {
            return Err(ScoringError::Arity {
                expected: 2,
                found: variables.len(),
            });
        };
        let position = |v: VariableId| {
            configuration.get(v).ok_or(ScoringError::StateNotLoaded(v))?;
            configuration
                .position(v)
                .ok_or_else(|| ScoringError::AttributeMissing {
                    variable: v,
                    attribute: "x/y/z".to_string(),
                })
        };
        let dist = nalgebra::distance(&position(*a)?, &position(*b)?);
        Ok(match self.form {
            DistanceForm::Harmonic => harmonic(dist, self.mean, self.k),
            DistanceForm::UpperBound => harmonic_upper_bound(dist, self.mean, self.k),
        })
    }
}
