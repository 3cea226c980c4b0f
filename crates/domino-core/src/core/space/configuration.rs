use crate::core::models::assignment::Assignment;
use crate::core::models::ids::{StateIndex, VariableId};
use crate::core::models::subset::Subset;
use nalgebra::Point3;
use slotmap::SecondaryMap;
use std::sync::Arc;

/// The materialized values of one variable's current state.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedState {
    pub state: StateIndex,
    attributes: Arc<[String]>,
    values: Vec<f64>,
}

impl LoadedState {
    pub fn new(state: StateIndex, attributes: Arc<[String]>, values: Vec<f64>) -> Self {
        Self {
            state,
            attributes,
            values,
        }
    }

    pub fn value(&self, attribute: &str) -> Option<f64> {
        self.attributes
            .iter()
            .position(|a| a == attribute)
            .and_then(|i| self.values.get(i).copied())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Scratch storage that a [`DiscreteSpace`] loads states into and a scoring
/// oracle reads from.
///
/// Each worker owns its own configuration, so concurrent scoring never shares
/// mutable state.
///
/// [`DiscreteSpace`]: super::DiscreteSpace
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    loaded: SecondaryMap<VariableId, LoadedState>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, variable: VariableId, state: LoadedState) {
        self.loaded.insert(variable, state);
    }

    pub fn get(&self, variable: VariableId) -> Option<&LoadedState> {
        self.loaded.get(variable)
    }

    pub fn state_of(&self, variable: VariableId) -> Option<StateIndex> {
        self.loaded.get(variable).map(|s| s.state)
    }

    pub fn value(&self, variable: VariableId, attribute: &str) -> Option<f64> {
        self.loaded.get(variable).and_then(|s| s.value(attribute))
    }

    /// Reads the `x`, `y`, `z` attributes of a loaded state as a point.
    pub fn position(&self, variable: VariableId) -> Option<Point3<f64>> {
        let state = self.loaded.get(variable)?;
        Some(Point3::new(
            state.value("x")?,
            state.value("y")?,
            state.value("z")?,
        ))
    }

    /// The states currently loaded for `subset`, if every member is loaded.
    pub fn current_assignment(&self, subset: &Subset) -> Option<Assignment> {
        let states = subset
            .iter()
            .map(|v| self.state_of(v))
            .collect::<Option<Vec<_>>>()?;
        Assignment::from_subset(subset, &states).ok()
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }

    pub fn clear(&mut self) {
        self.loaded.clear();
    }
}
