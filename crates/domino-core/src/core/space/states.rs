use super::configuration::{Configuration, LoadedState};
use super::{DiscreteSpace, SpaceError};
use crate::core::models::ids::{StateIndex, VariableId};
use nalgebra::Point3;
use slotmap::SecondaryMap;
use std::collections::HashSet;
use std::sync::Arc;

/// An ordered list of candidate states, each a row of named attribute values.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTable {
    attributes: Arc<[String]>,
    rows: Vec<Vec<f64>>,
}

impl StateTable {
    /// Creates a table from attribute names and one value row per state.
    ///
    /// # Errors
    ///
    /// Returns [`SpaceError::RowWidth`] if a row does not match the attribute
    /// count, or [`SpaceError::DuplicateAttribute`] for repeated names.
    pub fn new(attributes: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, SpaceError> {
        let mut seen = HashSet::new();
        for attribute in &attributes {
            if !seen.insert(attribute.as_str()) {
                return Err(SpaceError::DuplicateAttribute(attribute.clone()));
            }
        }
        if let Some((row, values)) = rows
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != attributes.len())
        {
            return Err(SpaceError::RowWidth {
                row,
                expected: attributes.len(),
                found: values.len(),
            });
        }
        Ok(Self {
            attributes: Arc::from(attributes),
            rows,
        })
    }

    /// A table of `count` states that carry no attributes, only their index.
    pub fn labels(count: usize) -> Self {
        Self {
            attributes: Arc::from(Vec::<String>::new()),
            rows: vec![Vec::new(); count],
        }
    }

    pub fn from_points(points: &[Point3<f64>]) -> Self {
        Self {
            attributes: Arc::from(vec!["x".to_string(), "y".to_string(), "z".to_string()]),
            rows: points.iter().map(|p| vec![p.x, p.y, p.z]).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn row(&self, state: StateIndex) -> Option<&[f64]> {
        self.rows.get(state).map(Vec::as_slice)
    }

    pub fn value(&self, state: StateIndex, attribute: &str) -> Option<f64> {
        let column = self.attributes.iter().position(|a| a == attribute)?;
        self.rows.get(state).map(|row| row[column])
    }

    fn loaded(&self, state: StateIndex) -> Option<LoadedState> {
        self.rows
            .get(state)
            .map(|row| LoadedState::new(state, Arc::clone(&self.attributes), row.clone()))
    }
}

/// The standard [`DiscreteSpace`]: every variable points at a state table.
///
/// Tables are shared through `Arc`; variables pointing at the same table draw
/// from one pool, which is what permutation sampling and the disjoint-set
/// filters key on.
#[derive(Debug, Clone, Default)]
pub struct VariableStatesTable {
    tables: SecondaryMap<VariableId, Arc<StateTable>>,
}

impl VariableStatesTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_states(&mut self, variable: VariableId, table: Arc<StateTable>) {
        self.tables.insert(variable, table);
    }

    pub fn states_of(&self, variable: VariableId) -> Option<&Arc<StateTable>> {
        self.tables.get(variable)
    }

    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.tables.keys()
    }

    /// Groups variables that share one state table, in variable order.
    pub fn shared_pools(&self) -> Vec<Vec<VariableId>> {
        let mut pools: Vec<(Arc<StateTable>, Vec<VariableId>)> = Vec::new();
        for (variable, table) in self.tables.iter() {
            match pools.iter_mut().find(|(t, _)| Arc::ptr_eq(t, table)) {
                Some((_, members)) => members.push(variable),
                None => pools.push((Arc::clone(table), vec![variable])),
            }
        }
        pools.into_iter().map(|(_, members)| members).collect()
    }
}

impl DiscreteSpace for VariableStatesTable {
    fn size(&self, variable: VariableId) -> usize {
        self.tables.get(variable).map_or(0, |t| t.len())
    }

    fn load_state(
        &self,
        variable: VariableId,
        state: StateIndex,
        configuration: &mut Configuration,
    ) -> Result<(), SpaceError> {
        let table = self
            .tables
            .get(variable)
            .ok_or(SpaceError::UnknownVariable(variable))?;
        let loaded = table.loaded(state).ok_or(SpaceError::StateOutOfRange {
            variable,
            state,
            size: table.len(),
        })?;
        configuration.load(variable, loaded);
        Ok(())
    }

    fn state_value(&self, variable: VariableId, state: StateIndex, attribute: &str) -> Option<f64> {
        self.tables.get(variable)?.value(state, attribute)
    }
}
