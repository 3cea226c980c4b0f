use super::ids::VariableId;
use slotmap::SlotMap;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A variable named '{0}' is already registered")]
    DuplicateName(String),
}

/// A discrete unknown whose state is chosen by the optimizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
}

/// Owns every variable taking part in an optimization problem.
///
/// Identifiers handed out by the registry are stable arena indices; they never
/// change once assigned, which lets assignments hash and compare by value.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    variables: SlotMap<VariableId, Variable>,
    name_map: HashMap<String, VariableId>,
    order: Vec<VariableId>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new variable under a unique name.
    ///
    /// # Arguments
    ///
    /// * `name` - Human-readable name, used by description files and diagnostics.
    ///
    /// # Return
    ///
    /// The identifier of the new variable, or an error if the name is taken.
    pub fn add_variable(&mut self, name: &str) -> Result<VariableId, RegistryError> {
        if self.name_map.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        let id = self.variables.insert(Variable {
            name: name.to_string(),
        });
        self.name_map.insert(name.to_string(), id);
        self.order.push(id);
        Ok(id)
    }

    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id)
    }

    pub fn name_of(&self, id: VariableId) -> Option<&str> {
        self.variables.get(id).map(|v| v.name.as_str())
    }

    pub fn find_by_name(&self, name: &str) -> Option<VariableId> {
        self.name_map.get(name).copied()
    }

    /// Iterates variables in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.order.iter().map(|&id| (id, &self.variables[id]))
    }

    pub fn ids(&self) -> &[VariableId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_variable_assigns_distinct_ids_and_resolves_names() {
        let mut registry = VariableRegistry::new();
        let a = registry.add_variable("A").unwrap();
        let b = registry.add_variable("B").unwrap();

        assert_ne!(a, b);
        assert_eq!(registry.find_by_name("B"), Some(b));
        assert_eq!(registry.name_of(a), Some("A"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn add_variable_rejects_duplicate_names() {
        let mut registry = VariableRegistry::new();
        registry.add_variable("A").unwrap();

        let result = registry.add_variable("A");

        assert_eq!(result, Err(RegistryError::DuplicateName("A".to_string())));
    }

    #[test]
    fn iter_preserves_registration_order() {
        let mut registry = VariableRegistry::new();
        for name in ["x", "y", "z"] {
            registry.add_variable(name).unwrap();
        }

        let names: Vec<&str> = registry.iter().map(|(_, v)| v.name.as_str()).collect();

        assert_eq!(names, vec!["x", "y", "z"]);
    }
}
