use crate::core::models::ids::VariableId;
use crate::core::scoring::Restraint;
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Undirected graph over variables; an edge means two variables are scored together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionGraph {
    adjacency: BTreeMap<VariableId, BTreeSet<VariableId>>,
}

impl InteractionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph of `variables`, linking every pair that shares a restraint.
    ///
    /// Variables without restraints stay in the graph as isolated vertices.
    pub fn from_restraints(
        variables: impl IntoIterator<Item = VariableId>,
        restraints: &[Restraint],
    ) -> Self {
        let mut graph = Self::new();
        for v in variables {
            graph.add_variable(v);
        }
        for restraint in restraints {
            for v in restraint.variables().iter() {
                graph.add_variable(v);
            }
            for (a, b) in restraint.variables().iter().tuple_combinations() {
                graph.add_edge(a, b);
            }
        }
        graph
    }

    pub fn add_variable(&mut self, variable: VariableId) {
        self.adjacency.entry(variable).or_default();
    }

    /// Links two variables; self loops are ignored.
    pub fn add_edge(&mut self, a: VariableId, b: VariableId) {
        if a == b {
            self.add_variable(a);
            return;
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    pub fn has_edge(&self, a: VariableId, b: VariableId) -> bool {
        self.adjacency.get(&a).is_some_and(|n| n.contains(&b))
    }

    pub fn neighbors(&self, variable: VariableId) -> impl Iterator<Item = VariableId> + '_ {
        self.adjacency
            .get(&variable)
            .into_iter()
            .flat_map(|n| n.iter().copied())
    }

    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn variable_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub(crate) fn adjacency(&self) -> &BTreeMap<VariableId, BTreeSet<VariableId>> {
        &self.adjacency
    }

    /// Connected components, each sorted, ordered by their smallest variable.
    pub fn connected_components(&self) -> Vec<Vec<VariableId>> {
        let mut seen = BTreeSet::new();
        let mut components = Vec::new();
        for &start in self.adjacency.keys() {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(v) = queue.pop_front() {
                for n in self.neighbors(v) {
                    if seen.insert(n) {
                        component.push(n);
                        queue.push_back(n);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }
}
