use super::cartesian::CartesianIter;
use super::filters::{SubsetFilter, SubsetFilterTable};
use crate::core::models::assignment::Assignment;
use crate::core::models::ids::StateIndex;
use crate::core::models::subset::Subset;
use crate::core::space::DiscreteSpace;
use crate::engine::error::EngineError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Source of the candidate assignments a clique enumerates.
pub trait AssignmentsTable: Send + Sync {
    fn load_assignments(&self, subset: &Subset) -> Result<Vec<Assignment>, EngineError>;
}

fn prepare_filters(
    tables: &[Arc<dyn SubsetFilterTable>],
    subset: &Subset,
    excluded: &[Subset],
) -> Vec<Box<dyn SubsetFilter>> {
    let mut filters: Vec<(f64, Box<dyn SubsetFilter>)> = tables
        .iter()
        .filter_map(|t| {
            t.subset_filter(subset, excluded)
                .map(|f| (t.strength(subset, excluded), f))
        })
        .collect();
    // Strongest first so rejections short-circuit early.
    filters.sort_by(|a, b| b.0.total_cmp(&a.0));
    filters.into_iter().map(|(_, f)| f).collect()
}

fn passes(filters: &[Box<dyn SubsetFilter>], states: &[StateIndex]) -> Result<bool, EngineError> {
    for filter in filters {
        if !filter.is_ok(states)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn report_quota(subset: &Subset, max_assignments: usize) {
    warn!(
        subset = %subset,
        max_assignments,
        "Filled up quota on subset; remaining assignments were dropped."
    );
}

/// Streams the full Cartesian product of a subset and keeps what the filters accept.
pub struct SimpleAssignmentsTable {
    space: Arc<dyn DiscreteSpace>,
    filters: Vec<Arc<dyn SubsetFilterTable>>,
    max_assignments: usize,
}

impl SimpleAssignmentsTable {
    pub fn new(
        space: Arc<dyn DiscreteSpace>,
        filters: Vec<Arc<dyn SubsetFilterTable>>,
        max_assignments: usize,
    ) -> Self {
        Self {
            space,
            filters,
            max_assignments,
        }
    }
}

impl AssignmentsTable for SimpleAssignmentsTable {
    fn load_assignments(&self, subset: &Subset) -> Result<Vec<Assignment>, EngineError> {
        let sizes: Vec<usize> = subset.iter().map(|v| self.space.size(v)).collect();
        let filters = prepare_filters(&self.filters, subset, &[]);

        let mut assignments = Vec::new();
        for states in CartesianIter::new(&sizes) {
            if !passes(&filters, &states)? {
                continue;
            }
            if assignments.len() == self.max_assignments {
                report_quota(subset, self.max_assignments);
                break;
            }
            assignments.push(Assignment::from_subset(subset, &states)?);
        }
        debug!(subset = %subset, count = assignments.len(), "Enumerated assignments.");
        Ok(assignments)
    }
}

/// Enumerates each half of a subset recursively, then joins the halves.
///
/// Filters run at every level, so a constraint between two variables prunes
/// as soon as both are present instead of after the full product is built.
/// The quota is applied at every level as well.
pub struct RecursiveAssignmentsTable {
    space: Arc<dyn DiscreteSpace>,
    filters: Vec<Arc<dyn SubsetFilterTable>>,
    max_assignments: usize,
}

impl RecursiveAssignmentsTable {
    pub fn new(
        space: Arc<dyn DiscreteSpace>,
        filters: Vec<Arc<dyn SubsetFilterTable>>,
        max_assignments: usize,
    ) -> Self {
        Self {
            space,
            filters,
            max_assignments,
        }
    }

    fn enumerate(&self, subset: &Subset) -> Result<Vec<Vec<StateIndex>>, EngineError> {
        let variables = subset.as_slice();
        if variables.len() == 1 {
            let filters = prepare_filters(&self.filters, subset, &[]);
            let mut out = Vec::new();
            for s in 0..self.space.size(variables[0]) {
                let states = vec![s];
                if !passes(&filters, &states)? {
                    continue;
                }
                if out.len() == self.max_assignments {
                    report_quota(subset, self.max_assignments);
                    break;
                }
                out.push(states);
            }
            return Ok(out);
        }

        let mid = variables.len().div_ceil(2);
        let left = Subset::from_sorted(variables[..mid].to_vec());
        let right = Subset::from_sorted(variables[mid..].to_vec());
        let left_states = self.enumerate(&left)?;
        if left_states.is_empty() {
            return Ok(Vec::new());
        }
        let right_states = self.enumerate(&right)?;
        let filters = prepare_filters(&self.filters, subset, &[left, right]);

        let mut out = Vec::new();
        'join: for l in &left_states {
            for r in &right_states {
                let mut states = Vec::with_capacity(variables.len());
                states.extend_from_slice(l);
                states.extend_from_slice(r);
                if !passes(&filters, &states)? {
                    continue;
                }
                if out.len() == self.max_assignments {
                    report_quota(subset, self.max_assignments);
                    break 'join;
                }
                out.push(states);
            }
        }
        Ok(out)
    }
}

impl AssignmentsTable for RecursiveAssignmentsTable {
    fn load_assignments(&self, subset: &Subset) -> Result<Vec<Assignment>, EngineError> {
        if subset.is_empty() {
            return Ok(Vec::new());
        }
        let assignments = self
            .enumerate(subset)?
            .iter()
            .map(|states| Assignment::from_subset(subset, states))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(subset = %subset, count = assignments.len(), "Enumerated assignments recursively.");
        Ok(assignments)
    }
}

/// Explicit assignment lists supplied per subset.
#[derive(Debug, Clone, Default)]
pub struct ListAssignmentsTable {
    lists: HashMap<Subset, Vec<Assignment>>,
}

impl ListAssignmentsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the candidates for `subset`; each must cover exactly `subset`.
    pub fn set_assignments(
        &mut self,
        subset: Subset,
        assignments: Vec<Assignment>,
    ) -> Result<(), EngineError> {
        if let Some(bad) = assignments.iter().find(|a| a.subset() != subset) {
            return Err(EngineError::Precondition(format!(
                "assignment {} does not cover exactly the subset {}",
                bad, subset
            )));
        }
        self.lists.insert(subset, assignments);
        Ok(())
    }
}

impl AssignmentsTable for ListAssignmentsTable {
    fn load_assignments(&self, subset: &Subset) -> Result<Vec<Assignment>, EngineError> {
        self.lists.get(subset).cloned().ok_or_else(|| {
            EngineError::Precondition(format!("no assignments were listed for subset {}", subset))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::VariableId;
    use crate::core::space::states::{StateTable, VariableStatesTable};
    use crate::core::scoring::oracles::FnOracle;
    use crate::core::scoring::{Restraint, ScoringError};
    use crate::core::space::configuration::Configuration;
    use crate::engine::enumeration::filters::{
        DisjointSetsRule, DisjointSetsSubsetFilterTable, RestraintScoreSubsetFilterTable,
    };
    use slotmap::SlotMap;

    fn setup(sizes: &[usize]) -> (Vec<VariableId>, Arc<VariableStatesTable>) {
        let mut map: SlotMap<VariableId, ()> = SlotMap::with_key();
        let v: Vec<VariableId> = sizes.iter().map(|_| map.insert(())).collect();
        let mut space = VariableStatesTable::new();
        for (&id, &n) in v.iter().zip(sizes) {
            space.set_states(id, Arc::new(StateTable::labels(n)));
        }
        (v, Arc::new(space))
    }

    fn exclusion(v: &[VariableId]) -> Arc<dyn SubsetFilterTable> {
        let mut table = DisjointSetsSubsetFilterTable::new(DisjointSetsRule::Exclusion);
        table.add_set(v);
        Arc::new(table)
    }

    #[test]
    fn simple_table_enumerates_the_full_product_in_canonical_order() {
        let (v, space) = setup(&[2, 3]);
        let table = SimpleAssignmentsTable::new(space, vec![], usize::MAX);

        let all = table.load_assignments(&Subset::new(v.clone())).unwrap();

        assert_eq!(all.len(), 6);
        assert_eq!(all[0].states(), vec![0, 0]);
        assert_eq!(all[1].states(), vec![0, 1]);
        assert_eq!(all[5].states(), vec![1, 2]);
    }

    #[test]
    fn simple_table_truncates_to_the_first_assignments_at_the_quota() {
        let (v, space) = setup(&[3, 3]);
        let table = SimpleAssignmentsTable::new(space, vec![], 4);

        let all = table.load_assignments(&Subset::new(v.clone())).unwrap();

        let states: Vec<Vec<usize>> = all.iter().map(Assignment::states).collect();
        assert_eq!(states, vec![vec![0, 0], vec![0, 1], vec![0, 2], vec![1, 0]]);
    }

    #[test]
    fn simple_table_applies_filters() {
        let (v, space) = setup(&[3, 3]);
        let table = SimpleAssignmentsTable::new(space, vec![exclusion(&v)], usize::MAX);

        let all = table.load_assignments(&Subset::new(v.clone())).unwrap();

        assert_eq!(all.len(), 6);
        assert!(all.iter().all(|a| a.states()[0] != a.states()[1]));
    }

    #[test]
    fn recursive_table_matches_simple_table() {
        let (v, space) = setup(&[3, 2, 3, 2]);
        let filters = vec![exclusion(&[v[0], v[2]])];
        let simple = SimpleAssignmentsTable::new(space.clone(), filters.clone(), usize::MAX);
        let recursive = RecursiveAssignmentsTable::new(space, filters, usize::MAX);
        let subset = Subset::new(v.clone());

        assert_eq!(
            recursive.load_assignments(&subset).unwrap(),
            simple.load_assignments(&subset).unwrap()
        );
    }

    #[test]
    fn filter_failures_abort_enumeration() {
        let (v, space) = setup(&[2, 2]);
        let failing = FnOracle(|_: &[VariableId], _: &Configuration| -> Result<f64, ScoringError> {
            Err(ScoringError::Evaluation("unavailable".to_string()))
        });
        let restraint = Restraint::new("ab", Subset::new(v.clone()), Arc::new(failing)).with_maximum_score(0.0);
        let filters: Vec<Arc<dyn SubsetFilterTable>> =
            vec![Arc::new(RestraintScoreSubsetFilterTable::new(&[restraint], space.clone()))];
        let subset = Subset::new(v.clone());

        let simple = SimpleAssignmentsTable::new(space.clone(), filters.clone(), usize::MAX);
        let recursive = RecursiveAssignmentsTable::new(space, filters, usize::MAX);

        assert!(matches!(simple.load_assignments(&subset), Err(EngineError::Scoring { .. })));
        assert!(matches!(recursive.load_assignments(&subset), Err(EngineError::Scoring { .. })));
    }

    #[test]
    fn list_table_returns_supplied_assignments_and_validates_coverage() {
        let (v, _) = setup(&[2, 2]);
        let subset = Subset::new(v.clone());
        let mut table = ListAssignmentsTable::new();
        let listed = vec![Assignment::new(&v, &[1, 0]).unwrap()];

        table.set_assignments(subset.clone(), listed.clone()).unwrap();
        let bad = table.set_assignments(subset.clone(), vec![Assignment::new(&v[..1], &[0]).unwrap()]);

        assert_eq!(table.load_assignments(&subset).unwrap(), listed);
        assert!(matches!(bad, Err(EngineError::Precondition(_))));
        assert!(table.load_assignments(&Subset::new([v[0]])).is_err());
    }
}
