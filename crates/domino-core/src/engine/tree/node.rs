use crate::core::models::assignment::{Assignment, AssignmentKey};
use crate::core::models::subset::Subset;
use crate::core::scoring::Restraint;
use crate::core::space::DiscreteSpace;
use crate::core::space::configuration::Configuration;
use crate::engine::cache::ProjectionCache;
use crate::engine::enumeration::tables::AssignmentsTable;
use crate::engine::error::EngineError;
use crate::engine::state::ScoredAssignment;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A clique of the junction tree.
///
/// Owns the enumerated assignments of its variables together with two score
/// columns: the restraint potentials folded in by [`realize`](Self::realize)
/// and the running score that message passing updates on top of them.
#[derive(Debug, Clone)]
pub struct CliqueNode {
    index: usize,
    subset: Subset,
    assignments: Vec<Assignment>,
    potentials: Vec<f64>,
    scores: Vec<f64>,
    lookup: HashMap<AssignmentKey, usize>,
}

impl CliqueNode {
    pub fn new(index: usize, subset: Subset) -> Self {
        Self {
            index,
            subset,
            assignments: Vec::new(),
            potentials: Vec::new(),
            scores: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn subset(&self) -> &Subset {
        &self.subset
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Running scores, aligned with [`assignments`](Self::assignments).
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Whether every variable of `variables` belongs to this clique.
    pub fn is_part(&self, variables: &Subset) -> bool {
        variables.is_subset_of(&self.subset)
    }

    pub fn intersection(&self, other: &CliqueNode) -> Subset {
        self.subset.intersection(&other.subset)
    }

    /// Enumerates the clique's assignments and zeroes every score.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Infeasible`] when the table yields no assignment,
    /// which happens when a variable has an empty space or filters reject
    /// every combination.
    pub fn init_sampling(&mut self, table: &dyn AssignmentsTable) -> Result<(), EngineError> {
        let assignments = table.load_assignments(&self.subset)?;
        if assignments.is_empty() {
            warn!(node = self.index, subset = %self.subset, "Enumeration left the node without assignments.");
            return Err(EngineError::Infeasible {
                node: self.index,
                reason: format!("no assignments were enumerated for {}", self.subset),
            });
        }
        self.install(assignments);
        debug!(node = self.index, assignments = self.len(), "Sampling initialized.");
        Ok(())
    }

    fn install(&mut self, assignments: Vec<Assignment>) {
        self.lookup = assignments
            .iter()
            .enumerate()
            .map(|(i, a)| (a.canonical_key(), i))
            .collect();
        self.potentials = vec![0.0; assignments.len()];
        self.scores = vec![0.0; assignments.len()];
        self.assignments = assignments;
    }

    /// Packed projections of every assignment onto `separator`.
    pub(crate) fn projection_keys(&self, separator: &Subset) -> Result<Vec<AssignmentKey>, EngineError> {
        let positions = self.positions_of(separator)?;
        Ok(self
            .assignments
            .iter()
            .map(|a| a.project_key(&positions))
            .collect())
    }

    /// Drops assignments whose projection onto `separator` is not in `keep`.
    ///
    /// Returns how many were removed.
    pub(crate) fn retain_projections(
        &mut self,
        separator: &Subset,
        keep: &HashSet<AssignmentKey>,
    ) -> Result<usize, EngineError> {
        let positions = self.positions_of(separator)?;
        let before = self.assignments.len();
        let kept: Vec<Assignment> = std::mem::take(&mut self.assignments)
            .into_iter()
            .filter(|a| keep.contains(&a.project_key(&positions)))
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            trace!(node = self.index, removed, "Pruned assignments without a partner across a separator.");
        }
        self.install(kept);
        Ok(removed)
    }

    fn positions_of(&self, variables: &Subset) -> Result<Vec<usize>, EngineError> {
        self.subset.positions_of(variables).ok_or_else(|| {
            EngineError::Internal(format!(
                "variables {} are not all part of node {} ({})",
                variables, self.index, self.subset
            ))
        })
    }

    /// Adds `weight * restraint` to every assignment's potential and score.
    ///
    /// The restraint is evaluated once per distinct projection of the
    /// clique's assignments onto the restraint's variables, not once per
    /// assignment. Each evaluation loads its states into a private
    /// [`Configuration`].
    ///
    /// # Return
    ///
    /// The number of oracle evaluations performed.
    pub fn realize(
        &mut self,
        restraint: &Restraint,
        space: &dyn DiscreteSpace,
        weight: f64,
    ) -> Result<usize, EngineError> {
        let footprint = restraint.variables();
        if footprint.is_empty() {
            return Err(EngineError::Precondition(format!(
                "restraint '{}' reads no variables",
                restraint.name()
            )));
        }
        let positions = self
            .subset
            .positions_of(footprint)
            .ok_or_else(|| EngineError::UncoveredRestraint {
                restraint: restraint.name().to_string(),
            })?;

        let projected: Vec<AssignmentKey> = self
            .assignments
            .iter()
            .map(|a| a.project_key(&positions))
            .collect();
        let mut seen = HashSet::with_capacity(projected.len());
        let distinct: Vec<&AssignmentKey> = projected.iter().filter(|k| seen.insert(*k)).collect();

        let evaluate = |key: &&AssignmentKey| -> Result<(AssignmentKey, f64), EngineError> {
            let mut configuration = Configuration::new();
            space.load_assignment(&key.decode(), &mut configuration)?;
            let score = restraint.evaluate(&configuration)?;
            Ok(((*key).clone(), weight * score))
        };

        #[cfg(feature = "parallel")]
        let iterator = distinct.par_iter();

        #[cfg(not(feature = "parallel"))]
        let iterator = distinct.iter();

        let scored = iterator.map(evaluate).collect::<Result<Vec<_>, EngineError>>()?;
        let mut cache = ProjectionCache::with_capacity(scored.len());
        cache.extend(scored);
        let evaluations = cache.len();

        for (i, key) in projected.iter().enumerate() {
            let contribution = cache.get(key).ok_or_else(|| {
                EngineError::Internal(format!("projection of assignment {} was not scored", i))
            })?;
            self.potentials[i] += contribution;
            self.scores[i] += contribution;
        }

        debug!(
            node = self.index,
            restraint = restraint.name(),
            evaluations,
            assignments = self.len(),
            "Restraint realized."
        );
        Ok(evaluations)
    }

    /// All assignments agreeing with `separator` that reach the lowest running score.
    ///
    /// Ties are returned in enumeration order and never broken here.
    ///
    /// # Errors
    ///
    /// [`EngineError::Infeasible`] if no assignment agrees with `separator`.
    pub fn min_marginalize(&self, separator: &Assignment) -> Result<Vec<ScoredAssignment>, EngineError> {
        let positions = self.subset.positions_of(&separator.subset());
        let states = separator.states();
        let matching: Vec<usize> = match &positions {
            Some(positions) => (0..self.assignments.len())
                .filter(|&i| self.assignments[i].matches_at(positions, &states))
                .collect(),
            None => Vec::new(),
        };
        self.minima_among(matching).ok_or_else(|| EngineError::Infeasible {
            node: self.index,
            reason: format!("no assignment agrees with separator value {}", separator),
        })
    }

    /// All assignments reaching the lowest running score in the clique.
    pub fn find_minimum(&self) -> Result<Vec<ScoredAssignment>, EngineError> {
        self.minima_among((0..self.assignments.len()).collect())
            .ok_or_else(|| EngineError::Infeasible {
                node: self.index,
                reason: "the node has no assignments".to_string(),
            })
    }

    fn minima_among(&self, candidates: Vec<usize>) -> Option<Vec<ScoredAssignment>> {
        let min = candidates
            .iter()
            .map(|&i| self.scores[i])
            .min_by(|a, b| a.total_cmp(b))?;
        let minima: Vec<ScoredAssignment> = candidates
            .into_iter()
            .filter(|&i| self.scores[i] == min)
            .map(|i| ScoredAssignment::new(self.assignments[i].clone(), self.scores[i]))
            .collect();
        (!minima.is_empty()).then_some(minima)
    }

    /// For every projection onto `separator`, the running score of the first
    /// minimal assignment carrying it. One pass over the clique.
    pub(crate) fn min_marginals(&self, separator: &Subset) -> Result<HashMap<AssignmentKey, f64>, EngineError> {
        let positions = self.positions_of(separator)?;
        let mut marginals: HashMap<AssignmentKey, f64> = HashMap::new();
        for (assignment, &score) in self.assignments.iter().zip(&self.scores) {
            marginals
                .entry(assignment.project_key(&positions))
                .and_modify(|best| {
                    if score < *best {
                        *best = score;
                    }
                })
                .or_insert(score);
        }
        Ok(marginals)
    }

    /// The `count` lowest-scoring assignments, ties in enumeration order.
    pub fn best_assignments(&self, count: usize) -> Vec<ScoredAssignment> {
        let mut order: Vec<usize> = (0..self.assignments.len()).collect();
        order.sort_by(|&a, &b| self.scores[a].total_cmp(&self.scores[b]));
        order
            .into_iter()
            .take(count)
            .map(|i| ScoredAssignment::new(self.assignments[i].clone(), self.scores[i]))
            .collect()
    }

    pub fn minimum_score(&self) -> Option<f64> {
        self.scores.iter().copied().min_by(|a, b| a.total_cmp(b))
    }

    /// Shifts every running score by `new - old` of its separator slice.
    ///
    /// # Errors
    ///
    /// [`EngineError::Lookup`] if a projection is missing from either table.
    pub fn update_potentials(
        &mut self,
        old_scores: &HashMap<AssignmentKey, f64>,
        new_scores: &HashMap<AssignmentKey, f64>,
        separator: &Subset,
    ) -> Result<(), EngineError> {
        let positions = self.positions_of(separator)?;
        for (assignment, score) in self.assignments.iter().zip(self.scores.iter_mut()) {
            let key = assignment.project_key(&positions);
            let lookup = |table: &HashMap<AssignmentKey, f64>, which: &str| {
                table.get(&key).copied().ok_or_else(|| EngineError::Lookup {
                    location: format!("{} separator scores of node {}", which, self.index),
                    key: key.decode().to_string(),
                })
            };
            let old = lookup(old_scores, "old")?;
            let new = lookup(new_scores, "new")?;
            *score = shifted(*score, old, new);
        }
        Ok(())
    }

    fn index_of(&self, assignment: &Assignment) -> Result<usize, EngineError> {
        let key = assignment.project(&self.subset)?.canonical_key();
        self.lookup.get(&key).copied().ok_or_else(|| EngineError::Lookup {
            location: format!("node {}", self.index),
            key: key.decode().to_string(),
        })
    }

    /// Running score of the projection of `assignment` onto this clique.
    pub fn score_of(&self, assignment: &Assignment) -> Result<f64, EngineError> {
        Ok(self.scores[self.index_of(assignment)?])
    }

    /// Restraint potential (before message passing) of the projection of `assignment`.
    pub fn potential_of(&self, assignment: &Assignment) -> Result<f64, EngineError> {
        Ok(self.potentials[self.index_of(assignment)?])
    }

    /// Zeroes potentials and scores, keeping the enumerated assignments.
    pub fn reset_scores(&mut self) {
        self.potentials.iter_mut().for_each(|p| *p = 0.0);
        self.scores.iter_mut().for_each(|s| *s = 0.0);
    }

    pub fn clear(&mut self) {
        self.install(Vec::new());
    }
}

/// Applies a separator update of `new - old` to `score`.
///
/// An unchanged separator value leaves the score alone even when both sides
/// are infinite, and any other non-finite result saturates to `+inf`.
fn shifted(score: f64, old: f64, new: f64) -> f64 {
    if new == old {
        return score;
    }
    let value = score + (new - old);
    if value.is_nan() { f64::INFINITY } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::VariableId;
    use crate::core::scoring::ScoringOracle;
    use crate::core::scoring::oracles::TableOracle;
    use crate::core::space::states::{StateTable, VariableStatesTable};
    use crate::engine::enumeration::tables::SimpleAssignmentsTable;
    use slotmap::SlotMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestSetup {
        v: Vec<VariableId>,
        space: Arc<VariableStatesTable>,
    }

    fn setup(sizes: &[usize]) -> TestSetup {
        let mut map: SlotMap<VariableId, ()> = SlotMap::with_key();
        let v: Vec<VariableId> = sizes.iter().map(|_| map.insert(())).collect();
        let mut space = VariableStatesTable::new();
        for (&id, &n) in v.iter().zip(sizes) {
            space.set_states(id, Arc::new(StateTable::labels(n)));
        }
        TestSetup {
            v,
            space: Arc::new(space),
        }
    }

    fn sampled_node(setup: &TestSetup, variables: &[VariableId]) -> CliqueNode {
        let table = SimpleAssignmentsTable::new(setup.space.clone(), vec![], usize::MAX);
        let mut node = CliqueNode::new(0, Subset::new(variables.iter().copied()));
        node.init_sampling(&table).unwrap();
        node
    }

    struct CountingOracle {
        calls: AtomicUsize,
    }

    impl ScoringOracle for CountingOracle {
        fn score(
            &self,
            variables: &[VariableId],
            configuration: &Configuration,
        ) -> Result<f64, crate::core::scoring::ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(variables
                .iter()
                .map(|&v| configuration.state_of(v).unwrap_or(0) as f64)
                .sum())
        }
    }

    #[test]
    fn init_sampling_enumerates_the_product_with_unique_keys() {
        let setup = setup(&[2, 3, 2]);
        let node = sampled_node(&setup, &setup.v);

        let keys: HashSet<AssignmentKey> = node.assignments().iter().map(Assignment::canonical_key).collect();

        assert_eq!(node.len(), 12);
        assert_eq!(keys.len(), 12);
        for (i, a) in node.assignments().iter().enumerate() {
            let states = a.canonical_key().decode().states();
            assert_eq!(crate::engine::enumeration::cartesian::rank(&states, &[2, 3, 2]), Some(i));
        }
    }

    #[test]
    fn init_sampling_fails_for_an_empty_space() {
        let setup = setup(&[2, 0]);
        let table = SimpleAssignmentsTable::new(setup.space.clone(), vec![], usize::MAX);
        let mut node = CliqueNode::new(4, Subset::new(setup.v.clone()));

        let result = node.init_sampling(&table);

        assert!(matches!(result, Err(EngineError::Infeasible { node: 4, .. })));
    }

    #[test]
    fn realize_scores_each_distinct_projection_once() {
        let setup = setup(&[2, 3, 2, 2]);
        let mut node = sampled_node(&setup, &setup.v);
        let oracle = Arc::new(CountingOracle {
            calls: AtomicUsize::new(0),
        });
        let restraint = Restraint::new("ab", Subset::new([setup.v[0], setup.v[1]]), oracle.clone());

        let evaluations = node.realize(&restraint, setup.space.as_ref(), 2.0).unwrap();

        assert_eq!(evaluations, 6);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 6);
        let full = Assignment::new(&setup.v, &[1, 2, 0, 1]).unwrap();
        assert_eq!(node.score_of(&full).unwrap(), 6.0);
        assert_eq!(node.potential_of(&full).unwrap(), 6.0);
    }

    #[test]
    fn realize_rejects_restraints_outside_the_clique() {
        let setup = setup(&[2, 2, 2]);
        let mut node = sampled_node(&setup, &setup.v[..2]);
        let restraint = Restraint::new(
            "bc",
            Subset::new([setup.v[1], setup.v[2]]),
            Arc::new(TableOracle::new(0.0)),
        );

        let result = node.realize(&restraint, setup.space.as_ref(), 1.0);

        assert!(matches!(result, Err(EngineError::UncoveredRestraint { .. })));
    }

    #[test]
    fn min_marginalize_returns_all_ties_for_the_separator_value() {
        let setup = setup(&[2, 2]);
        let mut node = sampled_node(&setup, &setup.v);
        let oracle = TableOracle::new(5.0).with_score(&[1, 0], 1.0).with_score(&[1, 1], 1.0);
        let restraint = Restraint::new("ab", Subset::new(setup.v.clone()), Arc::new(oracle));
        node.realize(&restraint, setup.space.as_ref(), 1.0).unwrap();

        let separator = Assignment::new(&[setup.v[0]], &[1]).unwrap();
        let minima = node.min_marginalize(&separator).unwrap();

        assert_eq!(minima.len(), 2);
        assert_eq!(minima[0].assignment.states(), vec![1, 0]);
        assert_eq!(minima[1].assignment.states(), vec![1, 1]);
        assert!(minima.iter().all(|m| m.score == 1.0));

        let other = Assignment::new(&[setup.v[0]], &[0]).unwrap();
        assert_eq!(node.min_marginalize(&other).unwrap().len(), 2);
    }

    #[test]
    fn min_marginalize_fails_for_values_the_node_never_enumerated() {
        let setup = setup(&[2, 2]);
        let node = sampled_node(&setup, &setup.v);
        let separator = Assignment::new(&[setup.v[0]], &[7]).unwrap();

        let result = node.min_marginalize(&separator);

        assert!(matches!(result, Err(EngineError::Infeasible { .. })));
    }

    #[test]
    fn update_potentials_shifts_scores_by_the_separator_difference() {
        let setup = setup(&[2, 2]);
        let mut node = sampled_node(&setup, &setup.v);
        let separator = Subset::new([setup.v[1]]);
        let key = |s: usize| Assignment::new(&[setup.v[1]], &[s]).unwrap().canonical_key();
        let old = HashMap::from([(key(0), 1.0), (key(1), 0.0)]);
        let new = HashMap::from([(key(0), 4.0), (key(1), 2.0)]);

        node.update_potentials(&old, &new, &separator).unwrap();

        assert_eq!(node.scores(), &[3.0, 2.0, 3.0, 2.0]);
        assert!(matches!(
            node.update_potentials(&HashMap::new(), &new, &separator),
            Err(EngineError::Lookup { .. })
        ));
    }

    #[test]
    fn update_potentials_never_turns_infinite_separators_into_nan() {
        let setup = setup(&[2, 2]);
        let mut node = sampled_node(&setup, &setup.v);
        let oracle = TableOracle::new(0.0)
            .with_score(&[0, 1], f64::INFINITY)
            .with_score(&[1, 1], f64::INFINITY);
        let restraint = Restraint::new("ab", Subset::new(setup.v.clone()), Arc::new(oracle));
        node.realize(&restraint, setup.space.as_ref(), 1.0).unwrap();
        let separator = Subset::new([setup.v[1]]);
        let key = |s: usize| Assignment::new(&[setup.v[1]], &[s]).unwrap().canonical_key();
        let old = HashMap::from([(key(0), 0.0), (key(1), f64::INFINITY)]);
        let new = HashMap::from([(key(0), 2.0), (key(1), f64::INFINITY)]);

        node.update_potentials(&old, &new, &separator).unwrap();

        assert_eq!(node.scores(), &[2.0, f64::INFINITY, 2.0, f64::INFINITY]);
        let separator_value = Assignment::new(&[setup.v[1]], &[1]).unwrap();
        let minima = node.min_marginalize(&separator_value).unwrap();
        assert_eq!(minima.len(), 2);
        assert!(minima.iter().all(|m| m.score == f64::INFINITY));
    }

    #[test]
    fn shifted_saturates_undefined_differences() {
        assert_eq!(shifted(1.0, 2.0, 5.0), 4.0);
        assert_eq!(shifted(f64::INFINITY, f64::INFINITY, f64::INFINITY), f64::INFINITY);
        assert_eq!(shifted(f64::INFINITY, f64::INFINITY, 3.0), f64::INFINITY);
        assert_eq!(shifted(0.0, 1.0, f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn find_minimum_reports_infeasible_when_no_score_compares_equal() {
        let setup = setup(&[2]);
        let mut node = sampled_node(&setup, &setup.v);
        node.scores = vec![f64::NAN, f64::NAN];

        assert!(matches!(node.find_minimum(), Err(EngineError::Infeasible { .. })));
    }

    #[test]
    fn best_assignments_orders_by_score_with_stable_ties() {
        let setup = setup(&[3]);
        let mut node = sampled_node(&setup, &setup.v);
        let oracle = TableOracle::new(1.0).with_score(&[1], 0.0);
        let restraint = Restraint::new("a", Subset::new(setup.v.clone()), Arc::new(oracle));
        node.realize(&restraint, setup.space.as_ref(), 1.0).unwrap();

        let best: Vec<Vec<usize>> = node
            .best_assignments(3)
            .iter()
            .map(|s| s.assignment.states())
            .collect();

        assert_eq!(best, vec![vec![1], vec![0], vec![2]]);
        assert_eq!(node.minimum_score(), Some(0.0));
    }

    #[test]
    fn reset_scores_keeps_assignments() {
        let setup = setup(&[2]);
        let mut node = sampled_node(&setup, &setup.v);
        let restraint = Restraint::new(
            "a",
            Subset::new(setup.v.clone()),
            Arc::new(TableOracle::new(3.0)),
        );
        node.realize(&restraint, setup.space.as_ref(), 1.0).unwrap();

        node.reset_scores();

        assert_eq!(node.len(), 2);
        assert_eq!(node.scores(), &[0.0, 0.0]);
    }
}
