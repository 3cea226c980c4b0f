use crate::core::models::assignment::Assignment;
use std::cmp::Ordering;
use std::fmt;

/// Lifecycle of a junction tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeState {
    /// Topology fixed, no states enumerated.
    Built,
    /// Every node enumerated its assignments; potentials are all zero.
    SamplingSet,
    /// At least one restraint has been folded into the node potentials.
    PotentialsSet,
    /// Message passing finished and solutions are available.
    Inferred,
}

impl fmt::Display for TreeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TreeState::Built => "built",
            TreeState::SamplingSet => "sampling set",
            TreeState::PotentialsSet => "potentials set",
            TreeState::Inferred => "inferred",
        };
        f.write_str(name)
    }
}

/// An assignment with its accumulated score.
///
/// Ordered by score, then by the assignment's canonical order, so sorting a
/// list of candidates is deterministic even with ties.
#[derive(Debug, Clone)]
pub struct ScoredAssignment {
    pub assignment: Assignment,
    pub score: f64,
}

impl ScoredAssignment {
    pub fn new(assignment: Assignment, score: f64) -> Self {
        Self { assignment, score }
    }
}

impl PartialEq for ScoredAssignment {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for ScoredAssignment {}

impl PartialOrd for ScoredAssignment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredAssignment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.assignment.cmp(&other.assignment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::VariableId;
    use slotmap::SlotMap;

    #[test]
    fn scored_assignments_sort_by_score_then_canonical_order() {
        let mut map: SlotMap<VariableId, ()> = SlotMap::with_key();
        let v = map.insert(());
        let a0 = Assignment::new(&[v], &[0]).unwrap();
        let a1 = Assignment::new(&[v], &[1]).unwrap();
        let a2 = Assignment::new(&[v], &[2]).unwrap();

        let mut list = vec![
            ScoredAssignment::new(a2.clone(), 1.0),
            ScoredAssignment::new(a1.clone(), 0.5),
            ScoredAssignment::new(a0.clone(), 1.0),
        ];
        list.sort();

        let order: Vec<&Assignment> = list.iter().map(|s| &s.assignment).collect();
        assert_eq!(order, vec![&a1, &a0, &a2]);
    }
}
