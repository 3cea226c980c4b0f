use super::ids::{StateIndex, VariableId};
use super::subset::Subset;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("Assignment shape mismatch: {variables} variables but {states} state indices")]
    Shape { variables: usize, states: usize },
    #[error("Cannot build an assignment over an empty set of variables")]
    EmptyVariableSet,
    #[error("Variable {0:?} appears more than once")]
    DuplicateVariable(VariableId),
    #[error("Conflicting states for variable {variable:?}: {existing} vs {incoming}")]
    Conflict {
        variable: VariableId,
        existing: StateIndex,
        incoming: StateIndex,
    },
    #[error("Variable {0:?} is not part of the assignment")]
    MissingVariable(VariableId),
}

/// An immutable choice of one state index per variable.
///
/// Entries are kept sorted by variable, so two assignments over the same
/// variables compare, hash and print identically regardless of how they were
/// built. Scores are carried separately (see [`ScoredAssignment`]) and never
/// take part in equality.
///
/// [`ScoredAssignment`]: crate::engine::state::ScoredAssignment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Assignment {
    entries: Vec<(VariableId, StateIndex)>,
}

impl Assignment {
    /// Builds an assignment from parallel variable and state lists.
    ///
    /// # Arguments
    ///
    /// * `variables` - The variables to assign, in any order.
    /// * `states` - The state index for each variable, aligned with `variables`.
    ///
    /// # Errors
    ///
    /// Returns [`AssignmentError::Shape`] when the lists differ in length,
    /// [`AssignmentError::EmptyVariableSet`] when both are empty, and
    /// [`AssignmentError::DuplicateVariable`] when a variable repeats.
    pub fn new(variables: &[VariableId], states: &[StateIndex]) -> Result<Self, AssignmentError> {
        if variables.len() != states.len() {
            return Err(AssignmentError::Shape {
                variables: variables.len(),
                states: states.len(),
            });
        }
        Self::from_entries(variables.iter().copied().zip(states.iter().copied()))
    }

    pub fn from_entries(
        entries: impl IntoIterator<Item = (VariableId, StateIndex)>,
    ) -> Result<Self, AssignmentError> {
        let mut entries: Vec<(VariableId, StateIndex)> = entries.into_iter().collect();
        if entries.is_empty() {
            return Err(AssignmentError::EmptyVariableSet);
        }
        entries.sort_unstable_by_key(|&(v, _)| v);
        if let Some(w) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(AssignmentError::DuplicateVariable(w[0].0));
        }
        Ok(Self { entries })
    }

    /// Pairs the members of `subset` with `states`, which must follow the subset's order.
    pub fn from_subset(subset: &Subset, states: &[StateIndex]) -> Result<Self, AssignmentError> {
        if subset.len() != states.len() {
            return Err(AssignmentError::Shape {
                variables: subset.len(),
                states: states.len(),
            });
        }
        if subset.is_empty() {
            return Err(AssignmentError::EmptyVariableSet);
        }
        Ok(Self {
            entries: subset.iter().zip(states.iter().copied()).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(VariableId, StateIndex)] {
        &self.entries
    }

    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.entries.iter().map(|&(v, _)| v)
    }

    pub fn subset(&self) -> Subset {
        Subset::from_sorted(self.variables().collect())
    }

    pub fn states(&self) -> Vec<StateIndex> {
        self.entries.iter().map(|&(_, s)| s).collect()
    }

    pub fn state_of(&self, variable: VariableId) -> Option<StateIndex> {
        self.entries
            .binary_search_by_key(&variable, |&(v, _)| v)
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// Keeps only the entries for the variables of `subset`.
    ///
    /// # Errors
    ///
    /// Fails with [`AssignmentError::MissingVariable`] if `subset` names a
    /// variable this assignment does not cover, or
    /// [`AssignmentError::EmptyVariableSet`] for an empty subset.
    pub fn project(&self, subset: &Subset) -> Result<Assignment, AssignmentError> {
        if subset.is_empty() {
            return Err(AssignmentError::EmptyVariableSet);
        }
        let entries = subset
            .iter()
            .map(|v| {
                self.state_of(v)
                    .map(|s| (v, s))
                    .ok_or(AssignmentError::MissingVariable(v))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Merges two partial assignments.
    ///
    /// Shared variables must agree; the merge never overwrites. On success the
    /// result is the same whichever side is the receiver.
    pub fn combine(&self, other: &Assignment) -> Result<Assignment, AssignmentError> {
        let mut merged = Vec::with_capacity(self.len() + other.len());
        let (mut i, mut j) = (0, 0);
        let (a, b) = (&self.entries, &other.entries);
        while i < a.len() && j < b.len() {
            let (va, sa) = a[i];
            let (vb, sb) = b[j];
            match va.cmp(&vb) {
                std::cmp::Ordering::Less => {
                    merged.push(a[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    merged.push(b[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    if sa != sb {
                        return Err(AssignmentError::Conflict {
                            variable: va,
                            existing: sa,
                            incoming: sb,
                        });
                    }
                    merged.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&a[i..]);
        merged.extend_from_slice(&b[j..]);
        Ok(Self { entries: merged })
    }

    /// Packed key of the projection onto the entries at `positions`.
    ///
    /// `positions` must be increasing and in range; callers derive them once
    /// from [`Subset::positions_of`] and reuse them across many assignments.
    pub(crate) fn project_key(&self, positions: &[usize]) -> AssignmentKey {
        AssignmentKey(
            positions
                .iter()
                .flat_map(|&p| {
                    let (v, s) = self.entries[p];
                    [v.to_bits(), s as u64]
                })
                .collect(),
        )
    }

    /// Whether the entries at `positions` carry exactly `states`.
    pub(crate) fn matches_at(&self, positions: &[usize], states: &[StateIndex]) -> bool {
        positions
            .iter()
            .zip(states)
            .all(|(&p, &s)| self.entries[p].1 == s)
    }

    pub fn is_consistent_with(&self, other: &Assignment) -> bool {
        other
            .entries
            .iter()
            .all(|&(v, s)| self.state_of(v).is_none_or(|own| own == s))
    }

    pub fn canonical_key(&self) -> AssignmentKey {
        AssignmentKey(
            self.entries
                .iter()
                .flat_map(|&(v, s)| [v.to_bits(), s as u64])
                .collect(),
        )
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (v, s)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:?}={}", v, s)?;
        }
        Ok(())
    }
}

/// Packed hash key of an [`Assignment`]: alternating variable key and state words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssignmentKey(Box<[u64]>);

impl AssignmentKey {
    pub fn words(&self) -> &[u64] {
        &self.0
    }

    pub fn decode(&self) -> Assignment {
        Assignment {
            entries: self
                .0
                .chunks_exact(2)
                .map(|pair| (VariableId::from_bits(pair[0]), pair[1] as StateIndex))
                .collect(),
        }
    }
}

impl From<&Assignment> for AssignmentKey {
    fn from(assignment: &Assignment) -> Self {
        assignment.canonical_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<VariableId> {
        let mut map: SlotMap<VariableId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn new_rejects_mismatched_and_empty_inputs() {
        let v = ids(2);
        assert_eq!(
            Assignment::new(&v, &[0]),
            Err(AssignmentError::Shape {
                variables: 2,
                states: 1
            })
        );
        assert_eq!(
            Assignment::new(&[], &[]),
            Err(AssignmentError::EmptyVariableSet)
        );
        assert_eq!(
            Assignment::new(&[v[0], v[0]], &[0, 1]),
            Err(AssignmentError::DuplicateVariable(v[0]))
        );
    }

    #[test]
    fn equality_ignores_construction_order() {
        let v = ids(3);
        let a = Assignment::new(&[v[2], v[0], v[1]], &[1, 0, 2]).unwrap();
        let b = Assignment::new(&[v[0], v[1], v[2]], &[0, 2, 1]).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn canonical_key_decodes_to_the_same_assignment() {
        let v = ids(3);
        let a = Assignment::new(&v, &[4, 0, 7]).unwrap();
        assert_eq!(a.canonical_key().decode(), a);
    }

    #[test]
    fn project_is_idempotent() {
        let v = ids(4);
        let a = Assignment::new(&v, &[1, 2, 3, 0]).unwrap();
        let s = Subset::new([v[1], v[3]]);

        let once = a.project(&s).unwrap();
        let twice = once.project(&s).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.states(), vec![2, 0]);
    }

    #[test]
    fn project_fails_for_unknown_variable() {
        let v = ids(3);
        let a = Assignment::new(&v[..2], &[0, 1]).unwrap();
        assert_eq!(
            a.project(&Subset::new([v[2]])),
            Err(AssignmentError::MissingVariable(v[2]))
        );
    }

    #[test]
    fn combine_is_order_independent_when_consistent() {
        let v = ids(4);
        let a = Assignment::new(&[v[0], v[1]], &[0, 1]).unwrap();
        let b = Assignment::new(&[v[1], v[2]], &[1, 2]).unwrap();
        let c = Assignment::new(&[v[3]], &[3]).unwrap();

        let left = a.combine(&b).unwrap().combine(&c).unwrap();
        let right = a.combine(&c).unwrap().combine(&b).unwrap();
        let swapped = b.combine(&a).unwrap().combine(&c).unwrap();

        assert_eq!(left, right);
        assert_eq!(left, swapped);
        assert_eq!(left.states(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn combine_reports_conflicts_instead_of_overwriting() {
        let v = ids(2);
        let a = Assignment::new(&v, &[0, 1]).unwrap();
        let b = Assignment::new(&[v[1]], &[0]).unwrap();

        assert_eq!(
            a.combine(&b),
            Err(AssignmentError::Conflict {
                variable: v[1],
                existing: 1,
                incoming: 0
            })
        );
        assert!(!a.is_consistent_with(&b));
    }
}
