use super::ids::VariableId;
use std::fmt;

/// A sorted, duplicate-free set of variables.
///
/// Every clique, separator and restraint footprint is a `Subset`. Keeping the
/// members sorted makes intersections linear and gives every assignment over
/// the subset one canonical variable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subset {
    variables: Vec<VariableId>,
}

impl Subset {
    pub fn new(variables: impl IntoIterator<Item = VariableId>) -> Self {
        let mut variables: Vec<VariableId> = variables.into_iter().collect();
        variables.sort_unstable();
        variables.dedup();
        Self { variables }
    }

    /// Wraps a list the caller already knows to be sorted and unique.
    pub(crate) fn from_sorted(variables: Vec<VariableId>) -> Self {
        debug_assert!(variables.windows(2).all(|w| w[0] < w[1]));
        Self { variables }
    }

    pub fn as_slice(&self) -> &[VariableId] {
        &self.variables
    }

    pub fn iter(&self) -> impl Iterator<Item = VariableId> + Clone + '_ {
        self.variables.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn contains(&self, variable: VariableId) -> bool {
        self.variables.binary_search(&variable).is_ok()
    }

    /// Position of `variable` within the canonical order, if present.
    pub fn position(&self, variable: VariableId) -> Option<usize> {
        self.variables.binary_search(&variable).ok()
    }

    /// Positions of every member of `other` within `self`.
    ///
    /// Returns `None` unless `other` is fully contained in `self`.
    pub fn positions_of(&self, other: &Subset) -> Option<Vec<usize>> {
        other.iter().map(|v| self.position(v)).collect()
    }

    pub fn is_subset_of(&self, other: &Subset) -> bool {
        self.iter().all(|v| other.contains(v))
    }

    pub fn intersection(&self, other: &Subset) -> Subset {
        let mut out = Vec::with_capacity(self.len().min(other.len()));
        let (mut i, mut j) = (0, 0);
        while i < self.variables.len() && j < other.variables.len() {
            match self.variables[i].cmp(&other.variables[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    out.push(self.variables[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        Subset::from_sorted(out)
    }

    pub fn union(&self, other: &Subset) -> Subset {
        Subset::new(self.iter().chain(other.iter()))
    }

    pub fn difference(&self, other: &Subset) -> Subset {
        Subset::from_sorted(self.iter().filter(|v| !other.contains(*v)).collect())
    }
}

impl FromIterator<VariableId> for Subset {
    fn from_iter<T: IntoIterator<Item = VariableId>>(iter: T) -> Self {
        Subset::new(iter)
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.variables.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:?}", v)?;
        }
        write!(f, "]")
    }
}
