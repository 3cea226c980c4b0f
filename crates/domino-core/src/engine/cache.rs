use crate::core::models::assignment::AssignmentKey;
use std::collections::HashMap;

/// Memoized restraint scores, keyed by the projection of an assignment onto
/// the restraint's variables.
#[derive(Debug, Default, Clone)]
pub struct ProjectionCache {
    data: HashMap<AssignmentKey, f64>,
}

impl ProjectionCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: HashMap::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &AssignmentKey) -> Option<f64> {
        self.data.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl Extend<(AssignmentKey, f64)> for ProjectionCache {
    fn extend<T: IntoIterator<Item = (AssignmentKey, f64)>>(&mut self, iter: T) {
        self.data.extend(iter);
    }
}
