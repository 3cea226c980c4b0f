use crate::core::models::ids::StateIndex;

/// Lazily enumerates every state vector of a mixed-radix counter.
///
/// The first digit is the most significant, so vectors come out in
/// lexicographic order and the `i`-th vector is `unrank(i, sizes)`.
#[derive(Debug, Clone)]
pub struct CartesianIter {
    sizes: Vec<usize>,
    current: Option<Vec<StateIndex>>,
}

impl CartesianIter {
    pub fn new(sizes: &[usize]) -> Self {
        let current = if sizes.is_empty() || sizes.contains(&0) {
            None
        } else {
            Some(vec![0; sizes.len()])
        };
        Self {
            sizes: sizes.to_vec(),
            current,
        }
    }

    /// Total number of vectors, or `None` if it overflows `usize`.
    pub fn total(sizes: &[usize]) -> Option<usize> {
        if sizes.is_empty() {
            return Some(0);
        }
        sizes.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
    }
}

impl Iterator for CartesianIter {
    type Item = Vec<StateIndex>;

    fn next(&mut self) -> Option<Self::Item> {
        let out = self.current.clone()?;
        let mut exhausted = true;
        if let Some(current) = self.current.as_mut() {
            for digit in (0..current.len()).rev() {
                current[digit] += 1;
                if current[digit] < self.sizes[digit] {
                    exhausted = false;
                    break;
                }
                current[digit] = 0;
            }
        }
        if exhausted {
            self.current = None;
        }
        Some(out)
    }
}

/// Position of `states` in the enumeration order of `sizes`.
pub fn rank(states: &[StateIndex], sizes: &[usize]) -> Option<usize> {
    if states.len() != sizes.len() {
        return None;
    }
    states.iter().zip(sizes).try_fold(0usize, |acc, (&s, &n)| {
        if s >= n {
            return None;
        }
        acc.checked_mul(n)?.checked_add(s)
    })
}

/// The state vector at `index` in the enumeration order of `sizes`.
pub fn unrank(mut index: usize, sizes: &[usize]) -> Option<Vec<StateIndex>> {
    if index >= CartesianIter::total(sizes)? {
        return None;
    }
    let mut states = vec![0; sizes.len()];
    for (slot, &n) in states.iter_mut().zip(sizes).rev() {
        *slot = index % n;
        index /= n;
    }
    Some(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn enumerates_in_lexicographic_order_with_last_digit_fastest() {
        let all: Vec<Vec<usize>> = CartesianIter::new(&[2, 3]).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2]
            ]
        );
    }

    #[test]
    fn produces_the_product_of_sizes_distinct_vectors() {
        let sizes = [3, 1, 4, 2];
        let all: Vec<Vec<usize>> = CartesianIter::new(&sizes).collect();
        let unique: HashSet<&Vec<usize>> = all.iter().collect();

        assert_eq!(all.len(), 24);
        assert_eq!(unique.len(), 24);
        assert_eq!(CartesianIter::total(&sizes), Some(24));
    }

    #[test]
    fn rank_and_unrank_invert_each_other() {
        let sizes = [3, 2, 4];
        for (i, states) in CartesianIter::new(&sizes).enumerate() {
            assert_eq!(rank(&states, &sizes), Some(i));
            assert_eq!(unrank(i, &sizes), Some(states));
        }
        assert_eq!(unrank(24, &sizes), None);
        assert_eq!(rank(&[3, 0, 0], &sizes), None);
    }

    #[test]
    fn empty_or_zero_sized_inputs_yield_nothing() {
        assert_eq!(CartesianIter::new(&[]).count(), 0);
        assert_eq!(CartesianIter::new(&[2, 0, 3]).count(), 0);
    }
}
