use super::SpaceError;
use super::states::{StateTable, VariableStatesTable};
use crate::core::models::ids::VariableId;
use itertools::Itertools;
use nalgebra::{Isometry3, Point3, Unit, Vector3};
use rand::Rng;
use std::sync::Arc;

/// Enumerates the Cartesian product of per-attribute value lists.
///
/// States are ordered with the first axis varying slowest.
pub fn cartesian_states(axes: &[(&str, Vec<f64>)]) -> Result<StateTable, SpaceError> {
    let attributes: Vec<String> = axes.iter().map(|(name, _)| name.to_string()).collect();
    if axes.is_empty() || axes.iter().any(|(_, values)| values.is_empty()) {
        return StateTable::new(attributes, Vec::new());
    }
    let rows: Vec<Vec<f64>> = axes
        .iter()
        .map(|(_, values)| values.iter().copied())
        .multi_cartesian_product()
        .collect();
    StateTable::new(attributes, rows)
}

/// Gives every variable the same shared pool of states.
///
/// On its own this allows two variables to pick the same state; pair it with
/// an exclusion filter built from the space's shared pools to sample
/// permutations of the pool instead.
pub fn permutation_space(variables: &[VariableId], pool: StateTable) -> VariableStatesTable {
    let pool = Arc::new(pool);
    let mut space = VariableStatesTable::new();
    for &variable in variables {
        space.set_states(variable, Arc::clone(&pool));
    }
    space
}

/// Places a reference point under each rigid transformation.
pub fn transformation_states(reference: &Point3<f64>, transforms: &[Isometry3<f64>]) -> StateTable {
    let points: Vec<Point3<f64>> = transforms.iter().map(|t| t * reference).collect();
    StateTable::from_points(&points)
}

/// Draws random rigid transformations with bounded translation and rotation.
///
/// The first transformation is always the identity, so the reference placement
/// stays a candidate.
pub fn random_transformations<R: Rng + ?Sized>(
    count: usize,
    max_translation: f64,
    max_angle: f64,
    rng: &mut R,
) -> Vec<Isometry3<f64>> {
    let max_translation = max_translation.abs();
    let max_angle = max_angle.abs();
    (0..count)
        .map(|i| {
            if i == 0 {
                return Isometry3::identity();
            }
            let translation = Vector3::new(
                rng.gen_range(-max_translation..=max_translation),
                rng.gen_range(-max_translation..=max_translation),
                rng.gen_range(-max_translation..=max_translation),
            );
            let raw_axis = Vector3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            );
            let axis = Unit::try_new(raw_axis, 1e-9).unwrap_or_else(Vector3::z_axis);
            let angle = rng.gen_range(-max_angle..=max_angle);
            Isometry3::new(translation, axis.into_inner() * angle)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::space::DiscreteSpace;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use slotmap::SlotMap;

    #[test]
    fn cartesian_states_orders_first_axis_slowest() {
        let table = cartesian_states(&[("x", vec![0.0, 1.0]), ("y", vec![5.0, 6.0, 7.0])]).unwrap();

        assert_eq!(table.len(), 6);
        assert_eq!(table.row(0), Some(&[0.0, 5.0][..]));
        assert_eq!(table.row(2), Some(&[0.0, 7.0][..]));
        assert_eq!(table.row(3), Some(&[1.0, 5.0][..]));
    }

    #[test]
    fn cartesian_states_with_an_empty_axis_has_no_states() {
        let table = cartesian_states(&[("x", vec![0.0]), ("y", vec![])]).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn permutation_space_shares_one_pool() {
        let mut map: SlotMap<VariableId, ()> = SlotMap::with_key();
        let v: Vec<VariableId> = (0..3).map(|_| map.insert(())).collect();

        let space = permutation_space(&v, StateTable::labels(3));

        assert_eq!(space.shared_pools(), vec![v.clone()]);
        assert!(v.iter().all(|&id| space.size(id) == 3));
    }

    #[test]
    fn random_transformations_are_reproducible_and_bounded() {
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);

        let a = random_transformations(5, 2.0, 0.5, &mut rng_a);
        let b = random_transformations(5, 2.0, 0.5, &mut rng_b);

        assert_eq!(a, b);
        assert_eq!(a[0], Isometry3::identity());
        for t in &a {
            let v = t.translation.vector;
            assert!(v.x.abs() <= 2.0 && v.y.abs() <= 2.0 && v.z.abs() <= 2.0);
            assert!(t.rotation.angle() <= 0.5 + 1e-9);
        }
    }

    #[test]
    fn transformation_states_apply_each_transform_to_the_reference() {
        let reference = Point3::new(1.0, 0.0, 0.0);
        let shift = Isometry3::translation(0.0, 2.0, 0.0);

        let table = transformation_states(&reference, &[Isometry3::identity(), shift]);

        assert_eq!(table.value(0, "x"), Some(1.0));
        assert_eq!(table.value(1, "y"), Some(2.0));
    }
}
