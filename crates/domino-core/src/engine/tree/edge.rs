use super::node::CliqueNode;
use crate::core::models::assignment::{Assignment, AssignmentKey};
use crate::core::models::subset::Subset;
use crate::engine::error::EngineError;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
struct MessageTables {
    old: HashMap<AssignmentKey, f64>,
    new: HashMap<AssignmentKey, f64>,
}

/// The separator between two adjacent cliques.
///
/// Holds one shared potential over the separator's assignments. Every message
/// replaces it with the sender's min-marginal and remembers, for the receiving
/// endpoint, the value it replaced, so the receiver can absorb the difference
/// without counting a restraint twice.
#[derive(Debug, Clone)]
pub struct SeparatorEdge {
    source: usize,
    target: usize,
    separator: Subset,
    keys: Vec<AssignmentKey>,
    current: HashMap<AssignmentKey, f64>,
    tables: [MessageTables; 2],
}

impl SeparatorEdge {
    /// # Errors
    ///
    /// [`EngineError::InvalidTopology`] when the cliques share no variable.
    pub fn new(a: &CliqueNode, b: &CliqueNode) -> Result<Self, EngineError> {
        let separator = a.intersection(b);
        if separator.is_empty() {
            return Err(EngineError::InvalidTopology(format!(
                "nodes {} and {} share no variables and cannot be joined",
                a.index(),
                b.index()
            )));
        }
        let (source, target) = if a.index() < b.index() {
            (a.index(), b.index())
        } else {
            (b.index(), a.index())
        };
        Ok(Self {
            source,
            target,
            separator,
            keys: Vec::new(),
            current: HashMap::new(),
            tables: [MessageTables::default(), MessageTables::default()],
        })
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn separator(&self) -> &Subset {
        &self.separator
    }

    /// Number of registered separator assignments.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The endpoint opposite `node`.
    pub fn other(&self, node: usize) -> Option<usize> {
        if node == self.source {
            Some(self.target)
        } else if node == self.target {
            Some(self.source)
        } else {
            None
        }
    }

    fn side(&self, node: usize) -> Result<usize, EngineError> {
        if node == self.source {
            Ok(0)
        } else if node == self.target {
            Ok(1)
        } else {
            Err(EngineError::Internal(format!(
                "node {} is not an endpoint of edge {}-{}",
                node, self.source, self.target
            )))
        }
    }

    /// Registers every separator assignment either endpoint enumerates.
    ///
    /// Keys are kept in canonical order and every score starts at zero.
    pub fn init_separators(&mut self, a: &CliqueNode, b: &CliqueNode) -> Result<(), EngineError> {
        let mut keys = BTreeSet::new();
        keys.extend(a.projection_keys(&self.separator)?);
        keys.extend(b.projection_keys(&self.separator)?);
        self.keys = keys.into_iter().collect();
        self.reset();
        Ok(())
    }

    /// Sends the min-marginal of `from` over the separator toward node `to`.
    ///
    /// Afterwards [`old_scores`](Self::old_scores) and
    /// [`new_scores`](Self::new_scores) for `to` hold the separator potential
    /// before and after the message.
    pub fn min_marginalize(&mut self, from: &CliqueNode, to: usize) -> Result<(), EngineError> {
        let receiving = self.side(to)?;
        if self.side(from.index())? == receiving {
            return Err(EngineError::Internal(format!(
                "node {} cannot send a message to itself",
                to
            )));
        }
        let marginals = from.min_marginals(&self.separator)?;
        let replaced = std::mem::replace(&mut self.current, marginals.clone());
        self.tables[receiving] = MessageTables {
            old: replaced,
            new: marginals,
        };
        Ok(())
    }

    pub fn old_scores(&self, node: usize) -> Result<&HashMap<AssignmentKey, f64>, EngineError> {
        Ok(&self.tables[self.side(node)?].old)
    }

    pub fn new_scores(&self, node: usize) -> Result<&HashMap<AssignmentKey, f64>, EngineError> {
        Ok(&self.tables[self.side(node)?].new)
    }

    /// The separator value `assignment` induces, with its current score.
    ///
    /// # Errors
    ///
    /// [`EngineError::Lookup`] if `assignment` misses a separator variable or
    /// projects onto a value this edge never registered.
    pub fn get_separator(&self, assignment: &Assignment) -> Result<(Assignment, f64), EngineError> {
        let projected = assignment.project(&self.separator).map_err(|_| EngineError::Lookup {
            location: format!("separator {} of edge {}-{}", self.separator, self.source, self.target),
            key: assignment.to_string(),
        })?;
        let key = projected.canonical_key();
        if self.keys.binary_search(&key).is_err() {
            return Err(EngineError::Lookup {
                location: format!("separator {} of edge {}-{}", self.separator, self.source, self.target),
                key: projected.to_string(),
            });
        }
        let score = self.current.get(&key).copied().unwrap_or(0.0);
        Ok((projected, score))
    }

    /// Zeroes the separator potential and forgets past messages.
    pub fn reset(&mut self) {
        self.current = self.keys.iter().map(|k| (k.clone(), 0.0)).collect();
        self.tables = [MessageTables::default(), MessageTables::default()];
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::VariableId;
    use crate::core::scoring::Restraint;
    use crate::core::scoring::oracles::TableOracle;
    use crate::core::space::states::{StateTable, VariableStatesTable};
    use crate::engine::enumeration::tables::SimpleAssignmentsTable;
    use slotmap::SlotMap;
    use std::sync::Arc;

    fn fixture() -> (Vec<VariableId>, Arc<VariableStatesTable>, CliqueNode, CliqueNode) {
        let mut map: SlotMap<VariableId, ()> = SlotMap::with_key();
        let v: Vec<VariableId> = (0..3).map(|_| map.insert(())).collect();
        let mut space = VariableStatesTable::new();
        for &id in &v {
            space.set_states(id, Arc::new(StateTable::labels(2)));
        }
        let space = Arc::new(space);
        let table = SimpleAssignmentsTable::new(space.clone(), vec![], usize::MAX);
        let mut ab = CliqueNode::new(0, Subset::new([v[0], v[1]]));
        let mut bc = CliqueNode::new(1, Subset::new([v[1], v[2]]));
        ab.init_sampling(&table).unwrap();
        bc.init_sampling(&table).unwrap();
        (v, space, ab, bc)
    }

    #[test]
    fn new_rejects_cliques_without_shared_variables() {
        let mut map: SlotMap<VariableId, ()> = SlotMap::with_key();
        let a = CliqueNode::new(0, Subset::new([map.insert(())]));
        let b = CliqueNode::new(1, Subset::new([map.insert(())]));

        assert!(matches!(
            SeparatorEdge::new(&a, &b),
            Err(EngineError::InvalidTopology(_))
        ));
    }

    #[test]
    fn endpoints_are_ordered_and_separator_is_the_intersection() {
        let (v, _, ab, bc) = fixture();
        let mut edge = SeparatorEdge::new(&bc, &ab).unwrap();
        edge.init_separators(&ab, &bc).unwrap();

        assert_eq!((edge.source(), edge.target()), (0, 1));
        assert_eq!(edge.separator(), &Subset::new([v[1]]));
        assert_eq!(edge.len(), 2);
        assert_eq!(edge.other(0), Some(1));
        assert_eq!(edge.other(5), None);
    }

    #[test]
    fn min_marginalize_records_old_and_new_tables_for_the_receiver() {
        let (v, space, mut ab, bc) = fixture();
        let oracle = TableOracle::new(4.0).with_score(&[1, 1], 1.0).with_score(&[0, 0], 2.0);
        let restraint = Restraint::new("ab", Subset::new([v[0], v[1]]), Arc::new(oracle));
        ab.realize(&restraint, space.as_ref(), 1.0).unwrap();
        let mut edge = SeparatorEdge::new(&ab, &bc).unwrap();
        edge.init_separators(&ab, &bc).unwrap();

        edge.min_marginalize(&ab, 1).unwrap();

        let b0 = Assignment::new(&[v[1]], &[0]).unwrap().canonical_key();
        let b1 = Assignment::new(&[v[1]], &[1]).unwrap().canonical_key();
        assert_eq!(edge.old_scores(1).unwrap()[&b0], 0.0);
        assert_eq!(edge.new_scores(1).unwrap()[&b0], 2.0);
        assert_eq!(edge.new_scores(1).unwrap()[&b1], 1.0);
        assert!(edge.new_scores(0).unwrap().is_empty());

        let full = Assignment::new(&v, &[0, 1, 1]).unwrap();
        let (value, score) = edge.get_separator(&full).unwrap();
        assert_eq!(value.states(), vec![1]);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn get_separator_reports_missing_variables_and_unknown_values() {
        let (v, _, ab, bc) = fixture();
        let mut edge = SeparatorEdge::new(&ab, &bc).unwrap();
        edge.init_separators(&ab, &bc).unwrap();

        let missing = Assignment::new(&[v[0], v[2]], &[0, 0]).unwrap();
        let unknown = Assignment::new(&[v[1]], &[9]).unwrap();

        assert!(matches!(edge.get_separator(&missing), Err(EngineError::Lookup { .. })));
        assert!(matches!(edge.get_separator(&unknown), Err(EngineError::Lookup { .. })));
    }

    #[test]
    fn reset_forgets_messages() {
        let (_, _, ab, bc) = fixture();
        let mut edge = SeparatorEdge::new(&ab, &bc).unwrap();
        edge.init_separators(&ab, &bc).unwrap();
        edge.min_marginalize(&ab, 1).unwrap();

        edge.reset();

        assert!(edge.old_scores(1).unwrap().is_empty());
        assert_eq!(edge.len(), 2);
    }
}
