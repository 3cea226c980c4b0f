use crate::core::models::ids::{StateIndex, VariableId};
use crate::core::models::subset::Subset;
use crate::core::scoring::Restraint;
use crate::core::space::DiscreteSpace;
use crate::core::space::configuration::Configuration;
use crate::core::space::states::VariableStatesTable;
use crate::engine::config::ConfigError;
use crate::engine::error::EngineError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::SecondaryMap;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Accepts or rejects state vectors of one fixed subset.
pub trait SubsetFilter: Send + Sync {
    /// `states` is aligned with the subset the filter was created for.
    ///
    /// Errors from loading states or scoring restraints are returned rather
    /// than counted as a pass.
    fn is_ok(&self, states: &[StateIndex]) -> Result<bool, EngineError>;
}

/// Produces filters for subsets during enumeration.
pub trait SubsetFilterTable: Send + Sync {
    fn name(&self) -> &str;

    /// A filter for `subset`, or `None` if there is nothing left to check.
    ///
    /// Every subset in `excluded` has already been filtered, so constraints
    /// that fall entirely inside one of them need not be checked again.
    fn subset_filter(&self, subset: &Subset, excluded: &[Subset]) -> Option<Box<dyn SubsetFilter>>;

    /// Rough fraction of assignments the filter is expected to reject, in `[0, 1]`.
    fn strength(&self, subset: &Subset, excluded: &[Subset]) -> f64;
}

fn already_checked(members: &Subset, excluded: &[Subset]) -> bool {
    excluded.iter().any(|e| members.is_subset_of(e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisjointSetsRule {
    /// Members of a set take pairwise distinct states.
    Exclusion,
    /// Members of a set take identical states.
    Equality,
    /// Members of a set take non-decreasing states in variable order, which
    /// removes relabelings of interchangeable variables.
    Equivalence,
}

impl DisjointSetsRule {
    fn accepts(self, states: &[StateIndex]) -> bool {
        match self {
            DisjointSetsRule::Exclusion => {
                let mut sorted = states.to_vec();
                sorted.sort_unstable();
                sorted.windows(2).all(|w| w[0] != w[1])
            }
            DisjointSetsRule::Equality => states.windows(2).all(|w| w[0] == w[1]),
            DisjointSetsRule::Equivalence => states.windows(2).all(|w| w[0] <= w[1]),
        }
    }
}

/// Applies a [`DisjointSetsRule`] to groups of variables kept in a union-find.
#[derive(Debug, Clone)]
pub struct DisjointSetsSubsetFilterTable {
    rule: DisjointSetsRule,
    parent: HashMap<VariableId, VariableId>,
}

impl DisjointSetsSubsetFilterTable {
    pub fn new(rule: DisjointSetsRule) -> Self {
        Self {
            rule,
            parent: HashMap::new(),
        }
    }

    /// One set per pool of variables sharing a state table.
    pub fn from_space(space: &VariableStatesTable, rule: DisjointSetsRule) -> Self {
        let mut table = Self::new(rule);
        for pool in space.shared_pools() {
            table.add_set(&pool);
        }
        table
    }

    pub fn rule(&self) -> DisjointSetsRule {
        self.rule
    }

    /// Merges `variables` (and any sets they already belong to) into one set.
    pub fn add_set(&mut self, variables: &[VariableId]) {
        let Some((&first, rest)) = variables.split_first() else {
            return;
        };
        self.parent.entry(first).or_insert(first);
        for &v in rest {
            self.parent.entry(v).or_insert(v);
            let (ra, rb) = (self.find(first), self.find(v));
            if ra != rb {
                self.parent.insert(rb, ra);
            }
        }
    }

    fn find(&self, mut v: VariableId) -> VariableId {
        while let Some(&p) = self.parent.get(&v) {
            if p == v {
                break;
            }
            v = p;
        }
        v
    }

    /// Groups of members of `subset` that share a set, each with positions in `subset`.
    fn groups_in(&self, subset: &Subset) -> Vec<Vec<usize>> {
        let mut groups: Vec<(VariableId, Vec<usize>)> = Vec::new();
        for (pos, v) in subset.iter().enumerate() {
            if !self.parent.contains_key(&v) {
                continue;
            }
            let root = self.find(v);
            match groups.iter_mut().find(|(r, _)| *r == root) {
                Some((_, members)) => members.push(pos),
                None => groups.push((root, vec![pos])),
            }
        }
        groups
            .into_iter()
            .map(|(_, members)| members)
            .filter(|members| members.len() > 1)
            .collect()
    }

    fn unchecked_groups(&self, subset: &Subset, excluded: &[Subset]) -> Vec<Vec<usize>> {
        self.groups_in(subset)
            .into_iter()
            .filter(|positions| {
                let members = Subset::new(positions.iter().map(|&p| subset.as_slice()[p]));
                !already_checked(&members, excluded)
            })
            .collect()
    }
}

struct DisjointSetsFilter {
    rule: DisjointSetsRule,
    groups: Vec<Vec<usize>>,
}

impl SubsetFilter for DisjointSetsFilter {
    fn is_ok(&self, states: &[StateIndex]) -> Result<bool, EngineError> {
        Ok(self.groups.iter().all(|positions| {
            let group: Vec<StateIndex> = positions.iter().map(|&p| states[p]).collect();
            self.rule.accepts(&group)
        }))
    }
}

impl SubsetFilterTable for DisjointSetsSubsetFilterTable {
    fn name(&self) -> &str {
        match self.rule {
            DisjointSetsRule::Exclusion => "exclusion",
            DisjointSetsRule::Equality => "equality",
            DisjointSetsRule::Equivalence => "equivalence",
        }
    }

    fn subset_filter(&self, subset: &Subset, excluded: &[Subset]) -> Option<Box<dyn SubsetFilter>> {
        let groups = self.unchecked_groups(subset, excluded);
        if groups.is_empty() {
            return None;
        }
        Some(Box::new(DisjointSetsFilter {
            rule: self.rule,
            groups,
        }))
    }

    fn strength(&self, subset: &Subset, excluded: &[Subset]) -> f64 {
        let pairs: usize = self
            .unchecked_groups(subset, excluded)
            .iter()
            .map(|g| g.len() * (g.len() - 1) / 2)
            .sum();
        let per_pair = match self.rule {
            DisjointSetsRule::Exclusion => 0.1,
            DisjointSetsRule::Equality => 0.9,
            DisjointSetsRule::Equivalence => 0.5,
        };
        1.0 - (1.0f64 - per_pair).powi(pairs as i32)
    }
}

/// Per-variable masks of allowed states.
#[derive(Debug, Clone, Default)]
pub struct ListSubsetFilterTable {
    allowed: SecondaryMap<VariableId, Vec<bool>>,
}

impl ListSubsetFilterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts `variable` to `states` out of `size` candidates.
    pub fn set_allowed(&mut self, variable: VariableId, size: usize, states: &[StateIndex]) {
        let mut mask = vec![false; size];
        for &s in states {
            if let Some(slot) = mask.get_mut(s) {
                *slot = true;
            }
        }
        self.allowed.insert(variable, mask);
    }

    /// Narrows the allowed states of `variable` to those also in `states`.
    pub fn intersect(&mut self, variable: VariableId, states: &[StateIndex]) {
        if let Some(mask) = self.allowed.get_mut(variable) {
            let keep: Vec<bool> = (0..mask.len()).map(|s| mask[s] && states.contains(&s)).collect();
            *mask = keep;
        }
    }

    pub fn allowed_states(&self, variable: VariableId) -> Option<Vec<StateIndex>> {
        self.allowed
            .get(variable)
            .map(|mask| (0..mask.len()).filter(|&s| mask[s]).collect())
    }

    fn checked_positions(&self, subset: &Subset, excluded: &[Subset]) -> Vec<(usize, Vec<bool>)> {
        subset
            .iter()
            .enumerate()
            .filter(|(_, v)| !excluded.iter().any(|e| e.contains(*v)))
            .filter_map(|(pos, v)| self.allowed.get(v).map(|mask| (pos, mask.clone())))
            .collect()
    }
}

struct ListFilter {
    masks: Vec<(usize, Vec<bool>)>,
}

impl SubsetFilter for ListFilter {
    fn is_ok(&self, states: &[StateIndex]) -> Result<bool, EngineError> {
        Ok(self
            .masks
            .iter()
            .all(|(pos, mask)| mask.get(states[*pos]).copied().unwrap_or(false)))
    }
}

impl SubsetFilterTable for ListSubsetFilterTable {
    fn name(&self) -> &str {
        "allowed states"
    }

    fn subset_filter(&self, subset: &Subset, excluded: &[Subset]) -> Option<Box<dyn SubsetFilter>> {
        let masks = self.checked_positions(subset, excluded);
        if masks.is_empty() {
            return None;
        }
        Some(Box::new(ListFilter { masks }))
    }

    fn strength(&self, subset: &Subset, excluded: &[Subset]) -> f64 {
        let kept: f64 = self
            .checked_positions(subset, excluded)
            .iter()
            .map(|(_, mask)| {
                if mask.is_empty() {
                    return 0.0;
                }
                mask.iter().filter(|&&b| b).count() as f64 / mask.len() as f64
            })
            .product();
        1.0 - kept
    }
}

fn score_on(
    restraint: &Restraint,
    positions: &[usize],
    states: &[StateIndex],
    space: &dyn DiscreteSpace,
    configuration: &mut Configuration,
) -> Result<f64, EngineError> {
    for (&pos, v) in positions.iter().zip(restraint.variables().iter()) {
        space.load_state(v, states[pos], configuration)?;
    }
    Ok(restraint.evaluate(configuration)?)
}

/// Restraints carrying a maximum score whose variables all lie in `subset`.
fn bounded_in(restraints: &[Restraint], subset: &Subset) -> Vec<(Restraint, Vec<usize>)> {
    restraints
        .iter()
        .filter_map(|r| subset.positions_of(r.variables()).map(|pos| (r.clone(), pos)))
        .collect()
}

fn with_maximum(restraints: &[Restraint]) -> Vec<Restraint> {
    restraints
        .iter()
        .filter(|r| r.maximum_score().is_some())
        .cloned()
        .collect()
}

/// Rejects sub-assignments on which a restraint scores above its maximum.
pub struct RestraintScoreSubsetFilterTable {
    restraints: Vec<Restraint>,
    space: Arc<dyn DiscreteSpace>,
}

impl RestraintScoreSubsetFilterTable {
    /// Only restraints carrying a maximum score take part.
    pub fn new(restraints: &[Restraint], space: Arc<dyn DiscreteSpace>) -> Self {
        Self {
            restraints: with_maximum(restraints),
            space,
        }
    }

    fn applicable(&self, subset: &Subset, excluded: &[Subset]) -> Vec<(Restraint, Vec<usize>)> {
        bounded_in(&self.restraints, subset)
            .into_iter()
            .filter(|(r, _)| !already_checked(r.variables(), excluded))
            .collect()
    }
}

struct RestraintScoreFilter {
    checks: Vec<(Restraint, Vec<usize>)>,
    space: Arc<dyn DiscreteSpace>,
}

impl SubsetFilter for RestraintScoreFilter {
    fn is_ok(&self, states: &[StateIndex]) -> Result<bool, EngineError> {
        let mut configuration = Configuration::new();
        for (restraint, positions) in &self.checks {
            let Some(maximum) = restraint.maximum_score() else {
                continue;
            };
            let score = score_on(restraint, positions, states, self.space.as_ref(), &mut configuration)?;
            if score > maximum {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl SubsetFilterTable for RestraintScoreSubsetFilterTable {
    fn name(&self) -> &str {
        "restraint score"
    }

    fn subset_filter(&self, subset: &Subset, excluded: &[Subset]) -> Option<Box<dyn SubsetFilter>> {
        let checks = self.applicable(subset, excluded);
        if checks.is_empty() {
            return None;
        }
        Some(Box::new(RestraintScoreFilter {
            checks,
            space: Arc::clone(&self.space),
        }))
    }

    fn strength(&self, subset: &Subset, excluded: &[Subset]) -> f64 {
        1.0 - 0.5f64.powi(self.applicable(subset, excluded).len() as i32)
    }
}

/// Tolerates up to `max_violated` restraints above their maximum score.
///
/// Every bounded restraint inside the subset is counted, including those an
/// excluded subset already saw, since violations add up across the merge.
pub struct MinimumRestraintScoreSubsetFilterTable {
    restraints: Vec<Restraint>,
    space: Arc<dyn DiscreteSpace>,
    max_violated: usize,
}

impl MinimumRestraintScoreSubsetFilterTable {
    pub fn new(restraints: &[Restraint], space: Arc<dyn DiscreteSpace>, max_violated: usize) -> Self {
        Self {
            restraints: with_maximum(restraints),
            space,
            max_violated,
        }
    }

    pub fn maximum_violations(&self) -> usize {
        self.max_violated
    }
}

struct MinimumRestraintScoreFilter {
    checks: Vec<(Restraint, Vec<usize>)>,
    space: Arc<dyn DiscreteSpace>,
    max_violated: usize,
}

impl SubsetFilter for MinimumRestraintScoreFilter {
    fn is_ok(&self, states: &[StateIndex]) -> Result<bool, EngineError> {
        let mut configuration = Configuration::new();
        let mut violated = 0;
        for (restraint, positions) in &self.checks {
            let Some(maximum) = restraint.maximum_score() else {
                continue;
            };
            if score_on(restraint, positions, states, self.space.as_ref(), &mut configuration)? > maximum {
                violated += 1;
                if violated > self.max_violated {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

impl SubsetFilterTable for MinimumRestraintScoreSubsetFilterTable {
    fn name(&self) -> &str {
        "minimum restraint score"
    }

    fn subset_filter(&self, subset: &Subset, _excluded: &[Subset]) -> Option<Box<dyn SubsetFilter>> {
        let checks = bounded_in(&self.restraints, subset);
        if checks.len() <= self.max_violated {
            return None;
        }
        Some(Box::new(MinimumRestraintScoreFilter {
            checks,
            space: Arc::clone(&self.space),
            max_violated: self.max_violated,
        }))
    }

    fn strength(&self, subset: &Subset, _excluded: &[Subset]) -> f64 {
        let count = bounded_in(&self.restraints, subset).len();
        if count <= self.max_violated {
            return 0.0;
        }
        1.0 - 0.5f64.powi((count - self.max_violated) as i32)
    }
}

type StatePairs = HashSet<(StateIndex, StateIndex)>;

/// Explicit lists of allowed state pairs for pairs of variables.
///
/// Single variables are not restricted; pair them with a
/// [`ListSubsetFilterTable`] when their own states need narrowing.
#[derive(Debug, Clone, Default)]
pub struct PairListSubsetFilterTable {
    allowed: HashMap<(VariableId, VariableId), StatePairs>,
}

impl PairListSubsetFilterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `states` to the allowed pairs of `(a, b)`, `states[i].0` being the state of `a`.
    pub fn set_allowed_states(&mut self, a: VariableId, b: VariableId, states: &[(StateIndex, StateIndex)]) {
        let (key, flipped) = if a <= b { ((a, b), false) } else { ((b, a), true) };
        let entry = self.allowed.entry(key).or_default();
        entry.extend(
            states
                .iter()
                .map(|&(sa, sb)| if flipped { (sb, sa) } else { (sa, sb) }),
        );
    }

    fn checked_pairs(&self, subset: &Subset, excluded: &[Subset]) -> Vec<(usize, usize, StatePairs)> {
        let mut pairs: Vec<_> = self
            .allowed
            .iter()
            .filter(|((a, b), _)| !already_checked(&Subset::new([*a, *b]), excluded))
            .filter_map(|(&(a, b), allowed)| {
                let pa = subset.position(a)?;
                let pb = subset.position(b)?;
                Some((pa, pb, allowed.clone()))
            })
            .collect();
        pairs.sort_by_key(|(pa, pb, _)| (*pa, *pb));
        pairs
    }
}

struct PairListFilter {
    pairs: Vec<(usize, usize, StatePairs)>,
}

impl SubsetFilter for PairListFilter {
    fn is_ok(&self, states: &[StateIndex]) -> Result<bool, EngineError> {
        Ok(self
            .pairs
            .iter()
            .all(|(pa, pb, allowed)| allowed.contains(&(states[*pa], states[*pb]))))
    }
}

impl SubsetFilterTable for PairListSubsetFilterTable {
    fn name(&self) -> &str {
        "allowed pairs"
    }

    fn subset_filter(&self, subset: &Subset, excluded: &[Subset]) -> Option<Box<dyn SubsetFilter>> {
        let pairs = self.checked_pairs(subset, excluded);
        if pairs.is_empty() {
            return None;
        }
        Some(Box::new(PairListFilter { pairs }))
    }

    fn strength(&self, subset: &Subset, excluded: &[Subset]) -> f64 {
        1.0 - 0.5f64.powi(self.checked_pairs(subset, excluded).len() as i32)
    }
}

/// Keeps each assignment with probability `p`.
///
/// The decision for an assignment depends only on the seed, the subset and
/// its states, so enumeration order and parallelism do not change the outcome.
#[derive(Debug, Clone)]
pub struct ProbabilisticSubsetFilterTable {
    p: f64,
    seed: u64,
    leaves_only: bool,
}

impl ProbabilisticSubsetFilterTable {
    /// # Errors
    ///
    /// [`ConfigError::InvalidParameter`] unless `p` lies in `[0, 1]`.
    pub fn new(p: f64, seed: u64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::InvalidParameter {
                name: "p",
                reason: format!("keep probability {} is outside [0, 1]", p),
            });
        }
        Ok(Self {
            p,
            seed,
            leaves_only: false,
        })
    }

    /// Only filter subsets enumerated from scratch, never merges of smaller ones.
    pub fn leaves_only(mut self, leaves_only: bool) -> Self {
        self.leaves_only = leaves_only;
        self
    }

    fn skips(&self, excluded: &[Subset]) -> bool {
        self.p >= 1.0 || (self.leaves_only && !excluded.is_empty())
    }
}

struct ProbabilisticFilter {
    p: f64,
    seed: u64,
}

impl SubsetFilter for ProbabilisticFilter {
    fn is_ok(&self, states: &[StateIndex]) -> Result<bool, EngineError> {
        let mut hasher = DefaultHasher::new();
        states.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(self.seed ^ hasher.finish());
        Ok(rng.gen_bool(self.p))
    }
}

impl SubsetFilterTable for ProbabilisticSubsetFilterTable {
    fn name(&self) -> &str {
        "probabilistic"
    }

    fn subset_filter(&self, subset: &Subset, excluded: &[Subset]) -> Option<Box<dyn SubsetFilter>> {
        if self.skips(excluded) {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        subset.as_slice().hash(&mut hasher);
        Some(Box::new(ProbabilisticFilter {
            p: self.p,
            seed: self.seed ^ hasher.finish(),
        }))
    }

    fn strength(&self, _subset: &Subset, excluded: &[Subset]) -> f64 {
        if self.skips(excluded) { 0.0 } else { 1.0 - self.p }
    }
}
