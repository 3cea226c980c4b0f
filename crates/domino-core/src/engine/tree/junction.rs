use super::edge::SeparatorEdge;
use super::node::CliqueNode;
use crate::core::graph::builder::{build_junction_tree, is_valid_junction_tree};
use crate::core::graph::description::JunctionTreeDescription;
use crate::core::graph::interaction::InteractionGraph;
use crate::core::graph::JunctionTreeLayout;
use crate::core::models::assignment::{Assignment, AssignmentKey};
use crate::core::models::subset::Subset;
use crate::core::models::variable::VariableRegistry;
use crate::core::scoring::Restraint;
use crate::core::space::DiscreteSpace;
use crate::core::space::configuration::Configuration;
use crate::engine::config::{ConfigError, InferenceConfig};
use crate::engine::enumeration::filters::SubsetFilterTable;
use crate::engine::enumeration::tables::{AssignmentsTable, SimpleAssignmentsTable};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{ScoredAssignment, TreeState};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, trace, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Rooted view of the tree used by one round of message passing.
struct Rooting {
    root: usize,
    /// Nodes in DFS discovery order from the root.
    preorder: Vec<usize>,
    /// `(parent, edge)` for every node except the root.
    parent: Vec<Option<(usize, usize)>>,
    /// `(child, edge)` pairs; a child is a neighbour discovered later.
    children: Vec<Vec<(usize, usize)>>,
}

/// Exact min-sum inference over a tree of cliques.
///
/// The tree moves through [`TreeState`]s: topology is fixed while `Built`,
/// [`set_sampling_space`](Self::set_sampling_space) enumerates every clique,
/// [`initialize_potentials`](Self::initialize_potentials) folds restraints in,
/// and [`infer`](Self::infer) runs collect and distribute evidence followed by
/// the reconstruction of the best complete assignments.
pub struct JunctionTree {
    config: InferenceConfig,
    nodes: Vec<CliqueNode>,
    edges: Vec<SeparatorEdge>,
    incident: Vec<Vec<usize>>,
    filters: Vec<Arc<dyn SubsetFilterTable>>,
    assignments_table: Option<Arc<dyn AssignmentsTable>>,
    space: Option<Arc<dyn DiscreteSpace>>,
    state: TreeState,
    solutions: Vec<ScoredAssignment>,
}

impl JunctionTree {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            edges: Vec::new(),
            incident: Vec::new(),
            filters: Vec::new(),
            assignments_table: None,
            space: None,
            state: TreeState::Built,
            solutions: Vec::new(),
        }
    }

    pub fn from_layout(layout: &JunctionTreeLayout, config: InferenceConfig) -> Result<Self, EngineError> {
        let mut tree = Self::new(config);
        for clique in &layout.cliques {
            tree.add_node(clique.clone())?;
        }
        for &(a, b) in &layout.edges {
            tree.add_edge(a, b)?;
        }
        Ok(tree)
    }

    pub fn from_description(
        description: &JunctionTreeDescription,
        registry: &VariableRegistry,
        config: InferenceConfig,
    ) -> Result<Self, EngineError> {
        Self::from_layout(&description.resolve(registry)?, config)
    }

    /// Reads a TOML junction tree description and resolves it against `registry`.
    pub fn load(path: &Path, registry: &VariableRegistry, config: InferenceConfig) -> Result<Self, EngineError> {
        let description = JunctionTreeDescription::load(path)?;
        Self::from_description(&description, registry, config)
    }

    /// Triangulates `graph` and builds the tree over its maximal cliques.
    pub fn build(graph: &InteractionGraph, config: InferenceConfig) -> Result<Self, EngineError> {
        let layout = build_junction_tree(graph)?;
        Self::from_layout(&layout, config)
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn state(&self) -> TreeState {
        self.state
    }

    pub fn nodes(&self) -> &[CliqueNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[SeparatorEdge] {
        &self.edges
    }

    pub fn node(&self, index: usize) -> Option<&CliqueNode> {
        self.nodes.get(index)
    }

    fn ensure_topology_open(&self) -> Result<(), EngineError> {
        if self.space.is_some() {
            return Err(EngineError::Precondition(
                "the topology is frozen once a sampling space is set; call clear() first".to_string(),
            ));
        }
        Ok(())
    }

    /// Appends a clique and returns its index.
    pub fn add_node(&mut self, subset: Subset) -> Result<usize, EngineError> {
        self.ensure_topology_open()?;
        if subset.is_empty() {
            return Err(EngineError::InvalidTopology(
                "a node must contain at least one variable".to_string(),
            ));
        }
        let index = self.nodes.len();
        self.nodes.push(CliqueNode::new(index, subset));
        self.incident.push(Vec::new());
        Ok(index)
    }

    /// Connects two existing cliques.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTopology`] for out-of-range indices, self loops,
    /// duplicate edges, edges closing a cycle, and cliques sharing no variable.
    pub fn add_edge(&mut self, a: usize, b: usize) -> Result<usize, EngineError> {
        self.ensure_topology_open()?;
        let count = self.nodes.len();
        if a >= count || b >= count {
            return Err(EngineError::InvalidTopology(format!(
                "edge {}-{} refers to a node outside 0..{}",
                a, b, count
            )));
        }
        if a == b {
            return Err(EngineError::InvalidTopology(format!("self loop on node {}", a)));
        }
        if self.incident[a].iter().any(|&e| self.edges[e].other(a) == Some(b)) {
            return Err(EngineError::InvalidTopology(format!("duplicate edge {}-{}", a, b)));
        }
        if self.connected(a, b) {
            return Err(EngineError::InvalidTopology(format!(
                "edge {}-{} would close a cycle",
                a, b
            )));
        }
        let edge = SeparatorEdge::new(&self.nodes[a], &self.nodes[b])?;
        let index = self.edges.len();
        self.edges.push(edge);
        self.incident[a].push(index);
        self.incident[b].push(index);
        Ok(index)
    }

    fn connected(&self, from: usize, to: usize) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([from]);
        seen[from] = true;
        while let Some(node) = queue.pop_front() {
            if node == to {
                return true;
            }
            for &e in &self.incident[node] {
                if let Some(next) = self.edges[e].other(node) {
                    if !seen[next] {
                        seen[next] = true;
                        queue.push_back(next);
                    }
                }
            }
        }
        false
    }

    /// Whether the topology is a single tree with the running intersection property.
    pub fn is_valid(&self) -> bool {
        let cliques: Vec<Subset> = self.nodes.iter().map(|n| n.subset().clone()).collect();
        let edges: Vec<(usize, usize)> = self.edges.iter().map(|e| (e.source(), e.target())).collect();
        is_valid_junction_tree(&cliques, &edges)
    }

    /// Adds a filter consulted by the default assignments table.
    pub fn add_filter_table(&mut self, table: Arc<dyn SubsetFilterTable>) {
        self.filters.push(table);
    }

    /// Replaces the default assignments table; filters added with
    /// [`add_filter_table`](Self::add_filter_table) are then ignored.
    pub fn set_assignments_table(&mut self, table: Arc<dyn AssignmentsTable>) {
        self.assignments_table = Some(table);
    }

    /// Enumerates every clique over `space` and registers the separator values.
    ///
    /// Assignments with no counterpart across some separator can never be part
    /// of a complete solution; they are pruned until every edge agrees on the
    /// values both endpoints carry.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Precondition`] when the tree is already inferred or empty.
    /// - [`EngineError::InvalidTopology`] when the cliques do not form a valid junction tree.
    /// - [`EngineError::Infeasible`] when some clique ends up with no assignment.
    #[instrument(skip_all, name = "set_sampling_space", fields(nodes = self.nodes.len()))]
    pub fn set_sampling_space(&mut self, space: Arc<dyn DiscreteSpace>) -> Result<(), EngineError> {
        if self.state == TreeState::Inferred {
            return Err(EngineError::Precondition(
                "the tree is already inferred; call reset() first".to_string(),
            ));
        }
        if self.nodes.is_empty() {
            return Err(EngineError::Precondition("the tree has no nodes".to_string()));
        }
        if !self.is_valid() {
            return Err(EngineError::InvalidTopology(
                "the cliques are not a connected tree with the running intersection property".to_string(),
            ));
        }

        let table: Arc<dyn AssignmentsTable> = match &self.assignments_table {
            Some(table) => table.clone(),
            None => Arc::new(SimpleAssignmentsTable::new(
                space.clone(),
                self.filters.clone(),
                self.config.max_assignments,
            )),
        };

        #[cfg(feature = "parallel")]
        self.nodes
            .par_iter_mut()
            .try_for_each(|node| node.init_sampling(table.as_ref()))?;

        #[cfg(not(feature = "parallel"))]
        self.nodes
            .iter_mut()
            .try_for_each(|node| node.init_sampling(table.as_ref()))?;

        let pruned = self.prune_inconsistent()?;
        for edge in &mut self.edges {
            let (a, b) = (edge.source(), edge.target());
            edge.init_separators(&self.nodes[a], &self.nodes[b])?;
        }

        let total: usize = self.nodes.iter().map(CliqueNode::len).sum();
        info!(assignments = total, pruned, "Sampling space set.");
        self.space = Some(space);
        self.solutions.clear();
        self.state = TreeState::SamplingSet;
        Ok(())
    }

    fn prune_inconsistent(&mut self) -> Result<usize, EngineError> {
        let mut pruned = 0;
        loop {
            let mut removed = 0;
            for edge in &self.edges {
                let (a, b) = (edge.source(), edge.target());
                let keys_a: HashSet<AssignmentKey> =
                    self.nodes[a].projection_keys(edge.separator())?.into_iter().collect();
                let keys_b: HashSet<AssignmentKey> =
                    self.nodes[b].projection_keys(edge.separator())?.into_iter().collect();
                let common: HashSet<AssignmentKey> = keys_a.intersection(&keys_b).cloned().collect();
                for node in [a, b] {
                    removed += self.nodes[node].retain_projections(edge.separator(), &common)?;
                    if self.nodes[node].is_empty() {
                        warn!(node, "Node has no assignments left after separator pruning.");
                        return Err(EngineError::Infeasible {
                            node,
                            reason: format!(
                                "no assignment agrees with its neighbours over separator {}",
                                edge.separator()
                            ),
                        });
                    }
                }
            }
            if removed == 0 {
                return Ok(pruned);
            }
            pruned += removed;
        }
    }

    fn ensure_potentials_open(&self) -> Result<&Arc<dyn DiscreteSpace>, EngineError> {
        match self.state {
            TreeState::Built => Err(EngineError::Precondition(
                "no sampling space is set; call set_sampling_space() first".to_string(),
            )),
            TreeState::Inferred => Err(EngineError::Precondition(
                "the tree is already inferred; call reset() first".to_string(),
            )),
            TreeState::SamplingSet | TreeState::PotentialsSet => self
                .space
                .as_ref()
                .ok_or_else(|| EngineError::Internal("sampling state without a space".to_string())),
        }
    }

    fn covering_node(&self, restraint: &Restraint) -> Result<usize, EngineError> {
        if restraint.variables().is_empty() {
            return Err(EngineError::Precondition(format!(
                "restraint '{}' reads no variables",
                restraint.name()
            )));
        }
        self.nodes
            .iter()
            .position(|node| node.is_part(restraint.variables()))
            .ok_or_else(|| EngineError::UncoveredRestraint {
                restraint: restraint.name().to_string(),
            })
    }

    /// Adds `weight * restraint` to the first clique containing all its variables.
    ///
    /// Repeated calls accumulate. Returns the number of oracle evaluations.
    pub fn initialize_potentials(&mut self, restraint: &Restraint, weight: f64) -> Result<usize, EngineError> {
        let space = self.ensure_potentials_open()?.clone();
        let index = self.covering_node(restraint)?;
        let evaluations = self.nodes[index].realize(restraint, space.as_ref(), weight)?;
        self.state = TreeState::PotentialsSet;
        Ok(evaluations)
    }

    /// Realizes every restraint, cliques in parallel.
    ///
    /// Reports one [`Progress::TaskIncrement`] per realized restraint.
    #[instrument(skip_all, name = "initialize_potentials", fields(restraints = restraints.len()))]
    pub fn initialize_all_potentials(
        &mut self,
        restraints: &[Restraint],
        weight: f64,
        reporter: &ProgressReporter,
    ) -> Result<usize, EngineError> {
        let space = self.ensure_potentials_open()?.clone();
        let mut groups: Vec<Vec<&Restraint>> = vec![Vec::new(); self.nodes.len()];
        for restraint in restraints {
            groups[self.covering_node(restraint)?].push(restraint);
        }

        let realize_group = |(node, group): (&mut CliqueNode, &Vec<&Restraint>)| -> Result<usize, EngineError> {
            group
                .iter()
                .map(|restraint| -> Result<usize, EngineError> {
                    let evaluations = node.realize(restraint, space.as_ref(), weight)?;
                    reporter.report(Progress::TaskIncrement);
                    Ok(evaluations)
                })
                .sum()
        };

        #[cfg(feature = "parallel")]
        let counts = self
            .nodes
            .par_iter_mut()
            .zip(groups.par_iter())
            .map(realize_group)
            .collect::<Result<Vec<usize>, EngineError>>()?;

        #[cfg(not(feature = "parallel"))]
        let counts = self
            .nodes
            .iter_mut()
            .zip(groups.iter())
            .map(realize_group)
            .collect::<Result<Vec<usize>, EngineError>>()?;

        let evaluations: usize = counts.iter().sum();
        info!(evaluations, "Potentials initialized.");
        if !restraints.is_empty() {
            self.state = TreeState::PotentialsSet;
        }
        Ok(evaluations)
    }

    fn rooting(&self) -> Result<Rooting, EngineError> {
        let root = self.config.root;
        if root >= self.nodes.len() {
            return Err(ConfigError::InvalidParameter {
                name: "root",
                reason: format!("node {} does not exist in a tree of {} nodes", root, self.nodes.len()),
            }
            .into());
        }
        let count = self.nodes.len();
        let mut discovered = vec![None; count];
        let mut preorder = Vec::with_capacity(count);
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if discovered[node].is_some() {
                continue;
            }
            discovered[node] = Some(preorder.len());
            preorder.push(node);
            for &e in self.incident[node].iter().rev() {
                if let Some(next) = self.edges[e].other(node) {
                    if discovered[next].is_none() {
                        stack.push(next);
                    }
                }
            }
        }
        if preorder.len() != count {
            return Err(EngineError::InvalidTopology(format!(
                "only {} of {} nodes are reachable from root {}",
                preorder.len(),
                count,
                root
            )));
        }

        let mut parent = vec![None; count];
        let mut children = vec![Vec::new(); count];
        for &node in &preorder {
            for &e in &self.incident[node] {
                let Some(next) = self.edges[e].other(node) else {
                    continue;
                };
                if discovered[next] > discovered[node] {
                    children[node].push((next, e));
                    parent[next] = Some((node, e));
                }
            }
        }
        Ok(Rooting {
            root,
            preorder,
            parent,
            children,
        })
    }

    /// Sends a message from node `v` to node `w` across edge `e`.
    fn update(&mut self, w: usize, v: usize, e: usize) -> Result<(), EngineError> {
        let edge = &mut self.edges[e];
        edge.min_marginalize(&self.nodes[v], w)?;
        let edge = &self.edges[e];
        self.nodes[w].update_potentials(edge.old_scores(w)?, edge.new_scores(w)?, edge.separator())?;
        trace!(from = v, to = w, "Message passed.");
        Ok(())
    }

    fn collect_evidence(&mut self, rooting: &Rooting, node: usize) -> Result<(), EngineError> {
        for &(child, e) in &rooting.children[node] {
            self.collect_evidence(rooting, child)?;
            self.update(node, child, e)?;
        }
        Ok(())
    }

    fn distribute_evidence(&mut self, rooting: &Rooting, node: usize) -> Result<(), EngineError> {
        for &(child, e) in &rooting.children[node] {
            self.update(child, node, e)?;
            self.distribute_evidence(rooting, child)?;
        }
        Ok(())
    }

    /// Extends `chosen` through the subtree below `node`, one clique at a time.
    fn distribute_minimum(&self, rooting: &Rooting, node: usize, chosen: Assignment) -> Result<Assignment, EngineError> {
        let mut chosen = chosen;
        for &(child, e) in &rooting.children[node] {
            let (separator, _) = self.edges[e].get_separator(&chosen)?;
            let candidates = self.nodes[child].min_marginalize(&separator)?;
            let merged = candidates
                .iter()
                .find_map(|candidate| chosen.combine(&candidate.assignment).ok())
                .ok_or_else(|| EngineError::Infeasible {
                    node: child,
                    reason: format!(
                        "none of the {} tied candidates for separator {} agree with the parent; \
                         re-verify the running intersection property",
                        candidates.len(),
                        separator
                    ),
                })?;
            chosen = self.distribute_minimum(rooting, child, merged)?;
        }
        Ok(chosen)
    }

    /// Runs min-sum message passing and reconstructs the best assignments.
    ///
    /// The root's `num_solutions` best assignments (ties in enumeration
    /// order) are each extended to a complete assignment.
    ///
    /// # Errors
    ///
    /// [`EngineError::Precondition`] before a sampling space is set or when
    /// the tree is already inferred; [`EngineError::Infeasible`] if the
    /// reconstruction cannot agree across a separator.
    #[instrument(skip_all, name = "infer", fields(nodes = self.nodes.len(), root = self.config.root))]
    pub fn infer(&mut self) -> Result<&[ScoredAssignment], EngineError> {
        match self.state {
            TreeState::Built => {
                return Err(EngineError::Precondition(
                    "no sampling space is set; call set_sampling_space() first".to_string(),
                ));
            }
            TreeState::Inferred => {
                return Err(EngineError::Precondition(
                    "the tree is already inferred; call reset() first".to_string(),
                ));
            }
            TreeState::SamplingSet | TreeState::PotentialsSet => {}
        }

        let rooting = self.rooting()?;
        self.collect_evidence(&rooting, rooting.root)?;
        debug!("Evidence collected.");
        self.distribute_evidence(&rooting, rooting.root)?;
        debug!("Evidence distributed.");

        let root = &self.nodes[rooting.root];
        let requested = self.config.num_solutions;
        if requested > root.len() {
            warn!(
                requested,
                available = root.len(),
                "Fewer root assignments than requested solutions."
            );
        }
        let mut solutions = Vec::with_capacity(requested.min(root.len()));
        for candidate in root.best_assignments(requested) {
            let complete = self.distribute_minimum(&rooting, rooting.root, candidate.assignment)?;
            solutions.push(ScoredAssignment::new(complete, candidate.score));
        }

        if let Some(best) = solutions.first() {
            info!(score = best.score, solutions = solutions.len(), "Inference complete.");
        }
        self.solutions = solutions;
        self.state = TreeState::Inferred;
        Ok(&self.solutions)
    }

    fn ensure_inferred(&self) -> Result<(), EngineError> {
        if self.state != TreeState::Inferred {
            return Err(EngineError::Precondition(format!(
                "results need an inferred tree, but the tree is {}",
                self.state
            )));
        }
        Ok(())
    }

    fn best(&self) -> Result<&ScoredAssignment, EngineError> {
        self.ensure_inferred()?;
        self.solutions
            .first()
            .ok_or_else(|| EngineError::Internal("an inferred tree holds no solution".to_string()))
    }

    pub fn get_minimum_assignment(&self) -> Result<&Assignment, EngineError> {
        Ok(&self.best()?.assignment)
    }

    pub fn get_minimum_score(&self) -> Result<f64, EngineError> {
        Ok(self.best()?.score)
    }

    pub fn get_solutions(&self) -> Result<&[ScoredAssignment], EngineError> {
        self.ensure_inferred()?;
        Ok(&self.solutions)
    }

    /// Every complete assignment reaching the global minimum, in canonical order.
    pub fn get_all_minimum_combinations(&self) -> Result<Vec<Assignment>, EngineError> {
        self.ensure_inferred()?;
        let rooting = self.rooting()?;
        let mut partials: Vec<Assignment> = self.nodes[rooting.root]
            .find_minimum()?
            .into_iter()
            .map(|s| s.assignment)
            .collect();

        for &node in &rooting.preorder[1..] {
            let Some((_, e)) = rooting.parent[node] else {
                continue;
            };
            let mut extended = Vec::new();
            for partial in &partials {
                let (separator, _) = self.edges[e].get_separator(partial)?;
                for candidate in self.nodes[node].min_marginalize(&separator)? {
                    if let Ok(merged) = partial.combine(&candidate.assignment) {
                        extended.push(merged);
                    }
                }
            }
            if extended.is_empty() {
                return Err(EngineError::Infeasible {
                    node,
                    reason: "no tied candidate extends the optimal partial assignments".to_string(),
                });
            }
            partials = extended;
        }
        partials.sort();
        partials.dedup();
        Ok(partials)
    }

    /// Running minimum of one clique; after inference it equals the global minimum.
    pub fn node_minimum(&self, index: usize) -> Result<f64, EngineError> {
        self.ensure_inferred()?;
        let node = self.nodes.get(index).ok_or_else(|| {
            EngineError::Precondition(format!("node {} does not exist", index))
        })?;
        node.minimum_score().ok_or_else(|| EngineError::Infeasible {
            node: index,
            reason: "the node has no assignments".to_string(),
        })
    }

    /// Total energy of a complete assignment: the sum of every clique's
    /// restraint potentials for its projection.
    pub fn get_score(&self, assignment: &Assignment) -> Result<f64, EngineError> {
        if self.state == TreeState::Built {
            return Err(EngineError::Precondition(
                "no sampling space is set; call set_sampling_space() first".to_string(),
            ));
        }
        self.nodes
            .iter()
            .map(|node| node.potential_of(assignment))
            .sum()
    }

    /// Loads `assignment` into a fresh [`Configuration`] through the sampling space.
    pub fn move_to_configuration(&self, assignment: &Assignment) -> Result<Configuration, EngineError> {
        let space = self.space.as_ref().ok_or_else(|| {
            EngineError::Precondition("no sampling space is set; call set_sampling_space() first".to_string())
        })?;
        let mut configuration = Configuration::new();
        space.load_assignment(assignment, &mut configuration)?;
        Ok(configuration)
    }

    /// Zeroes every score and forgets messages and solutions.
    ///
    /// Topology and enumerated assignments are kept.
    pub fn reset(&mut self) {
        self.nodes.iter_mut().for_each(CliqueNode::reset_scores);
        self.edges.iter_mut().for_each(SeparatorEdge::reset);
        self.solutions.clear();
        self.state = TreeState::Built;
    }

    /// Like [`reset`](Self::reset), but also drops enumerations and the space,
    /// reopening the topology for edits.
    pub fn clear(&mut self) {
        self.nodes.iter_mut().for_each(CliqueNode::clear);
        self.edges.iter_mut().for_each(SeparatorEdge::clear);
        self.solutions.clear();
        self.space = None;
        self.state = TreeState::Built;
    }
}

impl fmt::Display for JunctionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "JunctionTree ({}, {} nodes, {} edges)",
            self.state,
            self.nodes.len(),
            self.edges.len()
        )?;
        for node in &self.nodes {
            writeln!(f, "  node {}: {} ({} assignments)", node.index(), node.subset(), node.len())?;
        }
        for edge in &self.edges {
            writeln!(
                f,
                "  edge {}-{}: separator {}",
                edge.source(),
                edge.target(),
                edge.separator()
            )?;
        }
        Ok(())
    }
}
