use super::interaction::InteractionGraph;
use super::{GraphError, JunctionTreeLayout};
use crate::core::models::ids::VariableId;
use crate::core::models::subset::Subset;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, instrument};

/// Builds a junction tree for a connected interaction graph.
///
/// The graph is triangulated by repeatedly eliminating a minimum-degree
/// vertex (ties go to the smallest id) and connecting its remaining
/// neighbors. The elimination cliques that are not contained in another one
/// are the maximal cliques of the chordal completion. They are linked by a
/// maximum spanning tree over separator sizes, which yields the running
/// intersection property.
///
/// # Errors
///
/// * [`GraphError::Empty`] if the graph has no variables.
/// * [`GraphError::Disconnected`] if it has more than one connected component.
#[instrument(skip_all, name = "junction_tree_builder", fields(variables = graph.variable_count()))]
pub fn build_junction_tree(graph: &InteractionGraph) -> Result<JunctionTreeLayout, GraphError> {
    if graph.is_empty() {
        return Err(GraphError::Empty);
    }
    let components = graph.connected_components().len();
    if components > 1 {
        return Err(GraphError::Disconnected { components });
    }

    let cliques = maximal_cliques(triangulate(graph));
    let edges = maximum_spanning_tree(&cliques);

    debug!(
        cliques = cliques.len(),
        widest = cliques.iter().map(Subset::len).max().unwrap_or(0),
        "Junction tree layout built."
    );
    Ok(JunctionTreeLayout { cliques, edges })
}

fn triangulate(graph: &InteractionGraph) -> Vec<Subset> {
    let mut adjacency: BTreeMap<VariableId, BTreeSet<VariableId>> = graph.adjacency().clone();
    let mut elimination_cliques = Vec::with_capacity(adjacency.len());

    while let Some(v) = adjacency
        .iter()
        .min_by_key(|(id, neighbors)| (neighbors.len(), **id))
        .map(|(id, _)| *id)
    {
        let neighbors = adjacency.remove(&v).unwrap_or_default();
        for &a in &neighbors {
            if let Some(set) = adjacency.get_mut(&a) {
                set.remove(&v);
                set.extend(neighbors.iter().copied().filter(|&b| b != a));
            }
        }
        elimination_cliques.push(Subset::new(std::iter::once(v).chain(neighbors)));
    }
    elimination_cliques
}

fn maximal_cliques(candidates: Vec<Subset>) -> Vec<Subset> {
    let mut maximal: Vec<Subset> = Vec::new();
    for (i, clique) in candidates.iter().enumerate() {
        let dominated = candidates.iter().enumerate().any(|(j, other)| {
            i != j
                && clique.is_subset_of(other)
                && (clique.len() < other.len() || j < i)
        });
        if !dominated {
            maximal.push(clique.clone());
        }
    }
    maximal
}

/// Kruskal over all clique pairs with a non-empty intersection, heaviest first.
fn maximum_spanning_tree(cliques: &[Subset]) -> Vec<(usize, usize)> {
    let mut candidates = Vec::new();
    for i in 0..cliques.len() {
        for j in (i + 1)..cliques.len() {
            let weight = cliques[i].intersection(&cliques[j]).len();
            if weight > 0 {
                candidates.push((weight, i, j));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then((a.1, a.2).cmp(&(b.1, b.2))));

    let mut parent: Vec<usize> = (0..cliques.len()).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut edges = Vec::with_capacity(cliques.len().saturating_sub(1));
    for (_, i, j) in candidates {
        let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
        if ri != rj {
            parent[ri] = rj;
            edges.push((i, j));
        }
    }
    edges
}

/// Checks that `edges` form a tree over `cliques` with the running intersection property.
///
/// For every variable, the cliques containing it must induce a connected subtree.
pub fn is_valid_junction_tree(cliques: &[Subset], edges: &[(usize, usize)]) -> bool {
    let n = cliques.len();
    if n == 0 {
        return edges.is_empty();
    }
    if edges.len() != n - 1 {
        return false;
    }
    let mut adjacency = vec![Vec::new(); n];
    for &(a, b) in edges {
        if a >= n || b >= n || a == b {
            return false;
        }
        adjacency[a].push(b);
        adjacency[b].push(a);
    }
    if reachable(&adjacency, 0, |_| true).len() != n {
        return false;
    }

    let variables: BTreeSet<VariableId> = cliques.iter().flat_map(Subset::iter).collect();
    variables.into_iter().all(|v| {
        let holders: Vec<usize> = (0..n).filter(|&i| cliques[i].contains(v)).collect();
        let reached = reachable(&adjacency, holders[0], |i| cliques[i].contains(v));
        reached.len() == holders.len()
    })
}

fn reachable(adjacency: &[Vec<usize>], start: usize, allowed: impl Fn(usize) -> bool) -> BTreeSet<usize> {
    let mut seen = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(i) = queue.pop_front() {
        for &j in &adjacency[i] {
            if allowed(j) && seen.insert(j) {
                queue.push_back(j);
            }
        }
    }
    seen
}
