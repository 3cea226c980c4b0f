use crate::core::graph::interaction::InteractionGraph;
use crate::core::models::variable::VariableRegistry;
use crate::core::scoring::Restraint;
use crate::core::space::DiscreteSpace;
use crate::engine::config::InferenceConfig;
use crate::engine::enumeration::filters::RestraintScoreSubsetFilterTable;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::ScoredAssignment;
use crate::engine::tree::junction::JunctionTree;
use std::sync::Arc;
use tracing::{info, instrument};

/// Shape of the junction tree an optimization ran on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSummary {
    pub nodes: usize,
    pub edges: usize,
    pub largest_clique: usize,
    pub assignments: usize,
}

#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub tree: TreeSummary,
    /// Complete assignments, best first.
    pub solutions: Vec<ScoredAssignment>,
}

#[instrument(skip_all, name = "optimization_workflow", fields(variables = registry.len(), restraints = restraints.len()))]
pub fn run(
    registry: &VariableRegistry,
    space: Arc<dyn DiscreteSpace>,
    restraints: &[Restraint],
    config: &InferenceConfig,
    reporter: &ProgressReporter,
) -> Result<OptimizationResult, EngineError> {
    config.validate()?;

    // === Phase 1: Interaction graph and junction tree ===
    reporter.report(Progress::PhaseStart { name: "Building Junction Tree" });
    let graph = InteractionGraph::from_restraints(registry.ids().iter().copied(), restraints);
    let mut tree = JunctionTree::build(&graph, config.clone())?;
    info!(
        nodes = tree.nodes().len(),
        interactions = graph.edge_count(),
        "Junction tree built."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Enumerate clique assignments ===
    reporter.report(Progress::PhaseStart { name: "Enumerating Assignments" });
    if restraints.iter().any(|r| r.maximum_score().is_some()) {
        tree.add_filter_table(Arc::new(RestraintScoreSubsetFilterTable::new(
            restraints,
            space.clone(),
        )));
    }
    tree.set_sampling_space(space)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Restraint potentials ===
    reporter.report(Progress::PhaseStart { name: "Scoring Restraints" });
    reporter.report(Progress::TaskStart {
        total_steps: restraints.len() as u64,
    });
    let evaluations = tree.initialize_all_potentials(restraints, 1.0, reporter)?;
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::Message(format!("{} restraint evaluations", evaluations)));
    reporter.report(Progress::PhaseFinish);

    // === Phase 4: Message passing ===
    reporter.report(Progress::PhaseStart { name: "Inference" });
    let mut solutions = tree.infer()?.to_vec();
    solutions.sort_by(|a, b| a.score.total_cmp(&b.score));
    for (rank, solution) in solutions.iter().enumerate() {
        reporter.report(Progress::SolutionFound {
            rank,
            score: solution.score,
        });
    }
    reporter.report(Progress::PhaseFinish);

    let summary = TreeSummary {
        nodes: tree.nodes().len(),
        edges: tree.edges().len(),
        largest_clique: tree.nodes().iter().map(|n| n.subset().len()).max().unwrap_or(0),
        assignments: tree.nodes().iter().map(|n| n.len()).sum(),
    };
    info!(
        "Workflow complete. Returning {} solution(s).",
        solutions.len()
    );
    Ok(OptimizationResult {
        tree: summary,
        solutions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::VariableId;
    use crate::core::models::subset::Subset;
    use crate::core::scoring::oracles::{DistanceOracle, TableOracle};
    use crate::core::space::states::{StateTable, VariableStatesTable};
    use crate::engine::config::InferenceConfigBuilder;
    use nalgebra::Point3;
    use std::sync::Mutex;

    fn labelled(names: &[&str], states: usize) -> (VariableRegistry, Vec<VariableId>, Arc<VariableStatesTable>) {
        let mut registry = VariableRegistry::new();
        let ids: Vec<VariableId> = names.iter().map(|n| registry.add_variable(n).unwrap()).collect();
        let mut space = VariableStatesTable::new();
        for &id in &ids {
            space.set_states(id, Arc::new(StateTable::labels(states)));
        }
        (registry, ids, Arc::new(space))
    }

    #[test]
    fn run_optimizes_a_cycle_and_reports_progress() {
        let (registry, v, space) = labelled(&["A", "B", "C", "D"], 3);
        let differ = || TableOracle::new(0.0).with_score(&[0, 0], 4.0).with_score(&[1, 1], 4.0).with_score(&[2, 2], 4.0);
        let mut restraints: Vec<Restraint> = (0..4)
            .map(|i| {
                let pair = Subset::new([v[i], v[(i + 1) % 4]]);
                Restraint::new(&format!("r{}", i), pair, Arc::new(differ()))
            })
            .collect();
        restraints.push(Restraint::new(
            "pin",
            Subset::new([v[0]]),
            Arc::new(TableOracle::new(1.0).with_score(&[2], 0.0)),
        ));
        let config = InferenceConfigBuilder::new().num_solutions(2).build().unwrap();
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|e| events.lock().unwrap().push(e)));

        let result = run(&registry, space, &restraints, &config, &reporter).unwrap();

        assert_eq!(result.tree.largest_clique, 3);
        assert_eq!(result.solutions.len(), 2);
        assert_eq!(result.solutions[0].score, 0.0);
        assert_eq!(result.solutions[0].assignment.state_of(v[0]), Some(2));
        let best = &result.solutions[0].assignment;
        for i in 0..4 {
            assert_ne!(best.state_of(v[i]), best.state_of(v[(i + 1) % 4]));
        }
        let events = events.lock().unwrap().clone();
        assert!(events.contains(&Progress::SolutionFound { rank: 0, score: 0.0 }));
        assert_eq!(
            events.iter().filter(|e| matches!(e, Progress::PhaseStart { .. })).count(),
            4
        );
        assert!(events.contains(&Progress::TaskStart { total_steps: 5 }));
        assert_eq!(
            events.iter().filter(|e| **e == Progress::TaskIncrement).count(),
            restraints.len()
        );
    }

    #[test]
    fn run_places_points_to_satisfy_distance_restraints() {
        let mut registry = VariableRegistry::new();
        let a = registry.add_variable("a").unwrap();
        let b = registry.add_variable("b").unwrap();
        let grid: Vec<Point3<f64>> = (0..5).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let mut space = VariableStatesTable::new();
        space.set_states(a, Arc::new(StateTable::from_points(&grid[..1])));
        space.set_states(b, Arc::new(StateTable::from_points(&grid)));
        let restraints = vec![
            Restraint::new("ab", Subset::new([a, b]), Arc::new(DistanceOracle::harmonic(3.0, 1.0)))
                .with_maximum_score(2.0),
        ];

        let result = run(
            &registry,
            Arc::new(space),
            &restraints,
            &InferenceConfig::default(),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(result.solutions[0].assignment.state_of(b), Some(3));
        assert_eq!(result.solutions[0].score, 0.0);
    }

    #[test]
    fn run_rejects_disconnected_problems() {
        let (registry, v, space) = labelled(&["A", "B", "C"], 2);
        let restraints = vec![Restraint::new(
            "ab",
            Subset::new([v[0], v[1]]),
            Arc::new(TableOracle::new(0.0)),
        )];

        let result = run(
            &registry,
            space,
            &restraints,
            &InferenceConfig::default(),
            &ProgressReporter::new(),
        );

        assert!(matches!(
            result,
            Err(EngineError::DisconnectedGraph { components: 2 })
        ));
    }
}
