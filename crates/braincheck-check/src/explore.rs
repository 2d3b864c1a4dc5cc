//! Parallel breadth-first construction of the reachable state graph
//!
//! Each BFS level is expanded by the rayon pool. Workers share one concurrent
//! seen-set and claim a successor with an atomic insert-if-absent, so every
//! state is owned by exactly one worker no matter how many reach it in the
//! same level. Node numbering does not depend on which worker won: the new
//! states of a level are sorted before they receive ids, so two explorations
//! of the same system always produce the same graph.

use std::hash::BuildHasherDefault;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHasher};
use tracing::{debug, info};

use crate::error::{CheckError, CheckResult};
use crate::kripke::{Successors, TransitionSystem};

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Dense node index; the initial state is node 0
pub type NodeId = usize;

/// Bounds and parallelism for [`explore`]
#[derive(Debug, Clone, Default)]
pub struct ExploreConfig {
    /// Keep at most this many nodes; later states are dropped
    pub max_states: Option<usize>,
    /// Worker threads (defaults to the global rayon pool)
    pub workers: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct GraphNode<S> {
    pub state: S,
    /// BFS distance from the initial state
    pub depth: usize,
    /// False for frontier nodes left over when the graph was truncated
    pub expanded: bool,
}

/// Reachable states and their transitions
#[derive(Debug, Clone)]
pub struct StateGraph<S> {
    nodes: Vec<GraphNode<S>>,
    successors: Vec<Vec<NodeId>>,
    index: FxHashMap<S, NodeId>,
    truncated: bool,
}

impl<S: Clone + Eq + std::hash::Hash> StateGraph<S> {
    fn with_initial(initial: S) -> Self {
        let mut graph = StateGraph {
            nodes: Vec::new(),
            successors: Vec::new(),
            index: FxHashMap::default(),
            truncated: false,
        };
        graph.push(initial, 0);
        graph
    }

    fn push(&mut self, state: S, depth: usize) -> NodeId {
        let id = self.nodes.len();
        self.index.insert(state.clone(), id);
        self.nodes.push(GraphNode {
            state,
            depth,
            expanded: false,
        });
        self.successors.push(Vec::new());
        id
    }

    pub fn initial(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &GraphNode<S> {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &GraphNode<S>)> {
        self.nodes.iter().enumerate()
    }

    pub fn find(&self, state: &S) -> Option<NodeId> {
        self.index.get(state).copied()
    }

    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        &self.successors[id]
    }

    /// All `(from, to)` pairs in node order
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.successors
            .iter()
            .enumerate()
            .flat_map(|(from, tos)| tos.iter().map(move |&to| (from, to)))
    }

    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    /// Whether `max_states` cut the exploration short
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Build the reachable state graph of `system`
pub fn explore<T>(system: &T, config: &ExploreConfig) -> CheckResult<StateGraph<T::State>>
where
    T: TransitionSystem + Sync,
    T::State: Send + Sync,
{
    match config.workers {
        Some(workers) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| CheckError::ThreadPool(e.to_string()))?;
            pool.install(|| explore_levels(system, config.max_states))
        }
        None => explore_levels(system, config.max_states),
    }
}

fn explore_levels<T>(system: &T, max_states: Option<usize>) -> CheckResult<StateGraph<T::State>>
where
    T: TransitionSystem + Sync,
    T::State: Send + Sync,
{
    let initial = system.initial_state();
    let seen: DashMap<T::State, (), FxBuildHasher> = DashMap::with_hasher(FxBuildHasher::default());
    seen.insert(initial.clone(), ());

    let mut graph = StateGraph::with_initial(initial);
    let mut frontier: Vec<NodeId> = vec![graph.initial()];
    let mut depth = 0;

    while !frontier.is_empty() {
        let level: Vec<(Successors<T::State>, Vec<T::State>)> = frontier
            .par_iter()
            .map(|&id| {
                let succs = system.successors(&graph.nodes[id].state)?;
                let mut claimed = Vec::new();
                for succ in &succs {
                    if let Entry::Vacant(slot) = seen.entry(succ.clone()) {
                        slot.insert(());
                        claimed.push(succ.clone());
                    }
                }
                Ok((succs, claimed))
            })
            .collect::<CheckResult<Vec<_>>>()?;

        let (succ_lists, claimed): (Vec<_>, Vec<_>) = level.into_iter().unzip();
        let mut fresh: Vec<T::State> = claimed.into_iter().flatten().collect();
        fresh.sort();

        if let Some(max) = max_states {
            let room = max.saturating_sub(graph.len());
            if fresh.len() > room {
                fresh.truncate(room);
                graph.truncated = true;
            }
        }

        depth += 1;
        let next_frontier: Vec<NodeId> = fresh.into_iter().map(|s| graph.push(s, depth)).collect();

        for (&id, succs) in frontier.iter().zip(succ_lists) {
            let targets = succs.iter().filter_map(|s| graph.find(s)).collect();
            graph.successors[id] = targets;
            graph.nodes[id].expanded = true;
        }

        debug!(
            depth,
            expanded = frontier.len(),
            new = next_frontier.len(),
            total = graph.len(),
            "explored level"
        );

        if graph.truncated {
            break;
        }
        frontier = next_frontier;
    }

    info!(
        states = graph.len(),
        edges = graph.edge_count(),
        truncated = graph.truncated,
        "state graph built"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kripke::Kripke;
    use crate::state::MachineState;
    use braincheck_core::{IoModel, Program};

    fn states(graph: &StateGraph<MachineState>) -> Vec<MachineState> {
        graph.nodes().map(|(_, n)| n.state.clone()).collect()
    }

    #[test]
    fn test_straight_line_program() {
        let program = Program::parse("+>+").unwrap();
        let k = Kripke::new(&program, IoModel::default());
        let graph = explore(&k, &ExploreConfig::default()).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.edges().collect::<Vec<_>>(), vec![(0, 1), (1, 2), (2, 3)]);
        assert!(graph.successors(3).is_empty());
        assert!(!graph.is_truncated());
        assert_eq!(graph.node(3).depth, 3);
    }

    #[test]
    fn test_loop_back_edge() {
        // [,] loops back to the read while the cell is non-zero
        let program = Program::parse("+[,]").unwrap();
        let k = Kripke::new(&program, IoModel::with_max_reads(1));
        let graph = explore(&k, &ExploreConfig::default()).unwrap();
        let read = graph.find(&MachineState::new(2, 0, [(0, 1)], Some(1))).unwrap();
        assert_eq!(graph.successors(read).len(), 256);
    }

    #[test]
    fn test_numbering_is_deterministic_across_worker_counts() {
        let program = Program::parse("+[,>]").unwrap();
        let k = Kripke::new(&program, IoModel::with_max_reads(2));
        let one = explore(
            &k,
            &ExploreConfig {
                workers: Some(1),
                ..ExploreConfig::default()
            },
        )
        .unwrap();
        let four = explore(
            &k,
            &ExploreConfig {
                workers: Some(4),
                ..ExploreConfig::default()
            },
        )
        .unwrap();
        assert_eq!(states(&one), states(&four));
        assert_eq!(one.edges().collect::<Vec<_>>(), four.edges().collect::<Vec<_>>());
    }

    #[test]
    fn test_each_state_appears_once() {
        let program = Program::parse(",[-]").unwrap();
        let k = Kripke::new(&program, IoModel::with_max_reads(1));
        let graph = explore(&k, &ExploreConfig::default()).unwrap();
        let mut all = states(&graph);
        let before = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), before);
    }

    #[test]
    fn test_max_states_truncates() {
        let program = Program::parse(",").unwrap();
        let k = Kripke::new(&program, IoModel::unbounded());
        let graph = explore(
            &k,
            &ExploreConfig {
                max_states: Some(10),
                workers: None,
            },
        )
        .unwrap();
        assert_eq!(graph.len(), 10);
        assert!(graph.is_truncated());
        // the kept successors are the smallest ones
        assert_eq!(graph.node(1).state.current_cell(), 0);
        assert_eq!(graph.node(9).state.current_cell(), 8);
        assert_eq!(graph.successors(0).len(), 9);
    }
}
