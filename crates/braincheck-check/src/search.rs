//! Lasso search for paths that avoid a label forever
//!
//! The engine answers "does every execution reach the target?" by looking for
//! a witness that one does not. Depth-first search runs over the states that
//! do not satisfy the target: target states are never entered, so every path
//! the search builds avoids the label. A witness is either
//!
//! - a back edge to a state still on the DFS stack, which closes a cycle
//!   the execution can repeat forever, or
//! - a newly reached state with no successors at all (the program halted or
//!   a read blocked), which ends the execution without the label.
//!
//! If neither exists, every path runs into the target. States are expanded at
//! most once; a state whose subtree is finished is closed and never revisited,
//! which keeps the search linear in the reachable non-target states.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::CheckResult;
use crate::kripke::{Successors, TransitionSystem};

/// Time and cancellation are polled once every this many loop iterations
const POLL_INTERVAL: u64 = 256;

/// Bounds on a search. Unset fields are unbounded.
#[derive(Debug, Clone, Default)]
pub struct SearchLimits {
    /// Stop after this many distinct states have been discovered
    pub max_states: Option<usize>,
    /// Stop once this much wall-clock time has elapsed
    pub time_limit: Option<Duration>,
    /// Stop as soon as the flag is raised
    pub cancel: Option<Arc<AtomicBool>>,
}

impl SearchLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_states(mut self, max_states: usize) -> Self {
        self.max_states = Some(max_states);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// Why a search stopped without a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    StateLimit { limit: usize },
    TimeLimit { limit: Duration },
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::StateLimit { limit } => write!(f, "state limit of {} reached", limit),
            StopReason::TimeLimit { limit } => write!(f, "time limit of {:?} reached", limit),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How a counterexample path ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LassoKind {
    /// The last cycle state leads back to the first one
    Cycle,
    /// The single cycle state has no successors
    DeadEnd,
}

/// A path `prefix · cycle` from the initial state that never satisfies the
/// target. For [`LassoKind::Cycle`] the cycle repeats forever; for
/// [`LassoKind::DeadEnd`] it holds exactly one state, where execution stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lasso<S> {
    pub prefix: Vec<S>,
    pub cycle: Vec<S>,
    pub kind: LassoKind,
}

impl<S> Lasso<S> {
    /// Every state on the lasso, prefix first
    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.prefix.iter().chain(self.cycle.iter())
    }

    pub fn len(&self) -> usize {
        self.prefix.len() + self.cycle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Verdict of a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome<S> {
    /// Every execution eventually reaches the target
    LabelUnavoidable,
    /// Some execution avoids the target forever
    Counterexample(Lasso<S>),
    /// A limit stopped the search first
    Incomplete(StopReason),
}

impl<S> SearchOutcome<S> {
    pub fn is_unavoidable(&self) -> bool {
        matches!(self, SearchOutcome::LabelUnavoidable)
    }

    pub fn counterexample(&self) -> Option<&Lasso<S>> {
        match self {
            SearchOutcome::Counterexample(lasso) => Some(lasso),
            _ => None,
        }
    }
}

/// Counters for one search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// States whose successors were computed
    pub states_expanded: usize,
    /// Distinct states discovered
    pub states_visited: usize,
    /// Deepest DFS stack seen
    pub max_depth: usize,
    pub elapsed: Duration,
}

/// Outcome plus the counters that produced it
#[derive(Debug, Clone)]
pub struct SearchResult<S> {
    pub outcome: SearchOutcome<S>,
    pub stats: SearchStats,
}

/// Where the engine is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    /// Not finished
    Exploring,
    /// A counterexample was found
    Found,
    /// The space was exhausted without a counterexample
    Exhausted,
    /// A limit ended the search
    Stopped,
}

struct Frame<S> {
    state: S,
    pending: smallvec::IntoIter<[S; 1]>,
}

/// Depth-first lasso search over a [`TransitionSystem`]
pub struct SearchEngine<'a, T: TransitionSystem, P> {
    system: &'a T,
    is_target: P,
    limits: SearchLimits,
    progress_interval: usize,
    phase: SearchPhase,
    stats: SearchStats,
}

impl<'a, T, P> SearchEngine<'a, T, P>
where
    T: TransitionSystem,
    P: Fn(&T::State) -> bool,
{
    pub fn new(system: &'a T, is_target: P) -> Self {
        SearchEngine {
            system,
            is_target,
            limits: SearchLimits::default(),
            progress_interval: 0,
            phase: SearchPhase::Exploring,
            stats: SearchStats::default(),
        }
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Log progress every `interval` expansions (0 disables)
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Run the search to a verdict
    pub fn run(&mut self) -> CheckResult<SearchResult<T::State>> {
        let start = Instant::now();
        self.phase = SearchPhase::Exploring;
        self.stats = SearchStats::default();

        let outcome = self.search(start);
        self.stats.elapsed = start.elapsed();

        let outcome = outcome?;
        self.phase = match &outcome {
            SearchOutcome::LabelUnavoidable => SearchPhase::Exhausted,
            SearchOutcome::Counterexample(_) => SearchPhase::Found,
            SearchOutcome::Incomplete(_) => SearchPhase::Stopped,
        };

        match &outcome {
            SearchOutcome::LabelUnavoidable => info!(
                states = self.stats.states_visited,
                elapsed_ms = self.stats.elapsed.as_millis() as u64,
                "search exhausted; label unavoidable"
            ),
            SearchOutcome::Counterexample(lasso) => info!(
                states = self.stats.states_visited,
                prefix = lasso.prefix.len(),
                cycle = lasso.cycle.len(),
                kind = ?lasso.kind,
                "counterexample found"
            ),
            SearchOutcome::Incomplete(reason) => warn!(
                states = self.stats.states_visited,
                %reason,
                "search stopped before a verdict"
            ),
        }

        Ok(SearchResult {
            outcome,
            stats: self.stats,
        })
    }

    fn search(&mut self, start: Instant) -> CheckResult<SearchOutcome<T::State>> {
        let initial = self.system.initial_state();
        self.stats.states_visited = 1;

        if (self.is_target)(&initial) {
            debug!("initial state satisfies the target");
            return Ok(SearchOutcome::LabelUnavoidable);
        }

        let mut stack: Vec<Frame<T::State>> = Vec::new();
        // state -> its index in `stack`
        let mut on_stack: FxHashMap<T::State, usize> = FxHashMap::default();
        let mut closed: FxHashSet<T::State> = FxHashSet::default();

        let successors = self.expand(&initial)?;
        if successors.is_empty() {
            return Ok(dead_end(&stack, initial));
        }
        on_stack.insert(initial.clone(), 0);
        stack.push(Frame {
            state: initial,
            pending: successors.into_iter(),
        });
        self.stats.max_depth = 1;

        let mut iterations: u64 = 0;
        loop {
            if let Some(reason) = self.check_limits(start, iterations) {
                return Ok(SearchOutcome::Incomplete(reason));
            }
            iterations += 1;

            let Some(frame) = stack.last_mut() else {
                break;
            };

            let Some(next) = frame.pending.next() else {
                if let Some(done) = stack.pop() {
                    on_stack.remove(&done.state);
                    closed.insert(done.state);
                }
                continue;
            };

            if (self.is_target)(&next) {
                continue;
            }

            if let Some(&index) = on_stack.get(&next) {
                let prefix = stack[..index].iter().map(|f| f.state.clone()).collect();
                let cycle = stack[index..].iter().map(|f| f.state.clone()).collect();
                return Ok(SearchOutcome::Counterexample(Lasso {
                    prefix,
                    cycle,
                    kind: LassoKind::Cycle,
                }));
            }

            if closed.contains(&next) {
                continue;
            }

            if let Some(limit) = self.limits.max_states {
                if self.stats.states_visited >= limit {
                    return Ok(SearchOutcome::Incomplete(StopReason::StateLimit { limit }));
                }
            }
            self.stats.states_visited += 1;

            let successors = self.expand(&next)?;
            if successors.is_empty() {
                return Ok(dead_end(&stack, next));
            }

            on_stack.insert(next.clone(), stack.len());
            stack.push(Frame {
                state: next,
                pending: successors.into_iter(),
            });
            self.stats.max_depth = self.stats.max_depth.max(stack.len());
        }

        Ok(SearchOutcome::LabelUnavoidable)
    }

    fn expand(&mut self, state: &T::State) -> CheckResult<Successors<T::State>> {
        let successors = self.system.successors(state)?;
        self.stats.states_expanded += 1;
        if self.progress_interval > 0 && self.stats.states_expanded % self.progress_interval == 0 {
            info!(
                expanded = self.stats.states_expanded,
                visited = self.stats.states_visited,
                max_depth = self.stats.max_depth,
                "search progress"
            );
        }
        Ok(successors)
    }

    fn check_limits(&self, start: Instant, iterations: u64) -> Option<StopReason> {
        if iterations % POLL_INTERVAL != 0 {
            return None;
        }
        if let Some(flag) = &self.limits.cancel {
            if flag.load(Ordering::Relaxed) {
                return Some(StopReason::Cancelled);
            }
        }
        if let Some(limit) = self.limits.time_limit {
            if start.elapsed() >= limit {
                return Some(StopReason::TimeLimit { limit });
            }
        }
        None
    }
}

fn dead_end<S: Clone>(stack: &[Frame<S>], state: S) -> SearchOutcome<S> {
    SearchOutcome::Counterexample(Lasso {
        prefix: stack.iter().map(|f| f.state.clone()).collect(),
        cycle: vec![state],
        kind: LassoKind::DeadEnd,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::CheckError;

    /// Explicit graph over integer states; 0 is initial
    struct Graph {
        edges: BTreeMap<u32, Vec<u32>>,
    }

    impl Graph {
        fn new(edges: &[(u32, &[u32])]) -> Self {
            Graph {
                edges: edges.iter().map(|(s, t)| (*s, t.to_vec())).collect(),
            }
        }
    }

    impl TransitionSystem for Graph {
        type State = u32;

        fn initial_state(&self) -> u32 {
            0
        }

        fn successors(&self, state: &u32) -> CheckResult<Successors<u32>> {
            Ok(self
                .edges
                .get(state)
                .map(|t| t.iter().copied().collect())
                .unwrap_or_default())
        }
    }

    fn run(graph: &Graph, target: u32) -> SearchResult<u32> {
        SearchEngine::new(graph, |s: &u32| *s == target).run().unwrap()
    }

    #[test]
    fn test_all_paths_reach_target() {
        // diamond converging on 3
        let g = Graph::new(&[(0, &[1, 2]), (1, &[3]), (2, &[3])]);
        let result = run(&g, 3);
        assert_eq!(result.outcome, SearchOutcome::LabelUnavoidable);
        assert_eq!(result.stats.states_visited, 3);
    }

    #[test]
    fn test_initial_is_target() {
        let g = Graph::new(&[(0, &[0])]);
        let mut engine = SearchEngine::new(&g, |s: &u32| *s == 0);
        let result = engine.run().unwrap();
        assert!(result.outcome.is_unavoidable());
        assert_eq!(engine.phase(), SearchPhase::Exhausted);
    }

    #[test]
    fn test_cycle_avoiding_target() {
        let g = Graph::new(&[(0, &[1]), (1, &[2, 9]), (2, &[1])]);
        let mut engine = SearchEngine::new(&g, |s: &u32| *s == 9);
        let result = engine.run().unwrap();
        let lasso = result.outcome.counterexample().unwrap();
        assert_eq!(lasso.prefix, vec![0]);
        assert_eq!(lasso.cycle, vec![1, 2]);
        assert_eq!(lasso.kind, LassoKind::Cycle);
        assert_eq!(engine.phase(), SearchPhase::Found);
    }

    #[test]
    fn test_self_loop() {
        let g = Graph::new(&[(0, &[0])]);
        let lasso = run(&g, 5).outcome.counterexample().cloned().unwrap();
        assert!(lasso.prefix.is_empty());
        assert_eq!(lasso.cycle, vec![0]);
    }

    #[test]
    fn test_dead_end() {
        let g = Graph::new(&[(0, &[1, 3]), (1, &[2])]);
        let lasso = run(&g, 3).outcome.counterexample().cloned().unwrap();
        assert_eq!(lasso.kind, LassoKind::DeadEnd);
        assert_eq!(lasso.prefix, vec![0, 1]);
        assert_eq!(lasso.cycle, vec![2]);
    }

    #[test]
    fn test_initial_dead_end() {
        let g = Graph::new(&[]);
        let lasso = run(&g, 1).outcome.counterexample().cloned().unwrap();
        assert_eq!(lasso.kind, LassoKind::DeadEnd);
        assert!(lasso.prefix.is_empty());
        assert_eq!(lasso.cycle, vec![0]);
    }

    #[test]
    fn test_cycle_through_target_is_not_a_counterexample() {
        // 1 -> 2 -> 1 only via the target
        let g = Graph::new(&[(0, &[1]), (1, &[2]), (2, &[1])]);
        assert!(run(&g, 2).outcome.is_unavoidable());
    }

    #[test]
    fn test_closed_states_not_reported_as_cycles() {
        // 1 is reached twice, but never while on the stack
        let g = Graph::new(&[(0, &[1, 2]), (2, &[1]), (1, &[7])]);
        let result = run(&g, 7);
        assert!(result.outcome.is_unavoidable());
        assert_eq!(result.stats.states_expanded, 3);
    }

    #[test]
    fn test_state_limit() {
        let edges: Vec<(u32, Vec<u32>)> = (0..1000).map(|i| (i, vec![i + 1])).collect();
        let g = Graph {
            edges: edges.into_iter().collect(),
        };
        let mut engine = SearchEngine::new(&g, |s: &u32| *s == 5000)
            .with_limits(SearchLimits::unbounded().with_max_states(10));
        let result = engine.run().unwrap();
        assert_eq!(
            result.outcome,
            SearchOutcome::Incomplete(StopReason::StateLimit { limit: 10 })
        );
        assert_eq!(result.stats.states_visited, 10);
        assert_eq!(engine.phase(), SearchPhase::Stopped);
    }

    #[test]
    fn test_cancellation() {
        let edges: Vec<(u32, Vec<u32>)> = (0..10_000).map(|i| (i, vec![i + 1])).collect();
        let g = Graph {
            edges: edges.into_iter().collect(),
        };
        let flag = Arc::new(AtomicBool::new(true));
        let result = SearchEngine::new(&g, |s: &u32| *s == u32::MAX)
            .with_limits(SearchLimits::unbounded().with_cancel_flag(flag))
            .run()
            .unwrap();
        assert_eq!(result.outcome, SearchOutcome::Incomplete(StopReason::Cancelled));
    }

    #[test]
    fn test_time_limit() {
        let edges: Vec<(u32, Vec<u32>)> = (0..10_000).map(|i| (i, vec![i + 1])).collect();
        let g = Graph {
            edges: edges.into_iter().collect(),
        };
        let result = SearchEngine::new(&g, |s: &u32| *s == u32::MAX)
            .with_limits(SearchLimits::unbounded().with_time_limit(Duration::ZERO))
            .run()
            .unwrap();
        assert!(matches!(
            result.outcome,
            SearchOutcome::Incomplete(StopReason::TimeLimit { .. })
        ));
    }

    #[test]
    fn test_successor_error_propagates() {
        struct Broken;
        impl TransitionSystem for Broken {
            type State = u32;
            fn initial_state(&self) -> u32 {
                0
            }
            fn successors(&self, _: &u32) -> CheckResult<Successors<u32>> {
                Err(CheckError::MalformedJumpTable { pc: 0 })
            }
        }
        let err = SearchEngine::new(&Broken, |_: &u32| false).run().unwrap_err();
        assert!(matches!(err, CheckError::MalformedJumpTable { pc: 0 }));
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(
            StopReason::StateLimit { limit: 5 }.to_string(),
            "state limit of 5 reached"
        );
        assert_eq!(StopReason::Cancelled.to_string(), "cancelled");
    }
}
