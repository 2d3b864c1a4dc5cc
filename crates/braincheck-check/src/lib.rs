//! Label reachability checking for Brainfuck programs
//!
//! A program together with an input model defines a Kripke structure: states
//! are machine configurations, transitions are instruction steps (a read
//! branches over every byte it could see), and the propositions holding in a
//! state are the labels at its pc. [`check_reach`] decides whether every
//! execution eventually reaches a given label. When one does not, it returns
//! the lasso-shaped execution that avoids the label forever.
//!
//! ```
//! use braincheck_check::{check_reach, CheckConfig, SearchOutcome};
//! use braincheck_core::Program;
//!
//! let program = Program::parse("+[,]_end_.").unwrap();
//!
//! // With unlimited input the loop can spin forever
//! let result = check_reach(&program, "end", &CheckConfig::default()).unwrap();
//! assert!(matches!(result.outcome, SearchOutcome::Counterexample(_)));
//!
//! // After five reads EOF writes a zero and the loop exits
//! let bounded = CheckConfig::builder().max_reads(5).build();
//! let result = check_reach(&program, "end", &bounded).unwrap();
//! assert!(result.outcome.is_unavoidable());
//! ```

pub mod config;
pub mod dot;
pub mod error;
pub mod explore;
pub mod fingerprint;
pub mod kripke;
pub mod labeling;
pub mod report;
pub mod search;
pub mod state;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use braincheck_core::Program;
use tracing::info;

pub use config::{CheckConfig, CheckConfigBuilder, ConfigError};
pub use dot::render_dot;
pub use error::{CheckError, CheckResult};
pub use explore::{explore, ExploreConfig, GraphNode, NodeId, StateGraph};
pub use kripke::{Kripke, Successors, TransitionSystem};
pub use labeling::{LabelPredicate, Labeling};
pub use report::{CounterexampleReport, Piece};
pub use search::{
    Lasso, LassoKind, SearchEngine, SearchLimits, SearchOutcome, SearchPhase, SearchResult,
    SearchStats, StopReason,
};
pub use state::{Fingerprint, MachineState, StateSnapshot, TAPE_LEN};

/// Result of a reachability check on a program
pub type AnalysisResult = SearchResult<MachineState>;

/// Decide whether every execution of `program` reaches `label`
pub fn check_reach(
    program: &Program,
    label: &str,
    config: &CheckConfig,
) -> CheckResult<AnalysisResult> {
    check_reach_with_cancel(program, label, config, None)
}

/// [`check_reach`] that also stops, with an incomplete result, once `cancel` is raised
pub fn check_reach_with_cancel(
    program: &Program,
    label: &str,
    config: &CheckConfig,
    cancel: Option<Arc<AtomicBool>>,
) -> CheckResult<AnalysisResult> {
    let kripke = Kripke::new(program, config.io);
    let target = kripke.target(label)?;
    kripke.validate()?;

    info!(
        label,
        instructions = program.len(),
        max_reads = ?config.io.max_reads,
        no_change_on_eof = config.io.no_change_on_eof,
        "checking label reachability"
    );

    SearchEngine::new(&kripke, |s: &MachineState| target.holds(s))
        .with_limits(config.search_limits(cancel))
        .with_progress_interval(config.progress_interval)
        .run()
}
