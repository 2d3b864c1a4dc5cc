//! Source-level rendering of a counterexample
//!
//! A lasso is shown as the instructions its states execute: the prefix, the
//! repeated cycle, then the rest of the program text after the last cycle
//! instruction with the target label marked where it sits.

use std::fmt;

use braincheck_core::{Program, LABEL_SEPARATOR};
use serde::Serialize;

use crate::search::{Lasso, LassoKind};
use crate::state::{MachineState, StateSnapshot};

/// Symbol for a state whose pc is past the last instruction
pub const HALTED_SYMBOL: char = '$';

/// A piece of the continuation text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Piece {
    Code(String),
    Label(String),
}

impl Piece {
    /// Source text of the piece, labels in `_name_` form
    pub fn text(&self) -> String {
        match self {
            Piece::Code(code) => code.clone(),
            Piece::Label(name) => format!("{}{}{}", LABEL_SEPARATOR, name, LABEL_SEPARATOR),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterexampleReport {
    pub label: String,
    pub kind: LassoKind,
    /// Instruction symbols executed by the prefix states
    pub prefix: String,
    /// Instruction symbols executed by the cycle states
    pub cycle: String,
    /// Program text following the cycle
    pub continuation: Vec<Piece>,
    pub prefix_states: Vec<StateSnapshot>,
    pub cycle_states: Vec<StateSnapshot>,
}

impl CounterexampleReport {
    pub fn new(program: &Program, lasso: &Lasso<MachineState>, label: &str) -> Self {
        let symbols = |states: &[MachineState]| -> String {
            states
                .iter()
                .map(|s| {
                    program
                        .instruction_at(s.pc())
                        .map(|i| i.symbol())
                        .unwrap_or(HALTED_SYMBOL)
                })
                .collect()
        };

        let continuation = match lasso.cycle.last() {
            Some(last) => continuation(program, last.pc() + 1, label),
            None => Vec::new(),
        };

        CounterexampleReport {
            label: label.to_string(),
            kind: lasso.kind,
            prefix: symbols(&lasso.prefix),
            cycle: symbols(&lasso.cycle),
            continuation,
            prefix_states: lasso.prefix.iter().map(MachineState::snapshot).collect(),
            cycle_states: lasso.cycle.iter().map(MachineState::snapshot).collect(),
        }
    }

    /// The continuation as plain text, labels in `_name_` form
    pub fn continuation_text(&self) -> String {
        self.continuation.iter().map(Piece::text).collect()
    }
}

fn continuation(program: &Program, from: usize, label: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut code = String::new();
    let mut pc = from;
    loop {
        if program.labels_at(pc).iter().any(|l| l == label) {
            if !code.is_empty() {
                pieces.push(Piece::Code(std::mem::take(&mut code)));
            }
            pieces.push(Piece::Label(label.to_string()));
        }
        match program.instruction_at(pc) {
            Some(instr) => code.push(instr.symbol()),
            None => break,
        }
        pc += 1;
    }
    if !code.is_empty() {
        pieces.push(Piece::Code(code));
    }
    pieces
}

impl fmt::Display for CounterexampleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {}",
            self.prefix,
            self.cycle,
            self.continuation_text()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_report() {
        let program = Program::parse("+[,]_end_.").unwrap();
        let lasso = Lasso {
            prefix: vec![
                MachineState::initial(None),
                MachineState::new(1, 0, [(0, 1)], None),
            ],
            cycle: vec![
                MachineState::new(2, 0, [(0, 1)], None),
                MachineState::new(3, 0, [(0, 1)], None),
            ],
            kind: LassoKind::Cycle,
        };
        let report = CounterexampleReport::new(&program, &lasso, "end");
        assert_eq!(report.prefix, "+[");
        assert_eq!(report.cycle, ",]");
        assert_eq!(
            report.continuation,
            vec![Piece::Label("end".into()), Piece::Code(".".into())]
        );
        assert_eq!(report.to_string(), "+[ | ,] | _end_.");
    }

    #[test]
    fn test_piece_text_uses_label_separator() {
        assert_eq!(Piece::Code("+-".into()).text(), "+-");
        let label = Piece::Label("end".into()).text();
        assert_eq!(label, format!("{0}end{0}", LABEL_SEPARATOR));
        Program::parse(&label).unwrap();
    }

    #[test]
    fn test_halted_state_symbol() {
        let program = Program::parse("+_x_").unwrap();
        let lasso = Lasso {
            prefix: vec![MachineState::initial(None)],
            cycle: vec![MachineState::new(1, 0, [(0, 1)], None)],
            kind: LassoKind::DeadEnd,
        };
        let report = CounterexampleReport::new(&program, &lasso, "y");
        assert_eq!(report.prefix, "+");
        assert_eq!(report.cycle, "$");
        assert!(report.continuation.is_empty());
    }

    #[test]
    fn test_other_labels_not_shown() {
        let program = Program::parse("+_a_-_b_>").unwrap();
        let lasso = Lasso {
            prefix: vec![],
            cycle: vec![MachineState::initial(None)],
            kind: LassoKind::DeadEnd,
        };
        let report = CounterexampleReport::new(&program, &lasso, "b");
        assert_eq!(report.continuation_text(), "-_b_>");
    }

    #[test]
    fn test_snapshots_included() {
        let program = Program::parse("+").unwrap();
        let lasso = Lasso {
            prefix: vec![],
            cycle: vec![MachineState::initial(Some(2))],
            kind: LassoKind::Cycle,
        };
        let report = CounterexampleReport::new(&program, &lasso, "x");
        assert!(report.prefix_states.is_empty());
        assert_eq!(report.cycle_states[0].reads_remaining, Some(2));
    }
}
