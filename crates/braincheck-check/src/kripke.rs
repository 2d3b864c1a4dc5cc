//! Kripke structure of a labelled program
//!
//! [`TransitionSystem`] is the seam between state spaces and the algorithms
//! that walk them. [`Kripke`] is the implementation for programs: the initial
//! state, the transition relation over [`MachineState`], and the labeling
//! function mapping a state to the propositions at its pc.

use std::fmt::Debug;
use std::hash::Hash;

use braincheck_core::{Instruction, IoModel, Program};
use smallvec::SmallVec;
use tracing::debug;

use crate::error::{CheckError, CheckResult};
use crate::labeling::{LabelPredicate, Labeling};
use crate::state::{MachineState, TAPE_LEN};

/// Successor states in deterministic order. Most instructions have exactly one.
pub type Successors<S> = SmallVec<[S; 1]>;

/// A state space with one initial state and a successor function
pub trait TransitionSystem {
    type State: Clone + Eq + Hash + Ord + Debug;

    fn initial_state(&self) -> Self::State;

    /// All successors of `state`. An empty result means the state is a dead end.
    fn successors(&self, state: &Self::State) -> CheckResult<Successors<Self::State>>;
}

/// The transition system of one program under one input model
///
/// Cells are always 8-bit and wrap at 256 on a tape of [`TAPE_LEN`] cells,
/// whatever memory model concrete execution uses.
#[derive(Debug, Clone)]
pub struct Kripke<'p> {
    program: &'p Program,
    io: IoModel,
    labeling: Labeling,
}

impl<'p> Kripke<'p> {
    pub fn new(program: &'p Program, io: IoModel) -> Self {
        Kripke {
            program,
            io,
            labeling: Labeling::new(program),
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn io(&self) -> &IoModel {
        &self.io
    }

    pub fn labeling(&self) -> &Labeling {
        &self.labeling
    }

    /// Predicate for `label`, or [`CheckError::UnknownLabel`]
    pub fn target(&self, label: &str) -> CheckResult<LabelPredicate> {
        self.labeling.target(label)
    }

    /// Fail with [`CheckError::MalformedJumpTable`] if any bracket lacks a target
    pub fn validate(&self) -> CheckResult<()> {
        for (pc, instr) in self.program.instructions().iter().enumerate() {
            if instr.is_jump() && self.program.jump_target(pc).is_none() {
                return Err(CheckError::MalformedJumpTable { pc });
            }
        }
        debug!(
            instructions = self.program.len(),
            jumps = self.program.jump_table().len(),
            "jump table validated"
        );
        Ok(())
    }

    /// Human-readable node text: `pc = …; mp = …` then the fingerprint
    pub fn format_state(&self, state: &MachineState) -> String {
        format!("{}\nhash = {}", state, state.fingerprint())
    }

    fn jump(&self, state: &MachineState, taken: bool) -> CheckResult<MachineState> {
        let pc = state.pc();
        if !taken {
            return Ok(state.jump(pc + 1));
        }
        let target = self
            .program
            .jump_target(pc)
            .ok_or(CheckError::MalformedJumpTable { pc })?;
        Ok(state.jump(target))
    }
}

impl TransitionSystem for Kripke<'_> {
    type State = MachineState;

    fn initial_state(&self) -> MachineState {
        MachineState::initial(self.io.initial_budget())
    }

    fn successors(&self, state: &MachineState) -> CheckResult<Successors<MachineState>> {
        let pc = state.pc();
        let next = pc + 1;
        let mut out = Successors::new();

        // Past the last instruction the program has halted
        let Some(instr) = self.program.instruction_at(pc) else {
            return Ok(out);
        };

        match instr {
            Instruction::MoveLeft => {
                let ptr = state.mem_ptr();
                let left = if ptr == 0 { TAPE_LEN - 1 } else { ptr - 1 };
                out.push(state.move_pointer(next, left));
            }
            Instruction::MoveRight => {
                let ptr = state.mem_ptr();
                let right = if ptr + 1 >= TAPE_LEN { 0 } else { ptr + 1 };
                out.push(state.move_pointer(next, right));
            }
            Instruction::Inc => {
                out.push(state.write_cell(next, state.current_cell().wrapping_add(1)));
            }
            Instruction::Dec => {
                out.push(state.write_cell(next, state.current_cell().wrapping_sub(1)));
            }
            Instruction::Read => {
                let reads = self.io.possible_reads(state.reads_remaining());
                out.reserve(reads.len());
                for byte in reads.iter() {
                    out.push(state.consume_read(next, byte));
                }
            }
            Instruction::Write => out.push(state.jump(next)),
            Instruction::JumpIfZero => out.push(self.jump(state, state.current_cell() == 0)?),
            Instruction::JumpIfNonZero => out.push(self.jump(state, state.current_cell() != 0)?),
        }
        Ok(out)
    }
}
