//! Concrete interpreter
//!
//! Runs a program against real input and output streams. Input handling
//! follows the same [`IoModel`] policy the checker uses symbolically: after
//! `max_reads` bytes (or at the end of the stream) a read sees EOF and either
//! stores `eof_byte` or leaves the cell alone.

use std::io::{Read, Write};

use tracing::{debug, trace};

use crate::error::RunError;
use crate::io::IoModel;
use crate::memory::{MemoryModel, Tape};
use crate::program::{Instruction, Program};

/// Counters collected during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Instructions executed
    pub steps: u64,
    /// Bytes actually consumed from the input
    pub reads: u64,
    /// Bytes written to the output
    pub writes: u64,
}

/// Concrete executor for one program
pub struct Interpreter<'p> {
    program: &'p Program,
    memory: MemoryModel,
    io: IoModel,
    step_limit: Option<u64>,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program, memory: MemoryModel, io: IoModel) -> Self {
        Self {
            program,
            memory,
            io,
            step_limit: None,
        }
    }

    /// Abort with [`RunError::StepLimit`] after this many instructions
    pub fn with_step_limit(mut self, steps: u64) -> Self {
        self.step_limit = Some(steps);
        self
    }

    /// Run to completion on a fresh tape
    pub fn run<R: Read, W: Write>(&self, input: R, output: W) -> Result<RunStats, RunError> {
        let mut tape = self.memory.tape();
        let stats = self.run_on(&mut tape, input, output)?;
        Ok(stats)
    }

    /// Run to completion on the given tape, leaving its final contents in place
    pub fn run_on<R: Read, W: Write>(
        &self,
        tape: &mut Tape,
        mut input: R,
        mut output: W,
    ) -> Result<RunStats, RunError> {
        let mut stats = RunStats::default();
        let mut reads_left = self.io.max_reads;
        let mut pc = 0;

        while let Some(instr) = self.program.instruction_at(pc) {
            if let Some(limit) = self.step_limit {
                if stats.steps >= limit {
                    return Err(RunError::StepLimit { steps: limit });
                }
            }
            stats.steps += 1;
            trace!(pc, ?instr, ptr = tape.pointer(), "step");

            match instr {
                Instruction::MoveLeft => tape.left(),
                Instruction::MoveRight => tape.right(),
                Instruction::Inc => tape.increment(),
                Instruction::Dec => tape.decrement(),
                Instruction::Read => {
                    match self.read_byte(&mut input, &mut reads_left)? {
                        Some(byte) => {
                            stats.reads += 1;
                            tape.set_current(u32::from(byte));
                        }
                        None if self.io.no_change_on_eof => {}
                        None => tape.set_current(u32::from(self.io.eof_byte)),
                    }
                }
                Instruction::Write => {
                    output.write_all(&[tape.current() as u8])?;
                    stats.writes += 1;
                }
                Instruction::JumpIfZero | Instruction::JumpIfNonZero => {
                    let taken = (tape.current() == 0) == (instr == Instruction::JumpIfZero);
                    if taken {
                        pc = self
                            .program
                            .jump_target(pc)
                            .ok_or(RunError::MalformedJumpTable { pc })?;
                        continue;
                    }
                }
            }
            pc += 1;
        }

        output.flush()?;
        debug!(
            steps = stats.steps,
            reads = stats.reads,
            writes = stats.writes,
            "program halted"
        );
        Ok(stats)
    }

    /// Next input byte, or `None` at EOF (stream end or exhausted budget)
    fn read_byte<R: Read>(
        &self,
        input: &mut R,
        reads_left: &mut Option<usize>,
    ) -> Result<Option<u8>, RunError> {
        if let Some(0) = reads_left {
            return Ok(None);
        }
        let mut buf = [0u8; 1];
        let n = loop {
            match input.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            return Ok(None);
        }
        if let Some(left) = reads_left.as_mut() {
            *left -= 1;
        }
        Ok(Some(buf[0]))
    }
}
