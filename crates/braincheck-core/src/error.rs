//! Error types for parsing and concrete execution

use thiserror::Error;

use crate::program::Pc;

/// Errors raised while scanning program source
#[derive(Debug, Error)]
pub enum ParseError {
    /// A `]` with no open `[` before it
    #[error("jump instructions are not balanced: unmatched ']' at byte {offset}")]
    UnbalancedClose { offset: usize },

    /// A `[` that is never closed
    #[error("jump instructions are not balanced: unclosed '[' at byte {offset}")]
    UnclosedOpen { offset: usize },

    /// A label separator with no closing separator
    #[error("label opened at byte {offset} is never closed")]
    UnterminatedLabel { offset: usize },

    /// `__` with nothing in between
    #[error("empty label at byte {offset}")]
    EmptyLabel { offset: usize },

    /// The source file could not be read
    #[error("could not read program: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the concrete interpreter
#[derive(Debug, Error)]
pub enum RunError {
    /// A bracket has no entry in the jump table
    #[error("malformed jump table: no target for bracket at pc {pc}")]
    MalformedJumpTable { pc: Pc },

    /// The configured step limit was hit before the program halted
    #[error("step limit of {steps} exceeded")]
    StepLimit { steps: u64 },

    /// Reading input or writing output failed
    #[error("I/O error during execution: {0}")]
    Io(#[from] std::io::Error),
}
