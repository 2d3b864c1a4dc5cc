//! braincheck-core - program model and concrete execution
//!
//! This crate provides everything the checker consumes but does not analyse:
//!
//! - [`Program`]: instruction sequence, jump table and label map
//! - [`parser`]: the one-pass source scanner (`_name_` labels, comments ignored)
//! - [`IoModel`]: the nondeterministic input policy (`max_reads`, EOF handling)
//! - [`MemoryModel`] / [`Tape`]: configurable cells for concrete runs
//! - [`Interpreter`]: direct execution against real I/O streams
//!
//! # Example
//!
//! ```
//! use braincheck_core::{Interpreter, IoModel, MemoryModel, Program};
//!
//! let program = Program::parse("+++[->++<]>.").unwrap();
//! let mut out = Vec::new();
//! Interpreter::new(&program, MemoryModel::default(), IoModel::default())
//!     .run(&b""[..], &mut out)
//!     .unwrap();
//! assert_eq!(out, vec![6]);
//! ```

mod error;
pub mod interpreter;
pub mod io;
pub mod memory;
pub mod parser;
pub mod program;

pub use error::{ParseError, RunError};
pub use interpreter::{Interpreter, RunStats};
pub use io::{IoModel, PossibleReads};
pub use memory::{CellSize, MemoryModel, Tape, DEFAULT_TAPE_LEN};
pub use program::{Instruction, MemPtr, Pc, Program, LABEL_SEPARATOR};
