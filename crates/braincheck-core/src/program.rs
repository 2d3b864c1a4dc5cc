//! Program model
//!
//! A program is an ordered instruction sequence together with two tables that
//! are built once by the scanner and never change afterwards:
//! - the jump table, pairing every `[` with the position just after its
//!   matching `]` and vice versa
//! - the label map, attaching zero or more names to an instruction position
//!
//! Positions are instruction indices, not byte offsets into the source.
//! Position `len()` is valid as a label position (a label after the last
//! instruction) and is the halting position of every execution.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::ParseError;

/// Index into the instruction sequence
pub type Pc = usize;

/// Index into the memory tape
pub type MemPtr = usize;

/// Separator that opens and closes a label in source text: `_name_`
pub const LABEL_SEPARATOR: char = '_';

/// One instruction of the language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Instruction {
    /// `<`
    MoveLeft,
    /// `>`
    MoveRight,
    /// `+`
    Inc,
    /// `-`
    Dec,
    /// `,`
    Read,
    /// `.`
    Write,
    /// `[`
    JumpIfZero,
    /// `]`
    JumpIfNonZero,
}

impl Instruction {
    /// Source symbol of this instruction
    pub fn symbol(self) -> char {
        match self {
            Instruction::MoveLeft => '<',
            Instruction::MoveRight => '>',
            Instruction::Inc => '+',
            Instruction::Dec => '-',
            Instruction::Read => ',',
            Instruction::Write => '.',
            Instruction::JumpIfZero => '[',
            Instruction::JumpIfNonZero => ']',
        }
    }

    /// Decode a source symbol; any other character is a comment
    pub fn from_symbol(c: char) -> Option<Instruction> {
        match c {
            '<' => Some(Instruction::MoveLeft),
            '>' => Some(Instruction::MoveRight),
            '+' => Some(Instruction::Inc),
            '-' => Some(Instruction::Dec),
            ',' => Some(Instruction::Read),
            '.' => Some(Instruction::Write),
            '[' => Some(Instruction::JumpIfZero),
            ']' => Some(Instruction::JumpIfNonZero),
            _ => None,
        }
    }

    /// Whether this instruction consults the jump table
    pub fn is_jump(self) -> bool {
        matches!(self, Instruction::JumpIfZero | Instruction::JumpIfNonZero)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A parsed program
///
/// Immutable once built. The analysis borrows it for its whole lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    jump_table: BTreeMap<Pc, Pc>,
    labels: BTreeMap<Pc, Vec<String>>,
}

impl Program {
    /// Assemble a program from its parts.
    ///
    /// No validation is performed here; the scanner in [`crate::parser`]
    /// upholds the bracket invariants. Consumers that receive a program from
    /// elsewhere treat a missing jump-table entry as a contract violation.
    pub fn from_parts(
        instructions: Vec<Instruction>,
        jump_table: BTreeMap<Pc, Pc>,
        labels: BTreeMap<Pc, Vec<String>>,
    ) -> Self {
        Self {
            instructions,
            jump_table,
            labels,
        }
    }

    /// Parse program source text
    pub fn parse(source: &str) -> Result<Program, ParseError> {
        crate::parser::parse(source)
    }

    /// Read and parse a program file
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Program, ParseError> {
        let source = std::fs::read_to_string(path)?;
        crate::parser::parse(&source)
    }

    /// All instructions in order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the program has no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// The instruction at `pc`, or `None` past the end
    pub fn instruction_at(&self, pc: Pc) -> Option<Instruction> {
        self.instructions.get(pc).copied()
    }

    /// Jump destination for the bracket at `pc`
    pub fn jump_target(&self, pc: Pc) -> Option<Pc> {
        self.jump_table.get(&pc).copied()
    }

    /// The full jump table
    pub fn jump_table(&self) -> &BTreeMap<Pc, Pc> {
        &self.jump_table
    }

    /// The full label map (position -> names in source order)
    pub fn label_map(&self) -> &BTreeMap<Pc, Vec<String>> {
        &self.labels
    }

    /// Names attached to `pc` (empty if none)
    pub fn labels_at(&self, pc: Pc) -> &[String] {
        self.labels.get(&pc).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any position carries `label`
    pub fn has_label(&self, label: &str) -> bool {
        self.labels
            .values()
            .any(|names| names.iter().any(|n| n == label))
    }

    /// All positions carrying `label`, ascending
    pub fn label_positions(&self, label: &str) -> Vec<Pc> {
        self.labels
            .iter()
            .filter(|(_, names)| names.iter().any(|n| n == label))
            .map(|(&pc, _)| pc)
            .collect()
    }

    /// Render the program back to source form.
    ///
    /// Comments are not preserved. With `with_labels`, every label is emitted
    /// as `_name_` directly before the instruction it is attached to.
    pub fn render(&self, with_labels: bool) -> String {
        let mut out = String::with_capacity(self.instructions.len());
        for pc in 0..=self.instructions.len() {
            if with_labels {
                for name in self.labels_at(pc) {
                    out.push(LABEL_SEPARATOR);
                    out.push_str(name);
                    out.push(LABEL_SEPARATOR);
                }
            }
            if let Some(instr) = self.instruction_at(pc) {
                out.push(instr.symbol());
            }
        }
        out
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}
