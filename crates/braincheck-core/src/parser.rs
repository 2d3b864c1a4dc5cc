//! One-pass source scanner
//!
//! The eight instruction symbols are kept, `_name_` attaches a label to the
//! next instruction position, and every other character is a comment.
//! Bracket nesting is checked while scanning; the jump table is built from the
//! matched pairs in the same pass.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::ParseError;
use crate::program::{Instruction, Pc, Program, LABEL_SEPARATOR};

/// Parse program source text into a [`Program`]
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let mut instructions = Vec::new();
    let mut jump_table = BTreeMap::new();
    let mut labels: BTreeMap<Pc, Vec<String>> = BTreeMap::new();
    // (instruction position, byte offset) of every unmatched `[`
    let mut open: Vec<(Pc, usize)> = Vec::new();

    let mut chars = source.char_indices();
    while let Some((offset, c)) = chars.next() {
        if c == LABEL_SEPARATOR {
            let name = scan_label(&mut chars, offset)?;
            labels.entry(instructions.len()).or_default().push(name);
            continue;
        }

        let Some(instr) = Instruction::from_symbol(c) else {
            continue;
        };
        let pc = instructions.len();
        match instr {
            Instruction::JumpIfZero => open.push((pc, offset)),
            Instruction::JumpIfNonZero => {
                let (start, _) = open.pop().ok_or(ParseError::UnbalancedClose { offset })?;
                jump_table.insert(start, pc + 1);
                jump_table.insert(pc, start + 1);
            }
            _ => {}
        }
        instructions.push(instr);
    }

    if let Some(&(_, offset)) = open.last() {
        return Err(ParseError::UnclosedOpen { offset });
    }

    debug!(
        instructions = instructions.len(),
        brackets = jump_table.len(),
        labels = labels.values().map(Vec::len).sum::<usize>(),
        "parsed program"
    );
    Ok(Program::from_parts(instructions, jump_table, labels))
}

/// Read a label body up to the closing separator.
fn scan_label(chars: &mut std::str::CharIndices<'_>, start: usize) -> Result<String, ParseError> {
    let mut name = String::new();
    for (_, c) in chars.by_ref() {
        if c == LABEL_SEPARATOR {
            if name.is_empty() {
                return Err(ParseError::EmptyLabel { offset: start });
            }
            return Ok(name);
        }
        name.push(c);
    }
    Err(ParseError::UnterminatedLabel { offset: start })
}
