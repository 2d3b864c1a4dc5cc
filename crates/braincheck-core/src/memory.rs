//! Memory model for concrete execution
//!
//! Concrete runs may use 8, 16 or 32-bit cells and a wrapping or clamping
//! tape. The checker's state model does not use this type: it always works
//! with 8-bit cells on a wrapping tape of [`DEFAULT_TAPE_LEN`] cells.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::program::MemPtr;

/// Number of tape cells when nothing else is configured
pub const DEFAULT_TAPE_LEN: usize = 30_000;

/// Width of a memory cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellSize {
    #[default]
    EightBit,
    SixteenBit,
    ThirtyTwoBit,
}

impl CellSize {
    /// Largest value a cell can hold
    pub fn max_value(self) -> u32 {
        match self {
            CellSize::EightBit => u8::MAX as u32,
            CellSize::SixteenBit => u16::MAX as u32,
            CellSize::ThirtyTwoBit => u32::MAX,
        }
    }

    /// Reduce `value` modulo the cell width
    pub fn truncate(self, value: u32) -> u32 {
        value & self.max_value()
    }
}

/// Shape of the tape used by the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryModel {
    pub cell_size: CellSize,
    pub tape_len: usize,
    /// Moving off either end wraps around instead of sticking at the end
    pub wrapping: bool,
}

impl Default for MemoryModel {
    fn default() -> Self {
        Self {
            cell_size: CellSize::EightBit,
            tape_len: DEFAULT_TAPE_LEN,
            wrapping: true,
        }
    }
}

impl MemoryModel {
    pub fn new(cell_size: CellSize, tape_len: usize, wrapping: bool) -> Self {
        Self {
            cell_size,
            tape_len: tape_len.max(1),
            wrapping,
        }
    }

    /// A fresh zeroed tape of this shape
    pub fn tape(&self) -> Tape {
        Tape::new(*self)
    }
}

/// A mutable tape with a pointer, stored sparsely
#[derive(Debug, Clone)]
pub struct Tape {
    model: MemoryModel,
    ptr: MemPtr,
    cells: BTreeMap<MemPtr, u32>,
}

impl Tape {
    pub fn new(model: MemoryModel) -> Self {
        Self {
            model,
            ptr: 0,
            cells: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> &MemoryModel {
        &self.model
    }

    /// Clear all cells and move the pointer home
    pub fn reset(&mut self) {
        self.ptr = 0;
        self.cells.clear();
    }

    pub fn pointer(&self) -> MemPtr {
        self.ptr
    }

    pub fn left(&mut self) {
        if self.ptr > 0 {
            self.ptr -= 1;
        } else if self.model.wrapping {
            self.ptr = self.model.tape_len - 1;
        }
    }

    pub fn right(&mut self) {
        if self.ptr + 1 < self.model.tape_len {
            self.ptr += 1;
        } else if self.model.wrapping {
            self.ptr = 0;
        }
    }

    pub fn increment(&mut self) {
        let value = self.current();
        let next = if value == self.model.cell_size.max_value() {
            0
        } else {
            value + 1
        };
        self.set(self.ptr, next);
    }

    pub fn decrement(&mut self) {
        let value = self.current();
        let next = if value == 0 {
            self.model.cell_size.max_value()
        } else {
            value - 1
        };
        self.set(self.ptr, next);
    }

    pub fn get(&self, ptr: MemPtr) -> u32 {
        self.cells.get(&ptr).copied().unwrap_or(0)
    }

    /// Store `value` reduced to the cell width; zero cells are dropped
    pub fn set(&mut self, ptr: MemPtr, value: u32) {
        let value = self.model.cell_size.truncate(value);
        if value == 0 {
            self.cells.remove(&ptr);
        } else {
            self.cells.insert(ptr, value);
        }
    }

    pub fn current(&self) -> u32 {
        self.get(self.ptr)
    }

    pub fn set_current(&mut self, value: u32) {
        self.set(self.ptr, value);
    }

    /// Non-zero cells in address order
    pub fn cells(&self) -> impl Iterator<Item = (MemPtr, u32)> + '_ {
        self.cells.iter().map(|(&p, &v)| (p, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_size_wrapping() {
        let mut t8 = MemoryModel::new(CellSize::EightBit, 1, false).tape();
        t8.set_current(255);
        assert_eq!(t8.current(), 255);
        t8.set_current(256);
        assert_eq!(t8.current(), 0);
        t8.decrement();
        assert_eq!(t8.current(), 255);

        let mut t16 = MemoryModel::new(CellSize::SixteenBit, 1, false).tape();
        t16.set_current(65_535);
        assert_eq!(t16.current(), 65_535);
        t16.set_current(65_536);
        assert_eq!(t16.current(), 0);
        t16.decrement();
        assert_eq!(t16.current(), 65_535);

        let mut t32 = MemoryModel::new(CellSize::ThirtyTwoBit, 1, false).tape();
        t32.set_current(u32::MAX);
        assert_eq!(t32.current(), u32::MAX);
        t32.increment();
        assert_eq!(t32.current(), 0);
        t32.decrement();
        assert_eq!(t32.current(), u32::MAX);
    }

    #[test]
    fn test_non_wrapping_tape_clamps() {
        let mut tape = MemoryModel::new(CellSize::EightBit, 4, false).tape();
        assert_eq!(tape.pointer(), 0);
        tape.left();
        assert_eq!(tape.pointer(), 0);
        for _ in 0..4 {
            tape.right();
        }
        assert_eq!(tape.pointer(), 3);
    }

    #[test]
    fn test_wrapping_tape() {
        let mut tape = MemoryModel::new(CellSize::EightBit, 4, true).tape();
        tape.left();
        assert_eq!(tape.pointer(), 3);
        tape.right();
        assert_eq!(tape.pointer(), 0);
        for _ in 0..4 {
            tape.right();
        }
        assert_eq!(tape.pointer(), 0);
    }

    #[test]
    fn test_zero_cells_not_stored() {
        let mut tape = MemoryModel::default().tape();
        tape.increment();
        tape.decrement();
        assert_eq!(tape.cells().count(), 0);
        tape.reset();
        assert_eq!(tape.pointer(), 0);
    }
}
