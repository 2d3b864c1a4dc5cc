//! Machine states of the Kripke structure
//!
//! A state is the tuple `(pc, mem_ptr, memory, reads_remaining)`. Memory is a
//! persistent ordered map from tape position to cell value in which a zero
//! cell is never stored, so two states describing the same machine
//! configuration are structurally identical no matter how they were reached.
//! Successor states share all untouched map nodes with their predecessor.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use braincheck_core::{MemPtr, Pc, DEFAULT_TAPE_LEN};
use im::OrdMap;
use serde::Serialize;

use crate::fingerprint::{
    fp64_extend_byte, fp64_extend_u64, fp64_extend_usize, memory_digest, update_memory_digest,
    FP64_INIT,
};

/// Number of cells on the verification tape. Pointer moves wrap modulo this.
pub const TAPE_LEN: usize = DEFAULT_TAPE_LEN;

/// A 64-bit state fingerprint for fast state comparison
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Fingerprint(pub u64);

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FP({:016x})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One configuration of the abstract machine
#[derive(Clone)]
pub struct MachineState {
    pc: Pc,
    mem_ptr: MemPtr,
    /// Non-zero cells only
    memory: OrdMap<MemPtr, u8>,
    /// `None` when input is unlimited
    reads_remaining: Option<usize>,
    /// Wrapping sum of per-cell fingerprints, maintained incrementally
    memory_digest: u64,
    fingerprint: Fingerprint,
}

impl MachineState {
    /// Program start: pc 0, pointer 0, all cells zero
    pub fn initial(reads_remaining: Option<usize>) -> Self {
        Self::from_parts(0, 0, OrdMap::new(), 0, reads_remaining)
    }

    /// Build a state from explicit cells. Zero-valued cells are dropped.
    pub fn new(
        pc: Pc,
        mem_ptr: MemPtr,
        cells: impl IntoIterator<Item = (MemPtr, u8)>,
        reads_remaining: Option<usize>,
    ) -> Self {
        let memory: OrdMap<MemPtr, u8> = cells.into_iter().filter(|&(_, v)| v != 0).collect();
        let digest = memory_digest(memory.iter().map(|(&p, &v)| (p, v)));
        Self::from_parts(pc, mem_ptr, memory, digest, reads_remaining)
    }

    fn from_parts(
        pc: Pc,
        mem_ptr: MemPtr,
        memory: OrdMap<MemPtr, u8>,
        memory_digest: u64,
        reads_remaining: Option<usize>,
    ) -> Self {
        let fingerprint = compute_fingerprint(pc, mem_ptr, memory_digest, reads_remaining);
        MachineState {
            pc,
            mem_ptr,
            memory,
            reads_remaining,
            memory_digest,
            fingerprint,
        }
    }

    pub fn pc(&self) -> Pc {
        self.pc
    }

    pub fn mem_ptr(&self) -> MemPtr {
        self.mem_ptr
    }

    pub fn reads_remaining(&self) -> Option<usize> {
        self.reads_remaining
    }

    /// The non-zero cells
    pub fn memory(&self) -> &OrdMap<MemPtr, u8> {
        &self.memory
    }

    /// Value of the cell at `ptr`; absent cells read as zero
    pub fn cell(&self, ptr: MemPtr) -> u8 {
        self.memory.get(&ptr).copied().unwrap_or(0)
    }

    /// Value of the cell under the pointer
    pub fn current_cell(&self) -> u8 {
        self.cell(self.mem_ptr)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Same memory and budget, new pc
    pub fn jump(&self, pc: Pc) -> Self {
        Self::from_parts(
            pc,
            self.mem_ptr,
            self.memory.clone(),
            self.memory_digest,
            self.reads_remaining,
        )
    }

    /// Same memory and budget, new pc and pointer
    pub fn move_pointer(&self, pc: Pc, mem_ptr: MemPtr) -> Self {
        Self::from_parts(
            pc,
            mem_ptr,
            self.memory.clone(),
            self.memory_digest,
            self.reads_remaining,
        )
    }

    /// Overwrite the current cell and move to `pc`
    pub fn write_cell(&self, pc: Pc, value: u8) -> Self {
        self.store(pc, value, self.reads_remaining)
    }

    /// Store a byte obtained from input; a finite budget drops by one (floor 0)
    pub fn consume_read(&self, pc: Pc, value: u8) -> Self {
        let remaining = self.reads_remaining.map(|n| n.saturating_sub(1));
        self.store(pc, value, remaining)
    }

    fn store(&self, pc: Pc, value: u8, reads_remaining: Option<usize>) -> Self {
        let ptr = self.mem_ptr;
        let old = self.current_cell();
        let mut memory = self.memory.clone();
        if value == 0 {
            memory.remove(&ptr);
        } else {
            memory.insert(ptr, value);
        }
        let digest = update_memory_digest(self.memory_digest, ptr, old, value);
        Self::from_parts(pc, ptr, memory, digest, reads_remaining)
    }

    /// Serializable view for reports
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            pc: self.pc,
            mem_ptr: self.mem_ptr,
            cells: self.memory.iter().map(|(&p, &v)| (p, v)).collect(),
            reads_remaining: self.reads_remaining,
            fingerprint: self.fingerprint,
        }
    }
}

fn compute_fingerprint(
    pc: Pc,
    mem_ptr: MemPtr,
    memory_digest: u64,
    reads_remaining: Option<usize>,
) -> Fingerprint {
    let mut fp = fp64_extend_usize(FP64_INIT, pc);
    fp = fp64_extend_usize(fp, mem_ptr);
    fp = match reads_remaining {
        None => fp64_extend_byte(fp, 0),
        Some(n) => fp64_extend_usize(fp64_extend_byte(fp, 1), n),
    };
    Fingerprint(fp64_extend_u64(fp, memory_digest))
}

/// A plain copy of a state's contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub pc: Pc,
    pub mem_ptr: MemPtr,
    pub cells: Vec<(MemPtr, u8)>,
    pub reads_remaining: Option<usize>,
    pub fingerprint: Fingerprint,
}

impl fmt::Debug for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State{{pc: {}, mp: {}, mem: {{", self.pc, self.mem_ptr)?;
        let mut first = true;
        for (ptr, value) in &self.memory {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{}: {}", ptr, value)?;
        }
        write!(f, "}}, reads: ")?;
        match self.reads_remaining {
            Some(n) => write!(f, "{}", n)?,
            None => write!(f, "inf")?,
        }
        write!(f, "}}")
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pc = {}; mp = {}", self.pc, self.mem_ptr)
    }
}

impl PartialEq for MachineState {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
            && self.pc == other.pc
            && self.mem_ptr == other.mem_ptr
            && self.reads_remaining == other.reads_remaining
            && self.memory == other.memory
    }
}

impl Eq for MachineState {}

impl Hash for MachineState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.0.hash(state);
    }
}

impl PartialOrd for MachineState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lexicographic on `(pc, mem_ptr, reads_remaining, memory)`, with an
/// unlimited budget ordered before any finite one.
impl Ord for MachineState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pc
            .cmp(&other.pc)
            .then_with(|| self.mem_ptr.cmp(&other.mem_ptr))
            .then_with(|| self.reads_remaining.cmp(&other.reads_remaining))
            .then_with(|| self.memory.iter().cmp(other.memory.iter()))
    }
}
