//! Input model
//!
//! The checker never reads real input. Instead, every `,` is resolved against
//! an [`IoModel`] that says which byte values a read could produce given how
//! many nondeterministic reads are still available. The remaining budget is
//! passed in explicitly, so the model itself is a plain value that can be
//! shared between any number of exploration paths.

use serde::{Deserialize, Serialize};

/// Nondeterministic input policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IoModel {
    /// Number of reads for which any byte is possible.
    /// `None` means input never runs out.
    pub max_reads: Option<usize>,
    /// Byte substituted once the budget is exhausted (unless `no_change_on_eof`)
    pub eof_byte: u8,
    /// Once the budget is exhausted, a read has no outcome at all
    pub no_change_on_eof: bool,
}

impl Default for IoModel {
    fn default() -> Self {
        Self {
            max_reads: None,
            eof_byte: 0,
            no_change_on_eof: false,
        }
    }
}

impl IoModel {
    /// Unlimited nondeterministic input
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Input that reaches EOF after `max_reads` bytes
    pub fn with_max_reads(max_reads: usize) -> Self {
        Self {
            max_reads: Some(max_reads),
            ..Self::default()
        }
    }

    pub fn eof_byte(mut self, eof_byte: u8) -> Self {
        self.eof_byte = eof_byte;
        self
    }

    pub fn no_change_on_eof(mut self, no_change: bool) -> Self {
        self.no_change_on_eof = no_change;
        self
    }

    /// Budget carried by the initial machine state
    pub fn initial_budget(&self) -> Option<usize> {
        self.max_reads
    }

    /// The byte values a read can produce with `remaining` reads left.
    ///
    /// `remaining == None` means the budget is unlimited.
    pub fn possible_reads(&self, remaining: Option<usize>) -> PossibleReads {
        match remaining {
            None => PossibleReads::Any,
            Some(n) if n > 0 => PossibleReads::Any,
            Some(_) if self.no_change_on_eof => PossibleReads::Blocked,
            Some(_) => PossibleReads::Eof(self.eof_byte),
        }
    }
}

/// Outcome set of a single nondeterministic read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PossibleReads {
    /// Every byte 0..=255
    Any,
    /// Input is exhausted; the read yields this byte
    Eof(u8),
    /// Input is exhausted and the read has no outcome
    Blocked,
}

impl PossibleReads {
    /// Number of distinct outcomes
    pub fn len(&self) -> usize {
        match self {
            PossibleReads::Any => 256,
            PossibleReads::Eof(_) => 1,
            PossibleReads::Blocked => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PossibleReads::Blocked)
    }

    pub fn contains(&self, byte: u8) -> bool {
        match self {
            PossibleReads::Any => true,
            PossibleReads::Eof(b) => *b == byte,
            PossibleReads::Blocked => false,
        }
    }

    /// Outcomes in ascending byte order
    pub fn iter(&self) -> impl Iterator<Item = u8> {
        let range = match *self {
            PossibleReads::Any => 0u16..256,
            PossibleReads::Eof(b) => u16::from(b)..u16::from(b) + 1,
            PossibleReads::Blocked => 0..0,
        };
        range.map(|b| b as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_always_any() {
        let io = IoModel::unbounded();
        assert_eq!(io.possible_reads(None).len(), 256);
        assert_eq!(io.initial_budget(), None);
    }

    #[test]
    fn test_budget_then_eof() {
        let io = IoModel::with_max_reads(1);
        assert_eq!(io.possible_reads(Some(1)), PossibleReads::Any);
        let eof = io.possible_reads(Some(0));
        assert_eq!(eof.len(), 1);
        assert_eq!(eof.iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_custom_eof_byte() {
        let io = IoModel::with_max_reads(0).eof_byte(255);
        assert_eq!(io.possible_reads(Some(0)).iter().collect::<Vec<_>>(), vec![255]);
    }

    #[test]
    fn test_no_change_on_eof_blocks() {
        let io = IoModel::with_max_reads(0).no_change_on_eof(true);
        let reads = io.possible_reads(Some(0));
        assert!(reads.is_empty());
        assert_eq!(reads.iter().count(), 0);
    }

    #[test]
    fn test_any_is_ascending_and_complete() {
        let all: Vec<u8> = PossibleReads::Any.iter().collect();
        assert_eq!(all.len(), 256);
        assert_eq!(all.first(), Some(&0));
        assert_eq!(all.last(), Some(&255));
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_serde_roundtrip_keeps_policy() {
        let io = IoModel::with_max_reads(5).eof_byte(7).no_change_on_eof(true);
        let json = serde_json::to_string(&io).unwrap();
        let back: IoModel = serde_json::from_str(&json).unwrap();
        assert_eq!(io, back);
    }
}
