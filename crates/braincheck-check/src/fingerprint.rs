//! FP64 polynomial rolling hash (Rabin fingerprint)
//!
//! Machine states are identified by a 64-bit fingerprint computed with a
//! byte-at-a-time polynomial hash over GF(2). Fingerprints are
//! deterministic across runs and platforms, which keeps state numbering in
//! graph dumps and logged hashes reproducible.
//!
//! # Memory digest
//!
//! Re-hashing the whole tape on every transition would make long paths
//! quadratic. Instead every non-zero cell contributes an independent
//! fingerprint and the tape digest is their wrapping sum. Changing one cell
//! subtracts the old contribution and adds the new one, so a transition
//! updates the digest in O(1). A zero cell contributes nothing, which is
//! exactly the canonical sparse form: touched-then-cleared and never-touched
//! cells hash alike.

use braincheck_core::MemPtr;

/// Irreducible polynomial, also the fingerprint of the empty byte string
pub const FP64_INIT: u64 = 0x911498AE0E66BAD6;

const ONE: u64 = 0x8000000000000000;
const X63: u64 = 0x1;

/// Precomputed byte mod table, built on first use
static BYTE_MOD_TABLE: std::sync::OnceLock<[u64; 256]> = std::sync::OnceLock::new();

#[inline]
fn get_byte_mod_table() -> &'static [u64; 256] {
    BYTE_MOD_TABLE.get_or_init(|| compute_byte_mod_table(FP64_INIT))
}

/// Remainder modulo the polynomial of each byte shifted out of a fingerprint
fn compute_byte_mod_table(irred_poly: u64) -> [u64; 256] {
    // Highest power needed is 127 - 7*8 = 71
    const PLENGTH: usize = 72;
    let mut power_table = [0u64; PLENGTH];

    // power_table[i] = x^i mod irred_poly
    let mut t = ONE;
    for entry in power_table.iter_mut() {
        *entry = t;
        let mask = if (t & X63) != 0 { irred_poly } else { 0 };
        t = (t >> 1) ^ mask;
    }

    let mut table = [0u64; 256];
    for (j, entry) in table.iter_mut().enumerate() {
        let mut v = 0u64;
        for k in 0..=7 {
            if (j & (1usize << k)) != 0 {
                v ^= power_table[127 - 7 * 8 - k];
            }
        }
        *entry = v;
    }
    table
}

/// Extend a fingerprint by one byte.
#[inline]
pub fn fp64_extend_byte(fp: u64, b: u8) -> u64 {
    let table = get_byte_mod_table();
    let idx = ((b as u64) ^ fp) as usize & 0xFF;
    (fp >> 8) ^ table[idx]
}

/// Extend a fingerprint by a u64 (8 bytes, little-endian).
#[inline]
pub fn fp64_extend_u64(mut fp: u64, x: u64) -> u64 {
    for b in x.to_le_bytes() {
        fp = fp64_extend_byte(fp, b);
    }
    fp
}

/// Extend a fingerprint by a position or pointer.
///
/// Always hashed as 8 bytes so fingerprints agree between 32 and 64-bit hosts.
#[inline]
pub fn fp64_extend_usize(fp: u64, x: usize) -> u64 {
    fp64_extend_u64(fp, x as u64)
}

/// Contribution of one tape cell to the memory digest.
///
/// Zero cells contribute nothing.
#[inline]
pub fn cell_digest(ptr: MemPtr, value: u8) -> u64 {
    if value == 0 {
        return 0;
    }
    fp64_extend_byte(fp64_extend_usize(FP64_INIT, ptr), value)
}

/// Memory digest computed from scratch over `(ptr, value)` pairs.
pub fn memory_digest(cells: impl IntoIterator<Item = (MemPtr, u8)>) -> u64 {
    cells
        .into_iter()
        .fold(0u64, |acc, (ptr, value)| acc.wrapping_add(cell_digest(ptr, value)))
}

/// Memory digest after changing the cell at `ptr` from `old` to `new`.
#[inline]
pub fn update_memory_digest(digest: u64, ptr: MemPtr, old: u8, new: u8) -> u64 {
    digest
        .wrapping_sub(cell_digest(ptr, old))
        .wrapping_add(cell_digest(ptr, new))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_mod_table_initialization() {
        let table = get_byte_mod_table();
        assert_eq!(table.len(), 256);
        // no bits set, no contribution
        assert_eq!(table[0], 0);
    }

    #[test]
    fn test_fp64_extend_byte() {
        let fp = FP64_INIT;
        let fp2 = fp64_extend_byte(fp, 0);
        assert_ne!(fp, fp2);
        assert_eq!(fp2, fp64_extend_byte(fp, 0));
    }

    #[test]
    fn test_fp64_extend_u64() {
        let fp1 = fp64_extend_u64(FP64_INIT, 42);
        assert_eq!(fp1, fp64_extend_u64(FP64_INIT, 42));
        assert_ne!(fp1, fp64_extend_u64(FP64_INIT, 43));
        assert_eq!(fp64_extend_usize(FP64_INIT, 42), fp1);
    }

    #[test]
    fn test_zero_cell_contributes_nothing() {
        assert_eq!(cell_digest(17, 0), 0);
        assert_eq!(
            memory_digest([(1, 5), (2, 0)]),
            memory_digest([(1, 5)])
        );
    }

    #[test]
    fn test_memory_digest_is_order_independent() {
        let a = memory_digest([(0, 1), (1, 2), (3, 9)]);
        let b = memory_digest([(3, 9), (0, 1), (1, 2)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_incremental_update_matches_recompute() {
        let before = memory_digest([(0, 1), (4, 200)]);
        let after = update_memory_digest(before, 4, 200, 3);
        assert_eq!(after, memory_digest([(0, 1), (4, 3)]));

        let cleared = update_memory_digest(after, 0, 1, 0);
        assert_eq!(cleared, memory_digest([(4, 3)]));
    }

    #[test]
    fn test_cells_distinguished_by_position_and_value() {
        assert_ne!(cell_digest(0, 1), cell_digest(1, 1));
        assert_ne!(cell_digest(0, 1), cell_digest(0, 2));
    }
}
