/*!
Static IUPAC nucleotide tables.
Every letter is encoded once as a bitmask over {A, C, G, T}; ambiguity classes, complements, and match scores all fall out of the mask.
```
use sanger_con::iupac::{base_mask, complement, reverse_complement};
assert_eq!(base_mask(b'R'), base_mask(b'A') | base_mask(b'G'));
assert_eq!(complement(b'R'), b'Y');
assert_eq!(reverse_complement(b"ACGTN-"), b"-NACGT".to_vec());
```
*/

pub const MASK_A: u8 = 0b0001;
pub const MASK_C: u8 = 0b0010;
pub const MASK_G: u8 = 0b0100;
pub const MASK_T: u8 = 0b1000;
pub const MASK_N: u8 = 0b1111;

/// Gap symbol used inside alignments
pub const GAP: u8 = b'-';
/// Marks a trimmed position in a consensus
pub const TRIMMED: u8 = b' ';
/// Fully ambiguous base
pub const NO_CALL: u8 = b'N';

/// Score for two identical symbols
pub const MATCH_SCORE: i32 = 2;
/// Score for two different symbols whose base sets overlap
pub const PARTIAL_MATCH_SCORE: i32 = 1;
/// Score for two symbols with disjoint base sets
pub const MISMATCH_SCORE: i32 = -1;

/// Bases in the order used for posterior calculations; ties resolve to the earliest entry
pub const BAYES_ORDER: [u8; 4] = [b'A', b'T', b'G', b'C'];
/// Masks matching `BAYES_ORDER`
pub const BAYES_MASKS: [u8; 4] = [MASK_A, MASK_T, MASK_G, MASK_C];

/// Mask -> canonical letter, index 0 is unused
const SYMBOLS: [u8; 16] = [
    0, b'A', b'C', b'M', b'G', b'R', b'S', b'V',
    b'T', b'W', b'Y', b'H', b'K', b'D', b'B', b'N'
];

const fn build_mask_table() -> [u8; 256] {
    let mut table = [0_u8; 256];
    let mut mask = 1;
    while mask < 16 {
        table[SYMBOLS[mask] as usize] = mask as u8;
        mask += 1;
    }
    table
}

static MASK_TABLE: [u8; 256] = build_mask_table();

/// Returns the {A,C,G,T} bitmask for an upper-case IUPAC letter, or 0 for anything else (gaps, spaces, junk).
#[inline]
pub fn base_mask(symbol: u8) -> u8 {
    MASK_TABLE[symbol as usize]
}

/// Returns the letter for a non-zero mask
#[inline]
pub fn symbol_for_mask(mask: u8) -> u8 {
    SYMBOLS[(mask & MASK_N) as usize]
}

/// True for any upper-case IUPAC nucleotide letter, including N
#[inline]
pub fn is_iupac(symbol: u8) -> bool {
    base_mask(symbol) != 0
}

/// True for symbols that may appear in a consensus: IUPAC letters and the trimmed marker
#[inline]
pub fn is_consensus_symbol(symbol: u8) -> bool {
    is_iupac(symbol) || symbol == TRIMMED
}

/// Number of nucleotides a letter stands for, 0 for non-IUPAC symbols
#[inline]
pub fn ambiguity_count(symbol: u8) -> u32 {
    base_mask(symbol).count_ones()
}

fn complement_mask(mask: u8) -> u8 {
    ((mask & MASK_A) << 3) | ((mask & MASK_T) >> 3) | ((mask & MASK_C) << 1) | ((mask & MASK_G) >> 1)
}

/// Complements a single IUPAC letter; gaps and spaces pass through untouched
pub fn complement(symbol: u8) -> u8 {
    match base_mask(symbol) {
        0 => symbol,
        mask => symbol_for_mask(complement_mask(mask))
    }
}

/// Reverse complements a sequence of IUPAC letters
pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence.iter()
        .rev()
        .map(|&s| complement(s))
        .collect()
}

/// Alignment score between two symbols.
/// Identical symbols score `MATCH_SCORE`, overlapping base sets score `PARTIAL_MATCH_SCORE`, anything else is a mismatch.
#[inline]
pub fn match_score(s1: u8, s2: u8) -> i32 {
    if s1 == s2 {
        MATCH_SCORE
    } else if base_mask(s1) & base_mask(s2) != 0 {
        PARTIAL_MATCH_SCORE
    } else {
        MISMATCH_SCORE
    }
}

/// True if every nucleotide `base` could be is also allowed by `primer_symbol`.
/// For two plain letters this is simple equality, but a degenerate primer position (e.g. R) accepts A, G, or R.
pub fn primer_matches(primer_symbol: u8, base: u8) -> bool {
    let base_bits = base_mask(base);
    base_bits != 0 && base_bits & !base_mask(primer_symbol) == 0
}
