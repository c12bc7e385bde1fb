/*!
Global pair-wise alignment over IUPAC letters.
This is a plain Needleman-Wunsch with a linear gap cost; end gaps are charged like any other gap, which keeps primers anchored toward the correct end of a read.
```
use sanger_con::sequence_alignment::{align, AlignedPosition, DEFAULT_GAP_PENALTY};
let alignment = align(b"ACGTACGT", b"ACGACGT", DEFAULT_GAP_PENALTY).unwrap();
assert_eq!(alignment.aligned1().sequence(), b"ACGTACGT");
assert_eq!(alignment.aligned2().sequence(), b"ACG-ACGT");
assert_eq!(alignment.aligned2().origins()[3], AlignedPosition::GapAfter(2));
```
*/

use log::trace;

use crate::consensus_error::{ConsensusError, ConsensusResult};
use crate::iupac::{self, GAP};

/// Default gap cost for read-to-read alignment
pub const DEFAULT_GAP_PENALTY: i32 = -6;

/// Where an aligned column came from in its source read
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AlignedPosition {
    /// The column holds the base at this index of the source read
    Base(usize),
    /// The column is a gap that follows the base at this index
    GapAfter(usize),
    /// The column is a gap before the first base of the source read
    GapBeforeStart
}

impl AlignedPosition {
    /// Legacy integer encoding: bases are their index, a gap after base `i` is `-(i+2)`, and a leading gap is `-1`.
    pub fn to_marker(self) -> i64 {
        match self {
            AlignedPosition::Base(i) => i as i64,
            AlignedPosition::GapAfter(i) => -(i as i64) - 2,
            AlignedPosition::GapBeforeStart => -1
        }
    }

    /// Inverse of `to_marker`
    pub fn from_marker(marker: i64) -> AlignedPosition {
        match marker {
            m if m >= 0 => AlignedPosition::Base(m as usize),
            -1 => AlignedPosition::GapBeforeStart,
            m => AlignedPosition::GapAfter((-m - 2) as usize)
        }
    }

    /// Returns the source index if this column holds a real base
    pub fn base_index(self) -> Option<usize> {
        match self {
            AlignedPosition::Base(i) => Some(i),
            _ => None
        }
    }

    pub fn is_gap(self) -> bool {
        !matches!(self, AlignedPosition::Base(_))
    }

    /// The marker a gap inserted immediately after this column should carry
    fn following_gap(self) -> AlignedPosition {
        match self {
            AlignedPosition::Base(i) | AlignedPosition::GapAfter(i) => AlignedPosition::GapAfter(i),
            AlignedPosition::GapBeforeStart => AlignedPosition::GapBeforeStart
        }
    }
}

/// One row of an alignment: the gapped sequence and where every column came from.
/// The two vectors are always the same length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AlignedSequence {
    /// The gapped sequence
    sequence: Vec<u8>,
    /// Source position for each column
    origins: Vec<AlignedPosition>
}

impl AlignedSequence {
    /// Wraps an ungapped read, every column maps straight to its base
    pub fn from_ungapped(sequence: &[u8]) -> AlignedSequence {
        AlignedSequence {
            sequence: sequence.to_vec(),
            origins: (0..sequence.len()).map(AlignedPosition::Base).collect()
        }
    }

    /// Derives the origins of a gapped sequence, '-' columns become gap markers
    pub fn from_gapped(sequence: &[u8]) -> AlignedSequence {
        let mut bases_seen: usize = 0;
        let origins = sequence.iter()
            .map(|&symbol| {
                if symbol == GAP {
                    if bases_seen == 0 {
                        AlignedPosition::GapBeforeStart
                    } else {
                        AlignedPosition::GapAfter(bases_seen - 1)
                    }
                } else {
                    bases_seen += 1;
                    AlignedPosition::Base(bases_seen - 1)
                }
            })
            .collect();

        AlignedSequence {
            sequence: sequence.to_vec(),
            origins
        }
    }

    /// Splices a gap column in at `column`, shifting everything at or after it to the right.
    /// # Panics
    /// * if `column` is past the end of the sequence
    pub fn insert_gap(&mut self, column: usize) {
        let marker = if column == 0 {
            AlignedPosition::GapBeforeStart
        } else {
            self.origins[column - 1].following_gap()
        };
        self.sequence.insert(column, GAP);
        self.origins.insert(column, marker);
    }

    // Getters
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn origins(&self) -> &[AlignedPosition] {
        &self.origins
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// True if the column holds a gap
    pub fn is_gap(&self, column: usize) -> bool {
        self.sequence[column] == GAP
    }

    /// The sequence with all gaps removed
    pub fn ungapped(&self) -> Vec<u8> {
        self.sequence.iter()
            .cloned()
            .filter(|&s| s != GAP)
            .collect()
    }
}

/// Result of aligning two sequences
#[derive(Clone, Debug, PartialEq)]
pub struct PairwiseAlignment {
    /// The first input with gaps
    aligned1: AlignedSequence,
    /// The second input with gaps
    aligned2: AlignedSequence,
    /// Total alignment score
    score: i32
}

impl PairwiseAlignment {
    // Getters
    pub fn aligned1(&self) -> &AlignedSequence {
        &self.aligned1
    }

    pub fn aligned2(&self) -> &AlignedSequence {
        &self.aligned2
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    /// Consumes the alignment, returning both rows
    pub fn into_sequences(self) -> (AlignedSequence, AlignedSequence) {
        (self.aligned1, self.aligned2)
    }
}

/// Returns the first and last columns where both rows hold something other than a gap.
/// Columns where both rows are gaps (primer-induced) never count, and `None` means the rows never overlap.
/// # Arguments
/// * `aligned1` - the first row
/// * `aligned2` - the second row, same length as the first
pub fn overlap_bounds(aligned1: &AlignedSequence, aligned2: &AlignedSequence) -> Option<(usize, usize)> {
    let length = aligned1.len().min(aligned2.len());
    let is_overlap = |&column: &usize| !aligned1.is_gap(column) && !aligned2.is_gap(column);
    let left = (0..length).find(is_overlap)?;
    let right = (0..length).rev().find(is_overlap)?;
    Some((left, right))
}

/// Globally aligns two IUPAC sequences with a linear gap penalty.
/// Traceback prefers diagonal, then a gap in `seq2`, then a gap in `seq1`, so results are deterministic.
/// # Arguments
/// * `seq1` - the first sequence
/// * `seq2` - the second sequence
/// * `gap_penalty` - cost added per gap column, expected to be negative
/// # Errors
/// * `EmptyInput` if both sequences are empty
/// # Examples
/// ```rust
/// use sanger_con::sequence_alignment::align;
/// let alignment = align(b"TTACGT", b"ACGT", -6).unwrap();
/// assert_eq!(alignment.aligned2().sequence(), b"--ACGT");
/// assert_eq!(alignment.score(), -4);
/// ```
pub fn align(seq1: &[u8], seq2: &[u8], gap_penalty: i32) -> ConsensusResult<PairwiseAlignment> {
    if seq1.is_empty() && seq2.is_empty() {
        return Err(ConsensusError::EmptyInput);
    }

    let l1 = seq1.len();
    let l2 = seq2.len();
    let width = l2 + 1;

    // first row and column carry cumulative gap costs, so end gaps are not free
    let mut scores: Vec<i32> = vec![0; (l1 + 1) * width];
    for (j, score) in scores.iter_mut().enumerate().take(width) {
        *score = j as i32 * gap_penalty;
    }
    for i in 1..=l1 {
        scores[i * width] = i as i32 * gap_penalty;
        for j in 1..=l2 {
            let diagonal = scores[(i - 1) * width + j - 1] + iupac::match_score(seq1[i - 1], seq2[j - 1]);
            let up = scores[(i - 1) * width + j] + gap_penalty;
            let left = scores[i * width + j - 1] + gap_penalty;
            scores[i * width + j] = diagonal.max(up).max(left);
        }
    }

    // walk back from the corner
    let mut rev1: Vec<u8> = Vec::with_capacity(l1 + l2);
    let mut rev2: Vec<u8> = Vec::with_capacity(l1 + l2);
    let (mut i, mut j) = (l1, l2);
    while i > 0 || j > 0 {
        let current = scores[i * width + j];
        if i > 0 && j > 0 && current == scores[(i - 1) * width + j - 1] + iupac::match_score(seq1[i - 1], seq2[j - 1]) {
            rev1.push(seq1[i - 1]);
            rev2.push(seq2[j - 1]);
            i -= 1;
            j -= 1;
        } else if i > 0 && current == scores[(i - 1) * width + j] + gap_penalty {
            rev1.push(seq1[i - 1]);
            rev2.push(GAP);
            i -= 1;
        } else {
            rev1.push(GAP);
            rev2.push(seq2[j - 1]);
            j -= 1;
        }
    }
    rev1.reverse();
    rev2.reverse();

    let score = scores[l1 * width + l2];
    trace!("Aligned {l1}x{l2} => {} columns, score {score}", rev1.len());

    Ok(PairwiseAlignment {
        aligned1: AlignedSequence::from_gapped(&rev1),
        aligned2: AlignedSequence::from_gapped(&rev2),
        score
    })
}
