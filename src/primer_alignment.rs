/*!
Locates PCR primers inside the reads.
For a pair of reads, each primer is aligned against one non-overlapping end of the read alignment, and any gap the primer needs inside that end gets spliced back into the read alignment.
For a single read, the primer is aligned against the whole read.
*/

use std::ops::{Range, RangeInclusive};

use log::debug;

use crate::consensus_error::{ConsensusError, ConsensusResult};
use crate::iupac::{self, GAP, TRIMMED};
use crate::sequence_alignment::{align, overlap_bounds, AlignedSequence};

/// Gap cost when aligning a primer against an end-gap region of a read pair
pub const END_GAP_PRIMER_GAP_PENALTY: i32 = -9;
/// Gap cost when aligning a primer against an entire single read
pub const SINGLE_READ_PRIMER_GAP_PENALTY: i32 = -12;

/// Which end of the alignment a primer anchors, which is also the direction it gets trimmed towards
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrimerEnd {
    Left,
    Right
}

/// Where a primer landed in the read alignment
#[derive(Clone, Debug, PartialEq)]
pub struct PrimerPlacement {
    /// The end of the alignment this primer belongs to
    end: PrimerEnd,
    /// The aligned read the primer was matched against
    read_index: usize,
    /// First alignment column covered by the primer
    first_column: usize,
    /// Last alignment column covered by the primer, inclusive
    last_column: usize,
    /// Fraction of primer letters that accept the read base they landed on
    match_fraction: f64
}

impl PrimerPlacement {
    pub fn new(end: PrimerEnd, read_index: usize, first_column: usize, last_column: usize, match_fraction: f64) -> PrimerPlacement {
        PrimerPlacement {
            end,
            read_index,
            first_column,
            last_column,
            match_fraction
        }
    }

    // Getters
    pub fn end(&self) -> PrimerEnd {
        self.end
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn first_column(&self) -> usize {
        self.first_column
    }

    pub fn last_column(&self) -> usize {
        self.last_column
    }

    pub fn match_fraction(&self) -> f64 {
        self.match_fraction
    }
}

/// The aligned primers along with where each one landed
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimerLayout {
    /// Same length as the read alignment; primer letters where a primer landed and spaces everywhere else
    aligned_primers: Vec<u8>,
    /// One entry per primer that could be placed
    placements: Vec<PrimerPlacement>
}

impl PrimerLayout {
    /// A layout where no primer was placed, all blank
    pub fn unplaced(length: usize) -> PrimerLayout {
        PrimerLayout {
            aligned_primers: vec![TRIMMED; length],
            placements: vec![]
        }
    }

    // Getters
    pub fn aligned_primers(&self) -> &[u8] {
        &self.aligned_primers
    }

    pub fn placements(&self) -> &[PrimerPlacement] {
        &self.placements
    }
}

/// Aligns both primers against the end-gap regions of a read pair.
/// The forward primer goes against the columns left of the overlap and the reverse complemented reverse primer against the columns right of it.
/// Gaps the primer alignment places inside a region are spliced into both reads, and the overlap is re-derived before the second primer is placed.
/// # Arguments
/// * `reads` - the two aligned reads, modified in place when gaps get spliced in
/// * `forward_index` - which of the two reads is the forward read
/// * `forward_primer` - the forward primer
/// * `reverse_primer` - the reverse primer as ordered (not reverse complemented)
/// # Errors
/// * `InvalidTraceCount` if `reads` does not hold exactly two rows
pub fn align_primers_to_end_gaps(reads: &mut [AlignedSequence], forward_index: usize, forward_primer: &[u8], reverse_primer: &[u8]) -> ConsensusResult<PrimerLayout> {
    if reads.len() != 2 {
        return Err(ConsensusError::InvalidTraceCount(reads.len()));
    }
    let reverse_index = 1 - forward_index;
    let mut layout = PrimerLayout::unplaced(reads[0].len());

    if let Some((left, _right)) = overlap_bounds(&reads[0], &reads[1]) {
        if let Some(placement) = place_primer(reads, &mut layout.aligned_primers, 0..left, forward_index, forward_primer, PrimerEnd::Left)? {
            layout.placements.push(placement);
        }
    }

    // splicing may have shifted the overlap, so look it up again
    if let Some((_left, right)) = overlap_bounds(&reads[0], &reads[1]) {
        let rc_primer = iupac::reverse_complement(reverse_primer);
        let region = (right + 1)..reads[0].len();
        if let Some(placement) = place_primer(reads, &mut layout.aligned_primers, region, reverse_index, &rc_primer, PrimerEnd::Right)? {
            layout.placements.push(placement);
        }
    }

    debug!("Primer placements: {:?}", layout.placements);
    Ok(layout)
}

/// Aligns one primer against the bases of one end-gap region and writes it into `aligned_primers`.
/// The region belongs to whichever read actually has bases there; `preferred_read` breaks ties.
/// Primer letters that hang off the read are not placed, but still count against the match fraction.
/// Returns None if there is nothing to align against.
fn place_primer(
    reads: &mut [AlignedSequence], aligned_primers: &mut Vec<u8>, region: Range<usize>,
    preferred_read: usize, primer: &[u8], end: PrimerEnd
) -> ConsensusResult<Option<PrimerPlacement>> {
    let other_read = 1 - preferred_read;
    let base_count = |read: &AlignedSequence| region.clone().filter(|&c| !read.is_gap(c)).count();
    let read_index = if base_count(&reads[other_read]) > base_count(&reads[preferred_read]) {
        other_read
    } else {
        preferred_read
    };

    let columns: Vec<usize> = region.clone()
        .filter(|&c| !reads[read_index].is_gap(c))
        .collect();
    if columns.is_empty() || primer.is_empty() {
        return Ok(None);
    }
    let region_bases: Vec<u8> = columns.iter()
        .map(|&c| reads[read_index].sequence()[c])
        .collect();

    let alignment = align(primer, &region_bases, END_GAP_PRIMER_GAP_PENALTY)?;
    let primer_row = alignment.aligned1().sequence();
    let region_row = alignment.aligned2().sequence();

    // both rows are non-empty, so these always exist
    let first_base = region_row.iter().position(|&c| c != GAP).unwrap_or(0);
    let last_base = region_row.iter().rposition(|&c| c != GAP).unwrap_or(0);
    let primer_start = primer_row.iter().position(|&c| c != GAP).unwrap_or(0);
    let primer_end = primer_row.iter().rposition(|&c| c != GAP).unwrap_or(0);
    // scored on the raw alignment so primer letters hanging off the read count as misses
    let match_fraction = primer_match_fraction(primer_row, region_row, primer_start..=primer_end);

    let mut inserted: usize = 0;
    let mut next_base: usize = 0;
    let mut previous_column: usize = 0;
    let mut placed_columns: Vec<usize> = vec![];
    for (i, (&p, &r)) in primer_row.iter().zip(region_row.iter()).enumerate() {
        let column = if r != GAP {
            let column = columns[next_base] + inserted;
            next_base += 1;
            column
        } else if i > first_base && i < last_base {
            // the primer needs a gap inside the read, splice it into the read alignment
            let column = previous_column + 1;
            for read in reads.iter_mut() {
                read.insert_gap(column);
            }
            aligned_primers.insert(column, TRIMMED);
            inserted += 1;
            column
        } else {
            // primer hangs off the end of the read, nothing to place it against
            continue;
        };

        previous_column = column;
        if (primer_start..=primer_end).contains(&i) {
            aligned_primers[column] = p;
            placed_columns.push(column);
        }
    }

    if inserted > 0 {
        debug!("Spliced {inserted} primer gap(s) into the read alignment");
    }

    match (placed_columns.first(), placed_columns.last()) {
        (Some(&first_column), Some(&last_column)) => {
            Ok(Some(PrimerPlacement::new(end, read_index, first_column, last_column, match_fraction)))
        },
        _ => Ok(None)
    }
}

/// Fraction of primer letters in `columns` that accept the read base in the same column.
/// Gap and blank columns of the primer row do not count, and a primer letter over a read gap is a miss; returns 0.0 when nothing counts.
/// # Arguments
/// * `aligned_primers` - the primer row
/// * `read` - the aligned read row the primer was matched against
/// * `columns` - the columns covered by the primer
pub fn primer_match_fraction(aligned_primers: &[u8], read: &[u8], columns: RangeInclusive<usize>) -> f64 {
    let (matches, total) = columns
        .filter(|&c| aligned_primers[c] != GAP && aligned_primers[c] != TRIMMED)
        .fold((0_usize, 0_usize), |(matches, total), c| {
            if iupac::primer_matches(aligned_primers[c], read[c]) {
                (matches + 1, total + 1)
            } else {
                (matches, total + 1)
            }
        });
    if total == 0 {
        0.0
    } else {
        matches as f64 / total as f64
    }
}

/// Aligns a primer against an entire single read.
/// The read row of the alignment replaces the read, and primer end gaps become spaces.
/// # Arguments
/// * `read` - the ungapped read
/// * `primer` - the primer, already oriented to match the read
/// * `end` - which end of the read the primer belongs to
/// # Errors
/// * `EmptyInput` if both the read and primer are empty
pub fn align_primer_to_read(read: &[u8], primer: &[u8], end: PrimerEnd) -> ConsensusResult<(AlignedSequence, PrimerLayout)> {
    let alignment = align(primer, read, SINGLE_READ_PRIMER_GAP_PENALTY)?;
    let (primer_row, read_row) = alignment.into_sequences();

    let mut aligned_primers = primer_row.sequence().to_vec();
    let primer_start = aligned_primers.iter().position(|&c| c != GAP);
    let primer_end = aligned_primers.iter().rposition(|&c| c != GAP);
    let placements = match (primer_start, primer_end) {
        (Some(start), Some(stop)) => {
            aligned_primers[..start].fill(TRIMMED);
            aligned_primers[(stop + 1)..].fill(TRIMMED);
            let match_fraction = primer_match_fraction(&aligned_primers, read_row.sequence(), start..=stop);
            vec![PrimerPlacement::new(end, 0, start, stop, match_fraction)]
        },
        _ => {
            aligned_primers.fill(TRIMMED);
            vec![]
        }
    };
    debug!("Single read primer placements: {placements:?}");

    Ok((read_row, PrimerLayout { aligned_primers, placements }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence_alignment::AlignedPosition;

    #[test]
    fn test_end_gap_primers_with_splice() {
        let mut reads = vec![
            AlignedSequence::from_gapped(b"GGGGGCCCCCACGTACGT---"),
            AlignedSequence::from_gapped(b"----------ACGTACGTAAT")
        ];
        // the forward primer carries a T the read does not have
        let layout = align_primers_to_end_gaps(&mut reads, 0, b"GGGGGTCCCCC", b"ATT").unwrap();

        assert_eq!(reads[0].sequence(), b"GGGGG-CCCCCACGTACGT---");
        assert_eq!(reads[1].sequence(), b"-----------ACGTACGTAAT");
        assert_eq!(reads[0].origins()[5], AlignedPosition::GapAfter(4));
        assert_eq!(reads[0].origins()[5].to_marker(), -6);
        assert_eq!(reads[1].origins()[5], AlignedPosition::GapBeforeStart);
        assert_eq!(reads[0].origins()[6], AlignedPosition::Base(5));

        assert_eq!(layout.aligned_primers(), b"GGGGGTCCCCC        AAT");
        assert_eq!(layout.aligned_primers().len(), reads[0].len());
        assert_eq!(layout.placements(), &[
            PrimerPlacement::new(PrimerEnd::Left, 0, 0, 10, 10.0 / 11.0),
            PrimerPlacement::new(PrimerEnd::Right, 1, 19, 21, 1.0)
        ]);
        assert_eq!(overlap_bounds(&reads[0], &reads[1]), Some((11, 18)));
    }

    #[test]
    fn test_end_gap_primer_with_internal_primer_gap() {
        let mut reads = vec![
            AlignedSequence::from_gapped(b"GGGGGTCCCCCACGTACGT"),
            AlignedSequence::from_gapped(b"-----------ACGTACGT")
        ];
        // the read carries a T the primer does not, so nothing is spliced
        let layout = align_primers_to_end_gaps(&mut reads, 0, b"GGGGGCCCCC", b"ATT").unwrap();
        assert_eq!(reads[0].sequence(), b"GGGGGTCCCCCACGTACGT");
        assert_eq!(layout.aligned_primers(), b"GGGGG-CCCCC        ");
        assert_eq!(layout.placements(), &[PrimerPlacement::new(PrimerEnd::Left, 0, 0, 10, 1.0)]);
    }

    #[test]
    fn test_end_gap_region_owned_by_other_read() {
        // the reverse read extends past the forward read on the left
        let mut reads = vec![
            AlignedSequence::from_gapped(b"-----ACGTACGT"),
            AlignedSequence::from_gapped(b"GGGCCACGTACGT")
        ];
        let layout = align_primers_to_end_gaps(&mut reads, 0, b"GGGCC", b"TTT").unwrap();
        assert_eq!(layout.aligned_primers(), b"GGGCC        ");
        assert_eq!(layout.placements(), &[PrimerPlacement::new(PrimerEnd::Left, 1, 0, 4, 1.0)]);
    }

    #[test]
    fn test_end_gap_primer_overhang_counts_as_mismatch() {
        let mut reads = vec![
            AlignedSequence::from_gapped(b"TACGACGTACGTACGT"),
            AlignedSequence::from_gapped(b"----ACGTACGTACGT")
        ];
        // only the last four primer letters find a base in the end-gap region
        let layout = align_primers_to_end_gaps(&mut reads, 0, b"GGGGGGGGTACG", b"ACG").unwrap();
        assert_eq!(reads[0].sequence(), b"TACGACGTACGTACGT");
        assert_eq!(&layout.aligned_primers()[..4], b"TACG");
        assert_eq!(layout.placements()[0], PrimerPlacement::new(PrimerEnd::Left, 0, 0, 3, 4.0 / 12.0));

        // the single read path agrees that the overhang is a miss
        let (_aligned, single) = align_primer_to_read(b"TACG", b"GGGGGGGGTACG", PrimerEnd::Left).unwrap();
        assert_eq!(single.placements()[0].match_fraction(), 4.0 / 12.0);
    }

    #[test]
    fn test_no_overlap() {
        let mut reads = vec![
            AlignedSequence::from_gapped(b"ACGT----"),
            AlignedSequence::from_gapped(b"----ACGT")
        ];
        let layout = align_primers_to_end_gaps(&mut reads, 0, b"ACGT", b"ACGT").unwrap();
        assert_eq!(layout.aligned_primers(), b"        ");
        assert!(layout.placements().is_empty());
    }

    #[test]
    fn test_match_fraction() {
        // degenerate primer letters accept any base they cover, gaps in the primer row do not count
        assert_eq!(primer_match_fraction(b"ARG-T", b"AAGCC", 0..=4), 0.75);
        assert_eq!(primer_match_fraction(b"  ACG", b"TTACG", 2..=4), 1.0);
        assert_eq!(primer_match_fraction(b"--", b"AC", 0..=1), 0.0);
    }

    #[test]
    fn test_wrong_read_count() {
        let mut reads = vec![AlignedSequence::from_gapped(b"ACGT")];
        assert!(matches!(
            align_primers_to_end_gaps(&mut reads, 0, b"AC", b"GT"),
            Err(ConsensusError::InvalidTraceCount(1))
        ));
    }

    #[test]
    fn test_single_read_primer() {
        let read = b"TTGGGGGCCCCCATATATAT";
        let (aligned, layout) = align_primer_to_read(read, b"GGGGGCCCCC", PrimerEnd::Left).unwrap();
        assert_eq!(aligned.sequence(), read);
        assert_eq!(layout.aligned_primers(), b"  GGGGGCCCCC        ");
        assert_eq!(layout.placements(), &[PrimerPlacement::new(PrimerEnd::Left, 0, 2, 11, 1.0)]);
    }

    #[test]
    fn test_single_read_primer_right_end() {
        let (aligned, layout) = align_primer_to_read(b"ATATATGGGCCC", b"GGGCCC", PrimerEnd::Right).unwrap();
        assert_eq!(aligned.sequence(), b"ATATATGGGCCC");
        assert_eq!(aligned.origins()[11], AlignedPosition::Base(11));
        assert_eq!(layout.aligned_primers(), b"      GGGCCC");
        assert_eq!(layout.placements(), &[PrimerPlacement::new(PrimerEnd::Right, 0, 6, 11, 1.0)]);
    }
}
