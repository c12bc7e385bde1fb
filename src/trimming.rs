/*!
Post-consensus trimming.
Trimming never shortens the consensus, it overwrites columns with spaces so the coordinates stay lined up with the alignment.
```
use sanger_con::trimming::quality_trim;
let mut consensus = b"NANNCNCNNGANANNAANNANG".to_vec();
quality_trim(&mut consensus, 4, 3);
assert_eq!(&consensus, b"         GANA         ");
```
*/

use itertools::Itertools;
use log::debug;

use crate::iupac::{NO_CALL, TRIMMED};
use crate::primer_alignment::{PrimerEnd, PrimerLayout};

/// Blanks out every located primer, along with anything between it and its end of the consensus.
/// Primers whose match fraction falls below `threshold` are left alone.
/// # Arguments
/// * `consensus` - the consensus to trim, same length as the primer row
/// * `layout` - the primer layout from primer alignment
/// * `threshold` - minimum match fraction for a primer to be trimmed
pub fn trim_primers(consensus: &mut [u8], layout: &PrimerLayout, threshold: f64) {
    for placement in layout.placements().iter() {
        if placement.match_fraction() < threshold {
            debug!("Primer at {:?} matched {:.3} < {threshold}, not trimmed", placement.end(), placement.match_fraction());
            continue;
        }

        let columns = match placement.end() {
            PrimerEnd::Left => 0..(placement.last_column() + 1).min(consensus.len()),
            PrimerEnd::Right => placement.first_column().min(consensus.len())..consensus.len()
        };
        debug!("Primer at {:?} matched {:.3}, trimming {columns:?}", placement.end(), placement.match_fraction());
        consensus[columns].fill(TRIMMED);
    }
}

/// Blanks out every column outside the inclusive overlap `[left, right]`.
pub fn trim_end_gaps(consensus: &mut [u8], left: usize, right: usize) {
    let left = left.min(consensus.len());
    consensus[..left].fill(TRIMMED);
    if right + 1 < consensus.len() {
        consensus[(right + 1)..].fill(TRIMMED);
    }
}

/// Sliding-window quality trim over the untrimmed columns.
/// Every untrimmed letter except N counts as good.
/// From each end, the window moves inward until it holds at least `basecnt` good letters, and everything outside the two accepted windows is blanked.
/// If no window qualifies, or there are fewer untrimmed letters than `winsize`, the whole consensus is blanked.
/// # Arguments
/// * `consensus` - the consensus to trim
/// * `winsize` - window length
/// * `basecnt` - good letters required inside a window
pub fn quality_trim(consensus: &mut [u8], winsize: usize, basecnt: usize) {
    let kept: Vec<usize> = consensus.iter()
        .positions(|&c| c != TRIMMED)
        .collect();
    let good: Vec<bool> = kept.iter()
        .map(|&i| consensus[i] != NO_CALL)
        .collect();

    let bounds = if winsize == 0 || kept.len() < winsize {
        None
    } else {
        let qualifies = |window: &[bool]| window.iter().filter(|&&g| g).count() >= basecnt;
        match (good.windows(winsize).position(qualifies), good.windows(winsize).rposition(qualifies)) {
            (Some(start), Some(last_start)) => Some((start, last_start + winsize - 1)),
            _ => None
        }
    };

    match bounds {
        Some((start, end)) => {
            debug!("Quality trim keeps untrimmed letters {start}..={end} of {}", kept.len());
            for &i in kept[..start].iter().chain(kept[(end + 1)..].iter()) {
                consensus[i] = TRIMMED;
            }
        },
        None => {
            debug!("Quality trim found no qualifying window, trimming everything");
            for &i in kept.iter() {
                consensus[i] = TRIMMED;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primer_alignment::{align_primer_to_read, PrimerEnd};

    #[test]
    fn test_quality_trim_single_read() {
        let mut consensus = b"NNNNTNNCTNACATGANTTANN".to_vec();
        quality_trim(&mut consensus, 6, 6);
        assert_eq!(&consensus, b"          ACATGA      ");
    }

    #[test]
    fn test_quality_trim_boundary() {
        let mut consensus = b"NANNCNCNNGANANNAANNANG".to_vec();
        quality_trim(&mut consensus, 4, 3);
        assert_eq!(&consensus, b"         GANA         ");

        // nothing qualifies
        let mut consensus = b"NANNCNCNNGANANNAANNANG".to_vec();
        quality_trim(&mut consensus, 4, 4);
        assert_eq!(&consensus, &[b' '; 22]);
    }

    #[test]
    fn test_quality_trim_skips_blanks() {
        // blank columns are invisible to the windows but keep their place
        let mut consensus = b"NN  ACGT  NN".to_vec();
        quality_trim(&mut consensus, 2, 2);
        assert_eq!(&consensus, b"    ACGT    ");

        let mut consensus = b"ACG".to_vec();
        quality_trim(&mut consensus, 4, 1);
        assert_eq!(&consensus, b"   ");
    }

    #[test]
    fn test_trim_end_gaps() {
        let mut consensus = b"AACGTTGCAA".to_vec();
        trim_end_gaps(&mut consensus, 2, 7);
        assert_eq!(&consensus, b"  CGTTGC  ");

        let mut consensus = b"ACGT".to_vec();
        trim_end_gaps(&mut consensus, 0, 3);
        assert_eq!(&consensus, b"ACGT");
    }

    #[test]
    fn test_trim_primers() {
        let (_aligned, layout) = align_primer_to_read(b"TTGGGGGCCCCCATATATAT", b"GGGGGCCCCC", PrimerEnd::Left).unwrap();
        let mut consensus = b"TTGGGGGCCCCCATATATAT".to_vec();
        trim_primers(&mut consensus, &layout, 0.8);
        assert_eq!(&consensus, b"            ATATATAT");

        // a perfect match still falls short of an impossible threshold
        let mut consensus = b"TTGGGGGCCCCCATATATAT".to_vec();
        trim_primers(&mut consensus, &layout, 1.1);
        assert_eq!(&consensus, b"TTGGGGGCCCCCATATATAT");
    }

    #[test]
    fn test_trim_primers_right_end() {
        let (_aligned, layout) = align_primer_to_read(b"ATATATGGGCCCTT", b"GGGCCC", PrimerEnd::Right).unwrap();
        let mut consensus = b"ATATATGGGCCCTT".to_vec();
        trim_primers(&mut consensus, &layout, 0.8);
        assert_eq!(&consensus, b"ATATAT        ");
    }
}
