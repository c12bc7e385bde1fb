/*!
This module provides the ConsensusBuilder, which turns one or two called reads into a single consensus with per-column confidence.
The pipeline is alignment, then primer placement, then the consensus algorithm, then trimming.

# Example usage
```rust
use sanger_con::consensus::ConsensusBuilder;
use sanger_con::consensus_config::ConsensusSettingsBuilder;
use sanger_con::trace::SangerTrace;

let trace = SangerTrace::new(
    b"AAGCTACCTGACATGATTTACG",
    &[5, 4, 20, 24, 34, 12, 8, 30, 32, 16, 34, 40, 52, 61, 61, 61, 28, 61, 46, 32, 12, 24]
).unwrap();
let settings = ConsensusSettingsBuilder::default()
    .trim_consensus(false)
    .build().unwrap();

let builder = ConsensusBuilder::new(vec![trace], settings).unwrap();
assert_eq!(builder.consensus(), b"NNNNTNNCTNACATGANTTANN");
assert_eq!(builder.compact_consensus(), b"NNNNTNNCTNACATGANTTANN".to_vec());
```
*/

use log::{debug, trace};

use crate::consensus_config::{ConsensusAlgorithm, ConsensusSettings};
use crate::consensus_error::{ConsensusError, ConsensusResult};
use crate::iupac::{self, BAYES_MASKS, BAYES_ORDER, GAP, NO_CALL, TRIMMED};
use crate::primer_alignment::{align_primer_to_read, align_primers_to_end_gaps, PrimerEnd, PrimerLayout};
use crate::sequence_alignment::{align, overlap_bounds, AlignedPosition, AlignedSequence, DEFAULT_GAP_PENALTY};
use crate::trace::{SangerTrace, TraceSource};
use crate::trimming;

/// Added to posterior confidences so a value that should land exactly on the threshold does not fall just short of it
pub const CONFIDENCE_EPSILON: f64 = 1e-6;
/// Confidence assigned to columns where no read offers a usable base
pub const NO_CALL_CONFIDENCE: f64 = 1.0;

/// Everything a pipeline run produces; replaced as a whole so a failed run leaves the last good one in place
#[derive(Clone, Debug, Default)]
struct ConsensusState {
    /// One aligned row per trace
    aligned: Vec<AlignedSequence>,
    /// Primer row and placements, same length as the alignment
    primer_layout: PrimerLayout,
    /// The working consensus, spaces mark trimmed columns
    consensus: Vec<u8>,
    /// Confidence per consensus column
    confidence: Vec<f64>,
    /// First and last columns where no aligned row holds a gap
    end_gap_starts: Option<(usize, usize)>
}

/// Builds and holds the consensus for one or two traces.
/// The traces are owned for the life of the builder and never modified.
#[derive(Clone, Debug)]
pub struct ConsensusBuilder<T: TraceSource = SangerTrace> {
    /// The input reads
    traces: Vec<T>,
    /// Settings snapshot used by `recompute`
    settings: ConsensusSettings,
    /// Output of the last successful pipeline run
    state: ConsensusState
}

impl<T: TraceSource> ConsensusBuilder<T> {
    /// Creates a builder and runs the pipeline once.
    /// # Arguments
    /// * `traces` - one read, or a forward and reverse read; the reverse read is expected to already be reverse complemented
    /// * `settings` - the settings snapshot to build with
    /// # Errors
    /// * `InvalidTraceCount` if there are not one or two traces
    /// * `EmptyInput` if two traces are given and both are empty
    pub fn new(traces: Vec<T>, settings: ConsensusSettings) -> ConsensusResult<ConsensusBuilder<T>> {
        if traces.is_empty() || traces.len() > 2 {
            return Err(ConsensusError::InvalidTraceCount(traces.len()));
        }
        let state = compute_state(&traces, &settings)?;
        Ok(ConsensusBuilder {
            traces,
            settings,
            state
        })
    }

    /// Re-runs the full pipeline with the current settings snapshot.
    /// On failure the previous consensus is left untouched.
    /// # Errors
    /// * if alignment fails
    pub fn recompute(&mut self) -> ConsensusResult<()> {
        let state = compute_state(&self.traces, &self.settings)?;
        self.state = state;
        Ok(())
    }

    /// Replaces the settings snapshot. Nothing is rebuilt until `recompute` is called.
    pub fn update_settings(&mut self, settings: ConsensusSettings) {
        self.settings = settings;
    }

    /// True if `settings` differs from the snapshot this builder holds, meaning the caller should update and recompute.
    pub fn is_stale(&self, settings: &ConsensusSettings) -> bool {
        settings.revision() != self.settings.revision() || settings != &self.settings
    }

    /// Replaces the whole consensus string, keeping the confidences.
    /// # Errors
    /// * `LengthMismatch` if the length differs from the current consensus
    /// * `BadCharacters` if anything other than IUPAC letters and spaces is present
    pub fn set_consensus(&mut self, consensus: &[u8]) -> ConsensusResult<()> {
        if consensus.len() != self.state.consensus.len() {
            return Err(ConsensusError::LengthMismatch { expected: self.state.consensus.len(), actual: consensus.len() });
        }
        check_consensus_symbols(consensus)?;
        self.state.consensus.copy_from_slice(consensus);
        Ok(())
    }

    /// Overwrites part of the consensus starting at `start`.
    /// # Errors
    /// * `InvalidRange` if the data runs past the end of the consensus
    /// * `BadCharacters` if anything other than IUPAC letters and spaces is present
    pub fn set_consensus_range(&mut self, start: usize, data: &[u8]) -> ConsensusResult<()> {
        let len = self.state.consensus.len();
        if start + data.len() > len {
            return Err(ConsensusError::InvalidRange { start, end: start + data.len(), len });
        }
        check_consensus_symbols(data)?;
        self.state.consensus[start..(start + data.len())].copy_from_slice(data);
        Ok(())
    }

    // Getters
    pub fn consensus(&self) -> &[u8] {
        &self.state.consensus
    }

    /// Returns the consensus over the inclusive column range `[start, end]`.
    /// # Errors
    /// * `InvalidRange` if the range is reversed or runs past the end
    pub fn consensus_range(&self, start: usize, end: usize) -> ConsensusResult<&[u8]> {
        let len = self.state.consensus.len();
        if start > end || end >= len {
            return Err(ConsensusError::InvalidRange { start, end, len });
        }
        Ok(&self.state.consensus[start..=end])
    }

    /// The consensus with all trimmed columns removed
    pub fn compact_consensus(&self) -> Vec<u8> {
        self.state.consensus.iter()
            .cloned()
            .filter(|&c| c != TRIMMED)
            .collect()
    }

    pub fn confidence(&self) -> &[f64] {
        &self.state.confidence
    }

    /// # Errors
    /// * `InvalidSequenceIndex` if `index` is not a read of this builder
    pub fn aligned_sequence(&self, index: usize) -> ConsensusResult<&AlignedSequence> {
        self.state.aligned.get(index)
            .ok_or(ConsensusError::InvalidSequenceIndex { index, count: self.state.aligned.len() })
    }

    /// Maps an alignment column back to where it came from in a read.
    /// # Errors
    /// * `InvalidSequenceIndex` if `index` is not a read of this builder
    /// * `InvalidRange` if `column` is past the end of the alignment
    pub fn actual_source_index(&self, index: usize, column: usize) -> ConsensusResult<AlignedPosition> {
        let aligned = self.aligned_sequence(index)?;
        aligned.origins().get(column)
            .copied()
            .ok_or(ConsensusError::InvalidRange { start: column, end: column, len: aligned.len() })
    }

    pub fn aligned_primers(&self) -> &[u8] {
        self.state.primer_layout.aligned_primers()
    }

    pub fn primer_layout(&self) -> &PrimerLayout {
        &self.state.primer_layout
    }

    /// First column where no aligned read holds a gap, None if there is no such column
    pub fn left_end_gap_start(&self) -> Option<usize> {
        self.state.end_gap_starts.map(|(left, _)| left)
    }

    /// Last column where no aligned read holds a gap, None if there is no such column
    pub fn right_end_gap_start(&self) -> Option<usize> {
        self.state.end_gap_starts.map(|(_, right)| right)
    }

    pub fn num_sequences(&self) -> usize {
        self.traces.len()
    }

    /// # Errors
    /// * `InvalidSequenceIndex` if `index` is not a read of this builder
    pub fn trace(&self, index: usize) -> ConsensusResult<&T> {
        self.traces.get(index)
            .ok_or(ConsensusError::InvalidSequenceIndex { index, count: self.traces.len() })
    }

    pub fn settings(&self) -> &ConsensusSettings {
        &self.settings
    }
}

fn check_consensus_symbols(data: &[u8]) -> ConsensusResult<()> {
    if data.iter().all(|&c| iupac::is_consensus_symbol(c)) {
        Ok(())
    } else {
        Err(ConsensusError::BadCharacters(String::from_utf8_lossy(data).into_owned()))
    }
}

/// The read that was sequenced in the forward direction; if both or neither are flagged, the first one
fn forward_read_index<T: TraceSource>(traces: &[T]) -> usize {
    traces.iter()
        .position(|t| !t.is_reverse_complemented())
        .unwrap_or(0)
}

/// First and last columns where no row holds a gap
fn end_gap_bounds(aligned: &[AlignedSequence]) -> Option<(usize, usize)> {
    match aligned {
        [read1, read2] => overlap_bounds(read1, read2),
        [read] => {
            let left = read.sequence().iter().position(|&c| c != GAP)?;
            let right = read.sequence().iter().rposition(|&c| c != GAP)?;
            Some((left, right))
        },
        _ => None
    }
}

/// Runs the whole pipeline without touching any existing builder state
fn compute_state<T: TraceSource>(traces: &[T], settings: &ConsensusSettings) -> ConsensusResult<ConsensusState> {
    let qualities: Vec<Vec<u8>> = traces.iter()
        .map(|t| t.confidences())
        .collect();

    let mut aligned: Vec<AlignedSequence> = match traces {
        [trace1, trace2] => {
            let (aligned1, aligned2) = align(trace1.base_calls(), trace2.base_calls(), DEFAULT_GAP_PENALTY)?.into_sequences();
            vec![aligned1, aligned2]
        },
        [trace1] => vec![AlignedSequence::from_ungapped(trace1.base_calls())],
        _ => return Err(ConsensusError::InvalidTraceCount(traces.len()))
    };
    debug!("Aligned {} read(s) into {} columns", aligned.len(), aligned[0].len());

    let primer_layout = if settings.has_primers() {
        let forward_primer = settings.forward_primer().as_bytes();
        let reverse_primer = settings.reverse_primer().as_bytes();
        if aligned.len() == 2 {
            align_primers_to_end_gaps(&mut aligned, forward_read_index(traces), forward_primer, reverse_primer)?
        } else {
            let (primer, end) = if traces[0].is_reverse_complemented() {
                (iupac::reverse_complement(reverse_primer), PrimerEnd::Right)
            } else {
                (forward_primer.to_vec(), PrimerEnd::Left)
            };
            let (read_row, layout) = align_primer_to_read(traces[0].base_calls(), &primer, end)?;
            aligned[0] = read_row;
            layout
        }
    } else {
        PrimerLayout::unplaced(aligned[0].len())
    };

    let end_gap_starts = end_gap_bounds(&aligned);
    debug!("End gap starts: {end_gap_starts:?}");

    let (mut consensus, confidence) = match settings.consensus_algorithm() {
        ConsensusAlgorithm::Bayesian => bayesian_consensus(&aligned, &qualities, settings.min_confscore()),
        ConsensusAlgorithm::Legacy => legacy_consensus(&aligned, &qualities, settings.min_confscore())
    };

    if settings.trim_consensus() {
        if settings.trim_primers() && settings.has_primers() {
            trimming::trim_primers(&mut consensus, &primer_layout, settings.primer_match_threshold());
        }
        if settings.trim_endgaps() && aligned.len() == 2 {
            match end_gap_starts {
                Some((left, right)) => trimming::trim_end_gaps(&mut consensus, left, right),
                None => debug!("Reads do not overlap, skipping end gap trimming")
            }
        }
        if settings.do_qualitytrim() {
            trimming::quality_trim(&mut consensus, settings.qualitytrim_winsize(), settings.qualitytrim_basecnt());
        }
    }

    Ok(ConsensusState {
        aligned,
        primer_layout,
        consensus,
        confidence,
        end_gap_starts
    })
}

/// One read's letter and quality at a column; gaps carry quality 0
#[derive(Clone, Copy, Debug)]
struct ColumnEntry {
    symbol: u8,
    quality: f64
}

impl ColumnEntry {
    fn new(read: &AlignedSequence, qualities: &[u8], column: usize) -> ColumnEntry {
        let quality = read.origins()[column].base_index()
            .map(|i| qualities[i] as f64)
            .unwrap_or(0.0);
        ColumnEntry {
            symbol: read.sequence()[column],
            quality
        }
    }

    fn is_gap(&self) -> bool {
        self.symbol == GAP
    }

    /// A letter that can inform the posterior, i.e. anything but a gap or N
    fn is_usable(&self) -> bool {
        self.symbol != GAP && self.symbol != NO_CALL
    }
}

/// Probability of each base in `BAYES_ORDER` given a called letter and its Phred quality.
/// Letters standing for two or three bases split the confident share evenly between them.
pub fn base_distribution(symbol: u8, quality: f64) -> [f64; 4] {
    let error = 10.0_f64.powf(-quality / 10.0);
    let mask = iupac::base_mask(symbol);
    let (hit, miss) = match mask.count_ones() {
        1 => (1.0 - error, error / 3.0),
        2 => ((1.0 - error) / 2.0, error / 2.0),
        3 => ((1.0 - error) / 3.0, error),
        _ => (0.25, 0.25)
    };
    BAYES_MASKS.map(|m| if mask & m != 0 { hit } else { miss })
}

/// Posterior over `BAYES_ORDER`, using the first read as the prior and the second as the likelihood.
/// The result always sums to one; if the two reads leave no base possible at all, it is uniform.
pub fn posterior(symbol1: u8, quality1: f64, symbol2: u8, quality2: f64) -> [f64; 4] {
    let prior = base_distribution(symbol1, quality1);
    let likelihood = base_distribution(symbol2, quality2);
    let joint: [f64; 4] = std::array::from_fn(|i| prior[i] * likelihood[i]);
    let total: f64 = joint.iter().sum();
    if total > 0.0 {
        joint.map(|p| p / total)
    } else {
        [0.25; 4]
    }
}

/// Picks the most probable base for two usable letters and converts its posterior into a Phred confidence.
/// Ties go to the earliest base in `BAYES_ORDER`.
fn posterior_call(entry1: ColumnEntry, entry2: ColumnEntry) -> (u8, f64) {
    let probabilities = posterior(entry1.symbol, entry1.quality, entry2.symbol, entry2.quality);
    let best = (1..probabilities.len())
        .fold(0, |best, i| if probabilities[i] > probabilities[best] { i } else { best });

    // summing the losers keeps precision that 1 - p_max would throw away
    let error: f64 = probabilities.iter()
        .enumerate()
        .filter(|&(i, _)| i != best)
        .map(|(_, &p)| p)
        .sum();
    let confidence = -10.0 * error.max(f64::MIN_POSITIVE).log10() + CONFIDENCE_EPSILON;
    (BAYES_ORDER[best], confidence)
}

/// Log-average Phred quality of the two bases around a gap.
/// Returns None if the column is not a gap or the gap is missing a base on either side.
pub fn gap_flanking_score(read: &AlignedSequence, qualities: &[u8], column: usize) -> Option<f64> {
    match read.origins()[column] {
        AlignedPosition::GapAfter(before) if before + 1 < qualities.len() => {
            let error_before = 10.0_f64.powf(-(qualities[before] as f64) / 10.0);
            let error_after = 10.0_f64.powf(-(qualities[before + 1] as f64) / 10.0);
            Some(-10.0 * ((error_before + error_after) / 2.0).log10())
        },
        _ => None
    }
}

/// Gap flanking score, but only for gaps that sit strictly inside the overlap
fn internal_gap_flank(read: &AlignedSequence, qualities: &[u8], column: usize, end_gap_starts: Option<(usize, usize)>) -> Option<f64> {
    match end_gap_starts {
        Some((left, right)) if left < column && column < right => gap_flanking_score(read, qualities, column),
        _ => None
    }
}

/// Applies the acceptance threshold to one column.
/// A low-confidence letter becomes N, unless it sits against a gap whose flanking bases are confident, in which case the gap wins and the column is blanked.
fn finalize_call(symbol: u8, confidence: f64, flank: Option<f64>, min_confscore: f64) -> u8 {
    if symbol != TRIMMED && confidence < min_confscore {
        if flank.is_some_and(|f| f > min_confscore) {
            TRIMMED
        } else {
            NO_CALL
        }
    } else {
        symbol
    }
}

/// Bayesian consensus over one or two aligned reads.
/// # Arguments
/// * `aligned` - the aligned rows, one or two of them, all the same length
/// * `qualities` - per-base qualities for each read, indexed by source position
/// * `min_confscore` - acceptance threshold
/// # Returns
/// The consensus and its per-column confidence
pub fn bayesian_consensus(aligned: &[AlignedSequence], qualities: &[Vec<u8>], min_confscore: u8) -> (Vec<u8>, Vec<f64>) {
    let end_gap_starts = end_gap_bounds(aligned);
    let min_confscore = min_confscore as f64;
    let length = aligned.first().map(|a| a.len()).unwrap_or(0);

    let mut consensus: Vec<u8> = Vec::with_capacity(length);
    let mut confidence: Vec<f64> = Vec::with_capacity(length);
    for column in 0..length {
        let entries: Vec<ColumnEntry> = aligned.iter()
            .zip(qualities.iter())
            .map(|(read, q)| ColumnEntry::new(read, q, column))
            .collect();

        let (symbol, column_confidence, flank) = match entries.as_slice() {
            [entry] if entry.is_gap() => (TRIMMED, 0.0, None),
            [entry] if entry.is_usable() => (entry.symbol, entry.quality, None),
            [entry1, entry2] if entry1.is_usable() && entry2.is_usable() => {
                let (symbol, column_confidence) = posterior_call(*entry1, *entry2);
                (symbol, column_confidence, None)
            },
            [entry1, entry2] if entry1.is_usable() => {
                let flank = if entry2.is_gap() { internal_gap_flank(&aligned[1], &qualities[1], column, end_gap_starts) } else { None };
                (entry1.symbol, entry1.quality, flank)
            },
            [entry1, entry2] if entry2.is_usable() => {
                let flank = if entry1.is_gap() { internal_gap_flank(&aligned[0], &qualities[0], column, end_gap_starts) } else { None };
                (entry2.symbol, entry2.quality, flank)
            },
            [entry1, entry2] if entry1.is_gap() && entry2.is_gap() => (TRIMMED, 0.0, None),
            _ => (NO_CALL, NO_CALL_CONFIDENCE, None)
        };

        let call = finalize_call(symbol, column_confidence, flank, min_confscore);
        trace!("Column {column}: {:?} => {} ({column_confidence:.3}, flank {flank:?})",
            entries.iter().map(|e| e.symbol as char).collect::<String>(), call as char);
        consensus.push(call);
        confidence.push(column_confidence);
    }

    (consensus, confidence)
}

/// Threshold consensus over one or two aligned reads.
/// Only letters whose quality reaches `min_confscore` count; if the counted letters disagree, or nothing counts, the column is N.
/// Columns that are all gap are blanked. The confidence is the best quality in the column.
/// # Arguments
/// * `aligned` - the aligned rows, one or two of them, all the same length
/// * `qualities` - per-base qualities for each read, indexed by source position
/// * `min_confscore` - acceptance threshold
pub fn legacy_consensus(aligned: &[AlignedSequence], qualities: &[Vec<u8>], min_confscore: u8) -> (Vec<u8>, Vec<f64>) {
    let min_confscore = min_confscore as f64;
    let length = aligned.first().map(|a| a.len()).unwrap_or(0);

    let mut consensus: Vec<u8> = Vec::with_capacity(length);
    let mut confidence: Vec<f64> = Vec::with_capacity(length);
    for column in 0..length {
        let entries: Vec<ColumnEntry> = aligned.iter()
            .zip(qualities.iter())
            .map(|(read, q)| ColumnEntry::new(read, q, column))
            .collect();
        let passing: Vec<&ColumnEntry> = entries.iter()
            .filter(|e| !e.is_gap() && e.quality >= min_confscore)
            .collect();

        let call = match passing.as_slice() {
            [] if entries.iter().all(|e| e.is_gap()) => TRIMMED,
            [] => NO_CALL,
            [first, rest @ ..] => {
                if rest.iter().all(|e| e.symbol == first.symbol) {
                    first.symbol
                } else {
                    NO_CALL
                }
            }
        };
        let column_confidence = entries.iter()
            .map(|e| e.quality)
            .fold(0.0, f64::max);

        trace!("Column {column}: {} passing => {} ({column_confidence})", passing.len(), call as char);
        consensus.push(call);
        confidence.push(column_confidence);
    }

    (consensus, confidence)
}
