/*!
The trace source contract consumed by the consensus core.
Chromatogram parsing lives elsewhere; the core only ever asks for base calls, their confidences, and where they sit in the trace.
*/

use crate::consensus_error::{ConsensusError, ConsensusResult};
use crate::iupac;

/// Highest Phred score a trace may report
pub const MAX_CONFIDENCE: u8 = 61;

/// Spacing used for synthetic sample positions when none are provided
const DEFAULT_SAMPLE_SPACING: usize = 12;

/// Anything that can hand the core a called read.
pub trait TraceSource {
    /// The called bases, upper-case IUPAC letters
    fn base_calls(&self) -> &[u8];

    /// Phred confidence of a base call, in [0, `MAX_CONFIDENCE`]
    fn base_call_conf(&self, index: usize) -> u8;

    /// Index of a base call's peak in the underlying sample data
    fn base_call_pos(&self, index: usize) -> usize;

    fn num_base_calls(&self) -> usize {
        self.base_calls().len()
    }

    /// True if the read has been reverse complemented relative to how it was sequenced
    fn is_reverse_complemented(&self) -> bool;

    /// Toggles the read orientation; calling it twice restores the original
    fn reverse_complement(&mut self);

    /// Copies out all base call confidences
    fn confidences(&self) -> Vec<u8> {
        (0..self.num_base_calls())
            .map(|i| self.base_call_conf(i))
            .collect()
    }
}

/// In-memory called read
#[derive(Clone, Debug, PartialEq)]
pub struct SangerTrace {
    /// Called bases
    base_calls: Vec<u8>,
    /// Per-base Phred confidence
    confidences: Vec<u8>,
    /// Per-base peak location in the sample data
    positions: Vec<usize>,
    /// Number of samples per channel in the trace
    num_samples: usize,
    /// Orientation flag
    reverse_complemented: bool
}

impl SangerTrace {
    /// Creates a trace with evenly spaced synthetic peak positions.
    /// Confidences above `MAX_CONFIDENCE` are clipped.
    /// # Arguments
    /// * `base_calls` - the called bases, upper-case IUPAC
    /// * `confidences` - one Phred score per base
    /// # Errors
    /// * if the lengths differ or a base is not an IUPAC letter
    pub fn new(base_calls: &[u8], confidences: &[u8]) -> ConsensusResult<SangerTrace> {
        let positions: Vec<usize> = (0..base_calls.len())
            .map(|i| i * DEFAULT_SAMPLE_SPACING + DEFAULT_SAMPLE_SPACING / 2)
            .collect();
        let num_samples = base_calls.len() * DEFAULT_SAMPLE_SPACING;
        SangerTrace::with_positions(base_calls, confidences, &positions, num_samples)
    }

    /// Creates a trace with explicit peak positions.
    /// # Arguments
    /// * `base_calls` - the called bases, upper-case IUPAC
    /// * `confidences` - one Phred score per base
    /// * `positions` - one sample index per base
    /// * `num_samples` - total samples per channel, used when mirroring positions on reverse complement
    /// # Errors
    /// * if any lengths differ, a base is not an IUPAC letter, or a position is past `num_samples`
    pub fn with_positions(base_calls: &[u8], confidences: &[u8], positions: &[usize], num_samples: usize) -> ConsensusResult<SangerTrace> {
        if confidences.len() != base_calls.len() {
            return Err(ConsensusError::LengthMismatch { expected: base_calls.len(), actual: confidences.len() });
        }
        if positions.len() != base_calls.len() {
            return Err(ConsensusError::LengthMismatch { expected: base_calls.len(), actual: positions.len() });
        }
        if !base_calls.iter().all(|&b| iupac::is_iupac(b)) {
            return Err(ConsensusError::BadCharacters(String::from_utf8_lossy(base_calls).into_owned()));
        }
        if let Some(&p) = positions.iter().find(|&&p| p >= num_samples) {
            return Err(ConsensusError::InvalidRange { start: p, end: p, len: num_samples });
        }

        Ok(SangerTrace {
            base_calls: base_calls.to_vec(),
            confidences: confidences.iter().map(|&c| c.min(MAX_CONFIDENCE)).collect(),
            positions: positions.to_vec(),
            num_samples,
            reverse_complemented: false
        })
    }

    /// Marks the trace as already reverse complemented without touching the data.
    /// Useful when the caller hands over a read that was flipped upstream.
    pub fn flagged_reverse_complemented(mut self, flag: bool) -> SangerTrace {
        self.reverse_complemented = flag;
        self
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }
}

impl TraceSource for SangerTrace {
    fn base_calls(&self) -> &[u8] {
        &self.base_calls
    }

    fn base_call_conf(&self, index: usize) -> u8 {
        self.confidences[index]
    }

    fn base_call_pos(&self, index: usize) -> usize {
        self.positions[index]
    }

    fn is_reverse_complemented(&self) -> bool {
        self.reverse_complemented
    }

    fn reverse_complement(&mut self) {
        self.base_calls = iupac::reverse_complement(&self.base_calls);
        self.confidences.reverse();
        // peaks are mirrored across the trace, which also reverses their order
        let last_sample = self.num_samples.saturating_sub(1);
        self.positions = self.positions.iter()
            .rev()
            .map(|&p| last_sample - p)
            .collect();
        self.reverse_complemented = !self.reverse_complemented;
    }
}
