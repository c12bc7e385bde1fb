/// Convenience alias for results produced by this crate
pub type ConsensusResult<T> = Result<T, ConsensusError>;

/// All of the failure modes surfaced by the consensus core.
/// Nothing in the core recovers from these, they are always handed back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    /// A setting was out of range or otherwise unusable
    #[error("Invalid setting for {name}: {reason}")]
    InvalidSetting {
        name: &'static str,
        reason: String
    },

    /// A replacement sequence did not match the length it is replacing
    #[error("Length mismatch: expected {expected} characters, found {actual}")]
    LengthMismatch {
        expected: usize,
        actual: usize
    },

    /// An edit contained something other than IUPAC bases or a space
    #[error("Bad characters in sequence: {0:?}")]
    BadCharacters(String),

    /// Sequences flagged as aligned for export do not share a length
    #[error("Aligned sequence {label:?} has length {actual}, expected {expected}")]
    AlignmentLengthMismatch {
        label: String,
        expected: usize,
        actual: usize
    },

    /// A sequence accessor was called with an index that does not exist
    #[error("Invalid sequence index {index}, only {count} sequence(s) available")]
    InvalidSequenceIndex {
        index: usize,
        count: usize
    },

    /// The project dictionary carried an unknown `formatversion`
    #[error("Invalid project format version: {0:?}")]
    InvalidFormatVersion(String),

    /// Both sequences handed to the aligner were empty
    #[error("Cannot align two empty sequences")]
    EmptyInput,

    /// An edit range did not fit inside the consensus
    #[error("Invalid range {start}..={end} for a consensus of length {len}")]
    InvalidRange {
        start: usize,
        end: usize,
        len: usize
    },

    /// The builder only handles one or two traces
    #[error("Expected 1 or 2 traces, found {0}")]
    InvalidTraceCount(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error)
}
