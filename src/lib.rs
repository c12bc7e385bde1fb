/*!
# sanger_con
This library provides the sequence-assembly core for Sanger sequencing reads.
It takes one read, or a forward and reverse read, and builds a single consensus with per-position confidence.

Key features:
* IUPAC-aware global alignment of the two reads, with the source position of every aligned column tracked
* Bayesian posterior or legacy threshold consensus, including full ambiguity code support
* Primer location inside the non-overlapping ends of the alignment, with gaps spliced back into the reads
* Primer, end-gap, and sliding-window quality trimming that blanks positions instead of deleting them
* Hand edits with undo and redo, plus plain text, FASTA, and NEXUS export

Performance notes:
* Alignment is a full Needleman-Wunsch matrix, so time and memory scale with the product of the read lengths

# Example usage
```rust
use sanger_con::consensus::ConsensusBuilder;
use sanger_con::consensus_config::ConsensusSettingsBuilder;
use sanger_con::trace::SangerTrace;

let trace = SangerTrace::new(
    b"AAGCTACCTGACATGATTTACG",
    &[5, 4, 20, 24, 34, 12, 8, 30, 32, 16, 34, 40, 52, 61, 61, 61, 28, 61, 46, 32, 12, 24]
).unwrap();

// trim anything that does not hold six good bases in a row
let settings = ConsensusSettingsBuilder::default()
    .qualitytrim_winsize(6)
    .qualitytrim_basecnt(6)
    .build().unwrap();

let builder = ConsensusBuilder::new(vec![trace], settings).unwrap();
assert_eq!(builder.consensus(), b"          ACATGA      ");
assert_eq!(builder.compact_consensus(), b"ACATGA".to_vec());
```
*/

/// Main functionality for building a consensus from one or two reads
pub mod consensus;
/// Configuration for ConsensusBuilder
pub mod consensus_config;
/// Error type shared by the whole crate
pub mod consensus_error;
/// Undo and redo of hand edits on a consensus
pub mod editable_consensus;
/// Utility for generating examples
pub mod example_gen;
/// IUPAC nucleotide tables
pub mod iupac;
/// Locating primers inside the reads
pub mod primer_alignment;
/// Loading settings from project dictionaries
pub mod project_settings;
/// Basic pair-wise alignment utilities
pub mod sequence_alignment;
/// Plain text, FASTA, and NEXUS output
pub mod sequence_export;
/// The read contract consumed by the consensus core
pub mod trace;
/// Post-consensus trimming
pub mod trimming;
