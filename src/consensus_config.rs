/*!
Contains the tunables for building a consensus.
Typical usage is to the use the builder to construct the settings, e.g.
```
use sanger_con::consensus_config::{ConsensusAlgorithm, ConsensusSettings, ConsensusSettingsBuilder};
let settings: ConsensusSettings = ConsensusSettingsBuilder::default()
    .consensus_algorithm(ConsensusAlgorithm::Legacy)
    .min_confscore(20)
    .build()
    .unwrap();
assert_eq!(settings.min_confscore(), 20);
```
Settings owned by a longer-lived context can also be changed in place through the validating setters.
Every accepted change bumps `revision()`, which is how dependent builders notice they are stale.
*/

use std::fmt;
use std::str::FromStr;

use crate::consensus_error::{ConsensusError, ConsensusResult};
use crate::iupac;
use crate::trace::MAX_CONFIDENCE;

/// Largest allowed quality trimming window
pub const MAX_QUALITYTRIM_WINSIZE: usize = 20;

/// Which consensus algorithm to run over the aligned reads
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConsensusAlgorithm {
    /// Posterior base probabilities from both reads
    #[default]
    Bayesian,
    /// Per-read threshold comparison
    Legacy
}

impl fmt::Display for ConsensusAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusAlgorithm::Bayesian => write!(f, "Bayesian"),
            ConsensusAlgorithm::Legacy => write!(f, "legacy")
        }
    }
}

impl FromStr for ConsensusAlgorithm {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bayesian" => Ok(ConsensusAlgorithm::Bayesian),
            "legacy" => Ok(ConsensusAlgorithm::Legacy),
            _ => Err(ConsensusError::InvalidSetting {
                name: "consensus_algorithm",
                reason: format!("unknown algorithm {s:?}")
            })
        }
    }
}

/**
Contains the tunables for building a consensus.
Typical usage is to the use the builder to construct the settings, e.g.
```
use sanger_con::consensus_config::{ConsensusSettings, ConsensusSettingsBuilder};
let settings: ConsensusSettings = ConsensusSettingsBuilder::default()
    .trim_primers(true)
    .forward_primer("ATGAAGCTT")
    .reverse_primer("CCGTACATTAA")
    .build()
    .unwrap();
assert!(settings.has_primers());
```
*/
#[derive(derive_builder::Builder, Clone, Debug, PartialEq)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct ConsensusSettings {
    /// Per-base acceptance threshold, in [1, 61]
    min_confscore: u8,
    /// The consensus algorithm to run
    consensus_algorithm: ConsensusAlgorithm,
    /// Master switch for every trimming stage
    trim_consensus: bool,
    /// Trim the non-overlapping ends of a two-read alignment
    trim_endgaps: bool,
    /// Locate and remove primers
    trim_primers: bool,
    /// Minimum fraction of primer positions that must match the read before the primer is trimmed, in [0, 1]
    primer_match_threshold: f64,
    /// Forward primer, IUPAC letters
    #[builder(setter(into))]
    forward_primer: String,
    /// Reverse primer as ordered, IUPAC letters
    #[builder(setter(into))]
    reverse_primer: String,
    /// Enable sliding-window quality trimming
    do_qualitytrim: bool,
    /// Window size for quality trimming, in [1, 20]
    qualitytrim_winsize: usize,
    /// Good bases required inside a window, in [1, winsize]
    qualitytrim_basecnt: usize,
    /// Bumped on every accepted change
    #[builder(setter(skip))]
    revision: u64
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            min_confscore: 30,
            consensus_algorithm: ConsensusAlgorithm::Bayesian,
            trim_consensus: true,
            trim_endgaps: true,
            trim_primers: false,
            primer_match_threshold: 0.8,
            forward_primer: String::new(),
            reverse_primer: String::new(),
            do_qualitytrim: true,
            qualitytrim_winsize: 10,
            qualitytrim_basecnt: 8,
            revision: 0
        }
    }
}

fn check_min_confscore(value: u8) -> ConsensusResult<()> {
    if (1..=MAX_CONFIDENCE).contains(&value) {
        Ok(())
    } else {
        Err(ConsensusError::InvalidSetting {
            name: "min_confscore",
            reason: format!("{value} is outside [1, {MAX_CONFIDENCE}]")
        })
    }
}

fn check_primer_match_threshold(value: f64) -> ConsensusResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConsensusError::InvalidSetting {
            name: "primer_match_threshold",
            reason: format!("{value} is outside [0, 1]")
        })
    }
}

fn check_primer(name: &'static str, primer: &str) -> ConsensusResult<()> {
    match primer.bytes().find(|&b| !iupac::is_iupac(b)) {
        None => Ok(()),
        Some(b) => Err(ConsensusError::InvalidSetting {
            name,
            reason: format!("{:?} is not an IUPAC nucleotide", b as char)
        })
    }
}

fn check_quality_window(winsize: usize, basecnt: usize) -> ConsensusResult<()> {
    if !(1..=MAX_QUALITYTRIM_WINSIZE).contains(&winsize) {
        return Err(ConsensusError::InvalidSetting {
            name: "qualitytrim_winsize",
            reason: format!("{winsize} is outside [1, {MAX_QUALITYTRIM_WINSIZE}]")
        });
    }
    if !(1..=winsize).contains(&basecnt) {
        return Err(ConsensusError::InvalidSetting {
            name: "qualitytrim_basecnt",
            reason: format!("{basecnt} is outside [1, {winsize}]")
        });
    }
    Ok(())
}

impl ConsensusSettingsBuilder {
    /// Applies the same rules as the setters on `ConsensusSettings`
    fn validate(&self) -> Result<(), String> {
        let defaults = ConsensusSettings::default();
        check_min_confscore(self.min_confscore.unwrap_or(defaults.min_confscore))
            .and_then(|_| check_primer_match_threshold(self.primer_match_threshold.unwrap_or(defaults.primer_match_threshold)))
            .and_then(|_| check_primer("forward_primer", self.forward_primer.as_deref().unwrap_or("")))
            .and_then(|_| check_primer("reverse_primer", self.reverse_primer.as_deref().unwrap_or("")))
            .and_then(|_| check_quality_window(
                self.qualitytrim_winsize.unwrap_or(defaults.qualitytrim_winsize),
                self.qualitytrim_basecnt.unwrap_or(defaults.qualitytrim_basecnt)
            ))
            .map_err(|e| e.to_string())
    }
}

impl ConsensusSettings {
    fn changed(&mut self) {
        self.revision += 1;
    }

    // Setters
    /// # Errors
    /// * `InvalidSetting` if the value is outside [1, 61]
    pub fn set_min_confscore(&mut self, value: u8) -> ConsensusResult<()> {
        check_min_confscore(value)?;
        self.min_confscore = value;
        self.changed();
        Ok(())
    }

    pub fn set_consensus_algorithm(&mut self, value: ConsensusAlgorithm) {
        self.consensus_algorithm = value;
        self.changed();
    }

    pub fn set_trim_consensus(&mut self, value: bool) {
        self.trim_consensus = value;
        self.changed();
    }

    pub fn set_trim_endgaps(&mut self, value: bool) {
        self.trim_endgaps = value;
        self.changed();
    }

    pub fn set_trim_primers(&mut self, value: bool) {
        self.trim_primers = value;
        self.changed();
    }

    /// # Errors
    /// * `InvalidSetting` if the value is outside [0, 1]
    pub fn set_primer_match_threshold(&mut self, value: f64) -> ConsensusResult<()> {
        check_primer_match_threshold(value)?;
        self.primer_match_threshold = value;
        self.changed();
        Ok(())
    }

    /// Sets the forward primer, upper-casing it first.
    /// # Errors
    /// * `InvalidSetting` if the primer contains non-IUPAC letters
    pub fn set_forward_primer(&mut self, primer: &str) -> ConsensusResult<()> {
        let primer = primer.to_ascii_uppercase();
        check_primer("forward_primer", &primer)?;
        self.forward_primer = primer;
        self.changed();
        Ok(())
    }

    /// Sets the reverse primer, upper-casing it first.
    /// # Errors
    /// * `InvalidSetting` if the primer contains non-IUPAC letters
    pub fn set_reverse_primer(&mut self, primer: &str) -> ConsensusResult<()> {
        let primer = primer.to_ascii_uppercase();
        check_primer("reverse_primer", &primer)?;
        self.reverse_primer = primer;
        self.changed();
        Ok(())
    }

    pub fn set_do_qualitytrim(&mut self, value: bool) {
        self.do_qualitytrim = value;
        self.changed();
    }

    /// # Errors
    /// * `InvalidSetting` if the window is outside [1, 20] or smaller than the current base count
    pub fn set_qualitytrim_winsize(&mut self, winsize: usize) -> ConsensusResult<()> {
        check_quality_window(winsize, self.qualitytrim_basecnt)?;
        self.qualitytrim_winsize = winsize;
        self.changed();
        Ok(())
    }

    /// # Errors
    /// * `InvalidSetting` if the count is outside [1, winsize]
    pub fn set_qualitytrim_basecnt(&mut self, basecnt: usize) -> ConsensusResult<()> {
        check_quality_window(self.qualitytrim_winsize, basecnt)?;
        self.qualitytrim_basecnt = basecnt;
        self.changed();
        Ok(())
    }

    /// Sets both quality window parameters at once, so the pair only has to be valid together
    pub fn set_quality_trim_window(&mut self, winsize: usize, basecnt: usize) -> ConsensusResult<()> {
        check_quality_window(winsize, basecnt)?;
        self.qualitytrim_winsize = winsize;
        self.qualitytrim_basecnt = basecnt;
        self.changed();
        Ok(())
    }

    // Getters
    pub fn min_confscore(&self) -> u8 {
        self.min_confscore
    }

    pub fn consensus_algorithm(&self) -> ConsensusAlgorithm {
        self.consensus_algorithm
    }

    pub fn trim_consensus(&self) -> bool {
        self.trim_consensus
    }

    pub fn trim_endgaps(&self) -> bool {
        self.trim_endgaps
    }

    pub fn trim_primers(&self) -> bool {
        self.trim_primers
    }

    pub fn primer_match_threshold(&self) -> f64 {
        self.primer_match_threshold
    }

    pub fn forward_primer(&self) -> &str {
        &self.forward_primer
    }

    pub fn reverse_primer(&self) -> &str {
        &self.reverse_primer
    }

    pub fn do_qualitytrim(&self) -> bool {
        self.do_qualitytrim
    }

    pub fn qualitytrim_winsize(&self) -> usize {
        self.qualitytrim_winsize
    }

    pub fn qualitytrim_basecnt(&self) -> usize {
        self.qualitytrim_basecnt
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True if both primers are set, which is what enables primer alignment
    pub fn has_primers(&self) -> bool {
        !self.forward_primer.is_empty() && !self.reverse_primer.is_empty()
    }
}
