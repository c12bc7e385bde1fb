/*!
Loads consensus settings out of a project dictionary.
Project files written by older releases use different key names; these get migrated forward before anything is parsed.
```
use sanger_con::project_settings::{settings_from_project, ProjectDictionary};
let mut project = ProjectDictionary::default();
project.insert("formatversion".to_string(), "0.8".to_string());
project.insert("do_autotrim".to_string(), "true".to_string());
project.insert("autotrim_winsize".to_string(), "10".to_string());
project.insert("autotrim_basecnt".to_string(), "6".to_string());

let settings = settings_from_project(&project).unwrap();
assert!(settings.do_qualitytrim());
assert_eq!(settings.qualitytrim_basecnt(), 6);
```
*/

use log::debug;
use rustc_hash::FxHashMap as HashMap;

use crate::consensus_config::{ConsensusAlgorithm, ConsensusSettings};
use crate::consensus_error::{ConsensusError, ConsensusResult};

/// Flat key/value view of the project settings
pub type ProjectDictionary = HashMap<String, String>;

/// The schema version written by `settings_to_project`
pub const CURRENT_FORMAT_VERSION: &str = "0.9";

const FORMAT_VERSION_KEY: &str = "formatversion";
const MIN_CONFSCORE_KEY: &str = "min_confscore";
const CONSENSUS_ALGORITHM_KEY: &str = "consensus_algorithm";
const TRIM_CONSENSUS_KEY: &str = "trim_consensus";
const TRIM_ENDGAPS_KEY: &str = "trim_endgaps";
const TRIM_PRIMERS_KEY: &str = "trim_primers";
const PRIMERMATCH_THRESHOLD_KEY: &str = "primermatch_threshold";
const FORWARD_PRIMER_KEY: &str = "forward_primer";
const REVERSE_PRIMER_KEY: &str = "reverse_primer";
const DO_QUALITYTRIM_KEY: &str = "do_qualitytrim";
const QUALITYTRIM_WINSIZE_KEY: &str = "qualitytrim_winsize";
const QUALITYTRIM_BASECNT_KEY: &str = "qualitytrim_basecnt";

/// 0.8 names that were renamed in 0.9
const LEGACY_RENAMES: [(&str, &str); 3] = [
    ("do_autotrim", DO_QUALITYTRIM_KEY),
    ("autotrim_winsize", QUALITYTRIM_WINSIZE_KEY),
    ("autotrim_basecnt", QUALITYTRIM_BASECNT_KEY)
];

/// Rewrites a 0.8 dictionary into the 0.9 schema
fn migrate_0_8(project: &ProjectDictionary) -> ProjectDictionary {
    let mut migrated = project.clone();
    for (old_key, new_key) in LEGACY_RENAMES.iter() {
        if let Some(value) = migrated.remove(*old_key) {
            migrated.insert(new_key.to_string(), value);
        }
    }

    // 0.8 had a single trimming switch
    let do_autotrim = migrated.get(DO_QUALITYTRIM_KEY)
        .cloned()
        .unwrap_or_else(|| ConsensusSettings::default().do_qualitytrim().to_string());
    migrated.insert(TRIM_CONSENSUS_KEY.to_string(), do_autotrim);
    migrated.insert(CONSENSUS_ALGORITHM_KEY.to_string(), ConsensusAlgorithm::Legacy.to_string());
    migrated.insert(TRIM_PRIMERS_KEY.to_string(), "false".to_string());
    migrated.insert(PRIMERMATCH_THRESHOLD_KEY.to_string(), "0.8".to_string());
    migrated.insert(FORWARD_PRIMER_KEY.to_string(), String::new());
    migrated.insert(REVERSE_PRIMER_KEY.to_string(), String::new());
    migrated.insert(FORMAT_VERSION_KEY.to_string(), CURRENT_FORMAT_VERSION.to_string());
    migrated
}

fn parse_bool(name: &'static str, value: &str) -> ConsensusResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ConsensusError::InvalidSetting {
            name,
            reason: format!("{other:?} is not a boolean")
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> ConsensusResult<T> {
    value.trim().parse::<T>().map_err(|_| ConsensusError::InvalidSetting {
        name,
        reason: format!("{value:?} is not a valid number")
    })
}

/// Builds settings from a project dictionary, migrating older schemas first.
/// Keys that are absent keep their default values.
/// # Arguments
/// * `project` - the dictionary, which must carry a `formatversion` entry
/// # Errors
/// * `InvalidFormatVersion` if the version is missing or unknown
/// * `InvalidSetting` if any value fails to parse or validate
pub fn settings_from_project(project: &ProjectDictionary) -> ConsensusResult<ConsensusSettings> {
    let version = project.get(FORMAT_VERSION_KEY)
        .map(|v| v.trim().to_string())
        .unwrap_or_default();
    let current = match version.as_str() {
        "0.8" => {
            debug!("Migrating project settings from format 0.8");
            migrate_0_8(project)
        },
        "0.9" => project.clone(),
        _ => return Err(ConsensusError::InvalidFormatVersion(version))
    };

    let mut settings = ConsensusSettings::default();
    if let Some(value) = current.get(MIN_CONFSCORE_KEY) {
        settings.set_min_confscore(parse_number(MIN_CONFSCORE_KEY, value)?)?;
    }
    if let Some(value) = current.get(CONSENSUS_ALGORITHM_KEY) {
        settings.set_consensus_algorithm(value.trim().parse()?);
    }
    if let Some(value) = current.get(TRIM_CONSENSUS_KEY) {
        settings.set_trim_consensus(parse_bool(TRIM_CONSENSUS_KEY, value)?);
    }
    if let Some(value) = current.get(TRIM_ENDGAPS_KEY) {
        settings.set_trim_endgaps(parse_bool(TRIM_ENDGAPS_KEY, value)?);
    }
    if let Some(value) = current.get(TRIM_PRIMERS_KEY) {
        settings.set_trim_primers(parse_bool(TRIM_PRIMERS_KEY, value)?);
    }
    if let Some(value) = current.get(PRIMERMATCH_THRESHOLD_KEY) {
        settings.set_primer_match_threshold(parse_number(PRIMERMATCH_THRESHOLD_KEY, value)?)?;
    }
    if let Some(value) = current.get(FORWARD_PRIMER_KEY) {
        settings.set_forward_primer(value.trim())?;
    }
    if let Some(value) = current.get(REVERSE_PRIMER_KEY) {
        settings.set_reverse_primer(value.trim())?;
    }
    if let Some(value) = current.get(DO_QUALITYTRIM_KEY) {
        settings.set_do_qualitytrim(parse_bool(DO_QUALITYTRIM_KEY, value)?);
    }

    // the window pair is only validated together
    let winsize = match current.get(QUALITYTRIM_WINSIZE_KEY) {
        Some(value) => parse_number(QUALITYTRIM_WINSIZE_KEY, value)?,
        None => settings.qualitytrim_winsize()
    };
    let basecnt = match current.get(QUALITYTRIM_BASECNT_KEY) {
        Some(value) => parse_number(QUALITYTRIM_BASECNT_KEY, value)?,
        None => settings.qualitytrim_basecnt()
    };
    settings.set_quality_trim_window(winsize, basecnt)?;

    Ok(settings)
}

/// Writes settings out in the current schema
pub fn settings_to_project(settings: &ConsensusSettings) -> ProjectDictionary {
    let entries = [
        (FORMAT_VERSION_KEY, CURRENT_FORMAT_VERSION.to_string()),
        (MIN_CONFSCORE_KEY, settings.min_confscore().to_string()),
        (CONSENSUS_ALGORITHM_KEY, settings.consensus_algorithm().to_string()),
        (TRIM_CONSENSUS_KEY, settings.trim_consensus().to_string()),
        (TRIM_ENDGAPS_KEY, settings.trim_endgaps().to_string()),
        (TRIM_PRIMERS_KEY, settings.trim_primers().to_string()),
        (PRIMERMATCH_THRESHOLD_KEY, settings.primer_match_threshold().to_string()),
        (FORWARD_PRIMER_KEY, settings.forward_primer().to_string()),
        (REVERSE_PRIMER_KEY, settings.reverse_primer().to_string()),
        (DO_QUALITYTRIM_KEY, settings.do_qualitytrim().to_string()),
        (QUALITYTRIM_WINSIZE_KEY, settings.qualitytrim_winsize().to_string()),
        (QUALITYTRIM_BASECNT_KEY, settings.qualitytrim_basecnt().to_string())
    ];
    entries.into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
