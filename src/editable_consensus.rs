/*!
Hand edits on top of a built consensus, with unbounded undo and redo.
Edits only ever touch the consensus string; the alignment, origins, and traces stay as the builder made them.
```
use sanger_con::consensus::ConsensusBuilder;
use sanger_con::consensus_config::ConsensusSettingsBuilder;
use sanger_con::editable_consensus::EditableConsensus;
use sanger_con::trace::SangerTrace;

let trace = SangerTrace::new(b"ACGTACGT", &[40; 8]).unwrap();
let settings = ConsensusSettingsBuilder::default().trim_consensus(false).build().unwrap();
let mut editable = EditableConsensus::new(ConsensusBuilder::new(vec![trace], settings).unwrap());

editable.modify(2, 3, b"RY").unwrap();
assert_eq!(editable.consensus(), b"ACRYACGT");
editable.undo().unwrap();
assert_eq!(editable.consensus(), b"ACGTACGT");
```
*/

use log::debug;

use crate::consensus::ConsensusBuilder;
use crate::consensus_config::ConsensusSettings;
use crate::consensus_error::{ConsensusError, ConsensusResult};
use crate::iupac::TRIMMED;
use crate::trace::{SangerTrace, TraceSource};

/// What an inclusive range of the consensus held before an edit
#[derive(Clone, Debug, PartialEq)]
pub struct EditRecord {
    start: usize,
    end: usize,
    prior_data: Vec<u8>
}

impl EditRecord {
    // Getters
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn prior_data(&self) -> &[u8] {
        &self.prior_data
    }
}

/// A consensus builder plus the log of edits made to its consensus
#[derive(Clone, Debug)]
pub struct EditableConsensus<T: TraceSource = SangerTrace> {
    builder: ConsensusBuilder<T>,
    undo_stack: Vec<EditRecord>,
    redo_stack: Vec<EditRecord>
}

impl<T: TraceSource> EditableConsensus<T> {
    /// Takes ownership of a built consensus with an empty history
    pub fn new(builder: ConsensusBuilder<T>) -> EditableConsensus<T> {
        EditableConsensus {
            builder,
            undo_stack: vec![],
            redo_stack: vec![]
        }
    }

    /// Blanks out the inclusive range `[start, end]`.
    /// # Errors
    /// * `InvalidRange` if the range is reversed or past the end of the consensus
    pub fn delete(&mut self, start: usize, end: usize) -> ConsensusResult<()> {
        self.check_range(start, end)?;
        let blanks = vec![TRIMMED; end - start + 1];
        self.apply_edit(start, end, &blanks)
    }

    /// Replaces the inclusive range `[start, end]` with `data`.
    /// # Errors
    /// * `InvalidRange` if the range is reversed or past the end of the consensus
    /// * `LengthMismatch` if `data` is not exactly as long as the range
    /// * `BadCharacters` if `data` holds anything other than IUPAC letters and spaces
    pub fn modify(&mut self, start: usize, end: usize, data: &[u8]) -> ConsensusResult<()> {
        self.check_range(start, end)?;
        if data.len() != end - start + 1 {
            return Err(ConsensusError::LengthMismatch { expected: end - start + 1, actual: data.len() });
        }
        self.apply_edit(start, end, data)
    }

    /// Re-runs the consensus pipeline.
    /// If the consensus changes, the whole previous string is logged so the rebuild can be undone.
    /// If the length changes, old records no longer line up and the history is dropped.
    /// # Errors
    /// * if the pipeline fails, in which case nothing changes
    pub fn recompute(&mut self) -> ConsensusResult<()> {
        let before = self.builder.consensus().to_vec();
        self.builder.recompute()?;

        let after = self.builder.consensus();
        if after.len() != before.len() {
            debug!("Consensus length changed from {} to {}, clearing edit history", before.len(), after.len());
            self.undo_stack.clear();
            self.redo_stack.clear();
        } else if after != before.as_slice() {
            self.undo_stack.push(EditRecord {
                start: 0,
                end: before.len() - 1,
                prior_data: before
            });
            self.redo_stack.clear();
        }
        Ok(())
    }

    /// Reverts the most recent edit. Returns false if there was nothing to undo.
    /// # Errors
    /// * if the logged data can no longer be written back, in which case the record stays on the undo stack
    pub fn undo(&mut self) -> ConsensusResult<bool> {
        let Some(record) = self.undo_stack.pop() else {
            return Ok(false);
        };
        match self.swap_in(&record) {
            Ok(inverse) => {
                self.redo_stack.push(inverse);
                Ok(true)
            },
            Err(e) => {
                self.undo_stack.push(record);
                Err(e)
            }
        }
    }

    /// Re-applies the most recently undone edit. Returns false if there was nothing to redo.
    /// # Errors
    /// * if the logged data can no longer be written back, in which case the record stays on the redo stack
    pub fn redo(&mut self) -> ConsensusResult<bool> {
        let Some(record) = self.redo_stack.pop() else {
            return Ok(false);
        };
        match self.swap_in(&record) {
            Ok(inverse) => {
                self.undo_stack.push(inverse);
                Ok(true)
            },
            Err(e) => {
                self.redo_stack.push(record);
                Err(e)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Passes a new settings snapshot to the builder; takes effect on the next `recompute`
    pub fn update_settings(&mut self, settings: ConsensusSettings) {
        self.builder.update_settings(settings);
    }

    // Getters
    pub fn consensus(&self) -> &[u8] {
        self.builder.consensus()
    }

    pub fn builder(&self) -> &ConsensusBuilder<T> {
        &self.builder
    }

    pub fn undo_history(&self) -> &[EditRecord] {
        &self.undo_stack
    }

    /// Gives back the builder, dropping the edit history
    pub fn into_inner(self) -> ConsensusBuilder<T> {
        self.builder
    }

    fn check_range(&self, start: usize, end: usize) -> ConsensusResult<()> {
        let len = self.builder.consensus().len();
        if start > end || end >= len {
            Err(ConsensusError::InvalidRange { start, end, len })
        } else {
            Ok(())
        }
    }

    /// Writes `data` over `[start, end]` and logs what was there
    fn apply_edit(&mut self, start: usize, end: usize, data: &[u8]) -> ConsensusResult<()> {
        let prior_data = self.builder.consensus()[start..=end].to_vec();
        self.builder.set_consensus_range(start, data)?;
        self.undo_stack.push(EditRecord { start, end, prior_data });
        self.redo_stack.clear();
        Ok(())
    }

    /// Puts a record's data back and returns a record of what it replaced
    fn swap_in(&mut self, record: &EditRecord) -> ConsensusResult<EditRecord> {
        self.check_range(record.start, record.end)?;
        let current = self.builder.consensus()[record.start..=record.end].to_vec();
        self.builder.set_consensus_range(record.start, &record.prior_data)?;
        Ok(EditRecord {
            start: record.start,
            end: record.end,
            prior_data: current
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus_config::ConsensusSettingsBuilder;

    fn editable(bases: &[u8]) -> EditableConsensus {
        let trace = SangerTrace::new(bases, &vec![40; bases.len()]).unwrap();
        let settings = ConsensusSettingsBuilder::default()
            .trim_consensus(false)
            .build().unwrap();
        EditableConsensus::new(ConsensusBuilder::new(vec![trace], settings).unwrap())
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut editable = editable(b"ACGTACGTACGT");
        let original = editable.consensus().to_vec();

        editable.delete(2, 4).unwrap();
        editable.modify(0, 1, b"NN").unwrap();
        editable.modify(3, 5, b"RYS").unwrap();
        editable.delete(10, 11).unwrap();
        let edited = editable.consensus().to_vec();
        assert_eq!(&edited, b"NN RYSGTAC  ");
        assert_eq!(editable.undo_history().len(), 4);
        assert_eq!(editable.undo_history()[0].prior_data(), b"GTA");

        for _i in 0..4 {
            assert!(editable.undo().unwrap());
        }
        assert_eq!(editable.consensus(), &original[..]);
        assert!(!editable.can_undo());
        assert!(!editable.undo().unwrap());

        for _i in 0..4 {
            assert!(editable.redo().unwrap());
        }
        assert_eq!(editable.consensus(), &edited[..]);
        assert!(!editable.can_redo());
        assert!(!editable.redo().unwrap());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut editable = editable(b"ACGTACGT");
        editable.delete(0, 1).unwrap();
        editable.undo().unwrap();
        assert!(editable.can_redo());
        editable.modify(7, 7, b"N").unwrap();
        assert!(!editable.can_redo());
        assert_eq!(editable.consensus(), b"ACGTACGN");
    }

    #[test]
    fn test_bad_edits() {
        let mut editable = editable(b"ACGTACGT");
        assert!(matches!(editable.modify(0, 2, b"AC"), Err(ConsensusError::LengthMismatch { expected: 3, actual: 2 })));
        assert!(matches!(editable.modify(0, 1, b"A-"), Err(ConsensusError::BadCharacters(_))));
        assert!(matches!(editable.modify(0, 1, b"ax"), Err(ConsensusError::BadCharacters(_))));
        assert!(matches!(editable.delete(4, 8), Err(ConsensusError::InvalidRange { .. })));
        assert!(matches!(editable.delete(4, 3), Err(ConsensusError::InvalidRange { .. })));

        // failed edits leave no trace
        assert!(!editable.can_undo());
        assert_eq!(editable.consensus(), b"ACGTACGT");
    }

    #[test]
    fn test_failed_restore_keeps_record() {
        let mut editable = editable(b"ACGTACGT");
        // a record that no longer fits the consensus
        editable.undo_stack.push(EditRecord { start: 6, end: 9, prior_data: b"ACGT".to_vec() });
        assert!(matches!(editable.undo(), Err(ConsensusError::InvalidRange { start: 6, end: 9, len: 8 })));
        assert_eq!(editable.undo_history().len(), 1);
        assert!(!editable.can_redo());

        // a record holding a symbol the consensus does not accept
        editable.redo_stack.push(EditRecord { start: 0, end: 1, prior_data: b"A-".to_vec() });
        assert!(matches!(editable.redo(), Err(ConsensusError::BadCharacters(_))));
        assert!(editable.can_redo());
        assert_eq!(editable.undo_history().len(), 1);
        assert_eq!(editable.consensus(), b"ACGTACGT");
    }

    #[test]
    fn test_recompute_is_undoable() {
        let mut editable = editable(b"ACGTACGT");
        editable.delete(2, 5).unwrap();
        assert_eq!(editable.consensus(), b"AC    GT");

        // rebuilding throws the edit away, but it can be brought back
        editable.recompute().unwrap();
        assert_eq!(editable.consensus(), b"ACGTACGT");
        assert_eq!(editable.undo_history().len(), 2);
        assert!(editable.undo().unwrap());
        assert_eq!(editable.consensus(), b"AC    GT");
        assert!(editable.undo().unwrap());
        assert_eq!(editable.consensus(), b"ACGTACGT");

        // nothing changed, nothing logged
        editable.recompute().unwrap();
        assert!(!editable.can_undo());
        assert!(editable.can_redo());
    }

    #[test]
    fn test_settings_change_then_recompute() {
        let mut editable = editable(b"ACGTACGTAC");
        let mut settings = editable.builder().settings().clone();
        settings.set_trim_consensus(true);
        settings.set_quality_trim_window(4, 4).unwrap();
        settings.set_min_confscore(50).unwrap();
        editable.update_settings(settings);
        assert_eq!(editable.consensus(), b"ACGTACGTAC");

        editable.recompute().unwrap();
        assert_eq!(editable.consensus(), b"          ");
        assert!(editable.undo().unwrap());
        assert_eq!(editable.consensus(), b"ACGTACGTAC");

        let builder = editable.into_inner();
        assert_eq!(builder.consensus(), b"ACGTACGTAC");
    }
}
