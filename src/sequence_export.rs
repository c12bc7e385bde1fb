/*!
Writes finished sequences out as plain text, FASTA, or NEXUS.
```
use sanger_con::sequence_export::{ExportFormat, ExportRecord, SequenceExporter};
let mut exporter = SequenceExporter::new();
exporter.add_record(ExportRecord::new("sample 1", b"ACGTACGT".to_vec()));

let mut buffer: Vec<u8> = vec![];
exporter.write(&mut buffer, ExportFormat::Fasta).unwrap();
assert_eq!(buffer, b">sample 1\nACGTACGT\n".to_vec());
```
*/

use bio::io::fasta;
use chrono::{Local, NaiveDateTime};
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::consensus::ConsensusBuilder;
use crate::consensus_error::{ConsensusError, ConsensusResult};
use crate::trace::TraceSource;

/// FASTA sequence lines are wrapped at this width
pub const FASTA_LINE_WIDTH: usize = 80;

/// Output dialects
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExportFormat {
    PlainText,
    Fasta,
    Nexus
}

impl ExportFormat {
    /// Guesses the format from a file extension, case-insensitive
    pub fn from_extension(extension: &str) -> Option<ExportFormat> {
        match extension.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(ExportFormat::PlainText),
            "fasta" | "fas" | "fa" | "fna" => Some(ExportFormat::Fasta),
            "nex" | "nexus" | "nxs" => Some(ExportFormat::Nexus),
            _ => None
        }
    }
}

/// One sequence to write
#[derive(Clone, Debug, PartialEq)]
pub struct ExportRecord {
    /// Label for the sequence
    description: String,
    /// Source file name, only used by plain text
    filename: String,
    /// The sequence itself
    sequence: Vec<u8>,
    /// Aligned records must all share a length
    is_aligned: bool
}

impl ExportRecord {
    pub fn new(description: &str, sequence: Vec<u8>) -> ExportRecord {
        ExportRecord {
            description: description.to_string(),
            filename: String::new(),
            sequence,
            is_aligned: false
        }
    }

    pub fn with_filename(mut self, filename: &str) -> ExportRecord {
        self.filename = filename.to_string();
        self
    }

    pub fn aligned(mut self, is_aligned: bool) -> ExportRecord {
        self.is_aligned = is_aligned;
        self
    }

    // Getters
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn is_aligned(&self) -> bool {
        self.is_aligned
    }
}

/// Collects records and writes them in one of the supported formats
#[derive(Clone, Debug, Default)]
pub struct SequenceExporter {
    records: Vec<ExportRecord>
}

impl SequenceExporter {
    pub fn new() -> SequenceExporter {
        Default::default()
    }

    pub fn add_record(&mut self, record: ExportRecord) {
        self.records.push(record);
    }

    /// Adds the compact consensus of a builder as an unaligned record
    pub fn add_consensus<T: TraceSource>(&mut self, builder: &ConsensusBuilder<T>, description: &str, filename: &str) {
        self.add_record(
            ExportRecord::new(description, builder.compact_consensus())
                .with_filename(filename)
        );
    }

    /// Adds every aligned read of a builder as an aligned record.
    /// # Errors
    /// * `InvalidSequenceIndex` if there are fewer labels than reads
    pub fn add_alignment<T: TraceSource>(&mut self, builder: &ConsensusBuilder<T>, labels: &[&str]) -> ConsensusResult<()> {
        for index in 0..builder.num_sequences() {
            let label = labels.get(index)
                .ok_or(ConsensusError::InvalidSequenceIndex { index, count: labels.len() })?;
            let aligned = builder.aligned_sequence(index)?;
            self.add_record(ExportRecord::new(label, aligned.sequence().to_vec()).aligned(true));
        }
        Ok(())
    }

    pub fn records(&self) -> &[ExportRecord] {
        &self.records
    }

    /// Checks that every aligned record has the same length.
    /// # Errors
    /// * `AlignmentLengthMismatch` naming the first record that differs from the first aligned one
    pub fn validate(&self) -> ConsensusResult<()> {
        let mut aligned = self.records.iter().filter(|r| r.is_aligned);
        if let Some(first) = aligned.next() {
            let expected = first.sequence.len();
            if let Some(bad) = aligned.find(|r| r.sequence.len() != expected) {
                return Err(ConsensusError::AlignmentLengthMismatch {
                    label: bad.description.clone(),
                    expected,
                    actual: bad.sequence.len()
                });
            }
        }
        Ok(())
    }

    /// Writes all records to `writer`.
    /// # Errors
    /// * `AlignmentLengthMismatch` if aligned records disagree on length, checked before anything is written
    /// * `Io` if writing fails
    pub fn write<W: Write>(&self, writer: &mut W, format: ExportFormat) -> ConsensusResult<()> {
        self.write_stamped(writer, format, Local::now().naive_local())
    }

    /// Writes all records to a new file at `path`, replacing anything already there.
    /// # Errors
    /// * `AlignmentLengthMismatch` if aligned records disagree on length, checked before the file is created
    /// * `Io` if the file cannot be created or written
    pub fn write_file(&self, path: &Path, format: ExportFormat) -> ConsensusResult<()> {
        self.validate()?;
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer, format)?;
        writer.flush()?;
        debug!("Wrote {} record(s) to {}", self.records.len(), path.display());
        Ok(())
    }

    /// Same as `write`, but with a fixed date stamp for plain text
    fn write_stamped<W: Write>(&self, writer: &mut W, format: ExportFormat, timestamp: NaiveDateTime) -> ConsensusResult<()> {
        self.validate()?;
        match format {
            ExportFormat::PlainText => self.write_plain_text(writer, timestamp),
            ExportFormat::Fasta => self.write_fasta(writer),
            ExportFormat::Nexus => self.write_nexus(writer)
        }
    }

    fn write_plain_text<W: Write>(&self, writer: &mut W, timestamp: NaiveDateTime) -> ConsensusResult<()> {
        writeln!(writer, "{}", timestamp.format("%Y-%m-%d %H:%M:%S"))?;
        for record in self.records.iter() {
            writeln!(writer)?;
            writeln!(writer, "Description: {}", record.description)?;
            writeln!(writer, "Filename: {}", record.filename)?;
            writer.write_all(&record.sequence)?;
            writeln!(writer)?;
        }
        Ok(())
    }

    fn write_fasta<W: Write>(&self, writer: &mut W) -> ConsensusResult<()> {
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                writeln!(writer)?;
            }
            // the fasta writer buffers, so it has to be flushed before the next blank line goes out
            let mut fasta_writer = fasta::Writer::new(&mut *writer);
            let fasta_record = fasta::Record::with_attrs(&record.description, None, &record.sequence);
            fasta_writer.set_linewrap(Some(FASTA_LINE_WIDTH));
            fasta_writer.write_record(&fasta_record)?;
            fasta_writer.flush()?;
        }
        Ok(())
    }

    fn write_nexus<W: Write>(&self, writer: &mut W) -> ConsensusResult<()> {
        let (aligned, unaligned): (Vec<&ExportRecord>, Vec<&ExportRecord>) = self.records.iter()
            .partition(|r| r.is_aligned);

        writeln!(writer, "#NEXUS")?;
        writeln!(writer)?;
        writeln!(writer, "BEGIN TAXA;")?;
        writeln!(writer, "\tDIMENSIONS NTAX={};", self.records.len())?;
        writeln!(writer, "\tTAXLABELS")?;
        for record in self.records.iter() {
            writeln!(writer, "\t\t{}", nexus_label(&record.description))?;
        }
        writeln!(writer, "\t;")?;
        writeln!(writer, "END;")?;

        if let Some(first) = aligned.first() {
            writeln!(writer)?;
            writeln!(writer, "BEGIN CHARACTERS;")?;
            writeln!(writer, "\tDIMENSIONS NTAX={} NCHAR={};", aligned.len(), first.sequence.len())?;
            writeln!(writer, "\tFORMAT DATATYPE=DNA GAP=- MISSING=N;")?;
            writeln!(writer, "\tMATRIX")?;
            for record in aligned.iter() {
                writeln!(writer, "\t\t{} {}", nexus_label(&record.description), String::from_utf8_lossy(&record.sequence))?;
            }
            writeln!(writer, "\t;")?;
            writeln!(writer, "END;")?;
        }

        if !unaligned.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "BEGIN UNALIGNED;")?;
            writeln!(writer, "\tFORMAT DATATYPE=DNA MISSING=N;")?;
            writeln!(writer, "\tMATRIX")?;
            for (i, record) in unaligned.iter().enumerate() {
                let separator = if i + 1 < unaligned.len() { "," } else { "" };
                writeln!(writer, "\t\t{} {}{separator}", nexus_label(&record.description), String::from_utf8_lossy(&record.sequence))?;
            }
            writeln!(writer, "\t;")?;
            writeln!(writer, "END;")?;
        }
        Ok(())
    }
}

/// Single-quotes a NEXUS label, doubling any embedded quotes
fn nexus_label(label: &str) -> String {
    format!("'{}'", label.replace('\'', "''"))
}
