//! BAM ingestion through noodles.

use std::fs::File;
use std::io;
use std::path::Path;

use noodles::bam;
use noodles::sam::alignment::record::data::field::Tag;

use rnaseqc_core::models::{AlignmentRecord, NmTag};
use rnaseqc_core::{QcError, Result};

///
/// A coordinate-sorted BAM file decoded into [`AlignmentRecord`]s.
///
pub struct BamSource {
    reference_names: Vec<String>,
    records: Box<dyn Iterator<Item = io::Result<bam::Record>>>,
}

impl BamSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|_| QcError::MissingAlignments(path.to_path_buf()))?;
        let mut reader = bam::io::Reader::new(file);
        let header = reader
            .read_header()
            .map_err(|_| QcError::MissingAlignments(path.to_path_buf()))?;
        let reference_names = header
            .reference_sequences()
            .keys()
            .map(|name| name.to_string())
            .collect();

        let records = std::iter::from_fn(move || {
            let mut record = bam::Record::default();
            match reader.read_record(&mut record) {
                Ok(0) => None,
                Ok(_) => Some(Ok(record)),
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Self {
            reference_names,
            records: Box::new(records),
        })
    }

    /// Reference sequence names from the header, indexed by reference id.
    pub fn reference_names(&self) -> &[String] {
        &self.reference_names
    }
}

impl Iterator for BamSource {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };
        Some(convert_record(&record, &self.reference_names).map_err(QcError::from))
    }
}

/// Interpret an integer `NM` value.
pub fn nm_from_int(value: Option<i64>) -> NmTag {
    match value.map(u32::try_from) {
        Some(Ok(n)) => NmTag::Value(n),
        Some(Err(_)) | None => NmTag::Malformed,
    }
}

fn convert_record(record: &bam::Record, reference_names: &[String]) -> io::Result<AlignmentRecord> {
    let reference_id = record.reference_sequence_id().transpose()?;
    let start = record
        .alignment_start()
        .transpose()?
        .map_or(0, |pos| pos.get() as u64);
    let mate_start = record
        .mate_alignment_start()
        .transpose()?
        .map_or(0, |pos| pos.get() as u64);

    let cigar = record.cigar().iter().collect::<io::Result<Vec<_>>>()?;

    let mut nm = NmTag::Missing;
    let mut tags = Vec::new();
    for field in record.data().iter() {
        match field {
            Ok((tag, value)) => {
                if tag == Tag::EDIT_DISTANCE {
                    nm = nm_from_int(value.as_int());
                }
                tags.push(*tag.as_ref());
            }
            Err(_) => {
                if nm == NmTag::Missing {
                    nm = NmTag::Malformed;
                }
                break;
            }
        }
    }

    Ok(AlignmentRecord {
        name: record.name().map(|n| n.to_string()).unwrap_or_default(),
        reference_id,
        reference_name: reference_id.and_then(|id| reference_names.get(id).cloned()),
        start,
        cigar,
        flags: record.flags(),
        mapping_quality: record.mapping_quality().map_or(255, u8::from),
        mate_reference_id: record.mate_reference_sequence_id().transpose()?,
        mate_start,
        sequence_length: record.sequence().len() as u64,
        nm,
        tags,
    })
}
