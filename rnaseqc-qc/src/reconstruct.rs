//! Post-pass replay of the coverage spool into per-transcript statistics.

use std::io::{BufRead, Write};

use fxhash::{FxHashMap, FxHashSet};
use log::{debug, warn};

use rnaseqc_core::models::Feature;
use rnaseqc_core::{QcError, Result};

use crate::coverage::add_range;
use crate::stats;

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptCoverage {
    pub gene_id: String,
    pub transcript_id: String,
    pub mean: f64,
    pub std: f64,
    pub cv: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageSummary {
    pub median_mean: Option<f64>,
    pub median_std: Option<f64>,
    pub median_cv: Option<f64>,
    pub transcripts: usize,
    /// Spool rows naming unknown or already-finished transcripts.
    pub unclaimed: usize,
}

#[derive(Debug)]
struct SpoolRow<'a> {
    gene_id: &'a str,
    transcript_id: &'a str,
    exon_id: &'a str,
    offset: u64,
    length: u64,
}

fn parse_row(line: &str, number: usize) -> Result<SpoolRow<'_>> {
    let fields: Vec<&str> = line.split('\t').collect();
    let parse = |field: &str| {
        field.parse::<u64>().map_err(|e| QcError::Parse {
            line: number,
            message: format!("coverage spool: {}", e),
        })
    };
    match fields[..] {
        [gene_id, transcript_id, exon_id, offset, length] => Ok(SpoolRow {
            gene_id,
            transcript_id,
            exon_id,
            offset: parse(offset)?,
            length: parse(length)?,
        }),
        _ => Err(QcError::Parse {
            line: number,
            message: format!("coverage spool row has {} fields, expected 5", fields.len()),
        }),
    }
}

/// Per-exon arrays of one transcript, exons in first-seen order.
#[derive(Debug, Default)]
struct TranscriptBuilder {
    gene_id: String,
    transcript_id: String,
    exons: Vec<(String, Vec<u64>)>,
}

impl TranscriptBuilder {
    fn add(&mut self, exon_id: &str, offset: u64, length: u64) {
        let index = match self.exons.iter().position(|(id, _)| id == exon_id) {
            Some(index) => index,
            None => {
                self.exons.push((exon_id.to_string(), Vec::new()));
                self.exons.len() - 1
            }
        };
        add_range(&mut self.exons[index].1, offset, length);
    }

    ///
    /// Concatenate the exon arrays, trim `trim` positions from each end and
    /// summarise. `None` when nothing is left after trimming.
    ///
    fn finish(self, trim: usize) -> Option<TranscriptCoverage> {
        let coverage: Vec<f64> = self
            .exons
            .into_iter()
            .flat_map(|(_, depth)| depth)
            .map(|depth| depth as f64)
            .collect();
        if coverage.len() <= 2 * trim {
            return None;
        }
        let trimmed = &coverage[trim..coverage.len() - trim];
        let mean = stats::mean(trimmed)?;
        let std = stats::std_dev(trimmed)?;
        Some(TranscriptCoverage {
            gene_id: self.gene_id,
            transcript_id: self.transcript_id,
            mean,
            std,
            cv: std / mean,
        })
    }
}

fn write_transcript<W: Write>(writer: &mut W, transcript: &TranscriptCoverage) -> Result<()> {
    let cv = if transcript.cv.is_finite() {
        transcript.cv.to_string()
    } else {
        "NA".to_string()
    };
    writeln!(
        writer,
        "{}\t{}\t{}\t{}\t{}",
        transcript.gene_id, transcript.transcript_id, transcript.mean, transcript.std, cv
    )?;
    Ok(())
}

///
/// Replay the spool, rebuilding each transcript's coverage, and summarise it.
///
/// Rows of one transcript must be contiguous. Each transcript is trimmed by
/// the median fragment size on both ends; transcripts left empty are skipped
/// and non-finite CVs are left out of the CV median. When `writer` is given
/// a per-transcript table is written to it.
///
pub fn reconstruct<R: BufRead, W: Write>(
    spool: R,
    transcripts: &FxHashMap<String, Feature>,
    median_fragment: f64,
    mut writer: Option<W>,
) -> Result<CoverageSummary> {
    let trim = if median_fragment.is_finite() && median_fragment > 0.0 {
        median_fragment.round() as usize
    } else {
        0
    };
    if let Some(w) = writer.as_mut() {
        writeln!(w, "gene_id\ttranscript_id\tcoverage_mean\tcoverage_std\tcoverage_CV")?;
    }

    let mut means = Vec::new();
    let mut stds = Vec::new();
    let mut cvs = Vec::new();
    let mut unclaimed = 0;
    let mut finished: FxHashSet<String> = FxHashSet::default();
    let mut current: Option<TranscriptBuilder> = None;

    let mut complete = |builder: TranscriptBuilder,
                        finished: &mut FxHashSet<String>,
                        writer: &mut Option<W>|
     -> Result<()> {
        finished.insert(builder.transcript_id.clone());
        if let Some(transcript) = builder.finish(trim) {
            if let Some(w) = writer.as_mut() {
                write_transcript(w, &transcript)?;
            }
            means.push(transcript.mean);
            stds.push(transcript.std);
            if transcript.cv.is_finite() {
                cvs.push(transcript.cv);
            }
        }
        Ok(())
    };

    for (index, line) in spool.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let row = parse_row(&line, index + 1)?;

        if !transcripts.contains_key(row.transcript_id) {
            warn!(
                "Coverage for transcript {} which is not in the annotation",
                row.transcript_id
            );
            unclaimed += 1;
            continue;
        }

        let same = matches!(&current, Some(b) if b.transcript_id == row.transcript_id);
        if !same {
            if let Some(builder) = current.take() {
                complete(builder, &mut finished, &mut writer)?;
            }
            if finished.contains(row.transcript_id) {
                warn!(
                    "Coverage rows for transcript {} are not contiguous",
                    row.transcript_id
                );
                unclaimed += 1;
                continue;
            }
            current = Some(TranscriptBuilder {
                gene_id: row.gene_id.to_string(),
                transcript_id: row.transcript_id.to_string(),
                exons: Vec::new(),
            });
        }
        if let Some(builder) = current.as_mut() {
            builder.add(row.exon_id, row.offset, row.length);
        }
    }
    if let Some(builder) = current.take() {
        complete(builder, &mut finished, &mut writer)?;
    }
    if let Some(w) = writer.as_mut() {
        w.flush()?;
    }

    debug!(
        "Reconstructed coverage for {} of {} transcripts",
        means.len(),
        finished.len()
    );
    Ok(CoverageSummary {
        median_mean: stats::median(&means),
        median_std: stats::median(&stds),
        median_cv: stats::median(&cvs),
        transcripts: means.len(),
        unclaimed,
    })
}
