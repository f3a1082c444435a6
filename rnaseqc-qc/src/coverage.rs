//! Gene-level coverage cache with a commit-on-drop spool.

use std::collections::BTreeMap;
use std::io::Write;

use fxhash::{FxHashMap, FxHashSet};
use log::{debug, warn};

use rnaseqc_core::models::Feature;
use rnaseqc_core::{QcError, Result};

use crate::bias::BiasCounter;
use crate::sweep::GeneSink;

///
/// One contiguous run of read coverage credited to one exon. `offset` is
/// measured from the exon start.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageEntry {
    pub offset: u64,
    pub length: u64,
    pub transcript_id: String,
    pub feature_id: String,
}

///
/// Increment `coverage[offset..offset + length]`, growing the array as needed.
///
pub fn add_range(coverage: &mut Vec<u64>, offset: u64, length: u64) {
    let end = (offset + length) as usize;
    if coverage.len() < end {
        coverage.resize(end, 0);
    }
    for depth in &mut coverage[offset as usize..end] {
        *depth += 1;
    }
}

#[derive(Debug, Clone)]
struct ExonCoverage {
    exon_start: u64,
    entries: Vec<CoverageEntry>,
}

///
/// Caches coverage entries for genes still inside the sweep window.
///
/// When the sweep drops a gene, [`CoverageAccumulator::commit`] folds its
/// entries into the bias tallies, appends them to the spool as
/// `gene_id, transcript_id, exon_id, offset, length` rows, and evicts them.
/// Rows for one transcript are always contiguous, exons in start order.
///
pub struct CoverageAccumulator<W: Write> {
    cache: FxHashMap<String, BTreeMap<(String, String), ExonCoverage>>,
    committed: FxHashSet<String>,
    spool: W,
    bias: BiasCounter,
    rows: usize,
}

impl<W: Write> CoverageAccumulator<W> {
    pub fn new(spool: W, bias: BiasCounter) -> Self {
        Self {
            cache: FxHashMap::default(),
            committed: FxHashSet::default(),
            spool,
            bias,
            rows: 0,
        }
    }

    pub fn add(&mut self, gene_id: &str, exon_start: u64, entry: CoverageEntry) {
        let key = (entry.transcript_id.clone(), entry.feature_id.clone());
        self.cache
            .entry(gene_id.to_string())
            .or_default()
            .entry(key)
            .or_insert_with(|| ExonCoverage {
                exon_start,
                entries: Vec::new(),
            })
            .entries
            .push(entry);
    }

    pub fn is_cached(&self, gene_id: &str) -> bool {
        self.cache.contains_key(gene_id)
    }

    pub fn is_committed(&self, gene_id: &str) -> bool {
        self.committed.contains(gene_id)
    }

    pub fn bias(&self) -> &BiasCounter {
        &self.bias
    }

    ///
    /// Finalize a gene: compute its bias tallies, spool its entries and evict
    /// it from the cache. A gene may only be committed once per run.
    ///
    pub fn commit(&mut self, gene: &Feature) -> Result<()> {
        if !self.committed.insert(gene.gene_id.clone()) {
            return Err(QcError::DoubleCommit(gene.gene_id.clone()));
        }
        let Some(exons) = self.cache.remove(&gene.gene_id) else {
            return Ok(());
        };

        let mut transcripts: BTreeMap<&str, Vec<(&str, &ExonCoverage)>> = BTreeMap::new();
        for ((transcript_id, exon_id), exon) in &exons {
            transcripts
                .entry(transcript_id.as_str())
                .or_default()
                .push((exon_id.as_str(), exon));
        }

        let gene_length = gene.len();
        for (transcript_id, mut transcript_exons) in transcripts {
            transcript_exons.sort_by_key(|(exon_id, exon)| (exon.exon_start, *exon_id));

            let mut body = vec![0u64; gene_length as usize];
            for (exon_id, exon) in &transcript_exons {
                for entry in &exon.entries {
                    writeln!(
                        self.spool,
                        "{}\t{}\t{}\t{}\t{}",
                        gene.gene_id, transcript_id, exon_id, entry.offset, entry.length
                    )?;
                    self.rows += 1;

                    let start = (exon.exon_start + entry.offset).saturating_sub(gene.start);
                    let length = entry.length.min(gene_length.saturating_sub(start));
                    if length > 0 {
                        add_range(&mut body, start, length);
                    }
                }
            }
            self.bias.compute_bias(gene, &body);
        }
        Ok(())
    }

    /// Drop all cached entries without spooling them.
    pub fn reset(&mut self) {
        if !self.cache.is_empty() {
            debug!("Discarding coverage for {} cached genes", self.cache.len());
        }
        self.cache.clear();
    }

    ///
    /// Close the accumulator, returning the bias tallies, the spool and the
    /// number of cached entries no gene ever claimed.
    ///
    pub fn finish(mut self) -> Result<(BiasCounter, W, usize)> {
        let unclaimed: usize = self
            .cache
            .values()
            .flat_map(|exons| exons.values())
            .map(|exon| exon.entries.len())
            .sum();
        if unclaimed > 0 {
            warn!(
                "{} coverage entries across {} genes were never committed",
                unclaimed,
                self.cache.len()
            );
        }
        self.spool.flush()?;
        debug!("Spooled {} coverage rows", self.rows);
        Ok((self.bias, self.spool, unclaimed))
    }
}

impl<W: Write> GeneSink for CoverageAccumulator<W> {
    fn gene_dropped(&mut self, gene: &Feature) -> Result<()> {
        self.commit(gene)
    }
}
