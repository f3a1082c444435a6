//! 5'/3' coverage bias tallies.

use fxhash::FxHashMap;

use rnaseqc_core::models::{Feature, Strand};

use crate::config::BiasConfig;

#[derive(Debug, Clone, Default)]
pub struct BiasCounter {
    offset: u64,
    window: u64,
    min_gene_length: u64,
    detection_threshold: u64,
    five_end: FxHashMap<String, u64>,
    three_end: FxHashMap<String, u64>,
}

fn window_sum(coverage: &[u64], start: u64, end: u64) -> u64 {
    let start = (start as usize).min(coverage.len());
    let end = (end as usize).min(coverage.len());
    coverage[start..end].iter().sum()
}

impl BiasCounter {
    pub fn new(config: &BiasConfig) -> Self {
        Self {
            offset: config.offset,
            window: config.window,
            min_gene_length: config.min_gene_length,
            detection_threshold: config.detection_threshold,
            five_end: FxHashMap::default(),
            three_end: FxHashMap::default(),
        }
    }

    ///
    /// Add a gene's per-base coverage to its end tallies.
    ///
    /// `coverage[i]` is the depth at `gene.start + i`. Windows sit `offset`
    /// bases inside each end of the gene body; on the reverse strand the 5'
    /// end is the high-coordinate one. Genes shorter than the minimum length
    /// are ignored.
    ///
    pub fn compute_bias(&mut self, gene: &Feature, coverage: &[u64]) {
        let length = gene.len();
        if length < self.min_gene_length {
            return;
        }
        let low = window_sum(coverage, self.offset, self.offset + self.window);
        let high_end = length.saturating_sub(self.offset);
        let high = window_sum(coverage, high_end.saturating_sub(self.window), high_end);

        let (five, three) = match gene.strand {
            Strand::Reverse => (high, low),
            _ => (low, high),
        };
        *self.five_end.entry(gene.gene_id.clone()).or_insert(0) += five;
        *self.three_end.entry(gene.gene_id.clone()).or_insert(0) += three;
    }

    ///
    /// Fraction of windowed coverage at the 3' end, or `None` when the gene
    /// has no coverage or falls below the detection threshold.
    ///
    pub fn bias(&self, gene_id: &str) -> Option<f64> {
        let five = self.five_end.get(gene_id).copied().unwrap_or(0);
        let three = self.three_end.get(gene_id).copied().unwrap_or(0);
        let total = five + three;
        if total == 0 || total < self.detection_threshold {
            return None;
        }
        Some(three as f64 / total as f64)
    }

    /// Genes with a tally, in no particular order.
    pub fn genes(&self) -> impl Iterator<Item = &str> {
        self.five_end.keys().map(String::as_str)
    }
}
