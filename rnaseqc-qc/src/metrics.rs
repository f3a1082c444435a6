//! Flat counters and per-read credit collection.

use std::collections::BTreeMap;

use fxhash::FxHashMap;

///
/// String-keyed run counters. Keys iterate in sorted order so reports are
/// deterministic.
///
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Metrics {
    counter: BTreeMap<String, u64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: &str) {
        self.increment_by(key, 1);
    }

    pub fn increment_by(&mut self, key: &str, amount: u64) {
        match self.counter.get_mut(key) {
            Some(value) => *value += amount,
            None => {
                self.counter.insert(key.to_string(), amount);
            }
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counter.get(key).copied().unwrap_or(0)
    }

    /// `numerator / denominator`, or 0 when the denominator is 0.
    pub fn frac(&self, numerator: &str, denominator: &str) -> f64 {
        let denominator = self.get(denominator);
        if denominator == 0 {
            0.0
        } else {
            self.get(numerator) as f64 / denominator as f64
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counter.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

///
/// Exon credit gathered while classifying one read. Nothing reaches the run
/// totals until the read's outcome is known and [`Collector::collect`] is called.
///
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Collector {
    pending: Vec<(String, String, f64)>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, gene_id: &str, exon_id: &str, credit: f64) {
        self.pending
            .push((gene_id.to_string(), exon_id.to_string(), credit));
    }

    pub fn query_gene(&self, gene_id: &str) -> bool {
        self.pending.iter().any(|(gene, _, _)| gene == gene_id)
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.pending.iter().map(|(_, _, credit)| credit).sum()
    }

    /// Credit every pending exon of `gene_id`.
    pub fn collect(&self, gene_id: &str, exon_counts: &mut FxHashMap<String, f64>) {
        for (gene, exon, credit) in &self.pending {
            if gene == gene_id {
                *exon_counts.entry(exon.clone()).or_insert(0.0) += credit;
            }
        }
    }

    /// Credit only the first pending exon of `gene_id`, with a whole read.
    pub fn collect_single(&self, gene_id: &str, exon_counts: &mut FxHashMap<String, f64>) {
        if let Some((_, exon, _)) = self.pending.iter().find(|(gene, _, _)| gene == gene_id) {
            *exon_counts.entry(exon.clone()).or_insert(0.0) += 1.0;
        }
    }
}
