//! Fragment-size sampling over a secondary exon model.

use fxhash::FxHashMap;
use log::info;

use rnaseqc_core::Result;
use rnaseqc_core::models::{AlignmentBlock, AlignmentRecord, ChromosomeCode, FeatureMap};

use crate::sweep::SweepWindow;

///
/// Samples fragment sizes from mate pairs that both fall entirely inside the
/// same exon of a non-overlapping exon model.
///
/// The first mate of a pair leaves its exon id behind under the read name;
/// the second mate takes a sample only if it lands in that same exon.
/// Sampling stops for good once the budget is spent.
///
#[derive(Debug)]
pub struct FragmentSampler {
    window: SweepWindow,
    pending: FxHashMap<String, String>,
    samples: Vec<u64>,
    remaining: u64,
}

impl FragmentSampler {
    pub fn new(exons: FeatureMap, budget: u64) -> Self {
        Self {
            window: SweepWindow::new(exons),
            pending: FxHashMap::default(),
            samples: Vec::new(),
            remaining: budget,
        }
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }

    pub fn samples(&self) -> &[u64] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<u64> {
        self.samples
    }

    pub fn observe(
        &mut self,
        record: &AlignmentRecord,
        chromosome: ChromosomeCode,
        blocks: &[AlignmentBlock],
    ) -> Result<()> {
        if self.is_done() || !record.flags.is_segmented() || !self.window.has_chromosome(chromosome) {
            return Ok(());
        }
        let Some(last) = blocks.last() else {
            return Ok(());
        };

        self.window.advance(chromosome, record.start, &mut ())?;
        self.window.reach(chromosome, last.end);
        let exon = self
            .window
            .in_play(chromosome)
            .iter()
            .find(|exon| blocks.iter().all(|b| exon.contains(b.start, b.end)));

        match (exon, self.pending.remove(&record.name)) {
            (Some(exon), Some(mate_exon)) if mate_exon == exon.feature_id => {
                self.samples.push(record.start.abs_diff(record.mate_start));
                self.remaining -= 1;
                if self.is_done() {
                    info!("Completed taking {} fragment size samples", self.samples.len());
                    self.pending.clear();
                }
            }
            (Some(exon), None) => {
                self.pending
                    .insert(record.name.clone(), exon.feature_id.clone());
            }
            _ => {}
        }
        Ok(())
    }
}
