//! Forward-only sweep over coordinate-sorted features.
//!
//! Each chromosome's features live in one start-sorted array. Two indices mark
//! the live part of it: `first_in_play` (everything before it has been passed
//! by the read stream and dropped) and `next_unprocessed` (everything from it
//! on has not been reached by any read yet). Both only move forward.

use std::collections::BTreeMap;

use log::debug;

use rnaseqc_core::models::{ChromosomeCode, Feature, FeatureMap};
use rnaseqc_core::{QcError, Result};

///
/// Receives genes as the sweep drops them. Called exactly once per gene.
///
pub trait GeneSink {
    fn gene_dropped(&mut self, gene: &Feature) -> Result<()>;
}

/// Discards dropped genes; for sweeps that carry no per-gene state.
impl GeneSink for () {
    fn gene_dropped(&mut self, _gene: &Feature) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct ChromosomeWindow {
    features: Vec<Feature>,
    first_in_play: usize,
    next_unprocessed: usize,
    last_position: u64,
    flushed: bool,
}

impl ChromosomeWindow {
    fn new(features: Vec<Feature>) -> Self {
        Self {
            features,
            first_in_play: 0,
            next_unprocessed: 0,
            last_position: 0,
            flushed: false,
        }
    }

    fn drop_front<S: GeneSink>(&mut self, sink: &mut S) -> Result<()> {
        let feature = &self.features[self.first_in_play];
        if feature.is_gene() {
            sink.gene_dropped(feature)?;
        }
        self.first_in_play += 1;
        self.next_unprocessed = self.next_unprocessed.max(self.first_in_play);
        Ok(())
    }
}

#[derive(Debug)]
pub struct SweepWindow {
    windows: BTreeMap<ChromosomeCode, ChromosomeWindow>,
    current: Option<ChromosomeCode>,
}

impl SweepWindow {
    pub fn new(features: FeatureMap) -> Self {
        Self {
            windows: features
                .into_iter()
                .map(|(chromosome, features)| (chromosome, ChromosomeWindow::new(features)))
                .collect(),
            current: None,
        }
    }

    pub fn has_chromosome(&self, chromosome: ChromosomeCode) -> bool {
        self.windows.contains_key(&chromosome)
    }

    pub fn current(&self) -> Option<ChromosomeCode> {
        self.current
    }

    ///
    /// Move the sweep to `position` on `chromosome`.
    ///
    /// Switching chromosome flushes the previous one. Features whose end lies
    /// before `position` are dropped from the front of the queue. Going
    /// backwards, or returning to a flushed chromosome, is an input-order error.
    ///
    pub fn advance<S: GeneSink>(
        &mut self,
        chromosome: ChromosomeCode,
        position: u64,
        sink: &mut S,
    ) -> Result<()> {
        if self.current != Some(chromosome) {
            if let Some(previous) = self.current {
                self.flush(previous, sink)?;
            }
            self.current = Some(chromosome);
        }

        let Some(window) = self.windows.get_mut(&chromosome) else {
            return Ok(());
        };
        if window.flushed {
            return Err(QcError::ChromosomeRevisited(chromosome.to_string()));
        }
        if position < window.last_position {
            return Err(QcError::OutOfOrder {
                chromosome: chromosome.to_string(),
                previous: window.last_position,
                position,
            });
        }
        window.last_position = position;

        while window.first_in_play < window.features.len()
            && window.features[window.first_in_play].end < position
        {
            window.drop_front(sink)?;
        }
        Ok(())
    }

    ///
    /// Bring every feature starting at or before `end` into play.
    ///
    pub fn reach(&mut self, chromosome: ChromosomeCode, end: u64) {
        if let Some(window) = self.windows.get_mut(&chromosome) {
            while window.next_unprocessed < window.features.len()
                && window.features[window.next_unprocessed].start <= end
            {
                window.next_unprocessed += 1;
            }
        }
    }

    /// Features currently in play on `chromosome`, in start order.
    pub fn in_play(&self, chromosome: ChromosomeCode) -> &[Feature] {
        match self.windows.get(&chromosome) {
            Some(window) => &window.features[window.first_in_play..window.next_unprocessed],
            None => &[],
        }
    }

    ///
    /// Drop every remaining feature of `chromosome`.
    ///
    pub fn flush<S: GeneSink>(&mut self, chromosome: ChromosomeCode, sink: &mut S) -> Result<()> {
        let Some(window) = self.windows.get_mut(&chromosome) else {
            return Ok(());
        };
        if window.flushed {
            return Ok(());
        }
        debug!(
            "Flushing {} features on chromosome {}",
            window.features.len() - window.first_in_play,
            chromosome
        );
        while window.first_in_play < window.features.len() {
            window.drop_front(sink)?;
        }
        window.flushed = true;
        Ok(())
    }

    /// Flush every chromosome; used at end of stream.
    pub fn finish<S: GeneSink>(&mut self, sink: &mut S) -> Result<()> {
        let chromosomes: Vec<ChromosomeCode> = self.windows.keys().copied().collect();
        for chromosome in chromosomes {
            self.flush(chromosome, sink)?;
        }
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    use rnaseqc_core::models::{FeatureKind, Strand};

    #[derive(Default)]
    struct Recorder {
        dropped: Vec<String>,
    }

    impl GeneSink for Recorder {
        fn gene_dropped(&mut self, gene: &Feature) -> Result<()> {
            self.dropped.push(gene.gene_id.clone());
            Ok(())
        }
    }

    fn feature(chromosome: ChromosomeCode, kind: FeatureKind, id: &str, start: u64, end: u64) -> Feature {
        Feature {
            chromosome,
            start,
            end,
            strand: Strand::Forward,
            kind,
            gene_id: id.to_string(),
            feature_id: id.to_string(),
            transcript_id: None,
        }
    }

    #[fixture]
    fn features() -> FeatureMap {
        let mut map = FeatureMap::new();
        map.insert(
            1,
            vec![
                feature(1, FeatureKind::Gene, "A", 100, 400),
                feature(1, FeatureKind::Exon, "A", 100, 199),
                feature(1, FeatureKind::Gene, "B", 500, 700),
                feature(1, FeatureKind::Exon, "B", 500, 599),
            ],
        );
        map.insert(2, vec![feature(2, FeatureKind::Gene, "C", 10, 20)]);
        map
    }

    #[rstest]
    fn test_advance_drops_passed_genes(features: FeatureMap) {
        let mut sweep = SweepWindow::new(features);
        let mut sink = Recorder::default();

        sweep.advance(1, 150, &mut sink).unwrap();
        sweep.reach(1, 180);
        assert_eq!(sweep.in_play(1).len(), 2);
        assert!(sink.dropped.is_empty());

        sweep.advance(1, 450, &mut sink).unwrap();
        assert_eq!(sink.dropped, vec!["A".to_string()]);
        sweep.reach(1, 520);
        let ids: Vec<&str> = sweep.in_play(1).iter().map(|f| f.feature_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "B"]);
    }

    #[rstest]
    fn test_chromosome_change_flushes_previous(features: FeatureMap) {
        let mut sweep = SweepWindow::new(features);
        let mut sink = Recorder::default();
        sweep.advance(1, 150, &mut sink).unwrap();
        sweep.advance(2, 5, &mut sink).unwrap();
        assert_eq!(sink.dropped, vec!["A".to_string(), "B".to_string()]);
        assert!(sweep.in_play(1).is_empty());
    }

    #[rstest]
    fn test_every_gene_dropped_exactly_once(features: FeatureMap) {
        let mut sweep = SweepWindow::new(features);
        let mut sink = Recorder::default();
        sweep.advance(1, 450, &mut sink).unwrap();
        sweep.finish(&mut sink).unwrap();
        sweep.finish(&mut sink).unwrap();
        assert_eq!(
            sink.dropped,
            vec!["A".to_string(), "B".to_string(), "C".to_string()]
        );
    }

    #[rstest]
    fn test_backwards_position_is_fatal(features: FeatureMap) {
        let mut sweep = SweepWindow::new(features);
        sweep.advance(1, 300, &mut ()).unwrap();
        let err = sweep.advance(1, 299, &mut ()).unwrap_err();
        assert!(matches!(err, QcError::OutOfOrder { previous: 300, position: 299, .. }));
    }

    #[rstest]
    fn test_revisiting_chromosome_is_fatal(features: FeatureMap) {
        let mut sweep = SweepWindow::new(features);
        sweep.advance(1, 300, &mut ()).unwrap();
        sweep.advance(2, 1, &mut ()).unwrap();
        let err = sweep.advance(1, 900, &mut ()).unwrap_err();
        assert!(matches!(err, QcError::ChromosomeRevisited(_)));
    }

    #[rstest]
    fn test_unknown_chromosome_has_nothing_in_play(features: FeatureMap) {
        let mut sweep = SweepWindow::new(features);
        sweep.advance(9, 1, &mut ()).unwrap();
        sweep.reach(9, 100);
        assert!(sweep.in_play(9).is_empty());
        assert!(!sweep.has_chromosome(9));
        assert_eq!(sweep.current(), Some(9));
    }
}
