//! CIGAR to aligned-block conversion.

use rnaseqc_core::models::{
    AlignmentBlock, AlignmentRecord, ChromosomeCode, Kind, is_aligned,
};

use crate::config::ClassifierMode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedBlocks {
    pub blocks: Vec<AlignmentBlock>,
    /// Bases aligned by M, = and X operations.
    pub aligned_length: u64,
}

impl ExtractedBlocks {
    /// Reference bases between the first and last aligned base, inclusive.
    pub fn span(&self) -> u64 {
        match (self.blocks.first(), self.blocks.last()) {
            (Some(first), Some(last)) => last.end + 1 - first.start,
            _ => 0,
        }
    }

    pub fn is_split(&self) -> bool {
        self.blocks.len() > 1
    }

    pub fn end(&self) -> Option<u64> {
        self.blocks.last().map(|b| b.end)
    }
}

///
/// Convert an alignment's CIGAR into reference blocks.
///
/// Blocks separated by a reference gap shorter than `split_distance` are
/// merged. Legacy mode only merges across deletions; every `N` stays a split.
///
pub fn extract_blocks(
    record: &AlignmentRecord,
    chromosome: ChromosomeCode,
    split_distance: u64,
    mode: ClassifierMode,
) -> ExtractedBlocks {
    let strand = record.strand();
    let mut position = record.start;
    let mut blocks: Vec<AlignmentBlock> = Vec::new();
    let mut aligned_length = 0;
    let mut gap = 0;
    let mut gap_has_skip = false;

    for op in &record.cigar {
        let len = op.len() as u64;
        match op.kind() {
            kind if is_aligned(kind) => {
                let start = position;
                let end = position + len - 1;
                let coalesce = gap == 0
                    || match mode {
                        ClassifierMode::Standard => gap < split_distance,
                        ClassifierMode::Legacy => !gap_has_skip && gap < split_distance,
                    };
                match blocks.last_mut() {
                    Some(last) if coalesce => last.end = end,
                    _ => blocks.push(AlignmentBlock {
                        chromosome,
                        start,
                        end,
                        strand,
                    }),
                }
                aligned_length += len;
                position += len;
                gap = 0;
                gap_has_skip = false;
            }
            Kind::Deletion => {
                position += len;
                gap += len;
            }
            Kind::Skip => {
                position += len;
                gap += len;
                gap_has_skip = true;
            }
            _ => {}
        }
    }

    ExtractedBlocks {
        blocks,
        aligned_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    use noodles::sam::record::Cigar;
    use rnaseqc_core::models::{Flags, Strand};

    fn record(start: u64, cigar: &str) -> AlignmentRecord {
        AlignmentRecord {
            start,
            cigar: Cigar::new(cigar.as_bytes())
                .iter()
                .collect::<Result<_, _>>()
                .unwrap(),
            ..Default::default()
        }
    }

    fn spans(extracted: &ExtractedBlocks) -> Vec<(u64, u64)> {
        extracted.blocks.iter().map(|b| (b.start, b.end)).collect()
    }

    #[rstest]
    fn test_simple_match() {
        let extracted = extract_blocks(&record(100, "5S50M"), 1, 100, ClassifierMode::Standard);
        assert_eq!(spans(&extracted), vec![(100, 149)]);
        assert_eq!(extracted.aligned_length, 50);
        assert_eq!(extracted.span(), 50);
        assert!(!extracted.is_split());
    }

    #[rstest]
    fn test_splice_is_split() {
        let extracted =
            extract_blocks(&record(100, "50M1000N50M"), 1, 100, ClassifierMode::Standard);
        assert_eq!(spans(&extracted), vec![(100, 149), (1150, 1199)]);
        assert_eq!(extracted.aligned_length, 100);
        assert_eq!(extracted.span(), 1100);
    }

    #[rstest]
    fn test_insertion_does_not_split() {
        let extracted = extract_blocks(&record(1, "10M2I10M"), 1, 100, ClassifierMode::Standard);
        assert_eq!(spans(&extracted), vec![(1, 20)]);
        assert_eq!(extracted.aligned_length, 20);
    }

    #[rstest]
    #[case(ClassifierMode::Standard, "10M3D10M", vec![(1, 23)])]
    #[case(ClassifierMode::Legacy, "10M3D10M", vec![(1, 23)])]
    #[case(ClassifierMode::Standard, "10M50N10M", vec![(1, 70)])]
    #[case(ClassifierMode::Legacy, "10M50N10M", vec![(1, 10), (61, 70)])]
    #[case(ClassifierMode::Standard, "10M150D10M", vec![(1, 10), (161, 170)])]
    #[case(ClassifierMode::Legacy, "10M150D10M", vec![(1, 10), (161, 170)])]
    fn test_gap_coalescing_by_mode(
        #[case] mode: ClassifierMode,
        #[case] cigar: &str,
        #[case] expected: Vec<(u64, u64)>,
    ) {
        let extracted = extract_blocks(&record(1, cigar), 1, 100, mode);
        assert_eq!(spans(&extracted), expected);
        assert_eq!(extracted.aligned_length, 20);
    }

    #[rstest]
    fn test_blocks_carry_read_strand() {
        let mut rec = record(1, "10M");
        rec.flags = Flags::REVERSE_COMPLEMENTED;
        let extracted = extract_blocks(&rec, 7, 100, ClassifierMode::Standard);
        assert_eq!(extracted.blocks[0].strand, Strand::Reverse);
        assert_eq!(extracted.blocks[0].chromosome, 7);
    }

    #[rstest]
    fn test_unaligned_record_has_no_blocks() {
        let extracted = extract_blocks(&record(1, ""), 1, 100, ClassifierMode::Standard);
        assert_eq!(extracted.span(), 0);
        assert_eq!(extracted.end(), None);
    }
}
