pub use noodles::sam::alignment::record::Flags;
pub use noodles::sam::alignment::record::cigar::Op;
pub use noodles::sam::alignment::record::cigar::op::Kind;

use super::chromosome::ChromosomeCode;
use super::feature::Strand;

/// Aligned bases: these CIGAR operations produce blocks.
pub fn is_aligned(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch
    )
}

/// Edit distance carried in the `NM` tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NmTag {
    #[default]
    Missing,
    Value(u32),
    Malformed,
}

///
/// One decoded alignment, independent of the file format it came from.
///
/// `start` and `mate_start` are 1-based; 0 means unplaced.
///
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentRecord {
    pub name: String,
    pub reference_id: Option<usize>,
    pub reference_name: Option<String>,
    pub start: u64,
    pub cigar: Vec<Op>,
    pub flags: Flags,
    pub mapping_quality: u8,
    pub mate_reference_id: Option<usize>,
    pub mate_start: u64,
    pub sequence_length: u64,
    pub nm: NmTag,
    pub tags: Vec<[u8; 2]>,
}

impl AlignmentRecord {
    pub fn has_tag(&self, tag: &str) -> bool {
        match tag.as_bytes() {
            [a, b] => self.tags.iter().any(|t| t == &[*a, *b]),
            _ => false,
        }
    }

    pub fn strand(&self) -> Strand {
        if self.flags.is_reverse_complemented() {
            Strand::Reverse
        } else {
            Strand::Forward
        }
    }

    /// Last reference base covered by the alignment (1-based, inclusive).
    pub fn reference_end(&self) -> u64 {
        let consumed: u64 = self
            .cigar
            .iter()
            .filter(|op| op.kind().consumes_reference())
            .map(|op| op.len() as u64)
            .sum();
        (self.start + consumed).saturating_sub(1).max(self.start)
    }

    /// Whether this read is the second mate of a pair.
    pub fn is_second_mate(&self) -> bool {
        self.flags.is_segmented() && !self.flags.is_first_segment()
    }
}

///
/// A contiguous reference-aligned segment of one read. Coordinates are
/// 1-based and inclusive.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentBlock {
    pub chromosome: ChromosomeCode,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
}

impl AlignmentBlock {
    pub fn len(&self) -> u64 {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}
