use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::chromosome::ChromosomeCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Strand {
    Forward,
    Reverse,
    Unknown,
}

impl Strand {
    pub fn from_char(c: char) -> Self {
        match c {
            '+' => Strand::Forward,
            '-' => Strand::Reverse,
            _ => Strand::Unknown,
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Strand::Forward => Strand::Reverse,
            Strand::Reverse => Strand::Forward,
            Strand::Unknown => Strand::Unknown,
        }
    }
}

impl Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
            Strand::Unknown => '.',
        };
        write!(f, "{}", c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FeatureKind {
    Gene,
    Transcript,
    Exon,
}

impl FeatureKind {
    /// Parse the feature column of an annotation line. Other feature types are not modelled.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gene" => Some(FeatureKind::Gene),
            "transcript" => Some(FeatureKind::Transcript),
            "exon" => Some(FeatureKind::Exon),
            _ => None,
        }
    }
}

///
/// An annotated genomic interval. Coordinates are 1-based and inclusive.
///
/// For genes `feature_id` equals `gene_id`; for transcripts it is the
/// transcript id; for exons it is the exon id and `transcript_id` names the
/// owning transcript.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub chromosome: ChromosomeCode,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub kind: FeatureKind,
    pub gene_id: String,
    pub feature_id: String,
    pub transcript_id: Option<String>,
}

impl Feature {
    pub fn len(&self) -> u64 {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn is_gene(&self) -> bool {
        self.kind == FeatureKind::Gene
    }

    pub fn is_exon(&self) -> bool {
        self.kind == FeatureKind::Exon
    }

    /// Whether `[start, end]` shares at least one base with this feature.
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        self.start <= end && start <= self.end
    }

    /// Whether `[start, end]` lies entirely within this feature.
    pub fn contains(&self, start: u64, end: u64) -> bool {
        self.start <= start && end <= self.end
    }

    /// Number of bases shared with `[start, end]`.
    pub fn intersection(&self, start: u64, end: u64) -> u64 {
        let lo = self.start.max(start);
        let hi = self.end.min(end);
        if hi >= lo { hi - lo + 1 } else { 0 }
    }
}
