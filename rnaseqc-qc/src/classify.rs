//! Block-versus-feature classification of one read.
//!
//! Two strategies are kept side by side. The standard one requires every
//! block of a read to agree on a single gene before the read is exonic. The
//! legacy one assigns each block to the first exon it touches.

use fxhash::FxHashSet;

use rnaseqc_core::models::{AlignmentBlock, Feature, Strand};

use crate::blocks::ExtractedBlocks;
use crate::config::ClassifierMode;
use crate::coverage::CoverageEntry;
use crate::metrics::Collector;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadClass {
    Exonic { gene_id: String },
    Intronic,
    Intergenic,
    Disqualified,
}

impl ReadClass {
    fn rank(&self) -> u8 {
        match self {
            ReadClass::Disqualified => 0,
            ReadClass::Intergenic => 1,
            ReadClass::Intronic => 2,
            ReadClass::Exonic { .. } => 3,
        }
    }
}

/// Coverage produced by an exonic read, routed to the owning gene's cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageCredit {
    pub gene_id: String,
    pub exon_start: u64,
    pub entry: CoverageEntry,
}

///
/// Per-read strand information.
///
/// `strand_filter` is the strand a feature must be on to count, `None` for
/// unstranded libraries. `transcript_strand` is the read's strand under the
/// forward-first-strand convention, used for sense/antisense tallies.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadContext {
    pub strand_filter: Option<Strand>,
    pub transcript_strand: Strand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub class: ReadClass,
    /// Exon credit; only populated for exonic reads.
    pub credits: Collector,
    pub coverage: Vec<CoverageCredit>,
    /// Genes overlapping any block, after strand filtering.
    pub genes: Vec<String>,
    /// Exonic evidence pointed at more than one gene.
    pub ambiguous: bool,
    /// Whether an overlapping gene lies on the read's transcript strand.
    pub sense: Option<bool>,
}

impl ReadOutcome {
    fn new(class: ReadClass, genes: Vec<String>) -> Self {
        Self {
            class,
            credits: Collector::new(),
            coverage: Vec::new(),
            genes,
            ambiguous: false,
            sense: None,
        }
    }
}

fn strand_matches(feature: &Feature, filter: Option<Strand>) -> bool {
    match filter {
        None => true,
        Some(strand) => feature.strand == strand || feature.strand == Strand::Unknown,
    }
}

fn overlapping<'a>(
    features: &'a [Feature],
    block: &'a AlignmentBlock,
    filter: Option<Strand>,
) -> impl Iterator<Item = &'a Feature> + 'a {
    features
        .iter()
        .filter(move |f| f.overlaps(block.start, block.end) && strand_matches(f, filter))
}

/// Overlapping genes across all blocks, first-seen order.
fn overlapping_genes(
    features: &[Feature],
    blocks: &[AlignmentBlock],
    filter: Option<Strand>,
) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut genes = Vec::new();
    for block in blocks {
        for gene in overlapping(features, block, filter).filter(|f| f.is_gene()) {
            if seen.insert(gene.gene_id.as_str()) {
                genes.push(gene.gene_id.clone());
            }
        }
    }
    genes
}

fn sense(features: &[Feature], blocks: &[AlignmentBlock], transcript_strand: Strand) -> Option<bool> {
    let mut any = false;
    for block in blocks {
        for gene in overlapping(features, block, None).filter(|f| f.is_gene()) {
            if gene.strand == transcript_strand {
                return Some(true);
            }
            any = true;
        }
    }
    any.then_some(false)
}

///
/// Classify one read against the features currently in play.
///
pub fn classify(
    mode: ClassifierMode,
    extracted: &ExtractedBlocks,
    features: &[Feature],
    context: &ReadContext,
) -> ReadOutcome {
    match mode {
        ClassifierMode::Standard => classify_standard(extracted, features, context),
        ClassifierMode::Legacy => classify_legacy(extracted, features, context),
    }
}

struct BlockOutcome<'a> {
    class: ReadClass,
    exons: Vec<&'a Feature>,
    ambiguous: bool,
}

fn classify_block<'a>(
    block: &'a AlignmentBlock,
    features: &'a [Feature],
    filter: Option<Strand>,
) -> BlockOutcome<'a> {
    let hits: Vec<&Feature> = overlapping(features, block, filter).collect();
    let outcome = |class, ambiguous| BlockOutcome {
        class,
        exons: Vec::new(),
        ambiguous,
    };

    if !hits.iter().any(|f| f.is_gene()) {
        return outcome(ReadClass::Intergenic, false);
    }
    if !hits.iter().any(|f| f.is_exon()) {
        return outcome(ReadClass::Intronic, false);
    }

    let containing: Vec<&Feature> = hits
        .iter()
        .copied()
        .filter(|f| f.is_exon() && f.contains(block.start, block.end))
        .collect();
    let Some(first) = containing.first() else {
        // straddles an exon boundary
        return outcome(ReadClass::Disqualified, false);
    };
    let gene_id = &first.gene_id;
    if hits.iter().any(|f| &f.gene_id != gene_id) {
        return outcome(ReadClass::Disqualified, true);
    }

    BlockOutcome {
        class: ReadClass::Exonic {
            gene_id: gene_id.clone(),
        },
        exons: containing,
        ambiguous: false,
    }
}

///
/// Every block must land inside exons of one and the same gene for the read
/// to be exonic. Otherwise the read takes the weakest block outcome.
///
pub fn classify_standard(
    extracted: &ExtractedBlocks,
    features: &[Feature],
    context: &ReadContext,
) -> ReadOutcome {
    let blocks = &extracted.blocks;
    let genes = overlapping_genes(features, blocks, context.strand_filter);
    let outcomes: Vec<BlockOutcome> = blocks
        .iter()
        .map(|block| classify_block(block, features, context.strand_filter))
        .collect();

    let mut exonic_genes = FxHashSet::default();
    for outcome in &outcomes {
        if let ReadClass::Exonic { gene_id } = &outcome.class {
            exonic_genes.insert(gene_id.as_str());
        }
    }
    let ambiguous = exonic_genes.len() > 1 || outcomes.iter().any(|o| o.ambiguous);

    let class = if ambiguous || outcomes.iter().any(|o| o.class == ReadClass::Disqualified) {
        ReadClass::Disqualified
    } else {
        outcomes
            .iter()
            .map(|o| &o.class)
            .min_by_key(|class| class.rank())
            .cloned()
            .unwrap_or(ReadClass::Intergenic)
    };

    let mut result = ReadOutcome::new(class, genes);
    result.ambiguous = ambiguous;
    result.sense = sense(features, blocks, context.transcript_strand);

    if let ReadClass::Exonic { gene_id } = &result.class {
        let aligned = extracted.aligned_length.max(1) as f64;
        for (block, outcome) in blocks.iter().zip(&outcomes) {
            let mut credited = FxHashSet::default();
            for exon in &outcome.exons {
                if credited.insert(exon.feature_id.as_str()) {
                    let overlap = exon.intersection(block.start, block.end);
                    result
                        .credits
                        .add(gene_id, &exon.feature_id, overlap as f64 / aligned);
                }
                result.coverage.push(CoverageCredit {
                    gene_id: gene_id.clone(),
                    exon_start: exon.start,
                    entry: CoverageEntry {
                        offset: block.start - exon.start,
                        length: block.len(),
                        transcript_id: exon.transcript_id.clone().unwrap_or_default(),
                        feature_id: exon.feature_id.clone(),
                    },
                });
            }
        }
    }
    result
}

///
/// Assign each block to the first exon it overlaps. The read is exonic only
/// if every block found an exon of the same gene; the first block's exon
/// takes the credit.
///
pub fn classify_legacy(
    extracted: &ExtractedBlocks,
    features: &[Feature],
    context: &ReadContext,
) -> ReadOutcome {
    let blocks = &extracted.blocks;
    let genes = overlapping_genes(features, blocks, context.strand_filter);

    let assigned: Vec<Option<&Feature>> = blocks
        .iter()
        .map(|block| overlapping(features, block, context.strand_filter).find(|f| f.is_exon()))
        .collect();

    if assigned.is_empty() || assigned.iter().any(Option::is_none) {
        let class = if genes.is_empty() {
            ReadClass::Intergenic
        } else {
            ReadClass::Intronic
        };
        return ReadOutcome::new(class, genes);
    }

    let exons: Vec<&Feature> = assigned.into_iter().flatten().collect();
    let first = exons[0];
    if exons.iter().any(|exon| exon.gene_id != first.gene_id) {
        let mut result = ReadOutcome::new(ReadClass::Disqualified, genes);
        result.ambiguous = true;
        return result;
    }
    let mut result = ReadOutcome::new(
        ReadClass::Exonic {
            gene_id: first.gene_id.clone(),
        },
        genes,
    );
    result.credits.add(&first.gene_id, &first.feature_id, 1.0);

    for (block, exon) in blocks.iter().zip(exons) {
        let start = block.start.max(exon.start);
        result.coverage.push(CoverageCredit {
            gene_id: exon.gene_id.clone(),
            exon_start: exon.start,
            entry: CoverageEntry {
                offset: start - exon.start,
                length: exon.intersection(block.start, block.end),
                transcript_id: exon.transcript_id.clone().unwrap_or_default(),
                feature_id: exon.feature_id.clone(),
            },
        });
    }
    result
}
