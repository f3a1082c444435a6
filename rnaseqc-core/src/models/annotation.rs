use std::collections::BTreeMap;

use fxhash::FxHashMap;

use super::chromosome::ChromosomeCode;
use super::feature::{Feature, Strand};

/// Per-chromosome features sorted by start.
pub type FeatureMap = BTreeMap<ChromosomeCode, Vec<Feature>>;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneInfo {
    pub name: String,
    pub biotype: Option<String>,
    pub strand: Strand,
    /// Bases covered by the union of the gene's exons.
    pub effective_length: u64,
}

impl GeneInfo {
    pub fn is_rrna(&self) -> bool {
        matches!(
            self.biotype.as_deref(),
            Some("rRNA") | Some("rRNA_pseudogene") | Some("Mt_rRNA")
        )
    }
}

///
/// A gene model ready for the sweep.
///
/// `features` only holds genes and exons; transcripts are kept apart in
/// `transcripts` for the coverage post-pass. `genes` and `exons` list ids in
/// annotation order for reporting.
///
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    pub features: FeatureMap,
    pub transcripts: FxHashMap<String, Feature>,
    pub genes: Vec<String>,
    pub gene_info: FxHashMap<String, GeneInfo>,
    pub exons: Vec<String>,
    pub exon_genes: FxHashMap<String, String>,
}

impl Annotation {
    pub fn has_chromosome(&self, chromosome: ChromosomeCode) -> bool {
        self.features.contains_key(&chromosome)
    }

    pub fn gene(&self, gene_id: &str) -> Option<&GeneInfo> {
        self.gene_info.get(gene_id)
    }

    /// Display name of a gene, falling back to the id.
    pub fn gene_name<'a>(&'a self, gene_id: &'a str) -> &'a str {
        self.gene_info
            .get(gene_id)
            .map(|info| info.name.as_str())
            .unwrap_or(gene_id)
    }

    pub fn feature_count(&self) -> usize {
        self.features.values().map(Vec::len).sum()
    }
}
