//! GTF ingestion.
//!
//! Keeps `gene` and `exon` records for the sweep and `transcript` records for
//! the coverage post-pass. Every other feature type is ignored.

use std::io::BufRead;
use std::path::Path;

use fxhash::FxHashMap;
use log::{debug, info};

use rnaseqc_core::models::{
    Annotation, ChromosomeCode, ChromosomeMap, Feature, FeatureKind, GeneInfo, Strand,
};
use rnaseqc_core::utils::get_dynamic_reader;
use rnaseqc_core::{QcError, Result};

struct GeneBuilder {
    chromosome: ChromosomeCode,
    strand: Strand,
    name: Option<String>,
    biotype: Option<String>,
    span: Option<(u64, u64)>,
    extent: (u64, u64),
    exons: Vec<(u64, u64)>,
}

impl GeneBuilder {
    fn new(chromosome: ChromosomeCode, strand: Strand, start: u64, end: u64) -> Self {
        Self {
            chromosome,
            strand,
            name: None,
            biotype: None,
            span: None,
            extent: (start, end),
            exons: Vec::new(),
        }
    }

    fn extend(&mut self, start: u64, end: u64) {
        self.extent = (self.extent.0.min(start), self.extent.1.max(end));
    }
}

///
/// Split a GTF attribute column into `key -> value` pairs.
///
/// Values have their surrounding quotes removed. Repeated keys keep the last value.
///
pub fn parse_attributes(attrs: &str) -> FxHashMap<&str, &str> {
    attrs
        .split(';')
        .filter_map(|field| {
            let (key, value) = field.trim().split_once(' ')?;
            Some((key, value.trim().trim_matches('"')))
        })
        .collect()
}

fn parse_coordinate(field: &str, line: usize) -> Result<u64> {
    field.parse::<u64>().map_err(|e| QcError::Parse {
        line,
        message: format!("invalid coordinate '{}': {}", field, e),
    })
}

/// Size of the union of a set of inclusive intervals.
fn union_length(mut spans: Vec<(u64, u64)>) -> u64 {
    spans.sort_unstable();
    let mut total = 0;
    let mut current: Option<(u64, u64)> = None;
    for (start, end) in spans {
        current = match current {
            Some((cs, ce)) if start <= ce => Some((cs, ce.max(end))),
            Some((cs, ce)) => {
                total += ce - cs + 1;
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((cs, ce)) = current {
        total += ce - cs + 1;
    }
    total
}

fn kind_rank(feature: &Feature) -> u8 {
    match feature.kind {
        FeatureKind::Gene => 0,
        FeatureKind::Transcript => 1,
        FeatureKind::Exon => 2,
    }
}

///
/// Read a (possibly gzip'd) GTF file.
///
/// # Arguments
/// - path: path to the annotation
/// - chromosomes: normaliser shared with the alignment reader
/// - legacy: drop single-base features like older releases did
///
pub fn read_gtf(path: &Path, chromosomes: &mut ChromosomeMap, legacy: bool) -> Result<Annotation> {
    let reader =
        get_dynamic_reader(path).map_err(|_| QcError::MissingAnnotation(path.to_path_buf()))?;
    let annotation = parse_gtf(reader, chromosomes, legacy)?;
    info!(
        "Loaded {} genes, {} exons and {} transcripts from {}",
        annotation.genes.len(),
        annotation.exons.len(),
        annotation.transcripts.len(),
        path.display()
    );
    Ok(annotation)
}

pub fn parse_gtf<R: BufRead>(
    reader: R,
    chromosomes: &mut ChromosomeMap,
    legacy: bool,
) -> Result<Annotation> {
    let mut annotation = Annotation::default();
    let mut builders: FxHashMap<String, GeneBuilder> = FxHashMap::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            continue;
        }
        let Some(kind) = FeatureKind::parse(fields[2]) else {
            continue;
        };

        let start = parse_coordinate(fields[3], line_no)?;
        let end = parse_coordinate(fields[4], line_no)?;
        if end < start {
            return Err(QcError::Parse {
                line: line_no,
                message: format!("feature ends ({}) before it starts ({})", end, start),
            });
        }

        let attrs = parse_attributes(fields[8]);
        let Some(gene_id) = attrs.get("gene_id").copied() else {
            return Err(QcError::Parse {
                line: line_no,
                message: "missing gene_id attribute".to_string(),
            });
        };

        if legacy && start == end {
            debug!("Legacy mode excluded {} feature of {} at line {}", fields[2], gene_id, line_no);
            continue;
        }

        let chromosome = chromosomes.normalize(fields[0]);
        let strand = Strand::from_char(fields[6].chars().next().unwrap_or('.'));

        let gene = builders.entry(gene_id.to_string()).or_insert_with(|| {
            annotation.genes.push(gene_id.to_string());
            GeneBuilder::new(chromosome, strand, start, end)
        });
        gene.extend(start, end);
        if let Some(name) = attrs.get("gene_name") {
            gene.name = Some(name.to_string());
        }
        if let Some(biotype) = attrs.get("gene_type").or_else(|| attrs.get("gene_biotype")) {
            gene.biotype = Some(biotype.to_string());
        }

        match kind {
            FeatureKind::Gene => {
                gene.span = Some((start, end));
                gene.strand = strand;
                gene.chromosome = chromosome;
            }
            FeatureKind::Transcript => {
                let Some(transcript_id) = attrs.get("transcript_id") else {
                    continue;
                };
                annotation.transcripts.insert(
                    transcript_id.to_string(),
                    Feature {
                        chromosome,
                        start,
                        end,
                        strand,
                        kind,
                        gene_id: gene_id.to_string(),
                        feature_id: transcript_id.to_string(),
                        transcript_id: Some(transcript_id.to_string()),
                    },
                );
            }
            FeatureKind::Exon => {
                let transcript_id = attrs.get("transcript_id").copied().unwrap_or(gene_id);
                let exon_id = match (attrs.get("exon_id"), attrs.get("exon_number")) {
                    (Some(id), _) => id.to_string(),
                    (None, Some(number)) => format!("{}_{}", transcript_id, number),
                    (None, None) => format!("{}_{}", transcript_id, start),
                };
                gene.exons.push((start, end));
                if annotation
                    .exon_genes
                    .insert(exon_id.clone(), gene_id.to_string())
                    .is_none()
                {
                    annotation.exons.push(exon_id.clone());
                }
                annotation
                    .features
                    .entry(chromosome)
                    .or_default()
                    .push(Feature {
                        chromosome,
                        start,
                        end,
                        strand,
                        kind,
                        gene_id: gene_id.to_string(),
                        feature_id: exon_id,
                        transcript_id: Some(transcript_id.to_string()),
                    });
            }
        }
    }

    for gene_id in &annotation.genes {
        let Some(builder) = builders.remove(gene_id) else {
            continue;
        };
        let (start, end) = match builder.span {
            Some(span) => span,
            None => {
                debug!("Gene {} has no gene record; using the span of its features", gene_id);
                builder.extent
            }
        };
        annotation
            .features
            .entry(builder.chromosome)
            .or_default()
            .push(Feature {
                chromosome: builder.chromosome,
                start,
                end,
                strand: builder.strand,
                kind: FeatureKind::Gene,
                gene_id: gene_id.clone(),
                feature_id: gene_id.clone(),
                transcript_id: None,
            });
        annotation.gene_info.insert(
            gene_id.clone(),
            GeneInfo {
                name: builder.name.unwrap_or_else(|| gene_id.clone()),
                biotype: builder.biotype,
                strand: builder.strand,
                effective_length: union_length(builder.exons),
            },
        );
    }

    for features in annotation.features.values_mut() {
        features.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| kind_rank(a).cmp(&kind_rank(b)))
        });
    }

    Ok(annotation)
}
