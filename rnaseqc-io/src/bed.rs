use std::io::BufRead;
use std::path::Path;

use log::info;

use rnaseqc_core::models::{ChromosomeMap, Feature, FeatureKind, FeatureMap, Strand};
use rnaseqc_core::utils::get_dynamic_reader;
use rnaseqc_core::{QcError, Result};

///
/// Read a BED file of non-overlapping exons used only for fragment sizes.
///
/// BED `[start, end)` intervals become 1-based inclusive `[start + 1, end]`.
/// The name column (or the whole line when absent) identifies the exon.
///
pub fn read_bed_exons(path: &Path, chromosomes: &mut ChromosomeMap) -> Result<FeatureMap> {
    let reader =
        get_dynamic_reader(path).map_err(|_| QcError::MissingAnnotation(path.to_path_buf()))?;
    let exons = parse_bed_exons(reader, chromosomes)?;
    info!(
        "Loaded {} fragment-size exons from {}",
        exons.values().map(Vec::len).sum::<usize>(),
        path.display()
    );
    Ok(exons)
}

pub fn parse_bed_exons<R: BufRead>(reader: R, chromosomes: &mut ChromosomeMap) -> Result<FeatureMap> {
    let mut exons = FeatureMap::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("track")
            || trimmed.starts_with("browser")
        {
            continue;
        }

        let fields: Vec<&str> = trimmed.split('\t').collect();
        if fields.len() < 3 {
            return Err(QcError::Parse {
                line: index + 1,
                message: format!("BED line has fewer than 3 fields: '{}'", trimmed),
            });
        }
        let parse = |field: &str| {
            field.parse::<u64>().map_err(|e| QcError::Parse {
                line: index + 1,
                message: format!("invalid coordinate '{}': {}", field, e),
            })
        };
        let start = parse(fields[1])? + 1;
        let end = parse(fields[2])?;
        if end < start {
            continue;
        }

        let exon_id = fields.get(3).map_or(trimmed, |name| *name).to_string();
        let strand = fields
            .get(5)
            .and_then(|s| s.chars().next())
            .map_or(Strand::Unknown, Strand::from_char);
        let chromosome = chromosomes.normalize(fields[0]);

        exons.entry(chromosome).or_default().push(Feature {
            chromosome,
            start,
            end,
            strand,
            kind: FeatureKind::Exon,
            gene_id: exon_id.clone(),
            feature_id: exon_id,
            transcript_id: None,
        });
    }

    for features in exons.values_mut() {
        features.sort_by_key(|f| f.start);
    }

    Ok(exons)
}
