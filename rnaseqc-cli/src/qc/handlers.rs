use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::info;

use rnaseqc_core::models::ChromosomeMap;
use rnaseqc_io::{BamSource, read_bed_exons, read_gtf};
use rnaseqc_qc::{QcConfig, RunInputs, Strandedness, run_qc};

///
/// Build the run configuration: the `--config` file when given, otherwise
/// the defaults, with every flag present on the command line applied on top.
///
pub fn config_from_matches(matches: &ArgMatches) -> Result<QcConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => QcConfig::try_from(Path::new(path))
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => QcConfig::default(),
    };

    if let Some(sample) = matches.get_one::<String>("sample") {
        config.sample = Some(sample.clone());
    }
    if let Some(&value) = matches.get_one::<u64>("fragment-samples") {
        config.fragment_samples = value;
    }
    if let Some(&value) = matches.get_one::<u8>("mapping-quality") {
        config.mapping_quality = value;
    }
    if let Some(&value) = matches.get_one::<u8>("low-quality") {
        config.low_quality = value;
    }
    if let Some(&value) = matches.get_one::<u32>("base-mismatch") {
        config.base_mismatch = value;
    }
    if let Some(&value) = matches.get_one::<u64>("chimeric-distance") {
        config.chimeric_distance = value;
    }
    if let Some(tag) = matches.get_one::<String>("chimeric-tag") {
        config.chimeric_tag = tag.clone();
    }
    if let Some(&value) = matches.get_one::<u64>("split-distance") {
        config.split_distance = value;
    }
    if let Some(&value) = matches.get_one::<u64>("read-length") {
        config.max_read_length = value;
    }
    if let Some(&value) = matches.get_one::<u64>("offset") {
        config.bias.offset = value;
    }
    if let Some(&value) = matches.get_one::<u64>("window-size") {
        config.bias.window = value;
    }
    if let Some(&value) = matches.get_one::<u64>("gene-length") {
        config.bias.min_gene_length = value;
    }
    if let Some(&value) = matches.get_one::<u64>("detection-threshold") {
        config.bias.detection_threshold = value;
    }
    if let Some(strand) = matches.get_one::<String>("stranded") {
        config.strandedness = strand.parse::<Strandedness>()?;
    }
    if let Some(tags) = matches.get_many::<String>("tag") {
        config.filter_tags = tags.cloned().collect();
    }

    // switches only ever turn a setting on
    config.exclude_chimeric |= matches.get_flag("exclude-chimeric");
    config.legacy |= matches.get_flag("legacy");
    config.unpaired |= matches.get_flag("unpaired");
    config.rpkm |= matches.get_flag("rpkm");
    config.coverage |= matches.get_flag("coverage");

    config.validate()?;
    Ok(config)
}

/// Sample name from the configuration, falling back to the BAM file name.
pub fn sample_name(config: &QcConfig, bam: &Path) -> String {
    config.sample.clone().unwrap_or_else(|| {
        bam.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| bam.to_string_lossy().into_owned())
    })
}

pub fn run_rnaseqc(matches: &ArgMatches) -> Result<()> {
    // positionals are required by the parser
    let gtf = PathBuf::from(matches.get_one::<String>("gtf").context("A GTF file is required.")?);
    let bam = PathBuf::from(matches.get_one::<String>("bam").context("A BAM file is required.")?);
    let output = PathBuf::from(
        matches
            .get_one::<String>("output")
            .context("An output directory is required.")?,
    );

    let config = config_from_matches(matches)?;
    let sample = sample_name(&config, &bam);

    let mut chromosomes = ChromosomeMap::new();
    info!("Reading gene model from {}", gtf.display());
    let annotation = read_gtf(&gtf, &mut chromosomes, config.legacy)?;

    let fragment_exons = match matches.get_one::<String>("bed") {
        Some(bed) => {
            info!("Reading fragment exons from {}", bed);
            Some(read_bed_exons(Path::new(bed), &mut chromosomes)?)
        }
        None => None,
    };

    let source = BamSource::open(&bam)?;
    let reference_names = source.reference_names().to_vec();

    info!("Processing {} as sample {}", bam.display(), sample);
    let summary = run_qc(
        &config,
        RunInputs {
            annotation: &annotation,
            chromosomes: &chromosomes,
            reference_names: &reference_names,
            records: source,
            fragment_exons,
        },
        &output,
        &sample,
    )?;

    info!(
        "Finished: {} reads used for exon counts, {} transcripts with coverage",
        summary.result.metrics.get("Reads used for Intron/Exon counts"),
        summary.coverage.transcripts
    );

    Ok(())
}
