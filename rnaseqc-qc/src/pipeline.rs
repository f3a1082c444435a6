//! The single-pass run loop.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use fxhash::{FxHashMap, FxHashSet};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, debug, info, log_enabled, warn};

use rnaseqc_core::models::{
    AlignmentRecord, Annotation, ChromosomeCode, ChromosomeMap, FeatureMap, NmTag, Strand,
};
use rnaseqc_core::utils::prepare_output_dir;
use rnaseqc_core::{QcError, Result};

use crate::bias::BiasCounter;
use crate::blocks::extract_blocks;
use crate::classify::{ReadClass, ReadContext, classify};
use crate::config::{ClassifierMode, QcConfig};
use crate::coverage::CoverageAccumulator;
use crate::fragments::FragmentSampler;
use crate::metrics::Metrics;
use crate::reconstruct::{CoverageSummary, reconstruct};
use crate::report;
use crate::sweep::SweepWindow;

/// Name of the coverage spool inside the output directory.
pub const SPOOL_FILE: &str = "coverage.tmp.tsv";
const PROGRESS_INTERVAL: u64 = 250_000;

/// Everything the run loop accumulated, ready for reporting.
#[derive(Debug)]
pub struct QcResult {
    pub metrics: Metrics,
    pub gene_counts: FxHashMap<String, u64>,
    pub exon_counts: FxHashMap<String, f64>,
    pub bias: BiasCounter,
    pub fragment_sizes: Vec<u64>,
    pub read_length: u64,
    /// Coverage entries cached for genes that were never committed.
    pub unclaimed: usize,
}

///
/// State of one QC run over a coordinate-sorted alignment stream.
///
/// Every alignment goes through [`QcRun::process`] in file order. Reads that
/// pass the filters advance the sweep to their start, are classified against
/// the features in play, and feed the coverage accumulator and fragment
/// sampler. Genes the sweep leaves behind are committed to the spool.
///
pub struct QcRun<'a, W: Write> {
    config: &'a QcConfig,
    mode: ClassifierMode,
    annotation: &'a Annotation,
    references: Vec<Option<ChromosomeCode>>,
    window: SweepWindow,
    coverage: CoverageAccumulator<W>,
    fragments: Option<FragmentSampler>,
    metrics: Metrics,
    gene_counts: FxHashMap<String, u64>,
    exon_counts: FxHashMap<String, f64>,
    read_length: u64,
    alignments: u64,
    /// Reference id and start of the last mapped primary alignment.
    last_placed: Option<(usize, u64)>,
    left_references: FxHashSet<usize>,
}

fn end_label(record: &AlignmentRecord) -> &'static str {
    if record.is_second_mate() {
        "End 2"
    } else {
        "End 1"
    }
}

/// Strand of the transcript a read came from under the forward-first-strand convention.
fn transcript_strand(record: &AlignmentRecord) -> Strand {
    if record.is_second_mate() {
        record.strand().flip()
    } else {
        record.strand()
    }
}

impl<'a, W: Write> QcRun<'a, W> {
    ///
    /// Set up a run. `reference_names` are the alignment file's contigs in
    /// header order; at least one must be annotated.
    ///
    pub fn new(
        config: &'a QcConfig,
        annotation: &'a Annotation,
        chromosomes: &ChromosomeMap,
        reference_names: &[String],
        spool: W,
        fragment_exons: Option<FeatureMap>,
    ) -> Result<Self> {
        let references: Vec<Option<ChromosomeCode>> = reference_names
            .iter()
            .map(|name| chromosomes.lookup(name))
            .collect();
        let shared = references
            .iter()
            .flatten()
            .filter(|code| annotation.has_chromosome(**code))
            .count();
        if shared == 0 {
            return Err(QcError::NoContigOverlap);
        }
        debug!(
            "{} of {} alignment contigs are annotated",
            shared,
            reference_names.len()
        );

        Ok(Self {
            config,
            mode: config.mode(),
            annotation,
            references,
            window: SweepWindow::new(annotation.features.clone()),
            coverage: CoverageAccumulator::new(spool, BiasCounter::new(&config.bias)),
            fragments: fragment_exons
                .map(|exons| FragmentSampler::new(exons, config.fragment_samples)),
            metrics: Metrics::new(),
            gene_counts: FxHashMap::default(),
            exon_counts: FxHashMap::default(),
            read_length: 0,
            alignments: 0,
            last_placed: None,
            left_references: FxHashSet::default(),
        })
    }

    pub fn alignments(&self) -> u64 {
        self.alignments
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn process(&mut self, record: &AlignmentRecord) -> Result<()> {
        self.alignments += 1;
        let flags = record.flags;

        if flags.is_secondary() || flags.is_supplementary() {
            self.metrics.increment("Alternative Alignments");
            return Ok(());
        }
        if flags.is_qc_fail() {
            self.metrics.increment("Failed Vendor QC");
            return Ok(());
        }
        if record.mapping_quality < self.config.low_quality {
            self.metrics.increment("Low quality reads");
        }

        self.metrics
            .increment("Unique Mapping, Vendor QC Passed Reads");
        if !flags.is_segmented() {
            self.metrics.increment("Unpaired Reads");
        }
        if flags.is_duplicate() {
            self.metrics.increment("Duplicate Reads");
        }
        if flags.is_unmapped() {
            return Ok(());
        }
        self.check_order(record)?;

        self.metrics.increment("Mapped Reads");
        if flags.is_duplicate() {
            self.metrics.increment("Mapped Duplicate Reads");
        } else {
            self.metrics.increment("Mapped Unique Reads");
        }
        let span = record.reference_end() + 1 - record.start;
        if span > self.config.max_read_length {
            return Ok(());
        }
        self.read_length = self.read_length.max(record.sequence_length);

        if self.mode == ClassifierMode::Standard && record.has_tag(&self.config.chimeric_tag) {
            self.metrics.increment("Chimeric Reads_tag");
            if self.config.exclude_chimeric {
                return Ok(());
            }
        }
        if flags.is_segmented() && !flags.is_mate_unmapped() {
            if flags.is_first_segment() {
                self.metrics.increment("Total Mapped Pairs");
            }
            let legacy_far_contig = self.mode == ClassifierMode::Legacy
                && record.reference_id.is_some_and(|id| id > 127);
            if record.reference_id != record.mate_reference_id
                || record.start.abs_diff(record.mate_start) > self.config.chimeric_distance
                || legacy_far_contig
            {
                self.metrics.increment("Chimeric Reads_contig");
                if self.config.exclude_chimeric {
                    return Ok(());
                }
            }
        }

        let mismatches = match record.nm {
            NmTag::Value(n) => Some(n),
            NmTag::Missing => None,
            NmTag::Malformed => {
                self.metrics.increment("Malformed NM Tags");
                None
            }
        };
        if flags.is_segmented() {
            let end = end_label(record);
            self.metrics.increment(&format!("{} Mapped Reads", end));
            self.metrics
                .increment_by(&format!("{} Bases", end), record.sequence_length);
            if let Some(n) = mismatches {
                self.metrics
                    .increment_by(&format!("{} Mismatches", end), n as u64);
            }
            if flags.is_first_segment() {
                if flags.is_duplicate() {
                    self.metrics.increment("Duplicate Pairs");
                } else {
                    self.metrics.increment("Unique Fragments");
                }
            }
        }
        if let Some(n) = mismatches {
            self.metrics.increment_by("Mismatched Bases", n as u64);
        }
        self.metrics.increment_by("Total Bases", record.sequence_length);

        let mut discard = false;
        for tag in &self.config.filter_tags {
            if record.has_tag(tag) {
                self.metrics.increment(&format!("Filtered by tag: {}", tag));
                discard = true;
            }
        }
        if discard {
            return Ok(());
        }

        let Some(reference) = record
            .reference_id
            .and_then(|id| self.references.get(id).copied())
        else {
            debug!("Unrecognized reference id on alignment {}", record.name);
            self.metrics.increment("Unrecognized Reference Reads");
            return Ok(());
        };
        let Some(chromosome) = reference.filter(|code| self.annotation.has_chromosome(*code))
        else {
            self.metrics.increment("Unannotated Contig Reads");
            return Ok(());
        };

        let eligible = mismatches.unwrap_or(0) <= self.config.base_mismatch
            && (self.config.unpaired || flags.is_properly_segmented())
            && record.mapping_quality >= self.config.mapping_quality;
        if !eligible {
            self.metrics.increment("Reads excluded from exon counts");
            return Ok(());
        }

        self.classify_read(record, chromosome)
    }

    ///
    /// Every mapped primary alignment must follow the previous one in
    /// coordinate order, whether or not it is later filtered out.
    ///
    fn check_order(&mut self, record: &AlignmentRecord) -> Result<()> {
        let Some(reference_id) = record.reference_id else {
            return Ok(());
        };
        let reference_name = || {
            record
                .reference_name
                .clone()
                .unwrap_or_else(|| reference_id.to_string())
        };
        match self.last_placed {
            Some((previous_id, previous)) if previous_id == reference_id => {
                if record.start < previous {
                    return Err(QcError::OutOfOrder {
                        chromosome: reference_name(),
                        previous,
                        position: record.start,
                    });
                }
            }
            Some((previous_id, _)) => {
                self.left_references.insert(previous_id);
                if self.left_references.contains(&reference_id) {
                    return Err(QcError::ChromosomeRevisited(reference_name()));
                }
            }
            None => {}
        }
        self.last_placed = Some((reference_id, record.start));
        Ok(())
    }

    fn classify_read(&mut self, record: &AlignmentRecord, chromosome: ChromosomeCode) -> Result<()> {
        let extracted = extract_blocks(record, chromosome, self.config.split_distance, self.mode);
        self.window
            .advance(chromosome, record.start, &mut self.coverage)?;
        if let Some(end) = extracted.end() {
            self.window.reach(chromosome, end);
        }

        let alignment_strand = record.strand();
        let second_mate = record.is_second_mate();
        let context = ReadContext {
            strand_filter: self
                .config
                .strandedness
                .feature_strand(alignment_strand, second_mate),
            transcript_strand: transcript_strand(record),
        };
        let outcome = classify(
            self.mode,
            &extracted,
            self.window.in_play(chromosome),
            &context,
        );

        self.metrics.increment("Reads used for Intron/Exon counts");
        self.metrics
            .increment_by("Alignment Blocks", extracted.blocks.len() as u64);
        if extracted.is_split() {
            self.metrics.increment("Split Reads");
        }
        if outcome.ambiguous {
            self.metrics.increment("Ambiguous Reads");
        }
        if outcome
            .genes
            .iter()
            .any(|gene| self.annotation.gene(gene).is_some_and(|info| info.is_rrna()))
        {
            self.metrics.increment("rRNA Reads");
        }
        if let Some(sense) = outcome.sense {
            let end = end_label(record);
            let label = if sense { "Sense" } else { "Antisense" };
            self.metrics.increment(&format!("{} {}", end, label));
        }

        match &outcome.class {
            ReadClass::Exonic { gene_id } => {
                self.metrics.increment("Exonic Reads");
                self.metrics.increment("Intragenic Reads");
                *self.gene_counts.entry(gene_id.clone()).or_insert(0) += 1;
                match self.mode {
                    ClassifierMode::Standard => {
                        outcome.credits.collect(gene_id, &mut self.exon_counts)
                    }
                    ClassifierMode::Legacy => {
                        outcome.credits.collect_single(gene_id, &mut self.exon_counts)
                    }
                }
                for credit in outcome.coverage {
                    self.coverage
                        .add(&credit.gene_id, credit.exon_start, credit.entry);
                }
            }
            ReadClass::Intronic => {
                self.metrics.increment("Intronic Reads");
                self.metrics.increment("Intragenic Reads");
            }
            ReadClass::Intergenic => self.metrics.increment("Intergenic Reads"),
            ReadClass::Disqualified => self.metrics.increment("Intron/Exon Disqualified Reads"),
        }

        if let Some(sampler) = self.fragments.as_mut() {
            sampler.observe(record, chromosome, &extracted.blocks)?;
        }
        Ok(())
    }

    ///
    /// Flush every remaining gene and hand back the run totals and the spool.
    ///
    pub fn finish(mut self) -> Result<(QcResult, W)> {
        self.window.finish(&mut self.coverage)?;
        self.metrics.increment_by("Total Reads", self.alignments);
        let (bias, spool, unclaimed) = self.coverage.finish()?;
        info!("Processed {} alignments", self.alignments);

        Ok((
            QcResult {
                metrics: self.metrics,
                gene_counts: self.gene_counts,
                exon_counts: self.exon_counts,
                bias,
                fragment_sizes: self
                    .fragments
                    .map(FragmentSampler::into_samples)
                    .unwrap_or_default(),
                read_length: self.read_length,
                unclaimed,
            },
            spool,
        ))
    }
}

///
/// Inputs of one run besides its configuration. `records` must be
/// coordinate-sorted; `reference_names` lists the contigs `reference_id`
/// indexes into.
///
pub struct RunInputs<'a, I> {
    pub annotation: &'a Annotation,
    pub chromosomes: &'a ChromosomeMap,
    pub reference_names: &'a [String],
    pub records: I,
    pub fragment_exons: Option<FeatureMap>,
}

#[derive(Debug)]
pub struct QcSummary {
    pub result: QcResult,
    pub coverage: CoverageSummary,
}

fn spinner() -> ProgressBar {
    if !log_enabled!(Level::Info) {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg} ({pos} alignments)")
    {
        pb.set_style(style);
    }
    pb.set_message("Processing alignments");
    pb
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

///
/// Run quality control end to end and write every report into `output_dir`.
///
/// The alignment stream is consumed once. Coverage is spooled to a temporary
/// file in the output directory, replayed for the per-transcript statistics
/// and removed afterwards.
///
pub fn run_qc<I>(
    config: &QcConfig,
    inputs: RunInputs<'_, I>,
    output_dir: &Path,
    sample: &str,
) -> Result<QcSummary>
where
    I: IntoIterator<Item = Result<AlignmentRecord>>,
{
    prepare_output_dir(output_dir)?;
    let spool_path = output_dir.join(SPOOL_FILE);
    let spool = create(&spool_path)?;

    let mut run = QcRun::new(
        config,
        inputs.annotation,
        inputs.chromosomes,
        inputs.reference_names,
        spool,
        inputs.fragment_exons,
    )?;

    let pb = spinner();
    for record in inputs.records {
        run.process(&record?)?;
        if run.alignments() % PROGRESS_INTERVAL == 0 {
            pb.set_position(run.alignments());
        }
    }
    pb.finish_and_clear();
    let (result, mut spool) = run.finish()?;
    spool.flush()?;
    drop(spool);

    info!("Estimating per-transcript coverage");
    let coverage_table = if config.coverage {
        Some(create(&output_dir.join(format!("{}.coverage.tsv", sample)))?)
    } else {
        None
    };
    let coverage = reconstruct(
        BufReader::new(File::open(&spool_path)?),
        &inputs.annotation.transcripts,
        report::median_fragment(&result.fragment_sizes),
        coverage_table,
    )?;
    fs::remove_file(&spool_path)?;
    if coverage.unclaimed > 0 {
        warn!(
            "{} coverage rows could not be matched to a transcript",
            coverage.unclaimed
        );
    }

    info!("Writing reports to {}", output_dir.display());
    let annotation = inputs.annotation;
    let mut w = create(&output_dir.join(format!("{}.metrics.tsv", sample)))?;
    report::write_metrics(&mut w, sample, annotation, &result, &coverage)?;
    w.flush()?;

    let mut w = create(&output_dir.join(format!("{}.gene_reads.gct", sample)))?;
    report::write_gene_reads(&mut w, sample, annotation, &result.gene_counts)?;
    w.flush()?;

    let unit = if config.rpkm { "rpkm" } else { "tpm" };
    let mut w = create(&output_dir.join(format!("{}.gene_{}.gct", sample, unit)))?;
    report::write_gene_expression(&mut w, sample, annotation, &result, config.rpkm)?;
    w.flush()?;

    let mut w = create(&output_dir.join(format!("{}.exon_reads.gct", sample)))?;
    report::write_exon_reads(&mut w, sample, annotation, &result.exon_counts)?;
    w.flush()?;

    if !result.fragment_sizes.is_empty() {
        let mut w = create(&output_dir.join(format!("{}.fragmentSizes.txt", sample)))?;
        report::write_fragment_sizes(&mut w, &result.fragment_sizes)?;
        w.flush()?;
    }

    Ok(QcSummary { result, coverage })
}
