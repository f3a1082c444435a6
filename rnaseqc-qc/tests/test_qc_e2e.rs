//! End-to-end runs over the toy annotation with in-memory alignments.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use noodles::sam::record::Cigar;
use pretty_assertions::assert_eq;
use rstest::*;

use rnaseqc_core::models::{
    AlignmentRecord, Annotation, ChromosomeMap, Flags, NmTag, Op, is_aligned,
};
use rnaseqc_core::{QcError, Result};
use rnaseqc_io::{parse_gtf, read_bed_exons, read_gtf};
use rnaseqc_qc::coverage::add_range;
use rnaseqc_qc::pipeline::SPOOL_FILE;
use rnaseqc_qc::{QcConfig, QcRun, RunInputs, Strandedness, run_qc};

fn get_test_path(file_name: &str) -> PathBuf {
    std::env::current_dir()
        .unwrap()
        .join("../tests/data/annotation")
        .join(file_name)
}

fn load(file_name: &str) -> (Annotation, ChromosomeMap) {
    let mut chromosomes = ChromosomeMap::new();
    let annotation = read_gtf(&get_test_path(file_name), &mut chromosomes, false).unwrap();
    (annotation, chromosomes)
}

fn read(name: &str, start: u64, cigar: &str) -> AlignmentRecord {
    let cigar: Vec<Op> = Cigar::new(cigar.as_bytes())
        .iter()
        .collect::<std::result::Result<_, _>>()
        .unwrap();
    let sequence_length = cigar
        .iter()
        .filter(|op| is_aligned(op.kind()))
        .map(|op| op.len() as u64)
        .sum();
    AlignmentRecord {
        name: name.to_string(),
        reference_id: Some(0),
        reference_name: Some("chr1".to_string()),
        start,
        cigar,
        mapping_quality: 255,
        sequence_length,
        nm: NmTag::Value(0),
        ..Default::default()
    }
}

fn mate_with(name: &str, start: u64, cigar: &str, mate_start: u64, first: bool) -> AlignmentRecord {
    let segment = if first {
        Flags::FIRST_SEGMENT
    } else {
        Flags::LAST_SEGMENT | Flags::REVERSE_COMPLEMENTED
    };
    AlignmentRecord {
        flags: Flags::SEGMENTED | Flags::PROPERLY_SEGMENTED | segment,
        mate_reference_id: Some(0),
        mate_start,
        ..read(name, start, cigar)
    }
}

fn mate(name: &str, start: u64, mate_start: u64, first: bool) -> AlignmentRecord {
    mate_with(name, start, "20M", mate_start, first)
}

/// One exonic, one intronic and one intergenic read against gene A.
fn three_reads() -> Vec<AlignmentRecord> {
    vec![
        read("exonic", 120, "50M"),
        read("intronic", 250, "40M"),
        read("intergenic", 800, "50M"),
    ]
}

#[fixture]
fn unpaired() -> QcConfig {
    QcConfig {
        unpaired: true,
        ..Default::default()
    }
}

fn process(
    config: &QcConfig,
    annotation: &Annotation,
    chromosomes: &ChromosomeMap,
    reads: &[AlignmentRecord],
) -> Result<(rnaseqc_qc::QcResult, String)> {
    process_on(config, annotation, chromosomes, &["chr1"], reads)
}

fn process_on(
    config: &QcConfig,
    annotation: &Annotation,
    chromosomes: &ChromosomeMap,
    references: &[&str],
    reads: &[AlignmentRecord],
) -> Result<(rnaseqc_qc::QcResult, String)> {
    let references: Vec<String> = references.iter().map(|r| r.to_string()).collect();
    let mut run = QcRun::new(config, annotation, chromosomes, &references, Vec::new(), None)?;
    for record in reads {
        run.process(record)?;
    }
    let (result, spool) = run.finish()?;
    Ok((result, String::from_utf8(spool).unwrap()))
}

#[rstest]
fn test_toy_reads_are_classified_once_each(unpaired: QcConfig) {
    let (annotation, chromosomes) = load("toy.gtf");
    let (result, spool) = process(&unpaired, &annotation, &chromosomes, &three_reads()).unwrap();

    assert_eq!(result.metrics.get("Exonic Reads"), 1);
    assert_eq!(result.metrics.get("Intronic Reads"), 1);
    assert_eq!(result.metrics.get("Intergenic Reads"), 1);
    assert_eq!(result.metrics.get("Intragenic Reads"), 2);
    assert_eq!(result.metrics.get("Reads used for Intron/Exon counts"), 3);
    assert_eq!(result.metrics.get("Total Reads"), 3);
    assert_eq!(result.gene_counts.get("A"), Some(&1));
    assert_eq!(result.exon_counts.get("A.1_1"), Some(&1.0));

    assert_eq!(spool, "A\tA.1\tA.1_1\t20\t50\n");
    let mut coverage = Vec::new();
    for row in spool.lines() {
        let fields: Vec<&str> = row.split('\t').collect();
        add_range(
            &mut coverage,
            fields[3].parse().unwrap(),
            fields[4].parse().unwrap(),
        );
    }
    assert_eq!(coverage.iter().sum::<u64>(), 50);
}

#[rstest]
fn test_every_gene_is_committed_once(unpaired: QcConfig) {
    let (annotation, chromosomes) = load("toy.gtf");
    let reads = vec![
        read("a1", 110, "20M"),
        read("a2", 150, "20M"),
        read("b1", 520, "20M"),
    ];
    let (_, spool) = process(&unpaired, &annotation, &chromosomes, &reads).unwrap();
    let genes: Vec<&str> = spool
        .lines()
        .map(|row| row.split('\t').next().unwrap())
        .collect();
    assert_eq!(genes, vec!["A", "A", "B"]);
}

#[rstest]
#[case(false)]
#[case(true)]
fn test_spliced_read_across_genes_is_not_exonic(unpaired: QcConfig, #[case] legacy: bool) {
    let (annotation, chromosomes) = load("toy.gtf");
    let config = QcConfig { legacy, ..unpaired };
    let reads = vec![read("spliced", 150, "50M300N50M")];
    let (result, spool) = process(&config, &annotation, &chromosomes, &reads).unwrap();
    assert_eq!(result.metrics.get("Exonic Reads"), 0);
    assert_eq!(result.metrics.get("Split Reads"), 1);
    assert!(result.gene_counts.is_empty());
    assert!(spool.is_empty());
}

#[rstest]
fn test_out_of_order_alignments_are_fatal(unpaired: QcConfig) {
    let (annotation, chromosomes) = load("toy.gtf");
    let reads = vec![read("late", 300, "20M"), read("early", 100, "20M")];
    let err = process(&unpaired, &annotation, &chromosomes, &reads).unwrap_err();
    assert!(matches!(err, QcError::OutOfOrder { .. }));
    assert_eq!(err.exit_code(), 14);
}

#[rstest]
fn test_order_is_checked_before_reads_are_filtered(unpaired: QcConfig) {
    let (annotation, chromosomes) = load("toy.gtf");
    let mut late = read("late", 300, "20M");
    late.mapping_quality = 0;
    let mut early = read("early", 100, "20M");
    early.tags.push(*b"XS");
    let config = QcConfig {
        filter_tags: vec!["XS".to_string()],
        ..unpaired
    };
    let err = process(&config, &annotation, &chromosomes, &[late, early]).unwrap_err();
    assert!(matches!(
        err,
        QcError::OutOfOrder {
            previous: 300,
            position: 100,
            ..
        }
    ));
}

fn on_chr2(mut record: AlignmentRecord) -> AlignmentRecord {
    record.reference_id = Some(1);
    record.reference_name = Some("chr2".to_string());
    record
}

#[rstest]
fn test_returning_to_a_left_reference_is_fatal(unpaired: QcConfig) {
    let (annotation, chromosomes) = load("toy.gtf");
    let reads = vec![
        read("first", 120, "20M"),
        on_chr2(read("elsewhere", 50, "20M")),
        read("back", 200, "20M"),
    ];
    let err = process_on(&unpaired, &annotation, &chromosomes, &["chr1", "chr2"], &reads)
        .unwrap_err();
    assert!(matches!(err, QcError::ChromosomeRevisited(_)));
    assert_eq!(err.exit_code(), 14);
}

#[rstest]
fn test_reads_on_unknown_or_unannotated_references_are_counted(unpaired: QcConfig) {
    let (annotation, chromosomes) = load("toy.gtf");
    let mut unknown = read("unknown", 10, "50M");
    unknown.reference_id = Some(7);
    unknown.reference_name = None;
    let reads = vec![
        read("exonic", 120, "50M"),
        on_chr2(read("unannotated", 130, "50M")),
        unknown,
    ];
    let (result, _) =
        process_on(&unpaired, &annotation, &chromosomes, &["chr1", "chr2"], &reads).unwrap();
    assert_eq!(result.metrics.get("Unrecognized Reference Reads"), 1);
    assert_eq!(result.metrics.get("Unannotated Contig Reads"), 1);
    assert_eq!(result.metrics.get("Mapped Reads"), 3);
    assert_eq!(result.metrics.get("Reads used for Intron/Exon counts"), 1);
    assert_eq!(result.metrics.get("Exonic Reads"), 1);
}

#[rstest]
#[case(6)]
#[case(0)]
fn test_malformed_nm_counts_as_no_mismatches(unpaired: QcConfig, #[case] base_mismatch: u32) {
    let (annotation, chromosomes) = load("toy.gtf");
    let mut malformed = read("malformed", 120, "50M");
    malformed.nm = NmTag::Malformed;
    let config = QcConfig {
        base_mismatch,
        ..unpaired
    };
    let (result, _) = process(&config, &annotation, &chromosomes, &[malformed]).unwrap();
    assert_eq!(result.metrics.get("Malformed NM Tags"), 1);
    assert_eq!(result.metrics.get("Mismatched Bases"), 0);
    assert_eq!(result.metrics.get("Reads excluded from exon counts"), 0);
    assert_eq!(result.metrics.get("Exonic Reads"), 1);
}

const RRNA_GTF: &str = "\
chr1\ttoy\tgene\t100\t400\t.\t+\t.\tgene_id \"R\"; gene_type \"rRNA\";
chr1\ttoy\ttranscript\t100\t400\t.\t+\t.\tgene_id \"R\"; transcript_id \"R.1\";
chr1\ttoy\texon\t100\t199\t.\t+\t.\tgene_id \"R\"; transcript_id \"R.1\"; exon_id \"R.1_1\";
";

#[rstest]
fn test_reads_on_rrna_genes_are_counted(unpaired: QcConfig) {
    let mut chromosomes = ChromosomeMap::new();
    let annotation = parse_gtf(Cursor::new(RRNA_GTF), &mut chromosomes, false).unwrap();
    let reads = vec![read("ribosomal", 120, "50M"), read("outside", 800, "50M")];
    let (result, _) = process(&unpaired, &annotation, &chromosomes, &reads).unwrap();
    assert_eq!(result.metrics.get("rRNA Reads"), 1);
    assert_eq!(result.metrics.get("Exonic Reads"), 1);
    assert_eq!(result.metrics.get("Intergenic Reads"), 1);
}

#[rstest]
#[case(false, 1)]
#[case(true, 0)]
fn test_chimeric_tag(unpaired: QcConfig, #[case] exclude_chimeric: bool, #[case] exonic: u64) {
    let (annotation, chromosomes) = load("toy.gtf");
    let mut tagged = read("tagged", 120, "50M");
    tagged.tags.push(*b"mC");
    let config = QcConfig {
        exclude_chimeric,
        ..unpaired
    };
    let (result, _) = process(&config, &annotation, &chromosomes, &[tagged]).unwrap();
    assert_eq!(result.metrics.get("Chimeric Reads_tag"), 1);
    assert_eq!(result.metrics.get("Exonic Reads"), exonic);
}

#[rstest]
#[case(false, 1)]
#[case(true, 0)]
fn test_mate_on_another_contig_is_chimeric(#[case] exclude_chimeric: bool, #[case] exonic: u64) {
    let (annotation, chromosomes) = load("toy.gtf");
    let mut record = mate("r1", 120, 120, true);
    record.mate_reference_id = Some(1);
    let config = QcConfig {
        exclude_chimeric,
        ..Default::default()
    };
    let (result, _) = process(&config, &annotation, &chromosomes, &[record]).unwrap();
    assert_eq!(result.metrics.get("Total Mapped Pairs"), 1);
    assert_eq!(result.metrics.get("Chimeric Reads_contig"), 1);
    assert_eq!(result.metrics.get("Exonic Reads"), exonic);
}

#[rstest]
#[case(Strandedness::None, false, 1, "End 1 Sense")]
#[case(Strandedness::None, true, 1, "End 1 Antisense")]
#[case(Strandedness::ForwardFirstStrand, false, 1, "End 1 Sense")]
#[case(Strandedness::ForwardFirstStrand, true, 0, "End 1 Antisense")]
#[case(Strandedness::ReverseFirstStrand, false, 0, "End 1 Sense")]
#[case(Strandedness::ReverseFirstStrand, true, 1, "End 1 Antisense")]
fn test_strand_specific_counts(
    unpaired: QcConfig,
    #[case] strandedness: Strandedness,
    #[case] reverse: bool,
    #[case] exonic: u64,
    #[case] label: &str,
) {
    let (annotation, chromosomes) = load("toy.gtf");
    let mut record = read("stranded", 120, "50M");
    if reverse {
        record.flags = Flags::REVERSE_COMPLEMENTED;
    }
    let config = QcConfig {
        strandedness,
        ..unpaired
    };
    let (result, _) = process(&config, &annotation, &chromosomes, &[record]).unwrap();
    assert_eq!(result.metrics.get("Exonic Reads"), exonic);
    assert_eq!(result.metrics.get(label), 1);
}

#[rstest]
fn test_no_shared_contigs_is_fatal(unpaired: QcConfig) {
    let (annotation, chromosomes) = load("toy.gtf");
    let references = vec!["chrUn_random".to_string()];
    let result = QcRun::new(
        &unpaired,
        &annotation,
        &chromosomes,
        &references,
        Vec::<u8>::new(),
        None,
    );
    assert!(matches!(result, Err(QcError::NoContigOverlap)));
}

#[rstest]
fn test_filtered_reads_skip_classification(unpaired: QcConfig) {
    let (annotation, chromosomes) = load("toy.gtf");
    let mut low_quality = read("lowq", 120, "50M");
    low_quality.mapping_quality = 10;
    let mut tagged = read("tagged", 130, "50M");
    tagged.tags.push(*b"XS");
    let mut secondary = read("secondary", 140, "50M");
    secondary.flags = Flags::SECONDARY;
    let mut mismatched = read("mismatched", 150, "50M");
    mismatched.nm = NmTag::Value(7);

    let config = QcConfig {
        filter_tags: vec!["XS".to_string()],
        ..unpaired
    };
    let reads = vec![low_quality, tagged, secondary, mismatched];
    let (result, _) = process(&config, &annotation, &chromosomes, &reads).unwrap();
    assert_eq!(result.metrics.get("Alternative Alignments"), 1);
    assert_eq!(result.metrics.get("Low quality reads"), 1);
    assert_eq!(result.metrics.get("Filtered by tag: XS"), 1);
    assert_eq!(result.metrics.get("Reads excluded from exon counts"), 2);
    assert_eq!(result.metrics.get("Mapped Reads"), 3);
    assert_eq!(result.metrics.get("Mismatched Bases"), 7);
    assert_eq!(result.metrics.get("Exonic Reads"), 0);
}

#[rstest]
fn test_fragment_sizes_only_from_same_exon_mates() {
    let (annotation, mut chromosomes) = load("toy.gtf");
    let fragments =
        read_bed_exons(&get_test_path("toy_fragments.bed"), &mut chromosomes).unwrap();
    let config = QcConfig::default();
    let references = vec!["chr1".to_string()];
    let mut run = QcRun::new(
        &config,
        &annotation,
        &chromosomes,
        &references,
        Vec::<u8>::new(),
        Some(fragments),
    )
    .unwrap();

    // r1 mates share fragA; r2 mates land in fragA and fragB
    let reads = vec![
        mate("r1", 110, 150, true),
        mate("r2", 120, 520, true),
        mate("r1", 150, 110, false),
        mate("r2", 520, 120, false),
    ];
    for record in &reads {
        run.process(record).unwrap();
    }
    let (result, _) = run.finish().unwrap();
    assert_eq!(result.fragment_sizes, vec![40]);
    assert_eq!(result.metrics.get("Total Mapped Pairs"), 2);
    assert_eq!(result.metrics.get("Chimeric Reads_contig"), 0);
}

#[rstest]
fn test_leading_deletion_does_not_break_fragment_order() {
    let (annotation, mut chromosomes) = load("toy.gtf");
    let fragments =
        read_bed_exons(&get_test_path("toy_fragments.bed"), &mut chromosomes).unwrap();
    let config = QcConfig::default();
    let references = vec!["chr1".to_string()];
    let mut run = QcRun::new(
        &config,
        &annotation,
        &chromosomes,
        &references,
        Vec::<u8>::new(),
        Some(fragments),
    )
    .unwrap();

    // r1's first aligned base (115) lies past r2's start (112)
    let reads = vec![
        mate_with("r1", 110, "5D20M", 150, true),
        mate_with("r2", 112, "20M", 160, true),
        mate("r1", 150, 110, false),
        mate("r2", 160, 112, false),
    ];
    for record in &reads {
        run.process(record).unwrap();
    }
    let (result, _) = run.finish().unwrap();
    assert_eq!(result.fragment_sizes, vec![40, 48]);
    assert_eq!(result.metrics.get("Exonic Reads"), 4);
}

fn run_to_dir(gtf: &str, reference: &str, output_dir: &Path, config: &QcConfig) {
    let (annotation, chromosomes) = load(gtf);
    let references = vec![reference.to_string()];
    let records: Vec<Result<AlignmentRecord>> = three_reads().into_iter().map(Ok).collect();
    run_qc(
        config,
        RunInputs {
            annotation: &annotation,
            chromosomes: &chromosomes,
            reference_names: &references,
            records,
            fragment_exons: None,
        },
        output_dir,
        "toy",
    )
    .unwrap();
}

#[rstest]
fn test_run_writes_reports_and_removes_spool(unpaired: QcConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = QcConfig {
        coverage: true,
        ..unpaired
    };
    run_to_dir("toy.gtf", "chr1", dir.path(), &config);

    for name in [
        "toy.metrics.tsv",
        "toy.gene_reads.gct",
        "toy.gene_tpm.gct",
        "toy.exon_reads.gct",
        "toy.coverage.tsv",
    ] {
        assert!(dir.path().join(name).is_file(), "missing {}", name);
    }
    assert!(!dir.path().join(SPOOL_FILE).exists());
    assert!(!dir.path().join("toy.fragmentSizes.txt").exists());

    let gene_reads = fs::read_to_string(dir.path().join("toy.gene_reads.gct")).unwrap();
    assert!(gene_reads.contains("A\tGeneA\t1\n"));
    assert!(gene_reads.contains("B\tGeneB\t0\n"));

    let coverage = fs::read_to_string(dir.path().join("toy.coverage.tsv")).unwrap();
    assert!(coverage.contains("A\tA.1\t"));

    let metrics = fs::read_to_string(dir.path().join("toy.metrics.tsv")).unwrap();
    assert!(metrics.starts_with("Sample\ttoy\n"));
    assert!(metrics.contains("Exonic Reads\t1\n"));
    assert!(!metrics.contains("NaN"));
}

#[rstest]
fn test_chromosome_prefix_does_not_change_metrics(unpaired: QcConfig) {
    let with_prefix = tempfile::tempdir().unwrap();
    let without_prefix = tempfile::tempdir().unwrap();
    run_to_dir("toy.gtf", "chr1", with_prefix.path(), &unpaired);
    run_to_dir("toy_noprefix.gtf", "1", without_prefix.path(), &unpaired);

    let a = fs::read(with_prefix.path().join("toy.metrics.tsv")).unwrap();
    let b = fs::read(without_prefix.path().join("toy.metrics.tsv")).unwrap();
    assert_eq!(a, b);
}
