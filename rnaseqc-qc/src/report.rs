//! Report writers: metrics table, GCT expression matrices, fragment sizes.

use std::io::Write;

use fxhash::FxHashMap;

use rnaseqc_core::Result;
use rnaseqc_core::models::Annotation;

use crate::bias::BiasCounter;
use crate::metrics::Metrics;
use crate::pipeline::QcResult;
use crate::reconstruct::CoverageSummary;
use crate::stats;

/// Genes with at least this many reads count as detected.
pub const DETECTION_READS: u64 = 5;

/// 3' bias ratios of every annotated gene with enough signal, in gene order.
pub fn bias_ratios(annotation: &Annotation, bias: &BiasCounter) -> Vec<f64> {
    annotation
        .genes
        .iter()
        .filter_map(|gene| bias.bias(gene))
        .collect()
}

pub fn genes_detected(annotation: &Annotation, gene_counts: &FxHashMap<String, u64>) -> usize {
    annotation
        .genes
        .iter()
        .filter(|gene| gene_counts.get(*gene).copied().unwrap_or(0) >= DETECTION_READS)
        .count()
}

/// Median fragment size, 0 when nothing was sampled.
pub fn median_fragment(sizes: &[u64]) -> f64 {
    let sizes: Vec<f64> = sizes.iter().map(|&s| s as f64).collect();
    stats::median(&sizes).unwrap_or(0.0)
}

fn sense_rate(metrics: &Metrics, end: &str) -> f64 {
    let sense = metrics.get(&format!("{} Sense", end));
    let antisense = metrics.get(&format!("{} Antisense", end));
    if sense + antisense == 0 {
        0.0
    } else {
        sense as f64 / (sense + antisense) as f64
    }
}

fn discard_rate(metrics: &Metrics) -> f64 {
    let mapped = metrics.get("Mapped Reads");
    let used = metrics.get("Reads used for Intron/Exon counts");
    if mapped == 0 {
        0.0
    } else {
        mapped.saturating_sub(used) as f64 / mapped as f64
    }
}

fn write_rates<W: Write>(w: &mut W, metrics: &Metrics) -> Result<()> {
    let rates = [
        ("Mapping Rate", metrics.frac("Mapped Reads", "Total Reads")),
        (
            "Unique Rate of Mapped",
            metrics.frac("Mapped Unique Reads", "Mapped Reads"),
        ),
        (
            "Duplicate Rate of Mapped",
            metrics.frac("Mapped Duplicate Reads", "Mapped Reads"),
        ),
        ("Base Mismatch", metrics.frac("Mismatched Bases", "Total Bases")),
        (
            "End 1 Mapping Rate",
            2.0 * metrics.frac("End 1 Mapped Reads", "Total Reads"),
        ),
        (
            "End 2 Mapping Rate",
            2.0 * metrics.frac("End 2 Mapped Reads", "Total Reads"),
        ),
        (
            "End 1 Mismatch Rate",
            metrics.frac("End 1 Mismatches", "End 1 Bases"),
        ),
        (
            "End 2 Mismatch Rate",
            metrics.frac("End 2 Mismatches", "End 2 Bases"),
        ),
        (
            "Expression Profiling Efficiency",
            metrics.frac("Exonic Reads", "Total Reads"),
        ),
        ("Exonic Rate", metrics.frac("Exonic Reads", "Mapped Reads")),
        ("Intronic Rate", metrics.frac("Intronic Reads", "Mapped Reads")),
        (
            "Intergenic Rate",
            metrics.frac("Intergenic Reads", "Mapped Reads"),
        ),
        (
            "Intragenic Rate",
            metrics.frac("Intragenic Reads", "Mapped Reads"),
        ),
        (
            "Disqualification Rate",
            metrics.frac("Intron/Exon Disqualified Reads", "Mapped Reads"),
        ),
        ("Discard Rate", discard_rate(metrics)),
        ("rRNA Rate", metrics.frac("rRNA Reads", "Mapped Reads")),
        ("End 1 Sense Rate", sense_rate(metrics, "End 1")),
        ("End 2 Sense Rate", sense_rate(metrics, "End 2")),
        (
            "Avg. Splits per Read",
            if metrics.get("Mapped Reads") == 0 {
                0.0
            } else {
                metrics.frac("Alignment Blocks", "Mapped Reads") - 1.0
            },
        ),
    ];
    for (name, value) in rates {
        writeln!(w, "{}\t{}", name, value)?;
    }
    Ok(())
}

///
/// Write the metrics table: rates, the raw counters in key order, then the
/// derived statistics. Degenerate values are written as 0.
///
pub fn write_metrics<W: Write>(
    w: &mut W,
    sample: &str,
    annotation: &Annotation,
    result: &QcResult,
    coverage: &CoverageSummary,
) -> Result<()> {
    let metrics = &result.metrics;
    writeln!(w, "Sample\t{}", sample)?;
    write_rates(w, metrics)?;
    for (key, value) in metrics.iter() {
        writeln!(w, "{}\t{}", key, value)?;
    }

    let complexity = stats::library_complexity(
        metrics.get("Unique Fragments"),
        metrics.get("Duplicate Pairs"),
    );
    writeln!(w, "Read Length\t{}", result.read_length)?;
    writeln!(
        w,
        "Genes Detected\t{}",
        genes_detected(annotation, &result.gene_counts)
    )?;
    writeln!(w, "Estimated Library Complexity\t{}", complexity.unwrap_or(0))?;

    let mut ratios = bias_ratios(annotation, &result.bias);
    ratios.sort_by(f64::total_cmp);
    let ratio_median = stats::median(&ratios);
    let bias_rows = [
        ("Mean 3' bias", stats::mean(&ratios)),
        ("Median 3' bias", ratio_median),
        ("3' bias Std", stats::std_dev(&ratios)),
        (
            "3' bias MAD_Std",
            ratio_median.and_then(|m| stats::mad(&ratios, m)),
        ),
        ("3' Bias, 25th Percentile", stats::percentile(&ratios, 0.25)),
        ("3' Bias, 75th Percentile", stats::percentile(&ratios, 0.75)),
    ];
    for (name, value) in bias_rows {
        writeln!(w, "{}\t{}", name, value.unwrap_or(0.0))?;
    }

    if !result.fragment_sizes.is_empty() {
        let sizes: Vec<f64> = result.fragment_sizes.iter().map(|&s| s as f64).collect();
        let median = stats::median(&sizes).unwrap_or(0.0);
        let fragment_rows = [
            ("Average Fragment Length", stats::mean(&sizes)),
            ("Fragment Length Median", Some(median)),
            ("Fragment Length Std", stats::std_dev(&sizes)),
            ("Fragment Length MAD_Std", stats::mad(&sizes, median)),
        ];
        for (name, value) in fragment_rows {
            writeln!(w, "{}\t{}", name, value.unwrap_or(0.0))?;
        }
    }

    writeln!(
        w,
        "Median of Avg Transcript Coverage\t{}",
        coverage.median_mean.unwrap_or(0.0)
    )?;
    writeln!(
        w,
        "Median of Transcript Coverage Std\t{}",
        coverage.median_std.unwrap_or(0.0)
    )?;
    writeln!(
        w,
        "Median of Transcript Coverage CV\t{}",
        coverage.median_cv.unwrap_or(0.0)
    )?;
    Ok(())
}

fn write_gct<W: Write>(w: &mut W, sample: &str, rows: &[(&str, &str, String)]) -> Result<()> {
    writeln!(w, "#1.2")?;
    writeln!(w, "{}\t1", rows.len())?;
    writeln!(w, "Name\tDescription\t{}", sample)?;
    for (name, description, value) in rows {
        writeln!(w, "{}\t{}\t{}", name, description, value)?;
    }
    Ok(())
}

/// Raw read counts per gene, in annotation order.
pub fn write_gene_reads<W: Write>(
    w: &mut W,
    sample: &str,
    annotation: &Annotation,
    gene_counts: &FxHashMap<String, u64>,
) -> Result<()> {
    let rows: Vec<(&str, &str, String)> = annotation
        .genes
        .iter()
        .map(|gene| {
            let count = gene_counts.get(gene).copied().unwrap_or(0);
            (gene.as_str(), annotation.gene_name(gene), count.to_string())
        })
        .collect();
    write_gct(w, sample, &rows)
}

///
/// Length-normalised gene expression: TPM by default, RPKM when `rpkm` is set.
/// Genes without exonic length get 0.
///
pub fn write_gene_expression<W: Write>(
    w: &mut W,
    sample: &str,
    annotation: &Annotation,
    result: &QcResult,
    rpkm: bool,
) -> Result<()> {
    let per_kilobase: Vec<f64> = annotation
        .genes
        .iter()
        .map(|gene| {
            let count = result.gene_counts.get(gene).copied().unwrap_or(0) as f64;
            match annotation.gene(gene).map(|info| info.effective_length) {
                Some(length) if length > 0 => 1000.0 * count / length as f64,
                _ => 0.0,
            }
        })
        .collect();

    let scale = if rpkm {
        result.metrics.get("Exonic Reads") as f64 / 1e6
    } else {
        per_kilobase.iter().sum::<f64>() / 1e6
    };
    let rows: Vec<(&str, &str, String)> = annotation
        .genes
        .iter()
        .zip(&per_kilobase)
        .map(|(gene, value)| {
            let value = if scale > 0.0 { value / scale } else { 0.0 };
            (gene.as_str(), annotation.gene_name(gene), format!("{:.6}", value))
        })
        .collect();
    write_gct(w, sample, &rows)
}

/// Fractional read credit per exon, in annotation order.
pub fn write_exon_reads<W: Write>(
    w: &mut W,
    sample: &str,
    annotation: &Annotation,
    exon_counts: &FxHashMap<String, f64>,
) -> Result<()> {
    let rows: Vec<(&str, &str, String)> = annotation
        .exons
        .iter()
        .map(|exon| {
            let gene = annotation
                .exon_genes
                .get(exon)
                .map(|gene| annotation.gene_name(gene))
                .unwrap_or("");
            let count = exon_counts.get(exon).copied().unwrap_or(0.0);
            (exon.as_str(), gene, format!("{:.6}", count))
        })
        .collect();
    write_gct(w, sample, &rows)
}

pub fn write_fragment_sizes<W: Write>(w: &mut W, sizes: &[u64]) -> Result<()> {
    for size in sizes {
        writeln!(w, "{}", size)?;
    }
    Ok(())
}
