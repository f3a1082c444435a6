use clap::{Arg, ArgAction, Command, arg, value_parser};

pub const QC_CMD: &str = "rnaseqc";

pub fn create_qc_cli() -> Command {
    Command::new(QC_CMD)
        .about("Quality control metrics, expression counts and coverage for an RNA-seq alignment file.")
        .arg_required_else_help(true)
        .arg(Arg::new("gtf").required(true).help("Gene model in GTF format (plain or gzipped)"))
        .arg(Arg::new("bam").required(true).help("Coordinate-sorted BAM file"))
        .arg(Arg::new("output").required(true).help("Output directory, created when missing"))
        .arg(arg!(--config <config> "TOML file with run settings; flags override its values"))
        .arg(arg!(-s --sample <sample> "Sample name used in output file names (defaults to the BAM file name)"))
        .arg(arg!(--bed <bed> "BED file of non-overlapping exons used for fragment size estimation"))
        .arg(
            arg!(--"fragment-samples" <count> "Maximum number of fragment size samples")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(-q --"mapping-quality" <quality> "Minimum mapping quality for reads used in exon counts")
                .value_parser(value_parser!(u8)),
        )
        .arg(
            arg!(--"low-quality" <quality> "Mapping quality below which a read counts as low quality")
                .value_parser(value_parser!(u8)),
        )
        .arg(
            arg!(-a --"base-mismatch" <count> "Maximum mismatches (NM) for reads used in exon counts")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(--"chimeric-distance" <distance> "Mate distance above which a pair is chimeric")
                .value_parser(value_parser!(u64)),
        )
        .arg(arg!(--"chimeric-tag" <tag> "Alignment tag marking chimeric reads"))
        .arg(arg!(--"exclude-chimeric" "Skip chimeric reads entirely").action(ArgAction::SetTrue))
        .arg(
            arg!(--"split-distance" <distance> "Minimum reference gap that splits a read into blocks")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--"read-length" <length> "Maximum reference span of a processed read")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--offset <offset> "Distance of the 5'/3' bias windows from the gene ends")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--"window-size" <size> "Size of the 5'/3' bias windows")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--"gene-length" <length> "Minimum gene length for the 5'/3' bias")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--"detection-threshold" <count> "Minimum windowed reads for a gene's bias to be reported")
                .value_parser(value_parser!(u64)),
        )
        .arg(arg!(--legacy "Use the legacy exon assignment strategy").action(ArgAction::SetTrue))
        .arg(arg!(--stranded <strand> "Library strandedness: RF or FR"))
        .arg(arg!(-u --unpaired "Treat all reads as unpaired").action(ArgAction::SetTrue))
        .arg(
            arg!(-t --tag <tag> "Skip reads carrying this alignment tag (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(arg!(--rpkm "Write RPKM instead of TPM").action(ArgAction::SetTrue))
        .arg(arg!(--coverage "Write per-transcript coverage statistics").action(ArgAction::SetTrue))
        .arg(arg!(-v --verbose ... "Increase logging verbosity").action(ArgAction::Count))
}
