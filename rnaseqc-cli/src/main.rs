mod qc;

use clap::{ArgMatches, Command};
use log::{LevelFilter, error};

use rnaseqc_core::QcError;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "rnaseqc";
}

fn build_parser() -> Command {
    qc::cli::create_qc_cli()
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .author("Databio")
}

fn init_logging(matches: &ArgMatches) {
    let level = match matches.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    // RUST_LOG is applied after the flag so it still wins
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Exit code for a failed run, taken from the first [`QcError`] in the chain.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<QcError>())
        .map(QcError::exit_code)
        .unwrap_or(1)
}

fn main() {
    let app = build_parser();
    let matches = app.get_matches();

    init_logging(&matches);

    if let Err(err) = qc::handlers::run_rnaseqc(&matches) {
        error!("{:#}", err);
        std::process::exit(exit_code(&err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn test_exit_code_follows_the_root_error() {
        let err = anyhow::Error::new(QcError::NoContigOverlap).context("while running sample");
        assert_eq!(exit_code(&err), 13);
    }

    #[rstest]
    fn test_unknown_errors_exit_with_one() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&err), 1);
    }

    #[rstest]
    fn test_parser_requires_positionals() {
        assert!(build_parser().try_get_matches_from(["rnaseqc", "genes.gtf"]).is_err());
        let matches = build_parser()
            .try_get_matches_from(["rnaseqc", "genes.gtf", "a.bam", "out", "-vv"])
            .unwrap();
        assert_eq!(matches.get_count("verbose"), 2);
    }
}
