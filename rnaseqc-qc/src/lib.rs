//! # RNA-seq quality control engine
//!
//! A single forward pass over a coordinate-sorted alignment stream, matched
//! against a coordinate-sorted gene model.
//!
//! The sweep keeps only the features the stream can still reach. Each read is
//! cut into aligned blocks and classified as exonic, intronic, intergenic or
//! disqualified. Exonic coverage is cached per gene and spooled to disk when
//! the sweep leaves the gene behind, which also finalises its 5'/3' bias.
//! After the pass the spool is replayed into per-transcript coverage
//! statistics and the reports are written.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use rnaseqc_core::models::{AlignmentRecord, Annotation, ChromosomeMap};
//! use rnaseqc_qc::{QcConfig, RunInputs, run_qc};
//!
//! let config = QcConfig::default();
//! let chromosomes = ChromosomeMap::new();
//! let annotation = Annotation::default();
//! let references = vec!["chr1".to_string()];
//! let records: Vec<rnaseqc_core::Result<AlignmentRecord>> = Vec::new();
//! let summary = run_qc(
//!     &config,
//!     RunInputs {
//!         annotation: &annotation,
//!         chromosomes: &chromosomes,
//!         reference_names: &references,
//!         records,
//!         fragment_exons: None,
//!     },
//!     Path::new("out"),
//!     "sample",
//! );
//! ```
pub mod bias;
pub mod blocks;
pub mod classify;
pub mod config;
pub mod coverage;
pub mod fragments;
pub mod metrics;
pub mod pipeline;
pub mod reconstruct;
pub mod report;
pub mod stats;
pub mod sweep;

// re-export for cleaner imports
pub use self::config::{BiasConfig, ClassifierMode, QcConfig, Strandedness};
pub use self::metrics::{Collector, Metrics};
pub use self::pipeline::{QcResult, QcRun, QcSummary, RunInputs, run_qc};
