//! # Core models for RNA-seq quality control.
//!
//! Annotation features, the chromosome name normaliser that joins the annotation
//! with the alignment stream, the decoded alignment record, and the error type
//! shared by every other rnaseqc crate.
pub mod errors;
pub mod models;
pub mod utils;

pub use errors::{QcError, Result};
