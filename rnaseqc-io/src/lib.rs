//! # Input utilities for rnaseqc.
//!
//! Turns annotation text (GTF), fragment exon models (BED) and alignment files
//! (BAM) into the owned models the quality-control engine sweeps over. Every
//! reader normalises chromosome names through a caller-supplied
//! [`ChromosomeMap`](rnaseqc_core::models::ChromosomeMap) so the annotation and
//! the alignments agree on chromosome identity.
//!
pub mod bam;
pub mod bed;
pub mod gtf;

// re-expose core functions
pub use bam::*;
pub use bed::*;
pub use gtf::*;
