use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QcError {
    #[error("Alignment out of coordinate order on chromosome {chromosome}: {position} after {previous}")]
    OutOfOrder {
        chromosome: String,
        previous: u64,
        position: u64,
    },

    #[error("Alignments for chromosome {0} resumed after the stream moved past it")]
    ChromosomeRevisited(String),

    #[error("Gene {0} was committed twice")]
    DoubleCommit(String),

    #[error("Unable to open annotation file: {0}")]
    MissingAnnotation(PathBuf),

    #[error("Unable to open alignment file: {0}")]
    MissingAlignments(PathBuf),

    #[error("Unable to use output directory {0}: {1}")]
    OutputDirectory(PathBuf, #[source] std::io::Error),

    #[error("Alignment file shares no contigs with the annotation")]
    NoContigOverlap,

    #[error("Error parsing line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QcError {
    /// Process exit code reported by the binary for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            QcError::MissingAnnotation(_) => 10,
            QcError::MissingAlignments(_) => 11,
            QcError::OutputDirectory(..) => 12,
            QcError::NoContigOverlap => 13,
            QcError::OutOfOrder { .. }
            | QcError::ChromosomeRevisited(_)
            | QcError::DoubleCommit(_) => 14,
            QcError::InvalidConfig(_) => 2,
            QcError::Parse { .. } | QcError::Io(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, QcError>;
