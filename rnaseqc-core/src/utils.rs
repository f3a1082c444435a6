use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::errors::{QcError, Result};

pub fn is_gzipped(path: &Path) -> bool {
    path.extension() == Some(OsStr::new("gz"))
}

///
/// Get a reader for either a gzip'd or a plain text file.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> std::io::Result<BufReader<Box<dyn Read>>> {
    let file = File::open(path)?;
    let file: Box<dyn Read> = match is_gzipped(path) {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    Ok(BufReader::new(file))
}

///
/// Make sure the output directory exists and accepts new files.
///
pub fn prepare_output_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| QcError::OutputDirectory(path.to_path_buf(), e))?;
    let marker = path.join(".rnaseqc.write-test");
    File::create(&marker).map_err(|e| QcError::OutputDirectory(path.to_path_buf(), e))?;
    fs::remove_file(&marker).map_err(|e| QcError::OutputDirectory(path.to_path_buf(), e))?;
    Ok(())
}
