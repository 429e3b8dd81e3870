//! CSV writing operations.

use std::{fs::File, io::BufWriter, path::Path};

use polars::{frame::DataFrame, io::SerWriter, prelude::CsvWriter};

use crate::{common::ensure_parent_exists, error::{Result, RsmError}};

/// Write a DataFrame to a CSV file, creating parent directories as needed.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    ensure_parent_exists(path)?;
    let file = File::create(path)
        .map_err(|source| RsmError::Io { path: path.to_path_buf(), source })?;
    CsvWriter::new(BufWriter::new(file)).finish(df)?;
    Ok(())
}

