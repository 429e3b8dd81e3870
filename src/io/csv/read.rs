//! CSV reading operations.

use std::{fs::File, io::Cursor, path::Path};

use polars::{frame::DataFrame, io::SerReader, prelude::CsvReader};

use crate::{common::{column_i64, normalize_headers}, error::{Result, RsmError}};

/// Reads a CSV file from `path` into a Polars DataFrame, normalizing headers
/// (trimmed, lower-cased).
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .map_err(|source| RsmError::Io { path: path.to_path_buf(), source })?;
    let mut df = CsvReader::new(file).finish()?;
    normalize_headers(&mut df)?;
    Ok(df)
}

/// Reads a CSV from a string, normalizing headers.
pub fn read_csv_string(csv: &str) -> Result<DataFrame> {
    let mut df = CsvReader::new(Cursor::new(csv.as_bytes())).finish()?;
    normalize_headers(&mut df)?;
    Ok(df)
}

/// Read an undirected adjacency list given as zone id pairs.
///
/// The file must have two columns, `zone` and `neighbor` (or the first two
/// columns are used if those names are absent).
pub fn read_adjacency_pairs(path: &Path) -> Result<Vec<(i64, i64)>> {
    let df = read_csv(path)?;
    if df.width() < 2 {
        return Err(RsmError::InvalidData(format!(
            "adjacency file {} must have two columns: zone,neighbor", path.display()
        )));
    }
    let names = df.get_column_names().iter().map(|n| n.to_string()).collect::<Vec<_>>();
    let (a, b) = if names.iter().any(|n| n == "zone") && names.iter().any(|n| n == "neighbor") {
        ("zone".to_string(), "neighbor".to_string())
    } else {
        (names[0].clone(), names[1].clone())
    };

    Ok(column_i64(&df, &a)?.into_iter().zip(column_i64(&df, &b)?).collect())
}
