use polars::{frame::DataFrame, prelude::DataType};

use crate::error::{Result, RsmError};

/// An ordered list of accepted names for one logical column.
/// The first alias present in a table wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnAliases {
    pub wanted: &'static str,
    pub aliases: &'static [&'static str],
}

pub const HOUSEHOLD_ID: ColumnAliases = ColumnAliases {
    wanted: "household id",
    aliases: &["hhid", "hh_id", "household_id"],
};

pub const HOME_ZONE: ColumnAliases = ColumnAliases {
    wanted: "home zone",
    aliases: &["mgra", "home_mgra"],
};

pub const FINE_ZONE: ColumnAliases = ColumnAliases {
    wanted: "fine zone id",
    aliases: &["mgra", "taz", "zone", "fine_zone_id"],
};

pub const CLUSTER_ID: ColumnAliases = ColumnAliases {
    wanted: "cluster id",
    aliases: &["cluster_id"],
};

impl ColumnAliases {
    /// Find the first alias that names a column of `df`.
    pub fn resolve(&self, df: &DataFrame) -> Result<String> {
        let names = df.get_column_names();
        self.aliases.iter()
            .find(|alias| names.iter().any(|name| name.as_str() == **alias))
            .map(|alias| alias.to_string())
            .ok_or_else(|| RsmError::MissingColumn {
                wanted: self.wanted.to_string(),
                tried: self.aliases.iter().map(|a| a.to_string()).collect(),
            })
    }
}

/// Trim and lower-case every column name.
pub fn normalize_headers(df: &mut DataFrame) -> Result<()> {
    let names = df.get_column_names().iter()
        .map(|name| name.trim().to_lowercase())
        .collect::<Vec<_>>();
    df.set_column_names(names)?;
    Ok(())
}

/// Fail unless `df` has a column called `name`.
pub fn require_column(df: &DataFrame, name: &str) -> Result<()> {
    if df.get_column_names().iter().any(|c| c.as_str() == name) { Ok(()) }
    else { Err(RsmError::missing_column(name)) }
}

/// Read an integer column, casting as needed. Nulls are rejected.
pub fn column_i64(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    require_column(df, name)?;
    let column = df.column(name)?.cast(&DataType::Int64)?;
    column.i64()?.into_iter()
        .enumerate()
        .map(|(row, value)| value.ok_or_else(|| {
            RsmError::InvalidData(format!("column '{name}' has a null or non-integer value at row {row}"))
        }))
        .collect()
}

/// Read a float column, casting as needed. Nulls are rejected.
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    require_column(df, name)?;
    let column = df.column(name)?.cast(&DataType::Float64)?;
    column.f64()?.into_iter()
        .enumerate()
        .map(|(row, value)| value.ok_or_else(|| {
            RsmError::InvalidData(format!("column '{name}' has a null or non-numeric value at row {row}"))
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    #[test]
    fn resolve_picks_first_alias_in_order() {
        let df = df!("household_id" => [1i64, 2], "hh_id" => [3i64, 4]).unwrap();
        assert_eq!(HOUSEHOLD_ID.resolve(&df).unwrap(), "hh_id");
    }

    #[test]
    fn resolve_failure_lists_every_alias() {
        let df = df!("id" => [1i64]).unwrap();
        match HOME_ZONE.resolve(&df) {
            Err(RsmError::MissingColumn { wanted, tried }) => {
                assert_eq!(wanted, "home zone");
                assert_eq!(tried, vec!["mgra".to_string(), "home_mgra".to_string()]);
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn normalize_headers_trims_and_lowercases() {
        let mut df = df!(" MGRA " => [1i64], "Cluster_ID" => [5i64]).unwrap();
        normalize_headers(&mut df).unwrap();
        let names = df.get_column_names().iter().map(|n| n.to_string()).collect::<Vec<_>>();
        assert_eq!(names, vec!["mgra", "cluster_id"]);
    }

    #[test]
    fn column_i64_casts_floats_and_rejects_nulls() {
        let df = df!("a" => [1.0f64, 2.0], "b" => [Some(1i64), None]).unwrap();
        assert_eq!(column_i64(&df, "a").unwrap(), vec![1, 2]);
        assert!(matches!(column_i64(&df, "b"), Err(RsmError::InvalidData(_))));
        assert!(matches!(column_i64(&df, "c"), Err(RsmError::MissingColumn { .. })));
    }
}
