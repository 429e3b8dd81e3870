use std::{collections::BTreeMap, path::Path};

use polars::frame::DataFrame;

use crate::{common::FINE_ZONE, error::Result, io::csv::read_csv, zones::ZoneTable};

/// One iteration's accessibility measures, keyed by zone id.
#[derive(Clone, Debug)]
pub struct AccessibilitySnapshot {
    table: ZoneTable,
}

impl AccessibilitySnapshot {
    pub fn new(table: ZoneTable) -> Self { Self { table } }

    /// Key column is the first fine-zone alias present (`mgra`, `taz`, ...).
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let key = FINE_ZONE.resolve(df)?;
        Ok(Self::new(ZoneTable::from_dataframe(df, &key)?))
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        Self::from_dataframe(&read_csv(path)?)
    }

    #[inline] pub fn zones(&self) -> &[i64] { self.table.ids() }

    #[inline] pub fn table(&self) -> &ZoneTable { &self.table }
}

/// Sum of absolute differences across `columns` for every zone present in
/// both snapshots and in `zones`.
pub fn change_magnitude(
    previous: &AccessibilitySnapshot,
    current: &AccessibilitySnapshot,
    columns: &[String],
    zones: impl IntoIterator<Item = i64>,
) -> Result<BTreeMap<i64, f64>> {
    let prev = columns.iter().map(|c| previous.table.column(c)).collect::<Result<Vec<_>>>()?;
    let curr = columns.iter().map(|c| current.table.column(c)).collect::<Result<Vec<_>>>()?;

    Ok(zones.into_iter().filter_map(|zone| {
        let (p, c) = (previous.table.row_of(zone)?, current.table.row_of(zone)?);
        let total = prev.iter().zip(&curr).map(|(pv, cv)| (cv[c] - pv[p]).abs()).sum::<f64>();
        Some((zone, total))
    }).collect())
}
