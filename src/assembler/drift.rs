use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use log::warn;
use polars::{frame::DataFrame, prelude::Column};

use crate::{
    assembler::TripRoster,
    common::{column_i64, HOME_ZONE, HOUSEHOLD_ID},
    error::Result,
};

/// Archived vs resimulated trip totals for one (home zone, mode).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriftRow {
    pub zone: i64,
    pub trip_mode: i64,
    pub n_trips_orig: usize,
    pub n_trips_rsm: usize,
    pub net_change: i64,
    /// `net_change / max(orig, rsm) * 100`.
    pub pct_change: f64,
}

/// Per-zone trip drift of the resimulated households.
#[derive(Clone, Debug, PartialEq)]
pub struct DriftReport {
    pub zone_column: String,
    pub rows: Vec<DriftRow>,
}

impl DriftReport {
    /// Compare trip counts per (household, mode) of the archived and
    /// resimulated rosters, attribute them to each household's home zone and
    /// total them per (zone, mode). Rows are sorted by zone, then mode.
    pub fn build(archived: &TripRoster, resimulated: &TripRoster, households: &DataFrame) -> Result<Self> {
        let hh_column = HOUSEHOLD_ID.resolve(households)?;
        let zone_column = HOME_ZONE.resolve(households)?;
        let home = column_i64(households, &hh_column)?.into_iter()
            .zip(column_i64(households, &zone_column)?)
            .collect::<AHashMap<_, _>>();

        let mut combined: BTreeMap<(i64, i64), (usize, usize)> = BTreeMap::new();
        for (key, n) in archived.counts_by_household_mode() { combined.entry(key).or_default().0 += n }
        for (key, n) in resimulated.counts_by_household_mode() { combined.entry(key).or_default().1 += n }

        let mut by_zone: BTreeMap<(i64, i64), (usize, usize)> = BTreeMap::new();
        let mut homeless = AHashSet::new();
        for ((hh_id, mode), (orig, rsm)) in combined {
            let Some(&zone) = home.get(&hh_id) else {
                homeless.insert(hh_id);
                continue;
            };
            let entry = by_zone.entry((zone, mode)).or_default();
            entry.0 += orig;
            entry.1 += rsm;
        }
        if !homeless.is_empty() {
            warn!("{} resimulated households have no home zone and are left out of the drift report", homeless.len());
        }

        let rows = by_zone.into_iter().map(|((zone, trip_mode), (orig, rsm))| {
            let net_change = rsm as i64 - orig as i64;
            let max = orig.max(rsm) as f64;
            DriftRow {
                zone, trip_mode, n_trips_orig: orig, n_trips_rsm: rsm, net_change,
                pct_change: if max > 0.0 { net_change as f64 / max * 100.0 } else { 0.0 },
            }
        }).collect();

        Ok(Self { zone_column, rows })
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let rows = &self.rows;
        Ok(DataFrame::new(vec![
            Column::new(self.zone_column.as_str().into(), rows.iter().map(|r| r.zone).collect::<Vec<_>>()),
            Column::new("trip_mode".into(), rows.iter().map(|r| r.trip_mode).collect::<Vec<_>>()),
            Column::new("n_trips_orig".into(), rows.iter().map(|r| r.n_trips_orig as i64).collect::<Vec<_>>()),
            Column::new("n_trips_rsm".into(), rows.iter().map(|r| r.n_trips_rsm as i64).collect::<Vec<_>>()),
            Column::new("net_change".into(), rows.iter().map(|r| r.net_change).collect::<Vec<_>>()),
            Column::new("pct_change".into(), rows.iter().map(|r| r.pct_change).collect::<Vec<_>>()),
        ])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::Trip;
    use polars::df;

    fn trip(hh_id: i64, trip_mode: i64) -> Trip { Trip { hh_id, tour_id: 0, trip_mode } }

    #[test]
    fn totals_per_zone_and_mode() {
        let archived = TripRoster::new(vec![trip(1, 1), trip(1, 1), trip(2, 1), trip(2, 3)]);
        let resimulated = TripRoster::new(vec![trip(1, 1), trip(2, 1), trip(2, 1), trip(9, 1)]);
        let households = df!("hh_id" => [1i64, 2], "home_mgra" => [13i64, 13]).unwrap();

        let report = DriftReport::build(&archived, &resimulated, &households).unwrap();
        assert_eq!(report.zone_column, "home_mgra");
        assert_eq!(report.rows.len(), 2);

        let auto = report.rows[0];
        assert_eq!((auto.zone, auto.trip_mode, auto.n_trips_orig, auto.n_trips_rsm), (13, 1, 3, 3));
        assert_eq!(auto.pct_change, 0.0);

        let transit = report.rows[1];
        assert_eq!((transit.n_trips_orig, transit.n_trips_rsm, transit.net_change), (1, 0, -1));
        assert_eq!(transit.pct_change, -100.0);

        assert_eq!(report.to_dataframe().unwrap().height(), 2);
    }
}
