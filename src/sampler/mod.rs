//! Adaptive household sampling by cluster.

mod access;
mod draw;
mod rates;

use std::collections::BTreeMap;

use ahash::AHashSet;
use log::info;
use polars::{frame::DataFrame, prelude::{BooleanChunked, Column, IdxCa, IdxSize}};

use crate::{
    common::{column_i64, HOME_ZONE, HOUSEHOLD_ID},
    crosswalk::Crosswalk,
    error::Result,
};

pub use access::{change_magnitude, AccessibilitySnapshot};
pub use draw::{cluster_seed, draw_clusters, draw_rows};
pub use rates::{compute_rates, ClusterRate, RateSource, SamplerParams, EPSILON};

/// Tables and mappings for one sampling run.
#[derive(Clone, Copy, Debug)]
pub struct SampleInputs<'a> {
    pub households: &'a DataFrame,
    pub persons: &'a DataFrame,
    /// Home zone to cluster.
    pub crosswalk: &'a Crosswalk,
    /// Rewrites a `taz` column of the households, when both are present.
    pub taz_crosswalk: Option<&'a Crosswalk>,
    pub previous: Option<&'a AccessibilitySnapshot>,
    pub current: Option<&'a AccessibilitySnapshot>,
}

#[derive(Clone, Debug)]
pub struct SampleResult {
    /// Sampled households sorted by id, home zone rewritten to cluster id.
    pub households: DataFrame,
    pub persons: DataFrame,
    pub rates: Vec<ClusterRate>,
    /// Sampled households / all households.
    pub realized_rate: f64,
}

/// Choose the households to resimulate this iteration.
pub fn sample_households(inputs: &SampleInputs, params: &SamplerParams) -> Result<SampleResult> {
    params.validate()?;
    let households = inputs.households;
    let hh_column = HOUSEHOLD_ID.resolve(households)?;
    let home_column = HOME_ZONE.resolve(households)?;
    let person_hh_column = HOUSEHOLD_ID.resolve(inputs.persons)?;

    let hh_ids = column_i64(households, &hh_column)?;
    let clusters = column_i64(households, &home_column)?.into_iter()
        .map(|zone| inputs.crosswalk.map_zone(zone, "household home zone"))
        .collect::<Result<Vec<_>>>()?;

    let mut rows_by_cluster: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    clusters.iter().enumerate().for_each(|(row, &c)| rows_by_cluster.entry(c).or_default().push(row));
    let counts = rows_by_cluster.iter().map(|(&c, rows)| (c, rows.len())).collect();

    let rates = compute_rates(&counts, inputs.previous, inputs.current, params)?;
    let mut sampled = draw_clusters(&rates, |c| rows_by_cluster.get(&c).map(Vec::as_slice).unwrap_or_default(), params.random_seed);
    sampled.sort_by_key(|&row| (hh_ids[row], row));

    let index = IdxCa::from_vec("idx".into(), sampled.iter().map(|&r| r as IdxSize).collect());
    let mut sampled_households = households.take(&index)?;
    sampled_households.with_column(Column::new(
        home_column.as_str().into(),
        sampled.iter().map(|&r| clusters[r]).collect::<Vec<_>>(),
    ))?;
    if let Some(taz_crosswalk) = inputs.taz_crosswalk {
        if sampled_households.get_column_names().iter().any(|c| c.as_str() == "taz") {
            let taz = column_i64(&sampled_households, "taz")?.into_iter()
                .map(|zone| taz_crosswalk.map_zone(zone, "household taz"))
                .collect::<Result<Vec<_>>>()?;
            sampled_households.with_column(Column::new("taz".into(), taz))?;
        }
    }

    let sampled_ids = sampled.iter().map(|&r| hh_ids[r]).collect::<AHashSet<_>>();
    let mask = column_i64(inputs.persons, &person_hh_column)?.iter()
        .map(|id| sampled_ids.contains(id))
        .collect::<BooleanChunked>();
    let persons = inputs.persons.filter(&mask)?;

    let realized_rate = if households.height() == 0 { 0.0 } else { sampled.len() as f64 / households.height() as f64 };
    info!(
        "sampled {} of {} households ({} persons); total sampling rate {realized_rate:.2}",
        sampled.len(), households.height(), persons.height()
    );

    Ok(SampleResult { households: sampled_households, persons, rates, realized_rate })
}
