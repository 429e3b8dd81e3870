use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, RsmError},
    sampler::{change_magnitude, AccessibilitySnapshot},
};

/// Keeps every zone's rate above zero when its accessibility did not move.
pub const EPSILON: f64 = 0.01;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerParams {
    pub compare_columns: Vec<String>,
    pub default_rate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub random_seed: u64,
    /// Cluster ids always sampled in full.
    pub study_area: BTreeSet<i64>,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            compare_columns: ["nonman_auto", "nonman_transit", "nonman_nonmotor", "nonman_sov_0"]
                .map(String::from).to_vec(),
            default_rate: 0.25,
            lower_bound: 0.15,
            upper_bound: 1.0,
            random_seed: 42,
            study_area: BTreeSet::new(),
        }
    }
}

impl SamplerParams {
    pub fn validate(&self) -> Result<()> {
        let (lo, hi, default) = (self.lower_bound, self.upper_bound, self.default_rate);
        if !(0.0 < lo && lo <= hi && hi <= 1.0) {
            return Err(RsmError::Config(format!("sampling bounds must satisfy 0 < lower <= upper <= 1 (got {lo}, {hi})")));
        }
        if !(lo <= default && default <= hi) {
            return Err(RsmError::Config(format!("default sampling rate {default} lies outside [{lo}, {hi}]")));
        }
        Ok(())
    }
}

/// Where a cluster's rate came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateSource {
    /// No snapshots were given.
    Default,
    /// Derived from the accessibility change.
    Adaptive,
    /// Absent from a snapshot; default rate used.
    Fallback,
    StudyArea,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterRate {
    pub cluster: i64,
    pub households: usize,
    pub rate: f64,
    pub source: RateSource,
}

/// Sampling rate of every cluster in `households` (cluster id -> household count).
///
/// With both snapshots, each cluster's rate is its accessibility change plus
/// `EPSILON`, divided by (mean / default rate) and clipped to the bounds.
pub fn compute_rates(
    households: &BTreeMap<i64, usize>,
    previous: Option<&AccessibilitySnapshot>,
    current: Option<&AccessibilitySnapshot>,
    params: &SamplerParams,
) -> Result<Vec<ClusterRate>> {
    params.validate()?;

    let adaptive = match (previous, current) {
        (Some(prev), Some(curr)) => {
            let columns = params.compare_columns.iter().map(|c| c.trim().to_lowercase()).collect::<Vec<_>>();
            let magnitude = change_magnitude(prev, curr, &columns, households.keys().copied())?;
            let weights = magnitude.into_iter().map(|(c, m)| (c, m + EPSILON)).collect::<BTreeMap<_, _>>();
            let mean = weights.values().sum::<f64>() / weights.len().max(1) as f64;
            weights.into_iter()
                .map(|(c, w)| (c, (w / (mean / params.default_rate)).clamp(params.lower_bound, params.upper_bound)))
                .collect::<BTreeMap<_, _>>()
        }
        (prev, curr) => {
            if prev.is_none() { warn!("no previous accessibility snapshot; using the default sampling rate") }
            if curr.is_none() { warn!("no current accessibility snapshot; using the default sampling rate") }
            BTreeMap::new()
        }
    };
    let have_snapshots = previous.is_some() && current.is_some();

    let rates = households.iter().map(|(&cluster, &count)| {
        let (rate, source) = if params.study_area.contains(&cluster) {
            (1.0, RateSource::StudyArea)
        } else if let Some(&rate) = adaptive.get(&cluster) {
            (rate, RateSource::Adaptive)
        } else if have_snapshots {
            warn!("cluster {cluster} missing from an accessibility snapshot; using the default rate");
            (params.default_rate, RateSource::Fallback)
        } else {
            (params.default_rate, RateSource::Default)
        };
        debug!("sampling rate of {cluster}: {rate}");
        ClusterRate { cluster, households: count, rate, source }
    }).collect();

    Ok(rates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::ZoneTable;
    use ndarray::array;

    fn snapshot(ids: Vec<i64>, values: ndarray::Array2<f64>) -> AccessibilitySnapshot {
        AccessibilitySnapshot::new(ZoneTable::new(ids, vec!["auto".into()], values).unwrap())
    }

    fn params() -> SamplerParams {
        SamplerParams { compare_columns: vec!["AUTO".into()], ..Default::default() }
    }

    #[test]
    fn no_snapshots_gives_default_and_study_area_full() {
        let households = BTreeMap::from([(13, 10), (14, 5)]);
        let params = SamplerParams { study_area: BTreeSet::from([14]), ..params() };
        let rates = compute_rates(&households, None, None, &params).unwrap();
        assert_eq!(rates[0].rate, 0.25);
        assert_eq!(rates[0].source, RateSource::Default);
        assert_eq!(rates[1].rate, 1.0);
    }

    #[test]
    fn unchanged_zone_gets_normalized_baseline() {
        let households = BTreeMap::from([(13, 10), (14, 10), (15, 10)]);
        let prev = snapshot(vec![13, 14, 15], array![[1.0], [1.0], [1.0]]);
        let curr = snapshot(vec![13, 14, 15], array![[1.0], [1.49], [1.0]]);
        let rates = compute_rates(&households, Some(&prev), Some(&curr), &params()).unwrap();

        // weights 0.01, 0.5, 0.01; mean 0.52/3
        let mean: f64 = 0.52 / 3.0;
        let expected = (0.01 / (mean / 0.25)).clamp(0.15, 1.0);
        assert!((rates[0].rate - expected).abs() < 1e-12);
        assert_eq!(rates[0].rate, 0.15);
        assert!((rates[1].rate - (0.5 / (mean / 0.25))).abs() < 1e-12);
    }

    #[test]
    fn missing_clusters_fall_back_to_default() {
        let households = BTreeMap::from([(13, 10), (99, 4)]);
        let prev = snapshot(vec![13], array![[1.0]]);
        let curr = snapshot(vec![13], array![[2.0]]);
        let rates = compute_rates(&households, Some(&prev), Some(&curr), &params()).unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[1].source, RateSource::Fallback);
        assert_eq!(rates[1].rate, 0.25);
    }

    #[test]
    fn bounds_are_validated() {
        for (lo, hi, default) in [(0.0, 1.0, 0.5), (0.5, 0.4, 0.45), (0.1, 1.2, 0.5), (0.2, 0.5, 0.6)] {
            let params = SamplerParams { lower_bound: lo, upper_bound: hi, default_rate: default, ..params() };
            assert!(matches!(params.validate(), Err(RsmError::Config(_))), "{lo} {hi} {default}");
        }
    }
}
