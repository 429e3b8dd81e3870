use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;

use crate::sampler::ClusterRate;

/// Seed of one cluster's draw: `cluster_id + random_seed`.
#[inline]
pub fn cluster_seed(cluster: i64, random_seed: u64) -> u64 {
    random_seed.wrapping_add(cluster as u64)
}

/// Simple random sample without replacement of `round(rate * rows.len())`
/// of `rows` (ties to even), returned in ascending row order.
pub fn draw_rows(rows: &[usize], rate: f64, seed: u64) -> Vec<usize> {
    let n = ((rate * rows.len() as f64).round_ties_even() as usize).min(rows.len());
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, rows.len(), n)
        .into_iter()
        .map(|i| rows[i])
        .collect::<Vec<_>>();
    picked.sort_unstable();
    picked
}

/// Draw every cluster independently and in parallel. `rows_of(cluster)`
/// gives the household rows of a cluster.
pub fn draw_clusters<'a>(
    rates: &[ClusterRate],
    rows_of: impl Fn(i64) -> &'a [usize] + Sync,
    random_seed: u64,
) -> Vec<usize> {
    rates.par_iter()
        .map(|r| draw_rows(rows_of(r.cluster), r.rate, cluster_seed(r.cluster, random_seed)))
        .collect::<Vec<_>>()
        .concat()
}
