use std::collections::{BTreeMap, BTreeSet};

use log::info;

use crate::{
    crosswalk::Crosswalk,
    error::{Result, RsmError},
    graph::Graph,
    zones::{aggregate_zones, AggregationOptions, AggregationRules, ClusterTable, ZoneAggregation, ZoneAggregatorParams, ZoneTable},
};

/// Clusters per district for a scale factor `x`: each district gets
/// `count * x * focus`, capped at its zone count and at least 1.
fn scale_zones(x: f64, counts: &BTreeMap<i64, usize>, focus: &BTreeMap<i64, f64>) -> BTreeMap<i64, f64> {
    counts.iter().map(|(&d, &n)| {
        let scaled = n as f64 * x.abs() * focus.get(&d).copied().unwrap_or(1.0);
        (d, scaled.min(n as f64).max(1.0))
    }).collect()
}

/// Split `n_zones` across districts proportionally to their zone counts.
/// The scale factor is found by bisection; the allocation is rounded.
pub fn allocate_zones(n_zones: usize, counts: &BTreeMap<i64, usize>, focus: &BTreeMap<i64, f64>) -> BTreeMap<i64, usize> {
    let total = |x: f64| scale_zones(x, counts, focus).values().sum::<f64>();
    let target = n_zones as f64;

    let mut hi = 1.0;
    while total(hi) < target && hi < 1e12 { hi *= 2.0 }
    let mut lo = 0.0;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if total(mid) < target { lo = mid } else { hi = mid }
    }
    let x = if (total(lo) - target).abs() < (total(hi) - target).abs() { lo } else { hi };

    scale_zones(x, counts, focus).into_iter()
        .map(|(d, v)| (d, v.round() as usize))
        .collect()
}

/// Aggregate zones independently within each district of `district_column`.
///
/// Each explicit group must lie inside one district. District `d` is
/// clustered with seed `random_seed + d`; cluster ids run sequentially across
/// districts (ascending) from `start_cluster_id`.
pub fn aggregate_zones_within_districts(
    zones: &ZoneTable,
    adjacency: Option<&Graph>,
    params: &ZoneAggregatorParams,
    district_column: &str,
    focus: &BTreeMap<i64, f64>,
    rules: &AggregationRules,
    options: &AggregationOptions,
) -> Result<ZoneAggregation> {
    let unknown = params.explicit_groups.iter()
        .flat_map(|g| g.members())
        .find(|&&z| zones.row_of(z).is_none());
    if let Some(zone) = unknown {
        return Err(RsmError::Config(format!("explicit group names unknown zone {zone}")));
    }

    let districts = zones.column(district_column)?.iter().map(|&v| v as i64).collect::<Vec<_>>();

    let mut rows_by_district: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    districts.iter().enumerate().for_each(|(r, &d)| rows_by_district.entry(d).or_default().push(r));
    let counts = rows_by_district.iter().map(|(&d, rows)| (d, rows.len())).collect();
    let allocation = allocate_zones(params.n_zones, &counts, focus);

    let adjacency = match adjacency {
        Some(graph) => Some(graph.clone()),
        None => match zones.geometry() {
            Some(geometry) => Some(Graph::new(zones.len(), &geometry.rook_adjacency()?)),
            None => None,
        },
    };

    let mut next_id = params.start_cluster_id;
    let mut parts: Vec<ClusterTable> = Vec::new();
    let mut pairs = Vec::with_capacity(zones.len());

    for (&district, rows) in &rows_by_district {
        let groups = params.explicit_groups.iter()
            .filter_map(|group| {
                let inside = group.members().iter()
                    .filter(|&&z| zones.row_of(z).is_some_and(|r| districts[r] == district))
                    .count();
                match inside {
                    0 => None,
                    n if n == group.members().len() => Some(Ok(group.clone())),
                    _ => Some(Err(RsmError::Config(format!("explicit group {:?} spans several districts", group.members())))),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        // Pinned groups come out of the district's allocation.
        let pinned_zones = groups.iter().map(|g| g.members().len()).sum::<usize>();
        let free_zones = rows.len().saturating_sub(pinned_zones);
        let n_zones = allocation.get(&district).copied().unwrap_or(1)
            .min(groups.len() + free_zones)
            .max(groups.len() + 1);
        info!("combining district {district} from {} zones into {n_zones} zones", rows.len());

        let sub_params = ZoneAggregatorParams {
            n_zones,
            explicit_groups: groups,
            start_cluster_id: next_id,
            random_seed: params.random_seed.wrapping_add(district as u64),
            ..params.clone()
        };
        let sub_graph = adjacency.as_ref().map(|graph| graph.subgraph(rows));
        let result = aggregate_zones(&zones.select_rows(rows)?, sub_graph.as_ref(), &sub_params, rules, options)?;

        next_id += result.clusters.len() as i64;
        pairs.extend(result.crosswalk.iter());
        parts.push(result.clusters);
    }

    let mut parts = parts.into_iter();
    let first = parts.next().ok_or_else(|| RsmError::InvalidData("no zones to aggregate".into()))?;
    let clusters = parts.try_fold(first, |acc, part| -> Result<ClusterTable> {
        Ok(ClusterTable {
            table: acc.table.vstack(&part.table)?,
            members: acc.members.into_iter().chain(part.members).collect(),
            pinned: acc.pinned.into_iter().chain(part.pinned).collect::<BTreeSet<_>>(),
        })
    })?;

    Ok(ZoneAggregation { clusters, crosswalk: Crosswalk::from_pairs(pairs)? })
}
