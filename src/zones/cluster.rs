use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use log::{debug, info};
use polars::frame::DataFrame;
use serde::{Deserialize, Serialize};

use crate::{
    cluster::{build_features, cluster_rows, zone_coordinates, ClusterMethod, DisconnectedPolicy, FeatureSpec},
    crosswalk::Crosswalk,
    error::{Result, RsmError},
    graph::Graph,
    zones::{aggregate_attributes, AggregationOptions, AggregationRules, ZoneTable},
};

/// A pinned group: a lone zone kept as its own cluster, or a list of zones
/// that form exactly one cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExplicitGroup {
    Single(i64),
    Group(Vec<i64>),
}

impl ExplicitGroup {
    pub fn members(&self) -> &[i64] {
        match self {
            ExplicitGroup::Single(zone) => std::slice::from_ref(zone),
            ExplicitGroup::Group(zones) => zones,
        }
    }
}

/// Parameters of one zone aggregation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneAggregatorParams {
    pub n_zones: usize,
    pub method: ClusterMethod,
    pub cluster_factors: BTreeMap<String, f64>,
    pub cluster_factors_onehot: BTreeMap<String, f64>,
    /// Scale for centroid coordinates as features; `None` disables them.
    pub use_xy: Option<f64>,
    pub explicit_groups: Vec<ExplicitGroup>,
    /// Ids below this are reserved (external zones).
    pub start_cluster_id: i64,
    pub random_seed: u64,
    pub disconnected: DisconnectedPolicy,
}

impl Default for ZoneAggregatorParams {
    fn default() -> Self {
        Self {
            n_zones: 2000,
            method: ClusterMethod::default(),
            cluster_factors: BTreeMap::new(),
            cluster_factors_onehot: BTreeMap::new(),
            use_xy: Some(1.0),
            explicit_groups: Vec::new(),
            start_cluster_id: 13,
            random_seed: 0,
            disconnected: DisconnectedPolicy::default(),
        }
    }
}

impl ZoneAggregatorParams {
    fn feature_spec(&self) -> FeatureSpec {
        FeatureSpec {
            use_xy: self.use_xy,
            factors: self.cluster_factors.iter().map(|(c, &w)| (c.clone(), w)).collect(),
            onehot: self.cluster_factors_onehot.iter().map(|(c, &w)| (c.clone(), w)).collect(),
        }
    }
}

/// Aggregated clusters: one row per cluster id, with integer `centroid_x` /
/// `centroid_y` when coordinates are known.
#[derive(Clone, Debug)]
pub struct ClusterTable {
    pub table: ZoneTable,
    pub members: BTreeMap<i64, Vec<i64>>,
    pub pinned: BTreeSet<i64>,
}

impl ClusterTable {
    #[inline] pub fn len(&self) -> usize { self.table.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.table.is_empty() }

    #[inline] pub fn ids(&self) -> &[i64] { self.table.ids() }

    #[inline] pub fn is_pinned(&self, cluster: i64) -> bool { self.pinned.contains(&cluster) }

    pub fn members(&self, cluster: i64) -> &[i64] {
        self.members.get(&cluster).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        self.table.to_dataframe("cluster_id")
    }
}

/// Result of zone aggregation: the clusters and the fine-zone crosswalk.
#[derive(Clone, Debug)]
pub struct ZoneAggregation {
    pub clusters: ClusterTable,
    pub crosswalk: Crosswalk,
}

/// Map every pinned zone to its group's cluster id (`start`, `start + 1`, ...).
fn pin_groups(zones: &ZoneTable, groups: &[ExplicitGroup], start: i64) -> Result<AHashMap<usize, i64>> {
    let mut pinned = AHashMap::new();
    for (g, group) in groups.iter().enumerate() {
        if group.members().is_empty() {
            return Err(RsmError::Config(format!("explicit group {g} is empty")));
        }
        for &zone in group.members() {
            let row = zones.row_of(zone)
                .ok_or_else(|| RsmError::Config(format!("explicit group {g} names unknown zone {zone}")))?;
            if pinned.insert(row, start + g as i64).is_some() {
                return Err(RsmError::Config(format!("zone {zone} appears in more than one explicit group")));
            }
        }
    }
    Ok(pinned)
}

/// Partition `zones` into `params.n_zones` clusters and aggregate their
/// attributes.
///
/// `adjacency` is over the rows of `zones`; when omitted, rook adjacency is
/// derived from the zone geometry if contiguity is needed.
pub fn aggregate_zones(
    zones: &ZoneTable,
    adjacency: Option<&Graph>,
    params: &ZoneAggregatorParams,
    rules: &AggregationRules,
    options: &AggregationOptions,
) -> Result<ZoneAggregation> {
    let n_pinned = params.explicit_groups.len();
    if params.n_zones <= n_pinned {
        return Err(RsmError::Config(format!(
            "n_zones ({}) must exceed the number of explicit groups ({n_pinned})", params.n_zones
        )));
    }
    let pinned = pin_groups(zones, &params.explicit_groups, params.start_cluster_id)?;
    let free_target = params.n_zones - n_pinned;

    let free_rows = (0..zones.len()).filter(|r| !pinned.contains_key(r)).collect::<Vec<_>>();
    info!(
        "clustering {} free zones into {free_target} clusters ({}), {n_pinned} pinned groups",
        free_rows.len(), params.method
    );

    let graph = match (params.method, adjacency) {
        (ClusterMethod::AgglomAdj, Some(graph)) => Some(graph.subgraph(&free_rows)),
        (ClusterMethod::AgglomAdj, None) => {
            let geometry = zones.geometry()
                .ok_or_else(|| RsmError::Config("agglom_adj needs an adjacency list or zone geometry".into()))?;
            Some(Graph::new(zones.len(), &geometry.rook_adjacency()?).subgraph(&free_rows))
        }
        _ => None,
    };

    let free = zones.select_rows(&free_rows)?;
    let features = build_features(&free, &params.feature_spec())?;
    let labels = cluster_rows(&features, free_target, params.method, graph.as_ref(), params.random_seed, params.disconnected)?;

    let first_algorithmic = params.start_cluster_id + n_pinned as i64;
    let mut cluster_of_row = vec![0i64; zones.len()];
    pinned.iter().for_each(|(&row, &id)| cluster_of_row[row] = id);
    free_rows.iter().zip(&labels).for_each(|(&row, &label)| cluster_of_row[row] = first_algorithmic + label as i64);

    let mut table = aggregate_attributes(zones, &cluster_of_row, rules, options)?;
    add_centroids(&mut table, zones, &cluster_of_row)?;

    let mut members: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    zones.ids().iter().zip(&cluster_of_row).for_each(|(&zone, &c)| members.entry(c).or_default().push(zone));

    let crosswalk = Crosswalk::from_pairs(zones.ids().iter().copied().zip(cluster_of_row.iter().copied()))?;
    let pinned = pinned.values().copied().collect::<BTreeSet<_>>();

    info!("aggregated {} zones into {} clusters", zones.len(), table.len());
    Ok(ZoneAggregation { clusters: ClusterTable { table, members, pinned }, crosswalk })
}

/// Integer (truncated) centroid of every cluster, from the dissolved geometry
/// or else the mean of member zone coordinates.
fn add_centroids(clusters: &mut ZoneTable, zones: &ZoneTable, cluster_of_row: &[i64]) -> Result<()> {
    let coords = match clusters.geometry() {
        Some(geometry) => clusters.ids().iter().zip(geometry.centroids())
            .map(|(id, c)| c.ok_or_else(|| RsmError::Geometry(format!("cluster {id} has an empty geometry"))))
            .collect::<Result<Vec<_>>>()?,
        None => {
            let Ok(zone_coords) = zone_coordinates(zones) else {
                debug!("zones have no coordinates; cluster centroids omitted");
                return Ok(());
            };
            let mut sums: BTreeMap<i64, (f64, f64, f64)> = BTreeMap::new();
            for (&c, (x, y)) in cluster_of_row.iter().zip(zone_coords) {
                let entry = sums.entry(c).or_default();
                *entry = (entry.0 + x, entry.1 + y, entry.2 + 1.0);
            }
            clusters.ids().iter()
                .map(|id| sums.get(id).map(|&(x, y, n)| (x / n, y / n)).unwrap_or((f64::NAN, f64::NAN)))
                .collect()
        }
    };

    clusters.set_column("centroid_x", coords.iter().map(|c| c.0.trunc()).collect())?;
    clusters.set_column("centroid_y", coords.iter().map(|c| c.1.trunc()).collect())?;
    Ok(())
}
