// Integration tests for zone aggregation:
//   crosswalk totality, pinned groups, contiguity, districts, attribute round trip

use std::collections::BTreeSet;

use ndarray::Array2;
use rsm::{
    aggregate_zones, aggregate_zones_within_districts,
    cluster::ClusterMethod,
    graph::Graph,
    zones::{aggregate_attributes, AggRule, AggregationOptions, AggregationRules, ExplicitGroup, ZoneAggregation, ZoneAggregatorParams, ModeTieBreak},
    ZoneTable,
};

/// Zones `1..=n` with `centroid_x`, `centroid_y`, `pop` and `district` columns.
fn make_zones(coords: &[(f64, f64)], districts: &[i64]) -> ZoneTable {
    let mut values = Array2::zeros((coords.len(), 4));
    for (i, &(x, y)) in coords.iter().enumerate() {
        values[[i, 0]] = x;
        values[[i, 1]] = y;
        values[[i, 2]] = 10.0 * (i + 1) as f64;
        values[[i, 3]] = districts.get(i).copied().unwrap_or(1) as f64;
    }
    let columns = ["centroid_x", "centroid_y", "pop", "district"].map(String::from).to_vec();
    ZoneTable::new((1..=coords.len() as i64).collect(), columns, values).unwrap()
}

/// Path graph over consecutive ids, skipping the listed breaks.
fn make_line_graph(zones: &ZoneTable, breaks: &[i64]) -> Graph {
    let pairs = zones.ids().windows(2)
        .filter(|w| !breaks.contains(&w[0]))
        .map(|w| (w[0], w[1]))
        .collect::<Vec<_>>();
    Graph::from_id_pairs(zones.ids(), &pairs).unwrap()
}

fn rules() -> AggregationRules { AggregationRules::new().with("pop", AggRule::Sum) }

fn assert_total(result: &ZoneAggregation, zones: &ZoneTable, n_zones: usize) {
    let crosswalk = &result.crosswalk;
    assert_eq!(crosswalk.len(), zones.len());
    assert!(zones.ids().iter().all(|&z| crosswalk.get(z).is_some()));
    assert_eq!(crosswalk.cluster_ids(), result.clusters.ids().to_vec());
    assert_eq!(crosswalk.cluster_ids().len(), n_zones);

    let total = |t: &ZoneTable| t.column("pop").unwrap().sum();
    assert_eq!(total(&result.clusters.table), total(zones));
}

fn rows_of(zones: &ZoneTable, members: &[i64]) -> Vec<usize> {
    members.iter().map(|&z| zones.row_of(z).unwrap()).collect()
}

#[test]
fn two_components_give_two_contiguous_clusters() {
    // Two rows of five zones, close in space but not adjacent to each other.
    let coords = (0..10).map(|i| ((i % 5) as f64, (i / 5) as f64)).collect::<Vec<_>>();
    let zones = make_zones(&coords, &[]);
    let graph = make_line_graph(&zones, &[5]);

    let params = ZoneAggregatorParams { n_zones: 2, ..Default::default() };
    let result = aggregate_zones(&zones, Some(&graph), &params, &rules(), &AggregationOptions::default()).unwrap();

    assert_total(&result, &zones, 2);
    assert_eq!(result.clusters.members(13), &[1, 2, 3, 4, 5]);
    assert_eq!(result.clusters.members(14), &[6, 7, 8, 9, 10]);
}

#[test]
fn free_clusters_stay_contiguous_around_pinned_groups() {
    let coords = (0..10).map(|i| (i as f64, 0.0)).collect::<Vec<_>>();
    let zones = make_zones(&coords, &[]);
    let graph = make_line_graph(&zones, &[]);

    let params = ZoneAggregatorParams {
        n_zones: 4,
        explicit_groups: vec![ExplicitGroup::Group(vec![9, 10]), ExplicitGroup::Single(3)],
        ..Default::default()
    };
    let result = aggregate_zones(&zones, Some(&graph), &params, &rules(), &AggregationOptions::default()).unwrap();
    assert_total(&result, &zones, 4);

    let crosswalk = &result.crosswalk;
    assert_eq!((crosswalk.get(9), crosswalk.get(10)), (Some(13), Some(13)));
    assert_eq!(crosswalk.get(3), Some(14));
    assert_eq!(crosswalk.iter().filter(|&(_, c)| c == 13).count(), 2);
    assert_eq!(crosswalk.iter().filter(|&(_, c)| c == 14).count(), 1);

    // Pinning zone 3 cuts the free zones into {1, 2} and {4..8}.
    assert_eq!(result.clusters.members(15), &[1, 2]);
    assert_eq!(result.clusters.members(16), &[4, 5, 6, 7, 8]);
    for cluster in [15, 16] {
        assert!(graph.is_connected_subset(&rows_of(&zones, result.clusters.members(cluster))));
    }
}

#[test]
fn kmeans_and_ward_are_total_and_deterministic() {
    let coords = (0..12).map(|i| ((i * 7 % 12) as f64, (i * 5 % 12) as f64)).collect::<Vec<_>>();
    let zones = make_zones(&coords, &[]);

    for method in [ClusterMethod::KMeans, ClusterMethod::Agglom] {
        let params = ZoneAggregatorParams { n_zones: 4, method, random_seed: 7, ..Default::default() };
        let first = aggregate_zones(&zones, None, &params, &rules(), &AggregationOptions::default()).unwrap();
        let second = aggregate_zones(&zones, None, &params, &rules(), &AggregationOptions::default()).unwrap();
        assert_total(&first, &zones, 4);
        assert_eq!(first.crosswalk, second.crosswalk);
    }
}

#[test]
fn districts_are_clustered_separately() {
    let coords = (0..8).map(|i| (i as f64, 0.0)).collect::<Vec<_>>();
    let zones = make_zones(&coords, &[1, 1, 1, 1, 2, 2, 2, 2]);
    let graph = make_line_graph(&zones, &[]);

    let params = ZoneAggregatorParams { n_zones: 4, ..Default::default() };
    let result = aggregate_zones_within_districts(
        &zones, Some(&graph), &params, "district", &Default::default(), &rules(), &AggregationOptions::default(),
    ).unwrap();

    assert_total(&result, &zones, 4);
    assert_eq!(result.clusters.ids(), &[13, 14, 15, 16]);
    for &cluster in result.clusters.ids() {
        let districts = result.clusters.members(cluster).iter()
            .map(|&z| if z <= 4 { 1 } else { 2 })
            .collect::<BTreeSet<_>>();
        assert_eq!(districts.len(), 1, "cluster {cluster} spans districts");
    }
}

#[test]
fn pinned_groups_count_toward_their_district_allocation() {
    let coords = (0..8).map(|i| (i as f64, 0.0)).collect::<Vec<_>>();
    let zones = make_zones(&coords, &[1, 1, 1, 1, 2, 2, 2, 2]);
    let graph = make_line_graph(&zones, &[]);

    for n_zones in [4, 8] {
        let params = ZoneAggregatorParams {
            n_zones,
            explicit_groups: vec![ExplicitGroup::Single(1)],
            ..Default::default()
        };
        let result = aggregate_zones_within_districts(
            &zones, Some(&graph), &params, "district", &Default::default(), &rules(), &AggregationOptions::default(),
        ).unwrap();

        assert_total(&result, &zones, n_zones);
        assert_eq!(result.crosswalk.get(1), Some(13));
        assert!(result.clusters.is_pinned(13));
        assert_eq!(result.clusters.members(13), &[1]);
    }
}

#[test]
fn singleton_clusters_reproduce_the_input() {
    let ids = vec![1, 2, 3];
    let columns = ["pop", "hh", "density", "parkarea", "district27"].map(String::from).to_vec();
    let values = ndarray::array![
        [10.0, 4.0, 2.5, 0.0, 3.0],
        [20.0, 0.0, 7.0, 1.0, 5.0],
        [5.0, 2.0, 1.0, 2.0, 3.0],
    ];
    let zones = ZoneTable::new(ids.clone(), columns, values).unwrap();
    let rules = AggregationRules::new()
        .with("pop", AggRule::Sum)
        .with("hh", AggRule::Sum)
        .with("density", AggRule::weighted_mean("hh"))
        .with("parkarea", AggRule::Max)
        .with("district27", AggRule::Mode);
    let options = AggregationOptions { mode_tie_break: ModeTieBreak::Error, bins: Vec::new() };

    let out = aggregate_attributes(&zones, &ids, &rules, &options).unwrap();
    assert_eq!(out.ids(), zones.ids());
    for column in ["pop", "hh", "density", "parkarea", "district27"] {
        assert_eq!(out.column(column).unwrap(), zones.column(column).unwrap(), "column {column}");
    }
}
