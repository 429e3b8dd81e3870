//! Fine zones, their aggregation into clusters, and the cluster attribute table.

mod aggregate;
mod cluster;
mod districts;
mod table;

pub use aggregate::{aggregate_attributes, anchor_weights, mode, weighted_mean, AggRule, AggregationOptions, AggregationRules, BinRule, ModeTieBreak};
pub use cluster::{aggregate_zones, ClusterTable, ExplicitGroup, ZoneAggregation, ZoneAggregatorParams};
pub use districts::{aggregate_zones_within_districts, allocate_zones};
pub use table::ZoneTable;
