use std::{collections::HashMap, path::Path};

use anyhow::{anyhow, Context, Result};
use log::info;
use rsm::{
    aggregate_zones, aggregate_zones_within_districts,
    common::require_files,
    graph::Graph,
    io::{csv::{read_adjacency_pairs, read_csv, write_csv}, shp::read_zone_polygons},
    Crosswalk, ZoneTable,
};

use super::{load_config, output_path};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::AggregateArgs) -> Result<()> {
    let config = load_config(cli)?;
    let out_dir = &args.output.clone().unwrap_or(".".into());

    let mut inputs = vec![args.zones.clone()];
    inputs.extend(args.shapes.clone());
    inputs.extend(args.adjacency.clone());
    inputs.extend(args.fine_shapes.clone());
    require_files(&inputs)?;

    let clusters_path = output_path(cli, out_dir, "cluster_zones.csv")?;
    let crosswalk_path = output_path(cli, out_dir, "cluster_crosswalk.csv")?;
    let fine_crosswalk_path = match &args.fine_shapes {
        Some(_) => Some(output_path(cli, out_dir, "fine_crosswalk.csv")?),
        None => None,
    };

    let zones_cfg = &config.zones;
    info!("[aggregate] loading zones from {}", args.zones.display());
    let df = read_csv(&args.zones).with_context(|| format!("reading {}", args.zones.display()))?;
    let mut zones = ZoneTable::from_dataframe(&df, &zones_cfg.id_column)?;

    if let Some(shapes) = &args.shapes {
        zones = attach_shapes(zones, shapes, &zones_cfg.shape_id_field)?;
    }

    let adjacency = match &args.adjacency {
        Some(path) => {
            let pairs = read_adjacency_pairs(path).with_context(|| format!("reading {}", path.display()))?;
            Some(Graph::from_id_pairs(zones.ids(), &pairs)?)
        }
        None => None,
    };

    let mut params = zones_cfg.aggregator_params();
    if let Some(n_zones) = args.n_zones { params.n_zones = n_zones }

    let rules = config.aggregation.rules();
    let options = &config.aggregation.options;
    let result = match &zones_cfg.district_column {
        Some(column) => aggregate_zones_within_districts(
            &zones, adjacency.as_ref(), &params, column, &zones_cfg.district_focus()?, &rules, options,
        )?,
        None => aggregate_zones(&zones, adjacency.as_ref(), &params, &rules, options)?,
    };

    info!("[aggregate] writing {} clusters to {}", result.clusters.len(), clusters_path.display());
    write_csv(&mut result.clusters.to_dataframe()?, &clusters_path)?;
    result.crosswalk.write_csv(&crosswalk_path, &zones_cfg.id_column)?;

    if let (Some(fine_shapes), Some(path)) = (&args.fine_shapes, &fine_crosswalk_path) {
        let clusters = &result.clusters.table;
        let geometry = clusters.geometry()
            .ok_or_else(|| anyhow!("clusters have no geometry to locate fine zones in"))?;
        let (fine_ids, fine): (Vec<_>, Vec<_>) = read_zone_polygons(fine_shapes, &args.fine_id_field)
            .with_context(|| format!("reading {}", fine_shapes.display()))?
            .into_iter()
            .unzip();

        let fine_crosswalk = Crosswalk::by_containment(clusters.ids(), geometry, &fine_ids, &fine)?;
        info!("[aggregate] writing {} fine zone mappings to {}", fine_crosswalk.len(), path.display());
        fine_crosswalk.write_csv(path, &args.fine_id_field.to_lowercase())?;
    }

    Ok(())
}

/// Attach shapefile polygons to the zones, matched by id.
fn attach_shapes(zones: ZoneTable, path: &Path, id_field: &str) -> Result<ZoneTable> {
    let mut polygons = read_zone_polygons(path, id_field)
        .with_context(|| format!("reading {}", path.display()))?
        .into_iter()
        .collect::<HashMap<_, _>>();

    let ordered = zones.ids().iter()
        .map(|id| polygons.remove(id).ok_or_else(|| anyhow!("zone {id} has no polygon in {}", path.display())))
        .collect::<Result<Vec<_>>>()?;
    Ok(zones.with_geometry(ordered)?)
}
