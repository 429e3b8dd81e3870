use std::{collections::BTreeMap, path::Path};

use geo::MultiPolygon;
use polars::{frame::DataFrame, prelude::Column};

use crate::{
    common::{column_i64, CLUSTER_ID, FINE_ZONE},
    error::{Result, RsmError},
    geometry::ZoneGeometry,
    io::csv::{read_csv, write_csv},
};

/// Zone ids that mean "no zone" in trip tables and pass through unmapped.
pub const SENTINEL_ZONES: [i64; 2] = [-1, 0];

/// Total, single-valued mapping from fine zone id to cluster id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Crosswalk {
    map: BTreeMap<i64, i64>,
}

impl Crosswalk {
    /// Build from (fine zone, cluster) pairs. A fine zone listed twice must
    /// map to the same cluster both times.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (i64, i64)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (zone, cluster) in pairs {
            if let Some(prev) = map.insert(zone, cluster) {
                if prev != cluster {
                    return Err(RsmError::InvalidData(format!(
                        "zone {zone} maps to both cluster {prev} and cluster {cluster}"
                    )));
                }
            }
        }
        Ok(Self { map })
    }

    /// Locate each fine zone's interior point inside the cluster polygons.
    /// `cluster_ids[i]` names `clusters.geoms()[i]`.
    pub fn by_containment(
        cluster_ids: &[i64],
        clusters: &ZoneGeometry,
        fine_ids: &[i64],
        fine: &[MultiPolygon<f64>],
    ) -> Result<Self> {
        if cluster_ids.len() != clusters.len() || fine_ids.len() != fine.len() {
            return Err(RsmError::InvalidData("ids and polygons differ in length".into()));
        }
        let located = clusters.locate(fine)?;
        Self::from_pairs(fine_ids.iter().zip(located).map(|(&zone, c)| (zone, cluster_ids[c])))
    }

    #[inline] pub fn len(&self) -> usize { self.map.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.map.is_empty() }

    #[inline] pub fn get(&self, zone: i64) -> Option<i64> { self.map.get(&zone).copied() }

    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.map.iter().map(|(&z, &c)| (z, c))
    }

    /// Sorted distinct cluster ids.
    pub fn cluster_ids(&self) -> Vec<i64> {
        let mut ids = self.map.values().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Map a zone, failing if it has no entry.
    pub fn map_zone(&self, zone: i64, context: &str) -> Result<i64> {
        self.get(zone).ok_or_else(|| RsmError::UnmappedZone { zone, context: context.to_string() })
    }

    /// Like `map_zone`, but sentinel ids are returned unchanged.
    pub fn map_zone_or_sentinel(&self, zone: i64, context: &str) -> Result<i64> {
        if SENTINEL_ZONES.contains(&zone) { Ok(zone) } else { self.map_zone(zone, context) }
    }

    /// Read from a table with a fine-zone column (`mgra`, `taz`, `zone` or
    /// `fine_zone_id`) and `cluster_id`.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let zone = FINE_ZONE.resolve(df)?;
        let cluster = CLUSTER_ID.resolve(df)?;
        Self::from_pairs(column_i64(df, &zone)?.into_iter().zip(column_i64(df, &cluster)?))
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        Self::from_dataframe(&read_csv(path)?)
    }

    pub fn to_dataframe(&self, zone_column: &str) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            Column::new(zone_column.into(), self.map.keys().copied().collect::<Vec<_>>()),
            Column::new("cluster_id".into(), self.map.values().copied().collect::<Vec<_>>()),
        ])?)
    }

    pub fn write_csv(&self, path: &Path, zone_column: &str) -> Result<()> {
        write_csv(&mut self.to_dataframe(zone_column)?, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::csv::read_csv_string;

    #[test]
    fn conflicting_pairs_are_rejected() {
        assert!(Crosswalk::from_pairs([(1, 10), (1, 10), (2, 10)]).is_ok());
        assert!(matches!(Crosswalk::from_pairs([(1, 10), (1, 11)]), Err(RsmError::InvalidData(_))));
    }

    #[test]
    fn sentinels_pass_through() {
        let xwalk = Crosswalk::from_pairs([(5, 13), (6, 14)]).unwrap();
        assert_eq!(xwalk.map_zone_or_sentinel(-1, "trips").unwrap(), -1);
        assert_eq!(xwalk.map_zone_or_sentinel(0, "trips").unwrap(), 0);
        assert_eq!(xwalk.map_zone_or_sentinel(6, "trips").unwrap(), 14);
        assert!(matches!(xwalk.map_zone(0, "trips"), Err(RsmError::UnmappedZone { zone: 0, .. })));
    }

    #[test]
    fn reads_any_fine_zone_alias() {
        let df = read_csv_string(" TAZ ,Cluster_ID\n1,13\n2,13\n3,14\n").unwrap();
        let xwalk = Crosswalk::from_dataframe(&df).unwrap();
        assert_eq!(xwalk.len(), 3);
        assert_eq!(xwalk.cluster_ids(), vec![13, 14]);
    }

    #[test]
    fn containment_maps_fine_zones_into_clusters() {
        use geo::polygon;
        let square = |x: f64, w: f64| MultiPolygon::new(vec![polygon![
            (x: x, y: 0.0), (x: x + w, y: 0.0), (x: x + w, y: 1.0), (x: x, y: 1.0), (x: x, y: 0.0),
        ]]);
        let clusters = ZoneGeometry::new(vec![square(0.0, 2.0), square(2.0, 2.0)]);
        let fine = (0..4).map(|i| square(i as f64, 1.0)).collect::<Vec<_>>();

        let xwalk = Crosswalk::by_containment(&[13, 14], &clusters, &[101, 102, 103, 104], &fine).unwrap();
        assert_eq!(xwalk.iter().collect::<Vec<_>>(), vec![(101, 13), (102, 13), (103, 14), (104, 14)]);
        assert!(matches!(
            Crosswalk::by_containment(&[13], &clusters, &[101], &fine[..1]),
            Err(RsmError::InvalidData(_))
        ));
    }

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/mgra_crosswalk.csv");
        let xwalk = Crosswalk::from_pairs([(101, 13), (102, 15)]).unwrap();
        xwalk.write_csv(&path, "mgra").unwrap();
        assert_eq!(Crosswalk::read_csv(&path).unwrap(), xwalk);
    }
}
