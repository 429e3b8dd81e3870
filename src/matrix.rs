//! Zone-to-zone demand matrices and their aggregation to clusters.

use std::{collections::BTreeMap, path::Path};

use ahash::AHashMap;
use log::debug;
use ndarray::Array2;
use polars::{frame::DataFrame, prelude::Column};

use crate::{
    common::{column_f64, column_i64, require_column},
    crosswalk::Crosswalk,
    error::{Result, RsmError},
    io::csv::{read_csv, write_csv},
};

pub const ORIGIN: &str = "origin";
pub const DESTINATION: &str = "destination";

/// A set of square matrices ("cores") over one zone list.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneMatrix {
    /// Name of the zone system the rows and columns are keyed by.
    pub mapping: String,
    pub zones: Vec<i64>,
    pub cores: BTreeMap<String, Array2<f64>>,
}

impl ZoneMatrix {
    /// Check that every core is square and sized to `zones`.
    pub fn new(mapping: impl Into<String>, zones: Vec<i64>, cores: BTreeMap<String, Array2<f64>>) -> Result<Self> {
        let n = zones.len();
        if let Some((name, core)) = cores.iter().find(|(_, core)| core.dim() != (n, n)) {
            return Err(RsmError::InvalidData(format!(
                "core '{name}' has shape {:?}, expected {n} x {n}", core.dim()
            )));
        }
        let mut sorted = zones.clone();
        sorted.sort_unstable();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(RsmError::InvalidData("matrix zone list has duplicates".into()));
        }
        Ok(Self { mapping: mapping.into(), zones, cores })
    }

    #[inline] pub fn len(&self) -> usize { self.zones.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.zones.is_empty() }

    pub fn core(&self, name: &str) -> Option<&Array2<f64>> { self.cores.get(name) }

    /// Sum cells into the crosswalk's clusters. The result is indexed by the
    /// sorted distinct cluster ids the zones map to and keeps every core.
    pub fn aggregate(&self, crosswalk: &Crosswalk) -> Result<ZoneMatrix> {
        let clusters = self.zones.iter()
            .map(|&zone| crosswalk.map_zone(zone, &format!("matrix mapping '{}'", self.mapping)))
            .collect::<Result<Vec<_>>>()?;

        let mut zones = clusters.clone();
        zones.sort_unstable();
        zones.dedup();
        let slot = zones.iter().enumerate().map(|(i, &c)| (c, i)).collect::<AHashMap<_, _>>();
        let target = clusters.iter().map(|c| slot[c]).collect::<Vec<_>>();

        let m = zones.len();
        let cores = self.cores.iter().map(|(name, core)| {
            let mut out = Array2::<f64>::zeros((m, m));
            for ((i, j), &value) in core.indexed_iter() {
                out[[target[i], target[j]]] += value;
            }
            (name.clone(), out)
        }).collect();

        debug!("aggregated {} zones to {m} clusters over {} cores", self.len(), self.cores.len());
        Ok(ZoneMatrix { mapping: self.mapping.clone(), zones, cores })
    }

    /// Read long-format rows `origin, destination, <core>...`. Zones are the
    /// sorted union of origins and destinations; absent pairs are zero.
    pub fn from_dataframe(df: &DataFrame, mapping: &str) -> Result<Self> {
        require_column(df, ORIGIN)?;
        require_column(df, DESTINATION)?;
        let origins = column_i64(df, ORIGIN)?;
        let destinations = column_i64(df, DESTINATION)?;

        let mut zones = origins.iter().chain(&destinations).copied().collect::<Vec<_>>();
        zones.sort_unstable();
        zones.dedup();
        let slot = zones.iter().enumerate().map(|(i, &z)| (z, i)).collect::<AHashMap<_, _>>();
        let n = zones.len();

        let mut cores = BTreeMap::new();
        for name in df.get_column_names() {
            let name = name.as_str();
            if name == ORIGIN || name == DESTINATION { continue }
            let mut core = Array2::<f64>::zeros((n, n));
            for ((o, d), value) in origins.iter().zip(&destinations).zip(column_f64(df, name)?) {
                core[[slot[o], slot[d]]] += value;
            }
            cores.insert(name.to_string(), core);
        }
        Self::new(mapping, zones, cores)
    }

    pub fn read_csv(path: &Path, mapping: &str) -> Result<Self> {
        Self::from_dataframe(&read_csv(path)?, mapping)
    }

    /// Every (origin, destination) pair in zone order, one column per core.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let n = self.len();
        let mut columns = vec![
            Column::new(ORIGIN.into(), self.zones.iter().flat_map(|&o| std::iter::repeat_n(o, n)).collect::<Vec<_>>()),
            Column::new(DESTINATION.into(), (0..n).flat_map(|_| self.zones.iter().copied()).collect::<Vec<_>>()),
        ];
        for (name, core) in &self.cores {
            columns.push(Column::new(name.as_str().into(), core.iter().copied().collect::<Vec<_>>()));
        }
        Ok(DataFrame::new(columns)?)
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        write_csv(&mut self.to_dataframe()?, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use polars::df;

    fn demand() -> ZoneMatrix {
        let cores = BTreeMap::from([
            ("sov".to_string(), array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]),
            ("hov".to_string(), Array2::<f64>::ones((3, 3))),
        ]);
        ZoneMatrix::new("zone_number", vec![1, 2, 3], cores).unwrap()
    }

    #[test]
    fn aggregate_sums_blocks() {
        let crosswalk = Crosswalk::from_pairs([(1, 20), (2, 10), (3, 20)]).unwrap();
        let out = demand().aggregate(&crosswalk).unwrap();

        assert_eq!(out.zones, vec![10, 20]);
        assert_eq!(out.core("sov").unwrap(), &array![[5.0, 10.0], [10.0, 20.0]]);
        assert_eq!(out.core("hov").unwrap(), &array![[1.0, 2.0], [2.0, 4.0]]);
        assert_eq!(out.core("sov").unwrap().sum(), demand().core("sov").unwrap().sum());
    }

    #[test]
    fn aggregate_rejects_unmapped_zones() {
        let crosswalk = Crosswalk::from_pairs([(1, 20), (2, 10)]).unwrap();
        assert!(matches!(demand().aggregate(&crosswalk), Err(RsmError::UnmappedZone { zone: 3, .. })));
    }

    #[test]
    fn new_rejects_mismatched_cores() {
        let cores = BTreeMap::from([("sov".to_string(), Array2::<f64>::zeros((2, 3)))]);
        assert!(matches!(ZoneMatrix::new("z", vec![1, 2], cores), Err(RsmError::InvalidData(_))));
    }

    #[test]
    fn long_format_fills_missing_pairs_with_zero() {
        let df = df!("origin" => [1i64, 2], "destination" => [2i64, 3], "trips" => [4.0f64, 5.0]).unwrap();
        let matrix = ZoneMatrix::from_dataframe(&df, "taz").unwrap();
        assert_eq!(matrix.zones, vec![1, 2, 3]);
        assert_eq!(matrix.core("trips").unwrap(), &array![[0.0, 4.0, 0.0], [0.0, 0.0, 5.0], [0.0, 0.0, 0.0]]);

        let back = matrix.to_dataframe().unwrap();
        assert_eq!(back.height(), 9);
        assert_eq!(column_f64(&back, "trips").unwrap()[1], 4.0);
    }
}
