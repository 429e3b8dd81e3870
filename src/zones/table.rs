use ahash::AHashMap;
use geo::MultiPolygon;
use log::debug;
use ndarray::{concatenate, Array1, Array2, ArrayView1, Axis};
use polars::{frame::DataFrame, prelude::{Column, DataType}};

use crate::{common::column_f64, common::column_i64, error::{Result, RsmError}, geometry::ZoneGeometry};

/// Per-zone numeric attributes, one row per zone.
#[derive(Clone, Debug)]
pub struct ZoneTable {
    ids: Vec<i64>,
    rows: AHashMap<i64, usize>,
    columns: Vec<String>,
    index: AHashMap<String, usize>,
    values: Array2<f64>, // (n, k)
    geometry: Option<ZoneGeometry>,
}

impl ZoneTable {
    /// Construct a table from zone ids, column names and an (n, k) matrix.
    /// Zone ids and column names must be unique.
    pub fn new(ids: Vec<i64>, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != ids.len() || values.ncols() != columns.len() {
            return Err(RsmError::InvalidData(format!(
                "zone table shape ({}, {}) does not match {} ids and {} columns",
                values.nrows(), values.ncols(), ids.len(), columns.len()
            )));
        }

        let mut rows = AHashMap::with_capacity(ids.len());
        for (i, &id) in ids.iter().enumerate() {
            if rows.insert(id, i).is_some() {
                return Err(RsmError::InvalidData(format!("duplicate zone id {id}")));
            }
        }

        let mut index = AHashMap::with_capacity(columns.len());
        for (j, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), j).is_some() {
                return Err(RsmError::InvalidData(format!("duplicate column '{name}'")));
            }
        }

        Ok(Self { ids, rows, columns, index, values, geometry: None })
    }

    /// Attach one polygon per zone, in row order.
    pub fn with_geometry(mut self, polygons: Vec<MultiPolygon<f64>>) -> Result<Self> {
        if polygons.len() != self.ids.len() {
            return Err(RsmError::InvalidData(format!(
                "{} polygons supplied for {} zones", polygons.len(), self.ids.len()
            )));
        }
        self.geometry = Some(ZoneGeometry::new(polygons));
        Ok(self)
    }

    /// Load from a DataFrame keyed by `id_column`. Every other numeric column
    /// becomes an attribute; non-numeric columns are skipped.
    pub fn from_dataframe(df: &DataFrame, id_column: &str) -> Result<Self> {
        let ids = column_i64(df, id_column)?;

        let mut columns = Vec::new();
        let mut data = Vec::new();
        for column in df.get_columns() {
            let name = column.name().as_str();
            if name == id_column { continue }
            if !column.dtype().is_primitive_numeric() && column.dtype() != &DataType::Boolean {
                debug!("skipping non-numeric zone column '{name}' ({:?})", column.dtype());
                continue;
            }
            columns.push(name.to_string());
            data.push(Array1::from(column_f64(df, name)?));
        }

        let views = data.iter().map(|a| a.view().insert_axis(Axis(1))).collect::<Vec<_>>();
        let values = if views.is_empty() { Array2::zeros((ids.len(), 0)) } else {
            concatenate(Axis(1), &views)
                .map_err(|e| RsmError::InvalidData(format!("failed to assemble zone attributes: {e}")))?
        };

        Self::new(ids, columns, values)
    }

    /// Convert to a DataFrame with the zone ids first. Columns whose values
    /// are all whole numbers are written as integers.
    pub fn to_dataframe(&self, id_column: &str) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(Column::new(id_column.into(), self.ids.clone()));
        for (j, name) in self.columns.iter().enumerate() {
            let values = self.values.column(j).to_vec();
            if values.iter().all(|v| v.is_finite() && v.fract() == 0.0) {
                columns.push(Column::new(name.as_str().into(), values.iter().map(|&v| v as i64).collect::<Vec<_>>()));
            } else {
                columns.push(Column::new(name.as_str().into(), values));
            }
        }
        Ok(DataFrame::new(columns)?)
    }

    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    #[inline] pub fn ids(&self) -> &[i64] { &self.ids }

    #[inline] pub fn columns(&self) -> &[String] { &self.columns }

    #[inline] pub fn values(&self) -> &Array2<f64> { &self.values }

    #[inline] pub fn geometry(&self) -> Option<&ZoneGeometry> { self.geometry.as_ref() }

    /// Row position of a zone id.
    #[inline] pub fn row_of(&self, id: i64) -> Option<usize> { self.rows.get(&id).copied() }

    #[inline] pub fn has_column(&self, name: &str) -> bool { self.index.contains_key(name) }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        self.index.get(name)
            .map(|&j| self.values.column(j))
            .ok_or_else(|| RsmError::missing_column(name))
    }

    /// Replace a column if it exists, otherwise append it.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(RsmError::InvalidData(format!(
                "column '{name}' has {} values for {} zones", values.len(), self.len()
            )));
        }
        let values = Array1::from(values);
        match self.index.get(name) {
            Some(&j) => self.values.column_mut(j).assign(&values),
            None => {
                self.values.push_column(values.view())
                    .map_err(|e| RsmError::InvalidData(format!("failed to append column '{name}': {e}")))?;
                self.index.insert(name.to_string(), self.columns.len());
                self.columns.push(name.to_string());
            }
        }
        Ok(())
    }

    /// Subset of rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self> {
        let table = Self::new(
            rows.iter().map(|&r| self.ids[r]).collect(),
            self.columns.clone(),
            self.values.select(Axis(0), rows),
        )?;
        match &self.geometry {
            Some(geometry) => table.with_geometry(rows.iter().map(|&r| geometry.geoms()[r].clone()).collect()),
            None => Ok(table),
        }
    }

    /// Append the rows of `other`, which must have the same columns.
    pub fn vstack(&self, other: &ZoneTable) -> Result<Self> {
        if self.columns != other.columns {
            return Err(RsmError::InvalidData(format!(
                "cannot stack zone tables with different columns: {:?} vs {:?}", self.columns, other.columns
            )));
        }
        let values = concatenate(Axis(0), &[self.values.view(), other.values.view()])
            .map_err(|e| RsmError::InvalidData(format!("failed to stack zone tables: {e}")))?;
        let table = Self::new([self.ids.as_slice(), other.ids.as_slice()].concat(), self.columns.clone(), values)?;

        match (&self.geometry, &other.geometry) {
            (Some(a), Some(b)) => table.with_geometry(a.geoms().iter().chain(b.geoms()).cloned().collect()),
            (None, None) => Ok(table),
            _ => Err(RsmError::InvalidData("cannot stack a zone table with geometry onto one without".into())),
        }
    }

    /// Reorder rows by ascending zone id.
    pub fn sorted_by_id(&self) -> Result<Self> {
        let mut order = (0..self.len()).collect::<Vec<_>>();
        order.sort_by_key(|&r| self.ids[r]);
        self.select_rows(&order)
    }
}
