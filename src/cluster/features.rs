use ndarray::{Array2, Axis};

use crate::{error::{Result, RsmError}, zones::ZoneTable};

/// What goes into each zone's clustering feature vector.
#[derive(Clone, Debug, Default)]
pub struct FeatureSpec {
    /// Scale applied to centroid coordinates; `None` leaves them out.
    pub use_xy: Option<f64>,
    /// Numeric columns with their weights.
    pub factors: Vec<(String, f64)>,
    /// Categorical columns, one-hot encoded and weighted.
    pub onehot: Vec<(String, f64)>,
}

/// Centroid (x, y) of every zone, from geometry or else from `centroid_x` /
/// `centroid_y` columns.
pub fn zone_coordinates(table: &ZoneTable) -> Result<Vec<(f64, f64)>> {
    if let Some(geometry) = table.geometry() {
        return table.ids().iter().zip(geometry.centroids())
            .map(|(id, c)| c.ok_or_else(|| RsmError::Geometry(format!("zone {id} has an empty geometry"))))
            .collect();
    }
    if table.has_column("centroid_x") && table.has_column("centroid_y") {
        let (x, y) = (table.column("centroid_x")?, table.column("centroid_y")?);
        return Ok(x.iter().copied().zip(y.iter().copied()).collect());
    }
    Err(RsmError::Config("coordinates requested but zones have neither geometry nor centroid_x/centroid_y".into()))
}

/// Build the (n, d) feature matrix for every row of `table`.
pub fn build_features(table: &ZoneTable, spec: &FeatureSpec) -> Result<Array2<f64>> {
    let mut blocks: Vec<Array2<f64>> = Vec::new();

    if let Some(scale) = spec.use_xy {
        let coords = zone_coordinates(table)?;
        let mut block = Array2::zeros((table.len(), 2));
        for (i, (x, y)) in coords.into_iter().enumerate() {
            block[[i, 0]] = x * scale;
            block[[i, 1]] = y * scale;
        }
        blocks.push(block);
    }

    for (column, weight) in &spec.factors {
        let values = table.column(column)?;
        blocks.push((&values * *weight).insert_axis(Axis(1)));
    }

    for (column, weight) in &spec.onehot {
        let values = table.column(column)?;
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted.dedup_by(|a, b| a.to_bits() == b.to_bits());

        let mut block = Array2::zeros((table.len(), sorted.len()));
        for (i, v) in values.iter().enumerate() {
            if let Some(j) = sorted.iter().position(|c| c.to_bits() == v.to_bits()) {
                block[[i, j]] = *weight;
            }
        }
        blocks.push(block);
    }

    if blocks.is_empty() {
        return Err(RsmError::Config("no clustering features: enable use_xy or give cluster factors".into()));
    }
    let views = blocks.iter().map(|b| b.view()).collect::<Vec<_>>();
    ndarray::concatenate(Axis(1), &views)
        .map_err(|e| RsmError::InvalidData(format!("failed to assemble features: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn make_test_table() -> ZoneTable {
        ZoneTable::new(
            vec![1, 2, 3],
            ["centroid_x", "centroid_y", "pop", "district"].map(String::from).to_vec(),
            array![[0.0, 10.0, 5.0, 7.0], [2.0, 12.0, 1.0, 3.0], [4.0, 14.0, 0.0, 7.0]],
        ).unwrap()
    }

    #[test]
    fn features_stack_xy_factors_and_onehot() {
        let spec = FeatureSpec {
            use_xy: Some(0.5),
            factors: vec![("pop".into(), 2.0)],
            onehot: vec![("district".into(), 10.0)],
        };
        let features = build_features(&make_test_table(), &spec).unwrap();
        assert_eq!(features, array![
            [0.0, 5.0, 10.0, 0.0, 10.0],
            [1.0, 6.0, 2.0, 10.0, 0.0],
            [2.0, 7.0, 0.0, 0.0, 10.0],
        ]);
    }

    #[test]
    fn empty_spec_is_rejected() {
        assert!(matches!(build_features(&make_test_table(), &FeatureSpec::default()), Err(RsmError::Config(_))));
    }
}
