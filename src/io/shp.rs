//! Zone polygons from ESRI shapefiles.

use std::path::Path;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::{dbase::FieldValue, PolygonRing, Reader, Shape};

use crate::error::{Result, RsmError};

/// Read every polygon of a shapefile together with its integer id, taken from
/// the attribute field `id_field` (matched case-insensitively).
pub fn read_zone_polygons(path: &Path, id_field: &str) -> Result<Vec<(i64, MultiPolygon<f64>)>> {
    let mut reader = Reader::from_path(path)
        .map_err(|e| RsmError::Geometry(format!("failed to open shapefile {}: {e}", path.display())))?;

    let mut zones = Vec::new();
    for (row, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item
            .map_err(|e| RsmError::Geometry(format!("error reading shape+record {row}: {e}")))?;

        let value = record.clone().into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(id_field))
            .map(|(_, value)| value)
            .ok_or_else(|| RsmError::missing_column(id_field))?;
        let id = field_as_i64(&value)
            .ok_or_else(|| RsmError::InvalidData(format!("record {row}: field '{id_field}' is not an integer id")))?;

        let geom = match shape {
            Shape::Polygon(p) => rings_to_geo(p.rings().iter().map(|r| ring_coords(r, |q| (q.x, q.y)))),
            Shape::PolygonM(p) => rings_to_geo(p.rings().iter().map(|r| ring_coords(r, |q| (q.x, q.y)))),
            Shape::PolygonZ(p) => rings_to_geo(p.rings().iter().map(|r| ring_coords(r, |q| (q.x, q.y)))),
            other => return Err(RsmError::Geometry(format!(
                "record {row}: expected a polygon, found {:?}", other.shapetype()
            ))),
        };
        zones.push((id, geom));
    }
    Ok(zones)
}

fn field_as_i64(value: &FieldValue) -> Option<i64> {
    match value {
        FieldValue::Numeric(Some(v)) => Some(*v as i64),
        FieldValue::Float(Some(v)) => Some(*v as i64),
        FieldValue::Double(v) => Some(*v as i64),
        FieldValue::Integer(v) => Some(*v as i64),
        FieldValue::Character(Some(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Outer flag and closed coordinates of one ring.
fn ring_coords<P>(ring: &PolygonRing<P>, xy: impl Fn(&P) -> (f64, f64)) -> (bool, Vec<Coord<f64>>) {
    let (outer, points) = match ring {
        PolygonRing::Outer(points) => (true, points),
        PolygonRing::Inner(points) => (false, points),
    };
    let mut coords = points.iter()
        .map(|p| { let (x, y) = xy(p); Coord { x, y } })
        .collect::<Vec<_>>();
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last { coords.push(first) }
    }
    (outer, coords)
}

/// Each outer ring starts a polygon; inner rings attach to the preceding outer ring.
fn rings_to_geo(rings: impl Iterator<Item = (bool, Vec<Coord<f64>>)>) -> MultiPolygon<f64> {
    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for (outer, coords) in rings {
        if outer {
            if let Some(ext) = exterior.take() {
                polygons.push(Polygon::new(ext, std::mem::take(&mut holes)));
            }
            exterior = Some(LineString(coords));
        } else {
            holes.push(LineString(coords));
        }
    }
    if let Some(ext) = exterior {
        polygons.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polygons)
}
