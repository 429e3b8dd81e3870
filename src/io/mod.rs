//! Format-specific reading and writing.
//!
//! - `csv` - tabular inputs and outputs (zones, crosswalks, households, trips, matrices)
//! - `shp` - zone polygons from ESRI shapefiles

pub mod csv;
pub mod shp;
