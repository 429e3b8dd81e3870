//! Reassembly of resimulated and archived trips.

mod assemble;
mod drift;
mod roster;

pub use assemble::{align_columns, reassemble, remap_zone_columns, repeat_rows, rescale_factor, rescale_only, AssemblyMode, Reassembly, TripTables};
pub use drift::{DriftReport, DriftRow};
pub use roster::{Trip, TripRoster, HH_ID, NUM_PARTICIPANTS, TOUR_ID, TRIP_MODE};
