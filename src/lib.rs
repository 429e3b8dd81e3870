#![doc = "Reduced scale model core: zone aggregation, adaptive household sampling and trip reassembly"]
pub mod assembler;
pub mod cluster;
pub mod common;
pub mod config;
pub mod crosswalk;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod io;
pub mod matrix;
pub mod sampler;
pub mod zones;

#[doc(inline)]
pub use config::RunConfig;

#[doc(inline)]
pub use crosswalk::Crosswalk;

#[doc(inline)]
pub use error::{Result, RsmError};

#[doc(inline)]
pub use matrix::ZoneMatrix;

#[doc(inline)]
pub use zones::{aggregate_zones, aggregate_zones_within_districts, ZoneTable};

#[doc(inline)]
pub use sampler::sample_households;

#[doc(inline)]
pub use assembler::{reassemble, rescale_only};
