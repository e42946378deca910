//! Common types and utilities shared across the crop ensemble crates.
//!
//! Holds the pieces both sides of the job channel agree on:
//! - Simulation setups and the setup table
//! - Raster grids, coordinates and nearest-neighbour lookups
//! - Soil profiles
//! - The correlation key and the result message schema

pub mod config;
pub mod coord;
pub mod correlation;
pub mod error;
pub mod grid;
pub mod message;
pub mod nearest;
pub mod quantity;
pub mod setup;
pub mod soil;
pub mod time;

pub use coord::{Coordinate, LatLon};
pub use correlation::{CorrelationKey, SpatialId};
pub use error::{SimError, SimResult};
pub use grid::{AsciiGrid, GridHeader};
pub use message::{InboundMessage, OutputId, ResultBlock, ResultMessage};
pub use nearest::NearestIndex;
pub use quantity::Quantity;
pub use setup::{HarvestPolicy, Setup, SetupTable, SowingPolicy};
pub use soil::{SoilLayer, SoilProfile};
pub use time::RelativeDate;
