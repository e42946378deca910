//! Coordinate reference system transformations.
//!
//! Implements map projections from scratch without external dependencies.
//! The raster layers of the crop ensemble live in ETRS89 / UTM zone 32N
//! (EPSG:25832); climate and phenology positions arrive as WGS84 lat/lon.

pub mod utm;

pub use utm::TransverseMercator;

use sim_common::{Coordinate, LatLon};
use thiserror::Error;

/// Errors raised by projections.
#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("Latitude {0} outside the valid range")]
    LatitudeOutOfRange(f64),

    #[error("Coordinate is not finite")]
    NotFinite,
}

pub type Result<T> = std::result::Result<T, ProjectionError>;

/// A map projection between geographic and projected coordinates.
pub trait Projection: Send + Sync {
    /// Project a geographic position to the planar CRS.
    fn forward(&self, position: LatLon) -> Result<Coordinate>;

    /// Recover the geographic position of a planar coordinate.
    fn inverse(&self, coord: Coordinate) -> Result<LatLon>;
}
