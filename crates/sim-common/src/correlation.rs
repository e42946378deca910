//! Correlation keys tying a dispatched job to its result message.
//!
//! Workers echo the key back verbatim as `customId`, so the field names here
//! are part of the wire contract: `setup_id`, `crow`/`ccol` or `clat`/`clon`,
//! `soil_id`, `env_id` and `nodata`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coord::{round2, LatLon};

/// Spatial identity of a job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpatialId {
    /// Row and column in the climate grid
    Grid { row: i64, col: i64 },
    /// Position rounded to two decimals
    LatLon { lat: f64, lon: f64 },
}

impl SpatialId {
    /// A lat/lon identity, rounded to two decimals.
    pub fn lat_lon(position: LatLon) -> Self {
        let rounded = position.rounded();
        SpatialId::LatLon {
            lat: rounded.lat,
            lon: rounded.lon,
        }
    }

    /// Stem of the per-location output file name.
    pub fn file_stem(&self) -> String {
        match self {
            SpatialId::Grid { row, col } => format!("crow-{}_ccol-{}", row, col),
            SpatialId::LatLon { lat, lon } => {
                format!("clat-{}_clon-{}", format_decimal(*lat), format_decimal(*lon))
            }
        }
    }
}

impl fmt::Display for SpatialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}

/// Format a coordinate so whole numbers keep one decimal (`13.0`).
fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Identifier carried by every job and echoed by every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationKey {
    pub setup_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crow: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccol: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_id: Option<i64>,
    pub env_id: u64,
    #[serde(default)]
    pub nodata: bool,
}

impl CorrelationKey {
    /// Key for a job at `spatial`. Lat/lon values are rounded to two decimals.
    pub fn new(setup_id: u32, spatial: SpatialId, soil_id: Option<i64>, env_id: u64) -> Self {
        let (crow, ccol, clat, clon) = match spatial {
            SpatialId::Grid { row, col } => (Some(row), Some(col), None, None),
            SpatialId::LatLon { lat, lon } => (None, None, Some(round2(lat)), Some(round2(lon))),
        };
        Self {
            setup_id,
            crow,
            ccol,
            clat,
            clon,
            soil_id,
            env_id,
            nodata: false,
        }
    }

    /// Mark the key as belonging to a job that cannot be simulated.
    pub fn into_nodata(self) -> Self {
        Self {
            nodata: true,
            ..self
        }
    }

    /// Spatial identity recovered from the key.
    ///
    /// Grid coordinates win when both forms are present.
    pub fn spatial_id(&self) -> Option<SpatialId> {
        match (self.crow, self.ccol, self.clat, self.clon) {
            (Some(row), Some(col), _, _) => Some(SpatialId::Grid { row, col }),
            (_, _, Some(lat), Some(lon)) => Some(SpatialId::LatLon { lat, lon }),
            _ => None,
        }
    }
}
