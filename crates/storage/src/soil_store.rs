//! Soil profile lookup backed by SQLite.

use std::path::Path;

use async_trait::async_trait;
use sim_common::{SoilLayer, SoilProfile};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::{Result, StorageError};

/// Source of soil profiles by soil id.
///
/// An unknown id yields an empty profile, not an error.
#[async_trait]
pub trait SoilProfileStore: Send + Sync {
    async fn profile(&self, soil_id: i64) -> Result<SoilProfile>;
}

type LayerRow = (
    i64,            // layer_depth, cm
    Option<f64>,    // soil_organic_carbon, %
    Option<String>, // KA5_texture_class
    Option<f64>,    // sand, %
    Option<f64>,    // clay, %
    Option<f64>,    // ph
    Option<f64>,    // bulk_density, kg m-3
    Option<f64>,    // sceleton, %
    Option<i64>,    // is_in_groundwater
    Option<i64>,    // is_impenetrable
);

const PROFILE_QUERY: &str = "\
    SELECT layer_depth, soil_organic_carbon, KA5_texture_class, sand, clay, ph, \
           bulk_density, sceleton, is_in_groundwater, is_impenetrable \
    FROM soil_profile WHERE id = ? ORDER BY layer_depth";

/// Reads the `soil_profile` table, one row per layer.
pub struct SqliteSoilStore {
    pool: SqlitePool,
}

impl SqliteSoilStore {
    /// Open an existing soil database read-only.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "Opened soil database");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SoilProfileStore for SqliteSoilStore {
    async fn profile(&self, soil_id: i64) -> Result<SoilProfile> {
        let rows: Vec<LayerRow> = sqlx::query_as(PROFILE_QUERY)
            .bind(soil_id)
            .fetch_all(&self.pool)
            .await?;
        profile_from_rows(soil_id, rows)
    }
}

fn percent(value: Option<f64>) -> Option<f64> {
    value.map(|v| v / 100.0)
}

/// Layers from rows ordered by depth. Depths are lower boundaries in cm.
fn profile_from_rows(soil_id: i64, rows: Vec<LayerRow>) -> Result<SoilProfile> {
    let mut layers = Vec::with_capacity(rows.len());
    let mut upper = 0i64;

    for (depth, soc, texture, sand, clay, ph, bulk_density, skeleton, gw, imp) in rows {
        if depth <= upper {
            return Err(StorageError::InvalidProfile {
                soil_id,
                message: format!("layer depth {} cm not below {} cm", depth, upper),
            });
        }
        layers.push(SoilLayer {
            thickness: (depth - upper) as f64 / 100.0,
            texture_class: texture,
            organic_carbon: soc,
            bulk_density,
            sand: percent(sand),
            clay: percent(clay),
            ph,
            skeleton: percent(skeleton),
            is_in_groundwater: gw.unwrap_or(0) != 0,
            is_impenetrable: imp.unwrap_or(0) != 0,
        });
        upper = depth;
    }

    Ok(SoilProfile::new(layers))
}
