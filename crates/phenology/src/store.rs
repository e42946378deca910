//! Seed/harvest tables and nearest-cluster interpolation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use projection::Projection;
use sim_common::{Coordinate, NearestIndex};
use tracing::{debug, info};

use crate::error::{PhenologyError, Result};
use crate::record::PhenologyRecord;

/// Phenology records of one crop, indexed by cluster.
#[derive(Debug, Clone)]
pub struct PhenologyStore {
    crop_id: String,
    records: HashMap<i64, PhenologyRecord>,
    index: NearestIndex<i64>,
}

impl PhenologyStore {
    /// Path of the seed/harvest table for a crop below `data_dir`.
    pub fn path_for(data_dir: impl AsRef<Path>, crop_id: &str) -> PathBuf {
        data_dir
            .as_ref()
            .join(format!("ILR_SEED_HARVEST_doys_{}.csv", crop_id))
    }

    /// Load a crop's table, projecting cluster positions with `projection`.
    pub fn load<P: Projection + ?Sized>(
        path: impl AsRef<Path>,
        crop_id: &str,
        projection: &P,
    ) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| PhenologyError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::parse(&content, crop_id, projection)?;
        info!(
            crop_id = crop_id,
            clusters = store.len(),
            path = %path.display(),
            "Loaded phenology records"
        );
        Ok(store)
    }

    /// Parse table text. The first line is a header.
    pub fn parse<P: Projection + ?Sized>(
        content: &str,
        crop_id: &str,
        projection: &P,
    ) -> Result<Self> {
        let mut records = HashMap::new();
        let mut points = Vec::new();
        let mut skipped = 0usize;

        for (idx, line) in content.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            let Some(record) = PhenologyRecord::from_fields(&fields, idx + 1, crop_id)? else {
                skipped += 1;
                continue;
            };

            let coord = projection.forward(record.position)?;
            points.push((coord, record.cluster_id));
            records.insert(record.cluster_id, record);
        }

        if skipped > 0 {
            debug!(crop_id = crop_id, skipped = skipped, "Skipped incomplete phenology rows");
        }

        Ok(Self {
            crop_id: crop_id.to_string(),
            records,
            index: NearestIndex::build(points),
        })
    }

    pub fn crop_id(&self) -> &str {
        &self.crop_id
    }

    /// Cluster nearest to a projected coordinate.
    pub fn nearest_cluster(&self, coord: &Coordinate) -> Option<i64> {
        self.index.nearest(coord).copied()
    }

    pub fn record(&self, cluster_id: i64) -> Option<&PhenologyRecord> {
        self.records.get(&cluster_id)
    }

    /// Record of the cluster nearest to `coord`.
    pub fn record_at(&self, coord: &Coordinate) -> Option<&PhenologyRecord> {
        self.nearest_cluster(coord)
            .and_then(|cluster_id| self.record(cluster_id))
    }

    /// Number of distinct clusters.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
