//! Climate file references and climate grid lookups.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use projection::Projection;
use serde::{Deserialize, Serialize};
use sim_common::{Coordinate, LatLon, NearestIndex, Setup};

use crate::error::{EnvironmentError, Result};

/// Regional model whose historical run substitutes for rcm families that
/// have none of their own.
pub const HISTORICAL_FALLBACK_RCM: &str = "CLMcom-CCLM4-8-17";

/// Rcm name prefixes that need the fallback historical run.
const FALLBACK_RCM_PREFIXES: [&str; 2] = ["UHO", "SMH"];

/// File name of the lat/lon to row/col table in a climate directory.
pub const LATLON_TO_ROWCOL_FILE: &str = "latlon-to-rowcol.json";

/// Climate input of a job: one file, or several read in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClimateRef {
    File(String),
    Files(Vec<String>),
}

impl Default for ClimateRef {
    fn default() -> Self {
        ClimateRef::Files(Vec::new())
    }
}

/// `<gcm>/<rcm>/<scenario>/<ensmem>/<version>/row-<r>/col-<c>.csv` with
/// empty components collapsed.
pub fn climate_subpath(
    gcm: &str,
    rcm: &str,
    scenario: &str,
    ensmem: &str,
    version: &str,
    row: i64,
    col: i64,
) -> String {
    let mut path = format!(
        "{}/{}/{}/{}/{}/row-{}/col-{}.csv",
        gcm, rcm, scenario, ensmem, version, row, col
    );
    while path.contains("//") {
        path = path.replace("//", "/");
    }
    path
}

/// Climate files for grid cell (row, col) of a setup's scenario.
///
/// With `incl_hist` the historical run precedes the scenario run. For the
/// UHO and SMH rcm families the fallback historical run sits between the two.
pub fn climate_paths(climate_root: &str, setup: &Setup, row: i64, col: i64) -> Vec<String> {
    let full = |rcm: &str, scenario: &str| {
        format!(
            "{}{}/{}",
            climate_root,
            setup.climate_path_to_csvs,
            climate_subpath(
                &setup.gcm,
                rcm,
                scenario,
                &setup.ensmem,
                &setup.version,
                row,
                col
            )
        )
    };

    let mut paths = Vec::with_capacity(3);
    if setup.incl_hist {
        paths.push(full(&setup.rcm, "historical"));
        if FALLBACK_RCM_PREFIXES
            .iter()
            .any(|prefix| setup.rcm.starts_with(prefix))
        {
            paths.push(full(HISTORICAL_FALLBACK_RCM, "historical"));
        }
    }
    paths.push(full(&setup.rcm, &setup.scenario));
    paths
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|source| EnvironmentError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| EnvironmentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Nearest climate grid cell for a projected coordinate.
#[derive(Debug, Clone)]
pub struct ClimateGridIndex {
    index: NearestIndex<(i64, i64)>,
    positions: HashMap<(i64, i64), LatLon>,
}

impl ClimateGridIndex {
    /// Load a `[[lat, lon], [row, col]]` table.
    pub fn load<P: Projection + ?Sized>(path: impl AsRef<Path>, projection: &P) -> Result<Self> {
        let entries: Vec<((f64, f64), (i64, i64))> = read_json(path.as_ref())?;
        Self::from_entries(entries, projection)
    }

    pub fn from_entries<P: Projection + ?Sized>(
        entries: Vec<((f64, f64), (i64, i64))>,
        projection: &P,
    ) -> Result<Self> {
        let mut points = Vec::with_capacity(entries.len());
        let mut positions = HashMap::with_capacity(entries.len());
        for ((lat, lon), cell) in entries {
            let position = LatLon::new(lat, lon);
            points.push((projection.forward(position)?, cell));
            positions.insert(cell, position);
        }
        Ok(Self {
            index: NearestIndex::build(points),
            positions,
        })
    }

    /// Climate (row, col) closest to `coord`.
    pub fn nearest_cell(&self, coord: &Coordinate) -> Option<(i64, i64)> {
        self.index.nearest(coord).copied()
    }

    /// Position of a climate cell.
    pub fn position(&self, row: i64, col: i64) -> Option<LatLon> {
        self.positions.get(&(row, col)).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Climate (row, col) to position, from a `[[row, col], [lat, lon]]` table.
#[derive(Debug, Clone, Default)]
pub struct RowColIndex {
    positions: HashMap<(i64, i64), LatLon>,
}

impl RowColIndex {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let entries: Vec<((i64, i64), (f64, f64))> = read_json(path.as_ref())?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<((i64, i64), (f64, f64))>) -> Self {
        let positions = entries
            .into_iter()
            .map(|(cell, (lat, lon))| (cell, LatLon::new(lat, lon)))
            .collect();
        Self { positions }
    }

    pub fn get(&self, row: i64, col: i64) -> Option<LatLon> {
        self.positions.get(&(row, col)).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projection::TransverseMercator;
    use sim_common::{HarvestPolicy, SowingPolicy};

    fn setup(rcm: &str, incl_hist: bool) -> Setup {
        let yaml = format!(
            "setups:\n  - id: 1\n    crop_id: WW\n    gcm: MPI-M-MPI-ESM-LR\n    rcm: {}\n    scenario: rcp85\n    ensmem: r1i1p1\n    version: v1\n    incl_hist: {}\n    climate_path_to_csvs: dwd/csvs\n    sowing_policy: fixed\n    harvest_policy: fixed\n",
            rcm, incl_hist
        );
        let table = sim_common::SetupTable::from_yaml_str(&yaml).unwrap();
        let setup = table.get(1).unwrap().clone();
        assert_eq!(setup.sowing_policy, SowingPolicy::Fixed);
        assert_eq!(setup.harvest_policy, HarvestPolicy::Fixed);
        setup
    }

    #[test]
    fn test_subpath_collapses_empty_components() {
        assert_eq!(
            climate_subpath("", "", "", "", "", 3, 4),
            "/row-3/col-4.csv"
        );
        assert_eq!(
            climate_subpath("GERICS", "", "historical", "", "v1", 10, 20),
            "GERICS/historical/v1/row-10/col-20.csv"
        );
    }

    #[test]
    fn test_scenario_only() {
        let paths = climate_paths("/monica_data/climate-data/", &setup("CLMcom-CCLM4-8-17", false), 5, 6);
        assert_eq!(
            paths,
            vec!["/monica_data/climate-data/dwd/csvs/MPI-M-MPI-ESM-LR/CLMcom-CCLM4-8-17/rcp85/r1i1p1/v1/row-5/col-6.csv"]
        );
    }

    #[test]
    fn test_historical_prepended() {
        let paths = climate_paths("/c/", &setup("GERICS-REMO2015", true), 1, 2);
        assert_eq!(paths.len(), 2);
        assert!(paths[0].contains("/GERICS-REMO2015/historical/"));
        assert!(paths[1].contains("/GERICS-REMO2015/rcp85/"));
    }

    #[test]
    fn test_fallback_historical_for_uho_and_smh() {
        for rcm in ["UHOH-WRF361H", "SMHI-RCA4"] {
            let paths = climate_paths("/c/", &setup(rcm, true), 1, 2);
            assert_eq!(paths.len(), 3);
            assert!(paths[0].contains(&format!("/{}/historical/", rcm)));
            assert!(paths[1].contains("/CLMcom-CCLM4-8-17/historical/"));
            assert!(paths[2].contains(&format!("/{}/rcp85/", rcm)));
        }
    }

    #[test]
    fn test_climate_grid_index() {
        let tm = TransverseMercator::etrs89_utm32n();
        let index = ClimateGridIndex::from_entries(
            vec![((52.5, 13.4), (10, 20)), ((48.1, 11.6), (200, 150))],
            &tm,
        )
        .unwrap();
        let near_berlin = tm.forward(LatLon::new(52.4, 13.1)).unwrap();
        assert_eq!(index.nearest_cell(&near_berlin), Some((10, 20)));
        assert_eq!(index.position(200, 150), Some(LatLon::new(48.1, 11.6)));
        assert_eq!(index.position(0, 0), None);
    }

    #[test]
    fn test_rowcol_index_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rowcol-to-latlon.json");
        fs::write(&path, "[[[1, 2], [52.5, 13.4]], [[3, 4], [50.1, 8.7]]]").unwrap();
        let index = RowColIndex::load(&path).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(3, 4), Some(LatLon::new(50.1, 8.7)));
        assert_eq!(index.get(4, 3), None);
    }
}
