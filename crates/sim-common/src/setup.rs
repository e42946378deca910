//! Simulation setups.
//!
//! A setup is one row of run configuration: which crop to simulate, under
//! which climate scenario, how sowing and harvest dates are chosen and which
//! site parameters are taken from the input layers. Setups are loaded from a
//! YAML document of the form `setups: [ ... ]` and looked up by id.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{load_yaml, parse_yaml};
use crate::error::{SimError, SimResult};

/// How the sowing date of a crop is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SowingPolicy {
    /// Regionally fixed sowing date from the phenology record
    Fixed,
    /// Automatic sowing inside a regional window
    Auto,
    /// The template's sowing date, the same everywhere
    Fixed1,
}

/// How the harvest date of a crop is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvestPolicy {
    /// Regionally fixed harvest date from the phenology record
    Fixed,
    /// Automatic harvest with a regional latest date
    Auto,
    /// The template's latest harvest date, the same everywhere
    Auto1,
}

impl fmt::Display for SowingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SowingPolicy::Fixed => "fixed",
            SowingPolicy::Auto => "auto",
            SowingPolicy::Fixed1 => "fixed1",
        };
        f.write_str(s)
    }
}

impl fmt::Display for HarvestPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HarvestPolicy::Fixed => "fixed",
            HarvestPolicy::Auto => "auto",
            HarvestPolicy::Auto1 => "auto1",
        };
        f.write_str(s)
    }
}

/// One simulation setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub id: u32,

    /// Crop id, optionally with a `_suffix` naming a variant
    pub crop_id: String,

    // Climate scenario
    #[serde(default)]
    pub gcm: String,
    #[serde(default)]
    pub rcm: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub ensmem: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub incl_hist: bool,
    #[serde(default)]
    pub climate_path_to_latlon_file: String,
    #[serde(default)]
    pub climate_path_to_csvs: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,

    // Phenology
    pub sowing_policy: SowingPolicy,
    pub harvest_policy: HarvestPolicy,

    // Site toggles
    #[serde(default)]
    pub elevation: bool,
    #[serde(default)]
    pub slope: bool,
    #[serde(default)]
    pub latitude: bool,
    #[serde(default)]
    pub landcover: bool,
    #[serde(default)]
    pub groundwater_level: bool,
    #[serde(default)]
    pub impenetrable_layer: bool,

    // Environment
    #[serde(default)]
    pub co2: Option<f64>,
    #[serde(default)]
    pub o3: Option<f64>,

    // Management and model switches
    #[serde(default)]
    pub irrigation: bool,
    #[serde(default)]
    pub fertilization: bool,
    #[serde(default)]
    pub nitrogen_response_on: bool,
    #[serde(default)]
    pub water_deficit_response_on: bool,
    #[serde(default)]
    pub emergence_moisture_control_on: bool,
    #[serde(default)]
    pub emergence_flooding_control_on: bool,
    #[serde(default)]
    pub leaf_extension_modifier: bool,
    #[serde(default)]
    pub use_vernalisation_fix: bool,

    // Crop overrides
    #[serde(default)]
    pub field_condition_modifier: Option<f64>,
    /// `_` separated temperature sums, e.g. `"148_284_380_180_600_25"`
    #[serde(default)]
    pub stage_temperature_sum: Option<String>,

    // Per-setup template overrides
    #[serde(default)]
    pub sim_json: Option<PathBuf>,
    #[serde(default)]
    pub site_json: Option<PathBuf>,
    #[serde(default)]
    pub crop_json: Option<PathBuf>,
}

impl Setup {
    /// Crop id without a variant suffix (`WW_rye` becomes `WW`).
    pub fn crop_id_short(&self) -> &str {
        self.crop_id.split('_').next().unwrap_or(&self.crop_id)
    }

    /// Whether the scenario names an RCP pathway.
    pub fn is_rcp_scenario(&self) -> bool {
        self.scenario
            .get(..3)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("rcp"))
    }

    /// Parsed temperature sum override, if one is set.
    pub fn stage_temperature_sums(&self) -> SimResult<Option<Vec<i64>>> {
        let Some(raw) = self.stage_temperature_sum.as_deref() else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        raw.split('_')
            .map(|part| {
                part.trim().parse::<i64>().map_err(|_| SimError::InvalidSetup {
                    id: self.id,
                    message: format!("bad stage temperature sum '{}'", part),
                })
            })
            .collect::<SimResult<Vec<_>>>()
            .map(Some)
    }

    fn validate(&self) -> SimResult<()> {
        if self.crop_id.trim().is_empty() {
            return Err(SimError::InvalidSetup {
                id: self.id,
                message: "crop_id is empty".to_string(),
            });
        }
        self.stage_temperature_sums()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SetupFile {
    setups: Vec<Setup>,
}

/// All setups of a run, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct SetupTable {
    setups: BTreeMap<u32, Setup>,
}

impl SetupTable {
    /// Load the setup table from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let file: SetupFile = load_yaml(path)?;
        Self::from_setups(file.setups)
    }

    /// Parse the setup table from YAML text.
    pub fn from_yaml_str(content: &str) -> SimResult<Self> {
        let file: SetupFile = parse_yaml(content)?;
        Self::from_setups(file.setups)
    }

    /// Build a table, rejecting duplicate ids and malformed rows.
    pub fn from_setups(setups: Vec<Setup>) -> SimResult<Self> {
        let mut table = BTreeMap::new();
        for setup in setups {
            setup.validate()?;
            let id = setup.id;
            if table.insert(id, setup).is_some() {
                return Err(SimError::InvalidSetup {
                    id,
                    message: "duplicate setup id".to_string(),
                });
            }
        }
        Ok(Self { setups: table })
    }

    pub fn get(&self, id: u32) -> Option<&Setup> {
        self.setups.get(&id)
    }

    /// Setups for the requested ids, in request order.
    ///
    /// Unknown ids are skipped.
    pub fn select(&self, ids: &[u32]) -> Vec<&Setup> {
        ids.iter()
            .filter_map(|id| {
                let setup = self.setups.get(id);
                if setup.is_none() {
                    debug!(setup_id = id, "Setup not in table, skipping");
                }
                setup
            })
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.setups.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.setups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
setups:
  - id: 1
    crop_id: WW_rye
    gcm: MPI-M-MPI-ESM-LR
    rcm: UHOH-WRF361H
    scenario: rcp85
    sowing_policy: fixed
    harvest_policy: auto
    elevation: true
    co2: 400
    stage_temperature_sum: "148_284_380"
  - id: 3
    crop_id: SM
    sowing_policy: fixed1
    harvest_policy: auto1
"#;

    #[test]
    fn test_parse_table() {
        let table = SetupTable::from_yaml_str(TABLE).unwrap();
        assert_eq!(table.len(), 2);

        let setup = table.get(1).unwrap();
        assert_eq!(setup.crop_id_short(), "WW");
        assert_eq!(setup.sowing_policy, SowingPolicy::Fixed);
        assert_eq!(setup.harvest_policy, HarvestPolicy::Auto);
        assert_eq!(setup.co2, Some(400.0));
        assert!(setup.elevation);
        assert!(!setup.slope);
        assert!(setup.is_rcp_scenario());
        assert_eq!(
            setup.stage_temperature_sums().unwrap(),
            Some(vec![148, 284, 380])
        );

        let setup = table.get(3).unwrap();
        assert_eq!(setup.crop_id_short(), "SM");
        assert!(!setup.is_rcp_scenario());
        assert_eq!(setup.stage_temperature_sums().unwrap(), None);
    }

    #[test]
    fn test_select_skips_unknown_ids() {
        let table = SetupTable::from_yaml_str(TABLE).unwrap();
        let ids: Vec<u32> = table.select(&[3, 2, 1]).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let yaml = "setups:\n  - {id: 1, crop_id: WW, sowing_policy: fixed, harvest_policy: fixed}\n  - {id: 1, crop_id: SM, sowing_policy: auto, harvest_policy: auto}\n";
        assert!(matches!(
            SetupTable::from_yaml_str(yaml),
            Err(SimError::InvalidSetup { id: 1, .. })
        ));
    }

    #[test]
    fn test_bad_temperature_sum_rejected() {
        let yaml = "setups:\n  - {id: 4, crop_id: WW, sowing_policy: fixed, harvest_policy: fixed, stage_temperature_sum: '10_x'}\n";
        assert!(SetupTable::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let yaml = "setups:\n  - {id: 5, crop_id: WW, sowing_policy: auto2, harvest_policy: fixed}\n";
        assert!(SetupTable::from_yaml_str(yaml).is_err());
    }
}
