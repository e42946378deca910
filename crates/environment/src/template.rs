//! Typed sim, site and crop templates.
//!
//! Only the keys the producer reads or writes are named fields. Everything
//! else is kept in a flattened `extra` map and passed through to the job
//! untouched.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sim_common::{Quantity, SoilProfile};

use crate::error::{EnvironmentError, Result};

/// Read a JSON template file.
pub fn load_template<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| EnvironmentError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| EnvironmentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// sim.json
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimTemplate {
    #[serde(rename = "climate.csv-options")]
    pub climate_csv_options: CsvOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputSettings>,
    #[serde(flatten)]
    pub parameters: SimulationParameters,
}

/// How workers read the climate CSV files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvOptions {
    #[serde(rename = "start-date", default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(rename = "end-date", default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    #[serde(rename = "UseNMinMineralFertilisingMethod", default, skip_serializing_if = "Option::is_none")]
    pub use_nmin_mineral_fertilising_method: Option<bool>,
    #[serde(rename = "UseAutomaticIrrigation", default, skip_serializing_if = "Option::is_none")]
    pub use_automatic_irrigation: Option<bool>,
    #[serde(rename = "NitrogenResponseOn", default, skip_serializing_if = "Option::is_none")]
    pub nitrogen_response_on: Option<bool>,
    #[serde(rename = "WaterDeficitResponseOn", default, skip_serializing_if = "Option::is_none")]
    pub water_deficit_response_on: Option<bool>,
    #[serde(rename = "EmergenceMoistureControlOn", default, skip_serializing_if = "Option::is_none")]
    pub emergence_moisture_control_on: Option<bool>,
    #[serde(rename = "EmergenceFloodingControlOn", default, skip_serializing_if = "Option::is_none")]
    pub emergence_flooding_control_on: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// site.json
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteTemplate {
    #[serde(rename = "SiteParameters")]
    pub site_parameters: SiteParameters,
    #[serde(rename = "EnvironmentParameters")]
    pub environment_parameters: EnvironmentParameters,
    /// Soil moisture, temperature, transport and organic parameter sets
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteParameters {
    #[serde(rename = "Latitude", default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(rename = "heightNN", default, skip_serializing_if = "Option::is_none")]
    pub height_nn: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope: Option<f64>,
    #[serde(rename = "ImpenetrableLayerDepth", default, skip_serializing_if = "Option::is_none")]
    pub impenetrable_layer_depth: Option<Quantity>,
    #[serde(rename = "SoilProfileParameters", default, skip_serializing_if = "Option::is_none")]
    pub soil_profile_parameters: Option<SoilProfile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rcp: Option<String>,
    #[serde(rename = "AtmosphericCO2", default, skip_serializing_if = "Option::is_none")]
    pub atmospheric_co2: Option<f64>,
    #[serde(rename = "AtmosphericO3", default, skip_serializing_if = "Option::is_none")]
    pub atmospheric_o3: Option<f64>,
    #[serde(rename = "LeachingDepth", default, skip_serializing_if = "Option::is_none")]
    pub leaching_depth: Option<Quantity>,
    #[serde(rename = "MinGroundwaterDepthMonth", default, skip_serializing_if = "Option::is_none")]
    pub min_groundwater_depth_month: Option<u32>,
    #[serde(rename = "MinGroundwaterDepth", default, skip_serializing_if = "Option::is_none")]
    pub min_groundwater_depth: Option<Quantity>,
    #[serde(rename = "MaxGroundwaterDepth", default, skip_serializing_if = "Option::is_none")]
    pub max_groundwater_depth: Option<Quantity>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// crop.json
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropTemplate {
    #[serde(rename = "CropParameters")]
    pub crop_parameters: CropParameters,
    /// Rotation per crop id
    #[serde(rename = "cropRotationTemplates")]
    pub crop_rotation_templates: BTreeMap<String, Vec<CultivationMethod>>,
    /// Reference into the rotation templates, replaced per setup
    #[serde(rename = "cropRotation", default, skip_serializing_if = "Option::is_none")]
    pub crop_rotation: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CropParameters {
    #[serde(rename = "__enable_vernalisation_factor_fix__", default, skip_serializing_if = "Option::is_none")]
    pub enable_vernalisation_factor_fix: Option<bool>,
    #[serde(rename = "__enable_T_response_leaf_expansion__", default, skip_serializing_if = "Option::is_none")]
    pub enable_t_response_leaf_expansion: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CultivationMethod {
    #[serde(default)]
    pub worksteps: Vec<Workstep>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workstep {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "earliest-date", default, skip_serializing_if = "Option::is_none")]
    pub earliest_date: Option<String>,
    #[serde(rename = "latest-date", default, skip_serializing_if = "Option::is_none")]
    pub latest_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Workstep {
    /// `Sowing` or `AutomaticSowing`.
    pub fn is_sowing(&self) -> bool {
        self.kind.ends_with("Sowing")
    }

    /// `Harvest` or `AutomaticHarvest`.
    pub fn is_harvest(&self) -> bool {
        self.kind.ends_with("Harvest")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CropSpec {
    #[serde(rename = "cropParams", default, skip_serializing_if = "Option::is_none")]
    pub crop_params: Option<CropParams>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CropParams {
    #[serde(default)]
    pub species: Species,
    #[serde(default)]
    pub cultivar: Cultivar,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Species {
    #[serde(rename = "FieldConditionModifier", default, skip_serializing_if = "Option::is_none")]
    pub field_condition_modifier: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cultivar {
    #[serde(rename = "StageTemperatureSum", default, skip_serializing_if = "Option::is_none")]
    pub stage_temperature_sum: Option<StageTemperatureSum>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Temperature sums per development stage, optionally with a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageTemperatureSum {
    WithUnit(Vec<f64>, String),
    Plain(Vec<f64>),
}

impl StageTemperatureSum {
    pub fn sums(&self) -> &[f64] {
        match self {
            StageTemperatureSum::WithUnit(sums, _) | StageTemperatureSum::Plain(sums) => sums,
        }
    }

    /// Same unit, new sums.
    pub fn with_sums(&self, sums: Vec<f64>) -> Self {
        match self {
            StageTemperatureSum::WithUnit(_, unit) => {
                StageTemperatureSum::WithUnit(sums, unit.clone())
            }
            StageTemperatureSum::Plain(_) => StageTemperatureSum::Plain(sums),
        }
    }
}
