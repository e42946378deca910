//! The environment job sent to simulation workers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sim_common::{CorrelationKey, Setup};
use tracing::debug;

use crate::climate::ClimateRef;
use crate::error::{EnvironmentError, Result};
use crate::template::{
    CropParameters, CropTemplate, CsvOptions, CultivationMethod, EnvironmentParameters,
    SimTemplate, SimulationParameters, SiteParameters, SiteTemplate, Workstep,
};
use phenology::{Resolution, WorkstepDates};

/// One job. Nodata jobs carry only the correlation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentJob {
    #[serde(rename = "customId")]
    pub custom_id: CorrelationKey,
    #[serde(flatten)]
    pub body: Option<JobBody>,
}

impl EnvironmentJob {
    /// A job that tells workers no simulation is possible for this cell.
    pub fn nodata(key: CorrelationKey) -> Self {
        Self {
            custom_id: key.into_nodata(),
            body: None,
        }
    }

    pub fn is_nodata(&self) -> bool {
        self.custom_id.nodata
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Model parameter trees of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Params {
    pub user_crop_parameters: CropParameters,
    pub user_environment_parameters: EnvironmentParameters,
    pub simulation_parameters: SimulationParameters,
    pub site_parameters: SiteParameters,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Everything in a job except the correlation key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub params: Params,
    #[serde(rename = "cropRotation")]
    pub crop_rotation: Vec<CultivationMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Value>,
    #[serde(rename = "csvViaHeaderOptions")]
    pub csv_via_header_options: CsvOptions,
    #[serde(rename = "pathToClimateCSV")]
    pub path_to_climate_csv: ClimateRef,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobBody {
    /// Compose the per-setup job template.
    ///
    /// Applies the setup's simulation period, RCP scenario, vernalisation
    /// fix and leaf expansion switch, and selects the crop rotation of the
    /// setup's crop.
    pub fn compose(
        setup: &Setup,
        sim: &SimTemplate,
        site: &SiteTemplate,
        crop: &CropTemplate,
    ) -> Result<Self> {
        let mut csv_options = sim.climate_csv_options.clone();
        if let Some(start) = setup.start_date.as_ref().filter(|s| !s.is_empty()) {
            csv_options.start_date = Some(start.clone());
        }
        if let Some(end) = setup.end_date.as_ref().filter(|s| !s.is_empty()) {
            csv_options.end_date = Some(end.clone());
        }

        let mut environment_parameters = site.environment_parameters.clone();
        if setup.is_rcp_scenario() {
            environment_parameters.rcp = Some(setup.scenario.clone());
        }

        let mut crop_parameters = crop.crop_parameters.clone();
        crop_parameters.enable_vernalisation_factor_fix = Some(setup.use_vernalisation_fix);
        crop_parameters.enable_t_response_leaf_expansion = Some(setup.leaf_extension_modifier);

        let crop_rotation = crop
            .crop_rotation_templates
            .get(&setup.crop_id)
            .cloned()
            .ok_or_else(|| EnvironmentError::MissingCropRotation(setup.crop_id.clone()))?;

        // Remaining site sections become the model's user parameter sets
        let params_extra = site
            .extra
            .iter()
            .map(|(key, value)| (format!("user{}", key), value.clone()))
            .collect();

        let mut extra = Map::new();
        if let Some(debug_mode) = sim.parameters.extra.get("debug?") {
            extra.insert("debugMode".to_string(), debug_mode.clone());
        }

        debug!(
            setup_id = setup.id,
            crop_id = %setup.crop_id,
            worksteps = crop_rotation.first().map_or(0, |cm| cm.worksteps.len()),
            "Composed job template"
        );

        Ok(Self {
            kind: "Env".to_string(),
            params: Params {
                user_crop_parameters: crop_parameters,
                user_environment_parameters: environment_parameters,
                simulation_parameters: sim.parameters.clone(),
                site_parameters: site.site_parameters.clone(),
                extra: params_extra,
            },
            crop_rotation,
            events: sim.output.as_ref().and_then(|o| o.events.clone()),
            csv_via_header_options: csv_options,
            path_to_climate_csv: ClimateRef::default(),
            extra,
        })
    }

    fn worksteps(&self) -> &[Workstep] {
        self.crop_rotation
            .first()
            .map(|cm| cm.worksteps.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn worksteps_mut(&mut self) -> Option<&mut Vec<Workstep>> {
        self.crop_rotation.first_mut().map(|cm| &mut cm.worksteps)
    }

    /// Dates of the first sowing and harvest worksteps.
    pub fn phenology_dates(&self) -> Resolution {
        let dates = |ws: Option<&Workstep>| {
            ws.map(|ws| WorkstepDates {
                date: ws.date.clone(),
                earliest_date: ws.earliest_date.clone(),
                latest_date: ws.latest_date.clone(),
            })
            .unwrap_or_default()
        };
        Resolution {
            sowing: dates(self.worksteps().iter().find(|ws| ws.is_sowing())),
            harvest: dates(self.worksteps().iter().find(|ws| ws.is_harvest())),
        }
    }

    /// Write resolved dates into the first sowing and harvest worksteps.
    pub fn set_phenology_dates(&mut self, resolution: &Resolution) {
        let Some(worksteps) = self.worksteps_mut() else {
            return;
        };
        if let Some(ws) = worksteps.iter_mut().find(|ws| ws.is_sowing()) {
            apply_dates(ws, &resolution.sowing);
        }
        if let Some(ws) = worksteps.iter_mut().find(|ws| ws.is_harvest()) {
            apply_dates(ws, &resolution.harvest);
        }
    }
}

fn apply_dates(ws: &mut Workstep, dates: &WorkstepDates) {
    ws.date = dates.date.clone();
    ws.earliest_date = dates.earliest_date.clone();
    ws.latest_date = dates.latest_date.clone();
}
