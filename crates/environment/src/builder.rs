//! Per-cell environment job construction.

use phenology::Resolution;
use sim_common::{CorrelationKey, Quantity, Setup, SoilProfile};
use tracing::warn;

use crate::climate::ClimateRef;
use crate::job::{EnvironmentJob, JobBody};
use crate::template::CropParams;

/// Month in which the groundwater table is at its highest.
const MIN_GROUNDWATER_DEPTH_MONTH: u32 = 3;

/// Half the seasonal groundwater amplitude, in meters.
const GROUNDWATER_AMPLITUDE: f64 = 0.2;

/// Builds one [`EnvironmentJob`] from the per-setup [`JobBody`] and the
/// values looked up for a cell.
///
/// The template is never modified; [`build`](Self::build) works on a copy.
///
/// ```ignore
/// let job = EnvironmentBuilder::new(&setup, &template)
///     .soil_profile(profile)
///     .elevation(Some(34.0))
///     .slope(Some(1.5))
///     .latitude(Some(52.45))
///     .phenology(dates)
///     .climate(ClimateRef::Files(paths))
///     .build(key);
/// ```
#[derive(Debug)]
pub struct EnvironmentBuilder<'a> {
    setup: &'a Setup,
    template: &'a JobBody,
    soil_profile: Option<SoilProfile>,
    elevation: Option<f64>,
    slope: Option<f64>,
    latitude: Option<f64>,
    phenology: Option<Resolution>,
    climate: Option<ClimateRef>,
}

impl<'a> EnvironmentBuilder<'a> {
    pub fn new(setup: &'a Setup, template: &'a JobBody) -> Self {
        Self {
            setup,
            template,
            soil_profile: None,
            elevation: None,
            slope: None,
            latitude: None,
            phenology: None,
            climate: None,
        }
    }

    pub fn soil_profile(mut self, profile: SoilProfile) -> Self {
        self.soil_profile = Some(profile);
        self
    }

    /// Height above sea level in meters.
    pub fn elevation(mut self, elevation: Option<f64>) -> Self {
        self.elevation = elevation;
        self
    }

    /// Slope in percent.
    pub fn slope(mut self, slope: Option<f64>) -> Self {
        self.slope = slope;
        self
    }

    pub fn latitude(mut self, latitude: Option<f64>) -> Self {
        self.latitude = latitude;
        self
    }

    /// Resolved sowing and harvest dates.
    pub fn phenology(mut self, dates: Resolution) -> Self {
        self.phenology = Some(dates);
        self
    }

    pub fn climate(mut self, climate: ClimateRef) -> Self {
        self.climate = Some(climate);
        self
    }

    pub fn build(self, key: CorrelationKey) -> EnvironmentJob {
        let setup = self.setup;
        let mut body = self.template.clone();

        if let Some(profile) = &self.soil_profile {
            if setup.groundwater_level {
                let gw = profile.groundwater_depth();
                let env = &mut body.params.user_environment_parameters;
                env.min_groundwater_depth_month = Some(MIN_GROUNDWATER_DEPTH_MONTH);
                env.min_groundwater_depth =
                    Some(Quantity::meters((gw - GROUNDWATER_AMPLITUDE).max(0.0)));
                env.max_groundwater_depth = Some(Quantity::meters(gw + GROUNDWATER_AMPLITUDE));
            }

            if setup.impenetrable_layer {
                let depth = profile.impenetrable_depth().or_else(|| {
                    body.params
                        .user_environment_parameters
                        .leaching_depth
                        .as_ref()
                        .map(Quantity::value)
                });
                match depth {
                    Some(depth) => {
                        body.params.user_environment_parameters.leaching_depth =
                            Some(Quantity::meters(depth));
                        body.params.site_parameters.impenetrable_layer_depth =
                            Some(Quantity::meters(depth));
                    }
                    None => warn!(
                        setup_id = setup.id,
                        env_id = key.env_id,
                        "No impenetrable layer and no LeachingDepth in template"
                    ),
                }
            }

            body.params.site_parameters.soil_profile_parameters = Some(profile.clone());
        }

        let site = &mut body.params.site_parameters;
        if setup.elevation {
            if let Some(height) = self.elevation {
                site.height_nn = Some(Quantity::Plain(height));
            }
        }
        if setup.slope {
            if let Some(slope) = self.slope {
                site.slope = Some(slope / 100.0);
            }
        }
        if setup.latitude {
            if let Some(lat) = self.latitude {
                site.latitude = Some(lat);
            }
        }

        let env = &mut body.params.user_environment_parameters;
        if let Some(co2) = setup.co2 {
            env.atmospheric_co2 = Some(co2);
        }
        if let Some(o3) = setup.o3 {
            env.atmospheric_o3 = Some(o3);
        }

        apply_crop_overrides(setup, &mut body, key.env_id);

        let sim = &mut body.params.simulation_parameters;
        sim.use_nmin_mineral_fertilising_method = Some(setup.fertilization);
        sim.use_automatic_irrigation = Some(setup.irrigation);
        sim.nitrogen_response_on = Some(setup.nitrogen_response_on);
        sim.water_deficit_response_on = Some(setup.water_deficit_response_on);
        sim.emergence_moisture_control_on = Some(setup.emergence_moisture_control_on);
        sim.emergence_flooding_control_on = Some(setup.emergence_flooding_control_on);

        if let Some(dates) = &self.phenology {
            body.set_phenology_dates(dates);
        }
        if let Some(climate) = self.climate {
            body.path_to_climate_csv = climate;
        }

        EnvironmentJob {
            custom_id: key,
            body: Some(body),
        }
    }
}

/// Crop parameters of the first workstep, where overrides are applied.
fn first_crop_params(body: &mut JobBody) -> Option<&mut CropParams> {
    body.worksteps_mut()?
        .first_mut()?
        .crop
        .as_mut()?
        .crop_params
        .as_mut()
}

fn apply_crop_overrides(setup: &Setup, body: &mut JobBody, env_id: u64) {
    let sums = match setup.stage_temperature_sums() {
        Ok(sums) => sums,
        Err(e) => {
            warn!(setup_id = setup.id, error = %e, "Ignoring stage temperature sums");
            None
        }
    };
    if setup.field_condition_modifier.is_none() && sums.is_none() {
        return;
    }

    let Some(params) = first_crop_params(body) else {
        warn!(
            setup_id = setup.id,
            env_id, "First workstep has no crop parameters, overrides not applied"
        );
        return;
    };

    if let Some(modifier) = setup.field_condition_modifier {
        params.species.field_condition_modifier = Some(modifier);
    }

    if let Some(sums) = sums {
        let replaced = match &params.cultivar.stage_temperature_sum {
            Some(current) if current.sums().len() == sums.len() => {
                Some(current.with_sums(sums.into_iter().map(|s| s as f64).collect()))
            }
            Some(current) => {
                warn!(
                    setup_id = setup.id,
                    expected = current.sums().len(),
                    got = sums.len(),
                    "StageTemperatureSum length mismatch, keeping template values"
                );
                None
            }
            None => {
                warn!(
                    setup_id = setup.id,
                    "Template has no StageTemperatureSum to override"
                );
                None
            }
        };
        if replaced.is_some() {
            params.cultivar.stage_temperature_sum = replaced;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{CropTemplate, SimTemplate, SiteTemplate, StageTemperatureSum};
    use phenology::WorkstepDates;
    use sim_common::{SetupTable, SoilLayer, SpatialId};

    const SIM: &str = r#"{
        "climate.csv-options": {"start-date": "1991-01-01", "end-date": "2019-12-31"},
        "UseAutomaticIrrigation": true
    }"#;

    const SITE: &str = r#"{
        "SiteParameters": {"Latitude": 50.0, "slope": 0.0, "heightNN": 0},
        "EnvironmentParameters": {"LeachingDepth": [2.0, "m"]}
    }"#;

    const CROP: &str = r#"{
        "CropParameters": {},
        "cropRotationTemplates": {
            "WW": [{"worksteps": [
                {"type": "Sowing", "date": "0000-10-01",
                 "crop": {"cropParams": {
                     "species": {"FieldConditionModifier": 1.0},
                     "cultivar": {"StageTemperatureSum": [[148, 284, 380], "°C d"]}
                 }}},
                {"type": "AutomaticHarvest", "latest-date": "0001-08-15"}
            ]}]
        }
    }"#;

    fn setup(extra: &str) -> Setup {
        let yaml = format!(
            "setups:\n  - id: 3\n    crop_id: WW\n    sowing_policy: fixed\n    harvest_policy: auto\n{}",
            extra
        );
        SetupTable::from_yaml_str(&yaml)
            .unwrap()
            .get(3)
            .unwrap()
            .clone()
    }

    fn template(setup: &Setup) -> JobBody {
        let sim: SimTemplate = serde_json::from_str(SIM).unwrap();
        let site: SiteTemplate = serde_json::from_str(SITE).unwrap();
        let crop: CropTemplate = serde_json::from_str(CROP).unwrap();
        JobBody::compose(setup, &sim, &site, &crop).unwrap()
    }

    fn key() -> CorrelationKey {
        CorrelationKey::new(3, SpatialId::Grid { row: 7, col: 9 }, Some(1001), 0)
    }

    fn profile(gw_layer: Option<usize>, imp_layer: Option<usize>) -> SoilProfile {
        let mut layers = vec![
            SoilLayer::with_thickness(0.3),
            SoilLayer::with_thickness(0.4),
            SoilLayer::with_thickness(1.3),
        ];
        if let Some(i) = gw_layer {
            layers[i].is_in_groundwater = true;
        }
        if let Some(i) = imp_layer {
            layers[i].is_impenetrable = true;
        }
        SoilProfile::new(layers)
    }

    #[test]
    fn test_groundwater_from_profile() {
        let setup = setup("    groundwater_level: true\n");
        let body = template(&setup);
        let job = EnvironmentBuilder::new(&setup, &body)
            .soil_profile(profile(Some(1), None))
            .build(key());
        let env = &job.body.unwrap().params.user_environment_parameters;
        assert_eq!(env.min_groundwater_depth_month, Some(3));
        let min = env.min_groundwater_depth.as_ref().unwrap().value();
        let max = env.max_groundwater_depth.as_ref().unwrap().value();
        assert!((min - 0.1).abs() < 1e-9);
        assert!((max - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_groundwater_default_and_clamped() {
        let setup = setup("    groundwater_level: true\n");
        let body = template(&setup);

        let job = EnvironmentBuilder::new(&setup, &body)
            .soil_profile(profile(None, None))
            .build(key());
        let env = job.body.unwrap().params.user_environment_parameters;
        assert_eq!(env.min_groundwater_depth, Some(Quantity::meters(19.8)));
        assert_eq!(env.max_groundwater_depth, Some(Quantity::meters(20.2)));

        let job = EnvironmentBuilder::new(&setup, &body)
            .soil_profile(profile(Some(0), None))
            .build(key());
        let env = job.body.unwrap().params.user_environment_parameters;
        assert_eq!(env.min_groundwater_depth, Some(Quantity::meters(0.0)));
    }

    #[test]
    fn test_impenetrable_layer() {
        let setup = setup("    impenetrable_layer: true\n");
        let body = template(&setup);

        let job = EnvironmentBuilder::new(&setup, &body)
            .soil_profile(profile(None, Some(2)))
            .build(key());
        let params = job.body.unwrap().params;
        let depth = params.site_parameters.impenetrable_layer_depth.unwrap().value();
        assert!((depth - 0.7).abs() < 1e-9);
        assert_eq!(
            params.user_environment_parameters.leaching_depth.unwrap().value(),
            depth
        );

        // No flagged layer: the template's leaching depth
        let job = EnvironmentBuilder::new(&setup, &body)
            .soil_profile(profile(None, None))
            .build(key());
        let params = job.body.unwrap().params;
        assert_eq!(
            params.site_parameters.impenetrable_layer_depth,
            Some(Quantity::meters(2.0))
        );
    }

    #[test]
    fn test_terrain_only_when_toggled() {
        let off = setup("");
        let body = template(&off);
        let job = EnvironmentBuilder::new(&off, &body)
            .elevation(Some(87.0))
            .slope(Some(4.0))
            .latitude(Some(52.45))
            .build(key());
        let site = job.body.unwrap().params.site_parameters;
        assert_eq!(site.slope, Some(0.0));
        assert_eq!(site.latitude, Some(50.0));

        let on = setup("    elevation: true\n    slope: true\n    latitude: true\n");
        let body = template(&on);
        let job = EnvironmentBuilder::new(&on, &body)
            .elevation(Some(87.0))
            .slope(Some(4.0))
            .latitude(Some(52.45))
            .build(key());
        let site = job.body.unwrap().params.site_parameters;
        assert_eq!(site.height_nn, Some(Quantity::Plain(87.0)));
        assert_eq!(site.slope, Some(0.04));
        assert_eq!(site.latitude, Some(52.45));
    }

    #[test]
    fn test_missing_terrain_values_keep_template() {
        let on = setup("    slope: true\n    latitude: true\n");
        let body = template(&on);
        let job = EnvironmentBuilder::new(&on, &body).build(key());
        let site = job.body.unwrap().params.site_parameters;
        assert_eq!(site.slope, Some(0.0));
        assert_eq!(site.latitude, Some(50.0));
    }

    #[test]
    fn test_crop_overrides() {
        let setup = setup(
            "    field_condition_modifier: 0.8\n    stage_temperature_sum: \"150_300_400\"\n",
        );
        let body = template(&setup);
        let job = EnvironmentBuilder::new(&setup, &body).build(key());
        let body = job.body.unwrap();
        let params = body.crop_rotation[0].worksteps[0]
            .crop
            .as_ref()
            .unwrap()
            .crop_params
            .as_ref()
            .unwrap();
        assert_eq!(params.species.field_condition_modifier, Some(0.8));
        assert_eq!(
            params.cultivar.stage_temperature_sum,
            Some(StageTemperatureSum::WithUnit(
                vec![150.0, 300.0, 400.0],
                "°C d".to_string()
            ))
        );
    }

    #[test]
    fn test_stage_temperature_sum_length_mismatch_keeps_template() {
        let setup = setup("    stage_temperature_sum: \"150_300\"\n");
        let body = template(&setup);
        let job = EnvironmentBuilder::new(&setup, &body).build(key());
        let body = job.body.unwrap();
        let sums = body.crop_rotation[0].worksteps[0]
            .crop
            .as_ref()
            .and_then(|c| c.crop_params.as_ref())
            .and_then(|p| p.cultivar.stage_temperature_sum.as_ref())
            .unwrap();
        assert_eq!(sums.sums(), &[148.0, 284.0, 380.0]);
    }

    #[test]
    fn test_switches_always_written() {
        let setup = setup("    fertilization: true\n    co2: 450\n");
        let body = template(&setup);
        let job = EnvironmentBuilder::new(&setup, &body).build(key());
        let params = job.body.unwrap().params;
        let sim = &params.simulation_parameters;
        assert_eq!(sim.use_nmin_mineral_fertilising_method, Some(true));
        assert_eq!(sim.use_automatic_irrigation, Some(false));
        assert_eq!(sim.nitrogen_response_on, Some(false));
        assert_eq!(sim.emergence_flooding_control_on, Some(false));
        assert_eq!(params.user_environment_parameters.atmospheric_co2, Some(450.0));
        assert_eq!(params.user_environment_parameters.atmospheric_o3, None);
    }

    #[test]
    fn test_phenology_and_climate_applied() {
        let setup = setup("");
        let body = template(&setup);
        let dates = Resolution {
            sowing: WorkstepDates {
                date: Some("0000-09-28".into()),
                ..Default::default()
            },
            harvest: WorkstepDates {
                latest_date: Some("0001-07-30".into()),
                ..Default::default()
            },
        };
        let job = EnvironmentBuilder::new(&setup, &body)
            .phenology(dates.clone())
            .climate(ClimateRef::File("/replay/a_1_2.csv".into()))
            .build(key());
        assert_eq!(job.custom_id, key());

        let body = job.body.unwrap();
        assert_eq!(body.phenology_dates(), dates);
        assert_eq!(
            body.path_to_climate_csv,
            ClimateRef::File("/replay/a_1_2.csv".into())
        );
        assert_eq!(
            body.csv_via_header_options.start_date.as_deref(),
            Some("1991-01-01")
        );
    }

    #[test]
    fn test_template_left_untouched() {
        let setup = setup("    slope: true\n    groundwater_level: true\n");
        let body = template(&setup);
        let before = body.clone();
        let _ = EnvironmentBuilder::new(&setup, &body)
            .soil_profile(profile(Some(2), None))
            .slope(Some(3.0))
            .build(key());
        assert_eq!(body, before);
    }
}
