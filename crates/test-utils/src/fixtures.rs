//! Common test fixtures for the crop ensemble tests.
//!
//! The fixtures describe one consistent small world: a 3 x 4 km raster
//! south-west of Berlin (see [`crate::generators::BERLIN_3X4`]), winter
//! wheat phenology clusters and climate cells around it, and soil profiles
//! for the soil ids used in the generated soil layer.

/// Sim, site and crop templates.
pub mod templates {
    pub const SIM_JSON: &str = r#"{
    "debug?": false,
    "climate.csv-options": {
        "no-of-climate-file-header-lines": 2,
        "csv-separator": ",",
        "start-date": "1971-01-01",
        "end-date": "2099-12-31"
    },
    "output": {
        "write-file?": false,
        "events": ["crop", [["Crop", "FIRST"], ["Year", "LAST"], ["Yield", "LAST"]]]
    },
    "UseSecondaryYields": true,
    "NitrogenResponseOn": true,
    "WaterDeficitResponseOn": true,
    "EmergenceMoistureControlOn": false,
    "EmergenceFloodingControlOn": false
}"#;

    pub const SITE_JSON: &str = r#"{
    "SiteParameters": {
        "Latitude": 52.8,
        "slope": 0,
        "heightNN": [0, "m"],
        "NDeposition": [30, "kg N ha-1 y-1"]
    },
    "EnvironmentParameters": {
        "LeachingDepth": [2.0, "m"],
        "WindSpeedHeight": [2, "m"]
    },
    "SoilMoistureParameters": {"CriticalMoistureDepth": 0.3},
    "SoilTemperatureParameters": {"NTau": 0.65}
}"#;

    pub const CROP_JSON: &str = r#"{
    "CropParameters": {"StomataConductanceAlpha": 40},
    "cropRotationTemplates": {
        "WW": [{
            "worksteps": [
                {
                    "type": "Sowing",
                    "date": "0000-10-01",
                    "crop": {
                        "is-winter-crop": true,
                        "cropParams": {
                            "species": {"SpeciesName": "wheat", "FieldConditionModifier": 1.0},
                            "cultivar": {
                                "CultivarName": "winter wheat",
                                "StageTemperatureSum": [[148, 284, 380, 180, 600, 25], "°C d"]
                            }
                        }
                    }
                },
                {"type": "NMinFertilization", "days": 60},
                {"type": "AutomaticHarvest", "latest-date": "0001-09-05", "min-%-asw": 0}
            ]
        }],
        "SM": [{
            "worksteps": [
                {"type": "Sowing", "date": "0000-04-20"},
                {"type": "Harvest", "date": "0000-09-25"}
            ]
        }]
    },
    "cropRotation": ["ref", "cropRotationTemplates", "WW"]
}"#;
}

/// Setup tables.
pub mod setups {
    /// Setup 1 uses every site toggle. Setup 2 adds the land-use filter
    /// with automatic dates. Setup 7 runs a UHOH scenario with history.
    pub const SETUPS_YAML: &str = r#"setups:
  - id: 1
    crop_id: WW
    gcm: MPI-M-MPI-ESM-LR
    rcm: CLMcom-CCLM4-8-17
    scenario: rcp85
    ensmem: r1i1p1
    version: v1
    climate_path_to_latlon_file: dwd
    climate_path_to_csvs: dwd/csvs
    sowing_policy: fixed
    harvest_policy: auto
    elevation: true
    slope: true
    latitude: true
    groundwater_level: true
    impenetrable_layer: true
    fertilization: true
    co2: 450
  - id: 2
    crop_id: WW
    gcm: MPI-M-MPI-ESM-LR
    rcm: CLMcom-CCLM4-8-17
    scenario: rcp45
    ensmem: r1i1p1
    version: v1
    climate_path_to_latlon_file: dwd
    climate_path_to_csvs: dwd/csvs
    sowing_policy: auto
    harvest_policy: auto
    landcover: true
  - id: 7
    crop_id: WW
    gcm: ICHEC-EC-EARTH
    rcm: UHOH-WRF361H
    scenario: rcp85
    ensmem: r12i1p1
    version: v1
    incl_hist: true
    climate_path_to_latlon_file: dwd
    climate_path_to_csvs: dwd/csvs
    sowing_policy: fixed1
    harvest_policy: fixed
    stage_temperature_sum: "150_290_390_190_610_30"
"#;
}

/// Phenology tables as exported per crop.
pub mod phenology {
    /// Winter wheat clusters. Cluster 1 sits at 52.45 N, 13.3 E. The last
    /// row lacks harvest days and is skipped by the loader.
    pub const WINTER_WHEAT_TABLE: &str = "\
CLUSTER_ID,lat,lon,crop,winter_crop,n,sowing_doy,sd,earliest_sowing_doy,latest_sowing_doy,n2,harvest_doy,hd,earliest_harvest_doy,latest_harvest_doy
1,52.45,13.3,WW,1,42,275.0,6.1,265,290,40,210.0,5.2,200,220
2,52.3,13.0,WW,1,38,280.0,5.8,270,295,35,215.0,4.9,205,225
3,51.0,10.0,WW,1,51,270.0,7.0,160,285,47,205.0,6.3,195,215
4,50.0,8.0,WW,1,3,,,,,,,,,
";
}

/// Climate grid indices.
pub mod climate {
    /// `[[lat, lon], [row, col]]` as found in `latlon-to-rowcol.json`.
    pub const LATLON_TO_ROWCOL_JSON: &str =
        "[[[52.45, 13.3], [10, 20]], [[52.3, 13.0], [11, 19]], [[51.0, 10.0], [40, 5]]]";

    /// `[[row, col], [lat, lon]]` for replayed climate files.
    pub const ROWCOL_TO_LATLON_JSON: &str =
        "[[[10, 20], [52.45, 13.3]], [[11, 19], [52.3, 13.0]]]";
}

/// Soil profile database contents.
pub mod soil {
    /// Layer depths are the lower boundary of each layer in cm. Sand, clay
    /// and skeleton are percentages.
    pub const SCHEMA_SQL: &str = "\
CREATE TABLE soil_profile (
    id INTEGER NOT NULL,
    layer_depth INTEGER NOT NULL,
    soil_organic_carbon REAL,
    KA5_texture_class TEXT,
    sand REAL,
    clay REAL,
    ph REAL,
    bulk_density REAL,
    sceleton REAL,
    is_in_groundwater INTEGER,
    is_impenetrable INTEGER
)";

    /// Soil 1001 is a plain loam, 1002 reaches groundwater in its second
    /// layer and is impenetrable below, 1003 has no rows at all.
    pub const ROWS_SQL: &str = "\
INSERT INTO soil_profile VALUES
    (1001, 30, 1.2, 'Ls3', 45.0, 18.0, 6.5, 1450.0, 2.0, 0, 0),
    (1001, 60, 0.6, 'Ls3', 47.0, 19.0, 6.6, 1520.0, 2.0, 0, 0),
    (1001, 200, 0.2, 'Lts', 40.0, 25.0, 6.8, 1600.0, 5.0, 0, 0),
    (1002, 40, 2.0, 'Su2', 80.0, 4.0, 5.9, 1350.0, 0.0, 0, 0),
    (1002, 90, 0.8, 'Su2', 82.0, 4.0, 6.0, 1500.0, 0.0, 1, 0),
    (1002, 150, 0.1, 'Ss', 90.0, 2.0, 6.1, 1650.0, 10.0, 1, 1)";

    pub const SOIL_IDS: [i64; 3] = [1001, 1002, 1003];
}

/// Result messages as workers send them back.
pub mod results {
    /// A grid-keyed result with a plain and a layer range output.
    pub const GRID_RESULT_JSON: &str = r#"{
    "customId": {"setup_id": 1, "crow": 10, "ccol": 20, "soil_id": 1001, "env_id": 0, "nodata": false},
    "errors": [],
    "data": [
        {
            "origSpec": "\"crop\"",
            "outputIds": [
                {"name": "Year", "displayName": "", "unit": "", "fromLayer": -1, "toLayer": -1},
                {"name": "Yield", "displayName": "", "unit": "kg ha-1", "fromLayer": -1, "toLayer": -1},
                {"name": "Mois", "displayName": "", "unit": "m3 m-3", "fromLayer": 0, "toLayer": 2}
            ],
            "results": [
                {"Year": 1972, "Yield": 7012.5, "Mois": [0.21, 0.24, 0.3]},
                {"Year": 1973, "Yield": 6874.0, "Mois": [0.2, 0.23, 0.29]}
            ]
        },
        {
            "origSpec": "\"yearly\"",
            "outputIds": [{"name": "Precip", "displayName": "", "unit": "mm", "fromLayer": -1, "toLayer": -1}],
            "results": []
        }
    ]
}"#;

    /// A worker failure report.
    pub const FAILED_RESULT_JSON: &str = r#"{
    "customId": {"setup_id": 1, "crow": 11, "ccol": 19, "soil_id": 1002, "env_id": 1, "nodata": false},
    "errors": ["Could not open climate file"],
    "data": []
}"#;
}
