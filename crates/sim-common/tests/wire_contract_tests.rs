//! Contract tests for the data shared between producer and consumer.

use sim_common::{CorrelationKey, LatLon, ResultMessage, SetupTable, SpatialId};

#[test]
fn test_key_survives_worker_echo() {
    let positions = [
        LatLon::new(47.3, 5.9),
        LatLon::new(54.9049, 8.3172),
        LatLon::new(50.0, 10.005),
    ];

    for (env_id, position) in positions.iter().enumerate() {
        let key = CorrelationKey::new(11, SpatialId::lat_lon(*position), Some(42), env_id as u64);
        let job = serde_json::json!({ "customId": key, "params": {} });

        // A worker copies customId into its result unchanged
        let echoed = serde_json::json!({
            "customId": job["customId"].clone(),
            "errors": [],
            "data": []
        });
        let msg: ResultMessage = serde_json::from_value(echoed).unwrap();

        assert_eq!(msg.custom_id.setup_id, 11);
        assert_eq!(msg.custom_id.env_id, env_id as u64);
        match msg.custom_id.spatial_id() {
            Some(SpatialId::LatLon { lat, lon }) => {
                assert!((lat - position.lat).abs() <= 0.005 + 1e-9);
                assert!((lon - position.lon).abs() <= 0.005 + 1e-9);
                assert_eq!(lat, sim_common::coord::round2(lat));
            }
            other => panic!("unexpected spatial id {:?}", other),
        }
    }
}

#[test]
fn test_grid_key_survives_worker_echo() {
    let key = CorrelationKey::new(3, SpatialId::Grid { row: 120, col: 7 }, Some(1001), 55)
        .into_nodata();
    let text = serde_json::to_string(&serde_json::json!({ "customId": key })).unwrap();
    let msg: ResultMessage = serde_json::from_str(&text).unwrap();
    assert_eq!(msg.custom_id, key);
    assert_eq!(msg.custom_id.spatial_id().unwrap().file_stem(), "crow-120_ccol-7");
}

#[test]
fn test_setup_table_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("setups.yaml");
    std::fs::write(
        &path,
        "setups:\n  - id: 1\n    crop_id: ${SIM_COMMON_TEST_CROP:-WW}\n    sowing_policy: auto\n    harvest_policy: fixed\n",
    )
    .unwrap();

    let table = SetupTable::load(&path).unwrap();
    assert_eq!(table.get(1).unwrap().crop_id, "WW");
}
