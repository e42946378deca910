//! End-to-end tests of the result collector over the in-process channel.

use ensemble_consumer::{CollectorError, CollectorState, ResultCollector};
use sim_common::{CorrelationKey, ResultMessage, SpatialId};
use storage::result_channel;
use test_utils::fixtures::results::{FAILED_RESULT_JSON, GRID_RESULT_JSON};

fn grid_result() -> ResultMessage {
    serde_json::from_str(GRID_RESULT_JSON).unwrap()
}

fn failed_result() -> ResultMessage {
    serde_json::from_str(FAILED_RESULT_JSON).unwrap()
}

const EXPECTED_GRID_CSV: &str = "crop\n\
Year,Yield,Mois_1,Mois_2,Mois_3\n\
[],[kg ha-1],[m3 m-3],[m3 m-3],[m3 m-3]\n\
1972,7012.5,0.21,0.24,0.3\n\
1973,6874.0,0.2,0.23,0.29\n\
\n\
\n";

#[tokio::test]
async fn test_result_is_written_as_csv() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut source) = result_channel(8);
    tx.send(grid_result()).await.unwrap();
    drop(tx);

    let mut collector = ResultCollector::new(dir.path());
    let stats = collector.run(&mut source).await.unwrap();

    assert_eq!(collector.state(), CollectorState::Done);
    assert_eq!(stats.received, 1);
    assert_eq!(stats.written, 1);

    let text = std::fs::read_to_string(dir.path().join("1").join("crow-10_ccol-20.csv")).unwrap();
    assert_eq!(text, EXPECTED_GRID_CSV);
}

#[tokio::test]
async fn test_failed_result_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut source) = result_channel(8);
    tx.send(failed_result()).await.unwrap();
    drop(tx);

    let mut collector = ResultCollector::new(dir.path());
    let stats = collector.run(&mut source).await.unwrap();

    assert_eq!(stats.received, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.written, 0);
    assert!(!dir.path().join("1").exists());
}

#[tokio::test]
async fn test_lat_lon_result_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut source) = result_channel(8);
    let mut msg = grid_result();
    msg.custom_id = CorrelationKey::new(4, SpatialId::LatLon { lat: 52.45, lon: 13.3 }, Some(1001), 2);
    tx.send(msg).await.unwrap();
    drop(tx);

    let mut collector = ResultCollector::new(dir.path());
    collector.run(&mut source).await.unwrap();

    let path = dir.path().join("4").join("clat-52.45_clon-13.3.csv");
    assert_eq!(std::fs::read_to_string(path).unwrap(), EXPECTED_GRID_CSV);
}

#[tokio::test]
async fn test_mixed_stream_counts() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut source) = result_channel(8);

    let mut second_cell = grid_result();
    second_cell.custom_id.crow = Some(12);
    second_cell.custom_id.env_id = 3;

    let mut nodata = grid_result();
    nodata.custom_id = CorrelationKey::new(1, SpatialId::Grid { row: 10, col: 21 }, Some(1002), 2).into_nodata();
    nodata.data.clear();

    tx.send(grid_result()).await.unwrap();
    tx.send(failed_result()).await.unwrap();
    tx.send(nodata).await.unwrap();
    tx.send(second_cell).await.unwrap();
    drop(tx);

    let mut collector = ResultCollector::new(dir.path());
    let stats = collector.run(&mut source).await.unwrap();

    assert_eq!(stats.received, 4);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.nodata, 1);
    assert_eq!(stats.written, 2);

    let mut files: Vec<String> = std::fs::read_dir(dir.path().join("1"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files, vec!["crow-10_ccol-20.csv", "crow-12_ccol-20.csv"]);
}

#[tokio::test]
async fn test_done_is_sticky() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut source) = result_channel(1);
    drop(tx);

    let mut collector = ResultCollector::new(dir.path());
    let stats = collector.run(&mut source).await.unwrap();
    assert_eq!(stats.received, 0);

    // A second run returns at once
    let stats = collector.run(&mut source).await.unwrap();
    assert_eq!(stats.received, 0);
    assert_eq!(collector.state(), CollectorState::Done);
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_rerun_replaces_location_file() {
    let dir = tempfile::tempdir().unwrap();

    for _ in 0..2 {
        let (tx, mut source) = result_channel(8);
        tx.send(grid_result()).await.unwrap();
        drop(tx);
        ResultCollector::new(dir.path()).run(&mut source).await.unwrap();
    }

    let text = std::fs::read_to_string(dir.path().join("1").join("crow-10_ccol-20.csv")).unwrap();
    assert_eq!(text.lines().filter(|line| *line == "crop").count(), 1);
    assert_eq!(text, EXPECTED_GRID_CSV);
}

#[tokio::test]
async fn test_results_sharing_a_location_are_kept_within_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut source) = result_channel(8);

    let mut other_soil = grid_result();
    other_soil.custom_id.soil_id = Some(1002);
    other_soil.custom_id.env_id = 7;

    tx.send(grid_result()).await.unwrap();
    tx.send(other_soil).await.unwrap();
    drop(tx);

    let stats = ResultCollector::new(dir.path()).run(&mut source).await.unwrap();
    assert_eq!(stats.written, 2);

    let text = std::fs::read_to_string(dir.path().join("1").join("crow-10_ccol-20.csv")).unwrap();
    assert_eq!(text, format!("{}{}", EXPECTED_GRID_CSV, EXPECTED_GRID_CSV));
}

#[tokio::test]
async fn test_output_dir_creation_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("out");
    std::fs::write(&blocker, "not a directory").unwrap();

    let (tx, mut source) = result_channel(8);
    tx.send(grid_result()).await.unwrap();
    tx.send(grid_result()).await.unwrap();
    drop(tx);

    let mut collector = ResultCollector::new(&blocker);
    let err = collector.run(&mut source).await.unwrap_err();

    assert!(matches!(err, CollectorError::CreateDir { .. }));
    assert_eq!(collector.state(), CollectorState::Reading);
    assert_eq!(collector.stats().written, 0);
}
