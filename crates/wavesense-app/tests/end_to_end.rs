//! Full runtime over a synthetic source: filters applied, predictions made,
//! captures recorded and replayed, hot reload routed.

use std::path::Path;
use std::time::Duration;

use wavesense_app::{App, AppConfig, SourceConfig};
use wavesense_core::ModuleKey;
use wavesense_csi::read_capture;

fn write(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn project(root: &Path) -> AppConfig {
    write(
        &root.join("modules/filters/kalman.toml"),
        "[[module]]\ncapability = \"filter\"\nkind = \"adaptive_kalman\"\nenabled = true\n",
    );
    write(
        &root.join("modules/models/statistics.toml"),
        "[[module]]\ncapability = \"model\"\nkind = \"statistics_mlp\"\n[module.options]\nseed = \"5\"\n",
    );
    write(
        &root.join("modules/plugins/snr.toml"),
        "[[module]]\ncapability = \"plugin\"\nkind = \"snr_monitor\"\n[module.config]\nmin_rows = 16\nrender_every = 5\n",
    );
    write(
        &root.join("modules/plugins/activity.toml"),
        "[[module]]\ncapability = \"plugin\"\nkind = \"activity_reporter\"\n",
    );

    let mut config = AppConfig::default();
    config.modules.root = root.to_path_buf();
    config.store.window = 256;
    config.inference.min_confidence = 0.0;
    config.source = SourceConfig::Synthetic {
        devices: vec!["aa:aa".into(), "bb:bb".into()],
        rate_hz: 100.0,
        subcarriers: 256,
        limit: Some(300),
        seed: Some(1),
    };
    config
}

#[tokio::test(start_paused = true)]
async fn test_synthetic_run_produces_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = project(dir.path());
    config.record_to = Some(dir.path().join("captures/run.jsonl"));

    let app = App::build(config).unwrap();
    assert_eq!(app.load_modules(), 0);
    assert_eq!(app.store().with_pipeline(|p| p.len()), 1);

    let source = app.open_source().await.unwrap();
    let summary = app.run(source, std::future::pending()).await.unwrap();

    assert_eq!(summary.reader.accepted, 300);
    assert_eq!(summary.reader.dropped, 0);
    assert!(summary.predictions >= 2, "only {} predictions", summary.predictions);
    assert!(summary.render_ticks > 0);

    assert_eq!(app.store().devices(), vec!["aa:aa", "bb:bb"]);
    assert_eq!(app.store().selected_device().as_deref(), Some("aa:aa"));
    assert_eq!(app.store().len_of("aa:aa"), Some(150));

    let predictions = app.scheduler().predictions();
    assert!(!predictions.is_empty());
    assert!(predictions.windows(2).all(|w| w[0].ts_to < w[1].ts_to));
    assert!(predictions.iter().all(|p| p.confidence.len() == 5));

    // deactivated on the way out
    assert!(app.filters().is_empty());
    assert!(app.plugins().is_empty());
    assert!(app.store().with_pipeline(|p| p.is_empty()));

    let recorded = read_capture(dir.path().join("captures/run.jsonl")).unwrap();
    assert_eq!(recorded.len(), 300);
}

#[tokio::test(start_paused = true)]
async fn test_replay_of_recording() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("capture.jsonl");

    let mut config = project(dir.path());
    config.record_to = Some(capture.clone());
    let recorder = App::build(config).unwrap();
    recorder.load_modules();
    let source = recorder.open_source().await.unwrap();
    recorder.run(source, std::future::pending()).await.unwrap();

    let mut config = project(dir.path());
    config.source = SourceConfig::Replay {
        path: capture,
        simulate_time: false,
    };
    let replay = App::build(config).unwrap();
    replay.load_modules();
    let source = replay.open_source().await.unwrap();
    let summary = replay.run(source, std::future::pending()).await.unwrap();

    assert_eq!(summary.reader.accepted, 300);
    assert_eq!(replay.store().len_of("bb:bb"), Some(150));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_endless_source() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = project(dir.path());
    config.source = SourceConfig::Synthetic {
        devices: vec!["cc:cc".into()],
        rate_hz: 50.0,
        subcarriers: 256,
        limit: None,
        seed: Some(2),
    };

    let app = App::build(config).unwrap();
    app.load_modules();
    let source = app.open_source().await.unwrap();
    let summary = app
        .run(source, tokio::time::sleep(Duration::from_secs(2)))
        .await
        .unwrap();

    assert!(summary.reader.accepted > 0);
    assert!(app.models().is_empty());
    assert_eq!(
        app.models().selected_key(),
        Some(ModuleKey::new("modules/models/statistics.toml"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_manifest_change_is_picked_up_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = project(dir.path());
    config.modules.poll_interval_ms = 100;
    config.modules.debounce_ms = 0;
    config.source = SourceConfig::Synthetic {
        devices: vec!["dd:dd".into()],
        rate_hz: 50.0,
        subcarriers: 256,
        limit: None,
        seed: Some(3),
    };

    let app = App::build(config).unwrap();
    app.load_modules();
    let source = app.open_source().await.unwrap();

    let added = dir.path().join("modules/filters/zz_average.toml");
    let run = app.run(source, async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        write(
            &added,
            "[[module]]\ncapability = \"filter\"\nkind = \"moving_average\"\nenabled = true\n",
        );
        tokio::time::sleep(Duration::from_millis(1000)).await;
    });
    let summary = run.await.unwrap();

    assert!(summary.changes >= 1);
}
