//! End-to-end pipeline: scripted engine → session loop → renderer events.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swarmview_core::{EngineNotice, TorrentId};
use swarmview_session::{Session, SessionCommand, SessionConfig, spawn};
use swarmview_telemetry::{LogFormat, LoggingConfig, init_logging};
use swarmview_test_support::{ScriptedEngine, fields};

fn init_test_telemetry() {
    let _ = init_logging(&LoggingConfig {
        level: "info",
        format: LogFormat::Pretty,
    });
}

#[tokio::test(start_paused = true)]
async fn notices_and_commands_drive_the_full_chain() {
    init_test_telemetry();

    let engine = Arc::new(ScriptedEngine::new());
    engine.install(TorrentId(1), fields("alpha"));
    engine.install(TorrentId(2), fields("beta"));

    let mut session = Session::new(engine.clone(), engine.clone(), &SessionConfig::default());
    let splices = Arc::new(Mutex::new(0_usize));
    let item_changes = Arc::new(Mutex::new(0_usize));
    let splice_log = splices.clone();
    let change_log = item_changes.clone();
    session.subscribe(
        move |_| *splice_log.lock().expect("splices") += 1,
        move |_| *change_log.lock().expect("changes") += 1,
    );

    let (handle, join) = spawn(session);

    // let the loop finish its initial load before mutating the engine
    tokio::time::sleep(Duration::from_millis(10)).await;

    engine.install(TorrentId(3), fields("gamma"));
    handle.notify(EngineNotice::TorrentAdded { id: TorrentId(3) });
    handle.command(SessionCommand::SetSortReversed { reversed: true });
    handle.command(SessionCommand::AddTorrentFiles {
        paths: vec![PathBuf::from("/watch/new.torrent")],
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    engine.update(TorrentId(1), |record| record.speed_down_kbps = 256.0);
    handle.notify(EngineNotice::TorrentChanged { id: TorrentId(1) });
    tokio::time::sleep(Duration::from_millis(10)).await;

    handle.notify(EngineNotice::SessionClosing);
    let session = join.await.expect("session loop panicked");

    // reversed name order: gamma, beta, alpha
    assert_eq!(session.visible_count(), 3);
    let order: Vec<TorrentId> = (0..3)
        .map(|position| session.visible_at(position).expect("snapshot").id())
        .collect();
    assert_eq!(order, [TorrentId(3), TorrentId(2), TorrentId(1)]);

    // adapter index agrees with the projection
    for position in 0..session.visible_count() {
        let id = session.adapter().id_at(position).expect("adapted id");
        assert_eq!(session.adapter().position_of(id), Some(position));
    }

    // the watch-dir batch reached the command channel with a tagged request
    let submitted = engine.submitted();
    assert!(
        submitted
            .iter()
            .any(|request| request.method == "torrent-add"),
        "expected a torrent-add submission, got {submitted:?}"
    );

    assert!(*splices.lock().expect("splices") >= 2);
    assert!(*item_changes.lock().expect("changes") >= 1);
}

#[tokio::test(start_paused = true)]
async fn renderer_events_arrive_in_pipeline_order() {
    init_test_telemetry();

    let engine = Arc::new(ScriptedEngine::new());
    let mut session = Session::new(engine.clone(), engine.clone(), &SessionConfig::default());

    let log = Arc::new(Mutex::new(Vec::new()));
    let structural_log = log.clone();
    let item_log = log.clone();
    session.subscribe(
        move |splice| {
            structural_log
                .lock()
                .expect("log")
                .push(format!("splice@{}", splice.position));
        },
        move |position| {
            item_log.lock().expect("log").push(format!("item@{position}"));
        },
    );

    let (handle, join) = spawn(session);
    tokio::time::sleep(Duration::from_millis(10)).await;

    engine.install(TorrentId(7), fields("seven"));
    handle.notify(EngineNotice::TorrentAdded { id: TorrentId(7) });
    tokio::time::sleep(Duration::from_millis(10)).await;

    engine.update(TorrentId(7), |record| {
        record.error_message = "tracker timeout".to_string();
    });
    handle.notify(EngineNotice::TorrentChanged { id: TorrentId(7) });
    tokio::time::sleep(Duration::from_millis(10)).await;

    handle.notify(EngineNotice::SessionClosing);
    let _session = join.await.expect("session loop panicked");

    let events = log.lock().expect("log").clone();
    assert_eq!(events, ["splice@0", "item@0"]);
}
