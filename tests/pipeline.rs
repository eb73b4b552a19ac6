use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use span_bench::dispatch::Dispatcher;
use span_bench::finalize::Finalizer;
use span_bench::prelude::*;
use span_bench::worker::SampleWorker;
use tracing::{Level, Metadata};
use tracing_subscriber::{
    fmt,
    layer::{Context, Filter, SubscriberExt},
    Layer, Registry,
};

struct CustomLevelFilter;
impl<S> Filter<S> for CustomLevelFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        meta.level() == &Level::DEBUG
    }
}

fn init_logger() {
    let format = tracing_subscriber::fmt::format()
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    let reg = Registry::default().with(
        fmt::layer()
            .event_format(format)
            .with_filter(CustomLevelFilter),
    );

    let _ = tracing::subscriber::set_global_default(reg);
}

/// Stub participant answering every request with the same body until the
/// server handle is dropped.
fn spawn_endpoint(body: &'static str) -> (String, Arc<tiny_http::Server>) {
    let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
    let addr = server.server_addr().to_string();
    let handle = Arc::clone(&server);
    std::thread::spawn(move || {
        while let Ok(request) = handle.recv() {
            let _ = request.respond(tiny_http::Response::from_string(body));
        }
    });
    (format!("http://{addr}/"), server)
}

fn write_dataset(dir: &tempfile::TempDir, name: &str, rows: usize) {
    let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
    writeln!(file, "sample;annotation").unwrap();
    for i in 0..rows {
        writeln!(file, "sample number {i};[(0,4,'PER')]").unwrap();
    }
}

fn test_config(dir: &tempfile::TempDir) -> Configuration {
    Configuration::new()
        .with_datasets_dir(dir.path())
        .with_connect_timeout(Duration::from_millis(500))
        .with_read_timeout(Duration::from_millis(1000))
        .with_worker_concurrency(4)
        .with_max_batch_size(3)
}

const PERFECT_BODY: &str = r#"{"spans": [{"start_index": 0, "end_index": 4, "entity": "PER"}]}"#;

#[test]
fn full_run_with_perfect_responder() {
    init_logger();

    let dir = tempfile::tempdir().unwrap();
    write_dataset(&dir, "public.csv", 7);
    let (endpoint, _server) = spawn_endpoint(PERFECT_BODY);

    let store: Arc<dyn RunStore> = Arc::new(MemoryStore::new());
    let team = store.register_team("team-a", &endpoint).unwrap();
    let phase = store.register_phase("public", "public.csv").unwrap();
    let run = store.create_run(team.id, phase.id).unwrap();

    let pipeline = EvaluationPipeline::new(Arc::clone(&store), test_config(&dir));
    let finished = pipeline.execute_run(run.id).unwrap();

    assert_eq!(finished.status, RunStatus::Done);
    assert_eq!(finished.samples_total, 7);
    assert_eq!(finished.samples_processed, 7);
    assert_eq!(finished.samples_success, 7);
    assert_eq!(finished.f1, Some(1.0));
    assert!(finished.avg_latency_ms.unwrap() > 0.0);
    assert!(finished.finished_at.is_some());
}

#[test]
fn failed_calls_still_complete_the_run() {
    init_logger();

    let dir = tempfile::tempdir().unwrap();
    write_dataset(&dir, "public.csv", 4);

    let store: Arc<dyn RunStore> = Arc::new(MemoryStore::new());
    // nothing listens on port 1: every call is a fast transport error
    let team = store.register_team("team-a", "http://127.0.0.1:1/").unwrap();
    let phase = store.register_phase("public", "public.csv").unwrap();
    let run = store.create_run(team.id, phase.id).unwrap();

    let pipeline = EvaluationPipeline::new(Arc::clone(&store), test_config(&dir));
    let finished = pipeline.execute_run(run.id).unwrap();

    assert_eq!(finished.status, RunStatus::Done);
    assert_eq!(finished.samples_processed, 4);
    assert_eq!(finished.samples_success, 0);
    assert_eq!(finished.f1, Some(0.0));
    assert_eq!(finished.avg_latency_ms, None);
}

#[test]
fn leaderboard_reflects_run_quality() {
    init_logger();

    let dir = tempfile::tempdir().unwrap();
    write_dataset(&dir, "public.csv", 3);
    let (good_endpoint, _good) = spawn_endpoint(PERFECT_BODY);
    let (bad_endpoint, _bad) = spawn_endpoint(r#"{"spans": []}"#);

    let store: Arc<dyn RunStore> = Arc::new(MemoryStore::new());
    let phase = store.register_phase("public", "public.csv").unwrap();
    let good = store.register_team("precise", &good_endpoint).unwrap();
    let bad = store.register_team("silent", &bad_endpoint).unwrap();

    let pipeline = EvaluationPipeline::new(Arc::clone(&store), test_config(&dir));
    for team_id in [good.id, bad.id] {
        let run = store.create_run(team_id, phase.id).unwrap();
        let finished = pipeline.execute_run(run.id).unwrap();
        assert_eq!(finished.status, RunStatus::Done);
    }

    let entries = rank(store.as_ref(), phase.id).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].team_name, "precise");
    assert_eq!(entries[0].f1, 1.0);
    assert_eq!(entries[1].team_name, "silent");
    assert_eq!(entries[1].f1, 0.0);
}

#[test]
fn redelivered_batch_counts_each_sample_once() {
    init_logger();

    let dir = tempfile::tempdir().unwrap();
    write_dataset(&dir, "public.csv", 5);
    let (endpoint, _server) = spawn_endpoint(PERFECT_BODY);

    let store: Arc<dyn RunStore> = Arc::new(MemoryStore::new());
    let team = store.register_team("team-a", &endpoint).unwrap();
    let phase = store.register_phase("public", "public.csv").unwrap();
    let run = store.create_run(team.id, phase.id).unwrap();

    let config = test_config(&dir);
    let queue = Arc::new(MemoryQueue::new(10));
    let dispatcher = Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&queue) as Arc<dyn WorkQueue>,
        config.clone(),
    );
    let worker = SampleWorker::new(Arc::clone(&store), &config);

    assert_eq!(dispatcher.dispatch(run.id).unwrap(), 5);
    let batch = queue.pop_batch(10);
    assert_eq!(batch.len(), 5);

    // at-least-once delivery: the whole batch arrives three times
    for _ in 0..3 {
        worker.process_batch(batch.clone());
    }

    let finished = store.run(run.id).unwrap();
    assert_eq!(finished.status, RunStatus::Done);
    assert_eq!(finished.samples_processed, 5);
    assert_eq!(finished.samples_success, 5);
    assert_eq!(store.predictions(run.id).unwrap().len(), 5);
    assert_eq!(finished.f1, Some(1.0));
}

#[test]
fn reaper_reclaims_a_stuck_run_with_partial_credit() {
    init_logger();

    let dir = tempfile::tempdir().unwrap();
    write_dataset(&dir, "public.csv", 6);
    let (endpoint, _server) = spawn_endpoint(PERFECT_BODY);

    let store: Arc<dyn RunStore> = Arc::new(MemoryStore::new());
    let team = store.register_team("team-a", &endpoint).unwrap();
    let phase = store.register_phase("public", "public.csv").unwrap();
    let run = store.create_run(team.id, phase.id).unwrap();

    let config = test_config(&dir).with_run_time_limit(Duration::from_millis(50));
    let queue = Arc::new(MemoryQueue::new(10));
    let dispatcher = Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&queue) as Arc<dyn WorkQueue>,
        config.clone(),
    );
    let worker = SampleWorker::new(Arc::clone(&store), &config);
    let finalizer = Finalizer::new(Arc::clone(&store), &config);

    dispatcher.dispatch(run.id).unwrap();
    // only a third of the messages ever get processed; the rest are lost
    worker.process_batch(queue.pop_batch(2));
    assert_eq!(store.run(run.id).unwrap().status, RunStatus::Running);

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(finalizer.reap().unwrap(), 1);

    let finished = store.run(run.id).unwrap();
    assert_eq!(finished.status, RunStatus::Done);
    assert_eq!(finished.samples_processed, 2);
    assert_eq!(finished.samples_total, 6);
    // scored over the two recorded samples only
    assert_eq!(finished.f1, Some(1.0));
    assert!(finished.avg_latency_ms.is_some());
}

#[test]
fn failed_dispatch_leaves_run_retriable() {
    init_logger();

    let dir = tempfile::tempdir().unwrap();
    // dataset is created only after the first attempt fails
    let (endpoint, _server) = spawn_endpoint(PERFECT_BODY);

    let store: Arc<dyn RunStore> = Arc::new(MemoryStore::new());
    let team = store.register_team("team-a", &endpoint).unwrap();
    let phase = store.register_phase("public", "public.csv").unwrap();
    let run = store.create_run(team.id, phase.id).unwrap();

    let pipeline = EvaluationPipeline::new(Arc::clone(&store), test_config(&dir));
    assert!(pipeline.execute_run(run.id).is_err());

    let reverted = store.run(run.id).unwrap();
    assert_eq!(reverted.status, RunStatus::Queued);
    assert_eq!(reverted.samples_total, 0);

    // second attempt succeeds once the dataset exists
    write_dataset(&dir, "public.csv", 2);
    let finished = pipeline.execute_run(run.id).unwrap();
    assert_eq!(finished.status, RunStatus::Done);
    assert_eq!(finished.samples_total, 2);
}
