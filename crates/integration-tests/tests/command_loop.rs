//! End-to-end tests: IntervalLoop driving a real CommandAction
//!
//! These run on the real clock, so timing assertions leave generous slack.
#![cfg(unix)]

use cadence_core::port::log_sink::mocks::RecordingLogSink;
use cadence_core::port::LogLevel;
use cadence_core::{cancel_channel, CancelToken, IntervalLoop, Schedule};
use cadence_infra_system::{CommandAction, CommandSpec};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fresh marker file path unique to this test
fn marker(test_name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "cadence-{}-{}.log",
        test_name,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

fn append_to(path: &PathBuf) -> CommandAction {
    let script = format!("echo run >> '{}'", path.display());
    let spec = CommandSpec::from_argv(vec!["sh".into(), "-c".into(), script]).unwrap();
    CommandAction::new(spec)
}

fn line_count(path: &PathBuf) -> usize {
    std::fs::read_to_string(path)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

fn build(name: &str, schedule: Schedule, action: CommandAction) -> (IntervalLoop, RecordingLogSink) {
    let sink = RecordingLogSink::new();
    let interval_loop =
        IntervalLoop::new(name, schedule, Arc::new(action)).with_log_sink(Arc::new(sink.clone()));
    (interval_loop, sink)
}

#[tokio::test]
async fn test_run_once_executes_command_once() {
    let path = marker("run-once");
    let (interval_loop, sink) = build("once", Schedule::Once, append_to(&path));

    interval_loop.run(CancelToken::never()).await;

    assert_eq!(line_count(&path), 1);
    assert_eq!(
        sink.last(),
        Some((
            LogLevel::Info,
            "[once] Configured to run once, finished.".to_string()
        ))
    );
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_repeats_command_until_cancelled() {
    let path = marker("repeat");
    let (interval_loop, sink) = build(
        "repeat",
        Schedule::every(Duration::from_millis(200)),
        append_to(&path),
    );
    let (source, token) = cancel_channel();

    let handle = interval_loop.spawn(token);
    tokio::time::sleep(Duration::from_millis(700)).await;
    source.cancel();
    handle.await.unwrap();

    let runs = line_count(&path);
    assert!((2..=5).contains(&runs), "expected 2..=5 runs, got {}", runs);
    // A run cut short by the cancel may not have written its line
    let started = sink.count_containing("Starting...");
    assert!(started == runs || started == runs + 1);
    assert!(sink.messages_at(LogLevel::Error).is_empty());
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_failing_command_keeps_looping() {
    let spec = CommandSpec::from_argv(vec!["sh".into(), "-c".into(), "echo broken >&2; exit 1".into()])
        .unwrap();
    let (interval_loop, sink) = build(
        "failing",
        Schedule::every(Duration::from_millis(100)),
        CommandAction::new(spec),
    );
    let (source, token) = cancel_channel();

    let handle = interval_loop.spawn(token);
    tokio::time::sleep(Duration::from_millis(450)).await;
    source.cancel();
    handle.await.unwrap();

    let errors = sink.messages_at(LogLevel::Error);
    assert!(errors.len() >= 2, "expected repeated failures, got {:?}", errors);
    assert!(errors
        .iter()
        .all(|e| e == "[failing] Failed: Process exited with code Some(1): broken"));
}

#[tokio::test]
async fn test_cancel_stops_long_running_command() {
    let spec = CommandSpec::from_argv(vec!["sleep".into(), "30".into()]).unwrap();
    let action = CommandAction::new(spec).with_kill_grace(Duration::from_secs(2));
    let (interval_loop, sink) = build("sleeper", Schedule::every(Duration::from_secs(60)), action);
    let (source, token) = cancel_channel();

    let started = Instant::now();
    let handle = interval_loop.spawn(token);
    tokio::time::sleep(Duration::from_millis(200)).await;
    source.cancel();
    handle.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(sink.count_containing("Cancelled during execution."), 1);
    assert_eq!(sink.count_containing("Starting..."), 1);
    assert!(sink.messages_at(LogLevel::Error).is_empty());
}
