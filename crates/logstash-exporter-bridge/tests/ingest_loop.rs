//! Ingestion loop behaviour against scripted queue connections.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use logstash_exporter_bridge::ingest::IngestionLoop;
use logstash_exporter_bridge::obs::{ExporterMetrics, Registry};
use logstash_exporter_bridge::retry::RetryPolicy;
use logstash_exporter_core::error::ExporterError;

use scripted_queue::{capture_logs, captured, message, settle, wait_until, ConnectStep, ScriptedConnector};

fn metrics() -> Arc<ExporterMetrics> {
    Arc::new(ExporterMetrics::new(Arc::new(Registry::new())).unwrap())
}

fn spawn_loop(
    connector: Arc<ScriptedConnector>,
    metrics: Arc<ExporterMetrics>,
) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = watch::channel(false);
    let lp = IngestionLoop::new(connector, metrics, "logstash-prometheus-stats", RetryPolicy::default(), rx);
    (tx, tokio::spawn(lp.run()))
}

async fn stop(tx: watch::Sender<bool>, handle: tokio::task::JoinHandle<()>) {
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop did not stop")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn processes_messages_in_order_and_skips_bad_ones() {
    let connector = ScriptedConnector::new(vec![ConnectStep::Open(vec![
        message(r#"{"host":"web1","type":"access","@timestamp":"2024-01-01T00:00:00Z"}"#),
        message("not valid json"),
        message(r#"{"type":"syslog"}"#),
        Ok(vec!["logstash-prometheus-stats".to_string()]),
        message(r#"{"host":42,"type":"access"}"#),
        message(r#"{"host":"db2","type":"slowlog","@timestamp":"yesterday"}"#),
        message(r#"{"host":"web1","type":"access","@timestamp":"2024-01-01T00:00:05Z"}"#),
    ])]);
    let m = metrics();
    let (tx, handle) = spawn_loop(Arc::clone(&connector), Arc::clone(&m));

    wait_until(|| connector.pops() == 7).await;
    settle().await;

    // last write wins, in queue order
    assert_eq!(m.events_processed.get(&["web1", "access"]), Some(2));
    assert_eq!(m.last_seen_event.get(&["web1", "access"]), Some(1_704_067_205.0));
    assert_eq!(m.parsing_duration.snapshot(&["web1", "access"]).unwrap().count, 2);

    assert_eq!(m.events_processed.get(&["n/a", "syslog"]), Some(1));
    let seen = m.last_seen_event.get(&["n/a", "syslog"]).unwrap();
    assert!((seen - Utc::now().timestamp() as f64).abs() <= 5.0, "last seen {seen}");

    // unparsable timestamp still counts
    assert_eq!(m.events_processed.get(&["db2", "slowlog"]), Some(1));

    // type mismatch and garbage leave no trace
    let body = m.render();
    assert!(!body.contains("host=\"42\""), "{body}");
    assert_eq!(body.matches("logstash_exporter_events_processed_total{").count(), 3, "{body}");

    // malformed replies never force a reconnect
    assert_eq!(connector.attempts(), 1);
    stop(tx, handle).await;
}

#[tokio::test(start_paused = true)]
async fn connect_failures_back_off_and_recover() {
    let connector = ScriptedConnector::new(vec![
        ConnectStep::Fail(ExporterError::Connection("connection refused".into())),
        ConnectStep::Fail(ExporterError::Auth("WRONGPASS".into())),
        ConnectStep::Open(vec![
            Err(ExporterError::reply("LOADING redis is loading the dataset")),
            message(r#"{"host":"web1","type":"access"}"#),
        ]),
    ]);
    let m = metrics();
    let started = tokio::time::Instant::now();
    let (tx, handle) = spawn_loop(Arc::clone(&connector), Arc::clone(&m));

    wait_until(|| m.events_processed.get(&["web1", "access"]) == Some(1)).await;

    // two reconnect waits plus one same-connection retry
    assert!(started.elapsed() >= Duration::from_secs(25), "{:?}", started.elapsed());
    assert_eq!(connector.attempts(), 3);
    assert!(!handle.is_finished());
    stop(tx, handle).await;
}

#[tokio::test(start_paused = true)]
async fn broken_connection_is_rebuilt() {
    let connector = ScriptedConnector::new(vec![
        ConnectStep::Open(vec![
            message(r#"{"host":"a","type":"t"}"#),
            Err(ExporterError::Connection("connection reset by peer".into())),
        ]),
        ConnectStep::Open(vec![message(r#"{"host":"b","type":"t"}"#)]),
    ]);
    let m = metrics();
    let started = tokio::time::Instant::now();
    let (tx, handle) = spawn_loop(Arc::clone(&connector), Arc::clone(&m));

    wait_until(|| m.events_processed.get(&["b", "t"]) == Some(1)).await;

    assert_eq!(m.events_processed.get(&["a", "t"]), Some(1));
    assert_eq!(connector.attempts(), 2);
    assert!(started.elapsed() >= Duration::from_secs(10));
    stop(tx, handle).await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_blocking_pop() {
    let connector = ScriptedConnector::new(vec![ConnectStep::Open(vec![])]);
    let (tx, handle) = spawn_loop(Arc::clone(&connector), metrics());

    wait_until(|| connector.attempts() == 1).await;
    settle().await;
    assert!(!handle.is_finished());
    stop(tx, handle).await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_reconnect_backoff() {
    let connector = ScriptedConnector::new(vec![ConnectStep::Fail(ExporterError::Connection(
        "connection refused".into(),
    ))]);
    let (tx, handle) = spawn_loop(Arc::clone(&connector), metrics());

    wait_until(|| connector.attempts() == 1).await;
    settle().await;
    stop(tx, handle).await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn queue_errors_and_bad_timestamps_are_warned() {
    let (_guard, logs) = capture_logs();
    let connector = ScriptedConnector::new(vec![
        ConnectStep::Fail(ExporterError::Connection("connection refused".into())),
        ConnectStep::Open(vec![message(r#"{"host":"db2","type":"slowlog","@timestamp":"yesterday"}"#)]),
    ]);
    let m = metrics();
    let (tx, handle) = spawn_loop(Arc::clone(&connector), Arc::clone(&m));

    wait_until(|| m.events_processed.get(&["db2", "slowlog"]) == Some(1)).await;
    stop(tx, handle).await;

    let out = captured(&logs);
    let refused = out
        .lines()
        .find(|l| l.contains("queue connection failed"))
        .unwrap_or_else(|| panic!("no connection warning in:\n{out}"));
    assert!(refused.contains("WARN"), "{refused}");
    assert!(refused.contains("connection refused"), "{refused}");

    let fallback = out
        .lines()
        .find(|l| l.contains("unable to parse event timestamp"))
        .unwrap_or_else(|| panic!("no timestamp warning in:\n{out}"));
    assert!(fallback.contains("WARN"), "{fallback}");
    assert!(fallback.contains("timestamp=yesterday"), "{fallback}");
}
