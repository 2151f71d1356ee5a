//! Integration tests for the scheduler daemon with a recording backend.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use featherflow_scheduler::{
  Orchestrator, OrchestratorError, SchedulerConfig, SchedulerDaemon, SchedulerError,
};
use featherflow_store::{ScheduleEntry, ScheduleStore};

struct RecordingOrchestrator {
  calls: StdMutex<Vec<String>>,
  delay: Duration,
  fail: bool,
}

impl RecordingOrchestrator {
  fn new(delay: Duration, fail: bool) -> Arc<Self> {
    Arc::new(Self {
      calls: StdMutex::new(Vec::new()),
      delay,
      fail,
    })
  }

  fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl Orchestrator for RecordingOrchestrator {
  async fn run_flow(&self, flow_name: &str) -> Result<(), OrchestratorError> {
    self.calls.lock().unwrap().push(flow_name.to_string());
    tokio::time::sleep(self.delay).await;
    if self.fail {
      return Err(OrchestratorError::new("task exited with status 1"));
    }
    Ok(())
  }
}

fn fast_config() -> SchedulerConfig {
  SchedulerConfig {
    check_interval: Duration::from_millis(50),
    error_backoff: Duration::from_millis(50),
    shutdown_timeout: Duration::from_secs(5),
  }
}

async fn store_in(dir: &tempfile::TempDir) -> Arc<ScheduleStore> {
  Arc::new(
    ScheduleStore::load(dir.path().join("schedules.json"))
      .await
      .expect("failed to load store"),
  )
}

/// An entry whose next run has already passed. The daily expression keeps
/// the recomputed next run computable on any date while staying well past
/// the test window, so each test sees exactly one dispatch.
fn due_entry(flow_name: &str) -> ScheduleEntry {
  ScheduleEntry {
    flow_name: flow_name.to_string(),
    cron_expression: "0 0 * * *".to_string(),
    enabled: true,
    description: None,
    last_run: None,
    next_run: Some(Utc::now() - chrono::Duration::minutes(1)),
    running: false,
  }
}

#[tokio::test]
async fn start_rejects_a_running_daemon() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir).await;
  let orchestrator = RecordingOrchestrator::new(Duration::ZERO, false);
  let daemon = SchedulerDaemon::new(store, orchestrator, fast_config());

  daemon.start().unwrap();
  assert!(matches!(
    daemon.start(),
    Err(SchedulerError::AlreadyRunning)
  ));
  daemon.stop().await.unwrap();
}

#[tokio::test]
async fn stop_without_start_fails() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir).await;
  let orchestrator = RecordingOrchestrator::new(Duration::ZERO, false);
  let daemon = SchedulerDaemon::new(store, orchestrator, fast_config());

  assert!(matches!(daemon.stop().await, Err(SchedulerError::NotRunning)));
}

#[tokio::test]
async fn lifecycle_start_then_stop() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir).await;
  let orchestrator = RecordingOrchestrator::new(Duration::ZERO, false);
  let daemon = SchedulerDaemon::new(store, orchestrator, fast_config());

  assert!(!daemon.is_running());
  daemon.start().unwrap();
  assert!(daemon.is_running());
  assert!(daemon.started_at().is_some());

  daemon.stop().await.unwrap();
  assert!(!daemon.is_running());
  assert!(daemon.started_at().is_none());
}

#[tokio::test]
async fn stop_interrupts_a_long_check_interval() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir).await;
  let orchestrator = RecordingOrchestrator::new(Duration::ZERO, false);
  let config = SchedulerConfig {
    check_interval: Duration::from_secs(3600),
    ..fast_config()
  };
  let daemon = SchedulerDaemon::new(store, orchestrator, config);

  daemon.start().unwrap();
  let begun = std::time::Instant::now();
  daemon.stop().await.unwrap();
  assert!(begun.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn due_entry_is_dispatched_exactly_once() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir).await;
  store.insert(due_entry("etl")).await.unwrap();

  let orchestrator = RecordingOrchestrator::new(Duration::ZERO, false);
  let daemon = SchedulerDaemon::new(store.clone(), orchestrator.clone(), fast_config());

  daemon.start().unwrap();
  tokio::time::sleep(Duration::from_millis(300)).await;
  daemon.stop().await.unwrap();

  assert_eq!(orchestrator.calls(), vec!["etl"]);
  let entry = store.get("etl").await.unwrap();
  assert!(!entry.running);
  assert!(entry.last_run.is_some());
  assert!(entry.next_run.unwrap() > Utc::now());
  assert!(daemon.running_flows().await.is_empty());
}

#[tokio::test]
async fn running_flow_is_not_redispatched() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir).await;
  store.insert(due_entry("slow")).await.unwrap();

  let orchestrator = RecordingOrchestrator::new(Duration::from_millis(400), false);
  let daemon = SchedulerDaemon::new(store.clone(), orchestrator.clone(), fast_config());

  daemon.start().unwrap();
  // Several ticks elapse while the flow is still executing.
  tokio::time::sleep(Duration::from_millis(200)).await;
  assert_eq!(orchestrator.calls(), vec!["slow"]);
  assert!(store.get("slow").await.unwrap().running);

  let in_flight = daemon.running_flows().await;
  assert_eq!(in_flight.len(), 1);
  assert_eq!(in_flight[0].flow_name, "slow");

  // After completion the record is gone and the schedule is idle again.
  tokio::time::sleep(Duration::from_millis(400)).await;
  daemon.stop().await.unwrap();
  assert_eq!(orchestrator.calls(), vec!["slow"]);
  assert!(!store.get("slow").await.unwrap().running);
  assert!(daemon.running_flows().await.is_empty());
}

#[tokio::test]
async fn failed_flow_still_completes_its_schedule() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir).await;
  store.insert(due_entry("flaky")).await.unwrap();

  let orchestrator = RecordingOrchestrator::new(Duration::ZERO, true);
  let daemon = SchedulerDaemon::new(store.clone(), orchestrator.clone(), fast_config());

  daemon.start().unwrap();
  tokio::time::sleep(Duration::from_millis(300)).await;
  daemon.stop().await.unwrap();

  assert_eq!(orchestrator.calls(), vec!["flaky"]);
  let entry = store.get("flaky").await.unwrap();
  assert!(!entry.running);
  assert!(entry.next_run.is_some());
  assert!(daemon.running_flows().await.is_empty());
}

#[tokio::test]
async fn independent_flows_run_concurrently() {
  let dir = tempfile::tempdir().unwrap();
  let store = store_in(&dir).await;
  store.insert(due_entry("one")).await.unwrap();
  store.insert(due_entry("two")).await.unwrap();

  let orchestrator = RecordingOrchestrator::new(Duration::from_millis(200), false);
  let daemon = SchedulerDaemon::new(store.clone(), orchestrator.clone(), fast_config());

  daemon.start().unwrap();
  tokio::time::sleep(Duration::from_millis(100)).await;
  // Both dispatched on the first tick, neither finished yet.
  let mut calls = orchestrator.calls();
  calls.sort();
  assert_eq!(calls, vec!["one", "two"]);
  assert_eq!(daemon.running_flows().await.len(), 2);

  tokio::time::sleep(Duration::from_millis(300)).await;
  daemon.stop().await.unwrap();
  assert!(daemon.running_flows().await.is_empty());
}
