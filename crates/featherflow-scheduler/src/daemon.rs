//! The scheduler daemon and its control loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use featherflow_store::{ScheduleEntry, ScheduleStore, StoreError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{Orchestrator, SchedulerError};

/// Tunables for the daemon control loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
  /// How often the loop polls the store for due schedules.
  pub check_interval: Duration,
  /// Pause after a failed tick before polling again.
  pub error_backoff: Duration,
  /// How long `stop` waits for the control loop to finish.
  pub shutdown_timeout: Duration,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      check_interval: Duration::from_secs(60),
      error_backoff: Duration::from_secs(5),
      shutdown_timeout: Duration::from_secs(10),
    }
  }
}

/// A flow execution currently in flight, keyed by flow name.
#[derive(Debug, Clone)]
pub struct RunningFlow {
  pub flow_name: String,
  pub started_at: DateTime<Utc>,
  /// The schedule entry that dispatched this run, if any.
  pub entry: Option<ScheduleEntry>,
}

struct ControlHandle {
  cancel: CancellationToken,
  task: JoinHandle<()>,
}

/// The scheduler daemon.
///
/// One control loop polls the store; each due flow runs on its own task
/// with no cap on simultaneous flows. The control loop never blocks on a
/// flow execution, and `stop` only stops the loop; in-flight executions
/// run to completion.
pub struct SchedulerDaemon {
  store: Arc<ScheduleStore>,
  orchestrator: Arc<dyn Orchestrator>,
  config: SchedulerConfig,
  running_flows: Arc<Mutex<HashMap<String, RunningFlow>>>,
  control: StdMutex<Option<ControlHandle>>,
  started_at: StdMutex<Option<DateTime<Utc>>>,
}

impl SchedulerDaemon {
  pub fn new(
    store: Arc<ScheduleStore>,
    orchestrator: Arc<dyn Orchestrator>,
    config: SchedulerConfig,
  ) -> Self {
    Self {
      store,
      orchestrator,
      config,
      running_flows: Arc::new(Mutex::new(HashMap::new())),
      control: StdMutex::new(None),
      started_at: StdMutex::new(None),
    }
  }

  /// Launch the control loop. Fails if the daemon is already running.
  ///
  /// Must be called from within a tokio runtime.
  pub fn start(&self) -> Result<(), SchedulerError> {
    let mut control = self.control.lock().unwrap_or_else(|e| e.into_inner());
    if control.as_ref().is_some_and(|c| !c.task.is_finished()) {
      return Err(SchedulerError::AlreadyRunning);
    }

    let cancel = CancellationToken::new();
    let task = tokio::spawn(control_loop(
      self.store.clone(),
      self.orchestrator.clone(),
      self.running_flows.clone(),
      self.config.clone(),
      cancel.clone(),
    ));
    *control = Some(ControlHandle { cancel, task });
    *self.started_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());

    info!(
      check_interval_secs = self.config.check_interval.as_secs(),
      "scheduler started"
    );
    Ok(())
  }

  /// Signal the control loop and wait for it to finish, bounded by the
  /// configured shutdown timeout.
  ///
  /// In-flight flow executions are left to run to completion; only the
  /// loop stops. On timeout the daemon must be treated as possibly still
  /// running.
  pub async fn stop(&self) -> Result<(), SchedulerError> {
    let Some(mut handle) = self
      .control
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .take()
    else {
      return Err(SchedulerError::NotRunning);
    };

    handle.cancel.cancel();
    match tokio::time::timeout(self.config.shutdown_timeout, &mut handle.task).await {
      Ok(_) => {
        *self.started_at.lock().unwrap_or_else(|e| e.into_inner()) = None;
        info!("scheduler stopped");
        Ok(())
      }
      Err(_) => {
        // Put the handle back so is_running keeps reporting the truth.
        *self.control.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Err(SchedulerError::ShutdownTimeout {
          timeout_secs: self.config.shutdown_timeout.as_secs(),
        })
      }
    }
  }

  /// True iff the control-loop task is alive.
  pub fn is_running(&self) -> bool {
    self
      .control
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .as_ref()
      .is_some_and(|c| !c.task.is_finished())
  }

  /// When the daemon was last started, if it is running.
  pub fn started_at(&self) -> Option<DateTime<Utc>> {
    *self.started_at.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Snapshot of the flows currently in flight.
  pub async fn running_flows(&self) -> Vec<RunningFlow> {
    self.running_flows.lock().await.values().cloned().collect()
  }

  pub fn store(&self) -> &ScheduleStore {
    &self.store
  }
}

async fn control_loop(
  store: Arc<ScheduleStore>,
  orchestrator: Arc<dyn Orchestrator>,
  running_flows: Arc<Mutex<HashMap<String, RunningFlow>>>,
  config: SchedulerConfig,
  cancel: CancellationToken,
) {
  debug!("control loop entered");
  loop {
    // A failed tick is logged and absorbed; the loop itself is resilient.
    let wait = match tick(&store, &orchestrator, &running_flows).await {
      Ok(dispatched) => {
        if dispatched > 0 {
          debug!(dispatched, "tick dispatched flows");
        }
        config.check_interval
      }
      Err(e) => {
        error!(error = %e, "scheduler tick failed");
        config.error_backoff
      }
    };

    tokio::select! {
      _ = cancel.cancelled() => break,
      _ = tokio::time::sleep(wait) => {}
    }
  }
  debug!("control loop exited");
}

/// One poll of the store: mark every due entry running and dispatch its
/// flow onto an independent task.
async fn tick(
  store: &Arc<ScheduleStore>,
  orchestrator: &Arc<dyn Orchestrator>,
  running_flows: &Arc<Mutex<HashMap<String, RunningFlow>>>,
) -> Result<usize, StoreError> {
  let due = store.due(Utc::now()).await;
  let dispatched = due.len();

  for entry in due {
    let flow_name = entry.flow_name.clone();
    // `due` excludes running entries, so marking here is the single gate
    // against overlapping runs of the same flow.
    store.mark_running(&flow_name).await?;

    running_flows.lock().await.insert(
      flow_name.clone(),
      RunningFlow {
        flow_name: flow_name.clone(),
        started_at: Utc::now(),
        entry: Some(entry),
      },
    );

    let store = store.clone();
    let orchestrator = orchestrator.clone();
    let running_flows = running_flows.clone();
    tokio::spawn(async move {
      info!(flow = %flow_name, "dispatching scheduled flow");
      match orchestrator.run_flow(&flow_name).await {
        Ok(()) => info!(flow = %flow_name, "scheduled flow completed"),
        Err(e) => warn!(flow = %flow_name, error = %e, "scheduled flow failed"),
      }

      // Success or failure, the record goes away and the schedule moves
      // on to its next occurrence.
      running_flows.lock().await.remove(&flow_name);
      if let Err(e) = store.mark_completed(&flow_name).await {
        error!(flow = %flow_name, error = %e, "failed to mark schedule completed");
      }
    });
  }

  Ok(dispatched)
}
