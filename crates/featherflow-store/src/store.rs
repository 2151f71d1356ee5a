use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use featherflow_cron::CronExpr;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{ScheduleEntry, StoreError};

/// On-disk shape of the schedule document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ScheduleDocument {
  schedules: Vec<ScheduleEntry>,
}

/// Store of named schedule entries backed by a single JSON document.
///
/// The document is read once at construction and written back after every
/// mutating call, so other processes always see the latest schedule and
/// run times.
pub struct ScheduleStore {
  path: PathBuf,
  entries: Mutex<HashMap<String, ScheduleEntry>>,
}

impl ScheduleStore {
  /// Load the store from `path`. A missing file yields an empty store.
  pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let path = path.into();
    let entries = match tokio::fs::read_to_string(&path).await {
      Ok(contents) => {
        let document: ScheduleDocument = serde_json::from_str(&contents)?;
        document
          .schedules
          .into_iter()
          .map(|entry| (entry.flow_name.clone(), entry))
          .collect()
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
      Err(e) => return Err(e.into()),
    };

    Ok(Self {
      path,
      entries: Mutex::new(entries),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Add or replace the schedule for a flow.
  ///
  /// The expression is validated before anything is persisted, and presets
  /// are canonicalized: `@daily` is stored as `0 0 * * *`. The next run is
  /// computed from the current time.
  pub async fn add(
    &self,
    flow_name: &str,
    expression: &str,
    enabled: bool,
    description: Option<String>,
  ) -> Result<ScheduleEntry, StoreError> {
    let expr = CronExpr::parse(expression)?;
    let entry = ScheduleEntry {
      flow_name: flow_name.to_string(),
      cron_expression: expr.expression().to_string(),
      enabled,
      description,
      last_run: None,
      next_run: upcoming_run(flow_name, &expr),
      running: false,
    };

    let mut entries = self.entries.lock().await;
    entries.insert(entry.flow_name.clone(), entry.clone());
    self.save(&entries).await?;

    info!(
      flow = %flow_name,
      expression = %entry.cron_expression,
      "schedule added"
    );
    Ok(entry)
  }

  /// Insert a fully-formed entry, validating its expression first.
  ///
  /// Unlike [`ScheduleStore::add`] this keeps the entry's timestamps as
  /// given, which is what restore and import paths need.
  pub async fn insert(&self, entry: ScheduleEntry) -> Result<(), StoreError> {
    CronExpr::parse(&entry.cron_expression)?;

    let mut entries = self.entries.lock().await;
    entries.insert(entry.flow_name.clone(), entry);
    self.save(&entries).await
  }

  /// Remove the schedule for a flow. Returns whether an entry existed.
  pub async fn remove(&self, flow_name: &str) -> Result<bool, StoreError> {
    let mut entries = self.entries.lock().await;
    let removed = entries.remove(flow_name).is_some();
    if removed {
      self.save(&entries).await?;
      info!(flow = %flow_name, "schedule removed");
    }
    Ok(removed)
  }

  pub async fn get(&self, flow_name: &str) -> Option<ScheduleEntry> {
    self.entries.lock().await.get(flow_name).cloned()
  }

  /// All entries, sorted by flow name for stable listings.
  pub async fn list(&self) -> Vec<ScheduleEntry> {
    let entries = self.entries.lock().await;
    let mut all: Vec<ScheduleEntry> = entries.values().cloned().collect();
    all.sort_by(|a, b| a.flow_name.cmp(&b.flow_name));
    all
  }

  /// Entries due at `now`: enabled, not running, next run elapsed.
  pub async fn due(&self, now: DateTime<Utc>) -> Vec<ScheduleEntry> {
    let entries = self.entries.lock().await;
    let mut due: Vec<ScheduleEntry> = entries
      .values()
      .filter(|entry| entry.should_run(now))
      .cloned()
      .collect();
    due.sort_by(|a, b| a.flow_name.cmp(&b.flow_name));
    due
  }

  /// Mark a flow's schedule as running and stamp its last run time.
  ///
  /// [`ScheduleStore::due`] excludes running entries, so this is the
  /// single gate preventing overlapping runs of the same flow.
  pub async fn mark_running(&self, flow_name: &str) -> Result<(), StoreError> {
    let mut entries = self.entries.lock().await;
    let entry = entries
      .get_mut(flow_name)
      .ok_or_else(|| StoreError::UnknownFlow(flow_name.to_string()))?;

    entry.running = true;
    entry.last_run = Some(Utc::now());
    self.save(&entries).await
  }

  /// Clear the running flag and recompute the next run from the current
  /// wall-clock time.
  ///
  /// Occurrences missed while the flow was running, disabled, or the
  /// daemon was down are skipped, never replayed.
  pub async fn mark_completed(&self, flow_name: &str) -> Result<(), StoreError> {
    let mut entries = self.entries.lock().await;
    let entry = entries
      .get_mut(flow_name)
      .ok_or_else(|| StoreError::UnknownFlow(flow_name.to_string()))?;

    entry.running = false;
    entry.next_run = match CronExpr::parse(&entry.cron_expression) {
      Ok(expr) => upcoming_run(flow_name, &expr),
      Err(e) => {
        warn!(
          flow = %flow_name,
          error = %e,
          "stored cron expression no longer parses"
        );
        None
      }
    };
    self.save(&entries).await
  }

  async fn save(&self, entries: &HashMap<String, ScheduleEntry>) -> Result<(), StoreError> {
    let mut schedules: Vec<ScheduleEntry> = entries.values().cloned().collect();
    schedules.sort_by(|a, b| a.flow_name.cmp(&b.flow_name));

    let contents = serde_json::to_string_pretty(&ScheduleDocument { schedules })?;
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&self.path, contents).await?;
    Ok(())
  }
}

/// Next occurrence from the current time, or `None` when the bounded scan
/// finds nothing. A dormant schedule stays in the store but never fires,
/// so the exhaustion is logged rather than silently absorbed.
fn upcoming_run(flow_name: &str, expr: &CronExpr) -> Option<DateTime<Utc>> {
  match expr.next_occurrence(Utc::now()) {
    Ok(next) => Some(next),
    Err(e) => {
      warn!(
        flow = %flow_name,
        expression = %expr.expression(),
        error = %e,
        "no upcoming occurrence, schedule is dormant"
      );
      None
    }
  }
}
