use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted binding of a flow to a cron expression plus its
/// run-state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
  /// Flow name; one schedule per flow.
  pub flow_name: String,
  /// Canonical 5-field cron expression.
  pub cron_expression: String,
  pub enabled: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// When the flow was last dispatched.
  pub last_run: Option<DateTime<Utc>>,
  /// The next time the flow is due; None until computed.
  pub next_run: Option<DateTime<Utc>>,
  /// Whether a run is currently in flight. Run-state is ephemeral per
  /// process and never serialized.
  #[serde(skip)]
  pub running: bool,
}

impl ScheduleEntry {
  /// A schedule is due when it is enabled, not already running, and its
  /// next run time has passed.
  pub fn should_run(&self, now: DateTime<Utc>) -> bool {
    self.enabled && !self.running && self.next_run.is_some_and(|next| next <= now)
  }
}
