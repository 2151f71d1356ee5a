use thiserror::Error;

/// Errors from cron expression parsing and occurrence scanning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
  /// The expression does not have exactly 5 fields.
  #[error("expected 5 fields in cron expression, got {count}: {expression:?}")]
  WrongFieldCount { expression: String, count: usize },

  /// A field uses unsupported syntax (bad step, reversed range, junk).
  #[error("invalid {field} field: {value:?}")]
  InvalidField { field: &'static str, value: String },

  /// A numeric value falls outside its field's domain.
  #[error("value {value} out of range for {field} field ({min}-{max})")]
  OutOfRange {
    field: &'static str,
    value: u32,
    min: u32,
    max: u32,
  },

  /// The bounded forward scan found no matching minute.
  #[error("no upcoming occurrence within the scan window")]
  NoUpcomingOccurrence,
}
