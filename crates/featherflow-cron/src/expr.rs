use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::error::CronError;

/// Upper bound on the minute-by-minute forward scan: a little over one
/// month of candidate minutes.
const SCAN_LIMIT_MINUTES: u32 = 31 * 24 * 60;

struct FieldDomain {
  name: &'static str,
  min: u32,
  max: u32,
}

const MINUTE: FieldDomain = FieldDomain {
  name: "minute",
  min: 0,
  max: 59,
};
const HOUR: FieldDomain = FieldDomain {
  name: "hour",
  min: 0,
  max: 23,
};
const DAY_OF_MONTH: FieldDomain = FieldDomain {
  name: "day-of-month",
  min: 1,
  max: 31,
};
const MONTH: FieldDomain = FieldDomain {
  name: "month",
  min: 1,
  max: 12,
};
// 7 is accepted as an alias for Sunday and normalized to 0 after parsing.
const DAY_OF_WEEK: FieldDomain = FieldDomain {
  name: "day-of-week",
  min: 0,
  max: 7,
};

/// A parsed cron expression: the concrete accepted values for each of the
/// five fields, plus the canonical expression text (presets expanded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
  expression: String,
  minutes: BTreeSet<u32>,
  hours: BTreeSet<u32>,
  days_of_month: BTreeSet<u32>,
  months: BTreeSet<u32>,
  days_of_week: BTreeSet<u32>,
}

impl CronExpr {
  /// Parse a 5-field cron expression or a named preset.
  ///
  /// Presets (`@hourly`, `@daily`, `@weekly`, `@monthly`, `@yearly`,
  /// `@annually`) expand to their canonical 5-field form before parsing,
  /// and [`CronExpr::expression`] returns the expanded text. Per-field
  /// syntaxes: `*`, `*/n`, comma lists, inclusive `a-b` ranges, and single
  /// integers. Malformed expressions fail here, never at match time.
  pub fn parse(expression: &str) -> Result<Self, CronError> {
    let canonical = expand_preset(expression.trim());
    let fields: Vec<&str> = canonical.split_whitespace().collect();
    if fields.len() != 5 {
      return Err(CronError::WrongFieldCount {
        expression: expression.to_string(),
        count: fields.len(),
      });
    }

    let minutes = parse_field(fields[0], &MINUTE)?;
    let hours = parse_field(fields[1], &HOUR)?;
    let days_of_month = parse_field(fields[2], &DAY_OF_MONTH)?;
    let months = parse_field(fields[3], &MONTH)?;
    // Normalize Sunday: both 0 and 7 mean the same day.
    let days_of_week = parse_field(fields[4], &DAY_OF_WEEK)?
      .into_iter()
      .map(|d| d % 7)
      .collect();

    Ok(Self {
      expression: canonical.to_string(),
      minutes,
      hours,
      days_of_month,
      months,
      days_of_week,
    })
  }

  /// The canonical 5-field expression text.
  pub fn expression(&self) -> &str {
    &self.expression
  }

  /// Whether `at` satisfies all five fields simultaneously.
  ///
  /// Day-of-month and day-of-week are both constraints (logical AND), not
  /// the "either matches" variant some cron implementations use.
  pub fn matches(&self, at: DateTime<Utc>) -> bool {
    // chrono weekdays are ISO (Mon=0..Sun=6); cron wants Sun=0..Sat=6.
    let weekday = (at.weekday().num_days_from_monday() + 1) % 7;

    self.minutes.contains(&at.minute())
      && self.hours.contains(&at.hour())
      && self.days_of_month.contains(&at.day())
      && self.months.contains(&at.month())
      && self.days_of_week.contains(&weekday)
  }

  /// The first matching minute strictly after `after`.
  ///
  /// Seconds are truncated, then candidates are scanned one minute at a
  /// time starting at the minute following `after`. The scan is bounded to
  /// roughly one month of candidates; expressions that can never match
  /// (such as February 30th) exhaust the bound and return
  /// [`CronError::NoUpcomingOccurrence`].
  pub fn next_occurrence(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
    let floor = after
      .with_second(0)
      .and_then(|t| t.with_nanosecond(0))
      .unwrap_or(after);

    let mut candidate = floor + Duration::minutes(1);
    for _ in 0..SCAN_LIMIT_MINUTES {
      if self.matches(candidate) {
        return Ok(candidate);
      }
      candidate += Duration::minutes(1);
    }

    Err(CronError::NoUpcomingOccurrence)
  }
}

fn expand_preset(expression: &str) -> &str {
  match expression {
    "@hourly" => "0 * * * *",
    "@daily" => "0 0 * * *",
    "@weekly" => "0 0 * * 0",
    "@monthly" => "0 0 1 * *",
    "@yearly" | "@annually" => "0 0 1 1 *",
    other => other,
  }
}

fn parse_field(text: &str, domain: &FieldDomain) -> Result<BTreeSet<u32>, CronError> {
  let invalid = || CronError::InvalidField {
    field: domain.name,
    value: text.to_string(),
  };

  let mut values = BTreeSet::new();
  for part in text.split(',') {
    if part == "*" {
      values.extend(domain.min..=domain.max);
    } else if let Some(step) = part.strip_prefix("*/") {
      let step: u32 = step.parse().map_err(|_| invalid())?;
      if step == 0 {
        return Err(invalid());
      }
      values.extend((domain.min..=domain.max).filter(|v| v % step == 0));
    } else if let Some((start, end)) = part.split_once('-') {
      let start = parse_value(start, domain)?;
      let end = parse_value(end, domain)?;
      if start > end {
        return Err(invalid());
      }
      values.extend(start..=end);
    } else {
      values.insert(parse_value(part, domain)?);
    }
  }

  if values.is_empty() {
    return Err(invalid());
  }
  Ok(values)
}

fn parse_value(text: &str, domain: &FieldDomain) -> Result<u32, CronError> {
  let value: u32 = text.parse().map_err(|_| CronError::InvalidField {
    field: domain.name,
    value: text.to_string(),
  })?;
  if value < domain.min || value > domain.max {
    return Err(CronError::OutOfRange {
      field: domain.name,
      value,
      min: domain.min,
      max: domain.max,
    });
  }
  Ok(value)
}

/// Convert a human-readable interval (`hourly`, `daily`, `weekly`,
/// `monthly`) with an optional `HH:MM` time of day into cron text.
///
/// Returns `None` for unknown intervals or malformed times. Weekly
/// schedules land on Sunday and monthly ones on the 1st, matching common
/// expectations for those words.
pub fn interval_to_cron(interval: &str, at: Option<&str>) -> Option<String> {
  let at_time = match at {
    Some(text) => Some(parse_at(text)?),
    None => None,
  };
  let (hour, minute) = at_time.unwrap_or((0, 0));

  match interval.to_ascii_lowercase().as_str() {
    "hourly" => Some("0 * * * *".to_string()),
    "daily" => Some(format!("{minute} {hour} * * *")),
    "weekly" => Some(format!("{minute} {hour} * * 0")),
    "monthly" => Some(format!("{minute} {hour} 1 * *")),
    _ => None,
  }
}

fn parse_at(text: &str) -> Option<(u32, u32)> {
  let (hour, minute) = text.split_once(':')?;
  let hour: u32 = hour.parse().ok()?;
  let minute: u32 = minute.parse().ok()?;
  if hour > 23 || minute > 59 {
    return None;
  }
  Some((hour, minute))
}
