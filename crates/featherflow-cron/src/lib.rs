//! Featherflow Cron
//!
//! A self-contained 5-field cron engine: parse an expression into the
//! concrete set of accepted values per field, test timestamps against it,
//! and find the next occurrence by scanning forward minute by minute.
//!
//! The forward scan is deliberately brute force. It needs no calendar
//! arithmetic beyond "add one minute", and its correctness is directly
//! checkable against [`CronExpr::matches`].

mod error;
mod expr;

pub use error::CronError;
pub use expr::{CronExpr, interval_to_cron};
