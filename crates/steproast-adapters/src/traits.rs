//! Seam traits and supporting types.
//!
//! The step check holds one [`StepSource`] and one [`Notifier`] as trait
//! objects, so tests can swap either for an in-memory fake.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Timelike};
use serde::Serialize;
use steproast_auth::AccessToken;

use crate::error::Result;

/// Length of one day window in milliseconds.
pub const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Subject line used for every roast notification.
pub const ROAST_SUBJECT: &str = "Your Daily Step Count Roast";

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// A `[start, end)` interval in epoch milliseconds covering one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayWindow {
    pub start_millis: i64,
    pub end_millis: i64,
}

impl DayWindow {
    /// The window containing `now`, starting at local midnight in `now`'s
    /// time zone. The end is always exactly 24 hours after the start, even
    /// across a DST change.
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN);
        let start_millis = match tz.from_local_datetime(&midnight).earliest() {
            Some(start) => start.timestamp_millis(),
            // Midnight skipped by a DST jump: step back by the wall-clock time
            // elapsed since midnight.
            None => {
                let elapsed = i64::from(now.num_seconds_from_midnight()) * 1000
                    + i64::from(now.nanosecond() / 1_000_000);
                now.timestamp_millis() - elapsed
            }
        };
        Self {
            start_millis,
            end_millis: start_millis + DAY_MILLIS,
        }
    }

    /// Today's window in the server's local time.
    pub fn today() -> Self {
        Self::containing(&Local::now())
    }
}

/// A message to push to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// The roast notification: `Steps{count}`, a blank line, then the roast.
    pub fn roast(steps: u64, roast: &str) -> Self {
        Self {
            subject: ROAST_SUBJECT.to_string(),
            body: format!("Steps{steps}\n\n{roast}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Reads the user's step total for a day.
#[async_trait]
pub trait StepSource: Send + Sync {
    /// Total steps recorded inside `window`. Missing data is `Ok(0)`.
    async fn daily_steps(&self, token: &AccessToken, window: &DayWindow) -> Result<u64>;
}

/// Delivers a notification to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish once. No retry.
    async fn publish(&self, notification: &Notification) -> Result<()>;
}
