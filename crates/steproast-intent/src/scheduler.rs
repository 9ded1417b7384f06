//! Cron scheduling for daemon mode.
//!
//! [`CronScheduler`] ticks once a second and emits a [`CronEvent`] through a
//! tokio channel whenever a job is due. [`run_scheduled`] consumes those
//! events and runs one step check per event, strictly one at a time.
//!
//! Expressions are parsed by the `cron` crate, which wants 6 or 7 fields
//! (seconds first). Standard 5-field input gets a `0` seconds field
//! prepended.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info, warn};

use crate::check::StepCheck;
use crate::error::{IntentError, Result};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A recurring job. `next_run` is `None` once the schedule is exhausted.
#[derive(Debug, Clone)]
struct ScheduledJob {
    name: String,
    schedule: cron::Schedule,
    next_run: Option<DateTime<Utc>>,
}

/// Emitted when a job is due.
#[derive(Debug, Clone)]
pub struct CronEvent {
    pub job_name: String,
    pub fired_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize_cron_expr(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

/// Parse a 5, 6 or 7 field cron expression.
pub fn parse_schedule(expr: &str) -> Result<cron::Schedule> {
    cron::Schedule::from_str(&normalize_cron_expr(expr)).map_err(|e| {
        IntentError::InvalidCronExpression {
            expression: expr.to_string(),
            reason: e.to_string(),
        }
    })
}

fn next_run_after(schedule: &cron::Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

// ---------------------------------------------------------------------------
// CronScheduler
// ---------------------------------------------------------------------------

/// Background scheduler checking its jobs every second.
pub struct CronScheduler {
    jobs: Arc<RwLock<Vec<ScheduledJob>>>,
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl CronScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Register a job. Returns its first run time.
    ///
    /// Rejects expressions that do not parse or never fire.
    pub async fn add_job(&self, name: impl Into<String>, expr: &str) -> Result<DateTime<Utc>> {
        let name = name.into();
        let schedule = parse_schedule(expr)?;
        let next = next_run_after(&schedule, Utc::now()).ok_or_else(|| {
            IntentError::NoUpcomingRun {
                expression: expr.to_string(),
            }
        })?;

        info!(job_name = %name, cron = %expr, next_run = %next, "adding cron job");

        self.jobs.write().await.push(ScheduledJob {
            name,
            schedule,
            next_run: Some(next),
        });
        Ok(next)
    }

    /// Start the background loop. Due jobs emit a [`CronEvent`] on
    /// `event_tx` and have their next run recomputed from now, so missed
    /// occurrences collapse into one event.
    pub fn start(&mut self, event_tx: mpsc::UnboundedSender<CronEvent>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(IntentError::AlreadyRunning);
        }

        let running = Arc::clone(&self.running);
        let jobs = Arc::clone(&self.jobs);

        let handle = tokio::spawn(async move {
            info!("cron scheduler started");

            while running.load(Ordering::SeqCst) {
                let now = Utc::now();
                {
                    let mut job_list = jobs.write().await;
                    for job in job_list.iter_mut() {
                        if !job.next_run.is_some_and(|next| next <= now) {
                            continue;
                        }

                        debug!(job_name = %job.name, "cron job fired");
                        let event = CronEvent {
                            job_name: job.name.clone(),
                            fired_at: now,
                        };
                        if let Err(e) = event_tx.send(event) {
                            error!(job_name = %job.name, error = %e, "failed to send cron event");
                        }

                        job.next_run = next_run_after(&job.schedule, now);
                    }
                }

                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            info!("cron scheduler stopped");
        });

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the background loop and wait for it to finish.
    pub async fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("stop called but scheduler is not running");
            return;
        }

        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            error!(error = %e, "scheduler task panicked during shutdown");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Daemon loop
// ---------------------------------------------------------------------------

/// Run one step check per received event until the channel closes.
///
/// Checks never overlap. Events that queue up while a check is running are
/// dropped with a warning instead of triggering back-to-back runs. Failures
/// are logged and the loop carries on. Returns the number of checks run.
pub async fn run_scheduled(
    check: &StepCheck,
    mut events: mpsc::UnboundedReceiver<CronEvent>,
) -> usize {
    let mut runs = 0;

    while let Some(event) = events.recv().await {
        let payload = json!({
            "source": "cron",
            "job": event.job_name,
            "firedAt": event.fired_at.to_rfc3339(),
        });
        let response = check.run(payload).await;
        runs += 1;

        if response.is_success() {
            info!(
                job_name = %event.job_name,
                status = response.status_code,
                "scheduled check finished"
            );
        } else {
            warn!(
                job_name = %event.job_name,
                status = response.status_code,
                body = %response.body,
                "scheduled check failed"
            );
        }

        while let Ok(skipped) = events.try_recv() {
            warn!(
                job_name = %skipped.job_name,
                fired_at = %skipped.fired_at,
                "skipping event queued during a running check"
            );
        }
    }

    info!(runs, "event channel closed");
    runs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
