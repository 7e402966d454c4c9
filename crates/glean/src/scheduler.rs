//! Metrics ping scheduling
//!
//! The "metrics" ping is sent at most once per calendar day, at a fixed
//! local hour. At startup [`decide`] looks at the bookkeeping of the last
//! submission and says whether to submit right away; a timer task then
//! fires at each following boundary and dispatches the submission.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeZone};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use glean_core::domain::datetime::local_now;

use crate::operation::{Launcher, Operation};

/// Reason for a submission triggered by an application upgrade
pub const REASON_UPGRADE: &str = "upgrade";
/// Reason for a submission at startup past the daily boundary
pub const REASON_OVERDUE: &str = "overdue";

/// Progress of the metrics ping through one boundary
///
/// `Idle -> Due -> Submitting -> Idle`. `Due` is entered when the timer
/// fires, `Submitting` while the document is assembled and queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleState {
    #[default]
    Idle,
    Due,
    Submitting,
}

impl ScheduleState {
    /// Timer fired; false if a submission is already due or running
    pub fn fire(&mut self) -> bool {
        if *self != ScheduleState::Idle {
            return false;
        }
        *self = ScheduleState::Due;
        true
    }

    /// Starts assembling; false if a submission is already running
    pub fn begin(&mut self) -> bool {
        if *self == ScheduleState::Submitting {
            return false;
        }
        *self = ScheduleState::Submitting;
        true
    }

    pub fn finish(&mut self) {
        *self = ScheduleState::Idle;
    }
}

/// Which boundary the timer waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    /// Today's boundary, not yet reached
    Today,
    /// Tomorrow's boundary; today's ping was already sent
    Tomorrow,
    /// The next boundary after a submission
    Reschedule,
}

impl When {
    /// Submission reason when the timer fires
    pub fn reason(&self) -> &'static str {
        match self {
            When::Today => "today",
            When::Tomorrow => "tomorrow",
            When::Reschedule => "reschedule",
        }
    }

    /// Time left from `now` until the boundary at `hour`
    pub fn until(&self, now: DateTime<FixedOffset>, hour: u32) -> Duration {
        let day = match self {
            When::Today => Some(now.date_naive()),
            When::Tomorrow | When::Reschedule => now.date_naive().checked_add_days(Days::new(1)),
        };
        day.and_then(|d| boundary(now, d, hour))
            .and_then(|target| (target - now).to_std().ok())
            .unwrap_or_default()
    }
}

fn boundary(
    now: DateTime<FixedOffset>,
    day: chrono::NaiveDate,
    hour: u32,
) -> Option<DateTime<FixedOffset>> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    now.offset()
        .from_local_datetime(&day.and_time(time))
        .single()
}

/// What to do at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDecision {
    /// Submit immediately with this reason
    pub submit_now: Option<&'static str>,
    /// Boundary the timer starts with
    pub next: When,
}

/// Startup decision for the metrics ping
///
/// # Arguments
/// * `last_sent` - Time of the last submission, if any
/// * `last_build` - App build at the last submission, if any
/// * `hour` - Local hour of the daily boundary
pub fn decide(
    now: DateTime<FixedOffset>,
    last_sent: Option<DateTime<FixedOffset>>,
    last_build: Option<&str>,
    current_build: &str,
    hour: u32,
) -> ScheduleDecision {
    if last_build.is_some_and(|b| b != current_build) {
        return ScheduleDecision {
            submit_now: Some(REASON_UPGRADE),
            next: When::Reschedule,
        };
    }

    let sent_today = last_sent.is_some_and(|t| t.date_naive() == now.date_naive());
    if sent_today {
        return ScheduleDecision {
            submit_now: None,
            next: When::Tomorrow,
        };
    }

    let past_boundary = boundary(now, now.date_naive(), hour).is_some_and(|b| now >= b);
    if past_boundary {
        ScheduleDecision {
            submit_now: Some(REASON_OVERDUE),
            next: When::Reschedule,
        }
    } else {
        ScheduleDecision {
            submit_now: None,
            next: When::Today,
        }
    }
}

// ============================================================================
// MetricsPingScheduler
// ============================================================================

/// Timer task that dispatches the daily metrics ping
pub struct MetricsPingScheduler {
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsPingScheduler {
    /// Spawns the timer, first waiting for `first`
    pub fn start(first: When, hour: u32, launcher: Launcher) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut when = first;
            loop {
                let delay = when.until(local_now(), hour);
                debug!(
                    reason = when.reason(),
                    delay_secs = delay.as_secs(),
                    "Metrics ping scheduled"
                );

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                info!(reason = when.reason(), "Metrics ping timer fired");
                launcher(Operation::SubmitScheduledMetricsPing {
                    reason: when.reason().to_string(),
                });
                when = When::Reschedule;
            }
            debug!("Metrics ping scheduler stopped");
        });

        Self {
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Cancels the timer and waits for it
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Metrics ping scheduler ended abnormally");
            }
        }
    }
}
