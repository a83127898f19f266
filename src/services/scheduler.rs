//! Scheduled tasks: the twice-daily push and the severe-weather poll.
//!
//! Two independent tokio tasks with explicit handles, both tied to one
//! `CancellationToken` so process shutdown stops them cleanly. State is
//! in-memory and exposed via the status endpoint; on restart the schedule
//! reconstructs itself from the configured push times.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::services::dispatcher::Dispatcher;

/// Global scheduler state, exposed via the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchedulerState {
    pub active: bool,
    pub next_push_at: Option<DateTime<Utc>>,
    pub next_poll_at: Option<DateTime<Utc>>,
    pub last_push_completed_at: Option<DateTime<Utc>>,
    pub last_poll_completed_at: Option<DateTime<Utc>>,
    /// Messages delivered by the most recent push run.
    pub last_push_sent: u64,
    pub total_pushes: u64,
    pub total_polls: u64,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self {
            active: true,
            next_push_at: None,
            next_poll_at: None,
            last_push_completed_at: None,
            last_poll_completed_at: None,
            last_push_sent: 0,
            total_pushes: 0,
            total_polls: 0,
        }
    }
}

/// Shared scheduler state handle.
pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

/// Next scheduled push strictly after `now`.
///
/// `push_times` is sorted; picks the first remaining time today, else the
/// earliest time tomorrow.
pub fn next_push_time(now: DateTime<Utc>, push_times: &[NaiveTime]) -> DateTime<Utc> {
    let Some(first) = push_times.first() else {
        // Misconfiguration guard — no times means an idle scheduler
        return now + chrono::Duration::hours(12);
    };

    let today = now.date_naive();
    for t in push_times {
        let candidate = DateTime::from_naive_utc_and_offset(today.and_time(*t), Utc);
        if candidate > now {
            return candidate;
        }
    }
    let tomorrow = today + Days::new(1);
    DateTime::from_naive_utc_and_offset(tomorrow.and_time(*first), Utc)
}

/// Run the twice-daily push schedule until cancelled.
///
/// Spawn via `tokio::spawn(run_push_schedule(...))` and keep the handle.
pub async fn run_push_schedule(
    dispatcher: Arc<Dispatcher>,
    push_times: Vec<NaiveTime>,
    state: SharedSchedulerState,
    cancel: CancellationToken,
) {
    tracing::info!("Push scheduler started ({} sends per day)", push_times.len());

    loop {
        let now = Utc::now();
        let next = next_push_time(now, &push_times);
        {
            state.write().await.next_push_at = Some(next);
        }
        let sleep = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(sleep) => {
                let sent = dispatcher.run_daily_push(Utc::now()).await;
                let mut s = state.write().await;
                s.last_push_completed_at = Some(Utc::now());
                s.last_push_sent = sent as u64;
                s.total_pushes += 1;
            }
        }
    }

    state.write().await.active = false;
    tracing::info!("Push scheduler stopped");
}

/// Run the severe-weather poll at a fixed interval until cancelled.
pub async fn run_severe_poll_schedule(
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    state: SharedSchedulerState,
    cancel: CancellationToken,
) {
    tracing::info!("Severe-weather poll started (every {:?})", interval);

    loop {
        {
            state.write().await.next_poll_at = Some(
                Utc::now()
                    + chrono::Duration::from_std(interval)
                        .unwrap_or_else(|_| chrono::Duration::zero()),
            );
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                let sent = dispatcher.run_severe_poll(Utc::now()).await;
                if sent > 0 {
                    tracing::info!("Severe poll delivered {} out-of-band notices", sent);
                }
                let mut s = state.write().await;
                s.last_poll_completed_at = Some(Utc::now());
                s.total_polls += 1;
            }
        }
    }

    state.write().await.active = false;
    tracing::info!("Severe-weather poll stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times() -> Vec<NaiveTime> {
        vec![
            NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        ]
    }

    fn at(iso: &str) -> DateTime<Utc> {
        iso.parse::<DateTime<Utc>>().unwrap()
    }

    #[test]
    fn test_next_push_before_first() {
        assert_eq!(
            next_push_time(at("2026-08-06T03:00:00Z"), &times()),
            at("2026-08-06T06:00:00Z")
        );
    }

    #[test]
    fn test_next_push_between() {
        assert_eq!(
            next_push_time(at("2026-08-06T07:30:00Z"), &times()),
            at("2026-08-06T18:00:00Z")
        );
    }

    #[test]
    fn test_next_push_after_last_rolls_over() {
        assert_eq!(
            next_push_time(at("2026-08-06T19:00:00Z"), &times()),
            at("2026-08-07T06:00:00Z")
        );
    }

    #[test]
    fn test_next_push_exactly_at_push_time_picks_next() {
        assert_eq!(
            next_push_time(at("2026-08-06T06:00:00Z"), &times()),
            at("2026-08-06T18:00:00Z")
        );
    }

    #[test]
    fn test_no_push_times_idles() {
        let next = next_push_time(at("2026-08-06T06:00:00Z"), &[]);
        assert_eq!(next, at("2026-08-06T18:00:00Z"));
    }
}
