//! Progress tracking for a single convergence wait.
//!
//! Records every fetch outcome the poller sees so a failed wait can report
//! what it last observed rather than a bare timeout.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::accessor::AccessError;

/// The most recent successful observation of the awaited entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "observed", content = "state")]
pub enum LastObservation {
    /// Every fetch so far failed.
    #[default]
    Never,
    /// The entity was reported as not found.
    Absent,
    /// The entity was present in this state.
    Present(serde_json::Value),
}

/// Tracks one convergence wait.
#[derive(Debug)]
pub struct PollMonitor {
    /// Fetches issued.
    attempts: u32,
    /// Fetches that failed with anything other than NotFound.
    transient_errors: u32,
    /// Latest successful observation.
    last_observation: LastObservation,
    /// Latest non-NotFound fetch error.
    last_error: Option<AccessError>,
    /// When the wait started.
    start_time: Instant,
    /// How long the wait may take.
    timeout: Duration,
}

impl PollMonitor {
    /// Starts tracking a wait bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            attempts: 0,
            transient_errors: 0,
            last_observation: LastObservation::Never,
            last_error: None,
            start_time: Instant::now(),
            timeout,
        }
    }

    /// Records a fetch that returned the entity.
    pub fn record_present(&mut self, state: serde_json::Value) {
        self.attempts += 1;
        self.last_observation = LastObservation::Present(state);
    }

    /// Records a fetch that reported the entity as not found.
    pub fn record_absent(&mut self) {
        self.attempts += 1;
        self.last_observation = LastObservation::Absent;
    }

    /// Records a failed fetch.
    pub fn record_error(&mut self, error: AccessError) {
        self.attempts += 1;
        self.transient_errors += 1;
        self.last_error = Some(error);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn transient_errors(&self) -> u32 {
        self.transient_errors
    }

    pub fn last_observation(&self) -> &LastObservation {
        &self.last_observation
    }

    pub fn last_error(&self) -> Option<&AccessError> {
        self.last_error.as_ref()
    }

    /// Returns total elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Time left before the deadline, zero once it passed.
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.elapsed())
    }

    /// Whether the deadline has been reached.
    pub fn check_timeout(&self) -> bool {
        self.elapsed() >= self.timeout
    }

    /// Consumes the monitor into a summary plus the last fetch error.
    pub fn finish(self) -> (PollSummary, Option<AccessError>) {
        let summary = PollSummary::from(&self);
        (summary, self.last_error)
    }
}

/// Summary of a wait for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSummary {
    pub attempts: u32,
    pub transient_errors: u32,
    pub elapsed_ms: u64,
    pub last_observation: LastObservation,
    pub last_error: Option<String>,
}

impl PollSummary {
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

impl From<&PollMonitor> for PollSummary {
    fn from(monitor: &PollMonitor) -> Self {
        Self {
            attempts: monitor.attempts,
            transient_errors: monitor.transient_errors,
            elapsed_ms: monitor.elapsed().as_millis() as u64,
            last_observation: monitor.last_observation.clone(),
            last_error: monitor.last_error.as_ref().map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn monitor_starts_empty() {
        let monitor = PollMonitor::new(Duration::from_secs(10));

        assert_eq!(monitor.attempts(), 0);
        assert_eq!(monitor.transient_errors(), 0);
        assert_eq!(monitor.last_observation(), &LastObservation::Never);
        assert!(monitor.last_error().is_none());
        assert!(!monitor.check_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_keeps_last_error_across_observations() {
        let mut monitor = PollMonitor::new(Duration::from_secs(10));

        monitor.record_error(AccessError::Transient("connection reset".to_string()));
        monitor.record_absent();
        monitor.record_present(serde_json::json!({"name": "run"}));

        assert_eq!(monitor.attempts(), 3);
        assert_eq!(monitor.transient_errors(), 1);
        assert_eq!(
            monitor.last_observation(),
            &LastObservation::Present(serde_json::json!({"name": "run"}))
        );
        assert!(matches!(monitor.last_error(), Some(AccessError::Transient(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_detects_timeout() {
        let monitor = PollMonitor::new(Duration::from_millis(50));
        assert!(!monitor.check_timeout());
        assert_eq!(monitor.remaining(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(monitor.check_timeout());
        assert_eq!(monitor.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn summary_captures_state() {
        let mut monitor = PollMonitor::new(Duration::from_secs(10));
        monitor.record_error(AccessError::Transient("throttled".to_string()));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        monitor.record_absent();

        let (summary, last_error) = monitor.finish();

        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.transient_errors, 1);
        assert_eq!(summary.elapsed_ms, 1500);
        assert_eq!(summary.last_observation, LastObservation::Absent);
        assert_eq!(summary.last_error.as_deref(), Some("transient failure: throttled"));
        assert!(last_error.is_some());
    }

    #[test]
    fn last_observation_serializes_tagged() {
        let json = serde_json::to_value(LastObservation::Present(serde_json::json!({"a": 1}))).unwrap();
        assert_eq!(json, serde_json::json!({"observed": "present", "state": {"a": 1}}));

        let json = serde_json::to_value(LastObservation::Absent).unwrap();
        assert_eq!(json, serde_json::json!({"observed": "absent"}));
    }
}
