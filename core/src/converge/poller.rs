//! The convergence poller.
//!
//! Polls on a fixed interval with no jitter: a given sequence of fetch results
//! always produces the same outcome.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::accessor::AccessError;

use super::monitor::{LastObservation, PollMonitor, PollSummary};
use super::predicate::{Observed, Predicate, Verdict};

/// Interval and deadline of one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { interval, timeout }
    }

    /// A single fetch with no waiting.
    pub fn once() -> Self {
        Self {
            interval: Duration::ZERO,
            timeout: Duration::ZERO,
        }
    }
}

/// A wait that reached its condition.
#[derive(Debug, Clone)]
pub struct Converged<T> {
    /// The satisfying state; `None` when absence satisfied the predicate.
    pub value: Option<T>,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl<T> Converged<T> {
    /// The satisfying state, or an error if the predicate was satisfied by absence.
    pub fn into_present(self, condition: &str) -> Result<T, ConvergenceError> {
        self.value.ok_or_else(|| ConvergenceError {
            condition: condition.to_string(),
            failure: Failure::Failed("satisfied by absence, expected a present entity".to_string()),
            summary: PollSummary {
                attempts: self.attempts,
                transient_errors: 0,
                elapsed_ms: self.elapsed.as_millis() as u64,
                last_observation: LastObservation::Absent,
                last_error: None,
            },
            last_error: None,
        })
    }
}

/// How a wait ended without converging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "failure", content = "reason")]
pub enum Failure {
    /// The predicate returned a terminal failure.
    Failed(String),
    /// The deadline passed without a terminal verdict.
    TimedOut,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Failed(reason) => write!(f, "failed: {}", reason),
            Failure::TimedOut => f.write_str("timed out"),
        }
    }
}

/// A wait that ended in failure or timeout.
#[derive(Error, Debug, Clone)]
#[error(
    "'{condition}' {failure} after {} attempt(s) in {:?}{}",
    .summary.attempts,
    .summary.elapsed(),
    last_error_suffix(.last_error.as_ref())
)]
pub struct ConvergenceError {
    /// Name of the awaited predicate.
    pub condition: String,
    pub failure: Failure,
    pub summary: PollSummary,
    /// Last fetch error other than NotFound.
    pub last_error: Option<AccessError>,
}

impl ConvergenceError {
    pub fn is_timeout(&self) -> bool {
        self.failure == Failure::TimedOut
    }
}

fn last_error_suffix(error: Option<&AccessError>) -> String {
    error
        .map(|e| format!(" (last error: {})", e))
        .unwrap_or_default()
}

/// Repeatedly fetches and evaluates `predicate` until it is satisfied, fails,
/// or `config.timeout` has elapsed.
///
/// NotFound is handed to the predicate as [`Observed::Absent`]. Any other fetch
/// error is recorded and retried until the deadline.
pub async fn await_condition<T, F, Fut>(
    mut fetch: F,
    predicate: &Predicate<T>,
    config: PollConfig,
) -> Result<Converged<T>, ConvergenceError>
where
    T: Serialize,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AccessError>>,
{
    let mut monitor = PollMonitor::new(config.timeout);

    loop {
        let verdict = match fetch().await {
            Ok(state) => {
                monitor.record_present(serde_json::to_value(&state).unwrap_or_default());
                match predicate.evaluate(Observed::Present(&state)) {
                    Verdict::Satisfied => {
                        return Ok(converged(Some(state), &monitor, predicate));
                    }
                    other => other,
                }
            }
            Err(e) if e.is_not_found() => {
                monitor.record_absent();
                match predicate.evaluate(Observed::Absent) {
                    Verdict::Satisfied => return Ok(converged(None, &monitor, predicate)),
                    other => other,
                }
            }
            Err(e) => {
                tracing::warn!(
                    condition = %predicate.name(),
                    attempt = monitor.attempts() + 1,
                    error = %e,
                    "transient fetch error, retrying"
                );
                monitor.record_error(e);
                Verdict::NotYet
            }
        };

        if let Verdict::Failed(reason) = verdict {
            tracing::info!(
                condition = %predicate.name(),
                attempts = monitor.attempts(),
                reason = %reason,
                "condition failed"
            );
            return Err(give_up(monitor, predicate, Failure::Failed(reason)));
        }

        if monitor.check_timeout() {
            tracing::info!(
                condition = %predicate.name(),
                attempts = monitor.attempts(),
                elapsed_ms = monitor.elapsed().as_millis() as u64,
                "condition timed out"
            );
            return Err(give_up(monitor, predicate, Failure::TimedOut));
        }

        tracing::debug!(
            condition = %predicate.name(),
            attempt = monitor.attempts(),
            "condition not yet met"
        );
        tokio::time::sleep(config.interval.min(monitor.remaining())).await;
    }
}

fn converged<T>(value: Option<T>, monitor: &PollMonitor, predicate: &Predicate<T>) -> Converged<T> {
    tracing::debug!(
        condition = %predicate.name(),
        attempts = monitor.attempts(),
        elapsed_ms = monitor.elapsed().as_millis() as u64,
        "condition satisfied"
    );
    Converged {
        value,
        attempts: monitor.attempts(),
        elapsed: monitor.elapsed(),
    }
}

fn give_up<T>(monitor: PollMonitor, predicate: &Predicate<T>, failure: Failure) -> ConvergenceError {
    let (summary, last_error) = monitor.finish();
    ConvergenceError {
        condition: predicate.name().to_string(),
        failure,
        summary,
        last_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::converge::predicate::{absent, present};
    use crate::resource::{ResourceKind, ResourceRef};

    const INTERVAL: Duration = Duration::from_secs(1);

    fn not_found() -> AccessError {
        AccessError::not_found(&ResourceRef::new(ResourceKind::Environment, "env", "ns"))
    }

    fn transient(n: u32) -> AccessError {
        AccessError::Transient(format!("connection refused #{}", n))
    }

    /// A fetch replaying `script`, repeating its last entry once exhausted.
    fn scripted(
        script: Vec<Result<u32, AccessError>>,
    ) -> (impl FnMut() -> std::future::Ready<Result<u32, AccessError>>, Arc<Mutex<u32>>) {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let mut script: VecDeque<_> = script.into();
        let fetch = move || {
            *counter.lock().unwrap() += 1;
            let next = if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            };
            std::future::ready(next)
        };
        (fetch, calls)
    }

    fn at_least(threshold: u32) -> Predicate<u32> {
        Predicate::new(format!("value >= {}", threshold), move |observed: Observed<'_, u32>| {
            match observed {
                Observed::Present(v) if *v == 0 => Verdict::Failed("value dropped to zero".into()),
                Observed::Present(v) if *v >= threshold => Verdict::Satisfied,
                _ => Verdict::NotYet,
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn returns_satisfying_state_without_waiting_past_it() {
        let (fetch, calls) = scripted(vec![Ok(1), Ok(2), Ok(5), Ok(9)]);
        let config = PollConfig::new(Duration::from_secs(60), INTERVAL);

        let converged = await_condition(fetch, &at_least(5), config).await.unwrap();

        assert_eq!(converged.value, Some(5));
        assert_eq!(converged.attempts, 3);
        assert_eq!(converged.elapsed, 2 * INTERVAL);
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_verdict_returns_immediately() {
        let (fetch, _) = scripted(vec![Ok(1), Ok(0)]);
        let config = PollConfig::new(Duration::from_secs(3600), INTERVAL);

        let err = await_condition(fetch, &at_least(5), config).await.unwrap_err();

        assert_eq!(err.failure, Failure::Failed("value dropped to zero".into()));
        assert!(err.summary.elapsed() < 2 * INTERVAL);
        assert_eq!(err.summary.attempts, 2);
        assert_eq!(err.summary.last_observation, LastObservation::Present(serde_json::json!(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_only_time_out_with_last_error() {
        let script = (1..=100).map(|n| Err(transient(n))).collect();
        let (fetch, calls) = scripted(script);
        let config = PollConfig::new(Duration::from_secs(5), INTERVAL);

        let err = await_condition(fetch, &at_least(5), config).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(*calls.lock().unwrap(), 6);
        assert_eq!(err.summary.transient_errors, 6);
        assert_eq!(err.summary.last_observation, LastObservation::Never);
        assert_eq!(err.last_error, Some(transient(6)));
        assert!(err.to_string().contains("connection refused #6"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_does_not_fail_a_converging_wait() {
        let (fetch, _) = scripted(vec![Ok(1), Err(transient(1)), Err(transient(2)), Ok(7)]);
        let config = PollConfig::new(Duration::from_secs(60), INTERVAL);

        let converged = await_condition(fetch, &at_least(5), config).await.unwrap();
        assert_eq!(converged.value, Some(7));
        assert_eq!(converged.attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_is_not_yet_for_presence() {
        let (fetch, _) = scripted(vec![Err(not_found()), Err(not_found()), Ok(3)]);
        let config = PollConfig::new(Duration::from_secs(60), INTERVAL);

        let converged = await_condition(fetch, &present("value present"), config).await.unwrap();
        assert_eq!(converged.value, Some(3));
        assert_eq!(converged.elapsed, 2 * INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn already_absent_resource_satisfies_on_first_fetch() {
        let (fetch, calls) = scripted(vec![Err(not_found())]);
        let config = PollConfig::new(Duration::from_secs(180), INTERVAL);

        let converged = await_condition(fetch, &absent::<u32>("value gone"), config).await.unwrap();
        assert!(converged.value.is_none());
        assert_eq!(converged.elapsed, Duration::ZERO);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn absence_timeout_reports_last_present_state() {
        let (fetch, _) = scripted(vec![Ok(4)]);
        let config = PollConfig::new(Duration::from_secs(3), INTERVAL);

        let err = await_condition(fetch, &absent::<u32>("value gone"), config).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.summary.last_observation, LastObservation::Present(serde_json::json!(4)));
        assert!(err.last_error.is_none());
        assert_eq!(err.summary.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn once_fetches_exactly_one_time() {
        let (fetch, calls) = scripted(vec![Ok(1), Ok(9)]);

        let err = await_condition(fetch, &at_least(5), PollConfig::once()).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn same_script_same_outcome() {
        let script = || vec![Ok(1), Err(transient(1)), Err(not_found()), Ok(2), Ok(6)];
        let config = PollConfig::new(Duration::from_secs(10), INTERVAL);

        let (a, _) = scripted(script());
        let (b, _) = scripted(script());
        let first = await_condition(a, &at_least(5), config).await.unwrap();
        let second = await_condition(b, &at_least(5), config).await.unwrap();

        assert_eq!(first.value, second.value);
        assert_eq!(first.attempts, second.attempts);
        assert_eq!(first.elapsed, second.elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn last_sleep_is_clamped_to_the_deadline() {
        let (fetch, calls) = scripted(vec![Ok(1)]);
        let config = PollConfig::new(Duration::from_millis(2500), INTERVAL);

        let err = await_condition(fetch, &at_least(5), config).await.unwrap_err();
        // fetches at 0s, 1s, 2s and 2.5s
        assert_eq!(*calls.lock().unwrap(), 4);
        assert_eq!(err.summary.elapsed(), Duration::from_millis(2500));
    }
}
