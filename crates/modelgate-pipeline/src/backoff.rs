//! Deadline-bounded polling with exponential backoff.

use std::future::Future;
use std::time::Duration;

use jiff::SignedDuration;
use tokio::time::Instant;

/// Tracing target for polling.
pub const TRACING_TARGET: &str = "modelgate_pipeline::backoff";

/// Delay growth and deadline of one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay after the first probe.
    pub initial_delay: Duration,
    /// Upper bound on the delay between probes.
    pub max_delay: Duration,
    /// Wall-clock bound on the whole loop.
    pub timeout: Duration,
}

impl PollPolicy {
    /// Creates a new policy.
    pub const fn new(initial_delay: Duration, max_delay: Duration, timeout: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            timeout,
        }
    }

    /// Delays between probes: the initial delay, doubled each step, capped
    /// at the maximum.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let max = self.max_delay;
        std::iter::successors(Some(self.initial_delay.min(max)), move |delay| {
            Some(delay.saturating_mul(2).min(max))
        })
    }
}

/// Why a polling loop stopped without a value.
#[derive(Debug)]
pub enum PollError {
    /// The deadline passed before the probe produced a value.
    Timeout {
        /// Time spent polling.
        waited: Duration,
        /// Last retryable error seen, if the final probes failed.
        last_error: Option<modelgate_core::Error>,
    },
    /// The probe failed with an error that retrying cannot fix.
    Fatal(modelgate_core::Error),
}

/// Calls `probe` until it yields a value, the deadline passes, or it fails
/// with a non-retryable error.
///
/// `Ok(None)` from the probe means "not yet". Retryable errors are logged
/// and treated the same way. The deadline is checked after every probe and
/// the last sleep is shortened so that one final probe runs at the deadline.
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    subject: &str,
    mut probe: F,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = modelgate_core::Result<Option<T>>>,
{
    let started_at = Instant::now();
    // Unrepresentable deadlines mean the loop waits until the probe settles.
    let deadline = started_at.checked_add(policy.timeout);
    let mut delays = policy.delays();
    let mut last_error = None;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match probe().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => last_error = None,
            Err(error) if error.is_retryable() => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    subject = %subject,
                    attempt,
                    error = %error,
                    "Retryable error while polling"
                );
                last_error = Some(error);
            }
            Err(error) => return Err(PollError::Fatal(error)),
        }

        let now = Instant::now();
        let delay = delays.next().unwrap_or(policy.max_delay);
        let sleep_for = match deadline {
            Some(deadline) if now >= deadline => {
                return Err(PollError::Timeout {
                    waited: now - started_at,
                    last_error,
                });
            }
            Some(deadline) => delay.min(deadline - now),
            None => delay,
        };

        tracing::trace!(
            target: TRACING_TARGET,
            subject = %subject,
            attempt,
            delay_ms = sleep_for.as_millis(),
            "Waiting before next poll"
        );

        tokio::time::sleep(sleep_for).await;
    }
}

/// Time elapsed since `started_at` as a serializable duration.
pub(crate) fn elapsed_since(started_at: Instant) -> SignedDuration {
    SignedDuration::try_from(started_at.elapsed()).unwrap_or(SignedDuration::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use modelgate_core::Error;

    use super::*;

    fn policy() -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(10),
            Duration::from_secs(60),
            Duration::from_secs(300),
        )
    }

    #[test]
    fn test_delays_double_up_to_cap() {
        let delays: Vec<u64> = policy().delays().take(6).map(|d| d.as_secs()).collect();
        assert_eq!(delays, vec![10, 20, 40, 60, 60, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_value_is_returned() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let value = poll_until(&policy(), "job", move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok((n == 2).then_some("done"))
        })
        .await
        .unwrap();

        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_attempts() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let started_at = Instant::now();

        let result: Result<(), _> = poll_until(&policy(), "job", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        })
        .await;

        // Probes at 0, 10, 30, 70, 130, 190, 250 and a final one at 300.
        assert!(matches!(result, Err(PollError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(started_at.elapsed(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_keeps_polling() {
        let policy = PollPolicy::new(Duration::from_secs(10), Duration::from_secs(60), Duration::MAX);
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let value = poll_until(&policy, "job", move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok((n == 4).then_some(n))
        })
        .await
        .unwrap();

        assert_eq!(value, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_errors_become_timeout() {
        let result: Result<(), _> = poll_until(&policy(), "job", || async {
            Err(Error::network_error().with_message("connection reset"))
        })
        .await;

        match result {
            Err(PollError::Timeout { last_error, .. }) => assert!(last_error.is_some()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_immediately() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let result: Result<(), _> = poll_until(&policy(), "job", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::authentication().with_message("expired token"))
        })
        .await;

        assert!(matches!(result, Err(PollError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
