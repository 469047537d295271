//! Retry executor with exponential backoff and optional jitter.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Backoff strategy for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(1_000),
            factor: 2.0,
            max: Duration::from_secs(60),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Calculate the delay before retry number `attempt + 1` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt.min(i32::MAX as u32) as i32);
                let seconds = base.as_secs_f64() * scale;
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds);

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Retry executor wrapping a fallible async operation.
///
/// Attempt 0 is the initial call, so an operation that always fails is invoked
/// `max_retries + 1` times before the last error is returned.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Enables or disables retries. A disabled policy makes exactly one attempt.
    pub enabled: bool,
    /// The maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// The backoff strategy to use between retries.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// Build a policy from the user-facing retry settings.
    ///
    /// With `backoff_enabled` the delay doubles after every retry starting at
    /// `initial_delay`; otherwise it stays at `initial_delay`.
    pub fn from_settings(
        enabled: bool,
        max_retries: u32,
        initial_delay: Duration,
        backoff_enabled: bool,
    ) -> Self {
        let backoff = if backoff_enabled {
            Backoff::Exponential {
                base: initial_delay,
                factor: 2.0,
                max: Duration::from_secs(60).max(initial_delay),
                jitter: false,
            }
        } else {
            Backoff::Fixed {
                delay: initial_delay,
            }
        };

        Self {
            enabled,
            max_retries,
            backoff,
        }
    }

    /// Disable retries.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Enable +/- 50% jitter on exponential delays.
    pub fn with_jitter(mut self) -> Self {
        if let Backoff::Exponential { ref mut jitter, .. } = self.backoff {
            *jitter = true;
        }
        self
    }

    /// Calculate the delay for a given retry attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    /// Number of retries this policy will actually perform.
    pub const fn effective_retries(&self) -> u32 {
        if self.enabled {
            self.max_retries
        } else {
            0
        }
    }

    /// Run `operation`, retrying every failure.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_when(operation, |_| true).await
    }

    /// Run `operation`, retrying only failures accepted by `should_retry`.
    pub async fn execute_when<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        should_retry: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let max_retries = self.effective_retries();
        let mut attempt = 0_u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= max_retries || !should_retry(&error) {
                        return Err(error);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying failed operation"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(10), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1)); // capped
    }

    #[test]
    fn test_exponential_backoff_with_jitter() {
        let policy = RetryPolicy::from_settings(true, 5, Duration::from_millis(100), true)
            .with_jitter();

        for _ in 0..10 {
            for attempt in 0..5 {
                let delay_ms = policy.delay_for_attempt(attempt).as_millis() as f64;
                let expected = 100.0 * 2_f64.powi(attempt as i32);

                assert!(delay_ms >= expected * 0.49, "attempt={attempt}, delay_ms={delay_ms}");
                assert!(delay_ms <= expected * 1.51, "attempt={attempt}, delay_ms={delay_ms}");
            }
        }
    }

    #[test]
    fn settings_without_backoff_use_constant_delay() {
        let policy = RetryPolicy::from_settings(true, 3, Duration::from_millis(250), false);

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_operation_runs_max_retries_plus_one_times() {
        let policy = RetryPolicy::from_settings(true, 3, Duration::from_millis(10), true);
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = policy
            .execute(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {attempt}")) }
            })
            .await;

        assert_eq!(result, Err(String::from("failure 3")));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_later_attempt_stops_retrying() {
        let policy = RetryPolicy::from_settings(true, 3, Duration::from_millis(100), true);
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let stamps = Mutex::new(Vec::new());

        let result: Result<u32, String> = policy
            .execute(|| {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                stamps.lock().expect("stamps").push(started.elapsed());
                async move {
                    if attempt < 3 {
                        Err(String::from("transient"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let stamps = stamps.into_inner().expect("stamps");
        let gaps: Vec<u128> = stamps
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect();
        assert_eq!(gaps, vec![100, 200, 400]);
    }

    #[tokio::test(start_paused = true)]
    async fn predicate_stops_retries_for_permanent_errors() {
        let policy = RetryPolicy::from_settings(true, 5, Duration::from_millis(10), true);
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = policy
            .execute_when(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("permanent") }
                },
                |error| *error != "permanent",
            )
            .await;

        assert_eq!(result, Err("permanent"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_policy_makes_a_single_attempt() {
        let policy = RetryPolicy::disabled();
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
