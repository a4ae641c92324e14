//! Bounded retry for transient daemon outages.
//!
//! The only error class safecrate ever retries is "runtime unreachable":
//! daemon startup races are expected (e.g., Docker Desktop still coming up
//! when the first verb runs). Everything else is terminal for the invoking
//! command, so the retry predicate is always
//! [`Error::is_transient`](crate::error::Error::is_transient).

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Maximum attempts against an unreachable daemon (including the first).
const DAEMON_MAX_ATTEMPTS: u32 = 3;

/// Initial delay before the first retry.
const DAEMON_INITIAL_DELAY_MS: u64 = 100;

/// Cap on the backoff delay.
const DAEMON_MAX_DELAY_SECS: u64 = 2;

/// Exponential backoff multiplier (100ms -> 200ms -> 400ms ...).
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::for_daemon()
    }
}

impl RetryConfig {
    /// Preset for daemon connection races.
    pub fn for_daemon() -> Self {
        Self {
            max_attempts: DAEMON_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DAEMON_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DAEMON_MAX_DELAY_SECS),
        }
    }
}

/// Execute an operation, retrying while `should_retry` classifies the error
/// as transient and attempts remain.
pub fn retry_with_backoff<T, E, F, R>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation() {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = %operation_name,
                        attempts = attempt,
                        "operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= config.max_attempts || !should_retry(&e) {
                    return Err(e);
                }

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "runtime unreachable, will retry"
                );

                thread::sleep(delay);

                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * BACKOFF_MULTIPLIER)
                        .min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_success_first_attempt() {
        let result: Result<i32, &str> =
            retry_with_backoff(&fast_config(), "test", || Ok(42), |_| true);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_success_after_transient_failures() {
        let attempts = RefCell::new(0);
        let result: Result<i32, &str> = retry_with_backoff(
            &fast_config(),
            "test",
            || {
                *attempts.borrow_mut() += 1;
                if *attempts.borrow() < 3 {
                    Err("daemon starting")
                } else {
                    Ok(42)
                }
            },
            |_| true,
        );
        assert_eq!(result.unwrap(), 42);
        assert_eq!(*attempts.borrow(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let attempts = RefCell::new(0);
        let result: Result<i32, &str> = retry_with_backoff(
            &fast_config(),
            "test",
            || {
                *attempts.borrow_mut() += 1;
                Err("always down")
            },
            |_| true,
        );
        assert!(result.is_err());
        assert_eq!(*attempts.borrow(), 3);
    }

    #[test]
    fn test_non_transient_error_is_not_retried() {
        let attempts = RefCell::new(0);
        let result: Result<i32, &str> = retry_with_backoff(
            &fast_config(),
            "test",
            || {
                *attempts.borrow_mut() += 1;
                Err("name conflict")
            },
            |_| false,
        );
        assert!(result.is_err());
        assert_eq!(*attempts.borrow(), 1);
    }
}
