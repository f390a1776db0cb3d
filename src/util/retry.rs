use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Bounded exponential backoff.
///
/// The policy itself holds no state; the same value can drive any number of independent
/// [`retry`] calls. `is_fatal` marks errors that no amount of retrying can fix, which end the
/// sequence immediately.
#[derive(Debug)]
pub struct RetryPolicy<E> {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub is_fatal: fn(&E) -> bool,
}

impl<E> RetryPolicy<E> {
    pub const fn new(
        max_attempts: u32,
        base_delay: Duration,
        multiplier: u32,
        is_fatal: fn(&E) -> bool,
    ) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier,
            is_fatal,
        }
    }

    /// Delay slept after the `failures`-th consecutive failure (1-based)
    pub fn delay_after(&self, failures: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(failures.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    Fatal { error: E, attempts: u32 },
    Exhausted { error: E, attempts: u32 },
    /// The deadline passed (or would pass during the next backoff) before another attempt
    DeadlineElapsed { attempts: u32, last_error: Option<E> },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. }
            | RetryOutcome::Fatal { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::DeadlineElapsed { attempts, .. } => *attempts,
        }
    }
}

/// Runs `op` until it succeeds, fails fatally, runs out of attempts, or the deadline passes.
///
/// `op` receives the 1-based attempt number. Attempts are strictly sequential: a new attempt is
/// only started once the previous future has resolved.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy<E>,
    deadline: Option<Instant>,
    mut op: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 0;
    let mut last_error = None;

    loop {
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            return RetryOutcome::DeadlineElapsed {
                attempts,
                last_error,
            };
        }

        attempts += 1;
        let error = match op(attempts).await {
            Ok(value) => return RetryOutcome::Succeeded { value, attempts },
            Err(e) => e,
        };

        if (policy.is_fatal)(&error) {
            return RetryOutcome::Fatal { error, attempts };
        }

        if attempts >= policy.max_attempts {
            return RetryOutcome::Exhausted { error, attempts };
        }

        let delay = policy.delay_after(attempts);
        if let Some(deadline) = deadline
            && Instant::now() + delay >= deadline
        {
            return RetryOutcome::DeadlineElapsed {
                attempts,
                last_error: Some(error),
            };
        }

        tokio::time::sleep(delay).await;
        last_error = Some(error);
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, PartialEq)]
    enum TestErr {
        Flaky,
        Broken,
    }

    const POLICY: RetryPolicy<TestErr> = RetryPolicy::new(
        3,
        Duration::from_millis(500),
        2,
        |e| matches!(e, TestErr::Broken),
    );

    #[test]
    fn test_delay_doubles() {
        assert_eq!(POLICY.delay_after(1), Duration::from_millis(500));
        assert_eq!(POLICY.delay_after(2), Duration::from_millis(1000));
        assert_eq!(POLICY.delay_after(3), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let started = Instant::now();
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = retry(&POLICY, None, |attempt| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                match attempt {
                    1 | 2 => Err(TestErr::Flaky),
                    _ => Ok(attempt),
                }
            }
        })
        .await;

        assert!(matches!(
            outcome,
            RetryOutcome::Succeeded {
                value: 3,
                attempts: 3
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 500ms + 1000ms of backoff
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(1500) && waited < Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));

        let outcome: RetryOutcome<(), _> = retry(&POLICY, None, |_| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestErr::Broken)
            }
        })
        .await;

        assert!(matches!(
            outcome,
            RetryOutcome::Fatal {
                error: TestErr::Broken,
                attempts: 1
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let outcome: RetryOutcome<(), _> =
            retry(&POLICY, None, |_| async { Err(TestErr::Flaky) }).await;

        assert!(matches!(
            outcome,
            RetryOutcome::Exhausted {
                error: TestErr::Flaky,
                attempts: 3
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_deadline_makes_no_attempt() {
        let deadline = Instant::now();
        let outcome: RetryOutcome<(), TestErr> =
            retry(&POLICY, Some(deadline), |_| async { Ok(()) }).await;

        assert!(matches!(
            outcome,
            RetryOutcome::DeadlineElapsed {
                attempts: 0,
                last_error: None
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_past_deadline_gives_up() {
        // room for the first attempt and its 500ms backoff, not the 1000ms one after it
        let deadline = Instant::now() + Duration::from_millis(1200);
        let outcome: RetryOutcome<(), _> =
            retry(&POLICY, Some(deadline), |_| async { Err(TestErr::Flaky) }).await;

        assert_eq!(outcome.attempts(), 2);
        assert!(matches!(
            outcome,
            RetryOutcome::DeadlineElapsed {
                last_error: Some(TestErr::Flaky),
                ..
            }
        ));
    }
}
