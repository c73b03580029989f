//! Waiting for a published challenge to become visible
//!
//! `verify` answers once per call. This drives it with exponential backoff
//! until it succeeds or the time budget is used up.

use std::time::Duration;

use crate::challenge::errors::{ChallengeError, Result};
use crate::challenge::handler::DnsChallengeHandler;

/// Backoff settings for `wait_for_propagation`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Total time spent sleeping before giving up
    pub max_wait: Duration,
    /// Pause after the first failed attempt
    pub initial_interval: Duration,
    /// Upper bound for a single pause
    pub max_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(600),
            initial_interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(60),
        }
    }
}

/// Calls `handler.verify` until it reports the record as visible.
///
/// Transient errors (resolution and transport failures) count as a miss,
/// other errors abort the wait. `sleep` is called between attempts.
pub fn wait_for_propagation<H: DnsChallengeHandler + ?Sized>(
    handler: &mut H,
    domain: &str,
    value: &str,
    policy: &WaitPolicy,
    sleep: &mut dyn FnMut(Duration),
) -> Result<()> {
    let mut waited = Duration::from_secs(0);
    let mut interval = policy.initial_interval;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match handler.verify(domain, value) {
            Ok(true) => {
                log::info!("TXT record for {} visible after {} attempts", domain, attempt);
                return Ok(());
            }
            Ok(false) => log::debug!("TXT record for {} not visible yet", domain),
            Err(err) if err.is_transient() => {
                log::warn!("Verification attempt {} for {} failed: {}", attempt, domain, err)
            }
            Err(err) => return Err(err),
        }

        if waited >= policy.max_wait {
            return Err(ChallengeError::VerificationTimeout {
                domain: domain.to_string(),
                waited,
            });
        }

        let pause = interval
            .min(policy.max_wait - waited)
            .max(Duration::from_millis(1));
        sleep(pause);
        waited += pause;

        interval = interval
            .checked_mul(2)
            .unwrap_or(policy.max_interval)
            .min(policy.max_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Handler answering `verify` from a script
    struct Scripted {
        answers: Vec<Result<bool>>,
        calls: usize,
    }

    impl Scripted {
        fn new(answers: Vec<Result<bool>>) -> Scripted {
            Scripted { answers, calls: 0 }
        }
    }

    impl DnsChallengeHandler for Scripted {
        fn publish(&mut self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        fn verify(&mut self, _: &str, _: &str) -> Result<bool> {
            self.calls += 1;
            if self.answers.is_empty() {
                return Ok(false);
            }
            self.answers.remove(0)
        }

        fn retract(&mut self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn policy(max_wait: u64, initial: u64, max_interval: u64) -> WaitPolicy {
        WaitPolicy {
            max_wait: Duration::from_secs(max_wait),
            initial_interval: Duration::from_secs(initial),
            max_interval: Duration::from_secs(max_interval),
        }
    }

    #[test]
    fn test_backoff_until_visible() {
        let mut handler = Scripted::new(vec![Ok(false), Ok(false), Ok(false), Ok(true)]);
        let mut pauses = Vec::new();

        wait_for_propagation(
            &mut handler,
            "_acme-challenge.example.com",
            "v",
            &policy(600, 2, 5),
            &mut |d| pauses.push(d.as_secs()),
        )
        .unwrap();

        assert_eq!(4, handler.calls);
        assert_eq!(vec![2, 4, 5], pauses);
    }

    #[test]
    fn test_huge_interval_does_not_overflow() {
        let mut handler = Scripted::new(vec![Ok(false), Ok(false), Ok(true)]);
        let mut pauses = Vec::new();
        let policy = WaitPolicy {
            max_wait: Duration::from_secs(u64::MAX),
            initial_interval: Duration::from_secs(u64::MAX / 2 + 1),
            max_interval: Duration::from_secs(u64::MAX),
        };

        wait_for_propagation(
            &mut handler,
            "_acme-challenge.example.com",
            "v",
            &policy,
            &mut |d| pauses.push(d),
        )
        .unwrap();

        assert_eq!(3, handler.calls);
        assert_eq!(Duration::from_secs(u64::MAX / 2 + 1), pauses[0]);
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let mut handler = Scripted::new(vec![
            Err(ChallengeError::resolution("resolver down")),
            Ok(true),
        ]);

        wait_for_propagation(&mut handler, "x", "v", &policy(10, 1, 1), &mut |_| {}).unwrap();
        assert_eq!(2, handler.calls);
    }

    #[test]
    fn test_fatal_errors_abort() {
        let mut handler = Scripted::new(vec![Err(ChallengeError::configuration("bad key"))]);

        assert!(matches!(
            wait_for_propagation(&mut handler, "x", "v", &policy(10, 1, 1), &mut |_| {}),
            Err(ChallengeError::Configuration { .. })
        ));
        assert_eq!(1, handler.calls);
    }

    #[test]
    fn test_budget_is_respected() {
        let mut handler = Scripted::new(Vec::new());
        let mut slept = Duration::from_secs(0);

        match wait_for_propagation(&mut handler, "x", "v", &policy(10, 4, 60), &mut |d| slept += d) {
            Err(ChallengeError::VerificationTimeout { waited, .. }) => {
                assert_eq!(Duration::from_secs(10), waited);
            }
            other => panic!("expected timeout, got {:?}", other),
        }

        // 4 + 6, then one final check
        assert_eq!(Duration::from_secs(10), slept);
        assert_eq!(3, handler.calls);
    }
}
