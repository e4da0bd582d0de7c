use std::future::Future;

use log::warn;

/// What to do once every attempt has failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExhausted {
    Fail,
    /// Report success anyway; the failure is only logged
    Downgrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: usize,
    pub on_exhausted: OnExhausted,
}

/// Team rosters are resent once; the service tolerates a missing roster
pub const TEAM_ROSTER_POLICY: RetryPolicy = RetryPolicy {
    retries: 1,
    on_exhausted: OnExhausted::Downgrade,
};

/// Outcome of running an operation under a policy
#[derive(Debug, PartialEq)]
pub enum RetryOutcome<T, E> {
    Succeeded(T),
    Downgraded(E),
}

impl RetryPolicy {
    pub async fn run<F, Fut, T, E>(&self, label: &str, mut f: F) -> Result<RetryOutcome<T, E>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut retries_left = self.retries;
        loop {
            match f().await {
                Ok(v) => return Ok(RetryOutcome::Succeeded(v)),
                Err(e) if retries_left > 0 => {
                    retries_left -= 1;
                    warn!("{} failed ({}), retrying", label, e);
                }
                Err(e) => {
                    return match self.on_exhausted {
                        OnExhausted::Fail => Err(e),
                        OnExhausted::Downgrade => {
                            warn!("{} failed again ({}), continuing without it", label, e);
                            Ok(RetryOutcome::Downgraded(e))
                        }
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_roster_policy_retries_once_then_downgrades() {
        let counter = AtomicUsize::new(0);
        let res: Result<RetryOutcome<(), &str>, &str> = TEAM_ROSTER_POLICY
            .run("roster", || async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("timeout")
            })
            .await;

        assert_eq!(res, Ok(RetryOutcome::Downgraded("timeout")));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fail_policy_surfaces_error() {
        let policy = RetryPolicy {
            retries: 2,
            on_exhausted: OnExhausted::Fail,
        };
        let counter = AtomicUsize::new(0);
        let res: Result<RetryOutcome<(), &str>, &str> = policy
            .run("op", || async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("boom")
            })
            .await;

        assert_eq!(res, Err("boom"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_after_one_failure() {
        let counter = AtomicUsize::new(0);
        let res: Result<RetryOutcome<usize, &str>, &str> = TEAM_ROSTER_POLICY
            .run("roster", || async {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err("fail")
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(res, Ok(RetryOutcome::Succeeded(1)));
    }
}
