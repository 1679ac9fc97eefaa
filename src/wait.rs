//! Generic pending/target state-change waiter
//!
//! Polls a refresh function until it reports one of the target states,
//! backing off exponentially with jitter between polls. States outside the
//! pending and target sets fail the wait immediately; running out of the
//! timeout fails it with the last observed state.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Configuration for a state wait
#[derive(Clone, Debug)]
pub struct WaitConfig {
    /// States the wait may pass through
    pub pending: Vec<&'static str>,
    /// States that complete the wait
    pub target: Vec<&'static str>,
    /// Overall deadline for the wait
    pub timeout: Duration,
    /// Delay before the first and between early polls
    pub initial_delay: Duration,
    /// Upper bound for the poll delay
    pub max_delay: Duration,
    /// Multiplier applied to the delay between polls
    pub backoff_multiplier: f64,
}

impl WaitConfig {
    /// Wait for the given targets within `timeout`, with default poll pacing
    pub fn new(pending: Vec<&'static str>, target: Vec<&'static str>, timeout: Duration) -> Self {
        Self {
            pending,
            target,
            timeout,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1.5,
        }
    }
}

/// Poll `refresh` until it reports a target state.
///
/// `refresh` returns the latest view of the object (if any) plus a state
/// string. The final object is returned on success; waits whose target is
/// "the object is gone" return `None`.
pub async fn wait_for_state<F, Fut, T>(
    config: &WaitConfig,
    operation: &str,
    mut refresh: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(Option<T>, String)>>,
{
    let started = Instant::now();
    let mut delay = config.initial_delay;

    loop {
        let (value, last_state) = refresh().await?;

        if config.target.iter().any(|t| *t == last_state) {
            debug!(operation = %operation, state = %last_state, "wait complete");
            return Ok(value);
        }

        if !config.pending.iter().any(|p| *p == last_state) {
            warn!(operation = %operation, state = %last_state, "unexpected state");
            return Err(Error::UnexpectedState {
                operation: operation.to_string(),
                state: last_state,
            });
        }

        if started.elapsed() >= config.timeout {
            return Err(Error::Timeout {
                operation: operation.to_string(),
                last_state,
            });
        }

        // Jitter: 0.5x to 1.5x of the delay
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let jittered = Duration::from_secs_f64(delay.as_secs_f64() * jitter);
        debug!(
            operation = %operation,
            state = %last_state,
            delay_ms = jittered.as_millis(),
            "still waiting"
        );
        tokio::time::sleep(jittered).await;

        delay = Duration::from_secs_f64(
            (delay.as_secs_f64() * config.backoff_multiplier).min(config.max_delay.as_secs_f64()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(pending: Vec<&'static str>, target: Vec<&'static str>) -> WaitConfig {
        WaitConfig {
            pending,
            target,
            timeout: Duration::from_millis(200),
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn completes_when_target_reached() {
        let polls = Arc::new(AtomicU32::new(0));
        let p = polls.clone();

        let result = wait_for_state(&fast(vec!["Creating"], vec!["Succeeded"]), "create", || {
            let p = p.clone();
            async move {
                let n = p.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Ok((Some(n), "Creating".to_string()))
                } else {
                    Ok((Some(n), "Succeeded".to_string()))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, Some(3));
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn unexpected_state_fails_immediately() {
        let result: Result<Option<()>> =
            wait_for_state(&fast(vec!["Creating"], vec!["Succeeded"]), "create", || async {
                Ok((None, "Failed".to_string()))
            })
            .await;

        match result {
            Err(Error::UnexpectedState { state, .. }) => assert_eq!(state, "Failed"),
            other => panic!("expected UnexpectedState, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_reports_the_last_state() {
        let result: Result<Option<()>> =
            wait_for_state(&fast(vec!["Deleting"], vec!["Removed"]), "delete", || async {
                Ok((None, "Deleting".to_string()))
            })
            .await;

        match result {
            Err(Error::Timeout { last_state, .. }) => assert_eq!(last_state, "Deleting"),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refresh_errors_propagate() {
        let result: Result<Option<()>> =
            wait_for_state(&fast(vec!["Creating"], vec!["Succeeded"]), "create", || async {
                Err(Error::validation("boom"))
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
