use crate::errors::EngineError;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    TimedOut,
    Cancelled,
}

/// Fixed-interval polling primitive. Polls `predicate` until it reports the
/// awaited condition, the timeout elapses, or the run is cancelled. The
/// predicate is polled once immediately; the interval applies between polls.
pub async fn await_until<F, Fut>(
    mut predicate: F,
    every: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<WaitOutcome, Box<EngineError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, Box<EngineError>>>,
{
    let started = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return Ok(WaitOutcome::Cancelled);
        }

        if predicate().await? {
            return Ok(WaitOutcome::Satisfied);
        }

        if started.elapsed() >= timeout {
            return Ok(WaitOutcome::TimedOut);
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
            _ = tokio::time::sleep(every) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;
    use crate::events::{EventDetails, Stage, TeardownStep, Transmitter};
    use crate::models::AccountContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TICK: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn test_satisfied_after_a_few_polls() {
        let polls = AtomicUsize::new(0);

        let outcome = await_until(
            || {
                let n = polls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, Box<EngineError>>(n >= 2) }
            },
            TICK,
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::Satisfied);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_is_reported_not_errored() {
        let outcome = await_until(
            || async { Ok::<_, Box<EngineError>>(false) },
            TICK,
            Duration::from_millis(20),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_cancel_wins_over_polling() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = await_until(|| async { Ok::<_, Box<EngineError>>(false) }, TICK, Duration::from_secs(5), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_poll_error_propagates() {
        let ctx = AccountContext {
            account_name: "sandbox".to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
        };
        let details = EventDetails::new(&ctx, Stage::Teardown(TeardownStep::AwaitAbsence), Transmitter::Engine);

        let result = await_until(
            || {
                let details = details.clone();
                async move { Err::<bool, _>(Box::new(EngineError::new_validation_error(details, "boom".to_string()))) }
            },
            TICK,
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
    }
}
