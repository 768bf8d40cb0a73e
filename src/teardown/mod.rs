pub mod alarms;
pub mod application;
pub mod cluster;
pub mod event_rules;
pub mod executor;
pub mod functions;
pub mod iam;
pub mod instance;
pub mod monitoring;
pub mod plan;
pub mod security_group;
pub mod waiter;

use crate::constants::{TRANSIENT_RETRY_BASE_DELAY, TRANSIENT_RETRY_MAX_ATTEMPTS};
use crate::errors::EngineError;
use crate::models::ResourceRef;
use serde_derive::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Terminal state of one resource at the end of a run. Every delete call site
/// resolves to exactly one of these; nothing is ever silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceOutcome {
    Deleted,
    SkippedProtected { reason: String },
    SkippedShared { reason: String },
    Ignored,
    FailedPermanent { error: String },
    FailedTimedOut,
    /// A strictly-ordered downstream step could not run because its
    /// prerequisite timed out.
    Blocked { reason: String },
    /// Dry-run stand-in for Deleted.
    WouldDelete,
}

impl ResourceOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ResourceOutcome::FailedPermanent { .. } | ResourceOutcome::FailedTimedOut | ResourceOutcome::Blocked { .. }
        )
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, ResourceOutcome::Deleted)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            ResourceOutcome::SkippedProtected { .. } | ResourceOutcome::SkippedShared { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub resource: ResourceRef,
    pub outcome: ResourceOutcome,
}

impl OutcomeRecord {
    pub fn new(resource: ResourceRef, outcome: ResourceOutcome) -> Self {
        OutcomeRecord { resource, outcome }
    }
}

/// Runs one cloud mutation with the engine retry policy: transient errors
/// back off exponentially up to the attempt cap, then demote to permanent.
/// Permanent errors return immediately. Cancellation aborts outstanding
/// retries.
pub async fn with_transient_retries<T, F, Fut>(cancel: &CancellationToken, mut op: F) -> Result<T, Box<EngineError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Box<EngineError>>>,
{
    let mut attempt = 1usize;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < TRANSIENT_RETRY_MAX_ATTEMPTS => {
                let delay = TRANSIENT_RETRY_BASE_DELAY * 2u32.pow(attempt as u32 - 1);
                debug!(
                    "transient error (attempt {attempt}/{TRANSIENT_RETRY_MAX_ATTEMPTS}), retrying in {}s",
                    delay.as_secs()
                );
                attempt += 1;

                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(Box::new(EngineError::new_cancelled(err.event_details().clone())));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(err) if err.is_transient() => return Err(Box::new((*err).into_permanent())),
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventDetails, Stage, TeardownStep, Transmitter};
    use crate::models::AccountContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn details() -> EventDetails {
        let ctx = AccountContext {
            account_name: "sandbox".to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
        };
        EventDetails::new(&ctx, Stage::Teardown(TeardownStep::Delete), Transmitter::Engine)
    }

    fn permanent_error() -> Box<EngineError> {
        Box::new(EngineError::new_validation_error(details(), "bad request".to_string()))
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = with_transient_retries(&CancellationToken::new(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(permanent_error()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = with_transient_retries(&CancellationToken::new(), || async { Ok::<_, Box<EngineError>>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_outcome_predicates() {
        assert!(ResourceOutcome::Deleted.is_deleted());
        assert!(ResourceOutcome::FailedTimedOut.is_failure());
        assert!(ResourceOutcome::Blocked {
            reason: "upstream timed out".to_string()
        }
        .is_failure());
        assert!(ResourceOutcome::SkippedProtected {
            reason: "service-linked".to_string()
        }
        .is_skipped());
        assert!(!ResourceOutcome::WouldDelete.is_failure());
    }

    #[test]
    fn test_outcome_serde_shape() {
        let json = serde_json::to_string(&ResourceOutcome::SkippedShared {
            reason: "referenced by 7 interfaces".to_string(),
        })
        .unwrap();
        assert!(json.contains("SkippedShared"));
        assert!(json.contains("referenced by 7 interfaces"));
    }
}
