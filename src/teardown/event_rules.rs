use crate::cloud::sdk::eventbridge::SweeperAwsSdkEventBridge;
use crate::errors::EngineError;
use crate::events::{EventDetails, Stage, TeardownStep, Transmitter};
use crate::models::{AccountContext, ResourceKind, ResourceRef, RunContext};
use crate::teardown::{with_transient_retries, ResourceOutcome};
use aws_types::SdkConfig;

fn details(ctx: &AccountContext, step: TeardownStep, rule_name: &str) -> EventDetails {
    EventDetails::new(
        ctx,
        Stage::Teardown(step),
        Transmitter::Resource(ResourceKind::EventRule, rule_name.to_string()),
    )
}

/// Removes every target from a rule. A rule cannot be deleted while it still
/// has targets attached.
pub async fn remove_targets(
    config: &SdkConfig,
    ctx: &AccountContext,
    rule: &ResourceRef,
    run: &RunContext,
) -> Result<(), Box<EngineError>> {
    let step_details = details(ctx, TeardownStep::RemoveTargets, &rule.id);

    let targets = match config.list_rule_targets(&rule.id).await {
        Ok(targets) => targets,
        Err(e) => {
            let err = EngineError::new_from_aws_sdk_error(step_details, "ListTargetsByRule", &e);
            if err.is_not_found() {
                return Ok(());
            }
            return Err(Box::new(err));
        }
    };
    if targets.is_empty() {
        return Ok(());
    }

    let target_ids: Vec<String> = targets.iter().map(|t| t.id().to_string()).collect();

    with_transient_retries(&run.cancel, || {
        let target_ids = target_ids.clone();
        let step_details = details(ctx, TeardownStep::RemoveTargets, &rule.id);
        async move {
            match config.remove_rule_targets(&rule.id, target_ids).await {
                Ok(_) => Ok(()),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "RemoveTargets", &e);
                    if err.is_not_found() {
                        Ok(())
                    } else {
                        Err(Box::new(err))
                    }
                }
            }
        }
    })
    .await
}

pub async fn delete_rule(
    config: &SdkConfig,
    ctx: &AccountContext,
    rule: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, &rule.id);
        async move {
            match config.delete_rule(&rule.id).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "DeleteRule", &e);
                    if err.is_not_found() {
                        Ok(ResourceOutcome::Deleted)
                    } else {
                        Err(Box::new(err))
                    }
                }
            }
        }
    })
    .await
}
