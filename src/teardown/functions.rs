use crate::cloud::sdk::lambda::SweeperAwsSdkLambda;
use crate::errors::EngineError;
use crate::events::{EventDetails, Stage, TeardownStep, Transmitter};
use crate::models::{AccountContext, ResourceKind, ResourceRef, RunContext};
use crate::teardown::{with_transient_retries, ResourceOutcome};
use aws_types::SdkConfig;

fn details(ctx: &AccountContext, step: TeardownStep, function_name: &str) -> EventDetails {
    EventDetails::new(
        ctx,
        Stage::Teardown(step),
        Transmitter::Resource(ResourceKind::Function, function_name.to_string()),
    )
}

/// Deletes the function's event-source mappings so nothing keeps invoking it
/// while (or after) it goes away.
pub async fn detach_event_sources(
    config: &SdkConfig,
    ctx: &AccountContext,
    function: &ResourceRef,
    _run: &RunContext,
) -> Result<(), Box<EngineError>> {
    let step_details = details(ctx, TeardownStep::Detach, &function.id);

    let mappings = match config.list_event_source_mappings(&function.id).await {
        Ok(mappings) => mappings,
        Err(e) => {
            let err = EngineError::new_from_aws_sdk_error(step_details, "ListEventSourceMappings", &e);
            if err.is_not_found() {
                return Ok(());
            }
            return Err(Box::new(err));
        }
    };

    for mapping in mappings {
        let Some(uuid) = mapping.uuid() else {
            continue;
        };
        if let Err(e) = config.delete_event_source_mapping(uuid).await {
            let err = EngineError::new_from_aws_sdk_error(
                details(ctx, TeardownStep::Detach, &function.id),
                "DeleteEventSourceMapping",
                &e,
            );
            if !err.is_not_found() {
                return Err(Box::new(err));
            }
        }
    }

    Ok(())
}

pub async fn delete_function(
    config: &SdkConfig,
    ctx: &AccountContext,
    function: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, &function.id);
        async move {
            match config.delete_function(&function.id).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "DeleteFunction", &e);
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
