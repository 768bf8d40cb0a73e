use crate::cloud::sdk::ec2::SweeperAwsSdkEc2;
use crate::errors::EngineError;
use crate::events::{EngineEvent, EventDetails, EventMessage, Stage, TeardownStep, Transmitter};
use crate::logger::Logger;
use crate::models::{AccountContext, ResourceKind, ResourceRef, RunContext};
use crate::teardown::plan::WaitSpec;
use crate::teardown::waiter::{await_until, WaitOutcome};
use crate::teardown::{with_transient_retries, ResourceOutcome};
use aws_types::SdkConfig;

/// Instances launched from a launch template carry the template id as a
/// provider-managed tag.
const LAUNCH_TEMPLATE_ID_TAG: &str = "aws:ec2launchtemplate:id";

fn details(ctx: &AccountContext, step: TeardownStep, instance_id: &str) -> EventDetails {
    EventDetails::new(
        ctx,
        Stage::Teardown(step),
        Transmitter::Resource(ResourceKind::Instance, instance_id.to_string()),
    )
}

pub async fn terminate_instance(
    config: &SdkConfig,
    ctx: &AccountContext,
    instance: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, &instance.id);
        async move {
            match config.terminate_instance(&instance.id).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "TerminateInstances", &e);
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

/// Terminated is terminal for an instance; NotFound (very old instances are
/// reaped from describe entirely) counts the same.
pub async fn await_instance_terminated(
    config: &SdkConfig,
    ctx: &AccountContext,
    instance: &ResourceRef,
    wait: &WaitSpec,
    run: &RunContext,
) -> Result<WaitOutcome, Box<EngineError>> {
    let step_details = details(ctx, TeardownStep::AwaitAbsence, &instance.id);

    await_until(
        || {
            let step_details = step_details.clone();
            async move {
                match config.get_instance_state(&instance.id).await {
                    Ok(state) => Ok(matches!(state.as_deref(), None | Some("terminated"))),
                    Err(e) => {
                        let err = EngineError::new_from_aws_sdk_error(step_details, "DescribeInstances", &e);
                        if err.is_not_found() {
                            Ok(true)
                        } else {
                            Err(Box::new(err))
                        }
                    }
                }
            }
        },
        wait.poll,
        wait.timeout,
        &run.cancel,
    )
    .await
}

/// Post-termination residuals: leftover volumes that did not delete on
/// termination, and the launch template the instance was stamped from.
/// Failures here are warnings, not run failures.
pub async fn cleanup_residuals(
    config: &SdkConfig,
    ctx: &AccountContext,
    instance: &ResourceRef,
    run: &RunContext,
    logger: &dyn Logger,
) {
    if run.is_cancelled() {
        return;
    }
    let step_details = details(ctx, TeardownStep::Detach, &instance.id);

    match config.list_volumes_for_instance(&instance.id).await {
        Ok(volumes) => {
            for volume in volumes {
                let Some(volume_id) = volume.volume_id() else {
                    continue;
                };
                if let Err(e) = config.delete_volume(volume_id).await {
                    let err = EngineError::new_from_aws_sdk_error(step_details.clone(), "DeleteVolume", &e);
                    if !err.is_not_found() {
                        logger.log(EngineEvent::Warning(
                            step_details.clone(),
                            EventMessage::new(
                                format!("volume {volume_id} of {} left behind", instance.id),
                                Some(err.to_string()),
                            ),
                        ));
                    }
                }
            }
        }
        Err(e) => {
            logger.log(EngineEvent::Warning(
                step_details.clone(),
                EventMessage::new(
                    format!("cannot list volumes of {}", instance.id),
                    Some(format!("{e:?}")),
                ),
            ));
        }
    }

    if let Some(template_id) = instance.tag(LAUNCH_TEMPLATE_ID_TAG) {
        if let Err(e) = config.delete_launch_template(template_id).await {
            let err = EngineError::new_from_aws_sdk_error(step_details.clone(), "DeleteLaunchTemplate", &e);
            if !err.is_not_found() {
                logger.log(EngineEvent::Warning(
                    step_details,
                    EventMessage::new(
                        format!("launch template {template_id} of {} left behind", instance.id),
                        Some(err.to_string()),
                    ),
                ));
            }
        }
    }
}
