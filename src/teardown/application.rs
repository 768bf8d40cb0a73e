use crate::cloud::sdk::beanstalk::SweeperAwsSdkBeanstalk;
use crate::errors::EngineError;
use crate::events::{EventDetails, Stage, TeardownStep, Transmitter};
use crate::models::{AccountContext, ResourceKind, ResourceRef, RunContext};
use crate::teardown::plan::WaitSpec;
use crate::teardown::waiter::{await_until, WaitOutcome};
use crate::teardown::{with_transient_retries, ResourceOutcome};
use aws_types::SdkConfig;

fn details(ctx: &AccountContext, step: TeardownStep, kind: ResourceKind, id: &str) -> EventDetails {
    EventDetails::new(ctx, Stage::Teardown(step), Transmitter::Resource(kind, id.to_string()))
}

/// Terminates an environment with its resource cascade.
pub async fn terminate_environment(
    config: &SdkConfig,
    ctx: &AccountContext,
    environment: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, ResourceKind::AppEnvironment, &environment.id);
        async move {
            match config.terminate_environment(&environment.id).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "TerminateEnvironment", &e);
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

/// An environment is absent when describe no longer returns it or reports it
/// Terminated.
pub async fn await_environment_terminated(
    config: &SdkConfig,
    ctx: &AccountContext,
    environment: &ResourceRef,
    wait: &WaitSpec,
    run: &RunContext,
) -> Result<WaitOutcome, Box<EngineError>> {
    let step_details = details(
        ctx,
        TeardownStep::AwaitAbsence,
        ResourceKind::AppEnvironment,
        &environment.id,
    );

    await_until(
        || {
            let step_details = step_details.clone();
            async move {
                match config.get_environment(&environment.id).await {
                    Ok(None) => Ok(true),
                    Ok(Some(live)) => Ok(live
                        .status()
                        .map(|s| s.as_str() == "Terminated")
                        .unwrap_or(false)),
                    Err(e) => {
                        let err = EngineError::new_from_aws_sdk_error(step_details, "DescribeEnvironments", &e);
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

pub async fn delete_application_version(
    config: &SdkConfig,
    ctx: &AccountContext,
    version: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    let (application_name, version_label) = match version.id.split_once('/') {
        Some((application_name, version_label)) => (application_name, version_label),
        None => (version.id.as_str(), version.name.as_str()),
    };

    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, ResourceKind::AppVersion, &version.id);
        async move {
            match config.delete_application_version(application_name, version_label).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "DeleteApplicationVersion", &e);
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

pub async fn delete_application(
    config: &SdkConfig,
    ctx: &AccountContext,
    application: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, ResourceKind::Application, &application.id);
        async move {
            match config.delete_application(&application.id).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "DeleteApplication", &e);
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
