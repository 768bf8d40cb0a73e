use crate::cloud::sdk::eks::SweeperAwsSdkEks;
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

pub async fn delete_nodegroup(
    config: &SdkConfig,
    ctx: &AccountContext,
    cluster_name: &str,
    nodegroup: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, ResourceKind::NodeGroup, &nodegroup.id);
        async move {
            match config.delete_nodegroup(cluster_name, &nodegroup.id).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "DeleteNodegroup", &e);
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

/// A nodegroup is absent once describe returns NotFound; any successful
/// describe (DELETING included) keeps the wait polling.
pub async fn await_nodegroup_absence(
    config: &SdkConfig,
    ctx: &AccountContext,
    cluster_name: &str,
    nodegroup: &ResourceRef,
    wait: &WaitSpec,
    run: &RunContext,
) -> Result<WaitOutcome, Box<EngineError>> {
    let step_details = details(ctx, TeardownStep::AwaitAbsence, ResourceKind::NodeGroup, &nodegroup.id);

    await_until(
        || {
            let step_details = step_details.clone();
            async move {
                match config.describe_nodegroup(cluster_name, &nodegroup.id).await {
                    // any successful describe means the nodegroup still exists
                    Ok(_) => Ok(false),
                    Err(e) => {
                        let err = EngineError::new_from_aws_sdk_error(step_details, "DescribeNodegroup", &e);
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

pub async fn delete_cluster(
    config: &SdkConfig,
    ctx: &AccountContext,
    cluster: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, ResourceKind::Cluster, &cluster.id);
        async move {
            match config.delete_cluster(&cluster.id).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "DeleteCluster", &e);
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

pub async fn await_cluster_absence(
    config: &SdkConfig,
    ctx: &AccountContext,
    cluster: &ResourceRef,
    wait: &WaitSpec,
    run: &RunContext,
) -> Result<WaitOutcome, Box<EngineError>> {
    let step_details = details(ctx, TeardownStep::AwaitAbsence, ResourceKind::Cluster, &cluster.id);

    await_until(
        || {
            let step_details = step_details.clone();
            async move {
                match config.describe_cluster(&cluster.id).await {
                    Ok(_) => Ok(false),
                    Err(e) => {
                        let err = EngineError::new_from_aws_sdk_error(step_details, "DescribeCluster", &e);
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
