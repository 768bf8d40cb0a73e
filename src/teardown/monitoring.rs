use crate::cloud::sdk::amp::SweeperAwsSdkAmp;
use crate::cloud::sdk::eks::SweeperAwsSdkEks;
use crate::cloud::sdk::grafana::SweeperAwsSdkGrafana;
use crate::cloud::sdk::logs::SweeperAwsSdkLogs;
use crate::errors::EngineError;
use crate::events::{EventDetails, Stage, TeardownStep, Transmitter};
use crate::models::{AccountContext, ResourceKind, ResourceRef, RunContext};
use crate::teardown::waiter::{await_until, WaitOutcome};
use crate::teardown::{with_transient_retries, ResourceOutcome};
use crate::teardown::plan::WaitSpec;
use aws_types::SdkConfig;

fn details(ctx: &AccountContext, step: TeardownStep, kind: ResourceKind, id: &str) -> EventDetails {
    EventDetails::new(ctx, Stage::Teardown(step), Transmitter::Resource(kind, id.to_string()))
}

pub async fn delete_scraper(
    config: &SdkConfig,
    ctx: &AccountContext,
    scraper: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, ResourceKind::Scraper, &scraper.id);
        async move {
            match config.delete_scraper(&scraper.id).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "DeleteScraper", &e);
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

/// Add-on subjects carry `cluster/addon` ids so the two halves travel in one
/// ref; split them back apart here.
fn split_addon_id(addon: &ResourceRef) -> (&str, &str) {
    match addon.id.split_once('/') {
        Some((cluster_name, addon_name)) => (cluster_name, addon_name),
        None => (addon.id.as_str(), addon.name.as_str()),
    }
}

pub async fn delete_addon(
    config: &SdkConfig,
    ctx: &AccountContext,
    addon: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    let (cluster_name, addon_name) = split_addon_id(addon);

    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, ResourceKind::Addon, &addon.id);
        async move {
            match config.delete_addon(cluster_name, addon_name).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "DeleteAddon", &e);
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

pub async fn await_addon_absence(
    config: &SdkConfig,
    ctx: &AccountContext,
    addon: &ResourceRef,
    wait: &WaitSpec,
    run: &RunContext,
) -> Result<WaitOutcome, Box<EngineError>> {
    let (cluster_name, addon_name) = split_addon_id(addon);
    let step_details = details(ctx, TeardownStep::AwaitAbsence, ResourceKind::Addon, &addon.id);

    await_until(
        || {
            let step_details = step_details.clone();
            async move {
                match config.describe_addon(cluster_name, addon_name).await {
                    Ok(output) => {
                        let deleting = output
                            .addon()
                            .and_then(|a| a.status())
                            .map(|s| s.as_str() == "DELETING")
                            .unwrap_or(false);
                        Ok(!deleting)
                    }
                    Err(e) => {
                        let err = EngineError::new_from_aws_sdk_error(step_details, "DescribeAddon", &e);
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

pub async fn delete_log_group(
    config: &SdkConfig,
    ctx: &AccountContext,
    log_group: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, ResourceKind::LogGroup, &log_group.id);
        async move {
            match config.delete_log_group(&log_group.id).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "DeleteLogGroup", &e);
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

pub async fn delete_workspace(
    config: &SdkConfig,
    ctx: &AccountContext,
    workspace: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    with_transient_retries(&run.cancel, || {
        let step_details = details(ctx, TeardownStep::Delete, ResourceKind::Workspace, &workspace.id);
        async move {
            match config.delete_workspace(&workspace.id).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(step_details, "DeleteWorkspace", &e);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountContext};

    #[test]
    fn test_split_addon_id() {
        let ctx = AccountContext::new(
            &Account {
                name: "sandbox".to_string(),
                id: "123456789012".to_string(),
                email: String::new(),
                access_key: "AKIA".to_string(),
                secret_key: "s".to_string(),
                default_regions: vec![],
            },
            "us-east-1",
        );
        let addon = ResourceRef::new(ResourceKind::Addon, "eks-demo-abcd/vpc-cni", "vpc-cni", &ctx);

        assert_eq!(split_addon_id(&addon), ("eks-demo-abcd", "vpc-cni"));
    }
}
