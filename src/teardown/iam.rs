use crate::classifier::attached_policy_names_look_shared;
use crate::cloud::sdk::iam::SweeperAwsSdkIam;
use crate::errors::EngineError;
use crate::events::{EventDetails, Stage, TeardownStep, Transmitter};
use crate::models::{AccountContext, ResourceKind, ResourceRef, RunContext};
use crate::teardown::{with_transient_retries, ResourceOutcome};
use aws_types::SdkConfig;

fn details(ctx: &AccountContext, step: TeardownStep, kind: ResourceKind, id: &str) -> EventDetails {
    EventDetails::new(ctx, Stage::Teardown(step), Transmitter::Resource(kind, id.to_string()))
}

#[derive(Debug, PartialEq, Eq)]
pub enum RolePrep {
    Ready,
    /// Execution-time downgrade: the role's attached policies indicate it
    /// serves more than this target, so classification is overruled.
    SharedSkip(String),
}

/// Clears everything that blocks a role deletion: managed policy
/// attachments, inline policies, instance-profile memberships. `NoSuchEntity`
/// anywhere is idempotent success.
pub async fn prepare_role_deletion(
    config: &SdkConfig,
    ctx: &AccountContext,
    role: &ResourceRef,
    run: &RunContext,
) -> Result<RolePrep, Box<EngineError>> {
    let role_name = role.id.as_str();
    let detach_details = details(ctx, TeardownStep::Detach, ResourceKind::Role, role_name);

    let attached = match config.list_attached_role_policies(role_name).await {
        Ok(attached) => attached,
        Err(e) => {
            let err = EngineError::new_from_aws_sdk_error(detach_details.clone(), "ListAttachedRolePolicies", &e);
            if err.is_not_found() {
                return Ok(RolePrep::Ready);
            }
            return Err(Box::new(err));
        }
    };

    let attached_names: Vec<String> = attached
        .iter()
        .filter_map(|p| p.policy_name().map(str::to_string))
        .collect();
    if attached_policy_names_look_shared(&attached_names) {
        return Ok(RolePrep::SharedSkip(format!(
            "attached policies suggest a shared role: {}",
            attached_names.join(", ")
        )));
    }

    for policy in attached {
        let Some(policy_arn) = policy.policy_arn().map(str::to_string) else {
            continue;
        };
        with_transient_retries(&run.cancel, || {
            let policy_arn = policy_arn.clone();
            let detach_details = detach_details.clone();
            async move {
                match config.detach_role_policy(role_name, &policy_arn).await {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        let err = EngineError::new_from_aws_sdk_error(detach_details, "DetachRolePolicy", &e);
                        if err.is_not_found() {
                            Ok(())
                        } else {
                            Err(Box::new(err))
                        }
                    }
                }
            }
        })
        .await?;
    }

    let inline = config
        .list_inline_role_policies(role_name)
        .await
        .map_err(|e| Box::new(EngineError::new_from_aws_sdk_error(detach_details.clone(), "ListRolePolicies", &e)))?;
    for policy_name in inline {
        match config.delete_inline_role_policy(role_name, &policy_name).await {
            Ok(_) => {}
            Err(e) => {
                let err = EngineError::new_from_aws_sdk_error(detach_details.clone(), "DeleteRolePolicy", &e);
                if !err.is_not_found() {
                    return Err(Box::new(err));
                }
            }
        }
    }

    let profiles = config.list_instance_profiles_for_role(role_name).await.map_err(|e| {
        Box::new(EngineError::new_from_aws_sdk_error(
            detach_details.clone(),
            "ListInstanceProfilesForRole",
            &e,
        ))
    })?;
    for profile in profiles {
        let profile_name = profile.instance_profile_name();
        match config.remove_role_from_instance_profile(profile_name, role_name).await {
            Ok(_) => {}
            Err(e) => {
                let err =
                    EngineError::new_from_aws_sdk_error(detach_details.clone(), "RemoveRoleFromInstanceProfile", &e);
                if !err.is_not_found() {
                    return Err(Box::new(err));
                }
            }
        }
    }

    Ok(RolePrep::Ready)
}

pub async fn delete_role(
    config: &SdkConfig,
    ctx: &AccountContext,
    role: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    let delete_details = details(ctx, TeardownStep::Delete, ResourceKind::Role, &role.id);

    with_transient_retries(&run.cancel, || {
        let delete_details = delete_details.clone();
        async move {
            match config.delete_role(&role.id).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(delete_details, "DeleteRole", &e);
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

/// Deletes a customer-managed policy: non-default versions first, then every
/// principal attachment, then the policy itself.
pub async fn purge_and_delete_policy(
    config: &SdkConfig,
    ctx: &AccountContext,
    policy: &ResourceRef,
    run: &RunContext,
) -> Result<ResourceOutcome, Box<EngineError>> {
    let policy_arn = policy.id.as_str();
    let delete_details = details(ctx, TeardownStep::Delete, ResourceKind::Policy, policy_arn);

    let versions = match config.list_policy_versions(policy_arn).await {
        Ok(versions) => versions,
        Err(e) => {
            let err = EngineError::new_from_aws_sdk_error(delete_details.clone(), "ListPolicyVersions", &e);
            if err.is_not_found() {
                return Ok(ResourceOutcome::Deleted);
            }
            return Err(Box::new(err));
        }
    };
    for version in versions {
        if version.is_default_version() {
            continue;
        }
        let Some(version_id) = version.version_id() else {
            continue;
        };
        match config.delete_policy_version(policy_arn, version_id).await {
            Ok(_) => {}
            Err(e) => {
                let err = EngineError::new_from_aws_sdk_error(delete_details.clone(), "DeletePolicyVersion", &e);
                if !err.is_not_found() {
                    return Err(Box::new(err));
                }
            }
        }
    }

    let entities = config.list_entities_for_policy(policy_arn).await.map_err(|e| {
        Box::new(EngineError::new_from_aws_sdk_error(
            delete_details.clone(),
            "ListEntitiesForPolicy",
            &e,
        ))
    })?;
    for user in &entities.users {
        if let Some(user_name) = user.user_name() {
            if let Err(e) = config.detach_user_policy(user_name, policy_arn).await {
                let err = EngineError::new_from_aws_sdk_error(delete_details.clone(), "DetachUserPolicy", &e);
                if !err.is_not_found() {
                    return Err(Box::new(err));
                }
            }
        }
    }
    for group in &entities.groups {
        if let Some(group_name) = group.group_name() {
            if let Err(e) = config.detach_group_policy(group_name, policy_arn).await {
                let err = EngineError::new_from_aws_sdk_error(delete_details.clone(), "DetachGroupPolicy", &e);
                if !err.is_not_found() {
                    return Err(Box::new(err));
                }
            }
        }
    }
    for role in &entities.roles {
        if let Some(role_name) = role.role_name() {
            if let Err(e) = config.detach_role_policy(role_name, policy_arn).await {
                let err = EngineError::new_from_aws_sdk_error(delete_details.clone(), "DetachRolePolicy", &e);
                if !err.is_not_found() {
                    return Err(Box::new(err));
                }
            }
        }
    }

    with_transient_retries(&run.cancel, || {
        let delete_details = delete_details.clone();
        async move {
            match config.delete_policy(policy_arn).await {
                Ok(_) => Ok(ResourceOutcome::Deleted),
                Err(e) => {
                    let err = EngineError::new_from_aws_sdk_error(delete_details, "DeletePolicy", &e);
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
