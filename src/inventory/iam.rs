use crate::cloud::sdk::iam::SweeperAwsSdkIam;
use crate::cloud::sdk::sdk_datetime_to_utc;
use crate::events::{EngineEvent, EventDetails, EventMessage, InventoryStep, Stage, Transmitter};
use crate::inventory::{IamPolicyRecord, IamRoleRecord};
use crate::logger::Logger;
use crate::models::{AccountContext, ResourceKind, ResourceRef};
use aws_types::SdkConfig;
use std::collections::BTreeMap;

/// IAM is a global service; the region of the resulting refs is the cell the
/// discovery ran in so reports stay cell-addressable.
pub async fn discover_roles(
    config: &SdkConfig,
    ctx: &AccountContext,
    logger: &dyn Logger,
) -> Result<Vec<IamRoleRecord>, String> {
    let roles = config.list_all_roles().await.map_err(|e| format!("{e:?}"))?;

    let mut records = Vec::with_capacity(roles.len());
    for role in roles {
        let role_name = role.role_name().to_string();

        // ListRoles does not return tags; fetch them per role, tolerating failure.
        let tags: BTreeMap<String, String> = match config.list_role_tags(&role_name).await {
            Ok(tags) => tags
                .iter()
                .map(|t| (t.key().to_string(), t.value().to_string()))
                .collect(),
            Err(e) => {
                let details = EventDetails::new(
                    ctx,
                    Stage::Inventory(InventoryStep::Discover),
                    Transmitter::Resource(ResourceKind::Role, role_name.clone()),
                );
                logger.log(EngineEvent::Warning(
                    details,
                    EventMessage::new(
                        format!("cannot read tags of role {role_name}"),
                        Some(format!("{e:?}")),
                    ),
                ));
                BTreeMap::new()
            }
        };

        records.push(IamRoleRecord {
            resource: ResourceRef::new(ResourceKind::Role, role_name.clone(), role_name, ctx)
                .with_tags(tags)
                .with_created_at(sdk_datetime_to_utc(role.create_date())),
            arn: role.arn().to_string(),
            path: role.path().to_string(),
        });
    }

    Ok(records)
}

pub async fn discover_policies(
    config: &SdkConfig,
    ctx: &AccountContext,
    _logger: &dyn Logger,
) -> Result<Vec<IamPolicyRecord>, String> {
    let policies = config.list_customer_managed_policies().await.map_err(|e| format!("{e:?}"))?;

    let mut records = Vec::with_capacity(policies.len());
    for policy in policies {
        let (Some(name), Some(arn)) = (policy.policy_name(), policy.arn()) else {
            continue;
        };

        records.push(IamPolicyRecord {
            resource: ResourceRef::new(ResourceKind::Policy, arn.to_string(), name.to_string(), ctx)
                .with_created_at(policy.create_date().and_then(sdk_datetime_to_utc)),
            arn: arn.to_string(),
            default_version_id: policy.default_version_id().map(str::to_string),
        });
    }

    Ok(records)
}
