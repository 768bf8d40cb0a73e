use crate::cloud::sdk::ec2::SweeperAwsSdkEc2;
use crate::cloud::sdk::sdk_datetime_to_utc;
use crate::inventory::{Ec2Instance, SecurityGroupRecord};
use crate::logger::Logger;
use crate::models::{AccountContext, ResourceKind, ResourceRef};
use aws_sdk_ec2::types::Tag;
use aws_types::SdkConfig;
use std::collections::BTreeMap;

fn tags_to_map(tags: &[Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|t| t.key().map(|k| (k.to_string(), t.value().unwrap_or_default().to_string())))
        .collect()
}

fn name_from_tags(tags: &BTreeMap<String, String>, fallback: &str) -> String {
    tags.get("Name").cloned().unwrap_or_else(|| fallback.to_string())
}

pub async fn discover_instances(
    config: &SdkConfig,
    ctx: &AccountContext,
    _logger: &dyn Logger,
) -> Result<Vec<Ec2Instance>, String> {
    let instances = config.list_all_instances().await.map_err(|e| format!("{e:?}"))?;

    let mut records = Vec::with_capacity(instances.len());
    for instance in instances {
        let id = match instance.instance_id() {
            Some(id) => id.to_string(),
            None => continue,
        };
        let tags = tags_to_map(instance.tags());
        let name = name_from_tags(&tags, &id);

        let mut resource = ResourceRef::new(ResourceKind::Instance, id, name, ctx)
            .with_tags(tags)
            .with_created_at(instance.launch_time().and_then(sdk_datetime_to_utc));
        if let Some(state) = instance.state().and_then(|s| s.name()) {
            resource = resource.with_state(state.as_str());
        }

        records.push(Ec2Instance {
            resource,
            instance_type: instance.instance_type().map(|t| t.as_str().to_string()),
            vpc_id: instance.vpc_id().map(str::to_string),
            security_group_ids: instance
                .security_groups()
                .iter()
                .filter_map(|g| g.group_id())
                .map(str::to_string)
                .collect(),
            private_ip: instance.private_ip_address().map(str::to_string),
            public_ip: instance.public_ip_address().map(str::to_string),
        });
    }

    Ok(records)
}

/// First pass only: attached-instance sets are resolved afterwards by the
/// correlate step, from the instance list.
pub async fn discover_security_groups(
    config: &SdkConfig,
    ctx: &AccountContext,
    _logger: &dyn Logger,
) -> Result<Vec<SecurityGroupRecord>, String> {
    let groups = config.list_security_groups(None).await.map_err(|e| format!("{e:?}"))?;

    let mut records = Vec::with_capacity(groups.len());
    for group in groups {
        let id = match group.group_id() {
            Some(id) => id.to_string(),
            None => continue,
        };
        let tags = tags_to_map(group.tags());
        let name = group
            .group_name()
            .map(str::to_string)
            .unwrap_or_else(|| name_from_tags(&tags, &id));

        records.push(SecurityGroupRecord {
            resource: ResourceRef::new(ResourceKind::SecurityGroup, id, name, ctx).with_tags(tags),
            vpc_id: group.vpc_id().map(str::to_string),
            description: group.description().unwrap_or_default().to_string(),
            ingress_rule_count: group.ip_permissions().len(),
            egress_rule_count: group.ip_permissions_egress().len(),
            attached_instance_ids: Vec::new(),
        });
    }

    Ok(records)
}
