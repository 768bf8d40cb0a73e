use crate::inventory::RegionInventory;
use itertools::Itertools;

/// Second inventory pass: marks every security group with the set of
/// instances that reference it. The initial discovery pass deliberately does
/// not distinguish attached from unattached groups.
pub fn correlate_security_groups(inventory: &mut RegionInventory) {
    let mut attachments = inventory
        .instances
        .iter()
        .flat_map(|instance| {
            instance
                .security_group_ids
                .iter()
                .map(|group_id| (group_id.as_str(), instance.resource.id.clone()))
        })
        .into_group_map();

    for group in &mut inventory.security_groups {
        group.attached_instance_ids = attachments.remove(group.resource.id.as_str()).unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{Ec2Instance, SecurityGroupRecord};
    use crate::models::{Account, AccountContext, ResourceKind, ResourceRef};

    fn ctx() -> AccountContext {
        AccountContext::new(
            &Account {
                name: "sandbox".to_string(),
                id: "123456789012".to_string(),
                email: String::new(),
                access_key: "AKIA".to_string(),
                secret_key: "secret".to_string(),
                default_regions: vec![],
            },
            "us-east-1",
        )
    }

    fn instance(id: &str, groups: &[&str]) -> Ec2Instance {
        Ec2Instance {
            resource: ResourceRef::new(ResourceKind::Instance, id, id, &ctx()),
            instance_type: Some("t3.medium".to_string()),
            vpc_id: Some("vpc-1".to_string()),
            security_group_ids: groups.iter().map(|g| g.to_string()).collect(),
            private_ip: None,
            public_ip: None,
        }
    }

    fn group(id: &str) -> SecurityGroupRecord {
        SecurityGroupRecord {
            resource: ResourceRef::new(ResourceKind::SecurityGroup, id, id, &ctx()),
            vpc_id: Some("vpc-1".to_string()),
            description: String::new(),
            ingress_rule_count: 0,
            egress_rule_count: 1,
            attached_instance_ids: Vec::new(),
        }
    }

    #[test]
    fn test_correlate_marks_attached_and_unattached_groups() {
        // setup:
        let mut inventory = RegionInventory {
            instances: vec![instance("i-1", &["sg-a", "sg-b"]), instance("i-2", &["sg-a"])],
            security_groups: vec![group("sg-a"), group("sg-b"), group("sg-unattached")],
            ..Default::default()
        };

        // execute:
        correlate_security_groups(&mut inventory);

        // verify:
        let by_id = |id: &str| {
            inventory
                .security_groups
                .iter()
                .find(|g| g.resource.id == id)
                .unwrap()
        };
        assert_eq!(by_id("sg-a").attached_instance_ids, vec!["i-1", "i-2"]);
        assert_eq!(by_id("sg-b").attached_instance_ids, vec!["i-1"]);
        assert!(by_id("sg-unattached").attached_instance_ids.is_empty());
    }
}
