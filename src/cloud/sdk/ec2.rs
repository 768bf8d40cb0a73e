use async_trait::async_trait;
use aws_sdk_ec2::error::SdkError;
use aws_sdk_ec2::operation::delete_launch_template::{DeleteLaunchTemplateError, DeleteLaunchTemplateOutput};
use aws_sdk_ec2::operation::delete_security_group::{DeleteSecurityGroupError, DeleteSecurityGroupOutput};
use aws_sdk_ec2::operation::delete_volume::{DeleteVolumeError, DeleteVolumeOutput};
use aws_sdk_ec2::operation::describe_instances::DescribeInstancesError;
use aws_sdk_ec2::operation::describe_network_interfaces::DescribeNetworkInterfacesError;
use aws_sdk_ec2::operation::describe_security_groups::DescribeSecurityGroupsError;
use aws_sdk_ec2::operation::describe_volumes::DescribeVolumesError;
use aws_sdk_ec2::operation::revoke_security_group_egress::{
    RevokeSecurityGroupEgressError, RevokeSecurityGroupEgressOutput,
};
use aws_sdk_ec2::operation::revoke_security_group_ingress::{
    RevokeSecurityGroupIngressError, RevokeSecurityGroupIngressOutput,
};
use aws_sdk_ec2::operation::terminate_instances::{TerminateInstancesError, TerminateInstancesOutput};
use aws_sdk_ec2::types::{Filter, Instance, IpPermission, SecurityGroup, Volume};
use aws_types::SdkConfig;

#[async_trait]
pub trait SweeperAwsSdkEc2 {
    async fn list_all_instances(&self) -> Result<Vec<Instance>, SdkError<DescribeInstancesError>>;
    async fn get_instance_state(&self, instance_id: &str) -> Result<Option<String>, SdkError<DescribeInstancesError>>;
    async fn terminate_instance(&self, instance_id: &str)
        -> Result<TerminateInstancesOutput, SdkError<TerminateInstancesError>>;
    async fn list_security_groups(
        &self,
        vpc_id: Option<&str>,
    ) -> Result<Vec<SecurityGroup>, SdkError<DescribeSecurityGroupsError>>;
    async fn get_security_group(
        &self,
        group_id: &str,
    ) -> Result<Option<SecurityGroup>, SdkError<DescribeSecurityGroupsError>>;
    async fn count_network_interfaces_using_group(
        &self,
        group_id: &str,
    ) -> Result<usize, SdkError<DescribeNetworkInterfacesError>>;
    async fn revoke_ingress_rule(
        &self,
        group_id: &str,
        permission: IpPermission,
    ) -> Result<RevokeSecurityGroupIngressOutput, SdkError<RevokeSecurityGroupIngressError>>;
    async fn revoke_egress_rule(
        &self,
        group_id: &str,
        permission: IpPermission,
    ) -> Result<RevokeSecurityGroupEgressOutput, SdkError<RevokeSecurityGroupEgressError>>;
    async fn delete_security_group(
        &self,
        group_id: &str,
    ) -> Result<DeleteSecurityGroupOutput, SdkError<DeleteSecurityGroupError>>;
    async fn list_volumes_for_instance(
        &self,
        instance_id: &str,
    ) -> Result<Vec<Volume>, SdkError<DescribeVolumesError>>;
    async fn delete_volume(&self, volume_id: &str) -> Result<DeleteVolumeOutput, SdkError<DeleteVolumeError>>;
    async fn delete_launch_template(
        &self,
        launch_template_id: &str,
    ) -> Result<DeleteLaunchTemplateOutput, SdkError<DeleteLaunchTemplateError>>;
}

#[async_trait]
impl SweeperAwsSdkEc2 for SdkConfig {
    async fn list_all_instances(&self) -> Result<Vec<Instance>, SdkError<DescribeInstancesError>> {
        let client = aws_sdk_ec2::Client::new(self);
        let mut stream = client.describe_instances().into_paginator().items().send();

        let mut instances = Vec::new();
        while let Some(reservation) = stream.next().await {
            instances.extend(reservation?.instances.unwrap_or_default());
        }
        Ok(instances)
    }

    async fn get_instance_state(&self, instance_id: &str) -> Result<Option<String>, SdkError<DescribeInstancesError>> {
        let client = aws_sdk_ec2::Client::new(self);
        let output = client.describe_instances().instance_ids(instance_id).send().await?;

        let state = output
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .find(|i| i.instance_id() == Some(instance_id))
            .and_then(|i| i.state())
            .and_then(|s| s.name())
            .map(|n| n.as_str().to_string());
        Ok(state)
    }

    async fn terminate_instance(
        &self,
        instance_id: &str,
    ) -> Result<TerminateInstancesOutput, SdkError<TerminateInstancesError>> {
        let client = aws_sdk_ec2::Client::new(self);
        client.terminate_instances().instance_ids(instance_id).send().await
    }

    async fn list_security_groups(
        &self,
        vpc_id: Option<&str>,
    ) -> Result<Vec<SecurityGroup>, SdkError<DescribeSecurityGroupsError>> {
        let client = aws_sdk_ec2::Client::new(self);
        let mut request = client.describe_security_groups();
        if let Some(vpc_id) = vpc_id {
            request = request.filters(Filter::builder().name("vpc-id").values(vpc_id).build());
        }

        let mut stream = request.into_paginator().items().send();
        let mut groups = Vec::new();
        while let Some(group) = stream.next().await {
            groups.push(group?);
        }
        Ok(groups)
    }

    async fn get_security_group(
        &self,
        group_id: &str,
    ) -> Result<Option<SecurityGroup>, SdkError<DescribeSecurityGroupsError>> {
        let client = aws_sdk_ec2::Client::new(self);
        let output = client.describe_security_groups().group_ids(group_id).send().await?;
        Ok(output.security_groups.unwrap_or_default().into_iter().next())
    }

    async fn count_network_interfaces_using_group(
        &self,
        group_id: &str,
    ) -> Result<usize, SdkError<DescribeNetworkInterfacesError>> {
        let client = aws_sdk_ec2::Client::new(self);
        let mut stream = client
            .describe_network_interfaces()
            .filters(Filter::builder().name("group-id").values(group_id).build())
            .into_paginator()
            .items()
            .send();

        let mut count = 0usize;
        while let Some(interface) = stream.next().await {
            interface?;
            count += 1;
        }
        Ok(count)
    }

    async fn revoke_ingress_rule(
        &self,
        group_id: &str,
        permission: IpPermission,
    ) -> Result<RevokeSecurityGroupIngressOutput, SdkError<RevokeSecurityGroupIngressError>> {
        let client = aws_sdk_ec2::Client::new(self);
        client
            .revoke_security_group_ingress()
            .group_id(group_id)
            .ip_permissions(permission)
            .send()
            .await
    }

    async fn revoke_egress_rule(
        &self,
        group_id: &str,
        permission: IpPermission,
    ) -> Result<RevokeSecurityGroupEgressOutput, SdkError<RevokeSecurityGroupEgressError>> {
        let client = aws_sdk_ec2::Client::new(self);
        client
            .revoke_security_group_egress()
            .group_id(group_id)
            .ip_permissions(permission)
            .send()
            .await
    }

    async fn delete_security_group(
        &self,
        group_id: &str,
    ) -> Result<DeleteSecurityGroupOutput, SdkError<DeleteSecurityGroupError>> {
        let client = aws_sdk_ec2::Client::new(self);
        client.delete_security_group().group_id(group_id).send().await
    }

    async fn list_volumes_for_instance(
        &self,
        instance_id: &str,
    ) -> Result<Vec<Volume>, SdkError<DescribeVolumesError>> {
        let client = aws_sdk_ec2::Client::new(self);
        let mut stream = client
            .describe_volumes()
            .filters(
                Filter::builder()
                    .name("attachment.instance-id")
                    .values(instance_id)
                    .build(),
            )
            .into_paginator()
            .items()
            .send();

        let mut volumes = Vec::new();
        while let Some(volume) = stream.next().await {
            volumes.push(volume?);
        }
        Ok(volumes)
    }

    async fn delete_volume(&self, volume_id: &str) -> Result<DeleteVolumeOutput, SdkError<DeleteVolumeError>> {
        let client = aws_sdk_ec2::Client::new(self);
        client.delete_volume().volume_id(volume_id).send().await
    }

    async fn delete_launch_template(
        &self,
        launch_template_id: &str,
    ) -> Result<DeleteLaunchTemplateOutput, SdkError<DeleteLaunchTemplateError>> {
        let client = aws_sdk_ec2::Client::new(self);
        client
            .delete_launch_template()
            .launch_template_id(launch_template_id)
            .send()
            .await
    }
}
