use async_trait::async_trait;
use aws_sdk_eks::error::SdkError;
use aws_sdk_eks::operation::delete_addon::{DeleteAddonError, DeleteAddonOutput};
use aws_sdk_eks::operation::delete_cluster::{DeleteClusterError, DeleteClusterOutput};
use aws_sdk_eks::operation::delete_nodegroup::{DeleteNodegroupError, DeleteNodegroupOutput};
use aws_sdk_eks::operation::describe_addon::{DescribeAddonError, DescribeAddonOutput};
use aws_sdk_eks::operation::describe_cluster::{DescribeClusterError, DescribeClusterOutput};
use aws_sdk_eks::operation::describe_nodegroup::{DescribeNodegroupError, DescribeNodegroupOutput};
use aws_sdk_eks::operation::list_addons::ListAddonsError;
use aws_sdk_eks::operation::list_clusters::ListClustersError;
use aws_sdk_eks::operation::list_nodegroups::ListNodegroupsError;
use aws_types::SdkConfig;

#[async_trait]
pub trait SweeperAwsSdkEks {
    async fn list_all_clusters(&self) -> Result<Vec<String>, SdkError<ListClustersError>>;
    async fn describe_cluster(&self, cluster_name: &str)
        -> Result<DescribeClusterOutput, SdkError<DescribeClusterError>>;
    async fn list_all_nodegroups(&self, cluster_name: &str) -> Result<Vec<String>, SdkError<ListNodegroupsError>>;
    async fn describe_nodegroup(
        &self,
        cluster_name: &str,
        nodegroup_name: &str,
    ) -> Result<DescribeNodegroupOutput, SdkError<DescribeNodegroupError>>;
    async fn delete_nodegroup(
        &self,
        cluster_name: &str,
        nodegroup_name: &str,
    ) -> Result<DeleteNodegroupOutput, SdkError<DeleteNodegroupError>>;
    async fn delete_cluster(&self, cluster_name: &str) -> Result<DeleteClusterOutput, SdkError<DeleteClusterError>>;
    async fn list_all_addons(&self, cluster_name: &str) -> Result<Vec<String>, SdkError<ListAddonsError>>;
    async fn describe_addon(
        &self,
        cluster_name: &str,
        addon_name: &str,
    ) -> Result<DescribeAddonOutput, SdkError<DescribeAddonError>>;
    async fn delete_addon(
        &self,
        cluster_name: &str,
        addon_name: &str,
    ) -> Result<DeleteAddonOutput, SdkError<DeleteAddonError>>;
}

#[async_trait]
impl SweeperAwsSdkEks for SdkConfig {
    async fn list_all_clusters(&self) -> Result<Vec<String>, SdkError<ListClustersError>> {
        let client = aws_sdk_eks::Client::new(self);
        let mut stream = client.list_clusters().into_paginator().items().send();

        let mut clusters = Vec::new();
        while let Some(cluster) = stream.next().await {
            clusters.push(cluster?);
        }
        Ok(clusters)
    }

    async fn describe_cluster(
        &self,
        cluster_name: &str,
    ) -> Result<DescribeClusterOutput, SdkError<DescribeClusterError>> {
        let client = aws_sdk_eks::Client::new(self);
        client.describe_cluster().name(cluster_name).send().await
    }

    async fn list_all_nodegroups(&self, cluster_name: &str) -> Result<Vec<String>, SdkError<ListNodegroupsError>> {
        let client = aws_sdk_eks::Client::new(self);
        let mut stream = client
            .list_nodegroups()
            .cluster_name(cluster_name)
            .into_paginator()
            .items()
            .send();

        let mut nodegroups = Vec::new();
        while let Some(nodegroup) = stream.next().await {
            nodegroups.push(nodegroup?);
        }
        Ok(nodegroups)
    }

    async fn describe_nodegroup(
        &self,
        cluster_name: &str,
        nodegroup_name: &str,
    ) -> Result<DescribeNodegroupOutput, SdkError<DescribeNodegroupError>> {
        let client = aws_sdk_eks::Client::new(self);
        client
            .describe_nodegroup()
            .cluster_name(cluster_name)
            .nodegroup_name(nodegroup_name)
            .send()
            .await
    }

    async fn delete_nodegroup(
        &self,
        cluster_name: &str,
        nodegroup_name: &str,
    ) -> Result<DeleteNodegroupOutput, SdkError<DeleteNodegroupError>> {
        let client = aws_sdk_eks::Client::new(self);
        client
            .delete_nodegroup()
            .cluster_name(cluster_name)
            .nodegroup_name(nodegroup_name)
            .send()
            .await
    }

    async fn delete_cluster(&self, cluster_name: &str) -> Result<DeleteClusterOutput, SdkError<DeleteClusterError>> {
        let client = aws_sdk_eks::Client::new(self);
        client.delete_cluster().name(cluster_name).send().await
    }

    async fn list_all_addons(&self, cluster_name: &str) -> Result<Vec<String>, SdkError<ListAddonsError>> {
        let client = aws_sdk_eks::Client::new(self);
        let mut stream = client
            .list_addons()
            .cluster_name(cluster_name)
            .into_paginator()
            .items()
            .send();

        let mut addons = Vec::new();
        while let Some(addon) = stream.next().await {
            addons.push(addon?);
        }
        Ok(addons)
    }

    async fn describe_addon(
        &self,
        cluster_name: &str,
        addon_name: &str,
    ) -> Result<DescribeAddonOutput, SdkError<DescribeAddonError>> {
        let client = aws_sdk_eks::Client::new(self);
        client
            .describe_addon()
            .cluster_name(cluster_name)
            .addon_name(addon_name)
            .send()
            .await
    }

    async fn delete_addon(
        &self,
        cluster_name: &str,
        addon_name: &str,
    ) -> Result<DeleteAddonOutput, SdkError<DeleteAddonError>> {
        let client = aws_sdk_eks::Client::new(self);
        client
            .delete_addon()
            .cluster_name(cluster_name)
            .addon_name(addon_name)
            .send()
            .await
    }
}
