use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::error::SdkError;
use aws_sdk_cloudwatchlogs::operation::delete_log_group::{DeleteLogGroupError, DeleteLogGroupOutput};
use aws_sdk_cloudwatchlogs::operation::describe_log_groups::DescribeLogGroupsError;
use aws_sdk_cloudwatchlogs::types::LogGroup;
use aws_types::SdkConfig;

#[async_trait]
pub trait SweeperAwsSdkLogs {
    async fn list_log_groups(&self, prefix: Option<&str>) -> Result<Vec<LogGroup>, SdkError<DescribeLogGroupsError>>;
    async fn delete_log_group(&self, name: &str) -> Result<DeleteLogGroupOutput, SdkError<DeleteLogGroupError>>;
}

#[async_trait]
impl SweeperAwsSdkLogs for SdkConfig {
    async fn list_log_groups(&self, prefix: Option<&str>) -> Result<Vec<LogGroup>, SdkError<DescribeLogGroupsError>> {
        let client = aws_sdk_cloudwatchlogs::Client::new(self);
        let mut request = client.describe_log_groups();
        if let Some(prefix) = prefix {
            request = request.log_group_name_prefix(prefix);
        }

        let mut stream = request.into_paginator().items().send();
        let mut groups = Vec::new();
        while let Some(group) = stream.next().await {
            groups.push(group?);
        }
        Ok(groups)
    }

    async fn delete_log_group(&self, name: &str) -> Result<DeleteLogGroupOutput, SdkError<DeleteLogGroupError>> {
        let client = aws_sdk_cloudwatchlogs::Client::new(self);
        client.delete_log_group().log_group_name(name).send().await
    }
}
