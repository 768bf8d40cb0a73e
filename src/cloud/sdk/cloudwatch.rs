use async_trait::async_trait;
use aws_sdk_cloudwatch::error::SdkError;
use aws_sdk_cloudwatch::operation::delete_alarms::{DeleteAlarmsError, DeleteAlarmsOutput};
use aws_sdk_cloudwatch::operation::describe_alarms::DescribeAlarmsError;
use aws_sdk_cloudwatch::operation::list_tags_for_resource::ListTagsForResourceError;
use aws_sdk_cloudwatch::types::{AlarmType, CompositeAlarm, MetricAlarm, Tag};
use aws_types::SdkConfig;

/// Every alarm in the region, composites and basics kept apart because the
/// teardown order depends on it.
#[derive(Debug, Default, Clone)]
pub struct RegionAlarms {
    pub composite: Vec<CompositeAlarm>,
    pub basic: Vec<MetricAlarm>,
}

#[async_trait]
pub trait SweeperAwsSdkCloudWatch {
    async fn list_all_alarms(&self) -> Result<RegionAlarms, SdkError<DescribeAlarmsError>>;
    async fn delete_alarm_batch(&self, names: Vec<String>) -> Result<DeleteAlarmsOutput, SdkError<DeleteAlarmsError>>;
    async fn list_alarm_tags(&self, alarm_arn: &str) -> Result<Vec<Tag>, SdkError<ListTagsForResourceError>>;
}

#[async_trait]
impl SweeperAwsSdkCloudWatch for SdkConfig {
    async fn list_all_alarms(&self) -> Result<RegionAlarms, SdkError<DescribeAlarmsError>> {
        let client = aws_sdk_cloudwatch::Client::new(self);
        let mut alarms = RegionAlarms::default();
        let mut next_token: Option<String> = None;

        loop {
            let output = client
                .describe_alarms()
                .alarm_types(AlarmType::CompositeAlarm)
                .alarm_types(AlarmType::MetricAlarm)
                .set_next_token(next_token)
                .send()
                .await?;

            alarms.composite.extend(output.composite_alarms.unwrap_or_default());
            alarms.basic.extend(output.metric_alarms.unwrap_or_default());

            next_token = output.next_token;
            if next_token.is_none() {
                break;
            }
        }

        Ok(alarms)
    }

    async fn delete_alarm_batch(&self, names: Vec<String>) -> Result<DeleteAlarmsOutput, SdkError<DeleteAlarmsError>> {
        let client = aws_sdk_cloudwatch::Client::new(self);
        client.delete_alarms().set_alarm_names(Some(names)).send().await
    }

    async fn list_alarm_tags(&self, alarm_arn: &str) -> Result<Vec<Tag>, SdkError<ListTagsForResourceError>> {
        let client = aws_sdk_cloudwatch::Client::new(self);
        let output = client.list_tags_for_resource().resource_arn(alarm_arn).send().await?;
        Ok(output.tags.unwrap_or_default())
    }
}
