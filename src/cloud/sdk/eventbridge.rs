use async_trait::async_trait;
use aws_sdk_eventbridge::error::SdkError;
use aws_sdk_eventbridge::operation::delete_rule::{DeleteRuleError, DeleteRuleOutput};
use aws_sdk_eventbridge::operation::list_rules::ListRulesError;
use aws_sdk_eventbridge::operation::list_tags_for_resource::ListTagsForResourceError;
use aws_sdk_eventbridge::operation::list_targets_by_rule::ListTargetsByRuleError;
use aws_sdk_eventbridge::operation::remove_targets::{RemoveTargetsError, RemoveTargetsOutput};
use aws_sdk_eventbridge::types::{Rule, Tag, Target};
use aws_types::SdkConfig;

#[async_trait]
pub trait SweeperAwsSdkEventBridge {
    async fn list_all_rules(&self) -> Result<Vec<Rule>, SdkError<ListRulesError>>;
    async fn list_rule_targets(&self, rule_name: &str) -> Result<Vec<Target>, SdkError<ListTargetsByRuleError>>;
    async fn remove_rule_targets(
        &self,
        rule_name: &str,
        target_ids: Vec<String>,
    ) -> Result<RemoveTargetsOutput, SdkError<RemoveTargetsError>>;
    async fn delete_rule(&self, rule_name: &str) -> Result<DeleteRuleOutput, SdkError<DeleteRuleError>>;
    async fn list_rule_tags(&self, rule_arn: &str) -> Result<Vec<Tag>, SdkError<ListTagsForResourceError>>;
}

#[async_trait]
impl SweeperAwsSdkEventBridge for SdkConfig {
    async fn list_all_rules(&self) -> Result<Vec<Rule>, SdkError<ListRulesError>> {
        let client = aws_sdk_eventbridge::Client::new(self);
        let mut rules = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = client.list_rules().set_next_token(next_token).send().await?;
            rules.extend(output.rules.unwrap_or_default());

            next_token = output.next_token;
            if next_token.is_none() {
                break;
            }
        }

        Ok(rules)
    }

    async fn list_rule_targets(&self, rule_name: &str) -> Result<Vec<Target>, SdkError<ListTargetsByRuleError>> {
        let client = aws_sdk_eventbridge::Client::new(self);
        let mut targets = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = client
                .list_targets_by_rule()
                .rule(rule_name)
                .set_next_token(next_token)
                .send()
                .await?;
            targets.extend(output.targets.unwrap_or_default());

            next_token = output.next_token;
            if next_token.is_none() {
                break;
            }
        }

        Ok(targets)
    }

    async fn remove_rule_targets(
        &self,
        rule_name: &str,
        target_ids: Vec<String>,
    ) -> Result<RemoveTargetsOutput, SdkError<RemoveTargetsError>> {
        let client = aws_sdk_eventbridge::Client::new(self);
        client
            .remove_targets()
            .rule(rule_name)
            .set_ids(Some(target_ids))
            .force(true)
            .send()
            .await
    }

    async fn delete_rule(&self, rule_name: &str) -> Result<DeleteRuleOutput, SdkError<DeleteRuleError>> {
        let client = aws_sdk_eventbridge::Client::new(self);
        client.delete_rule().name(rule_name).send().await
    }

    async fn list_rule_tags(&self, rule_arn: &str) -> Result<Vec<Tag>, SdkError<ListTagsForResourceError>> {
        let client = aws_sdk_eventbridge::Client::new(self);
        let output = client.list_tags_for_resource().resource_arn(rule_arn).send().await?;
        Ok(output.tags.unwrap_or_default())
    }
}
