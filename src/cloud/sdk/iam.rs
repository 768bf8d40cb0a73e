use async_trait::async_trait;
use aws_sdk_iam::error::SdkError;
use aws_sdk_iam::operation::delete_policy::{DeletePolicyError, DeletePolicyOutput};
use aws_sdk_iam::operation::delete_policy_version::{DeletePolicyVersionError, DeletePolicyVersionOutput};
use aws_sdk_iam::operation::delete_role::{DeleteRoleError, DeleteRoleOutput};
use aws_sdk_iam::operation::delete_role_policy::{DeleteRolePolicyError, DeleteRolePolicyOutput};
use aws_sdk_iam::operation::detach_group_policy::{DetachGroupPolicyError, DetachGroupPolicyOutput};
use aws_sdk_iam::operation::detach_role_policy::{DetachRolePolicyError, DetachRolePolicyOutput};
use aws_sdk_iam::operation::detach_user_policy::{DetachUserPolicyError, DetachUserPolicyOutput};
use aws_sdk_iam::operation::list_attached_role_policies::ListAttachedRolePoliciesError;
use aws_sdk_iam::operation::list_entities_for_policy::ListEntitiesForPolicyError;
use aws_sdk_iam::operation::list_instance_profiles_for_role::ListInstanceProfilesForRoleError;
use aws_sdk_iam::operation::list_policies::ListPoliciesError;
use aws_sdk_iam::operation::list_policy_versions::ListPolicyVersionsError;
use aws_sdk_iam::operation::list_role_policies::ListRolePoliciesError;
use aws_sdk_iam::operation::list_role_tags::ListRoleTagsError;
use aws_sdk_iam::operation::list_roles::ListRolesError;
use aws_sdk_iam::operation::remove_role_from_instance_profile::{
    RemoveRoleFromInstanceProfileError, RemoveRoleFromInstanceProfileOutput,
};
use aws_sdk_iam::types::{
    AttachedPolicy, InstanceProfile, Policy, PolicyGroup, PolicyRole, PolicyScopeType, PolicyUser, PolicyVersion,
    Role, Tag,
};
use aws_types::SdkConfig;

/// Principals a managed policy is attached to, as returned by
/// list_entities_for_policy.
#[derive(Debug, Default, Clone)]
pub struct PolicyEntities {
    pub users: Vec<PolicyUser>,
    pub groups: Vec<PolicyGroup>,
    pub roles: Vec<PolicyRole>,
}

impl PolicyEntities {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty() && self.roles.is_empty()
    }
}

#[async_trait]
pub trait SweeperAwsSdkIam {
    async fn list_all_roles(&self) -> Result<Vec<Role>, SdkError<ListRolesError>>;
    async fn list_role_tags(&self, role_name: &str) -> Result<Vec<Tag>, SdkError<ListRoleTagsError>>;
    async fn list_attached_role_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<AttachedPolicy>, SdkError<ListAttachedRolePoliciesError>>;
    async fn detach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<DetachRolePolicyOutput, SdkError<DetachRolePolicyError>>;
    async fn list_inline_role_policies(&self, role_name: &str) -> Result<Vec<String>, SdkError<ListRolePoliciesError>>;
    async fn delete_inline_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> Result<DeleteRolePolicyOutput, SdkError<DeleteRolePolicyError>>;
    async fn list_instance_profiles_for_role(
        &self,
        role_name: &str,
    ) -> Result<Vec<InstanceProfile>, SdkError<ListInstanceProfilesForRoleError>>;
    async fn remove_role_from_instance_profile(
        &self,
        instance_profile_name: &str,
        role_name: &str,
    ) -> Result<RemoveRoleFromInstanceProfileOutput, SdkError<RemoveRoleFromInstanceProfileError>>;
    async fn delete_role(&self, role_name: &str) -> Result<DeleteRoleOutput, SdkError<DeleteRoleError>>;
    async fn list_customer_managed_policies(&self) -> Result<Vec<Policy>, SdkError<ListPoliciesError>>;
    async fn list_policy_versions(
        &self,
        policy_arn: &str,
    ) -> Result<Vec<PolicyVersion>, SdkError<ListPolicyVersionsError>>;
    async fn delete_policy_version(
        &self,
        policy_arn: &str,
        version_id: &str,
    ) -> Result<DeletePolicyVersionOutput, SdkError<DeletePolicyVersionError>>;
    async fn list_entities_for_policy(
        &self,
        policy_arn: &str,
    ) -> Result<PolicyEntities, SdkError<ListEntitiesForPolicyError>>;
    async fn detach_user_policy(
        &self,
        user_name: &str,
        policy_arn: &str,
    ) -> Result<DetachUserPolicyOutput, SdkError<DetachUserPolicyError>>;
    async fn detach_group_policy(
        &self,
        group_name: &str,
        policy_arn: &str,
    ) -> Result<DetachGroupPolicyOutput, SdkError<DetachGroupPolicyError>>;
    async fn delete_policy(&self, policy_arn: &str) -> Result<DeletePolicyOutput, SdkError<DeletePolicyError>>;
}

#[async_trait]
impl SweeperAwsSdkIam for SdkConfig {
    async fn list_all_roles(&self) -> Result<Vec<Role>, SdkError<ListRolesError>> {
        let client = aws_sdk_iam::Client::new(self);
        let mut stream = client.list_roles().into_paginator().items().send();

        let mut roles = Vec::new();
        while let Some(role) = stream.next().await {
            roles.push(role?);
        }
        Ok(roles)
    }

    async fn list_role_tags(&self, role_name: &str) -> Result<Vec<Tag>, SdkError<ListRoleTagsError>> {
        let client = aws_sdk_iam::Client::new(self);
        let output = client.list_role_tags().role_name(role_name).send().await?;
        Ok(output.tags)
    }

    async fn list_attached_role_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<AttachedPolicy>, SdkError<ListAttachedRolePoliciesError>> {
        let client = aws_sdk_iam::Client::new(self);
        let mut stream = client
            .list_attached_role_policies()
            .role_name(role_name)
            .into_paginator()
            .items()
            .send();

        let mut policies = Vec::new();
        while let Some(policy) = stream.next().await {
            policies.push(policy?);
        }
        Ok(policies)
    }

    async fn detach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<DetachRolePolicyOutput, SdkError<DetachRolePolicyError>> {
        let client = aws_sdk_iam::Client::new(self);
        client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
    }

    async fn list_inline_role_policies(&self, role_name: &str) -> Result<Vec<String>, SdkError<ListRolePoliciesError>> {
        let client = aws_sdk_iam::Client::new(self);
        let mut stream = client
            .list_role_policies()
            .role_name(role_name)
            .into_paginator()
            .items()
            .send();

        let mut names = Vec::new();
        while let Some(name) = stream.next().await {
            names.push(name?);
        }
        Ok(names)
    }

    async fn delete_inline_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
    ) -> Result<DeleteRolePolicyOutput, SdkError<DeleteRolePolicyError>> {
        let client = aws_sdk_iam::Client::new(self);
        client
            .delete_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
    }

    async fn list_instance_profiles_for_role(
        &self,
        role_name: &str,
    ) -> Result<Vec<InstanceProfile>, SdkError<ListInstanceProfilesForRoleError>> {
        let client = aws_sdk_iam::Client::new(self);
        let mut stream = client
            .list_instance_profiles_for_role()
            .role_name(role_name)
            .into_paginator()
            .items()
            .send();

        let mut profiles = Vec::new();
        while let Some(profile) = stream.next().await {
            profiles.push(profile?);
        }
        Ok(profiles)
    }

    async fn remove_role_from_instance_profile(
        &self,
        instance_profile_name: &str,
        role_name: &str,
    ) -> Result<RemoveRoleFromInstanceProfileOutput, SdkError<RemoveRoleFromInstanceProfileError>> {
        let client = aws_sdk_iam::Client::new(self);
        client
            .remove_role_from_instance_profile()
            .instance_profile_name(instance_profile_name)
            .role_name(role_name)
            .send()
            .await
    }

    async fn delete_role(&self, role_name: &str) -> Result<DeleteRoleOutput, SdkError<DeleteRoleError>> {
        let client = aws_sdk_iam::Client::new(self);
        client.delete_role().role_name(role_name).send().await
    }

    async fn list_customer_managed_policies(&self) -> Result<Vec<Policy>, SdkError<ListPoliciesError>> {
        let client = aws_sdk_iam::Client::new(self);
        let mut stream = client
            .list_policies()
            .scope(PolicyScopeType::Local)
            .into_paginator()
            .items()
            .send();

        let mut policies = Vec::new();
        while let Some(policy) = stream.next().await {
            policies.push(policy?);
        }
        Ok(policies)
    }

    async fn list_policy_versions(
        &self,
        policy_arn: &str,
    ) -> Result<Vec<PolicyVersion>, SdkError<ListPolicyVersionsError>> {
        let client = aws_sdk_iam::Client::new(self);
        let output = client.list_policy_versions().policy_arn(policy_arn).send().await?;
        Ok(output.versions.unwrap_or_default())
    }

    async fn delete_policy_version(
        &self,
        policy_arn: &str,
        version_id: &str,
    ) -> Result<DeletePolicyVersionOutput, SdkError<DeletePolicyVersionError>> {
        let client = aws_sdk_iam::Client::new(self);
        client
            .delete_policy_version()
            .policy_arn(policy_arn)
            .version_id(version_id)
            .send()
            .await
    }

    async fn list_entities_for_policy(
        &self,
        policy_arn: &str,
    ) -> Result<PolicyEntities, SdkError<ListEntitiesForPolicyError>> {
        let client = aws_sdk_iam::Client::new(self);
        let mut stream = client
            .list_entities_for_policy()
            .policy_arn(policy_arn)
            .into_paginator()
            .send();

        let mut entities = PolicyEntities::default();
        while let Some(page) = stream.next().await {
            let page = page?;
            entities.users.extend(page.policy_users.unwrap_or_default());
            entities.groups.extend(page.policy_groups.unwrap_or_default());
            entities.roles.extend(page.policy_roles.unwrap_or_default());
        }
        Ok(entities)
    }

    async fn detach_user_policy(
        &self,
        user_name: &str,
        policy_arn: &str,
    ) -> Result<DetachUserPolicyOutput, SdkError<DetachUserPolicyError>> {
        let client = aws_sdk_iam::Client::new(self);
        client
            .detach_user_policy()
            .user_name(user_name)
            .policy_arn(policy_arn)
            .send()
            .await
    }

    async fn detach_group_policy(
        &self,
        group_name: &str,
        policy_arn: &str,
    ) -> Result<DetachGroupPolicyOutput, SdkError<DetachGroupPolicyError>> {
        let client = aws_sdk_iam::Client::new(self);
        client
            .detach_group_policy()
            .group_name(group_name)
            .policy_arn(policy_arn)
            .send()
            .await
    }

    async fn delete_policy(&self, policy_arn: &str) -> Result<DeletePolicyOutput, SdkError<DeletePolicyError>> {
        let client = aws_sdk_iam::Client::new(self);
        client.delete_policy().policy_arn(policy_arn).send().await
    }
}
