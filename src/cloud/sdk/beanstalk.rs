use async_trait::async_trait;
use aws_sdk_elasticbeanstalk::error::SdkError;
use aws_sdk_elasticbeanstalk::operation::delete_application::{DeleteApplicationError, DeleteApplicationOutput};
use aws_sdk_elasticbeanstalk::operation::delete_application_version::{
    DeleteApplicationVersionError, DeleteApplicationVersionOutput,
};
use aws_sdk_elasticbeanstalk::operation::describe_application_versions::DescribeApplicationVersionsError;
use aws_sdk_elasticbeanstalk::operation::describe_applications::DescribeApplicationsError;
use aws_sdk_elasticbeanstalk::operation::describe_environments::DescribeEnvironmentsError;
use aws_sdk_elasticbeanstalk::operation::terminate_environment::{TerminateEnvironmentError, TerminateEnvironmentOutput};
use aws_sdk_elasticbeanstalk::types::{ApplicationDescription, ApplicationVersionDescription, EnvironmentDescription};
use aws_types::SdkConfig;

#[async_trait]
pub trait SweeperAwsSdkBeanstalk {
    async fn list_applications(&self) -> Result<Vec<ApplicationDescription>, SdkError<DescribeApplicationsError>>;
    async fn list_environments(
        &self,
        application_name: &str,
    ) -> Result<Vec<EnvironmentDescription>, SdkError<DescribeEnvironmentsError>>;
    async fn get_environment(
        &self,
        environment_id: &str,
    ) -> Result<Option<EnvironmentDescription>, SdkError<DescribeEnvironmentsError>>;
    async fn terminate_environment(
        &self,
        environment_id: &str,
    ) -> Result<TerminateEnvironmentOutput, SdkError<TerminateEnvironmentError>>;
    async fn list_application_versions(
        &self,
        application_name: &str,
    ) -> Result<Vec<ApplicationVersionDescription>, SdkError<DescribeApplicationVersionsError>>;
    async fn delete_application_version(
        &self,
        application_name: &str,
        version_label: &str,
    ) -> Result<DeleteApplicationVersionOutput, SdkError<DeleteApplicationVersionError>>;
    async fn delete_application(
        &self,
        application_name: &str,
    ) -> Result<DeleteApplicationOutput, SdkError<DeleteApplicationError>>;
}

#[async_trait]
impl SweeperAwsSdkBeanstalk for SdkConfig {
    async fn list_applications(&self) -> Result<Vec<ApplicationDescription>, SdkError<DescribeApplicationsError>> {
        let client = aws_sdk_elasticbeanstalk::Client::new(self);
        let output = client.describe_applications().send().await?;
        Ok(output.applications.unwrap_or_default())
    }

    async fn list_environments(
        &self,
        application_name: &str,
    ) -> Result<Vec<EnvironmentDescription>, SdkError<DescribeEnvironmentsError>> {
        let client = aws_sdk_elasticbeanstalk::Client::new(self);
        let output = client
            .describe_environments()
            .application_name(application_name)
            .send()
            .await?;
        Ok(output.environments.unwrap_or_default())
    }

    async fn get_environment(
        &self,
        environment_id: &str,
    ) -> Result<Option<EnvironmentDescription>, SdkError<DescribeEnvironmentsError>> {
        let client = aws_sdk_elasticbeanstalk::Client::new(self);
        let output = client.describe_environments().environment_ids(environment_id).send().await?;
        Ok(output.environments.unwrap_or_default().into_iter().next())
    }

    async fn terminate_environment(
        &self,
        environment_id: &str,
    ) -> Result<TerminateEnvironmentOutput, SdkError<TerminateEnvironmentError>> {
        let client = aws_sdk_elasticbeanstalk::Client::new(self);
        client
            .terminate_environment()
            .environment_id(environment_id)
            .terminate_resources(true)
            .send()
            .await
    }

    async fn list_application_versions(
        &self,
        application_name: &str,
    ) -> Result<Vec<ApplicationVersionDescription>, SdkError<DescribeApplicationVersionsError>> {
        let client = aws_sdk_elasticbeanstalk::Client::new(self);
        let output = client
            .describe_application_versions()
            .application_name(application_name)
            .send()
            .await?;
        Ok(output.application_versions.unwrap_or_default())
    }

    async fn delete_application_version(
        &self,
        application_name: &str,
        version_label: &str,
    ) -> Result<DeleteApplicationVersionOutput, SdkError<DeleteApplicationVersionError>> {
        let client = aws_sdk_elasticbeanstalk::Client::new(self);
        client
            .delete_application_version()
            .application_name(application_name)
            .version_label(version_label)
            .delete_source_bundle(false)
            .send()
            .await
    }

    async fn delete_application(
        &self,
        application_name: &str,
    ) -> Result<DeleteApplicationOutput, SdkError<DeleteApplicationError>> {
        let client = aws_sdk_elasticbeanstalk::Client::new(self);
        client
            .delete_application()
            .application_name(application_name)
            .terminate_env_by_force(true)
            .send()
            .await
    }
}
