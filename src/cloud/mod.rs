pub mod sdk;

use crate::errors::{classify_aws_error_code, Tag};
use crate::models::Account;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use aws_types::SdkConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// The provider services this engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum Service {
    Ec2,
    Eks,
    Iam,
    Sts,
    CloudWatch,
    CloudWatchLogs,
    EventBridge,
    Lambda,
    Prometheus,
    Grafana,
    ElasticBeanstalk,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cannot reach {service} for account `{account_name}` in {region}: {cause}")]
pub struct ClientFactoryError {
    pub service: Service,
    pub account_name: String,
    pub region: String,
    pub tag: Tag,
    pub cause: String,
}

impl ClientFactoryError {
    pub fn is_auth(&self) -> bool {
        self.tag == Tag::Auth
    }
}

/// Produces per-(service, account, region) SDK configurations. On first
/// creation per key a lightweight probe call validates credentials and
/// reachability; failed probes are not cached. No retries at this layer,
/// retrying is the executor's responsibility.
#[derive(Default)]
pub struct CloudClientFactory {
    cache: Mutex<HashMap<(Service, String, String), SdkConfig>>,
}

impl CloudClientFactory {
    pub fn new() -> Self {
        CloudClientFactory {
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn client(
        &self,
        service: Service,
        account: &Account,
        region: &str,
    ) -> Result<SdkConfig, ClientFactoryError> {
        let key = (service, account.id.clone(), region.to_string());
        if let Some(config) = self
            .cache
            .lock()
            .expect("client factory cache lock is never poisoned")
            .get(&key)
        {
            return Ok(config.clone());
        }

        let config = build_sdk_config(account, region).await;
        probe(service, &config).await.map_err(|(tag, cause)| ClientFactoryError {
            service,
            account_name: account.name.clone(),
            region: region.to_string(),
            tag,
            cause,
        })?;

        self.cache
            .lock()
            .expect("client factory cache lock is never poisoned")
            .insert(key, config.clone());
        Ok(config)
    }
}

/// Builds a raw SDK configuration for one (account, region) with SDK-level
/// retries disabled.
pub async fn build_sdk_config(account: &Account, region: &str) -> SdkConfig {
    let credentials = Credentials::new(
        account.access_key.clone(),
        account.secret_key.clone(),
        None,
        None,
        "account-registry",
    );

    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .credentials_provider(credentials)
        .retry_config(RetryConfig::disabled())
        .load()
        .await
}

fn probe_cause<E>(err: &SdkError<E>) -> (Tag, String)
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    let tag = match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => Tag::Transient,
        _ => err.code().map(classify_aws_error_code).unwrap_or(Tag::Unknown),
    };
    (tag, format!("{}", err.code().unwrap_or("no error code")))
}

/// One cheap list call per service; enough to validate signature and region
/// reachability without mutating anything.
async fn probe(service: Service, config: &SdkConfig) -> Result<(), (Tag, String)> {
    match service {
        Service::Ec2 => {
            let client = aws_sdk_ec2::Client::new(config);
            client.describe_regions().send().await.map_err(|e| probe_cause(&e))?;
        }
        Service::Eks => {
            let client = aws_sdk_eks::Client::new(config);
            client
                .list_clusters()
                .max_results(1)
                .send()
                .await
                .map_err(|e| probe_cause(&e))?;
        }
        Service::Iam => {
            let client = aws_sdk_iam::Client::new(config);
            client.list_roles().max_items(1).send().await.map_err(|e| probe_cause(&e))?;
        }
        Service::Sts => {
            let client = aws_sdk_sts::Client::new(config);
            client.get_caller_identity().send().await.map_err(|e| probe_cause(&e))?;
        }
        Service::CloudWatch => {
            let client = aws_sdk_cloudwatch::Client::new(config);
            client
                .describe_alarms()
                .max_records(1)
                .send()
                .await
                .map_err(|e| probe_cause(&e))?;
        }
        Service::CloudWatchLogs => {
            let client = aws_sdk_cloudwatchlogs::Client::new(config);
            client
                .describe_log_groups()
                .limit(1)
                .send()
                .await
                .map_err(|e| probe_cause(&e))?;
        }
        Service::EventBridge => {
            let client = aws_sdk_eventbridge::Client::new(config);
            client.list_rules().limit(1).send().await.map_err(|e| probe_cause(&e))?;
        }
        Service::Lambda => {
            let client = aws_sdk_lambda::Client::new(config);
            client
                .list_functions()
                .max_items(1)
                .send()
                .await
                .map_err(|e| probe_cause(&e))?;
        }
        Service::Prometheus => {
            let client = aws_sdk_amp::Client::new(config);
            client
                .list_scrapers()
                .max_results(1)
                .send()
                .await
                .map_err(|e| probe_cause(&e))?;
        }
        Service::Grafana => {
            let client = aws_sdk_grafana::Client::new(config);
            client
                .list_workspaces()
                .max_results(1)
                .send()
                .await
                .map_err(|e| probe_cause(&e))?;
        }
        Service::ElasticBeanstalk => {
            let client = aws_sdk_elasticbeanstalk::Client::new(config);
            client.describe_applications().send().await.map_err(|e| probe_cause(&e))?;
        }
    }

    Ok(())
}
