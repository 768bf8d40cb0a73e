pub mod beanstalk;
pub mod correlate;
pub mod ec2;
pub mod eks;
pub mod iam;
pub mod monitoring;

use crate::cloud::{ClientFactoryError, CloudClientFactory, Service};
use crate::events::{EngineEvent, EventDetails, EventMessage, InventoryStep, Stage, Transmitter};
use crate::logger::Logger;
use crate::models::{Account, AccountContext, CloudResource, ResourceRef};

/// One EC2 instance with the attachment data teardown and cost need.
#[derive(Debug, Clone)]
pub struct Ec2Instance {
    pub resource: ResourceRef,
    pub instance_type: Option<String>,
    pub vpc_id: Option<String>,
    pub security_group_ids: Vec<String>,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
}

impl CloudResource for Ec2Instance {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

impl Ec2Instance {
    /// Terminated or terminating instances are kept in the inventory but the
    /// executor treats them as already finalized.
    pub fn is_finalized(&self) -> bool {
        matches!(
            self.resource.state.as_deref(),
            Some("terminated") | Some("shutting-down")
        )
    }
}

#[derive(Debug, Clone)]
pub struct SecurityGroupRecord {
    pub resource: ResourceRef,
    pub vpc_id: Option<String>,
    pub description: String,
    pub ingress_rule_count: usize,
    pub egress_rule_count: usize,
    /// Filled by the correlate pass; empty until then.
    pub attached_instance_ids: Vec<String>,
}

impl CloudResource for SecurityGroupRecord {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct EksNodeGroup {
    pub resource: ResourceRef,
    pub cluster_name: String,
    pub desired_size: Option<i32>,
    pub min_size: Option<i32>,
    pub max_size: Option<i32>,
    pub instance_types: Vec<String>,
}

impl CloudResource for EksNodeGroup {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct EksCluster {
    pub resource: ResourceRef,
    pub vpc_id: Option<String>,
    pub version: Option<String>,
    /// Eagerly hydrated at discovery time.
    pub nodegroups: Vec<EksNodeGroup>,
    /// Managed add-ons installed on the cluster.
    pub addons: Vec<ResourceRef>,
}

impl CloudResource for EksCluster {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct IamRoleRecord {
    pub resource: ResourceRef,
    pub arn: String,
    pub path: String,
}

impl CloudResource for IamRoleRecord {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct IamPolicyRecord {
    pub resource: ResourceRef,
    pub arn: String,
    pub default_version_id: Option<String>,
}

impl CloudResource for IamPolicyRecord {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct FunctionRecord {
    pub resource: ResourceRef,
    pub arn: String,
}

impl CloudResource for FunctionRecord {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct EventRuleRecord {
    pub resource: ResourceRef,
    pub arn: String,
    pub description: String,
}

impl CloudResource for EventRuleRecord {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct AlarmRecord {
    pub resource: ResourceRef,
    pub arn: String,
    pub description: String,
    pub is_composite: bool,
    pub dimensions: std::collections::BTreeMap<String, String>,
}

impl CloudResource for AlarmRecord {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct LogGroupRecord {
    pub resource: ResourceRef,
}

impl CloudResource for LogGroupRecord {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct ScraperRecord {
    pub resource: ResourceRef,
}

impl CloudResource for ScraperRecord {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceRecord {
    pub resource: ResourceRef,
}

impl CloudResource for WorkspaceRecord {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct AppEnvironmentRecord {
    pub resource: ResourceRef,
    pub application_name: String,
}

impl CloudResource for AppEnvironmentRecord {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

#[derive(Debug, Clone)]
pub struct ApplicationRecord {
    pub resource: ResourceRef,
    pub environments: Vec<AppEnvironmentRecord>,
    pub version_labels: Vec<String>,
}

impl CloudResource for ApplicationRecord {
    fn resource_ref(&self) -> &ResourceRef {
        &self.resource
    }
}

/// Everything discovered in one (account, region) cell.
#[derive(Debug, Clone, Default)]
pub struct RegionInventory {
    pub instances: Vec<Ec2Instance>,
    pub security_groups: Vec<SecurityGroupRecord>,
    pub clusters: Vec<EksCluster>,
    pub roles: Vec<IamRoleRecord>,
    pub policies: Vec<IamPolicyRecord>,
    pub functions: Vec<FunctionRecord>,
    pub event_rules: Vec<EventRuleRecord>,
    pub alarms: Vec<AlarmRecord>,
    pub log_groups: Vec<LogGroupRecord>,
    pub scrapers: Vec<ScraperRecord>,
    pub workspaces: Vec<WorkspaceRecord>,
    pub applications: Vec<ApplicationRecord>,
}

impl RegionInventory {
    pub fn resource_count(&self) -> usize {
        self.instances.len()
            + self.security_groups.len()
            + self.clusters.len()
            + self.clusters.iter().map(|c| c.nodegroups.len()).sum::<usize>()
            + self.roles.len()
            + self.policies.len()
            + self.functions.len()
            + self.event_rules.len()
            + self.alarms.len()
            + self.log_groups.len()
            + self.scrapers.len()
            + self.workspaces.len()
            + self.applications.len()
    }
}

fn discovery_details(ctx: &AccountContext) -> EventDetails {
    EventDetails::new(ctx, Stage::Inventory(InventoryStep::Discover), Transmitter::Engine)
}

/// Discovers all supported kinds in one (account, region) cell. A per-kind
/// failure is logged and yields an empty list for that kind; discovery never
/// aborts the run. Authentication failures do abort the cell, the rest of the
/// matrix keeps running.
pub async fn discover_region(
    factory: &CloudClientFactory,
    account: &Account,
    region: &str,
    logger: &dyn Logger,
) -> Result<RegionInventory, ClientFactoryError> {
    let ctx = AccountContext::new(account, region);
    let details = discovery_details(&ctx);
    let mut inventory = RegionInventory::default();

    macro_rules! per_service {
        ($service:expr, $discover:expr) => {
            match factory.client($service, account, region).await {
                Ok(config) => match $discover(&config, &ctx, logger).await {
                    Ok(value) => Some(value),
                    Err(message) => {
                        logger.log(EngineEvent::Warning(
                            details.clone(),
                            EventMessage::new(format!("{} discovery failed, continuing", $service), Some(message)),
                        ));
                        None
                    }
                },
                Err(err) if err.is_auth() => return Err(err),
                Err(err) => {
                    logger.log(EngineEvent::Warning(
                        details.clone(),
                        EventMessage::new(
                            format!("{} is unreachable, skipping its kinds", $service),
                            Some(err.to_string()),
                        ),
                    ));
                    None
                }
            }
        };
    }

    if let Some(instances) = per_service!(Service::Ec2, ec2::discover_instances) {
        inventory.instances = instances;
    }
    if let Some(groups) = per_service!(Service::Ec2, ec2::discover_security_groups) {
        inventory.security_groups = groups;
    }
    if let Some(clusters) = per_service!(Service::Eks, eks::discover_clusters) {
        inventory.clusters = clusters;
    }
    if let Some(roles) = per_service!(Service::Iam, iam::discover_roles) {
        inventory.roles = roles;
    }
    if let Some(policies) = per_service!(Service::Iam, iam::discover_policies) {
        inventory.policies = policies;
    }
    if let Some(functions) = per_service!(Service::Lambda, monitoring::discover_functions) {
        inventory.functions = functions;
    }
    if let Some(rules) = per_service!(Service::EventBridge, monitoring::discover_event_rules) {
        inventory.event_rules = rules;
    }
    if let Some(alarms) = per_service!(Service::CloudWatch, monitoring::discover_alarms) {
        inventory.alarms = alarms;
    }
    if let Some(log_groups) = per_service!(Service::CloudWatchLogs, monitoring::discover_log_groups) {
        inventory.log_groups = log_groups;
    }
    if let Some(scrapers) = per_service!(Service::Prometheus, monitoring::discover_scrapers) {
        inventory.scrapers = scrapers;
    }
    if let Some(workspaces) = per_service!(Service::Grafana, monitoring::discover_workspaces) {
        inventory.workspaces = workspaces;
    }
    if let Some(applications) = per_service!(Service::ElasticBeanstalk, beanstalk::discover_applications) {
        inventory.applications = applications;
    }

    correlate::correlate_security_groups(&mut inventory);

    logger.log(EngineEvent::Info(
        details.clone_changing_stage(Stage::Inventory(InventoryStep::Correlate)),
        EventMessage::new_from_safe(format!(
            "discovered {} resources in {}",
            inventory.resource_count(),
            ctx
        )),
    ));

    Ok(inventory)
}
