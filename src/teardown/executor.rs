use crate::classifier::TeardownTarget;
use crate::cloud::{ClientFactoryError, CloudClientFactory, Service};
use crate::events::{EngineEvent, EventDetails, EventMessage, Stage, TeardownStep, Transmitter};
use crate::inventory::RegionInventory;
use crate::logger::Logger;
use crate::models::{Account, AccountContext, Label, ResourceKind, ResourceRef, RunContext};
use crate::teardown::plan::{StepOp, TeardownPlan, TeardownStepSpec, WaitSpec};
use crate::teardown::waiter::WaitOutcome;
use crate::teardown::{
    alarms, application, cluster, event_rules, functions, iam, instance, monitoring, security_group, OutcomeRecord,
    ResourceOutcome,
};
use aws_types::SdkConfig;
use std::collections::HashMap;

/// Per-service SDK configurations for one (account, region) cell, all probed
/// through the factory before any step runs.
pub struct TeardownClients {
    pub ec2: SdkConfig,
    pub eks: SdkConfig,
    pub iam: SdkConfig,
    pub cloudwatch: SdkConfig,
    pub logs: SdkConfig,
    pub eventbridge: SdkConfig,
    pub lambda: SdkConfig,
    pub amp: SdkConfig,
    pub grafana: SdkConfig,
    pub beanstalk: SdkConfig,
}

impl TeardownClients {
    pub async fn from_factory(
        factory: &CloudClientFactory,
        account: &Account,
        region: &str,
    ) -> Result<Self, ClientFactoryError> {
        Ok(TeardownClients {
            ec2: factory.client(Service::Ec2, account, region).await?,
            eks: factory.client(Service::Eks, account, region).await?,
            iam: factory.client(Service::Iam, account, region).await?,
            cloudwatch: factory.client(Service::CloudWatch, account, region).await?,
            logs: factory.client(Service::CloudWatchLogs, account, region).await?,
            eventbridge: factory.client(Service::EventBridge, account, region).await?,
            lambda: factory.client(Service::Lambda, account, region).await?,
            amp: factory.client(Service::Prometheus, account, region).await?,
            grafana: factory.client(Service::Grafana, account, region).await?,
            beanstalk: factory.client(Service::ElasticBeanstalk, account, region).await?,
        })
    }
}

/// Drives a validated plan step by step, strictly sequentially. Every Delete
/// resolves into a recorded outcome; nothing is silent.
pub struct TeardownExecutor<'a> {
    pub target: &'a TeardownTarget,
    pub ctx: &'a AccountContext,
    pub inventory: &'a RegionInventory,
    pub run: &'a RunContext,
    pub logger: &'a dyn Logger,
    pub clients: &'a TeardownClients,
}

impl TeardownExecutor<'_> {
    pub async fn execute(&self, plan: &TeardownPlan) -> Vec<OutcomeRecord> {
        let mut outcomes = Outcomes::default();

        for candidate in &plan.skipped {
            let outcome = match candidate.classification.label {
                Label::Protected => ResourceOutcome::SkippedProtected {
                    reason: candidate.classification.reason.clone(),
                },
                _ => ResourceOutcome::SkippedShared {
                    reason: candidate.classification.reason.clone(),
                },
            };
            outcomes.record(candidate.resource.clone(), outcome);
        }

        // ids whose absence wait did not reach Satisfied; strict downstream
        // steps are blocked on these
        let mut unresolved_absences: Vec<String> = Vec::new();

        let mut index = 0usize;
        while index < plan.steps.len() {
            if self.run.is_cancelled() {
                for step in &plan.steps[index..] {
                    if step.op == StepOp::Delete && !outcomes.has(&step.subject.id) {
                        outcomes.record(
                            step.subject.clone(),
                            ResourceOutcome::Blocked {
                                reason: "run cancelled".to_string(),
                            },
                        );
                    }
                }
                break;
            }

            let step = &plan.steps[index];

            // segment: the security-group pass runs as one iterative batch
            if step.subject.kind == ResourceKind::SecurityGroup {
                let segment_end = plan.steps[index..]
                    .iter()
                    .position(|s| s.subject.kind != ResourceKind::SecurityGroup)
                    .map(|offset| index + offset)
                    .unwrap_or(plan.steps.len());

                let mut groups: Vec<ResourceRef> = Vec::new();
                for sg_step in &plan.steps[index..segment_end] {
                    if sg_step.op == StepOp::Delete {
                        groups.push(sg_step.subject.clone());
                    }
                }

                if self.run.dry_run {
                    for group in groups {
                        outcomes.record(group, ResourceOutcome::WouldDelete);
                    }
                } else {
                    for record in security_group::delete_security_groups_iteratively(
                        &self.clients.ec2,
                        self.ctx,
                        self.target,
                        groups,
                        self.run,
                        self.logger,
                    )
                    .await
                    {
                        outcomes.record(record.resource, record.outcome);
                    }
                }

                index = segment_end;
                continue;
            }

            // segment: contiguous non-composite alarm deletes go out in batches
            if step.op == StepOp::Delete && step.subject.kind == ResourceKind::Alarm && !self.is_composite(&step.subject)
            {
                let segment_end = plan.steps[index..]
                    .iter()
                    .position(|s| {
                        !(s.op == StepOp::Delete && s.subject.kind == ResourceKind::Alarm && !self.is_composite(&s.subject))
                    })
                    .map(|offset| index + offset)
                    .unwrap_or(plan.steps.len());

                let batch: Vec<ResourceRef> = plan.steps[index..segment_end]
                    .iter()
                    .map(|s| s.subject.clone())
                    .collect();

                if self.run.dry_run {
                    for alarm in batch {
                        outcomes.record(alarm, ResourceOutcome::WouldDelete);
                    }
                } else {
                    for record in
                        alarms::delete_alarms_batched(&self.clients.cloudwatch, self.ctx, batch, self.run, self.logger)
                            .await
                    {
                        outcomes.record(record.resource, record.outcome);
                    }
                }

                index = segment_end;
                continue;
            }

            self.execute_step(step, &mut outcomes, &mut unresolved_absences).await;
            index += 1;
        }

        outcomes.into_records()
    }

    fn is_composite(&self, alarm: &ResourceRef) -> bool {
        self.inventory
            .alarms
            .iter()
            .find(|a| a.resource.id == alarm.id)
            .map(|a| a.is_composite)
            .unwrap_or(false)
    }

    fn step_details(&self, step: TeardownStep, subject: &ResourceRef) -> EventDetails {
        EventDetails::new(
            self.ctx,
            Stage::Teardown(step),
            Transmitter::Resource(subject.kind, subject.id.clone()),
        )
    }

    async fn execute_step(
        &self,
        step: &TeardownStepSpec,
        outcomes: &mut Outcomes,
        unresolved_absences: &mut Vec<String>,
    ) {
        let subject = &step.subject;

        // a subject already skipped or failed upstream loses its later steps
        if let Some(previous) = outcomes.get(&subject.id) {
            if previous.is_failure() || previous.is_skipped() {
                return;
            }
        }

        if self.run.dry_run {
            if step.op == StepOp::Delete {
                outcomes.record(subject.clone(), ResourceOutcome::WouldDelete);
            }
            return;
        }

        match step.op {
            StepOp::Detach => self.execute_detach(subject, outcomes).await,
            StepOp::RemoveTargets => {
                if let Err(err) =
                    event_rules::remove_targets(&self.clients.eventbridge, self.ctx, subject, self.run).await
                {
                    outcomes.record(
                        subject.clone(),
                        ResourceOutcome::FailedPermanent {
                            error: err.to_string(),
                        },
                    );
                }
            }
            StepOp::StripRules => {
                // security groups travel through the iterative pass; nothing
                // else strips rules
            }
            StepOp::Delete => self.execute_delete(subject, outcomes, unresolved_absences).await,
            StepOp::AwaitAbsence => {
                let wait = step.wait.unwrap_or(WaitSpec::new(std::time::Duration::from_secs(30 * 60)));
                self.execute_await(subject, &wait, outcomes, unresolved_absences).await;
            }
        }
    }

    async fn execute_detach(&self, subject: &ResourceRef, outcomes: &mut Outcomes) {
        let result = match subject.kind {
            ResourceKind::Function => {
                functions::detach_event_sources(&self.clients.lambda, self.ctx, subject, self.run)
                    .await
                    .map(|_| None)
            }
            ResourceKind::Role => iam::prepare_role_deletion(&self.clients.iam, self.ctx, subject, self.run)
                .await
                .map(|prep| match prep {
                    iam::RolePrep::Ready => None,
                    iam::RolePrep::SharedSkip(reason) => Some(ResourceOutcome::SkippedShared { reason }),
                }),
            _ => Ok(None),
        };

        match result {
            Ok(None) => {}
            Ok(Some(outcome)) => {
                self.logger.log(EngineEvent::Info(
                    self.step_details(TeardownStep::Detach, subject),
                    EventMessage::new_from_safe(format!("{} skipped at execution time", subject)),
                ));
                outcomes.record(subject.clone(), outcome);
            }
            Err(err) => {
                outcomes.record(
                    subject.clone(),
                    ResourceOutcome::FailedPermanent {
                        error: err.to_string(),
                    },
                );
            }
        }
    }

    async fn execute_delete(
        &self,
        subject: &ResourceRef,
        outcomes: &mut Outcomes,
        unresolved_absences: &mut Vec<String>,
    ) {
        if subject.kind == ResourceKind::SecurityGroup {
            // handled by the iterative pass segment
            return;
        }

        // cluster and application deletion strictly require their children
        // to be absent first
        if matches!(subject.kind, ResourceKind::Cluster | ResourceKind::Application)
            && !unresolved_absences.is_empty()
        {
            outcomes.record(
                subject.clone(),
                ResourceOutcome::Blocked {
                    reason: format!("absence not confirmed for: {}", unresolved_absences.join(", ")),
                },
            );
            return;
        }

        let result = match subject.kind {
            ResourceKind::NodeGroup => {
                cluster::delete_nodegroup(&self.clients.eks, self.ctx, self.target.match_name(), subject, self.run)
                    .await
            }
            ResourceKind::Cluster => cluster::delete_cluster(&self.clients.eks, self.ctx, subject, self.run).await,
            ResourceKind::Scraper => monitoring::delete_scraper(&self.clients.amp, self.ctx, subject, self.run).await,
            ResourceKind::Addon => monitoring::delete_addon(&self.clients.eks, self.ctx, subject, self.run).await,
            ResourceKind::LogGroup => {
                monitoring::delete_log_group(&self.clients.logs, self.ctx, subject, self.run).await
            }
            ResourceKind::Workspace => {
                monitoring::delete_workspace(&self.clients.grafana, self.ctx, subject, self.run).await
            }
            ResourceKind::Alarm => {
                // composites only; basics are batched upstream
                Ok(alarms::delete_single_alarm(&self.clients.cloudwatch, self.ctx, subject, self.run).await)
            }
            ResourceKind::EventRule => {
                event_rules::delete_rule(&self.clients.eventbridge, self.ctx, subject, self.run).await
            }
            ResourceKind::Function => {
                functions::delete_function(&self.clients.lambda, self.ctx, subject, self.run).await
            }
            ResourceKind::Role => iam::delete_role(&self.clients.iam, self.ctx, subject, self.run).await,
            ResourceKind::Policy => {
                iam::purge_and_delete_policy(&self.clients.iam, self.ctx, subject, self.run).await
            }
            ResourceKind::Instance => {
                instance::terminate_instance(&self.clients.ec2, self.ctx, subject, self.run).await
            }
            ResourceKind::AppEnvironment => {
                application::terminate_environment(&self.clients.beanstalk, self.ctx, subject, self.run).await
            }
            ResourceKind::AppVersion => {
                application::delete_application_version(&self.clients.beanstalk, self.ctx, subject, self.run).await
            }
            ResourceKind::Application => {
                application::delete_application(&self.clients.beanstalk, self.ctx, subject, self.run).await
            }
            ResourceKind::SecurityGroup => return,
        };

        match result {
            Ok(outcome) => {
                if outcome.is_deleted() {
                    self.logger.log(EngineEvent::Info(
                        self.step_details(TeardownStep::Delete, subject),
                        EventMessage::new_from_safe(format!("deleted {subject}")),
                    ));
                }
                outcomes.record(subject.clone(), outcome);
            }
            Err(err) => {
                self.logger.log(EngineEvent::Error((*err).clone(), None));
                // a failed child delete leaves its absence unresolved, which
                // blocks the strictly-ordered parent delete downstream
                if matches!(subject.kind, ResourceKind::NodeGroup | ResourceKind::AppEnvironment) {
                    unresolved_absences.push(subject.id.clone());
                }
                outcomes.record(
                    subject.clone(),
                    ResourceOutcome::FailedPermanent {
                        error: err.to_string(),
                    },
                );
            }
        }
    }

    async fn execute_await(
        &self,
        subject: &ResourceRef,
        wait: &WaitSpec,
        outcomes: &mut Outcomes,
        unresolved_absences: &mut Vec<String>,
    ) {
        let result = match subject.kind {
            ResourceKind::NodeGroup => {
                cluster::await_nodegroup_absence(
                    &self.clients.eks,
                    self.ctx,
                    self.target.match_name(),
                    subject,
                    wait,
                    self.run,
                )
                .await
            }
            ResourceKind::Cluster => {
                cluster::await_cluster_absence(&self.clients.eks, self.ctx, subject, wait, self.run).await
            }
            ResourceKind::Addon => {
                monitoring::await_addon_absence(&self.clients.eks, self.ctx, subject, wait, self.run).await
            }
            ResourceKind::Instance => {
                let outcome =
                    instance::await_instance_terminated(&self.clients.ec2, self.ctx, subject, wait, self.run).await;
                if matches!(outcome, Ok(WaitOutcome::Satisfied)) {
                    instance::cleanup_residuals(&self.clients.ec2, self.ctx, subject, self.run, self.logger).await;
                }
                outcome
            }
            ResourceKind::AppEnvironment => {
                application::await_environment_terminated(&self.clients.beanstalk, self.ctx, subject, wait, self.run)
                    .await
            }
            _ => Ok(WaitOutcome::Satisfied),
        };

        // only nodegroup and environment absence gates a strictly-ordered
        // parent delete; add-on and instance waits are best-effort
        let gates_parent = matches!(subject.kind, ResourceKind::NodeGroup | ResourceKind::AppEnvironment);

        match result {
            Ok(WaitOutcome::Satisfied) => {}
            Ok(WaitOutcome::TimedOut) => {
                self.logger.log(EngineEvent::Warning(
                    self.step_details(TeardownStep::AwaitAbsence, subject),
                    EventMessage::new_from_safe(format!(
                        "timed out after {}s waiting for {} to disappear",
                        wait.timeout.as_secs(),
                        subject
                    )),
                ));
                if gates_parent {
                    unresolved_absences.push(subject.id.clone());
                }
                outcomes.record(subject.clone(), ResourceOutcome::FailedTimedOut);
            }
            Ok(WaitOutcome::Cancelled) => {
                if gates_parent {
                    unresolved_absences.push(subject.id.clone());
                }
            }
            Err(err) => {
                if gates_parent {
                    unresolved_absences.push(subject.id.clone());
                }
                outcomes.record(
                    subject.clone(),
                    ResourceOutcome::FailedPermanent {
                        error: err.to_string(),
                    },
                );
            }
        }
    }
}

/// Outcome accumulator: one terminal record per resource, later states
/// overwrite earlier ones (a Delete success upgraded to FailedTimedOut by its
/// absence wait, for instance), insertion order preserved for reports.
#[derive(Default)]
struct Outcomes {
    order: Vec<String>,
    by_id: HashMap<String, OutcomeRecord>,
}

impl Outcomes {
    fn record(&mut self, resource: ResourceRef, outcome: ResourceOutcome) {
        let id = resource.id.clone();
        if !self.by_id.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.by_id.insert(id, OutcomeRecord::new(resource, outcome));
    }

    fn has(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    fn get(&self, id: &str) -> Option<&ResourceOutcome> {
        self.by_id.get(id).map(|r| &r.outcome)
    }

    fn into_records(mut self) -> Vec<OutcomeRecord> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.remove(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify_inventory;
    use crate::inventory::{EksCluster, EksNodeGroup, IamRoleRecord, SecurityGroupRecord};
    use crate::teardown::plan::build_plan;

    fn ctx() -> AccountContext {
        AccountContext {
            account_name: "sandbox".to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
        }
    }

    fn r(kind: ResourceKind, name: &str) -> ResourceRef {
        ResourceRef {
            kind,
            id: name.to_string(),
            name: name.to_string(),
            account_name: "sandbox".to_string(),
            account_id: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            tags: Default::default(),
            created_at: None,
            state: None,
        }
    }

    fn empty_clients() -> TeardownClients {
        let config = SdkConfig::builder().build();
        TeardownClients {
            ec2: config.clone(),
            eks: config.clone(),
            iam: config.clone(),
            cloudwatch: config.clone(),
            logs: config.clone(),
            eventbridge: config.clone(),
            lambda: config.clone(),
            amp: config.clone(),
            grafana: config.clone(),
            beanstalk: config,
        }
    }

    fn demo_inventory() -> RegionInventory {
        RegionInventory {
            clusters: vec![EksCluster {
                resource: r(ResourceKind::Cluster, "eks-demo-abcd"),
                vpc_id: Some("vpc-1".to_string()),
                version: None,
                nodegroups: vec![EksNodeGroup {
                    resource: r(ResourceKind::NodeGroup, "ng-a"),
                    cluster_name: "eks-demo-abcd".to_string(),
                    desired_size: Some(2),
                    min_size: Some(1),
                    max_size: Some(3),
                    instance_types: vec!["t3.medium".to_string()],
                }],
                addons: vec![],
            }],
            security_groups: vec![SecurityGroupRecord {
                resource: r(ResourceKind::SecurityGroup, "sg-cluster-abcd"),
                vpc_id: Some("vpc-1".to_string()),
                description: String::new(),
                ingress_rule_count: 1,
                egress_rule_count: 1,
                attached_instance_ids: vec![],
            }],
            roles: vec![
                IamRoleRecord {
                    resource: r(ResourceKind::Role, "eks-node-role-abcd"),
                    arn: String::new(),
                    path: "/".to_string(),
                },
                IamRoleRecord {
                    resource: r(ResourceKind::Role, "AWSServiceRoleForAmazonEKS"),
                    arn: String::new(),
                    path: "/aws-service-role/eks.amazonaws.com/".to_string(),
                },
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_dry_run_records_would_delete_and_skips_without_cloud_calls() {
        // setup: a dry run against empty SDK configs; any accidental cloud
        // call would fail loudly on missing credentials
        let inventory = demo_inventory();
        let target = TeardownTarget::Cluster {
            name: "eks-demo-abcd".to_string(),
            vpc_id: Some("vpc-1".to_string()),
        };
        let classified = classify_inventory(&inventory, &target);
        let plan = build_plan(&target, &inventory, &classified).unwrap();

        let run = RunContext::new("tester", true);
        let ctx = ctx();
        let clients = empty_clients();
        let logger = crate::logger::StdIoLogger::new();
        let executor = TeardownExecutor {
            target: &target,
            ctx: &ctx,
            inventory: &inventory,
            run: &run,
            logger: &logger,
            clients: &clients,
        };

        // execute:
        let records = executor.execute(&plan).await;

        // verify: service-linked role skipped, everything else would-delete
        let by_id = |id: &str| records.iter().find(|r| r.resource.id == id).unwrap();
        assert!(matches!(
            by_id("AWSServiceRoleForAmazonEKS").outcome,
            ResourceOutcome::SkippedProtected { .. }
        ));
        for id in ["ng-a", "sg-cluster-abcd", "eks-node-role-abcd", "eks-demo-abcd"] {
            assert_eq!(by_id(id).outcome, ResourceOutcome::WouldDelete, "id: {id}");
        }
        // every record is terminal, nothing silent
        assert_eq!(records.len(), 5);
    }

    #[tokio::test]
    async fn test_cancelled_run_blocks_pending_deletes() {
        let inventory = demo_inventory();
        let target = TeardownTarget::Cluster {
            name: "eks-demo-abcd".to_string(),
            vpc_id: Some("vpc-1".to_string()),
        };
        let classified = classify_inventory(&inventory, &target);
        let plan = build_plan(&target, &inventory, &classified).unwrap();

        let run = RunContext::new("tester", true);
        run.cancel.cancel();
        let ctx = ctx();
        let clients = empty_clients();
        let logger = crate::logger::StdIoLogger::new();
        let executor = TeardownExecutor {
            target: &target,
            ctx: &ctx,
            inventory: &inventory,
            run: &run,
            logger: &logger,
            clients: &clients,
        };

        let records = executor.execute(&plan).await;

        // the skips are still reported; every planned delete is blocked
        assert!(records
            .iter()
            .filter(|r| !r.outcome.is_skipped())
            .all(|r| matches!(r.outcome, ResourceOutcome::Blocked { .. })));
    }
}

