use crate::classifier::{Candidate, ClassifiedInventory, TeardownTarget};
use crate::constants::{
    ADDON_ABSENCE_TIMEOUT, APP_ENVIRONMENT_ABSENCE_TIMEOUT, CLUSTER_ABSENCE_TIMEOUT, DEFAULT_POLL_INTERVAL,
    INSTANCE_TERMINATED_TIMEOUT, NODEGROUP_ABSENCE_TIMEOUT, TRANSIENT_RETRY_MAX_ATTEMPTS,
};
use crate::inventory::RegionInventory;
use crate::models::{DependencyEdge, EdgeKind, Label, ResourceKind, ResourceRef};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum StepOp {
    Detach,
    StripRules,
    Delete,
    AwaitAbsence,
    RemoveTargets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSpec {
    pub timeout: Duration,
    pub poll: Duration,
}

impl WaitSpec {
    pub fn new(timeout: Duration) -> Self {
        WaitSpec {
            timeout,
            poll: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: TRANSIENT_RETRY_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TeardownStepSpec {
    pub op: StepOp,
    pub subject: ResourceRef,
    pub wait: Option<WaitSpec>,
    pub retry: RetryPolicy,
}

impl TeardownStepSpec {
    fn new(op: StepOp, subject: ResourceRef) -> Self {
        TeardownStepSpec {
            op,
            subject,
            wait: None,
            retry: RetryPolicy::default(),
        }
    }

    fn with_wait(mut self, wait: WaitSpec) -> Self {
        self.wait = Some(wait);
        self
    }
}

/// An ordered teardown plan for one target in one (account, region) cell.
#[derive(Debug, Clone, Default)]
pub struct TeardownPlan {
    pub steps: Vec<TeardownStepSpec>,
    /// Protected and shared-suspected resources, carried for the report.
    pub skipped: Vec<Candidate>,
}

impl TeardownPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn delete_index(&self, resource_id: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.op == StepOp::Delete && s.subject.id == resource_id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("Plan contains a step against `{0}` which is not eligible for deletion")]
    IneligibleSubject(String),
    #[error("Plan violates deletion order: {0}")]
    OrderingViolation(String),
    #[error("Dependency cycle over containment edges: {0}")]
    DependencyCycle(String),
}

/// Builds the ordered plan for a target out of the classified inventory,
/// then validates it against the containment edges before handing it over.
pub fn build_plan(
    target: &TeardownTarget,
    inventory: &RegionInventory,
    classified: &ClassifiedInventory,
) -> Result<TeardownPlan, PlanError> {
    let mut plan = match target {
        TeardownTarget::Cluster { name, .. } => build_cluster_plan(name, inventory, classified),
        TeardownTarget::Instance { id, .. } => build_instance_plan(id, inventory, classified),
        TeardownTarget::Application { name } => build_application_plan(name, inventory, classified),
    };

    plan.skipped = classified.skipped().cloned().collect();

    validate(&plan, &containment_edges(inventory), classified)?;
    Ok(plan)
}

fn owned_refs(classified: &ClassifiedInventory, kind: ResourceKind) -> Vec<ResourceRef> {
    classified.owned_of_kind(kind).map(|c| c.resource.clone()).collect()
}

fn build_cluster_plan(
    cluster_name: &str,
    inventory: &RegionInventory,
    classified: &ClassifiedInventory,
) -> TeardownPlan {
    let mut steps = Vec::new();

    let Some(cluster) = inventory.clusters.iter().find(|c| c.resource.name == cluster_name) else {
        // target absent live: nothing to do beyond reporting classified skips
        return TeardownPlan {
            steps,
            skipped: Vec::new(),
        };
    };

    // 1. nodegroups drain first, each awaited to absence
    for nodegroup in &cluster.nodegroups {
        steps.push(TeardownStepSpec::new(StepOp::Delete, nodegroup.resource.clone()));
        steps.push(
            TeardownStepSpec::new(StepOp::AwaitAbsence, nodegroup.resource.clone())
                .with_wait(WaitSpec::new(NODEGROUP_ABSENCE_TIMEOUT)),
        );
    }

    // 2. monitoring attachments: scrapers, add-ons, container-insights log
    //    groups, workspaces
    for scraper in owned_refs(classified, ResourceKind::Scraper) {
        steps.push(TeardownStepSpec::new(StepOp::Delete, scraper));
    }
    for addon in &cluster.addons {
        steps.push(TeardownStepSpec::new(StepOp::Delete, addon.clone()));
        steps.push(
            TeardownStepSpec::new(StepOp::AwaitAbsence, addon.clone())
                .with_wait(WaitSpec::new(ADDON_ABSENCE_TIMEOUT)),
        );
    }
    for log_group in owned_refs(classified, ResourceKind::LogGroup) {
        steps.push(TeardownStepSpec::new(StepOp::Delete, log_group));
    }
    for workspace in owned_refs(classified, ResourceKind::Workspace) {
        steps.push(TeardownStepSpec::new(StepOp::Delete, workspace));
    }

    // 3. alarms: composites first, then basics, then cost alarms
    push_alarm_steps(&mut steps, inventory, classified);

    // 4. event rules lose their targets before deletion
    for rule in owned_refs(classified, ResourceKind::EventRule) {
        steps.push(TeardownStepSpec::new(StepOp::RemoveTargets, rule.clone()));
        steps.push(TeardownStepSpec::new(StepOp::Delete, rule));
    }

    // 5. functions: event-source mappings detach first
    for function in owned_refs(classified, ResourceKind::Function) {
        steps.push(TeardownStepSpec::new(StepOp::Detach, function.clone()));
        steps.push(TeardownStepSpec::new(StepOp::Delete, function));
    }

    // 6. roles, 7. policies
    for role in owned_refs(classified, ResourceKind::Role) {
        steps.push(TeardownStepSpec::new(StepOp::Detach, role.clone()));
        steps.push(TeardownStepSpec::new(StepOp::Delete, role));
    }
    for policy in owned_refs(classified, ResourceKind::Policy) {
        steps.push(TeardownStepSpec::new(StepOp::Delete, policy));
    }

    // 8. security groups: strip rules then delete; the executor iterates
    //    this pass to unwind cross-references
    for group in owned_refs(classified, ResourceKind::SecurityGroup) {
        steps.push(TeardownStepSpec::new(StepOp::StripRules, group.clone()));
        steps.push(TeardownStepSpec::new(StepOp::Delete, group));
    }

    // 9. the cluster itself
    steps.push(TeardownStepSpec::new(StepOp::Delete, cluster.resource.clone()));
    steps.push(
        TeardownStepSpec::new(StepOp::AwaitAbsence, cluster.resource.clone())
            .with_wait(WaitSpec::new(CLUSTER_ABSENCE_TIMEOUT)),
    );

    TeardownPlan {
        steps,
        skipped: Vec::new(),
    }
}

fn push_alarm_steps(steps: &mut Vec<TeardownStepSpec>, inventory: &RegionInventory, classified: &ClassifiedInventory) {
    let is_composite = |id: &str| {
        inventory
            .alarms
            .iter()
            .find(|a| a.resource.id == id)
            .map(|a| a.is_composite)
            .unwrap_or(false)
    };
    let is_cost_alarm = |name: &str| {
        let name = name.to_lowercase();
        name.contains("cost") || name.contains("billing")
    };

    let owned_alarms = owned_refs(classified, ResourceKind::Alarm);
    let (composites, rest): (Vec<_>, Vec<_>) = owned_alarms.into_iter().partition(|a| is_composite(&a.id));
    let (cost, basics): (Vec<_>, Vec<_>) = rest.into_iter().partition(|a| is_cost_alarm(&a.name));

    for alarm in composites.into_iter().chain(basics).chain(cost) {
        steps.push(TeardownStepSpec::new(StepOp::Delete, alarm));
    }
}

fn build_instance_plan(
    instance_id: &str,
    inventory: &RegionInventory,
    classified: &ClassifiedInventory,
) -> TeardownPlan {
    let mut steps = Vec::new();

    if let Some(instance) = inventory.instances.iter().find(|i| i.resource.id == instance_id) {
        if !instance.is_finalized() {
            steps.push(TeardownStepSpec::new(StepOp::Delete, instance.resource.clone()));
        }
        steps.push(
            TeardownStepSpec::new(StepOp::AwaitAbsence, instance.resource.clone())
                .with_wait(WaitSpec::new(INSTANCE_TERMINATED_TIMEOUT)),
        );
    }

    push_alarm_steps(&mut steps, inventory, classified);
    for log_group in owned_refs(classified, ResourceKind::LogGroup) {
        steps.push(TeardownStepSpec::new(StepOp::Delete, log_group));
    }
    for function in owned_refs(classified, ResourceKind::Function) {
        steps.push(TeardownStepSpec::new(StepOp::Detach, function.clone()));
        steps.push(TeardownStepSpec::new(StepOp::Delete, function));
    }

    for group in owned_refs(classified, ResourceKind::SecurityGroup) {
        steps.push(TeardownStepSpec::new(StepOp::StripRules, group.clone()));
        steps.push(TeardownStepSpec::new(StepOp::Delete, group));
    }

    TeardownPlan {
        steps,
        skipped: Vec::new(),
    }
}

fn build_application_plan(
    application_name: &str,
    inventory: &RegionInventory,
    _classified: &ClassifiedInventory,
) -> TeardownPlan {
    let mut steps = Vec::new();

    let Some(application) = inventory
        .applications
        .iter()
        .find(|a| a.resource.name == application_name)
    else {
        return TeardownPlan::default();
    };

    for environment in &application.environments {
        steps.push(TeardownStepSpec::new(StepOp::Delete, environment.resource.clone()));
        steps.push(
            TeardownStepSpec::new(StepOp::AwaitAbsence, environment.resource.clone())
                .with_wait(WaitSpec::new(APP_ENVIRONMENT_ABSENCE_TIMEOUT)),
        );
    }

    for label in &application.version_labels {
        let version_ref = ResourceRef {
            kind: ResourceKind::AppVersion,
            id: format!("{application_name}/{label}"),
            name: label.clone(),
            ..application.resource.clone()
        };
        steps.push(TeardownStepSpec::new(StepOp::Delete, version_ref));
    }

    steps.push(TeardownStepSpec::new(StepOp::Delete, application.resource.clone()));

    TeardownPlan {
        steps,
        skipped: Vec::new(),
    }
}

/// Containment and attachment edges implied by the hydrated inventory.
pub fn containment_edges(inventory: &RegionInventory) -> Vec<DependencyEdge> {
    let mut edges = Vec::new();

    for cluster in &inventory.clusters {
        for nodegroup in &cluster.nodegroups {
            edges.push(DependencyEdge::new(
                cluster.resource.clone(),
                nodegroup.resource.clone(),
                EdgeKind::Contains,
            ));
        }
        for addon in &cluster.addons {
            edges.push(DependencyEdge::new(
                cluster.resource.clone(),
                addon.clone(),
                EdgeKind::AttachedTo,
            ));
        }
    }

    for application in &inventory.applications {
        for environment in &application.environments {
            edges.push(DependencyEdge::new(
                application.resource.clone(),
                environment.resource.clone(),
                EdgeKind::Contains,
            ));
        }
    }

    edges
}

/// Rejects plans that would violate the hard ordering invariants: no step on
/// a protected or shared ref, children of containment edges deleted strictly
/// before their parents, and no cycle in the containment subgraph.
fn validate(
    plan: &TeardownPlan,
    edges: &[DependencyEdge],
    classified: &ClassifiedInventory,
) -> Result<(), PlanError> {
    let ineligible: HashMap<&str, Label> = classified
        .candidates
        .iter()
        .filter(|c| {
            matches!(
                c.classification.label,
                Label::Protected | Label::SharedSuspected | Label::Unrelated
            )
        })
        .map(|c| (c.resource.id.as_str(), c.classification.label))
        .collect();

    for step in &plan.steps {
        if let Some(label) = ineligible.get(step.subject.id.as_str()) {
            // Unrelated refs are merely absent from plans; a stray one is a
            // planner bug and rejected just the same.
            return Err(PlanError::IneligibleSubject(format!(
                "{} ({label})",
                step.subject.id
            )));
        }
    }

    detect_cycles(edges)?;

    for edge in edges {
        if !matches!(edge.kind, EdgeKind::Contains | EdgeKind::AttachedTo) {
            continue;
        }
        let (Some(child_delete), Some(parent_delete)) =
            (plan.delete_index(&edge.child.id), plan.delete_index(&edge.parent.id))
        else {
            continue;
        };
        if child_delete >= parent_delete {
            return Err(PlanError::OrderingViolation(format!(
                "`{}` must be deleted before `{}`",
                edge.child.id, edge.parent.id
            )));
        }
    }

    Ok(())
}

fn detect_cycles(edges: &[DependencyEdge]) -> Result<(), PlanError> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        if matches!(edge.kind, EdgeKind::Contains | EdgeKind::AttachedTo) {
            adjacency
                .entry(edge.parent.id.as_str())
                .or_default()
                .push(edge.child.id.as_str());
        }
    }

    let mut done: HashSet<&str> = HashSet::new();
    let mut in_progress: HashSet<&str> = HashSet::new();

    fn visit<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        done: &mut HashSet<&'a str>,
        in_progress: &mut HashSet<&'a str>,
    ) -> Result<(), PlanError> {
        if done.contains(node) {
            return Ok(());
        }
        if !in_progress.insert(node) {
            return Err(PlanError::DependencyCycle(node.to_string()));
        }
        for next in adjacency.get(node).into_iter().flatten().copied() {
            visit(next, adjacency, done, in_progress)?;
        }
        in_progress.remove(node);
        done.insert(node);
        Ok(())
    }

    let nodes: Vec<&str> = adjacency.keys().copied().collect();
    for node in nodes {
        visit(node, &adjacency, &mut done, &mut in_progress)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{classify_inventory, TeardownTarget};
    use crate::inventory::{
        AlarmRecord, EksCluster, EksNodeGroup, EventRuleRecord, FunctionRecord, IamRoleRecord, RegionInventory,
        SecurityGroupRecord,
    };
    use crate::models::{Account, AccountContext};
    use maplit::btreemap;

    fn ctx() -> AccountContext {
        AccountContext::new(
            &Account {
                name: "sandbox".to_string(),
                id: "123456789012".to_string(),
                email: String::new(),
                access_key: "AKIA".to_string(),
                secret_key: "s".to_string(),
                default_regions: vec![],
            },
            "us-east-1",
        )
    }

    fn r(kind: ResourceKind, name: &str) -> ResourceRef {
        ResourceRef::new(kind, name, name, &ctx())
    }

    /// The end-to-end happy-path inventory: cluster, nodegroup, tagged SG,
    /// node role, scaling function and event rule.
    fn demo_inventory() -> RegionInventory {
        let cluster_name = "eks-demo-abcd";
        RegionInventory {
            clusters: vec![EksCluster {
                resource: r(ResourceKind::Cluster, cluster_name),
                vpc_id: Some("vpc-1".to_string()),
                version: Some("1.31".to_string()),
                nodegroups: vec![EksNodeGroup {
                    resource: r(ResourceKind::NodeGroup, "ng-a"),
                    cluster_name: cluster_name.to_string(),
                    desired_size: Some(2),
                    min_size: Some(1),
                    max_size: Some(3),
                    instance_types: vec!["t3.medium".to_string()],
                }],
                addons: vec![],
            }],
            security_groups: vec![SecurityGroupRecord {
                resource: ResourceRef {
                    tags: btreemap! {
                        "kubernetes.io/cluster/eks-demo-abcd".to_string() => "owned".to_string()
                    },
                    ..r(ResourceKind::SecurityGroup, "sg-cluster-abcd")
                },
                vpc_id: Some("vpc-1".to_string()),
                description: String::new(),
                ingress_rule_count: 1,
                egress_rule_count: 1,
                attached_instance_ids: vec![],
            }],
            roles: vec![IamRoleRecord {
                resource: r(ResourceKind::Role, "eks-node-role-abcd"),
                arn: "arn:aws:iam::123456789012:role/eks-node-role-abcd".to_string(),
                path: "/".to_string(),
            }],
            functions: vec![FunctionRecord {
                resource: r(ResourceKind::Function, "eks-scale-abcd"),
                arn: "arn:aws:lambda:us-east-1:123456789012:function:eks-scale-abcd".to_string(),
            }],
            event_rules: vec![EventRuleRecord {
                resource: r(ResourceKind::EventRule, "eks-up-abcd"),
                arn: "arn:aws:events:us-east-1:123456789012:rule/eks-up-abcd".to_string(),
                description: String::new(),
            }],
            ..Default::default()
        }
    }

    fn demo_target() -> TeardownTarget {
        TeardownTarget::Cluster {
            name: "eks-demo-abcd".to_string(),
            vpc_id: Some("vpc-1".to_string()),
        }
    }

    #[test]
    fn test_cluster_plan_ordering() {
        let inventory = demo_inventory();
        let classified = classify_inventory(&inventory, &demo_target());

        let plan = build_plan(&demo_target(), &inventory, &classified).unwrap();

        let idx = |op: StepOp, id: &str| {
            plan.steps
                .iter()
                .position(|s| s.op == op && s.subject.id == id)
                .unwrap_or_else(|| panic!("missing step {op} {id}"))
        };

        // nodegroup drains first and is awaited before anything else
        assert_eq!(idx(StepOp::Delete, "ng-a"), 0);
        assert_eq!(idx(StepOp::AwaitAbsence, "ng-a"), 1);

        // rules lose targets before deletion, functions detach before deletion
        assert!(idx(StepOp::RemoveTargets, "eks-up-abcd") < idx(StepOp::Delete, "eks-up-abcd"));
        assert!(idx(StepOp::Detach, "eks-scale-abcd") < idx(StepOp::Delete, "eks-scale-abcd"));
        assert!(idx(StepOp::Detach, "eks-node-role-abcd") < idx(StepOp::Delete, "eks-node-role-abcd"));

        // SG rules are stripped before its delete, and both precede cluster delete
        assert!(idx(StepOp::StripRules, "sg-cluster-abcd") < idx(StepOp::Delete, "sg-cluster-abcd"));
        assert!(idx(StepOp::Delete, "sg-cluster-abcd") < idx(StepOp::Delete, "eks-demo-abcd"));

        // cluster goes last, then its absence wait
        assert_eq!(idx(StepOp::Delete, "eks-demo-abcd"), plan.steps.len() - 2);
        assert_eq!(idx(StepOp::AwaitAbsence, "eks-demo-abcd"), plan.steps.len() - 1);
    }

    #[test]
    fn test_absent_target_yields_empty_plan() {
        let inventory = RegionInventory::default();
        let classified = classify_inventory(&inventory, &demo_target());

        let plan = build_plan(&demo_target(), &inventory, &classified).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_protected_resources_never_enter_the_plan() {
        let mut inventory = demo_inventory();
        inventory.roles.push(IamRoleRecord {
            resource: r(ResourceKind::Role, "AWSServiceRoleForAmazonEKS"),
            arn: "arn:aws:iam::123456789012:role/AWSServiceRoleForAmazonEKS".to_string(),
            path: "/aws-service-role/eks.amazonaws.com/".to_string(),
        });
        inventory.security_groups.push(SecurityGroupRecord {
            resource: r(ResourceKind::SecurityGroup, "eks-cluster-sg-eks-demo-abcd-42"),
            vpc_id: Some("vpc-1".to_string()),
            description: String::new(),
            ingress_rule_count: 0,
            egress_rule_count: 1,
            attached_instance_ids: vec![],
        });

        let classified = classify_inventory(&inventory, &demo_target());
        let plan = build_plan(&demo_target(), &inventory, &classified).unwrap();

        assert!(plan
            .steps
            .iter()
            .all(|s| s.subject.id != "AWSServiceRoleForAmazonEKS"
                && s.subject.id != "eks-cluster-sg-eks-demo-abcd-42"));
        assert_eq!(plan.skipped.len(), 2);
    }

    #[test]
    fn test_alarm_ordering_composites_basics_cost() {
        let mut inventory = demo_inventory();
        inventory.alarms = vec![
            AlarmRecord {
                resource: r(ResourceKind::Alarm, "cost-alarm-abcd"),
                arn: String::new(),
                description: String::new(),
                is_composite: false,
                dimensions: Default::default(),
            },
            AlarmRecord {
                resource: r(ResourceKind::Alarm, "cpu-basic-abcd"),
                arn: String::new(),
                description: String::new(),
                is_composite: false,
                dimensions: Default::default(),
            },
            AlarmRecord {
                resource: r(ResourceKind::Alarm, "composite-abcd"),
                arn: String::new(),
                description: String::new(),
                is_composite: true,
                dimensions: Default::default(),
            },
        ];

        let classified = classify_inventory(&inventory, &demo_target());
        let plan = build_plan(&demo_target(), &inventory, &classified).unwrap();

        let idx = |id: &str| plan.delete_index(id).unwrap();
        assert!(idx("composite-abcd") < idx("cpu-basic-abcd"));
        assert!(idx("cpu-basic-abcd") < idx("cost-alarm-abcd"));
    }

    #[test]
    fn test_validation_rejects_child_after_parent() {
        let inventory = demo_inventory();
        let classified = classify_inventory(&inventory, &demo_target());
        let cluster = inventory.clusters[0].resource.clone();
        let nodegroup = inventory.clusters[0].nodegroups[0].resource.clone();

        // hand-build a plan that deletes the cluster before its nodegroup
        let plan = TeardownPlan {
            steps: vec![
                TeardownStepSpec::new(StepOp::Delete, cluster),
                TeardownStepSpec::new(StepOp::Delete, nodegroup),
            ],
            skipped: Vec::new(),
        };

        let result = validate(&plan, &containment_edges(&inventory), &classified);
        assert!(matches!(result, Err(PlanError::OrderingViolation(_))));
    }

    #[test]
    fn test_cycle_detection() {
        let a = r(ResourceKind::Cluster, "a");
        let b = r(ResourceKind::NodeGroup, "b");
        let edges = vec![
            DependencyEdge::new(a.clone(), b.clone(), EdgeKind::Contains),
            DependencyEdge::new(b, a, EdgeKind::Contains),
        ];

        assert!(matches!(detect_cycles(&edges), Err(PlanError::DependencyCycle(_))));
    }

    #[test]
    fn test_application_plan_shape() {
        use crate::inventory::{AppEnvironmentRecord, ApplicationRecord};

        let inventory = RegionInventory {
            applications: vec![ApplicationRecord {
                resource: r(ResourceKind::Application, "shop"),
                environments: vec![AppEnvironmentRecord {
                    resource: r(ResourceKind::AppEnvironment, "e-12345"),
                    application_name: "shop".to_string(),
                }],
                version_labels: vec!["v1".to_string(), "v2".to_string()],
            }],
            ..Default::default()
        };
        let target = TeardownTarget::Application {
            name: "shop".to_string(),
        };
        let classified = classify_inventory(&inventory, &target);

        let plan = build_plan(&target, &inventory, &classified).unwrap();
        let ops: Vec<(StepOp, &str)> = plan.steps.iter().map(|s| (s.op, s.subject.name.as_str())).collect();

        assert_eq!(
            ops,
            vec![
                (StepOp::Delete, "e-12345"),
                (StepOp::AwaitAbsence, "e-12345"),
                (StepOp::Delete, "v1"),
                (StepOp::Delete, "v2"),
                (StepOp::Delete, "shop"),
            ]
        );
    }
}
