use crate::constants::SHARED_SECURITY_GROUP_INTERFACE_THRESHOLD;
use crate::models::{Classification, Label, ResourceKind, ResourceRef};

/// Root of a teardown run. Classification attributes every candidate resource
/// to (or away from) one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownTarget {
    Cluster { name: String, vpc_id: Option<String> },
    Instance { id: String, name: String },
    Application { name: String },
}

impl TeardownTarget {
    pub fn kind(&self) -> ResourceKind {
        match self {
            TeardownTarget::Cluster { .. } => ResourceKind::Cluster,
            TeardownTarget::Instance { .. } => ResourceKind::Instance,
            TeardownTarget::Application { .. } => ResourceKind::Application,
        }
    }

    pub fn match_name(&self) -> &str {
        match self {
            TeardownTarget::Cluster { name, .. } => name,
            TeardownTarget::Instance { name, .. } => name,
            TeardownTarget::Application { name } => name,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            TeardownTarget::Cluster { name, .. } => name,
            TeardownTarget::Instance { id, .. } => id,
            TeardownTarget::Application { name } => name,
        }
    }

    /// The last '-'-delimited component of the target name, usable as a match
    /// token only when long enough to be distinctive.
    pub fn suffix_token(&self) -> Option<String> {
        let suffix = self.match_name().rsplit('-').next()?;
        if suffix.len() >= 4 && suffix.len() < self.match_name().len() {
            Some(suffix.to_lowercase())
        } else {
            None
        }
    }
}

/// Side information the plain [ResourceRef] does not carry.
#[derive(Debug, Clone, Default)]
pub struct ClassifyHints<'a> {
    /// Security-group or alarm description.
    pub description: Option<&'a str>,
    /// IAM role path.
    pub role_path: Option<&'a str>,
    /// Network interfaces referencing a security group (correlate pass).
    pub attached_interface_count: Option<usize>,
    /// Alarm metric dimensions.
    pub dimensions: Option<&'a std::collections::BTreeMap<String, String>>,
}

/// Names that are never deleted no matter how well they match. Mostly cluster
/// plumbing that outlives any one cluster, plus operator infrastructure.
const PROTECTED_NAME_PATTERNS: &[&str] = &[
    "eks-service-role",
    "eks_service_role",
    "nodeinstancerole",
    "node-instance-role",
    "cluster-autoscaler",
    "karpenter",
    "alb-ingress",
    "external-dns",
    "ebs-csi-controller",
    "loadbalancer-controller",
    "eks-admin",
    "bastion",
    "terraform",
    "jenkins",
    "argocd",
    "adot",
    "monitoring-role",
];

const SHARED_NAME_PATTERNS: &[&str] = &[
    "common-",
    "shared-",
    "global-",
    "admin-",
    "all-",
    "multi-",
    "monitoring-",
    "backup-",
    "security-",
];

/// Policy names that indicate a role serves more than one cluster; checked at
/// execution time against the role's attached policies.
const SHARED_POLICY_TERMS: &[&str] = &["common", "shared", "global", "all", "clusters", "multi"];

pub fn attached_policy_names_look_shared<S: AsRef<str>>(policy_names: &[S]) -> bool {
    policy_names.iter().any(|name| {
        let name = name.as_ref().to_lowercase();
        SHARED_POLICY_TERMS.iter().any(|term| name.contains(term))
    })
}

/// Labels one resource against one target. Tie-break strength is
/// Protected > SharedSuspected > OwnedByTarget > Unrelated and a stronger
/// label is never replaced by a weaker one.
pub fn classify(resource: &ResourceRef, target: &TeardownTarget, hints: &ClassifyHints) -> Classification {
    if let Some(classification) = protected(resource, hints) {
        return classification;
    }

    let name = resource.name.to_lowercase();

    if let Some(pattern) = SHARED_NAME_PATTERNS.iter().find(|p| name.contains(*p)) {
        return Classification::new(
            Label::SharedSuspected,
            format!("name matches shared pattern `{pattern}`"),
        );
    }

    let strong = strong_match(resource, target, hints);

    if strong.is_some() {
        // Kind-specific demotions: a strong match is not enough when the
        // resource smells multi-cluster.
        if matches!(
            resource.kind,
            ResourceKind::Function | ResourceKind::Role | ResourceKind::Policy
        ) && (name.contains("all") || name.contains("multi"))
        {
            return Classification::new(
                Label::SharedSuspected,
                "name suggests the resource serves several clusters",
            );
        }

        if resource.kind == ResourceKind::SecurityGroup {
            if let Some(count) = hints.attached_interface_count {
                if count > SHARED_SECURITY_GROUP_INTERFACE_THRESHOLD {
                    return Classification::new(
                        Label::SharedSuspected,
                        format!("referenced by {count} network interfaces"),
                    );
                }
            }
        }
    }

    if resource.kind == ResourceKind::EventRule {
        let cluster_tag_count = resource
            .tags
            .keys()
            .filter(|k| k.to_lowercase().starts_with("kubernetes.io/cluster/"))
            .count();
        if cluster_tag_count > 1 {
            return Classification::new(
                Label::SharedSuspected,
                format!("tags reference {cluster_tag_count} clusters"),
            );
        }
    }

    match strong {
        Some(reason) => Classification::new(Label::OwnedByTarget, reason),
        None => Classification::new(Label::Unrelated, "no strong match against target"),
    }
}

fn protected(resource: &ResourceRef, hints: &ClassifyHints) -> Option<Classification> {
    let name = resource.name.to_lowercase();

    if resource.kind == ResourceKind::Role {
        if resource.name.starts_with("AWSServiceRoleFor") {
            return Some(Classification::new(Label::Protected, "provider service-linked role"));
        }
        if let Some(path) = hints.role_path {
            if path.contains("/aws-service-role/") || path.contains("/service-role/") {
                return Some(Classification::new(Label::Protected, "role lives under a service path"));
            }
        }
    }

    if resource.kind == ResourceKind::SecurityGroup {
        if name == "default" {
            return Some(Classification::new(Label::Protected, "VPC default security group"));
        }
        if name.starts_with("eks-cluster-sg") {
            // provider-created SG granting private access to cluster nodes
            return Some(Classification::new(
                Label::Protected,
                "provider-managed cluster security group",
            ));
        }
    }

    PROTECTED_NAME_PATTERNS
        .iter()
        .find(|p| name.contains(*p))
        .map(|pattern| Classification::new(Label::Protected, format!("name matches protected pattern `{pattern}`")))
}

fn strong_match(resource: &ResourceRef, target: &TeardownTarget, hints: &ClassifyHints) -> Option<String> {
    let name = resource.name.to_lowercase();
    let target_name = target.match_name().to_lowercase();

    if name.contains(&target_name) {
        return Some(format!("name contains target name `{target_name}`"));
    }
    if target.id() != target.match_name() && name.contains(&target.id().to_lowercase()) {
        return Some(format!("name contains target id `{}`", target.id()));
    }

    if let Some(suffix) = target.suffix_token() {
        if name.contains(&format!("-{suffix}")) {
            return Some(format!("name carries target suffix `-{suffix}`"));
        }
    }

    for tag_key in ["Cluster", "ClusterName", "eks-cluster"] {
        if let Some(value) = lookup_tag_case_insensitive(resource, tag_key) {
            if value.to_lowercase() == target_name {
                return Some(format!("tag `{tag_key}` equals target name"));
            }
        }
    }

    let ownership_key = format!("kubernetes.io/cluster/{target_name}");
    if resource.tags.keys().any(|k| k.to_lowercase() == ownership_key) {
        return Some(format!("tagged `{ownership_key}`"));
    }

    if let Some(description) = hints.description {
        if description.to_lowercase().contains(&target_name) {
            return Some("description mentions target name".to_string());
        }
    }

    if let Some(dimensions) = hints.dimensions {
        for dimension in ["ClusterName", "NodegroupName"] {
            if let Some(value) = dimensions.get(dimension) {
                if value.to_lowercase().contains(&target_name) {
                    return Some(format!("dimension `{dimension}` points at target"));
                }
            }
        }
    }

    None
}

fn lookup_tag_case_insensitive<'a>(resource: &'a ResourceRef, key: &str) -> Option<&'a str> {
    let key = key.to_lowercase();
    resource
        .tags
        .iter()
        .find(|(k, _)| k.to_lowercase() == key)
        .map(|(_, v)| v.as_str())
}

/// One classified resource.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub resource: ResourceRef,
    pub classification: Classification,
}

/// Every region resource labeled against one target. Labels are immutable
/// once produced; downstream stages only read them.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedInventory {
    pub candidates: Vec<Candidate>,
}

impl ClassifiedInventory {
    pub fn owned_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Candidate> {
        self.candidates
            .iter()
            .filter(move |c| c.resource.kind == kind && c.classification.label == Label::OwnedByTarget)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| {
            matches!(
                c.classification.label,
                Label::Protected | Label::SharedSuspected
            )
        })
    }

    pub fn with_label(&self, label: Label) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(move |c| c.classification.label == label)
    }
}

/// Labels the full region inventory against one target. Self-descriptions of
/// the target (the cluster itself, its nodegroups) are not candidates here;
/// the planner sequences those directly.
pub fn classify_inventory(
    inventory: &crate::inventory::RegionInventory,
    target: &TeardownTarget,
) -> ClassifiedInventory {
    let mut candidates = Vec::new();

    let mut push = |resource: &ResourceRef, hints: &ClassifyHints| {
        candidates.push(Candidate {
            resource: resource.clone(),
            classification: classify(resource, target, hints),
        });
    };

    for group in &inventory.security_groups {
        // keep the pass inside the target's VPC when the target pins one
        if let TeardownTarget::Cluster {
            vpc_id: Some(vpc_id), ..
        } = target
        {
            if group.vpc_id.as_deref() != Some(vpc_id.as_str()) {
                continue;
            }
        }
        push(
            &group.resource,
            &ClassifyHints {
                description: Some(&group.description),
                attached_interface_count: Some(group.attached_instance_ids.len()),
                ..Default::default()
            },
        );
    }

    for role in &inventory.roles {
        push(
            &role.resource,
            &ClassifyHints {
                role_path: Some(&role.path),
                ..Default::default()
            },
        );
    }
    for policy in &inventory.policies {
        push(&policy.resource, &ClassifyHints::default());
    }
    for function in &inventory.functions {
        push(&function.resource, &ClassifyHints::default());
    }
    for rule in &inventory.event_rules {
        push(&rule.resource, &ClassifyHints::default());
    }
    for alarm in &inventory.alarms {
        push(
            &alarm.resource,
            &ClassifyHints {
                description: Some(&alarm.description),
                dimensions: Some(&alarm.dimensions),
                ..Default::default()
            },
        );
    }
    for log_group in &inventory.log_groups {
        push(&log_group.resource, &ClassifyHints::default());
    }
    for scraper in &inventory.scrapers {
        push(&scraper.resource, &ClassifyHints::default());
    }
    for workspace in &inventory.workspaces {
        push(&workspace.resource, &ClassifyHints::default());
    }

    ClassifiedInventory { candidates }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn target() -> TeardownTarget {
        TeardownTarget::Cluster {
            name: "eks-demo-abcd".to_string(),
            vpc_id: Some("vpc-1".to_string()),
        }
    }

    fn resource(kind: ResourceKind, name: &str) -> ResourceRef {
        ResourceRef::new(kind, name, name, &ctx())
    }

    #[test]
    fn test_suffix_token() {
        assert_eq!(target().suffix_token(), Some("abcd".to_string()));

        let short = TeardownTarget::Cluster {
            name: "eks-demo-a1".to_string(),
            vpc_id: None,
        };
        assert_eq!(short.suffix_token(), None);

        let no_delimiter = TeardownTarget::Cluster {
            name: "monolith".to_string(),
            vpc_id: None,
        };
        assert_eq!(no_delimiter.suffix_token(), None);
    }

    #[test]
    fn test_service_linked_role_is_protected() {
        let role = resource(ResourceKind::Role, "AWSServiceRoleForAmazonEKS");
        let result = classify(&role, &target(), &ClassifyHints::default());
        assert_eq!(result.label, Label::Protected);
    }

    #[test]
    fn test_service_path_role_is_protected() {
        let role = resource(ResourceKind::Role, "eks-demo-abcd-runner");
        let hints = ClassifyHints {
            role_path: Some("/aws-service-role/eks.amazonaws.com/"),
            ..Default::default()
        };
        assert_eq!(classify(&role, &target(), &hints).label, Label::Protected);
    }

    #[test]
    fn test_protected_patterns_beat_strong_match() {
        // all of these match the target suffix yet stay protected
        for name in [
            "cluster-autoscaler-abcd",
            "karpenter-eks-demo-abcd",
            "ebs-csi-controller-abcd",
            "terraform-eks-demo-abcd",
        ] {
            let role = resource(ResourceKind::Role, name);
            let result = classify(&role, &target(), &ClassifyHints::default());
            assert_eq!(result.label, Label::Protected, "name: {name}");
        }
    }

    #[test]
    fn test_provider_cluster_sg_is_protected() {
        let sg = resource(ResourceKind::SecurityGroup, "eks-cluster-sg-eks-demo-abcd-1234");
        assert_eq!(classify(&sg, &target(), &ClassifyHints::default()).label, Label::Protected);

        let default_sg = resource(ResourceKind::SecurityGroup, "default");
        assert_eq!(
            classify(&default_sg, &target(), &ClassifyHints::default()).label,
            Label::Protected
        );
    }

    #[test]
    fn test_shared_name_patterns() {
        for name in ["shared-eks-demo-abcd", "common-nodes", "backup-abcd", "security-scan"] {
            let role = resource(ResourceKind::Role, name);
            let result = classify(&role, &target(), &ClassifyHints::default());
            assert_eq!(result.label, Label::SharedSuspected, "name: {name}");
        }
    }

    #[test]
    fn test_all_multi_demotion_for_roles_functions_policies() {
        // strong suffix match plus an "all"/"multi" token -> shared suspected
        for kind in [ResourceKind::Function, ResourceKind::Role, ResourceKind::Policy] {
            let r = resource(kind, "scale-allclusters-abcd");
            let result = classify(&r, &target(), &ClassifyHints::default());
            assert_eq!(result.label, Label::SharedSuspected, "kind: {kind}");
        }

        // same name shape on a log group is not demoted
        let lg = resource(ResourceKind::LogGroup, "scale-allclusters-abcd");
        assert_eq!(
            classify(&lg, &target(), &ClassifyHints::default()).label,
            Label::OwnedByTarget
        );
    }

    #[test]
    fn test_security_group_interface_threshold() {
        let sg = resource(ResourceKind::SecurityGroup, "sg-eks-demo-abcd");

        let busy = ClassifyHints {
            attached_interface_count: Some(6),
            ..Default::default()
        };
        assert_eq!(classify(&sg, &target(), &busy).label, Label::SharedSuspected);

        let quiet = ClassifyHints {
            attached_interface_count: Some(5),
            ..Default::default()
        };
        assert_eq!(classify(&sg, &target(), &quiet).label, Label::OwnedByTarget);
    }

    #[test]
    fn test_event_rule_multi_cluster_tags() {
        let mut rule = resource(ResourceKind::EventRule, "eks-up-abcd");
        rule.tags = btreemap! {
            "kubernetes.io/cluster/eks-demo-abcd".to_string() => "owned".to_string(),
            "kubernetes.io/cluster/eks-other-wxyz".to_string() => "owned".to_string(),
        };
        assert_eq!(
            classify(&rule, &target(), &ClassifyHints::default()).label,
            Label::SharedSuspected
        );
    }

    #[test]
    fn test_strong_match_variants() {
        struct TestCase {
            resource: ResourceRef,
            hints_description: Option<&'static str>,
            expected: Label,
            description: &'static str,
        }

        let ownership_tagged = {
            let mut sg = resource(ResourceKind::SecurityGroup, "sg-cluster-nodes");
            sg.tags = btreemap! { "kubernetes.io/cluster/eks-demo-abcd".to_string() => "owned".to_string() };
            sg
        };
        let cluster_tagged = {
            let mut role = resource(ResourceKind::Role, "worker-node-role");
            role.tags = btreemap! { "ClusterName".to_string() => "eks-demo-abcd".to_string() };
            role
        };

        let test_cases = vec![
            TestCase {
                resource: resource(ResourceKind::Role, "eks-node-role-eks-demo-abcd"),
                hints_description: None,
                expected: Label::OwnedByTarget,
                description: "full name containment",
            },
            TestCase {
                resource: resource(ResourceKind::Function, "eks-scale-abcd"),
                hints_description: None,
                expected: Label::OwnedByTarget,
                description: "suffix token with delimiter",
            },
            TestCase {
                resource: ownership_tagged,
                hints_description: None,
                expected: Label::OwnedByTarget,
                description: "kubernetes.io ownership tag",
            },
            TestCase {
                resource: cluster_tagged,
                hints_description: None,
                expected: Label::OwnedByTarget,
                description: "ClusterName tag equality",
            },
            TestCase {
                resource: resource(ResourceKind::SecurityGroup, "sg-workers"),
                hints_description: Some("Nodes of eks-demo-abcd"),
                expected: Label::OwnedByTarget,
                description: "description mention",
            },
            TestCase {
                resource: resource(ResourceKind::Role, "unrelated-role"),
                hints_description: None,
                expected: Label::Unrelated,
                description: "no match at all",
            },
            TestCase {
                // `abcd` present but not delimiter-bounded on the target side
                resource: resource(ResourceKind::Role, "xabcd-runner"),
                hints_description: None,
                expected: Label::Unrelated,
                description: "suffix without delimiter does not count",
            },
        ];

        for tc in test_cases {
            let hints = ClassifyHints {
                description: tc.hints_description,
                ..Default::default()
            };
            let result = classify(&tc.resource, &target(), &hints);
            assert_eq!(result.label, tc.expected, "case: {}", tc.description);
        }
    }

    #[test]
    fn test_instance_target_matches_by_id() {
        let instance_target = TeardownTarget::Instance {
            id: "i-0abc123def".to_string(),
            name: "demo-runner".to_string(),
        };
        let alarm = resource(ResourceKind::Alarm, "cpu-high-i-0abc123def");
        assert_eq!(
            classify(&alarm, &instance_target, &ClassifyHints::default()).label,
            Label::OwnedByTarget
        );
    }

    #[test]
    fn test_attached_policy_shared_terms() {
        assert!(attached_policy_names_look_shared(&["eks-common-runtime"]));
        assert!(attached_policy_names_look_shared(&["AllClustersScaling"]));
        assert!(!attached_policy_names_look_shared(&["eks-demo-abcd-node-policy"]));
        assert!(!attached_policy_names_look_shared::<&str>(&[]));
    }
}
