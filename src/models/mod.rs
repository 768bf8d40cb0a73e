use chrono::{DateTime, Utc};
use derive_more::Display;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Formatter;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// An AWS account as loaded from the registry document. Credentials are kept
/// verbatim for client construction and must never reach reports or logs.
#[derive(Clone)]
pub struct Account {
    pub name: String,
    pub id: String,
    pub email: String,
    pub access_key: String,
    pub secret_key: String,
    pub default_regions: Vec<String>,
}

impl Account {
    pub fn has_usable_credentials(&self, placeholder_prefix: &str) -> bool {
        !self.access_key.is_empty()
            && !self.secret_key.is_empty()
            && !self.access_key.starts_with(placeholder_prefix)
    }
}

impl std::fmt::Debug for Account {
    // credentials are deliberately left out
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("email", &self.email)
            .field("default_regions", &self.default_regions)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(strum_macros::Display, strum_macros::EnumIter)]
pub enum ResourceKind {
    Instance,
    SecurityGroup,
    Cluster,
    NodeGroup,
    AppEnvironment,
    AppVersion,
    Application,
    Role,
    Policy,
    Function,
    EventRule,
    Alarm,
    LogGroup,
    Scraper,
    Addon,
    Workspace,
}

/// Normalized view of one live resource, produced at discovery time and kept
/// for the duration of a single engine run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[display("{kind} {id} ({name})")]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
    pub account_name: String,
    pub account_id: String,
    pub region: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
    pub state: Option<String>,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: impl Into<String>, name: impl Into<String>, ctx: &AccountContext) -> Self {
        ResourceRef {
            kind,
            id: id.into(),
            name: name.into(),
            account_name: ctx.account_name.clone(),
            account_id: ctx.account_id.clone(),
            region: ctx.region.clone(),
            tags: BTreeMap::new(),
            created_at: None,
            state: None,
        }
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(|s| s.as_str())
    }
}

/// Common interface over all typed resource records.
pub trait CloudResource {
    fn resource_ref(&self) -> &ResourceRef;

    fn id(&self) -> &str {
        &self.resource_ref().id
    }
    fn name(&self) -> &str {
        &self.resource_ref().name
    }
    fn tags(&self) -> &BTreeMap<String, String> {
        &self.resource_ref().tags
    }
    fn account_context(&self) -> AccountContext {
        let r = self.resource_ref();
        AccountContext {
            account_name: r.account_name.clone(),
            account_id: r.account_id.clone(),
            region: r.region.clone(),
        }
    }
}

impl CloudResource for ResourceRef {
    fn resource_ref(&self) -> &ResourceRef {
        self
    }
}

/// Where a resource lives: one (account, region) cell of the fanout matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{account_name}/{region}")]
pub struct AccountContext {
    pub account_name: String,
    pub account_id: String,
    pub region: String,
}

impl AccountContext {
    pub fn new(account: &Account, region: impl Into<String>) -> Self {
        AccountContext {
            account_name: account.name.clone(),
            account_id: account.id.clone(),
            region: region.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Parent fully contains child (cluster -> nodegroup, application -> environment).
    Contains,
    /// Child is attached to parent and must be released first (instance -> security group).
    AttachedTo,
    /// Loose reference; may be cyclic (security-group cross references).
    References,
    /// Child is a rule set belonging to parent (event rule targets, SG rules).
    RulesOf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub parent: ResourceRef,
    pub child: ResourceRef,
    pub kind: EdgeKind,
}

impl DependencyEdge {
    pub fn new(parent: ResourceRef, child: ResourceRef, kind: EdgeKind) -> Self {
        DependencyEdge { parent, child, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(strum_macros::Display)]
pub enum Label {
    OwnedByTarget,
    SharedSuspected,
    Protected,
    Unrelated,
}

impl Label {
    /// Tie-break strength: Protected > SharedSuspected > OwnedByTarget > Unrelated.
    /// A label can never be replaced by a weaker one.
    pub fn strength(&self) -> u8 {
        match self {
            Label::Protected => 3,
            Label::SharedSuspected => 2,
            Label::OwnedByTarget => 1,
            Label::Unrelated => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub label: Label,
    pub reason: String,
}

impl Classification {
    pub fn new(label: Label, reason: impl Into<String>) -> Self {
        Classification {
            label,
            reason: reason.into(),
        }
    }

    pub fn is_deletable(&self) -> bool {
        self.label == Label::OwnedByTarget
    }
}

/// Per-run ambient values, threaded into every task instead of living in
/// globals: who runs, when the run started, whether mutations are suppressed.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub run_user: String,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(run_user: impl Into<String>, dry_run: bool) -> Self {
        RunContext {
            run_id: Uuid::new_v4(),
            run_user: run_user.into(),
            started_at: Utc::now(),
            dry_run,
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            name: "sandbox".to_string(),
            id: "123456789012".to_string(),
            email: "ops@example.com".to_string(),
            access_key: "AKIAXXXX".to_string(),
            secret_key: "secret".to_string(),
            default_regions: vec!["us-east-1".to_string()],
        }
    }

    #[test]
    fn test_account_credential_filtering() {
        let mut acc = account();
        assert!(acc.has_usable_credentials("ADD_"));

        acc.access_key = "ADD_ACCESS_KEY_HERE".to_string();
        assert!(!acc.has_usable_credentials("ADD_"));

        acc.access_key = "".to_string();
        assert!(!acc.has_usable_credentials("ADD_"));
    }

    #[test]
    fn test_account_debug_never_prints_credentials() {
        let printed = format!("{:?}", account());
        assert!(!printed.contains("AKIAXXXX"));
        assert!(!printed.contains("secret"));
    }

    #[test]
    fn test_label_strength_ordering() {
        assert!(Label::Protected.strength() > Label::SharedSuspected.strength());
        assert!(Label::SharedSuspected.strength() > Label::OwnedByTarget.strength());
        assert!(Label::OwnedByTarget.strength() > Label::Unrelated.strength());
    }

    #[test]
    fn test_resource_ref_display() {
        let ctx = AccountContext::new(&account(), "us-east-1");
        let r = ResourceRef::new(ResourceKind::Cluster, "eks-demo-abcd", "eks-demo-abcd", &ctx);
        assert_eq!(r.to_string(), "Cluster eks-demo-abcd (eks-demo-abcd)");
    }
}
