use std::time::Duration;

pub const CONFIG_PATH_ENV_VAR: &str = "CONFIG_PATH";
pub const RUN_USER_ENV_VAR: &str = "RUN_USER";

pub const DEFAULT_CONFIG_PATH: &str = "aws_accounts_config.json";
pub const DEFAULT_FANOUT_CONCURRENCY: usize = 10;

/// Fixed poll interval used by every absence waiter.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const NODEGROUP_ABSENCE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const CLUSTER_ABSENCE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const APP_ENVIRONMENT_ABSENCE_TIMEOUT: Duration = Duration::from_secs(40 * 60);
pub const ADDON_ABSENCE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const INSTANCE_TERMINATED_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Security-group deletion rounds (cross-references are resolved iteratively).
pub const SECURITY_GROUP_DELETE_MAX_ROUNDS: usize = 5;
pub const SECURITY_GROUP_ROUND_PAUSE: Duration = Duration::from_secs(30);
/// Propagation pause after a rule-stripping pass.
pub const SECURITY_GROUP_RULE_PROPAGATION_PAUSE: Duration = Duration::from_secs(10);

/// Transient-error retry cap, exponential backoff base.
pub const TRANSIENT_RETRY_MAX_ATTEMPTS: usize = 5;
pub const TRANSIENT_RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// A security group referenced by more than this many network interfaces is
/// suspected to be shared even when its name matches the target.
pub const SHARED_SECURITY_GROUP_INTERFACE_THRESHOLD: usize = 5;

/// CloudWatch DeleteAlarms accepts at most 100 names per call.
pub const ALARM_DELETE_BATCH_SIZE: usize = 100;

/// Credential placeholder prefix filtered out of the account registry.
pub const CREDENTIAL_PLACEHOLDER_PREFIX: &str = "ADD_";

/// Rate-book disk cache freshness bound.
pub const RATE_CACHE_TTL: Duration = Duration::from_secs(24 * 3600);
