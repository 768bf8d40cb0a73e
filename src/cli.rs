use crate::constants::{CONFIG_PATH_ENV_VAR, DEFAULT_CONFIG_PATH, DEFAULT_FANOUT_CONCURRENCY, RUN_USER_ENV_VAR};
use crate::io_models::config::CredentialRegistry;
use crate::models::Account;
use crate::operation_log::OperationLog;
use clap::Args;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_USER_CANCELLED: i32 = 2;

/// Flags shared by every operation binary.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Account registry document.
    #[arg(long, env = CONFIG_PATH_ENV_VAR, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Comma-separated account names, or `all`.
    #[arg(long, default_value = "all")]
    pub accounts: String,

    /// Comma-separated regions, or `all` (each account's default regions).
    #[arg(long, default_value = "all")]
    pub regions: String,

    /// Worker ceiling for the account x region fanout.
    #[arg(long, default_value_t = DEFAULT_FANOUT_CONCURRENCY)]
    pub concurrency: usize,

    /// Plan and classify only; no cloud mutation is issued.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the interactive confirmation.
    #[arg(long)]
    pub yes: bool,

    /// Root directory for reports, logs and snapshots.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Names(Vec<String>),
}

pub fn parse_selection(raw: &str) -> Selection {
    if raw.trim().eq_ignore_ascii_case("all") {
        return Selection::All;
    }
    Selection::Names(
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

impl Selection {
    pub fn filter_accounts(&self, registry: &CredentialRegistry) -> Vec<Account> {
        match self {
            Selection::All => registry.list_accounts().to_vec(),
            Selection::Names(names) => registry
                .list_accounts()
                .iter()
                .filter(|a| names.iter().any(|n| n == &a.name))
                .cloned()
                .collect(),
        }
    }

    pub fn region_list(&self) -> Option<Vec<String>> {
        match self {
            Selection::All => None,
            Selection::Names(names) => Some(names.clone()),
        }
    }
}

pub fn run_user() -> String {
    std::env::var(RUN_USER_ENV_VAR).unwrap_or_else(|_| "unknown".to_string())
}

/// Installs the tracing subscriber with a stdout layer and the switchable
/// file layer backing the per-run operation log. The returned sink stays
/// disabled until the report sink opens it at the run's log path.
pub fn init_logging() -> OperationLog {
    let operation_log = OperationLog::new();

    let stdout_layer = tracing_subscriber::fmt::layer();
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(operation_log.clone());

    tracing_subscriber::registry()
        .with(LevelFilter::INFO)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    operation_log
}

/// Wires Ctrl-C into the run's cancel token: first signal cancels
/// cooperatively, tasks drain at their next suspension point.
pub fn install_cancel_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested, letting in-flight work finish");
            cancel.cancel();
        }
    });
}

/// Interactive yes/no gate in front of destructive operations.
pub fn confirm(prompt: &str, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }

    print!("{prompt} [y/N] ");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_models::config::AccountsDocument;

    fn registry() -> CredentialRegistry {
        let document: AccountsDocument = serde_json::from_str(
            r#"{
              "accounts": {
                "sandbox": {"account_id": "1", "access_key": "AKIA1", "secret_key": "s"},
                "prod": {"account_id": "2", "access_key": "AKIA2", "secret_key": "s"}
              },
              "user_settings": {"user_regions": ["us-east-1"]}
            }"#,
        )
        .unwrap();
        CredentialRegistry::from_document(document).unwrap()
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("all"), Selection::All);
        assert_eq!(parse_selection("ALL"), Selection::All);
        assert_eq!(
            parse_selection("a, b,c"),
            Selection::Names(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_filter_accounts() {
        let registry = registry();

        assert_eq!(Selection::All.filter_accounts(&registry).len(), 2);

        let picked = parse_selection("prod").filter_accounts(&registry);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "prod");

        let none = parse_selection("missing").filter_accounts(&registry);
        assert!(none.is_empty());
    }

    #[test]
    fn test_region_list() {
        assert_eq!(Selection::All.region_list(), None);
        assert_eq!(
            parse_selection("us-east-1").region_list(),
            Some(vec!["us-east-1".to_string()])
        );
    }
}
