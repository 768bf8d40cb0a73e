use crate::cost::CostRecord;
use crate::models::{ResourceRef, RunContext};
use crate::teardown::{OutcomeRecord, ResourceOutcome};
use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum CellOutcome {
    Success,
    Failure,
    PartialFailure,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub discovered: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    fn absorb(&mut self, outcome: &ResourceOutcome) {
        match outcome {
            ResourceOutcome::Deleted | ResourceOutcome::WouldDelete => self.deleted += 1,
            ResourceOutcome::SkippedProtected { .. } | ResourceOutcome::SkippedShared { .. } => self.skipped += 1,
            ResourceOutcome::FailedPermanent { .. }
            | ResourceOutcome::FailedTimedOut
            | ResourceOutcome::Blocked { .. } => self.failed += 1,
            ResourceOutcome::Ignored => {}
        }
    }
}

/// What one fanout task hands back for report merging.
#[derive(Debug, Clone, Default)]
pub struct CellReport {
    pub discovered: usize,
    pub records: Vec<OutcomeRecord>,
    pub errors: Vec<String>,
    pub auth_failed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellSummary {
    pub account_name: String,
    pub region: String,
    pub outcome: CellOutcome,
    pub counts: OutcomeCounts,
    pub errors: Vec<String>,
    pub auth_failed: bool,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEntry {
    pub resource: ResourceRef,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub resource: ResourceRef,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub run_user: String,
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_file_hash: String,
    pub dry_run: bool,
}

/// The single source of truth for a run: per-cell summaries, per-axis
/// rollups and the full terminal outcome of every touched resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub account_summaries: BTreeMap<String, OutcomeCounts>,
    pub region_summaries: BTreeMap<String, OutcomeCounts>,
    pub kind_summaries: BTreeMap<String, OutcomeCounts>,
    pub cells: Vec<CellSummary>,
    pub deleted: Vec<ResourceRef>,
    pub failed: Vec<FailedEntry>,
    pub skipped: Vec<SkippedEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cost_records: Vec<CostRecord>,
}

impl RunReport {
    pub fn new(run: &RunContext, operation: &str, config_file_hash: String) -> Self {
        RunReport {
            metadata: RunMetadata {
                run_id: run.run_id.to_string(),
                run_user: run.run_user.clone(),
                operation: operation.to_string(),
                started_at: run.started_at,
                finished_at: None,
                config_file_hash,
                dry_run: run.dry_run,
            },
            account_summaries: BTreeMap::new(),
            region_summaries: BTreeMap::new(),
            kind_summaries: BTreeMap::new(),
            cells: Vec::new(),
            deleted: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            cost_records: Vec::new(),
        }
    }

    /// Merges one completed cell into the report.
    pub fn record_cell(
        &mut self,
        account_name: &str,
        region: &str,
        discovered: usize,
        records: Vec<OutcomeRecord>,
        errors: Vec<String>,
        auth_failed: bool,
        elapsed_seconds: f64,
    ) {
        let mut counts = OutcomeCounts {
            discovered,
            ..Default::default()
        };

        for record in records {
            counts.absorb(&record.outcome);
            self.account_summaries
                .entry(account_name.to_string())
                .or_default()
                .absorb(&record.outcome);
            self.region_summaries
                .entry(region.to_string())
                .or_default()
                .absorb(&record.outcome);
            self.kind_summaries
                .entry(record.resource.kind.to_string())
                .or_default()
                .absorb(&record.outcome);

            match record.outcome {
                ResourceOutcome::Deleted | ResourceOutcome::WouldDelete => self.deleted.push(record.resource),
                ResourceOutcome::SkippedProtected { reason } | ResourceOutcome::SkippedShared { reason } => {
                    self.skipped.push(SkippedEntry {
                        resource: record.resource,
                        reason,
                    })
                }
                ResourceOutcome::FailedPermanent { error } => self.failed.push(FailedEntry {
                    resource: record.resource,
                    error,
                }),
                ResourceOutcome::FailedTimedOut => self.failed.push(FailedEntry {
                    resource: record.resource,
                    error: "timed-out".to_string(),
                }),
                ResourceOutcome::Blocked { reason } => self.failed.push(FailedEntry {
                    resource: record.resource,
                    error: format!("blocked: {reason}"),
                }),
                ResourceOutcome::Ignored => {}
            }
        }

        let outcome = if auth_failed || (!errors.is_empty() && counts.deleted == 0 && counts.skipped == 0) {
            CellOutcome::Failure
        } else if counts.failed > 0 || !errors.is_empty() {
            CellOutcome::PartialFailure
        } else {
            CellOutcome::Success
        };

        self.cells.push(CellSummary {
            account_name: account_name.to_string(),
            region: region.to_string(),
            outcome,
            counts,
            errors,
            auth_failed,
            elapsed_seconds,
        });
    }

    pub fn record_costs(&mut self, records: Vec<CostRecord>) {
        self.cost_records.extend(records);
    }

    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.metadata.finished_at = Some(finished_at);
    }

    pub fn totals(&self) -> OutcomeCounts {
        let mut totals = OutcomeCounts::default();
        for cell in &self.cells {
            totals.discovered += cell.counts.discovered;
            totals.deleted += cell.counts.deleted;
            totals.skipped += cell.counts.skipped;
            totals.failed += cell.counts.failed;
        }
        totals
    }

    /// Exit 0 unless no cell completed successfully and at least one cell
    /// died on authentication. Config errors exit earlier, before any cloud
    /// call.
    pub fn process_exit_code(&self) -> i32 {
        let any_success = self
            .cells
            .iter()
            .any(|c| matches!(c.outcome, CellOutcome::Success | CellOutcome::PartialFailure));
        let any_auth_failure = self.cells.iter().any(|c| c.auth_failed);

        if !self.cells.is_empty() && !any_success && any_auth_failure {
            1
        } else {
            0
        }
    }
}

/// Stable content hash for stamping the config document into reports.
pub fn config_file_hash(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Writes the two per-run artifacts: the structured JSON report under
/// `{service}/reports/` and (via the log writer) the line-oriented log under
/// `logs/{service}/`.
pub struct ReportSink {
    base_dir: PathBuf,
    service: String,
    operation: String,
    timestamp: String,
}

impl ReportSink {
    pub fn new(base_dir: impl Into<PathBuf>, service: &str, operation: &str, now: DateTime<Utc>) -> Self {
        ReportSink {
            base_dir: base_dir.into(),
            service: service.to_string(),
            operation: operation.to_string(),
            timestamp: now.format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    pub fn report_path(&self) -> PathBuf {
        self.base_dir
            .join(&self.service)
            .join("reports")
            .join(format!("{}_{}.json", self.operation, self.timestamp))
    }

    pub fn log_path(&self) -> PathBuf {
        self.base_dir
            .join("logs")
            .join(&self.service)
            .join(format!("{}_{}.log", self.operation, self.timestamp))
    }

    /// Points the operation-log sink at this run's log path, so the tracing
    /// file layer and the JSON report land under the same namespace.
    pub fn open_operation_log(&self, log: &crate::operation_log::OperationLog) -> std::io::Result<PathBuf> {
        let path = self.log_path();
        log.open(&path)?;
        Ok(path)
    }

    pub fn write_report(&self, report: &RunReport) -> std::io::Result<PathBuf> {
        let path = self.report_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
        std::fs::write(&path, payload)?;
        Ok(path)
    }
}

/// Snapshot file path produced by the inventory operation, next to the
/// reports of the same service.
pub fn snapshot_path(base_dir: &Path, service: &str, now: DateTime<Utc>) -> PathBuf {
    base_dir
        .join(service)
        .join("inventory")
        .join(format!("inventory_{}.json", now.format("%Y%m%d_%H%M%S")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, AccountContext, ResourceKind};

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

    fn record(kind: ResourceKind, id: &str, outcome: ResourceOutcome) -> OutcomeRecord {
        OutcomeRecord::new(ResourceRef::new(kind, id, id, &ctx()), outcome)
    }

    fn report() -> RunReport {
        RunReport::new(&RunContext::new("ops", false), "teardown", config_file_hash("{}"))
    }

    #[test]
    fn test_cell_rollups_and_lists() {
        let mut report = report();

        report.record_cell(
            "sandbox",
            "us-east-1",
            10,
            vec![
                record(ResourceKind::NodeGroup, "ng-a", ResourceOutcome::Deleted),
                record(ResourceKind::Cluster, "eks-demo-abcd", ResourceOutcome::Deleted),
                record(
                    ResourceKind::Role,
                    "AWSServiceRoleForAmazonEKS",
                    ResourceOutcome::SkippedProtected {
                        reason: "provider service-linked role".to_string(),
                    },
                ),
                record(
                    ResourceKind::SecurityGroup,
                    "sg-a",
                    ResourceOutcome::FailedPermanent {
                        error: "DependencyViolation".to_string(),
                    },
                ),
            ],
            vec![],
            false,
            12.5,
        );

        let totals = report.totals();
        assert_eq!(totals.discovered, 10);
        assert_eq!(totals.deleted, 2);
        assert_eq!(totals.skipped, 1);
        assert_eq!(totals.failed, 1);

        assert_eq!(report.cells[0].outcome, CellOutcome::PartialFailure);
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.kind_summaries.get("Cluster").unwrap().deleted, 1);
    }

    #[test]
    fn test_exit_code_zero_on_partial_failure() {
        // scenario: one account dead on auth, two fine -> exit 0
        let mut report = report();
        report.record_cell("a", "us-east-1", 3, vec![record(ResourceKind::Cluster, "c1", ResourceOutcome::Deleted)], vec![], false, 1.0);
        report.record_cell("b", "us-east-1", 0, vec![], vec!["credentials rejected".to_string()], true, 1.0);
        report.record_cell("c", "us-east-1", 3, vec![record(ResourceKind::Cluster, "c2", ResourceOutcome::Deleted)], vec![], false, 1.0);

        assert_eq!(report.process_exit_code(), 0);
    }

    #[test]
    fn test_exit_code_one_when_nothing_succeeded_and_auth_failed() {
        let mut report = report();
        report.record_cell("b", "us-east-1", 0, vec![], vec!["credentials rejected".to_string()], true, 1.0);

        assert_eq!(report.process_exit_code(), 1);
    }

    #[test]
    fn test_artifact_paths() {
        let sink = ReportSink::new(
            "/tmp/base",
            "eks",
            "teardown",
            chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 7, 4, 12, 30, 0).unwrap(),
        );

        assert_eq!(
            sink.report_path(),
            PathBuf::from("/tmp/base/eks/reports/teardown_20260704_123000.json")
        );
        assert_eq!(
            sink.log_path(),
            PathBuf::from("/tmp/base/logs/eks/teardown_20260704_123000.log")
        );
    }

    #[test]
    fn test_write_report_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ReportSink::new(dir.path(), "eks", "teardown", Utc::now());
        let mut run_report = report();
        run_report.finish(Utc::now());

        let path = sink.write_report(&run_report).unwrap();
        let raw = std::fs::read_to_string(path).unwrap();
        let parsed: RunReport = serde_json::from_str(&raw).unwrap();

        assert_eq!(parsed.metadata.operation, "teardown");
        assert!(parsed.metadata.finished_at.is_some());
    }

    #[test]
    fn test_config_hash_is_stable() {
        assert_eq!(config_file_hash("abc"), config_file_hash("abc"));
        assert_ne!(config_file_hash("abc"), config_file_hash("abd"));
    }
}
