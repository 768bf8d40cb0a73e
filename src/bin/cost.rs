use chrono::Utc;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use sweeper_engine::cli::{self, CommonArgs};
use sweeper_engine::cloud::{CloudClientFactory, Service};
use sweeper_engine::cost::rates::RateBook;
use sweeper_engine::cost::{compute_costs, live_cluster_states, live_instance_states, CostRecord};
use sweeper_engine::io_models::config::CredentialRegistry;
use sweeper_engine::io_models::snapshot::{InventorySnapshot, SnapshotRecord};
use sweeper_engine::models::{Account, ResourceKind, RunContext};
use sweeper_engine::report::{config_file_hash, ReportSink, RunReport};
use sweeper_engine::fanout::FanoutScheduler;
use tracing::{error, info, warn};

/// Computes accrued running cost by joining stored inventory snapshots with
/// live control-plane state.
#[derive(Parser, Debug)]
#[command(name = "cost")]
struct CostCli {
    /// Inventory snapshot file(s) written by the inventory operation.
    #[arg(long, required = true)]
    snapshot: Vec<PathBuf>,

    /// Directory holding the price-catalog cache.
    #[arg(long, default_value = ".rates-cache")]
    rates_cache_dir: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CostCli::parse();
    let operation_log = cli::init_logging();

    let registry = match CredentialRegistry::load(&args.common.config) {
        Ok(registry) => registry,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(cli::EXIT_FATAL as u8);
        }
    };
    let config_hash = std::fs::read_to_string(&args.common.config)
        .map(|raw| config_file_hash(&raw))
        .unwrap_or_default();

    let accounts = cli::parse_selection(&args.common.accounts).filter_accounts(&registry);
    if accounts.is_empty() {
        error!("no account matches the selection `{}`", args.common.accounts);
        return ExitCode::from(cli::EXIT_FATAL as u8);
    }
    let region_filter = cli::parse_selection(&args.common.regions).region_list();

    // every snapshot record lands in its (account, region) bucket
    let mut buckets: BTreeMap<(String, String), BTreeMap<String, SnapshotRecord>> = BTreeMap::new();
    for path in &args.snapshot {
        let snapshot = match InventorySnapshot::load(path) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!("{err}");
                return ExitCode::from(cli::EXIT_FATAL as u8);
            }
        };
        for (id, record) in snapshot.resources {
            if !accounts.iter().any(|a| a.name == record.account_name) {
                continue;
            }
            if let Some(regions) = &region_filter {
                if !regions.contains(&record.region) {
                    continue;
                }
            }
            buckets
                .entry((record.account_name.clone(), record.region.clone()))
                .or_default()
                .insert(id, record);
        }
    }

    if buckets.is_empty() {
        warn!("snapshots contain no record matching the selection");
    }

    let run = RunContext::new(cli::run_user(), args.common.dry_run);
    cli::install_cancel_handler(run.cancel.clone());

    let sink = ReportSink::new(&args.common.output_dir, "aws", "cost", run.started_at);
    if let Err(err) = sink.open_operation_log(&operation_log) {
        warn!("cannot open the operation log: {err}");
    }

    let factory = Arc::new(CloudClientFactory::new());
    let rate_book = Arc::new(RateBook::new(&args.rates_cache_dir, None));
    let accounts_by_name: BTreeMap<String, Account> =
        accounts.iter().map(|a| (a.name.clone(), a.clone())).collect();

    let cells: Vec<(Account, String)> = buckets
        .keys()
        .filter_map(|(account_name, region)| {
            accounts_by_name
                .get(account_name)
                .map(|account| (account.clone(), region.clone()))
        })
        .collect();
    let buckets = Arc::new(buckets);

    let scheduler = FanoutScheduler::new(args.common.concurrency);
    let results = {
        let factory = factory.clone();
        let rate_book = rate_book.clone();
        let buckets = buckets.clone();
        scheduler
            .run(cells, &run.cancel, move |account, region| {
                let factory = factory.clone();
                let rate_book = rate_book.clone();
                let buckets = buckets.clone();
                async move { cost_cell(&factory, &rate_book, &buckets, &account, &region).await }
            })
            .await
    };

    let mut report = RunReport::new(&run, "cost", config_hash);
    let mut grand_total = 0.0;
    for cell in results {
        let elapsed = cell.elapsed.as_secs_f64();
        match cell.value {
            Ok(records) => {
                grand_total += records.iter().map(|r| r.total_cost).sum::<f64>();
                report.record_cell(
                    &cell.account_name,
                    &cell.region,
                    records.len(),
                    Vec::new(),
                    Vec::new(),
                    false,
                    elapsed,
                );
                report.record_costs(records);
            }
            Err((auth_failed, message)) => {
                report.record_cell(
                    &cell.account_name,
                    &cell.region,
                    0,
                    Vec::new(),
                    vec![message],
                    auth_failed,
                    elapsed,
                );
            }
        }
    }
    report.finish(Utc::now());

    match sink.write_report(&report) {
        Ok(path) => info!("cost report written to {}", path.display()),
        Err(err) => error!("cannot write cost report: {err}"),
    }
    info!(
        "cost finished: {} records, {:.2} USD accrued in total",
        report.cost_records.len(),
        grand_total
    );

    ExitCode::from(report.process_exit_code() as u8)
}

type CellCostResult = Result<Vec<CostRecord>, (bool, String)>;

async fn cost_cell(
    factory: &CloudClientFactory,
    rate_book: &RateBook,
    buckets: &BTreeMap<(String, String), BTreeMap<String, SnapshotRecord>>,
    account: &Account,
    region: &str,
) -> CellCostResult {
    let Some(records) = buckets.get(&(account.name.clone(), region.to_string())) else {
        return Ok(Vec::new());
    };

    let ec2 = factory
        .client(Service::Ec2, account, region)
        .await
        .map_err(|e| (e.is_auth(), e.to_string()))?;
    let eks = factory
        .client(Service::Eks, account, region)
        .await
        .map_err(|e| (e.is_auth(), e.to_string()))?;

    let instance_ids: Vec<String> = records
        .iter()
        .filter(|(_, r)| r.kind == ResourceKind::Instance)
        .map(|(id, _)| id.clone())
        .collect();
    let cluster_names: Vec<String> = records
        .iter()
        .filter(|(_, r)| r.kind == ResourceKind::Cluster)
        .map(|(id, _)| id.clone())
        .collect();

    let live_instances = live_instance_states(&ec2, &instance_ids).await;
    let live_clusters = live_cluster_states(&eks, &cluster_names).await;

    let now = Utc::now();
    let table = rate_book.rates_for(region, now).await;

    Ok(compute_costs(records, &live_instances, &live_clusters, &table, now))
}
