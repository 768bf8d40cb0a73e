use chrono::Utc;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use sweeper_engine::cli::{self, CommonArgs};
use sweeper_engine::cloud::CloudClientFactory;
use sweeper_engine::fanout::{account_region_matrix, FanoutScheduler};
use sweeper_engine::inventory::{discover_region, RegionInventory};
use sweeper_engine::io_models::config::CredentialRegistry;
use sweeper_engine::io_models::snapshot::{InventorySnapshot, SnapshotRecord};
use sweeper_engine::logger::{Logger, StdIoLogger};
use sweeper_engine::models::RunContext;
use sweeper_engine::report::{config_file_hash, snapshot_path, ReportSink, RunReport};
use tracing::{error, info, warn};

/// Discovers live resources across the account x region matrix and writes
/// per-service inventory snapshots.
#[derive(Parser, Debug)]
#[command(name = "inventory")]
struct InventoryCli {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = InventoryCli::parse();
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
    let regions = cli::parse_selection(&args.common.regions).region_list();
    let cells = account_region_matrix(&accounts, regions.as_deref());

    let run = RunContext::new(cli::run_user(), args.common.dry_run);
    cli::install_cancel_handler(run.cancel.clone());

    let sink = ReportSink::new(&args.common.output_dir, "aws", "inventory", run.started_at);
    if let Err(err) = sink.open_operation_log(&operation_log) {
        warn!("cannot open the operation log: {err}");
    }

    info!("discovering {} (account, region) cells", cells.len());

    let factory = Arc::new(CloudClientFactory::new());
    let logger: Arc<dyn Logger> = Arc::new(StdIoLogger::new());

    let scheduler = FanoutScheduler::new(args.common.concurrency);
    let results = {
        let factory = factory.clone();
        let logger = logger.clone();
        scheduler
            .run(cells, &run.cancel, move |account, region| {
                let factory = factory.clone();
                let logger = logger.clone();
                async move { discover_region(&factory, &account, &region, logger.as_ref()).await }
            })
            .await
    };

    let mut report = RunReport::new(&run, "inventory", config_hash);
    let mut ec2_snapshot = InventorySnapshot::new("ec2");
    let mut eks_snapshot = InventorySnapshot::new("eks");

    for cell in results {
        let elapsed = cell.elapsed.as_secs_f64();
        match cell.value {
            Ok(inventory) => {
                absorb_into_snapshots(&inventory, &mut ec2_snapshot, &mut eks_snapshot);
                report.record_cell(
                    &cell.account_name,
                    &cell.region,
                    inventory.resource_count(),
                    Vec::new(),
                    Vec::new(),
                    false,
                    elapsed,
                );
            }
            Err(err) => {
                report.record_cell(
                    &cell.account_name,
                    &cell.region,
                    0,
                    Vec::new(),
                    vec![err.to_string()],
                    err.is_auth(),
                    elapsed,
                );
            }
        }
    }

    report.finish(Utc::now());

    let now = Utc::now();
    for snapshot in [&ec2_snapshot, &eks_snapshot] {
        let path = snapshot_path(&args.common.output_dir, &snapshot.service, now);
        match snapshot.save(&path) {
            Ok(()) => info!(
                "{} snapshot with {} resources written to {}",
                snapshot.service,
                snapshot.resources.len(),
                path.display()
            ),
            Err(err) => error!("{err}"),
        }
    }

    match sink.write_report(&report) {
        Ok(path) => info!("run report written to {}", path.display()),
        Err(err) => error!("cannot write run report: {err}"),
    }

    let totals = report.totals();
    info!(
        "inventory finished: {} resources discovered across {} cells",
        totals.discovered,
        report.cells.len()
    );

    ExitCode::from(report.process_exit_code() as u8)
}

fn absorb_into_snapshots(
    inventory: &RegionInventory,
    ec2_snapshot: &mut InventorySnapshot,
    eks_snapshot: &mut InventorySnapshot,
) {
    for instance in &inventory.instances {
        let (id, record) = SnapshotRecord::from_instance(instance);
        ec2_snapshot.resources.insert(id, record);
    }
    for cluster in &inventory.clusters {
        let (id, record) = SnapshotRecord::from_cluster(cluster);
        eks_snapshot.resources.insert(id, record);
    }
}
