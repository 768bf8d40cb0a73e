use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::process::ExitCode;
use std::sync::Arc;
use sweeper_engine::classifier::{classify_inventory, TeardownTarget};
use sweeper_engine::cli::{self, CommonArgs};
use sweeper_engine::events::{EngineEvent, EventDetails, EventMessage, Stage, Transmitter};
use sweeper_engine::cloud::CloudClientFactory;
use sweeper_engine::fanout::{account_region_matrix, FanoutScheduler};
use sweeper_engine::inventory::{discover_region, RegionInventory};
use sweeper_engine::io_models::config::CredentialRegistry;
use sweeper_engine::logger::{Logger, StdIoLogger};
use sweeper_engine::models::{Account, RunContext};
use sweeper_engine::report::{config_file_hash, CellReport, ReportSink, RunReport};
use sweeper_engine::teardown::executor::{TeardownClients, TeardownExecutor};
use sweeper_engine::teardown::plan::build_plan;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TargetKindArg {
    Cluster,
    Instance,
    Application,
}

/// Runs classified, dependency-ordered destruction for every matched target
/// across the account x region matrix.
#[derive(Parser, Debug)]
#[command(name = "teardown")]
struct TeardownCli {
    /// What kind of root resource to tear down.
    #[arg(value_enum)]
    target_kind: TargetKindArg,

    /// Only tear down targets whose name contains this string.
    #[arg(long = "match")]
    match_filter: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = TeardownCli::parse();
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

    let service = match args.target_kind {
        TargetKindArg::Cluster => "eks",
        TargetKindArg::Instance => "ec2",
        TargetKindArg::Application => "beanstalk",
    };

    if !args.common.dry_run
        && !cli::confirm(
            &format!(
                "About to run classified destruction of {service} targets across {} cells. Continue?",
                cells.len()
            ),
            args.common.yes,
        )
    {
        info!("cancelled by operator before any cloud call");
        return ExitCode::from(cli::EXIT_USER_CANCELLED as u8);
    }

    let run = RunContext::new(cli::run_user(), args.common.dry_run);
    cli::install_cancel_handler(run.cancel.clone());

    let sink = ReportSink::new(&args.common.output_dir, service, "teardown", run.started_at);
    if let Err(err) = sink.open_operation_log(&operation_log) {
        warn!("cannot open the operation log: {err}");
    }

    let factory = Arc::new(CloudClientFactory::new());
    let logger: Arc<dyn Logger> = Arc::new(StdIoLogger::new());
    let scheduler = FanoutScheduler::new(args.common.concurrency);

    let results = {
        let factory = factory.clone();
        let logger = logger.clone();
        let run = run.clone();
        let target_kind = args.target_kind;
        let match_filter = args.match_filter.clone();
        scheduler
            .run(cells, &run.cancel.clone(), move |account, region| {
                let factory = factory.clone();
                let logger = logger.clone();
                let run = run.clone();
                let match_filter = match_filter.clone();
                async move {
                    teardown_cell(&factory, &account, &region, target_kind, match_filter, &run, logger.as_ref()).await
                }
            })
            .await
    };

    let mut report = RunReport::new(&run, "teardown", config_hash);
    for cell in results {
        let elapsed = cell.elapsed.as_secs_f64();
        let value = cell.value;
        report.record_cell(
            &cell.account_name,
            &cell.region,
            value.discovered,
            value.records,
            value.errors,
            value.auth_failed,
            elapsed,
        );
    }
    report.finish(Utc::now());

    match sink.write_report(&report) {
        Ok(path) => info!("run report written to {}", path.display()),
        Err(err) => error!("cannot write run report: {err}"),
    }

    let totals = report.totals();
    info!(
        "teardown finished: deleted={} skipped={} failed={} (discovered {})",
        totals.deleted, totals.skipped, totals.failed, totals.discovered
    );

    ExitCode::from(report.process_exit_code() as u8)
}

fn select_targets(
    inventory: &RegionInventory,
    kind: TargetKindArg,
    match_filter: Option<&str>,
) -> Vec<TeardownTarget> {
    let matches = |name: &str| match_filter.map(|f| name.contains(f)).unwrap_or(true);

    match kind {
        TargetKindArg::Cluster => inventory
            .clusters
            .iter()
            .filter(|c| matches(&c.resource.name))
            .map(|c| TeardownTarget::Cluster {
                name: c.resource.name.clone(),
                vpc_id: c.vpc_id.clone(),
            })
            .collect(),
        TargetKindArg::Instance => inventory
            .instances
            .iter()
            .filter(|i| matches(&i.resource.name) || matches(&i.resource.id))
            .map(|i| TeardownTarget::Instance {
                id: i.resource.id.clone(),
                name: i.resource.name.clone(),
            })
            .collect(),
        TargetKindArg::Application => inventory
            .applications
            .iter()
            .filter(|a| matches(&a.resource.name))
            .map(|a| TeardownTarget::Application {
                name: a.resource.name.clone(),
            })
            .collect(),
    }
}

/// One (account, region) cell: discover, then classify + plan + execute for
/// each matched target, strictly sequentially. Errors never leave the cell.
async fn teardown_cell(
    factory: &CloudClientFactory,
    account: &Account,
    region: &str,
    kind: TargetKindArg,
    match_filter: Option<String>,
    run: &RunContext,
    logger: &dyn Logger,
) -> CellReport {
    let clients = match TeardownClients::from_factory(factory, account, region).await {
        Ok(clients) => clients,
        Err(err) => {
            return CellReport {
                errors: vec![err.to_string()],
                auth_failed: err.is_auth(),
                ..Default::default()
            };
        }
    };

    let inventory = match discover_region(factory, account, region, logger).await {
        Ok(inventory) => inventory,
        Err(err) => {
            return CellReport {
                errors: vec![err.to_string()],
                auth_failed: err.is_auth(),
                ..Default::default()
            };
        }
    };

    let targets = select_targets(&inventory, kind, match_filter.as_deref());
    let ctx = sweeper_engine::models::AccountContext::new(account, region);
    let mut cell = CellReport {
        discovered: inventory.resource_count(),
        ..Default::default()
    };

    for target in targets {
        if run.is_cancelled() {
            break;
        }

        let classified = classify_inventory(&inventory, &target);
        logger.log(EngineEvent::Info(
            EventDetails::new(
                &ctx,
                Stage::Classification,
                Transmitter::Resource(target.kind(), target.id().to_string()),
            ),
            EventMessage::new_from_safe(format!(
                "{} candidates labeled against {}",
                classified.candidates.len(),
                target.match_name()
            )),
        ));

        let plan = match build_plan(&target, &inventory, &classified) {
            Ok(plan) => plan,
            Err(err) => {
                cell.errors.push(format!("{}: {err}", target.match_name()));
                continue;
            }
        };
        if plan.is_empty() && plan.skipped.is_empty() {
            info!("nothing to do for {} in {ctx}", target.match_name());
            continue;
        }

        let executor = TeardownExecutor {
            target: &target,
            ctx: &ctx,
            inventory: &inventory,
            run,
            logger,
            clients: &clients,
        };
        cell.records.extend(executor.execute(&plan).await);
    }

    cell
}
