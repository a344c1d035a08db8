//! Collection permission inheritance command-line tool.

#![forbid(unsafe_code)]

mod config;
mod output;
mod vault;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use inheritor_application::{ApplyOptions, ApplyOutcome, InheritanceService};
use inheritor_core::{AppError, AppResult};
use inheritor_infrastructure::BwCli;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::InheritorConfig;

#[derive(Debug, Parser)]
#[command(
    name = "collection-inheritor",
    version,
    about = "Copies a Bitwarden collection's permissions onto its nested collections"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List organizations visible to the session.
    Organizations,
    /// Print the collection tree of the organization.
    Tree,
    /// Print the permission snapshot of a collection as JSON.
    Show {
        /// Collection id or exact name.
        collection: String,
    },
    /// Overwrite the permissions of every descendant with the collection's own.
    Inherit(InheritArgs),
}

#[derive(Debug, Args)]
struct InheritArgs {
    /// Collection id or exact name.
    collection: String,
    /// Report what would be written without writing.
    #[arg(long)]
    dry_run: bool,
    /// Skip the remaining targets after the first failure.
    #[arg(long)]
    stop_on_first_error: bool,
    /// Minimum delay between remote calls; defaults to INHERITOR_PACING_MS.
    #[arg(long, value_name = "MS")]
    pacing_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = InheritorConfig::load()?;
    let bw = vault::open_session(&config).await?;

    match cli.command {
        Command::Organizations => list_organizations(&bw).await,
        Command::Tree => {
            let vault = vault::connect(&config, bw).await?;
            let service = InheritanceService::new(vault.client.clone())
                .with_pacing_delay(config.pacing_delay);
            let build = service.load_forest().await?;
            println!("{}", output::render_tree(&build));
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { collection } => {
            let vault = vault::connect(&config, bw).await?;
            let service = InheritanceService::new(vault.client.clone())
                .with_pacing_delay(config.pacing_delay);
            let build = service.load_forest().await?;
            let collection_id = output::resolve_collection(&build.forest, &collection)?;
            let snapshot = service.capture_snapshot(&collection_id).await?;
            let rendered = serde_json::to_string_pretty(&snapshot).map_err(|error| {
                AppError::Internal(format!("failed to render snapshot: {error}"))
            })?;
            println!("{rendered}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Inherit(args) => {
            let pacing_delay = args
                .pacing_ms
                .map_or(config.pacing_delay, Duration::from_millis);
            let vault = vault::connect(&config, bw).await?;
            let service =
                InheritanceService::new(vault.client.clone()).with_pacing_delay(pacing_delay);
            inherit(&service, args, pacing_delay).await
        }
    }
}

async fn list_organizations(bw: &Arc<BwCli>) -> AppResult<ExitCode> {
    let organizations = bw.list_organizations().await?;
    for organization in &organizations {
        println!("{}\t{}", organization.id, organization.name);
    }
    info!(count = organizations.len(), "organizations listed");
    Ok(ExitCode::SUCCESS)
}

async fn inherit(
    service: &InheritanceService,
    args: InheritArgs,
    pacing_delay: Duration,
) -> AppResult<ExitCode> {
    let build = service.load_forest().await?;
    for error in &build.errors {
        eprintln!("warning: {error}");
    }
    let root_id = output::resolve_collection(&build.forest, &args.collection)?;

    let options = ApplyOptions {
        dry_run: args.dry_run,
        pacing_delay,
        stop_on_first_error: args.stop_on_first_error,
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current target");
            interrupt.cancel();
        }
    });

    let print_progress = |outcome: &ApplyOutcome, processed: usize, total: usize| {
        println!("{}", output::outcome_line(outcome, processed, total));
    };
    let report = service
        .propagate_within(&build.forest, &root_id, &options, &print_progress, &cancel)
        .await?;

    println!("{}", output::report_footer(&report));

    if report.has_failures() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
