use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use breakfastd::cli::{ControlClient, OpenTarget};
use breakfastd::logging::{self, LogConfig};
use breakfastd::rpc::RpcServer;
use breakfastd::{config, context, core::Orchestrator};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "breakfastd")]
#[command(about = "Background coordinator for meeting note sync and vault import", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Control socket address, overriding the configuration
    #[arg(long, global = true)]
    rpc_bind: Option<SocketAddr>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator in the foreground
    Daemon(ServerArgs),
    /// Show note count, last sync and running jobs
    Status,
    /// Start a sync now
    Sync {
        /// Only fetch notes from the last N days
        #[arg(long)]
        days: Option<u32>,
        /// Refetch the last 7 days, replacing existing notes
        #[arg(long, conflicts_with = "days")]
        week: bool,
        #[arg(long)]
        force: bool,
    },
    /// Start an import into the vault
    Import {
        #[arg(long)]
        force: bool,
    },
    /// Hand a full reimport to the agent
    ReimportAll,
    /// Open a folder or log file
    Open {
        #[arg(value_enum)]
        target: OpenTarget,
    },
    /// Open the note from the last notification, or the given one
    Click { payload: Option<PathBuf> },
    /// Print the effective configuration
    Config,
}

#[derive(Args, Serialize)]
struct ServerArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    state_file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    watch_cooldown_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    json_logs: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.command {
        Commands::Daemon(args) => config::AppConfig::new(Some(args))?,
        _ => config::AppConfig::new(None::<&ServerArgs>)?,
    };
    if let Some(bind) = cli.rpc_bind {
        config.rpc_bind = bind;
    }

    logging::init(LogConfig {
        json: config.json_logs,
        verbose: config.verbose,
    });

    let client = ControlClient::new(config.rpc_bind);

    let output = match cli.command {
        Commands::Daemon(_) => {
            let ctx = context::AppContext::new(config);
            run_daemon(ctx).await.context("Daemon failed")?;
            return Ok(());
        }
        Commands::Config => config.to_toml()?,
        Commands::Status => client.status().await?,
        Commands::Sync { week: true, .. } => client.sync_week().await?,
        Commands::Sync { days, force, .. } => client.sync(days, force).await?,
        Commands::Import { force } => client.import(force).await?,
        Commands::ReimportAll => client.reimport_all().await?,
        Commands::Open { target } => client.open(target).await?,
        Commands::Click { payload } => client.click(payload).await?,
    };

    println!("{}", output.trim_end());
    Ok(())
}

async fn run_daemon(ctx: context::AppContext) -> Result<()> {
    let bind = ctx.config.rpc_bind;
    let orchestrator = Orchestrator::new(ctx);
    let server = RpcServer::new(orchestrator.clone(), bind);
    let shutdown = CancellationToken::new();

    let control = {
        let orchestrator = orchestrator.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { orchestrator.start(shutdown).await })
    };

    tokio::select! {
        result = server.start() => {
            if let Err(e) = &result {
                error!(error = %e, "RPC server stopped");
            }
            shutdown.cancel();
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received");
            server.shutdown();
            shutdown.cancel();
        }
    }

    control.await.context("Control loop panicked")??;
    Ok(())
}
