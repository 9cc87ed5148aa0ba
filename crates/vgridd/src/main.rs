//! vgridd: the vgrid coordinator daemon.
//!
//! Single binary that assembles the coordinator for a single-node topology:
//! - Metadata store (redb)
//! - Messaging core (router, handlers, dispatch gateway)
//! - Status monitor
//! - An in-process worker endpoint on the other side of the transport
//!
//! # Usage
//!
//! ```text
//! vgridd standalone --config /etc/vgrid/node.toml --data-dir /var/lib/vgrid
//! ```

mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vgrid_core::{DispatchMode, NodeConfig};
use vgrid_mgmt::{
    ChannelTransport, ClusterRole, DeferredAction, DispatchGateway, MgmtService, StatusBoard,
    StatusMonitor,
};
use vgrid_state::{DnodeInfo, StateStore};

const DEFAULT_DATA_DIR: &str = "/var/lib/vgrid";

#[derive(Parser)]
#[command(name = "vgridd", about = "vgrid coordinator daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run coordinator and a local worker endpoint in one process.
    Standalone {
        /// Node configuration file (TOML).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data directory for the metadata store. Overrides the config file.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Vnode slots of the local worker when it is first registered.
        #[arg(long, default_value = "8")]
        vnodes: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vgridd=debug,vgrid=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            config,
            data_dir,
            vnodes,
        } => {
            let config = match config {
                Some(path) => NodeConfig::from_file(&path)?,
                None => NodeConfig::default(),
            };
            run_standalone(config, data_dir, vnodes).await
        }
    }
}

async fn run_standalone(config: NodeConfig, data_dir: Option<PathBuf>, vnodes: u32) -> anyhow::Result<()> {
    info!("vgrid coordinator starting in standalone mode");

    let data_dir = data_dir
        .or_else(|| config.data_dir().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("vgrid.redb");

    let status_interval = config.status_interval()?;
    let balance_delay = config.balance_delay()?;
    let drop_check_delay = config.drop_check_delay()?;
    let local_ip = config.private_ip();

    // ── Metadata store ─────────────────────────────────────────

    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "metadata store opened");

    if store.get_dnode(local_ip)?.is_none() {
        store.put_dnode(&DnodeInfo::new(local_ip, vnodes))?;
        info!(ip = %local_ip, vnodes, "local dnode registered");
    }

    // ── Messaging core ─────────────────────────────────────────

    let role = Arc::new(ClusterRole::new(config.is_master()));
    if !config.is_master() {
        warn!("node is not master, worker requests will be redirected");
    }

    let (transport, inbox) = ChannelTransport::new();
    let transport = Arc::new(transport);
    let (gateway, consumer) = match config.dispatch_mode() {
        DispatchMode::Direct => (DispatchGateway::direct(transport), None),
        DispatchMode::Queued => {
            let (gateway, handle) = DispatchGateway::queued(transport, config.queue_capacity());
            (gateway, Some(handle))
        }
    };
    info!(mode = ?gateway.mode(), "dispatch gateway ready");

    let service = MgmtService::new(Arc::new(store.clone()), role, gateway)
        .with_rebalancer(Arc::new(DeferredAction::logging("rebalance")))
        .with_balance_delay(balance_delay);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background tasks ───────────────────────────────────────

    let board = Arc::new(StatusBoard::new());
    let monitor = Arc::new(StatusMonitor::new(
        Arc::new(store.clone()),
        board.clone(),
        Arc::new(DeferredAction::logging("db drop check")),
        drop_check_delay,
    ));
    let status_timer = monitor.spawn(status_interval, shutdown_rx.clone());

    let local = worker::LocalWorker::new(local_ip, vnodes, service, board);
    let worker_handle = tokio::spawn(local.run(inbox, shutdown_rx));

    // ── Wait for Ctrl-C ────────────────────────────────────────

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    if !status_timer.is_running() {
        warn!("status monitor was not running at shutdown");
    }
    status_timer.join().await;
    // The worker owns the last service handle; the queue consumer exits
    // once it is gone.
    let _ = worker_handle.await;
    if let Some(consumer) = consumer {
        let _ = consumer.await;
    }

    info!("vgrid coordinator stopped");
    Ok(())
}
