//! The `scripd` consensus node binary.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use scrip_api::{ApiConfig, ApiContext};
use scrip_chain::HttpClient;
use scrip_ledger::Store;
use scrip_node::config::Config;
use scrip_node::follower::Follower;
use scrip_protocol::{reparse, ProtocolParams};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scripd", about = "Consensus node for the scrip protocol")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Follow the test network.
    #[arg(long)]
    testnet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the chain and serve the API (the default).
    Follow,
    /// Re-derive all parsed state from the stored chain.
    Reparse,
    /// Delete blocks above a height and re-derive.
    Rollback {
        #[arg(long)]
        to: u32,
    },
    /// Serve the API only, without following.
    Api,
}

fn protocol_params(config: &Config) -> ProtocolParams {
    let network = config.network();
    ProtocolParams {
        unspendable: network.unspendable,
        burn_start: network.burn_start,
        burn_end: network.burn_end,
    }
}

fn api_context(config: &Config, store: Store) -> anyhow::Result<ApiContext> {
    let network = config.network();
    Ok(ApiContext {
        store: Mutex::new(store),
        chain: Box::new(HttpClient::new(
            &config.backend_url,
            &config.backend_user,
            &config.backend_password,
        )?),
        config: ApiConfig {
            rpc_user: config.rpc_user.clone(),
            rpc_password: config.rpc_password.clone(),
            prefix: network.prefix,
            address_version: network.address_version,
            unspendable: network.unspendable,
            multisig: config.multisig,
            testnet: config.testnet,
        },
    })
}

fn spawn_api(config: &Config) -> anyhow::Result<()> {
    let store = Store::open_readonly(config.db_path())
        .context("opening read-only store for the api")?;
    let context = api_context(config, store)?;
    let addr = config.api_addr()?;

    std::thread::Builder::new()
        .name("api".into())
        .spawn(move || {
            if let Err(err) = scrip_api::serve_blocking(context, addr) {
                error!(%err, "api server failed");
            }
        })
        .context("spawning api thread")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if cli.testnet {
        config.testnet = true;
    }
    std::fs::create_dir_all(&config.data_dir).context("creating data directory")?;

    match cli.command.unwrap_or(Command::Follow) {
        Command::Follow => {
            let store = Store::open(config.db_path())?;
            scrip_ledger::schema::initialise(store.conn())?;

            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            ctrlc::set_handler(move || {
                info!("interrupt received");
                flag.store(true, Ordering::Relaxed);
            })
            .context("installing interrupt handler")?;

            spawn_api(&config)?;

            let chain = HttpClient::new(
                &config.backend_url,
                &config.backend_user,
                &config.backend_password,
            )?;
            let mut follower = Follower::new(
                chain,
                store,
                config.network(),
                Duration::from_secs(config.poll_interval),
                shutdown,
            );
            follower.run()?;
        }
        Command::Reparse => {
            let mut store = Store::open(config.db_path())?;
            reparse(&mut store, &protocol_params(&config), None)?;
        }
        Command::Rollback { to } => {
            let mut store = Store::open(config.db_path())?;
            reparse(&mut store, &protocol_params(&config), Some(to))?;
        }
        Command::Api => {
            let store = Store::open_readonly(config.db_path())?;
            let context = api_context(&config, store)?;
            scrip_api::serve_blocking(context, config.api_addr()?)?;
        }
    }

    Ok(())
}
