//! skirmish - host-authoritative arena replication
//!
//! Runs either as the authoritative host or as a joining client,
//! depending on the flags.

mod config;

use anyhow::{Context, Result};
use config::SessionConfig;
use glam::Vec3;
use skirmish_client::MultiplayerClient;
use skirmish_server::HostServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::{env, process};
use tracing::info;

/// Parsed command line. Flags override the config file.
#[derive(Default)]
struct CliOptions {
    host: bool,
    write_config: bool,
    config_path: Option<PathBuf>,
    listen_addr: Option<String>,
    server_addr: Option<String>,
    nickname: Option<String>,
    seed: Option<u64>,
}

impl CliOptions {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut options = CliOptions::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" => options.host = true,
                "--write-config" => options.write_config = true,
                "--config" => {
                    options.config_path = Some(PathBuf::from(
                        args.next().context("--config requires a path")?,
                    ));
                }
                "--listen" => {
                    options.listen_addr =
                        Some(args.next().context("--listen requires an address")?);
                }
                "--connect" => {
                    options.server_addr =
                        Some(args.next().context("--connect requires an address")?);
                }
                "--nickname" => {
                    options.nickname = Some(args.next().context("--nickname requires a name")?);
                }
                "--seed" => {
                    options.seed = Some(
                        args.next()
                            .context("--seed requires a value")?
                            .parse()
                            .context("--seed must be an integer")?,
                    );
                }
                "--help" | "-h" => {
                    print_usage();
                    process::exit(0);
                }
                other => anyhow::bail!("Unknown argument: {other}"),
            }
        }
        Ok(options)
    }
}

fn print_usage() {
    println!(
        "Usage: skirmish [OPTIONS]\n\n\
         Options:\n\
         \x20 --host               Run as the authoritative host\n\
         \x20 --config <PATH>      Session config file (default: config/session.toml)\n\
         \x20 --write-config       Write the effective config back to the file and exit\n\
         \x20 --listen <ADDR>      Host bind address\n\
         \x20 --connect <ADDR>     Host address to join\n\
         \x20 --nickname <NAME>    Display name\n\
         \x20 --seed <N>           Spawn point seed (host only)"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting skirmish v{}", env!("CARGO_PKG_VERSION"));

    let cli = CliOptions::parse(env::args().skip(1))?;
    let mut config = match &cli.config_path {
        Some(path) => SessionConfig::load_from_path(path),
        None => SessionConfig::load(),
    };
    if let Some(addr) = cli.listen_addr {
        config.listen_addr = addr;
    }
    if let Some(addr) = cli.server_addr {
        config.server_addr = addr;
    }
    if let Some(nickname) = cli.nickname {
        config.nickname = nickname;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if cli.host {
        config.host = true;
    }

    if cli.write_config {
        let path = cli
            .config_path
            .unwrap_or_else(|| PathBuf::from(config::DEFAULT_SESSION_PATH));
        config.save_to_path(&path)?;
        info!("Wrote {}", path.display());
        return Ok(());
    }

    if config.host {
        run_host(&config).await
    } else {
        run_client(&config).await
    }
}

async fn run_host(config: &SessionConfig) -> Result<()> {
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address {:?}", config.listen_addr))?;

    let mut server = HostServer::bind(addr, config.seed, &config.nickname)?;
    server.set_tick_rate(config.tick_rate);
    info!(
        "Hosting {} on {} at {} TPS",
        config.arena,
        server.local_addr(),
        config.tick_rate
    );
    server.run().await
}

async fn run_client(config: &SessionConfig) -> Result<()> {
    let addr: SocketAddr = config
        .server_addr
        .parse()
        .with_context(|| format!("Invalid server address {:?}", config.server_addr))?;

    let mut client = MultiplayerClient::connect(addr, &config.nickname).await?;
    info!("Joined {} as {}", addr, client.conn_id());

    // Without an attached renderer the client idles at its spawn point;
    // announce the spawn position once so the host adopts it.
    client.move_to(Vec3::ZERO)?;
    client.run(config.tick_rate).await
}
