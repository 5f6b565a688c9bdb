//! Ember -- minimal TCP chat relay.
//!
//! Usage:
//!   ember                         # Serve with ./ember.toml (or defaults)
//!   ember --config path.toml      # Serve with a custom config
//!   ember connect 127.0.0.1:1337  # Interactive line client
//!   ember config                  # Print the effective config

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ember_node::admin::{stdin_lines, AdminConsole};
use ember_node::{client, RelayConfig, Server};

#[derive(Parser)]
#[command(name = "ember", about = "Minimal TCP chat relay")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ember.toml")]
    config: PathBuf,

    /// Override server.listen_addr
    #[arg(short, long)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay (default)
    Serve,
    /// Connect to a relay and chat from stdin
    Connect {
        /// Relay address, host:port
        addr: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ember_node=info,ember_protocol=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = RelayConfig::load_or_default(&cli.config)?;
    if let Some(listen) = cli.listen {
        cfg.server.listen_addr = listen;
    }

    match cli.command {
        Some(Commands::Serve) | None => serve(cfg).await?,
        Some(Commands::Connect { addr }) => {
            client::run(&addr, stdin_lines(), tokio::io::stdout()).await?;
            tracing::info!("client: terminated");
        }
        Some(Commands::Config) => {
            print!("{}", toml::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}

async fn serve(cfg: RelayConfig) -> anyhow::Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %cfg.server.listen_addr,
        "starting ember relay"
    );

    let console_enabled = cfg.admin.console;
    let server = Server::bind(cfg).await?;
    let shutdown = server.shutdown_handle();

    if console_enabled {
        let console = AdminConsole::new(server.router(), shutdown.clone());
        tokio::spawn(async move {
            if let Err(e) = console.run(stdin_lines()).await {
                tracing::warn!("admin: console stopped: {e}");
            }
        });
    }

    // Ctrl-C triggers the same graceful path as /quit
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            ctrl_c.trigger();
        }
    });

    server.run().await?;
    tracing::info!("shutdown complete");
    Ok(())
}
