//! pbview Node - View service binary and command-line client

use clap::{Parser, Subcommand};
use pbview_core::{ClientConfig, ServerId, ViewServiceConfig};
use pbview_viewservice::{start_server, ViewClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pbview-node")]
#[command(about = "Primary/backup view service")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the view service until Ctrl-C
    Serve {
        /// JSON config file; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// HTTP listen address
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Milliseconds between failure detector ticks
        #[arg(long)]
        tick_interval_ms: Option<u64>,

        /// Missed ticks before a server is presumed dead
        #[arg(long)]
        dead_pings: Option<u32>,
    },

    /// Report liveness once and print the returned view
    Ping {
        /// View service address
        #[arg(long, default_value = "127.0.0.1:7070")]
        server: SocketAddr,

        /// Identity to report as
        #[arg(long)]
        me: String,

        /// View number the caller is running (0 after a restart)
        #[arg(long, default_value = "0")]
        viewnum: u64,
    },

    /// Print the current view
    Get {
        /// View service address
        #[arg(long, default_value = "127.0.0.1:7070")]
        server: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match args.command {
        Command::Serve {
            config,
            listen,
            tick_interval_ms,
            dead_pings,
        } => {
            let mut config = match config {
                Some(path) => ViewServiceConfig::load(&path)?,
                None => ViewServiceConfig::default(),
            };
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            if let Some(ms) = tick_interval_ms {
                config.tick_interval = Duration::from_millis(ms);
            }
            if let Some(dead_pings) = dead_pings {
                config.dead_pings = dead_pings;
            }
            serve(config).await
        }
        Command::Ping {
            server,
            me,
            viewnum,
        } => {
            let client = client(server)?;
            let view = client.ping(&ServerId::new(me), viewnum).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        Command::Get { server } => {
            let client = client(server)?;
            let view = client.get().await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
    }
}

async fn serve(config: ViewServiceConfig) -> anyhow::Result<()> {
    tracing::info!(
        listen = %config.listen_addr,
        dead_after_ms = config.dead_after().as_millis() as u64,
        "Starting pbview view service"
    );

    let handle = start_server(config).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    handle.kill();
    handle.join().await;

    Ok(())
}

fn client(server: SocketAddr) -> anyhow::Result<ViewClient> {
    Ok(ViewClient::new(&ClientConfig {
        server_addr: server,
        ..Default::default()
    })?)
}
