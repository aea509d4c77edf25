//! Command-line entry point for the optogate server: a `clap`-derived CLI
//! exposing `serve` (the WebSocket/CBOR front end) and `emulate` (offline
//! replay of recorded frames), mirroring `led-box`'s and
//! `flydra-pt-detect-cfg`'s use of the teacher workspace's `clap`.

mod config;
mod emulate;
mod logging;
mod persistence;
mod session;
mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config::ServerConfig;

#[derive(Parser)]
#[command(name = "optogate-server", about = "Prospective optical gating server")]
struct Cli {
    /// Path to a TOML settings file; defaults built in if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the WebSocket server, one `Gater` per connection.
    Serve {
        /// Override the listen address from the config file.
        #[arg(long)]
        listen: Option<SocketAddr>,
        /// Override the reference-cycle persistence root.
        #[arg(long)]
        period_dir: Option<PathBuf>,
    },
    /// Replay a directory of TIFF frames through the core offline.
    Emulate {
        /// Directory of `NNN.tiff` frames to replay, in filename order.
        input_dir: PathBuf,
        /// Simulated capture framerate, frames/second.
        #[arg(long, default_value_t = 80.0)]
        framerate: f64,
    },
}

fn load_config(path: &Option<PathBuf>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(p) => Ok(ServerConfig::load(p)?),
        None => Ok(ServerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _tracing_guard = logging::init(&cli.log_level);

    let mut config = load_config(&cli.config)?;

    match cli.command {
        Command::Serve {
            listen,
            period_dir,
        } => {
            if let Some(addr) = listen {
                config.listen_addr = addr;
            }
            if let Some(dir) = period_dir {
                config.period_dir = dir;
            }
            ws::serve(config).await
        }
        Command::Emulate {
            input_dir,
            framerate,
        } => emulate::emulate(config, input_dir, framerate).await,
    }
}
