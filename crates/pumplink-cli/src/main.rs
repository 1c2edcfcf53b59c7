//! `pumplink`: drive a dispenser over a serial line, or encode and decode
//! frames offline.

mod cli;
mod config;
mod line;
mod offline;
mod run;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Run(args) => {
            let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
            config.apply_run_args(&args)?;
            run::run(config, &args).await
        }
        Command::Encode(args) => {
            let config = AppConfig::load_or_default(cli.config.as_deref())?;
            println!("{}", offline::encode(&config, &args)?);
            Ok(())
        }
        Command::Decode(args) => {
            let config = AppConfig::load_or_default(cli.config.as_deref())?;
            offline::decode(&config, &args)
        }
        Command::Ports => offline::list_ports(),
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
