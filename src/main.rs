mod config;
mod constants;
mod core_cli;
mod core_error;
mod core_ftpclient;
mod core_interpreter;
mod core_network;
mod core_storage;
mod repl;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use env_logger::{Builder, Env};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::core_cli::Cli;
use crate::core_ftpclient::client::FtpClient;
use crate::core_ftpclient::commands;
use crate::core_storage::storage::LocalStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Initialize the logger with a custom format
    let default_filter = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    // Load configuration from the TOML file when one is given, then let
    // the positional CLI arguments override it
    let mut config = if args.config.is_empty() {
        Config::default()
    } else {
        Config::load_from_file(&args.config)?
    };
    if let Some(host) = args.host {
        config.client.host = host;
    }
    if let Some(port) = args.port {
        config.client.port = port;
    }

    run_client(config).await
}

async fn run_client(config: Config) -> Result<()> {
    let storage = LocalStorage::new(config.client.storage_root());

    // Every control-channel line is echoed to the operator in yellow
    let observer = Box::new(|line: &str| println!("{}", line.yellow()));

    let client = FtpClient::connect(
        &config.client.host,
        config.client.port,
        config.client.timeout(),
        storage,
        observer,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to connect to {}:{}",
            config.client.host, config.client.port
        )
    })?;

    let interpreter = commands::initialize_interpreter();
    repl::run(interpreter, Arc::new(Mutex::new(client))).await
}
