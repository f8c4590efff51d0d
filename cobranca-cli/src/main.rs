mod cli;
mod commands;

use std::process;

use clap::Parser;
use cobranca::AppConfig;
use cobranca::logging::init_logging;
use tracing::error;

use crate::cli::Args;
use crate::commands::CommandExecutor;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Application error: {e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_logging(config.log_format, args.log_filter.as_deref())?;

    let executor = CommandExecutor::new(config, args.pretty);
    let output = executor.execute(args.command).await?;
    println!("{output}");
    Ok(())
}
