mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let path = cli
        .global
        .config
        .clone()
        .unwrap_or_else(hubkit_config::config_path);
    let cfg = hubkit_config::load_config_from(&path)?;
    hubkit_config::init_tracing(&cfg.defaults, cli.global.verbose)?;

    tracing::debug!(command = ?cli.command, config = %path.display(), "dispatching command");
    match cli.command {
        Command::Config(args) => commands::config_cmd::handle(args, &cfg, &path, &cli.global),
        Command::Cursors(args) => commands::cursors::handle(args, &cfg, &cli.global).await,
    }
}
