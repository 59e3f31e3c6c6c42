//! Parley HTTP server and CLI entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, installs tracing, loads settings, then dispatches to
//! the requested command.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use parley_infra::config::load_settings;
use parley_observe::tracing_setup::{default_filter, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or settings.
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "parley", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(
        default_filter(cli.verbose, cli.quiet),
        cli.log_format.into(),
        cli.otel,
    )
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let mut settings = load_settings(cli.config.as_deref()).await;

    let result = match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            if let Some(host) = host {
                settings.server.host = host;
            }
            let state = AppState::init(settings).await?;
            cli::serve::serve(state, cli.quiet).await
        }
        Commands::Status => cli::status::status(&settings, cli.json),
        Commands::CheckStore => cli::check::check_store(&settings, cli.json).await,
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    shutdown_tracing();
    result
}
