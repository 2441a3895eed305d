//! Kite Agent
//!
//! Command-line front end for the job lifecycle protocol: inspect job state,
//! report job outcomes, request OIDC tokens, and print the canonical form of
//! a job's signed fields.

mod commands;
mod config;
mod logger;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use logger::LogConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "kite-agent")]
#[command(about = "Kite build agent", long_about = None, version)]
struct Cli {
    /// Agent API endpoint
    #[arg(
        long,
        global = true,
        env = "KITE_AGENT_ENDPOINT",
        default_value = "https://agent.buildkite.com/v3"
    )]
    endpoint: String,

    /// Access token for the agent API
    #[arg(long, global = true, env = "KITE_AGENT_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Log filter directive (e.g. "debug" or "kite_client=debug,info")
    #[arg(long, global = true, env = "KITE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Disable coloured log output
    #[arg(long, global = true, env = "KITE_NO_COLOR")]
    no_color: bool,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "KITE_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        endpoint: cli.endpoint,
        access_token: cli.access_token,
        request_timeout: Duration::from_secs(cli.request_timeout),
        log: LogConfig {
            level: cli.log_level,
            colors: logger::colors_for_terminal(cli.no_color),
        },
    };

    logger::init(&config.log)?;
    config.validate()?;
    debug!("Using endpoint {}", config.endpoint);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            trigger.cancel();
        }
    });

    handle_command(cli.command, &config, &cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "kite-agent",
            "job",
            "state",
            "abc",
            "--endpoint",
            "http://localhost:3000/v3",
            "--request-timeout",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.endpoint, "http://localhost:3000/v3");
        assert_eq!(cli.request_timeout, 5);
        assert!(matches!(cli.command, Commands::Job { .. }));
    }
}
