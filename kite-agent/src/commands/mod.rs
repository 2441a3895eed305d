//! Commands module
//!
//! Defines all agent commands and their handlers.

mod acknowledgements;
mod canonicalize;
mod job;
mod oidc;

pub use canonicalize::CanonicalizeArgs;
pub use job::JobCommands;
pub use oidc::OidcCommands;

use anyhow::Result;
use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Top-level agent commands
#[derive(Subcommand)]
pub enum Commands {
    /// Job lifecycle
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// OIDC tokens for a running job
    Oidc {
        #[command(subcommand)]
        command: OidcCommands,
    },
    /// Print the canonical values of a job's signed fields
    Canonicalize(CanonicalizeArgs),
    /// Print third-party license notices
    Acknowledgements,
}

/// Handle an agent command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The agent configuration
/// * `cancel` - Cancelled on interrupt; aborts in-flight requests
pub async fn handle_command(
    command: Commands,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Commands::Job { command } => job::handle_job_command(command, config, cancel).await,
        Commands::Oidc { command } => oidc::handle_oidc_command(command, config, cancel).await,
        Commands::Canonicalize(args) => canonicalize::handle_canonicalize_command(args),
        Commands::Acknowledgements => acknowledgements::print_acknowledgements(),
    }
}
