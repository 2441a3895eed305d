//! OIDC command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// OIDC subcommands
#[derive(Subcommand)]
pub enum OidcCommands {
    /// Request an OIDC token for a job and print it
    RequestToken {
        /// Job ID
        job_id: String,

        /// Audience the token is issued for (at most one)
        #[arg(long)]
        audience: Vec<String>,
    },
}

/// Handle OIDC commands
pub async fn handle_oidc_command(
    command: OidcCommands,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    let client = config.client()?;

    match command {
        OidcCommands::RequestToken { job_id, audience } => {
            let response = client
                .oidc_token(&job_id, audience.as_slice(), cancel)
                .await
                .with_context(|| format!("Failed to request OIDC token for job {}", job_id))?;

            // bare token on stdout so it can be captured by scripts
            println!("{}", response.body.token);
            Ok(())
        }
    }
}
