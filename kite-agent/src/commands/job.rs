//! Job command handlers
//!
//! Reads a job's state and walks a job through its lifecycle, reporting an
//! outcome supplied on the command line.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::*;
use indexmap::IndexMap;
use kite_client::lifecycle::Accepted;
use kite_client::{
    AgentClient, ClientError, JobLifecycle, JobOutcome, TrackedJob, acquire_headers,
};
use kite_core::domain::job::{JobState, Signal, SignalReason};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Show the coordinator's state for a job
    State {
        /// Job ID
        id: String,
    },
    /// Acquire, accept, start and finish a job with the given outcome
    Report(ReportArgs),
}

/// Arguments for `job report`
#[derive(Args)]
pub struct ReportArgs {
    /// Job ID
    pub id: String,

    /// Exit status to report
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub exit_status: i32,

    /// Signal that ended the job (e.g. SIGKILL)
    #[arg(long)]
    pub signal: Option<String>,

    /// Why the job was signalled or never ran (e.g. cancel, agent_stop)
    #[arg(long)]
    pub signal_reason: Option<String>,

    /// Number of log chunks that failed to upload
    #[arg(long, default_value_t = 0)]
    pub chunks_failed: u64,

    /// Identifies this agent to the coordinator on acquire
    #[arg(long)]
    pub agent_id: Option<String>,

    /// Fields to canonicalize after accept, instead of the signed ones
    #[arg(long = "field")]
    pub fields: Vec<String>,
}

impl ReportArgs {
    fn outcome(&self) -> JobOutcome {
        let mut outcome = JobOutcome::exited(self.exit_status).with_chunks_failed(self.chunks_failed);
        outcome.signal = self.signal.as_deref().map(Signal::from);
        outcome.signal_reason = self.signal_reason.as_deref().map(SignalReason::from);
        outcome
    }
}

/// Handle job commands
///
/// # Arguments
/// * `command` - The job command to execute
/// * `config` - The agent configuration
/// * `cancel` - Aborts in-flight requests
pub async fn handle_job_command(
    command: JobCommands,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<()> {
    let client = config.client()?;

    match command {
        JobCommands::State { id } => show_state(&client, &id, cancel).await,
        JobCommands::Report(args) => report(client, &args, cancel).await,
    }
}

/// Print a job's state
async fn show_state(client: &AgentClient, id: &str, cancel: &CancellationToken) -> Result<()> {
    let response = client
        .get_job_state(id, cancel)
        .await
        .with_context(|| format!("Failed to get state of job {}", id))?;

    match response.body {
        Some(state) => println!("{} {}", "State:".bold(), colorize_state(&state)),
        None => println!("{}", "Coordinator returned no state.".yellow()),
    }

    Ok(())
}

/// Walk a job through acquire, accept, start and finish
async fn report(client: AgentClient, args: &ReportArgs, cancel: &CancellationToken) -> Result<()> {
    let idempotency_key = Uuid::new_v4().to_string();
    let headers = acquire_headers(args.agent_id.as_deref(), Some(&idempotency_key))?;

    let acquired = JobLifecycle::new(client)
        .acquire(&args.id, headers, cancel)
        .await
        .with_context(|| format!("Failed to acquire job {}", args.id))?;
    println!("{} {}", "✓ Acquired".green(), acquired.id());

    let accepted = acquired.accept(cancel).await.context("Failed to accept job")?;
    println!("{} {}", "✓ Accepted".green(), accepted.id());

    let values = match field_values(&accepted, &args.fields) {
        Ok(values) => values,
        Err(error) => {
            warn!("Rejecting job {}: {}", accepted.id(), error);
            accepted
                .finish(signature_rejected(), cancel)
                .await
                .context("Failed to finish rejected job")?;
            return Err(anyhow::Error::new(error).context("Failed to canonicalize signed fields"));
        }
    };
    match values {
        Some(values) => print_values(&values),
        None => println!("{}", "  Step is not signed.".dimmed()),
    }

    let outcome = args.outcome();
    let finished = match accepted.start(chrono::Utc::now(), cancel).await {
        Ok(started) => {
            println!("{} {}", "✓ Started".green(), started.id());
            started.finish(outcome, cancel).await.map_err(ClientError::from)
        }
        Err(failed) => {
            warn!("Could not record start: {}", failed.error);
            failed.job.finish(outcome, cancel).await.map_err(ClientError::from)
        }
    }
    .context("Failed to finish job")?;

    let job = finished.job();
    println!(
        "{} {} (exit status {})",
        "✓ Finished".green(),
        job.id,
        job.exit_status.unwrap_or_default()
    );
    if let Some(reason) = &job.signal_reason {
        let signal = job.signal.as_ref().map(|s| s.as_str()).unwrap_or("-");
        println!("  {} {} ({})", "Signal:".bold(), signal, reason);
    }

    Ok(())
}

/// Canonical values for the requested fields, or for the signed ones when
/// none were requested. `None` when there is nothing to canonicalize.
fn field_values(
    accepted: &TrackedJob<Accepted>,
    fields: &[String],
) -> kite_client::Result<Option<IndexMap<String, String>>> {
    if !fields.is_empty() {
        return accepted.values_for_fields(fields).map(Some);
    }
    if accepted.job().step.signature.is_some() {
        return accepted.signed_values().map(Some);
    }
    Ok(None)
}

/// Outcome reported for a job whose signed fields cannot be canonicalized
fn signature_rejected() -> JobOutcome {
    JobOutcome::signalled(-1, None, SignalReason::SignatureRejected)
}

fn print_values(values: &IndexMap<String, String>) {
    println!("  {}", "Signed fields:".bold());
    for (name, value) in values {
        println!("    {} = {}", name.cyan(), value);
    }
}

fn colorize_state(state: &JobState) -> ColoredString {
    let text = state.as_str();
    match state {
        JobState::Finished => text.green(),
        JobState::Running | JobState::Accepted | JobState::Assigned => text.blue(),
        JobState::Canceling | JobState::Canceled | JobState::TimingOut | JobState::TimedOut => {
            text.yellow()
        }
        JobState::Expired | JobState::Broken => text.red(),
        _ => text.normal(),
    }
}
