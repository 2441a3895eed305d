//! Typed job lifecycle
//!
//! Wraps the lifecycle endpoints so they can only be called in protocol order:
//!
//! ```text
//! acquire -> Acquired -> accept -> Accepted -> start -> Started -> finish -> Finished
//!                                     \__________________________/
//!                                              finish
//! ```
//!
//! Each transition consumes the tracked job. On failure the job comes back
//! unchanged inside a [`TransitionError`], so the caller decides whether to
//! retry, finish it, or give up.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use kite_core::FieldCanonicalizer;
use kite_core::domain::job::{Job, Signal, SignalReason};
use reqwest::header::HeaderMap;
use std::fmt;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::AgentClient;
use crate::error::{ClientError, Result};

/// Job claimed by this agent; its environment is not final yet
#[derive(Debug)]
pub struct Acquired;

/// Job accepted; its environment is final
#[derive(Debug)]
pub struct Accepted;

/// Job start recorded by the coordinator
#[derive(Debug)]
pub struct Started;

/// Terminal status recorded by the coordinator
#[derive(Debug)]
pub struct Finished;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Acquired {}
    impl Sealed for super::Accepted {}
    impl Sealed for super::Started {}
    impl Sealed for super::Finished {}
}

/// A lifecycle position
pub trait LifecycleState: sealed::Sealed + fmt::Debug {}
impl LifecycleState for Acquired {}
impl LifecycleState for Accepted {}
impl LifecycleState for Started {}
impl LifecycleState for Finished {}

/// States whose environment is final and safe to canonicalize
pub trait EnvFinal: LifecycleState {}
impl EnvFinal for Accepted {}
impl EnvFinal for Started {}
impl EnvFinal for Finished {}

/// States from which a job may be finished
pub trait Finishable: LifecycleState {}
impl Finishable for Accepted {}
impl Finishable for Started {}

/// Entry point: acquires jobs into the typed lifecycle
#[derive(Debug, Clone)]
pub struct JobLifecycle {
    client: AgentClient,
}

impl JobLifecycle {
    pub fn new(client: AgentClient) -> Self {
        Self { client }
    }

    /// Claim a job
    ///
    /// Later calls for this job go to the job's own endpoint with the job's
    /// token when the coordinator supplied them.
    pub async fn acquire(
        &self,
        id: &str,
        headers: HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<TrackedJob<Acquired>> {
        let mut job = self.client.acquire_job(id, headers, cancel).await?.into_body();
        info!("Acquired job {}", id);

        if job.id.is_empty() {
            job.id = id.to_string();
        }

        Ok(TrackedJob {
            client: self.client.for_job(&job),
            job,
            _state: PhantomData,
        })
    }
}

/// A job at a known point of its lifecycle
#[derive(Debug)]
pub struct TrackedJob<S: LifecycleState> {
    client: AgentClient,
    job: Job,
    _state: PhantomData<S>,
}

/// A transition that failed, handing the job back in its previous state
#[derive(Debug)]
pub struct TransitionError<S: LifecycleState> {
    pub job: TrackedJob<S>,
    pub error: ClientError,
}

impl<S: LifecycleState> fmt::Display for TransitionError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {}: {}", self.job.id(), self.error)
    }
}

impl<S: LifecycleState> std::error::Error for TransitionError<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<S: LifecycleState> From<TransitionError<S>> for ClientError {
    fn from(err: TransitionError<S>) -> Self {
        err.error
    }
}

/// How the job ended
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub exit_status: i32,
    pub signal: Option<Signal>,
    pub signal_reason: Option<SignalReason>,
    pub chunks_failed_count: u64,
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    /// The job process exited on its own
    pub fn exited(exit_status: i32) -> Self {
        Self {
            exit_status,
            signal: None,
            signal_reason: None,
            chunks_failed_count: 0,
            finished_at: Utc::now(),
        }
    }

    /// The job process was signalled, or never ran for the given reason
    pub fn signalled(exit_status: i32, signal: Option<Signal>, reason: SignalReason) -> Self {
        Self {
            signal,
            signal_reason: Some(reason),
            ..Self::exited(exit_status)
        }
    }

    pub fn with_chunks_failed(mut self, count: u64) -> Self {
        self.chunks_failed_count = count;
        self
    }

    pub fn at(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = finished_at;
        self
    }
}

impl<S: LifecycleState> TrackedJob<S> {
    pub fn id(&self) -> &str {
        &self.job.id
    }

    /// The local mirror of the job
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// The client used for this job's lifecycle calls
    pub fn client(&self) -> &AgentClient {
        &self.client
    }

    pub fn into_job(self) -> Job {
        self.job
    }

    fn advance<T: LifecycleState>(self) -> TrackedJob<T> {
        TrackedJob {
            client: self.client,
            job: self.job,
            _state: PhantomData,
        }
    }

    fn fail<T>(self, error: ClientError) -> std::result::Result<T, TransitionError<S>> {
        Err(TransitionError { job: self, error })
    }
}

impl TrackedJob<Acquired> {
    /// Accept the job and take on its final environment
    pub async fn accept(
        mut self,
        cancel: &CancellationToken,
    ) -> std::result::Result<TrackedJob<Accepted>, TransitionError<Acquired>> {
        let remote = match self.client.accept_job(&self.job, cancel).await {
            Ok(response) => response.into_body(),
            Err(error) => return self.fail(error),
        };

        self.job.absorb(remote);
        self.client = self.client.for_job(&self.job);
        info!("Accepted job {}", self.job.id);

        Ok(self.advance())
    }
}

impl TrackedJob<Accepted> {
    /// Record the job's start
    pub async fn start(
        mut self,
        started_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> std::result::Result<TrackedJob<Started>, TransitionError<Accepted>> {
        self.job.started_at = Some(started_at);
        if let Err(error) = self.client.start_job(&self.job, cancel).await {
            self.job.started_at = None;
            return self.fail(error);
        }
        debug!("Started job {} at {}", self.job.id, started_at);

        Ok(self.advance())
    }
}

impl<S: EnvFinal> TrackedJob<S> {
    /// Canonical values for the given field names
    pub fn values_for_fields<F: AsRef<str>>(
        &self,
        fields: &[F],
    ) -> Result<IndexMap<String, String>> {
        Ok(self.job.values_for_fields(fields)?)
    }

    /// Canonical values using a custom namespace prefix
    pub fn values_with<F: AsRef<str>>(
        &self,
        canonicalizer: &FieldCanonicalizer,
        fields: &[F],
    ) -> Result<IndexMap<String, String>> {
        Ok(canonicalizer.values_for_fields(&self.job, fields)?)
    }

    /// Canonical values for the fields the step signature covers
    pub fn signed_values(&self) -> Result<IndexMap<String, String>> {
        Ok(self.job.signed_values()?)
    }
}

impl<S: Finishable> TrackedJob<S> {
    /// Record the job's terminal status
    pub async fn finish(
        mut self,
        outcome: JobOutcome,
        cancel: &CancellationToken,
    ) -> std::result::Result<TrackedJob<Finished>, TransitionError<S>> {
        let previous = self.job.clone();
        self.job.finished_at = Some(outcome.finished_at);
        self.job.exit_status = Some(outcome.exit_status);
        self.job.signal = outcome.signal;
        self.job.signal_reason = outcome.signal_reason;
        self.job.chunks_failed_count = outcome.chunks_failed_count;

        if let Err(error) = self.client.finish_job(&self.job, cancel).await {
            self.job = previous;
            return self.fail(error);
        }
        info!(
            "Finished job {} with exit status {}",
            self.job.id, outcome.exit_status
        );

        Ok(self.advance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signalled_outcome() {
        let outcome = JobOutcome::signalled(-1, Some(Signal::Kill), SignalReason::Cancel)
            .with_chunks_failed(3);

        assert_eq!(outcome.exit_status, -1);
        assert_eq!(outcome.signal, Some(Signal::Kill));
        assert_eq!(outcome.signal_reason, Some(SignalReason::Cancel));
        assert_eq!(outcome.chunks_failed_count, 3);
    }

    #[test]
    fn test_transition_error_converts_to_client_error() {
        let job: TrackedJob<Accepted> = TrackedJob {
            client: AgentClient::new("https://agent.example.com/v3"),
            job: Job {
                id: "abc".to_string(),
                ..Default::default()
            },
            _state: PhantomData,
        };
        let err = TransitionError {
            job,
            error: ClientError::api_error(422, "nope"),
        };

        assert_eq!(err.to_string(), "job abc: API error (status 422): nope");
        let client_error: ClientError = err.into();
        assert!(client_error.is_conflict());
    }
}
