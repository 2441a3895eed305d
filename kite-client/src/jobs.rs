//! Job lifecycle endpoints

use kite_core::domain::job::{Job, JobState};
use kite_core::dto::job::{FinishJobRequest, JobStateResponse, StartJobRequest};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};
use crate::{AgentClient, ApiRequest, Response};

const AGENT_ID_HEADER: &str = "x-buildkite-agent-id";
const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

impl AgentClient {
    // =============================================================================
    // Job State
    // =============================================================================

    /// Get the coordinator's current state for a job
    ///
    /// A missing state is returned as `None`; unknown states come back as
    /// [`JobState::Unknown`].
    pub async fn get_job_state(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Response<Option<JobState>>> {
        require_id(id)?;
        let response: Response<JobStateResponse> = self
            .call(ApiRequest::new(Method::GET, &["jobs", id]), cancel)
            .await?;

        Ok(response.map(|body| body.state))
    }

    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Claim a job for this agent
    ///
    /// A conflict status means another agent won the race; check it with
    /// [`ClientError::is_conflict`].
    ///
    /// # Arguments
    /// * `id` - The job ID
    /// * `headers` - Extra request headers, see [`acquire_headers`]
    ///
    /// # Returns
    /// The full job, including its token and step
    pub async fn acquire_job(
        &self,
        id: &str,
        headers: HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Response<Job>> {
        require_id(id)?;
        let request = ApiRequest::new(Method::PUT, &["jobs", id, "acquire"]).headers(headers);

        self.call(request, cancel).await
    }

    /// Accept a job
    ///
    /// The coordinator applies the agent's environment to the job on accept,
    /// so the returned job carries the final `env`.
    pub async fn accept_job(&self, job: &Job, cancel: &CancellationToken) -> Result<Response<Job>> {
        require_id(&job.id)?;

        self.call(ApiRequest::new(Method::PUT, &["jobs", job.id.as_str(), "accept"]), cancel)
            .await
    }

    /// Record the job's start time
    ///
    /// Only `started_at` is sent.
    pub async fn start_job(&self, job: &Job, cancel: &CancellationToken) -> Result<Response<()>> {
        require_id(&job.id)?;
        let request = ApiRequest::new(Method::PUT, &["jobs", job.id.as_str(), "start"])
            .json(&StartJobRequest::from(job))?;

        self.call_empty(request, cancel).await
    }

    /// Record the job's terminal status
    ///
    /// Sends `finished_at`, `exit_status`, `signal`, `signal_reason` and
    /// `chunks_failed_count`.
    pub async fn finish_job(&self, job: &Job, cancel: &CancellationToken) -> Result<Response<()>> {
        require_id(&job.id)?;
        let request = ApiRequest::new(Method::PUT, &["jobs", job.id.as_str(), "finish"])
            .json(&FinishJobRequest::from(job))?;

        self.call_empty(request, cancel).await
    }
}

/// Builds the optional headers sent with an acquire
///
/// # Arguments
/// * `agent_id` - Identifies the acquiring agent
/// * `idempotency_key` - Lets the coordinator recognise a repeated acquire
pub fn acquire_headers(agent_id: Option<&str>, idempotency_key: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in [
        (AGENT_ID_HEADER, agent_id),
        (IDEMPOTENCY_KEY_HEADER, idempotency_key),
    ] {
        if let Some(value) = value {
            let value = HeaderValue::from_str(value).map_err(|e| {
                ClientError::InvalidRequest(format!("Invalid {} header: {}", name, e))
            })?;
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    Ok(headers)
}

fn require_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(ClientError::InvalidRequest("job id is empty".to_string()));
    }
    Ok(())
}
