//! Kite HTTP Client
//!
//! Client side of the job lifecycle protocol spoken between a build agent and
//! its coordinator.
//!
//! Every call is a single request/response exchange: there is no retry and no
//! background work here. Each call takes a [`CancellationToken`]; cancelling it
//! aborts the exchange promptly with [`ClientError::Cancelled`].
//!
//! # Example
//!
//! ```no_run
//! use kite_client::{AgentClient, JobLifecycle, JobOutcome};
//! use reqwest::header::HeaderMap;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = AgentClient::new("https://agent.example.com/v3").with_token("agent-token");
//!     let cancel = CancellationToken::new();
//!
//!     let acquired = JobLifecycle::new(client)
//!         .acquire("0190-abc", HeaderMap::new(), &cancel)
//!         .await?;
//!     let accepted = acquired.accept(&cancel).await?;
//!     println!("{:?}", accepted.signed_values());
//!
//!     let started = accepted.start(chrono::Utc::now(), &cancel).await?;
//!     started.finish(JobOutcome::exited(0), &cancel).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
pub mod lifecycle;
mod oidc;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use jobs::acquire_headers;
pub use lifecycle::{JobLifecycle, JobOutcome, TrackedJob, TransitionError};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use kite_core::domain::job::Job;

/// HTTP client for the coordinator's agent API
///
/// Cheap to clone; clones share the underlying connection pool. Calls for
/// different jobs may run concurrently, calls for the same job must be
/// sequenced by the caller.
#[derive(Debug, Clone)]
pub struct AgentClient {
    /// Base URL of the agent API (e.g., "https://agent.example.com/v3")
    endpoint: String,
    /// Access token sent as `Authorization: Token ...`
    token: Option<String>,
    /// User agent sent with every request
    user_agent: Option<String>,
    /// HTTP client instance
    client: Client,
}

/// A decoded response together with its transport metadata
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: T,
}

impl<T> Response<T> {
    /// Drops the transport metadata
    pub fn into_body(self) -> T {
        self.body
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
        }
    }
}

/// A request to the agent API: method, path below the endpoint, optional JSON
/// body and extra headers.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
}

impl ApiRequest {
    pub(crate) fn new(method: Method, segments: &[&str]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub(crate) fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub(crate) fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }
}

impl AgentClient {
    /// Create a new agent client
    ///
    /// # Arguments
    /// * `endpoint` - The base URL of the agent API (e.g., "https://agent.example.com/v3")
    ///
    /// # Example
    /// ```
    /// use kite_client::AgentClient;
    ///
    /// let client = AgentClient::new("https://agent.example.com/v3");
    /// ```
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, Client::new())
    }

    /// Create a new agent client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use kite_client::AgentClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = AgentClient::with_client("https://agent.example.com/v3", http_client);
    /// ```
    pub fn with_client(endpoint: impl Into<String>, client: Client) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: None,
            user_agent: None,
            client,
        }
    }

    /// Authenticate requests with the given access token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// A client for a specific job's lifecycle calls
    ///
    /// Uses the job's endpoint and token when the coordinator supplied them,
    /// falling back to this client's own.
    pub fn for_job(&self, job: &Job) -> Self {
        let mut client = self.clone();
        if !job.endpoint.is_empty() {
            client.endpoint = job.endpoint.trim_end_matches('/').to_string();
        }
        if !job.token.is_empty() {
            client.token = Some(job.token.clone());
        }
        client
    }

    /// Get the base URL of the agent API
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // =============================================================================
    // Request Plumbing
    // =============================================================================

    fn url(&self, segments: &[String]) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| {
            ClientError::InvalidRequest(format!("Invalid endpoint {:?}: {}", self.endpoint, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::InvalidRequest(format!(
                    "Endpoint {:?} cannot be a base URL",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: ApiRequest) -> Result<reqwest::Response> {
        let url = self.url(&request.segments)?;
        debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method, url);
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| ClientError::InvalidRequest(format!("Invalid token: {}", e)))?;
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.header(USER_AGENT, user_agent.as_str());
        }
        builder = builder.headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    /// Sends a request and decodes a JSON response body
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<Response<T>> {
        cancellable(cancel, async {
            let response = self.send(request).await?;
            self.handle_response(response).await
        })
        .await
    }

    /// Sends a request whose response carries no payload
    pub(crate) async fn call_empty(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<Response<()>> {
        cancellable(cancel, async {
            let response = self.send(request).await?;
            self.handle_empty_response(response).await
        })
        .await
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<Response<T>> {
        let response = self.check_status(response).await?;
        let status = response.status();
        let headers = response.headers().clone();

        let body = response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }

    /// Handle an API response that returns no content
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<Response<()>> {
        let response = self.check_status(response).await?;
        Ok(Response {
            status: response.status(),
            headers: response.headers().clone(),
            body: (),
        })
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().clone();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!("{} returned {}", url, status);
        Err(ClientError::api_error(status.as_u16(), error_text))
    }
}

/// Races `future` against the cancellation token
async fn cancellable<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(ClientError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = future => result,
    }
}
