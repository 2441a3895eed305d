//! OIDC token endpoint

use kite_core::dto::oidc::{OidcToken, OidcTokenRequest};
use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};
use crate::{AgentClient, ApiRequest, Response};

impl AgentClient {
    /// Request a short-lived identity token scoped to a job
    ///
    /// The coordinator accepts at most one audience. With none, the request
    /// carries no audience constraint; with more than one, the call fails with
    /// [`ClientError::TooManyAudiences`] before anything is sent.
    pub async fn oidc_token<A: AsRef<str>>(
        &self,
        job_id: &str,
        audience: &[A],
        cancel: &CancellationToken,
    ) -> Result<Response<OidcToken>> {
        let body = match audience {
            [] => None,
            [single] => Some(OidcTokenRequest {
                audience: single.as_ref().to_string(),
            }),
            many => return Err(ClientError::TooManyAudiences(many.len())),
        };

        if job_id.is_empty() {
            return Err(ClientError::InvalidRequest("job id is empty".to_string()));
        }

        let mut request = ApiRequest::new(Method::POST, &["jobs", job_id, "oidc", "tokens"]);
        if let Some(body) = &body {
            request = request.json(body)?;
        }

        self.call(request, cancel).await
    }
}
