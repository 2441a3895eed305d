//! OIDC token DTOs

use serde::{Deserialize, Serialize};

/// Request body of `POST jobs/{id}/oidc/tokens`
///
/// Only sent when exactly one audience was asked for; with no audience the
/// request carries no body at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcTokenRequest {
    pub audience: String,
}

/// A short-lived identity token scoped to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcToken {
    pub token: String,
}
