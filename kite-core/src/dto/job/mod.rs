//! Job DTOs for coordinator communication

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobState, Signal, SignalReason};

/// Response body of `GET jobs/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,
}

/// Request body of `PUT jobs/{id}/start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartJobRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&Job> for StartJobRequest {
    fn from(job: &Job) -> Self {
        Self {
            started_at: job.started_at,
        }
    }
}

/// Request body of `PUT jobs/{id}/finish`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishJobRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(
        default,
        with = "crate::domain::job::exit_status_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub exit_status: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_reason: Option<SignalReason>,

    /// Always sent, zero included
    pub chunks_failed_count: u64,
}

impl From<&Job> for FinishJobRequest {
    fn from(job: &Job) -> Self {
        Self {
            finished_at: job.finished_at,
            exit_status: job.exit_status,
            signal: job.signal.clone(),
            signal_reason: job.signal_reason.clone(),
            chunks_failed_count: job.chunks_failed_count,
        }
    }
}
