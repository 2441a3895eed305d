//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::pipeline::CommandStep;

/// A job as seen by the agent
///
/// This is the agent's local mirror of the coordinator's job record. It is
/// filled from acquire/accept responses and updated in place as the job moves
/// through its lifecycle. `token`, `started_at` and `finished_at` are only
/// populated once the matching transition has succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Base URL for this job's lifecycle calls. May differ between jobs when
    /// the coordinator spans several clusters.
    #[serde(default)]
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<JobState>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub step: CommandStep,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub chunks_max_size_bytes: u64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub log_max_size_bytes: u64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    #[serde(
        default,
        with = "exit_status_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub exit_status: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_reason: Option<SignalReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runnable_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub chunks_failed_count: u64,
}

impl Job {
    /// Replaces this job with the coordinator's view returned by accept.
    ///
    /// `id`, `endpoint` and `token` keep their current values unless the
    /// coordinator returned non-empty replacements.
    pub fn absorb(&mut self, mut remote: Job) {
        if remote.id.is_empty() {
            remote.id = std::mem::take(&mut self.id);
        }
        if remote.endpoint.is_empty() {
            remote.endpoint = std::mem::take(&mut self.endpoint);
        }
        if remote.token.is_empty() {
            remote.token = std::mem::take(&mut self.token);
        }
        *self = remote;
    }
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

open_enum! {
    /// Job state as reported by the coordinator
    ///
    /// The coordinator owns this value. States this agent does not know about
    /// are carried as `Unknown` rather than rejected.
    pub enum JobState {
        Pending => "pending",
        Waiting => "waiting",
        WaitingFailed => "waiting_failed",
        Blocked => "blocked",
        BlockedFailed => "blocked_failed",
        Unblocked => "unblocked",
        UnblockedFailed => "unblocked_failed",
        Limiting => "limiting",
        Limited => "limited",
        Scheduled => "scheduled",
        Assigned => "assigned",
        Accepted => "accepted",
        Running => "running",
        Finished => "finished",
        Canceling => "canceling",
        Canceled => "canceled",
        TimingOut => "timing_out",
        TimedOut => "timed_out",
        Skipped => "skipped",
        Broken => "broken",
        Expired => "expired",
    }
    else Unknown
}

impl JobState {
    /// Whether the job can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished
                | Self::Canceled
                | Self::TimedOut
                | Self::Skipped
                | Self::Broken
                | Self::Expired
        )
    }
}

open_enum! {
    /// Signal that terminated the job process, if any
    pub enum Signal {
        Hangup => "SIGHUP",
        Interrupt => "SIGINT",
        Quit => "SIGQUIT",
        Kill => "SIGKILL",
        Terminate => "SIGTERM",
        User1 => "SIGUSR1",
        User2 => "SIGUSR2",
    }
    else Other
}

open_enum! {
    /// Why the agent signalled or refused the job
    pub enum SignalReason {
        Cancel => "cancel",
        AgentStop => "agent_stop",
        AgentRefused => "agent_refused",
        AgentIncompatible => "agent_incompatible",
        ProcessRunError => "process_run_error",
        SignatureRejected => "signature_rejected",
        StackError => "stack_error",
    }
    else Other
}

/// Exit statuses travel as decimal strings on the wire.
pub(crate) mod exit_status_string {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i32),
        Str(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<i32>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(code) => serializer.serialize_str(&code.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Int(code)) => Ok(Some(code)),
            Some(Raw::Str(s)) if s.trim().is_empty() => Ok(None),
            Some(Raw::Str(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid exit status {s:?}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_from_coordinator_payload() {
        let job: Job = serde_json::from_value(json!({
            "id": "0190-abc",
            "endpoint": "https://agent.example.com/v3",
            "state": "accepted",
            "env": { "BUILDKITE_COMMAND": "make test" },
            "step": { "command": "make test", "key": "tests" },
            "token": "job-token",
            "exit_status": "1",
            "signal": "SIGTERM",
            "signal_reason": "cancel",
            "started_at": "2024-05-01T10:00:00Z",
            "chunks_max_size_bytes": 102400
        }))
        .unwrap();

        assert_eq!(job.id, "0190-abc");
        assert_eq!(job.state, Some(JobState::Accepted));
        assert_eq!(job.exit_status, Some(1));
        assert_eq!(job.signal, Some(Signal::Terminate));
        assert_eq!(job.signal_reason, Some(SignalReason::Cancel));
        assert_eq!(job.chunks_max_size_bytes, 102400);
        assert_eq!(job.step.command, "make test");
        assert!(job.started_at.is_some());
    }

    #[test]
    fn test_empty_fields_are_elided() {
        let job = Job {
            id: "abc".to_string(),
            ..Default::default()
        };

        let value = serde_json::to_value(&job).unwrap();
        let object = value.as_object().unwrap();
        assert!(object.contains_key("id"));
        assert!(object.contains_key("endpoint"));
        assert!(!object.contains_key("token"));
        assert!(!object.contains_key("exit_status"));
        assert!(!object.contains_key("chunks_failed_count"));
    }

    #[test]
    fn test_unknown_state_is_forward_compatible() {
        let state: JobState = serde_json::from_value(json!("reticulating")).unwrap();
        assert_eq!(state, JobState::Unknown("reticulating".to_string()));
        assert!(!state.is_terminal());
        assert_eq!(serde_json::to_value(&state).unwrap(), json!("reticulating"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Finished.is_terminal());
        assert!(JobState::Canceled.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Canceling.is_terminal());
    }

    #[test]
    fn test_exit_status_accepts_number_or_blank() {
        let job: Job = serde_json::from_value(json!({ "exit_status": -1 })).unwrap();
        assert_eq!(job.exit_status, Some(-1));

        let job: Job = serde_json::from_value(json!({ "exit_status": "" })).unwrap();
        assert_eq!(job.exit_status, None);

        assert!(serde_json::from_value::<Job>(json!({ "exit_status": "boom" })).is_err());
    }

    #[test]
    fn test_absorb_keeps_identity_when_remote_omits_it() {
        let mut job = Job {
            id: "abc".to_string(),
            endpoint: "https://cluster-2.example.com/v3".to_string(),
            token: "secret".to_string(),
            ..Default::default()
        };

        let remote = Job {
            env: HashMap::from([("FOO".to_string(), "bar".to_string())]),
            ..Default::default()
        };
        job.absorb(remote);

        assert_eq!(job.id, "abc");
        assert_eq!(job.endpoint, "https://cluster-2.example.com/v3");
        assert_eq!(job.token, "secret");
        assert_eq!(job.env.get("FOO").map(String::as_str), Some("bar"));
    }

    #[test]
    fn test_absorb_takes_remote_replacements() {
        let mut job = Job {
            id: "abc".to_string(),
            token: "old".to_string(),
            ..Default::default()
        };

        job.absorb(Job {
            id: "abc".to_string(),
            token: "new".to_string(),
            ..Default::default()
        });

        assert_eq!(job.token, "new");
    }
}
