//! Canonicalize command
//!
//! Reads a job as JSON and prints the canonical values of its signed fields,
//! the same values a signature over the step is computed from.

use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result};
use clap::Args;
use indexmap::IndexMap;
use kite_core::domain::job::Job;
use kite_core::domain::pipeline::ENV_NAMESPACE_PREFIX;
use kite_core::{CanonicalError, FieldCanonicalizer};

/// Arguments for `canonicalize`
#[derive(Args)]
pub struct CanonicalizeArgs {
    /// Path to a job JSON document, or "-" for stdin
    pub job: String,

    /// Fields to canonicalize; defaults to the step's signed fields
    #[arg(long = "field")]
    pub fields: Vec<String>,

    /// Prefix marking environment variable fields
    #[arg(long, default_value = ENV_NAMESPACE_PREFIX)]
    pub env_prefix: String,
}

/// Handle the canonicalize command
pub fn handle_canonicalize_command(args: CanonicalizeArgs) -> Result<()> {
    let raw = read_input(&args.job)?;
    let job: Job = serde_json::from_str(&raw).context("Failed to parse job JSON")?;

    let values = canonical_values(&job, &args.fields, &args.env_prefix)?;
    println!("{}", serde_json::to_string_pretty(&values)?);

    Ok(())
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read job from stdin")?;
        return Ok(raw);
    }

    fs::read_to_string(path).with_context(|| format!("Failed to read job file: {}", path))
}

/// Canonical values for `fields`, or for the step's signed fields when none
/// are given
fn canonical_values(
    job: &Job,
    fields: &[String],
    env_prefix: &str,
) -> Result<IndexMap<String, String>, CanonicalError> {
    let canonicalizer = FieldCanonicalizer::with_env_prefix(env_prefix)?;

    if !fields.is_empty() {
        return canonicalizer.values_for_fields(job, fields);
    }

    let signature = job
        .step
        .signature
        .as_ref()
        .ok_or(CanonicalError::MissingSignature)?;
    canonicalizer.values_for_fields(job, signature.signed_fields.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(value: serde_json::Value) -> Job {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults_to_signed_fields() {
        let job = job(json!({
            "id": "job-1",
            "env": {
                "BUILDKITE_COMMAND": "echo hi",
                "BUILDKITE_PLUGINS": "",
                "DEPLOY": "prod"
            },
            "step": {
                "command": "echo hi",
                "signature": {
                    "algorithm": "EdDSA",
                    "signed_fields": ["plugins", "command", "env::DEPLOY"],
                    "value": "sig"
                }
            }
        }));

        let values = canonical_values(&job, &[], ENV_NAMESPACE_PREFIX).unwrap();
        let entries: Vec<(&str, &str)> = values
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            entries,
            vec![("plugins", ""), ("command", "echo hi"), ("env::DEPLOY", "prod")]
        );
    }

    #[test]
    fn test_explicit_fields_with_custom_prefix() {
        let job = job(json!({ "env": { "FOO": "bar" } }));

        let values =
            canonical_values(&job, &["x-bk-env:FOO".to_string()], "x-bk-env:").unwrap();
        assert_eq!(values["x-bk-env:FOO"], "bar");
    }

    #[test]
    fn test_unsigned_step_without_fields_fails() {
        let job = job(json!({ "env": { "BUILDKITE_COMMAND": "true" } }));

        assert!(matches!(
            canonical_values(&job, &[], ENV_NAMESPACE_PREFIX),
            Err(CanonicalError::MissingSignature)
        ));
    }

    #[test]
    fn test_empty_prefix_is_rejected() {
        let job = job(json!({}));

        assert!(matches!(
            canonical_values(&job, &["command".to_string()], ""),
            Err(CanonicalError::EmptyPrefix)
        ));
    }
}
