//! Error types for field canonicalization

use thiserror::Error;

/// Errors raised while computing canonical field values
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// The field name is neither a known field nor namespaced
    #[error("unknown or unsupported field on job for signing/verification: {0:?}")]
    UnsupportedField(String),

    /// `BUILDKITE_PLUGINS` could not be parsed as a plugin list
    #[error("unmarshaling BUILDKITE_PLUGINS: {0}")]
    PluginsUnmarshal(#[source] serde_json::Error),

    /// The parsed plugin list could not be serialized again
    #[error("re-marshaling BUILDKITE_PLUGINS: {0}")]
    PluginsRemarshal(#[source] serde_json::Error),

    /// Signed values were requested for a step that carries no signature
    #[error("job step has no signature")]
    MissingSignature,

    /// An empty namespace prefix would make every field name resolvable
    #[error("env namespace prefix cannot be empty")]
    EmptyPrefix,
}
