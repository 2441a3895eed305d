//! Canonical field values for step signing
//!
//! A step signature covers a list of named job fields. Signer and verifier
//! must agree byte for byte on each field's value, so values are derived from
//! the job's final environment and normalised where producers are known to
//! vary (plugin configuration key order).
//!
//! Only call this on a job whose environment is final, i.e. after accept.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;

use crate::domain::job::Job;
use crate::domain::pipeline::{COMMAND_ENV, ENV_NAMESPACE_PREFIX, PLUGINS_ENV, Plugins};
use crate::error::CanonicalError;

/// A field that can be covered by a step signature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SigningField {
    /// The shell command
    Command,
    /// The plugin list, in canonical JSON
    Plugins,
    /// A single environment variable
    Env(String),
}

/// Resolves field names to canonical values
///
/// The namespace prefix for environment fields defaults to `env::`; the same
/// prefix is used to parse names and to print them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCanonicalizer {
    env_prefix: String,
}

impl Default for FieldCanonicalizer {
    fn default() -> Self {
        Self {
            env_prefix: ENV_NAMESPACE_PREFIX.to_string(),
        }
    }
}

impl FieldCanonicalizer {
    /// Creates a canonicalizer with a custom environment namespace prefix
    pub fn with_env_prefix(prefix: impl Into<String>) -> Result<Self, CanonicalError> {
        let env_prefix = prefix.into();
        if env_prefix.is_empty() {
            return Err(CanonicalError::EmptyPrefix);
        }
        Ok(Self { env_prefix })
    }

    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    /// Parses a field name
    ///
    /// Unknown names are an error rather than an empty value, so a signature
    /// cannot be made to cover a field that trivially resolves to nothing.
    pub fn parse_field(&self, name: &str) -> Result<SigningField, CanonicalError> {
        match name {
            "command" => Ok(SigningField::Command),
            "plugins" => Ok(SigningField::Plugins),
            _ => match name.strip_prefix(self.env_prefix.as_str()) {
                Some(var) => Ok(SigningField::Env(var.to_string())),
                None => Err(CanonicalError::UnsupportedField(name.to_string())),
            },
        }
    }

    /// Prints a field back to the name it was parsed from
    pub fn field_name(&self, field: &SigningField) -> String {
        match field {
            SigningField::Command => "command".to_string(),
            SigningField::Plugins => "plugins".to_string(),
            SigningField::Env(var) => format!("{}{}", self.env_prefix, var),
        }
    }

    /// Canonical value of a single field
    pub fn value_for(&self, job: &Job, field: &SigningField) -> Result<String, CanonicalError> {
        match field {
            SigningField::Command => Ok(env_value(job, COMMAND_ENV)),
            SigningField::Plugins => canonicalize_plugins(&env_value(job, PLUGINS_ENV)),
            SigningField::Env(var) => Ok(env_value(job, var)),
        }
    }

    /// Canonical values for the given field names, in the order given
    ///
    /// Fails on the first unsupported or malformed field; no partial map is
    /// returned.
    pub fn values_for_fields<F: AsRef<str>>(
        &self,
        job: &Job,
        fields: &[F],
    ) -> Result<IndexMap<String, String>, CanonicalError> {
        let mut values = IndexMap::with_capacity(fields.len());
        for name in fields {
            let name = name.as_ref();
            let field = self.parse_field(name)?;
            values.insert(name.to_string(), self.value_for(job, &field)?);
        }
        Ok(values)
    }
}

impl Job {
    /// Canonical values for the given field names, using the default `env::`
    /// namespace. See [`FieldCanonicalizer::values_for_fields`].
    pub fn values_for_fields<F: AsRef<str>>(
        &self,
        fields: &[F],
    ) -> Result<IndexMap<String, String>, CanonicalError> {
        FieldCanonicalizer::default().values_for_fields(self, fields)
    }

    /// Canonical values for exactly the fields the step signature covers
    pub fn signed_values(&self) -> Result<IndexMap<String, String>, CanonicalError> {
        let signature = self
            .step
            .signature
            .as_ref()
            .ok_or(CanonicalError::MissingSignature)?;
        self.values_for_fields(signature.signed_fields.as_slice())
    }
}

/// Normalises a plugin list to its canonical JSON form
///
/// Producers do not agree on key order within plugin configuration, so the
/// raw string is never used as is: it goes through a typed parse and is
/// serialized again. An empty input stays empty.
pub fn canonicalize_plugins(raw: &str) -> Result<String, CanonicalError> {
    if raw.is_empty() {
        return Ok(String::new());
    }
    let plugins: Plugins = serde_json::from_str(raw).map_err(CanonicalError::PluginsUnmarshal)?;

    let mut out = Vec::with_capacity(raw.len());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, HtmlSafeFormatter);
    plugins
        .serialize(&mut serializer)
        .map_err(CanonicalError::PluginsRemarshal)?;
    String::from_utf8(out)
        .map_err(|e| CanonicalError::PluginsRemarshal(serde::ser::Error::custom(e)))
}

/// Compact JSON that escapes `&`, `<`, `>`, U+2028 and U+2029 as `\uXXXX`,
/// matching the signer's encoder byte for byte.
struct HtmlSafeFormatter;

impl Formatter for HtmlSafeFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            let escaped = match ch {
                '&' => "\\u0026",
                '<' => "\\u003c",
                '>' => "\\u003e",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

fn env_value(job: &Job, name: &str) -> String {
    job.env.get(name).cloned().unwrap_or_default()
}
