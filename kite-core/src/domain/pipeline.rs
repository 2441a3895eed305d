//! Pipeline step types
//!
//! Only the parts of a command step the agent needs to reason about are typed
//! here. Everything else in the step is kept verbatim so the step can be
//! handed back to the coordinator or a signer unchanged.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Environment variable holding the job's shell command
pub const COMMAND_ENV: &str = "BUILDKITE_COMMAND";

/// Environment variable holding the job's plugin list as JSON
pub const PLUGINS_ENV: &str = "BUILDKITE_PLUGINS";

/// Prefix marking a signed field that refers to an environment variable
pub const ENV_NAMESPACE_PREFIX: &str = "env::";

/// A command step as embedded in a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandStep {
    #[serde(
        default,
        deserialize_with = "command_lines",
        skip_serializing_if = "String::is_empty"
    )]
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Plugins>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,

    /// Every other step attribute, untouched
    #[serde(flatten)]
    pub remaining: Map<String, Value>,
}

/// Signature attached to a step by the pipeline uploader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub algorithm: String,
    #[serde(default)]
    pub signed_fields: Vec<String>,
    pub value: String,
}

/// Accepts `command` as either a string or a list of lines.
fn command_lines<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Line(String),
        Lines(Vec<String>),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => String::new(),
        Some(Raw::Line(line)) => line,
        Some(Raw::Lines(lines)) => lines.join("\n"),
    })
}

/// An ordered list of plugins
///
/// Deserializes from any of the shapes producers emit:
/// - a list of bare sources: `["docker#v5.0.0"]`
/// - a list of single-key objects: `[{"docker#v5.0.0": {"image": "node"}}]`
/// - an object keyed by source: `{"docker#v5.0.0": {"image": "node"}}`
///
/// Always serializes as a list of single-key objects with every nested object
/// key in sorted order, which makes the serialized form canonical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PluginsRepr")]
pub struct Plugins(pub Vec<Plugin>);

/// A single plugin reference and its configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "PluginRepr")]
pub struct Plugin {
    /// Plugin source, e.g. `docker-compose#v4.0.0`
    pub source: String,
    /// Plugin configuration, `None` when the plugin has none
    pub config: Option<Value>,
}

impl Plugin {
    pub fn new(source: impl Into<String>, config: Option<Value>) -> Self {
        Self {
            source: source.into(),
            config: config.filter(|c| !c.is_null()).map(sorted_value),
        }
    }
}

impl Serialize for Plugin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.source, &self.config)?;
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PluginsRepr {
    List(Vec<Plugin>),
    // keyed by source; entry order is run order
    Map(IndexMap<String, Value>),
}

impl TryFrom<PluginsRepr> for Plugins {
    type Error = String;

    fn try_from(repr: PluginsRepr) -> Result<Self, Self::Error> {
        Ok(match repr {
            PluginsRepr::List(plugins) => Plugins(plugins),
            PluginsRepr::Map(map) => Plugins(
                map.into_iter()
                    .map(|(source, config)| Plugin::new(source, Some(config)))
                    .collect(),
            ),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PluginRepr {
    Bare(String),
    Configured(Map<String, Value>),
}

impl TryFrom<PluginRepr> for Plugin {
    type Error = String;

    fn try_from(repr: PluginRepr) -> Result<Self, Self::Error> {
        match repr {
            PluginRepr::Bare(source) => Ok(Plugin::new(source, None)),
            PluginRepr::Configured(map) => {
                if map.len() != 1 {
                    return Err(format!(
                        "plugin definition must have exactly one key, found {}",
                        map.len()
                    ));
                }
                let (source, config) = map
                    .into_iter()
                    .next()
                    .ok_or_else(|| "empty plugin definition".to_string())?;
                Ok(Plugin::new(source, Some(config)))
            }
        }
    }
}

/// Rebuilds a JSON value with every object's keys inserted in sorted order.
///
/// Holds regardless of whether `serde_json` keeps insertion order.
fn sorted_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sorted_value(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted_value).collect()),
        other => other,
    }
}
