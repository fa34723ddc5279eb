//! Export configuration
//!
//! An [`ExportConfig`] is assembled once, from command-line flags or a YAML
//! job file, and is read-only for the rest of the run.
//!
//! # Job file
//!
//! ```yaml
//! input: data/users.ndjson
//! output: ${{EXPORT_DIR}}/users.ndjson
//! batch-size: 10000
//! limit: 0
//! transformers:
//!   - null: SSN
//!   - fake: [NAME:name.fullname, EMAIL:internet.email]
//!   - format: "LABEL:{NAME} <{EMAIL}>"
//! fake:
//!   locale: fr
//!   seed-column: ID
//! ```
//!
//! `${{VAR}}` placeholders are replaced from the environment before parsing.
//! Giving `transformers` as a mapping instead of a list builds one instance
//! per kind, ordered by kind priority.

use crate::etl::{DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY};
use crate::transform::{Instruction, TRANSFORMERS, TransformerConfig, find_kind};
use eyre::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// Default number of precomputed values per faked column in table mode
pub const DEFAULT_FAKE_TABLE_SIZE: usize = 65536;

const ENV_PLACEHOLDER_PATTERN: &str = r"\$\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}";

/// Settings shared by every fake transformer in a run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FakeOptions {
    /// Language of generated data (`en` or `fr`)
    pub locale: String,
    /// Global seed; a salt when a per-row mode is active
    pub seed: Option<u64>,
    /// Column whose value seeds each row
    pub seed_column: Option<String>,
    /// Seed each row from its 0-based ordinal
    pub deterministic: bool,
    /// Precompute values and look them up by seed
    pub table: bool,
    pub table_size: usize,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            seed: None,
            seed_column: None,
            deterministic: false,
            table: false,
            table_size: DEFAULT_FAKE_TABLE_SIZE,
        }
    }
}

/// How transformers were configured
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransformerSpec {
    #[default]
    None,
    /// Instructions in the order given; consecutive kinds are grouped
    Ordered(Vec<Instruction>),
    /// One entry per kind with no order; sorted by priority when built
    Unordered(Vec<TransformerConfig>),
}

impl TransformerSpec {
    pub fn is_empty(&self) -> bool {
        match self {
            TransformerSpec::None => true,
            TransformerSpec::Ordered(instructions) => instructions.is_empty(),
            TransformerSpec::Unordered(configs) => configs.is_empty(),
        }
    }

    /// Every kind named, in configuration order
    pub fn kinds(&self) -> Vec<&str> {
        match self {
            TransformerSpec::None => Vec::new(),
            TransformerSpec::Ordered(instructions) => {
                instructions.iter().map(|i| i.kind.as_str()).collect()
            }
            TransformerSpec::Unordered(configs) => {
                configs.iter().map(|c| c.kind.as_str()).collect()
            }
        }
    }

    /// Read the `transformers` entry of a job file
    ///
    /// Accepts a list of single-key mappings (ordered) or one mapping from
    /// kind to values (unordered).
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self> {
        match value {
            serde_yaml::Value::Null => Ok(TransformerSpec::None),
            serde_yaml::Value::Sequence(items) => {
                let mut instructions = Vec::new();
                for (position, item) in items.iter().enumerate() {
                    let entry = item.as_mapping().ok_or_else(|| {
                        eyre::eyre!(
                            "Transformer #{} must be a mapping like `fake: COLUMN:dataset.method`",
                            position + 1
                        )
                    })?;
                    for (kind, values) in entry {
                        let kind = yaml_key(kind)?;
                        for value in yaml_values(&kind, values)? {
                            instructions.push(Instruction::new(kind.clone(), value));
                        }
                    }
                }
                Ok(TransformerSpec::Ordered(instructions))
            }
            serde_yaml::Value::Mapping(entries) => {
                let mut configs = Vec::new();
                for (kind, values) in entries {
                    let kind = yaml_key(kind)?;
                    let values = yaml_values(&kind, values)?;
                    configs.push(TransformerConfig { kind, values });
                }
                Ok(TransformerSpec::Unordered(configs))
            }
            other => eyre::bail!(
                "`transformers` must be a list or a mapping, got {}",
                yaml_kind(other)
            ),
        }
    }
}

impl<'de> Deserialize<'de> for TransformerSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        TransformerSpec::from_yaml(&value).map_err(serde::de::Error::custom)
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a list",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn yaml_key(key: &serde_yaml::Value) -> Result<String> {
    yaml_scalar(key).ok_or_else(|| {
        eyre::eyre!(
            "Transformer kind must be a string, got {}",
            yaml_kind(key)
        )
    })
}

/// Flatten one kind's values: a scalar, a list of scalars, or a mapping
/// rendered as `key:value` pairs
fn yaml_values(kind: &str, value: &serde_yaml::Value) -> Result<Vec<String>> {
    let invalid = |found: &serde_yaml::Value| {
        eyre::eyre!(
            "Invalid value for transformer '{}': expected a string, list or mapping, got {}",
            kind,
            yaml_kind(found)
        )
    };

    match value {
        serde_yaml::Value::Null => Ok(Vec::new()),
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .map(|item| yaml_scalar(item).ok_or_else(|| invalid(item)))
            .collect(),
        serde_yaml::Value::Mapping(entries) => entries
            .iter()
            .map(|(k, v)| match (yaml_scalar(k), yaml_scalar(v)) {
                (Some(k), Some(v)) => Ok(format!("{}:{}", k, v)),
                _ => Err(invalid(v)),
            })
            .collect(),
        other => yaml_scalar(other).map(|s| vec![s]).ok_or_else(|| invalid(other)),
    }
}

/// Everything one export run needs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExportConfig {
    /// Source; the adapter is chosen from its prefix or extension
    pub input: String,
    /// Sink; the adapter is chosen from its extension
    pub output: String,
    pub batch_size: usize,
    /// Maximum rows to export; 0 means unlimited
    pub limit: u64,
    /// Capacity of each inter-stage queue, in rows
    pub queue_capacity: usize,
    pub dry_run: bool,
    pub transformers: TransformerSpec,
    pub fake: FakeOptions,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            input: String::new(),
            output: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            limit: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dry_run: false,
            transformers: TransformerSpec::None,
            fake: FakeOptions::default(),
        }
    }
}

impl ExportConfig {
    /// Load a YAML job file, replacing `${{VAR}}` placeholders first
    ///
    /// The result is not validated; apply overrides, then call
    /// [`ExportConfig::validate`].
    pub fn from_job_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file: {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse job file: {}", path.display()))
    }

    /// Parse job-file YAML, replacing `${{VAR}}` placeholders first
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let content = interpolate_env(content)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).context("Invalid job file YAML")
    }

    /// Check required fields and bounds
    ///
    /// # Errors
    /// Returns an error naming the first offending setting
    pub fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            eyre::bail!("An input is required (--input or `input:` in the job file)");
        }
        if self.output.trim().is_empty() {
            eyre::bail!("An output is required (--output or `output:` in the job file)");
        }
        if self.batch_size == 0 {
            eyre::bail!("Batch size must be greater than zero");
        }
        if self.queue_capacity == 0 {
            eyre::bail!("Queue capacity must be greater than zero");
        }
        for kind in self.transformers.kinds() {
            if find_kind(TRANSFORMERS, kind).is_none() {
                eyre::bail!(
                    "Unknown transformer kind '{}'. Supported: {}",
                    kind,
                    TRANSFORMERS
                        .iter()
                        .map(|d| d.kind)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
        Ok(())
    }
}

/// Replace `${{VAR}}` with the value of environment variable `VAR`
///
/// Unset variables are left as written and logged.
pub fn interpolate_env(content: &str) -> Result<String> {
    let pattern = Regex::new(ENV_PLACEHOLDER_PATTERN)
        .with_context(|| format!("Invalid placeholder pattern: {}", ENV_PLACEHOLDER_PATTERN))?;

    let replaced = pattern.replace_all(content, |caps: &regex::Captures| {
        let name = &caps[1];
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Environment variable '{}' is not set; leaving placeholder", name);
                caps[0].to_string()
            }
        }
    });
    Ok(replaced.into_owned())
}
