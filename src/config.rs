use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};

use crate::constants::{config_file_candidates, CONFIG_OVERRIDE_PREFIX};
use crate::rclone::RcloneConfig;
use crate::restic::ResticConfig;

/// Everything a run needs. A missing section means that tool is skipped.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Configuration {
    pub restic: Option<ResticConfig>,
    pub rclone: Option<RcloneConfig>,
}

impl Configuration {
    pub fn validate(&self) -> Result<()> {
        if let Some(restic) = &self.restic {
            restic.validate().context("invalid restic configuration")?;
        }
        Ok(())
    }
}

/// Picks the configuration file: the explicit path when given, otherwise the
/// first `backup.config[.ext]` found in `cwd`.
pub fn resolve_config_path(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(resolve_path(cwd, path));
    }

    config_file_candidates()
        .into_iter()
        .map(|name| cwd.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no config file found in {} (looked for {})",
                cwd.display(),
                config_file_candidates().join(", ")
            )
        })
}

pub fn load_config(path: &Path, env: &HashMap<String, String>) -> Result<Configuration> {
    tracing::info!("Start reading config file");

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let mut document = parse_document(path, &contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    apply_env_overrides(&mut document, env)?;

    let config: Configuration = serde_yaml::from_value(document)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    config.validate()?;

    tracing::info!("Using config file: {}", path.display());
    Ok(config)
}

/// Parses the file into a YAML value tree, choosing the format by extension.
pub fn parse_document(path: &Path, contents: &str) -> Result<Value> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let document = match extension.as_deref() {
        Some("toml") => {
            let parsed: toml::Value = toml::from_str(contents).context("invalid TOML")?;
            serde_yaml::to_value(parsed).context("failed to convert TOML document")?
        }
        Some("json") => {
            let parsed: serde_json::Value =
                serde_json::from_str(contents).context("invalid JSON")?;
            serde_yaml::to_value(parsed).context("failed to convert JSON document")?
        }
        _ => serde_yaml::from_str(contents).context("invalid YAML")?,
    };

    Ok(match document {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    })
}

/// Applies `BACKUP_AND_SYNC__SECTION__KEY…=value` variables on top of the
/// document. Segments are lower-cased with `_` mapped to `-`; numeric
/// segments index into lists.
pub fn apply_env_overrides(document: &mut Value, env: &HashMap<String, String>) -> Result<()> {
    let overrides: BTreeMap<&str, &str> = env
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(CONFIG_OVERRIDE_PREFIX)
                .map(|path| (path, value.as_str()))
        })
        .collect();

    for (raw_path, raw_value) in overrides {
        let segments = override_segments(raw_path);
        if segments.is_empty() {
            continue;
        }
        set_path(document, &segments, raw_value).with_context(|| {
            format!("failed to apply environment override {CONFIG_OVERRIDE_PREFIX}{raw_path}")
        })?;
        tracing::debug!(key = %segments.join("."), "applied configuration override");
    }

    Ok(())
}

fn override_segments(raw_path: &str) -> Vec<String> {
    raw_path
        .split("__")
        .map(|segment| segment.trim().to_ascii_lowercase().replace('_', "-"))
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn set_path(node: &mut Value, segments: &[String], raw_value: &str) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        *node = override_value(node, raw_value);
        return Ok(());
    };

    if node.is_null() {
        *node = Value::Mapping(Mapping::new());
    }

    match node {
        Value::Mapping(mapping) => {
            let child = mapping
                .entry(Value::String(head.clone()))
                .or_insert(Value::Null);
            set_path(child, rest, raw_value)
        }
        Value::Sequence(items) => {
            let index: usize = head
                .parse()
                .with_context(|| format!("`{head}` is not a list index"))?;
            let len = items.len();
            let child = items.get_mut(index).ok_or_else(|| {
                anyhow::anyhow!("index {index} is out of range for a list of {len}")
            })?;
            set_path(child, rest, raw_value)
        }
        _ => anyhow::bail!("cannot descend into scalar value at `{head}`"),
    }
}

// Strings stay strings. Lists and mappings are only parsed when they replace
// a list or mapping, so a value such as `[x]` for an unset key stays text.
fn override_value(existing: &Value, raw_value: &str) -> Value {
    let text = || Value::String(raw_value.to_string());
    if existing.is_string() {
        return text();
    }
    match serde_yaml::from_str::<Value>(raw_value) {
        Ok(parsed @ (Value::Bool(_) | Value::Number(_))) => parsed,
        Ok(parsed @ Value::Sequence(_)) if existing.is_sequence() => parsed,
        Ok(parsed @ Value::Mapping(_)) if existing.is_mapping() => parsed,
        _ => text(),
    }
}

/// Reads a text field from any scalar, so `password: 123456` or an override
/// that looks like a number or boolean still lands as a string.
pub(crate) fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!(
            "expected a scalar value, found {}",
            describe_kind(&other)
        ))),
    }
}

fn describe_kind(value: &Value) -> &'static str {
    match value {
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
        _ => "a scalar",
    }
}

fn resolve_path(base: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        base.join(configured)
    }
}
