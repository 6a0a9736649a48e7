use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::ConfigError;

const APP_NAME: &str = "s3-dir-sync";

static BUCKET_NAME_REGEX: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^[a-z0-9][a-z0-9.-]*[a-z0-9]$").unwrap());

/// One `(local directory, bucket)` pair as written in the configuration file.
/// Both fields are optional here so that a missing one is reported by
/// [`validate_targets`] instead of failing the whole file parse.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct TargetConfig {
    #[serde(
        default,
        alias = "bucketName",
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub bucket_name: Option<String>,
    #[serde(
        default,
        alias = "localDir",
        deserialize_with = "deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub local_dir: Option<PathBuf>,
}

impl TargetConfig {
    pub fn new(bucket_name: impl Into<String>, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            bucket_name: Some(bucket_name.into()),
            local_dir: Some(local_dir.into()),
        }
    }
}

/// A validated target: both fields present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub local_dir: PathBuf,
    pub bucket_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cafile: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    /// Fail when emptying a bucket that does not exist.
    #[serde(default)]
    pub strict: bool,
    /// Upper bound on uploads in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// `None` when the entry is absent or is not a list.
    #[serde(
        default,
        alias = "syncS3",
        deserialize_with = "deserialize_targets",
        skip_serializing_if = "Option::is_none"
    )]
    pub sync_s3: Option<Vec<TargetConfig>>,
}

fn default_concurrency() -> usize {
    50
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            cafile: None,
            endpoint_url: None,
            force_path_style: false,
            strict: false,
            concurrency: default_concurrency(),
            cache_control: None,
            sync_s3: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Value(T),
    Other(serde::de::IgnoredAny),
}

/// A value of the wrong type reads as absent.
fn deserialize_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<Lenient<T>>::deserialize(deserializer)? {
        Some(Lenient::Value(value)) => Some(value),
        Some(Lenient::Other(_)) | None => None,
    })
}

/// Only a value that is not a list reads as absent. Entries that are not
/// tables become targets with no fields, so validation rejects them.
fn deserialize_targets<'de, D>(deserializer: D) -> Result<Option<Vec<TargetConfig>>, D::Error>
where
    D: Deserializer<'de>,
{
    let targets: Option<Vec<Lenient<TargetConfig>>> = deserialize_lenient(deserializer)?;
    Ok(targets.map(|entries| {
        entries
            .into_iter()
            .map(|entry| match entry {
                Lenient::Value(target) => target,
                Lenient::Other(_) => TargetConfig::default(),
            })
            .collect()
    }))
}

impl SyncConfig {
    /// Loads the configuration from `path`, or from the platform config
    /// directory when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                if !path.is_file() {
                    bail!("config file {} does not exist", path.display());
                }
                confy::load_path(path)
                    .with_context(|| format!("failed to load config file {}", path.display()))
            }
            None => {
                let path = confy::get_configuration_file_path(APP_NAME, None)
                    .with_context(|| format!("failed to locate config file `{}`", APP_NAME))?;
                Self::load_if_present(&path)
            }
        }
    }

    /// Loads `path` when it exists; a missing file means defaults and is
    /// never created.
    fn load_if_present(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        confy::load_path(path)
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Get the default config file path for debugging purposes.
    pub fn default_path() -> Option<PathBuf> {
        confy::get_configuration_file_path(APP_NAME, None).ok()
    }
}

/// Checks that every target names both a bucket and a directory. A single
/// bad entry rejects the whole list.
pub fn validate_targets(targets: &[TargetConfig]) -> Result<Vec<SyncTarget>, ConfigError> {
    targets
        .iter()
        .enumerate()
        .map(|(index, target)| -> Result<SyncTarget, ConfigError> {
            let bucket_name = target
                .bucket_name
                .as_deref()
                .filter(|b| !b.trim().is_empty())
                .ok_or(ConfigError::MissingField {
                    index,
                    field: "bucket_name",
                })?;
            let local_dir = target
                .local_dir
                .as_deref()
                .filter(|d| !d.as_os_str().is_empty())
                .ok_or(ConfigError::MissingField {
                    index,
                    field: "local_dir",
                })?;

            if bucket_name.trim() != bucket_name {
                warn!(
                    "Bucket name '{}' has surrounding whitespace; it is used as given",
                    bucket_name
                );
            } else if !follows_bucket_naming_rules(bucket_name) {
                warn!(
                    "Bucket name '{}' does not follow the S3 naming rules; the backend may reject it",
                    bucket_name
                );
            }

            Ok(SyncTarget {
                local_dir: local_dir.to_path_buf(),
                bucket_name: bucket_name.to_string(),
            })
        })
        .collect()
}

// https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html
fn follows_bucket_naming_rules(name: &str) -> bool {
    (3..=63).contains(&name.len())
        && BUCKET_NAME_REGEX.is_match(name)
        && !name.contains("..")
        && !name.chars().all(|c| c.is_ascii_digit() || c == '.')
}
