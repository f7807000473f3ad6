use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    error::{ConfigError, Result},
    schema::CasePolicy,
};

const DEFAULT_PARTITION_SIZE: u64 = 100 * 1024 * 1024;
/// The engine's default shuffle parallelism; count-only scans spread their
/// empty records over this many partitions.
const DEFAULT_COUNT_PARTITIONS: usize = 200;

/// Per-scan options. Parsed once from a TOML file or the engine's string
/// option map; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanOptions {
    /// Retrieve through a bulk unload to the stage instead of slicing the
    /// live result set.
    pub use_copy_unload: bool,
    /// Quote requested column names as spelled instead of uppercasing.
    pub keep_original_column_name_case: bool,
    /// Target uncompressed bytes per direct-path partition.
    pub expected_partition_size: u64,
    /// Bind literals as statement parameters; when off, literals are
    /// inlined with SQL escaping.
    pub bind_variable_enabled: bool,
    /// Partition count for the count-only fast path.
    pub count_partitions: usize,
    /// Transient stage base location, required by the unload strategy.
    pub stage_location: Option<Url>,
    /// Statements run before and after the main query, verbatim.
    pub pre_actions: Vec<String>,
    pub post_actions: Vec<String>,
    /// Proxy and other network settings, passed through to the driver
    /// without interpretation.
    pub network: BTreeMap<String, String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            use_copy_unload: false,
            keep_original_column_name_case: false,
            expected_partition_size: DEFAULT_PARTITION_SIZE,
            bind_variable_enabled: true,
            count_partitions: DEFAULT_COUNT_PARTITIONS,
            stage_location: None,
            pre_actions: Vec::new(),
            post_actions: Vec::new(),
            network: BTreeMap::new(),
        }
    }
}

impl ScanOptions {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text).map_err(ConfigError::Toml)?)
    }

    /// Parse from the engine's option map. Option names match
    /// case-insensitively; keys mentioning a proxy are collected into the
    /// opaque network map; anything else is ignored.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self> {
        let mut options = ScanOptions::default();
        for (key, value) in pairs {
            match key.to_lowercase().as_str() {
                "usecopyunload" => options.use_copy_unload = parse_bool(key, value)?,
                "keeporiginalcolumnnamecase" => {
                    options.keep_original_column_name_case = parse_bool(key, value)?
                }
                "expectedpartitionsize" => {
                    options.expected_partition_size = parse_byte_size(key, value)?
                }
                "bindvariableenabled" => options.bind_variable_enabled = parse_bool(key, value)?,
                "countpartitions" => {
                    options.count_partitions = value.parse().map_err(|_| invalid(key, value))?
                }
                "stagelocation" => {
                    let url = Url::parse(value)
                        .map_err(|e| ConfigError::StageUrl(value.to_string(), e))?;
                    options.stage_location = Some(url);
                }
                "preactions" => options.pre_actions = split_actions(value),
                "postactions" => options.post_actions = split_actions(value),
                lower if lower.contains("proxy") => {
                    options.network.insert(key.to_string(), value.to_string());
                }
                _ => {
                    tracing::debug!(key, "ignoring unrecognized scan option");
                }
            }
        }
        Ok(options)
    }

    pub fn case_policy(&self) -> CasePolicy {
        if self.keep_original_column_name_case {
            CasePolicy::KeepCase
        } else {
            CasePolicy::Uppercase
        }
    }

    pub fn stage_location(&self) -> Result<&Url> {
        Ok(self
            .stage_location
            .as_ref()
            .ok_or(ConfigError::MissingStageLocation)?)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(key, value).into()),
    }
}

/// Accepts a plain byte count or a KB/MB/GB suffix.
fn parse_byte_size(key: &str, value: &str) -> Result<u64> {
    let trimmed = value.trim();
    let (digits, multiplier) = match trimmed.to_uppercase() {
        v if v.ends_with("GB") => (&trimmed[..trimmed.len() - 2], 1024 * 1024 * 1024),
        v if v.ends_with("MB") => (&trimmed[..trimmed.len() - 2], 1024 * 1024),
        v if v.ends_with("KB") => (&trimmed[..trimmed.len() - 2], 1024),
        _ => (trimmed, 1),
    };
    let count: u64 = digits.trim().parse().map_err(|_| invalid(key, value))?;
    Ok(count * multiplier)
}

fn split_actions(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|action| !action.is_empty())
        .map(str::to_string)
        .collect()
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults() {
        let options = ScanOptions::default();
        assert!(!options.use_copy_unload);
        assert!(!options.keep_original_column_name_case);
        assert!(options.bind_variable_enabled);
        assert_eq!(options.expected_partition_size, 100 * 1024 * 1024);
        assert_eq!(options.count_partitions, 200);
        assert_eq!(options.case_policy(), CasePolicy::Uppercase);
    }

    #[test]
    fn option_map_keys_match_case_insensitively() {
        let options = ScanOptions::from_pairs([
            ("useCopyUnload", "true"),
            ("KEEPORIGINALCOLUMNNAMECASE", "true"),
            ("expectedPartitionSize", "10MB"),
            ("bindVariableEnabled", "false"),
            ("stageLocation", "s3://bucket/stage/"),
            ("preActions", "ALTER SESSION SET A = 1; ALTER SESSION SET B = 2"),
            ("somethingElseEntirely", "ignored"),
        ])
        .unwrap();
        assert!(options.use_copy_unload);
        assert!(options.keep_original_column_name_case);
        assert!(!options.bind_variable_enabled);
        assert_eq!(options.expected_partition_size, 10 * 1024 * 1024);
        assert_eq!(options.case_policy(), CasePolicy::KeepCase);
        assert_eq!(options.stage_location.as_ref().unwrap().as_str(), "s3://bucket/stage/");
        assert_eq!(options.pre_actions.len(), 2);
    }

    #[test]
    fn proxy_keys_are_collected_opaquely() {
        let options = ScanOptions::from_pairs([
            ("proxyHost", "proxy.internal"),
            ("proxyPort", "8080"),
            ("nonProxyHosts", "localhost"),
        ])
        .unwrap();
        assert_eq!(options.network.len(), 3);
        assert_eq!(options.network["proxyHost"], "proxy.internal");
    }

    #[test]
    fn bad_values_are_config_errors() {
        let error = ScanOptions::from_pairs([("useCopyUnload", "yes")]).unwrap_err();
        assert!(matches!(
            error,
            Error::Config(ConfigError::InvalidValue { .. })
        ));

        let error = ScanOptions::from_pairs([("expectedPartitionSize", "lots")]).unwrap_err();
        assert!(matches!(
            error,
            Error::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn toml_round_trip() {
        let options = ScanOptions::from_toml(
            r#"
            useCopyUnload = true
            expectedPartitionSize = 1048576
            stageLocation = "s3://bucket/stage/"
            "#,
        )
        .unwrap();
        assert!(options.use_copy_unload);
        assert_eq!(options.expected_partition_size, 1024 * 1024);
        assert!(options.stage_location.is_some());
    }

    #[test]
    fn unload_without_stage_location_is_rejected() {
        let options = ScanOptions::default();
        assert!(matches!(
            options.stage_location(),
            Err(Error::Config(ConfigError::MissingStageLocation))
        ));
    }
}
