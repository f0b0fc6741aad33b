//! Configuration management for `chromemate`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI overrides
//! 2. Environment variables (`CHROMEMATE_*`)
//! 3. Config file (`--config`, else ~/.config/chromemate/config.yaml)
//! 4. Defaults
//!
//! Keys are normalized to lowercase kebab-case, so `store_file`,
//! `STORE_FILE` and `store-file` are the same key.

use crate::error::{ChromemateError, Result};
use crate::merge::{DEFAULT_STORE_FILE, MergeOptions};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CHROMEMATE_";

const KEY_STORE_FILE: &str = "store-file";
const KEY_LOCK_TIMEOUT: &str = "lock-timeout";
const KEY_WORK_DIR: &str = "work-dir";
const KEY_INTEGRITY_CHECK: &str = "integrity-check";

/// One source of configuration values, keyed by normalized name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub values: HashMap<String, String>,
}

impl ConfigLayer {
    /// Set a value, normalizing its key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize_key(key), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        Ok(layer_from_yaml_value(&value))
    }

    /// Build a layer from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    /// Build a layer from `CHROMEMATE_*` pairs; other variables are ignored.
    #[must_use]
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut layer = Self::default();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layer.set(stripped, value);
            }
        }
        layer
    }
}

/// CLI overrides for config loading (optional).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Explicit config file; not a layer value itself.
    pub config: Option<PathBuf>,
    pub store_file: Option<String>,
    pub lock_timeout: Option<u64>,
    pub work_dir: Option<PathBuf>,
    pub no_integrity_check: Option<bool>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();

        if let Some(store_file) = &self.store_file {
            layer.set(KEY_STORE_FILE, store_file.clone());
        }
        if let Some(lock_timeout) = self.lock_timeout {
            layer.set(KEY_LOCK_TIMEOUT, lock_timeout.to_string());
        }
        if let Some(work_dir) = &self.work_dir {
            layer.set(KEY_WORK_DIR, work_dir.to_string_lossy());
        }
        if self.no_integrity_check == Some(true) {
            layer.set(KEY_INTEGRITY_CHECK, "false");
        }

        layer
    }
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    layer.set(KEY_STORE_FILE, DEFAULT_STORE_FILE);
    layer.set(KEY_INTEGRITY_CHECK, "true");
    layer
}

/// Path of the user config file (~/.config/chromemate/config.yaml).
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    let home = env::var_os("HOME")?;
    Some(
        Path::new(&home)
            .join(".config")
            .join("chromemate")
            .join("config.yaml"),
    )
}

/// Load the config file layer.
///
/// An explicit path must exist; the user config is optional.
///
/// # Errors
///
/// Returns an error if an explicit file is missing, or a file cannot be read
/// or parsed.
pub fn load_file_config(explicit: Option<&Path>) -> Result<ConfigLayer> {
    match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(ChromemateError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            ConfigLayer::from_yaml(path)
        }
        None => user_config_path().map_or_else(|| Ok(ConfigLayer::default()), |path| {
            ConfigLayer::from_yaml(&path)
        }),
    }
}

/// Load configuration with the full precedence order.
///
/// # Errors
///
/// Returns an error if a config file cannot be read or parsed.
pub fn load_config(config_path: Option<&Path>, cli: &CliOverrides) -> Result<ConfigLayer> {
    let defaults = default_config_layer();
    let file = load_file_config(config_path)?;
    let env_layer = ConfigLayer::from_env();
    let cli_layer = cli.as_layer();

    Ok(ConfigLayer::merge_layers(&[defaults, file, env_layer, cli_layer]))
}

/// Load every layer and resolve engine options in one step.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or holds invalid values.
pub fn resolve_merge_options(cli: &CliOverrides) -> Result<MergeOptions> {
    let layer = load_config(cli.config.as_deref(), cli)?;
    let options = merge_options_from_layer(&layer)?;
    tracing::debug!(?options, "Resolved merge options");
    Ok(options)
}

/// Build engine options from a merged config layer.
///
/// # Errors
///
/// Returns a `Config` error for an empty store file name, a non-numeric
/// lock timeout, or an unrecognized boolean.
pub fn merge_options_from_layer(layer: &ConfigLayer) -> Result<MergeOptions> {
    let store_file = layer
        .get(KEY_STORE_FILE)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ChromemateError::Config(format!("{KEY_STORE_FILE} must not be empty")))?
        .to_string();

    let lock_timeout_ms = layer
        .get(KEY_LOCK_TIMEOUT)
        .map(|value| {
            value.trim().parse::<u64>().map_err(|_| {
                ChromemateError::Config(format!(
                    "{KEY_LOCK_TIMEOUT} must be a number of milliseconds, got '{value}'"
                ))
            })
        })
        .transpose()?;

    let integrity_check = match layer.get(KEY_INTEGRITY_CHECK) {
        Some(value) => parse_bool(value).ok_or_else(|| {
            ChromemateError::Config(format!(
                "{KEY_INTEGRITY_CHECK} must be true or false, got '{value}'"
            ))
        })?,
        None => true,
    };

    let work_dir = layer
        .get(KEY_WORK_DIR)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);

    Ok(MergeOptions {
        store_file,
        lock_timeout_ms,
        integrity_check,
        work_dir,
    })
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn layer_from_yaml_value(value: &serde_yaml::Value) -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    let mut flat = HashMap::new();
    flatten_yaml(value, "", &mut flat);

    for (key, value) in flat {
        layer.set(&key, value);
    }

    layer
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn normalize_key_handles_various_formats() {
        assert_eq!(normalize_key("STORE_FILE"), "store-file");
        assert_eq!(normalize_key("store-file"), "store-file");
        assert_eq!(normalize_key("  store_file  "), "store-file");
    }

    #[test]
    fn parse_bool_handles_truthy_and_falsy_values() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("No"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn defaults_produce_default_options() {
        let options = merge_options_from_layer(&default_config_layer()).unwrap();
        assert_eq!(options, MergeOptions::default());
    }

    #[test]
    fn env_layer_reads_only_prefixed_vars() {
        let layer = ConfigLayer::from_vars(vars(&[
            ("CHROMEMATE_STORE_FILE", "Archived History"),
            ("CHROMEMATE_LOCK_TIMEOUT", "2500"),
            ("HOME", "/home/someone"),
        ]));

        assert_eq!(layer.get("store-file"), Some("Archived History"));
        assert_eq!(layer.get("lock_timeout"), Some("2500"));
        assert_eq!(layer.get("home"), None);
    }

    #[test]
    fn precedence_cli_over_env_over_file_over_defaults() {
        let mut file = ConfigLayer::default();
        file.set("store_file", "FromFile");
        file.set("lock-timeout", "100");
        file.set("work-dir", "/tmp/from-file");

        let env_layer = ConfigLayer::from_vars(vars(&[("CHROMEMATE_LOCK_TIMEOUT", "200")]));

        let cli = CliOverrides {
            store_file: Some("FromCli".to_string()),
            no_integrity_check: Some(true),
            ..CliOverrides::default()
        };

        let merged =
            ConfigLayer::merge_layers(&[default_config_layer(), file, env_layer, cli.as_layer()]);
        let options = merge_options_from_layer(&merged).unwrap();

        assert_eq!(options.store_file, "FromCli");
        assert_eq!(options.lock_timeout_ms, Some(200));
        assert_eq!(options.work_dir, Some(PathBuf::from("/tmp/from-file")));
        assert!(!options.integrity_check);
    }

    #[test]
    fn cli_without_flag_keeps_integrity_check() {
        let cli = CliOverrides {
            no_integrity_check: Some(false),
            ..CliOverrides::default()
        };
        assert!(cli.as_layer().get("integrity-check").is_none());
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let mut layer = default_config_layer();
        layer.set("lock-timeout", "soon");
        let err = merge_options_from_layer(&layer).unwrap_err();
        assert!(matches!(err, ChromemateError::Config(_)));
        assert!(err.to_string().contains("lock-timeout"));

        let mut layer = default_config_layer();
        layer.set("integrity-check", "sometimes");
        assert!(merge_options_from_layer(&layer).is_err());

        let mut layer = default_config_layer();
        layer.set("store-file", "   ");
        assert!(merge_options_from_layer(&layer).is_err());
    }

    #[test]
    fn yaml_file_is_parsed_and_normalized() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("config.yaml");
        fs::write(
            &path,
            "store_file: Archived History\nlock-timeout: 750\nintegrity-check: false\n",
        )
        .expect("write config");

        let layer = load_file_config(Some(&path)).expect("file config");
        let options = merge_options_from_layer(&ConfigLayer::merge_layers(&[
            default_config_layer(),
            layer,
        ]))
        .unwrap();

        assert_eq!(options.store_file, "Archived History");
        assert_eq!(options.lock_timeout_ms, Some(750));
        assert!(!options.integrity_check);
    }

    #[test]
    fn explicit_missing_config_is_error() {
        let temp = TempDir::new().expect("tempdir");
        let err = load_file_config(Some(&temp.path().join("nope.yaml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn malformed_yaml_is_yaml_error() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("config.yaml");
        fs::write(&path, "store-file: [unclosed\n").expect("write config");

        let err = ConfigLayer::from_yaml(&path).unwrap_err();
        assert!(matches!(err, ChromemateError::Yaml(_)));
    }
}
