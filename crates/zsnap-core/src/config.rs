use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backend::zfs::DEFAULT_COMMAND;
use crate::error::ErrorCode;
use crate::run::FailurePolicy;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ZSNAP_CONFIG";
/// Environment variable overriding `backend.command`.
pub const COMMAND_ENV: &str = "ZSNAP_ZFS_COMMAND";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_command")]
    pub command: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub on_error: FailurePolicy,
    #[serde(default)]
    pub simulate: bool,
}

/// `<config dir>/zsnap/config.toml`, when the platform has a config dir.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("zsnap/config.toml"))
}

/// Read and parse one config file.
///
/// # Errors
///
/// Fails when the file cannot be read or is not valid zsnap TOML.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<Config>(&content).with_context(|| {
        format!(
            "{}: failed to parse {}",
            ErrorCode::ConfigParseError.code(),
            path.display()
        )
    })
}

/// Resolve configuration from the process environment.
///
/// # Errors
///
/// See [`load_config_with`].
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    load_config_with(explicit, |key| std::env::var(key).ok())
}

/// Resolve configuration: `explicit`, else `$ZSNAP_CONFIG`, else the default
/// path. An explicit or environment-given file must exist; a missing default
/// file yields defaults. `$ZSNAP_ZFS_COMMAND` is applied last.
///
/// # Errors
///
/// Fails when a named file is missing or any file does not parse.
pub fn load_config_with(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| env(CONFIG_ENV).filter(|v| !v.is_empty()).map(PathBuf::from));

    let mut config = match named {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            load_config_file(&path)?
        }
        None => match default_config_path() {
            Some(path) if path.exists() => load_config_file(&path)?,
            _ => Config::default(),
        },
    };

    apply_env_overrides(&mut config, env);
    Ok(config)
}

pub fn apply_env_overrides(config: &mut Config, env: impl Fn(&str) -> Option<String>) {
    if let Some(command) = env(COMMAND_ENV).filter(|v| !v.trim().is_empty()) {
        config.backend.command = PathBuf::from(command);
    }
}

fn default_command() -> PathBuf {
    PathBuf::from(DEFAULT_COMMAND)
}
