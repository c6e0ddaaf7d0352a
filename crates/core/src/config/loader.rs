//! Configuration loader
//!
//! ## Loading Strategy
//! 1. `REPOCACHE_CONFIG` names a file explicitly
//! 2. Otherwise the standard locations are probed
//! 3. With no file at all, defaults are used
//! 4. `REPOCACHE_REFRESH_WORKERS` and `REPOCACHE_REFRESH_RETRY_MS` override
//!    the refresh settings last
//!
//! JSON and TOML are supported, detected by file extension.

use std::path::{Path, PathBuf};
use std::time::Duration;

use repocache_common::error::{CommonError, CommonResult};

use super::CacheManagerConfig;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "REPOCACHE_CONFIG";
const WORKERS_ENV: &str = "REPOCACHE_REFRESH_WORKERS";
const RETRY_MS_ENV: &str = "REPOCACHE_REFRESH_RETRY_MS";

/// Load configuration from the environment and the standard file locations
///
/// # Errors
/// Returns `CommonError::Config` when a named or discovered file cannot be
/// read or parsed, or when the result fails validation.
pub fn load() -> CommonResult<CacheManagerConfig> {
    let explicit = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    let mut config = match explicit.or_else(probe_config_paths) {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::info!("No cache configuration file found, using defaults");
            CacheManagerConfig::default()
        }
    };
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `CommonError::Config` if the file is missing, has an unsupported
/// extension, or does not parse, and the validation error if the parsed
/// configuration is invalid.
pub fn load_from_file(path: Option<PathBuf>) -> CommonResult<CacheManagerConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CommonError::config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CommonError::config("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading cache configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CommonError::persistence_op("read config", e.to_string()))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> CommonResult<CacheManagerConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CommonError::config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CommonError::config(format!("Invalid JSON format: {}", e))),
        _ => Err(CommonError::config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard locations for a configuration file
///
/// Searches `./repocache.{toml,json}` and `./config/repocache.{toml,json}`
/// in the working directory, then next to the executable.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] =
        ["repocache.toml", "repocache.json", "config/repocache.toml", "config/repocache.json"];

    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn apply_env_overrides(config: &mut CacheManagerConfig) -> CommonResult<()> {
    if let Ok(raw) = std::env::var(WORKERS_ENV) {
        config.refresh.worker_threads = raw.parse().map_err(|e| {
            CommonError::config_field(WORKERS_ENV, format!("invalid worker count '{raw}': {e}"))
        })?;
    }
    if let Ok(raw) = std::env::var(RETRY_MS_ENV) {
        let millis: u64 = raw.parse().map_err(|e| {
            CommonError::config_field(RETRY_MS_ENV, format!("invalid retry delay '{raw}': {e}"))
        })?;
        config.refresh.retry_delay = Duration::from_millis(millis);
    }
    Ok(())
}
