//! # zdefer-config
//!
//! Configuration management for the zdefer deflate shim.
//!
//! Loads configuration from:
//! 1. `~/.zdefer/config.toml` (global)
//! 2. the file named by `ZDEFER_CONFIG` (overrides global, key by key)
//! 3. Environment variables (highest priority)

pub mod logging;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load()));

/// Get global config (read-only)
pub fn config() -> std::sync::RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(PoisonError::into_inner)
}

/// Reload config from disk and environment
pub fn reload() {
    let new_config = Config::load();
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = new_config;
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid effort spec {spec:?}: {reason}")]
    Effort { spec: String, reason: &'static str },
}

pub const ENV_CONFIG: &str = "ZDEFER_CONFIG";
pub const ENV_DISABLE: &str = "ZDEFER_DISABLE";
pub const ENV_INITIAL_CAPACITY: &str = "ZDEFER_INITIAL_CAPACITY";
pub const ENV_EFFORT: &str = "ZDEFER_EFFORT";
pub const ENV_LOG: &str = "ZDEFER_LOG";
pub const ENV_LOG_COLOR: &str = "ZDEFER_LOG_COLOR";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub shim: ShimConfig,
    pub effort: EffortConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Self {
        let mut sources = Vec::new();
        if let Some(global_path) = Self::global_config_path() {
            sources.push(global_path);
        }
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            sources.push(PathBuf::from(path));
        }
        Self::load_from(&sources, |key| std::env::var(key).ok())
    }

    /// Layer the given files (later files win, key by key), then apply
    /// overrides read through `lookup`. Missing files are skipped, and so
    /// are files that cannot be read or do not describe a valid config;
    /// environment overrides apply regardless.
    pub fn load_from<F>(sources: &[PathBuf], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut table = toml::Table::new();
        for path in sources {
            if !path.exists() {
                continue;
            }
            debug!("Loading config from {:?}", path);
            match layer(&table, path) {
                Ok(merged) => table = merged,
                Err(err) => warn!(path = %path.display(), error = %err, "skipping config file"),
            }
        }

        let mut config = from_table(table).unwrap_or_else(|err| {
            warn!(error = %err, "falling back to default zdefer config");
            Config::default()
        });
        config.apply_env_overrides(lookup);
        config
    }

    /// Global config path: ~/.zdefer/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".zdefer/config.toml"))
    }

    /// Apply environment variable overrides. Unparseable values are logged
    /// and ignored so a typo never takes the host process down.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(flag) = lookup(ENV_DISABLE) {
            self.shim.enabled = !matches!(flag.trim(), "1" | "true" | "yes" | "on");
        }
        if let Some(capacity) = lookup(ENV_INITIAL_CAPACITY) {
            match capacity.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.shim.initial_capacity = n,
                _ => warn!(value = %capacity, "ignoring invalid {}", ENV_INITIAL_CAPACITY),
            }
        }
        if let Some(spec) = lookup(ENV_EFFORT) {
            match EffortConfig::parse(&spec) {
                Ok(effort) => self.effort = effort,
                Err(err) => warn!(error = %err, "ignoring {}", ENV_EFFORT),
            }
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.log.level = Some(level);
        }
        if let Some(color) = lookup(ENV_LOG_COLOR) {
            self.log.color = Some(color);
        }
    }
}

fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents.parse::<toml::Table>()?)
}

fn from_table(table: toml::Table) -> Result<Config, ConfigError> {
    Ok(toml::Value::Table(table).try_into()?)
}

/// `base` with the file at `path` overlaid, provided the result still
/// deserializes.
fn layer(base: &toml::Table, path: &Path) -> Result<toml::Table, ConfigError> {
    let mut merged = base.clone();
    merge_tables(&mut merged, read_table(path)?);
    from_table(merged.clone())?;
    Ok(merged)
}

/// Recursively overlay `other` onto `base`. Nested tables merge; any other
/// value replaces.
pub fn merge_tables(base: &mut toml::Table, other: toml::Table) {
    for (key, value) in other {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Shim attachment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Attach a shim on stream initialization. When false every entry
    /// point passes straight through to zlib.
    pub enabled: bool,
    /// Initial input buffer capacity in bytes; doubles on overflow
    pub initial_capacity: usize,
}

pub const DEFAULT_INITIAL_CAPACITY: usize = 16 << 20;

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

/// One row of the effort table: inputs shorter than `below` bytes get
/// `iterations` passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffortStepConfig {
    pub below: usize,
    pub iterations: i32,
}

/// Effort selection for the deferred compression pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffortConfig {
    pub steps: Vec<EffortStepConfig>,
    /// Iterations for inputs past the last step
    pub fallback_iterations: i32,
}

impl Default for EffortConfig {
    fn default() -> Self {
        Self {
            steps: vec![
                EffortStepConfig {
                    below: 8 << 10,
                    iterations: 1000,
                },
                EffortStepConfig {
                    below: 64 << 10,
                    iterations: 100,
                },
            ],
            fallback_iterations: 15,
        }
    }
}

impl EffortConfig {
    /// Parse `"8192:1000,65536:100,15"`: `below:iterations` steps followed
    /// by a single trailing fallback iteration count.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::Effort {
            spec: spec.to_string(),
            reason,
        };

        let mut parts: Vec<&str> = spec.split(',').map(str::trim).collect();
        let fallback = parts.pop().filter(|p| !p.is_empty()).ok_or(invalid("empty"))?;
        let fallback_iterations = fallback
            .parse::<i32>()
            .map_err(|_| invalid("trailing fallback must be an iteration count"))?;

        let mut steps = Vec::with_capacity(parts.len());
        for part in parts {
            let (below, iterations) = part
                .split_once(':')
                .ok_or(invalid("steps must be below:iterations"))?;
            steps.push(EffortStepConfig {
                below: below
                    .trim()
                    .parse()
                    .map_err(|_| invalid("bad step threshold"))?,
                iterations: iterations
                    .trim()
                    .parse()
                    .map_err(|_| invalid("bad step iteration count"))?,
            });
        }

        Ok(Self {
            steps,
            fallback_iterations,
        })
    }
}

/// Diagnostic output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive; `None` picks a build-dependent default
    pub level: Option<String>,
    /// ANSI SGR code (e.g. `"33"` or `"1;31"`) to highlight diagnostic lines
    pub color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.shim.enabled);
        assert_eq!(config.shim.initial_capacity, 16 * 1024 * 1024);
        assert_eq!(config.effort.steps.len(), 2);
        assert_eq!(config.effort.fallback_iterations, 15);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_parse_effort_spec() {
        let effort = EffortConfig::parse("4096:500, 1048576:20, 5").unwrap();
        assert_eq!(
            effort.steps,
            vec![
                EffortStepConfig {
                    below: 4096,
                    iterations: 500
                },
                EffortStepConfig {
                    below: 1048576,
                    iterations: 20
                },
            ]
        );
        assert_eq!(effort.fallback_iterations, 5);

        let flat = EffortConfig::parse("42").unwrap();
        assert!(flat.steps.is_empty());
        assert_eq!(flat.fallback_iterations, 42);
    }

    #[test]
    fn test_parse_effort_spec_rejects_garbage() {
        assert!(EffortConfig::parse("").is_err());
        assert!(EffortConfig::parse("100:5").is_err());
        assert!(EffortConfig::parse("abc:5,10").is_err());
        assert!(EffortConfig::parse("100,10").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            (ENV_DISABLE, "1"),
            (ENV_INITIAL_CAPACITY, "4096"),
            (ENV_EFFORT, "10:7,3"),
            (ENV_LOG, "trace"),
            (ENV_LOG_COLOR, "1;33"),
        ]));
        assert!(!config.shim.enabled);
        assert_eq!(config.shim.initial_capacity, 4096);
        assert_eq!(config.effort.fallback_iterations, 3);
        assert_eq!(config.log.level.as_deref(), Some("trace"));
        assert_eq!(config.log.color.as_deref(), Some("1;33"));
    }

    #[test]
    fn test_invalid_env_overrides_are_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            (ENV_INITIAL_CAPACITY, "lots"),
            (ENV_EFFORT, "fast"),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_merge_tables_nested() {
        let mut base: toml::Table = toml::from_str(
            r#"
[shim]
enabled = true
initial_capacity = 100
"#,
        )
        .unwrap();
        let overlay: toml::Table = toml::from_str(
            r#"
[shim]
initial_capacity = 200
"#,
        )
        .unwrap();
        merge_tables(&mut base, overlay);
        let shim = base["shim"].as_table().unwrap();
        assert_eq!(shim["enabled"].as_bool(), Some(true));
        assert_eq!(shim["initial_capacity"].as_integer(), Some(200));
    }
}
