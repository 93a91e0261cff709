use blockpress_engine::{Limits, MAX_CALL_DEPTH, RenderOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config file at {config_path}: {reason}")]
    ConfigInvalid {
        config_path: PathBuf,
        reason: &'static str,
    },
}

/// `[render]`: how articles are turned into markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub allow_execution: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<String>,
    pub auto_run_markup_snippets: bool,
    pub highlight: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let options = RenderOptions::default();
        Self {
            allow_execution: options.allow_execution,
            max_width: options.max_width,
            auto_run_markup_snippets: options.auto_run_markup_snippets,
            highlight: options.highlight,
        }
    }
}

/// `[limits]`: bounds on every script evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_steps: u64,
    pub max_call_depth: usize,
    pub timeout_ms: u64,
    pub max_log_entries: usize,
    pub max_alloc_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_steps: limits.max_steps,
            max_call_depth: limits.max_call_depth,
            timeout_ms: u64::try_from(limits.timeout.as_millis()).unwrap_or(u64::MAX),
            max_log_entries: limits.max_log_entries,
            max_alloc_bytes: limits.max_alloc_bytes,
        }
    }
}

impl From<&LimitsConfig> for Limits {
    fn from(config: &LimitsConfig) -> Self {
        Limits {
            max_steps: config.max_steps,
            max_call_depth: config.max_call_depth,
            timeout: Duration::from_millis(config.timeout_ms),
            max_log_entries: config.max_log_entries,
            max_alloc_bytes: config.max_alloc_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    pub limits: LimitsConfig,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        config
            .validate()
            .map_err(|reason| ConfigError::ConfigInvalid {
                config_path: config_path.to_path_buf(),
                reason,
            })?;

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/blockpress");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Expand `~` and environment variables in a user-supplied path.
    pub fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }

    /// The engine options this configuration describes.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            allow_execution: self.render.allow_execution,
            max_width: self.render.max_width.clone(),
            auto_run_markup_snippets: self.render.auto_run_markup_snippets,
            highlight: self.render.highlight,
            limits: Limits::from(&self.limits),
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.limits.max_steps == 0 {
            return Err("limits.max_steps must be positive");
        }
        if self.limits.max_call_depth == 0 {
            return Err("limits.max_call_depth must be positive");
        }
        if self.limits.max_call_depth > MAX_CALL_DEPTH {
            return Err("limits.max_call_depth must be at most 1024");
        }
        if self.limits.timeout_ms == 0 {
            return Err("limits.timeout_ms must be positive");
        }
        if self.limits.max_alloc_bytes == 0 {
            return Err("limits.max_alloc_bytes must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/blockpress/config.toml"));
    }

    #[test]
    fn test_defaults_match_the_engine() {
        let options = Config::default().render_options();
        assert_eq!(options, RenderOptions::default());
        assert!(!options.allow_execution);
        assert!(!options.auto_run_markup_snippets);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[render]
allow_execution = true
max_width = "720px"

[limits]
timeout_ms = 250
"#,
        )
        .unwrap();

        let options = config.render_options();
        assert!(options.allow_execution);
        assert!(options.highlight);
        assert_eq!(options.max_width.as_deref(), Some("720px"));
        assert_eq!(options.limits.timeout, Duration::from_millis(250));
        assert_eq!(options.limits.max_steps, Limits::default().max_steps);
    }

    #[test]
    fn test_empty_file_is_the_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = Config::expand_path(Path::new("~/articles/a.json")).unwrap();
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("articles/a.json"));
    }

    #[test]
    fn test_expand_path_with_env_var() {
        unsafe {
            env::set_var("BLOCKPRESS_TEST_DIR", "/test/env/path");
        }

        let expanded = Config::expand_path(Path::new("$BLOCKPRESS_TEST_DIR/doc.json")).unwrap();
        assert_eq!(expanded, PathBuf::from("/test/env/path/doc.json"));

        unsafe {
            env::remove_var("BLOCKPRESS_TEST_DIR");
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested/config.toml");
        let mut config = Config::default();
        config.render.allow_execution = true;
        config.render.max_width = Some("48rem".to_string());
        config.limits.max_call_depth = 32;

        config.save_to_path(&config_file).unwrap();
        let loaded = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[render\nallow_execution = yes").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[limits]\ntimeout_ms = 0\n").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::ConfigInvalid {
                reason: "limits.timeout_ms must be positive",
                ..
            }
        ));
    }

    #[test]
    fn test_call_depth_above_the_stack_budget_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[limits]\nmax_call_depth = 100000\n").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::ConfigInvalid {
                reason: "limits.max_call_depth must be at most 1024",
                ..
            }
        ));
    }

    #[test]
    fn test_call_depth_at_the_cap_is_accepted() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_file,
            "[limits]\nmax_call_depth = 1024\nmax_alloc_bytes = 1048576\n",
        )
        .unwrap();

        let options = Config::load_from_path(&config_file).unwrap().unwrap().render_options();

        assert_eq!(options.limits.max_call_depth, MAX_CALL_DEPTH);
        assert_eq!(options.limits.max_alloc_bytes, 1 << 20);
    }
}
