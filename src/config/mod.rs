//! Configuration for dumpsweep.
//!
//! Configured via a TOML file, with support for environment variable
//! interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [profiler]
//! enabled = true
//! file = "persistent-volume/%t-${HOSTNAME}.jfr"
//! max_dump_age = "24h"
//!
//! [observability.logging]
//! level = "info"
//! format = "json"
//! ```

mod observability;
mod profiler;

use std::{path::Path, sync::LazyLock};

pub use observability::*;
pub use profiler::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Root configuration.
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DumpsweepConfig {
    /// Profiling agent and dump retention.
    #[serde(default)]
    pub profiler: ProfilerConfig,

    /// Observability configuration (logging, metrics).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl DumpsweepConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: DumpsweepConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.profiler.validate()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables after a `#` on the same line are left untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in ENV_VAR.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);

            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

/// Default configuration written by `dumpsweep init`.
pub fn default_config_toml() -> &'static str {
    r#"# dumpsweep configuration

[profiler]
# Set to true to start profiling and dump cleanup
enabled = false
event = "wall,alloc"
loop = "5m"
interval = "100ms"
# Include %t so each loop writes a new file; the extension selects what is cleaned up
file = "profiles/%t.jfr"
# Dumps older than this are deleted (hourly sweeps; below 1h, sweeps run every minute)
max_dump_age = "24h"

[observability.logging]
level = "info"
format = "compact"

[observability.metrics]
enabled = false
listen = "0.0.0.0:9464"
"#
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_empty_config() {
        let config = DumpsweepConfig::from_str("").unwrap();
        assert!(!config.profiler.enabled);
        assert_eq!(config.profiler.file, "%t.jfr");
    }

    #[test]
    fn test_default_config_toml_parses() {
        let config = DumpsweepConfig::from_str(default_config_toml()).unwrap();
        assert_eq!(config.profiler.file, "profiles/%t.jfr");
        assert_eq!(config.profiler.max_dump_age, Duration::from_secs(86_400));
        assert_eq!(
            config.profiler.retention_policy().unwrap().describe(),
            "rm profiles/*.jfr -mtime 1d0h0m every 60 minutes"
        );
    }

    #[test]
    fn test_enabled_profiler_without_extension_fails() {
        let err = DumpsweepConfig::from_str(
            r#"
            [profiler]
            enabled = true
            file = "profiles/%t"
        "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("profiles/%t"), "{err}");
    }

    #[test]
    fn test_unknown_section_rejected() {
        let err = DumpsweepConfig::from_str("[server]\nport = 8080").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");
        let err = DumpsweepConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, p) if p == path));
    }

    #[test]
    fn test_from_file_with_env_var() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dumpsweep.toml");
        std::fs::write(
            &path,
            "[profiler]\nenabled = true\nfile = \"${DUMPSWEEP_TEST_DIR}/%t.jfr\"\n",
        )
        .unwrap();

        temp_env::with_var("DUMPSWEEP_TEST_DIR", Some("/data/profiles"), || {
            let config = DumpsweepConfig::from_file(&path).unwrap();
            assert_eq!(config.profiler.file, "/data/profiles/%t.jfr");
            assert_eq!(
                config.profiler.dump_directory(),
                std::path::PathBuf::from("/data/profiles")
            );
        });
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("TEST_HOSTNAME", Some("pod-1"), || {
            let result = expand_env_vars("file = \"%t-${TEST_HOSTNAME}.jfr\"").unwrap();
            assert_eq!(result, "file = \"%t-pod-1.jfr\"");
        });
    }

    #[test]
    fn test_missing_env_var() {
        temp_env::with_var_unset("DUMPSWEEP_UNSET_VAR", || {
            let err = expand_env_vars("file = \"${DUMPSWEEP_UNSET_VAR}.jfr\"").unwrap_err();
            assert!(matches!(err, ConfigError::EnvVarNotFound(v) if v == "DUMPSWEEP_UNSET_VAR"));
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# file = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# file = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        let result = expand_env_vars("key = \"value\" # ${NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "key = \"value\" # ${NONEXISTENT_VAR}");
    }

    #[test]
    fn test_multiline_with_comments() {
        temp_env::with_var("TEST_MULTI", Some("value1"), || {
            let input = r#"key1 = "${TEST_MULTI}"
# key2 = "${NONEXISTENT}"
key3 = "literal""#;
            let result = expand_env_vars(input).unwrap();
            assert_eq!(
                result,
                r#"key1 = "value1"
# key2 = "${NONEXISTENT}"
key3 = "literal""#
            );
        });
    }
}
