//! Profiler configuration.
//!
//! Describes how the profiling agent is started and how long its dump files
//! are kept. The agent runs in loop mode and writes one dump per loop, so the
//! file name should contain a timestamp (`%t`); otherwise every loop
//! overwrites the previous dump.
//!
//! # Example
//!
//! ```toml
//! [profiler]
//! enabled = true
//! event = "wall,alloc"
//! loop = "5m"
//! interval = "100ms"
//! file = "persistent-volume/%t-${HOSTNAME}.jfr"
//! max_dump_age = "24h"
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::retention::RetentionPolicy;

/// Profiling agent and dump retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilerConfig {
    /// Whether profiling (and dump cleanup) is enabled.
    /// Default: false
    #[serde(default)]
    pub enabled: bool,

    /// Profiling events, e.g. `cpu`, `alloc`, `lock`, `wall`.
    /// Default: "wall,alloc"
    #[serde(default = "default_event")]
    pub event: String,

    /// Loop duration in the agent's own format (`30s`, `5m`, `1h`, or a clock
    /// time `hh:mm:ss`). Passed through verbatim.
    /// Default: "5m"
    #[serde(rename = "loop", default = "default_loop")]
    pub loop_duration: String,

    /// Dump file name pattern. `%p` expands to the PID, `%t` to the timestamp,
    /// `%n{MAX}` to a sequence number and `%{ENV}` to an environment variable.
    /// The extension (`.jfr`) selects which files the cleanup removes.
    /// Default: "%t.jfr"
    #[serde(default = "default_file")]
    pub file: String,

    /// How long dump files are kept, e.g. "24h", "30m", "7d".
    /// Default: 24 hours
    #[serde(default = "default_max_dump_age", with = "duration_string")]
    pub max_dump_age: Duration,

    /// Sampling interval in the agent's format (`100ms`, `10us`, `1s`, or nanoseconds).
    /// Default: "100ms"
    #[serde(default = "default_interval")]
    pub interval: String,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            event: default_event(),
            loop_duration: default_loop(),
            file: default_file(),
            max_dump_age: default_max_dump_age(),
            interval: default_interval(),
        }
    }
}

fn default_event() -> String {
    "wall,alloc".to_string()
}

fn default_loop() -> String {
    "5m".to_string()
}

fn default_file() -> String {
    "%t.jfr".to_string()
}

fn default_max_dump_age() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_interval() -> String {
    "100ms".to_string()
}

impl ProfilerConfig {
    /// Directory that receives the dumps: the parent of `file`, if any.
    pub fn dump_parent(&self) -> Option<&Path> {
        Path::new(&self.file)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Directory swept by the cleanup; `.` when `file` has no directory part.
    pub fn dump_directory(&self) -> PathBuf {
        self.dump_parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// File-name ending used to recognize dumps: the last `.` of the file name and what follows.
    pub fn dump_suffix(&self) -> Result<String, ConfigError> {
        let file_name = Path::new(&self.file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();

        match file_name.rfind('.') {
            Some(pos) if pos + 1 < file_name.len() => Ok(file_name[pos..].to_string()),
            _ => Err(ConfigError::Validation(format!(
                "profiler.file must use an extension, for example '%t.jfr', but is '{}'",
                self.file
            ))),
        }
    }

    /// The retention policy this configuration implies.
    pub fn retention_policy(&self) -> Result<RetentionPolicy, ConfigError> {
        let suffix = self.dump_suffix()?;
        RetentionPolicy::new(self.dump_directory(), suffix, self.max_dump_age)
            .map_err(|e| ConfigError::Validation(format!("profiler.file: {e}")))
    }

    /// Command string for the profiling agent.
    pub fn agent_command(&self) -> String {
        format!(
            "start,event={},loop={},interval={},file={}",
            self.event, self.loop_duration, self.interval, self.file
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.event.trim().is_empty() {
            return Err(ConfigError::Validation(
                "profiler.event must not be empty".into(),
            ));
        }
        self.retention_policy().map(|_| ())
    }
}

/// Parse a duration such as `90s`, `30m`, `24h`, `7d` or `500ms`.
/// A bare number is taken as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);

    if digits.is_empty() {
        return Err(format!("invalid duration '{input}': expected a number"));
    }
    let value: u64 = digits
        .parse()
        .map_err(|e| format!("invalid duration '{input}': {e}"))?;

    let (multiplier, millis) = match unit.trim() {
        "" | "s" => (1, false),
        "ms" => (1, true),
        "m" => (60, false),
        "h" => (3_600, false),
        "d" => (86_400, false),
        other => {
            return Err(format!(
                "invalid duration '{input}': unknown unit '{other}' (use ms, s, m, h or d)"
            ));
        }
    };

    let scaled = value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("invalid duration '{input}': value too large"))?;

    Ok(if millis {
        Duration::from_millis(scaled)
    } else {
        Duration::from_secs(scaled)
    })
}

/// Render a duration in the largest unit that represents it exactly.
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() != 0 {
        return format!("{}ms", duration.as_millis());
    }
    let secs = duration.as_secs();
    match secs {
        0 => "0s".to_string(),
        s if s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}

/// Serde adapter accepting `"24h"`-style strings or integer seconds.
mod duration_string {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => super::parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProfilerConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.event, "wall,alloc");
        assert_eq!(config.loop_duration, "5m");
        assert_eq!(config.file, "%t.jfr");
        assert_eq!(config.max_dump_age, Duration::from_secs(86_400));
        assert_eq!(config.interval, "100ms");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            enabled = true
            event = "cpu"
            loop = "10m"
            interval = "1ms"
            file = "dumps/%t-%p.jfr"
            max_dump_age = "30m"
        "#;
        let config: ProfilerConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert_eq!(config.event, "cpu");
        assert_eq!(config.loop_duration, "10m");
        assert_eq!(config.interval, "1ms");
        assert_eq!(config.file, "dumps/%t-%p.jfr");
        assert_eq!(config.max_dump_age, Duration::from_secs(1800));
    }

    #[test]
    fn test_max_dump_age_as_seconds() {
        let config: ProfilerConfig = toml::from_str("max_dump_age = 7200").unwrap();
        assert_eq!(config.max_dump_age, Duration::from_secs(7200));
    }

    #[test]
    fn test_invalid_max_dump_age_rejected() {
        let err = toml::from_str::<ProfilerConfig>(r#"max_dump_age = "3 weeks""#).unwrap_err();
        assert!(err.to_string().contains("unknown unit"), "{err}");
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<ProfilerConfig>("max_age = \"1h\"").is_err());
    }

    #[rstest]
    #[case("90", Duration::from_secs(90))]
    #[case("90s", Duration::from_secs(90))]
    #[case("500ms", Duration::from_millis(500))]
    #[case("30m", Duration::from_secs(1800))]
    #[case("24h", Duration::from_secs(86_400))]
    #[case("7d", Duration::from_secs(7 * 86_400))]
    #[case(" 2h ", Duration::from_secs(7200))]
    fn test_parse_duration(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("h")]
    #[case("-1h")]
    #[case("1w")]
    #[case("99999999999999999999d")]
    fn test_parse_duration_errors(#[case] input: &str) {
        assert!(parse_duration(input).is_err());
    }

    #[rstest]
    #[case(Duration::from_secs(86_400), "1d")]
    #[case(Duration::from_secs(7200), "2h")]
    #[case(Duration::from_secs(1800), "30m")]
    #[case(Duration::from_secs(45), "45s")]
    #[case(Duration::from_millis(1500), "1500ms")]
    #[case(Duration::ZERO, "0s")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(duration), expected);
    }

    #[rstest]
    #[case("%t.jfr", ".jfr")]
    #[case("persistent-volume/%t-app.jfr", ".jfr")]
    #[case("dumps.d/%t.html", ".html")]
    #[case("%t.collapsed.txt", ".txt")]
    fn test_dump_suffix(#[case] file: &str, #[case] expected: &str) {
        let config = ProfilerConfig {
            file: file.to_string(),
            ..Default::default()
        };
        assert_eq!(config.dump_suffix().unwrap(), expected);
    }

    #[rstest]
    #[case("%t")]
    #[case("dumps.d/%t")]
    #[case("%t.")]
    fn test_dump_suffix_requires_extension(#[case] file: &str) {
        let config = ProfilerConfig {
            file: file.to_string(),
            ..Default::default()
        };
        let err = config.dump_suffix().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'%t.jfr'"), "should show an example: {msg}");
        assert!(msg.contains(file), "should show the configured file: {msg}");
    }

    #[test]
    fn test_dump_directory() {
        let mut config = ProfilerConfig::default();
        assert_eq!(config.dump_directory(), PathBuf::from("."));
        assert!(config.dump_parent().is_none());

        config.file = "/var/lib/app/profiles/%t.jfr".into();
        assert_eq!(config.dump_directory(), PathBuf::from("/var/lib/app/profiles"));
    }

    #[test]
    fn test_retention_policy() {
        let config = ProfilerConfig {
            file: "persistent-volume/%t.jfr".into(),
            max_dump_age: Duration::from_secs(3600),
            ..Default::default()
        };
        let policy = config.retention_policy().unwrap();
        assert_eq!(policy.directory(), Path::new("persistent-volume"));
        assert_eq!(policy.suffix(), ".jfr");
        assert_eq!(policy.max_age(), Duration::from_secs(3600));
        assert_eq!(
            policy.describe(),
            "rm persistent-volume/*.jfr -mtime 0d1h0m every 60 minutes"
        );
    }

    #[test]
    fn test_agent_command() {
        let config = ProfilerConfig {
            file: "out/%t.jfr".into(),
            ..Default::default()
        };
        assert_eq!(
            config.agent_command(),
            "start,event=wall,alloc,loop=5m,interval=100ms,file=out/%t.jfr"
        );
    }

    #[test]
    fn test_validate_skips_disabled_profiler() {
        let config = ProfilerConfig {
            enabled: false,
            file: "no-extension".into(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = ProfilerConfig {
            enabled: true,
            ..config
        };
        assert!(config.validate().is_err());
    }
}
