//! Configuration loading for the detector engine
//!
//! Reads `hunter.toml`: which detectors run, how their findings are ranked,
//! and which extra sink names the built-in registry should know about.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::rules::{Confidence, Severity};

pub const CONFIG_FILENAME: &str = "hunter.toml";

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &["rules", "sinks"];
const KNOWN_RULES_KEYS: &[&str] = &["disabled", "severity", "min_confidence"];
const KNOWN_SINKS_KEYS: &[&str] = &["eval_aliases", "dangerous_methods", "interpreters"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML in '{path}': {message}")]
    ParseError { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigResult {
    pub config: Config,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub rules: RulesConfig,
    pub sinks: SinksConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule ids (`IH001`) or detector names (`InjectionRisk.AddType`).
    pub disabled: Vec<String>,
    pub severity: HashMap<String, SeverityValue>,
    pub min_confidence: Option<ConfidenceValue>,
}

/// Site-specific sink names appended to the built-in registry.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SinksConfig {
    /// Wrappers that behave like `Invoke-Expression`.
    pub eval_aliases: Vec<String>,
    /// Methods that take script text as their first argument.
    pub dangerous_methods: Vec<String>,
    /// Executables that interpret their command line as script.
    pub interpreters: Vec<String>,
}

impl SinksConfig {
    pub fn is_empty(&self) -> bool {
        self.eval_aliases.is_empty()
            && self.dangerous_methods.is_empty()
            && self.interpreters.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SeverityValue {
    Error,
    Warning,
    Info,
    Hint,
}

impl From<SeverityValue> for Severity {
    fn from(value: SeverityValue) -> Self {
        match value {
            SeverityValue::Error => Severity::Error,
            SeverityValue::Warning => Severity::Warning,
            SeverityValue::Info => Severity::Info,
            SeverityValue::Hint => Severity::Hint,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceValue {
    High,
    Medium,
    Low,
}

impl From<ConfidenceValue> for Confidence {
    fn from(value: ConfidenceValue) -> Self {
        match value {
            ConfidenceValue::High => Confidence::High,
            ConfidenceValue::Medium => Confidence::Medium,
            ConfidenceValue::Low => Confidence::Low,
        }
    }
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

fn read_config(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;

    Ok((config, content))
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    read_config(path).map(|(config, _)| config)
}

pub fn load_config_with_warnings(path: &Path) -> Result<ConfigResult, ConfigError> {
    let (config, content) = read_config(path)?;
    let warnings = detect_unknown_keys(&content);

    Ok(ConfigResult { config, warnings })
}

fn detect_unknown_keys(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    let table: toml::Table = match content.parse() {
        Ok(t) => t,
        Err(_) => return warnings,
    };

    let known_top: HashSet<&str> = KNOWN_TOP_LEVEL_KEYS.iter().copied().collect();
    for key in table.keys() {
        if !known_top.contains(key.as_str()) {
            warnings.push(format!("Unknown config option: '{}'", key));
        }
    }

    for (section, known) in [("rules", KNOWN_RULES_KEYS), ("sinks", KNOWN_SINKS_KEYS)] {
        if let Some(toml::Value::Table(entries)) = table.get(section) {
            for key in entries.keys() {
                if !known.contains(&key.as_str()) {
                    warnings.push(format!("Unknown config option in [{}]: '{}'", section, key));
                }
            }
        }
    }

    warnings
}

pub fn load_config_or_default(start_dir: &Path) -> Config {
    find_config_file(start_dir)
        .and_then(|path| load_config(&path).ok())
        .unwrap_or_default()
}

pub fn load_config_or_default_with_warnings(start_dir: &Path) -> ConfigResult {
    match find_config_file(start_dir) {
        Some(path) => load_config_with_warnings(&path).unwrap_or_default(),
        None => ConfigResult::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    #[test]
    fn load_config_from_file() {
        let dir = create_temp_dir();
        let config_path = write_config(
            &dir,
            r#"
[rules]
disabled = ["IH006", "InjectionRisk.UnsafeEscaping"]

[rules.severity]
IH005 = "error"

[sinks]
eval_aliases = ["Invoke-Dynamic"]
dangerous_methods = ["RunScript"]
interpreters = ["bash"]
"#,
        );

        let config = load_config(&config_path).unwrap();

        assert_eq!(
            config.rules.disabled,
            vec!["IH006", "InjectionRisk.UnsafeEscaping"]
        );
        assert_eq!(
            config.rules.severity.get("IH005"),
            Some(&SeverityValue::Error)
        );
        assert_eq!(config.sinks.eval_aliases, vec!["Invoke-Dynamic"]);
        assert_eq!(config.sinks.dangerous_methods, vec!["RunScript"]);
        assert_eq!(config.sinks.interpreters, vec!["bash"]);
    }

    #[test]
    fn default_config_when_missing() {
        let dir = create_temp_dir();
        let config = load_config_or_default(dir.path());

        assert_eq!(config, Config::default());
        assert!(config.rules.disabled.is_empty());
        assert!(config.sinks.is_empty());
    }

    #[test]
    fn error_on_invalid_toml() {
        let dir = create_temp_dir();
        let config_path = write_config(&dir, "this is not valid { toml }");

        let result = load_config(&config_path);

        match result {
            Err(ConfigError::ParseError { path, message }) => {
                assert_eq!(path, config_path);
                assert!(!message.is_empty());
            }
            other => panic!("Expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn error_on_unreadable_path() {
        let dir = create_temp_dir();

        let result = load_config(&dir.path().join("missing").join(CONFIG_FILENAME));

        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn find_config_file_in_current_directory() {
        let dir = create_temp_dir();
        let config_path = write_config(&dir, "");

        let found = find_config_file(dir.path());

        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn find_config_file_in_parent_directory() {
        let parent = create_temp_dir();
        let child = parent.path().join("scripts");
        fs::create_dir(&child).unwrap();
        let config_path = write_config(&parent, "");

        let found = find_config_file(&child);

        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn find_config_file_returns_none_when_not_found() {
        let dir = create_temp_dir();

        let found = find_config_file(dir.path());

        assert!(found.is_none());
    }

    #[test]
    fn partial_config_uses_defaults() {
        let dir = create_temp_dir();
        let config_path = write_config(&dir, "[sinks]\ninterpreters = [\"bash\"]");

        let config = load_config(&config_path).unwrap();

        assert_eq!(config.rules, RulesConfig::default());
        assert_eq!(config.sinks.interpreters, vec!["bash"]);
        assert!(config.sinks.eval_aliases.is_empty());
    }

    #[test]
    fn severity_values_parse_correctly() {
        let dir = create_temp_dir();
        let config_path = write_config(
            &dir,
            r#"
[rules.severity]
IH001 = "error"
IH002 = "warning"
IH003 = "info"
IH004 = "hint"
"#,
        );

        let config = load_config(&config_path).unwrap();

        assert_eq!(config.rules.severity.get("IH001"), Some(&SeverityValue::Error));
        assert_eq!(config.rules.severity.get("IH002"), Some(&SeverityValue::Warning));
        assert_eq!(config.rules.severity.get("IH003"), Some(&SeverityValue::Info));
        assert_eq!(config.rules.severity.get("IH004"), Some(&SeverityValue::Hint));
    }

    #[test]
    fn severity_value_converts_to_severity() {
        assert_eq!(Severity::from(SeverityValue::Error), Severity::Error);
        assert_eq!(Severity::from(SeverityValue::Warning), Severity::Warning);
        assert_eq!(Severity::from(SeverityValue::Info), Severity::Info);
        assert_eq!(Severity::from(SeverityValue::Hint), Severity::Hint);
    }

    #[test]
    fn min_confidence_parses_correctly() {
        let dir = create_temp_dir();
        let config_path = write_config(&dir, "[rules]\nmin_confidence = \"medium\"\n");

        let config = load_config(&config_path).unwrap();

        assert_eq!(config.rules.min_confidence, Some(ConfidenceValue::Medium));
        assert_eq!(Confidence::from(ConfidenceValue::Medium), Confidence::Medium);
    }

    #[test]
    fn config_error_display_is_helpful() {
        let err = ConfigError::ParseError {
            path: PathBuf::from("/repo/hunter.toml"),
            message: "expected `=`".to_string(),
        };

        let msg = format!("{}", err);

        assert!(msg.contains("/repo/hunter.toml"));
        assert!(msg.contains("expected `=`"));
    }

    #[test]
    fn warns_on_unknown_top_level_option() {
        let dir = create_temp_dir();
        let config_path = write_config(&dir, "include = [\"src/**\"]\n");

        let result = load_config_with_warnings(&config_path).unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("include"));
    }

    #[test]
    fn warns_on_unknown_section_options() {
        let dir = create_temp_dir();
        let config_path = write_config(
            &dir,
            r#"
[rules]
enabled = ["IH001"]

[sinks]
sanitizers = ["Protect-Input"]
"#,
        );

        let result = load_config_with_warnings(&config_path).unwrap();

        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].contains("[rules]"));
        assert!(result.warnings[0].contains("enabled"));
        assert!(result.warnings[1].contains("[sinks]"));
        assert!(result.warnings[1].contains("sanitizers"));
    }

    #[test]
    fn no_warnings_for_valid_config() {
        let dir = create_temp_dir();
        let config_path = write_config(
            &dir,
            r#"
[rules]
disabled = ["IH006"]
min_confidence = "low"

[rules.severity]
IH001 = "warning"

[sinks]
eval_aliases = ["Invoke-Dynamic"]
"#,
        );

        let result = load_config_with_warnings(&config_path).unwrap();

        assert!(result.warnings.is_empty());
    }

    #[test]
    fn load_config_or_default_with_warnings_returns_warnings() {
        let dir = create_temp_dir();
        write_config(&dir, "typo = true");

        let result = load_config_or_default_with_warnings(dir.path());

        assert!(!result.warnings.is_empty());
        assert!(result.warnings[0].contains("typo"));
    }

    #[test]
    fn load_config_or_default_with_warnings_returns_empty_when_no_config() {
        let dir = create_temp_dir();

        let result = load_config_or_default_with_warnings(dir.path());

        assert_eq!(result.config, Config::default());
        assert!(result.warnings.is_empty());
    }
}
