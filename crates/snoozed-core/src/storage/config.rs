//! TOML-based daemon configuration.
//!
//! Stores:
//! - The global enabled flag and default action
//! - The snooze policy (maximum count, deferral duration)
//! - Notification preferences
//! - The alarm table
//!
//! Configuration is stored at `~/.config/snoozed/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::data_dir;
use crate::alarm::{Action, Alarm, MINUTES_PER_DAY};
use crate::error::ConfigError;

/// Snooze policy applied to every alarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnoozePolicy {
    /// Maximum number of deferrals per alarm cycle.
    #[serde(default = "default_max_snoozes")]
    pub max_snoozes: u32,
    /// Minutes each deferral postpones the action.
    #[serde(default = "default_snooze_duration")]
    pub duration_min: u32,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// When false, alarms execute unattended after a short grace delay.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds an informational warning stays on screen.
    #[serde(default = "default_warning_secs")]
    pub warning_secs: u32,
}

/// Daemon configuration.
///
/// Serialized to/from TOML at `~/.config/snoozed/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_action")]
    pub default_action: Action,
    #[serde(default)]
    pub snooze: SnoozePolicy,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub alarms: Vec<Alarm>,
}

// Default functions
fn default_max_snoozes() -> u32 {
    3
}
fn default_snooze_duration() -> u32 {
    10
}
fn default_warning_secs() -> u32 {
    20
}
fn default_action() -> Action {
    Action::Suspend
}
fn default_true() -> bool {
    true
}

impl Default for SnoozePolicy {
    fn default() -> Self {
        Self {
            max_snoozes: default_max_snoozes(),
            duration_min: default_snooze_duration(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warning_secs: default_warning_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            default_action: default_action(),
            snooze: SnoozePolicy::default(),
            notifications: NotificationsConfig::default(),
            alarms: Vec::new(),
        }
    }
}

impl Config {
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/snoozed"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, writing a default file on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if it
    /// parses but fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub(crate) fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub(crate) fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Modification time of the config file, if it exists.
    pub fn modified() -> Option<SystemTime> {
        let path = Self::path().ok()?;
        std::fs::metadata(path).ok()?.modified().ok()
    }

    /// Check the structural invariants the rest of the system relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant: duplicate or empty alarm names,
    /// warning offsets of zero or a full day or more, or a zero snooze
    /// duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snooze.duration_min == 0 {
            return Err(ConfigError::InvalidValue {
                key: "snooze.duration_min".into(),
                message: "must be greater than zero".into(),
            });
        }
        let mut names = HashSet::new();
        for alarm in &self.alarms {
            if alarm.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "alarms.name".into(),
                    message: "alarm name must not be empty".into(),
                });
            }
            if !names.insert(alarm.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: "alarms.name".into(),
                    message: format!("duplicate alarm name '{}'", alarm.name),
                });
            }
            for warning in &alarm.warnings {
                if warning.minutes_before == 0 || warning.minutes_before >= MINUTES_PER_DAY {
                    return Err(ConfigError::InvalidValue {
                        key: format!("alarms.{}.warnings.minutes_before", alarm.name),
                        message: format!(
                            "{} is outside 1..{}",
                            warning.minutes_before, MINUTES_PER_DAY
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn alarm(&self, name: &str) -> Option<&Alarm> {
        self.alarms.iter().find(|a| a.name == name)
    }

    /// Action for an alarm, falling back to the global default.
    pub fn action_for(&self, name: &str) -> Action {
        self.alarm(name)
            .and_then(|a| a.action)
            .unwrap_or(self.default_action)
    }

    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n: u64 = value
                            .parse()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key, validate the result, and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// the mutated config is invalid, or it cannot be saved. The config on
    /// disk is untouched on any failure.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::Warning;

    fn sample_alarm(name: &str) -> Alarm {
        Alarm {
            name: name.into(),
            enabled: true,
            action: None,
            weekday_time: "23:00".parse().ok(),
            weekend_time: None,
            warnings: vec![Warning {
                minutes_before: 10,
                message: "{name} in {minutes} minutes".into(),
            }],
        }
    }

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert!(parsed.enabled);
        assert_eq!(parsed.snooze.max_snoozes, 3);
        assert_eq!(parsed.snooze.duration_min, 10);
        assert_eq!(parsed.default_action, Action::Suspend);
    }

    #[test]
    fn alarm_table_roundtrip() {
        let mut cfg = Config::default();
        cfg.alarms.push(sample_alarm("bedtime"));
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.alarms.len(), 1);
        assert_eq!(parsed.alarms[0].name, "bedtime");
        assert_eq!(parsed.alarms[0].weekday_time.unwrap().to_string(), "23:00");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [[alarms]]
            name = "lunch"
            weekday_time = "12:30"
            "#,
        )
        .unwrap();
        assert!(cfg.enabled);
        assert!(cfg.alarms[0].enabled);
        assert!(cfg.alarms[0].warnings.is_empty());
        assert_eq!(cfg.notifications.warning_secs, 20);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("snooze.max_snoozes").as_deref(), Some("3"));
        assert_eq!(cfg.get("default_action").as_deref(), Some("suspend"));
        assert!(cfg.get("snooze.missing_key").is_none());
    }

    #[test]
    fn set_json_value_by_path_updates_nested_number() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        Config::set_json_value_by_path(&mut json, "snooze.max_snoozes", "5").unwrap();
        assert_eq!(
            Config::get_json_value_by_path(&json, "snooze.max_snoozes").unwrap(),
            &serde_json::Value::Number(5.into())
        );
    }

    #[test]
    fn set_json_value_by_path_rejects_unknown_key() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "snooze.nonexistent", "1");
        assert!(matches!(result, Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let mut cfg = Config::default();
        cfg.alarms.push(sample_alarm("bedtime"));
        cfg.alarms.push(sample_alarm("bedtime"));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_warning_offset() {
        let mut cfg = Config::default();
        let mut alarm = sample_alarm("bedtime");
        alarm.warnings[0].minutes_before = 1440;
        cfg.alarms.push(alarm);
        assert!(cfg.validate().is_err());

        cfg.alarms[0].warnings[0].minutes_before = 0;
        assert!(cfg.validate().is_err());

        cfg.alarms[0].warnings[0].minutes_before = 1439;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_snooze_duration() {
        let mut cfg = Config::default();
        cfg.snooze.duration_min = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_from_writes_default_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.snooze.max_snoozes, 3);

        // Second load reads the file it just wrote.
        let again = Config::load_from(&path).unwrap();
        assert_eq!(again.snooze.max_snoozes, cfg.snooze.max_snoozes);
    }

    #[test]
    fn load_from_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "enabled = \"maybe\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn action_for_falls_back_to_default() {
        let mut cfg = Config::default();
        cfg.default_action = Action::Hibernate;
        let mut alarm = sample_alarm("bedtime");
        alarm.action = Some(Action::Shutdown);
        cfg.alarms.push(alarm);
        cfg.alarms.push(sample_alarm("lunch"));

        assert_eq!(cfg.action_for("bedtime"), Action::Shutdown);
        assert_eq!(cfg.action_for("lunch"), Action::Hibernate);
        assert_eq!(cfg.action_for("unknown"), Action::Hibernate);
    }
}
