//! Global setting of the trading terminal.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{LazyLock, RwLock};

use super::utility::get_file_path;
use crate::error::{EngineError, Result};

/// Setting filename
const SETTING_FILENAME: &str = "engine_setting.json";

/// Default settings
fn default_settings() -> HashMap<String, SettingValue> {
    let mut settings = HashMap::new();

    // Font settings
    settings.insert("font.family".to_string(), SettingValue::String("Arial".to_string()));
    settings.insert("font.size".to_string(), SettingValue::Int(12));

    // Rows kept by monitors without a data key
    settings.insert("remove_num".to_string(), SettingValue::Int(30));

    // Log settings
    settings.insert("log.active".to_string(), SettingValue::Bool(true));
    settings.insert("log.level".to_string(), SettingValue::Int(20)); // INFO level
    settings.insert("log.console".to_string(), SettingValue::Bool(true));
    settings.insert("log.file".to_string(), SettingValue::Bool(false));

    // Event engine settings
    settings.insert("event.interval_ms".to_string(), SettingValue::Int(1000));

    // Resample every active subscription on each timer event
    settings.insert("feed.timer_resample".to_string(), SettingValue::Bool(false));

    settings
}

/// Setting value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl SettingValue {
    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Global settings container
pub struct Settings {
    settings: RwLock<HashMap<String, SettingValue>>,
}

impl Settings {
    /// Create new Settings with defaults, overlaid by the setting file if present
    pub fn new() -> Self {
        let settings = Self::with_defaults();
        let filepath = get_file_path(SETTING_FILENAME);
        if filepath.exists() {
            match load_settings_from_file(&filepath) {
                Ok(file_settings) => settings.update(file_settings),
                Err(e) => tracing::warn!(path = %filepath.display(), "Ignoring setting file: {}", e),
            }
        }
        settings
    }

    /// Create Settings holding only the built-in defaults
    pub fn with_defaults() -> Self {
        Self {
            settings: RwLock::new(default_settings()),
        }
    }

    /// Get a setting value
    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.settings.read().ok()?.get(key).cloned()
    }

    /// Get a string setting
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    /// Get an integer setting
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_int())
    }

    /// Get a float setting
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_float())
    }

    /// Get a bool setting
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Set a setting value
    pub fn set(&self, key: impl Into<String>, value: SettingValue) {
        if let Ok(mut settings) = self.settings.write() {
            settings.insert(key.into(), value);
        }
    }

    /// Update settings from a map
    pub fn update(&self, new_settings: HashMap<String, SettingValue>) {
        if let Ok(mut settings) = self.settings.write() {
            settings.extend(new_settings);
        }
    }

    /// All settings whose key starts with `prefix`, with the prefix stripped
    pub fn get_settings(&self, prefix: &str) -> HashMap<String, SettingValue> {
        self.settings
            .read()
            .map(|settings| {
                settings
                    .iter()
                    .filter_map(|(key, value)| {
                        key.strip_prefix(prefix)
                            .map(|short| (short.to_string(), value.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get all settings as HashMap
    pub fn get_all(&self) -> HashMap<String, SettingValue> {
        self.get_settings("")
    }

    /// Save settings to the default setting file
    pub fn save(&self) -> Result<()> {
        self.save_to(&get_file_path(SETTING_FILENAME))
    }

    /// Save settings to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = {
            let settings = self
                .settings
                .read()
                .map_err(|e| EngineError::Lifecycle(format!("setting lock poisoned: {}", e)))?;
            serde_json::to_string_pretty(&*settings)?
        };
        fs::write(path, json)?;
        Ok(())
    }

    /// Overlay settings read from `path`
    pub fn load_from(&self, path: &Path) -> Result<()> {
        self.update(load_settings_from_file(path)?);
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

/// Load settings from JSON file
fn load_settings_from_file(path: &Path) -> Result<HashMap<String, SettingValue>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Global settings instance
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new);

/// Prefix lookup on the global settings
pub fn get_settings(prefix: &str) -> HashMap<String, SettingValue> {
    SETTINGS.get_settings(prefix)
}
