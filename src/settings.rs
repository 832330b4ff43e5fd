/// Settings store
///
/// A small JSON key/value file living in the platform config directory.
/// Missing keys fall back to defaults; a broken file never stops the app.

use crate::error::{ConduitError, Result};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "Conduit";
const SETTINGS_FILE: &str = "settings.json";

/// Keys read by the core and the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsEntry {
    ProjectDirectory,
    LastOpenedDirectory,
    Username,
    TaskTemplates,
    Port,
}

impl SettingsEntry {
    pub fn key(&self) -> &'static str {
        match self {
            SettingsEntry::ProjectDirectory => "project_directory",
            SettingsEntry::LastOpenedDirectory => "last_opened_directory",
            SettingsEntry::Username => "username",
            SettingsEntry::TaskTemplates => "task_templates",
            SettingsEntry::Port => "port",
        }
    }
}

impl std::fmt::Display for SettingsEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

fn defaults() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(SettingsEntry::LastOpenedDirectory.key().into(), Value::Null);
    map.insert(SettingsEntry::ProjectDirectory.key().into(), Value::Null);
    map.insert(SettingsEntry::Username.key().into(), Value::Null);
    map.insert(
        SettingsEntry::TaskTemplates.key().into(),
        json!(["Modelling", "Rigging", "Texturing", "Animation"]),
    );
    map.insert(SettingsEntry::Port.key().into(), json!(8000));
    map
}

/// JSON-backed settings
#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
    data: Map<String, Value>,
}

impl Settings {
    /// Open the settings file in the platform config directory
    ///
    /// # Returns
    /// * `Ok(Settings)` - Loaded settings (defaults if the file is absent)
    /// * `Err(ConduitError)` - If the config directory cannot be determined
    pub fn new() -> Result<Self> {
        let base = dirs::config_dir().ok_or_else(|| {
            ConduitError::Config("Could not determine config directory".to_string())
        })?;
        Ok(Self::with_path(base.join(APP_NAME).join(SETTINGS_FILE)))
    }

    /// Open settings stored at an explicit path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        let mut settings = Self {
            path: path.as_ref().to_path_buf(),
            data: defaults(),
        };
        settings.load();
        settings
    }

    /// In-memory settings with defaults only. Never touches disk until saved.
    pub fn in_memory<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            data: defaults(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings from disk and merge them over the defaults
    ///
    /// Unreadable or malformed files are logged and ignored.
    pub fn load(&mut self) {
        if !self.path.exists() {
            return;
        }

        let parsed = fs::read_to_string(&self.path)
            .map_err(ConduitError::from)
            .and_then(|raw| serde_json::from_str::<Value>(&raw).map_err(ConduitError::from));

        match parsed {
            Ok(Value::Object(map)) => self.data.extend(map),
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "settings file is not a JSON object, using defaults");
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to load settings");
            }
        }
    }

    /// Write current settings to disk, creating the parent directory
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, raw)?;
        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key).filter(|v| !v.is_null())
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).cloned().unwrap_or(default)
    }

    pub fn get_str(&self, entry: SettingsEntry) -> Option<&str> {
        self.get(entry.key()).and_then(Value::as_str)
    }

    pub fn get_u16(&self, entry: SettingsEntry) -> Option<u16> {
        self.get(entry.key())
            .and_then(Value::as_u64)
            .and_then(|n| u16::try_from(n).ok())
    }

    /// Read a list of strings, skipping non-string items
    pub fn get_string_list(&self, entry: SettingsEntry) -> Vec<String> {
        self.get(entry.key())
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set<V: Into<Value>>(&mut self, key: &str, value: V) {
        self.data.insert(key.to_string(), value.into());
    }

    /// Copy of every setting
    pub fn all(&self) -> Map<String, Value> {
        self.data.clone()
    }

    /// The user recorded in version metadata
    ///
    /// Falls back to the login name from the environment.
    pub fn username(&self) -> String {
        self.get_str(SettingsEntry::Username)
            .map(str::to_string)
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_loaded() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::with_path(temp.path().join("settings.json"));

        assert!(settings.get_str(SettingsEntry::ProjectDirectory).is_none());
        assert_eq!(settings.get_u16(SettingsEntry::Port), Some(8000));
        assert_eq!(
            settings.get_string_list(SettingsEntry::TaskTemplates),
            vec!["Modelling", "Rigging", "Texturing", "Animation"]
        );
    }

    #[test]
    fn test_set_and_get() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::with_path(temp.path().join("settings.json"));

        settings.set("project_directory", "/tmp/project");
        assert_eq!(
            settings.get_str(SettingsEntry::ProjectDirectory),
            Some("/tmp/project")
        );
        assert_eq!(settings.get_or("missing", json!(3)), json!(3));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("settings.json");

        let mut first = Settings::with_path(&path);
        first.set("project_directory", "/tmp/project");
        first.set("last_opened_directory", "/tmp/last");
        first.save().unwrap();

        let second = Settings::with_path(&path);
        assert_eq!(
            second.get_str(SettingsEntry::ProjectDirectory),
            Some("/tmp/project")
        );
        assert_eq!(
            second.get_str(SettingsEntry::LastOpenedDirectory),
            Some("/tmp/last")
        );
        // Defaults survive alongside saved values
        assert_eq!(second.get_u16(SettingsEntry::Port), Some(8000));
    }

    #[test]
    fn test_malformed_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, "INVALID JSON").unwrap();

        let settings = Settings::with_path(&path);
        assert!(settings.get_str(SettingsEntry::ProjectDirectory).is_none());
        assert_eq!(settings.get_u16(SettingsEntry::Port), Some(8000));
    }

    #[test]
    fn test_all_returns_copy() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::with_path(temp.path().join("settings.json"));
        settings.set("project_directory", "/tmp/project");

        let mut all = settings.all();
        assert_eq!(all["project_directory"], json!("/tmp/project"));

        all.insert("project_directory".into(), json!("/should/not/change"));
        assert_eq!(
            settings.get_str(SettingsEntry::ProjectDirectory),
            Some("/tmp/project")
        );
    }

    #[test]
    fn test_username_setting_wins() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::in_memory(temp.path().join("settings.json"));
        settings.set("username", "ana");
        assert_eq!(settings.username(), "ana");
    }

    #[test]
    fn test_in_memory_does_not_read_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(&path, r#"{"project_directory": "/elsewhere"}"#).unwrap();

        let settings = Settings::in_memory(&path);
        assert!(settings.get_str(SettingsEntry::ProjectDirectory).is_none());
    }
}
