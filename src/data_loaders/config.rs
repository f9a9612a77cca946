use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use super::yaml::load_yaml;
use crate::paths::resolve_in_root;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub debug: bool,
    pub log_level: String,
    pub settings: AppSettings,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub runtime: RuntimeSettings,
    pub storage: StorageSettings,
    pub themes: ThemeSettings,
    pub consumers: Vec<String>,
    pub diagnostics: DiagnosticsSettings,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub tick_sleep_ms: u64,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct ThemeSettings {
    pub catalog: String,
}

#[derive(Debug, Clone)]
pub struct DiagnosticsSettings {
    pub log_requests: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "warn".to_string(),
            settings: AppSettings::default(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            runtime: RuntimeSettings::default(),
            storage: StorageSettings::default(),
            themes: ThemeSettings::default(),
            consumers: Vec::new(),
            diagnostics: DiagnosticsSettings::default(),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { tick_sleep_ms: 50 }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { path: "storage.json".to_string() }
    }
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self { catalog: "themes.json".to_string() }
    }
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self { log_requests: false }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Option<Self> {
        let value = load_yaml(path)?;
        Self::from_yaml(&value)
    }

    pub fn from_yaml(root: &Value) -> Option<Self> {
        let map = root.as_mapping()?;
        let settings = parse_settings(map);

        let debug = bool_any(map, &["debug", "debug_mode"]).unwrap_or(false);
        let log_level = str_any(map, &["log_level", "logging"]).unwrap_or("warn").to_lowercase();

        Some(Self { debug, log_level, settings })
    }

    pub fn storage_path(&self) -> PathBuf {
        resolve_in_root(&self.settings.storage.path)
    }

    pub fn catalog_path(&self) -> PathBuf {
        resolve_in_root(&self.settings.themes.catalog)
    }

    pub fn consumer_paths(&self) -> Vec<PathBuf> {
        self.settings.consumers.iter().map(|c| resolve_in_root(c)).collect()
    }
}

fn parse_settings(root: &Mapping) -> AppSettings {
    let mut settings = AppSettings::default();

    let Some(settings_map) = mapping_at(root, "settings") else {
        return settings;
    };

    if let Some(runtime) = mapping_at(settings_map, "runtime") {
        settings.runtime.tick_sleep_ms = u64_any(runtime, &["tick_sleep_ms", "tick_ms"])
            .unwrap_or(settings.runtime.tick_sleep_ms)
            .max(1);
    }

    if let Some(storage) = mapping_at(settings_map, "storage") {
        if let Some(path) = str_any(storage, &["path", "file"]).filter(|p| !p.trim().is_empty()) {
            settings.storage.path = path.trim().to_string();
        }
    }

    if let Some(themes) = mapping_at(settings_map, "themes") {
        let catalog = str_any(themes, &["catalog", "catalog_path"]);
        if let Some(catalog) = catalog.filter(|p| !p.trim().is_empty()) {
            settings.themes.catalog = catalog.trim().to_string();
        }
    }

    if let Some(consumers) = string_list_at(settings_map, "consumers") {
        settings.consumers = consumers;
    }

    if let Some(diag) = mapping_at(settings_map, "diagnostics") {
        settings.diagnostics.log_requests = bool_any(diag, &["log_requests", "log_messages"])
            .unwrap_or(settings.diagnostics.log_requests);
    }

    settings
}

fn bool_at(map: &Mapping, key: &str) -> Option<bool> {
    map.get(Value::String(key.to_string()))?.as_bool()
}

fn bool_any(map: &Mapping, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| bool_at(map, k))
}

fn str_at<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
    map.get(Value::String(key.to_string()))?.as_str()
}

fn str_any<'a>(map: &'a Mapping, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| str_at(map, k))
}

fn mapping_at<'a>(map: &'a Mapping, key: &str) -> Option<&'a Mapping> {
    map.get(Value::String(key.to_string()))?.as_mapping()
}

fn u64_at(map: &Mapping, key: &str) -> Option<u64> {
    map.get(Value::String(key.to_string()))?
        .as_i64()
        .and_then(|v| if v >= 0 { Some(v as u64) } else { None })
}

fn u64_any(map: &Mapping, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| u64_at(map, k))
}

fn string_list_at(map: &Mapping, key: &str) -> Option<Vec<String>> {
    let list = map.get(Value::String(key.to_string()))?.as_sequence()?;
    let parsed: Vec<String> = list
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect();

    if parsed.is_empty() {
        None
    } else {
        Some(parsed)
    }
}
