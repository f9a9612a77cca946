// ~/thematic-backgrounds/src/bootstrap.rs

use std::fs;
use std::path::Path;

use crate::store::{KeyValueStore, StateStore};
use crate::{error, info, warn, DEBUG_NAME};

/// Create the data root and scaffold default files (only if they don't
/// already exist).
pub fn bootstrap_data_dir(root: &Path) {
    info!("[{}] === Bootstrap starting ===", DEBUG_NAME);

    if let Err(e) = fs::create_dir_all(root) {
        warn!("[{}] Cannot create data directory {}: {e}", DEBUG_NAME, root.display());
        return;
    }
    info!("[{}] Data directory: {}", DEBUG_NAME, root.display());

    scaffold_config_yaml(root);
    scaffold_theme_catalog(root);
    info!("[{}] Scaffolding complete", DEBUG_NAME);
}

/// First-run seeding of the background groups.
pub fn seed_store<S: KeyValueStore>(store: &mut StateStore<S>) {
    match store.seed_defaults() {
        Ok(true) => info!("[{}] Seeded default background group", DEBUG_NAME),
        Ok(false) => {}
        Err(e) => error!("[{}] Failed to seed default groups: {e:#}", DEBUG_NAME),
    }
}

fn scaffold_config_yaml(root: &Path) {
    let path = root.join("config.yaml");
    if path.exists() { return; }

    let content = r#"debug: false
log_level: warn

settings:
  runtime:
    tick_sleep_ms: 50
  storage:
    path: "storage.json"
  themes:
    catalog: "themes.json"
  # Files that receive {"type":"setBackground","url":...} on every cycle.
  consumers: []
  diagnostics:
    log_requests: false
"#;
    match fs::write(&path, content) {
        Ok(_) => info!("[{}] Created config.yaml", DEBUG_NAME),
        Err(e) => warn!("[{}] Failed to create config.yaml: {e}", DEBUG_NAME),
    }
}

fn scaffold_theme_catalog(root: &Path) {
    let path = root.join("themes.json");
    if path.exists() { return; }

    match fs::write(&path, "[]\n") {
        Ok(_) => info!("[{}] Created empty themes.json", DEBUG_NAME),
        Err(e) => warn!("[{}] Failed to create themes.json: {e}", DEBUG_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loaders::config::AppConfig;
    use crate::store::MemoryStore;
    use tempfile::tempdir;

    #[test]
    fn scaffolds_once_without_clobbering() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("data");

        bootstrap_data_dir(&root);
        let config = AppConfig::load(&root.join("config.yaml")).unwrap();
        assert_eq!(config.settings.runtime.tick_sleep_ms, 50);
        assert_eq!(fs::read_to_string(root.join("themes.json")).unwrap().trim(), "[]");

        fs::write(root.join("themes.json"), "[{\"id\":\"x\"}]").unwrap();
        bootstrap_data_dir(&root);
        assert!(fs::read_to_string(root.join("themes.json")).unwrap().contains("\"x\""));
    }

    #[test]
    fn seeding_is_idempotent() {
        let mut store = StateStore::new(MemoryStore::new());
        seed_store(&mut store);
        seed_store(&mut store);
        assert_eq!(store.groups().unwrap().len(), 1);
    }
}
