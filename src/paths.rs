// ~/thematic-backgrounds/src/paths.rs

use std::path::PathBuf;
use crate::{info, warn};

pub const DATA_DIR_NAME: &str = ".thematic";
pub const HOME_OVERRIDE_VAR: &str = "THEMATIC_HOME";

pub fn user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(profile) = std::env::var("USERPROFILE") {
        info!("USERPROFILE environment variable found: {}", profile);
        return Some(PathBuf::from(profile));
    }

    // Fallback (older Windows setups)
    let drive = std::env::var("HOMEDRIVE").ok();
    let path = std::env::var("HOMEPATH").ok();

    match (drive, path) {
        (Some(d), Some(p)) => {
            let full = PathBuf::from(format!("{}{}", d, p));
            info!("Resolved home directory from HOMEDRIVE/HOMEPATH: {}", full.display());
            Some(full)
        }
        _ => {
            warn!("Could not resolve home directory using HOME, USERPROFILE or HOMEDRIVE/HOMEPATH");
            None
        }
    }
}

/// Root for config, storage, theme catalog and log.
/// `$THEMATIC_HOME` when set, otherwise `~/.thematic/`.
pub fn data_root_dir() -> PathBuf {
    if let Ok(custom) = std::env::var(HOME_OVERRIDE_VAR) {
        if !custom.trim().is_empty() {
            return PathBuf::from(custom);
        }
    }

    if let Some(home) = user_home_dir() {
        return home.join(DATA_DIR_NAME);
    }

    warn!("Could not resolve home directory, falling back to exe parent");
    match std::env::current_exe() {
        Ok(path) => path.parent().map(|p| p.join(DATA_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME)),
        Err(e) => {
            warn!("Failed to get current executable path: {e}");
            PathBuf::from(DATA_DIR_NAME)
        }
    }
}

pub fn config_path() -> PathBuf {
    data_root_dir().join("config.yaml")
}

/// Relative paths from config resolve against the data root.
pub fn resolve_in_root(raw: &str) -> PathBuf {
    let candidate = PathBuf::from(raw);
    if candidate.is_absolute() {
        candidate
    } else {
        data_root_dir().join(candidate)
    }
}
