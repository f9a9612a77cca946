use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};

use super::{InstalledTheme, ThemeHost};
use crate::info;

/// Installed add-ons listed in a JSON array of `{id, name, type, enabled}`.
/// Enabling a theme rewrites the file so exactly that theme is enabled.
#[derive(Debug, Clone)]
pub struct ThemeCatalog {
    path: PathBuf,
}

impl ThemeCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn save(&self, entries: &[InstalledTheme]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)
            .with_context(|| format!("writing theme catalog {}", self.path.display()))?;
        Ok(())
    }
}

impl ThemeHost for ThemeCatalog {
    fn installed(&self) -> Result<Vec<InstalledTheme>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("reading theme catalog {}", self.path.display()))?;
        let entries = serde_json::from_str(&data)
            .with_context(|| format!("parsing theme catalog {}", self.path.display()))?;
        Ok(entries)
    }

    fn set_enabled(&mut self, id: &str) -> Result<()> {
        let mut entries = self.installed()?;
        if !entries.iter().any(|t| t.is_theme() && t.id == id) {
            bail!("theme {id} is not installed");
        }

        for entry in entries.iter_mut().filter(|t| t.is_theme()) {
            entry.enabled = entry.id == id;
        }
        self.save(&entries)?;
        info!("[THEMES] Enabled '{}'", id);
        Ok(())
    }
}
