use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use super::{Broadcast, ConsumerHub, ConsumerId};

/// Consumers are files a wallpaper or page renderer watches. Each broadcast
/// overwrites the file with the latest message. Parent directories are not
/// created: a consumer whose directory is gone simply isn't listening.
#[derive(Debug, Clone, Default)]
pub struct FileConsumers {
    targets: Vec<PathBuf>,
}

impl FileConsumers {
    pub fn new(targets: Vec<PathBuf>) -> Self {
        Self { targets }
    }
}

impl ConsumerHub for FileConsumers {
    fn contexts(&self) -> Vec<ConsumerId> {
        (0..self.targets.len()).collect()
    }

    fn send(&self, id: ConsumerId, message: &Broadcast) -> Result<()> {
        let target = self.targets.get(id).with_context(|| format!("unknown consumer #{id}"))?;

        let payload = serde_json::to_string(message)?;
        fs::write(target, payload).with_context(|| format!("delivering to {}", target.display()))?;
        Ok(())
    }
}
