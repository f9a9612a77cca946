//! Services the surrounding environment provides: timers, consumer contexts
//! that display the background, theme management and user confirmation.

pub mod alarms;
pub mod consumers;
pub mod themes;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use alarms::LocalAlarms;
pub use consumers::FileConsumers;
pub use themes::ThemeCatalog;

pub const CYCLE_ALARM: &str = "cycle";

/// Fire-and-forget message pushed to every consumer context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Broadcast {
    #[serde(rename = "setBackground")]
    SetBackground { url: String },
}

/// Position of a consumer in the hub's list, stable for the hub's lifetime.
pub type ConsumerId = usize;

pub trait AlarmScheduler {
    /// (Re)installs a periodic alarm, replacing any alarm with the same name.
    fn create(&mut self, name: &str, period_minutes: u64);
}

pub trait ConsumerHub {
    fn contexts(&self) -> Vec<ConsumerId>;
    fn send(&self, id: ConsumerId, message: &Broadcast) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledTheme {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub enabled: bool,
}

impl InstalledTheme {
    pub fn is_theme(&self) -> bool {
        self.kind == "theme"
    }
}

pub trait ThemeHost {
    /// Every installed add-on, themes and otherwise.
    fn installed(&self) -> Result<Vec<InstalledTheme>>;
    /// Enables `id`; the host disables whichever theme was active before.
    fn set_enabled(&mut self, id: &str) -> Result<()>;

    fn active_theme(&self) -> Result<Option<InstalledTheme>> {
        Ok(self.installed()?.into_iter().find(|t| t.is_theme() && t.enabled))
    }
}

pub trait Prompt {
    fn confirm(&mut self, message: &str) -> bool;
}

/// Answers every prompt the same way; the request channel carries the
/// user's answer up front.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Prompt for AutoConfirm {
    fn confirm(&mut self, _message: &str) -> bool {
        self.0
    }
}
