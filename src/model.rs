use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_GROUP_ID: &str = "g-default";
pub const DEFAULT_GROUP_NAME: &str = "Sample";
pub const DEFAULT_INTERVAL_MS: u64 = 60_000;

/// Label used when a theme is saved without one.
pub const DEFAULT_THEME_GROUP: &str = "General";

/// Background image group cycled by the `cycle` alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub interval_ms: u64,
}

impl Group {
    pub fn sample() -> Self {
        Self {
            id: DEFAULT_GROUP_ID.to_string(),
            name: DEFAULT_GROUP_NAME.to_string(),
            images: Vec::new(),
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

pub fn default_groups() -> Vec<Group> {
    vec![Group::sample()]
}

pub fn find_group<'a>(groups: &'a [Group], id: &str) -> Option<&'a Group> {
    groups.iter().find(|g| g.id == id)
}

/// Group id -> rotation offset. Absent entries mean 0.
pub type IndexMap = BTreeMap<String, usize>;

/// An installed theme the user filed under a free-form label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTheme {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group: String,
}

impl SavedTheme {
    pub fn group_key(&self) -> String {
        group_key(&self.group)
    }
}

/// Labels compare case-insensitively; the upper-cased form is also what gets displayed.
pub fn group_key(label: &str) -> String {
    label.to_uppercase()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_group_id: Option<String>,
    #[serde(default)]
    pub current_index: IndexMap,
}

impl StateSnapshot {
    pub fn active_group(&self) -> Option<&Group> {
        let id = self.active_group_id.as_deref()?;
        find_group(&self.groups, id)
    }

    pub fn index_of(&self, group_id: &str) -> usize {
        self.current_index.get(group_id).copied().unwrap_or(0)
    }
}
