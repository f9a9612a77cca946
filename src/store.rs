use std::{
    fs,
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    info,
    model::{default_groups, Group, IndexMap, SavedTheme, StateSnapshot, DEFAULT_GROUP_ID},
    warn,
};

pub const KEY_GROUPS: &str = "groups";
pub const KEY_ACTIVE_GROUP: &str = "activeGroupId";
pub const KEY_CURRENT_INDEX: &str = "currentIndex";
pub const KEY_USER_THEMES: &str = "userThemes";

pub type Entries = Map<String, Value>;

/// Flat key-value persistence. `get` returns only the keys that exist,
/// `set` merges the given keys over what is stored.
pub trait KeyValueStore {
    fn get(&self, keys: &[&str]) -> Result<Entries>;
    fn set(&mut self, entries: Entries) -> Result<()>;
}

/* =========================
   IN-MEMORY (tests)
   ========================= */

#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Entries,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<Entries> {
        Ok(pick(&self.entries, keys))
    }

    fn set(&mut self, entries: Entries) -> Result<()> {
        self.entries.extend(entries);
        Ok(())
    }
}

/* =========================
   JSON FILE
   ========================= */

/// Whole store kept as one pretty-printed JSON object.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load_all(&self) -> Result<Entries> {
        if !self.path.exists() {
            return Ok(Entries::new());
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("reading store {}", self.path.display()))?;
        if data.trim().is_empty() {
            return Ok(Entries::new());
        }

        let value: Value = serde_json::from_str(&data)
            .with_context(|| format!("parsing store {}", self.path.display()))?;
        match value {
            Value::Object(map) => Ok(map),
            _ => bail!("store {} is not a JSON object", self.path.display()),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, keys: &[&str]) -> Result<Entries> {
        let all = self.load_all()?;
        Ok(pick(&all, keys))
    }

    fn set(&mut self, entries: Entries) -> Result<()> {
        let mut all = self.load_all()?;
        all.extend(entries);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(&Value::Object(all))?;
        fs::write(&self.path, data)
            .with_context(|| format!("writing store {}", self.path.display()))?;
        Ok(())
    }
}

fn pick(entries: &Entries, keys: &[&str]) -> Entries {
    keys.iter()
        .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
        .collect()
}

/* =========================
   TYPED STATE
   ========================= */

/// Typed view over the four keys both halves of the app share.
/// Reads and writes are separate calls; a read-modify-write sequence is not
/// atomic and the last writer wins.
///
/// Elements that don't decode are skipped on read but kept on write, so one
/// bad entry never costs its siblings.
pub struct StateStore<S: KeyValueStore> {
    inner: S,
}

impl<S: KeyValueStore> StateStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn snapshot(&self) -> Result<StateSnapshot> {
        let entries = self.inner.get(&[KEY_GROUPS, KEY_ACTIVE_GROUP, KEY_CURRENT_INDEX])?;
        Ok(StateSnapshot {
            groups: read_list(&entries, KEY_GROUPS),
            active_group_id: read_key(&entries, KEY_ACTIVE_GROUP),
            current_index: read_index_map(&entries, KEY_CURRENT_INDEX),
        })
    }

    pub fn groups(&self) -> Result<Vec<Group>> {
        let entries = self.inner.get(&[KEY_GROUPS])?;
        Ok(read_list(&entries, KEY_GROUPS))
    }

    #[cfg(test)]
    pub fn set_groups(&mut self, groups: &[Group]) -> Result<()> {
        self.write_key(KEY_GROUPS, &groups)
    }

    #[cfg(test)]
    pub fn active_group_id(&self) -> Result<Option<String>> {
        let entries = self.inner.get(&[KEY_ACTIVE_GROUP])?;
        Ok(read_key(&entries, KEY_ACTIVE_GROUP))
    }

    pub fn set_active_group_id(&mut self, id: &str) -> Result<()> {
        self.write_key(KEY_ACTIVE_GROUP, &id)
    }

    pub fn current_index(&self) -> Result<IndexMap> {
        let entries = self.inner.get(&[KEY_CURRENT_INDEX])?;
        Ok(read_index_map(&entries, KEY_CURRENT_INDEX))
    }

    /// Stores one group's offset; every other entry is written back as found.
    pub fn set_group_index(&mut self, group_id: &str, index: usize) -> Result<()> {
        let mut raw = self.raw_object(KEY_CURRENT_INDEX)?;
        raw.insert(group_id.to_string(), Value::from(index));
        self.write_key(KEY_CURRENT_INDEX, &raw)
    }

    /// Adds a 0 offset for `group_id` unless a usable one is already stored.
    pub fn ensure_group_index(&mut self, group_id: &str) -> Result<usize> {
        let mut raw = self.raw_object(KEY_CURRENT_INDEX)?;
        if let Some(existing) = raw.get(group_id).and_then(Value::as_u64) {
            return Ok(existing as usize);
        }
        raw.insert(group_id.to_string(), Value::from(0u64));
        self.write_key(KEY_CURRENT_INDEX, &raw)?;
        Ok(0)
    }

    pub fn user_themes(&self) -> Result<Vec<SavedTheme>> {
        let entries = self.inner.get(&[KEY_USER_THEMES])?;
        Ok(read_list(&entries, KEY_USER_THEMES))
    }

    #[cfg(test)]
    pub fn set_user_themes(&mut self, themes: &[SavedTheme]) -> Result<()> {
        self.write_key(KEY_USER_THEMES, &themes)
    }

    pub fn append_user_theme(&mut self, theme: &SavedTheme) -> Result<()> {
        let mut raw = self.raw_list(KEY_USER_THEMES)?;
        raw.push(serde_json::to_value(theme)?);
        self.write_key(KEY_USER_THEMES, &raw)
    }

    /// Keeps the saved themes `keep` accepts, plus any entry that doesn't
    /// decode. Returns how many were removed.
    pub fn retain_user_themes<F>(&mut self, mut keep: F) -> Result<usize>
    where
        F: FnMut(&SavedTheme) -> bool,
    {
        let mut raw = self.raw_list(KEY_USER_THEMES)?;
        let before = raw.len();
        raw.retain(|v| match SavedTheme::deserialize(v) {
            Ok(theme) => keep(&theme),
            Err(_) => true,
        });
        let removed = before - raw.len();
        self.write_key(KEY_USER_THEMES, &raw)?;
        Ok(removed)
    }

    /// Install-time seeding: a single sample group, made active, when no
    /// `groups` entry exists yet. Returns true when it wrote anything.
    pub fn seed_defaults(&mut self) -> Result<bool> {
        let entries = self.inner.get(&[KEY_GROUPS])?;
        if entries.get(KEY_GROUPS).is_some_and(|v| !v.is_null()) {
            return Ok(false);
        }

        let mut seed = Entries::new();
        seed.insert(KEY_GROUPS.to_string(), serde_json::to_value(default_groups())?);
        seed.insert(KEY_ACTIVE_GROUP.to_string(), Value::String(DEFAULT_GROUP_ID.to_string()));
        self.inner.set(seed)?;
        info!("[STORE] Seeded default group '{}'", DEFAULT_GROUP_ID);
        Ok(true)
    }

    /// Stored array as-is. A value of the wrong shape refuses the write
    /// rather than replacing whatever is there.
    fn raw_list(&self, key: &str) -> Result<Vec<Value>> {
        let mut entries = self.inner.get(&[key])?;
        match entries.remove(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => bail!("'{key}' holds {other} instead of a list; not overwriting it"),
        }
    }

    fn raw_object(&self, key: &str) -> Result<Entries> {
        let mut entries = self.inner.get(&[key])?;
        match entries.remove(key) {
            None | Some(Value::Null) => Ok(Entries::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(other) => bail!("'{key}' holds {other} instead of a map; not overwriting it"),
        }
    }

    #[cfg(test)]
    pub fn raw_value(&self, key: &str) -> Result<Value> {
        let mut entries = self.inner.get(&[key])?;
        Ok(entries.remove(key).unwrap_or(Value::Null))
    }

    fn write_key<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let mut entries = Entries::new();
        entries.insert(key.to_string(), serde_json::to_value(value)?);
        self.inner.set(entries)
    }
}

fn read_key<T: DeserializeOwned + Default>(entries: &Entries, key: &str) -> T {
    let Some(value) = entries.get(key) else {
        return T::default();
    };
    if value.is_null() {
        return T::default();
    }

    match serde_json::from_value(value.clone()) {
        Ok(v) => v,
        Err(e) => {
            warn!("[STORE] Ignoring malformed '{}' entry: {}", key, e);
            T::default()
        }
    }
}

fn read_list<T: DeserializeOwned>(entries: &Entries, key: &str) -> Vec<T> {
    let items = match entries.get(key) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!("[STORE] '{}' is not a list; reading it as empty", key);
            return Vec::new();
        }
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match T::deserialize(item) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("[STORE] Skipping '{}'[{}]: {}", key, i, e);
                None
            }
        })
        .collect()
}

fn read_index_map(entries: &Entries, key: &str) -> IndexMap {
    let map = match entries.get(key) {
        None | Some(Value::Null) => return IndexMap::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            warn!("[STORE] '{}' is not a map; reading it as empty", key);
            return IndexMap::new();
        }
    };

    map.iter()
        .filter_map(|(group_id, value)| match value.as_u64() {
            Some(index) => Some((group_id.clone(), index as usize)),
            None => {
                warn!("[STORE] Skipping '{}'.{}: {} is not an offset", key, group_id, value);
                None
            }
        })
        .collect()
}
