use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    host::{AutoConfirm, InstalledTheme, Prompt, ThemeHost},
    info,
    model::{group_key, SavedTheme, DEFAULT_THEME_GROUP},
    store::{KeyValueStore, StateStore},
    warn,
};

pub const UNGROUPED_HEADER: &str = "Ungrouped Themes";
pub const NO_THEME_LOCKED: &str = "Click a theme button first!";

/* =========================
   SESSION STATE
   ========================= */

/// Hover/commit state for one open popup.
#[derive(Debug, Clone, Default)]
pub struct PopupSession {
    /// Theme that was active before a hover preview started.
    pub original_theme_id: Option<String>,
    /// Theme the user clicked; the only one that can be saved.
    pub locked_in: Option<InstalledTheme>,
    pub name_field: String,
    pub status: Option<String>,
    expanded: BTreeSet<String>,
}

impl PopupSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, label: &str) -> bool {
        self.expanded.contains(&group_key(label))
    }

    /// Flips a section open/closed; returns the new state.
    pub fn toggle_section(&mut self, label: &str) -> bool {
        let key = group_key(label);
        if self.expanded.remove(&key) {
            false
        } else {
            self.expanded.insert(key);
            true
        }
    }
}

/* =========================
   VIEW
   ========================= */

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSection {
    pub label: String,
    pub themes: Vec<InstalledTheme>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PopupView {
    pub sections: Vec<GroupSection>,
    pub ungrouped: Vec<InstalledTheme>,
}

/// Groups installed themes by saved label (upper-cased, first-seen order).
/// Saved entries whose theme is no longer installed are left out; the
/// ungrouped list holds installed themes that were never saved.
pub fn build_view(installed: &[InstalledTheme], saved: &[SavedTheme]) -> PopupView {
    let themes: Vec<&InstalledTheme> = installed.iter().filter(|t| t.is_theme()).collect();
    let mut sections: Vec<GroupSection> = Vec::new();

    for entry in saved {
        let label = entry.group_key();
        let position = match sections.iter().position(|s| s.label == label) {
            Some(i) => i,
            None => {
                sections.push(GroupSection { label, themes: Vec::new() });
                sections.len() - 1
            }
        };

        match themes.iter().find(|t| t.id == entry.id) {
            Some(theme) => sections[position].themes.push((*theme).clone()),
            None => warn!(
                "[POPUP] Saved theme '{}' ({}) is not installed; hiding it",
                entry.name, entry.id
            ),
        }
    }

    let ungrouped = themes
        .iter()
        .filter(|t| !saved.iter().any(|s| s.id == t.id))
        .map(|t| (*t).clone())
        .collect();

    PopupView { sections, ungrouped }
}

/// Plain-text rendering. Collapsed sections show `LABEL (n)`; expanded ones
/// show the bare label followed by their themes.
pub fn render_text(view: &PopupView, session: &PopupSession) -> String {
    let mut out = String::new();
    for section in &view.sections {
        if session.is_expanded(&section.label) {
            out.push_str(&format!("[-] {}  [x]\n", section.label));
            for theme in &section.themes {
                out.push_str(&format!("      {}  [x]\n", theme.name));
            }
        } else {
            out.push_str(&format!("[+] {} ({})  [x]\n", section.label, section.themes.len()));
        }
    }

    out.push_str(UNGROUPED_HEADER);
    out.push('\n');
    for theme in &view.ungrouped {
        out.push_str(&format!("      {}\n", theme.name));
    }
    out
}

/* =========================
   CONTROLLER
   ========================= */

pub struct PopupController<'a, S: KeyValueStore, T: ThemeHost + ?Sized> {
    store: &'a mut StateStore<S>,
    themes: &'a mut T,
    session: &'a mut PopupSession,
}

impl<'a, S: KeyValueStore, T: ThemeHost + ?Sized> PopupController<'a, S, T> {
    pub fn new(store: &'a mut StateStore<S>, themes: &'a mut T, session: &'a mut PopupSession) -> Self {
        Self { store, themes, session }
    }

    pub fn session(&self) -> &PopupSession {
        self.session
    }

    /// Rebuilds the whole list from the host and storage.
    pub fn render(&self) -> Result<PopupView> {
        let installed = self.themes.installed()?;
        let saved = self.store.user_themes()?;
        Ok(build_view(&installed, &saved))
    }

    pub fn pointer_enter(&mut self, theme_id: &str) -> Result<()> {
        let theme = self.installed_theme(theme_id)?;
        if let Some(active) = self.themes.active_theme()? {
            if active.id != theme.id {
                self.session.original_theme_id = Some(active.id);
            }
        }
        self.themes.set_enabled(&theme.id)
    }

    pub fn pointer_leave(&mut self) -> Result<()> {
        match self.session.original_theme_id.take() {
            Some(original) => self.themes.set_enabled(&original),
            None => Ok(()),
        }
    }

    /// Makes the preview stick. Returns the display name for the name field.
    pub fn click(&mut self, theme_id: &str) -> Result<String> {
        let theme = self.installed_theme(theme_id)?;
        self.session.original_theme_id = None;
        self.themes.set_enabled(&theme.id)?;

        self.session.name_field = theme.name.clone();
        self.session.locked_in = Some(theme);
        Ok(self.session.name_field.clone())
    }

    /// Files the locked-in theme under `label` (or `General`). Saving the
    /// same theme again adds another entry.
    pub fn save(&mut self, label: Option<&str>) -> Result<PopupView> {
        let Some(theme) = self.session.locked_in.clone() else {
            self.session.status = Some(NO_THEME_LOCKED.to_string());
            return self.render();
        };

        let label = match label {
            Some(l) if !l.trim().is_empty() => l.to_string(),
            _ => DEFAULT_THEME_GROUP.to_string(),
        };

        let entry = SavedTheme { id: theme.id.clone(), name: theme.name.clone(), group: label.clone() };
        self.store.append_user_theme(&entry)?;

        info!("[POPUP] Saved '{}' to {}", theme.name, label);
        self.session.status = Some(format!("Saved to {label}!"));
        self.render()
    }

    /// Drops every entry filed under `label` (any casing) once the user agrees.
    pub fn delete_group<P: Prompt + ?Sized>(&mut self, label: &str, prompt: &mut P) -> Result<PopupView> {
        if !prompt.confirm(&format!("Delete the {label} group?")) {
            return self.render();
        }

        let key = group_key(label);
        let removed = self.store.retain_user_themes(|s| s.group_key() != key)?;

        self.session.expanded.remove(&key);
        info!("[POPUP] Deleted group {} ({} entries)", key, removed);
        self.render()
    }

    /// Drops one theme from one group; the same theme under other labels stays.
    pub fn remove_theme(&mut self, theme_id: &str, label: &str) -> Result<PopupView> {
        let key = group_key(label);
        self.store.retain_user_themes(|s| !(s.id == theme_id && s.group_key() == key))?;
        self.render()
    }

    fn installed_theme(&self, theme_id: &str) -> Result<InstalledTheme> {
        self.themes
            .installed()?
            .into_iter()
            .find(|t| t.is_theme() && t.id == theme_id)
            .with_context(|| format!("theme {theme_id} is not installed"))
    }
}

/* =========================
   REQUESTS
   ========================= */

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum PopupRequest {
    #[serde(rename = "popup.view")]
    View,
    #[serde(rename = "popup.toggle")]
    Toggle { group: String },
    #[serde(rename = "popup.enter")]
    Enter {
        #[serde(rename = "themeId")]
        theme_id: String,
    },
    #[serde(rename = "popup.leave")]
    Leave,
    #[serde(rename = "popup.click")]
    Click {
        #[serde(rename = "themeId")]
        theme_id: String,
    },
    #[serde(rename = "popup.save")]
    Save {
        #[serde(default)]
        group: Option<String>,
    },
    #[serde(rename = "popup.deleteGroup")]
    DeleteGroup {
        group: String,
        #[serde(default)]
        confirmed: bool,
    },
    #[serde(rename = "popup.removeTheme")]
    RemoveTheme {
        #[serde(rename = "themeId")]
        theme_id: String,
        group: String,
    },
}

impl PopupRequest {
    pub fn parse(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<PopupView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

pub fn handle<S, T>(
    request: &PopupRequest,
    store: &mut StateStore<S>,
    themes: &mut T,
    session: &mut PopupSession,
) -> Result<PopupReply>
where
    S: KeyValueStore,
    T: ThemeHost + ?Sized,
{
    session.status = None;
    let mut controller = PopupController::new(store, themes, session);

    let view = match request {
        PopupRequest::View => Some(controller.render()?),
        PopupRequest::Toggle { group } => {
            controller.session.toggle_section(group);
            Some(controller.render()?)
        }
        PopupRequest::Enter { theme_id } => {
            controller.pointer_enter(theme_id)?;
            None
        }
        PopupRequest::Leave => {
            controller.pointer_leave()?;
            None
        }
        PopupRequest::Click { theme_id } => {
            controller.click(theme_id)?;
            None
        }
        PopupRequest::Save { group } => Some(controller.save(group.as_deref())?),
        PopupRequest::DeleteGroup { group, confirmed } => {
            Some(controller.delete_group(group, &mut AutoConfirm(*confirmed))?)
        }
        PopupRequest::RemoveTheme { theme_id, group } => Some(controller.remove_theme(theme_id, group)?),
    };

    let session = controller.session();
    let saved_ok = !matches!(request, PopupRequest::Save { .. }) || session.locked_in.is_some();
    let name_field = match request {
        PopupRequest::Click { .. } => Some(session.name_field.clone()),
        _ => None,
    };
    let text = view.as_ref().map(|v| render_text(v, session));

    Ok(PopupReply { ok: saved_ok, status: session.status.clone(), name_field, view, text })
}

#[cfg(test)]
mod tests {
    use anyhow::bail;
    use serde_json::json;

    use super::*;
    use crate::store::{Entries, MemoryStore};

    /// Theme host kept in memory; records every enable call.
    #[derive(Default)]
    struct FakeThemes {
        entries: Vec<InstalledTheme>,
        enabled_calls: Vec<String>,
    }

    impl FakeThemes {
        fn with(ids: &[&str], active: &str) -> Self {
            let mut entries: Vec<InstalledTheme> = ids
                .iter()
                .map(|id| InstalledTheme {
                    id: id.to_string(),
                    name: format!("{id} theme"),
                    kind: "theme".into(),
                    enabled: *id == active,
                })
                .collect();
            entries.push(InstalledTheme {
                id: "blocker".into(),
                name: "Ad Blocker".into(),
                kind: "extension".into(),
                enabled: true,
            });
            Self { entries, enabled_calls: Vec::new() }
        }

        fn active(&self) -> Option<&str> {
            self.entries.iter().find(|t| t.is_theme() && t.enabled).map(|t| t.id.as_str())
        }
    }

    impl ThemeHost for FakeThemes {
        fn installed(&self) -> Result<Vec<InstalledTheme>> {
            Ok(self.entries.clone())
        }

        fn set_enabled(&mut self, id: &str) -> Result<()> {
            if !self.entries.iter().any(|t| t.is_theme() && t.id == id) {
                bail!("no such theme {id}");
            }
            for t in self.entries.iter_mut().filter(|t| t.is_theme()) {
                t.enabled = t.id == id;
            }
            self.enabled_calls.push(id.to_string());
            Ok(())
        }
    }

    fn saved(id: &str, group: &str) -> SavedTheme {
        SavedTheme { id: id.into(), name: format!("{id} theme"), group: group.into() }
    }

    fn store_with_saved(entries: Vec<SavedTheme>) -> StateStore<MemoryStore> {
        let mut store = StateStore::new(MemoryStore::new());
        store.set_user_themes(&entries).unwrap();
        store
    }

    #[test]
    fn view_groups_case_insensitively_and_drops_dangling() {
        let themes = FakeThemes::with(&["a", "b", "c", "d"], "a");
        let view = build_view(
            &themes.entries,
            &[saved("a", "Soul"), saved("ghost", "soul"), saved("b", "soul"), saved("c", "Jungle")],
        );

        let labels: Vec<&str> = view.sections.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["SOUL", "JUNGLE"]);
        let soul: Vec<&str> = view.sections[0].themes.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(soul, vec!["a", "b"]);

        let ungrouped: Vec<&str> = view.ungrouped.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ungrouped, vec!["d"]);
    }

    #[test]
    fn section_with_only_dangling_entries_still_shows() {
        let themes = FakeThemes::with(&["a"], "a");
        let view = build_view(&themes.entries, &[saved("gone", "Retro")]);
        assert_eq!(view.sections.len(), 1);
        assert!(view.sections[0].themes.is_empty());
        assert_eq!(view.ungrouped.len(), 1);
    }

    #[test]
    fn hover_previews_and_leave_restores() {
        let mut store = store_with_saved(vec![]);
        let mut themes = FakeThemes::with(&["a", "b"], "a");
        let mut session = PopupSession::new();
        let mut popup = PopupController::new(&mut store, &mut themes, &mut session);

        popup.pointer_enter("b").unwrap();
        assert_eq!(popup.session().original_theme_id.as_deref(), Some("a"));
        popup.pointer_leave().unwrap();
        assert!(popup.session().original_theme_id.is_none());

        assert_eq!(themes.active(), Some("a"));
        assert_eq!(themes.enabled_calls, vec!["b", "a"]);
    }

    #[test]
    fn hovering_the_active_theme_records_nothing() {
        let mut store = store_with_saved(vec![]);
        let mut themes = FakeThemes::with(&["a", "b"], "a");
        let mut session = PopupSession::new();
        let mut popup = PopupController::new(&mut store, &mut themes, &mut session);

        popup.pointer_enter("a").unwrap();
        popup.pointer_leave().unwrap();
        assert_eq!(themes.enabled_calls, vec!["a"]);
    }

    #[test]
    fn click_commits_so_leave_is_a_no_op() {
        let mut store = store_with_saved(vec![]);
        let mut themes = FakeThemes::with(&["a", "b"], "a");
        let mut session = PopupSession::new();
        let mut popup = PopupController::new(&mut store, &mut themes, &mut session);

        popup.pointer_enter("b").unwrap();
        assert_eq!(popup.click("b").unwrap(), "b theme");
        popup.pointer_leave().unwrap();

        assert_eq!(themes.active(), Some("b"));
        assert_eq!(session.locked_in.as_ref().map(|t| t.id.as_str()), Some("b"));
        assert_eq!(session.name_field, "b theme");
    }

    #[test]
    fn unknown_theme_ids_are_errors() {
        let mut store = store_with_saved(vec![]);
        let mut themes = FakeThemes::with(&["a"], "a");
        let mut session = PopupSession::new();
        let mut popup = PopupController::new(&mut store, &mut themes, &mut session);

        assert!(popup.pointer_enter("blocker").is_err());
        assert!(popup.click("zzz").is_err());
    }

    #[test]
    fn save_without_lock_in_only_sets_status() {
        let mut store = store_with_saved(vec![]);
        let mut themes = FakeThemes::with(&["a"], "a");
        let mut session = PopupSession::new();
        let mut popup = PopupController::new(&mut store, &mut themes, &mut session);

        popup.save(Some("Soul")).unwrap();
        assert_eq!(popup.session().status.as_deref(), Some(NO_THEME_LOCKED));
        assert!(store.user_themes().unwrap().is_empty());
    }

    #[test]
    fn save_defaults_label_and_never_deduplicates() {
        let mut store = store_with_saved(vec![]);
        let mut themes = FakeThemes::with(&["a", "b"], "a");
        let mut session = PopupSession::new();
        let mut popup = PopupController::new(&mut store, &mut themes, &mut session);

        popup.click("b").unwrap();
        popup.save(None).unwrap();
        assert_eq!(popup.session().status.as_deref(), Some("Saved to General!"));
        popup.save(Some("  ")).unwrap();
        let view = popup.save(Some("Neon")).unwrap();

        let all = store.user_themes().unwrap();
        assert_eq!(all, vec![saved("b", "General"), saved("b", "General"), saved("b", "Neon")]);
        assert_eq!(view.sections.len(), 2);
        assert_eq!(view.sections[0].themes.len(), 2);
    }

    #[test]
    fn labels_are_stored_as_typed() {
        let mut store = store_with_saved(vec![]);
        let mut themes = FakeThemes::with(&["a"], "a");
        let mut session = PopupSession::new();
        let mut popup = PopupController::new(&mut store, &mut themes, &mut session);

        popup.click("a").unwrap();
        popup.save(Some(" Soul ")).unwrap();
        assert_eq!(popup.session().status.as_deref(), Some("Saved to  Soul !"));
        assert_eq!(store.user_themes().unwrap(), vec![saved("a", " Soul ")]);
    }

    #[test]
    fn unreadable_saved_entries_survive_edits() {
        let mut raw = MemoryStore::new();
        let mut entries = Entries::new();
        entries.insert(
            "userThemes".into(),
            json!([
                { "id": "a", "name": "a theme", "group": "Soul" },
                { "id": "b", "name": "b theme", "group": "Jungle" },
                { "name": "no id" }
            ]),
        );
        raw.set(entries).unwrap();
        let mut store = StateStore::new(raw);
        let mut themes = FakeThemes::with(&["a", "b", "c"], "a");
        let mut session = PopupSession::new();
        let mut popup = PopupController::new(&mut store, &mut themes, &mut session);

        popup.click("c").unwrap();
        let view = popup.save(Some("Neon")).unwrap();
        assert_eq!(view.sections.len(), 3);
        popup.remove_theme("a", "soul").unwrap();
        popup.delete_group("Jungle", &mut AutoConfirm(true)).unwrap();

        assert_eq!(store.user_themes().unwrap(), vec![saved("c", "Neon")]);
        assert_eq!(
            store.raw_value("userThemes").unwrap(),
            json!([{ "name": "no id" }, { "id": "c", "name": "c theme", "group": "Neon" }])
        );
    }

    #[test]
    fn same_theme_in_two_groups_is_removed_independently() {
        let mut store = store_with_saved(vec![]);
        let mut themes = FakeThemes::with(&["a"], "a");
        let mut session = PopupSession::new();
        let mut popup = PopupController::new(&mut store, &mut themes, &mut session);

        popup.click("a").unwrap();
        popup.save(Some("Soul")).unwrap();
        popup.save(Some("Jungle")).unwrap();

        let view = popup.remove_theme("a", "soul").unwrap();
        let labels: Vec<&str> = view.sections.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["JUNGLE"]);
        assert_eq!(store.user_themes().unwrap(), vec![saved("a", "Jungle")]);
    }

    #[test]
    fn delete_group_removes_all_and_only_matching_labels() {
        let mut store = store_with_saved(vec![saved("a", "Soul"), saved("b", "soul"), saved("c", "Jungle")]);
        let mut themes = FakeThemes::with(&["a", "b", "c"], "a");
        let mut session = PopupSession::new();
        let mut popup = PopupController::new(&mut store, &mut themes, &mut session);

        popup.delete_group("SOUL", &mut AutoConfirm(true)).unwrap();
        assert_eq!(store.user_themes().unwrap(), vec![saved("c", "Jungle")]);
    }

    #[test]
    fn declined_delete_keeps_everything() {
        let entries = vec![saved("a", "Soul"), saved("c", "Jungle")];
        let mut store = store_with_saved(entries.clone());
        let mut themes = FakeThemes::with(&["a", "c"], "a");
        let mut session = PopupSession::new();
        let mut popup = PopupController::new(&mut store, &mut themes, &mut session);

        popup.delete_group("Soul", &mut AutoConfirm(false)).unwrap();
        assert_eq!(store.user_themes().unwrap(), entries);
    }

    #[test]
    fn text_rendering_follows_section_toggles() {
        let themes = FakeThemes::with(&["a", "b"], "a");
        let view = build_view(&themes.entries, &[saved("a", "soul")]);
        let mut session = PopupSession::new();

        let collapsed = render_text(&view, &session);
        assert!(collapsed.contains("SOUL (1)"));
        assert!(!collapsed.contains("a theme"));
        assert!(collapsed.contains("Ungrouped Themes\n      b theme"));

        assert!(session.toggle_section("Soul"));
        let expanded = render_text(&view, &session);
        assert!(expanded.contains("[-] SOUL"));
        assert!(expanded.contains("a theme"));
    }

    #[test]
    fn requests_drive_the_controller() {
        let mut store = store_with_saved(vec![]);
        let mut themes = FakeThemes::with(&["a", "b"], "a");
        let mut session = PopupSession::new();

        let click = PopupRequest::parse(&json!({ "type": "popup.click", "themeId": "b" })).unwrap();
        let reply = handle(&click, &mut store, &mut themes, &mut session).unwrap();
        assert_eq!(reply.name_field.as_deref(), Some("b theme"));

        let save = PopupRequest::parse(&json!({ "type": "popup.save", "group": "Dusk" })).unwrap();
        let reply = handle(&save, &mut store, &mut themes, &mut session).unwrap();
        assert!(reply.ok);
        assert_eq!(reply.status.as_deref(), Some("Saved to Dusk!"));
        assert!(reply.text.unwrap().contains("DUSK (1)"));

        let delete = PopupRequest::parse(&json!({ "type": "popup.deleteGroup", "group": "dusk" })).unwrap();
        handle(&delete, &mut store, &mut themes, &mut session).unwrap();
        assert_eq!(store.user_themes().unwrap().len(), 1, "unconfirmed delete must not remove");

        assert!(PopupRequest::parse(&json!({ "type": "popup.click" })).is_none());
        assert!(PopupRequest::parse(&json!({ "type": "getState" })).is_none());
    }

    #[test]
    fn save_request_without_lock_in_is_not_ok() {
        let mut store = store_with_saved(vec![]);
        let mut themes = FakeThemes::with(&["a"], "a");
        let mut session = PopupSession::new();

        let save = PopupRequest::Save { group: None };
        let reply = handle(&save, &mut store, &mut themes, &mut session).unwrap();
        assert!(!reply.ok);
        assert_eq!(reply.status.as_deref(), Some(NO_THEME_LOCKED));
    }
}
