use crate::storage::{load_json_from_storage, save_json_to_storage, EXPANDED_SECTIONS_KEY};
use leptos::prelude::*;
use std::collections::HashSet;

/// UI-only attributes, kept out of the entity tree on purpose.
///
/// Expanded/collapsed sections and open inline editors are addressed by
/// entity id in these side maps, so a structural reload (and the merge that
/// follows it) can replace outline rows without collapsing what the operator
/// just opened. The reconciliation merger never reads or writes this table.
#[derive(Clone)]
pub struct UiStateTable {
    /// Ids of chapters/sub-chapters the operator expanded. Persisted, so the
    /// outline reopens the way it was left.
    expanded: RwSignal<HashSet<String>>,

    /// Ids with an inline editor open right now. Session-only.
    open_editors: RwSignal<HashSet<String>>,
}

impl UiStateTable {
    pub fn new() -> Self {
        let stored: HashSet<String> =
            load_json_from_storage(EXPANDED_SECTIONS_KEY).unwrap_or_default();

        Self {
            expanded: RwSignal::new(stored),
            open_editors: RwSignal::new(HashSet::new()),
        }
    }

    pub fn is_expanded(&self, entity_id: &str) -> bool {
        self.expanded.with(|set| set.contains(entity_id))
    }

    pub fn set_expanded(&self, entity_id: &str, expanded: bool) {
        self.expanded.update(|set| {
            if expanded {
                set.insert(entity_id.to_string());
            } else {
                set.remove(entity_id);
            }
        });
        self.persist_expanded();
    }

    pub fn toggle_expanded(&self, entity_id: &str) {
        let next = !self.is_expanded(entity_id);
        self.set_expanded(entity_id, next);
    }

    pub fn is_editor_open(&self, entity_id: &str) -> bool {
        self.open_editors.with(|set| set.contains(entity_id))
    }

    pub fn open_editor(&self, entity_id: &str) {
        self.open_editors.update(|set| {
            set.insert(entity_id.to_string());
        });
    }

    pub fn close_editor(&self, entity_id: &str) {
        self.open_editors.update(|set| {
            set.remove(entity_id);
        });
    }

    /// Drop all side-table entries for a deleted entity so stale ids don't
    /// accumulate in storage.
    pub fn forget(&self, entity_id: &str) {
        self.expanded.update(|set| {
            set.remove(entity_id);
        });
        self.open_editors.update(|set| {
            set.remove(entity_id);
        });
        self.persist_expanded();
    }

    /// Rekey entries when a temporary id is swapped for the canonical one.
    pub fn adopt_id(&self, tmp_id: &str, real_id: &str) {
        self.expanded.update(|set| {
            if set.remove(tmp_id) {
                set.insert(real_id.to_string());
            }
        });
        self.open_editors.update(|set| {
            if set.remove(tmp_id) {
                set.insert(real_id.to_string());
            }
        });
        self.persist_expanded();
    }

    fn persist_expanded(&self) {
        self.expanded
            .with_untracked(|set| save_json_to_storage(EXPANDED_SECTIONS_KEY, set));
    }
}

impl Default for UiStateTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_expand_toggle_and_forget() {
        let ui = UiStateTable::new();
        ui.set_expanded("c1", false);

        assert!(!ui.is_expanded("c1"));
        ui.toggle_expanded("c1");
        assert!(ui.is_expanded("c1"));

        ui.open_editor("c1");
        assert!(ui.is_editor_open("c1"));

        ui.forget("c1");
        assert!(!ui.is_expanded("c1"));
        assert!(!ui.is_editor_open("c1"));
    }

    #[wasm_bindgen_test]
    fn test_expanded_set_survives_reload() {
        let ui = UiStateTable::new();
        ui.set_expanded("c-persist", true);

        // A fresh table (as after a page reload) reads the persisted set.
        let again = UiStateTable::new();
        assert!(again.is_expanded("c-persist"));

        again.forget("c-persist");
    }

    #[wasm_bindgen_test]
    fn test_adopt_id_rekeys_entries() {
        let ui = UiStateTable::new();
        ui.set_expanded("tmp-7-1", true);
        ui.open_editor("tmp-7-1");

        ui.adopt_id("tmp-7-1", "c-real");

        assert!(!ui.is_expanded("tmp-7-1"));
        assert!(ui.is_expanded("c-real"));
        assert!(ui.is_editor_open("c-real"));

        ui.forget("c-real");
    }
}
