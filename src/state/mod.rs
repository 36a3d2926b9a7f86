mod commit_scheduler;
mod outline_sync;
mod ui_state;

pub(crate) use commit_scheduler::CommitScheduler;
pub use outline_sync::{MutationOutcome, OutlineSyncController};
pub use ui_state::UiStateTable;

use crate::api::ApiClient;
use crate::outline::OutlineStore;
use crate::storage::{load_string_from_storage, save_string_to_storage, CURRENT_COURSE_KEY};
use leptos::prelude::*;

#[derive(Clone)]
pub struct AppState {
    pub api_client: RwSignal<ApiClient>,

    /// Course whose outline is being edited (drives every remote call).
    pub course_id: RwSignal<String>,

    /// The synchronized outline. Mutated only through the controller.
    pub outline: RwSignal<OutlineStore>,

    pub outline_loading: RwSignal<bool>,
    pub outline_error: RwSignal<Option<String>>,

    /// Reload guard: ignore responses of superseded reloads.
    pub outline_request_id: RwSignal<u64>,

    /// Connectivity marker; flips false on network-kind failures so the
    /// surface can show an offline hint, back true on the next success.
    pub backend_online: RwSignal<bool>,

    /// Last best-effort commit failure (kept out of the operator's way).
    pub last_sync_error: RwSignal<Option<String>>,

    pub ui: UiStateTable,
}

impl AppState {
    pub fn new() -> Self {
        let stored_client = ApiClient::load_from_storage();
        let course_id = load_string_from_storage(CURRENT_COURSE_KEY).unwrap_or_default();

        Self {
            api_client: RwSignal::new(stored_client),
            course_id: RwSignal::new(course_id),
            outline: RwSignal::new(OutlineStore::default()),
            outline_loading: RwSignal::new(false),
            outline_error: RwSignal::new(None),
            outline_request_id: RwSignal::new(0),
            backend_online: RwSignal::new(true),
            last_sync_error: RwSignal::new(None),
            ui: UiStateTable::new(),
        }
    }

    /// Select a course and persist the choice for future sessions.
    pub fn set_course(&self, course_id: &str) {
        self.course_id.set(course_id.to_string());
        save_string_to_storage(CURRENT_COURSE_KEY, course_id);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppContext(pub AppState);
