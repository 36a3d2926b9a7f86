//! Synchronization core of the course outline builder.
//!
//! Holds the in-memory outline (groupings, chapters, sub-chapters, content
//! items, evaluations, support files), keeps it synchronized with the remote
//! persistence service while the operator edits, and shields un-committed
//! local work from periodic full reloads. The presentation layer consumes
//! this crate through [`state::OutlineSyncController`] and the signals on
//! [`state::AppState`].

pub mod api;
pub mod models;
pub mod outline;
pub mod state;
mod storage;
mod util;

use leptos::prelude::*;
use state::{AppContext, AppState, OutlineSyncController};

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

/// Wire the authoring state into the reactive context.
///
/// The hosting view layer calls this once at the top of the tree, then reads
/// state through `expect_context::<AppContext>()` and drives edits through
/// the returned controller (also provided as context). Call
/// `controller.teardown()` when the editing session ends.
pub fn provide_authoring_context() -> OutlineSyncController {
    let state = AppState::new();
    provide_context(AppContext(state.clone()));

    let controller = OutlineSyncController::new(state);
    provide_context(controller.clone());
    controller
}

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
}
