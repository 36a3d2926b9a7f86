use leptos::task::spawn_local;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

/// Quiet period after the last edit to an entity before its commit fires.
pub(crate) const COMMIT_QUIET_MS: i32 = 1000;

struct PendingCommit {
    generation: u64,
    timer_id: i32,
}

/// Per-entity deferred-commit timers.
///
/// Rapid successive edits to one entity coalesce into a single remote write:
/// each `schedule` call cancels the entity's armed timer and re-arms it, so
/// only the last value within a quiet period is ever sent. An entity counts
/// as pending from the moment a timer is armed until its commit future
/// resolves; the reconciliation merger uses that window to shield the entity
/// from being overwritten by a reload.
#[derive(Clone)]
pub(crate) struct CommitScheduler {
    quiet_ms: i32,
    generation: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<String, PendingCommit>>>,
}

impl CommitScheduler {
    pub fn new() -> Self {
        Self {
            quiet_ms: COMMIT_QUIET_MS,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Arm (or re-arm) the commit timer for `entity_id`.
    ///
    /// The caller applies the optimistic edit to the store before calling
    /// this; `commit` is built to read the freshest state when it fires.
    pub fn schedule<F, Fut>(&self, entity_id: &str, commit: F)
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let Some(win) = web_sys::window() else {
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Ok(mut map) = self.pending.lock() {
            if let Some(prev) = map.remove(entity_id) {
                let _ = win.clear_timeout_with_handle(prev.timer_id);
            }
        }

        let pending = Arc::clone(&self.pending);
        let cb = Closure::once_into_js(move || {
            let fut = commit();
            spawn_local(async move {
                fut.await;
                // Clear by generation: a newer edit may have replaced the
                // entry under the same id while this commit was in flight.
                if let Ok(mut map) = pending.lock() {
                    map.retain(|_, p| p.generation != generation);
                }
            });
        });

        let timer_id = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                self.quiet_ms,
            )
            .unwrap_or(0);

        if let Ok(mut map) = self.pending.lock() {
            map.insert(
                entity_id.to_string(),
                PendingCommit {
                    generation,
                    timer_id,
                },
            );
        }
    }

    pub fn is_pending(&self, entity_id: &str) -> bool {
        self.pending
            .lock()
            .map(|map| map.contains_key(entity_id))
            .unwrap_or(false)
    }

    /// Drop the entity's pending commit, if any. Returns whether one existed
    /// (used by create paths to re-issue edits under the canonical id).
    pub fn cancel(&self, entity_id: &str) -> bool {
        let Ok(mut map) = self.pending.lock() else {
            return false;
        };

        match map.remove(entity_id) {
            Some(prev) => {
                if let Some(win) = web_sys::window() {
                    let _ = win.clear_timeout_with_handle(prev.timer_id);
                }
                true
            }
            None => false,
        }
    }

    /// Teardown: cancel every armed timer so no stray commit fires after the
    /// editing session's tree is discarded.
    pub fn cancel_all(&self) {
        let Ok(mut map) = self.pending.lock() else {
            return;
        };

        if let Some(win) = web_sys::window() {
            for (_, p) in map.iter() {
                let _ = win.clear_timeout_with_handle(p.timer_id);
            }
        }
        map.clear();
    }
}

// Browser-only tests: timers and spawn_local need a real event loop.
// Run with `cargo test --target wasm32-unknown-unknown`.
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    async fn sleep_ms(ms: i32) {
        let promise = js_sys::Promise::new(&mut |resolve, _| {
            web_sys::window()
                .unwrap()
                .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
                .unwrap();
        });
        let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
    }

    #[wasm_bindgen_test]
    fn test_schedule_marks_pending_and_cancel_clears() {
        let scheduler = CommitScheduler::new();
        assert!(!scheduler.is_pending("c1"));

        scheduler.schedule("c1", || async {});
        assert!(scheduler.is_pending("c1"));

        assert!(scheduler.cancel("c1"));
        assert!(!scheduler.is_pending("c1"));
        assert!(!scheduler.cancel("c1"));
    }

    #[wasm_bindgen_test]
    fn test_cancel_all_clears_every_entity() {
        let scheduler = CommitScheduler::new();
        scheduler.schedule("a", || async {});
        scheduler.schedule("b", || async {});

        scheduler.cancel_all();
        assert!(!scheduler.is_pending("a"));
        assert!(!scheduler.is_pending("b"));
    }

    #[wasm_bindgen_test]
    async fn test_rapid_edits_produce_one_commit_with_last_value() {
        let scheduler = CommitScheduler::new();
        let commits = Rc::new(Cell::new(0u32));
        let last = Rc::new(RefCell::new(String::new()));

        for value in ["I", "In", "Intro"] {
            let commits = Rc::clone(&commits);
            let last = Rc::clone(&last);
            let value = value.to_string();
            scheduler.schedule("c1", move || async move {
                commits.set(commits.get() + 1);
                *last.borrow_mut() = value;
            });
        }

        assert!(scheduler.is_pending("c1"));
        sleep_ms(COMMIT_QUIET_MS + 400).await;

        assert_eq!(commits.get(), 1);
        assert_eq!(last.borrow().as_str(), "Intro");
        assert!(!scheduler.is_pending("c1"));
    }

    #[wasm_bindgen_test]
    async fn test_cancelled_timer_never_fires() {
        let scheduler = CommitScheduler::new();
        let commits = Rc::new(Cell::new(0u32));

        let c2 = Rc::clone(&commits);
        scheduler.schedule("c1", move || async move {
            c2.set(c2.get() + 1);
        });
        scheduler.cancel_all();

        sleep_ms(COMMIT_QUIET_MS + 400).await;
        assert_eq!(commits.get(), 0);
    }
}
