use crate::api::{
    ApiClient, ApiError, ApiErrorKind, CreateChapterRequest, CreateContentItemRequest,
    CreateEvaluationRequest, CreateGroupingRequest, CreateSubChapterRequest,
    UpdateChapterRequest, UpdateContentItemRequest, UpdateEvaluationRequest,
    UpdateGroupingRequest, UpdateSubChapterRequest,
};
use crate::models::{
    Chapter, ContentItem, ContentKind, Evaluation, EvaluationKind, Grouping, ParentRef,
    SubChapter, SupportFileUpload,
};
use crate::outline::merge::reconcile_outline;
use crate::outline::reorder::reorder_assignments;
use crate::outline::{
    ChapterPatch, ContentPatch, EvaluationPatch, GroupingPatch, OutlineStore, SubChapterPatch,
};
use crate::state::{AppState, CommitScheduler};
use crate::util::{is_tmp_id, make_tmp_id, now_ms};
use leptos::prelude::*;
use leptos::task::spawn_local;

/// Receipt for a structural mutation.
///
/// `Applied` means the optimistic local mutation took and the remote call was
/// dispatched; a later remote failure is reported through
/// `AppState::last_sync_error` rather than by blocking the operator.
/// `Rejected` means validation failed and nothing was changed or sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    Rejected(String),
}

fn reject(message: impl Into<String>) -> MutationOutcome {
    MutationOutcome::Rejected(message.into())
}

/// Synchronization engine for one course outline.
///
/// All store mutations happen synchronously on the UI thread; remote calls
/// run in `spawn_local` and never block further edits. Text edits debounce
/// per entity through the [`CommitScheduler`]; reloads land through
/// [`reconcile_outline`], which consults the scheduler's pending set so an
/// in-flight edit is never clobbered.
#[derive(Clone)]
pub struct OutlineSyncController {
    state: AppState,
    scheduler: CommitScheduler,
}

impl OutlineSyncController {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            scheduler: CommitScheduler::new(),
        }
    }

    pub fn is_pending(&self, entity_id: &str) -> bool {
        self.scheduler.is_pending(entity_id)
    }

    /// End of the editing session: no stray commits after the tree is gone.
    pub fn teardown(&self) {
        self.scheduler.cancel_all();
    }

    fn outline_snapshot(&self) -> OutlineStore {
        self.state.outline.get_untracked()
    }

    fn mutate(&self, f: impl FnOnce(&OutlineStore) -> OutlineStore) {
        self.state.outline.update(|o| *o = f(o));
    }

    fn course_and_client(&self) -> (String, ApiClient) {
        (
            self.state.course_id.get_untracked(),
            self.state.api_client.get_untracked(),
        )
    }

    fn mark_backend_online(&self) {
        self.state.backend_online.set(true);
        self.state.last_sync_error.set(None);
    }

    /// Best-effort policy: log, record, keep the optimistic local state.
    fn record_api_error(&self, ctx: &str, e: &ApiError) {
        leptos::logging::warn!("{ctx} failed: {e}");
        self.state.last_sync_error.set(Some(format!("{ctx}: {e}")));
        if e.kind == ApiErrorKind::Network {
            self.state.backend_online.set(false);
        }
    }

    // ---- reload -----------------------------------------------------------

    /// Full reload from the remote store, merged into local state. Can run at
    /// any time, including while edits are in flight.
    pub fn load_outline(&self) {
        let course_id = self.state.course_id.get_untracked();
        if course_id.trim().is_empty() {
            return;
        }

        // Stale-response guard: only the newest reload may land.
        let req_id = self
            .state
            .outline_request_id
            .get_untracked()
            .saturating_add(1);
        self.state.outline_request_id.set(req_id);

        self.state.outline_loading.set(true);
        self.state.outline_error.set(None);

        let api = self.state.api_client.get_untracked();
        let s = self.clone();
        spawn_local(async move {
            let result = api.list_outline(&course_id).await;

            if s.state.outline_request_id.get_untracked() != req_id {
                return;
            }

            match result {
                Ok(remote) => {
                    s.mark_backend_online();
                    s.adopt_remote(remote);
                }
                Err(e) => {
                    s.record_api_error("load outline", &e);
                    s.state.outline_error.set(Some(e.to_string()));
                }
            }
            s.state.outline_loading.set(false);
        });
    }

    fn adopt_remote(&self, remote: OutlineStore) {
        let scheduler = self.scheduler.clone();
        self.state.outline.update(|local| {
            *local = reconcile_outline(local, &remote, |id| scheduler.is_pending(id));
        });
    }

    // ---- debounced field edits -------------------------------------------

    pub fn edit_grouping_title(&self, grouping_id: &str, title: &str) {
        let title = title.to_string();
        self.mutate(|o| {
            o.with_grouping_updated(
                grouping_id,
                GroupingPatch {
                    title: Some(title),
                    ..Default::default()
                },
            )
        });
        self.schedule_grouping_commit(grouping_id);
    }

    pub fn edit_chapter_title(&self, chapter_id: &str, title: &str) {
        let title = title.to_string();
        self.mutate(|o| {
            o.with_chapter_updated(
                chapter_id,
                ChapterPatch {
                    title: Some(title),
                    ..Default::default()
                },
            )
        });
        self.schedule_chapter_commit(chapter_id);
    }

    pub fn edit_sub_chapter_title(&self, sub_chapter_id: &str, title: &str) {
        let title = title.to_string();
        self.mutate(|o| {
            o.with_sub_chapter_updated(
                sub_chapter_id,
                SubChapterPatch {
                    title: Some(title),
                    ..Default::default()
                },
            )
        });
        self.schedule_sub_chapter_commit(sub_chapter_id);
    }

    pub fn edit_content_item(&self, content_id: &str, patch: ContentPatch) {
        self.mutate(|o| o.with_content_updated(content_id, patch));
        self.schedule_content_commit(content_id);
    }

    pub fn edit_evaluation(&self, evaluation_id: &str, patch: EvaluationPatch) {
        self.mutate(|o| o.with_evaluation_updated(evaluation_id, patch));
        self.schedule_evaluation_commit(evaluation_id);
    }

    // Commit closures read the freshest store state when the timer fires, so
    // the write always carries the latest value, never a superseded one.

    fn schedule_grouping_commit(&self, grouping_id: &str) {
        let s = self.clone();
        let id = grouping_id.to_string();
        self.scheduler.schedule(grouping_id, move || async move {
            if is_tmp_id(&id) {
                // Not confirmed yet; the create path backfills edits once the
                // canonical id arrives.
                return;
            }
            let Some(g) = s.outline_snapshot().grouping(&id).cloned() else {
                return;
            };
            let (course_id, api) = s.course_and_client();
            let req = UpdateGroupingRequest {
                course_id,
                id: id.clone(),
                title: Some(g.title),
                order: None,
            };
            match api.update_grouping(req).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("update grouping", &e),
            }
        });
    }

    fn schedule_chapter_commit(&self, chapter_id: &str) {
        let s = self.clone();
        let id = chapter_id.to_string();
        self.scheduler.schedule(chapter_id, move || async move {
            if is_tmp_id(&id) {
                return;
            }
            let Some(c) = s.outline_snapshot().chapter(&id).cloned() else {
                return;
            };
            // An unconfirmed grouping has no server id; leave the membership
            // untouched rather than orphaning or sending a tmp id.
            let grouping_field = match &c.grouping_id {
                Some(g) if is_tmp_id(g) => None,
                other => Some(other.clone()),
            };
            let (course_id, api) = s.course_and_client();
            let req = UpdateChapterRequest {
                course_id,
                id: id.clone(),
                title: Some(c.title),
                order: None,
                grouping_id: grouping_field,
            };
            match api.update_chapter(req).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("update chapter", &e),
            }
        });
    }

    fn schedule_sub_chapter_commit(&self, sub_chapter_id: &str) {
        let s = self.clone();
        let id = sub_chapter_id.to_string();
        self.scheduler.schedule(sub_chapter_id, move || async move {
            if is_tmp_id(&id) {
                return;
            }
            let Some(sc) = s.outline_snapshot().sub_chapter(&id).cloned() else {
                return;
            };
            let (course_id, api) = s.course_and_client();
            let req = UpdateSubChapterRequest {
                course_id,
                id: id.clone(),
                title: Some(sc.title),
                order: None,
            };
            match api.update_sub_chapter(req).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("update sub-chapter", &e),
            }
        });
    }

    fn schedule_content_commit(&self, content_id: &str) {
        let s = self.clone();
        let id = content_id.to_string();
        self.scheduler.schedule(content_id, move || async move {
            if is_tmp_id(&id) {
                return;
            }
            let Some(item) = s
                .outline_snapshot()
                .contents
                .iter()
                .find(|i| i.id == id)
                .cloned()
            else {
                return;
            };
            let (course_id, api) = s.course_and_client();
            let req = UpdateContentItemRequest {
                course_id,
                id: id.clone(),
                kind: Some(item.kind),
                title: Some(item.title),
                body: Some(item.body),
                attached_file: Some(item.attached_file),
                order: None,
            };
            match api.update_content_item(req).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("update content item", &e),
            }
        });
    }

    fn schedule_evaluation_commit(&self, evaluation_id: &str) {
        let s = self.clone();
        let id = evaluation_id.to_string();
        self.scheduler.schedule(evaluation_id, move || async move {
            if is_tmp_id(&id) {
                return;
            }
            let Some(ev) = s
                .outline_snapshot()
                .evaluations
                .iter()
                .find(|e| e.id == id)
                .cloned()
            else {
                return;
            };
            let (course_id, api) = s.course_and_client();
            let req = UpdateEvaluationRequest {
                course_id,
                id: id.clone(),
                kind: Some(ev.kind),
                title: Some(ev.title),
                description: Some(ev.description),
                due_date: Some(ev.due_date),
                attached_file: Some(ev.attached_file),
                order: None,
            };
            match api.update_evaluation(req).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("update evaluation", &e),
            }
        });
    }

    // ---- groupings --------------------------------------------------------

    pub fn add_grouping(&self, title: &str) -> MutationOutcome {
        let title = title.trim();
        if title.is_empty() {
            return reject("grouping title must not be empty");
        }

        let tmp_id = make_tmp_id(now_ms());
        let order = self.outline_snapshot().groupings.len() as u32;
        let grouping = Grouping {
            id: tmp_id.clone(),
            title: title.to_string(),
            order,
        };
        self.mutate(|o| o.with_grouping_added(grouping));

        let s = self.clone();
        let sent_title = title.to_string();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            let req = CreateGroupingRequest {
                course_id,
                title: sent_title.clone(),
                order,
            };
            match api.create_grouping(req).await {
                Ok(created) => {
                    s.mark_backend_online();
                    s.finish_grouping_create(&tmp_id, &created, &sent_title);
                }
                Err(e) => s.record_api_error("create grouping", &e),
            }
        });

        MutationOutcome::Applied
    }

    fn finish_grouping_create(&self, tmp_id: &str, created: &Grouping, sent_title: &str) {
        let had_pending = self.scheduler.cancel(tmp_id);
        self.state.ui.adopt_id(tmp_id, &created.id);

        let created_id = created.id.clone();
        let created_order = created.order;
        self.mutate(|o| {
            o.with_id_swapped(tmp_id, &created_id).with_grouping_updated(
                &created_id,
                GroupingPatch {
                    order: Some(created_order),
                    ..Default::default()
                },
            )
        });

        // Edits typed while the create round trip was in flight commit under
        // the canonical id.
        let renamed = self
            .outline_snapshot()
            .grouping(&created.id)
            .map(|g| g.title != sent_title)
            .unwrap_or(false);
        if had_pending || renamed {
            self.schedule_grouping_commit(&created.id);
        }

        // Chapters attached while the grouping was unconfirmed could not
        // carry the membership on their own create; commit them now that the
        // canonical id exists.
        let members: Vec<String> = self
            .outline_snapshot()
            .chapters
            .iter()
            .filter(|c| c.grouping_id.as_deref() == Some(created.id.as_str()) && !is_tmp_id(&c.id))
            .map(|c| c.id.clone())
            .collect();
        for chapter_id in members {
            self.schedule_chapter_commit(&chapter_id);
        }
    }

    /// Delete a grouping. Its chapters become orphans, locally and remotely.
    pub fn delete_grouping(&self, grouping_id: &str) -> MutationOutcome {
        if self.outline_snapshot().grouping(grouping_id).is_none() {
            return reject(format!("unknown grouping: {grouping_id}"));
        }

        self.scheduler.cancel(grouping_id);
        self.state.ui.forget(grouping_id);

        let id = grouping_id.to_string();
        self.mutate(|o| o.with_grouping_removed(&id));

        if is_tmp_id(grouping_id) {
            // Never reached the server; nothing remote to delete.
            return MutationOutcome::Applied;
        }

        let s = self.clone();
        let id = grouping_id.to_string();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            match api.delete_grouping(&course_id, &id).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("delete grouping", &e),
            }
        });

        MutationOutcome::Applied
    }

    // ---- chapters ---------------------------------------------------------

    pub fn add_chapter(&self, grouping_id: Option<&str>, title: &str) -> MutationOutcome {
        let title = title.trim();
        if title.is_empty() {
            return reject("chapter title must not be empty");
        }

        let snapshot = self.outline_snapshot();
        if let Some(gid) = grouping_id {
            if snapshot.grouping(gid).is_none() {
                return reject(format!("unknown grouping: {gid}"));
            }
        }

        let tmp_id = make_tmp_id(now_ms());
        let order = snapshot.chapters_of(grouping_id).len() as u32;
        let chapter = Chapter {
            id: tmp_id.clone(),
            title: title.to_string(),
            order,
            grouping_id: grouping_id.map(|g| g.to_string()),
            quizzes: vec![],
        };
        self.mutate(|o| o.with_chapter_added(chapter));

        // A grouping that is itself unconfirmed has no server id to attach
        // to; the chapter commit backfills the membership after both creates
        // settle (tmp references are swapped store-wide on adoption).
        let wire_grouping = grouping_id
            .filter(|g| !is_tmp_id(g))
            .map(|g| g.to_string());

        let s = self.clone();
        let sent_title = title.to_string();
        let sent_grouping = wire_grouping.clone();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            let req = CreateChapterRequest {
                course_id,
                title: sent_title.clone(),
                grouping_id: wire_grouping,
                order,
            };
            match api.create_chapter(req).await {
                Ok(created) => {
                    s.mark_backend_online();
                    s.finish_chapter_create(&tmp_id, &created, &sent_title, &sent_grouping);
                }
                Err(e) => s.record_api_error("create chapter", &e),
            }
        });

        MutationOutcome::Applied
    }

    fn finish_chapter_create(
        &self,
        tmp_id: &str,
        created: &Chapter,
        sent_title: &str,
        sent_grouping: &Option<String>,
    ) {
        let had_pending = self.scheduler.cancel(tmp_id);
        self.state.ui.adopt_id(tmp_id, &created.id);

        let created_id = created.id.clone();
        let created_order = created.order;
        self.mutate(|o| {
            o.with_id_swapped(tmp_id, &created_id).with_chapter_updated(
                &created_id,
                ChapterPatch {
                    order: Some(created_order),
                    ..Default::default()
                },
            )
        });

        let drifted = self
            .outline_snapshot()
            .chapter(&created.id)
            .map(|c| c.title != sent_title || &c.grouping_id != sent_grouping)
            .unwrap_or(false);
        if had_pending || drifted {
            self.schedule_chapter_commit(&created.id);
        }
    }

    pub fn delete_chapter(&self, chapter_id: &str) -> MutationOutcome {
        let snapshot = self.outline_snapshot();
        if snapshot.chapter(chapter_id).is_none() {
            return reject(format!("unknown chapter: {chapter_id}"));
        }

        // The whole subtree goes; drop its timers and UI-state entries too.
        for id in snapshot.chapter_subtree_ids(chapter_id) {
            self.scheduler.cancel(&id);
            self.state.ui.forget(&id);
        }

        let id = chapter_id.to_string();
        self.mutate(|o| o.with_chapter_removed(&id));

        if is_tmp_id(chapter_id) {
            return MutationOutcome::Applied;
        }

        let s = self.clone();
        let id = chapter_id.to_string();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            match api.delete_chapter(&course_id, &id).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("delete chapter", &e),
            }
        });

        MutationOutcome::Applied
    }

    /// Move a chapter into a grouping, or out of any (`None` orphans it).
    pub fn move_chapter_to_grouping(
        &self,
        chapter_id: &str,
        grouping_id: Option<&str>,
    ) -> MutationOutcome {
        let snapshot = self.outline_snapshot();
        if snapshot.chapter(chapter_id).is_none() {
            return reject(format!("unknown chapter: {chapter_id}"));
        }
        if let Some(gid) = grouping_id {
            if snapshot.grouping(gid).is_none() {
                return reject(format!("unknown grouping: {gid}"));
            }
        }

        let new_grouping = grouping_id.map(|g| g.to_string());
        let moved_grouping = new_grouping.clone();
        self.mutate(|o| o.with_chapter_moved(chapter_id, moved_grouping));

        if is_tmp_id(chapter_id) {
            // The membership rides along with the create backfill.
            return MutationOutcome::Applied;
        }

        let new_order = self
            .outline_snapshot()
            .chapter(chapter_id)
            .map(|c| c.order);

        let s = self.clone();
        let id = chapter_id.to_string();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            let req = UpdateChapterRequest {
                course_id,
                id: id.clone(),
                title: None,
                order: new_order,
                grouping_id: Some(new_grouping),
            };
            match api.update_chapter(req).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("move chapter", &e),
            }
        });

        MutationOutcome::Applied
    }

    // ---- sub-chapters -----------------------------------------------------

    pub fn add_sub_chapter(&self, chapter_id: &str, title: &str) -> MutationOutcome {
        let title = title.trim();
        if title.is_empty() {
            return reject("sub-chapter title must not be empty");
        }

        let snapshot = self.outline_snapshot();
        if snapshot.chapter(chapter_id).is_none() {
            return reject(format!("unknown chapter: {chapter_id}"));
        }
        if is_tmp_id(chapter_id) {
            return reject("chapter is not confirmed yet; retry in a moment");
        }

        let tmp_id = make_tmp_id(now_ms());
        let order = snapshot.sub_chapters_of(chapter_id).len() as u32;
        let sub = SubChapter {
            id: tmp_id.clone(),
            title: title.to_string(),
            order,
            chapter_id: chapter_id.to_string(),
        };
        self.mutate(|o| o.with_sub_chapter_added(sub));

        let s = self.clone();
        let sent_title = title.to_string();
        let chapter_id = chapter_id.to_string();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            let req = CreateSubChapterRequest {
                course_id,
                chapter_id,
                title: sent_title.clone(),
                order,
            };
            match api.create_sub_chapter(req).await {
                Ok(created) => {
                    s.mark_backend_online();
                    s.finish_sub_chapter_create(&tmp_id, &created, &sent_title);
                }
                Err(e) => s.record_api_error("create sub-chapter", &e),
            }
        });

        MutationOutcome::Applied
    }

    fn finish_sub_chapter_create(&self, tmp_id: &str, created: &SubChapter, sent_title: &str) {
        let had_pending = self.scheduler.cancel(tmp_id);
        self.state.ui.adopt_id(tmp_id, &created.id);

        let created_id = created.id.clone();
        let created_order = created.order;
        self.mutate(|o| {
            o.with_id_swapped(tmp_id, &created_id).with_sub_chapter_updated(
                &created_id,
                SubChapterPatch {
                    order: Some(created_order),
                    ..Default::default()
                },
            )
        });

        let renamed = self
            .outline_snapshot()
            .sub_chapter(&created.id)
            .map(|sc| sc.title != sent_title)
            .unwrap_or(false);
        if had_pending || renamed {
            self.schedule_sub_chapter_commit(&created.id);
        }
    }

    pub fn delete_sub_chapter(&self, sub_chapter_id: &str) -> MutationOutcome {
        let snapshot = self.outline_snapshot();
        let Some(sub) = snapshot.sub_chapter(sub_chapter_id).cloned() else {
            return reject(format!("unknown sub-chapter: {sub_chapter_id}"));
        };

        self.scheduler.cancel(sub_chapter_id);
        self.state.ui.forget(sub_chapter_id);
        let nested = ParentRef::sub_chapter(&sub.chapter_id, sub_chapter_id);
        for item in snapshot.contents_under(&nested) {
            self.scheduler.cancel(&item.id);
            self.state.ui.forget(&item.id);
        }
        for ev in snapshot.evaluations_under(&nested) {
            self.scheduler.cancel(&ev.id);
            self.state.ui.forget(&ev.id);
        }

        let id = sub_chapter_id.to_string();
        self.mutate(|o| o.with_sub_chapter_removed(&id));

        if is_tmp_id(sub_chapter_id) {
            return MutationOutcome::Applied;
        }

        let s = self.clone();
        let id = sub_chapter_id.to_string();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            match api.delete_sub_chapter(&course_id, &id).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("delete sub-chapter", &e),
            }
        });

        MutationOutcome::Applied
    }

    // ---- content items ----------------------------------------------------

    fn validate_parent(&self, snapshot: &OutlineStore, parent: &ParentRef) -> Option<String> {
        if snapshot.chapter(&parent.chapter_id).is_none() {
            return Some(format!("unknown chapter: {}", parent.chapter_id));
        }
        if is_tmp_id(&parent.chapter_id) {
            return Some("chapter is not confirmed yet; retry in a moment".to_string());
        }
        if let Some(sid) = &parent.sub_chapter_id {
            match snapshot.sub_chapter(sid) {
                None => return Some(format!("unknown sub-chapter: {sid}")),
                Some(sub) if sub.chapter_id != parent.chapter_id => {
                    return Some(format!("sub-chapter {sid} is not under that chapter"));
                }
                Some(_) if is_tmp_id(sid) => {
                    return Some("sub-chapter is not confirmed yet; retry in a moment".to_string());
                }
                Some(_) => {}
            }
        }
        None
    }

    pub fn add_content_item(
        &self,
        parent: ParentRef,
        kind: ContentKind,
        title: &str,
    ) -> MutationOutcome {
        let title = title.trim();
        if title.is_empty() {
            return reject("content title must not be empty");
        }

        let snapshot = self.outline_snapshot();
        if let Some(problem) = self.validate_parent(&snapshot, &parent) {
            return reject(problem);
        }

        let tmp_id = make_tmp_id(now_ms());
        let order = snapshot.contents_under(&parent).len() as u32;
        let item = ContentItem {
            id: tmp_id.clone(),
            kind,
            title: title.to_string(),
            body: String::new(),
            attached_file: None,
            order,
            parent: parent.clone(),
        };
        self.mutate(|o| o.with_content_added(item));

        let s = self.clone();
        let sent_title = title.to_string();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            let req = CreateContentItemRequest {
                course_id,
                chapter_id: parent.chapter_id.clone(),
                sub_chapter_id: parent.sub_chapter_id.clone(),
                kind,
                title: sent_title.clone(),
                body: String::new(),
                attached_file: None,
                order,
            };
            match api.create_content_item(req).await {
                Ok(created) => {
                    s.mark_backend_online();
                    s.finish_content_create(&tmp_id, &created, &sent_title);
                }
                Err(e) => s.record_api_error("create content item", &e),
            }
        });

        MutationOutcome::Applied
    }

    fn finish_content_create(&self, tmp_id: &str, created: &ContentItem, sent_title: &str) {
        let had_pending = self.scheduler.cancel(tmp_id);
        self.state.ui.adopt_id(tmp_id, &created.id);

        let created_id = created.id.clone();
        let created_order = created.order;
        self.mutate(|o| {
            o.with_id_swapped(tmp_id, &created_id).with_content_updated(
                &created_id,
                ContentPatch {
                    order: Some(created_order),
                    ..Default::default()
                },
            )
        });

        let drifted = self
            .outline_snapshot()
            .contents
            .iter()
            .find(|i| i.id == created.id)
            .map(|i| i.title != sent_title || !i.body.is_empty() || i.attached_file.is_some())
            .unwrap_or(false);
        if had_pending || drifted {
            self.schedule_content_commit(&created.id);
        }
    }

    pub fn delete_content_item(&self, content_id: &str) -> MutationOutcome {
        let snapshot = self.outline_snapshot();
        if !snapshot.contents.iter().any(|i| i.id == content_id) {
            return reject(format!("unknown content item: {content_id}"));
        }

        self.scheduler.cancel(content_id);
        self.state.ui.forget(content_id);

        let id = content_id.to_string();
        self.mutate(|o| o.with_content_removed(&id));

        if is_tmp_id(content_id) {
            return MutationOutcome::Applied;
        }

        let s = self.clone();
        let id = content_id.to_string();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            match api.delete_content_item(&course_id, &id).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("delete content item", &e),
            }
        });

        MutationOutcome::Applied
    }

    // ---- evaluations ------------------------------------------------------

    pub fn add_evaluation(
        &self,
        parent: ParentRef,
        kind: EvaluationKind,
        title: &str,
    ) -> MutationOutcome {
        let title = title.trim();
        if title.is_empty() {
            return reject("evaluation title must not be empty");
        }

        let snapshot = self.outline_snapshot();
        if let Some(problem) = self.validate_parent(&snapshot, &parent) {
            return reject(problem);
        }

        let tmp_id = make_tmp_id(now_ms());
        let order = snapshot.evaluations_under(&parent).len() as u32;
        let evaluation = Evaluation {
            id: tmp_id.clone(),
            kind,
            title: title.to_string(),
            description: String::new(),
            due_date: None,
            attached_file: None,
            order,
            parent: parent.clone(),
        };
        self.mutate(|o| o.with_evaluation_added(evaluation));

        let s = self.clone();
        let sent_title = title.to_string();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            let req = CreateEvaluationRequest {
                course_id,
                chapter_id: parent.chapter_id.clone(),
                sub_chapter_id: parent.sub_chapter_id.clone(),
                kind,
                title: sent_title.clone(),
                description: String::new(),
                due_date: None,
                order,
            };
            match api.create_evaluation(req).await {
                Ok(created) => {
                    s.mark_backend_online();
                    s.finish_evaluation_create(&tmp_id, &created, &sent_title);
                }
                Err(e) => s.record_api_error("create evaluation", &e),
            }
        });

        MutationOutcome::Applied
    }

    fn finish_evaluation_create(&self, tmp_id: &str, created: &Evaluation, sent_title: &str) {
        let had_pending = self.scheduler.cancel(tmp_id);
        self.state.ui.adopt_id(tmp_id, &created.id);

        let created_id = created.id.clone();
        let created_order = created.order;
        self.mutate(|o| {
            o.with_id_swapped(tmp_id, &created_id).with_evaluation_updated(
                &created_id,
                EvaluationPatch {
                    order: Some(created_order),
                    ..Default::default()
                },
            )
        });

        let drifted = self
            .outline_snapshot()
            .evaluations
            .iter()
            .find(|e| e.id == created.id)
            .map(|e| {
                e.title != sent_title
                    || !e.description.is_empty()
                    || e.due_date.is_some()
                    || e.attached_file.is_some()
            })
            .unwrap_or(false);
        if had_pending || drifted {
            self.schedule_evaluation_commit(&created.id);
        }
    }

    pub fn delete_evaluation(&self, evaluation_id: &str) -> MutationOutcome {
        let snapshot = self.outline_snapshot();
        if !snapshot.evaluations.iter().any(|e| e.id == evaluation_id) {
            return reject(format!("unknown evaluation: {evaluation_id}"));
        }

        self.scheduler.cancel(evaluation_id);
        self.state.ui.forget(evaluation_id);

        let id = evaluation_id.to_string();
        self.mutate(|o| o.with_evaluation_removed(&id));

        if is_tmp_id(evaluation_id) {
            return MutationOutcome::Applied;
        }

        let s = self.clone();
        let id = evaluation_id.to_string();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            match api.delete_evaluation(&course_id, &id).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("delete evaluation", &e),
            }
        });

        MutationOutcome::Applied
    }

    // ---- support files ----------------------------------------------------

    /// Upload picked files under a chapter or sub-chapter. The stored rows
    /// (canonical ids, locators) are absorbed by the reload that follows a
    /// confirmed upload.
    pub fn upload_support_files(
        &self,
        parent: ParentRef,
        files: Vec<SupportFileUpload>,
    ) -> MutationOutcome {
        if files.is_empty() {
            return reject("no files selected");
        }

        let snapshot = self.outline_snapshot();
        if let Some(problem) = self.validate_parent(&snapshot, &parent) {
            return reject(problem);
        }

        let s = self.clone();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            let accepted = api
                .upload_support_files(
                    &course_id,
                    files,
                    &parent.chapter_id,
                    parent.sub_chapter_id.as_deref(),
                )
                .await;

            match accepted {
                Ok(true) => {
                    s.mark_backend_online();
                    // Reload, dropping this parent's local rows first so the
                    // server copies win the child-collection merge rule.
                    match api.list_outline(&course_id).await {
                        Ok(remote) => {
                            let scheduler = s.scheduler.clone();
                            s.state.outline.update(|local| {
                                let cleared = local.with_support_files_cleared(&parent);
                                *local = reconcile_outline(&cleared, &remote, |id| {
                                    scheduler.is_pending(id)
                                });
                            });
                        }
                        Err(e) => s.record_api_error("reload after upload", &e),
                    }
                }
                Ok(false) => {
                    s.state
                        .last_sync_error
                        .set(Some("upload was not accepted".to_string()));
                }
                Err(e) => s.record_api_error("upload support files", &e),
            }
        });

        MutationOutcome::Applied
    }

    pub fn delete_support_file(&self, file_id: &str) -> MutationOutcome {
        let snapshot = self.outline_snapshot();
        if !snapshot.support_files.iter().any(|f| f.id == file_id) {
            return reject(format!("unknown support file: {file_id}"));
        }

        self.state.ui.forget(file_id);

        let id = file_id.to_string();
        self.mutate(|o| o.with_support_file_removed(&id));

        if is_tmp_id(file_id) {
            return MutationOutcome::Applied;
        }

        let s = self.clone();
        let id = file_id.to_string();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            match api.delete_support_file(&course_id, &id).await {
                Ok(_) => s.mark_backend_online(),
                Err(e) => s.record_api_error("delete support file", &e),
            }
        });

        MutationOutcome::Applied
    }

    // ---- reordering -------------------------------------------------------

    pub fn reorder_groupings(&self, src: usize, dst: usize) -> MutationOutcome {
        let list = self.outline_snapshot().groupings_ordered();
        let Some(assignments) = reorder_assignments(&list, src, dst, |g| g.id.clone()) else {
            return reject("reorder indices out of range");
        };

        self.mutate(|o| {
            assignments.iter().fold(o.clone(), |acc, (id, order)| {
                acc.with_grouping_updated(
                    id,
                    GroupingPatch {
                        order: Some(*order),
                        ..Default::default()
                    },
                )
            })
        });

        let changed = changed_orders(&assignments, |id| {
            list.iter().find(|g| g.id == *id).map(|g| g.order)
        });
        if changed.is_empty() {
            return MutationOutcome::Applied;
        }

        let s = self.clone();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            for (id, order) in changed {
                let req = UpdateGroupingRequest {
                    course_id: course_id.clone(),
                    id: id.clone(),
                    title: None,
                    order: Some(order),
                };
                if let Err(e) = api.update_grouping(req).await {
                    s.record_api_error("reorder groupings", &e);
                } else {
                    s.mark_backend_online();
                }
            }
        });

        MutationOutcome::Applied
    }

    /// Reorder chapters within one grouping (or within the orphans).
    pub fn reorder_chapters(
        &self,
        grouping_id: Option<&str>,
        src: usize,
        dst: usize,
    ) -> MutationOutcome {
        let list = self.outline_snapshot().chapters_of(grouping_id);
        let Some(assignments) = reorder_assignments(&list, src, dst, |c| c.id.clone()) else {
            return reject("reorder indices out of range");
        };

        self.mutate(|o| {
            assignments.iter().fold(o.clone(), |acc, (id, order)| {
                acc.with_chapter_updated(
                    id,
                    ChapterPatch {
                        order: Some(*order),
                        ..Default::default()
                    },
                )
            })
        });

        let changed = changed_orders(&assignments, |id| {
            list.iter().find(|c| c.id == *id).map(|c| c.order)
        });
        if changed.is_empty() {
            return MutationOutcome::Applied;
        }

        let s = self.clone();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            for (id, order) in changed {
                let req = UpdateChapterRequest {
                    course_id: course_id.clone(),
                    id: id.clone(),
                    title: None,
                    order: Some(order),
                    grouping_id: None,
                };
                if let Err(e) = api.update_chapter(req).await {
                    s.record_api_error("reorder chapters", &e);
                } else {
                    s.mark_backend_online();
                }
            }
        });

        MutationOutcome::Applied
    }

    pub fn reorder_sub_chapters(
        &self,
        chapter_id: &str,
        src: usize,
        dst: usize,
    ) -> MutationOutcome {
        let list = self.outline_snapshot().sub_chapters_of(chapter_id);
        let Some(assignments) = reorder_assignments(&list, src, dst, |sc| sc.id.clone()) else {
            return reject("reorder indices out of range");
        };

        self.mutate(|o| {
            assignments.iter().fold(o.clone(), |acc, (id, order)| {
                acc.with_sub_chapter_updated(
                    id,
                    SubChapterPatch {
                        order: Some(*order),
                        ..Default::default()
                    },
                )
            })
        });

        let changed = changed_orders(&assignments, |id| {
            list.iter().find(|sc| sc.id == *id).map(|sc| sc.order)
        });
        if changed.is_empty() {
            return MutationOutcome::Applied;
        }

        let s = self.clone();
        let (course_id, api) = self.course_and_client();
        spawn_local(async move {
            for (id, order) in changed {
                let req = UpdateSubChapterRequest {
                    course_id: course_id.clone(),
                    id: id.clone(),
                    title: None,
                    order: Some(order),
                };
                if let Err(e) = api.update_sub_chapter(req).await {
                    s.record_api_error("reorder sub-chapters", &e);
                } else {
                    s.mark_backend_online();
                }
            }
        });

        MutationOutcome::Applied
    }
}

/// Keep only assignments that actually move an entity, and never write tmp
/// ids to the backend (their rows are renumbered again on adoption).
fn changed_orders(
    assignments: &[(String, u32)],
    old_order: impl Fn(&String) -> Option<u32>,
) -> Vec<(String, u32)> {
    assignments
        .iter()
        .filter(|(id, order)| old_order(id) != Some(*order))
        .filter(|(id, _)| !is_tmp_id(id))
        .cloned()
        .collect()
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn controller() -> OutlineSyncController {
        let state = AppState::new();
        state.course_id.set("course-test".to_string());
        OutlineSyncController::new(state)
    }

    #[wasm_bindgen_test]
    fn test_add_grouping_rejects_blank_title() {
        let c = controller();
        assert!(matches!(
            c.add_grouping("   "),
            MutationOutcome::Rejected(_)
        ));
    }

    #[wasm_bindgen_test]
    fn test_add_grouping_applies_optimistically() {
        let c = controller();
        assert_eq!(c.add_grouping("Module 1"), MutationOutcome::Applied);

        // The row is visible immediately, under a tmp id, regardless of how
        // the (here: unreachable) backend answers later.
        let snapshot = c.outline_snapshot();
        assert_eq!(snapshot.groupings.len(), 1);
        assert!(crate::util::is_tmp_id(&snapshot.groupings[0].id));

        c.teardown();
    }

    #[wasm_bindgen_test]
    fn test_edit_marks_entity_pending() {
        let c = controller();
        c.add_grouping("Module 1");
        let id = c.outline_snapshot().groupings[0].id.clone();

        c.edit_grouping_title(&id, "Module One");
        assert!(c.is_pending(&id));
        assert_eq!(c.outline_snapshot().groupings[0].title, "Module One");

        c.teardown();
        assert!(!c.is_pending(&id));
    }
}
