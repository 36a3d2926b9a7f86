//! Reconciliation of a freshly fetched outline with the in-memory one.
//!
//! A reload can land at any time, including mid-keystroke. Replacing local
//! state wholesale would erase edits whose commit has not fired yet and
//! children that only exist locally so far. The merge therefore decides per
//! chapter, with this precedence:
//!
//!   pending local edit  >  non-empty local child collection  >  remote value
//!
//! Structural fields (ids, ordering, grouping membership, quiz associations)
//! are server-owned and always taken from remote once nothing is pending, so
//! the store converges on server-assigned ordering after creates.

use crate::models::ParentRef;
use crate::outline::OutlineStore;
use std::collections::HashSet;

/// Merge `remote` into `local`. `is_pending` reports whether an entity id has
/// an armed-but-unfired (or in-flight) commit and must not be clobbered.
pub(crate) fn reconcile_outline(
    local: &OutlineStore,
    remote: &OutlineStore,
    is_pending: impl Fn(&str) -> bool,
) -> OutlineStore {
    // First load: nothing local to protect.
    if local.is_empty() {
        return remote.clone();
    }

    let mut merged = OutlineStore::default();

    merge_groupings(&mut merged, local, remote, &is_pending);

    // Local chapters first, so the operator's working set keeps its rows.
    for lc in &local.chapters {
        let shielded = chapter_subtree_pending(local, &lc.id, &is_pending);

        match remote.chapter(&lc.id) {
            None => {
                // Deleted out-of-band. Local pending work wins: any pending
                // commit anywhere in the subtree (a content item added just
                // before the delete landed elsewhere, say) keeps the whole
                // chapter alive as a conflict for the surface to resolve.
                if shielded || subtree_has_deep_pending(local, &lc.id, &is_pending) {
                    copy_chapter_subtree(&mut merged, local, &lc.id);
                }
            }
            Some(rc) => {
                if shielded {
                    copy_chapter_subtree(&mut merged, local, &lc.id);
                } else {
                    // Remote owns title/order/grouping-id/quizzes.
                    merged.chapters.push(rc.clone());
                    merge_chapter_children(&mut merged, local, remote, &lc.id);
                }
            }
        }
    }

    // Chapters created out-of-band (another session): adopt wholesale.
    for rc in &remote.chapters {
        if local.chapter(&rc.id).is_none() {
            copy_chapter_subtree(&mut merged, remote, &rc.id);
        }
    }

    dedup_all(&mut merged);
    merged
}

/// A chapter is shielded while it, or any sub-chapter under it, has a
/// pending commit. Pending edits on deeper children are already safe through
/// the non-empty-local-collection rule (the edited row exists locally).
fn chapter_subtree_pending(
    local: &OutlineStore,
    chapter_id: &str,
    is_pending: &impl Fn(&str) -> bool,
) -> bool {
    if is_pending(chapter_id) {
        return true;
    }
    local
        .sub_chapters
        .iter()
        .any(|s| s.chapter_id == chapter_id && is_pending(&s.id))
}

/// Pending edits below the sub-chapter level. Only consulted when the remote
/// side no longer has the chapter at all; while the chapter exists remotely,
/// deeper pending rows are already safe through the non-empty-local-
/// collection rule.
fn subtree_has_deep_pending(
    local: &OutlineStore,
    chapter_id: &str,
    is_pending: &impl Fn(&str) -> bool,
) -> bool {
    local
        .contents
        .iter()
        .any(|i| i.parent.chapter_id == chapter_id && is_pending(&i.id))
        || local
            .evaluations
            .iter()
            .any(|e| e.parent.chapter_id == chapter_id && is_pending(&e.id))
}

fn merge_groupings(
    merged: &mut OutlineStore,
    local: &OutlineStore,
    remote: &OutlineStore,
    is_pending: &impl Fn(&str) -> bool,
) {
    for rg in &remote.groupings {
        if is_pending(&rg.id) {
            if let Some(lg) = local.grouping(&rg.id) {
                merged.groupings.push(lg.clone());
                continue;
            }
        }
        merged.groupings.push(rg.clone());
    }

    // A grouping only the local side knows survives while its create/rename
    // is pending; otherwise it was deleted elsewhere.
    for lg in &local.groupings {
        if remote.grouping(&lg.id).is_none() && is_pending(&lg.id) {
            merged.groupings.push(lg.clone());
        }
    }
}

/// Copy one chapter and every row under it, verbatim, from `src`.
fn copy_chapter_subtree(merged: &mut OutlineStore, src: &OutlineStore, chapter_id: &str) {
    if let Some(c) = src.chapter(chapter_id) {
        merged.chapters.push(c.clone());
    }
    merged.sub_chapters.extend(
        src.sub_chapters
            .iter()
            .filter(|s| s.chapter_id == chapter_id)
            .cloned(),
    );
    merged.contents.extend(
        src.contents
            .iter()
            .filter(|i| i.parent.chapter_id == chapter_id)
            .cloned(),
    );
    merged.evaluations.extend(
        src.evaluations
            .iter()
            .filter(|e| e.parent.chapter_id == chapter_id)
            .cloned(),
    );
    merged.support_files.extend(
        src.support_files
            .iter()
            .filter(|f| f.parent.chapter_id == chapter_id)
            .cloned(),
    );
}

/// Several child-mutation paths update only local memory optimistically, so
/// the remote snapshot may lag behind local additions. A non-empty local
/// collection therefore beats the remote one; an empty local collection
/// means "nothing locally newer" and the remote set is adopted.
fn pick_collection<T>(local_rows: Vec<T>, remote_rows: Vec<T>) -> Vec<T> {
    if local_rows.is_empty() {
        remote_rows
    } else {
        local_rows
    }
}

fn merge_children_under(
    merged: &mut OutlineStore,
    local: &OutlineStore,
    remote: &OutlineStore,
    parent: &ParentRef,
) {
    merged.contents.extend(pick_collection(
        local.contents_under(parent),
        remote.contents_under(parent),
    ));
    merged.evaluations.extend(pick_collection(
        local.evaluations_under(parent),
        remote.evaluations_under(parent),
    ));
    merged.support_files.extend(pick_collection(
        local.support_files_under(parent),
        remote.support_files_under(parent),
    ));
}

fn merge_chapter_children(
    merged: &mut OutlineStore,
    local: &OutlineStore,
    remote: &OutlineStore,
    chapter_id: &str,
) {
    merge_children_under(merged, local, remote, &ParentRef::chapter(chapter_id));

    // One level of recursion: sub-chapters matched by id, same rules.
    for lsc in local.sub_chapters.iter().filter(|s| s.chapter_id == chapter_id) {
        let Some(rsc) = remote.sub_chapter(&lsc.id) else {
            // Deleted out-of-band; the chapter-level shield already covered
            // the pending case.
            continue;
        };

        merged.sub_chapters.push(rsc.clone());
        merge_children_under(
            merged,
            local,
            remote,
            &ParentRef::sub_chapter(chapter_id, &lsc.id),
        );
    }

    for rsc in remote.sub_chapters.iter().filter(|s| s.chapter_id == chapter_id) {
        if local.sub_chapter(&rsc.id).is_none() {
            merged.sub_chapters.push(rsc.clone());
            merged.contents.extend(
                remote.contents_under(&ParentRef::sub_chapter(chapter_id, &rsc.id)),
            );
            merged.evaluations.extend(
                remote.evaluations_under(&ParentRef::sub_chapter(chapter_id, &rsc.id)),
            );
            merged.support_files.extend(
                remote.support_files_under(&ParentRef::sub_chapter(chapter_id, &rsc.id)),
            );
        }
    }
}

fn dedup_by_id<T>(rows: &mut Vec<T>, id_of: impl Fn(&T) -> String) {
    let mut seen: HashSet<String> = HashSet::new();
    rows.retain(|r| seen.insert(id_of(r)));
}

/// Duplicate ids within one table violate the store invariant. An entity
/// reparented remotely while kept locally could otherwise land twice; first
/// occurrence (the local-favored row) wins.
fn dedup_all(merged: &mut OutlineStore) {
    dedup_by_id(&mut merged.groupings, |g| g.id.clone());
    dedup_by_id(&mut merged.chapters, |c| c.id.clone());
    dedup_by_id(&mut merged.sub_chapters, |s| s.id.clone());
    dedup_by_id(&mut merged.contents, |i| i.id.clone());
    dedup_by_id(&mut merged.evaluations, |e| e.id.clone());
    dedup_by_id(&mut merged.support_files, |f| f.id.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Chapter, ContentItem, ContentKind, Evaluation, EvaluationKind, Grouping, QuizRef,
        SubChapter, SupportFile,
    };

    fn grouping(id: &str, title: &str, order: u32) -> Grouping {
        Grouping {
            id: id.to_string(),
            title: title.to_string(),
            order,
        }
    }

    fn chapter(id: &str, title: &str, grouping_id: Option<&str>, order: u32) -> Chapter {
        Chapter {
            id: id.to_string(),
            title: title.to_string(),
            order,
            grouping_id: grouping_id.map(|s| s.to_string()),
            quizzes: vec![],
        }
    }

    fn sub_chapter(id: &str, title: &str, chapter_id: &str, order: u32) -> SubChapter {
        SubChapter {
            id: id.to_string(),
            title: title.to_string(),
            order,
            chapter_id: chapter_id.to_string(),
        }
    }

    fn content(id: &str, title: &str, parent: ParentRef, order: u32) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            kind: ContentKind::Text,
            title: title.to_string(),
            body: String::new(),
            attached_file: None,
            order,
            parent,
        }
    }

    fn evaluation(id: &str, parent: ParentRef) -> Evaluation {
        Evaluation {
            id: id.to_string(),
            kind: EvaluationKind::Assignment,
            title: format!("Eval {id}"),
            description: String::new(),
            due_date: None,
            attached_file: None,
            order: 0,
            parent,
        }
    }

    fn support_file(id: &str, parent: ParentRef) -> SupportFile {
        SupportFile {
            id: id.to_string(),
            display_name: format!("{id}.pdf"),
            byte_size: 1,
            mime_kind: "application/pdf".to_string(),
            locator: format!("files/{id}"),
            parent,
        }
    }

    fn none_pending(_: &str) -> bool {
        false
    }

    #[test]
    fn test_first_load_adopts_remote_wholesale() {
        let remote = OutlineStore::default()
            .with_grouping_added(grouping("g1", "Module 1", 0))
            .with_chapter_added(chapter("c1", "Intro", Some("g1"), 0));

        let merged = reconcile_outline(&OutlineStore::default(), &remote, none_pending);
        assert_eq!(merged, remote);
    }

    #[test]
    fn test_pending_chapter_keeps_local_subtree() {
        let local = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Introduction", None, 0))
            .with_content_added(content("i1", "Welcome", ParentRef::chapter("c1"), 0));

        // Remote still has the stale title and no content.
        let remote = OutlineStore::default().with_chapter_added(chapter("c1", "Intro", None, 3));

        let merged = reconcile_outline(&local, &remote, |id| id == "c1");

        let c = merged.chapter("c1").unwrap();
        assert_eq!(c.title, "Introduction");
        assert_eq!(c.order, 0, "shielded chapter keeps local order too");
        assert_eq!(merged.contents.len(), 1);
    }

    #[test]
    fn test_pending_sub_chapter_shields_whole_chapter() {
        let local = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Local title", None, 0))
            .with_sub_chapter_added(sub_chapter("s1", "Edited sub", "c1", 0));

        let remote = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Remote title", None, 0))
            .with_sub_chapter_added(sub_chapter("s1", "Stale sub", "c1", 0));

        let merged = reconcile_outline(&local, &remote, |id| id == "s1");

        assert_eq!(merged.chapter("c1").unwrap().title, "Local title");
        assert_eq!(merged.sub_chapter("s1").unwrap().title, "Edited sub");
    }

    #[test]
    fn test_non_pending_chapter_takes_remote_structure() {
        let local = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Old title", Some("g-old"), 5));

        let mut remote_chapter = chapter("c1", "Fresh title", Some("g-new"), 1);
        remote_chapter.quizzes = vec![QuizRef {
            id: "q1".to_string(),
            title: "Checkpoint".to_string(),
        }];
        let remote = OutlineStore::default().with_chapter_added(remote_chapter);

        let merged = reconcile_outline(&local, &remote, none_pending);

        let c = merged.chapter("c1").unwrap();
        assert_eq!(c.title, "Fresh title");
        assert_eq!(c.order, 1);
        assert_eq!(c.grouping_id.as_deref(), Some("g-new"));
        assert_eq!(c.quizzes.len(), 1);
    }

    #[test]
    fn test_non_empty_local_children_beat_empty_remote() {
        // Two content items added locally, no remote round trip yet.
        let local = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Intro", None, 0))
            .with_content_added(content("tmp-1-a", "First", ParentRef::chapter("c1"), 0))
            .with_content_added(content("tmp-1-b", "Second", ParentRef::chapter("c1"), 1));

        let remote = OutlineStore::default().with_chapter_added(chapter("c1", "Intro", None, 0));

        let merged = reconcile_outline(&local, &remote, none_pending);
        assert_eq!(merged.contents.len(), 2);
    }

    #[test]
    fn test_empty_local_children_adopt_remote() {
        let local = OutlineStore::default().with_chapter_added(chapter("c1", "Intro", None, 0));

        let remote = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Intro", None, 0))
            .with_content_added(content("i1", "Server item", ParentRef::chapter("c1"), 0))
            .with_evaluation_added(evaluation("e1", ParentRef::chapter("c1")))
            .with_support_file_added(support_file("f1", ParentRef::chapter("c1")));

        let merged = reconcile_outline(&local, &remote, none_pending);
        assert_eq!(merged.contents.len(), 1);
        assert_eq!(merged.evaluations.len(), 1);
        assert_eq!(merged.support_files.len(), 1);
    }

    #[test]
    fn test_collections_are_chosen_independently() {
        // Local has contents but no evaluations; remote has both.
        let local = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Intro", None, 0))
            .with_content_added(content("local-i", "Mine", ParentRef::chapter("c1"), 0));

        let remote = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Intro", None, 0))
            .with_content_added(content("remote-i", "Theirs", ParentRef::chapter("c1"), 0))
            .with_evaluation_added(evaluation("e1", ParentRef::chapter("c1")));

        let merged = reconcile_outline(&local, &remote, none_pending);

        assert_eq!(merged.contents.len(), 1);
        assert_eq!(merged.contents[0].id, "local-i");
        assert_eq!(merged.evaluations.len(), 1, "empty local evals adopt remote");
    }

    #[test]
    fn test_sub_chapter_recursion_applies_same_rules() {
        let local = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Intro", None, 0))
            .with_sub_chapter_added(sub_chapter("s1", "Stale sub title", "c1", 0))
            .with_content_added(content(
                "tmp-2-x",
                "Draft item",
                ParentRef::sub_chapter("c1", "s1"),
                0,
            ));

        let remote = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Intro", None, 0))
            .with_sub_chapter_added(sub_chapter("s1", "Fresh sub title", "c1", 2));

        let merged = reconcile_outline(&local, &remote, none_pending);

        // Sub-chapter structure is server-owned...
        let s = merged.sub_chapter("s1").unwrap();
        assert_eq!(s.title, "Fresh sub title");
        assert_eq!(s.order, 2);
        // ...but the locally-populated content list survives.
        assert_eq!(merged.contents.len(), 1);
        assert_eq!(merged.contents[0].id, "tmp-2-x");
    }

    #[test]
    fn test_remote_only_chapter_is_appended_with_subtree() {
        let local = OutlineStore::default().with_chapter_added(chapter("c1", "Mine", None, 0));

        let remote = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Mine", None, 0))
            .with_chapter_added(chapter("c2", "From another session", None, 1))
            .with_sub_chapter_added(sub_chapter("s2", "New sub", "c2", 0))
            .with_content_added(content("i2", "New item", ParentRef::chapter("c2"), 0));

        let merged = reconcile_outline(&local, &remote, none_pending);

        assert!(merged.chapter("c2").is_some());
        assert!(merged.sub_chapter("s2").is_some());
        assert_eq!(merged.contents.len(), 1);
    }

    #[test]
    fn test_remotely_deleted_chapter_is_dropped_unless_pending() {
        let local = OutlineStore::default()
            .with_chapter_added(chapter("gone", "Deleted elsewhere", None, 0))
            .with_chapter_added(chapter("kept", "Pending edit", None, 1));

        let remote = OutlineStore::default();

        let merged = reconcile_outline(&local, &remote, |id| id == "kept");

        assert!(merged.chapter("gone").is_none());
        assert!(merged.chapter("kept").is_some());
    }

    #[test]
    fn test_remote_delete_loses_to_deep_pending_create() {
        // A content item's commit is still in flight when a reload reports
        // its chapter deleted elsewhere; the chapter survives as a conflict.
        let local = OutlineStore::default()
            .with_chapter_added(chapter("c1", "Kept", None, 0))
            .with_content_added(content("i1", "Just added", ParentRef::chapter("c1"), 0));

        let remote = OutlineStore::default();

        let merged = reconcile_outline(&local, &remote, |id| id == "i1");
        assert!(merged.chapter("c1").is_some());
        assert_eq!(merged.contents.len(), 1);
    }

    #[test]
    fn test_pending_grouping_rename_is_shielded() {
        let local = OutlineStore::default().with_grouping_added(grouping("g1", "Module One", 0));
        let remote = OutlineStore::default().with_grouping_added(grouping("g1", "Module 1", 0));

        let merged = reconcile_outline(&local, &remote, |id| id == "g1");
        assert_eq!(merged.grouping("g1").unwrap().title, "Module One");

        let merged_after = reconcile_outline(&local, &remote, none_pending);
        assert_eq!(merged_after.grouping("g1").unwrap().title, "Module 1");
    }

    #[test]
    fn test_rename_reload_race_scenario() {
        // Grouping "Module 1" -> chapter "Intro" -> rename to "Introduction";
        // a reload returns the stale "Intro" while the commit is pending.
        let local = OutlineStore::default()
            .with_grouping_added(grouping("g1", "Module 1", 0))
            .with_chapter_added(chapter("c1", "Introduction", Some("g1"), 0));

        let remote = OutlineStore::default()
            .with_grouping_added(grouping("g1", "Module 1", 0))
            .with_chapter_added(chapter("c1", "Intro", Some("g1"), 0));

        let merged = reconcile_outline(&local, &remote, |id| id == "c1");
        assert_eq!(merged.chapter("c1").unwrap().title, "Introduction");

        // Once the commit cleared, the (now fresh) remote title wins.
        let remote_fresh = OutlineStore::default()
            .with_grouping_added(grouping("g1", "Module 1", 0))
            .with_chapter_added(chapter("c1", "Introduction", Some("g1"), 0));
        let converged = reconcile_outline(&merged, &remote_fresh, none_pending);
        assert_eq!(converged.chapter("c1").unwrap().title, "Introduction");
    }

    #[test]
    fn test_merge_never_duplicates_ids() {
        // Content item reparented remotely while still listed locally under
        // its old chapter.
        let local = OutlineStore::default()
            .with_chapter_added(chapter("c1", "A", None, 0))
            .with_chapter_added(chapter("c2", "B", None, 1))
            .with_content_added(content("i1", "Moved", ParentRef::chapter("c1"), 0));

        let remote = OutlineStore::default()
            .with_chapter_added(chapter("c1", "A", None, 0))
            .with_chapter_added(chapter("c2", "B", None, 1))
            .with_content_added(content("i1", "Moved", ParentRef::chapter("c2"), 0));

        let merged = reconcile_outline(&local, &remote, none_pending);
        assert_eq!(merged.contents.len(), 1);
    }
}
