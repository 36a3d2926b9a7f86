//! In-memory course outline: flat, id-indexed tables with parent references.
//!
//! The outline is not stored as nested arrays. Every entity kind lives in its
//! own table and children point at their parent by id, so replacing one
//! entity is a single-row edit instead of a recursive tree rebuild. All
//! update operations are pure: they take `&self` and return a new store, and
//! an operation on an id that no longer exists returns the input unchanged
//! (deletion races with a concurrent reload must not throw).

pub(crate) mod merge;
pub mod reorder;

use crate::models::{
    Chapter, ContentItem, ContentKind, Evaluation, EvaluationKind, FileRef, Grouping, ParentRef,
    QuizRef, SubChapter, SupportFile,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct OutlineStore {
    #[serde(default)]
    pub groupings: Vec<Grouping>,

    #[serde(default)]
    pub chapters: Vec<Chapter>,

    #[serde(rename = "sub-chapters", default)]
    pub sub_chapters: Vec<SubChapter>,

    #[serde(default)]
    pub contents: Vec<ContentItem>,

    #[serde(default)]
    pub evaluations: Vec<Evaluation>,

    #[serde(rename = "support-files", default)]
    pub support_files: Vec<SupportFile>,
}

#[derive(Clone, Debug, Default)]
pub struct GroupingPatch {
    pub title: Option<String>,
    pub order: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct ChapterPatch {
    pub title: Option<String>,
    pub order: Option<u32>,

    /// `Some(None)` explicitly clears the owning grouping (orphan).
    pub grouping_id: Option<Option<String>>,

    pub quizzes: Option<Vec<QuizRef>>,
}

#[derive(Clone, Debug, Default)]
pub struct SubChapterPatch {
    pub title: Option<String>,
    pub order: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct ContentPatch {
    pub kind: Option<ContentKind>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub attached_file: Option<Option<FileRef>>,
    pub order: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct EvaluationPatch {
    pub kind: Option<EvaluationKind>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Option<String>>,
    pub attached_file: Option<Option<FileRef>>,
    pub order: Option<u32>,
}

fn sorted_by_order<T: Clone>(mut items: Vec<T>, order_of: impl Fn(&T) -> u32) -> Vec<T> {
    items.sort_by_key(|x| order_of(x));
    items
}

/// Renumber one sibling scope to contiguous `0..n-1`, preserving the
/// relative order. Removals would otherwise leave gaps behind.
fn renormalize_orders<T>(
    rows: &mut [T],
    in_scope: impl Fn(&T) -> bool,
    order_of: impl Fn(&T) -> u32,
    set_order: impl Fn(&mut T, u32),
) {
    let mut scoped: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| in_scope(r))
        .map(|(i, _)| i)
        .collect();
    scoped.sort_by_key(|&i| order_of(&rows[i]));

    for (pos, &i) in scoped.iter().enumerate() {
        set_order(&mut rows[i], pos as u32);
    }
}

impl OutlineStore {
    pub fn is_empty(&self) -> bool {
        self.groupings.is_empty()
            && self.chapters.is_empty()
            && self.sub_chapters.is_empty()
            && self.contents.is_empty()
            && self.evaluations.is_empty()
            && self.support_files.is_empty()
    }

    // ---- read side ------------------------------------------------------

    pub fn grouping(&self, id: &str) -> Option<&Grouping> {
        self.groupings.iter().find(|g| g.id == id)
    }

    pub fn chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    pub fn sub_chapter(&self, id: &str) -> Option<&SubChapter> {
        self.sub_chapters.iter().find(|s| s.id == id)
    }

    pub fn groupings_ordered(&self) -> Vec<Grouping> {
        sorted_by_order(self.groupings.clone(), |g| g.order)
    }

    /// Chapters of one grouping, in display order. `None` selects orphans.
    pub fn chapters_of(&self, grouping_id: Option<&str>) -> Vec<Chapter> {
        let picked = self
            .chapters
            .iter()
            .filter(|c| c.grouping_id.as_deref() == grouping_id)
            .cloned()
            .collect();
        sorted_by_order(picked, |c: &Chapter| c.order)
    }

    pub fn sub_chapters_of(&self, chapter_id: &str) -> Vec<SubChapter> {
        let picked = self
            .sub_chapters
            .iter()
            .filter(|s| s.chapter_id == chapter_id)
            .cloned()
            .collect();
        sorted_by_order(picked, |s: &SubChapter| s.order)
    }

    pub fn contents_under(&self, parent: &ParentRef) -> Vec<ContentItem> {
        let picked = self
            .contents
            .iter()
            .filter(|i| &i.parent == parent)
            .cloned()
            .collect();
        sorted_by_order(picked, |i: &ContentItem| i.order)
    }

    pub fn evaluations_under(&self, parent: &ParentRef) -> Vec<Evaluation> {
        let picked = self
            .evaluations
            .iter()
            .filter(|e| &e.parent == parent)
            .cloned()
            .collect();
        sorted_by_order(picked, |e: &Evaluation| e.order)
    }

    pub fn support_files_under(&self, parent: &ParentRef) -> Vec<SupportFile> {
        self.support_files
            .iter()
            .filter(|f| &f.parent == parent)
            .cloned()
            .collect()
    }

    /// Ids of everything in the chapter's subtree, the chapter included.
    pub(crate) fn chapter_subtree_ids(&self, chapter_id: &str) -> Vec<String> {
        let mut ids = vec![chapter_id.to_string()];
        for s in self.sub_chapters.iter().filter(|s| s.chapter_id == chapter_id) {
            ids.push(s.id.clone());
        }
        for i in self.contents.iter().filter(|i| i.parent.chapter_id == chapter_id) {
            ids.push(i.id.clone());
        }
        for e in self.evaluations.iter().filter(|e| e.parent.chapter_id == chapter_id) {
            ids.push(e.id.clone());
        }
        for f in self.support_files.iter().filter(|f| f.parent.chapter_id == chapter_id) {
            ids.push(f.id.clone());
        }
        ids
    }

    // ---- groupings ------------------------------------------------------

    pub fn with_grouping_added(&self, grouping: Grouping) -> Self {
        let mut next = self.clone();
        next.groupings.push(grouping);
        next
    }

    pub fn with_grouping_updated(&self, id: &str, patch: GroupingPatch) -> Self {
        let mut next = self.clone();
        if let Some(g) = next.groupings.iter_mut().find(|g| g.id == id) {
            if let Some(title) = patch.title {
                g.title = title;
            }
            if let Some(order) = patch.order {
                g.order = order;
            }
        }
        next
    }

    /// Remove a grouping. Its chapters are kept and become orphans, slotted
    /// after any existing orphans.
    pub fn with_grouping_removed(&self, id: &str) -> Self {
        if self.grouping(id).is_none() {
            return self.clone();
        }

        let mut next = self.clone();
        next.groupings.retain(|g| g.id != id);
        renormalize_orders(&mut next.groupings, |_| true, |g| g.order, |g, o| g.order = o);

        let orphan_base = next
            .chapters
            .iter()
            .filter(|c| c.grouping_id.is_none())
            .map(|c| c.order + 1)
            .max()
            .unwrap_or(0);
        let mut slot = 0;
        for c in next.chapters.iter_mut() {
            if c.grouping_id.as_deref() == Some(id) {
                c.grouping_id = None;
                c.order = orphan_base + slot;
                slot += 1;
            }
        }
        renormalize_orders(
            &mut next.chapters,
            |c| c.grouping_id.is_none(),
            |c| c.order,
            |c, o| c.order = o,
        );
        next
    }

    // ---- chapters -------------------------------------------------------

    pub fn with_chapter_added(&self, chapter: Chapter) -> Self {
        let mut next = self.clone();
        next.chapters.push(chapter);
        next
    }

    pub fn with_chapter_updated(&self, id: &str, patch: ChapterPatch) -> Self {
        let mut next = self.clone();
        if let Some(c) = next.chapters.iter_mut().find(|c| c.id == id) {
            if let Some(title) = patch.title {
                c.title = title;
            }
            if let Some(order) = patch.order {
                c.order = order;
            }
            if let Some(grouping_id) = patch.grouping_id {
                c.grouping_id = grouping_id;
            }
            if let Some(quizzes) = patch.quizzes {
                c.quizzes = quizzes;
            }
        }
        next
    }

    /// Remove a chapter and every row under it.
    pub fn with_chapter_removed(&self, id: &str) -> Self {
        let Some(scope) = self.chapter(id).map(|c| c.grouping_id.clone()) else {
            return self.clone();
        };

        let mut next = self.clone();
        next.chapters.retain(|c| c.id != id);
        next.sub_chapters.retain(|s| s.chapter_id != id);
        next.contents.retain(|i| i.parent.chapter_id != id);
        next.evaluations.retain(|e| e.parent.chapter_id != id);
        next.support_files.retain(|f| f.parent.chapter_id != id);
        renormalize_orders(
            &mut next.chapters,
            |c| c.grouping_id == scope,
            |c| c.order,
            |c, o| c.order = o,
        );
        next
    }

    /// Move a chapter into another grouping (or out of any), appending it to
    /// the target scope and closing the gap it leaves behind.
    pub fn with_chapter_moved(&self, id: &str, grouping_id: Option<String>) -> Self {
        let Some(old_scope) = self.chapter(id).map(|c| c.grouping_id.clone()) else {
            return self.clone();
        };
        if old_scope == grouping_id {
            return self.clone();
        }

        let mut next = self.clone();
        let target_len = next
            .chapters
            .iter()
            .filter(|c| c.grouping_id == grouping_id)
            .count() as u32;
        if let Some(c) = next.chapters.iter_mut().find(|c| c.id == id) {
            c.grouping_id = grouping_id;
            c.order = target_len;
        }
        renormalize_orders(
            &mut next.chapters,
            |c| c.grouping_id == old_scope,
            |c| c.order,
            |c, o| c.order = o,
        );
        next
    }

    // ---- sub-chapters ---------------------------------------------------

    pub fn with_sub_chapter_added(&self, sub: SubChapter) -> Self {
        let mut next = self.clone();
        next.sub_chapters.push(sub);
        next
    }

    pub fn with_sub_chapter_updated(&self, id: &str, patch: SubChapterPatch) -> Self {
        let mut next = self.clone();
        if let Some(s) = next.sub_chapters.iter_mut().find(|s| s.id == id) {
            if let Some(title) = patch.title {
                s.title = title;
            }
            if let Some(order) = patch.order {
                s.order = order;
            }
        }
        next
    }

    pub fn with_sub_chapter_removed(&self, id: &str) -> Self {
        let Some(scope) = self.sub_chapter(id).map(|s| s.chapter_id.clone()) else {
            return self.clone();
        };

        let mut next = self.clone();
        next.sub_chapters.retain(|s| s.id != id);
        next.contents
            .retain(|i| i.parent.sub_chapter_id.as_deref() != Some(id));
        next.evaluations
            .retain(|e| e.parent.sub_chapter_id.as_deref() != Some(id));
        next.support_files
            .retain(|f| f.parent.sub_chapter_id.as_deref() != Some(id));
        renormalize_orders(
            &mut next.sub_chapters,
            |s| s.chapter_id == scope,
            |s| s.order,
            |s, o| s.order = o,
        );
        next
    }

    // ---- content items --------------------------------------------------

    pub fn with_content_added(&self, item: ContentItem) -> Self {
        let mut next = self.clone();
        next.contents.push(item);
        next
    }

    pub fn with_content_updated(&self, id: &str, patch: ContentPatch) -> Self {
        let mut next = self.clone();
        if let Some(i) = next.contents.iter_mut().find(|i| i.id == id) {
            if let Some(kind) = patch.kind {
                i.kind = kind;
            }
            if let Some(title) = patch.title {
                i.title = title;
            }
            if let Some(body) = patch.body {
                i.body = body;
            }
            if let Some(attached_file) = patch.attached_file {
                i.attached_file = attached_file;
            }
            if let Some(order) = patch.order {
                i.order = order;
            }
        }
        next
    }

    pub fn with_content_removed(&self, id: &str) -> Self {
        let Some(scope) = self.contents.iter().find(|i| i.id == id).map(|i| i.parent.clone())
        else {
            return self.clone();
        };

        let mut next = self.clone();
        next.contents.retain(|i| i.id != id);
        renormalize_orders(
            &mut next.contents,
            |i| i.parent == scope,
            |i| i.order,
            |i, o| i.order = o,
        );
        next
    }

    // ---- evaluations ----------------------------------------------------

    pub fn with_evaluation_added(&self, evaluation: Evaluation) -> Self {
        let mut next = self.clone();
        next.evaluations.push(evaluation);
        next
    }

    pub fn with_evaluation_updated(&self, id: &str, patch: EvaluationPatch) -> Self {
        let mut next = self.clone();
        if let Some(e) = next.evaluations.iter_mut().find(|e| e.id == id) {
            if let Some(kind) = patch.kind {
                e.kind = kind;
            }
            if let Some(title) = patch.title {
                e.title = title;
            }
            if let Some(description) = patch.description {
                e.description = description;
            }
            if let Some(due_date) = patch.due_date {
                e.due_date = due_date;
            }
            if let Some(attached_file) = patch.attached_file {
                e.attached_file = attached_file;
            }
            if let Some(order) = patch.order {
                e.order = order;
            }
        }
        next
    }

    pub fn with_evaluation_removed(&self, id: &str) -> Self {
        let Some(scope) = self
            .evaluations
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.parent.clone())
        else {
            return self.clone();
        };

        let mut next = self.clone();
        next.evaluations.retain(|e| e.id != id);
        renormalize_orders(
            &mut next.evaluations,
            |e| e.parent == scope,
            |e| e.order,
            |e, o| e.order = o,
        );
        next
    }

    // ---- support files --------------------------------------------------

    pub fn with_support_file_added(&self, file: SupportFile) -> Self {
        let mut next = self.clone();
        next.support_files.push(file);
        next
    }

    pub fn with_support_file_removed(&self, id: &str) -> Self {
        let mut next = self.clone();
        next.support_files.retain(|f| f.id != id);
        next
    }

    /// Drop every support file under one parent. Used after a confirmed
    /// upload so the next reload's server copies (with canonical ids and
    /// locators) are adopted instead of shadowed by the local rows.
    pub fn with_support_files_cleared(&self, parent: &ParentRef) -> Self {
        let mut next = self.clone();
        next.support_files.retain(|f| &f.parent != parent);
        next
    }

    // ---- id adoption ----------------------------------------------------

    /// Replace a temporary local id with the canonical server id, in the
    /// entity's own row and in every parent reference pointing at it.
    pub fn with_id_swapped(&self, tmp_id: &str, real_id: &str) -> Self {
        let mut next = self.clone();

        for g in next.groupings.iter_mut() {
            if g.id == tmp_id {
                g.id = real_id.to_string();
            }
        }
        for c in next.chapters.iter_mut() {
            if c.id == tmp_id {
                c.id = real_id.to_string();
            }
            if c.grouping_id.as_deref() == Some(tmp_id) {
                c.grouping_id = Some(real_id.to_string());
            }
        }
        for s in next.sub_chapters.iter_mut() {
            if s.id == tmp_id {
                s.id = real_id.to_string();
            }
            if s.chapter_id == tmp_id {
                s.chapter_id = real_id.to_string();
            }
        }

        let swap_parent = |p: &mut ParentRef| {
            if p.chapter_id == tmp_id {
                p.chapter_id = real_id.to_string();
            }
            if p.sub_chapter_id.as_deref() == Some(tmp_id) {
                p.sub_chapter_id = Some(real_id.to_string());
            }
        };

        for i in next.contents.iter_mut() {
            if i.id == tmp_id {
                i.id = real_id.to_string();
            }
            swap_parent(&mut i.parent);
        }
        for e in next.evaluations.iter_mut() {
            if e.id == tmp_id {
                e.id = real_id.to_string();
            }
            swap_parent(&mut e.parent);
        }
        for f in next.support_files.iter_mut() {
            if f.id == tmp_id {
                f.id = real_id.to_string();
            }
            swap_parent(&mut f.parent);
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouping(id: &str, order: u32) -> Grouping {
        Grouping {
            id: id.to_string(),
            title: format!("Grouping {id}"),
            order,
        }
    }

    fn chapter(id: &str, grouping_id: Option<&str>, order: u32) -> Chapter {
        Chapter {
            id: id.to_string(),
            title: format!("Chapter {id}"),
            order,
            grouping_id: grouping_id.map(|s| s.to_string()),
            quizzes: vec![],
        }
    }

    fn sub_chapter(id: &str, chapter_id: &str, order: u32) -> SubChapter {
        SubChapter {
            id: id.to_string(),
            title: format!("Sub {id}"),
            order,
            chapter_id: chapter_id.to_string(),
        }
    }

    fn content(id: &str, parent: ParentRef, order: u32) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            kind: ContentKind::Text,
            title: format!("Item {id}"),
            body: String::new(),
            attached_file: None,
            order,
            parent,
        }
    }

    #[test]
    fn test_update_on_missing_id_is_noop() {
        let store = OutlineStore::default().with_chapter_added(chapter("c1", None, 0));

        let next = store.with_chapter_updated(
            "does-not-exist",
            ChapterPatch {
                title: Some("x".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(next, store);
    }

    #[test]
    fn test_remove_on_missing_id_is_noop() {
        let store = OutlineStore::default().with_chapter_added(chapter("c1", None, 0));
        assert_eq!(store.with_content_removed("gone"), store);
        assert_eq!(store.with_chapter_removed("gone"), store);
    }

    #[test]
    fn test_grouping_removal_orphans_chapters() {
        let store = OutlineStore::default()
            .with_grouping_added(grouping("g1", 0))
            .with_chapter_added(chapter("c1", Some("g1"), 0))
            .with_chapter_added(chapter("c2", Some("g1"), 1))
            .with_chapter_added(chapter("c3", None, 0));

        let next = store.with_grouping_removed("g1");

        assert!(next.grouping("g1").is_none());
        assert_eq!(next.chapters.len(), 3);
        assert!(next.chapters.iter().all(|c| c.grouping_id.is_none()));
        assert_eq!(next.chapters_of(None).len(), 3);
    }

    #[test]
    fn test_chapter_removal_drops_subtree() {
        let store = OutlineStore::default()
            .with_chapter_added(chapter("c1", None, 0))
            .with_chapter_added(chapter("c2", None, 1))
            .with_sub_chapter_added(sub_chapter("s1", "c1", 0))
            .with_content_added(content("i1", ParentRef::chapter("c1"), 0))
            .with_content_added(content("i2", ParentRef::sub_chapter("c1", "s1"), 0))
            .with_content_added(content("i3", ParentRef::chapter("c2"), 0));

        let next = store.with_chapter_removed("c1");

        assert!(next.chapter("c1").is_none());
        assert!(next.sub_chapters.is_empty());
        assert_eq!(next.contents.len(), 1);
        assert_eq!(next.contents[0].id, "i3");
    }

    #[test]
    fn test_sub_chapter_removal_keeps_chapter_level_children() {
        let store = OutlineStore::default()
            .with_chapter_added(chapter("c1", None, 0))
            .with_sub_chapter_added(sub_chapter("s1", "c1", 0))
            .with_content_added(content("direct", ParentRef::chapter("c1"), 0))
            .with_content_added(content("nested", ParentRef::sub_chapter("c1", "s1"), 0));

        let next = store.with_sub_chapter_removed("s1");

        assert!(next.sub_chapter("s1").is_none());
        assert_eq!(next.contents.len(), 1);
        assert_eq!(next.contents[0].id, "direct");
    }

    #[test]
    fn test_chapter_patch_can_clear_grouping() {
        let store = OutlineStore::default().with_chapter_added(chapter("c1", Some("g1"), 0));

        let next = store.with_chapter_updated(
            "c1",
            ChapterPatch {
                grouping_id: Some(None),
                ..Default::default()
            },
        );

        assert!(next.chapter("c1").unwrap().grouping_id.is_none());
    }

    #[test]
    fn test_id_swap_rewrites_parent_references() {
        let store = OutlineStore::default()
            .with_chapter_added(chapter("tmp-1-c", None, 0))
            .with_sub_chapter_added(sub_chapter("s1", "tmp-1-c", 0))
            .with_content_added(content("i1", ParentRef::sub_chapter("tmp-1-c", "s1"), 0));

        let next = store.with_id_swapped("tmp-1-c", "c-real");

        assert!(next.chapter("c-real").is_some());
        assert_eq!(next.sub_chapters[0].chapter_id, "c-real");
        assert_eq!(next.contents[0].parent.chapter_id, "c-real");
        assert_eq!(next.contents[0].parent.sub_chapter_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_children_are_scoped_to_their_parent() {
        let store = OutlineStore::default()
            .with_chapter_added(chapter("c1", None, 0))
            .with_sub_chapter_added(sub_chapter("s1", "c1", 0))
            .with_content_added(content("direct", ParentRef::chapter("c1"), 1))
            .with_content_added(content("nested", ParentRef::sub_chapter("c1", "s1"), 0));

        let direct = store.contents_under(&ParentRef::chapter("c1"));
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].id, "direct");

        let nested = store.contents_under(&ParentRef::sub_chapter("c1", "s1"));
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].id, "nested");
    }

    #[test]
    fn test_removal_renormalizes_sibling_orders() {
        let store = OutlineStore::default()
            .with_chapter_added(chapter("c1", None, 0))
            .with_content_added(content("i0", ParentRef::chapter("c1"), 0))
            .with_content_added(content("i1", ParentRef::chapter("c1"), 1))
            .with_content_added(content("i2", ParentRef::chapter("c1"), 2));

        let next = store.with_content_removed("i1");

        let remaining = next.contents_under(&ParentRef::chapter("c1"));
        assert_eq!(
            remaining.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["i0", "i2"]
        );
        assert_eq!(
            remaining.iter().map(|i| i.order).collect::<Vec<_>>(),
            vec![0, 1],
            "orders close the gap left by the removal"
        );
    }

    #[test]
    fn test_grouping_removal_appends_orphans_after_existing_ones() {
        let store = OutlineStore::default()
            .with_grouping_added(grouping("g1", 0))
            .with_chapter_added(chapter("old-orphan", None, 0))
            .with_chapter_added(chapter("c1", Some("g1"), 0))
            .with_chapter_added(chapter("c2", Some("g1"), 1));

        let next = store.with_grouping_removed("g1");

        let orphans = next.chapters_of(None);
        assert_eq!(
            orphans.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["old-orphan", "c1", "c2"]
        );
        assert_eq!(
            orphans.iter().map(|c| c.order).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_chapter_move_appends_and_closes_gap() {
        let store = OutlineStore::default()
            .with_grouping_added(grouping("g1", 0))
            .with_grouping_added(grouping("g2", 1))
            .with_chapter_added(chapter("a", Some("g1"), 0))
            .with_chapter_added(chapter("b", Some("g1"), 1))
            .with_chapter_added(chapter("c", Some("g2"), 0));

        let next = store.with_chapter_moved("a", Some("g2".to_string()));

        let g1 = next.chapters_of(Some("g1"));
        assert_eq!(g1.len(), 1);
        assert_eq!(g1[0].order, 0);

        let g2 = next.chapters_of(Some("g2"));
        assert_eq!(
            g2.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["c", "a"]
        );
        assert_eq!(g2[1].order, 1);

        // Moving to where it already lives changes nothing.
        assert_eq!(next.with_chapter_moved("a", Some("g2".to_string())), next);
    }

    #[test]
    fn test_subtree_ids_cover_all_levels() {
        let store = OutlineStore::default()
            .with_chapter_added(chapter("c1", None, 0))
            .with_sub_chapter_added(sub_chapter("s1", "c1", 0))
            .with_content_added(content("i1", ParentRef::sub_chapter("c1", "s1"), 0));

        let mut ids = store.chapter_subtree_ids("c1");
        ids.sort();
        assert_eq!(ids, vec!["c1", "i1", "s1"]);
    }
}
