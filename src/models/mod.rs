use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Content item payload kind.
///
/// Wire strings are kebab-case ("text", "video", "image"), matching what the
/// authoring backend stores.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ContentKind {
    Text,
    Video,
    Image,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EvaluationKind {
    Assignment,
    Exam,
}

/// Reference to an uploaded binary (cover image, exam sheet, ...).
///
/// The locator is opaque to this crate; the backend resolves it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct FileRef {
    pub name: String,

    #[serde(rename = "mime-kind", default)]
    pub mime_kind: String,

    pub locator: String,
}

/// Ownership back-reference for chapter children.
///
/// A child row hangs off a chapter directly (`sub_chapter_id = None`) or off
/// one of that chapter's sub-chapters.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ParentRef {
    #[serde(rename = "chapter-id")]
    pub chapter_id: String,

    #[serde(rename = "sub-chapter-id", default)]
    pub sub_chapter_id: Option<String>,
}

impl ParentRef {
    pub fn chapter(chapter_id: &str) -> Self {
        Self {
            chapter_id: chapter_id.to_string(),
            sub_chapter_id: None,
        }
    }

    pub fn sub_chapter(chapter_id: &str, sub_chapter_id: &str) -> Self {
        Self {
            chapter_id: chapter_id.to_string(),
            sub_chapter_id: Some(sub_chapter_id.to_string()),
        }
    }
}

/// Named ordered container of chapters ("block"/"section").
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Grouping {
    pub id: String,
    pub title: String,
    pub order: u32,
}

/// Quiz association carried on a chapter.
///
/// Server-owned; this crate never creates or edits quizzes, it only keeps the
/// association list fresh on reload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct QuizRef {
    pub id: String,
    pub title: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub order: u32,

    /// Owning grouping. `None` means the chapter is an orphan (its grouping
    /// was deleted; chapters are never cascade-deleted).
    #[serde(rename = "grouping-id", default)]
    pub grouping_id: Option<String>,

    #[serde(default)]
    pub quizzes: Vec<QuizRef>,
}

/// One nesting level below a chapter. Sub-chapters cannot nest further.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SubChapter {
    pub id: String,
    pub title: String,
    pub order: u32,

    #[serde(rename = "chapter-id")]
    pub chapter_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContentItem {
    pub id: String,
    pub kind: ContentKind,
    pub title: String,

    #[serde(default)]
    pub body: String,

    #[serde(rename = "attached-file", default)]
    pub attached_file: Option<FileRef>,

    pub order: u32,

    #[serde(flatten)]
    pub parent: ParentRef,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub id: String,
    pub kind: EvaluationKind,
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "due-date", default)]
    pub due_date: Option<String>,

    #[serde(rename = "attached-file", default)]
    pub attached_file: Option<FileRef>,

    pub order: u32,

    #[serde(flatten)]
    pub parent: ParentRef,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SupportFile {
    pub id: String,

    #[serde(rename = "display-name")]
    pub display_name: String,

    #[serde(rename = "byte-size")]
    pub byte_size: u64,

    #[serde(rename = "mime-kind")]
    pub mime_kind: String,

    pub locator: String,

    #[serde(flatten)]
    pub parent: ParentRef,
}

/// Local handle for a file the operator picked for upload.
///
/// The bytes travel as one multipart part; the backend assigns the stored
/// id/locator, which arrive on the next outline reload.
#[derive(Clone, Debug)]
pub struct SupportFileUpload {
    pub file_name: String,
    pub mime_kind: String,
    pub bytes: Vec<u8>,
}
