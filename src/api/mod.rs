use crate::models::{
    Chapter, ContentItem, ContentKind, Evaluation, EvaluationKind, FileRef, Grouping, SubChapter,
    SupportFile, SupportFileUpload,
};
use crate::outline::OutlineStore;
use crate::storage::{load_string_from_storage, remove_from_storage, save_string_to_storage, TOKEN_KEY};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
}

#[derive(Clone, Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    fn unauthorized() -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: "Unauthorized".to_string(),
        }
    }

    fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status}): {body}"),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EnvConfig {
    pub api_url: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        let default_api_url = "http://localhost:8686".to_string();

        // The hosting page may inject `window.ENV.API_URL`; the lowercase
        // `api_url` spelling is accepted for compatibility.
        if let Some(window) = web_sys::window() {
            if let Some(env) = window.get("ENV") {
                if !env.is_undefined() && env.is_object() {
                    if let Ok(api_url) = js_sys::Reflect::get(&env, &"API_URL".into()) {
                        if let Some(url_str) = api_url.as_string() {
                            return Self { api_url: url_str };
                        }
                    }

                    if let Ok(api_url) = js_sys::Reflect::get(&env, &"api_url".into()) {
                        if let Some(url_str) = api_url.as_string() {
                            return Self { api_url: url_str };
                        }
                    }
                }
            }
        }

        Self {
            api_url: default_api_url,
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn get_api_url() -> String {
    EnvConfig::new().api_url
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ListOutlineRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateGroupingRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,
    pub title: String,
    pub order: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateGroupingRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DeleteEntityRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,
    pub id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateChapterRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,
    pub title: String,

    #[serde(rename = "grouping-id", skip_serializing_if = "Option::is_none")]
    pub grouping_id: Option<String>,

    pub order: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateChapterRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,

    /// Double option: `Some(None)` serializes as an explicit null, which the
    /// backend reads as "clear the owning grouping" (orphan the chapter).
    #[serde(rename = "grouping-id", skip_serializing_if = "Option::is_none")]
    pub grouping_id: Option<Option<String>>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateSubChapterRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,

    #[serde(rename = "chapter-id")]
    pub chapter_id: String,

    pub title: String,
    pub order: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateSubChapterRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateContentItemRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,

    #[serde(rename = "chapter-id")]
    pub chapter_id: String,

    #[serde(rename = "sub-chapter-id", skip_serializing_if = "Option::is_none")]
    pub sub_chapter_id: Option<String>,

    pub kind: ContentKind,
    pub title: String,
    pub body: String,

    #[serde(rename = "attached-file", skip_serializing_if = "Option::is_none")]
    pub attached_file: Option<FileRef>,

    pub order: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateContentItemRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ContentKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(rename = "attached-file", skip_serializing_if = "Option::is_none")]
    pub attached_file: Option<Option<FileRef>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateEvaluationRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,

    #[serde(rename = "chapter-id")]
    pub chapter_id: String,

    #[serde(rename = "sub-chapter-id", skip_serializing_if = "Option::is_none")]
    pub sub_chapter_id: Option<String>,

    pub kind: EvaluationKind,
    pub title: String,
    pub description: String,

    #[serde(rename = "due-date", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,

    pub order: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateEvaluationRequest {
    #[serde(rename = "course-id")]
    pub course_id: String,
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<EvaluationKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "due-date", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,

    #[serde(rename = "attached-file", skip_serializing_if = "Option::is_none")]
    pub attached_file: Option<Option<FileRef>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

#[derive(Clone)]
pub struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            token: None,
        }
    }

    pub fn load_from_storage() -> Self {
        Self {
            base_url: get_api_url(),
            token: load_string_from_storage(TOKEN_KEY),
        }
    }

    pub fn save_to_storage(&self) {
        if let Some(token) = &self.token {
            save_string_to_storage(TOKEN_KEY, token);
        }
    }

    pub fn clear_storage() {
        remove_from_storage(TOKEN_KEY);
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn logout(&mut self) {
        self.token = None;
        Self::clear_storage();
    }

    pub(crate) fn get_auth_token(&self) -> Option<String> {
        self.token.clone()
    }

    fn with_auth_headers(
        mut req: reqwest::RequestBuilder,
        token: Option<String>,
    ) -> reqwest::RequestBuilder {
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    async fn request_api<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&impl serde::Serialize>,
    ) -> ApiResult<T> {
        let client = reqwest::Client::new();
        let url = format!("{}{}", self.base_url, path);
        let mut req = client.post(url);
        req = Self::with_auth_headers(req, self.get_auth_token());

        if let Some(b) = body {
            req = req.json(b);
        }

        let res = req.send().await.map_err(ApiError::network)?;

        if res.status().is_success() {
            res.json().await.map_err(ApiError::parse)
        } else if res.status().as_u16() == 401 {
            Err(ApiError::unauthorized())
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body, "Request failed"))
        }
    }

    /// Pull the canonical entity out of a create/update response envelope.
    ///
    /// The backend usually nests it under a named key but has been observed
    /// returning it flattened; accept both.
    fn parse_entity<T: serde::de::DeserializeOwned>(
        data: &serde_json::Value,
        key: &str,
    ) -> Option<T> {
        if let Some(nested) = data.get(key) {
            if let Ok(entity) = serde_json::from_value(nested.clone()) {
                return Some(entity);
            }
        }
        serde_json::from_value(data.clone()).ok()
    }

    fn entity_or_parse_error<T: serde::de::DeserializeOwned>(
        data: serde_json::Value,
        key: &str,
    ) -> ApiResult<T> {
        Self::parse_entity(&data, key).ok_or_else(|| {
            ApiError::parse(format!("response is missing a usable `{key}`: {data}"))
        })
    }

    pub(crate) fn parse_outline_response(data: serde_json::Value) -> OutlineStore {
        let outline = data.get("outline").cloned().unwrap_or(data);

        // Canonical contract: kebab-case tables, parseable in one go.
        if let Ok(store) = serde_json::from_value::<OutlineStore>(outline.clone()) {
            return store;
        }

        let list = |k: &str| -> Vec<serde_json::Value> {
            outline
                .get(k)
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default()
        };

        let mut store = OutlineStore::default();

        for item in list("groupings") {
            if let Ok(g) = serde_json::from_value::<Grouping>(item.clone()) {
                store.groupings.push(g);
                continue;
            }

            // Namespaced variant observed from older backend builds.
            let get_s = |k: &str| item.get(k).and_then(|v| v.as_str()).map(|s| s.to_string());
            let id = get_s("course-groupings/id").unwrap_or_default();
            let title = get_s("course-groupings/title").unwrap_or_default();
            if !id.trim().is_empty() {
                store.groupings.push(Grouping {
                    id,
                    title,
                    order: item
                        .get("course-groupings/order")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0) as u32,
                });
            }
        }

        for item in list("chapters") {
            if let Ok(c) = serde_json::from_value::<Chapter>(item.clone()) {
                store.chapters.push(c);
                continue;
            }

            let get_s = |k: &str| item.get(k).and_then(|v| v.as_str()).map(|s| s.to_string());
            let id = get_s("course-chapters/id").unwrap_or_default();
            if !id.trim().is_empty() {
                store.chapters.push(Chapter {
                    id,
                    title: get_s("course-chapters/title").unwrap_or_default(),
                    order: item
                        .get("course-chapters/order")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0) as u32,
                    grouping_id: get_s("course-chapters/grouping-id"),
                    quizzes: vec![],
                });
            }
        }

        // Child tables follow the canonical contract; skip rows that don't.
        store.sub_chapters = list("sub-chapters")
            .into_iter()
            .filter_map(|v| serde_json::from_value::<SubChapter>(v).ok())
            .collect();
        store.contents = list("contents")
            .into_iter()
            .filter_map(|v| serde_json::from_value::<ContentItem>(v).ok())
            .collect();
        store.evaluations = list("evaluations")
            .into_iter()
            .filter_map(|v| serde_json::from_value::<Evaluation>(v).ok())
            .collect();
        store.support_files = list("support-files")
            .into_iter()
            .filter_map(|v| serde_json::from_value::<SupportFile>(v).ok())
            .collect();

        store
    }

    /// Full outline reload; the response is authoritative for structure.
    pub async fn list_outline(&self, course_id: &str) -> ApiResult<OutlineStore> {
        let data: serde_json::Value = self
            .request_api(
                "/authoring/get-course-outline",
                Some(&ListOutlineRequest {
                    course_id: course_id.to_string(),
                }),
            )
            .await?;
        Ok(Self::parse_outline_response(data))
    }

    pub async fn create_grouping(&self, req: CreateGroupingRequest) -> ApiResult<Grouping> {
        let data: serde_json::Value = self
            .request_api("/authoring/new-grouping", Some(&req))
            .await?;
        Self::entity_or_parse_error(data, "grouping")
    }

    pub async fn update_grouping(&self, req: UpdateGroupingRequest) -> ApiResult<serde_json::Value> {
        self.request_api("/authoring/update-grouping", Some(&req))
            .await
    }

    pub async fn delete_grouping(&self, course_id: &str, id: &str) -> ApiResult<serde_json::Value> {
        self.request_api(
            "/authoring/delete-grouping",
            Some(&DeleteEntityRequest {
                course_id: course_id.to_string(),
                id: id.to_string(),
            }),
        )
        .await
    }

    pub async fn create_chapter(&self, req: CreateChapterRequest) -> ApiResult<Chapter> {
        let data: serde_json::Value = self
            .request_api("/authoring/new-chapter", Some(&req))
            .await?;
        Self::entity_or_parse_error(data, "chapter")
    }

    pub async fn update_chapter(&self, req: UpdateChapterRequest) -> ApiResult<serde_json::Value> {
        self.request_api("/authoring/update-chapter", Some(&req))
            .await
    }

    pub async fn delete_chapter(&self, course_id: &str, id: &str) -> ApiResult<serde_json::Value> {
        self.request_api(
            "/authoring/delete-chapter",
            Some(&DeleteEntityRequest {
                course_id: course_id.to_string(),
                id: id.to_string(),
            }),
        )
        .await
    }

    pub async fn create_sub_chapter(&self, req: CreateSubChapterRequest) -> ApiResult<SubChapter> {
        let data: serde_json::Value = self
            .request_api("/authoring/new-sub-chapter", Some(&req))
            .await?;
        Self::entity_or_parse_error(data, "sub-chapter")
    }

    pub async fn update_sub_chapter(
        &self,
        req: UpdateSubChapterRequest,
    ) -> ApiResult<serde_json::Value> {
        self.request_api("/authoring/update-sub-chapter", Some(&req))
            .await
    }

    pub async fn delete_sub_chapter(
        &self,
        course_id: &str,
        id: &str,
    ) -> ApiResult<serde_json::Value> {
        self.request_api(
            "/authoring/delete-sub-chapter",
            Some(&DeleteEntityRequest {
                course_id: course_id.to_string(),
                id: id.to_string(),
            }),
        )
        .await
    }

    pub async fn create_content_item(
        &self,
        req: CreateContentItemRequest,
    ) -> ApiResult<ContentItem> {
        let data: serde_json::Value = self
            .request_api("/authoring/new-content-item", Some(&req))
            .await?;
        Self::entity_or_parse_error(data, "content-item")
    }

    pub async fn update_content_item(
        &self,
        req: UpdateContentItemRequest,
    ) -> ApiResult<serde_json::Value> {
        self.request_api("/authoring/update-content-item", Some(&req))
            .await
    }

    pub async fn delete_content_item(
        &self,
        course_id: &str,
        id: &str,
    ) -> ApiResult<serde_json::Value> {
        self.request_api(
            "/authoring/delete-content-item",
            Some(&DeleteEntityRequest {
                course_id: course_id.to_string(),
                id: id.to_string(),
            }),
        )
        .await
    }

    pub async fn create_evaluation(&self, req: CreateEvaluationRequest) -> ApiResult<Evaluation> {
        let data: serde_json::Value = self
            .request_api("/authoring/new-evaluation", Some(&req))
            .await?;
        Self::entity_or_parse_error(data, "evaluation")
    }

    pub async fn update_evaluation(
        &self,
        req: UpdateEvaluationRequest,
    ) -> ApiResult<serde_json::Value> {
        self.request_api("/authoring/update-evaluation", Some(&req))
            .await
    }

    pub async fn delete_evaluation(
        &self,
        course_id: &str,
        id: &str,
    ) -> ApiResult<serde_json::Value> {
        self.request_api(
            "/authoring/delete-evaluation",
            Some(&DeleteEntityRequest {
                course_id: course_id.to_string(),
                id: id.to_string(),
            }),
        )
        .await
    }

    pub async fn delete_support_file(
        &self,
        course_id: &str,
        id: &str,
    ) -> ApiResult<serde_json::Value> {
        self.request_api(
            "/authoring/delete-support-file",
            Some(&DeleteEntityRequest {
                course_id: course_id.to_string(),
                id: id.to_string(),
            }),
        )
        .await
    }

    /// Multipart upload; the stored files (canonical ids, locators) arrive on
    /// the next outline reload.
    pub async fn upload_support_files(
        &self,
        course_id: &str,
        files: Vec<SupportFileUpload>,
        chapter_id: &str,
        sub_chapter_id: Option<&str>,
    ) -> ApiResult<bool> {
        let mut form = reqwest::multipart::Form::new()
            .text("course-id", course_id.to_string())
            .text("chapter-id", chapter_id.to_string());

        if let Some(sid) = sub_chapter_id {
            form = form.text("sub-chapter-id", sid.to_string());
        }

        for f in files {
            let part = reqwest::multipart::Part::bytes(f.bytes)
                .file_name(f.file_name)
                .mime_str(&f.mime_kind)
                .map_err(ApiError::parse)?;
            form = form.part("files", part);
        }

        let client = reqwest::Client::new();
        let url = format!("{}/authoring/upload-support-files", self.base_url);
        let mut req = client.post(url).multipart(form);
        req = Self::with_auth_headers(req, self.get_auth_token());

        let res = req.send().await.map_err(ApiError::network)?;

        if res.status().is_success() {
            let data: serde_json::Value = res.json().await.map_err(ApiError::parse)?;
            Ok(data.get("success").and_then(|v| v.as_bool()).unwrap_or(true))
        } else if res.status().as_u16() == 401 {
            Err(ApiError::unauthorized())
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body, "Upload failed"))
        }
    }
}
