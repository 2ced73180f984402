//! Note endpoints

use super::guard::{parse_payload, SessionGuard};
use super::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Default page size used by the note listings
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A note as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub note_type: Option<i32>,
    #[serde(default)]
    pub is_markdown: Option<i32>,
    /// Timestamps and anything else the backend adds
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of create / update calls
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: i32,
    /// 1 when the content is Markdown
    pub is_markdown: i32,
}

/// 1-based page selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub num: u32,
    pub size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            num: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery<'a> {
    user_id: i64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    note_type: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword: Option<&'a str>,
    page_num: u32,
    page_size: u32,
}

impl<'a> ListQuery<'a> {
    fn new(user_id: i64, page: Page) -> Self {
        Self {
            user_id,
            note_type: None,
            keyword: None,
            page_num: page.num,
            page_size: page.size,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OwnerQuery {
    user_id: i64,
}

/// Thin wrapper over `/note/*` routes
#[derive(Clone)]
pub struct NoteApi {
    guard: Arc<SessionGuard>,
}

impl NoteApi {
    pub fn new(guard: Arc<SessionGuard>) -> Self {
        Self { guard }
    }

    pub async fn create(&self, note: &NoteDraft) -> Result<Value, ApiError> {
        self.guard.post("/note/create", note).await
    }

    pub async fn update(&self, note: &NoteDraft) -> Result<Value, ApiError> {
        self.guard.put("/note/update", note).await
    }

    pub async fn delete(&self, note_id: i64, user_id: i64) -> Result<Value, ApiError> {
        self.guard
            .delete(&format!("/note/delete/{}", note_id), &OwnerQuery { user_id })
            .await
    }

    pub async fn detail(&self, note_id: i64, user_id: i64) -> Result<Note, ApiError> {
        let payload = self
            .guard
            .get(&format!("/note/detail/{}", note_id), &OwnerQuery { user_id })
            .await?;
        parse_payload(payload)
    }

    pub async fn list(&self, user_id: i64, page: Page) -> Result<Value, ApiError> {
        self.guard
            .get("/note/list", &ListQuery::new(user_id, page))
            .await
    }

    pub async fn list_by_type(
        &self,
        user_id: i64,
        note_type: i32,
        page: Page,
    ) -> Result<Value, ApiError> {
        let query = ListQuery {
            note_type: Some(note_type),
            ..ListQuery::new(user_id, page)
        };
        self.guard.get("/note/listByType", &query).await
    }

    pub async fn search(&self, user_id: i64, keyword: &str, page: Page) -> Result<Value, ApiError> {
        let query = ListQuery {
            keyword: Some(keyword),
            ..ListQuery::new(user_id, page)
        };
        self.guard.get("/note/search", &query).await
    }
}

/// Pull the notes out of a listing payload.
///
/// Listings come back either as a bare array or wrapped in a page object
/// (`records`, `list`, `rows` or `items`).
pub fn notes_in_listing(payload: &Value) -> Vec<Note> {
    let items = match payload {
        Value::Array(items) => Some(items),
        Value::Object(obj) => ["records", "list", "rows", "items"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_array)),
        _ => None,
    };
    items
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
