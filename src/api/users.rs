//! User account endpoints

use super::guard::{parse_payload, SessionGuard, NO_QUERY};
use super::ApiError;
use crate::session::UserInfo;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Payload of a successful login
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user_info: Option<UserInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub user_id: i64,
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AvatarUrlUpdate<'a> {
    user_id: i64,
    avatar_url: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserQuery {
    user_id: i64,
}

/// Thin wrapper over `/user/*` routes
#[derive(Clone)]
pub struct UserApi {
    guard: Arc<SessionGuard>,
}

impl UserApi {
    pub fn new(guard: Arc<SessionGuard>) -> Self {
        Self { guard }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<Value, ApiError> {
        self.guard.post("/user/register", request).await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let payload = self.guard.post("/user/login", request).await?;
        parse_payload(payload)
    }

    pub async fn info(&self, user_id: i64) -> Result<UserInfo, ApiError> {
        let payload = self
            .guard
            .get(&format!("/user/info/{}", user_id), NO_QUERY)
            .await?;
        parse_payload(payload)
    }

    pub async fn update(&self, user: &UserInfo) -> Result<Value, ApiError> {
        self.guard.put("/user/update", user).await
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<Value, ApiError> {
        self.guard.post("/user/changePassword", request).await
    }

    pub async fn note_count(&self, user_id: i64) -> Result<Value, ApiError> {
        self.guard.get("/note/count", &UserQuery { user_id }).await
    }

    /// Upload a new avatar image as `multipart/form-data`
    pub async fn upload_avatar(
        &self,
        user_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Value, ApiError> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = file_part(file_name, bytes, mime.as_ref())?;
        let form = Form::new()
            .text("userId", user_id.to_string())
            .part("file", part);
        self.guard.post_multipart("/user/avatar", form).await
    }

    pub async fn update_avatar_url(&self, user_id: i64, avatar_url: &str) -> Result<Value, ApiError> {
        self.guard
            .put(
                "/user/avatar/update",
                &AvatarUrlUpdate {
                    user_id,
                    avatar_url,
                },
            )
            .await
    }
}

fn file_part(file_name: &str, bytes: Vec<u8>, mime: &str) -> Result<Part, ApiError> {
    Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .map_err(|e| ApiError::InvalidRequest(format!("content type '{}': {}", mime, e)))
}
