//! Session state and user profile records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Profile of the logged-in user as returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Avatar reference; may be relative to the API origin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Any other profile fields the backend sends
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Everything the client keeps across restarts.
///
/// The credential is authoritative: without it, `user_info` is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub token: Option<String>,
    pub user_info: Option<UserInfo>,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub remembered_username: Option<String>,
    /// Only populated when `remember_password` is enabled in the config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remembered_password: Option<String>,
}

impl SessionState {
    /// The stored credential, if any (empty strings count as absent)
    pub fn credential(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    /// The logged-in user: requires both a credential and a user id
    pub fn current_user(&self) -> Option<&UserInfo> {
        self.credential()?;
        self.user_info.as_ref().filter(|u| u.id.is_some())
    }

    /// Drop the credential and cached profile fields, keeping the remembered login.
    ///
    /// Returns whether a credential was present.
    pub fn clear_session(&mut self) -> bool {
        let had_credential = self.has_credential();
        self.token = None;
        self.user_info = None;
        self.nickname = None;
        self.avatar_url = None;
        had_credential
    }
}
