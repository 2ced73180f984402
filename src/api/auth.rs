//! Login, logout and the locally cached profile

use super::guard::SessionGuard;
use super::users::{LoginRequest, LoginResponse, UserApi};
use super::ApiError;
use crate::events::Notice;
use crate::session::{SessionContext, UserInfo};
use crate::util::to_absolute_url;
use std::sync::Arc;
use tracing::{info, warn};

/// Credentials pre-filled on the login screen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RememberedLogin {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Session lifecycle on top of the user endpoints
pub struct AuthService {
    users: UserApi,
    guard: Arc<SessionGuard>,
    remember_password: bool,
}

impl AuthService {
    pub fn new(guard: Arc<SessionGuard>, remember_password: bool) -> Self {
        Self {
            users: UserApi::new(guard.clone()),
            guard,
            remember_password,
        }
    }

    fn session(&self) -> &Arc<SessionContext> {
        self.guard.session()
    }

    /// Log in and persist the new session.
    ///
    /// With `remember_me` the username is stored for next time; the password
    /// only when `remember_password` is enabled.
    pub async fn login(
        &self,
        request: &LoginRequest,
        remember_me: bool,
    ) -> Result<LoginResponse, ApiError> {
        let response = self.users.login(request).await?;
        if response.token.is_empty() {
            return Err(ApiError::InvalidResponse("login reply carries no token".into()));
        }

        let nickname = response
            .user_info
            .as_ref()
            .and_then(|u| u.nickname.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| request.username.clone());
        let avatar_url = response
            .user_info
            .as_ref()
            .and_then(|u| u.avatar.as_deref())
            .map(|avatar| to_absolute_url(avatar, self.guard.base_url()))
            .filter(|url| !url.is_empty());

        let store_password = remember_me && self.remember_password;
        if remember_me && !self.remember_password {
            warn!("Password not persisted; set remember_password to store it");
        }

        self.session()
            .update(|state| {
                state.token = Some(response.token.clone());
                state.user_info = response.user_info.clone();
                state.nickname = Some(nickname.clone());
                state.avatar_url = avatar_url;
                if remember_me {
                    state.remembered_username = Some(request.username.clone());
                    state.remembered_password =
                        store_password.then(|| request.password.clone());
                } else {
                    state.remembered_username = None;
                    state.remembered_password = None;
                }
            })
            .await?;

        info!(username = %request.username, "Logged in");
        self.guard.events().notify(Notice::success("Logged in"));
        Ok(response)
    }

    /// Clear the credential and profile. The remembered login survives.
    pub async fn logout(&self) -> bool {
        let cleared = self.session().teardown().await;
        if cleared {
            info!("Logged out");
            self.guard.events().notify(Notice::success("Logged out"));
        }
        cleared
    }

    pub async fn current_user(&self) -> Option<UserInfo> {
        self.session().current_user().await
    }

    pub async fn is_logged_in(&self) -> bool {
        self.session().is_logged_in().await
    }

    pub async fn remembered_credentials(&self) -> RememberedLogin {
        let state = self.session().snapshot().await;
        RememberedLogin {
            username: state.remembered_username,
            password: state.remembered_password,
        }
    }

    /// Display name: cached nickname, else the username
    pub async fn display_name(&self) -> Option<String> {
        let state = self.session().snapshot().await;
        let username = state.current_user().and_then(|u| u.username.clone());
        state.nickname.or(username)
    }

    pub async fn update_nickname(&self, nickname: &str) -> Result<(), ApiError> {
        let nickname = nickname.to_string();
        self.session()
            .update(|state| {
                if let Some(user) = state.user_info.as_mut() {
                    user.nickname = Some(nickname.clone());
                }
                state.nickname = Some(nickname);
            })
            .await?;
        Ok(())
    }

    /// Cache a new avatar; relative paths are resolved against the API origin
    pub async fn update_avatar_url(&self, avatar: &str) -> Result<String, ApiError> {
        let absolute = to_absolute_url(avatar, self.guard.base_url());
        let cached = absolute.clone();
        let raw = avatar.to_string();
        self.session()
            .update(|state| {
                if let Some(user) = state.user_info.as_mut() {
                    user.avatar = Some(raw);
                }
                state.avatar_url = Some(cached).filter(|u| !u.is_empty());
            })
            .await?;
        Ok(absolute)
    }

    /// Re-fetch the profile of the logged-in user and refresh the cache
    pub async fn refresh_profile(&self) -> Result<UserInfo, ApiError> {
        let user_id = self
            .current_user()
            .await
            .and_then(|u| u.id)
            .ok_or(ApiError::NotLoggedIn)?;
        let info = self.users.info(user_id).await?;

        let avatar_url = info
            .avatar
            .as_deref()
            .map(|a| to_absolute_url(a, self.guard.base_url()))
            .filter(|u| !u.is_empty());
        let fresh = info.clone();
        self.session()
            .update(|state| {
                if let Some(nickname) = fresh.nickname.clone().filter(|n| !n.is_empty()) {
                    state.nickname = Some(nickname);
                }
                state.avatar_url = avatar_url;
                state.user_info = Some(fresh);
            })
            .await?;
        Ok(info)
    }
}
