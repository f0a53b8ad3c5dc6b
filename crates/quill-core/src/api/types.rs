//! Wire types for the article service API.

use chrono::NaiveDateTime;
use serde::Deserialize;

/// Token triple returned by the login, register, and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Always "bearer"; kept for completeness.
    #[serde(default)]
    pub token_type: String,
    /// Access-token lifetime in seconds.
    #[serde(default)]
    pub expires_in: i64,
    pub csrf_token: String,
}

/// The signed-in user, as served by `GET /auth/me`.
///
/// `created_at` is naive: the service serializes timestamps without an
/// offset.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl UserProfile {
    /// Display name: the full name when present, the email otherwise.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email)
    }
}

/// A published article.
#[derive(Debug, Clone, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
}
