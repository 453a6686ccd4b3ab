//! Provider wire formats.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contract::model::{NewProfile, Profile, Session, SessionUser};

/// Reported when the provider omits `app_metadata.provider`.
pub const UNKNOWN_LOGIN_METHOD: &str = "unknown";

#[derive(Debug, Serialize)]
pub struct PkceGrant<'a> {
    pub auth_code: &'a str,
    pub code_verifier: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RefreshGrant<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until expiry.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix timestamp; preferred over `expires_in` when present.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: WireUser,
}

#[derive(Debug, Deserialize)]
pub struct WireUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub provider: Option<String>,
}

impl TokenResponse {
    pub fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));

        Session {
            user: SessionUser {
                id: self.user.id,
                email: self.user.email,
                provider: self
                    .user
                    .app_metadata
                    .provider
                    .unwrap_or_else(|| UNKNOWN_LOGIN_METHOD.to_string()),
            },
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: Uuid,
    pub display_name: String,
    #[serde(default)]
    pub age_range: Option<String>,
    pub city: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub login_method: Option<String>,
    #[serde(default)]
    pub credits_balance: Option<i64>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            display_name: row.display_name,
            age_range: row.age_range,
            city: row.city,
            bio: row.bio,
            login_method: row.login_method,
            credits_balance: row.credits_balance,
        }
    }
}

impl From<NewProfile> for ProfileRow {
    fn from(p: NewProfile) -> Self {
        Self {
            id: p.id,
            display_name: p.display_name,
            age_range: p.age_range,
            city: p.city,
            bio: p.bio,
            login_method: Some(p.login_method),
            credits_balance: Some(p.credits_balance),
        }
    }
}
