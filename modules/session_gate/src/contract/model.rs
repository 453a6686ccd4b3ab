use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identity of the signed-in user as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: Option<String>,
    /// OAuth provider the user signed in with (`"google"`, `"facebook"`, ...).
    pub provider: String,
}

/// Provider-issued proof of authentication for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: SessionUser,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// True if the access token expires within `margin` of `now`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at.is_some_and(|at| at <= now + margin)
    }
}

/// Stored profile row. Fields the provider may leave null are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub age_range: Option<String>,
    pub city: String,
    pub bio: Option<String>,
    pub login_method: Option<String>,
    pub credits_balance: Option<i64>,
}

/// Row inserted on profile creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub id: Uuid,
    pub display_name: String,
    pub age_range: Option<String>,
    pub city: String,
    pub bio: Option<String>,
    pub login_method: String,
    pub credits_balance: i64,
}

/// Raw profile form input as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileForm {
    pub display_name: String,
    pub age_range: String,
    pub city: String,
    pub bio: String,
}

/// OAuth providers offered on the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    /// Provider identifier on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Facebook => "Facebook",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported OAuth provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for OAuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// The four mutually exclusive page containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Loading,
    Login,
    ProfileCreation,
    Dashboard,
}

impl Page {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Login => "login",
            Self::ProfileCreation => "profile",
            Self::Dashboard => "dashboard",
        }
    }
}

/// Inline message regions: one on the login page, one on the profile page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRegion {
    Login,
    Profile,
}

/// Session-change notification pushed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignedIn(_) => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed(_) => "TOKEN_REFRESHED",
        }
    }
}
