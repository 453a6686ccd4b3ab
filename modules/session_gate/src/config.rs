use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// `modules.session_gate` configuration section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionGateConfig {
    /// Base URL of the hosted provider project.
    pub provider_url: String,
    /// Public (anon) API key.
    pub anon_key: String,
    /// OAuth return URL; must point at this server's `/auth/callback`.
    pub redirect_url: String,
    /// Where the browser lands after the callback.
    pub app_url: String,
    pub profiles_table: String,
    pub initial_credits: i64,
    #[serde(with = "humantime_serde")]
    pub transition_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub error_clear_after: Duration,
    /// Keep the session in `<home_dir>/session.json` across restarts.
    pub persist_session: bool,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for SessionGateConfig {
    fn default() -> Self {
        Self {
            provider_url: String::new(),
            anon_key: String::new(),
            redirect_url: "http://127.0.0.1:8087/auth/callback".to_string(),
            app_url: "http://127.0.0.1:8087/".to_string(),
            profiles_table: "profiles".to_string(),
            initial_credits: 5,
            transition_delay: Duration::from_secs(1),
            error_clear_after: Duration::from_secs(5),
            persist_session: true,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("session_gate.{field} is required")]
    Missing { field: &'static str },

    #[error("session_gate.{field} is not a valid URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("session_gate.{field} must be an http(s) URL")]
    UnsupportedScheme { field: &'static str },

    #[error("session_gate.initial_credits must not be negative")]
    NegativeCredits,
}

/// URLs parsed out of a validated [`SessionGateConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrls {
    pub provider: Url,
    pub redirect: Url,
    pub app: Url,
}

impl SessionGateConfig {
    /// Check the section and parse its URLs.
    pub fn validate(&self) -> Result<ResolvedUrls, ConfigError> {
        if self.anon_key.trim().is_empty() {
            return Err(ConfigError::Missing { field: "anon_key" });
        }
        if self.profiles_table.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "profiles_table",
            });
        }
        if self.initial_credits < 0 {
            return Err(ConfigError::NegativeCredits);
        }
        Ok(ResolvedUrls {
            provider: parse_http_url("provider_url", &self.provider_url)?,
            redirect: parse_http_url("redirect_url", &self.redirect_url)?,
            app: parse_http_url("app_url", &self.app_url)?,
        })
    }
}

fn parse_http_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfigError::Missing { field });
    }
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::UnsupportedScheme { field }),
    }
}
