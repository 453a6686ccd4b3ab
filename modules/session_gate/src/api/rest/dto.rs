use serde::{Deserialize, Serialize};

use crate::contract::model::ProfileForm;
use crate::infra::view::{Message, MessageKind, ViewSnapshot};

/// REST DTO for the page display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewDto {
    pub version: u64,
    /// `loading`, `login`, `profile` or `dashboard`.
    pub page: String,
    pub user_email: Option<String>,
    pub credits: Option<i64>,
    pub login_message: Option<MessageDto>,
    pub profile_message: Option<MessageDto>,
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDto {
    /// `error` or `success`.
    pub kind: String,
    pub text: String,
}

/// Profile form submission. Missing fields count as blank.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileFormDto {
    pub display_name: String,
    pub age_range: String,
    pub city: String,
    pub bio: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInResponse {
    pub redirect_url: String,
}

/// Query the provider appends to the OAuth return URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub flow: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl From<&Message> for MessageDto {
    fn from(m: &Message) -> Self {
        Self {
            kind: match m.kind {
                MessageKind::Error => "error",
                MessageKind::Success => "success",
            }
            .to_string(),
            text: m.text.clone(),
        }
    }
}

impl From<&ViewSnapshot> for ViewDto {
    fn from(s: &ViewSnapshot) -> Self {
        Self {
            version: s.version,
            page: s.page.as_str().to_string(),
            user_email: s.user_email.clone(),
            credits: s.credits,
            login_message: s.login_message.as_ref().map(MessageDto::from),
            profile_message: s.profile_message.as_ref().map(MessageDto::from),
            redirect: s.redirect.clone(),
        }
    }
}

impl From<ProfileFormDto> for ProfileForm {
    fn from(dto: ProfileFormDto) -> Self {
        Self {
            display_name: dto.display_name,
            age_range: dto.age_range,
            city: dto.city,
            bio: dto.bio,
        }
    }
}
