use thiserror::Error;

/// Failures reported by the hosted provider adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{operation} failed with HTTP {status}: {detail}")]
    Http {
        operation: &'static str,
        status: u16,
        detail: String,
    },

    #[error("{operation} transport error: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} returned an unexpected payload: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    #[error("unknown or expired sign-in flow")]
    UnknownFlow,

    #[error("invalid provider endpoint: {0}")]
    Endpoint(String),
}

impl ProviderError {
    pub fn http(operation: &'static str, status: u16, detail: impl Into<String>) -> Self {
        Self::Http {
            operation,
            status,
            detail: detail.into(),
        }
    }

    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }

    pub fn decode(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            operation,
            message: message.into(),
        }
    }

    /// The provider rejected the credentials (as opposed to being unreachable).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Http { status, .. } if (400..500).contains(status))
    }
}

/// Domain-level outcome of a controller operation. By the time one of these
/// is returned the user-facing message has already been rendered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("required fields missing: {}", fields.join(", "))]
    MissingRequiredFields { fields: Vec<&'static str> },

    #[error("no active session")]
    NotSignedIn,

    #[error("sign-in with {provider} failed: {source}")]
    SignIn {
        provider: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("profile save failed: {0}")]
    ProfileSave(#[source] ProviderError),

    #[error("sign-in callback failed: {0}")]
    Callback(#[source] ProviderError),
}

impl DomainError {
    pub fn missing_required_fields(fields: Vec<&'static str>) -> Self {
        Self::MissingRequiredFields { fields }
    }

    pub fn sign_in(provider: &'static str, source: ProviderError) -> Self {
        Self::SignIn { provider, source }
    }
}
