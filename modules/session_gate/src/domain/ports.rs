use async_trait::async_trait;
use tokio::sync::broadcast;
use url::Url;

use crate::contract::model::{
    AuthEvent, MessageRegion, NewProfile, OAuthProvider, Page, Profile, Session,
};
use crate::domain::error::ProviderError;

/// Port for the hosted identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, if any. May refresh an expiring token on the way.
    async fn current_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Start an OAuth redirect flow; returns the URL the browser must follow.
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: &Url,
    ) -> Result<Url, ProviderError>;

    /// Finish a redirect flow from the callback parameters.
    /// Emits [`AuthEvent::SignedIn`] on success.
    async fn exchange_code(&self, code: &str, flow: &str) -> Result<Session, ProviderError>;

    /// Terminate the session. The local session is dropped even if the
    /// remote call fails; [`AuthEvent::SignedOut`] is always emitted.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// Standing subscription to session changes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Port for the `profiles` collection, keyed by user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, session: &Session) -> Result<Option<Profile>, ProviderError>;

    async fn insert_profile(
        &self,
        session: &Session,
        profile: NewProfile,
    ) -> Result<(), ProviderError>;
}

/// Output port: the page display.
pub trait PageView: Send + Sync {
    fn show_page(&self, page: Page);
    /// Populate the dashboard fields and show the dashboard.
    fn show_dashboard(&self, email: &str, credits: i64);
    /// Error message; cleared automatically after a short delay.
    fn show_error(&self, region: MessageRegion, message: &str);
    /// Success message; stays until replaced.
    fn show_success(&self, region: MessageRegion, message: &str);
    /// Ask the UI to follow an external redirect.
    fn navigate(&self, url: &Url);
}
