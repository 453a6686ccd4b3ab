use async_trait::async_trait;
use reqwest::Method;
use tracing::instrument;

use super::wire::ProfileRow;
use super::HostedProvider;
use crate::contract::model::{NewProfile, Profile, Session};
use crate::domain::error::ProviderError;
use crate::domain::ports::ProfileStore;

#[async_trait]
impl ProfileStore for HostedProvider {
    #[instrument(
        name = "session_gate.provider.find_profile",
        skip_all,
        fields(user_id = %session.user.id)
    )]
    async fn find_profile(&self, session: &Session) -> Result<Option<Profile>, ProviderError> {
        let mut url = self
            .http
            .endpoint(&["rest", "v1", self.profiles_table.as_str()])?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", session.user.id))
            .append_pair("select", "*");

        let request = self
            .http
            .request(Method::GET, url, Some(&session.access_token));
        let rows: Vec<ProfileRow> = self.http.send_json(request, "profiles.find").await?;
        Ok(rows.into_iter().next().map(Profile::from))
    }

    #[instrument(
        name = "session_gate.provider.insert_profile",
        skip_all,
        fields(user_id = %profile.id)
    )]
    async fn insert_profile(
        &self,
        session: &Session,
        profile: NewProfile,
    ) -> Result<(), ProviderError> {
        let url = self
            .http
            .endpoint(&["rest", "v1", self.profiles_table.as_str()])?;
        let request = self
            .http
            .request(Method::POST, url, Some(&session.access_token))
            .header("Prefer", "return=minimal")
            .json(&ProfileRow::from(profile));

        self.http.send(request, "profiles.insert").await?;
        Ok(())
    }
}
