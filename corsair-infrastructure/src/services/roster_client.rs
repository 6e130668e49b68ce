use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use corsair_domain::entities::{RosterMember, RuntimeConfig};
use corsair_domain::ports::RosterPort;

/// Roster lookup against the org backend. Matching is exact but
/// case-insensitive; ambiguous or missing names resolve to `None` so the
/// caller can treat the person as a guest.
pub struct ApiRosterClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiRosterClient {
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(3)))
            .build()?;
        Ok(Self {
            client,
            base_url: config.persistence_base_url.trim_end_matches('/').to_string(),
            token: config.persistence_token.clone(),
        })
    }
}

#[async_trait]
impl RosterPort for ApiRosterClient {
    async fn resolve_user_by_name(&self, name: &str) -> Result<Option<RosterMember>> {
        let mut request = self
            .client
            .get(format!("{}/roster", self.base_url))
            .query(&[("name", name)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let members: Vec<RosterMember> = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(pick_member(members, name))
    }
}

fn pick_member(members: Vec<RosterMember>, name: &str) -> Option<RosterMember> {
    let needle = name.to_lowercase();
    let mut exact = members
        .into_iter()
        .filter(|member| member.name.to_lowercase() == needle);
    let first = exact.next()?;
    if exact.next().is_some() {
        return None;
    }
    Some(first)
}
