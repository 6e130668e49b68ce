use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};

use corsair_domain::entities::{HitRecord, RuntimeConfig};
use corsair_domain::ports::HitRepository;

/// Hit persistence over the org backend's REST API.
pub struct ApiHitRepository {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiHitRepository {
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

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl HitRepository for ApiHitRepository {
    async fn create(&self, payload: &HitRecord) -> Result<Option<HitRecord>> {
        let response = self
            .authorized(self.client.post(self.endpoint("hits")))
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await.ok())
    }

    async fn update(&self, id: i64, payload: &HitRecord) -> Result<bool> {
        let response = self
            .authorized(self.client.put(self.endpoint(&format!("hits/{}", id))))
            .json(payload)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn get_by_entry_id(&self, id: i64) -> Result<Option<HitRecord>> {
        let response = self
            .authorized(self.client.get(self.endpoint(&format!("hits/{}", id))))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let record = response.error_for_status()?.json().await?;
        Ok(Some(record))
    }

    async fn get_by_thread_id(&self, thread_id: &str) -> Result<Option<HitRecord>> {
        let response = self
            .authorized(
                self.client
                    .get(self.endpoint(&format!("hits/by-thread/{}", thread_id))),
            )
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let record = response.error_for_status()?.json().await?;
        Ok(Some(record))
    }
}
