use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use corsair_domain::entities::{ExtractedHit, InboundMeta, RuntimeConfig};
use corsair_domain::ports::ExtractionOracle;

const SYSTEM_PROMPT: &str = "You read one Discord message from a game-org piracy channel. \
If the message describes a completed piracy hit, reply with a single JSON object: \
{\"action\":\"hit_create\",\"confidence\":0..1,\"cargo\":[{\"name\":...,\"scu\":...,\"price\":optional}],\
\"assists\":[names],\"victims\":[names],\"guests\":[names],\"title\":optional,\"story\":optional,\
\"type_of_piracy\":optional,\"timestamp\":optional,\"missing_fields\":[...],\"notes\":optional}. \
If it does not describe a hit, reply {\"action\":\"none\",\"confidence\":0}. JSON only.";

/// Chat-completions client for the extraction oracle. The oracle is optional:
/// without a configured url every message falls back to the step-by-step
/// intake.
pub struct HttpExtractionOracle {
    client: Client,
    url: Option<String>,
    model: String,
}

impl HttpExtractionOracle {
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(3)))
            .build()?;
        Ok(Self {
            client,
            url: config.oracle_url.clone(),
            model: config.oracle_model.clone(),
        })
    }
}

#[async_trait]
impl ExtractionOracle for HttpExtractionOracle {
    async fn extract(&self, message: &str, meta: &InboundMeta) -> Result<Option<ExtractedHit>> {
        let Some(url) = &self.url else {
            return Ok(None);
        };

        let payload = json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("reporter: {}\nmessage: {}", meta.display_name(), message),
                },
            ],
        });

        let body: serde_json::Value = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("");
        Ok(parse_extraction(content))
    }
}

/// Parses the oracle's reply. Models occasionally wrap the object in a code
/// fence; anything that does not decode is treated as no extraction.
pub(crate) fn parse_extraction(content: &str) -> Option<ExtractedHit> {
    let trimmed = content.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(stripped).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_decodes() {
        let extracted = parse_extraction(
            r#"{"action":"hit_create","confidence":0.9,"cargo":[{"name":"Gold","scu":5}]}"#,
        )
        .expect("extraction");
        assert_eq!(extracted.action, "hit_create");
        assert_eq!(extracted.cargo.len(), 1);
        assert_eq!(extracted.cargo[0].scu, 5.0);
    }

    #[test]
    fn fenced_json_decodes() {
        let extracted = parse_extraction(
            "```json\n{\"action\":\"none\",\"confidence\":0}\n```",
        )
        .expect("extraction");
        assert_eq!(extracted.action, "none");
    }

    #[test]
    fn prose_is_no_extraction() {
        assert!(parse_extraction("sorry, I can't help with that").is_none());
    }
}
