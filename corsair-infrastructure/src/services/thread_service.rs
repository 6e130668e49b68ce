use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use corsair_domain::entities::HitRecord;
use corsair_domain::entities::RuntimeConfig;
use corsair_domain::ports::ThreadNotifier;
use corsair_domain::services::mutation::render_session_diff;

/// Posts hit recaps into the hit's Discord thread. Fire-and-forget: posting
/// runs on a spawned task and a failure only warns, never blocks a commit.
pub struct DiscordThreadService {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl DiscordThreadService {
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(3)))
            .build()?;
        Ok(Self {
            client,
            api_base: config.discord_api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        })
    }

    fn spawn_post(&self, thread_id: Option<String>, content: String) {
        let Some(channel) = thread_id else {
            debug!("hit has no recap thread yet, skipping the post");
            return;
        };
        let client = self.client.clone();
        let url = format!("{}/channels/{}/messages", self.api_base, channel);
        let token = self.bot_token.clone();
        tokio::spawn(async move {
            if let Err(err) = post_message(&client, &url, &token, &content).await {
                warn!(error = %err, channel = %channel, "thread recap post failed");
            }
        });
    }
}

async fn post_message(client: &Client, url: &str, token: &str, content: &str) -> Result<()> {
    client
        .post(url)
        .header("Authorization", format!("Bot {}", token))
        .json(&json!({ "content": content }))
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

impl ThreadNotifier for DiscordThreadService {
    fn spawn_hit_created(&self, record: HitRecord) {
        let content = render_created(&record);
        self.spawn_post(record.thread_id.clone(), content);
    }

    fn spawn_hit_updated(&self, original: HitRecord, updated: HitRecord) {
        let content = render_updated(&original, &updated);
        self.spawn_post(updated.thread_id.clone(), content);
    }
}

fn render_created(record: &HitRecord) -> String {
    let title = record.title.as_deref().unwrap_or("untitled hit");
    let mut lines = vec![format!(
        "**{}** logged by {}: {:.0} aUEC across {:.2} SCU.",
        title,
        if record.nickname.is_empty() {
            &record.username
        } else {
            &record.nickname
        },
        record.total_value,
        record.total_scu
    )];
    for line in &record.cargo {
        lines.push(format!("- {} x{:.0}", line.commodity_name, line.scu_amount));
    }
    if !record.assists.is_empty() {
        let mentions: Vec<String> = record.assists.iter().map(|id| format!("<@{}>", id)).collect();
        lines.push(format!("assists: {}", mentions.join(" ")));
    }
    lines.join("\n")
}

fn render_updated(original: &HitRecord, updated: &HitRecord) -> String {
    let changed: BTreeSet<String> = changed_fields(original, updated);
    format!(
        "hit {} was updated:\n{}",
        updated.id.unwrap_or_default(),
        render_session_diff(original, updated, &changed)
    )
}

fn changed_fields(original: &HitRecord, updated: &HitRecord) -> BTreeSet<String> {
    let mut fields = BTreeSet::new();
    if original.title != updated.title {
        fields.insert("title".to_string());
    }
    if original.story != updated.story {
        fields.insert("story".to_string());
    }
    if original.cargo != updated.cargo {
        fields.insert("cargo".to_string());
    }
    if original.total_value != updated.total_value {
        fields.insert("total_value".to_string());
    }
    if original.total_scu != updated.total_scu {
        fields.insert("total_scu".to_string());
    }
    if original.assists != updated.assists {
        fields.insert("assists".to_string());
    }
    if original.guests != updated.guests {
        fields.insert("guests".to_string());
    }
    if original.victims != updated.victims {
        fields.insert("victims".to_string());
    }
    if original.additional_media_links != updated.additional_media_links {
        fields.insert("additional_media_links".to_string());
    }
    if original.video_link != updated.video_link {
        fields.insert("video_link".to_string());
    }
    if original.type_of_piracy != updated.type_of_piracy {
        fields.insert("type_of_piracy".to_string());
    }
    if original.air_or_ground != updated.air_or_ground {
        fields.insert("air_or_ground".to_string());
    }
    if original.timestamp != updated.timestamp {
        fields.insert("timestamp".to_string());
    }
    if original.patch != updated.patch {
        fields.insert("patch".to_string());
    }
    if original.fleet_activity != updated.fleet_activity {
        fields.insert("fleet_activity".to_string());
    }
    fields
}
