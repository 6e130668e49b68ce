use serde::{Deserialize, Serialize};

/// One chat message as handed to the dispatcher by the gateway bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundMessage {
    pub content: String,
    /// User ids mentioned in the message, in order of appearance.
    pub mentions: Vec<String>,
    /// Attachment URLs.
    pub attachments: Vec<String>,
}

/// Message metadata. `author_roles` carries the requester's role ids so the
/// edit-permission check can run before any session is created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundMeta {
    pub guild_id: String,
    pub channel_id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_nick: Option<String>,
    pub author_roles: Vec<String>,
    pub bot_user_id: String,
}

impl InboundMeta {
    /// Display name preferred for reporter identity: nickname over username.
    pub fn display_name(&self) -> &str {
        self.author_nick.as_deref().unwrap_or(&self.author_name)
    }
}

/// A roster member resolved by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterMember {
    pub id: String,
    #[serde(default)]
    pub name: String,
}
