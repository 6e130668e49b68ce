// Identifier value objects

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    Intake,
    Edit,
}

/// Composite session key: one intake and one edit session may coexist for the
/// same (channel, author) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub channel_id: String,
    pub author_id: String,
    pub kind: SessionKind,
}

impl SessionKey {
    pub fn intake(channel_id: &str, author_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            author_id: author_id.to_string(),
            kind: SessionKind::Intake,
        }
    }

    pub fn edit(channel_id: &str, author_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            author_id: author_id.to_string(),
            kind: SessionKind::Edit,
        }
    }
}
