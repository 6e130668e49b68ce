use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use corsair_application::{dispatch, AppState};
use corsair_domain::entities::{InboundMessage, InboundMeta};

const RECONNECT_DELAY_SECONDS: u64 = 5;
const DEFAULT_HEARTBEAT_MILLIS: u64 = 41_250;
// GUILD_MESSAGES | MESSAGE_CONTENT
const GATEWAY_INTENTS: u64 = (1 << 9) | (1 << 15);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Connects to the Discord gateway and feeds MESSAGE_CREATE events into the
/// dispatcher. Reconnects forever with a fixed delay.
pub fn spawn_gateway_bridge(state: AppState) {
    tokio::spawn(async move {
        let rest = reqwest::Client::new();
        loop {
            match tokio_tungstenite::connect_async(state.config.gateway_url.as_str()).await {
                Ok((ws, _)) => {
                    info!("gateway connected");
                    if let Err(err) = run_gateway_loop(&state, &rest, ws).await {
                        warn!(error = %err, "gateway loop exited");
                    }
                }
                Err(err) => {
                    warn!(error = %err, "gateway connect failed");
                }
            }
            sleep(Duration::from_secs(RECONNECT_DELAY_SECONDS)).await;
        }
    });
}

async fn run_gateway_loop(
    state: &AppState,
    rest: &reqwest::Client,
    mut ws: WsStream,
) -> Result<()> {
    let heartbeat_millis = await_hello(&mut ws).await?;
    ws.send(Message::Text(identify_payload(&state.config.bot_token)))
        .await?;

    let (mut sink, mut stream) = ws.split();
    let mut heartbeat = interval(Duration::from_millis(heartbeat_millis));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seq: Option<i64> = None;
    let mut bot_user_id = String::new();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let payload = json!({ "op": 1, "d": last_seq }).to_string();
                sink.send(Message::Text(payload)).await?;
            }
            next = stream.next() => {
                let Some(next) = next else {
                    return Err(anyhow!("gateway stream ended"));
                };
                match next? {
                    Message::Text(text) => {
                        let Ok(frame) = serde_json::from_str::<Value>(text.as_ref()) else {
                            continue;
                        };
                        if let Some(seq) = frame.get("s").and_then(Value::as_i64) {
                            last_seq = Some(seq);
                        }
                        match frame.get("op").and_then(Value::as_u64) {
                            Some(0) => match frame.get("t").and_then(Value::as_str) {
                                Some("READY") => {
                                    bot_user_id = frame["d"]["user"]["id"]
                                        .as_str()
                                        .unwrap_or("")
                                        .to_string();
                                    info!(user = %bot_user_id, "gateway ready");
                                }
                                Some("MESSAGE_CREATE") => {
                                    if let Some((msg, meta)) =
                                        parse_message_create(&frame["d"], &bot_user_id)
                                    {
                                        dispatch_and_reply(state, rest, msg, meta);
                                    }
                                }
                                _ => {}
                            },
                            Some(7) => return Err(anyhow!("gateway asked for a reconnect")),
                            Some(9) => return Err(anyhow!("gateway invalidated the session")),
                            _ => {}
                        }
                    }
                    Message::Ping(bytes) => sink.send(Message::Pong(bytes)).await?,
                    Message::Close(frame) => {
                        return Err(anyhow!("gateway closed by peer: {:?}", frame));
                    }
                    _ => {}
                }
            }
        }
    }
}

/// The first gateway frame is HELLO with the heartbeat cadence.
async fn await_hello(ws: &mut WsStream) -> Result<u64> {
    while let Some(next) = ws.next().await {
        let Message::Text(text) = next? else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_ref()) else {
            continue;
        };
        if frame.get("op").and_then(Value::as_u64) == Some(10) {
            return Ok(frame["d"]["heartbeat_interval"]
                .as_u64()
                .unwrap_or(DEFAULT_HEARTBEAT_MILLIS));
        }
    }
    Err(anyhow!("gateway closed before HELLO"))
}

fn identify_payload(token: &str) -> String {
    json!({
        "op": 2,
        "d": {
            "token": token,
            "intents": GATEWAY_INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "corsair",
                "device": "corsair",
            },
        },
    })
    .to_string()
}

/// Dispatch runs on its own task so a slow command never stalls heartbeats.
fn dispatch_and_reply(
    state: &AppState,
    rest: &reqwest::Client,
    msg: InboundMessage,
    meta: InboundMeta,
) {
    let state = state.clone();
    let rest = rest.clone();
    tokio::spawn(async move {
        let Some(reply) = dispatch::handle_message(&state, &msg, &meta).await else {
            return;
        };
        if let Err(err) = post_reply(&state, &rest, &meta.channel_id, &reply).await {
            warn!(error = %err, channel = %meta.channel_id, "reply post failed");
        }
    });
}

async fn post_reply(
    state: &AppState,
    rest: &reqwest::Client,
    channel_id: &str,
    content: &str,
) -> Result<()> {
    let url = format!(
        "{}/channels/{}/messages",
        state.config.discord_api_base.trim_end_matches('/'),
        channel_id
    );
    rest.post(url)
        .header("Authorization", format!("Bot {}", state.config.bot_token))
        .json(&json!({ "content": content }))
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

fn parse_message_create(d: &Value, bot_user_id: &str) -> Option<(InboundMessage, InboundMeta)> {
    let author = d.get("author")?;
    if author.get("bot").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    let author_id = author.get("id").and_then(Value::as_str)?.to_string();
    let channel_id = d.get("channel_id").and_then(Value::as_str)?.to_string();
    let content = d
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let member = d.get("member");
    let author_nick = member
        .and_then(|m| m.get("nick"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let author_roles = member
        .and_then(|m| m.get("roles"))
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mentions = d
        .get("mentions")
        .and_then(Value::as_array)
        .map(|users| {
            users
                .iter()
                .filter_map(|user| user.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let attachments = d
        .get("attachments")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("url").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let message = InboundMessage {
        content,
        mentions,
        attachments,
    };
    let meta = InboundMeta {
        guild_id: d
            .get("guild_id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        channel_id,
        author_id,
        author_name: author
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        author_nick,
        author_roles,
        bot_user_id: bot_user_id.to_string(),
    };
    Some((message, meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_create_parses_author_member_and_mentions() {
        let event = json!({
            "content": "log a hit <@111>",
            "channel_id": "chan-1",
            "guild_id": "guild-1",
            "author": { "id": "42", "username": "reporter" },
            "member": { "nick": "Red", "roles": ["role-a", "role-b"] },
            "mentions": [ { "id": "111", "username": "dax" } ],
            "attachments": [ { "url": "https://cdn.test/clip.mp4" } ]
        });
        let (msg, meta) = parse_message_create(&event, "bot-9").expect("event");

        assert_eq!(msg.content, "log a hit <@111>");
        assert_eq!(msg.mentions, vec!["111".to_string()]);
        assert_eq!(msg.attachments, vec!["https://cdn.test/clip.mp4".to_string()]);
        assert_eq!(meta.author_id, "42");
        assert_eq!(meta.author_nick.as_deref(), Some("Red"));
        assert_eq!(meta.author_roles, vec!["role-a".to_string(), "role-b".to_string()]);
        assert_eq!(meta.bot_user_id, "bot-9");
        assert_eq!(meta.display_name(), "Red");
    }

    #[test]
    fn bot_authors_are_dropped() {
        let event = json!({
            "content": "beep",
            "channel_id": "chan-1",
            "author": { "id": "7", "username": "other-bot", "bot": true }
        });
        assert!(parse_message_create(&event, "bot-9").is_none());
    }

    #[test]
    fn missing_member_block_is_tolerated() {
        let event = json!({
            "content": "edit hit 1700000000000001",
            "channel_id": "dm-1",
            "author": { "id": "42", "username": "reporter" }
        });
        let (_, meta) = parse_message_create(&event, "").expect("event");
        assert!(meta.author_nick.is_none());
        assert!(meta.author_roles.is_empty());
        assert_eq!(meta.display_name(), "reporter");
    }

    #[test]
    fn identify_carries_the_message_intents() {
        let payload: Value = serde_json::from_str(&identify_payload("t0k3n")).expect("json");
        assert_eq!(payload["op"], 2);
        assert_eq!(payload["d"]["token"], "t0k3n");
        assert_eq!(payload["d"]["intents"].as_u64(), Some(GATEWAY_INTENTS));
    }
}
