use corsair_domain::entities::{InboundMessage, InboundMeta};
use corsair_domain::utils::truncate_reply;
use corsair_domain::value_objects::SessionKey;
use tracing::error;

use crate::commands::{edit_commands, intake_commands};
use crate::sessions::{Session, SessionAccess};
use crate::{AppError, AppState};

/// Routes one inbound message. `None` means the engine has nothing to say;
/// every `Some` reply is already truncated to the platform limit.
///
/// Sessions are matched edit-first, then intake, then the start heuristics.
/// A session is taken out of the store while its handler runs, so two
/// messages from the same user in the same channel can never race one
/// workflow.
pub async fn handle_message(
    state: &AppState,
    msg: &InboundMessage,
    meta: &InboundMeta,
) -> Option<String> {
    if meta.author_id == meta.bot_user_id {
        return None;
    }
    let content = msg.content.trim();
    if content.is_empty() {
        return None;
    }
    state.metrics.record_message();

    let edit_key = SessionKey::edit(&meta.channel_id, &meta.author_id);
    let access = state.sessions.lock().await.take(&edit_key);
    match access {
        SessionAccess::Active(Session::Edit(session)) => {
            let reply = match edit_commands::handle_step(state, session, msg, meta).await {
                Ok((kept, reply)) => {
                    if let Some(session) = kept {
                        state.sessions.lock().await.put_edit(session);
                    }
                    reply
                }
                Err(err) => render_error(err),
            };
            return Some(truncate_reply(reply));
        }
        SessionAccess::Active(session) => {
            // Key kinds make a mismatch impossible; keep the entry either way.
            state.sessions.lock().await.put(session);
        }
        SessionAccess::Expired => {
            return Some(
                "your edit session expired without being saved. start again with \
                 'edit hit <id>'."
                    .to_string(),
            );
        }
        SessionAccess::Vacant => {}
    }

    let intake_key = SessionKey::intake(&meta.channel_id, &meta.author_id);
    let access = state.sessions.lock().await.take(&intake_key);
    match access {
        SessionAccess::Active(Session::Intake(session)) => {
            let reply = match intake_commands::handle_step(state, session, msg, meta).await {
                Ok((kept, reply)) => {
                    if let Some(session) = kept {
                        state.sessions.lock().await.put_intake(session);
                    }
                    reply
                }
                Err(err) => render_error(err),
            };
            return Some(truncate_reply(reply));
        }
        SessionAccess::Active(session) => {
            state.sessions.lock().await.put(session);
        }
        SessionAccess::Expired => {
            return Some(
                "your hit log expired before it was finished. nothing was saved; start \
                 again with 'log a hit'."
                    .to_string(),
            );
        }
        SessionAccess::Vacant => {}
    }

    if edit_commands::matches_trigger(content) {
        let reply = match edit_commands::start_session(state, msg, meta).await {
            Ok(reply) => reply,
            Err(err) => render_error(err),
        };
        return Some(truncate_reply(reply));
    }
    if intake_commands::matches_trigger(content) {
        let reply = match intake_commands::start_session(state, msg, meta).await {
            Ok(reply) => reply,
            Err(err) => render_error(err),
        };
        return Some(truncate_reply(reply));
    }

    None
}

fn render_error(err: AppError) -> String {
    match err {
        AppError::Unauthorized => {
            "you can only edit hits you logged, unless you hold a privileged role.".to_string()
        }
        AppError::BadRequest(message) => message,
        AppError::Internal(err) => {
            error!(error = ?err, "command failed");
            format!(
                "something went wrong: {}. your session was closed; start again when ready.",
                err
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{fixture_state, fixture_state_with_calls, message, meta};
    use chrono::{Duration, Utc};
    use corsair_domain::entities::{HitRecord, IntakeSession};
    use corsair_domain::value_objects::{Engagement, PiracyType};

    async fn talk(state: &AppState, channel: &str, user: &str, content: &str) -> String {
        handle_message(state, &message(content), &meta(channel, user))
            .await
            .expect("a reply")
    }

    #[tokio::test]
    async fn own_messages_and_small_talk_are_ignored() {
        let state = fixture_state(|_| {});
        let mut own = meta("chan", "bot-1");
        own.bot_user_id = "bot-1".to_string();
        assert!(handle_message(&state, &message("log a hit"), &own).await.is_none());
        assert!(handle_message(&state, &message("gg everyone"), &meta("chan", "user"))
            .await
            .is_none());
    }

    // Full step-by-step intake: open, cargo, no assists, no details, confirm.
    #[tokio::test]
    async fn full_intake_flow_commits_a_priced_hit() {
        let (state, calls) = fixture_state_with_calls(|_| {});

        let reply = talk(&state, "chan", "user", "hey, log a hit for me").await;
        assert!(reply.contains("what cargo did you take?"));

        let reply = talk(&state, "chan", "user", "Fluorine: 10, Medical Supplies: 25").await;
        assert!(reply.contains("65925 aUEC"));
        assert!(reply.contains("who assisted"));

        let reply = talk(&state, "chan", "user", "none").await;
        assert!(reply.contains("any details"));

        let reply = talk(&state, "chan", "user", "skip").await;
        assert!(reply.contains("say done"));

        let reply = talk(&state, "chan", "user", "done").await;
        assert!(reply.contains("logged"));

        let created = calls.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        let record = &created[0];
        assert_eq!(record.total_value, 65925.0);
        assert_eq!(record.total_scu, 35.0);
        assert_eq!(record.air_or_ground, Some(Engagement::Air));
        assert_eq!(record.type_of_piracy, Some(PiracyType::BruteForce));
        assert!(record.id.is_some());
        assert!(record.title.is_some());
        assert!(state.sessions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn cancel_discards_the_draft_and_a_new_intake_can_start() {
        let (state, calls) = fixture_state_with_calls(|_| {});

        talk(&state, "chan", "user", "log a hit").await;
        let reply = talk(&state, "chan", "user", "cancel").await;
        assert!(reply.contains("nothing was saved"));
        assert!(state.sessions.lock().await.is_empty());
        assert!(calls.created.lock().unwrap().is_empty());

        let reply = talk(&state, "chan", "user", "log a hit").await;
        assert!(reply.contains("what cargo did you take?"));
    }

    // An edit that removes an assist who was never on the hit must not mark
    // the field as updated, and saving with no changes does nothing.
    #[tokio::test]
    async fn no_op_removal_is_reported_and_saves_nothing() {
        let (state, calls) = fixture_state_with_calls(|fixtures| {
            fixtures.records.push(HitRecord {
                id: Some(1700000000000001),
                user_id: "user".to_string(),
                assists: vec!["111".to_string(), "222".to_string()],
                ..HitRecord::default()
            });
        });

        talk(&state, "chan", "user", "edit hit 1700000000000001").await;
        let reply = talk(&state, "chan", "user", "remove <@333> from assists").await;
        assert!(reply.contains("nothing removed"));

        let reply = talk(&state, "chan", "user", "done").await;
        assert!(reply.contains("nothing to save"));
        assert!(calls.updated.lock().unwrap().is_empty());
        // the session survives a no-op save
        assert!(!state.sessions.lock().await.is_empty());
    }

    // Manual totals: pin, survive edits, reset on cargo replacement, save.
    #[tokio::test]
    async fn manual_totals_reset_when_cargo_is_replaced() {
        let (state, calls) = fixture_state_with_calls(|fixtures| {
            fixtures.records.push(HitRecord {
                id: Some(1700000000000001),
                user_id: "user".to_string(),
                ..HitRecord::default()
            });
        });

        talk(&state, "chan", "user", "edit hit 1700000000000001").await;
        let reply = talk(&state, "chan", "user", "total_value = 99999").await;
        assert!(reply.contains("pinned"));

        let reply = talk(&state, "chan", "user", "cargo = Gold: 5").await;
        assert!(reply.contains("totals back to automatic"));

        let reply = talk(&state, "chan", "user", "done").await;
        assert!(reply.contains("saved"));

        let updated = calls.updated.lock().unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].1.total_value, 34705.0);
        assert_eq!(updated[0].1.cargo.len(), 1);
    }

    #[tokio::test]
    async fn expired_intake_is_reported_once_and_a_fresh_one_opens() {
        let state = fixture_state(|_| {});
        let key = SessionKey::intake("chan", "user");
        let mut session = IntakeSession::new(key, HitRecord::default(), 30);
        session.expires_at = Utc::now() - Duration::minutes(1);
        state.sessions.lock().await.put_intake(session);

        let reply = talk(&state, "chan", "user", "status").await;
        assert!(reply.contains("expired"));
        assert!(state.sessions.lock().await.is_empty());

        let reply = talk(&state, "chan", "user", "log a hit").await;
        assert!(reply.contains("what cargo did you take?"));
    }

    #[tokio::test]
    async fn commit_failure_destroys_the_session() {
        let state = fixture_state(|fixtures| {
            fixtures.fail_create = true;
        });

        talk(&state, "chan", "user", "log a hit").await;
        talk(&state, "chan", "user", "Gold: 5").await;
        talk(&state, "chan", "user", "none").await;
        talk(&state, "chan", "user", "skip").await;
        let reply = talk(&state, "chan", "user", "done").await;

        assert!(reply.contains("something went wrong"));
        assert!(state.sessions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_edit_reply_is_fixed_text() {
        let state = fixture_state(|fixtures| {
            fixtures.records.push(HitRecord {
                id: Some(1700000000000001),
                user_id: "someone-else".to_string(),
                ..HitRecord::default()
            });
        });
        let reply = talk(&state, "chan", "user", "edit hit 1700000000000001").await;
        assert!(reply.contains("only edit hits you logged"));
        assert!(state.sessions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn edit_and_intake_sessions_coexist_for_one_user() {
        let state = fixture_state(|fixtures| {
            fixtures.records.push(HitRecord {
                id: Some(1700000000000001),
                user_id: "user".to_string(),
                ..HitRecord::default()
            });
        });

        talk(&state, "chan", "user", "log a hit").await;
        // the edit trigger inside an intake session is consumed by the intake
        // step handler, so open the edit from another channel
        talk(&state, "other", "user", "edit hit 1700000000000001").await;
        assert_eq!(state.sessions.lock().await.len(), 2);
    }
}
