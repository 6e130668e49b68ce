use corsair_domain::entities::{EditSession, InboundMessage, InboundMeta, ManualTotals};
use corsair_domain::services::extractor::{
    classify, is_auto_marker, parse_amount, parse_cargo_lines, split_names, Parsed, RawCargoLine,
};
use corsair_domain::services::mutation::{
    apply_list_op, apply_scalar_assignment, render_session_diff, ListOp,
};
use corsair_domain::services::resolver::price_cargo_lines;
use corsair_domain::value_objects::SessionKey;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::commands::{participants, submit_commands};
use crate::{AppError, AppState};

static EDIT_TRIGGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bedit\b.*\bhit\b|\bedit\s+hit\b").expect("regex"));
static HIT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{6,})\b").expect("regex"));

pub fn matches_trigger(content: &str) -> bool {
    EDIT_TRIGGER.is_match(content)
}

/// Opens an edit session against an existing hit, located by an explicit id
/// in the message or by the hit's recap thread. Ownership is checked before
/// any session state is created.
pub async fn start_session(
    state: &AppState,
    msg: &InboundMessage,
    meta: &InboundMeta,
) -> Result<String, AppError> {
    let record = match HIT_ID
        .captures(&msg.content)
        .and_then(|caps| caps[1].parse::<i64>().ok())
    {
        Some(id) => state
            .hits
            .get_by_entry_id(id)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("i couldn't find hit {}.", id)))?,
        None => state
            .hits
            .get_by_thread_id(&meta.channel_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(
                    "tell me which hit to edit: 'edit hit <id>', or run this inside the \
                     hit's recap thread."
                        .to_string(),
                )
            })?,
    };

    let owner = record.user_id == meta.author_id;
    let privileged = meta
        .author_roles
        .iter()
        .any(|role| state.config.privileged_role_ids.contains(role));
    if !owner && !privileged {
        return Err(AppError::Unauthorized);
    }

    let hit_id = record
        .id
        .ok_or_else(|| AppError::BadRequest("that record has no id, so it cannot be edited.".to_string()))?;
    let key = SessionKey::edit(&meta.channel_id, &meta.author_id);
    let session = EditSession::new(key, hit_id, record, state.config.session_ttl_minutes);
    let title = session
        .working
        .title
        .clone()
        .unwrap_or_else(|| "untitled".to_string());

    state.metrics.record_edit_opened();
    state.sessions.lock().await.put_edit(session);
    Ok(format!(
        "editing hit {} ({}). tell me what to change: 'title = ...', 'add Dax to assists', \
         or a fresh cargo list. status shows pending changes, done saves, cancel discards.",
        hit_id, title
    ))
}

/// Applies one free-order edit message. `Ok((None, _))` means the session
/// ended; recognized-but-invalid values keep it alive with a verbatim
/// validation message. `Err` destroys the session.
pub async fn handle_step(
    state: &AppState,
    mut session: EditSession,
    msg: &InboundMessage,
    _meta: &InboundMeta,
) -> Result<(Option<EditSession>, String), AppError> {
    let content = msg.content.trim();
    let lower = content.to_lowercase();

    match lower.as_str() {
        "cancel" | "abort" | "discard" => {
            return Ok((
                None,
                format!("edit discarded; hit {} is unchanged.", session.hit_id),
            ));
        }
        "status" | "changes" => {
            let rendered = format!(
                "editing hit {}:\n{}",
                session.hit_id,
                render_session_diff(&session.original, &session.working, &session.updated_fields)
            );
            return Ok((Some(session), rendered));
        }
        "help" => {
            return Ok((Some(session), help_text()));
        }
        "done" | "save" => {
            if session.updated_fields.is_empty() {
                return Ok((Some(session), "no changes yet; nothing to save.".to_string()));
            }
            let reply = submit_commands::commit_edit(state, session).await?;
            return Ok((None, reply));
        }
        _ => {}
    }

    match classify(content) {
        Parsed::ListOp(instruction) => {
            let reply = apply_list_instruction(state, &mut session, &instruction.field,
                instruction.op, &instruction.operands)
            .await?;
            session.touch(state.config.session_ttl_minutes);
            Ok((Some(session), reply))
        }
        Parsed::Assignment(pairs) => {
            let mut notes = Vec::new();
            for (field, value) in &pairs {
                match apply_assignment(state, &mut session, field, value).await? {
                    Ok(note) => notes.push(note),
                    Err(rejection) => return Ok((Some(session), rejection)),
                }
            }
            session.touch(state.config.session_ttl_minutes);
            notes.push("say done to save, status to review.".to_string());
            Ok((Some(session), notes.join("\n")))
        }
        Parsed::Cargo(raw) => {
            let note = replace_cargo(state, &mut session, &raw).await?;
            session.touch(state.config.session_ttl_minutes);
            Ok((Some(session), note))
        }
        Parsed::None => Ok((Some(session), help_text())),
    }
}

async fn apply_list_instruction(
    state: &AppState,
    session: &mut EditSession,
    field: &str,
    op: ListOp,
    operands: &[String],
) -> Result<String, AppError> {
    let (operands, mut notes) = if field == "assists" {
        let (mut resolved, unresolved) = participants::resolve_names(state, operands).await?;
        let mut notes = Vec::new();
        if !unresolved.is_empty() {
            match op {
                // Removal by name against an id list must stay an accurate
                // no-op, so the names flow through unchanged.
                ListOp::Remove => resolved.extend(unresolved),
                ListOp::Add | ListOp::Set => {
                    let outcome = apply_list_op(
                        "guests",
                        &session.working.guests,
                        ListOp::Add,
                        &unresolved,
                    );
                    if outcome.changed {
                        session.working.guests = outcome.list;
                        session.updated_fields.insert("guests".to_string());
                    }
                    notes.push(format!(
                        "{} aren't on the roster; filed under guests.",
                        unresolved.join(", ")
                    ));
                }
                ListOp::Clear => {}
            }
        }
        (resolved, notes)
    } else {
        (operands.to_vec(), Vec::new())
    };

    if field == "assists" && operands.is_empty() && op == ListOp::Add {
        notes.push("say done to save.".to_string());
        return Ok(notes.join("\n"));
    }

    let current = match field {
        "assists" => &session.working.assists,
        "victims" => &session.working.victims,
        _ => &session.working.guests,
    };
    let outcome = apply_list_op(field, current, op, &operands);
    if outcome.changed {
        match field {
            "assists" => session.working.assists = outcome.list,
            "victims" => session.working.victims = outcome.list,
            _ => session.working.guests = outcome.list,
        }
        session.updated_fields.insert(field.to_string());
    }
    notes.insert(0, outcome.note);
    notes.push("say done to save.".to_string());
    Ok(notes.join("\n"))
}

/// One `field = value` pair. Inner `Err` is the verbatim validation message.
async fn apply_assignment(
    state: &AppState,
    session: &mut EditSession,
    field: &str,
    value: &str,
) -> Result<Result<String, String>, AppError> {
    match field {
        "total_value" | "total_scu" => Ok(apply_total(session, field, value)),
        "cargo" => {
            let raw = parse_cargo_lines(value);
            if raw.is_empty() {
                return Ok(Err(
                    "i couldn't read a cargo manifest from that value.".to_string()
                ));
            }
            Ok(Ok(replace_cargo(state, session, &raw).await?))
        }
        "assists" => {
            let (resolved, unresolved) =
                participants::resolve_names(state, &split_names(value)).await?;
            let outcome = apply_list_op("assists", &session.working.assists, ListOp::Set, &resolved);
            if outcome.changed {
                session.working.assists = outcome.list;
                session.updated_fields.insert("assists".to_string());
            }
            let mut note = outcome.note;
            if !unresolved.is_empty() {
                note.push_str(&format!(
                    " couldn't find {} on the roster.",
                    unresolved.join(", ")
                ));
            }
            Ok(Ok(note))
        }
        "victims" | "guests" => {
            let current = if field == "victims" {
                &session.working.victims
            } else {
                &session.working.guests
            };
            let outcome = apply_list_op(field, current, ListOp::Set, &split_names(value));
            if outcome.changed {
                if field == "victims" {
                    session.working.victims = outcome.list;
                } else {
                    session.working.guests = outcome.list;
                }
                session.updated_fields.insert(field.to_string());
            }
            Ok(Ok(outcome.note))
        }
        _ => Ok(apply_scalar_assignment(&mut session.working, field, value).map(|applied| {
            session.updated_fields.insert(applied.field.to_string());
            applied.note
        })),
    }
}

/// Manual total pinning. An auto marker hands the field back to the cargo
/// tracker; a number pins it until the cargo manifest is next replaced.
fn apply_total(session: &mut EditSession, field: &str, raw: &str) -> Result<String, String> {
    if is_auto_marker(raw) {
        match field {
            "total_value" => session.manual_totals.total_value = false,
            _ => session.manual_totals.total_scu = false,
        }
        session.sync_totals();
        session.updated_fields.insert(field.to_string());
        let value = if field == "total_value" {
            session.working.total_value
        } else {
            session.working.total_scu
        };
        return Ok(format!("{} back to automatic ({:.2}).", field, value));
    }

    let value = parse_amount(raw)
        .ok_or_else(|| format!("'{}' is not a number for {}; use a number or 'auto'.", raw, field))?;
    match field {
        "total_value" => {
            session.manual_totals.total_value = true;
            session.working.total_value = value;
        }
        _ => {
            session.manual_totals.total_scu = true;
            session.working.total_scu = value;
        }
    }
    session.updated_fields.insert(field.to_string());
    Ok(format!("{} pinned to {}.", field, raw.trim()))
}

/// Replaces the working cargo manifest. Both totals drop back to automatic
/// tracking; the stale manual pins are meaningless against a new manifest.
async fn replace_cargo(
    state: &AppState,
    session: &mut EditSession,
    raw: &[RawCargoLine],
) -> Result<String, AppError> {
    let prices = state.pricing.terminal_prices().await?;
    session.working.cargo = price_cargo_lines(raw, &prices, state.config.resolver_min_score);
    session.manual_totals = ManualTotals::default();
    session.sync_totals();
    session.updated_fields.insert("cargo".to_string());
    Ok(format!(
        "cargo replaced: {} line(s), {:.0} aUEC / {:.2} SCU (totals back to automatic). \
         say done to save.",
        session.working.cargo.len(),
        session.working.total_value,
        session.working.total_scu
    ))
}

fn help_text() -> String {
    "i can change: title, story, video, media, victims, guests, assists, cargo, \
     air_or_ground, type_of_piracy, timestamp, patch, fleet_activity, total_value, \
     total_scu, total_cut_value, total_cut_scu.\n\
     examples: 'title = Loot run', 'add Dax to assists', 'remove <@123> from assists', \
     'total_value = auto', or paste a new cargo list.\n\
     status shows pending changes, done saves, cancel discards."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{fixture_state, message, meta};
    use corsair_domain::entities::HitRecord;

    fn existing_hit(id: i64, owner: &str) -> HitRecord {
        HitRecord {
            id: Some(id),
            user_id: owner.to_string(),
            username: "Owner".to_string(),
            nickname: "Owner".to_string(),
            assists: vec!["111".to_string(), "222".to_string()],
            thread_id: Some("thread-9".to_string()),
            ..HitRecord::default()
        }
    }

    fn session_for(record: HitRecord) -> EditSession {
        EditSession::new(
            SessionKey::edit("chan", &record.user_id.clone()),
            record.id.unwrap(),
            record,
            30,
        )
    }

    #[tokio::test]
    async fn opens_by_id_for_the_owner() {
        let state = fixture_state(|fixtures| {
            fixtures.records.push(existing_hit(1700000000000001, "user"));
        });
        let reply = start_session(
            &state,
            &message("edit hit 1700000000000001"),
            &meta("chan", "user"),
        )
        .await
        .expect("open");
        assert!(reply.contains("editing hit 1700000000000001"));
    }

    #[tokio::test]
    async fn opens_by_thread_when_no_id_is_given() {
        let state = fixture_state(|fixtures| {
            fixtures.records.push(existing_hit(1700000000000001, "user"));
        });
        let reply = start_session(&state, &message("edit this hit"), &meta("thread-9", "user"))
            .await
            .expect("open");
        assert!(reply.contains("editing hit"));
    }

    #[tokio::test]
    async fn strangers_without_a_privileged_role_are_rejected() {
        let state = fixture_state(|fixtures| {
            fixtures.records.push(existing_hit(1700000000000001, "someone-else"));
        });
        let err = start_session(
            &state,
            &message("edit hit 1700000000000001"),
            &meta("chan", "user"),
        )
        .await
        .expect_err("must reject");
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn privileged_role_may_edit_any_hit() {
        let state = fixture_state(|fixtures| {
            fixtures.records.push(existing_hit(1700000000000001, "someone-else"));
        });
        let mut requester = meta("chan", "user");
        requester.author_roles.push("role-officer".to_string());
        let reply = start_session(&state, &message("edit hit 1700000000000001"), &requester)
            .await
            .expect("open");
        assert!(reply.contains("editing hit"));
    }

    #[tokio::test]
    async fn removing_an_absent_assist_changes_nothing() {
        let state = fixture_state(|_| {});
        let session = session_for(existing_hit(1700000000000001, "user"));

        let (session, reply) = handle_step(
            &state,
            session,
            &message("remove <@333> from assists"),
            &meta("chan", "user"),
        )
        .await
        .expect("step");
        let session = session.expect("session alive");

        assert!(reply.contains("nothing removed"));
        assert!(session.updated_fields.is_empty());
        assert_eq!(session.working.assists.len(), 2);
    }

    #[tokio::test]
    async fn adding_an_unknown_name_files_it_under_guests() {
        let state = fixture_state(|_| {});
        let session = session_for(existing_hit(1700000000000001, "user"));

        let (session, reply) = handle_step(
            &state,
            session,
            &message("add Outsider to assists"),
            &meta("chan", "user"),
        )
        .await
        .expect("step");
        let session = session.expect("session alive");

        assert_eq!(session.working.assists, vec!["111".to_string(), "222".to_string()]);
        assert_eq!(session.working.guests, vec!["Outsider".to_string()]);
        assert!(session.updated_fields.contains("guests"));
        assert!(!session.updated_fields.contains("assists"));
        assert!(reply.contains("filed under guests"));
    }

    #[tokio::test]
    async fn add_splits_roster_names_from_guests() {
        let state = fixture_state(|fixtures| {
            fixtures.roster.insert("Dax".to_string(), "333".to_string());
        });
        let session = session_for(existing_hit(1700000000000001, "user"));

        let (session, _) = handle_step(
            &state,
            session,
            &message("add Dax and Outsider to assists"),
            &meta("chan", "user"),
        )
        .await
        .expect("step");
        let session = session.expect("session alive");

        assert!(session.working.assists.contains(&"333".to_string()));
        assert!(!session.working.assists.contains(&"Outsider".to_string()));
        assert_eq!(session.working.guests, vec!["Outsider".to_string()]);
        assert!(session.updated_fields.contains("assists"));
    }

    #[tokio::test]
    async fn done_with_no_changes_saves_nothing() {
        let state = fixture_state(|_| {});
        let session = session_for(existing_hit(1700000000000001, "user"));
        let (session, reply) =
            handle_step(&state, session, &message("done"), &meta("chan", "user"))
                .await
                .expect("step");
        assert!(session.is_some());
        assert!(reply.contains("nothing to save"));
    }

    #[tokio::test]
    async fn cargo_replacement_resets_manual_totals() {
        let state = fixture_state(|_| {});
        let session = session_for(existing_hit(1700000000000001, "user"));

        let (session, _) = handle_step(
            &state,
            session,
            &message("total_value = 99999"),
            &meta("chan", "user"),
        )
        .await
        .expect("pin");
        let session = session.expect("alive");
        assert!(session.manual_totals.total_value);
        assert_eq!(session.working.total_value, 99999.0);

        let (session, reply) = handle_step(
            &state,
            session,
            &message("cargo = Gold: 5"),
            &meta("chan", "user"),
        )
        .await
        .expect("replace");
        let session = session.expect("alive");

        assert!(!session.manual_totals.total_value);
        assert_eq!(session.working.total_value, 34705.0);
        assert!(reply.contains("totals back to automatic"));
    }

    #[tokio::test]
    async fn pinned_total_survives_unrelated_edits() {
        let state = fixture_state(|_| {});
        let session = session_for(existing_hit(1700000000000001, "user"));

        let (session, _) = handle_step(
            &state,
            session,
            &message("total_scu = 12.5"),
            &meta("chan", "user"),
        )
        .await
        .expect("pin");
        let session = session.expect("alive");

        let (session, _) = handle_step(
            &state,
            session,
            &message("title = Loot run"),
            &meta("chan", "user"),
        )
        .await
        .expect("title");
        let session = session.expect("alive");

        assert_eq!(session.working.total_scu, 12.5);
        assert_eq!(session.working.title.as_deref(), Some("Loot run"));
    }

    #[tokio::test]
    async fn auto_marker_unpins_a_total() {
        let state = fixture_state(|_| {});
        let mut record = existing_hit(1700000000000001, "user");
        record.cargo = vec![corsair_domain::entities::CargoLine {
            commodity_name: "Gold".to_string(),
            scu_amount: 5.0,
            avg_price: Some(6941.0),
            pricing_note: None,
            pricing_match: None,
        }];
        let session = session_for(record);

        let (session, _) = handle_step(
            &state,
            session,
            &message("total_value = 1"),
            &meta("chan", "user"),
        )
        .await
        .expect("pin");
        let (session, reply) = handle_step(
            &state,
            session.expect("alive"),
            &message("total_value = auto"),
            &meta("chan", "user"),
        )
        .await
        .expect("unpin");
        let session = session.expect("alive");

        assert!(!session.manual_totals.total_value);
        assert_eq!(session.working.total_value, 34705.0);
        assert!(reply.contains("back to automatic"));
    }

    #[tokio::test]
    async fn unrecognized_input_shows_help() {
        let state = fixture_state(|_| {});
        let session = session_for(existing_hit(1700000000000001, "user"));
        let (session, reply) =
            handle_step(&state, session, &message("???"), &meta("chan", "user"))
                .await
                .expect("step");
        assert!(session.is_some());
        assert!(reply.contains("i can change"));
    }
}
