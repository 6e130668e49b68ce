use corsair_domain::entities::{
    ExtractedHit, HitRecord, InboundMessage, InboundMeta, IntakeSession, PricingTotals,
    ORACLE_ACTION_HIT_CREATE,
};
use corsair_domain::services::extractor::{
    self, capture_participants, is_none_marker, is_skip, known_assignments, parse_cargo_lines,
    split_names, RawCargoLine,
};
use corsair_domain::services::mutation::{apply_list_op, apply_scalar_assignment, ListOp};
use corsair_domain::services::resolver::price_cargo_lines;
use corsair_domain::value_objects::{IntakeStep, PiracyType, SessionKey};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::commands::{participants, submit_commands};
use crate::{AppError, AppState};

static INTAKE_TRIGGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(log|logging|logged|record|recording|report|reporting)\b.*\bhit\b")
        .expect("regex")
});

pub fn matches_trigger(content: &str) -> bool {
    INTAKE_TRIGGER.is_match(content)
}

/// Opens a fresh intake session. The opening message itself is offered to
/// the extraction oracle; a confident extraction with at least one priceable
/// cargo line pre-fills the draft and skips ahead.
pub async fn start_session(
    state: &AppState,
    msg: &InboundMessage,
    meta: &InboundMeta,
) -> Result<String, AppError> {
    state.pricing.ensure_ready().await?;

    let key = SessionKey::intake(&meta.channel_id, &meta.author_id);
    let draft = HitRecord {
        user_id: meta.author_id.clone(),
        username: meta.author_name.clone(),
        nickname: meta.display_name().to_string(),
        ..HitRecord::default()
    };
    let mut session = IntakeSession::new(key, draft, state.config.session_ttl_minutes);

    let mut reply = format!(
        "logging a new hit for {}. {}",
        meta.display_name(),
        prompt_for(IntakeStep::Cargo)
    );
    match state.oracle.extract(&msg.content, meta).await {
        Ok(Some(extracted)) => {
            if let Some(seeded) = seed_from_oracle(state, &mut session, extracted).await? {
                reply = seeded;
            }
        }
        Ok(None) => {}
        Err(err) => {
            warn!(error = %err, "extraction oracle unavailable, continuing step by step");
            state.metrics.record_oracle_rejected();
        }
    }

    state.metrics.record_intake_opened();
    state.sessions.lock().await.put_intake(session);
    Ok(reply)
}

/// Pre-fills the session from an oracle extraction. Returns the opening
/// reply on acceptance, `None` when the extraction is rejected.
async fn seed_from_oracle(
    state: &AppState,
    session: &mut IntakeSession,
    extracted: ExtractedHit,
) -> Result<Option<String>, AppError> {
    let confident = extracted.action == ORACLE_ACTION_HIT_CREATE
        && extracted.confidence >= state.config.oracle_min_confidence;
    if !confident || extracted.cargo.is_empty() {
        state.metrics.record_oracle_rejected();
        return Ok(None);
    }

    let raw: Vec<RawCargoLine> = extracted
        .cargo
        .iter()
        .map(|line| RawCargoLine {
            name: line.name.clone(),
            qty: line.scu,
            price: line.price,
        })
        .collect();
    let prices = state.pricing.terminal_prices().await?;
    let priced = price_cargo_lines(&raw, &prices, state.config.resolver_min_score);
    if priced.iter().all(|line| line.avg_price.is_none()) {
        state.metrics.record_oracle_rejected();
        return Ok(None);
    }

    session.fields.cargo = priced;
    sync_intake_totals(session);

    let (resolved, guests) = participants::resolve_names(state, &extracted.assists).await?;
    session.fields.assists = apply_list_op("assists", &[], ListOp::Add, &resolved).list;
    let mut all_guests = guests;
    all_guests.extend(extracted.guests.iter().cloned());
    session.fields.guests = apply_list_op("guests", &[], ListOp::Add, &all_guests).list;
    session.fields.victims = apply_list_op("victims", &[], ListOp::Add, &extracted.victims).list;

    session.fields.title = extracted.title.filter(|t| !t.trim().is_empty());
    session.fields.story = extracted.story.filter(|s| !s.trim().is_empty());
    if let Some(style) = extracted.type_of_piracy.as_deref().and_then(PiracyType::parse) {
        session.fields.type_of_piracy = Some(style);
    }
    if let Some(raw_ts) = extracted.timestamp.as_deref() {
        if let Ok(ts) = extractor::parse_timestamp(raw_ts) {
            session.fields.timestamp = Some(ts);
        }
    }

    session.step = if session.fields.assists.is_empty() && session.fields.guests.is_empty() {
        IntakeStep::Assists
    } else {
        IntakeStep::Details
    };
    state.metrics.record_oracle_accepted();

    Ok(Some(format!(
        "i read that as a hit log:\n{}\n\n{}",
        render_summary(&session.fields),
        prompt_for(session.step)
    )))
}

/// Advances an intake session by one message. `Ok((None, _))` means the
/// session ended (committed or cancelled); validation misses keep it alive.
/// `Err` destroys the session.
pub async fn handle_step(
    state: &AppState,
    mut session: IntakeSession,
    msg: &InboundMessage,
    meta: &InboundMeta,
) -> Result<(Option<IntakeSession>, String), AppError> {
    let content = msg.content.trim();
    let lower = content.to_lowercase();

    match lower.as_str() {
        "cancel" | "abort" | "nevermind" => {
            return Ok((None, "hit log discarded. nothing was saved.".to_string()));
        }
        "status" => {
            let reply = render_status(&session);
            return Ok((Some(session), reply));
        }
        _ => {}
    }

    match session.step {
        IntakeStep::Cargo => step_cargo(state, session, content).await,
        IntakeStep::Assists => step_assists(state, session, msg, content).await,
        IntakeStep::Details => step_details(state, session, content).await,
        IntakeStep::Confirm => step_confirm(state, session, meta, content).await,
        IntakeStep::Completed => Ok((
            None,
            "that hit is already logged; start a new one with 'log a hit'.".to_string(),
        )),
    }
}

async fn step_cargo(
    state: &AppState,
    mut session: IntakeSession,
    content: &str,
) -> Result<(Option<IntakeSession>, String), AppError> {
    if is_skip(content) {
        session.step = IntakeStep::Assists;
        session.touch(state.config.session_ttl_minutes);
        return Ok((
            Some(session),
            format!("skipping cargo. {}", prompt_for(IntakeStep::Assists)),
        ));
    }

    let raw = parse_cargo_lines(content);
    if raw.is_empty() {
        return Ok((
            Some(session),
            "i couldn't read a cargo manifest from that. try lines like 'Fluorine: 10' \
             or '25 SCU of Medical Supplies', or say skip."
                .to_string(),
        ));
    }

    let prices = state.pricing.terminal_prices().await?;
    session.fields.cargo = price_cargo_lines(&raw, &prices, state.config.resolver_min_score);
    sync_intake_totals(&mut session);
    session.step = IntakeStep::Assists;
    session.touch(state.config.session_ttl_minutes);

    let reply = format!(
        "{}\n\n{}",
        render_cargo_block(&session.fields),
        prompt_for(IntakeStep::Assists)
    );
    Ok((Some(session), reply))
}

async fn step_assists(
    state: &AppState,
    mut session: IntakeSession,
    msg: &InboundMessage,
    content: &str,
) -> Result<(Option<IntakeSession>, String), AppError> {
    if is_none_marker(content) {
        session.step = IntakeStep::Details;
        session.touch(state.config.session_ttl_minutes);
        return Ok((
            Some(session),
            format!("solo hit, noted. {}", prompt_for(IntakeStep::Details)),
        ));
    }

    let mut names = capture_participants(content);
    if names.is_empty() {
        names = split_names(content);
    }
    let (mut resolved, guests) = participants::resolve_names(state, &names).await?;
    for mention in &msg.mentions {
        resolved.push(mention.clone());
    }
    if resolved.is_empty() && guests.is_empty() {
        return Ok((
            Some(session),
            "i didn't catch any names there. mention the people who assisted, list their \
             names, or say none."
                .to_string(),
        ));
    }

    session.fields.assists =
        apply_list_op("assists", &session.fields.assists, ListOp::Add, &resolved).list;
    session.fields.guests =
        apply_list_op("guests", &session.fields.guests, ListOp::Add, &guests).list;
    session.step = IntakeStep::Details;
    session.touch(state.config.session_ttl_minutes);

    let mut noted = format!("noted {} assist(s)", session.fields.assists.len());
    if !session.fields.guests.is_empty() {
        noted.push_str(&format!(" and {} guest(s)", session.fields.guests.len()));
    }
    Ok((
        Some(session),
        format!("{}. {}", noted, prompt_for(IntakeStep::Details)),
    ))
}

async fn step_details(
    state: &AppState,
    mut session: IntakeSession,
    content: &str,
) -> Result<(Option<IntakeSession>, String), AppError> {
    if is_skip(content) {
        session.step = IntakeStep::Confirm;
        session.touch(state.config.session_ttl_minutes);
        let reply = render_confirmation(&session);
        return Ok((Some(session), reply));
    }

    let pairs = known_assignments(content);
    if pairs.is_empty() {
        if !content.is_empty() {
            session.fields.story = Some(content.to_string());
        }
        session.step = IntakeStep::Confirm;
        session.touch(state.config.session_ttl_minutes);
        let reply = render_confirmation(&session);
        return Ok((Some(session), reply));
    }

    let mut notes = Vec::new();
    for (field, value) in &pairs {
        match apply_intake_pair(state, &mut session, field, value).await? {
            Ok(note) => notes.push(note),
            Err(rejection) => return Ok((Some(session), rejection)),
        }
    }
    session.step = IntakeStep::Confirm;
    session.touch(state.config.session_ttl_minutes);

    let reply = format!("{}\n\n{}", notes.join("\n"), render_confirmation(&session));
    Ok((Some(session), reply))
}

async fn step_confirm(
    state: &AppState,
    mut session: IntakeSession,
    meta: &InboundMeta,
    content: &str,
) -> Result<(Option<IntakeSession>, String), AppError> {
    let lower = content.to_lowercase();
    if matches!(lower.as_str(), "done" | "submit" | "confirm" | "yes" | "log it") {
        let reply = submit_commands::commit_intake(state, session, meta).await?;
        return Ok((None, reply));
    }

    let pairs = known_assignments(content);
    if !pairs.is_empty() {
        let mut notes = Vec::new();
        for (field, value) in &pairs {
            match apply_intake_pair(state, &mut session, field, value).await? {
                Ok(note) => notes.push(note),
                Err(rejection) => return Ok((Some(session), rejection)),
            }
        }
        session.touch(state.config.session_ttl_minutes);
        let reply = format!("{}\n\n{}", notes.join("\n"), render_confirmation(&session));
        return Ok((Some(session), reply));
    }

    let raw = parse_cargo_lines(content);
    if !raw.is_empty() {
        let prices = state.pricing.terminal_prices().await?;
        session.fields.cargo = price_cargo_lines(&raw, &prices, state.config.resolver_min_score);
        sync_intake_totals(&mut session);
        session.touch(state.config.session_ttl_minutes);
        let reply = format!(
            "cargo replaced.\n{}\n\n{}",
            render_cargo_block(&session.fields),
            render_confirmation(&session)
        );
        return Ok((Some(session), reply));
    }

    Ok((
        Some(session),
        "say done to log it, cancel to discard, or adjust a field like 'title = Loot run'."
            .to_string(),
    ))
}

/// Applies one `field = value` pair to the draft. The inner `Err` is a
/// validation message shown verbatim; the session stays alive.
async fn apply_intake_pair(
    state: &AppState,
    session: &mut IntakeSession,
    field: &str,
    value: &str,
) -> Result<Result<String, String>, AppError> {
    match field {
        "cargo" => {
            let raw = parse_cargo_lines(value);
            if raw.is_empty() {
                return Ok(Err(
                    "i couldn't read a cargo manifest from that value.".to_string()
                ));
            }
            let prices = state.pricing.terminal_prices().await?;
            session.fields.cargo =
                price_cargo_lines(&raw, &prices, state.config.resolver_min_score);
            sync_intake_totals(session);
            Ok(Ok(format!(
                "cargo set: {} line(s), {:.0} aUEC.",
                session.fields.cargo.len(),
                session.pricing.total_value
            )))
        }
        "assists" => {
            let (resolved, guests) =
                participants::resolve_names(state, &split_names(value)).await?;
            session.fields.assists =
                apply_list_op("assists", &session.fields.assists, ListOp::Set, &resolved).list;
            if !guests.is_empty() {
                session.fields.guests =
                    apply_list_op("guests", &session.fields.guests, ListOp::Add, &guests).list;
            }
            Ok(Ok(format!(
                "assists set ({} entries).",
                session.fields.assists.len()
            )))
        }
        "victims" => {
            session.fields.victims =
                apply_list_op("victims", &session.fields.victims, ListOp::Set, &split_names(value))
                    .list;
            Ok(Ok(format!(
                "victims set ({} entries).",
                session.fields.victims.len()
            )))
        }
        "guests" => {
            session.fields.guests =
                apply_list_op("guests", &session.fields.guests, ListOp::Set, &split_names(value))
                    .list;
            Ok(Ok(format!(
                "guests set ({} entries).",
                session.fields.guests.len()
            )))
        }
        "total_value" | "total_scu" => Ok(Ok(
            "totals track the cargo manifest automatically here; adjust them after logging \
             with 'edit hit <id>'."
                .to_string(),
        )),
        _ => Ok(apply_scalar_assignment(&mut session.fields, field, value).map(|applied| applied.note)),
    }
}

fn sync_intake_totals(session: &mut IntakeSession) {
    session.pricing = PricingTotals::from_cargo(&session.fields);
    session.fields.total_value = session.pricing.total_value;
    session.fields.total_scu = session.pricing.total_scu;
}

pub fn prompt_for(step: IntakeStep) -> String {
    match step {
        IntakeStep::Cargo => {
            "what cargo did you take? lines like 'Fluorine: 10' or '25 SCU of Medical \
             Supplies' work, or say skip."
                .to_string()
        }
        IntakeStep::Assists => {
            "who assisted on the hit? mention them, list their names, or say none.".to_string()
        }
        IntakeStep::Details => {
            "any details to add? things like 'title = ...', 'story = ...', 'video = ...', \
             'victims = ...', 'style = Extortion', 'date = 2024-05-01'. say skip when done."
                .to_string()
        }
        IntakeStep::Confirm => "say done to log it or cancel to discard.".to_string(),
        IntakeStep::Completed => "this hit is already logged.".to_string(),
    }
}

fn render_cargo_block(record: &HitRecord) -> String {
    if record.cargo.is_empty() {
        return "cargo: none".to_string();
    }
    let mut out = vec!["cargo:".to_string()];
    for line in &record.cargo {
        let price = match line.avg_price {
            Some(price) => format!("{:.0}/SCU", price),
            None => "unpriced".to_string(),
        };
        let note = line
            .pricing_note
            .as_deref()
            .map(|n| format!(" ({})", n))
            .unwrap_or_default();
        out.push(format!(
            "  - {} x{:.0} @ {}{}",
            line.commodity_name, line.scu_amount, price, note
        ));
    }
    let (value, scu) = record.cargo_totals();
    out.push(format!("totals: {:.0} aUEC / {:.2} SCU", value, scu));
    out.join("\n")
}

pub fn render_summary(record: &HitRecord) -> String {
    let mut out = vec![render_cargo_block(record)];
    if !record.assists.is_empty() {
        let mentions: Vec<String> = record.assists.iter().map(|id| format!("<@{}>", id)).collect();
        out.push(format!("assists: {}", mentions.join(" ")));
    }
    if !record.guests.is_empty() {
        out.push(format!("guests: {}", record.guests.join(", ")));
    }
    if !record.victims.is_empty() {
        out.push(format!("victims: {}", record.victims.join(", ")));
    }
    if let Some(title) = &record.title {
        out.push(format!("title: {}", title));
    }
    if let Some(story) = &record.story {
        out.push(format!("story: {}", story));
    }
    if let Some(style) = record.type_of_piracy {
        out.push(format!("style: {}", style.as_str()));
    }
    if let Some(engagement) = record.air_or_ground {
        out.push(format!("engagement: {}", engagement.as_str()));
    }
    if let Some(ts) = record.timestamp {
        out.push(format!("when: {}", ts.to_rfc3339()));
    }
    out.join("\n")
}

fn render_status(session: &IntakeSession) -> String {
    format!(
        "current step: {}\n{}\n\n{}",
        session.step.as_str(),
        render_summary(&session.fields),
        prompt_for(session.step)
    )
}

fn render_confirmation(session: &IntakeSession) -> String {
    format!(
        "here's the hit so far:\n{}\n\n{}",
        render_summary(&session.fields),
        prompt_for(IntakeStep::Confirm)
    )
}
