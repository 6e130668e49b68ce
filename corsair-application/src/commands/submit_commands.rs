use anyhow::anyhow;
use chrono::Utc;
use corsair_domain::entities::{EditSession, HitRecord, InboundMeta, IntakeSession};
use corsair_domain::services::mutation::render_session_diff;
use corsair_domain::utils::{mint_hit_id, round0, round2};
use corsair_domain::value_objects::{Engagement, PiracyType};

use crate::{AppError, AppState};

/// Finalizes a draft for first persistence: mints an id, fills the default
/// engagement, piracy style, timestamp and title, and rounds the totals.
pub fn finalize_new(record: &mut HitRecord) {
    if record.id.is_none() {
        record.id = Some(mint_hit_id());
    }
    if record.air_or_ground.is_none() {
        record.air_or_ground = Some(Engagement::Air);
    }
    if record.type_of_piracy.is_none() {
        record.type_of_piracy = Some(PiracyType::BruteForce);
    }
    if record.timestamp.is_none() {
        record.timestamp = Some(Utc::now());
    }
    record.total_value = round0(record.total_value);
    record.total_scu = round2(record.total_scu);
    if record.title.as_deref().map(str::trim).unwrap_or("").is_empty() {
        let reporter = if record.nickname.is_empty() {
            &record.username
        } else {
            &record.nickname
        };
        record.title = Some(format!("{}'s {:.0} aUEC hit", reporter, record.total_value));
    }
}

/// Commits a completed intake. A failure here is terminal for the session:
/// the caller drops it and the user starts over.
pub async fn commit_intake(
    state: &AppState,
    session: IntakeSession,
    _meta: &InboundMeta,
) -> Result<String, AppError> {
    let mut record = session.fields;
    record.total_value = session.pricing.total_value;
    record.total_scu = session.pricing.total_scu;
    finalize_new(&mut record);

    let saved = match state.hits.create(&record).await {
        Ok(Some(saved)) => saved,
        Ok(None) => {
            state.metrics.record_commit_failure();
            return Err(AppError::Internal(anyhow!(
                "persistence did not return the saved hit"
            )));
        }
        Err(err) => {
            state.metrics.record_commit_failure();
            return Err(AppError::Internal(err.context("saving the hit failed")));
        }
    };

    state.metrics.record_commit();
    state.notifier.spawn_hit_created(saved.clone());

    let id = saved.id.or(record.id).unwrap_or_default();
    Ok(format!(
        "hit {} logged: {:.0} aUEC across {:.2} SCU. a recap thread is on its way.",
        id, record.total_value, record.total_scu
    ))
}

/// Commits an edit session's working copy over the stored record.
pub async fn commit_edit(state: &AppState, session: EditSession) -> Result<String, AppError> {
    let mut record = session.working;
    record.total_value = round0(record.total_value);
    record.total_scu = round2(record.total_scu);

    match state.hits.update(session.hit_id, &record).await {
        Ok(true) => {}
        Ok(false) => {
            state.metrics.record_commit_failure();
            return Err(AppError::Internal(anyhow!(
                "persistence rejected the update for hit {}",
                session.hit_id
            )));
        }
        Err(err) => {
            state.metrics.record_commit_failure();
            return Err(AppError::Internal(err.context("updating the hit failed")));
        }
    }

    state.metrics.record_commit();
    let diff = render_session_diff(&session.original, &record, &session.updated_fields);
    state
        .notifier
        .spawn_hit_updated(session.original, record);

    Ok(format!(
        "saved {} change(s) to hit {}:\n{}",
        session.updated_fields.len(),
        session.hit_id,
        diff
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{fixture_state_with_calls, meta};
    use corsair_domain::entities::CargoLine;
    use corsair_domain::value_objects::SessionKey;

    fn priced_line(name: &str, qty: f64, price: f64) -> CargoLine {
        CargoLine {
            commodity_name: name.to_string(),
            scu_amount: qty,
            avg_price: Some(price),
            pricing_note: None,
            pricing_match: None,
        }
    }

    fn draft_session() -> IntakeSession {
        let mut fields = HitRecord {
            user_id: "user".to_string(),
            username: "Reporter".to_string(),
            nickname: "Reporter".to_string(),
            cargo: vec![
                priced_line("Fluorine", 10.0, 295.0),
                priced_line("Medical Supplies", 25.0, 2519.0),
            ],
            ..HitRecord::default()
        };
        let (value, scu) = fields.cargo_totals();
        fields.total_value = value;
        fields.total_scu = scu;
        let mut session = IntakeSession::new(SessionKey::intake("c", "user"), fields, 30);
        session.pricing = corsair_domain::entities::PricingTotals::from_cargo(&session.fields);
        session
    }

    #[test]
    fn finalize_fills_defaults_and_rounds() {
        let mut record = HitRecord {
            nickname: "Reporter".to_string(),
            total_value: 65924.6,
            total_scu: 35.004,
            ..HitRecord::default()
        };
        finalize_new(&mut record);

        assert!(record.id.is_some());
        assert_eq!(record.air_or_ground, Some(Engagement::Air));
        assert_eq!(record.type_of_piracy, Some(PiracyType::BruteForce));
        assert!(record.timestamp.is_some());
        assert_eq!(record.total_value, 65925.0);
        assert_eq!(record.total_scu, 35.0);
        assert_eq!(record.title.as_deref(), Some("Reporter's 65925 aUEC hit"));
    }

    #[test]
    fn finalize_keeps_explicit_values() {
        let mut record = HitRecord {
            title: Some("Loot run".to_string()),
            air_or_ground: Some(Engagement::Ground),
            type_of_piracy: Some(PiracyType::Extortion),
            ..HitRecord::default()
        };
        finalize_new(&mut record);
        assert_eq!(record.title.as_deref(), Some("Loot run"));
        assert_eq!(record.air_or_ground, Some(Engagement::Ground));
        assert_eq!(record.type_of_piracy, Some(PiracyType::Extortion));
    }

    #[tokio::test]
    async fn commit_intake_persists_and_notifies() {
        let (state, calls) = fixture_state_with_calls(|_| {});
        let reply = commit_intake(&state, draft_session(), &meta("c", "user"))
            .await
            .expect("commit");

        assert!(reply.contains("65925 aUEC"));
        let created = calls.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].total_value, 65925.0);
        assert_eq!(created[0].total_scu, 35.0);
        assert_eq!(calls.threads_created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commit_intake_surfaces_persistence_failures() {
        let (state, calls) = fixture_state_with_calls(|fixtures| {
            fixtures.fail_create = true;
        });
        let err = commit_intake(&state, draft_session(), &meta("c", "user"))
            .await
            .expect_err("must fail");
        assert!(matches!(err, AppError::Internal(_)));
        assert!(calls.threads_created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_edit_reports_the_diff() {
        let (state, calls) = fixture_state_with_calls(|_| {});
        let original = HitRecord {
            id: Some(42),
            user_id: "user".to_string(),
            title: Some("Old title".to_string()),
            ..HitRecord::default()
        };
        let mut session = EditSession::new(SessionKey::edit("c", "user"), 42, original, 30);
        session.working.title = Some("New title".to_string());
        session.updated_fields.insert("title".to_string());

        let reply = commit_edit(&state, session).await.expect("commit");
        assert!(reply.contains("saved 1 change(s) to hit 42"));
        assert!(reply.contains("Old title"));
        assert!(reply.contains("New title"));
        assert_eq!(calls.updated.lock().unwrap().len(), 1);
        assert_eq!(calls.threads_updated.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commit_edit_rejected_update_is_an_error() {
        let (state, _calls) = fixture_state_with_calls(|fixtures| {
            fixtures.fail_update = true;
        });
        let original = HitRecord {
            id: Some(42),
            ..HitRecord::default()
        };
        let mut session = EditSession::new(SessionKey::edit("c", "user"), 42, original, 30);
        session.updated_fields.insert("title".to_string());

        let err = commit_edit(&state, session).await.expect_err("must fail");
        assert!(matches!(err, AppError::Internal(_)));
    }
}
