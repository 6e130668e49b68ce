use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entities::HitRecord;
use crate::services::extractor::{is_none_marker, parse_amount, parse_timestamp};
use crate::value_objects::{Engagement, PiracyType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListOp {
    Add,
    Remove,
    Set,
    Clear,
}

/// Result of one list mutation. `changed` is computed from the observed
/// delta, not the instruction, so no-op messages stay accurate.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOpOutcome {
    pub list: Vec<String>,
    pub added: usize,
    pub removed: usize,
    pub changed: bool,
    pub note: String,
}

/// Applies an idempotent list mutation. Entry identity is case-insensitive.
pub fn apply_list_op(field: &str, current: &[String], op: ListOp, operands: &[String]) -> ListOpOutcome {
    match op {
        ListOp::Clear => {
            if current.is_empty() {
                ListOpOutcome {
                    list: Vec::new(),
                    added: 0,
                    removed: 0,
                    changed: false,
                    note: format!("{} is already empty.", field),
                }
            } else {
                let removed = current.len();
                ListOpOutcome {
                    list: Vec::new(),
                    added: 0,
                    removed,
                    changed: true,
                    note: format!("cleared {} ({} removed).", field, removed),
                }
            }
        }
        ListOp::Add => {
            let mut list = current.to_vec();
            let mut added = 0;
            for operand in dedup_ci(operands) {
                if !contains_ci(&list, &operand) {
                    list.push(operand);
                    added += 1;
                }
            }
            if added == 0 {
                ListOpOutcome {
                    list,
                    added: 0,
                    removed: 0,
                    changed: false,
                    note: format!("no changes; those entries are already in {}.", field),
                }
            } else {
                ListOpOutcome {
                    note: format!("added {} to {}.", added, field),
                    list,
                    added,
                    removed: 0,
                    changed: true,
                }
            }
        }
        ListOp::Remove => {
            let targets: Vec<String> = dedup_ci(operands)
                .iter()
                .map(|entry| entry.to_lowercase())
                .collect();
            let list: Vec<String> = current
                .iter()
                .filter(|entry| !targets.contains(&entry.to_lowercase()))
                .cloned()
                .collect();
            let removed = current.len() - list.len();
            if removed == 0 {
                ListOpOutcome {
                    list,
                    added: 0,
                    removed: 0,
                    changed: false,
                    note: format!("none of those were in {}; nothing removed.", field),
                }
            } else {
                ListOpOutcome {
                    note: format!("removed {} from {}.", removed, field),
                    list,
                    added: 0,
                    removed,
                    changed: true,
                }
            }
        }
        ListOp::Set => {
            let list = dedup_ci(operands);
            if same_ci(current, &list) {
                ListOpOutcome {
                    list,
                    added: 0,
                    removed: 0,
                    changed: false,
                    note: format!("{} already matches that list.", field),
                }
            } else {
                ListOpOutcome {
                    note: format!("set {} ({} entries).", field, list.len()),
                    added: list.len(),
                    removed: current.len(),
                    list,
                    changed: true,
                }
            }
        }
    }
}

fn dedup_ci(values: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .iter()
        .filter(|value| seen.insert(value.to_lowercase()))
        .cloned()
        .collect()
}

fn contains_ci(list: &[String], value: &str) -> bool {
    let lower = value.to_lowercase();
    list.iter().any(|entry| entry.to_lowercase() == lower)
}

fn same_ci(a: &[String], b: &[String]) -> bool {
    let norm = |values: &[String]| -> BTreeSet<String> {
        values.iter().map(|value| value.to_lowercase()).collect()
    };
    norm(a) == norm(b)
}

/// Outcome of a scalar field assignment: the canonical field name plus a
/// short confirmation note.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignApplied {
    pub field: &'static str,
    pub note: String,
}

/// Applies one scalar `field = value` assignment to a draft record.
/// The `Err` text is a validation message shown verbatim to the user.
/// Cargo, assists/victims/guests and the two auto-trackable totals are
/// handled by their dedicated paths, not here.
pub fn apply_scalar_assignment(
    record: &mut HitRecord,
    field: &str,
    raw: &str,
) -> Result<AssignApplied, String> {
    let value = raw.trim();
    match field {
        "title" => {
            record.title = non_empty(value);
            Ok(applied("title", value))
        }
        "story" => {
            record.story = non_empty(value);
            Ok(applied("story", "updated"))
        }
        "video" | "video_link" => {
            record.video_link = non_empty(value);
            Ok(applied("video_link", value))
        }
        "media" | "additional_media_links" => {
            record.additional_media_links = value
                .split([' ', ',', '\n'])
                .map(str::trim)
                .filter(|link| !link.is_empty())
                .map(ToString::to_string)
                .collect();
            Ok(applied(
                "additional_media_links",
                &format!("{} link(s)", record.additional_media_links.len()),
            ))
        }
        "patch" => {
            record.patch = non_empty(value);
            Ok(applied("patch", value))
        }
        "timestamp" | "date" => {
            record.timestamp = Some(parse_timestamp(value)?);
            Ok(applied("timestamp", value))
        }
        "air_or_ground" | "engagement" => {
            let parsed = Engagement::parse(value)
                .ok_or_else(|| format!("'{}' is not a known engagement; use Air or Ground", value))?;
            record.air_or_ground = Some(parsed);
            Ok(applied("air_or_ground", parsed.as_str()))
        }
        "type_of_piracy" | "style" | "piracy_style" => {
            let parsed = PiracyType::parse(value).ok_or_else(|| {
                format!("'{}' is not a known piracy style; use Extortion or Brute Force", value)
            })?;
            record.type_of_piracy = Some(parsed);
            Ok(applied("type_of_piracy", parsed.as_str()))
        }
        "fleet" | "fleet_activity" => {
            let flag = parse_bool(value)
                .ok_or_else(|| format!("'{}' is not a yes/no value for fleet activity", value))?;
            record.fleet_activity = flag;
            Ok(applied("fleet_activity", if flag { "yes" } else { "no" }))
        }
        "total_cut_value" => {
            record.total_cut_value = parse_amount(value)
                .ok_or_else(|| format!("'{}' is not a number for total_cut_value", value))?;
            Ok(applied("total_cut_value", value))
        }
        "total_cut_scu" => {
            record.total_cut_scu = parse_amount(value)
                .ok_or_else(|| format!("'{}' is not a number for total_cut_scu", value))?;
            Ok(applied("total_cut_scu", value))
        }
        other => Err(format!("'{}' is not an editable field", other)),
    }
}

fn applied(field: &'static str, detail: &str) -> AssignApplied {
    AssignApplied {
        field,
        note: format!("{} set to {}.", field, detail),
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() || is_none_marker(value) {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Some(true),
        "no" | "n" | "false" | "0" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Diff rendering

/// Renders the original-vs-working delta for every touched field. Assist
/// lists render as role mentions, name lists as plain strings, and the cargo
/// manifest as entry counts.
pub fn render_session_diff(
    original: &HitRecord,
    working: &HitRecord,
    updated_fields: &BTreeSet<String>,
) -> String {
    if updated_fields.is_empty() {
        return "no changes yet.".to_string();
    }
    let mut out = Vec::new();
    for field in updated_fields {
        out.push(format!("- {}", render_field_diff(field, original, working)));
    }
    out.join("\n")
}

pub fn render_field_diff(field: &str, original: &HitRecord, working: &HitRecord) -> String {
    match field {
        "assists" => format!(
            "assists: {} → {}",
            render_mentions(&original.assists),
            render_mentions(&working.assists)
        ),
        "victims" => format!(
            "victims: {} → {}",
            render_names(&original.victims),
            render_names(&working.victims)
        ),
        "guests" => format!(
            "guests: {} → {}",
            render_names(&original.guests),
            render_names(&working.guests)
        ),
        "additional_media_links" => format!(
            "media: {} → {} link(s)",
            original.additional_media_links.len(),
            working.additional_media_links.len()
        ),
        "cargo" => format!(
            "cargo: {} → {} line(s)",
            original.cargo.len(),
            working.cargo.len()
        ),
        "title" => scalar_diff("title", &original.title, &working.title),
        "story" => scalar_diff("story", &original.story, &working.story),
        "video_link" => scalar_diff("video_link", &original.video_link, &working.video_link),
        "patch" => scalar_diff("patch", &original.patch, &working.patch),
        "timestamp" => format!(
            "timestamp: {} → {}",
            original
                .timestamp
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "unset".to_string()),
            working
                .timestamp
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "unset".to_string())
        ),
        "air_or_ground" => format!(
            "air_or_ground: {} → {}",
            original.air_or_ground.map(|e| e.as_str()).unwrap_or("unset"),
            working.air_or_ground.map(|e| e.as_str()).unwrap_or("unset")
        ),
        "type_of_piracy" => format!(
            "type_of_piracy: {} → {}",
            original.type_of_piracy.map(|p| p.as_str()).unwrap_or("unset"),
            working.type_of_piracy.map(|p| p.as_str()).unwrap_or("unset")
        ),
        "fleet_activity" => format!(
            "fleet_activity: {} → {}",
            original.fleet_activity, working.fleet_activity
        ),
        "total_value" => format!(
            "total_value: {} → {}",
            original.total_value, working.total_value
        ),
        "total_scu" => format!("total_scu: {} → {}", original.total_scu, working.total_scu),
        "total_cut_value" => format!(
            "total_cut_value: {} → {}",
            original.total_cut_value, working.total_cut_value
        ),
        "total_cut_scu" => format!(
            "total_cut_scu: {} → {}",
            original.total_cut_scu, working.total_cut_scu
        ),
        other => format!("{}: updated", other),
    }
}

fn scalar_diff(field: &str, original: &Option<String>, working: &Option<String>) -> String {
    format!(
        "{}: {} → {}",
        field,
        original.as_deref().unwrap_or("unset"),
        working.as_deref().unwrap_or("unset")
    )
}

fn render_mentions(ids: &[String]) -> String {
    if ids.is_empty() {
        return "(empty)".to_string();
    }
    ids.iter()
        .map(|id| format!("<@{}>", id))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_names(names: &[String]) -> String {
    if names.is_empty() {
        return "(empty)".to_string();
    }
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[&str]) -> Vec<String> {
        entries.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn add_is_idempotent_and_reports_the_delta() {
        let current = list(&["Dax"]);
        let once = apply_list_op("assists", &current, ListOp::Add, &list(&["Rook"]));
        assert_eq!(once.added, 1);
        let twice = apply_list_op("assists", &once.list, ListOp::Add, &list(&["rook"]));
        assert_eq!(twice.added, 0);
        assert!(!twice.changed);
        assert_eq!(twice.list, once.list);
    }

    #[test]
    fn add_dedups_its_own_operands() {
        let outcome = apply_list_op("victims", &[], ListOp::Add, &list(&["Bob", "bob", "Carol"]));
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.list, list(&["Bob", "Carol"]));
    }

    #[test]
    fn remove_misses_report_no_change() {
        let current = list(&["Dax"]);
        let outcome = apply_list_op("assists", &current, ListOp::Remove, &list(&["Alice"]));
        assert!(!outcome.changed);
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.list, current);
        assert!(outcome.note.contains("nothing removed"));
    }

    #[test]
    fn clear_on_empty_is_a_distinct_no_op() {
        let outcome = apply_list_op("guests", &[], ListOp::Clear, &[]);
        assert!(!outcome.changed);
        assert!(outcome.note.contains("already empty"));
    }

    #[test]
    fn set_to_identical_list_is_a_no_op() {
        let current = list(&["Alice", "Bob"]);
        let outcome = apply_list_op("victims", &current, ListOp::Set, &list(&["bob", "alice"]));
        assert!(!outcome.changed);
    }

    #[test]
    fn scalar_assignment_validates_enums() {
        let mut record = HitRecord::default();
        let err = apply_scalar_assignment(&mut record, "air_or_ground", "submarine").expect_err("reject");
        assert!(err.contains("submarine"));
        let ok = apply_scalar_assignment(&mut record, "air_or_ground", "ground").expect("apply");
        assert_eq!(ok.field, "air_or_ground");
        assert_eq!(record.air_or_ground, Some(Engagement::Ground));
    }

    #[test]
    fn timestamp_assignment_propagates_parse_errors_verbatim() {
        let mut record = HitRecord::default();
        let err = apply_scalar_assignment(&mut record, "timestamp", "whenever").expect_err("reject");
        assert!(err.contains("whenever"));
    }

    #[test]
    fn diff_renders_mentions_and_counts() {
        let mut original = HitRecord::default();
        original.assists = list(&["100"]);
        let mut working = original.clone();
        working.assists = list(&["100", "200"]);
        working.cargo.push(crate::entities::CargoLine {
            commodity_name: "Gold".to_string(),
            scu_amount: 5.0,
            avg_price: Some(6000.0),
            pricing_note: None,
            pricing_match: None,
        });
        let mut touched = BTreeSet::new();
        touched.insert("assists".to_string());
        touched.insert("cargo".to_string());
        let diff = render_session_diff(&original, &working, &touched);
        assert!(diff.contains("<@200>"));
        assert!(diff.contains("0 → 1 line(s)"));
    }
}
