use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::mutation::ListOp;
use crate::services::resolver::canonicalize;

/// A cargo line as parsed from text, before price resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCargoLine {
    pub name: String,
    pub qty: f64,
    /// Explicit per-SCU price supplied in the message; always wins over the
    /// resolver when present.
    pub price: Option<f64>,
}

/// A normalized list-mutation instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ListInstruction {
    pub field: String,
    pub op: ListOp,
    pub operands: Vec<String>,
}

/// Tagged classification of one free-text message.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    ListOp(ListInstruction),
    Assignment(Vec<(String, String)>),
    Cargo(Vec<RawCargoLine>),
    None,
}

/// Field tokens the assignment grammar recognizes, post snake-casing.
pub const KNOWN_FIELDS: &[&str] = &[
    "title",
    "story",
    "video",
    "video_link",
    "media",
    "additional_media_links",
    "victims",
    "guests",
    "assists",
    "air_or_ground",
    "engagement",
    "type_of_piracy",
    "style",
    "piracy_style",
    "timestamp",
    "date",
    "patch",
    "fleet",
    "fleet_activity",
    "total_value",
    "total_scu",
    "total_cut_value",
    "total_cut_scu",
    "cargo",
];

/// Classifies a message: list instruction first, then known-field
/// assignments, then a cargo manifest. Never fails on malformed input.
pub fn classify(text: &str) -> Parsed {
    if let Some(instruction) = parse_list_instruction(text) {
        return Parsed::ListOp(instruction);
    }
    let assignments = known_assignments(text);
    if !assignments.is_empty() {
        return Parsed::Assignment(assignments);
    }
    let cargo = parse_cargo_lines(text);
    if !cargo.is_empty() {
        return Parsed::Cargo(cargo);
    }
    Parsed::None
}

// ---------------------------------------------------------------------------
// Cargo parsing

static THOUSANDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d),(\d)").expect("regex"));
static NAME_COLON_QTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([a-z][a-z0-9 .'\-]*?)\s*:\s*(\d+(?:\.\d+)?)\s*(?:scu)?\s*(?:@\s*(\d+(?:\.\d+)?))?$")
        .expect("regex")
});
static QTY_OF_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*(?:scu|units?|boxes?)\s+of\s+([a-z][a-z0-9 .'\-]*)$")
        .expect("regex")
});
static NAME_QTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([a-z][a-z0-9 .'\-]*?)\s+(\d+(?:\.\d+)?)\s*(?:scu)?\s*(?:@\s*(\d+(?:\.\d+)?))?$")
        .expect("regex")
});
static NAME_X_QTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([a-z][a-z0-9 .'\-]*?)\s*x\s*(\d+(?:\.\d+)?)$").expect("regex")
});
static FREE_QTY_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:scu|units?|boxes?)\s+(?:of\s+)?([a-z][a-z0-9 .'\-]{2,40})")
        .expect("regex")
});
static FREE_NAME_QTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([a-z][a-z0-9 .'\-]{2,40}?)\s+(\d+(?:\.\d+)?)\s*(?:scu|units?)")
        .expect("regex")
});

/// Parses a cargo manifest: structured grammars per segment first, then a
/// freeform dual-grammar scan bounded by clause punctuation.
pub fn parse_cargo_lines(text: &str) -> Vec<RawCargoLine> {
    let flat = THOUSANDS.replace_all(text, "$1$2");
    let mut lines = Vec::new();
    for segment in flat.split(['\n', ';', ',']) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if let Some(line) = parse_structured_segment(segment) {
            lines.push(line);
        }
    }
    if !lines.is_empty() {
        return lines;
    }
    parse_freeform(&flat)
}

fn parse_structured_segment(segment: &str) -> Option<RawCargoLine> {
    if let Some(caps) = NAME_COLON_QTY.captures(segment) {
        let name = clean_commodity_name(&caps[1])?;
        return Some(RawCargoLine {
            name,
            qty: parse_amount(&caps[2])?,
            price: caps.get(3).and_then(|m| parse_amount(m.as_str())),
        });
    }
    if let Some(caps) = QTY_OF_NAME.captures(segment) {
        let name = clean_commodity_name(&caps[2])?;
        return Some(RawCargoLine {
            name,
            qty: parse_amount(&caps[1])?,
            price: None,
        });
    }
    if let Some(caps) = NAME_X_QTY.captures(segment) {
        let name = clean_commodity_name(&caps[1])?;
        return Some(RawCargoLine {
            name,
            qty: parse_amount(&caps[2])?,
            price: None,
        });
    }
    if let Some(caps) = NAME_QTY.captures(segment) {
        let name = clean_commodity_name(&caps[1])?;
        return Some(RawCargoLine {
            name,
            qty: parse_amount(&caps[2])?,
            price: caps.get(3).and_then(|m| parse_amount(m.as_str())),
        });
    }
    None
}

fn parse_freeform(text: &str) -> Vec<RawCargoLine> {
    let mut lines: Vec<RawCargoLine> = Vec::new();
    let mut seen: Vec<(usize, String)> = Vec::new();
    for clause in text.split(['.', ';', ',', '!', '?', '\n']) {
        let mut taken: Vec<(usize, usize)> = Vec::new();
        for caps in FREE_QTY_NAME.captures_iter(clause) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            // Name follows the quantity, so junk words trail it.
            let Some(name) = plausible_prefix(&caps[2]) else {
                continue;
            };
            let Some(qty) = parse_amount(&caps[1]) else {
                continue;
            };
            push_freeform_line(&mut lines, &mut seen, &mut taken, whole.start(), whole.end(), name, qty);
        }
        for caps in FREE_NAME_QTY.captures_iter(clause) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if taken
                .iter()
                .any(|(start, end)| whole.start() < *end && whole.end() > *start)
            {
                continue;
            }
            // Name precedes the quantity, so junk words lead it.
            let Some(name) = plausible_suffix(&caps[1]) else {
                continue;
            };
            let Some(qty) = parse_amount(&caps[2]) else {
                continue;
            };
            push_freeform_line(&mut lines, &mut seen, &mut taken, whole.start(), whole.end(), name, qty);
        }
    }
    lines
}

fn push_freeform_line(
    lines: &mut Vec<RawCargoLine>,
    seen: &mut Vec<(usize, String)>,
    taken: &mut Vec<(usize, usize)>,
    start: usize,
    end: usize,
    name: String,
    qty: f64,
) {
    let canon = canonicalize(&name);
    if seen.iter().any(|(pos, prior)| *pos == start && *prior == canon) {
        return;
    }
    seen.push((start, canon));
    taken.push((start, end));
    lines.push(RawCargoLine {
        name,
        qty,
        price: None,
    });
}

/// Plausibility filter for commodity-name candidates: strips leading filler,
/// rejects pronouns, action verbs and SCU-only fragments.
pub fn clean_commodity_name(raw: &str) -> Option<String> {
    const LEADING_FILLER: &[&str] = &["the", "a", "an", "some", "of", "about"];
    const REJECT_TOKENS: &[&str] = &[
        "i", "we", "me", "they", "he", "she", "it", "you", "us", "them", "took", "stole",
        "grabbed", "sold", "robbed", "hit", "got", "have", "had", "was", "were", "is", "are",
        "and", "then", "also", "scu", "cargo", "total", "worth", "off", "from", "for", "with",
        "at", "on", "to", "in", "into",
    ];
    let trimmed = raw.trim().trim_matches(|ch: char| ch.is_ascii_punctuation());
    let mut tokens: Vec<&str> = trimmed.split_whitespace().collect();
    while let Some(first) = tokens.first() {
        if LEADING_FILLER.contains(&first.to_lowercase().as_str()) {
            tokens.remove(0);
        } else {
            break;
        }
    }
    if tokens.is_empty() {
        return None;
    }
    if tokens
        .iter()
        .any(|token| REJECT_TOKENS.contains(&token.to_lowercase().as_str()))
    {
        return None;
    }
    let name = tokens.join(" ");
    let canon = canonicalize(&name);
    if canon.len() < 3 || canon.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    Some(name)
}

/// Longest plausible leading token run of a freeform name capture.
fn plausible_prefix(raw: &str) -> Option<String> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    for end in (1..=tokens.len()).rev() {
        if let Some(name) = clean_commodity_name(&tokens[..end].join(" ")) {
            return Some(name);
        }
    }
    None
}

/// Longest plausible trailing token run of a freeform name capture.
fn plausible_suffix(raw: &str) -> Option<String> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    for start in 0..tokens.len() {
        if let Some(name) = clean_commodity_name(&tokens[start..].join(" ")) {
            return Some(name);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Assignment parsing

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([a-z][a-z0-9 _]{0,30}?)\s*[:=]\s*(.+)$").expect("regex")
});

/// Splits `field = value` / `field: value` pairs across lines and
/// semicolons; field tokens are lower-snake-cased.
pub fn parse_assignments(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for segment in text.split(['\n', ';']) {
        if let Some(caps) = ASSIGNMENT.captures(segment) {
            let field = snake_case_field(&caps[1]);
            let value = caps[2].trim().to_string();
            if !field.is_empty() && !value.is_empty() {
                pairs.push((field, value));
            }
        }
    }
    pairs
}

/// Assignment pairs restricted to the recognized field vocabulary.
pub fn known_assignments(text: &str) -> Vec<(String, String)> {
    parse_assignments(text)
        .into_iter()
        .filter(|(field, _)| KNOWN_FIELDS.contains(&field.as_str()))
        .collect()
}

fn snake_case_field(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

// ---------------------------------------------------------------------------
// List-operation inference

static LIST_ADD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:please\s+)?(?:add|include|plus)\s+(.+?)\s+(?:to|into|in)\s+(?:the\s+)?(assists?|victims?|guests?)\b")
        .expect("regex")
});
static LIST_REMOVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:please\s+)?(?:remove|drop|exclude|delete)\s+(.+?)\s+from\s+(?:the\s+)?(assists?|victims?|guests?)\b")
        .expect("regex")
});
static LIST_SET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:please\s+)?set\s+(?:the\s+)?(assists?|victims?|guests?)\s+(?:to|=|:)\s*(.+)$")
        .expect("regex")
});
static LIST_CLEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:please\s+)?(?:clear|reset|empty)\s+(?:the\s+)?(assists?|victims?|guests?)\b")
        .expect("regex")
});

/// Detects add/remove/set/clear vocabulary around a named list.
pub fn parse_list_instruction(text: &str) -> Option<ListInstruction> {
    let text = text.trim();
    if let Some(caps) = LIST_CLEAR.captures(text) {
        return Some(ListInstruction {
            field: canonical_list_field(&caps[1]),
            op: ListOp::Clear,
            operands: Vec::new(),
        });
    }
    if let Some(caps) = LIST_REMOVE.captures(text) {
        return Some(ListInstruction {
            field: canonical_list_field(&caps[2]),
            op: ListOp::Remove,
            operands: split_names(&caps[1]),
        });
    }
    if let Some(caps) = LIST_ADD.captures(text) {
        return Some(ListInstruction {
            field: canonical_list_field(&caps[2]),
            op: ListOp::Add,
            operands: split_names(&caps[1]),
        });
    }
    if let Some(caps) = LIST_SET.captures(text) {
        return Some(ListInstruction {
            field: canonical_list_field(&caps[1]),
            op: ListOp::Set,
            operands: split_names(&caps[2]),
        });
    }
    None
}

fn canonical_list_field(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.starts_with("assist") {
        "assists".to_string()
    } else if lower.starts_with("victim") {
        "victims".to_string()
    } else {
        "guests".to_string()
    }
}

// ---------------------------------------------------------------------------
// Participant capture

static PARTICIPANT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)assists?\s+(?:were|was|are|is|:)\s*(.+)",
        r"(?i)assisted\s+by\s+(.+)",
        r"(?i)helped\s+by\s+(.+)",
        r"(?i)rolling\s+with\s+(.+)",
        r"(?i)flying\s+with\s+(.+)",
        r"(?i)crew\s*(?:was|were|:)?\s+(.+)",
        r"(?i)\bplus\s+(.+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("regex"))
    .collect()
});

static MENTION_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<@!?(\d+)>$").expect("regex"));

/// Extracts candidate participant names from natural phrasing, stop-word
/// filtered. Returns an empty list when no pattern matches.
pub fn capture_participants(text: &str) -> Vec<String> {
    for pattern in PARTICIPANT_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let span = caps[1]
                .split(['.', ';', '!', '?', '\n'])
                .next()
                .unwrap_or("");
            let names = split_names(span);
            if !names.is_empty() {
                return names;
            }
        }
    }
    Vec::new()
}

/// Splits a name span on commas, slashes, ampersands and "and"; cleans each
/// entry and drops stop-words.
pub fn split_names(span: &str) -> Vec<String> {
    const STOP_NAMES: &[&str] = &[
        "me", "myself", "i", "solo", "none", "nobody", "no one", "us", "scu", "crew", "team",
        "the", "everyone",
    ];
    span.split(['/', ',', '&'])
        .flat_map(|chunk| chunk.split(" and "))
        .filter_map(|raw| {
            let cleaned = clean_name(raw);
            if cleaned.is_empty() || STOP_NAMES.contains(&cleaned.to_lowercase().as_str()) {
                None
            } else {
                Some(cleaned)
            }
        })
        .collect()
}

/// Strips decoration from one name token; mention markup collapses to the
/// bare user id.
pub fn clean_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(caps) = MENTION_MARKUP.captures(trimmed) {
        return caps[1].to_string();
    }
    trimmed
        .trim_matches(|ch: char| ch.is_ascii_punctuation() && ch != '_')
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Small shared parsers

/// Parses a numeric amount, tolerating thousands separators and unit
/// suffixes.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw
        .trim()
        .replace(',', "")
        .trim_end_matches(|ch: char| ch.is_ascii_alphabetic())
        .trim()
        .to_string();
    let value: f64 = cleaned.parse().ok()?;
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

pub fn is_skip(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("skip")
}

pub fn is_none_marker(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "none" | "nobody" | "no one" | "nope" | "n/a" | "na" | "-"
    )
}

/// Values that re-enable automatic total derivation.
pub fn is_auto_marker(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "auto" | "automatic" | "none" | "clear" | "default" | ""
    )
}

/// Parses a user-supplied timestamp; the error text is shown verbatim.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M") {
        return Ok(Utc.from_utc_datetime(&parsed));
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = parsed.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    Err(format!(
        "couldn't read '{}' as a timestamp; use RFC3339, YYYY-MM-DD HH:MM or YYYY-MM-DD",
        trimmed
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_colon_grammar_parses_multiple_lines() {
        let lines = parse_cargo_lines("Fluorine: 10, Medical Supplies: 25");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "Fluorine");
        assert_eq!(lines[0].qty, 10.0);
        assert_eq!(lines[1].name, "Medical Supplies");
        assert_eq!(lines[1].qty, 25.0);
    }

    #[test]
    fn explicit_price_is_captured() {
        let lines = parse_cargo_lines("Gold: 12 @ 6400");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].price, Some(6400.0));
    }

    #[test]
    fn qty_of_grammar_parses() {
        let lines = parse_cargo_lines("20 scu of Laranite");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].name, "Laranite");
        assert_eq!(lines[0].qty, 20.0);
    }

    #[test]
    fn name_x_qty_grammar_parses() {
        let lines = parse_cargo_lines("WiDoW x 4");
        assert_eq!(lines, vec![RawCargoLine { name: "WiDoW".to_string(), qty: 4.0, price: None }]);
    }

    #[test]
    fn implausible_names_are_rejected() {
        assert!(parse_cargo_lines("they took 20").is_empty());
        assert!(clean_commodity_name("stole").is_none());
        assert!(clean_commodity_name("scu").is_none());
        assert!(clean_commodity_name("42").is_none());
    }

    #[test]
    fn freeform_fallback_scans_prose() {
        let lines = parse_cargo_lines("we lifted 30 scu of quantainium off them. also grabbed gold 5 scu");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "quantainium");
        assert_eq!(lines[0].qty, 30.0);
        assert_eq!(lines[1].name, "gold");
        assert_eq!(lines[1].qty, 5.0);
    }

    #[test]
    fn freeform_dedups_by_position_and_name() {
        let lines = parse_cargo_lines("dropped off 10 scu of gold");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn thousands_separators_survive_segmentation() {
        let lines = parse_cargo_lines("Gold: 12 @ 6,400");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].price, Some(6400.0));
    }

    #[test]
    fn assignments_split_across_lines_and_semicolons() {
        let pairs = parse_assignments("title = Big Score; patch: 3.24\nVideo Link: https://v.tv/x");
        assert_eq!(
            pairs,
            vec![
                ("title".to_string(), "Big Score".to_string()),
                ("patch".to_string(), "3.24".to_string()),
                ("video_link".to_string(), "https://v.tv/x".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_fields_are_filtered_from_known_assignments() {
        let pairs = known_assignments("Fluorine: 10\ntitle: Payday");
        assert_eq!(pairs, vec![("title".to_string(), "Payday".to_string())]);
    }

    #[test]
    fn list_remove_instruction_parses() {
        let instruction = parse_list_instruction("remove <@111> from assists").expect("parse");
        assert_eq!(instruction.op, ListOp::Remove);
        assert_eq!(instruction.field, "assists");
        assert_eq!(instruction.operands, vec!["111".to_string()]);
    }

    #[test]
    fn list_add_instruction_splits_operands() {
        let instruction = parse_list_instruction("add Bob and Carol to the victims").expect("parse");
        assert_eq!(instruction.op, ListOp::Add);
        assert_eq!(instruction.field, "victims");
        assert_eq!(instruction.operands, vec!["Bob".to_string(), "Carol".to_string()]);
    }

    #[test]
    fn list_set_and_clear_instructions_parse() {
        let set = parse_list_instruction("set victims to Alice, Bob").expect("parse");
        assert_eq!(set.op, ListOp::Set);
        assert_eq!(set.operands.len(), 2);

        let clear = parse_list_instruction("clear the guests").expect("parse");
        assert_eq!(clear.op, ListOp::Clear);
        assert_eq!(clear.field, "guests");
        assert!(clear.operands.is_empty());
    }

    #[test]
    fn participant_capture_filters_stop_words() {
        let names = capture_participants("assists were Dax, me and Rook");
        assert_eq!(names, vec!["Dax".to_string(), "Rook".to_string()]);
    }

    #[test]
    fn participant_capture_stops_at_clause_punctuation() {
        let names = capture_participants("rolling with Vex and Juno. great haul");
        assert_eq!(names, vec!["Vex".to_string(), "Juno".to_string()]);
    }

    #[test]
    fn classify_prefers_list_ops_over_cargo() {
        match classify("add Bob to assists") {
            Parsed::ListOp(instruction) => assert_eq!(instruction.op, ListOp::Add),
            other => panic!("unexpected classification: {:?}", other),
        }
        match classify("Fluorine: 10") {
            Parsed::Cargo(lines) => assert_eq!(lines.len(), 1),
            other => panic!("unexpected classification: {:?}", other),
        }
        assert_eq!(classify("what a day"), Parsed::None);
    }

    #[test]
    fn timestamp_formats_parse_and_errors_describe() {
        assert!(parse_timestamp("2026-07-01T20:00:00Z").is_ok());
        assert!(parse_timestamp("2026-07-01 20:00").is_ok());
        assert!(parse_timestamp("2026-07-01").is_ok());
        let err = parse_timestamp("next tuesday").expect_err("reject");
        assert!(err.contains("next tuesday"));
    }

    #[test]
    fn auto_marker_recognizes_reset_vocabulary() {
        assert!(is_auto_marker("auto"));
        assert!(is_auto_marker("clear"));
        assert!(!is_auto_marker("12000"));
    }
}
