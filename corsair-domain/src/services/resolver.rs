use crate::entities::{PriceEntry, PriceMatch};

/// Candidates scoring below this are rejected outright.
pub const MIN_MATCH_SCORE: f64 = 0.58;

/// Two candidates within this score window count as a tie; the tie goes to
/// the higher sell price.
const TIE_WINDOW: f64 = 0.02;

/// Canonical form for similarity: lowercase, non-alphanumerics stripped.
pub fn canonicalize(name: &str) -> String {
    name.chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Similarity between two free-text names on their canonical forms.
/// Exact match scores 1.0, substring containment either direction 0.92,
/// otherwise `1 - edit_distance / max_len`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let ca = canonicalize(a);
    let cb = canonicalize(b);
    if ca.is_empty() || cb.is_empty() {
        return 0.0;
    }
    if ca == cb {
        return 1.0;
    }
    if ca.contains(&cb) || cb.contains(&ca) {
        return 0.92;
    }
    let distance = strsim::levenshtein(&ca, &cb) as f64;
    let max_len = ca.chars().count().max(cb.chars().count()) as f64;
    1.0 - distance / max_len
}

/// Finds the best-matching priced entry for a free-text commodity name.
pub fn best_price_match(
    name: &str,
    entries: &[PriceEntry],
    min_score: f64,
) -> Option<PriceMatch> {
    let mut candidates: Vec<(f64, &PriceEntry)> = entries
        .iter()
        .filter(|entry| !entry.name.trim().is_empty())
        .map(|entry| (similarity(name, &entry.name), entry))
        .filter(|(score, _)| *score >= min_score)
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let top_score = candidates[0].0;
    let (score, entry) = candidates
        .iter()
        .take_while(|(score, _)| top_score - *score <= TIE_WINDOW)
        .max_by(|a, b| {
            a.1.price_sell
                .partial_cmp(&b.1.price_sell)
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

    Some(PriceMatch {
        price: entry.price_sell,
        location: entry.location.as_deref().map(canonical_location),
        match_name: entry.name.clone(),
        score: *score,
    })
}

/// Prices a parsed manifest against the terminal table. An explicit price on
/// the line always wins over the resolver; lines that resolve to nothing are
/// kept with a note so the user can correct them.
pub fn price_cargo_lines(
    raw: &[crate::services::extractor::RawCargoLine],
    entries: &[PriceEntry],
    min_score: f64,
) -> Vec<crate::entities::CargoLine> {
    raw.iter()
        .map(|line| {
            if let Some(price) = line.price {
                return crate::entities::CargoLine {
                    commodity_name: line.name.clone(),
                    scu_amount: line.qty,
                    avg_price: Some(price),
                    pricing_note: Some("price supplied by reporter".to_string()),
                    pricing_match: None,
                };
            }
            match best_price_match(&line.name, entries, min_score) {
                Some(found) => crate::entities::CargoLine {
                    commodity_name: line.name.clone(),
                    scu_amount: line.qty,
                    avg_price: Some(found.price),
                    pricing_note: found.location.map(|loc| format!("best sell at {}", loc)),
                    pricing_match: Some(found.match_name),
                },
                None => crate::entities::CargoLine {
                    commodity_name: line.name.clone(),
                    scu_amount: line.qty,
                    avg_price: None,
                    pricing_note: Some("no price match found".to_string()),
                    pricing_match: None,
                },
            }
        })
        .collect()
}

/// Canonicalizes place names so known aliases land on one spelling.
pub fn canonical_location(name: &str) -> String {
    let trimmed = name.trim();
    let canon = canonicalize(trimmed);
    for (alias, full) in LOCATION_ALIASES {
        if canon == *alias {
            return (*full).to_string();
        }
    }
    trimmed.to_string()
}

const LOCATION_ALIASES: &[(&str, &str)] = &[
    ("grimhex", "GrimHEX"),
    ("po", "Port Olisar"),
    ("portolisar", "Port Olisar"),
    ("everus", "Everus Harbor"),
    ("everusharbor", "Everus Harbor"),
    ("baijini", "Baijini Point"),
    ("baijinipoint", "Baijini Point"),
    ("portressler", "Port Tressler"),
    ("tressler", "Port Tressler"),
    ("a18", "Area18"),
    ("area18", "Area18"),
    ("nb", "New Babbage"),
    ("newbabbage", "New Babbage"),
    ("loreville", "Lorville"),
    ("lorville", "Lorville"),
    ("orison", "Orison"),
    ("cru", "CRU-L1"),
    ("crul1", "CRU-L1"),
];
