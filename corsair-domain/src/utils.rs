use chrono::Utc;
use rand::Rng;

/// Maximum reply length accepted by the chat platform.
pub const MAX_REPLY_CHARS: usize = 2000;

pub fn current_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Mints a hit id: current-time-based with a bounded random suffix to keep
/// collision probability low.
pub fn mint_hit_id() -> i64 {
    let suffix = rand::thread_rng().gen_range(0..1000);
    current_millis() * 1000 + suffix
}

/// Rounds to the nearest integer (used for total_value).
pub fn round0(value: f64) -> f64 {
    value.round()
}

/// Rounds to two decimals (used for total_scu).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Truncates a reply on a char boundary, appending an ellipsis when cut.
pub fn truncate_reply(reply: String) -> String {
    if reply.chars().count() <= MAX_REPLY_CHARS {
        return reply;
    }
    let mut out: String = reply.chars().take(MAX_REPLY_CHARS - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_ids_are_time_ordered_and_distinct_enough() {
        let a = mint_hit_id();
        let b = mint_hit_id();
        assert!(a / 1000 <= b / 1000);
        assert!(a > 1_600_000_000_000_000);
    }

    #[test]
    fn rounding_matches_reporting_rules() {
        assert_eq!(round0(65924.6), 65925.0);
        assert_eq!(round2(10.126), 10.13);
        assert_eq!(round2(35.0), 35.0);
    }

    #[test]
    fn long_replies_are_cut_on_a_char_boundary() {
        let reply = "é".repeat(3000);
        let cut = truncate_reply(reply);
        assert_eq!(cut.chars().count(), MAX_REPLY_CHARS);
        assert!(cut.ends_with('…'));
    }
}
