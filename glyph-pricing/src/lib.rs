use serde::{Deserialize, Serialize};

/// Fallback price used when no peer has published an ask (spec.md §4.D).
pub const FALLBACK_MILLI_GLYPH_PER_1K: u64 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub milli_glyph: u64,
    pub milli_glyph_per_1k: u64,
}

/// The per-1k-token rate is the median of currently known peer asks, or
/// `FALLBACK_MILLI_GLYPH_PER_1K` if no asks are known. Cost is the sum of
/// two independently floored token terms plus a floored wall-time term, in
/// whole seconds (spec.md §4.D).
pub fn quote(input_tokens: u64, output_tokens: u64, wall_time_ms: u64, asks: &[u64]) -> Quote {
    let rate = median_or_fallback(asks);
    let milli_glyph =
        (input_tokens * rate) / 1000 + (output_tokens * rate) / 1000 + wall_time_ms / 1000;
    Quote {
        milli_glyph,
        milli_glyph_per_1k: rate,
    }
}

fn median_or_fallback(asks: &[u64]) -> u64 {
    if asks.is_empty() {
        return FALLBACK_MILLI_GLYPH_PER_1K;
    }
    let mut sorted = asks.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_rate_matches_known_scenario() {
        let q = quote(3, 5, 1500, &[]);
        assert_eq!(q.milli_glyph_per_1k, 100);
        assert_eq!(q.milli_glyph, 1);
    }

    #[test]
    fn zero_wall_time_drops_the_wall_time_term() {
        let q = quote(3, 5, 0, &[]);
        assert_eq!(q.milli_glyph, 0);
    }

    #[test]
    fn token_terms_are_floored_independently() {
        // 7*100/1000 = 0 (floored), not rounded up, and likewise for 7 output tokens.
        let q = quote(7, 7, 0, &[]);
        assert_eq!(q.milli_glyph, 0);
    }

    #[test]
    fn median_of_odd_length_ask_list() {
        assert_eq!(median_or_fallback(&[50, 200, 100]), 100);
    }

    #[test]
    fn median_of_even_length_ask_list() {
        assert_eq!(median_or_fallback(&[50, 150]), 100);
    }

    #[test]
    fn quote_scales_with_token_volume() {
        let small = quote(1, 1, 0, &[1000]);
        let large = quote(10, 10, 0, &[1000]);
        assert!(large.milli_glyph > small.milli_glyph);
    }
}
