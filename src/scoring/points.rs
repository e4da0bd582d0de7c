//! Time-decayed points and answer streak bonus

/// Half-up rounding, matching how the service rounds `.5` for negative
/// values too
pub fn js_round(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Points before streak bonus for a correct answer
///
/// A question without a time budget awards nothing.
pub fn raw_score(reaction_ms: u64, duration_ms: u64, multiplier: f64, points_enabled: bool) -> f64 {
    if !points_enabled || duration_ms == 0 {
        return 0.0;
    }
    let ratio = reaction_ms as f64 / duration_ms as f64;
    js_round((1.0 - ratio / 2.0) * 1000.0) * multiplier
}

/// Bonus for an answer streak, computed on the streak after the answer
pub fn streak_bonus(streak: u32) -> u32 {
    match streak {
        0 | 1 => 0,
        s if s >= 6 => 500,
        s => (s - 1) * 100,
    }
}
