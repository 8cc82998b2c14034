//! Discriminator output to scalar reward.

/// Reward assigned when the discriminator's answer is not a number.
pub const FALLBACK_REWARD: f64 = 0.5;

/// Parse the discriminator's raw text as a reward.
///
/// Surrounding whitespace is ignored. Anything that does not parse as a
/// finite float (`NaN` and `inf` included) scores `FALLBACK_REWARD`.
/// Finite values are returned unclamped.
#[must_use]
pub fn score(raw: &str) -> f64 {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(FALLBACK_REWARD)
}
