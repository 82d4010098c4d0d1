//! Auto-fill engine
//!
//! Two helpers that save the operator from typing every reading:
//!
//! - **Completion** (monochannel pipettes, burettes): after five readings and a
//!   trailing comma, five more plausible values are synthesized around them.
//! - **Propagation** (multichannel pipettes): readings typed for channel 1 are
//!   copied to the same position of every other channel with a small jitter.
//!
//! All randomness comes from one [`StdRng`] so a fixed seed reproduces a
//! session exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::readings::{self, ParsedReadings};
use crate::core::stats::round2;

/// Tunable bounds of the auto-fill engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutofillConfig {
    /// Master switch; a draft can also opt out with `automation: false`
    pub enabled: bool,

    /// Number of typed readings that triggers completion
    pub completion_trigger: usize,

    /// Number of readings synthesized by completion
    pub completion_count: usize,

    /// Relative spread of completed values (0.03 = ±3 % of the source value)
    pub completion_spread: f64,

    /// Attempts per synthesized value before giving up on it
    pub max_attempts: u32,

    /// Absolute spread (mg) of propagated values
    pub channel_spread: f64,

    /// Values above this use a spread proportional to the value
    pub large_value_threshold: f64,

    /// Divisor of the proportional spread: `spread × value / divisor`
    pub large_value_divisor: f64,

    /// Fixed RNG seed; OS entropy when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for AutofillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            completion_trigger: 5,
            completion_count: 5,
            completion_spread: 0.03,
            max_attempts: 50,
            channel_spread: 0.15,
            large_value_threshold: 100.0,
            large_value_divisor: 200.0,
            seed: None,
        }
    }
}

/// Transient message describing what the engine did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Completion,
    Propagation,
}

impl Notice {
    pub fn completion(generated: usize) -> Self {
        Self {
            kind: NoticeKind::Completion,
            message: format!(
                "Generated {} remaining reading(s) from the values entered",
                generated
            ),
        }
    }

    pub fn propagation(channels: usize) -> Self {
        Self {
            kind: NoticeKind::Propagation,
            message: format!(
                "Filled {} other channel(s) with values close to channel 1",
                channels
            ),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Seedable auto-fill engine
pub struct Autofill {
    config: AutofillConfig,
    rng: StdRng,
}

impl Autofill {
    /// Create an engine, seeding from the config or from the OS
    pub fn new(config: AutofillConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }

    /// Create an engine with default bounds and a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(AutofillConfig {
            seed: Some(seed),
            ..AutofillConfig::default()
        })
    }

    pub fn config(&self) -> &AutofillConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Whether typed text should trigger monochannel completion
    ///
    /// The text must hold exactly `completion_trigger` tokens, all of them
    /// valid, and end with a comma.
    pub fn wants_completion(&self, text: &str, parsed: &ParsedReadings) -> bool {
        self.config.enabled
            && readings::ends_with_separator(text)
            && parsed.rejected.is_empty()
            && parsed.valid_count() == self.config.completion_trigger
    }

    /// Synthesize values close to `originals`
    ///
    /// Each candidate is one original value offset by a uniform amount within
    /// `completion_spread` of its magnitude, rounded to two decimals. Duplicates
    /// and non-positive candidates are redrawn; a candidate still invalid after
    /// `max_attempts` draws is skipped, so fewer values may come back.
    pub fn complete(&mut self, originals: &[f64]) -> Vec<f64> {
        let wanted = self.config.completion_count;
        let mut generated: Vec<f64> = Vec::with_capacity(wanted);
        if originals.is_empty() || wanted == 0 {
            return generated;
        }

        let per_value = wanted.div_ceil(originals.len());
        'outer: for &value in originals {
            for _ in 0..per_value {
                if generated.len() >= wanted {
                    break 'outer;
                }
                let bound = self.config.completion_spread * value.abs();
                let mut accepted = None;
                for _ in 0..self.config.max_attempts.max(1) {
                    let candidate = round2(value + self.jitter(bound));
                    let duplicate =
                        originals.contains(&candidate) || generated.contains(&candidate);
                    if candidate > 0.0 && !duplicate {
                        accepted = Some(candidate);
                        break;
                    }
                }
                match accepted {
                    Some(candidate) => generated.push(candidate),
                    None => tracing::debug!(value, "no distinct completion value found"),
                }
            }
        }

        generated
    }

    /// Produce a value close to a master reading token
    ///
    /// Keeps the number of decimals written in the token (one when it has
    /// none) and never goes below zero. Returns `None` for tokens that are not
    /// numbers.
    pub fn near_value(&mut self, token: &str) -> Option<f64> {
        let value = readings::parse_value(token)?;
        let bound = if value > self.config.large_value_threshold {
            self.config.channel_spread * (value / self.config.large_value_divisor)
        } else {
            self.config.channel_spread
        };
        let jittered = (value + self.jitter(bound)).max(0.0);
        Some(round_to(jittered, decimals_of(token)))
    }

    /// Uniform offset in `[-bound, bound)`
    fn jitter(&mut self, bound: f64) -> f64 {
        if !(bound.is_finite() && bound > 0.0) {
            return 0.0;
        }
        (self.rng.random::<f64>() - 0.5) * 2.0 * bound
    }
}

/// Decimal places written in a numeric token, one when there is no point
pub fn decimals_of(token: &str) -> usize {
    token
        .trim()
        .split_once('.')
        .map(|(_, frac)| frac.chars().take_while(|c| c.is_ascii_digit()).count())
        .unwrap_or(1)
        .min(6)
}

/// Round to a number of decimal places
pub fn round_to(value: f64, decimals: usize) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::readings::parse;

    #[test]
    fn test_completion_trigger() {
        let engine = Autofill::seeded(1);
        let text = "99.4, 99.5, 99.6, 99.3, 99.5,";
        assert!(engine.wants_completion(text, &parse(text)));

        // Missing trailing comma
        let text = "99.4, 99.5, 99.6, 99.3, 99.5";
        assert!(!engine.wants_completion(text, &parse(text)));

        // Four values
        let text = "99.4, 99.5, 99.6, 99.3,";
        assert!(!engine.wants_completion(text, &parse(text)));

        // Bad token among five
        let text = "99.4, 99.5, x, 99.3, 99.5,";
        assert!(!engine.wants_completion(text, &parse(text)));
    }

    #[test]
    fn test_completion_disabled() {
        let engine = Autofill::new(AutofillConfig {
            enabled: false,
            seed: Some(3),
            ..AutofillConfig::default()
        });
        let text = "1, 2, 3, 4, 5,";
        assert!(!engine.wants_completion(text, &parse(text)));
    }

    #[test]
    fn test_completion_values_stay_in_bounds() {
        let originals = [99.41, 99.52, 99.47, 99.50, 99.44];
        let mut engine = Autofill::seeded(42);
        let generated = engine.complete(&originals);
        assert_eq!(generated.len(), 5);
        for (g, o) in generated.iter().zip(originals.iter()) {
            assert!((g - o).abs() <= 0.03 * o + 0.005, "{} too far from {}", g, o);
            assert!(*g > 0.0);
            assert!(!originals.contains(g));
        }
        let mut unique = generated.clone();
        unique.sort_by(|a, b| a.partial_cmp(b).unwrap());
        unique.dedup();
        assert_eq!(unique.len(), generated.len());
    }

    #[test]
    fn test_completion_is_deterministic_for_a_seed() {
        let originals = [10.0, 10.1, 10.2, 10.3, 10.4];
        let a = Autofill::seeded(7).complete(&originals);
        let b = Autofill::seeded(7).complete(&originals);
        assert_eq!(a, b);
    }

    #[test]
    fn test_completion_skips_impossible_candidates() {
        // Zero spread can only reproduce the originals, which are duplicates
        let mut engine = Autofill::new(AutofillConfig {
            completion_spread: 0.0,
            max_attempts: 5,
            seed: Some(1),
            ..AutofillConfig::default()
        });
        assert!(engine.complete(&[1.0, 2.0, 3.0, 4.0, 5.0]).is_empty());
    }

    #[test]
    fn test_near_value_small_values() {
        let mut engine = Autofill::seeded(9);
        for _ in 0..100 {
            let v = engine.near_value("10.25").unwrap();
            assert!((v - 10.25).abs() <= 0.15 + 1e-9);
            // Two decimals kept
            assert!((v * 100.0 - (v * 100.0).round()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_near_value_large_values_scale() {
        let mut engine = Autofill::seeded(11);
        for _ in 0..100 {
            let v = engine.near_value("400.0").unwrap();
            // 0.15 * 400 / 200 = 0.3
            assert!((v - 400.0).abs() <= 0.3 + 0.05 + 1e-9);
        }
    }

    #[test]
    fn test_near_value_never_negative() {
        let mut engine = Autofill::seeded(5);
        for _ in 0..100 {
            assert!(engine.near_value("0.05").unwrap() >= 0.0);
        }
    }

    #[test]
    fn test_near_value_rejects_text() {
        let mut engine = Autofill::seeded(5);
        assert_eq!(engine.near_value("abc"), None);
    }

    #[test]
    fn test_decimals_of() {
        assert_eq!(decimals_of("99.412"), 3);
        assert_eq!(decimals_of("99"), 1);
        assert_eq!(decimals_of("5.0"), 1);
        assert_eq!(decimals_of(" 7.25 "), 2);
    }
}
