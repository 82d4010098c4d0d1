//! Gravimetric calibration statistics
//!
//! Every reading is converted to a volume individually (mass × factor) and the
//! volume statistics are taken over those converted values. This matches the
//! reference worksheet; `mean_mass × factor` would differ only by rounding
//! order, but the per-reading method is the authoritative one.

use serde::{Deserialize, Serialize};

use crate::core::readings::Readings;

/// Derived results for one calibration point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointStatistics {
    /// Number of valid readings used
    pub reading_count: usize,

    /// Arithmetic mean of the masses (mg)
    pub mean_mass: f64,

    /// Mean of the per-reading converted volumes
    pub mean_volume: f64,

    /// Mean volume minus nominal volume
    pub accuracy_absolute: f64,

    /// Accuracy relative to the nominal volume (%)
    pub accuracy_percent: f64,

    /// Sample standard deviation of the converted volumes (n - 1)
    pub standard_deviation: f64,

    /// Standard deviation relative to the mean volume (%)
    pub coefficient_of_variation: f64,
}

impl PointStatistics {
    /// Copy with every value rounded to two decimal places
    pub fn rounded(&self) -> Self {
        Self {
            reading_count: self.reading_count,
            mean_mass: round2(self.mean_mass),
            mean_volume: round2(self.mean_volume),
            accuracy_absolute: round2(self.accuracy_absolute),
            accuracy_percent: round2(self.accuracy_percent),
            standard_deviation: round2(self.standard_deviation),
            coefficient_of_variation: round2(self.coefficient_of_variation),
        }
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid "-0.00" after rounding tiny negatives
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Compute the statistics of one calibration point
///
/// Returns `None` when there is no valid reading or the nominal volume is
/// missing or not finite.
pub fn compute(
    readings: &Readings,
    nominal_volume: Option<f64>,
    correction_factor: f64,
) -> Option<PointStatistics> {
    let nominal = nominal_volume.filter(|v| v.is_finite())?;
    let masses: Vec<f64> = readings
        .iter()
        .flatten()
        .copied()
        .filter(|m| m.is_finite())
        .collect();
    if masses.is_empty() {
        return None;
    }

    let n = masses.len() as f64;
    let mean_mass = masses.iter().sum::<f64>() / n;

    let volumes: Vec<f64> = masses.iter().map(|m| m * correction_factor).collect();
    let mean_volume = volumes.iter().sum::<f64>() / n;

    let accuracy_absolute = mean_volume - nominal;
    let accuracy_percent = if nominal != 0.0 {
        accuracy_absolute / nominal * 100.0
    } else {
        0.0
    };

    let standard_deviation = sample_std_dev(&volumes, mean_volume);

    let coefficient_of_variation = if mean_volume != 0.0 {
        standard_deviation / mean_volume * 100.0
    } else {
        0.0
    };

    Some(PointStatistics {
        reading_count: masses.len(),
        mean_mass,
        mean_volume,
        accuracy_absolute,
        accuracy_percent,
        standard_deviation,
        coefficient_of_variation,
    })
}

/// Bessel-corrected standard deviation; zero for fewer than two values
pub fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() as f64 - 1.0)).sqrt()
}
