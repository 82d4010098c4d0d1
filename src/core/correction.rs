//! Correction factor ("Factor Z") lookup
//!
//! Converts a weighed mass of water (mg) into a volume (µL) at the laboratory
//! temperature. The table covers 15.0 °C to 30.0 °C in 0.5 °C steps; anything
//! outside of it falls back to the 20.0 °C factor.

/// Lowest tabulated temperature (°C)
pub const MIN_TEMPERATURE: f64 = 15.0;

/// Highest tabulated temperature (°C)
pub const MAX_TEMPERATURE: f64 = 30.0;

/// Temperature increment between table entries (°C)
pub const TEMPERATURE_STEP: f64 = 0.5;

/// Reference temperature used when nothing else is known (°C)
pub const DEFAULT_TEMPERATURE: f64 = 20.0;

/// Factor for the reference temperature, also the fallback for unknown input
pub const DEFAULT_FACTOR: f64 = 1.0029;

/// Table keyed by tenths of a degree
const FACTOR_TABLE: [(i64, f64); 31] = [
    (150, 1.0020),
    (155, 1.0020),
    (160, 1.0021),
    (165, 1.0022),
    (170, 1.0023),
    (175, 1.0024),
    (180, 1.0025),
    (185, 1.0026),
    (190, 1.0027),
    (195, 1.0028),
    (200, 1.0029),
    (205, 1.0030),
    (210, 1.0031),
    (215, 1.0032),
    (220, 1.0033),
    (225, 1.0034),
    (230, 1.0035),
    (235, 1.0036),
    (240, 1.0038),
    (245, 1.0039),
    (250, 1.0040),
    (255, 1.0041),
    (260, 1.0043),
    (265, 1.0044),
    (270, 1.0045),
    (275, 1.0047),
    (280, 1.0048),
    (285, 1.0050),
    (290, 1.0051),
    (295, 1.0052),
    (300, 1.0054),
];

/// Look up the correction factor for a temperature
///
/// The temperature is quantized to one decimal place and matched exactly
/// against the table. Values between half-degree steps, out of range, or not
/// finite yield [`DEFAULT_FACTOR`].
pub fn factor_for(temperature: f64) -> f64 {
    if !temperature.is_finite() {
        return DEFAULT_FACTOR;
    }
    let tenths = (temperature * 10.0).round() as i64;
    FACTOR_TABLE
        .iter()
        .find(|(key, _)| *key == tenths)
        .map(|(_, factor)| *factor)
        .unwrap_or(DEFAULT_FACTOR)
}

/// Whether a temperature has an exact table entry
pub fn is_tabulated(temperature: f64) -> bool {
    if !temperature.is_finite() {
        return false;
    }
    let tenths = (temperature * 10.0).round() as i64;
    FACTOR_TABLE.iter().any(|(key, _)| *key == tenths)
}

/// Snap a temperature to the nearest 0.5 °C step
///
/// The result is not clamped to the table: out-of-range temperatures stay
/// where they are and [`factor_for`] answers them with [`DEFAULT_FACTOR`].
/// Non-finite input returns [`DEFAULT_TEMPERATURE`].
pub fn quantize_temperature(value: f64) -> f64 {
    if !value.is_finite() {
        return DEFAULT_TEMPERATURE;
    }
    (value / TEMPERATURE_STEP).round() * TEMPERATURE_STEP
}

/// Move a temperature by `increment`, refusing to leave the table range
///
/// Returns `None` when the result would fall outside
/// [`MIN_TEMPERATURE`]..=[`MAX_TEMPERATURE`].
pub fn step_temperature(current: f64, increment: f64) -> Option<f64> {
    let next = ((current + increment) * 10.0).round() / 10.0;
    if (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&next) {
        Some(next)
    } else {
        None
    }
}

/// Iterate over the whole table as `(temperature, factor)` pairs
pub fn table() -> impl Iterator<Item = (f64, f64)> {
    FACTOR_TABLE
        .iter()
        .map(|(tenths, factor)| (*tenths as f64 / 10.0, *factor))
}
