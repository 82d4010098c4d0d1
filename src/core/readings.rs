//! Measurement parsing
//!
//! Operators paste mass readings as free text ("99.41, 99.52, 99.47"). The
//! parser keeps every token that is a finite number, in order, left-packed
//! into a fixed set of ten slots. Nothing here fails: bad tokens and the
//! overflow past ten values are reported back instead.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of reading slots per calibration point
pub const READING_SLOTS: usize = 10;

/// Fixed-size reading storage; empty slots are `None`
pub type Readings = [Option<f64>; READING_SLOTS];

/// An empty set of readings
pub const EMPTY_READINGS: Readings = [None; READING_SLOTS];

/// Token separators accepted by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiters {
    /// Commas only
    #[default]
    Comma,
    /// Commas and any whitespace
    CommaOrWhitespace,
}

/// Result of parsing a block of operator text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReadings {
    /// Valid values, left-packed
    pub slots: Readings,

    /// Non-empty tokens that were not finite numbers
    pub rejected: Vec<String>,

    /// Valid values dropped because all slots were already filled
    pub truncated: usize,
}

impl ParsedReadings {
    /// Number of filled slots
    pub fn valid_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Filled slot values in order
    pub fn values(&self) -> Vec<f64> {
        self.slots.iter().flatten().copied().collect()
    }

    /// True when every non-empty token ended up in a slot
    pub fn is_lossless(&self) -> bool {
        self.rejected.is_empty() && self.truncated == 0
    }
}

/// Parse comma-separated readings
pub fn parse(text: &str) -> ParsedReadings {
    parse_with(text, Delimiters::Comma)
}

/// Parse readings using the given separators
pub fn parse_with(text: &str, delimiters: Delimiters) -> ParsedReadings {
    let mut slots = EMPTY_READINGS;
    let mut rejected = Vec::new();
    let mut truncated = 0;
    let mut filled = 0;

    for token in tokens(text, delimiters) {
        match parse_value(token) {
            Some(value) if filled < READING_SLOTS => {
                slots[filled] = Some(value);
                filled += 1;
            }
            Some(_) => truncated += 1,
            None => rejected.push(token.to_string()),
        }
    }

    ParsedReadings {
        slots,
        rejected,
        truncated,
    }
}

/// Split text into trimmed, non-empty tokens
pub fn tokens(text: &str, delimiters: Delimiters) -> impl Iterator<Item = &str> {
    text.split(move |c: char| match delimiters {
        Delimiters::Comma => c == ',',
        Delimiters::CommaOrWhitespace => c == ',' || c.is_whitespace(),
    })
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

/// Parse one token, accepting only finite numbers
pub fn parse_value(token: &str) -> Option<f64> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Whether the text ends with a separator (ignoring trailing whitespace)
pub fn ends_with_separator(text: &str) -> bool {
    text.trim_end().ends_with(',')
}

/// Render filled slots back to the comma-separated form
pub fn to_text(readings: &Readings) -> String {
    readings
        .iter()
        .flatten()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Count of valid readings in a slot array
pub fn valid_count(readings: &Readings) -> usize {
    readings.iter().filter(|r| r.is_some()).count()
}

/// Serde adapter storing readings as a short YAML sequence
///
/// Trailing empty slots are trimmed on write. On read, either a sequence
/// (with `null` for holes) or a comma-separated string is accepted; anything
/// beyond ten values is dropped with a warning.
pub mod serde_slots {
    use super::*;

    pub fn serialize<S>(readings: &Readings, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = readings
            .iter()
            .rposition(|r| r.is_some())
            .map(|i| i + 1)
            .unwrap_or(0);
        readings[..len].serialize(serializer)
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawReadings {
        Text(String),
        List(Vec<Option<f64>>),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Readings, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<RawReadings>::deserialize(deserializer)?;
        let readings = match raw {
            None => EMPTY_READINGS,
            Some(RawReadings::Text(text)) => {
                let parsed = parse(&text);
                if !parsed.is_lossless() {
                    tracing::warn!(
                        rejected = ?parsed.rejected,
                        truncated = parsed.truncated,
                        "readings text in file was not fully usable"
                    );
                }
                parsed.slots
            }
            Some(RawReadings::List(values)) => {
                if values.len() > READING_SLOTS {
                    tracing::warn!(
                        count = values.len(),
                        "more than {} readings in file, extra values ignored",
                        READING_SLOTS
                    );
                }
                let mut slots = EMPTY_READINGS;
                for (slot, value) in slots.iter_mut().zip(values) {
                    *slot = value.filter(|v| v.is_finite());
                }
                slots
            }
        };
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drops_non_numeric_and_keeps_order() {
        let parsed = parse("1.0, 2.0, abc, 3.0");
        assert_eq!(parsed.slots[0], Some(1.0));
        assert_eq!(parsed.slots[1], Some(2.0));
        assert_eq!(parsed.slots[2], Some(3.0));
        assert!(parsed.slots[3..].iter().all(|s| s.is_none()));
        assert_eq!(parsed.rejected, vec!["abc".to_string()]);
        assert_eq!(parsed.truncated, 0);
    }

    #[test]
    fn test_parse_truncates_after_ten_values() {
        let text = (1..=13).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
        let parsed = parse(&text);
        assert_eq!(parsed.valid_count(), READING_SLOTS);
        assert_eq!(parsed.slots[9], Some(10.0));
        assert_eq!(parsed.truncated, 3);
        assert!(!parsed.is_lossless());
    }

    #[test]
    fn test_parse_empty_and_blank_tokens() {
        let parsed = parse(" , ,, ");
        assert_eq!(parsed.valid_count(), 0);
        assert!(parsed.rejected.is_empty());
        assert!(parsed.is_lossless());
    }

    #[test]
    fn test_parse_rejects_non_finite() {
        let parsed = parse("inf, NaN, 5");
        assert_eq!(parsed.values(), vec![5.0]);
        assert_eq!(parsed.rejected.len(), 2);
    }

    #[test]
    fn test_parse_with_whitespace() {
        let parsed = parse_with("99.1 99.2\n99.3,99.4", Delimiters::CommaOrWhitespace);
        assert_eq!(parsed.values(), vec![99.1, 99.2, 99.3, 99.4]);

        // Comma-only mode treats "99.1 99.2" as one bad token
        let parsed = parse("99.1 99.2, 99.3");
        assert_eq!(parsed.values(), vec![99.3]);
        assert_eq!(parsed.rejected.len(), 1);
    }

    #[test]
    fn test_ends_with_separator() {
        assert!(ends_with_separator("1, 2, 3,"));
        assert!(ends_with_separator("1, 2, 3,  "));
        assert!(!ends_with_separator("1, 2, 3"));
    }

    #[test]
    fn test_to_text() {
        let parsed = parse("99.4, 99.5");
        assert_eq!(to_text(&parsed.slots), "99.4, 99.5");
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "serde_slots", default = "empty")]
        readings: Readings,
    }

    fn empty() -> Readings {
        EMPTY_READINGS
    }

    #[test]
    fn test_serde_slots_trims_trailing_empties() {
        let mut readings = EMPTY_READINGS;
        readings[0] = Some(99.4);
        readings[1] = Some(99.5);
        let yaml = serde_yml::to_string(&Holder { readings }).unwrap();
        let back: Holder = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(back.readings, readings);
        assert!(!yaml.contains("null"));
    }

    #[test]
    fn test_serde_slots_accepts_text() {
        let back: Holder = serde_yml::from_str("readings: \"99.4, 99.5, x\"").unwrap();
        assert_eq!(back.readings[0], Some(99.4));
        assert_eq!(back.readings[1], Some(99.5));
        assert_eq!(back.readings[2], None);
    }

    #[test]
    fn test_serde_slots_accepts_missing_field() {
        let back: Holder = serde_yml::from_str("{}").unwrap();
        assert_eq!(back.readings, EMPTY_READINGS);
    }
}
