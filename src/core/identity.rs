//! Draft identifiers: `CAL-<ULID>`

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Prefix of every draft id
pub const PREFIX: &str = "CAL";

/// Unique, time-ordered identifier of a certificate draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DraftId(Ulid);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("missing 'CAL-' prefix in '{0}'")]
    MissingPrefix(String),

    #[error("invalid ULID in '{0}'")]
    InvalidUlid(String),
}

impl DraftId {
    /// Generate a new id
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// File name used for this draft in the drafts directory
    pub fn file_name(&self) -> String {
        format!("{}.calcert.yaml", self)
    }
}

impl Default for DraftId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", PREFIX, self.0)
    }
}

impl FromStr for DraftId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(PREFIX)
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(|| IdParseError::MissingPrefix(s.to_string()))?;
        Ulid::from_string(rest)
            .map(DraftId)
            .map_err(|_| IdParseError::InvalidUlid(s.to_string()))
    }
}

impl Serialize for DraftId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DraftId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let id = DraftId::new();
        let s = id.to_string();
        assert!(s.starts_with("CAL-"));
        assert_eq!(s.len(), 30);
        assert_eq!(s.parse::<DraftId>().unwrap(), id);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "REQ-01J0000000000000000000000".parse::<DraftId>(),
            Err(IdParseError::MissingPrefix(_))
        ));
        assert!(matches!(
            "CAL-notaulid".parse::<DraftId>(),
            Err(IdParseError::InvalidUlid(_))
        ));
    }

    #[test]
    fn test_file_name() {
        let id = DraftId::new();
        assert_eq!(id.file_name(), format!("{}.calcert.yaml", id));
    }
}
