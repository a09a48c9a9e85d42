//! Canonical target identifiers
//!
//! Catalogue ids arrive in many spellings (`KIC 7584294`, `kic007584294`,
//! `7584294`, `KIC-007584294`). Every path into the checkpoint store and the
//! record sink goes through [`CanonicalId::parse`] so one logical target has
//! exactly one key.

use crate::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Zero-padded width of KIC and EPIC numbers
const PADDED_DIGITS: usize = 9;

/// Catalogues with a numeric identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Catalogue {
    Kic,
    Epic,
    Tic,
}

impl Catalogue {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_uppercase().as_str() {
            "KIC" | "KPLR" => Some(Catalogue::Kic),
            "EPIC" => Some(Catalogue::Epic),
            "TIC" => Some(Catalogue::Tic),
            _ => None,
        }
    }

    fn format(self, digits: &str) -> String {
        let trimmed = digits.trim_start_matches('0');
        let number = if trimmed.is_empty() { "0" } else { trimmed };
        match self {
            Catalogue::Kic => format!("KIC {:0>width$}", number, width = PADDED_DIGITS),
            Catalogue::Epic => format!("EPIC {:0>width$}", number, width = PADDED_DIGITS),
            Catalogue::Tic => format!("TIC {}", number),
        }
    }
}

/// The single normalized textual form of a target identifier.
///
/// Deserialization goes through [`CanonicalId::parse`], so ids read back from
/// the checkpoint, the journal, records and worker replies are canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalId(String);

impl CanonicalId {
    /// Normalize a raw identifier.
    ///
    /// Bare digits are taken as KIC numbers. Names outside the known
    /// catalogues keep their spelling with whitespace runs collapsed.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return Err(StorageError::InvalidId(raw.to_string()));
        }

        let split = collapsed
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(collapsed.len());
        let (head, digits) = collapsed.split_at(split);
        let prefix = head.trim_end_matches(|c: char| c == ' ' || c == '-' || c == '_' || c == ':');

        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            if prefix.is_empty() {
                return Ok(Self(Catalogue::Kic.format(digits)));
            }
            if let Some(catalogue) = Catalogue::from_prefix(prefix) {
                return Ok(Self(catalogue.format(digits)));
            }
        }
        Ok(Self(collapsed))
    }

    /// Canonical text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-system safe form: every character outside `[A-Za-z0-9.-]` becomes `_`
    pub fn slug(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl FromStr for CanonicalId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CanonicalId {
    type Error = StorageError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<CanonicalId> for String {
    fn from(id: CanonicalId) -> Self {
        id.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
