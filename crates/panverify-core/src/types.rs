//! Shared types used across panverify.
//!
//! This module defines the record model, the normalized PAN newtype and the
//! small enums that parameterize selection and persistence.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Characters stripped from both ends of an identifier during normalization.
///
/// The store applies the same set on the SQL side when it matches rows by
/// identifier, so both sides must agree on it.
pub const IDENTIFIER_TRIM_CHARS: [char; 4] = [' ', '\t', '\n', '\r'];

/// Message persisted for records whose identifier is blank after normalization.
pub const EMPTY_IDENTIFIER_MESSAGE: &str = "empty identifier";

/// A PAN after normalization: surrounding whitespace trimmed, ASCII uppercased.
///
/// Construction always goes through [`Pan::normalize`], so a `Pan` read at
/// selection time and one rebuilt at persistence time compare equal whenever
/// their raw values differ only in case or padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pan(String);

impl Pan {
    /// Normalize a raw column value. `None` (SQL NULL) becomes the empty PAN.
    #[must_use]
    pub fn normalize(raw: Option<&str>) -> Self {
        let trimmed = raw.unwrap_or_default().trim_matches(&IDENTIFIER_TRIM_CHARS[..]);
        Self(trimmed.to_ascii_uppercase())
    }

    /// Whether nothing is left to verify.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique key of a record row: a surrogate integer id or a text key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    /// Integer surrogate key (e.g. `rowid`)
    Id(i64),
    /// Text key (e.g. the raw PAN column when it is the primary key)
    Text(String),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for RecordKey {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Tri-state validation status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationState {
    /// No attempt has been committed yet
    Unchecked,
    /// The service accepted the identifier
    Valid,
    /// The service rejected it, or the attempt could not complete
    Invalid,
}

impl ValidationState {
    /// Derive the state from the stored columns.
    ///
    /// The message column is the attempted marker; the validity flag only
    /// matters once a message exists.
    #[must_use]
    pub fn from_columns(message: Option<&str>, valid: Option<i64>) -> Self {
        match (message, valid) {
            (None, _) => Self::Unchecked,
            (Some(_), Some(1)) => Self::Valid,
            (Some(_), _) => Self::Invalid,
        }
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchecked => write!(f, "unchecked"),
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// One row of the target table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique row key used for updates
    pub key: RecordKey,
    /// Normalized identifier to verify
    pub identifier: Pan,
    /// Ordering metric such as the payment amount
    pub priority_metric: Option<f64>,
    /// Current validation state
    pub validation_state: ValidationState,
    /// Outcome detail; `None` means unprocessed
    pub validation_message: Option<String>,
    /// Timestamp of the most recent attempt
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Whether the pipeline still has to process this record.
    #[must_use]
    pub fn is_unprocessed(&self) -> bool {
        self.validation_message.is_none()
    }
}

/// Parse a stored `last_checked` value.
///
/// Accepts RFC 3339 (what this crate writes) and the `YYYY-MM-DD HH:MM:SS`
/// layout used by older imports. Anything else yields `None`.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Result of verifying one identifier: validity flag plus descriptive message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// `Some(true)` valid, `Some(false)` invalid, `None` undetermined
    pub is_valid: Option<bool>,
    /// Service description or error summary
    pub message: String,
}

impl VerificationOutcome {
    /// A positive outcome.
    #[must_use]
    pub fn valid(message: impl Into<String>) -> Self {
        Self {
            is_valid: Some(true),
            message: message.into(),
        }
    }

    /// A negative outcome.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: Some(false),
            message: message.into(),
        }
    }

    /// Data-quality outcome for blank identifiers.
    #[must_use]
    pub fn empty_identifier() -> Self {
        Self::invalid(EMPTY_IDENTIFIER_MESSAGE)
    }
}

/// How many candidates one unit of work selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Re-query after every record
    #[default]
    Single,
    /// Select up to the batch limit, process them, then re-query
    Batch,
}

/// Sort direction for candidate ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending (highest priority first)
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword for this direction.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Which rows an outcome is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateScope {
    /// Only the selected row, matched by its unique key
    #[default]
    Key,
    /// Every row whose normalized identifier matches
    Identifier,
}

/// Error returned when parsing one of the selection enums from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

fn parse_err(kind: &'static str, value: &str) -> ParseEnumError {
    ParseEnumError {
        kind,
        value: value.to_string(),
    }
}

impl FromStr for SelectionMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "batch" => Ok(Self::Batch),
            _ => Err(parse_err("selection mode", s)),
        }
    }
}

impl FromStr for SortOrder {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(parse_err("sort order", s)),
        }
    }
}

impl FromStr for UpdateScope {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "key" => Ok(Self::Key),
            "identifier" => Ok(Self::Identifier),
            _ => Err(parse_err("update scope", s)),
        }
    }
}
