//! URL query parameters for list endpoints
//!
//! List handlers read five optional parameters from the query string:
//! `items_per_page`, `page`, `keyword`, `start_date` and `end_date`.
//! Decoding is tolerant: unknown keys are ignored, repeated keys keep the
//! first value, and empty values count as absent. Validation is a separate
//! step so handlers decide whether to reject bad input.
//!
//! # Example
//!
//! ```
//! use restkit_server::query::{QueryParameters, QueryRules};
//!
//! let params = QueryParameters::from_query_str("page=2&keyword=abc");
//! assert!(params.validate(&QueryRules::default()).is_ok());
//! assert_eq!(params.page.as_deref(), Some("2"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;

pub const ITEMS_PER_PAGE: &str = "items_per_page";
pub const PAGE: &str = "page";
pub const KEYWORD: &str = "keyword";
pub const START_DATE: &str = "start_date";
pub const END_DATE: &str = "end_date";

/// Pattern keywords must match unless overridden in configuration
pub const DEFAULT_KEYWORD_PATTERN: &str = r"^[a-zA-Z0-9\s.]+$";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw list parameters as they appeared in the URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryParameters {
    pub items_per_page: Option<String>,
    pub page: Option<String>,
    pub keyword: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl QueryParameters {
    /// Decode a raw query string (without the leading `?`)
    pub fn from_query_str(raw: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(raw.as_bytes()))
    }

    /// Build from already-decoded key/value pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                ITEMS_PER_PAGE => &mut params.items_per_page,
                PAGE => &mut params.page,
                KEYWORD => &mut params.keyword,
                START_DATE => &mut params.start_date,
                END_DATE => &mut params.end_date,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.to_string());
            }
        }
        params
    }

    /// Check every present field against `rules`, collecting all failures
    pub fn validate(&self, rules: &QueryRules) -> Result<(), QueryValidationError> {
        let mut error = QueryValidationError::default();

        if let Some(value) = &self.items_per_page {
            if !is_unsigned(value) {
                error.insert(ITEMS_PER_PAGE, FieldError::NotNumeric);
            }
        }
        if let Some(value) = &self.page {
            if !is_signed(value) {
                error.insert(PAGE, FieldError::NotNumeric);
            }
        }
        if let Some(value) = &self.keyword {
            if !rules.keyword.is_match(value) {
                error.insert(KEYWORD, FieldError::InvalidKeyword);
            }
        }
        if let Some(value) = &self.start_date {
            if parse_date(value).is_none() {
                error.insert(START_DATE, FieldError::InvalidDate);
            }
        }
        if let Some(value) = &self.end_date {
            if parse_date(value).is_none() {
                error.insert(END_DATE, FieldError::InvalidDate);
            }
        }

        if error.is_empty() {
            Ok(())
        } else {
            Err(error)
        }
    }

    /// `start_date` as a calendar date, if present and well formed
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date.as_deref().and_then(parse_date)
    }

    /// `end_date` as a calendar date, if present and well formed
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date.as_deref().and_then(parse_date)
    }
}

/// Decode and validate in one step
pub fn decode(raw: &str, rules: &QueryRules) -> Result<QueryParameters, QueryValidationError> {
    let params = QueryParameters::from_query_str(raw);
    params.validate(rules)?;
    Ok(params)
}

/// Validation rules that vary per deployment
#[derive(Debug, Clone)]
pub struct QueryRules {
    keyword: Regex,
}

impl QueryRules {
    pub fn with_keyword_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            keyword: Regex::new(pattern)?,
        })
    }

    pub fn keyword_pattern(&self) -> &str {
        self.keyword.as_str()
    }
}

impl Default for QueryRules {
    fn default() -> Self {
        Self {
            keyword: Regex::new(DEFAULT_KEYWORD_PATTERN)
                .unwrap_or_else(|_| unreachable!("default keyword pattern is valid")),
        }
    }
}

/// Strict `YYYY-MM-DD`: four digit year, two digit month and day
fn parse_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn is_unsigned(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_signed(value: &str) -> bool {
    is_unsigned(value.strip_prefix(['+', '-']).unwrap_or(value))
}

/// Why a single field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("must be a number")]
    NotNumeric,

    #[error("must contain only letters, digits, spaces and dots")]
    InvalidKeyword,

    #[error("must be a valid date in YYYY-MM-DD format")]
    InvalidDate,
}

impl Serialize for FieldError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Per-field validation failures, serialized as `{ field: message }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Error, Serialize)]
#[serde(transparent)]
pub struct QueryValidationError {
    fields: BTreeMap<&'static str, FieldError>,
}

impl QueryValidationError {
    fn insert(&mut self, field: &'static str, error: FieldError) {
        self.fields.insert(field, error);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<FieldError> {
        self.fields.get(name).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, FieldError)> + '_ {
        self.fields.iter().map(|(k, v)| (*k, *v))
    }
}

impl fmt::Display for QueryValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in &self.fields {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, error)?;
            first = false;
        }
        Ok(())
    }
}
