//! Typed error sum types.
//!
//! Every failure surfaces a stable `code`, an optional `field`, a human
//! `message`, and a `suggestion`, instead of being thrown and
//! caught for control flow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The stable, machine-readable shape every failure can be projected into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub field: Option<String>,
    pub message: String,
    pub suggestion: String,
}

/// Input-validation failures. Client-caused, never retried.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("name is shorter than the minimum allowed length")]
    NameTooShort,
    #[error("name exceeds the maximum allowed length")]
    NameTooLong,
    #[error("name contains a blocked character")]
    BlockedCharacters,
    #[error("name contains a control character")]
    ControlCharacter,
    #[error("name does not match the allowed format")]
    InvalidFormat,
    #[error("date_of_birth does not match YYYY[-MM[-DD]]")]
    InvalidDobFormat,
    #[error("document_number exceeds the maximum allowed length")]
    DocumentTooLong,
    #[error("document_number does not match the allowed format")]
    InvalidDocumentFormat,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::NameTooShort => "NAME_TOO_SHORT",
            ValidationError::NameTooLong => "NAME_TOO_LONG",
            ValidationError::BlockedCharacters => "BLOCKED_CHARACTERS",
            ValidationError::ControlCharacter => "CONTROL_CHARACTER",
            ValidationError::InvalidFormat => "INVALID_FORMAT",
            ValidationError::InvalidDobFormat => "INVALID_DOB_FORMAT",
            ValidationError::DocumentTooLong => "DOCUMENT_TOO_LONG",
            ValidationError::InvalidDocumentFormat => "INVALID_DOCUMENT_FORMAT",
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::NameTooShort
            | ValidationError::NameTooLong
            | ValidationError::BlockedCharacters
            | ValidationError::ControlCharacter
            | ValidationError::InvalidFormat => "name",
            ValidationError::InvalidDobFormat => "date_of_birth",
            ValidationError::DocumentTooLong | ValidationError::InvalidDocumentFormat => {
                "document_number"
            }
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            ValidationError::NameTooShort => "provide a longer name",
            ValidationError::NameTooLong => "shorten the name",
            ValidationError::BlockedCharacters => {
                "remove characters from the set <>{}[]|\\;`$"
            }
            ValidationError::ControlCharacter => "remove non-printable characters",
            ValidationError::InvalidFormat => {
                "use letters, spaces, hyphens, periods, apostrophes, or commas only"
            }
            ValidationError::InvalidDobFormat => "use YYYY, YYYY-MM, or YYYY-MM-DD",
            ValidationError::DocumentTooLong => "shorten the document number",
            ValidationError::InvalidDocumentFormat => {
                "use letters, digits, hyphens, spaces, or periods only"
            }
        }
    }

    pub fn to_detail(&self, sanitized_input: &str) -> ErrorDetail {
        ErrorDetail {
            code: self.code(),
            field: Some(self.field().to_string()),
            message: self.to_string(),
            suggestion: format!("{} (offending value: {})", self.suggestion(), sanitized_input),
        }
    }
}

/// Ingestion failures. Environment-caused.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum IngestError {
    #[error("network error fetching {source}: {message}")]
    FetchNet { source: String, message: String },
    #[error("HTTP error fetching {source}: status {status}")]
    FetchHttp { source: String, status: u16 },
    #[error("ZIP extraction failed for {source}: {message}")]
    FetchZip { source: String, message: String },
    #[error("I/O error during fetch of {source}: {message}")]
    FetchIo { source: String, message: String },
    #[error("XML parse error in {source}: {message}")]
    ParseXml { source: String, message: String },
    #[error(
        "post-parse validation aborted for {source}: malformation rate {rate:.2}% exceeds threshold {threshold:.2}%"
    )]
    ValidationAbort {
        source: String,
        rate: f64,
        threshold: f64,
    },
    #[error("XXE attempt blocked while parsing {source}")]
    XxeBlocked { source: String },
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::FetchNet { .. } => "FETCH_NET",
            IngestError::FetchHttp { .. } => "FETCH_HTTP",
            IngestError::FetchZip { .. } => "FETCH_ZIP",
            IngestError::FetchIo { .. } => "FETCH_IO",
            IngestError::ParseXml { .. } => "PARSE_XML",
            IngestError::ValidationAbort { .. } => "VALIDATION_ABORT",
            IngestError::XxeBlocked { .. } => "XXE_BLOCKED",
        }
    }
}

/// Top-level error wrapping both failure domains plus an internal
/// catch-all for truly unexpected panics at the orchestrator's outermost
/// boundary.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ScreeningError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScreeningError {
    pub fn code(&self) -> &'static str {
        match self {
            ScreeningError::Validation(e) => e.code(),
            ScreeningError::Ingest(e) => e.code(),
            ScreeningError::Internal(_) => "INTERNAL",
        }
    }
}
