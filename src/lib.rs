//! # Sanctions Screening Engine
//!
//! A memory-safe engine for screening names against the OFAC SDN Enhanced
//! and UN Consolidated sanctions lists.
//!
//! ## Features
//!
//! - **Hardened ingestion**: streaming XML parsing with no DTD/external
//!   entity resolution, malformation-rate gating, and hash verification
//!   of fetched source lists
//! - **Multi-layer fuzzy matching**: exact document match, high/moderate/
//!   low confidence name scoring, and date-of-birth discrimination
//! - **Adaptive thresholds**: per-script matching behavior for CJK,
//!   Arabic, Cyrillic, and Latin-initials names
//! - **Disposition recommendations**: `AUTO_ESCALATE`, `MANUAL_REVIEW`,
//!   `LOW_CONFIDENCE_REVIEW`, `AUTO_CLEAR`
//! - **Bounded history**: a ring buffer of recent screenings for audit
//!   and variance review
//!
//! ## Alignment with Federal Guidance
//!
//! Implements secure sanctions screening using memory-safe Rust, aligning
//! with OFAC's technical guidance for automated screening programs.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod index;
pub mod ingest_validator;
pub mod log_sanitizer;
pub mod matching;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod validation;
pub mod xml_reader;

pub use config::{Config, ConfigError};
pub use error::{ErrorDetail, IngestError, ScreeningError, ValidationError};
pub use fetcher::{FetchedFile, Fetcher};
pub use index::Index;
pub use ingest_validator::ValidationReport;
pub use matching::MatchingEngine;
pub use model::{
    Confidence, EntityType, MatchResult, Recommendation, SanctionsEntity, ScreeningInput,
    ScreeningResponse, Source, ThresholdsUsed,
};
pub use orchestrator::Engine;
pub use parser::{OfacParser, ParseOutcome, UnParser};
