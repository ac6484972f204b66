//! Unified entity and screening data model.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Source list an entity was ingested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Ofac,
    Un,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Ofac => write!(f, "OFAC"),
            Source::Un => write!(f, "UN"),
        }
    }
}

/// Tag replacing the source's inheritance/duck-typing hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Individual,
    Entity,
    Vessel,
    Aircraft,
}

impl EntityType {
    pub fn is_individual(&self) -> bool {
        matches!(self, EntityType::Individual)
    }
}

/// One identity document attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDocument {
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub number: String,
    pub issuing_country: Option<String>,
    pub issue_date: Option<String>,
    pub expiration_date: Option<String>,
    pub note: Option<String>,
}

/// A single structured attribute extracted from the source's free-form
/// `features` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub kind: FeatureKind,
    pub value: String,
    pub reliability: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    DateOfBirth,
    PlaceOfBirth,
    Nationality,
    Citizenship,
    Gender,
    Title,
    VesselImo,
    AircraftRegistration,
    CryptoAddress,
    Other,
}

impl FeatureKind {
    /// Case-insensitive substring match on the source's `feature/type`
    /// string.
    pub fn classify(feature_type: &str) -> FeatureKind {
        let ft = feature_type.to_uppercase();
        if ft.contains("DOB") || (ft.contains("DATE") && ft.contains("BIRTH")) {
            FeatureKind::DateOfBirth
        } else if ft.contains("PLACE") && ft.contains("BIRTH") {
            FeatureKind::PlaceOfBirth
        } else if ft.contains("CITIZENSHIP") {
            FeatureKind::Citizenship
        } else if ft.contains("NATIONAL") {
            FeatureKind::Nationality
        } else if ft.contains("GENDER") || ft.contains("SEX") {
            FeatureKind::Gender
        } else if ft.contains("TITLE") {
            FeatureKind::Title
        } else if ft.contains("VESSEL") && ft.contains("IMO") {
            FeatureKind::VesselImo
        } else if ft.contains("AIRCRAFT") && ft.contains("REGISTRATION") {
            FeatureKind::AircraftRegistration
        } else if ft.contains("DIGITAL CURRENCY ADDRESS") || ft.contains("CRYPTO") {
            FeatureKind::CryptoAddress
        } else {
            FeatureKind::Other
        }
    }
}

/// Postal address, advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
}

/// A relationship to another entity, advisory and never scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub related_entity_id: String,
    pub relationship_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// UN-specific list metadata, present only for `Source::Un` entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnListInfo {
    pub list_type: Option<String>,
    pub country_code: Option<String>,
    pub committee: Option<String>,
    pub reference_number: Option<String>,
}

/// One sanctioned party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanctionsEntity {
    pub external_id: String,
    pub source: Source,
    pub entity_type: EntityType,
    pub primary_name: String,
    pub all_names: Vec<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub identity_documents: Vec<IdentityDocument>,
    pub features: Vec<Feature>,
    pub date_of_birth: Option<String>,
    pub place_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub citizenship: Option<String>,
    pub gender: Option<String>,
    pub title: Option<String>,
    pub vessel_imo: Option<String>,
    pub aircraft_registration: Option<String>,
    pub crypto_addresses: Vec<String>,
    pub relationships: Vec<Relationship>,
    pub addresses: Vec<Address>,
    pub countries: Vec<String>,
    pub sanctions_programs: Vec<String>,
    pub un_list_info: Option<UnListInfo>,
    pub remarks: Option<String>,
}

impl SanctionsEntity {
    /// `aliases` is defined as `all_names[1:]`.
    pub fn aliases(&self) -> &[String] {
        if self.all_names.len() > 1 {
            &self.all_names[1..]
        } else {
            &[]
        }
    }

    /// Builds `countries` as the deduplicated (case-insensitive) union of
    /// nationality, citizenship, and address countries (invariant 3).
    pub fn recompute_countries(&mut self) {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        let mut push = |seen: &mut HashSet<String>, out: &mut Vec<String>, v: &Option<String>| {
            if let Some(v) = v {
                let key = v.to_uppercase();
                if !key.is_empty() && seen.insert(key) {
                    out.push(v.clone());
                }
            }
        };
        push(&mut seen, &mut out, &self.nationality);
        push(&mut seen, &mut out, &self.citizenship);
        for addr in &self.addresses {
            push(&mut seen, &mut out, &addr.country);
        }
        self.countries = out;
    }
}

/// A request to screen an identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreeningInput {
    pub name: String,
    pub document_number: Option<String>,
    pub document_type: Option<String>,
    pub date_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub country: Option<String>,
    pub analyst: Option<String>,
}

/// Disposition recommendation ordered by descending certainty of a true hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    AutoEscalate,
    ManualReview,
    LowConfidenceReview,
    AutoClear,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Recommendation::AutoEscalate => "AUTO_ESCALATE",
            Recommendation::ManualReview => "MANUAL_REVIEW",
            Recommendation::LowConfidenceReview => "LOW_CONFIDENCE_REVIEW",
            Recommendation::AutoClear => "AUTO_CLEAR",
        };
        write!(f, "{s}")
    }
}

/// Multi-dimensional confidence score, each dimension 0-100.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Confidence {
    pub overall: f64,
    pub name: f64,
    pub document: f64,
    pub dob: f64,
    pub nationality: f64,
    pub address: f64,
}

/// One scored candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub entity_ref: SanctionsEntity,
    pub matched_name: String,
    pub matched_document: Option<String>,
    pub match_layer: u8,
    pub confidence: Confidence,
    pub flags: Vec<String>,
    pub recommendation: Recommendation,
}

/// Thresholds actually applied for a given screening, echoed back for audit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdsUsed {
    pub name: i32,
    pub short_name: i32,
}

/// The full per-request response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningResponse {
    pub screening_id: String,
    pub screening_date: String,
    pub input: ScreeningInput,
    pub is_hit: bool,
    pub hit_count: usize,
    pub matches: Vec<MatchResult>,
    pub algorithm_version: String,
    pub thresholds_used: ThresholdsUsed,
    pub processing_time_ms: u64,
    /// Set when a matching deadline expired before the scan completed.
    pub partial_result: bool,
}
