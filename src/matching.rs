//! Multi-layer name + document + DOB scoring, thresholds, flags, and
//! disposition recommendation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use regex::Regex;

use crate::config::{MatchingConfig, ReportingConfig};
use crate::index::Index;
use crate::model::{Confidence, MatchResult, Recommendation, SanctionsEntity, ScreeningInput};
use crate::normalize::{normalize_document, normalize_name};

/// Fuzzy similarity measure: split both strings on whitespace, sort the
/// token sets, and score the two canonical strings via a longest-common-
/// subsequence ratio scaled to 0-100.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let canon_a = sorted_tokens(a);
    let canon_b = sorted_tokens(b);

    let len_a = canon_a.chars().count();
    let len_b = canon_b.chars().count();
    if len_a == 0 && len_b == 0 {
        return 100.0;
    }
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }

    let lcs_len = longest_common_subsequence_len(&canon_a, &canon_b);
    (2.0 * lcs_len as f64 / (len_a + len_b) as f64) * 100.0
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn longest_common_subsequence_len(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            curr[j] = if a[i - 1] == b[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// An input name is "short": two words or fewer under ten characters
/// total, or any single word of two characters or fewer.
fn is_short_name(name: &str) -> bool {
    let words: Vec<&str> = name.split_whitespace().collect();
    let total_len = name.chars().count();
    (words.len() <= 2 && total_len < 10) || words.iter().any(|w| w.chars().count() <= 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptReason {
    ChineseName,
    ArabicName,
    CyrillicName,
    LatinInitials,
    LatinDefault,
    Default,
}

impl ScriptReason {
    fn flag_suffix(&self) -> Option<&'static str> {
        match self {
            ScriptReason::ChineseName => Some("CHINESE_NAME"),
            ScriptReason::ArabicName => Some("ARABIC_NAME"),
            ScriptReason::CyrillicName => Some("CYRILLIC_NAME"),
            ScriptReason::LatinInitials => Some("LATIN_INITIALS"),
            // "default" and "latin_default" carry no ADAPTIVE_THRESHOLD_*
            // flag.
            ScriptReason::LatinDefault | ScriptReason::Default => None,
        }
    }
}

fn is_latin_initials(name: &str) -> bool {
    let stripped: String = name.chars().filter(|c| !c.is_whitespace() && *c != '.').collect();
    stripped.chars().count() <= 4
        && !stripped.is_empty()
        && stripped.chars().all(|c| c.is_ascii_alphabetic() && c.is_uppercase())
}

fn dominant_script(name: &str) -> Option<ScriptReason> {
    let mut cjk = 0usize;
    let mut arabic = 0usize;
    let mut cyrillic = 0usize;
    let mut other_alpha = 0usize;

    for c in name.chars() {
        let code = c as u32;
        if (0x4E00..=0x9FFF).contains(&code) {
            cjk += 1;
        } else if (0x0600..=0x06FF).contains(&code) {
            arabic += 1;
        } else if (0x0400..=0x04FF).contains(&code) {
            cyrillic += 1;
        } else if c.is_alphabetic() {
            other_alpha += 1;
        }
    }

    let total = cjk + arabic + cyrillic + other_alpha;
    if total == 0 {
        return None;
    }
    let frac = |n: usize| n as f64 / total as f64;
    if frac(cjk) > 0.5 {
        Some(ScriptReason::ChineseName)
    } else if frac(arabic) > 0.5 {
        Some(ScriptReason::ArabicName)
    } else if frac(cyrillic) > 0.5 {
        Some(ScriptReason::CyrillicName)
    } else {
        None
    }
}

/// The adaptive threshold and the reason it was chosen.
fn adaptive_threshold(input_name: &str, config: &MatchingConfig) -> (i32, ScriptReason) {
    if !config.adaptive_thresholds.enabled {
        return (config.short_name_threshold, ScriptReason::Default);
    }
    if is_latin_initials(input_name) {
        return (config.adaptive_thresholds.latin_initials, ScriptReason::LatinInitials);
    }
    match dominant_script(input_name) {
        Some(ScriptReason::ChineseName) => {
            (config.adaptive_thresholds.chinese, ScriptReason::ChineseName)
        }
        Some(ScriptReason::ArabicName) => {
            (config.adaptive_thresholds.arabic, ScriptReason::ArabicName)
        }
        Some(ScriptReason::CyrillicName) => {
            (config.adaptive_thresholds.cyrillic, ScriptReason::CyrillicName)
        }
        _ => (config.short_name_threshold, ScriptReason::LatinDefault),
    }
}

/// Extracts a 4-digit year, trying ISO, US slash, and dashed date forms
/// before falling back to the first run of four digits found anywhere.
fn extract_year(date_str: &str) -> Option<i32> {
    let patterns = [
        r"^(\d{4})$",
        r"^(\d{4})-\d{2}-\d{2}$",
        r"^\d{2}/\d{2}/(\d{4})$",
        r"^\d{2}-\d{2}-(\d{4})$",
        r"(\d{4})",
    ];
    for p in patterns {
        if let Ok(re) = Regex::new(p) {
            if let Some(caps) = re.captures(date_str) {
                if let Some(m) = caps.get(1) {
                    if let Ok(year) = m.as_str().parse::<i32>() {
                        return Some(year);
                    }
                }
            }
        }
    }
    None
}

fn dob_score(input_dob: Option<&str>, entity_dob: Option<&str>) -> f64 {
    match (input_dob.and_then(extract_year), entity_dob.and_then(extract_year)) {
        (Some(a), Some(b)) => (100.0 - 20.0 * (a - b).unsigned_abs() as f64).max(0.0),
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NationalityFlag {
    Exact,
    Substring,
    None,
}

fn nationality_flag(input: &ScreeningInput, entity: &SanctionsEntity) -> NationalityFlag {
    let mut input_set: HashSet<String> = HashSet::new();
    if let Some(n) = &input.nationality {
        if !n.is_empty() {
            input_set.insert(n.to_uppercase());
        }
    }
    if let Some(c) = &input.country {
        if !c.is_empty() {
            input_set.insert(c.to_uppercase());
        }
    }
    if input_set.is_empty() {
        return NationalityFlag::None;
    }

    let mut entity_set: HashSet<String> = HashSet::new();
    for c in &entity.countries {
        entity_set.insert(c.to_uppercase());
    }
    if let Some(n) = &entity.nationality {
        entity_set.insert(n.to_uppercase());
    }
    if let Some(c) = &entity.citizenship {
        entity_set.insert(c.to_uppercase());
    }
    if entity_set.is_empty() {
        return NationalityFlag::None;
    }

    if input_set.intersection(&entity_set).next().is_some() {
        return NationalityFlag::Exact;
    }

    for a in &input_set {
        for b in &entity_set {
            let min_len = a.chars().count().min(b.chars().count());
            if min_len >= 4
                && (a.starts_with(b.as_str())
                    || a.ends_with(b.as_str())
                    || b.starts_with(a.as_str())
                    || b.ends_with(a.as_str()))
            {
                return NationalityFlag::Substring;
            }
        }
    }

    NationalityFlag::None
}

/// Engine evaluating validated input against an [`Index`].
pub struct MatchingEngine<'a> {
    index: &'a Index,
    config: &'a MatchingConfig,
    reporting: ReportingConfig,
    common_names: HashSet<String>,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(index: &'a Index, config: &'a MatchingConfig) -> Self {
        Self::with_reporting(index, config, ReportingConfig::default())
    }

    /// Uses the recommendation thresholds from `reporting` instead of the
    /// engine's built-in defaults.
    pub fn with_reporting(
        index: &'a Index,
        config: &'a MatchingConfig,
        reporting: ReportingConfig,
    ) -> Self {
        let common_names = config
            .common_names
            .iter()
            .map(|n| normalize_name(n))
            .collect();
        Self {
            index,
            config,
            reporting,
            common_names,
        }
    }

    /// Runs all four layers and returns the admitted, sorted, truncated
    /// result set.
    pub fn search(&self, input: &ScreeningInput, limit: usize) -> Vec<MatchResult> {
        self.search_with_deadline(input, limit, None).0
    }

    /// As [`MatchingEngine::search`], but cooperatively cancellable at an
    /// optional deadline. When the
    /// deadline passes before the entity scan completes, the second
    /// element of the returned tuple is `true` and the first element
    /// holds whatever admitted results were gathered so far.
    pub fn search_with_deadline(
        &self,
        input: &ScreeningInput,
        limit: usize,
        deadline: Option<Instant>,
    ) -> (Vec<MatchResult>, bool) {
        let mut seen_entity_ids: HashSet<String> = HashSet::new();
        let mut results = Vec::new();
        let mut partial = false;

        // Layer 1: exact document match.
        if let Some(doc_number) = &input.document_number {
            let q = normalize_document(doc_number);
            if !q.is_empty() {
                if let Some(hits) = self.index.lookup_document(&q) {
                    for entity in hits {
                        let doc_type_matches = input.document_type.as_ref().map_or(true, |dt| {
                            entity.identity_documents.iter().any(|d| {
                                normalize_document(&d.number) == q
                                    && d.doc_type
                                        .as_deref()
                                        .map(|t| t.eq_ignore_ascii_case(dt))
                                        .unwrap_or(false)
                            })
                        });
                        let any_doc_matches = entity
                            .identity_documents
                            .iter()
                            .any(|d| normalize_document(&d.number) == q)
                            || entity
                                .vessel_imo
                                .as_deref()
                                .map(|imo| normalize_document(imo) == q)
                                .unwrap_or(false);

                        if any_doc_matches && doc_type_matches {
                            seen_entity_ids.insert(entity.external_id.clone());
                            results.push(MatchResult {
                                entity_ref: (**entity).clone(),
                                matched_name: entity.primary_name.clone(),
                                matched_document: Some(doc_number.clone()),
                                match_layer: 1,
                                confidence: Confidence {
                                    overall: 100.0,
                                    name: 100.0,
                                    document: 100.0,
                                    dob: 0.0,
                                    nationality: 0.0,
                                    address: 0.0,
                                },
                                flags: vec!["DOCUMENT_EXACT_MATCH".to_string()],
                                recommendation: Recommendation::AutoEscalate,
                            });
                        }
                    }
                }
            }
        }

        // Layers 2-4: name-based scoring.
        let q_name = normalize_name(&input.name);
        let short = is_short_name(&input.name);
        let (base_name_threshold, reason) = if short {
            adaptive_threshold(&input.name, self.config)
        } else {
            (self.config.name_threshold, ScriptReason::Default)
        };

        let input_doc_present = input
            .document_number
            .as_ref()
            .map(|d| !d.is_empty())
            .unwrap_or(false);

        for entity in self.index.entities() {
            if let Some(dl) = deadline {
                if Instant::now() >= dl {
                    partial = true;
                    break;
                }
            }
            if seen_entity_ids.contains(&entity.external_id) {
                continue;
            }

            let (name_score, matched_name) = best_name_match(&q_name, entity);
            if name_score < self.config.layers.low_match as f64 {
                continue;
            }

            let doc_score = entity_doc_score(input, entity);
            let dob = dob_score(input.date_of_birth.as_deref(), entity.date_of_birth.as_deref());
            let nat_flag = nationality_flag(input, entity);

            let overall = (self.config.weights.name * name_score
                + self.config.weights.document * doc_score
                + self.config.weights.dob * dob)
                .clamp(0.0, 100.0);

            let layer = if doc_score >= 100.0 {
                1
            } else if name_score >= self.config.layers.high_confidence as f64
                && (dob >= 60.0 || nat_flag != NationalityFlag::None)
            {
                2
            } else if name_score >= self.config.layers.high_confidence as f64 {
                3
            } else if name_score >= self.config.layers.moderate_match as f64 {
                3
            } else {
                4
            };

            let mut flags = Vec::new();
            if doc_score >= 100.0 {
                flags.push("DOCUMENT_MATCH".to_string());
            }
            if short {
                flags.push("SHORT_NAME_QUERY".to_string());
                if let Some(suffix) = reason.flag_suffix() {
                    flags.push(format!("ADAPTIVE_THRESHOLD_{suffix}"));
                }
            }
            let is_common = self.common_names.contains(&q_name);
            if is_common {
                flags.push("COMMON_NAME".to_string());
            }
            match nat_flag {
                NationalityFlag::Exact => flags.push("NATIONALITY_EXACT_MATCH_INFO".to_string()),
                NationalityFlag::Substring => {
                    flags.push("NATIONALITY_SUBSTRING_MATCH_INFO".to_string())
                }
                NationalityFlag::None => {}
            }
            if input_doc_present && doc_score < 100.0 {
                flags.push("NO_DOCUMENT_MATCH".to_string());
            }
            if !entity.entity_type.is_individual() {
                flags.push("ENTITY_MATCH".to_string());
            }

            let mut recommendation = recommendation_for(overall, &self.reporting);
            if is_common && doc_score < 100.0 {
                if recommendation == Recommendation::AutoEscalate {
                    recommendation = Recommendation::ManualReview;
                }
                flags.push("COMMON_NAME_REQUIRES_SECONDARY_VALIDATION".to_string());
            }

            let admitted = name_score >= base_name_threshold as f64 || doc_score >= 100.0;
            if !admitted {
                continue;
            }

            let matched_document = if doc_score >= 100.0 {
                entity
                    .identity_documents
                    .iter()
                    .find(|d| {
                        input
                            .document_number
                            .as_deref()
                            .map(|q| normalize_document(&d.number) == normalize_document(q))
                            .unwrap_or(false)
                    })
                    .map(|d| d.number.clone())
            } else {
                None
            };

            results.push(MatchResult {
                entity_ref: (**entity).clone(),
                matched_name,
                matched_document,
                match_layer: layer,
                confidence: Confidence {
                    overall,
                    name: name_score,
                    document: doc_score,
                    dob,
                    nationality: 0.0,
                    address: 0.0,
                },
                flags,
                recommendation,
            });
        }

        results.sort_by(|a, b| {
            b.confidence
                .overall
                .partial_cmp(&a.confidence.overall)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        (results, partial)
    }
}

fn best_name_match(q_name: &str, entity: &Arc<SanctionsEntity>) -> (f64, String) {
    let mut best_score = -1.0f64;
    let mut best_name = entity.primary_name.clone();
    for candidate in &entity.all_names {
        let score = token_sort_ratio(q_name, &normalize_name(candidate));
        if score > best_score {
            best_score = score;
            best_name = candidate.clone();
        }
    }
    (best_score.max(0.0), best_name)
}

fn entity_doc_score(input: &ScreeningInput, entity: &SanctionsEntity) -> f64 {
    let Some(doc) = &input.document_number else {
        return 0.0;
    };
    let q = normalize_document(doc);
    if q.is_empty() {
        return 0.0;
    }
    let matches = entity
        .identity_documents
        .iter()
        .any(|d| normalize_document(&d.number) == q)
        || entity
            .vessel_imo
            .as_deref()
            .map(|imo| normalize_document(imo) == q)
            .unwrap_or(false);
    if matches {
        100.0
    } else {
        0.0
    }
}

fn recommendation_for(overall: f64, reporting: &ReportingConfig) -> Recommendation {
    if overall >= reporting.auto_escalate as f64 {
        Recommendation::AutoEscalate
    } else if overall >= reporting.manual_review as f64 {
        Recommendation::ManualReview
    } else if overall >= reporting.auto_clear as f64 {
        Recommendation::LowConfidenceReview
    } else {
        Recommendation::AutoClear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, IdentityDocument, Source};

    fn make_entity(id: &str, name: &str, doc: Option<&str>, dob: Option<&str>) -> SanctionsEntity {
        SanctionsEntity {
            external_id: id.to_string(),
            source: Source::Ofac,
            entity_type: EntityType::Individual,
            primary_name: name.to_string(),
            all_names: vec![name.to_string()],
            first_name: None,
            last_name: None,
            middle_name: None,
            identity_documents: doc
                .map(|d| {
                    vec![IdentityDocument {
                        doc_type: Some("Passport".to_string()),
                        number: d.to_string(),
                        issuing_country: None,
                        issue_date: None,
                        expiration_date: None,
                        note: None,
                    }]
                })
                .unwrap_or_default(),
            features: vec![],
            date_of_birth: dob.map(|s| s.to_string()),
            place_of_birth: None,
            nationality: None,
            citizenship: None,
            gender: None,
            title: None,
            vessel_imo: None,
            aircraft_registration: None,
            crypto_addresses: vec![],
            relationships: vec![],
            addresses: vec![],
            countries: vec![],
            sanctions_programs: vec![],
            un_list_info: None,
            remarks: None,
        }
    }

    #[test]
    fn token_sort_ratio_is_order_insensitive() {
        let r1 = token_sort_ratio("John Smith", "Smith John");
        assert!((r1 - 100.0).abs() < 1e-9);
    }

    #[test]
    fn token_sort_ratio_empty_strings() {
        assert_eq!(token_sort_ratio("", ""), 100.0);
        assert_eq!(token_sort_ratio("a", ""), 0.0);
    }

    #[test]
    fn scenario_exact_document_weak_name() {
        let entity = make_entity("OFAC-1", "Ibrahim Al-Banna", Some("AB123456"), None);
        let index = Index::build(vec![entity]);
        let config = MatchingConfig::default();
        let engine = MatchingEngine::new(&index, &config);
        let input = ScreeningInput {
            name: "Nobody".to_string(),
            document_number: Some("ab-123-456".to_string()),
            ..Default::default()
        };
        let results = engine.search(&input, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_layer, 1);
        assert_eq!(results[0].confidence.overall, 100.0);
        assert!(results[0].flags.contains(&"DOCUMENT_EXACT_MATCH".to_string()));
        assert_eq!(results[0].recommendation, Recommendation::AutoEscalate);
    }

    #[test]
    fn scenario_accent_insensitive_name() {
        let entity = make_entity("OFAC-2", "Jose Maria Garcia", None, None);
        let index = Index::build(vec![entity]);
        let config = MatchingConfig::default();
        let engine = MatchingEngine::new(&index, &config);
        let input = ScreeningInput {
            name: "José María García".to_string(),
            ..Default::default()
        };
        let results = engine.search(&input, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].confidence.name, 100.0);
        assert!(results[0].match_layer <= 3);
    }

    #[test]
    fn scenario_short_cjk_name_adaptive_threshold() {
        let entity = make_entity("OFAC-3", "李明", None, None);
        let index = Index::build(vec![entity]);
        let config = MatchingConfig::default();
        let engine = MatchingEngine::new(&index, &config);
        let input = ScreeningInput {
            name: "李明".to_string(),
            ..Default::default()
        };
        let results = engine.search(&input, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].confidence.name, 100.0);
        assert!(results[0].flags.contains(&"SHORT_NAME_QUERY".to_string()));
        assert!(results[0]
            .flags
            .contains(&"ADAPTIVE_THRESHOLD_CHINESE_NAME".to_string()));
    }

    #[test]
    fn scenario_common_name_downgrade() {
        let entity = make_entity("OFAC-4", "John Smith", None, Some("1970"));
        let index = Index::build(vec![entity]);
        let mut config = MatchingConfig::default();
        config.common_names.push("John Smith".to_string());
        let engine = MatchingEngine::new(&index, &config);
        let input = ScreeningInput {
            name: "John Smith".to_string(),
            ..Default::default()
        };
        let results = engine.search(&input, 10);
        assert!(!results.is_empty());
        assert_ne!(results[0].recommendation, Recommendation::AutoEscalate);
        assert!(results[0]
            .flags
            .contains(&"COMMON_NAME_REQUIRES_SECONDARY_VALIDATION".to_string()));
    }

    #[test]
    fn scenario_dob_discriminates() {
        let entity = make_entity("OFAC-5", "Maria Lopez", None, Some("1960"));
        let index = Index::build(vec![entity]);
        let config = MatchingConfig::default();
        let engine = MatchingEngine::new(&index, &config);

        let input_a = ScreeningInput {
            name: "Maria Lopez".to_string(),
            date_of_birth: Some("1960".to_string()),
            ..Default::default()
        };
        let input_b = ScreeningInput {
            name: "Maria Lopez".to_string(),
            date_of_birth: Some("1965".to_string()),
            ..Default::default()
        };

        let results_a = engine.search(&input_a, 10);
        let results_b = engine.search(&input_b, 10);
        assert_eq!(results_a.len(), 1);
        assert_eq!(results_b.len(), 1);
        assert_eq!(results_a[0].confidence.dob, 100.0);
        assert_eq!(results_b[0].confidence.dob, 0.0);
        assert!(results_a[0].confidence.overall > results_b[0].confidence.overall);
    }

    #[test]
    fn property_p5_document_hit_dominance() {
        let entity = make_entity("OFAC-6", "Zzz Unrelated", Some("DOC999"), None);
        let index = Index::build(vec![entity]);
        let config = MatchingConfig::default();
        let engine = MatchingEngine::new(&index, &config);
        let input = ScreeningInput {
            name: "Totally Different Name".to_string(),
            document_number: Some("DOC999".to_string()),
            ..Default::default()
        };
        let results = engine.search(&input, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_layer, 1);
        assert_eq!(results[0].confidence.overall, 100.0);
    }

    #[test]
    fn search_with_deadline_returns_partial_flag_when_expired() {
        let entities = vec![
            make_entity("A", "Ahmad Hassan", None, None),
            make_entity("B", "Ahmed Hassan", None, None),
        ];
        let index = Index::build(entities);
        let config = MatchingConfig::default();
        let engine = MatchingEngine::new(&index, &config);
        let input = ScreeningInput {
            name: "Ahmad Hassan".to_string(),
            ..Default::default()
        };

        let already_past = Instant::now() - std::time::Duration::from_secs(1);
        let (results, partial) = engine.search_with_deadline(&input, 10, Some(already_past));
        assert!(partial);
        assert!(results.is_empty());

        let far_future = Instant::now() + std::time::Duration::from_secs(60);
        let (results, partial) = engine.search_with_deadline(&input, 10, Some(far_future));
        assert!(!partial);
        assert!(!results.is_empty());
    }

    #[test]
    fn property_p4_sort_law() {
        let entities = vec![
            make_entity("A", "Ahmad Hassan", None, None),
            make_entity("B", "Ahmed Hassan", None, None),
            make_entity("C", "Ahmad Hasan", None, None),
        ];
        let index = Index::build(entities);
        let config = MatchingConfig::default();
        let engine = MatchingEngine::new(&index, &config);
        let input = ScreeningInput {
            name: "Ahmad Hassan".to_string(),
            ..Default::default()
        };
        let results = engine.search(&input, 10);
        for w in results.windows(2) {
            assert!(w[0].confidence.overall >= w[1].confidence.overall);
        }
    }
}
