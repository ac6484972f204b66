//! Ties validation, matching, and history bookkeeping into the single
//! request/response contract callers see.
//!
//! Grounded in `screener.py::screen_individual`, which builds the
//! screening id and timestamp, runs the search, and appends to a
//! capped `screening_history` list.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::ScreeningError;
use crate::index::Index;
use crate::matching::MatchingEngine;
use crate::model::{ScreeningInput, ScreeningResponse, ThresholdsUsed};
use crate::validation::validate_screening_input;

/// Holds the live [`Index`] behind a lock so a reload can atomically swap
/// in a new snapshot without blocking in-flight searches on the old one.
pub struct Engine {
    index: RwLock<Arc<Index>>,
    config: Config,
    history: RwLock<VecDeque<ScreeningResponse>>,
}

impl Engine {
    pub fn new(index: Index, config: Config) -> Self {
        Self {
            index: RwLock::new(Arc::new(index)),
            config,
            history: RwLock::new(VecDeque::new()),
        }
    }

    /// Atomically replaces the index with a freshly built one, e.g. after
    /// a scheduled OFAC/UN refresh.
    pub fn reload(&self, index: Index) {
        let mut guard = self.index.write().expect("index lock poisoned");
        *guard = Arc::new(index);
    }

    pub fn entity_count(&self) -> usize {
        self.index.read().expect("index lock poisoned").len()
    }

    /// Validates, searches, and records a single screening request.
    /// Returns a typed error without touching history on validation
    /// failure; a successful search is always recorded, including
    /// zero-hit ones.
    pub fn screen(&self, input: ScreeningInput) -> Result<ScreeningResponse, ScreeningError> {
        self.screen_with_deadline(input, None)
    }

    /// As [`Engine::screen`], but bounds the matching phase by an optional
    /// deadline. The
    /// `InputValidator` step itself is not cancellable, completing in
    /// sub-millisecond time regardless.
    pub fn screen_with_deadline(
        &self,
        input: ScreeningInput,
        timeout: Option<Duration>,
    ) -> Result<ScreeningResponse, ScreeningError> {
        validate_screening_input(&input, &self.config.input_validation)?;

        let started = Instant::now();
        let deadline = timeout.map(|d| started + d);
        let index = Arc::clone(&*self.index.read().expect("index lock poisoned"));
        let matcher = MatchingEngine::with_reporting(
            &index,
            &self.config.matching,
            self.config.reporting.clone(),
        );

        let limit = self.config.performance.batch_size.max(1).min(100);
        let (mut matches, partial_result) = matcher.search_with_deadline(&input, limit, deadline);
        if partial_result {
            for m in &mut matches {
                m.flags.push("PARTIAL_RESULT".to_string());
            }
        }
        let processing_time_ms = started.elapsed().as_millis() as u64;

        let response = ScreeningResponse {
            screening_id: Uuid::new_v4().to_string(),
            screening_date: Utc::now().to_rfc3339(),
            is_hit: !matches.is_empty(),
            hit_count: matches.len(),
            matches,
            algorithm_version: self.config.algorithm.version.clone(),
            thresholds_used: ThresholdsUsed {
                name: self.config.matching.name_threshold,
                short_name: self.config.matching.short_name_threshold,
            },
            processing_time_ms,
            partial_result,
            input,
        };

        self.record(response.clone());
        Ok(response)
    }

    /// Screens each row independently, collecting per-row failures rather
    /// than aborting the batch on the first one.
    pub fn screen_bulk(
        &self,
        inputs: Vec<ScreeningInput>,
    ) -> Vec<Result<ScreeningResponse, ScreeningError>> {
        inputs.into_iter().map(|input| self.screen(input)).collect()
    }

    /// Returns the most recent screenings, newest first, up to `limit`.
    pub fn recent_screenings(&self, limit: usize) -> Vec<ScreeningResponse> {
        let history = self.history.read().expect("history lock poisoned");
        history.iter().rev().take(limit).cloned().collect()
    }

    fn record(&self, response: ScreeningResponse) {
        let mut history = self.history.write().expect("history lock poisoned");
        let cap = self.config.performance.max_recent_screenings.max(1);
        if history.len() >= cap {
            history.pop_front();
        }
        history.push_back(response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, SanctionsEntity, Source};

    fn entity(id: &str, name: &str) -> SanctionsEntity {
        SanctionsEntity {
            external_id: id.to_string(),
            source: Source::Ofac,
            entity_type: EntityType::Individual,
            primary_name: name.to_string(),
            all_names: vec![name.to_string()],
            first_name: None,
            last_name: None,
            middle_name: None,
            identity_documents: vec![],
            features: vec![],
            date_of_birth: None,
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

    fn input(name: &str) -> ScreeningInput {
        ScreeningInput {
            name: name.to_string(),
            document_number: None,
            document_type: None,
            date_of_birth: None,
            nationality: None,
            country: None,
            analyst: None,
        }
    }

    #[test]
    fn screen_records_history_and_returns_uuid() {
        let index = Index::build(vec![entity("1", "VLADIMIR PETROV")]);
        let engine = Engine::new(index, Config::default());
        let response = engine.screen(input("VLADIMIR PETROV")).unwrap();
        assert!(response.is_hit);
        assert_eq!(Uuid::parse_str(&response.screening_id).is_ok(), true);
        assert_eq!(engine.recent_screenings(10).len(), 1);
    }

    #[test]
    fn screen_rejects_invalid_input_without_recording() {
        let index = Index::build(vec![]);
        let engine = Engine::new(index, Config::default());
        let err = engine.screen(input("")).unwrap_err();
        assert_eq!(err.code(), "NAME_TOO_SHORT");
        assert_eq!(engine.recent_screenings(10).len(), 0);
    }

    #[test]
    fn history_ring_buffer_evicts_oldest() {
        let index = Index::build(vec![]);
        let mut config = Config::default();
        config.performance.max_recent_screenings = 2;
        let engine = Engine::new(index, config);
        engine.screen(input("ALICE ONE")).unwrap();
        engine.screen(input("BOB TWO")).unwrap();
        engine.screen(input("CAROL THREE")).unwrap();
        let recent = engine.recent_screenings(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].input.name, "CAROL THREE");
        assert_eq!(recent[1].input.name, "BOB TWO");
    }

    #[test]
    fn screen_bulk_collects_per_row_results() {
        let index = Index::build(vec![]);
        let engine = Engine::new(index, Config::default());
        let results = engine.screen_bulk(vec![input("GOOD NAME"), input("")]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn screen_with_expired_deadline_marks_partial_result() {
        let index = Index::build(vec![entity("1", "VLADIMIR PETROV")]);
        let engine = Engine::new(index, Config::default());
        let response = engine
            .screen_with_deadline(input("VLADIMIR PETROV"), Some(std::time::Duration::ZERO))
            .unwrap();
        assert!(response.partial_result);
        assert!(response.is_hit == !response.matches.is_empty());
    }

    #[test]
    fn reload_swaps_index_atomically() {
        let engine = Engine::new(Index::build(vec![]), Config::default());
        assert_eq!(engine.entity_count(), 0);
        engine.reload(Index::build(vec![entity("1", "NEW ENTITY")]));
        assert_eq!(engine.entity_count(), 1);
    }
}
