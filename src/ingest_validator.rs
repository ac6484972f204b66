//! Post-parse validation: required fields, malformation ratio, freshness.
//!
//! Grounded in `downloader.py::validate_ofac_xml`'s malformation-rate gate
//! and `config_manager.py`'s `entity_count_variance_threshold`. This
//! validator runs after [`crate::parser`] has already produced entities,
//! since the parsers themselves already count and drop malformed entries —
//! this stage folds that count into the overall accept/reject decision and
//! checks required-field coverage on the surviving entities.

use tracing::warn;

use crate::config::{DataConfig, ValidationConfig};
use crate::error::IngestError;
use crate::model::SanctionsEntity;

/// Outcome of a single ingestion's validation pass.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub entity_count: usize,
    pub malformed_count: usize,
    pub malformation_rate_percent: f64,
    pub missing_required_field_count: usize,
    pub entity_count_variance_warning: Option<String>,
}

/// Validates a freshly-parsed entity set against the configured
/// thresholds. `previous_entity_count` is the count from the last
/// successful load, if any.
pub fn validate(
    entities: &[SanctionsEntity],
    malformed_count: usize,
    data_config: &DataConfig,
    validation_config: &ValidationConfig,
    previous_entity_count: Option<usize>,
) -> Result<ValidationReport, IngestError> {
    let entity_count = entities.len();
    let total_seen = entity_count + malformed_count;

    let malformation_rate_percent = if total_seen > 0 {
        (malformed_count as f64 / total_seen as f64) * 100.0
    } else {
        0.0
    };

    let missing_required_field_count = entities
        .iter()
        .filter(|e| !has_required_fields(e, validation_config))
        .count();

    if malformation_rate_percent > data_config.malformed_entity_threshold {
        return Err(IngestError::ValidationAbort {
            source: entities
                .first()
                .map(|e| e.source.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            rate: malformation_rate_percent,
            threshold: data_config.malformed_entity_threshold,
        });
    }

    let entity_count_variance_warning = previous_entity_count.and_then(|prev| {
        if prev == 0 {
            return None;
        }
        let delta_ratio = (entity_count as f64 - prev as f64).abs() / prev as f64;
        if delta_ratio > data_config.entity_count_variance_threshold {
            let msg = format!(
                "entity count changed by {:.1}% since last load ({} -> {}), exceeding variance threshold {:.1}%",
                delta_ratio * 100.0,
                prev,
                entity_count,
                data_config.entity_count_variance_threshold * 100.0
            );
            warn!(target: "sanctions_ingest", %msg, "entity count variance warning");
            Some(msg)
        } else {
            None
        }
    });

    Ok(ValidationReport {
        entity_count,
        malformed_count,
        malformation_rate_percent,
        missing_required_field_count,
        entity_count_variance_warning,
    })
}

/// Checks the required-field sets (`{id, name, source}` for all entities,
/// plus `type` for individuals) are present. Every parsed
/// `SanctionsEntity` carries `external_id`, `source`, and `entity_type` as
/// non-optional fields already, so the only field that can genuinely be
/// missing post-parse is the name (guarded by the parsers dropping
/// nameless entities) — this check exists to make the contract explicit
/// and to catch a future parser regression that stops doing so.
fn has_required_fields(entity: &SanctionsEntity, config: &ValidationConfig) -> bool {
    let fields = if entity.entity_type.is_individual() {
        &config.required_individual_fields
    } else {
        &config.required_entity_fields
    };

    for field in fields {
        let present = match field.as_str() {
            "id" => !entity.external_id.is_empty(),
            "name" => !entity.primary_name.is_empty(),
            "source" => true,
            "type" => true,
            _ => true,
        };
        if !present {
            return false;
        }
    }
    true
}
