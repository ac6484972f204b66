//! Document-number lookup map + iterable entity vector.
//!
//! Both structures are read-only after construction. Build cost is
//! O(E + D) where E is entity count and D is total documents.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::SanctionsEntity;
use crate::normalize::normalize_document;

/// An immutable snapshot of the sanctioned-party corpus. Construction produces
/// a fully-built value; reload constructs a new one and callers swap the
/// shared reference atomically (see [`crate::orchestrator::Engine::reload`]).
#[derive(Debug)]
pub struct Index {
    entities: Vec<Arc<SanctionsEntity>>,
    document_index: HashMap<String, Vec<Arc<SanctionsEntity>>>,
}

impl Index {
    /// Builds an `Index` from a freshly-parsed, already-validated entity
    /// list. Every non-empty document/vessel IMO number is indexed under
    /// its normalized form.
    pub fn build(entities: Vec<SanctionsEntity>) -> Self {
        let entities: Vec<Arc<SanctionsEntity>> = entities.into_iter().map(Arc::new).collect();
        let mut document_index: HashMap<String, Vec<Arc<SanctionsEntity>>> = HashMap::new();

        for entity in &entities {
            for doc in &entity.identity_documents {
                let key = normalize_document(&doc.number);
                if !key.is_empty() {
                    document_index.entry(key).or_default().push(Arc::clone(entity));
                }
            }
            if let Some(imo) = &entity.vessel_imo {
                let key = normalize_document(imo);
                if !key.is_empty() {
                    document_index.entry(key).or_default().push(Arc::clone(entity));
                }
            }
        }

        Self {
            entities,
            document_index,
        }
    }

    pub fn entities(&self) -> &[Arc<SanctionsEntity>] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Looks up all entities referencing a normalized document/vessel
    /// number. Never returns an empty `Some`.
    pub fn lookup_document(&self, normalized: &str) -> Option<&[Arc<SanctionsEntity>]> {
        self.document_index.get(normalized).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, IdentityDocument, Source};

    fn entity(id: &str, doc_number: &str) -> SanctionsEntity {
        SanctionsEntity {
            external_id: id.to_string(),
            source: Source::Ofac,
            entity_type: EntityType::Individual,
            primary_name: "Test Name".to_string(),
            all_names: vec!["Test Name".to_string()],
            first_name: None,
            last_name: None,
            middle_name: None,
            identity_documents: vec![IdentityDocument {
                doc_type: Some("Passport".to_string()),
                number: doc_number.to_string(),
                issuing_country: None,
                issue_date: None,
                expiration_date: None,
                note: None,
            }],
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

    #[test]
    fn indexes_by_normalized_document_number() {
        let idx = Index::build(vec![entity("OFAC-1", "ab-123.456")]);
        assert!(idx.lookup_document(&normalize_document("AB123456")).is_some());
        assert_eq!(idx.lookup_document(&normalize_document("AB123456")).unwrap().len(), 1);
    }

    #[test]
    fn multiple_entities_may_share_a_document_number() {
        let idx = Index::build(vec![entity("OFAC-1", "X1"), entity("OFAC-2", "X1")]);
        assert_eq!(idx.lookup_document("X1").unwrap().len(), 2);
    }

    #[test]
    fn missing_document_returns_none() {
        let idx = Index::build(vec![entity("OFAC-1", "X1")]);
        assert!(idx.lookup_document("NOPE").is_none());
    }

    #[test]
    fn entities_preserves_insertion_order() {
        let idx = Index::build(vec![entity("A", "1"), entity("B", "2"), entity("C", "3")]);
        let ids: Vec<_> = idx.entities().iter().map(|e| e.external_id.clone()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }
}
