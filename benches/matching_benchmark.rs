//! Performance regression gate for the matching engine.
//!
//! Tracks search latency against a modest in-memory index so a regression
//! in the fuzzy-matching hot path shows up before it reaches production
//! screening volumes.

use criterion::{criterion_group, criterion_main, Criterion};

use sanctions_screening_engine::config::MatchingConfig;
use sanctions_screening_engine::index::Index;
use sanctions_screening_engine::matching::MatchingEngine;
use sanctions_screening_engine::model::{
    EntityType, IdentityDocument, SanctionsEntity, ScreeningInput, Source,
};

fn build_entity(id: usize, name: &str) -> SanctionsEntity {
    SanctionsEntity {
        external_id: id.to_string(),
        source: Source::Ofac,
        entity_type: EntityType::Individual,
        primary_name: name.to_string(),
        all_names: vec![name.to_string()],
        first_name: None,
        last_name: None,
        middle_name: None,
        identity_documents: vec![IdentityDocument {
            number: format!("P{id:08}"),
            doc_type: Some("Passport".to_string()),
            issuing_country: Some("RU".to_string()),
            issue_date: None,
            expiration_date: None,
            note: None,
        }],
        features: vec![],
        date_of_birth: Some("1975-03-14".to_string()),
        place_of_birth: None,
        nationality: Some("RU".to_string()),
        citizenship: None,
        gender: None,
        title: None,
        vessel_imo: None,
        aircraft_registration: None,
        crypto_addresses: vec![],
        relationships: vec![],
        addresses: vec![],
        countries: vec!["RU".to_string()],
        sanctions_programs: vec!["SDN".to_string()],
        un_list_info: None,
        remarks: None,
    }
}

fn bench_search(c: &mut Criterion) {
    let names = [
        "VLADIMIR ALEKSANDROVICH PETROV",
        "IGOR NIKOLAYEVICH SMIRNOV",
        "ELENA YURIEVNA IVANOVA",
        "MIKHAIL SERGEYEVICH KUZNETSOV",
        "WANG WEI",
        "LI NA",
        "MUHAMMAD AL-RASHID",
        "AHMED HASSAN",
    ];

    let entities: Vec<SanctionsEntity> = (0..2000)
        .map(|i| build_entity(i, names[i % names.len()]))
        .collect();
    let index = Index::build(entities);
    let config = MatchingConfig::default();
    let engine = MatchingEngine::new(&index, &config);

    let query = ScreeningInput {
        name: "VLADIMIR PETROV".to_string(),
        document_number: None,
        document_type: None,
        date_of_birth: None,
        nationality: None,
        country: None,
        analyst: None,
    };

    c.bench_function("search_name_only_2000_entities", |b| {
        b.iter(|| engine.search(&query, 10))
    });

    let doc_query = ScreeningInput {
        name: "V PETROV".to_string(),
        document_number: Some("P00000500".to_string()),
        document_type: Some("Passport".to_string()),
        date_of_birth: None,
        nationality: None,
        country: None,
        analyst: None,
    };

    c.bench_function("search_with_document_hit_2000_entities", |b| {
        b.iter(|| engine.search(&doc_query, 10))
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
