//! Source-specific extraction into the unified entity model.
//!
//! Two parsers share nothing but the XML reader: `parse_ofac` walks the
//! OFAC SDN Enhanced shape (namespaced, streamed per `<entity>`); `parse_un`
//! walks the UN Consolidated shape (non-namespaced, two subtrees). Both
//! return every entity they could extract plus a malformed-entry count,
//! leaving post-parse validation (required fields, malformation ratio) to
//! [`crate::ingest_validator`].

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use regex::Regex;
use tracing::{info, warn};

use crate::error::IngestError;
use crate::model::{
    Address, Feature, FeatureKind, IdentityDocument, Relationship, SanctionsEntity, Source,
    UnListInfo,
};
use crate::xml_reader::{local_name, SecureXmlReader, XmlElement};

/// Outcome of a parse pass: the entities successfully extracted plus a
/// count of entries dropped for malformation.
pub struct ParseOutcome {
    pub entities: Vec<SanctionsEntity>,
    pub malformed_count: usize,
}

/// Parses OFAC SDN Enhanced XML.
///
/// The root namespace is extracted dynamically so a version bump to the feed that changes the
/// namespace URI doesn't require a code change.
pub struct OfacParser<'a> {
    reader: &'a SecureXmlReader,
}

impl<'a> OfacParser<'a> {
    pub fn new(reader: &'a SecureXmlReader) -> Self {
        Self { reader }
    }

    pub fn parse(&self, path: &Path) -> Result<ParseOutcome, IngestError> {
        let ns = self.reader.extract_namespace(path)?;
        let stream = self.reader.iter_stream(path, "entity")?;

        let mut entities = Vec::new();
        let mut malformed_count = 0usize;

        for item in stream {
            let elem = item?;
            match parse_ofac_entity(&elem) {
                Some(entity) => entities.push(entity),
                None => malformed_count += 1,
            }
        }

        info!(
            target: "sanctions_ingest",
            source = "OFAC",
            namespace = %ns,
            entity_count = entities.len(),
            malformed_count,
            "parsed OFAC entities"
        );

        Ok(ParseOutcome {
            entities,
            malformed_count,
        })
    }
}

/// Entities without any extracted name are dropped.
fn parse_ofac_entity(elem: &XmlElement) -> Option<SanctionsEntity> {
    let external_id = elem.attr("id")?.to_string();

    let entity_type_str = elem
        .child("entityType")
        .and_then(|e| e.text_trimmed())
        .unwrap_or("entity")
        .to_lowercase();
    let entity_type = classify_entity_type(&entity_type_str);

    let mut all_names = Vec::new();
    let mut first_name = None;
    let mut last_name = None;

    if let Some(names_section) = elem.child("names") {
        for name_tag in names_section.children_named("name") {
            let Some(translations) = name_tag.child("translations") else {
                continue;
            };
            for translation in translations.children_named("translation") {
                if let Some(full) = translation
                    .child("formattedFullName")
                    .and_then(|e| e.text_trimmed())
                {
                    all_names.push(full.to_string());
                }
                if entity_type == crate::model::EntityType::Individual {
                    if first_name.is_none() {
                        first_name = translation
                            .child("formattedFirstName")
                            .and_then(|e| e.text_trimmed())
                            .map(|s| s.to_string());
                    }
                    if last_name.is_none() {
                        last_name = translation
                            .child("formattedLastName")
                            .and_then(|e| e.text_trimmed())
                            .map(|s| s.to_string());
                    }
                }
            }
        }
    }

    if all_names.is_empty() {
        return None;
    }

    let mut seen = HashSet::new();
    all_names.retain(|n| seen.insert(n.clone()));
    let primary_name = all_names[0].clone();

    let mut identity_documents = Vec::new();
    if let Some(docs) = elem.child("identityDocuments") {
        for doc in docs.children_named("identityDocument") {
            if let Some(number) = doc.child("documentNumber").and_then(|e| e.text_trimmed()) {
                identity_documents.push(IdentityDocument {
                    doc_type: doc.child("type").and_then(|e| e.text_trimmed()).map(String::from),
                    number: number.to_string(),
                    issuing_country: doc
                        .child("issuingCountry")
                        .and_then(|e| e.text_trimmed())
                        .map(String::from),
                    issue_date: doc
                        .child("issueDate")
                        .and_then(|e| e.text_trimmed())
                        .map(String::from),
                    expiration_date: doc
                        .child("expirationDate")
                        .and_then(|e| e.text_trimmed())
                        .map(String::from),
                    note: None,
                });
            }
        }
    }

    let mut features = Vec::new();
    let mut date_of_birth = None;
    let mut place_of_birth = None;
    let mut nationality = None;
    let mut citizenship = None;
    let mut gender = None;
    let mut title = None;
    let mut vessel_imo = None;
    let mut aircraft_registration = None;
    let mut crypto_addresses = Vec::new();

    if let Some(section) = elem.child("features") {
        for feature_elem in section.children_named("feature") {
            let Some(feature_type) = feature_elem.child("type").and_then(|e| e.text_trimmed())
            else {
                continue;
            };
            let value = feature_elem
                .child("value")
                .and_then(|e| e.text_trimmed())
                .unwrap_or("")
                .to_string();
            let kind = FeatureKind::classify(feature_type);
            match kind {
                FeatureKind::DateOfBirth => date_of_birth = Some(value.clone()),
                FeatureKind::PlaceOfBirth => place_of_birth = Some(value.clone()),
                FeatureKind::Nationality => nationality = Some(value.clone()),
                FeatureKind::Citizenship => citizenship = Some(value.clone()),
                FeatureKind::Gender => gender = Some(value.clone()),
                FeatureKind::Title => title = Some(value.clone()),
                FeatureKind::VesselImo => vessel_imo = Some(value.clone()),
                FeatureKind::AircraftRegistration => aircraft_registration = Some(value.clone()),
                FeatureKind::CryptoAddress => crypto_addresses.push(value.clone()),
                FeatureKind::Other => {}
            }
            features.push(Feature {
                kind,
                value,
                reliability: feature_elem
                    .child("reliability")
                    .and_then(|e| e.text_trimmed())
                    .map(String::from),
            });
        }
    }

    let mut relationships = Vec::new();
    if let Some(section) = elem.child("relationships") {
        for rel in section.children_named("relationship") {
            if let Some(related) = rel.child("relatedEntity") {
                let related_id = related.attr("entityId").unwrap_or("").to_string();
                if !related_id.is_empty() {
                    relationships.push(Relationship {
                        related_entity_id: related_id,
                        relationship_type: rel
                            .child("relationshipType")
                            .and_then(|e| e.text_trimmed())
                            .map(String::from),
                        from: rel.child("fromDate").and_then(|e| e.text_trimmed()).map(String::from),
                        to: rel.child("toDate").and_then(|e| e.text_trimmed()).map(String::from),
                    });
                }
            }
        }
    }

    let mut addresses = Vec::new();
    if let Some(section) = elem.child("addresses") {
        for addr in section.children_named("address") {
            addresses.push(Address {
                line1: addr.child("addressLine1").and_then(|e| e.text_trimmed()).map(String::from),
                line2: addr.child("addressLine2").and_then(|e| e.text_trimmed()).map(String::from),
                city: addr.child("city").and_then(|e| e.text_trimmed()).map(String::from),
                state: addr.child("stateProvince").and_then(|e| e.text_trimmed()).map(String::from),
                postal: addr.child("postalCode").and_then(|e| e.text_trimmed()).map(String::from),
                country: addr.child("country").and_then(|e| e.text_trimmed()).map(String::from),
                region: addr.child("region").and_then(|e| e.text_trimmed()).map(String::from),
            });
        }
    }

    let mut sanctions_programs = Vec::new();
    if let Some(section) = elem.child("sanctionsPrograms") {
        for prog in section.children_named("sanctionsProgram") {
            if let Some(text) = prog.text_trimmed() {
                sanctions_programs.push(text.to_string());
            }
        }
    }

    let mut entity = SanctionsEntity {
        external_id,
        source: Source::Ofac,
        entity_type,
        primary_name,
        all_names,
        first_name,
        last_name,
        middle_name: None,
        identity_documents,
        features,
        date_of_birth,
        place_of_birth,
        nationality,
        citizenship,
        gender,
        title,
        vessel_imo,
        aircraft_registration,
        crypto_addresses,
        relationships,
        addresses,
        countries: Vec::new(),
        sanctions_programs,
        un_list_info: None,
        remarks: None,
    };
    entity.recompute_countries();
    Some(entity)
}

fn classify_entity_type(s: &str) -> crate::model::EntityType {
    use crate::model::EntityType;
    match s {
        "individual" => EntityType::Individual,
        "vessel" => EntityType::Vessel,
        "aircraft" => EntityType::Aircraft,
        _ => EntityType::Entity,
    }
}

/// Parses the UN Consolidated List XML. Non-namespaced;
/// walks `INDIVIDUALS/INDIVIDUAL` and `ENTITIES/ENTITY` as two distinct
/// subtrees of one DOM tree built by [`SecureXmlReader::parse_full`].
pub struct UnParser<'a> {
    reader: &'a SecureXmlReader,
    discovered_country_codes: Mutex<HashSet<String>>,
    discovered_list_types: Mutex<HashSet<String>>,
}

impl<'a> UnParser<'a> {
    pub fn new(reader: &'a SecureXmlReader) -> Self {
        Self {
            reader,
            discovered_country_codes: Mutex::new(HashSet::new()),
            discovered_list_types: Mutex::new(HashSet::new()),
        }
    }

    pub fn parse(&self, path: &Path) -> Result<ParseOutcome, IngestError> {
        let tree = self.reader.parse_full(path)?;

        let mut entities = Vec::new();
        let mut malformed_count = 0usize;

        for individuals in tree.children_named("INDIVIDUALS") {
            for individual in individuals.children_named("INDIVIDUAL") {
                match self.parse_individual(individual) {
                    Some(e) => entities.push(e),
                    None => malformed_count += 1,
                }
            }
        }
        for entities_section in tree.children_named("ENTITIES") {
            for entity_elem in entities_section.children_named("ENTITY") {
                match self.parse_entity(entity_elem) {
                    Some(e) => entities.push(e),
                    None => malformed_count += 1,
                }
            }
        }

        info!(
            target: "sanctions_ingest",
            source = "UN",
            entity_count = entities.len(),
            malformed_count,
            "parsed UN entities"
        );

        Ok(ParseOutcome {
            entities,
            malformed_count,
        })
    }

    fn parse_individual(&self, elem: &XmlElement) -> Option<SanctionsEntity> {
        let external_id = text_of(elem, "DATAID")?;

        let parts = ["FIRST_NAME", "SECOND_NAME", "THIRD_NAME", "FOURTH_NAME"]
            .iter()
            .filter_map(|tag| text_of(elem, tag))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        if parts.is_empty() {
            return None;
        }
        let primary_name = parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ");

        let last_name = text_of(elem, "FOURTH_NAME")
            .or_else(|| text_of(elem, "THIRD_NAME"))
            .or_else(|| text_of(elem, "SECOND_NAME"));

        let un_list_type_xml = text_of(elem, "UN_LIST_TYPE");
        let reference_number = text_of(elem, "REFERENCE_NUMBER");
        let (list_type, country_code, committee) =
            self.parse_un_reference(reference_number.as_deref(), un_list_type_xml.as_deref());

        let mut all_names = vec![primary_name.clone()];
        for alias in elem.descendants_named("INDIVIDUAL_ALIAS") {
            if let Some(name) = text_of(alias, "ALIAS_NAME") {
                all_names.push(name);
            }
        }

        let mut identity_documents = Vec::new();
        for doc in elem.descendants_named("INDIVIDUAL_DOCUMENT") {
            if let Some(number) = text_of(doc, "NUMBER") {
                identity_documents.push(IdentityDocument {
                    doc_type: text_of(doc, "TYPE_OF_DOCUMENT"),
                    number,
                    issuing_country: text_of(doc, "ISSUING_COUNTRY"),
                    issue_date: text_of(doc, "DATE_OF_ISSUE"),
                    expiration_date: None,
                    note: text_of(doc, "NOTE"),
                });
            }
        }

        let mut addresses = Vec::new();
        for addr in elem.descendants_named("INDIVIDUAL_ADDRESS") {
            addresses.push(Address {
                line1: text_of(addr, "STREET"),
                line2: None,
                city: text_of(addr, "CITY"),
                state: text_of(addr, "STATE_PROVINCE"),
                postal: None,
                country: text_of(addr, "COUNTRY"),
                region: None,
            });
        }

        let nationality = elem
            .child("NATIONALITY")
            .and_then(|n| text_of(n, "VALUE"));

        let mut entity = SanctionsEntity {
            external_id,
            source: Source::Un,
            entity_type: crate::model::EntityType::Individual,
            primary_name,
            all_names,
            first_name: text_of(elem, "FIRST_NAME"),
            last_name,
            middle_name: None,
            identity_documents,
            features: Vec::new(),
            date_of_birth: text_of(elem, "DATE_OF_BIRTH"),
            place_of_birth: None,
            nationality,
            citizenship: None,
            gender: None,
            title: None,
            vessel_imo: None,
            aircraft_registration: None,
            crypto_addresses: Vec::new(),
            relationships: Vec::new(),
            addresses,
            countries: Vec::new(),
            sanctions_programs: vec!["UN".to_string()],
            un_list_info: Some(UnListInfo {
                list_type,
                country_code,
                committee,
                reference_number,
            }),
            remarks: text_of(elem, "COMMENTS1"),
        };
        entity.recompute_countries();
        Some(entity)
    }

    fn parse_entity(&self, elem: &XmlElement) -> Option<SanctionsEntity> {
        let external_id = text_of(elem, "DATAID")?;
        // Entity name is carried in FIRST_NAME per the UN schema.
        let name = text_of(elem, "FIRST_NAME")?;

        let un_list_type_xml = text_of(elem, "UN_LIST_TYPE");
        let reference_number = text_of(elem, "REFERENCE_NUMBER");
        let (list_type, country_code, committee) =
            self.parse_un_reference(reference_number.as_deref(), un_list_type_xml.as_deref());

        let mut all_names = vec![name.clone()];
        for alias in elem.descendants_named("ENTITY_ALIAS") {
            if let Some(alias_name) = text_of(alias, "ALIAS_NAME") {
                all_names.push(alias_name);
            }
        }

        let mut addresses = Vec::new();
        for addr in elem.descendants_named("ENTITY_ADDRESS") {
            addresses.push(Address {
                line1: text_of(addr, "STREET"),
                line2: None,
                city: text_of(addr, "CITY"),
                state: text_of(addr, "STATE_PROVINCE"),
                postal: None,
                country: text_of(addr, "COUNTRY"),
                region: None,
            });
        }

        let mut entity = SanctionsEntity {
            external_id,
            source: Source::Un,
            entity_type: crate::model::EntityType::Entity,
            primary_name: name,
            all_names,
            first_name: None,
            last_name: None,
            middle_name: None,
            identity_documents: Vec::new(),
            features: Vec::new(),
            date_of_birth: None,
            place_of_birth: None,
            nationality: None,
            citizenship: None,
            gender: None,
            title: None,
            vessel_imo: None,
            aircraft_registration: None,
            crypto_addresses: Vec::new(),
            relationships: Vec::new(),
            addresses,
            countries: Vec::new(),
            sanctions_programs: vec!["UN".to_string()],
            un_list_info: Some(UnListInfo {
                list_type,
                country_code,
                committee,
                reference_number,
            }),
            remarks: text_of(elem, "COMMENTS1"),
        };
        entity.recompute_countries();
        Some(entity)
    }

    /// Parses `{COUNTRY}{i|e}.{NUMBER}`. Logs first occurrence
    /// of a previously-unseen country code or list type, mirroring the
    /// source's `_discovered_country_codes` / `_discovered_list_types`
    /// seen-sets.
    fn parse_un_reference(
        &self,
        reference_number: Option<&str>,
        un_list_type: Option<&str>,
    ) -> (Option<String>, Option<String>, Option<String>) {
        let mut list_type = None;
        let mut country_code = None;
        let mut committee = un_list_type.map(|s| s.to_string());

        if let Some(ref_num) = reference_number {
            let re = Regex::new(r"^([A-Z]{2})([ie])\.(\d+)$").unwrap();
            if let Some(caps) = re.captures(ref_num) {
                let cc = caps.get(1).unwrap().as_str().to_string();
                let indicator = caps.get(2).unwrap().as_str();
                list_type = Some(format!("{cc}{indicator}"));

                let mut seen = self.discovered_country_codes.lock().unwrap();
                if seen.insert(cc.clone()) {
                    info!(target: "sanctions_ingest", country_code = %cc, reference = %ref_num, "discovered UN country code");
                }
                country_code = Some(cc);
            } else {
                warn!(target: "sanctions_ingest", reference = %ref_num, "UN reference number did not match expected pattern");
            }
        }

        if let Some(lt) = un_list_type {
            let mut seen = self.discovered_list_types.lock().unwrap();
            if seen.insert(lt.to_string()) {
                info!(target: "sanctions_ingest", list_type = %lt, "discovered UN list type");
            }
        }

        (list_type, country_code, committee.take())
    }
}

fn text_of(elem: &XmlElement, tag: &str) -> Option<String> {
    elem.descendants_named(tag)
        .first()
        .and_then(|e| e.text_trimmed())
        .map(|s| s.to_string())
        .or_else(|| elem.child(tag).and_then(|e| e.text_trimmed()).map(String::from))
}
