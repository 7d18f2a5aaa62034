use std::sync::Arc;

use facet_service::{EnrichmentOutcome, Entity, ListingParams, ParticipantRef};
use facet_store::enrichment::{AssociatedId, AssociatedRecord};

use super::{FailingEnrichment, ScriptedBackend, StubEnrichment};

fn pair(participant_id: &str, study_id: &str) -> ParticipantRef {
	ParticipantRef { participant_id: participant_id.to_string(), study_id: study_id.to_string() }
}

fn catalog() -> Vec<serde_json::Value> {
	vec![
		serde_json::json!({ "id": "p-1", "participant_id": "P-1", "study_id": "phs001" }),
		serde_json::json!({ "id": "p-2", "participant_id": "P-2", "study_id": "phs002" }),
		serde_json::json!({ "id": "p-9", "participant_id": "P-9", "study_id": "phs001" }),
	]
}

fn associated(associated_id: &str, study: &str) -> AssociatedId {
	AssociatedId {
		associated_id: associated_id.to_string(),
		repository_of_synonym_id: study.to_string(),
		domain_category: Some("organization".to_string()),
		domain_description: None,
		data_location: None,
	}
}

#[tokio::test]
async fn only_resolvable_pairs_are_returned() {
	let backend = Arc::new(ScriptedBackend::new(catalog()));
	let service = super::build_service(backend.clone(), None, false);
	let resolved = service
		.correlate(&[pair("P-1", "phs001"), pair("P-2", "phs002"), pair("P-3", "phs001")])
		.await
		.expect("Correlation failed.");

	assert_eq!(resolved.len(), 2);
	assert_eq!(resolved[&pair("P-1", "phs001")], "p-1");
	assert_eq!(resolved[&pair("P-2", "phs002")], "p-2");

	let searches = backend.searches_on("participants");

	assert_eq!(searches.len(), 1);
	assert_eq!(searches[0]["size"], 10_000);
	assert_eq!(searches[0]["query"]["bool"]["minimum_should_match"], 1);
	assert_eq!(
		searches[0]["query"]["bool"]["should"][0],
		serde_json::json!({ "bool": { "filter": [
			{ "term": { "study_id": "phs001" } },
			{ "terms": { "participant_id": ["P-1", "P-3"] } }
		] } })
	);
	assert_eq!(
		searches[0]["_source"]["includes"],
		serde_json::json!(["id", "participant_id", "study_id"])
	);
}

#[tokio::test]
async fn no_pairs_means_no_query() {
	let backend = Arc::new(ScriptedBackend::new(catalog()));
	let service = super::build_service(backend.clone(), None, false);

	assert!(service.correlate(&[]).await.expect("Correlation failed.").is_empty());
	assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn listed_participants_carry_tagged_associations() {
	let backend = Arc::new(ScriptedBackend::new(catalog()));
	let enrichment = StubEnrichment {
		records: vec![
			AssociatedRecord {
				participant_id: "P-1".to_string(),
				study_id: "phs001".to_string(),
				cpi_data: vec![associated("P-2", "phs002"), associated("EXT-9", "phs999")],
			},
			AssociatedRecord {
				participant_id: "P-9".to_string(),
				study_id: "phs001".to_string(),
				cpi_data: Vec::new(),
			},
		],
	};
	let service = super::build_service(backend, Some(Arc::new(enrichment)), false);
	let page = service
		.list(Entity::Participants, &ListingParams::default())
		.await
		.expect("Listing failed.");

	assert_eq!(page.enrichment, Some(EnrichmentOutcome::Applied));

	let tagged = &page.rows[0]["cpi_data"];

	assert_eq!(tagged[0]["p_id"], "p-2");
	assert_eq!(tagged[0]["data_type"], "internal");
	assert_eq!(tagged[0]["domain_category"], "organization");
	assert!(tagged[1]["p_id"].is_null());
	assert_eq!(tagged[1]["data_type"], "external");
	assert!(page.rows[1].get("cpi_data").is_none());
	assert!(page.rows[2].get("cpi_data").is_none());
}

#[tokio::test]
async fn enrichment_failure_degrades_to_base_rows() {
	let backend = Arc::new(ScriptedBackend::new(catalog()));
	let service = super::build_service(backend, Some(Arc::new(FailingEnrichment)), false);
	let page = service
		.list(Entity::Participants, &ListingParams::default())
		.await
		.expect("Listing must survive enrichment failure.");

	assert_eq!(page.rows.len(), 3);
	assert!(matches!(page.enrichment, Some(EnrichmentOutcome::Failed { .. })));
	assert!(page.rows.iter().all(|row| row.get("cpi_data").is_none()));
}
