use std::sync::Arc;

use facet_service::{EnrichmentOutcome, Entity, ListingParams, Page, RoutingTable};

use super::ScriptedBackend;

fn listing_params(value: serde_json::Value) -> ListingParams {
	ListingParams::from_map(&super::params(value), &RoutingTable::new())
		.expect("Failed to parse listing params.")
}

fn participant_ids(rows: &[serde_json::Value]) -> Vec<&str> {
	rows.iter().filter_map(|row| row["participant_id"].as_str()).collect()
}

#[tokio::test]
async fn page_past_the_end_is_short_then_empty() {
	let backend = Arc::new(ScriptedBackend::new(super::participant_rows(12)));
	let service = super::build_service(backend.clone(), None, false);
	let tail = service
		.list(Entity::Participants, &listing_params(serde_json::json!({ "first": 5, "offset": 10 })))
		.await
		.expect("Listing failed.");

	assert_eq!(participant_ids(&tail.rows), vec!["P-10", "P-11"]);
	assert_eq!(tail.enrichment, Some(EnrichmentOutcome::Skipped));

	for offset in [12, 40] {
		let mut params = ListingParams::default();

		params.page = Page { size: 5, offset };

		let page = service.list(Entity::Participants, &params).await.expect("Listing failed.");

		assert!(page.rows.is_empty());
	}
}

#[tokio::test]
async fn rows_use_display_names_without_filter_documents() {
	let backend = Arc::new(ScriptedBackend::new(super::participant_rows(1)));
	let service = super::build_service(backend.clone(), None, false);
	let page = service
		.list(Entity::Participants, &ListingParams::default())
		.await
		.expect("Listing failed.");
	let row = page.rows[0].as_object().expect("Row must be an object.");

	assert_eq!(row["race"], "Asian");
	assert!(!row.contains_key("race_str"));
	assert!(!row.contains_key("sample_diagnosis_file_filters"));
	assert_eq!(
		backend.searches_on("participants")[0]["_source"]["excludes"][0],
		"sample_diagnosis_file_filters"
	);
}

#[tokio::test]
async fn unknown_sort_key_uses_default_order() {
	let backend = Arc::new(ScriptedBackend::new(super::participant_rows(3)));
	let service = super::build_service(backend.clone(), None, false);

	service
		.list(
			Entity::Participants,
			&listing_params(serde_json::json!({ "order_by": "favourite_colour" })),
		)
		.await
		.expect("Listing with unknown sort key failed.");
	service
		.list(
			Entity::Participants,
			&listing_params(serde_json::json!({ "order_by": "race", "sort_direction": "DESC" })),
		)
		.await
		.expect("Listing with aliased sort key failed.");

	let searches = backend.searches_on("participants");

	assert_eq!(searches[0]["sort"], serde_json::json!([{ "participant_id": "asc" }]));
	assert_eq!(searches[1]["sort"], serde_json::json!([{ "race_str": "desc" }]));
}

#[tokio::test]
async fn deep_pages_walk_a_scroll_cursor() {
	let backend = Arc::new(ScriptedBackend::new(super::participant_rows(12)));
	let cfg = super::test_config(5);
	let service = facet_service::FacetService::with_parts(
		cfg,
		backend.clone(),
		None,
		Arc::new(facet_service::NoCache),
	);
	let page = service
		.list(Entity::Participants, &listing_params(serde_json::json!({ "first": 3, "offset": 4 })))
		.await
		.expect("Deep listing failed.");

	assert_eq!(participant_ids(&page.rows), vec!["P-04", "P-05", "P-06"]);

	let opened: Vec<_> =
		backend.requests().into_iter().filter(|recorded| recorded.op == "open_scroll").collect();

	assert_eq!(opened.len(), 1);
	assert_eq!(opened[0].body["size"], 5);
	assert!(opened[0].body.get("from").is_none());
	assert_eq!(backend.cleared(), vec!["scroll-1".to_string()]);
}

#[tokio::test]
async fn unbounded_deep_page_returns_the_remainder() {
	let backend = Arc::new(ScriptedBackend::new(super::participant_rows(12)));
	let service = facet_service::FacetService::with_parts(
		super::test_config(5),
		backend.clone(),
		None,
		Arc::new(facet_service::NoCache),
	);
	let params = ListingParams {
		page: Page { size: u64::MAX, offset: 5 },
		..Default::default()
	};
	let page = service.list(Entity::Participants, &params).await.expect("Deep listing failed.");

	assert_eq!(
		participant_ids(&page.rows),
		vec!["P-05", "P-06", "P-07", "P-08", "P-09", "P-10", "P-11"]
	);
	assert_eq!(backend.cleared(), vec!["scroll-1".to_string()]);
}

#[tokio::test]
async fn cohort_metadata_groups_by_accession() {
	let documents = vec![
		serde_json::json!({
			"participant_id": "P-1",
			"dbgap_accession": "phs2",
			"survivals": [
				{ "age_at_last_known_survival_status": null },
				{ "age_at_last_known_survival_status": 40 }
			]
		}),
		serde_json::json!({ "participant_id": "P-2", "dbgap_accession": "phs1", "survivals": [] }),
		serde_json::json!({ "participant_id": "P-3", "dbgap_accession": "phs2", "survivals": [] }),
	];
	let backend = Arc::new(ScriptedBackend::new(documents));
	let service = super::build_service(backend.clone(), None, false);
	let page = service
		.list(Entity::CohortMetadata, &ListingParams::default())
		.await
		.expect("Cohort metadata listing failed.");

	assert_eq!(page.rows.len(), 2);
	assert_eq!(page.rows[0]["dbgap_accession"], "phs2");
	assert_eq!(page.rows[0]["participants"][1]["participant_id"], "P-3");
	assert_eq!(
		page.rows[0]["participants"][0]["survivals"][0]["age_at_last_known_survival_status"],
		40
	);
	assert_eq!(backend.searches_on("cohorts").len(), 1);
}

#[tokio::test]
async fn study_overview_is_limited_to_studies_with_files() {
	let backend = Arc::new(
		ScriptedBackend::new(vec![serde_json::json!({ "study_id": "phs001" })]).with_aggregation(
			"files/study_id",
			serde_json::json!({ "buckets": [{ "key": "phs001", "doc_count": 3 }] }),
		),
	);
	let service = super::build_service(backend.clone(), None, false);

	service
		.list(
			Entity::StudyOverview,
			&listing_params(serde_json::json!({ "file_type": ["bam"] })),
		)
		.await
		.expect("Study overview listing failed.");

	let studies = backend.searches_on("studies");

	assert_eq!(
		studies[0]["query"],
		serde_json::json!({ "bool": { "filter": [{ "terms": { "study_id": ["phs001"] } }] } })
	);
}

#[tokio::test]
async fn store_failure_fails_the_listing() {
	let backend = Arc::new(ScriptedBackend::new(Vec::new()).failing_on("samples"));
	let service = super::build_service(backend, None, false);
	let err = service
		.list(Entity::Samples, &ListingParams::default())
		.await
		.expect_err("Expected upstream failure.");

	assert!(matches!(err, facet_service::Error::UpstreamUnavailable { .. }));
}
