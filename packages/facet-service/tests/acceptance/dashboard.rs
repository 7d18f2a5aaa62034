use std::sync::Arc;

use facet_service::{Bucket, FacetCount, FilterParams, RangeSummary, RoutingTable};

use super::ScriptedBackend;

fn filter_params(value: serde_json::Value) -> FilterParams {
	FilterParams::from_map(&super::params(value), &RoutingTable::new())
		.expect("Failed to parse filter params.")
}

fn treatment_backend() -> ScriptedBackend {
	ScriptedBackend::new(super::participant_rows(3))
		.with_count(7)
		.with_aggregation(
			"treatments/treatment_type",
			serde_json::json!({ "buckets": [
				{ "key": "Chemotherapy", "doc_count": 9000, "cardinality_count": { "value": 3100 } },
				{ "key": "Radiation Therapy", "doc_count": 2000, "cardinality_count": { "value": 1400 } },
				{ "key": "", "doc_count": 12, "cardinality_count": { "value": 12 } }
			] }),
		)
		.with_aggregation(
			"participants/facetAgg",
			serde_json::json!({
				"doc_count": 9000,
				"agg_buckets": { "buckets": [
					{ "key": "Chemotherapy", "doc_count": 9000, "top_reverse_nested": { "doc_count": 2950 } }
				] }
			}),
		)
		.with_aggregation("participants/file_count", serde_json::json!({ "value": 42.0 }))
		.with_aggregation(
			"files/study_id",
			serde_json::json!({ "buckets": [
				{ "key": "phs001", "doc_count": 5 },
				{ "key": "phs002", "doc_count": 1 }
			] }),
		)
		.with_aggregation(
			"diagnosis/inner",
			serde_json::json!({
				"doc_count": 4,
				"range_stats": { "count": 4, "min": 30.0, "max": 6000.0 }
			}),
		)
}

#[tokio::test]
async fn correction_changes_only_flagged_buckets() {
	let backend = Arc::new(treatment_backend());
	let service = super::build_service(backend.clone(), None, false);
	let dashboard =
		service.dashboard(&FilterParams::new()).await.expect("Dashboard computation failed.");

	assert_eq!(
		dashboard.filter_counts["treatment_type"],
		FacetCount::Buckets(vec![
			Bucket::new("Chemotherapy", 2950),
			Bucket::new("Radiation Therapy", 1400)
		])
	);

	let corrections: Vec<_> = backend
		.searches_on("participants")
		.into_iter()
		.filter(|body| body["aggs"].get("facetAgg").is_some())
		.collect();

	assert_eq!(corrections.len(), 1);
	assert_eq!(corrections[0]["aggs"]["facetAgg"]["nested"]["path"], "treatment_filters");
	assert_eq!(
		corrections[0]["aggs"]["facetAgg"]["aggs"]["agg_buckets"]["terms"]["include"],
		serde_json::json!(["Chemotherapy"])
	);
}

#[tokio::test]
async fn totals_and_range_facets() {
	let backend = Arc::new(treatment_backend());
	let service = super::build_service(backend.clone(), None, false);
	let dashboard =
		service.dashboard(&FilterParams::new()).await.expect("Dashboard computation failed.");

	assert_eq!(dashboard.totals.number_of_participants, 3);
	assert_eq!(dashboard.totals.participants_file_count, 42);
	assert_eq!(dashboard.totals.number_of_studies, 2);
	assert_eq!(dashboard.totals.number_of_files, 7);
	assert_eq!(dashboard.totals.files_file_count, 7);
	assert_eq!(
		dashboard.filter_counts["age_at_diagnosis"],
		FacetCount::Range(RangeSummary { lower_bound: 30, subjects: 4, upper_bound: 6000 })
	);
	assert_eq!(
		dashboard.filter_counts["age_at_response"],
		FacetCount::Range(RangeSummary::default())
	);
	assert!(dashboard.widgets.contains_key("age_at_diagnosis"));
	assert!(!dashboard.widgets.contains_key("file_type"));

	let totals = backend.searches_on("participants");

	assert!(totals.iter().any(|body| body["track_total_hits"] == 10_000_000));
}

#[tokio::test]
async fn constrained_widget_is_restricted_to_selection() {
	let backend = Arc::new(treatment_backend());
	let service = super::build_service(backend.clone(), None, false);

	service
		.dashboard(&filter_params(serde_json::json!({ "race": ["Asian"] })))
		.await
		.expect("Dashboard computation failed.");

	let race_requests: Vec<_> = backend
		.searches_on("participants")
		.into_iter()
		.filter(|body| body["aggs"].get("race").is_some())
		.collect();

	assert_eq!(race_requests.len(), 2);
	assert!(race_requests.iter().any(|body| {
		body["query"] == serde_json::json!({ "match_all": {} })
			&& body["aggs"]["race"]["terms"].get("include").is_none()
	}));
	assert!(race_requests.iter().any(|body| {
		body["aggs"]["race"]["terms"]["include"] == serde_json::json!(["Asian"])
	}));
}

#[tokio::test]
async fn repeated_selection_is_served_from_cache() {
	let backend = Arc::new(treatment_backend());
	let service = super::build_service(backend.clone(), None, true);
	let first = service
		.dashboard(&filter_params(serde_json::json!({ "race": ["White", "Asian"] })))
		.await
		.expect("First dashboard failed.");
	let issued = backend.requests().len();
	let second = service
		.dashboard(&filter_params(serde_json::json!({ "race": ["Asian", "White"] })))
		.await
		.expect("Second dashboard failed.");

	assert_eq!(first, second);
	assert_eq!(backend.requests().len(), issued);
}

#[tokio::test]
async fn imported_worklist_bypasses_cache() {
	let backend = Arc::new(treatment_backend());
	let service = super::build_service(backend.clone(), None, true);
	let params = filter_params(serde_json::json!({
		"import_data": [{ "study_id": "phs001", "participant_id": ["P-01"] }]
	}));

	service.dashboard(&params).await.expect("First dashboard failed.");

	let issued = backend.requests().len();

	service.dashboard(&params).await.expect("Second dashboard failed.");

	assert_eq!(backend.requests().len(), issued * 2);
}

#[tokio::test]
async fn failing_sub_request_fails_the_dashboard() {
	let backend = Arc::new(treatment_backend().failing_on("samples"));
	let service = super::build_service(backend, None, false);
	let err = service
		.dashboard(&FilterParams::new())
		.await
		.expect_err("Expected upstream failure.");

	assert!(matches!(err, facet_service::Error::UpstreamUnavailable { .. }));
}

#[tokio::test]
async fn invalid_range_is_rejected_before_any_request() {
	let err = FilterParams::from_map(
		&super::params(serde_json::json!({ "age_at_diagnosis": [null, null] })),
		&RoutingTable::new(),
	)
	.expect_err("Expected invalid range.");

	assert!(matches!(err, facet_service::Error::InvalidRange { .. }));
}
