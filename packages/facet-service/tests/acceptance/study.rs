use std::sync::Arc;

use facet_service::{Bucket, Error};

use super::ScriptedBackend;

#[tokio::test]
async fn unknown_study_is_not_found() {
	let backend = Arc::new(ScriptedBackend::new(Vec::new()));
	let service = super::build_service(backend.clone(), None, false);
	let err = service.study_summary("phs404").await.expect_err("Unknown study must fail.");

	assert!(matches!(err, Error::NotFound { .. }));
	assert_eq!(err.to_string(), "Not found: Study phs404 does not exist.");
	assert!(backend.searches_on("diagnosis").is_empty());
}

#[tokio::test]
async fn summary_corrects_large_data_categories() {
	let backend = Arc::new(
		ScriptedBackend::new(vec![serde_json::json!({
			"id": "s-1",
			"study_id": "phs001",
			"dbgap_accession": "phs001",
			"study_name": "Neuroblastoma Cohort"
		})])
		.with_aggregation(
			"files/data_category",
			serde_json::json!({ "buckets": [
				{ "key": "Sequencing", "doc_count": 2400, "cardinality_count": { "value": 800 } },
				{ "key": "Genomics", "doc_count": 40, "cardinality_count": { "value": 20 } }
			] }),
		)
		.with_aggregation(
			"diagnosis/diagnosis",
			serde_json::json!({ "buckets": [
				{ "key": "Neuroblastoma", "doc_count": 90, "cardinality_count": { "value": 30 } }
			] }),
		)
		.with_aggregation(
			"participants/facetAgg",
			serde_json::json!({
				"doc_count": 2400,
				"agg_buckets": { "buckets": [
					{ "key": "Sequencing", "doc_count": 2400, "top_reverse_nested": { "doc_count": 480 } }
				] }
			}),
		),
	);
	let service = super::build_service(backend.clone(), None, false);
	let summary = service.study_summary("phs001").await.expect("Study summary failed.");

	assert_eq!(summary.study["study_name"], "Neuroblastoma Cohort");
	assert_eq!(summary.diagnoses, vec![Bucket::new("Neuroblastoma", 30)]);
	assert!(summary.anatomic_sites.is_empty());
	assert_eq!(
		summary.data_categories,
		vec![Bucket::new("Sequencing", 480), Bucket::new("Genomics", 20)]
	);

	let studies = backend.searches_on("studies");

	assert_eq!(studies[0]["size"], 1);
	assert!(studies[0]["query"].to_string().contains("phs001"));
}
