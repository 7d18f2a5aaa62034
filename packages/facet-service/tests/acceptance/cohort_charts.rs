use std::sync::Arc;

use serde_json::Value;

use facet_service::{ChartKind, CohortChartsRequest};

use super::ScriptedBackend;

fn race_buckets(ids: &[Value]) -> Value {
	let buckets = match ids.len() {
		3 => serde_json::json!([
			{ "key": "Asian", "doc_count": 1 },
			{ "key": "White", "doc_count": 2 }
		]),
		2 => serde_json::json!([
			{ "key": "Asian", "doc_count": 1 },
			{ "key": "White", "doc_count": 1 }
		]),
		_ => serde_json::json!([{ "key": "White", "doc_count": 1 }]),
	};

	serde_json::json!({
		"hits": { "total": { "value": ids.len() }, "hits": [] },
		"aggregations": { "race": { "buckets": buckets } }
	})
}

fn cohort_backend() -> ScriptedBackend {
	ScriptedBackend::new(Vec::new()).with_count(3).with_responder(|index, body| {
		if index != "participants" || body["aggs"].get("race").is_none() {
			return None;
		}

		let ids = body["query"]["bool"]["filter"][0]["terms"]["id"].as_array()?;

		Some(race_buckets(ids))
	})
}

fn request(kind: &str) -> CohortChartsRequest {
	serde_json::from_value(serde_json::json!({
		"c1": ["p1", "p2"],
		"c2": ["p3"],
		"charts": [
			{ "property": "race", "type": kind },
			{ "property": "favourite_colour", "type": kind }
		]
	}))
	.expect("Failed to parse chart request.")
}

#[tokio::test]
async fn percentages_are_shares_of_the_combined_cohort() {
	let backend = Arc::new(cohort_backend());
	let service = super::build_service(backend.clone(), None, false);
	let charts = service
		.cohort_charts(&request("percentage"))
		.await
		.expect("Cohort charts failed.");

	assert_eq!(charts.len(), 1);
	assert_eq!(charts[0].property, "race");

	let first = &charts[0].cohorts[0];
	let second = &charts[0].cohorts[1];
	let third = 100.0 / 3.0;

	assert_eq!(first.cohort, "c1");
	assert_eq!(first.few[0].group, "White");
	assert!((first.few[0].subjects - third).abs() < 1e-9);
	assert!((first.few[1].subjects - third).abs() < 1e-9);
	assert_eq!(second.cohort, "c2");
	assert_eq!(second.few[1].group, "Asian");
	assert_eq!(second.few[1].subjects, 0.0);
	assert_eq!(first.few, first.many);

	let counts: Vec<_> =
		backend.requests().into_iter().filter(|recorded| recorded.op == "count").collect();

	assert_eq!(counts.len(), 1);
	assert_eq!(
		counts[0].body["query"]["bool"]["filter"][0]["terms"]["id"],
		serde_json::json!(["p1", "p2", "p3"])
	);
}

#[tokio::test]
async fn counts_keep_raw_values() {
	let backend = Arc::new(cohort_backend());
	let service = super::build_service(backend.clone(), None, false);
	let charts = service.cohort_charts(&request("count")).await.expect("Cohort charts failed.");
	let second = &charts[0].cohorts[1];

	assert_eq!(request("count").charts[0].kind, ChartKind::Count);
	assert_eq!(second.few[0].group, "White");
	assert_eq!(second.few[0].subjects, 1.0);
	assert!(backend.requests().iter().all(|recorded| recorded.op != "count"));
}

#[tokio::test]
async fn zero_total_yields_zero_percentages() {
	let backend = Arc::new(cohort_backend().with_count(0));
	let service = super::build_service(backend, None, false);
	let charts = service
		.cohort_charts(&request("percentage"))
		.await
		.expect("Cohort charts failed.");

	assert!(
		charts[0]
			.cohorts
			.iter()
			.flat_map(|series| series.few.iter().chain(series.many.iter()))
			.all(|point| point.subjects == 0.0)
	);
}

#[tokio::test]
async fn empty_cohorts_produce_no_charts() {
	let backend = Arc::new(cohort_backend());
	let service = super::build_service(backend.clone(), None, false);
	let request = CohortChartsRequest {
		charts: request("count").charts,
		..CohortChartsRequest::default()
	};

	assert!(service.cohort_charts(&request).await.expect("Cohort charts failed.").is_empty());
	assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn clinical_properties_filter_by_parent_id() {
	let backend = Arc::new(ScriptedBackend::new(Vec::new()));
	let service = super::build_service(backend.clone(), None, false);
	let request: CohortChartsRequest = serde_json::from_value(serde_json::json!({
		"c1": ["p1"],
		"charts": [{ "property": "treatment_type", "type": "count" }]
	}))
	.expect("Failed to parse chart request.");

	service.cohort_charts(&request).await.expect("Cohort charts failed.");

	let searches = backend.searches_on("treatments");

	assert_eq!(searches.len(), 2);
	assert_eq!(
		searches[0]["query"],
		serde_json::json!({ "bool": { "filter": [{ "terms": { "pid": ["p1"] } }] } })
	);
	assert_eq!(searches[0]["aggs"]["treatment_type"]["aggs"]["cardinality_count"]["cardinality"]["field"], "pid");
}
