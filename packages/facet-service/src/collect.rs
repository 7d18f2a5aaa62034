//! Turns raw store responses into rows and buckets.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
	Error, Result,
	aggregation::{
		CARDINALITY_AGG, CORRECTION_AGG, NESTED_TERMS_AGG, REVERSE_NESTED_AGG, STATS_AGG,
		STATS_SCOPE_AGG,
	},
};

/// One facet value and how many entities carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
	pub group: String,
	pub subjects: u64,
}
impl Bucket {
	pub fn new(group: impl Into<String>, subjects: u64) -> Self {
		Self { group: group.into(), subjects }
	}
}

/// Observed bounds of a numeric field plus the number of entities with a known value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSummary {
	pub lower_bound: i64,
	pub subjects: u64,
	pub upper_bound: i64,
}

/// Which number in a bucket is its count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountSource {
	DocCount,
	Cardinality,
}
impl CountSource {
	/// Buckets with a cardinality sub-aggregation count distinct values of it.
	pub fn for_cardinality(cardinality: Option<&str>) -> Self {
		if cardinality.is_some() { Self::Cardinality } else { Self::DocCount }
	}
}

pub fn collect_buckets(response: &Value, agg: &str, source: CountSource) -> Result<Vec<Bucket>> {
	let mut buckets = Vec::new();

	for raw in raw_buckets(aggregation(response, agg)?, agg)? {
		let group = bucket_key(raw)?;

		if group.is_empty() {
			continue;
		}

		let subjects = match source {
			CountSource::DocCount => doc_count(raw)?,
			CountSource::Cardinality => raw
				.get(CARDINALITY_AGG)
				.and_then(|card| card.get("value"))
				.and_then(Value::as_u64)
				.ok_or_else(|| malformed(format!("Bucket {group} in {agg} has no cardinality.")))?,
		};

		buckets.push(Bucket { group, subjects });
	}

	Ok(buckets)
}

/// Bucket labels in store order, empty labels dropped.
pub fn collect_bucket_keys(response: &Value, agg: &str) -> Result<Vec<String>> {
	let mut keys = Vec::new();

	for raw in raw_buckets(aggregation(response, agg)?, agg)? {
		let key = bucket_key(raw)?;

		if !key.is_empty() {
			keys.push(key);
		}
	}

	Ok(keys)
}

pub fn collect_range_summary(response: &Value) -> Result<RangeSummary> {
	let stats = aggregation(response, STATS_SCOPE_AGG)?
		.get(STATS_AGG)
		.ok_or_else(|| malformed(format!("Aggregation {STATS_SCOPE_AGG} has no {STATS_AGG}.")))?;
	let count = stats.get("count").and_then(Value::as_u64).unwrap_or(0);

	if count == 0 {
		return Ok(RangeSummary::default());
	}

	let bound = |key: &str| {
		stats
			.get(key)
			.and_then(Value::as_f64)
			.map(|value| value.round() as i64)
			.ok_or_else(|| malformed(format!("Stats aggregation has no numeric {key}.")))
	};

	Ok(RangeSummary { lower_bound: bound("min")?, subjects: count, upper_bound: bound("max")? })
}

/// Exact parent counts from a nested terms aggregation with a reverse-nested step.
pub fn collect_reverse_nested(response: &Value) -> Result<Vec<Bucket>> {
	let inner = aggregation(response, CORRECTION_AGG)?
		.get(NESTED_TERMS_AGG)
		.ok_or_else(|| {
			malformed(format!("Aggregation {CORRECTION_AGG} has no {NESTED_TERMS_AGG}."))
		})?;
	let mut buckets = Vec::new();

	for raw in raw_buckets(inner, NESTED_TERMS_AGG)? {
		let group = bucket_key(raw)?;

		if group.is_empty() {
			continue;
		}

		let subjects = raw
			.get(REVERSE_NESTED_AGG)
			.map(doc_count)
			.transpose()?
			.ok_or_else(|| malformed(format!("Bucket {group} has no {REVERSE_NESTED_AGG} count.")))?;

		buckets.push(Bucket { group, subjects });
	}

	Ok(buckets)
}

pub fn collect_sum(response: &Value, agg: &str) -> Result<u64> {
	let value = aggregation(response, agg)?
		.get("value")
		.and_then(Value::as_f64)
		.ok_or_else(|| malformed(format!("Aggregation {agg} has no numeric value.")))?;

	Ok(value.max(0.0).round() as u64)
}

pub fn hits(response: &Value) -> Result<&[Value]> {
	response
		.get("hits")
		.and_then(|hits| hits.get("hits"))
		.and_then(Value::as_array)
		.map(Vec::as_slice)
		.ok_or_else(|| malformed("Response has no hits.hits array.".to_string()))
}

/// `hits.total.value`, or the bare number older stores return.
pub fn total_hits(response: &Value) -> Result<u64> {
	let total = response
		.get("hits")
		.and_then(|hits| hits.get("total"))
		.ok_or_else(|| malformed("Response has no hits.total.".to_string()))?;

	total
		.get("value")
		.and_then(Value::as_u64)
		.or_else(|| total.as_u64())
		.ok_or_else(|| malformed("hits.total is not a count.".to_string()))
}

/// Maps each hit's `_source` through `(display, storage)` pairs. Missing fields become null.
pub fn project_rows(hits: &[Value], projection: &[(&str, &str)]) -> Result<Vec<Map<String, Value>>> {
	hits.iter()
		.map(|hit| -> Result<Map<String, Value>> {
			let source = hit
				.get("_source")
				.and_then(Value::as_object)
				.ok_or_else(|| malformed("Hit has no _source object.".to_string()))?;

			Ok(projection
				.iter()
				.map(|(display, storage)| {
					(display.to_string(), source.get(*storage).cloned().unwrap_or(Value::Null))
				})
				.collect())
		})
		.collect()
}

pub fn scroll_id(response: &Value) -> Option<String> {
	response.get("_scroll_id").and_then(Value::as_str).map(str::to_string)
}

fn aggregation<'a>(response: &'a Value, agg: &str) -> Result<&'a Value> {
	response
		.get("aggregations")
		.and_then(|aggs| aggs.get(agg))
		.ok_or_else(|| malformed(format!("Response has no aggregation named {agg}.")))
}

fn raw_buckets<'a>(agg_value: &'a Value, agg: &str) -> Result<&'a [Value]> {
	agg_value
		.get("buckets")
		.and_then(Value::as_array)
		.map(Vec::as_slice)
		.ok_or_else(|| malformed(format!("Aggregation {agg} has no buckets array.")))
}

fn bucket_key(raw: &Value) -> Result<String> {
	if let Some(text) = raw.get("key_as_string").and_then(Value::as_str) {
		return Ok(text.to_string());
	}

	match raw.get("key") {
		Some(Value::String(key)) => Ok(key.clone()),
		Some(Value::Number(key)) => Ok(key.to_string()),
		Some(Value::Bool(key)) => Ok(key.to_string()),
		_ => Err(malformed("Bucket has no scalar key.".to_string())),
	}
}

fn doc_count(raw: &Value) -> Result<u64> {
	raw.get("doc_count")
		.and_then(Value::as_u64)
		.ok_or_else(|| malformed("Bucket has no doc_count.".to_string()))
}

fn malformed(message: String) -> Error {
	Error::MalformedResponse { message }
}
