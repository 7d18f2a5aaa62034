use serde_json::{Map, Value};

use crate::{params::SortDirection, query::Query};

pub const CARDINALITY_AGG: &str = "cardinality_count";
pub const STATS_SCOPE_AGG: &str = "inner";
pub const STATS_AGG: &str = "range_stats";
pub const NESTED_TERMS_AGG: &str = "agg_buckets";
pub const REVERSE_NESTED_AGG: &str = "top_reverse_nested";
pub const CORRECTION_AGG: &str = "facetAgg";

const DAYS_PER_YEAR: i64 = 365;
const CORRECTION_BUCKET_LIMIT: u32 = 1_000;

/// Age bands in whole years, `[from, to)`; `None` leaves the band open.
pub const AGE_BANDS: &[(&str, Option<i64>, Option<i64>)] = &[
	("0 - 4", Some(0), Some(5)),
	("5 - 9", Some(5), Some(10)),
	("10 - 14", Some(10), Some(15)),
	("15 - 19", Some(15), Some(20)),
	("20 - 29", Some(20), Some(30)),
	("> 29", Some(30), None),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationLimits {
	pub bucket_limit: u32,
	pub precision_threshold: u32,
}
impl AggregationLimits {
	pub fn from_config(cfg: &facet_config::Engine) -> Self {
		Self { bucket_limit: cfg.term_bucket_limit, precision_threshold: cfg.precision_threshold }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
	Terms { field: String, size: u32, include: Vec<String>, cardinality: Option<Cardinality> },
	Bands { field: String, cardinality: Option<Cardinality> },
	Stats { field: String },
	ReverseNested { path: String, field: String, include: Vec<String> },
	Sum { field: String },
}
impl Aggregation {
	pub fn to_value(&self) -> Value {
		match self {
			Self::Terms { field, size, include, cardinality } => {
				let mut terms = serde_json::json!({ "field": field, "size": size });

				if !include.is_empty() {
					terms["include"] = serde_json::json!(include);
				}

				with_cardinality(serde_json::json!({ "terms": terms }), cardinality.as_ref())
			},
			Self::Bands { field, cardinality } => {
				let ranges: Vec<Value> = AGE_BANDS
					.iter()
					.map(|(key, from, to)| {
						let mut band = serde_json::json!({ "key": key });

						if let Some(from) = from {
							band["from"] = Value::from(from * DAYS_PER_YEAR);
						}
						if let Some(to) = to {
							band["to"] = Value::from(to * DAYS_PER_YEAR);
						}

						band
					})
					.collect();

				with_cardinality(
					serde_json::json!({ "range": { "field": field, "ranges": ranges } }),
					cardinality.as_ref(),
				)
			},
			Self::Stats { field } => {
				let mut scope = Map::new();

				scope.insert(field.clone(), serde_json::json!({ "gt": -1 }));

				serde_json::json!({
					"filter": { "range": scope },
					"aggs": { STATS_AGG: { "stats": { "field": field } } }
				})
			},
			Self::ReverseNested { path, field, include } => {
				let mut terms = serde_json::json!({
					"field": format!("{path}.{field}"),
					"size": CORRECTION_BUCKET_LIMIT,
				});

				if !include.is_empty() {
					terms["include"] = serde_json::json!(include);
				}

				serde_json::json!({
					"nested": { "path": path },
					"aggs": {
						NESTED_TERMS_AGG: {
							"terms": terms,
							"aggs": { REVERSE_NESTED_AGG: { "reverse_nested": {} } }
						}
					}
				})
			},
			Self::Sum { field } => serde_json::json!({ "sum": { "field": field } }),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cardinality {
	pub field: String,
	pub precision_threshold: u32,
}

/// Which `_source` fields hits carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFilter {
	Include(&'static [&'static str]),
	Exclude(&'static [&'static str]),
}
impl SourceFilter {
	fn to_value(self) -> Value {
		match self {
			Self::Include(fields) => serde_json::json!({ "includes": fields }),
			Self::Exclude(fields) => serde_json::json!({ "excludes": fields }),
		}
	}
}

/// A complete search request body.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchBody {
	pub query: Query,
	pub size: u64,
	pub from: Option<u64>,
	pub sort: Vec<(String, SortDirection)>,
	pub source: Option<SourceFilter>,
	pub source_fields: Vec<String>,
	pub aggs: Vec<(String, Aggregation)>,
	pub track_total_hits: Option<u64>,
}
impl SearchBody {
	/// Body returning only aggregations.
	pub fn aggregations_only(query: Query) -> Self {
		Self {
			query,
			size: 0,
			from: None,
			sort: Vec::new(),
			source: None,
			source_fields: Vec::new(),
			aggs: Vec::new(),
			track_total_hits: None,
		}
	}

	pub fn hits(query: Query, from: u64, size: u64) -> Self {
		Self { size, from: Some(from), ..Self::aggregations_only(query) }
	}

	pub fn with_aggregation(mut self, name: &str, aggregation: Aggregation) -> Self {
		self.aggs.push((name.to_string(), aggregation));

		self
	}

	pub fn to_value(&self) -> Value {
		let mut body = Map::new();

		body.insert("query".to_string(), self.query.to_value());
		body.insert("size".to_string(), Value::from(self.size));

		if let Some(from) = self.from {
			body.insert("from".to_string(), Value::from(from));
		}
		if !self.sort.is_empty() {
			let sort = self
				.sort
				.iter()
				.map(|(field, direction)| {
					let mut entry = Map::new();

					entry.insert(field.clone(), Value::from(direction.as_str()));

					Value::Object(entry)
				})
				.collect();

			body.insert("sort".to_string(), Value::Array(sort));
		}
		if let Some(source) = self.source {
			body.insert("_source".to_string(), source.to_value());
		} else if !self.source_fields.is_empty() {
			body.insert("_source".to_string(), serde_json::json!(self.source_fields));
		}
		if !self.aggs.is_empty() {
			let aggs = self
				.aggs
				.iter()
				.map(|(name, aggregation)| (name.clone(), aggregation.to_value()))
				.collect();

			body.insert("aggs".to_string(), Value::Object(aggs));
		}
		if let Some(track) = self.track_total_hits {
			body.insert("track_total_hits".to_string(), Value::from(track));
		}

		Value::Object(body)
	}

	/// Body accepted by the count endpoint.
	pub fn count_value(&self) -> Value {
		serde_json::json!({ "query": self.query.to_value() })
	}
}

/// Term aggregation named after `field`, optionally deduplicated by `cardinality` and restricted
/// to `restrict` values.
pub fn with_term_aggregation(
	query: Query,
	field: &str,
	cardinality: Option<&str>,
	restrict: &[String],
	limits: AggregationLimits,
) -> SearchBody {
	SearchBody::aggregations_only(query).with_aggregation(
		field,
		Aggregation::Terms {
			field: field.to_string(),
			size: limits.bucket_limit,
			include: restrict.to_vec(),
			cardinality: cardinality.map(|field| Cardinality {
				field: field.to_string(),
				precision_threshold: limits.precision_threshold,
			}),
		},
	)
}

/// Min/max/count over the known values of a numeric field.
pub fn with_range_aggregation(query: Query, field: &str) -> SearchBody {
	SearchBody::aggregations_only(query)
		.with_aggregation(STATS_SCOPE_AGG, Aggregation::Stats { field: field.to_string() })
}

/// Fixed age-band counts, optionally deduplicated by `cardinality`.
pub fn with_cardinality_range_aggregation(
	query: Query,
	field: &str,
	cardinality: Option<&str>,
	limits: AggregationLimits,
) -> SearchBody {
	SearchBody::aggregations_only(query).with_aggregation(
		field,
		Aggregation::Bands {
			field: field.to_string(),
			cardinality: cardinality.map(|field| Cardinality {
				field: field.to_string(),
				precision_threshold: limits.precision_threshold,
			}),
		},
	)
}

fn with_cardinality(mut agg: Value, cardinality: Option<&Cardinality>) -> Value {
	if let Some(cardinality) = cardinality {
		agg["aggs"] = serde_json::json!({
			CARDINALITY_AGG: {
				"cardinality": {
					"field": cardinality.field,
					"precision_threshold": cardinality.precision_threshold,
				}
			}
		});
	}

	agg
}
