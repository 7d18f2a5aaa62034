//! Side-by-side bucket distributions for up to three caller-defined cohorts.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
	FacetService, Result,
	aggregation::{self, SearchBody},
	collect::{self, Bucket, CountSource},
	params::FilterParams,
	query,
	schema::IndexKind,
};

pub const FEW_LIMIT: usize = 5;
pub const MANY_LIMIT: usize = 20;
pub const OTHER_FEW: &str = "OtherFew";
pub const OTHER_MANY: &str = "OtherMany";

// (property, index, cardinality field)
const CHART_PROPERTIES: &[(&str, IndexKind, Option<&str>)] = &[
	("race", IndexKind::Participants, None),
	("sex_at_birth", IndexKind::Participants, None),
	("dbgap_accession", IndexKind::Participants, None),
	("study_name", IndexKind::Participants, None),
	("study_acronym", IndexKind::Participants, None),
	("treatment_type", IndexKind::Treatments, Some("pid")),
	("treatment_agent", IndexKind::Treatments, Some("pid")),
	("response", IndexKind::TreatmentResponses, Some("pid")),
	("response_category", IndexKind::TreatmentResponses, Some("pid")),
	("diagnosis", IndexKind::Diagnosis, Some("pid")),
	("diagnosis_anatomic_site", IndexKind::Diagnosis, Some("pid")),
	("disease_phase", IndexKind::Diagnosis, Some("pid")),
	("diagnosis_classification_system", IndexKind::Diagnosis, Some("pid")),
	("last_known_survival_status", IndexKind::Survivals, Some("pid")),
	("first_event", IndexKind::Survivals, Some("pid")),
	("sample_anatomic_site", IndexKind::Samples, Some("pid")),
	("sample_tumor_status", IndexKind::Samples, Some("pid")),
	("tumor_classification", IndexKind::Samples, Some("pid")),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
	#[default]
	Count,
	Percentage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRequest {
	pub property: String,
	#[serde(rename = "type", default)]
	pub kind: ChartKind,
}

/// Up to three cohorts of participant ids plus the charts to draw for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortChartsRequest {
	#[serde(default)]
	pub c1: Vec<String>,
	#[serde(default)]
	pub c2: Vec<String>,
	#[serde(default)]
	pub c3: Vec<String>,
	#[serde(default)]
	pub charts: Vec<ChartRequest>,
}
impl CohortChartsRequest {
	/// Non-empty cohorts in name order.
	pub fn cohorts(&self) -> Vec<(&'static str, &[String])> {
		[("c1", &self.c1), ("c2", &self.c2), ("c3", &self.c3)]
			.into_iter()
			.filter(|(_, ids)| !ids.is_empty())
			.map(|(name, ids)| (name, ids.as_slice()))
			.collect()
	}

	/// Every id across all cohorts, first occurrence kept.
	pub fn union(&self) -> Vec<String> {
		let mut seen: HashSet<&str> = HashSet::new();
		let mut union = Vec::new();

		for (_, ids) in self.cohorts() {
			for id in ids {
				if seen.insert(id.as_str()) {
					union.push(id.clone());
				}
			}
		}

		union
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
	pub group: String,
	pub subjects: f64,
}

/// One cohort's distribution in both truncations: top five plus `OtherFew`, top twenty plus
/// `OtherMany`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
	pub cohort: String,
	pub few: Vec<ChartPoint>,
	pub many: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortChart {
	pub property: String,
	pub cohorts: Vec<ChartSeries>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChartProperty {
	index: IndexKind,
	cardinality: Option<&'static str>,
}

fn chart_property(property: &str) -> Option<ChartProperty> {
	CHART_PROPERTIES
		.iter()
		.find(|(name, _, _)| *name == property)
		.map(|(_, index, cardinality)| ChartProperty { index: *index, cardinality: *cardinality })
}

/// Field that identifies a participant on `index`.
pub fn membership_field(index: IndexKind) -> &'static str {
	if index == IndexKind::Participants { "id" } else { "pid" }
}

/// Lays `counts` over the combined ranking and keeps the first `limit` labels. The rest fold
/// into `other`, which only appears when something was folded.
pub fn truncate(
	ranked: &[String],
	counts: &HashMap<String, u64>,
	limit: usize,
	other: &str,
) -> Vec<Bucket> {
	let count = |label: &String| counts.get(label).copied().unwrap_or(0);
	let mut buckets: Vec<Bucket> =
		ranked.iter().take(limit).map(|label| Bucket::new(label.clone(), count(label))).collect();

	if ranked.len() > limit {
		buckets.push(Bucket::new(other, ranked[limit..].iter().map(count).sum()));
	}

	buckets
}

/// Orders buckets by count, largest first. Equal counts order by label.
pub fn rank(buckets: &mut [Bucket]) {
	buckets.sort_by(|left, right| {
		right.subjects.cmp(&left.subjects).then_with(|| left.group.cmp(&right.group))
	});
}

/// Raw counts, or shares of `total` in percent. A zero total yields zero shares.
pub fn scale(buckets: Vec<Bucket>, kind: ChartKind, total: u64) -> Vec<ChartPoint> {
	buckets
		.into_iter()
		.map(|bucket| {
			let subjects = match kind {
				ChartKind::Count => bucket.subjects as f64,
				ChartKind::Percentage if total == 0 => 0.0,
				ChartKind::Percentage => bucket.subjects as f64 / total as f64 * 100.0,
			};

			ChartPoint { group: bucket.group, subjects }
		})
		.collect()
}

impl FacetService {
	/// Charts in request order. Unknown properties are skipped.
	pub async fn cohort_charts(&self, request: &CohortChartsRequest) -> Result<Vec<CohortChart>> {
		let cohorts = request.cohorts();

		if cohorts.is_empty() || request.charts.is_empty() {
			return Ok(Vec::new());
		}

		let union = request.union();
		let mut charts = Vec::with_capacity(request.charts.len());

		for chart in &request.charts {
			let Some(property) = chart_property(&chart.property) else {
				tracing::warn!(property = %chart.property, "Skipping unknown chart property.");

				continue;
			};

			charts.push(self.cohort_chart(chart, property, &cohorts, &union).await?);
		}

		Ok(charts)
	}

	async fn cohort_chart(
		&self,
		chart: &ChartRequest,
		property: ChartProperty,
		cohorts: &[(&'static str, &[String])],
		union: &[String],
	) -> Result<CohortChart> {
		let mut ranked = self.property_buckets(&chart.property, property, union).await?;

		rank(&mut ranked);

		let ranked: Vec<String> = ranked.into_iter().map(|bucket| bucket.group).collect();
		let total = match chart.kind {
			ChartKind::Count => 0,
			ChartKind::Percentage => self.cohort_size(union).await?,
		};
		let tasks = cohorts
			.iter()
			.map(|(_, ids)| self.property_buckets(&chart.property, property, ids))
			.collect();
		let per_cohort = self.fan_out(tasks).await?;
		let series = cohorts
			.iter()
			.zip(per_cohort)
			.map(|((name, _), buckets)| {
				let counts: HashMap<String, u64> =
					buckets.into_iter().map(|bucket| (bucket.group, bucket.subjects)).collect();

				ChartSeries {
					cohort: name.to_string(),
					few: scale(truncate(&ranked, &counts, FEW_LIMIT, OTHER_FEW), chart.kind, total),
					many: scale(truncate(&ranked, &counts, MANY_LIMIT, OTHER_MANY), chart.kind, total),
				}
			})
			.collect();

		Ok(CohortChart { property: chart.property.clone(), cohorts: series })
	}

	async fn property_buckets(
		&self,
		field: &str,
		property: ChartProperty,
		ids: &[String],
	) -> Result<Vec<Bucket>> {
		let params =
			FilterParams::new().with_terms(membership_field(property.index), ids.iter().cloned());
		let tree = query::compile(&self.routing, &params, property.index)?;
		let body =
			aggregation::with_term_aggregation(tree, field, property.cardinality, &[], self.limits());
		let response = self.search(property.index, &body).await?;

		collect::collect_buckets(&response, field, CountSource::for_cardinality(property.cardinality))
	}

	async fn cohort_size(&self, union: &[String]) -> Result<u64> {
		let params = FilterParams::new()
			.with_terms(membership_field(IndexKind::Participants), union.iter().cloned());
		let tree = query::compile(&self.routing, &params, IndexKind::Participants)?;

		self.count(IndexKind::Participants, &SearchBody::aggregations_only(tree)).await
	}
}
