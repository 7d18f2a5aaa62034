//! The participant dashboard: headline totals, per-facet filter counts and widget distributions
//! for one filter selection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
	FacetService, Result,
	aggregation::{self, Aggregation, SearchBody},
	cache,
	collect::{self, Bucket, CountSource, RangeSummary},
	correction::{FacetCounts, ThresholdTable},
	params::FilterParams,
	query,
	schema::IndexKind,
};

const DASHBOARD_CACHE_KIND: &str = "participant_dashboard";
const FILE_COUNT_AGG: &str = "file_count";
const TRACK_TOTAL_HITS: u64 = 10_000_000;
const STUDY_ID_FIELD: &str = "study_id";
/// Widgets for these fields only show the selected values while the field is constrained.
const INCLUDE_RESTRICTED: &[&str] = &["race", "data_category"];

/// One dashboard facet: where its values live, how entities are deduplicated, and whether it
/// also drives a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Facet {
	pub field: &'static str,
	pub index: IndexKind,
	pub cardinality: Option<&'static str>,
	pub widget: bool,
}

const fn facet(
	field: &'static str,
	index: IndexKind,
	cardinality: Option<&'static str>,
	widget: bool,
) -> Facet {
	Facet { field, index, cardinality, widget }
}

const PID: Option<&str> = Some("pid");

pub const PARTICIPANT_FACETS: &[Facet] = &[
	facet("diagnosis", IndexKind::Diagnosis, PID, true),
	facet("age_at_diagnosis", IndexKind::Diagnosis, PID, true),
	facet("sex_at_birth", IndexKind::Participants, None, true),
	facet("race", IndexKind::Participants, None, true),
	facet("dbgap_accession", IndexKind::Participants, None, false),
	facet("study_acronym", IndexKind::Participants, None, true),
	facet("diagnosis_anatomic_site", IndexKind::Diagnosis, PID, false),
	facet("diagnosis_category", IndexKind::Diagnosis, PID, false),
	facet("disease_phase", IndexKind::Diagnosis, PID, false),
	facet("diagnosis_classification_system", IndexKind::Diagnosis, PID, false),
	facet("diagnosis_basis", IndexKind::Diagnosis, PID, false),
	facet("tumor_grade_source", IndexKind::Diagnosis, PID, false),
	facet("tumor_stage_source", IndexKind::Diagnosis, PID, false),
	facet("treatment_type", IndexKind::Treatments, PID, false),
	facet("treatment_agent", IndexKind::Treatments, PID, false),
	facet("age_at_treatment_start", IndexKind::Treatments, PID, false),
	facet("response_category", IndexKind::TreatmentResponses, PID, false),
	facet("age_at_response", IndexKind::TreatmentResponses, PID, false),
	facet("last_known_survival_status", IndexKind::Survivals, PID, false),
	facet("age_at_last_known_survival_status", IndexKind::Survivals, PID, false),
	facet("first_event", IndexKind::Survivals, PID, false),
	facet("sample_anatomic_site", IndexKind::Samples, PID, false),
	facet("participant_age_at_collection", IndexKind::Samples, PID, false),
	facet("sample_tumor_status", IndexKind::Samples, PID, false),
	facet("tumor_classification", IndexKind::Samples, PID, false),
	facet("data_category", IndexKind::Files, PID, true),
	facet("file_type", IndexKind::Files, PID, false),
	facet("study_name", IndexKind::Participants, None, false),
	facet("study_status", IndexKind::Participants, None, false),
	facet("library_selection", IndexKind::Files, PID, false),
	facet("library_source_material", IndexKind::Files, PID, false),
	facet("library_source_molecule", IndexKind::Files, PID, false),
	facet("library_strategy", IndexKind::Files, PID, false),
	facet("file_mapping_level", IndexKind::Files, PID, false),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardTotals {
	pub number_of_studies: u64,
	pub number_of_participants: u64,
	pub number_of_samples: u64,
	pub number_of_files: u64,
	pub participants_file_count: u64,
	pub samples_file_count: u64,
	pub studies_file_count: u64,
	pub files_file_count: u64,
}

/// Value buckets for term facets, a single summary for range facets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetCount {
	Buckets(Vec<Bucket>),
	Range(RangeSummary),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
	pub totals: DashboardTotals,
	/// Keyed by field. Each facet is computed with its own field unconstrained.
	pub filter_counts: BTreeMap<String, FacetCount>,
	/// Keyed by field.
	pub widgets: BTreeMap<String, Vec<Bucket>>,
}

struct FacetResult {
	field: &'static str,
	filter: FacetCount,
	widget: Option<Vec<Bucket>>,
}

impl FacetService {
	/// Totals, facet counts and widgets for `params`. Results are memoised by the semantic
	/// content of `params`, except for imported worklists.
	pub async fn dashboard(&self, params: &FilterParams) -> Result<Dashboard> {
		let signature = if params.has_imported() {
			None
		} else {
			Some(cache::signature(DASHBOARD_CACHE_KIND, params)?)
		};

		if let Some(signature) = signature.as_deref()
			&& let Some(cached) = self.cache.get(signature)
		{
			tracing::info!(signature, "Dashboard cache hit.");

			return cache::decode_json(cached, "dashboard");
		}

		let table = ThresholdTable::participant_dashboard();
		let tasks =
			PARTICIPANT_FACETS.iter().map(|facet| self.dashboard_facet(*facet, params, &table)).collect();
		let (totals, facets) = futures::try_join!(self.dashboard_totals(params), self.fan_out(tasks))?;
		let mut dashboard =
			Dashboard { totals, filter_counts: BTreeMap::new(), widgets: BTreeMap::new() };

		for facet in facets {
			dashboard.filter_counts.insert(facet.field.to_string(), facet.filter);

			if let Some(widget) = facet.widget {
				dashboard.widgets.insert(facet.field.to_string(), widget);
			}
		}

		if let Some(signature) = signature {
			match serde_json::to_value(&dashboard) {
				Ok(value) => self.cache.put(signature, value),
				Err(err) => tracing::warn!(error = %err, "Failed to encode dashboard for caching."),
			}
		}

		Ok(dashboard)
	}

	/// Distinct studies with at least one matching file record.
	pub async fn number_of_studies(&self, params: &FilterParams) -> Result<u64> {
		let tree = query::compile(&self.routing, params, IndexKind::FilesOverall)?;
		let body =
			aggregation::with_term_aggregation(tree, STUDY_ID_FIELD, None, &[], self.limits());
		let response = self.search(IndexKind::FilesOverall, &body).await?;

		Ok(collect::collect_bucket_keys(&response, STUDY_ID_FIELD)?.len() as u64)
	}

	pub async fn number_of_files(&self, params: &FilterParams) -> Result<u64> {
		let tree = query::compile(&self.routing, params, IndexKind::Files)?;

		self.count(IndexKind::Files, &SearchBody::aggregations_only(tree)).await
	}

	async fn dashboard_totals(&self, params: &FilterParams) -> Result<DashboardTotals> {
		let (
			(number_of_participants, participants_file_count),
			(number_of_samples, samples_file_count),
			number_of_studies,
			number_of_files,
		) = futures::try_join!(
			self.total_with_file_count(IndexKind::Participants, params, "file_count"),
			self.total_with_file_count(IndexKind::Samples, params, "direct_file_count"),
			self.number_of_studies(params),
			self.number_of_files(params),
		)?;

		Ok(DashboardTotals {
			number_of_studies,
			number_of_participants,
			number_of_samples,
			number_of_files,
			participants_file_count,
			samples_file_count,
			studies_file_count: number_of_files,
			files_file_count: number_of_files,
		})
	}

	async fn total_with_file_count(
		&self,
		index: IndexKind,
		params: &FilterParams,
		sum_field: &str,
	) -> Result<(u64, u64)> {
		let tree = query::compile(&self.routing, params, index)?;
		let mut body = SearchBody::aggregations_only(tree)
			.with_aggregation(FILE_COUNT_AGG, Aggregation::Sum { field: sum_field.to_string() });

		body.track_total_hits = Some(TRACK_TOTAL_HITS);

		let response = self.search(index, &body).await?;

		Ok((collect::total_hits(&response)?, collect::collect_sum(&response, FILE_COUNT_AGG)?))
	}

	async fn dashboard_facet(
		&self,
		facet: Facet,
		params: &FilterParams,
		table: &ThresholdTable,
	) -> Result<FacetResult> {
		let field = facet.field;
		let source = CountSource::for_cardinality(facet.cardinality);
		let limits = self.limits();
		let others = query::compile(&self.routing, &params.without(field), facet.index)?;

		if self.routing.is_range(field) {
			let body = aggregation::with_range_aggregation(others, field);
			let summary = collect::collect_range_summary(&self.search(facet.index, &body).await?)?;
			let widget = if facet.widget {
				let tree = query::compile(&self.routing, params, facet.index)?;
				let body = aggregation::with_cardinality_range_aggregation(
					tree,
					field,
					facet.cardinality,
					limits,
				);
				let response = self.search(facet.index, &body).await?;

				Some(collect::collect_buckets(&response, field, source)?)
			} else {
				None
			};

			return Ok(FacetResult { field, filter: FacetCount::Range(summary), widget });
		}

		let body = aggregation::with_term_aggregation(others, field, facet.cardinality, &[], limits);
		let filter = collect::collect_buckets(&self.search(facet.index, &body).await?, field, source)?;
		let widget = match (facet.widget, params.terms(field)) {
			(false, _) => None,
			(true, Some(selected)) if !selected.is_empty() => {
				let restrict =
					if INCLUDE_RESTRICTED.contains(&field) { selected.to_vec() } else { Vec::new() };
				let tree = query::compile(&self.routing, params, facet.index)?;
				let body = aggregation::with_term_aggregation(
					tree,
					field,
					facet.cardinality,
					&restrict,
					limits,
				);
				let response = self.search(facet.index, &body).await?;

				Some(collect::collect_buckets(&response, field, source)?)
			},
			(true, _) => Some(filter.clone()),
		};
		let mut counts = FacetCounts { filter, widget };

		if table.covers(field) {
			self.correct_facet(field, params, table, &mut counts).await?;
		}

		Ok(FacetResult { field, filter: FacetCount::Buckets(counts.filter), widget: counts.widget })
	}
}
