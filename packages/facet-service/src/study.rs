use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
	Error, FacetService, Result, aggregation,
	collect::{self, Bucket, CountSource},
	correction::{FacetCounts, ThresholdTable},
	listing::entities::STUDY_DETAIL,
	params::{FilterParams, Page, SortRequest},
	query,
	schema::IndexKind,
};

const PARTICIPANT_CARDINALITY: Option<&str> = Some("pid");

/// A single study with the distributions shown on its summary page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudySummary {
	pub study: Map<String, Value>,
	pub diagnoses: Vec<Bucket>,
	pub anatomic_sites: Vec<Bucket>,
	pub data_categories: Vec<Bucket>,
}

impl FacetService {
	pub async fn study_summary(&self, study_id: &str) -> Result<StudySummary> {
		let params = FilterParams::new().with_terms("study_id", [study_id]);
		let rows = self
			.list_rows(&STUDY_DETAIL, &params, Page { size: 1, offset: 0 }, &SortRequest::default())
			.await?;
		let Some(study) = rows.into_iter().next() else {
			return Err(Error::NotFound { message: format!("Study {study_id} does not exist.") });
		};
		let table = ThresholdTable::study_summary();
		let (diagnoses, anatomic_sites, data_categories) = futures::try_join!(
			self.study_facet("diagnosis", IndexKind::Diagnosis, &params, &table),
			self.study_facet("diagnosis_anatomic_site", IndexKind::Diagnosis, &params, &table),
			self.study_facet("data_category", IndexKind::Files, &params, &table),
		)?;

		Ok(StudySummary { study, diagnoses, anatomic_sites, data_categories })
	}

	async fn study_facet(
		&self,
		field: &str,
		index: IndexKind,
		params: &FilterParams,
		table: &ThresholdTable,
	) -> Result<Vec<Bucket>> {
		let tree = query::compile(&self.routing, params, index)?;
		let body = aggregation::with_term_aggregation(
			tree,
			field,
			PARTICIPANT_CARDINALITY,
			&[],
			self.limits(),
		);
		let response = self.search(index, &body).await?;
		let filter = collect::collect_buckets(
			&response,
			field,
			CountSource::for_cardinality(PARTICIPANT_CARDINALITY),
		)?;
		let mut counts = FacetCounts { filter, widget: None };

		if table.covers(field) {
			self.correct_facet(field, params, table, &mut counts).await?;
		}

		Ok(counts.filter)
	}
}
