pub mod entities;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
	FacetService, Result,
	aggregation::{self, SearchBody},
	collect,
	correlation::EnrichmentOutcome,
	params::{FilterParams, ListingParams, Page, SortRequest},
	query,
	schema::IndexKind,
};
use entities::ListingSpec;

/// Study id that matches nothing, used when no study qualifies.
const NO_STUDY: &str = "-1";
const SURVIVAL_AGE_FIELD: &str = "age_at_last_known_survival_status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
	Participants,
	Diagnosis,
	Samples,
	Files,
	StudyOverview,
	Studies,
	CohortManifest,
	CohortMetadata,
}
impl Entity {
	pub fn spec(self) -> &'static ListingSpec {
		match self {
			Self::Participants => &entities::PARTICIPANTS,
			Self::Diagnosis => &entities::DIAGNOSIS,
			Self::Samples => &entities::SAMPLES,
			Self::Files => &entities::FILES,
			Self::StudyOverview => &entities::STUDY_OVERVIEW,
			Self::Studies => &entities::STUDIES,
			Self::CohortManifest => &entities::COHORT_MANIFEST,
			Self::CohortMetadata => &entities::COHORT_METADATA,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingPage {
	pub rows: Vec<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub enrichment: Option<EnrichmentOutcome>,
}

/// Storage field to sort by. Unrecognized keys fall back to the entity's default order.
pub fn resolve_sort(spec: &ListingSpec, order_by: Option<&str>) -> &'static str {
	let Some(order_by) = order_by.filter(|key| !key.is_empty()) else {
		return spec.default_sort;
	};

	match spec.sort_field(order_by) {
		Some(field) => field,
		None => {
			tracing::info!(
				order_by,
				default_sort = spec.default_sort,
				"Sort key not recognized. Using default order."
			);

			spec.default_sort
		},
	}
}

impl FacetService {
	pub async fn list(&self, entity: Entity, params: &ListingParams) -> Result<ListingPage> {
		let spec = entity.spec();

		if entity == Entity::StudyOverview {
			let filters = self.qualifying_studies(&params.filters).await?;
			let rows = self.list_rows(spec, &filters, params.page, &params.sort).await?;

			return Ok(ListingPage { rows: into_values(rows), enrichment: None });
		}

		let mut rows = self.list_rows(spec, &params.filters, params.page, &params.sort).await?;

		match entity {
			Entity::Participants => {
				let outcome = self.enrich_participants(&mut rows).await;

				Ok(ListingPage { rows: into_values(rows), enrichment: Some(outcome) })
			},
			Entity::CohortMetadata => {
				rows.iter_mut().for_each(sort_survivals);

				Ok(ListingPage { rows: group_by_accession(rows), enrichment: None })
			},
			_ => Ok(ListingPage { rows: into_values(rows), enrichment: None }),
		}
	}

	/// One sorted, projected page of `spec.index`. Pages past the store's result window are
	/// walked with a scroll cursor.
	pub async fn list_rows(
		&self,
		spec: &ListingSpec,
		filters: &FilterParams,
		page: Page,
		sort: &SortRequest,
	) -> Result<Vec<Map<String, Value>>> {
		if page.size == 0 {
			return Ok(Vec::new());
		}

		let tree = query::compile(&self.routing, filters, spec.index)?;
		let sort_field = resolve_sort(spec, sort.order_by.as_deref());
		let mut body = SearchBody::hits(tree, page.offset, page.size);

		body.sort.push((sort_field.to_string(), sort.direction));
		body.source = spec.source;

		if page.offset.saturating_add(page.size) > self.cfg.search.max_result_window {
			return self.scroll_rows(spec, body, page).await;
		}

		let response = self.search(spec.index, &body).await?;

		collect::project_rows(collect::hits(&response)?, spec.projection)
	}

	async fn scroll_rows(
		&self,
		spec: &ListingSpec,
		mut body: SearchBody,
		page: Page,
	) -> Result<Vec<Map<String, Value>>> {
		body.from = None;
		body.size = self.cfg.search.max_result_window;

		tracing::debug!(
			index = spec.index.index_name(),
			offset = page.offset,
			size = page.size,
			"Walking deep page with scroll cursor."
		);

		let mut cursor = None;
		let outcome = self.walk_scroll(spec, &body, page, &mut cursor).await;

		if let Some(scroll_id) = cursor
			&& let Err(err) = self.backend.clear_scroll(&scroll_id).await
		{
			tracing::warn!(error = %err, "Failed to clear scroll cursor.");
		}

		outcome
	}

	async fn walk_scroll(
		&self,
		spec: &ListingSpec,
		body: &SearchBody,
		page: Page,
		cursor: &mut Option<String>,
	) -> Result<Vec<Map<String, Value>>> {
		let payload = body.to_value();
		let mut response = self.backend.open_scroll(spec.index.index_name(), &payload).await?;
		let mut seen = 0_u64;
		let mut rows = Vec::new();

		loop {
			*cursor = collect::scroll_id(&response).or(cursor.take());

			let hits = collect::hits(&response)?;

			if hits.is_empty() {
				break;
			}

			let batch = hits.len() as u64;

			if seen + batch > page.offset {
				let start = usize::try_from(page.offset.saturating_sub(seen)).unwrap_or(usize::MAX);
				let wanted =
					usize::try_from(page.size).unwrap_or(usize::MAX).saturating_sub(rows.len());
				let end = hits.len().min(start.saturating_add(wanted));

				rows.extend(collect::project_rows(&hits[start..end], spec.projection)?);
			}

			seen += batch;

			if rows.len() as u64 >= page.size {
				break;
			}

			let Some(scroll_id) = cursor.clone() else {
				break;
			};

			response = self.backend.scroll(&scroll_id).await?;
		}

		Ok(rows)
	}

	/// Restricts a filter set to the studies that have at least one qualifying file.
	async fn qualifying_studies(&self, filters: &FilterParams) -> Result<FilterParams> {
		let tree = query::compile(&self.routing, filters, IndexKind::Files)?;
		let body = aggregation::with_term_aggregation(tree, "study_id", None, &[], self.limits());
		let response = self.search(IndexKind::Files, &body).await?;
		let mut study_ids = collect::collect_bucket_keys(&response, "study_id")?;

		if study_ids.is_empty() {
			study_ids.push(NO_STUDY.to_string());
		}

		Ok(FilterParams::new().with_terms("study_id", study_ids))
	}
}

fn into_values(rows: Vec<Map<String, Value>>) -> Vec<Value> {
	rows.into_iter().map(Value::Object).collect()
}

/// Orders a participant's survivals by age, unknown ages last.
fn sort_survivals(row: &mut Map<String, Value>) {
	if let Some(Value::Array(survivals)) = row.get_mut("survivals") {
		survivals.sort_by(|left, right| {
			match (survival_age(left), survival_age(right)) {
				(Some(left), Some(right)) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
				(Some(_), None) => Ordering::Less,
				(None, Some(_)) => Ordering::Greater,
				(None, None) => Ordering::Equal,
			}
		});
	}
}

fn survival_age(survival: &Value) -> Option<f64> {
	match survival.get(SURVIVAL_AGE_FIELD)? {
		Value::Number(age) => age.as_f64(),
		Value::String(age) => age.trim().parse().ok(),
		_ => None,
	}
}

/// Groups rows as `[{dbgap_accession, participants}]` in first-seen order.
fn group_by_accession(rows: Vec<Map<String, Value>>) -> Vec<Value> {
	let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();

	for row in rows {
		let accession = row.get("dbgap_accession").cloned().unwrap_or(Value::Null);

		match groups.iter_mut().find(|(key, _)| *key == accession) {
			Some((_, participants)) => participants.push(Value::Object(row)),
			None => groups.push((accession, vec![Value::Object(row)])),
		}
	}

	groups
		.into_iter()
		.map(|(accession, participants)| {
			serde_json::json!({ "dbgap_accession": accession, "participants": participants })
		})
		.collect()
}
