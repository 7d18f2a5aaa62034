//! Maps external participant identifiers back to this catalog and tags enrichment records with
//! whether the catalog holds the participant.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
	FacetService, Result,
	aggregation::SearchBody,
	collect,
	listing::entities::PARTICIPANT_IDENTITY,
	query::{BoolQuery, Query},
};
use facet_store::enrichment::{AssociatedId, AssociatedRecord, ParticipantRef};

pub const CPI_FIELD: &str = "cpi_data";

/// What happened to the enrichment step of a participant listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrichmentOutcome {
	Applied,
	Skipped,
	Failed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
	Internal,
	External,
}

/// One associated identifier, tagged with the catalog's internal id when the catalog holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedAssociation {
	#[serde(flatten)]
	pub association: AssociatedId,
	pub p_id: Option<String>,
	pub data_type: DataType,
}

/// Tags each association with its internal id, or marks it external.
pub fn tag_associations(
	associations: &[AssociatedId],
	known: &HashMap<ParticipantRef, String>,
) -> Vec<TaggedAssociation> {
	associations
		.iter()
		.map(|association| {
			let p_id = known.get(&association_ref(association)).cloned();
			let data_type = if p_id.is_some() { DataType::Internal } else { DataType::External };

			TaggedAssociation { association: association.clone(), p_id, data_type }
		})
		.collect()
}

impl FacetService {
	/// Internal ids for the pairs this catalog holds. Pairs it does not hold are absent from the
	/// result. One store query covers every study.
	pub async fn correlate(
		&self,
		pairs: &[ParticipantRef],
	) -> Result<HashMap<ParticipantRef, String>> {
		let mut by_study: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

		for pair in pairs {
			by_study.entry(pair.study_id.as_str()).or_default().insert(pair.participant_id.as_str());
		}

		if by_study.is_empty() {
			return Ok(HashMap::new());
		}

		let per_study = by_study
			.iter()
			.map(|(study_id, participant_ids)| {
				Query::Bool(BoolQuery::filter(vec![
					Query::term("study_id", *study_id),
					Query::terms("participant_id", participant_ids.iter().copied()),
				]))
			})
			.collect();
		let mut body = SearchBody::hits(
			Query::Bool(BoolQuery::any_of(per_study)),
			0,
			self.cfg.search.max_result_window,
		);

		body.source = PARTICIPANT_IDENTITY.source;

		let response = self.search(PARTICIPANT_IDENTITY.index, &body).await?;
		let rows = collect::project_rows(collect::hits(&response)?, PARTICIPANT_IDENTITY.projection)?;
		let mut known = HashMap::new();

		for row in rows {
			let (Some(id), Some(participant_id), Some(study_id)) =
				(text(&row, "id"), text(&row, "participant_id"), text(&row, "study_id"))
			else {
				continue;
			};
			let pair = ParticipantRef { participant_id, study_id };

			if by_study
				.get(pair.study_id.as_str())
				.is_some_and(|ids| ids.contains(pair.participant_id.as_str()))
			{
				known.insert(pair, id);
			}
		}

		tracing::debug!(requested = pairs.len(), matched = known.len(), "Correlated participants.");

		Ok(known)
	}

	/// Attaches tagged associations to listed participants. Failures degrade to an outcome and
	/// leave `rows` untouched.
	pub async fn enrich_participants(&self, rows: &mut [Map<String, Value>]) -> EnrichmentOutcome {
		let Some(provider) = self.enrichment.as_ref() else {
			return EnrichmentOutcome::Skipped;
		};
		let participants: Vec<ParticipantRef> = rows.iter().filter_map(row_ref).collect();

		if participants.is_empty() {
			return EnrichmentOutcome::Skipped;
		}

		let records = match provider.fetch_associated_ids(&participants).await {
			Ok(records) => records,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to fetch associated identifiers.");

				return EnrichmentOutcome::Failed { reason: err.to_string() };
			},
		};

		match self.tag_records(&records).await {
			Ok(tagged) => {
				attach(rows, tagged);

				EnrichmentOutcome::Applied
			},
			Err(err) => {
				tracing::warn!(error = %err, "Failed to correlate associated identifiers.");

				EnrichmentOutcome::Failed { reason: err.to_string() }
			},
		}
	}

	async fn tag_records(
		&self,
		records: &[AssociatedRecord],
	) -> Result<HashMap<ParticipantRef, Vec<TaggedAssociation>>> {
		let with_data: Vec<&AssociatedRecord> =
			records.iter().filter(|record| !record.cpi_data.is_empty()).collect();
		let pairs: Vec<ParticipantRef> = with_data
			.iter()
			.flat_map(|record| record.cpi_data.iter().map(association_ref))
			.collect();
		let known = self.correlate(&pairs).await?;

		Ok(with_data
			.into_iter()
			.map(|record| {
				let owner = ParticipantRef {
					participant_id: record.participant_id.clone(),
					study_id: record.study_id.clone(),
				};

				(owner, tag_associations(&record.cpi_data, &known))
			})
			.collect())
	}
}

fn association_ref(association: &AssociatedId) -> ParticipantRef {
	ParticipantRef {
		participant_id: association.associated_id.clone(),
		study_id: association.repository_of_synonym_id.clone(),
	}
}

fn row_ref(row: &Map<String, Value>) -> Option<ParticipantRef> {
	Some(ParticipantRef {
		participant_id: text(row, "participant_id")?,
		study_id: text(row, "study_id")?,
	})
}

fn text(row: &Map<String, Value>, key: &str) -> Option<String> {
	match row.get(key)? {
		Value::String(value) => Some(value.clone()),
		Value::Number(value) => Some(value.to_string()),
		_ => None,
	}
}

fn attach(rows: &mut [Map<String, Value>], mut tagged: HashMap<ParticipantRef, Vec<TaggedAssociation>>) {
	for row in rows.iter_mut() {
		let Some(associations) = row_ref(row).and_then(|key| tagged.remove(&key)) else {
			continue;
		};

		match serde_json::to_value(associations) {
			Ok(value) => {
				row.insert(CPI_FIELD.to_string(), value);
			},
			Err(err) => tracing::warn!(error = %err, "Failed to encode tagged associations."),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn association(associated_id: &str, study: &str) -> AssociatedId {
		AssociatedId {
			associated_id: associated_id.to_string(),
			repository_of_synonym_id: study.to_string(),
			domain_category: None,
			domain_description: None,
			data_location: None,
		}
	}

	#[test]
	fn associations_are_internal_only_when_known() {
		let known = HashMap::from([(
			ParticipantRef { participant_id: "P-2".to_string(), study_id: "phs002".to_string() },
			"p-internal-2".to_string(),
		)]);
		let tagged = tag_associations(
			&[association("P-2", "phs002"), association("P-2", "phs003")],
			&known,
		);

		assert_eq!(tagged[0].p_id.as_deref(), Some("p-internal-2"));
		assert_eq!(tagged[0].data_type, DataType::Internal);
		assert_eq!(tagged[1].p_id, None);
		assert_eq!(tagged[1].data_type, DataType::External);
	}

	#[test]
	fn tagged_associations_serialize_flat() {
		let tagged = tag_associations(&[association("EXT-1", "phs009")], &HashMap::new());

		assert_eq!(
			serde_json::to_value(&tagged[0]).expect("serialize failed"),
			serde_json::json!({
				"associated_id": "EXT-1",
				"repository_of_synonym_id": "phs009",
				"p_id": null,
				"data_type": "external"
			})
		);
	}

	#[test]
	fn outcome_is_tagged_by_status() {
		assert_eq!(
			serde_json::to_value(EnrichmentOutcome::Failed { reason: "timeout".to_string() })
				.expect("serialize failed"),
			serde_json::json!({ "status": "failed", "reason": "timeout" })
		);
		assert_eq!(
			serde_json::to_value(EnrichmentOutcome::Skipped).expect("serialize failed"),
			serde_json::json!({ "status": "skipped" })
		);
	}

	#[test]
	fn attach_only_touches_matching_rows() {
		let mut rows: Vec<Map<String, Value>> = ["P-1", "P-2"]
			.iter()
			.map(|id| {
				serde_json::json!({ "participant_id": id, "study_id": "phs001" })
					.as_object()
					.cloned()
					.expect("row must be an object")
			})
			.collect();
		let owner = ParticipantRef { participant_id: "P-2".to_string(), study_id: "phs001".to_string() };
		let tagged = HashMap::from([(
			owner,
			tag_associations(&[association("EXT-5", "phs100")], &HashMap::new()),
		)]);

		attach(&mut rows, tagged);

		assert!(!rows[0].contains_key(CPI_FIELD));
		assert_eq!(rows[1][CPI_FIELD][0]["data_type"], "external");
	}
}
