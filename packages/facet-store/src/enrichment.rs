use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// A participant as known to this catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantRef {
	pub participant_id: String,
	pub study_id: String,
}

/// Identifiers the external service associates with one participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociatedRecord {
	pub participant_id: String,
	pub study_id: String,
	#[serde(default)]
	pub cpi_data: Vec<AssociatedId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociatedId {
	pub associated_id: String,
	pub repository_of_synonym_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain_category: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain_description: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data_location: Option<String>,
}

pub async fn fetch_associated_ids(
	cfg: &facet_config::Enrichment,
	participants: &[ParticipantRef],
) -> Result<Vec<AssociatedRecord>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "participant_ids": participants });
	let res = client
		.post(url)
		.headers(crate::request_headers("Bearer", cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_associated_response(json)
}

fn parse_associated_response(json: Value) -> Result<Vec<AssociatedRecord>> {
	let data = match json {
		Value::Array(items) => items,
		Value::Object(mut obj) => match obj.remove("data") {
			Some(Value::Array(items)) => items,
			_ => {
				return Err(Error::InvalidResponse {
					message: "Enrichment response is missing data array.".to_string(),
				});
			},
		},
		_ => {
			return Err(Error::InvalidResponse {
				message: "Enrichment response must be an array or an object.".to_string(),
			});
		},
	};
	let mut records = Vec::with_capacity(data.len());

	for item in data {
		records.push(serde_json::from_value(item)?);
	}

	Ok(records)
}
