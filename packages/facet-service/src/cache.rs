use std::time::Duration;

use moka::sync::Cache;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
	Error, Result,
	params::{FilterParams, FilterValue},
};

const RESULT_CACHE_SCHEMA_VERSION: i32 = 1;

/// Memoizes computed responses by request signature.
pub trait ResultCache
where
	Self: Send + Sync,
{
	fn get(&self, signature: &str) -> Option<Value>;

	fn put(&self, signature: String, result: Value);
}

/// Bounded in-process cache with a per-entry time to live.
pub struct MemoryCache {
	cache: Cache<String, Value>,
}
impl MemoryCache {
	pub fn new(cfg: &facet_config::Cache) -> Self {
		let cache = Cache::builder()
			.max_capacity(cfg.max_entries)
			.time_to_live(Duration::from_secs(cfg.ttl_secs))
			.build();

		Self { cache }
	}
}
impl ResultCache for MemoryCache {
	fn get(&self, signature: &str) -> Option<Value> {
		self.cache.get(signature)
	}

	fn put(&self, signature: String, result: Value) {
		self.cache.insert(signature, result);
	}
}

/// Cache that never holds anything, used when caching is disabled.
pub struct NoCache;
impl ResultCache for NoCache {
	fn get(&self, _signature: &str) -> Option<Value> {
		None
	}

	fn put(&self, _signature: String, _result: Value) {}
}

pub fn decode_json<T>(value: Value, label: &str) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_json::from_value(value)
		.map_err(|err| Error::MalformedResponse { message: format!("Invalid cached {label}: {err}") })
}

/// Stable key for `params` under `kind`. Field order, value order and duplicate values do not
/// affect the key.
pub fn signature(kind: &str, params: &FilterParams) -> Result<String> {
	// Bound-less range fields only matter through their policy, which is keyed below.
	let filters: Vec<Value> = params
		.filters()
		.filter_map(|(field, value)| match value {
			FilterValue::Terms(values) => {
				let mut values = values.clone();

				values.sort();
				values.dedup();

				Some(serde_json::json!({ "field": field, "terms": values }))
			},
			FilterValue::Range(bound) => {
				Some(serde_json::json!({ "field": field, "range": [bound.lower, bound.upper] }))
			},
			FilterValue::Unbounded => None,
		})
		.collect();
	let policies: Vec<Value> = params
		.effective_policies()
		.map(|(field, policy)| serde_json::json!({ "field": field, "policy": policy }))
		.collect();
	let mut imported: Vec<Value> = params
		.imported()
		.iter()
		.map(|study| {
			let mut ids = study.participant_ids.clone();

			ids.sort();
			ids.dedup();

			serde_json::json!({ "study_id": study.study_id, "participant_ids": ids })
		})
		.collect();

	imported.sort_by_key(Value::to_string);

	let payload = serde_json::json!({
		"kind": kind,
		"schema_version": RESULT_CACHE_SCHEMA_VERSION,
		"filters": filters,
		"policies": policies,
		"imported": imported,
	});

	hash_cache_key(&payload)
}

fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::InvalidRequest {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}
