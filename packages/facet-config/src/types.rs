use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub search: Search,
	#[serde(default)]
	pub engine: Engine,
	#[serde(default)]
	pub cache: Cache,
	pub enrichment: Option<Enrichment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

/// Connection settings for the document store that holds the entity indices.
#[derive(Debug, Clone, Deserialize)]
pub struct Search {
	pub url: String,
	pub api_key: Option<String>,
	pub timeout_ms: u64,
	/// Upper bound on `from + size` accepted by the store.
	#[serde(default = "default_max_result_window")]
	pub max_result_window: u64,
	#[serde(default = "default_scroll_keep_alive")]
	pub scroll_keep_alive: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Engine {
	/// Concurrent store calls per request.
	pub max_concurrency: usize,
	pub term_bucket_limit: u32,
	pub precision_threshold: u32,
}
impl Default for Engine {
	fn default() -> Self {
		Self { max_concurrency: 8, term_bucket_limit: 10_000, precision_threshold: 40_000 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub enabled: bool,
	pub max_entries: u64,
	pub ttl_secs: u64,
}
impl Default for Cache {
	fn default() -> Self {
		Self { enabled: true, max_entries: 1_024, ttl_secs: 3_600 }
	}
}

/// External identifier service queried for associated participant ids.
#[derive(Debug, Clone, Deserialize)]
pub struct Enrichment {
	pub api_base: String,
	#[serde(default = "default_enrichment_path")]
	pub path: String,
	pub api_key: Option<String>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_max_result_window() -> u64 {
	10_000
}

fn default_scroll_keep_alive() -> String {
	"1m".to_string()
}

fn default_enrichment_path() -> String {
	"/api/v1/associated-participant-ids".to_string()
}
