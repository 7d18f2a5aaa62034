use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use facet_config::Config;

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml() -> String {
	SAMPLE_CONFIG_TEMPLATE_TOML.to_string()
}

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root
		.as_table_mut()
		.expect("Template config must be a table.")
		.get_mut(section)
		.and_then(Value::as_table_mut)
		.expect("Template config must include the requested section.");

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("facet_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> facet_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = facet_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn base_config() -> Config {
	load_payload(sample_toml()).expect("Failed to load sample config.")
}

#[test]
fn sample_config_loads_and_normalizes() {
	let cfg = base_config();

	assert_eq!(cfg.search.url, "http://127.0.0.1:9200");
	assert!(cfg.search.api_key.is_none());
	assert_eq!(cfg.search.max_result_window, 10_000);

	let enrichment = cfg.enrichment.expect("Sample config must include [enrichment].");

	assert_eq!(enrichment.api_base, "https://cpi.example.org");
	assert!(enrichment.default_headers.is_empty());
}

#[test]
fn engine_and_cache_sections_are_optional() {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let table = root.as_table_mut().expect("Template config must be a table.");

	table.remove("engine");
	table.remove("cache");
	table.remove("enrichment");

	let cfg = load_payload(toml::to_string(&root).expect("Failed to render template config."))
		.expect("Failed to load config without optional sections.");

	assert_eq!(cfg.engine.max_concurrency, 8);
	assert_eq!(cfg.engine.term_bucket_limit, 10_000);
	assert_eq!(cfg.engine.precision_threshold, 40_000);
	assert!(cfg.cache.enabled);
	assert!(cfg.enrichment.is_none());
}

#[test]
fn max_concurrency_must_be_positive() {
	let err = load_payload(sample_toml_with("engine", "max_concurrency", Value::Integer(0)))
		.expect_err("Expected max_concurrency validation error.");

	assert!(
		err.to_string().contains("engine.max_concurrency must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn cache_ttl_is_only_checked_when_enabled() {
	let mut cfg = base_config();

	cfg.cache.ttl_secs = 0;

	let err = facet_config::validate(&cfg).expect_err("Expected cache TTL validation error.");

	assert!(
		err.to_string().contains("cache.ttl_secs must be greater than zero when enabled."),
		"Unexpected error: {err}"
	);

	cfg.cache.enabled = false;

	assert!(facet_config::validate(&cfg).is_ok());
}

#[test]
fn search_url_must_be_non_empty() {
	let err = load_payload(sample_toml_with("search", "url", Value::String(" ".to_string())))
		.expect_err("Expected search.url validation error.");

	assert!(err.to_string().contains("search.url must be non-empty."), "Unexpected error: {err}");
}

#[test]
fn default_header_values_must_be_strings() {
	let mut cfg = base_config();

	cfg.search.default_headers.insert("x-trace".to_string(), serde_json::json!(7));

	let err = facet_config::validate(&cfg).expect_err("Expected header validation error.");

	assert!(
		err.to_string().contains("search.default_headers values must be strings."),
		"Unexpected error: {err}"
	);
}

#[test]
fn enrichment_path_must_be_absolute() {
	let err = load_payload(sample_toml_with(
		"enrichment",
		"path",
		Value::String("api/v1/associated-participant-ids".to_string()),
	))
	.expect_err("Expected enrichment.path validation error.");

	assert!(
		err.to_string().contains("enrichment.path must start with '/'."),
		"Unexpected error: {err}"
	);
}

#[test]
fn unreadable_path_reports_read_error() {
	let err = facet_config::load(&PathBuf::from("/nonexistent/facet.toml"))
		.expect_err("Expected read error.");

	assert!(matches!(err, facet_config::Error::ReadConfig { .. }), "Unexpected error: {err}");
}
