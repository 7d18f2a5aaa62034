mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Cache, Config, Engine, Enrichment, Search, Service};

use std::{fs, path::Path};

use serde_json::{Map, Value};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.search.url.trim().is_empty() {
		return Err(Error::Validation { message: "search.url must be non-empty.".to_string() });
	}
	if cfg.search.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_result_window == 0 {
		return Err(Error::Validation {
			message: "search.max_result_window must be greater than zero.".to_string(),
		});
	}
	if cfg.search.scroll_keep_alive.trim().is_empty() {
		return Err(Error::Validation {
			message: "search.scroll_keep_alive must be non-empty.".to_string(),
		});
	}

	validate_headers("search.default_headers", &cfg.search.default_headers)?;

	if cfg.engine.max_concurrency == 0 {
		return Err(Error::Validation {
			message: "engine.max_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.engine.term_bucket_limit == 0 {
		return Err(Error::Validation {
			message: "engine.term_bucket_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.engine.precision_threshold == 0 {
		return Err(Error::Validation {
			message: "engine.precision_threshold must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.enabled {
		if cfg.cache.max_entries == 0 {
			return Err(Error::Validation {
				message: "cache.max_entries must be greater than zero when enabled.".to_string(),
			});
		}
		if cfg.cache.ttl_secs == 0 {
			return Err(Error::Validation {
				message: "cache.ttl_secs must be greater than zero when enabled.".to_string(),
			});
		}
	}

	if let Some(enrichment) = cfg.enrichment.as_ref() {
		if enrichment.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: "enrichment.api_base must be non-empty.".to_string(),
			});
		}
		if !enrichment.path.starts_with('/') {
			return Err(Error::Validation {
				message: "enrichment.path must start with '/'.".to_string(),
			});
		}
		if enrichment.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "enrichment.timeout_ms must be greater than zero.".to_string(),
			});
		}

		validate_headers("enrichment.default_headers", &enrichment.default_headers)?;
	}

	Ok(())
}

fn validate_headers(label: &str, headers: &Map<String, Value>) -> Result<()> {
	if headers.values().any(|value| !value.is_string()) {
		return Err(Error::Validation { message: format!("{label} values must be strings.") });
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.search.url = cfg.search.url.trim().trim_end_matches('/').to_string();

	if cfg.search.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.search.api_key = None;
	}

	if let Some(enrichment) = cfg.enrichment.as_mut() {
		enrichment.api_base = enrichment.api_base.trim().trim_end_matches('/').to_string();

		if enrichment.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
			enrichment.api_key = None;
		}
	}
}
