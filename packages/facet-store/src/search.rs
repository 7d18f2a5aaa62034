use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;

use crate::{Error, Result};

const ERROR_BODY_PREVIEW_CHARS: usize = 512;

/// HTTP client for the document store's search, count and scroll endpoints.
#[derive(Clone, Debug)]
pub struct SearchClient {
	client: Client,
	base_url: String,
	keep_alive: String,
}
impl SearchClient {
	pub fn new(cfg: &facet_config::Search) -> Result<Self> {
		let headers =
			crate::request_headers("ApiKey", cfg.api_key.as_deref(), &cfg.default_headers)?;
		let client = Client::builder()
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.default_headers(headers)
			.build()?;

		Ok(Self {
			client,
			base_url: cfg.url.trim_end_matches('/').to_string(),
			keep_alive: cfg.scroll_keep_alive.clone(),
		})
	}

	pub async fn search(&self, index: &str, body: &Value) -> Result<Value> {
		let url = format!("{}/{index}/_search", self.base_url);
		let res = self.client.post(&url).json(body).send().await?;

		read_json(res, index).await
	}

	/// Counts documents matching `body.query`. Aggregations and paging keys are not accepted by
	/// the count endpoint and must not be present.
	pub async fn count(&self, index: &str, body: &Value) -> Result<u64> {
		let url = format!("{}/{index}/_count", self.base_url);
		let res = self.client.post(&url).json(body).send().await?;
		let json = read_json(res, index).await?;

		parse_count_response(&json)
	}

	pub async fn open_scroll(&self, index: &str, body: &Value) -> Result<Value> {
		let url = format!("{}/{index}/_search", self.base_url);
		let res = self
			.client
			.post(&url)
			.query(&[("scroll", self.keep_alive.as_str())])
			.json(body)
			.send()
			.await?;

		read_json(res, index).await
	}

	pub async fn scroll(&self, scroll_id: &str) -> Result<Value> {
		let url = format!("{}/_search/scroll", self.base_url);
		let body = serde_json::json!({ "scroll": self.keep_alive, "scroll_id": scroll_id });
		let res = self.client.post(&url).json(&body).send().await?;

		read_json(res, "_search/scroll").await
	}

	pub async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
		let url = format!("{}/_search/scroll", self.base_url);
		let body = serde_json::json!({ "scroll_id": [scroll_id] });
		let res = self.client.delete(&url).json(&body).send().await?;

		read_json(res, "_search/scroll").await.map(|_| ())
	}
}

async fn read_json(res: Response, target: &str) -> Result<Value> {
	let status = res.status();

	if !status.is_success() {
		let body: String = res.text().await.unwrap_or_default();

		tracing::error!(target_index = target, status = status.as_u16(), "Store request failed.");

		return Err(Error::Status {
			target: target.to_string(),
			status: status.as_u16(),
			body: body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
		});
	}

	Ok(res.json().await?)
}

fn parse_count_response(json: &Value) -> Result<u64> {
	json.get("count").and_then(Value::as_u64).ok_or_else(|| Error::InvalidResponse {
		message: "Count response is missing a numeric count.".to_string(),
	})
}
