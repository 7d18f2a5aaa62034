pub mod aggregation;
pub mod cache;
pub mod cohort;
pub mod collect;
pub mod correction;
pub mod correlation;
pub mod dashboard;
pub mod listing;
pub mod params;
pub mod query;
pub mod schema;
pub mod study;

mod error;

use std::{future::Future, pin::Pin, sync::Arc};

use futures::{StreamExt, TryStreamExt, stream};
use serde_json::Value;

pub use cache::{MemoryCache, NoCache, ResultCache};
pub use cohort::{ChartKind, ChartPoint, ChartRequest, ChartSeries, CohortChart, CohortChartsRequest};
pub use collect::{Bucket, RangeSummary};
pub use correction::{FacetCounts, ThresholdTable};
pub use correlation::{DataType, EnrichmentOutcome, TaggedAssociation};
pub use dashboard::{Dashboard, DashboardTotals, FacetCount};
pub use error::{Error, Result};
pub use facet_store::enrichment::ParticipantRef;
pub use listing::{Entity, ListingPage};
pub use params::{FilterParams, ListingParams, Page, SortDirection, UnknownPolicy};
pub use schema::{IndexKind, RoutingTable};
pub use study::StudySummary;

use aggregation::{AggregationLimits, SearchBody};
use facet_config::Config;
use facet_store::{SearchClient, enrichment::AssociatedRecord};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transport to the document store.
pub trait SearchBackend
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, facet_store::Result<Value>>;

	fn count<'a>(
		&'a self,
		index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, facet_store::Result<u64>>;

	fn open_scroll<'a>(
		&'a self,
		index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, facet_store::Result<Value>>;

	fn scroll<'a>(&'a self, scroll_id: &'a str) -> BoxFuture<'a, facet_store::Result<Value>>;

	fn clear_scroll<'a>(&'a self, scroll_id: &'a str) -> BoxFuture<'a, facet_store::Result<()>>;
}

/// External service that knows which identifiers other repositories use for a participant.
pub trait EnrichmentProvider
where
	Self: Send + Sync,
{
	fn fetch_associated_ids<'a>(
		&'a self,
		participants: &'a [ParticipantRef],
	) -> BoxFuture<'a, facet_store::Result<Vec<AssociatedRecord>>>;
}

pub struct FacetService {
	pub cfg: Config,
	pub backend: Arc<dyn SearchBackend>,
	pub enrichment: Option<Arc<dyn EnrichmentProvider>>,
	pub cache: Arc<dyn ResultCache>,
	pub routing: RoutingTable,
}
impl FacetService {
	pub fn new(cfg: Config) -> Result<Self> {
		let backend: Arc<dyn SearchBackend> = Arc::new(SearchClient::new(&cfg.search)?);
		let enrichment = cfg.enrichment.clone().map(|enrichment| {
			Arc::new(DefaultEnrichment { cfg: enrichment }) as Arc<dyn EnrichmentProvider>
		});
		let cache: Arc<dyn ResultCache> = if cfg.cache.enabled {
			Arc::new(MemoryCache::new(&cfg.cache))
		} else {
			Arc::new(NoCache)
		};

		Ok(Self::with_parts(cfg, backend, enrichment, cache))
	}

	pub fn with_parts(
		cfg: Config,
		backend: Arc<dyn SearchBackend>,
		enrichment: Option<Arc<dyn EnrichmentProvider>>,
		cache: Arc<dyn ResultCache>,
	) -> Self {
		Self { cfg, backend, enrichment, cache, routing: RoutingTable::new() }
	}

	pub(crate) fn limits(&self) -> AggregationLimits {
		AggregationLimits::from_config(&self.cfg.engine)
	}

	pub(crate) async fn search(&self, index: IndexKind, body: &SearchBody) -> Result<Value> {
		let payload = body.to_value();

		tracing::debug!(index = index.index_name(), "Sending search request.");

		Ok(self.backend.search(index.index_name(), &payload).await?)
	}

	pub(crate) async fn count(&self, index: IndexKind, body: &SearchBody) -> Result<u64> {
		let payload = body.count_value();

		Ok(self.backend.count(index.index_name(), &payload).await?)
	}

	/// Runs independent store calls with bounded concurrency, preserving input order. The first
	/// failure fails the whole batch.
	pub(crate) async fn fan_out<T, F>(&self, tasks: Vec<F>) -> Result<Vec<T>>
	where
		F: Future<Output = Result<T>>,
	{
		stream::iter(tasks).buffered(self.cfg.engine.max_concurrency.max(1)).try_collect().await
	}
}

struct DefaultEnrichment {
	cfg: facet_config::Enrichment,
}
impl EnrichmentProvider for DefaultEnrichment {
	fn fetch_associated_ids<'a>(
		&'a self,
		participants: &'a [ParticipantRef],
	) -> BoxFuture<'a, facet_store::Result<Vec<AssociatedRecord>>> {
		Box::pin(facet_store::enrichment::fetch_associated_ids(&self.cfg, participants))
	}
}

impl SearchBackend for SearchClient {
	fn search<'a>(
		&'a self,
		index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, facet_store::Result<Value>> {
		Box::pin(SearchClient::search(self, index, body))
	}

	fn count<'a>(
		&'a self,
		index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, facet_store::Result<u64>> {
		Box::pin(SearchClient::count(self, index, body))
	}

	fn open_scroll<'a>(
		&'a self,
		index: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, facet_store::Result<Value>> {
		Box::pin(SearchClient::open_scroll(self, index, body))
	}

	fn scroll<'a>(&'a self, scroll_id: &'a str) -> BoxFuture<'a, facet_store::Result<Value>> {
		Box::pin(SearchClient::scroll(self, scroll_id))
	}

	fn clear_scroll<'a>(&'a self, scroll_id: &'a str) -> BoxFuture<'a, facet_store::Result<()>> {
		Box::pin(SearchClient::clear_scroll(self, scroll_id))
	}
}
