use std::sync::Arc;

use facet_service::FacetService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<FacetService>,
}
impl AppState {
	pub fn new(config: facet_config::Config) -> color_eyre::Result<Self> {
		let service = FacetService::new(config)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: FacetService) -> Self {
		Self { service: Arc::new(service) }
	}
}
