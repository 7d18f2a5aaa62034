use std::collections::BTreeMap;

use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state::AppState;
use facet_service::{
	CohortChart, CohortChartsRequest, Dashboard, Entity, Error, FilterParams, ListingPage,
	ListingParams, ParticipantRef, StudySummary,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/dashboard", post(dashboard))
		.route("/v1/listing/{entity}", post(listing))
		.route("/v1/cohorts/charts", post(cohort_charts))
		.route("/v1/correlate", post(correlate))
		.route("/v1/studies/{study_id}", get(study_summary))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct CorrelateRequest {
	pub participants: Vec<ParticipantRef>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CorrelatedParticipant {
	pub participant_id: String,
	pub study_id: String,
	pub p_id: String,
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn dashboard(
	State(state): State<AppState>,
	Json(payload): Json<Map<String, Value>>,
) -> Result<Json<Dashboard>, ApiError> {
	let params = FilterParams::from_map(&payload, &state.service.routing)?;
	let response = state.service.dashboard(&params).await?;

	Ok(Json(response))
}

async fn listing(
	State(state): State<AppState>,
	Path(entity): Path<Entity>,
	Json(payload): Json<Map<String, Value>>,
) -> Result<Json<ListingPage>, ApiError> {
	let params = ListingParams::from_map(&payload, &state.service.routing)?;
	let response = state.service.list(entity, &params).await?;

	Ok(Json(response))
}

async fn cohort_charts(
	State(state): State<AppState>,
	Json(payload): Json<CohortChartsRequest>,
) -> Result<Json<Vec<CohortChart>>, ApiError> {
	let response = state.service.cohort_charts(&payload).await?;

	Ok(Json(response))
}

async fn correlate(
	State(state): State<AppState>,
	Json(payload): Json<CorrelateRequest>,
) -> Result<Json<Vec<CorrelatedParticipant>>, ApiError> {
	let known: BTreeMap<ParticipantRef, String> =
		state.service.correlate(&payload.participants).await?.into_iter().collect();
	let response = known
		.into_iter()
		.map(|(pair, p_id)| CorrelatedParticipant {
			participant_id: pair.participant_id,
			study_id: pair.study_id,
			p_id,
		})
		.collect();

	Ok(Json(response))
}

async fn study_summary(
	State(state): State<AppState>,
	Path(study_id): Path<String>,
) -> Result<Json<StudySummary>, ApiError> {
	let response = state.service.study_summary(&study_id).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let message = err.to_string();

		match err {
			Error::InvalidRange { field } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_range", message, Some(vec![field])),
			Error::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message, None),
			Error::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", message, None),
			Error::UpstreamUnavailable { .. } => {
				tracing::error!(error = %message, "Document store request failed.");

				Self::new(StatusCode::BAD_GATEWAY, "upstream_unavailable", message, None)
			},
			Error::MalformedResponse { .. } => {
				tracing::error!(error = %message, "Document store returned an unexpected shape.");

				Self::new(StatusCode::BAD_GATEWAY, "malformed_response", message, None)
			},
			Error::Correction { .. } =>
				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "correction_failed", message, None),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}
