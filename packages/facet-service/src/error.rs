pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid range for {field}: lower and upper bound can't both be null.")]
	InvalidRange { field: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Upstream unavailable: {message}")]
	UpstreamUnavailable { message: String },
	#[error("Malformed store response: {message}")]
	MalformedResponse { message: String },
	#[error("Count correction failed: {message}")]
	Correction { message: String },
}
impl From<facet_store::Error> for Error {
	fn from(err: facet_store::Error) -> Self {
		match err {
			facet_store::Error::InvalidResponse { message } => Self::MalformedResponse { message },
			other => Self::UpstreamUnavailable { message: other.to_string() },
		}
	}
}
