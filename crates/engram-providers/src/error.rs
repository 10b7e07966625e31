pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Provider {provider} has no API key configured.")]
	MissingCredentials { provider: &'static str },
	#[error("Unknown provider: {0}.")]
	UnknownProvider(String),
	#[error(transparent)]
	Http(#[from] reqwest::Error),
	#[error("Provider returned status {status}: {body}")]
	Status { status: u16, body: String },
	#[error("Provider response is missing expected content.")]
	EmptyResponse,
	#[error("Structured output did not parse after sanitize-and-retry.")]
	StructuredGeneration { payload: String },
}
impl Error {
	/// Whether a caller's retry policy should cover this failure. Callers own
	/// retries; this crate only classifies.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Http(err) =>
				err.is_timeout() || err.is_connect() || err.is_request() || err.is_body(),
			Self::Status { status, .. } => retryable_status(*status),
			Self::MissingCredentials { .. }
			| Self::UnknownProvider(_)
			| Self::EmptyResponse
			| Self::StructuredGeneration { .. } => false,
		}
	}
}

pub fn retryable_status(status: u16) -> bool {
	status == 408 || status == 429 || status >= 500
}
