pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String, transient: bool },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Vector store error: {message}")]
	Qdrant { message: String },
}
impl Error {
	/// Whether the ingestion consumer's bounded retry should cover this
	/// failure. Store I/O is treated as transient; validation failures and
	/// misses are not.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Provider { transient, .. } => *transient,
			Self::Storage { .. } | Self::Qdrant { .. } => true,
			Self::InvalidRequest { .. } | Self::NotFound { .. } => false,
		}
	}
}
impl From<engram_storage::Error> for Error {
	fn from(err: engram_storage::Error) -> Self {
		match err {
			engram_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			engram_storage::Error::Json(inner) => Self::Storage { message: inner.to_string() },
			engram_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			engram_storage::Error::NotFound(message) => Self::NotFound { message },
			engram_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
		}
	}
}
impl From<engram_providers::Error> for Error {
	fn from(err: engram_providers::Error) -> Self {
		let transient = err.is_transient();

		Self::Provider { message: err.to_string(), transient }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn provider_transience_is_preserved() {
		let transient: Error =
			engram_providers::Error::Status { status: 503, body: String::new() }.into();
		let permanent: Error =
			engram_providers::Error::Status { status: 401, body: String::new() }.into();

		assert!(transient.is_transient());
		assert!(!permanent.is_transient());
	}

	#[test]
	fn invalid_request_is_permanent() {
		let err = Error::InvalidRequest { message: "Text is required.".to_string() };

		assert!(!err.is_transient());
	}
}
