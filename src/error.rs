//! Relay-level error types shared by the upstream client, the resilience layer, and handlers.

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff, eligible for stale fallback.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Definite upstream failure; never retried, never masked by stale data.
	#[error(transparent)]
	Permanent(#[from] PermanentError),
}
impl Error {
	/// Returns `true` when the failure is worth retrying.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(_))
	}

	/// Upstream HTTP status attached to the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Transient(TransientError::Status { status, .. }) => Some(*status),
			Self::Permanent(PermanentError::Status { status, .. }) => Some(*status),
			Self::Permanent(PermanentError::MalformedBody { status, .. }) => *status,
			_ => None,
		}
	}

	/// Upstream `Retry-After` hint, when one was supplied.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Transient(TransientError::Status { retry_after, .. }) => *retry_after,
			_ => None,
		}
	}

	/// Returns `true` when the upstream reported that the requested resource does not exist.
	pub fn is_not_found(&self) -> bool {
		matches!(
			self,
			Self::Permanent(PermanentError::Status { status: 404, .. } | PermanentError::NoResults)
		)
	}
}
impl From<crate::key::KeyError> for Error {
	fn from(e: crate::key::KeyError) -> Self {
		ConfigError::from(e).into()
	}
}

/// Configuration and validation failures raised before any upstream call is made.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Configuration sources could not be read or deserialized.
	#[error("Configuration could not be loaded.")]
	Load(#[from] config::ConfigError),
	/// Upstream base URL or a templated endpoint URL is invalid.
	#[error("Upstream URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Logical cache key failed validation.
	#[error("Cache key is invalid.")]
	InvalidKey(#[from] crate::key::KeyError),
	/// A configuration value is outside its accepted range.
	#[error("Configuration field `{field}` is invalid: {reason}.")]
	InvalidField {
		/// Dotted configuration path.
		field: &'static str,
		/// Human-readable explanation.
		reason: String,
	},
	/// The upstream API key was not configured.
	#[error("The upstream API key is not configured.")]
	MissingApiKey,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<url::ParseError> for ConfigError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidUrl { source }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Underlying HTTP client reported a network failure (DNS, TCP, TLS, reset).
	#[error("Network error occurred while calling the upstream API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The per-call timeout elapsed before the upstream answered.
	#[error("Upstream API did not answer within {timeout}.")]
	Timeout {
		/// Timeout that was exceeded.
		timeout: Duration,
	},
	/// Upstream answered with 429 or a 5xx status.
	#[error("Upstream API returned HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}
impl TransientError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// Definite failures; the request itself is invalid or the payload unusable.
#[derive(Debug, ThisError)]
pub enum PermanentError {
	/// Upstream answered with a 4xx status other than 429.
	#[error("Upstream API returned HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Preview of the response body.
		body_preview: Option<String>,
	},
	/// Upstream responded with a body that is not valid JSON.
	#[error("Upstream API returned malformed JSON.")]
	MalformedBody {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Upstream answered 2xx with an empty lookup result.
	#[error("Upstream API reported no results.")]
	NoResults,
	/// Upstream answered 2xx but reported an error in the payload.
	#[error("Upstream API rejected the request: {message}.")]
	Rejected {
		/// Upstream-supplied message.
		message: String,
	},
}
