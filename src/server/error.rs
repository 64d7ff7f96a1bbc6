//! Handler errors and their HTTP rendering.

// crates.io
use axum::{
	Json,
	http::{HeaderValue, StatusCode, header::RETRY_AFTER},
	response::{IntoResponse, Response},
};
use serde_json::json;
// self
use crate::_prelude::*;

/// Failures surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug, ThisError)]
pub enum ServerError {
	/// The request is missing a required parameter.
	#[error("{0}")]
	BadRequest(&'static str),
	/// The route does not exist or a path segment is malformed.
	#[error("Not found.")]
	RouteNotFound,
	/// The category is not in the catalog.
	#[error("Unknown category {0}.")]
	UnknownCategory(u32),
	/// Upstream reported that the satellite does not exist.
	#[error("Satellite not found.")]
	NotFound(#[source] Error),
	/// The rate gate is closed and nothing is cached.
	#[error("Upstream rate limit reached; retry later.")]
	RateLimited {
		/// Time until the gate opens.
		retry_after: Duration,
	},
	/// Upstream failed and no cached data is available.
	#[error("Failed to fetch satellite data.")]
	Upstream(#[source] Error),
}
impl ServerError {
	/// HTTP status for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::BadRequest(_) => StatusCode::BAD_REQUEST,
			Self::RouteNotFound | Self::UnknownCategory(_) | Self::NotFound(_) =>
				StatusCode::NOT_FOUND,
			Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
			Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}
impl From<Error> for ServerError {
	fn from(e: Error) -> Self {
		if e.is_not_found() { Self::NotFound(e) } else { Self::Upstream(e) }
	}
}
impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		let body = Json(json!({ "error": self.to_string() }));
		let mut response = (status, body).into_response();

		if let Self::RateLimited { retry_after } = self {
			let seconds = HeaderValue::from(ceil_seconds(retry_after));

			response.headers_mut().insert(RETRY_AFTER, seconds);
		}

		response
	}
}

/// Whole seconds, rounded up, never below one.
pub(crate) fn ceil_seconds(duration: Duration) -> i64 {
	let millis = i64::try_from(duration.whole_milliseconds()).unwrap_or(i64::MAX);

	millis.saturating_add(999).div_euclid(1_000).max(1)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::{PermanentError, TransientError};

	#[test]
	fn upstream_errors_map_to_statuses() {
		let missing: ServerError =
			Error::from(PermanentError::Status { status: 404, body_preview: None }).into();
		let bad: ServerError =
			Error::from(PermanentError::Status { status: 401, body_preview: None }).into();
		let down: ServerError =
			Error::from(TransientError::Status { status: 503, retry_after: None }).into();

		let empty: ServerError = Error::from(PermanentError::NoResults).into();

		assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
		assert_eq!(empty.status_code(), StatusCode::NOT_FOUND);
		assert_eq!(ServerError::UnknownCategory(7).status_code(), StatusCode::NOT_FOUND);
		assert_eq!(bad.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(down.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn rate_limited_response_carries_retry_after() {
		let response =
			ServerError::RateLimited { retry_after: Duration::milliseconds(600) }.into_response();

		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(response.headers()[RETRY_AFTER], "1");
	}

	#[test]
	fn seconds_round_up() {
		assert_eq!(ceil_seconds(Duration::ZERO), 1);
		assert_eq!(ceil_seconds(Duration::milliseconds(1_001)), 2);
		assert_eq!(ceil_seconds(Duration::seconds(3)), 3);
	}
}
