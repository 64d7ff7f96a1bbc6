//! Route handlers.
//!
//! Numeric query parameters are parsed leniently: missing or malformed values fall back to
//! their defaults instead of rejecting the request.

// crates.io
use axum::{
	Json,
	extract::{Path, Query, State, rejection::PathRejection},
	http::HeaderValue,
	response::{IntoResponse, Response},
};
use serde_json::json;
// self
use crate::{
	_prelude::*,
	fetch::FetchResult,
	satellite::{self, CATEGORIES, Endpoint, Observer, shape},
	server::{AppState, ServerError},
};

/// Response header reporting cache provenance.
pub const CACHE_HEADER: &str = "x-cache";
/// Response header carrying the age of a stale payload in seconds.
pub const AGE_HEADER: &str = "age";
/// Satellites returned by `/api/satellites/{category}` when `limit` is absent.
pub const DEFAULT_LIMIT: usize = 5;
/// Trajectory window when `seconds` is absent.
pub const DEFAULT_TRAJECTORY_SECONDS: u32 = 300;

/// Query string accepted by `/api/satellites/{category}`.
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
	/// Maximum number of satellites to return.
	pub limit: Option<String>,
}

/// Query string accepted by `/api/satellite/{sat_id}/trajectory`.
#[derive(Debug, Default, Deserialize)]
pub struct TrajectoryParams {
	/// Prediction window in seconds.
	pub seconds: Option<String>,
}

/// Query string accepted by `/api/search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
	/// Case-insensitive name fragment.
	pub query: Option<String>,
	/// Category to search within; defaults to all.
	pub category: Option<String>,
	/// Optional cap on the number of matches.
	pub limit: Option<String>,
}

/// Settings the map front end polls for.
#[derive(Debug, Serialize)]
pub struct FrontendConfig {
	/// Observer location.
	pub observer: Observer,
	/// Suggested refresh period in milliseconds.
	pub update_interval_ms: u64,
}

/// `GET /health`
pub async fn health() -> Json<Value> {
	Json(json!({ "status": "ok" }))
}

/// `GET /api/categories`
pub async fn categories() -> Response {
	Json(CATEGORIES).into_response()
}

/// `GET /api/config`
pub async fn frontend_config(State(state): State<AppState>) -> Json<FrontendConfig> {
	Json(FrontendConfig {
		observer: state.config.observer,
		update_interval_ms: state.config.update_interval_ms,
	})
}

/// Numeric path segment; anything else is treated as an unknown route.
pub type Segment = Result<Path<u32>, PathRejection>;

/// `GET /api/satellites/{category}?limit=5`
pub async fn satellites(
	State(state): State<AppState>,
	category: Segment,
	Query(params): Query<LimitParams>,
) -> Result<Response, ServerError> {
	let category = known_category(segment(category)?)?;
	let limit = lenient(params.limit.as_deref()).unwrap_or(DEFAULT_LIMIT);
	let result = state.fetch(Endpoint::above(category)).await;

	Ok(respond(result, |payload| shape::limit_above(payload, limit)))
}

/// `GET /api/satellite/{sat_id}`
pub async fn position(
	State(state): State<AppState>,
	sat_id: Segment,
) -> Result<Response, ServerError> {
	let result = state.fetch(Endpoint::positions(segment(sat_id)?, 1)).await;

	Ok(respond(result, |payload| payload))
}

/// `GET /api/satellite/{sat_id}/trajectory?seconds=300`
pub async fn trajectory(
	State(state): State<AppState>,
	sat_id: Segment,
	Query(params): Query<TrajectoryParams>,
) -> Result<Response, ServerError> {
	let sat_id = segment(sat_id)?;
	let seconds = lenient(params.seconds.as_deref()).unwrap_or(DEFAULT_TRAJECTORY_SECONDS);

	Ok(respond(state.fetch(Endpoint::positions(sat_id, seconds)).await, |payload| payload))
}

/// `GET /api/satellite/{sat_id}/info`
pub async fn info(State(state): State<AppState>, sat_id: Segment) -> Result<Response, ServerError> {
	Ok(respond(state.fetch(Endpoint::tle(segment(sat_id)?)).await, |payload| payload))
}

/// `GET /api/search?query=...&category=0&limit=...`
///
/// Filters the cached "above" list of `category` by satellite name.
pub async fn search(
	State(state): State<AppState>,
	Query(params): Query<SearchParams>,
) -> Response {
	let term = params.query.as_deref().map(str::trim).unwrap_or_default();

	if term.is_empty() {
		return ServerError::BadRequest("Search query is required.").into_response();
	}

	let category = match known_category(lenient(params.category.as_deref()).unwrap_or(0)) {
		Ok(category) => category,
		Err(e) => return e.into_response(),
	};
	let limit = lenient::<usize>(params.limit.as_deref());
	let result = state.fetch(Endpoint::above(category)).await;

	respond(result, |payload| {
		let matches = shape::filter_by_name(payload, term);

		match limit {
			Some(limit) => shape::limit_above(matches, limit),
			None => matches,
		}
	})
}

/// Fallback for unknown routes.
pub async fn not_found() -> ServerError {
	ServerError::RouteNotFound
}

fn segment(path: Segment) -> Result<u32, ServerError> {
	path.map(|Path(value)| value).map_err(|_| ServerError::RouteNotFound)
}

fn known_category(id: u32) -> Result<u32, ServerError> {
	satellite::category(id).map(|category| category.id).ok_or(ServerError::UnknownCategory(id))
}

fn lenient<T>(raw: Option<&str>) -> Option<T>
where
	T: FromStr,
{
	raw.and_then(|raw| raw.trim().parse().ok())
}

fn respond<F>(result: FetchResult, shape: F) -> Response
where
	F: FnOnce(Value) -> Value,
{
	match result {
		FetchResult::Fresh(payload) =>
			([(CACHE_HEADER, HeaderValue::from_static("fresh"))], Json(shape(payload)))
				.into_response(),
		FetchResult::Stale { payload, age } => (
			[
				(CACHE_HEADER, HeaderValue::from_static("stale")),
				(AGE_HEADER, HeaderValue::from(age.whole_seconds().max(0))),
			],
			Json(shape(payload)),
		)
			.into_response(),
		FetchResult::RateLimited { retry_after } =>
			ServerError::RateLimited { retry_after }.into_response(),
		FetchResult::Failed(e) => ServerError::from(e).into_response(),
	}
}
