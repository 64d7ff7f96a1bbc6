//! Single-attempt transport to the upstream satellite-tracking API.
//!
//! [`UpstreamClient`] is the relay's only dependency on an HTTP stack. It performs exactly
//! one GET per call and classifies the outcome into the relay taxonomy: network failures,
//! timeouts, HTTP 429 and 5xx become [`TransientError`]; other 4xx statuses and unusable
//! payloads become [`PermanentError`]. Retrying is the caller's business.

// crates.io
#[cfg(feature = "reqwest")]
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{PermanentError, TransientError},
};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Boxed future returned by [`UpstreamClient::fetch`].
pub type UpstreamFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + 'a + Send>>;

const BODY_PREVIEW_LIMIT: usize = 256;

/// Abstraction over HTTP transports able to GET a JSON document from the upstream API.
///
/// Implementations must be `Send + Sync + 'static` so one client can be shared by every
/// concurrent request through an `Arc`, and the returned future must be `Send` so handlers
/// can run on a multi-threaded executor. Dropping the future abandons the call.
pub trait UpstreamClient
where
	Self: 'static + Send + Sync,
{
	/// Issues a single GET against `url` and returns the parsed JSON body.
	fn fetch<'a>(&'a self, url: &'a Url) -> UpstreamFuture<'a>;
}

/// Reqwest-backed [`UpstreamClient`] with a fixed per-call timeout.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestUpstreamClient {
	client: ReqwestClient,
	timeout: Duration,
}
#[cfg(feature = "reqwest")]
impl ReqwestUpstreamClient {
	/// Timeout applied when none is configured.
	pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(10);

	/// Builds a client whose every call is bounded by `timeout`.
	pub fn new(timeout: Duration) -> Result<Self> {
		let client = ReqwestClient::builder()
			.timeout(timeout.unsigned_abs())
			.build()
			.map_err(ConfigError::from)?;

		Ok(Self { client, timeout })
	}

	/// Wraps an existing reqwest client; `timeout` is only used for error reporting, so the
	/// caller must configure the same bound on `client`.
	pub fn with_client(client: ReqwestClient, timeout: Duration) -> Self {
		Self { client, timeout }
	}

	/// Timeout applied to each call.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	fn map_reqwest_error(&self, err: ReqwestError) -> Error {
		// Request URLs carry the API key.
		let err = err.without_url();

		if err.is_builder() {
			return ConfigError::from(err).into();
		}
		if err.is_timeout() {
			return TransientError::Timeout { timeout: self.timeout }.into();
		}

		TransientError::network(err).into()
	}
}
#[cfg(feature = "reqwest")]
impl UpstreamClient for ReqwestUpstreamClient {
	fn fetch<'a>(&'a self, url: &'a Url) -> UpstreamFuture<'a> {
		Box::pin(async move {
			let response = self
				.client
				.get(url.clone())
				.header(ACCEPT, "application/json")
				.send()
				.await
				.map_err(|e| self.map_reqwest_error(e))?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await.map_err(|e| self.map_reqwest_error(e))?;

			classify_response(status, retry_after, &body)
		})
	}
}

/// Maps a raw upstream response onto the relay taxonomy.
///
/// 2xx bodies are parsed as JSON; an object carrying a string `error` field is how the
/// upstream reports rejected requests (bad API key, unknown resource) with a 200 status.
pub fn classify_response(
	status: u16,
	retry_after: Option<Duration>,
	body: &[u8],
) -> Result<Value> {
	match status {
		429 | 500..=599 => Err(TransientError::Status { status, retry_after }.into()),
		200..=299 => {
			let de = &mut serde_json::Deserializer::from_slice(body);
			let payload: Value = serde_path_to_error::deserialize(de).map_err(|source| {
				PermanentError::MalformedBody { source, status: Some(status) }
			})?;

			if let Some(message) = payload.get("error").and_then(Value::as_str) {
				return Err(PermanentError::Rejected { message: message.to_owned() }.into());
			}

			Ok(payload)
		},
		_ => Err(PermanentError::Status { status, body_preview: body_preview(body) }.into()),
	}
}

fn body_preview(body: &[u8]) -> Option<String> {
	if body.is_empty() {
		return None;
	}

	let text = String::from_utf8_lossy(body);

	if text.chars().count() <= BODY_PREVIEW_LIMIT {
		return Some(text.into_owned());
	}

	let mut buf = text.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	Some(buf)
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
