// self
use crate::{_prelude::*, key::CacheKey, resilience::RetryAttempt};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFetch<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFetch<F> = F;

/// Span wrapping one orchestrated fetch.
#[derive(Clone, Debug)]
pub struct FetchSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FetchSpan {
	/// Creates a new span tagged with the logical key.
	pub fn new(key: &CacheKey) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("orbit_relay.fetch", key = key.as_ref());

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = key;

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFetch<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Notes a fresh cache hit.
pub fn record_cache_hit(key: &CacheKey) {
	#[cfg(feature = "tracing")]
	tracing::debug!(key = key.as_ref(), "Serving fresh cache entry.");
	#[cfg(not(feature = "tracing"))]
	let _ = key;
}

/// Notes a call rejected by the rate gate.
pub fn record_rate_rejected(key: &CacheKey, retry_after: Duration) {
	#[cfg(feature = "tracing")]
	tracing::info!(
		key = key.as_ref(),
		retry_after_ms = millis(retry_after),
		"Rate gate rejected upstream call."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (key, retry_after);
}

/// Notes a scheduled back-off after a transient failure.
pub fn record_backoff(attempt: &RetryAttempt, delay: Duration, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		attempt = attempt.attempt_number,
		max_attempts = attempt.max_attempts,
		delay_ms = millis(delay),
		error = %err,
		"Transient upstream failure; backing off."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (attempt, delay, err);
}

/// Notes that stale data is masking an upstream failure.
pub fn record_stale_fallback(key: &CacheKey, age: Duration) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		key = key.as_ref(),
		age_secs = age.whole_seconds(),
		"Serving stale cache entry."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (key, age);
}

/// Notes a failure surfaced to the caller.
pub fn record_failure(key: &CacheKey, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::error!(key = key.as_ref(), error = %err, "Fetch failed.");
	#[cfg(not(feature = "tracing"))]
	let _ = (key, err);
}

#[cfg(feature = "tracing")]
fn millis(duration: Duration) -> i64 {
	i64::try_from(duration.whole_milliseconds()).unwrap_or(i64::MAX)
}
