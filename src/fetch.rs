//! Resilient fetch orchestration: fresh cache → rate gate → retried upstream call → stale
//! fallback.
//!
//! [`ResilientFetch::resilient_fetch`] is the only entry point handlers need. Each call runs
//! the state machine below and never blocks on the rate gate:
//!
//! 1. A fresh cache hit is returned immediately without touching upstream.
//! 2. Otherwise the per-key single-flight guard is taken and the cache re-checked, so
//!    concurrent misses on one key produce one upstream call sequence.
//! 3. The global rate gate is consulted; a rejection falls through to the stale fallback.
//! 4. The upstream call runs under the retry policy. Success refreshes the cache; a permanent
//!    failure is returned as-is; exhausted transient failures fall through to the stale
//!    fallback.
//! 5. Stale fallback serves whatever is cached, or reports `RateLimited` / `Failed`.

// self
use crate::{
	_prelude::*,
	key::CacheKey,
	obs::{self, AttemptOutcome, FetchOutcome, FetchSpan},
	resilience::{RateLimitDecision, RateLimitPolicy, ResponseCache, RetryPolicy},
	upstream::UpstreamClient,
};
#[cfg(feature = "reqwest")]
use crate::{
	config::RelayConfig, resilience::IntervalRateLimiter, upstream::ReqwestUpstreamClient,
};

#[cfg(feature = "reqwest")]
/// Orchestrator specialized for the crate's default reqwest transport.
pub type ReqwestResilientFetch = ResilientFetch<ReqwestUpstreamClient>;

/// Outcome of one orchestrated fetch, consumed by request handlers.
#[derive(Debug)]
pub enum FetchResult {
	/// Payload from a fresh cache entry or a successful upstream call.
	Fresh(Value),
	/// Expired cached payload served because upstream was unavailable.
	Stale {
		/// Cached payload.
		payload: Value,
		/// Age of the payload when the fallback was evaluated.
		age: Duration,
	},
	/// The rate gate rejected the call and nothing was cached.
	RateLimited {
		/// Time until the gate opens again.
		retry_after: Duration,
	},
	/// The fetch failed and no cached data may mask it.
	Failed(Error),
}
impl FetchResult {
	/// Observability label for this result.
	pub fn outcome(&self) -> FetchOutcome {
		match self {
			Self::Fresh(_) => FetchOutcome::Fresh,
			Self::Stale { .. } => FetchOutcome::Stale,
			Self::RateLimited { .. } => FetchOutcome::RateLimited,
			Self::Failed(_) => FetchOutcome::Failed,
		}
	}

	/// Borrows the payload of `Fresh` and `Stale` results.
	pub fn payload(&self) -> Option<&Value> {
		match self {
			Self::Fresh(payload) | Self::Stale { payload, .. } => Some(payload),
			_ => None,
		}
	}
}

/// Why the stale fallback was entered.
enum FallbackCause {
	Gate(Duration),
	Upstream(Error),
}

type FlightGuards = Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>;

/// Handle on one key's single-flight lock.
struct FlightGuard<'a> {
	guards: &'a FlightGuards,
	key: &'a CacheKey,
	flight: Arc<AsyncMutex<()>>,
}
impl FlightGuard<'_> {
	async fn lock(&self) -> async_lock::MutexGuard<'_, ()> {
		self.flight.lock().await
	}
}
impl Drop for FlightGuard<'_> {
	fn drop(&mut self) {
		let mut guards = self.guards.lock();

		// Handles are only cloned under the map lock: two owners means the map and us.
		if Arc::strong_count(&self.flight) == 2 {
			guards.remove(self.key);
		}
	}
}

/// Composes the upstream client, response cache, rate gate, and retry policy.
///
/// The cache and the limiter are shared by reference, so several orchestrators (or other
/// components) may observe the same state.
pub struct ResilientFetch<C>
where
	C: ?Sized + UpstreamClient,
{
	/// Transport used for every upstream attempt.
	pub upstream: Arc<C>,
	/// Cache consulted before and updated after upstream calls.
	pub cache: Arc<ResponseCache>,
	/// Global gate consulted before each upstream call sequence.
	pub limiter: Arc<dyn RateLimitPolicy>,
	/// Retry policy wrapping each upstream call sequence.
	pub retry: RetryPolicy,
	flight_guards: Arc<FlightGuards>,
}
impl<C> ResilientFetch<C>
where
	C: ?Sized + UpstreamClient,
{
	/// Creates an orchestrator over the provided collaborators.
	pub fn new(
		upstream: impl Into<Arc<C>>,
		cache: Arc<ResponseCache>,
		limiter: Arc<dyn RateLimitPolicy>,
		retry: RetryPolicy,
	) -> Self {
		Self { upstream: upstream.into(), cache, limiter, retry, flight_guards: Default::default() }
	}

	/// Serves `key` from cache or upstream, masking transient failures with stale data.
	///
	/// `build_url` is only invoked when an upstream call is actually attempted.
	pub async fn resilient_fetch<F>(
		&self,
		key: &CacheKey,
		build_url: F,
		ttl: Duration,
	) -> FetchResult
	where
		F: FnOnce() -> Result<Url>,
	{
		let span = FetchSpan::new(key);
		let result = span.instrument(self.run(key, build_url, ttl)).await;

		obs::record_fetch_outcome(result.outcome());

		result
	}

	async fn run<F>(&self, key: &CacheKey, build_url: F, ttl: Duration) -> FetchResult
	where
		F: FnOnce() -> Result<Url>,
	{
		if let Some(payload) = self.cache.get_fresh(key, ttl) {
			obs::record_cache_hit(key);

			return FetchResult::Fresh(payload);
		}

		let flight = self.flight_guard(key);
		let _singleflight = flight.lock().await;

		if let Some(payload) = self.cache.get_fresh(key, ttl) {
			obs::record_cache_hit(key);

			return FetchResult::Fresh(payload);
		}
		if let RateLimitDecision::Rejected(directive) = self.limiter.guard() {
			obs::record_rate_rejected(key, directive.retry_after);

			return self.fall_back(key, FallbackCause::Gate(directive.retry_after));
		}

		let url = match build_url() {
			Ok(url) => url,
			Err(err) => return self.fail(key, err),
		};
		let url = &url;
		let upstream = self.upstream.as_ref();
		let fetched = self
			.retry
			.execute(move |_| async move {
				let result = upstream.fetch(url).await;

				obs::record_upstream_attempt(AttemptOutcome::of(&result));

				result
			})
			.await;

		match fetched {
			Ok(payload) => {
				self.cache.put(key.clone(), payload.clone());

				FetchResult::Fresh(payload)
			},
			Err(err) if err.is_transient() => self.fall_back(key, FallbackCause::Upstream(err)),
			Err(err) => self.fail(key, err),
		}
	}

	fn fall_back(&self, key: &CacheKey, cause: FallbackCause) -> FetchResult {
		if let Some(cached) = self.cache.get_any(key) {
			obs::record_stale_fallback(key, cached.age);

			return FetchResult::Stale { payload: cached.payload, age: cached.age };
		}

		match cause {
			FallbackCause::Gate(retry_after) => FetchResult::RateLimited { retry_after },
			FallbackCause::Upstream(err) => self.fail(key, err),
		}
	}

	fn fail(&self, key: &CacheKey, err: Error) -> FetchResult {
		obs::record_failure(key, &err);

		FetchResult::Failed(err)
	}

	/// Returns (and creates on demand) the single-flight guard for a key.
	///
	/// The map entry is dropped again once the last holder releases it.
	fn flight_guard<'a>(&'a self, key: &'a CacheKey) -> FlightGuard<'a> {
		let mut guards = self.flight_guards.lock();
		let flight =
			guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone();

		FlightGuard { guards: &self.flight_guards, key, flight }
	}
}
#[cfg(feature = "reqwest")]
impl ResilientFetch<ReqwestUpstreamClient> {
	/// Wires the reqwest transport, an empty cache, and an interval gate from `config`.
	pub fn from_config(config: &RelayConfig) -> Result<Self> {
		let upstream = ReqwestUpstreamClient::new(config.request_timeout())?;
		let limiter = Arc::new(IntervalRateLimiter::new(config.min_interval()));

		Ok(Self::new(upstream, Arc::new(ResponseCache::new()), limiter, config.retry_policy()))
	}
}
impl<C> Clone for ResilientFetch<C>
where
	C: ?Sized + UpstreamClient,
{
	fn clone(&self) -> Self {
		Self {
			upstream: Arc::clone(&self.upstream),
			cache: Arc::clone(&self.cache),
			limiter: Arc::clone(&self.limiter),
			retry: self.retry,
			flight_guards: Arc::clone(&self.flight_guards),
		}
	}
}
impl<C> Debug for ResilientFetch<C>
where
	C: ?Sized + UpstreamClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResilientFetch")
			.field("cache", &self.cache)
			.field("retry", &self.retry)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// crates.io
	use serde_json::json;
	use time::macros;
	// self
	use super::*;
	use crate::{
		clock::ManualClock,
		error::{ConfigError, PermanentError, TransientError},
		resilience::IntervalRateLimiter,
		upstream::UpstreamFuture,
	};

	const TTL: Duration = Duration::seconds(300);

	/// Upstream double that replays scripted results, then keeps failing transiently.
	struct ScriptedUpstream {
		script: Mutex<VecDeque<Result<Value>>>,
		calls: AtomicUsize,
	}
	impl ScriptedUpstream {
		fn with(results: impl IntoIterator<Item = Result<Value>>) -> Self {
			Self { script: Mutex::new(results.into_iter().collect()), calls: AtomicUsize::new(0) }
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl UpstreamClient for ScriptedUpstream {
		fn fetch<'a>(&'a self, _url: &'a Url) -> UpstreamFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let next = self.script.lock().pop_front().unwrap_or_else(|| Err(unavailable()));

			Box::pin(async move { next })
		}
	}

	struct Harness {
		fetch: ResilientFetch<ScriptedUpstream>,
		upstream: Arc<ScriptedUpstream>,
		clock: ManualClock,
	}
	impl Harness {
		fn new(results: impl IntoIterator<Item = Result<Value>>) -> Self {
			Self::with_interval(results, Duration::ZERO)
		}

		fn with_interval(
			results: impl IntoIterator<Item = Result<Value>>,
			min_interval: Duration,
		) -> Self {
			let clock = ManualClock::new(macros::datetime!(2025-07-01 20:00 UTC));
			let upstream = Arc::new(ScriptedUpstream::with(results));
			let cache = Arc::new(ResponseCache::with_clock(Arc::new(clock.clone())));
			let limiter = Arc::new(IntervalRateLimiter::with_clock(
				min_interval,
				Arc::new(clock.clone()),
			));
			let retry = RetryPolicy::new(3, Duration::ZERO).with_max_jitter(Duration::ZERO);
			let fetch = ResilientFetch::new(upstream.clone(), cache, limiter, retry);

			Self { fetch, upstream, clock }
		}

		async fn get(&self, key: &str) -> FetchResult {
			let key = CacheKey::new(key).expect("Harness key should be valid.");

			self.fetch
				.resilient_fetch(
					&key,
					|| Ok(Url::parse("https://upstream.test/above").expect("URL should parse.")),
					TTL,
				)
				.await
		}
	}

	fn unavailable() -> Error {
		TransientError::Status { status: 503, retry_after: None }.into()
	}

	fn satellites(count: usize) -> Value {
		let above = (1..=count)
			.map(|id| json!({ "satid": id, "satname": format!("SAT-{id}") }))
			.collect::<Vec<_>>();

		json!({ "above": above })
	}

	#[tokio::test]
	async fn cold_key_with_unavailable_upstream_fails() {
		let harness = Harness::new([]);
		let result = harness.get("category_2").await;

		assert!(matches!(result, FetchResult::Failed(ref err) if err.is_transient()));
		assert_eq!(harness.upstream.calls(), 3);
		assert!(harness.fetch.cache.is_empty());
	}

	#[tokio::test]
	async fn fresh_entry_skips_upstream() {
		let harness = Harness::new([Ok(satellites(10))]);

		assert!(matches!(harness.get("category_2").await, FetchResult::Fresh(_)));

		harness.clock.advance(Duration::seconds(100));

		let second = harness.get("category_2").await;

		assert_eq!(second.payload(), Some(&satellites(10)));
		assert_eq!(second.outcome(), FetchOutcome::Fresh);
		assert_eq!(harness.upstream.calls(), 1);
	}

	#[tokio::test]
	async fn expired_entry_falls_back_to_stale_on_transient_failure() {
		let harness = Harness::new([Ok(satellites(4))]);

		harness.get("category_2").await;
		harness.clock.advance(Duration::seconds(400));

		match harness.get("category_2").await {
			FetchResult::Stale { payload, age } => {
				assert_eq!(payload, satellites(4));
				assert_eq!(age, Duration::seconds(400));
			},
			other => panic!("Expected stale fallback, got {other:?}."),
		}

		assert_eq!(harness.upstream.calls(), 4);
	}

	#[tokio::test]
	async fn expired_entry_is_refreshed_when_upstream_recovers() {
		let harness = Harness::new([Ok(satellites(1)), Err(unavailable()), Ok(satellites(2))]);

		harness.get("category_2").await;
		harness.clock.advance(Duration::seconds(301));

		let result = harness.get("category_2").await;

		assert_eq!(result.payload(), Some(&satellites(2)));
		assert_eq!(result.outcome(), FetchOutcome::Fresh);
		assert_eq!(
			harness
				.fetch
				.cache
				.get_fresh(&CacheKey::new("category_2").expect("Key should be valid."), TTL),
			Some(satellites(2))
		);
	}

	#[tokio::test]
	async fn permanent_failure_never_uses_stale_data() {
		let harness = Harness::new([
			Ok(satellites(1)),
			Err(PermanentError::Status { status: 404, body_preview: None }.into()),
		]);

		harness.get("tle_99999").await;
		harness.clock.advance(Duration::seconds(600));

		let result = harness.get("tle_99999").await;

		assert!(matches!(result, FetchResult::Failed(ref err) if err.is_not_found()));
		assert_eq!(harness.upstream.calls(), 2);
	}

	#[tokio::test]
	async fn rate_gate_rejection_serves_stale_or_reports_rate_limited() {
		let harness =
			Harness::with_interval([Ok(satellites(3)), Ok(satellites(5))], Duration::seconds(1));

		harness.get("category_1").await;
		harness.clock.advance(Duration::milliseconds(400));

		let cold = harness.get("category_2").await;

		assert!(matches!(
			cold,
			FetchResult::RateLimited { retry_after } if retry_after == Duration::milliseconds(600)
		));

		harness.clock.advance(Duration::seconds(400));
		harness.get("category_2").await;

		let stale = harness.get("category_1").await;

		assert!(matches!(
			stale,
			FetchResult::Stale { ref payload, .. } if *payload == satellites(3)
		));
		assert_eq!(harness.upstream.calls(), 2);
	}

	#[tokio::test]
	async fn url_builder_errors_fail_without_calling_upstream() {
		let harness = Harness::new([Ok(satellites(1))]);
		let key = CacheKey::new("category_7").expect("Key should be valid.");
		let result = harness
			.fetch
			.resilient_fetch(&key, || Err(ConfigError::MissingApiKey.into()), TTL)
			.await;

		assert!(matches!(result, FetchResult::Failed(Error::Config(ConfigError::MissingApiKey))));
		assert_eq!(harness.upstream.calls(), 0);
	}

	#[tokio::test]
	async fn concurrent_misses_on_one_key_call_upstream_once() {
		let harness = Harness::new([Ok(satellites(6))]);
		let (first, second) = tokio::join!(harness.get("category_3"), harness.get("category_3"));

		assert_eq!(first.payload(), Some(&satellites(6)));
		assert_eq!(second.payload(), Some(&satellites(6)));
		assert_eq!(harness.upstream.calls(), 1);
		assert!(harness.fetch.flight_guards.lock().is_empty());
	}

	#[tokio::test]
	async fn flight_guards_are_released_after_each_fetch() {
		let harness = Harness::with_interval([Ok(satellites(1))], Duration::hours(1));

		assert_eq!(harness.get("category_0").await.outcome(), FetchOutcome::Fresh);

		for sat_id in 0..500 {
			let result = harness.get(&format!("positions_{sat_id}_1")).await;

			assert_eq!(result.outcome(), FetchOutcome::RateLimited);
		}

		assert!(harness.fetch.flight_guards.lock().is_empty());
		assert_eq!(harness.fetch.cache.len(), 1);
		assert_eq!(harness.upstream.calls(), 1);
	}

	#[test]
	fn waiting_flight_keeps_the_shared_guard() {
		let harness = Harness::new([]);
		let key = CacheKey::new("tle_1").expect("Key should be valid.");
		let first = harness.fetch.flight_guard(&key);
		let second = harness.fetch.flight_guard(&key);

		assert!(Arc::ptr_eq(&first.flight, &second.flight));

		drop(first);

		assert_eq!(harness.fetch.flight_guards.lock().len(), 1);

		drop(second);

		assert!(harness.fetch.flight_guards.lock().is_empty());
	}
}
