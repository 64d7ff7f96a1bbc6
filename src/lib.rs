//! Resilient relay in front of the N2YO satellite-tracking API: a TTL cache that keeps serving
//! stale data through upstream outages, a global rate gate, and jittered exponential retries.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod key;
pub mod obs;
pub mod resilience;
pub mod satellite;
#[cfg(feature = "server")] pub mod server;
pub mod upstream;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		clock::ManualClock,
		config::{RelayConfig, RetrySettings},
		fetch::{ReqwestResilientFetch, ResilientFetch},
		resilience::{IntervalRateLimiter, ResponseCache},
		upstream::ReqwestUpstreamClient,
	};

	/// API key configured by every test fixture.
	pub const TEST_API_KEY: &str = "test-api-key";

	/// Relay settings pointed at a mock upstream rooted at `base_url`.
	///
	/// The gate interval and every back-off delay are zero so tests never sleep.
	pub fn test_relay_config(base_url: &str) -> RelayConfig {
		let base_url =
			if base_url.ends_with('/') { base_url.to_owned() } else { format!("{base_url}/") };

		RelayConfig {
			api_key: Some(TEST_API_KEY.into()),
			base_url,
			min_interval_ms: 0,
			request_timeout_secs: 2,
			retry: RetrySettings {
				max_attempts: 3,
				base_delay_ms: 0,
				max_jitter_ms: 0,
				max_delay_ms: 0,
			},
			..RelayConfig::default()
		}
	}

	/// Builds a reqwest-backed orchestrator whose cache and gate read `clock`.
	pub fn build_reqwest_test_fetch(
		config: &RelayConfig,
		clock: &ManualClock,
	) -> ReqwestResilientFetch {
		let upstream = ReqwestUpstreamClient::new(config.request_timeout())
			.expect("Failed to build Reqwest upstream client for tests.");
		let cache = Arc::new(ResponseCache::with_clock(Arc::new(clock.clone())));
		let limiter = Arc::new(IntervalRateLimiter::with_clock(
			config.min_interval(),
			Arc::new(clock.clone()),
		));

		ResilientFetch::new(upstream, cache, limiter, config.retry_policy())
	}

	/// Handler state over [`build_reqwest_test_fetch`].
	#[cfg(feature = "server")]
	pub fn build_test_app_state(
		config: RelayConfig,
		clock: &ManualClock,
	) -> crate::server::AppState {
		let fetch = build_reqwest_test_fetch(&config, clock);

		crate::server::AppState::with_fetch(config, fetch)
			.expect("Test relay configuration should produce handler state.")
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(feature = "server")] use dotenvy as _;
#[cfg(test)] use {color_eyre as _, http_body_util as _, httpmock as _, tower as _};
