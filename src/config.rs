//! Startup configuration loaded from an optional file and the process environment.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults.
//! 2. `N2YO_API_KEY`, as the default API key.
//! 3. `orbit-relay.{toml,yaml,json}` in the working directory, when present.
//! 4. `ORBIT_RELAY_*` variables; nested fields use `__` (e.g. `ORBIT_RELAY_OBSERVER__LAT`).
//!
//! There is no runtime reconfiguration.

// crates.io
use ::config::{Config, Environment, File};
// self
use crate::{_prelude::*, error::ConfigError, resilience::RetryPolicy, satellite::Observer};

/// Environment variable prefix for every relay setting.
pub const ENV_PREFIX: &str = "ORBIT_RELAY";
/// Legacy variable honoured as the API-key default.
pub const LEGACY_API_KEY_VAR: &str = "N2YO_API_KEY";
/// Base name of the optional configuration file.
pub const FILE_NAME: &str = "orbit-relay";

/// Relay settings; every field has a default.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
	/// Upstream API key; required before the relay can call upstream.
	#[serde(skip_serializing)]
	pub api_key: Option<String>,
	/// Upstream base URL; must end with `/`.
	pub base_url: String,
	/// Observer location sent with position queries.
	pub observer: Observer,
	/// Socket address the HTTP server binds to.
	pub bind_addr: String,
	/// Cache freshness window in seconds.
	pub cache_ttl_secs: u64,
	/// Minimum spacing between upstream call sequences in milliseconds.
	pub min_interval_ms: u64,
	/// Per-call upstream timeout in seconds.
	pub request_timeout_secs: u64,
	/// Retry policy settings.
	pub retry: RetrySettings,
	/// Polling interval hint handed to the map front end, in milliseconds.
	pub update_interval_ms: u64,
}
impl RelayConfig {
	/// Reads the file and environment sources and validates the result.
	pub fn load() -> Result<Self> {
		Self::load_from(Self::environment(), std::env::var(LEGACY_API_KEY_VAR).ok())
	}

	/// Environment source with the relay's prefix and nesting separator.
	pub fn environment() -> Environment {
		Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__").try_parsing(true)
	}

	/// Loads from the file source plus `env`, using `legacy_api_key` as the API-key default.
	pub fn load_from(env: Environment, legacy_api_key: Option<String>) -> Result<Self> {
		let mut builder = Config::builder();

		if let Some(api_key) = legacy_api_key {
			builder = builder.set_default("api_key", api_key).map_err(ConfigError::from)?;
		}

		let config: Self = builder
			.add_source(File::with_name(FILE_NAME).required(false))
			.add_source(env)
			.build()
			.and_then(Config::try_deserialize)
			.map_err(ConfigError::from)?;

		config.validate()?;

		Ok(config)
	}

	/// Checks ranges and formats that serde cannot express.
	pub fn validate(&self) -> Result<()> {
		if self.api_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
			return Err(invalid("api_key", "must not be blank"));
		}

		self.base_url()?;

		if !(-90.0..=90.0).contains(&self.observer.lat) {
			return Err(invalid("observer.lat", "must be within [-90, 90]"));
		}
		if !(-180.0..=180.0).contains(&self.observer.lon) {
			return Err(invalid("observer.lon", "must be within [-180, 180]"));
		}
		if self.retry.max_attempts == 0 {
			return Err(invalid("retry.max_attempts", "must be at least 1"));
		}
		if self.request_timeout_secs == 0 {
			return Err(invalid("request_timeout_secs", "must be at least 1"));
		}

		Ok(())
	}

	/// API key, or [`ConfigError::MissingApiKey`] when none is configured.
	pub fn api_key(&self) -> Result<&str> {
		self.api_key.as_deref().ok_or_else(|| ConfigError::MissingApiKey.into())
	}

	/// Parsed upstream base URL.
	pub fn base_url(&self) -> Result<Url> {
		let url = Url::parse(&self.base_url).map_err(ConfigError::from)?;

		if !url.path().ends_with('/') {
			return Err(invalid("base_url", "must end with `/`"));
		}

		Ok(url)
	}

	/// Cache freshness window.
	pub fn cache_ttl(&self) -> Duration {
		seconds(self.cache_ttl_secs)
	}

	/// Minimum spacing between upstream call sequences.
	pub fn min_interval(&self) -> Duration {
		millis(self.min_interval_ms)
	}

	/// Per-call upstream timeout.
	pub fn request_timeout(&self) -> Duration {
		seconds(self.request_timeout_secs)
	}

	/// Retry policy built from [`RelayConfig::retry`].
	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy::new(self.retry.max_attempts, millis(self.retry.base_delay_ms))
			.with_max_jitter(millis(self.retry.max_jitter_ms))
			.with_max_delay(millis(self.retry.max_delay_ms))
	}
}
impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			api_key: None,
			base_url: "https://api.n2yo.com/rest/v1/satellite/".into(),
			observer: Observer::default(),
			bind_addr: "0.0.0.0:5000".into(),
			cache_ttl_secs: 300,
			min_interval_ms: 1_000,
			request_timeout_secs: 10,
			retry: RetrySettings::default(),
			update_interval_ms: 5_000,
		}
	}
}
impl Debug for RelayConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RelayConfig")
			.field("api_key_set", &self.api_key.is_some())
			.field("base_url", &self.base_url)
			.field("observer", &self.observer)
			.field("bind_addr", &self.bind_addr)
			.field("cache_ttl_secs", &self.cache_ttl_secs)
			.field("min_interval_ms", &self.min_interval_ms)
			.field("request_timeout_secs", &self.request_timeout_secs)
			.field("retry", &self.retry)
			.field("update_interval_ms", &self.update_interval_ms)
			.finish()
	}
}

/// Retry settings expressed in plain integers for file/env sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
	/// Attempt budget, including the first attempt.
	pub max_attempts: u32,
	/// Base back-off delay in milliseconds.
	pub base_delay_ms: u64,
	/// Upper bound of the uniform jitter in milliseconds.
	pub max_jitter_ms: u64,
	/// Cap on the exponential component in milliseconds.
	pub max_delay_ms: u64,
}
impl Default for RetrySettings {
	fn default() -> Self {
		Self { max_attempts: 3, base_delay_ms: 1_000, max_jitter_ms: 1_000, max_delay_ms: 30_000 }
	}
}

fn invalid(field: &'static str, reason: &str) -> Error {
	ConfigError::InvalidField { field, reason: reason.into() }.into()
}

fn seconds(value: u64) -> Duration {
	Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

fn millis(value: u64) -> Duration {
	Duration::milliseconds(i64::try_from(value).unwrap_or(i64::MAX))
}
