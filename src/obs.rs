//! Optional observability helpers for the resilience layer.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit a `orbit_relay.fetch` span per orchestrated fetch (carrying the
//!   logical `key`) plus events for cache hits, rate-gate rejections, back-offs, stale fallbacks
//!   and failures.
//! - Enable `metrics` to increment `orbit_relay_fetch_total` (labeled by `outcome`) and
//!   `orbit_relay_upstream_attempt_total` (labeled by `result`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Terminal states of one orchestrated fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchOutcome {
	/// Served from a fresh cache entry or a successful upstream call.
	Fresh,
	/// Served from an expired cache entry after upstream was unavailable.
	Stale,
	/// Rejected by the rate gate with nothing cached.
	RateLimited,
	/// Failure propagated back to the caller.
	Failed,
}
impl FetchOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FetchOutcome::Fresh => "fresh",
			FetchOutcome::Stale => "stale",
			FetchOutcome::RateLimited => "rate_limited",
			FetchOutcome::Failed => "failed",
		}
	}
}
impl Display for FetchOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Result labels recorded for each single upstream attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttemptOutcome {
	/// Upstream answered with a usable payload.
	Success,
	/// Retryable failure.
	Transient,
	/// Non-retryable failure.
	Permanent,
}
impl AttemptOutcome {
	/// Classifies a single attempt result.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => AttemptOutcome::Success,
			Err(err) if err.is_transient() => AttemptOutcome::Transient,
			Err(_) => AttemptOutcome::Permanent,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AttemptOutcome::Success => "success",
			AttemptOutcome::Transient => "transient",
			AttemptOutcome::Permanent => "permanent",
		}
	}
}
impl Display for AttemptOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
