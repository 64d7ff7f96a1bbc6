// self
use crate::obs::{AttemptOutcome, FetchOutcome};

/// Records a fetch outcome via the global metrics recorder (when enabled).
pub fn record_fetch_outcome(outcome: FetchOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("orbit_relay_fetch_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records a single upstream attempt via the global metrics recorder (when enabled).
pub fn record_upstream_attempt(outcome: AttemptOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("orbit_relay_upstream_attempt_total", "result" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}
