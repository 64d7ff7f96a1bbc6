//! Process-wide gate enforcing a minimum interval between outbound upstream calls.

// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
};

/// Gate consulted before every upstream call sequence.
pub trait RateLimitPolicy
where
	Self: Send + Sync,
{
	/// Decides whether the next upstream call may proceed; an allowed decision is recorded.
	fn guard(&self) -> RateLimitDecision;
}

/// Result emitted by a [`RateLimitPolicy`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The call may proceed immediately.
	Allowed,
	/// The call must not be made now.
	Rejected(RetryDirective),
}
impl RateLimitDecision {
	/// Returns `true` for [`RateLimitDecision::Allowed`].
	pub fn is_allowed(&self) -> bool {
		matches!(self, Self::Allowed)
	}
}

/// Advises callers when the gate opens again after a [`RateLimitDecision::Rejected`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when the gate opens.
	pub earliest_retry_at: OffsetDateTime,
	/// Remaining wait from the moment of the decision.
	pub retry_after: Duration,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, retry_after: Duration) -> Self {
		Self { earliest_retry_at, retry_after }
	}
}

/// Single-timestamp limiter shared by every endpoint kind.
///
/// The first call is always allowed. Afterwards a call is allowed only when at least
/// `min_interval` has elapsed since the last allowed call; rejected calls leave the
/// state untouched and are dropped, not queued. The read-compare-write happens under one
/// lock, so concurrent callers observe a linearizable sequence of `last_call_at` updates.
///
/// A clock that steps backwards past `last_call_at` opens the gate and restarts the interval
/// from the new reading.
pub struct IntervalRateLimiter {
	min_interval: Duration,
	last_call_at: Mutex<Option<OffsetDateTime>>,
	clock: Arc<dyn Clock>,
}
impl IntervalRateLimiter {
	/// Creates a limiter driven by the system clock.
	pub fn new(min_interval: Duration) -> Self {
		Self::with_clock(min_interval, Arc::new(SystemClock))
	}

	/// Creates a limiter driven by the provided clock.
	pub fn with_clock(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
		let min_interval = if min_interval.is_negative() { Duration::ZERO } else { min_interval };

		Self { min_interval, last_call_at: Mutex::new(None), clock }
	}

	/// Minimum spacing enforced between allowed calls.
	pub fn min_interval(&self) -> Duration {
		self.min_interval
	}

	/// Instant of the last allowed call, if any.
	pub fn last_call_at(&self) -> Option<OffsetDateTime> {
		*self.last_call_at.lock()
	}
}
impl RateLimitPolicy for IntervalRateLimiter {
	fn guard(&self) -> RateLimitDecision {
		let mut last_call_at = self.last_call_at.lock();
		let now = self.clock.now();

		if let Some(last) = *last_call_at {
			let elapsed = now - last;

			if !elapsed.is_negative() && elapsed < self.min_interval {
				return RateLimitDecision::Rejected(RetryDirective::new(
					last + self.min_interval,
					self.min_interval - elapsed,
				));
			}
		}

		*last_call_at = Some(now);

		RateLimitDecision::Allowed
	}
}
impl Debug for IntervalRateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IntervalRateLimiter")
			.field("min_interval", &self.min_interval)
			.field("last_call_at", &*self.last_call_at.lock())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::clock::ManualClock;

	fn limiter(min_interval: Duration) -> (IntervalRateLimiter, ManualClock) {
		let clock = ManualClock::new(macros::datetime!(2025-03-01 09:00 UTC));

		(IntervalRateLimiter::with_clock(min_interval, Arc::new(clock.clone())), clock)
	}

	#[test]
	fn first_call_is_always_allowed() {
		let (limiter, _clock) = limiter(Duration::hours(1));

		assert_eq!(limiter.guard(), RateLimitDecision::Allowed);
	}

	#[test]
	fn call_inside_interval_is_rejected_without_mutating_state() {
		let (limiter, clock) = limiter(Duration::seconds(2));

		assert!(limiter.guard().is_allowed());

		let first = limiter.last_call_at();

		clock.advance(Duration::milliseconds(500));

		let decision = limiter.guard();

		assert_eq!(
			decision,
			RateLimitDecision::Rejected(RetryDirective::new(
				macros::datetime!(2025-03-01 09:00:02 UTC),
				Duration::milliseconds(1_500),
			))
		);
		assert_eq!(limiter.last_call_at(), first);
	}

	#[test]
	fn calls_separated_by_interval_are_allowed() {
		let (limiter, clock) = limiter(Duration::seconds(2));

		assert!(limiter.guard().is_allowed());

		clock.advance(Duration::seconds(2));

		assert!(limiter.guard().is_allowed());
		assert_eq!(limiter.last_call_at(), Some(macros::datetime!(2025-03-01 09:00:02 UTC)));
	}

	#[test]
	fn rejected_call_does_not_push_the_window() {
		let (limiter, clock) = limiter(Duration::seconds(2));

		assert!(limiter.guard().is_allowed());

		clock.advance(Duration::seconds(1));

		assert!(!limiter.guard().is_allowed());

		clock.advance(Duration::seconds(1));

		assert!(limiter.guard().is_allowed());
	}

	#[test]
	fn clock_stepping_backwards_reopens_the_gate() {
		let (limiter, clock) = limiter(Duration::seconds(1));

		assert!(limiter.guard().is_allowed());

		clock.advance(Duration::seconds(5));

		assert!(limiter.guard().is_allowed());

		clock.advance(Duration::hours(-1));

		assert!(limiter.guard().is_allowed());
		assert_eq!(limiter.last_call_at(), Some(macros::datetime!(2025-03-01 08:00:05 UTC)));

		clock.advance(Duration::milliseconds(400));

		assert_eq!(
			limiter.guard(),
			RateLimitDecision::Rejected(RetryDirective::new(
				macros::datetime!(2025-03-01 08:00:06 UTC),
				Duration::milliseconds(600),
			))
		);

		clock.advance(Duration::milliseconds(600));

		assert!(limiter.guard().is_allowed());
	}

	#[test]
	fn concurrent_callers_get_exactly_one_permit() {
		let (limiter, _clock) = limiter(Duration::seconds(1));
		let limiter = Arc::new(limiter);
		let handles = (0..8)
			.map(|_| {
				let limiter = Arc::clone(&limiter);

				std::thread::spawn(move || limiter.guard().is_allowed())
			})
			.collect::<Vec<_>>();
		let allowed = handles
			.into_iter()
			.map(|handle| handle.join().expect("Limiter thread should not panic."))
			.filter(|allowed| *allowed)
			.count();

		assert_eq!(allowed, 1);
	}
}
