//! Bounded exponential backoff with full jitter for transient failures.

// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, obs};

/// Transient bookkeeping for one attempt inside [`RetryPolicy::execute`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryAttempt {
	/// One-based attempt number.
	pub attempt_number: u32,
	/// Attempt budget of the running policy.
	pub max_attempts: u32,
	/// Base delay of the running policy.
	pub base_delay: Duration,
}
impl RetryAttempt {
	/// Returns `true` when no further attempt will be made after this one.
	pub fn is_last(&self) -> bool {
		self.attempt_number >= self.max_attempts
	}

	fn next(self) -> Self {
		Self { attempt_number: self.attempt_number + 1, ..self }
	}
}

/// Retries an operation while it fails with a transient [`Error`].
///
/// Permanent and configuration errors propagate immediately. After the `n`th transient
/// failure (one-based) the policy sleeps `base_delay * 2^n`, raised to any upstream
/// `Retry-After` hint and capped at `max_delay`, plus a uniform jitter in `[0, max_jitter]`.
/// The sleep suspends only the calling task; dropping the returned future cancels it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	max_attempts: u32,
	base_delay: Duration,
	max_jitter: Duration,
	max_delay: Duration,
}
impl RetryPolicy {
	/// Default attempt budget.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
	/// Default base delay.
	pub const DEFAULT_BASE_DELAY: Duration = Duration::seconds(1);
	/// Default jitter bound.
	pub const DEFAULT_MAX_JITTER: Duration = Duration::seconds(1);
	/// Default cap on the exponential component.
	pub const DEFAULT_MAX_DELAY: Duration = Duration::seconds(30);

	/// Creates a policy with the given attempt budget and base delay.
	pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
		Self::default().with_max_attempts(max_attempts).with_base_delay(base_delay)
	}

	/// Overrides the attempt budget; values below one are raised to one.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);

		self
	}

	/// Overrides the base delay.
	pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
		self.base_delay = clamp_non_negative(base_delay);

		self
	}

	/// Overrides the jitter bound; zero disables jitter.
	pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
		self.max_jitter = clamp_non_negative(max_jitter);

		self
	}

	/// Overrides the cap applied to the exponential component.
	pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
		self.max_delay = clamp_non_negative(max_delay);

		self
	}

	/// Attempt budget.
	pub fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	/// Base delay.
	pub fn base_delay(&self) -> Duration {
		self.base_delay
	}

	/// Deterministic part of the delay scheduled after the `attempt_number`th failure.
	pub fn backoff(&self, attempt_number: u32, hint: Option<Duration>) -> Duration {
		let exponential = 2_i32
			.checked_pow(attempt_number)
			.and_then(|factor| self.base_delay.checked_mul(factor))
			.unwrap_or(self.max_delay);
		let hinted = match hint {
			Some(hint) => exponential.max(hint),
			None => exponential,
		};

		hinted.min(self.max_delay)
	}

	fn jitter(&self) -> Duration {
		if !self.max_jitter.is_positive() {
			return Duration::ZERO;
		}

		let bound = i64::try_from(self.max_jitter.whole_milliseconds()).unwrap_or(i64::MAX);

		Duration::milliseconds(rand::rng().random_range(0..=bound))
	}

	/// Runs `operation` until it succeeds, fails permanently, or exhausts the budget.
	pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
	where
		F: FnMut(RetryAttempt) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let mut attempt = RetryAttempt {
			attempt_number: 1,
			max_attempts: self.max_attempts,
			base_delay: self.base_delay,
		};

		loop {
			let err = match operation(attempt).await {
				Ok(value) => return Ok(value),
				Err(err) => err,
			};

			if !err.is_transient() || attempt.is_last() {
				return Err(err);
			}

			let delay = self.backoff(attempt.attempt_number, err.retry_after()) + self.jitter();

			obs::record_backoff(&attempt, delay, &err);
			tokio::time::sleep(delay.unsigned_abs()).await;

			attempt = attempt.next();
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			base_delay: Self::DEFAULT_BASE_DELAY,
			max_jitter: Self::DEFAULT_MAX_JITTER,
			max_delay: Self::DEFAULT_MAX_DELAY,
		}
	}
}

fn clamp_non_negative(value: Duration) -> Duration {
	if value.is_negative() { Duration::ZERO } else { value }
}
