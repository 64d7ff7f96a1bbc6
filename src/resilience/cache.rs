//! In-memory response cache with freshness checks and stale reads.

// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	key::CacheKey,
};

type EntryMap = RwLock<HashMap<CacheKey, CacheEntry>>;

/// Last successful payload stored for a logical key.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
	/// Key the entry belongs to.
	pub key: CacheKey,
	/// Parsed upstream payload.
	pub payload: Value,
	/// When the payload was stored.
	pub fetched_at: OffsetDateTime,
}

/// Payload read back from the cache together with its age.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedPayload {
	/// Cached payload.
	pub payload: Value,
	/// Time elapsed since the payload was stored.
	pub age: Duration,
}

/// Process-lifetime cache holding one entry per logical key.
///
/// Entries are only ever overwritten by a newer successful fetch; there is no eviction
/// because the key space is the small set of category/satellite combinations requested.
pub struct ResponseCache {
	entries: EntryMap,
	clock: Arc<dyn Clock>,
}
impl ResponseCache {
	/// Freshness window applied when none is configured.
	pub const DEFAULT_TTL: Duration = Duration::seconds(300);

	/// Creates an empty cache driven by the system clock.
	pub fn new() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}

	/// Creates an empty cache driven by the provided clock.
	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self { entries: RwLock::new(HashMap::new()), clock }
	}

	/// Returns the payload only while `now - fetched_at < ttl`.
	pub fn get_fresh(&self, key: &CacheKey, ttl: Duration) -> Option<Value> {
		let now = self.clock.now();
		let entries = self.entries.read();
		let entry = entries.get(key)?;

		(now - entry.fetched_at < ttl).then(|| entry.payload.clone())
	}

	/// Returns the payload regardless of freshness, with its age.
	pub fn get_any(&self, key: &CacheKey) -> Option<CachedPayload> {
		let now = self.clock.now();
		let entries = self.entries.read();

		entries.get(key).map(|entry| CachedPayload {
			payload: entry.payload.clone(),
			age: (now - entry.fetched_at).max(Duration::ZERO),
		})
	}

	/// Upserts the payload for `key`, stamping it with the current time.
	///
	/// `fetched_at` never moves backwards for a key, even if the clock does.
	pub fn put(&self, key: CacheKey, payload: Value) {
		let now = self.clock.now();
		let mut entries = self.entries.write();
		let fetched_at = match entries.get(&key) {
			Some(existing) if existing.fetched_at > now => existing.fetched_at,
			_ => now,
		};

		entries.insert(key.clone(), CacheEntry { key, payload, fetched_at });
	}

	/// Snapshot of the entry stored for `key`.
	pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
		self.entries.read().get(key).cloned()
	}

	/// Number of cached keys.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing has been cached yet.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}
impl Default for ResponseCache {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for ResponseCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResponseCache").field("len", &self.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	use time::macros;
	// self
	use super::*;
	use crate::clock::ManualClock;

	fn cache() -> (ResponseCache, ManualClock) {
		let clock = ManualClock::new(macros::datetime!(2025-05-05 18:00 UTC));

		(ResponseCache::with_clock(Arc::new(clock.clone())), clock)
	}

	fn key(value: &str) -> CacheKey {
		CacheKey::new(value).expect("Cache key fixture should be valid.")
	}

	#[test]
	fn empty_cache_misses() {
		let (cache, _clock) = cache();

		assert!(cache.is_empty());
		assert_eq!(cache.get_fresh(&key("category_2"), ResponseCache::DEFAULT_TTL), None);
		assert_eq!(cache.get_any(&key("category_2")), None);
	}

	#[test]
	fn freshness_window_is_exclusive() {
		let (cache, clock) = cache();
		let ttl = Duration::seconds(300);

		cache.put(key("category_2"), json!({ "above": [] }));
		clock.advance(Duration::seconds(299));

		assert!(cache.get_fresh(&key("category_2"), ttl).is_some());

		clock.advance(Duration::seconds(1));

		assert_eq!(cache.get_fresh(&key("category_2"), ttl), None);
	}

	#[test]
	fn stale_reads_report_age() {
		let (cache, clock) = cache();

		cache.put(key("tle_25544"), json!({ "tle": "1 25544U" }));
		clock.advance(Duration::seconds(400));

		let stale = cache.get_any(&key("tle_25544")).expect("Stale entry should be readable.");

		assert_eq!(stale.payload, json!({ "tle": "1 25544U" }));
		assert_eq!(stale.age, Duration::seconds(400));
	}

	#[test]
	fn put_overwrites_and_never_rewinds_fetched_at() {
		let (cache, clock) = cache();

		cache.put(key("category_0"), json!(1));
		clock.advance(Duration::seconds(10));
		cache.put(key("category_0"), json!(2));

		let entry = cache.entry(&key("category_0")).expect("Entry should exist.");

		assert_eq!(entry.payload, json!(2));
		assert_eq!(entry.fetched_at, macros::datetime!(2025-05-05 18:00:10 UTC));

		clock.advance(Duration::seconds(-60));
		cache.put(key("category_0"), json!(3));

		let entry = cache.entry(&key("category_0")).expect("Entry should exist.");

		assert_eq!(entry.payload, json!(3));
		assert_eq!(entry.fetched_at, macros::datetime!(2025-05-05 18:00:10 UTC));
		assert_eq!(cache.len(), 1);
	}
}
