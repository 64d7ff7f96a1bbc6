//! Upstream endpoint templating and logical cache keys.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	key::{CacheKey, KeyError},
	satellite::Observer,
};

/// Query parameter carrying the upstream API key.
pub const API_KEY_PARAM: &str = "apiKey";

/// Upstream resources the relay proxies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// Satellites currently above the observer within `radius` degrees.
	Above {
		/// Upstream category identifier; 0 means all.
		category: u32,
		/// Search radius in degrees (0..=90).
		radius: u32,
	},
	/// Predicted ground positions for the next `seconds` seconds.
	Positions {
		/// NORAD catalog number.
		sat_id: u32,
		/// Number of one-second positions requested.
		seconds: u32,
	},
	/// Two-line element set and identity for one satellite.
	Tle {
		/// NORAD catalog number.
		sat_id: u32,
	},
}
impl Endpoint {
	/// Radius used for every "above" query.
	pub const SEARCH_RADIUS: u32 = 90;
	/// Largest position window the upstream accepts.
	pub const MAX_POSITION_SECONDS: u32 = 300;

	/// Satellites above the observer for `category`.
	pub const fn above(category: u32) -> Self {
		Self::Above { category, radius: Self::SEARCH_RADIUS }
	}

	/// Position track for `sat_id`; `seconds` is clamped to `1..=300`.
	pub fn positions(sat_id: u32, seconds: u32) -> Self {
		Self::Positions { sat_id, seconds: seconds.clamp(1, Self::MAX_POSITION_SECONDS) }
	}

	/// TLE lookup for `sat_id`.
	pub const fn tle(sat_id: u32) -> Self {
		Self::Tle { sat_id }
	}

	/// Logical key under which this endpoint's payload is cached.
	///
	/// The radius is fixed, so "above" queries are keyed by category alone.
	pub fn cache_key(&self) -> Result<CacheKey, KeyError> {
		match self {
			Self::Above { category, .. } => CacheKey::new(format!("category_{category}")),
			Self::Positions { sat_id, seconds } =>
				CacheKey::new(format!("positions_{sat_id}_{seconds}")),
			Self::Tle { sat_id } => CacheKey::new(format!("tle_{sat_id}")),
		}
	}

	/// Returns `true` when a successful payload says the satellite is unknown.
	///
	/// The upstream answers lookups of unknown catalog numbers with 200 and an empty `tle`
	/// string or `positions` list. An empty sky is a valid "above" answer.
	pub fn reports_no_results(&self, payload: &Value) -> bool {
		match self {
			Self::Above { .. } => false,
			Self::Positions { .. } =>
				payload.get("positions").and_then(Value::as_array).is_none_or(Vec::is_empty),
			Self::Tle { .. } =>
				payload.get("tle").and_then(Value::as_str).is_none_or(|tle| tle.trim().is_empty()),
		}
	}

	/// Path relative to the upstream base URL.
	pub fn path(&self, observer: &Observer) -> String {
		let Observer { lat, lon, alt } = observer;

		match self {
			Self::Above { category, radius } =>
				format!("above/{lat}/{lon}/{alt}/{radius}/{category}/"),
			Self::Positions { sat_id, seconds } =>
				format!("positions/{sat_id}/{lat}/{lon}/{alt}/{seconds}/"),
			Self::Tle { sat_id } => format!("tle/{sat_id}"),
		}
	}

	/// Full upstream URL including the API key query parameter.
	pub fn url(&self, base: &Url, observer: &Observer, api_key: &str) -> Result<Url> {
		if !base.path().ends_with('/') {
			return Err(ConfigError::InvalidField {
				field: "base_url",
				reason: "must end with `/`".into(),
			}
			.into());
		}

		let mut url = base.join(&self.path(observer)).map_err(ConfigError::from)?;

		url.query_pairs_mut().append_pair(API_KEY_PARAM, api_key);

		Ok(url)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base() -> Url {
		Url::parse("https://api.n2yo.com/rest/v1/satellite/").expect("Base URL should parse.")
	}

	#[test]
	fn above_url_uses_observer_and_category() {
		let url = Endpoint::above(2)
			.url(&base(), &Observer::default(), "secret")
			.expect("Above URL should build.");

		assert_eq!(
			url.as_str(),
			"https://api.n2yo.com/rest/v1/satellite/above/40.7128/-74.006/0/90/2/?apiKey=secret"
		);
	}

	#[test]
	fn positions_and_tle_urls() {
		let observer = Observer { lat: 51.5, lon: -0.12, alt: 35.0 };
		let positions = Endpoint::positions(25544, 1)
			.url(&base(), &observer, "k")
			.expect("Positions URL should build.");
		let tle = Endpoint::tle(25544).url(&base(), &observer, "k").expect("TLE URL should build.");

		assert_eq!(positions.path(), "/rest/v1/satellite/positions/25544/51.5/-0.12/35/1/");
		assert_eq!(tle.path(), "/rest/v1/satellite/tle/25544");
		assert_eq!(tle.query(), Some("apiKey=k"));
	}

	#[test]
	fn api_key_is_percent_encoded() {
		let url = Endpoint::tle(1)
			.url(&base(), &Observer::default(), "a b&c")
			.expect("URL should build.");

		assert_eq!(url.query(), Some("apiKey=a+b%26c"));
	}

	#[test]
	fn base_without_trailing_slash_is_rejected() {
		let base = Url::parse("https://api.n2yo.com/rest/v1/satellite").expect("URL should parse.");
		let err = Endpoint::tle(1)
			.url(&base, &Observer::default(), "k")
			.expect_err("Base without trailing slash should be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidField { field: "base_url", .. })));
	}

	#[test]
	fn empty_lookups_report_no_results() {
		let empty_tle = serde_json::json!({ "info": { "satid": 99999 }, "tle": "" });
		let empty_track = serde_json::json!({ "info": { "satid": 99999 }, "positions": [] });
		let empty_sky = serde_json::json!({ "info": { "satcount": 0 }, "above": [] });

		assert!(Endpoint::tle(99999).reports_no_results(&empty_tle));
		assert!(!Endpoint::tle(25544).reports_no_results(&serde_json::json!({ "tle": "1 2" })));
		assert!(Endpoint::positions(99999, 1).reports_no_results(&empty_track));
		assert!(Endpoint::positions(99999, 1).reports_no_results(&serde_json::json!({})));
		assert!(!Endpoint::above(0).reports_no_results(&empty_sky));
	}

	#[test]
	fn keys_follow_endpoint_identity() {
		let key = |endpoint: Endpoint| endpoint.cache_key().expect("Endpoint key should be valid.");

		assert_eq!(&*key(Endpoint::above(2)), "category_2");
		assert_eq!(&*key(Endpoint::positions(25544, 1)), "positions_25544_1");
		assert_eq!(&*key(Endpoint::positions(25544, 9_000)), "positions_25544_300");
		assert_eq!(&*key(Endpoint::positions(25544, 0)), "positions_25544_1");
		assert_eq!(&*key(Endpoint::tle(25544)), "tle_25544");
	}
}
