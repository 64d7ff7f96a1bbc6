//! Satellite-tracking domain pieces used by the request handlers.
//!
//! [`Endpoint`] templates upstream URLs and names their cache keys, [`shape`] post-processes
//! the JSON the upstream returns, and [`CATEGORIES`] is the fixed catalog shown to clients.

pub mod category;
pub mod endpoint;
pub mod shape;

pub use category::*;
pub use endpoint::*;

// self
use crate::_prelude::*;

/// Fixed observer location sent with every position query.
///
/// Missing fields take their value from [`Observer::default`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Observer {
	/// Latitude in decimal degrees.
	pub lat: f64,
	/// Longitude in decimal degrees.
	pub lon: f64,
	/// Altitude above sea level in meters.
	pub alt: f64,
}
impl Default for Observer {
	fn default() -> Self {
		// New York City, sea level.
		Self { lat: 40.7128, lon: -74.0060, alt: 0.0 }
	}
}
