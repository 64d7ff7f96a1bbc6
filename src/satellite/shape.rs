//! JSON post-processing applied to upstream payloads before they reach clients.
//!
//! Shaping always works on a copy; cached payloads stay complete.

// self
use crate::_prelude::*;

/// Field holding the satellite list in "above" responses.
pub const ABOVE_FIELD: &str = "above";
/// Field holding a satellite's display name.
pub const NAME_FIELD: &str = "satname";

/// Keeps at most `limit` entries of the `above` list; other payloads pass through.
pub fn limit_above(mut payload: Value, limit: usize) -> Value {
	if let Some(above) = payload.get_mut(ABOVE_FIELD).and_then(Value::as_array_mut) {
		above.truncate(limit);
	}

	payload
}

/// Keeps `above` entries whose `satname` contains `term`, ignoring case.
///
/// Entries without a string `satname` never match.
pub fn filter_by_name(mut payload: Value, term: &str) -> Value {
	let needle = term.to_lowercase();

	if let Some(above) = payload.get_mut(ABOVE_FIELD).and_then(Value::as_array_mut) {
		above.retain(|entry| {
			entry
				.get(NAME_FIELD)
				.and_then(Value::as_str)
				.is_some_and(|name| name.to_lowercase().contains(&needle))
		});
	}

	payload
}

/// Number of entries in the `above` list, if the payload has one.
pub fn above_len(payload: &Value) -> Option<usize> {
	payload.get(ABOVE_FIELD).and_then(Value::as_array).map(Vec::len)
}
