//! Validated logical keys identifying cacheable upstream requests.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const KEY_MAX_LEN: usize = 128;

/// Error returned when key validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum KeyError {
	/// The key was empty.
	#[error("Cache key cannot be empty.")]
	Empty,
	/// The key contains whitespace characters.
	#[error("Cache key contains whitespace.")]
	ContainsWhitespace,
	/// The key exceeded the allowed byte length.
	#[error("Cache key exceeds {max} bytes.")]
	TooLong {
		/// Maximum permitted length in bytes.
		max: usize,
	},
}

/// Logical key for one cacheable request, e.g. `category_2` or `tle_25544`.
///
/// One key maps to at most one cache entry and one single-flight guard.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);
impl CacheKey {
	/// Creates a new key after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, KeyError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for CacheKey {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for CacheKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<CacheKey> for String {
	fn from(value: CacheKey) -> Self {
		value.0
	}
}
impl TryFrom<String> for CacheKey {
	type Error = KeyError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Borrow<str> for CacheKey {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "CacheKey({})", self.0)
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for CacheKey {
	type Err = KeyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), KeyError> {
	if view.is_empty() {
		return Err(KeyError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(KeyError::ContainsWhitespace);
	}
	if view.len() > KEY_MAX_LEN {
		return Err(KeyError::TooLong { max: KEY_MAX_LEN });
	}

	Ok(())
}
