//! Satellite categories offered to clients.

// self
use crate::_prelude::*;

/// One upstream satellite category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
	/// Upstream category identifier.
	pub id: u32,
	/// Display name.
	pub name: &'static str,
}

/// Categories exposed by `/api/categories`; id 0 means all satellites.
pub const CATEGORIES: &[Category] = &[
	Category { id: 0, name: "All" },
	Category { id: 1, name: "Brightest" },
	Category { id: 2, name: "ISS" },
	Category { id: 3, name: "Weather" },
	Category { id: 4, name: "NOAA" },
	Category { id: 18, name: "Amateur radio" },
	Category { id: 22, name: "Galileo" },
	Category { id: 23, name: "Satellite-Based Augmentation System" },
	Category { id: 24, name: "Navy Navigation Satellite System" },
	Category { id: 25, name: "Russian LEO Navigation" },
];

/// Looks up a category by identifier.
pub fn category(id: u32) -> Option<&'static Category> {
	CATEGORIES.iter().find(|category| category.id == id)
}
