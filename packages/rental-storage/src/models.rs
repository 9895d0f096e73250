use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A building or house offered for rent, with its child collections.
///
/// `None` on a child collection means it was not loaded, not that it is empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Property {
	pub id: Uuid,
	pub owner_id: Uuid,
	pub name: String,
	pub building_type: String,
	pub full_address: String,
	pub city: String,
	pub district: String,
	pub ward: String,
	pub latitude: Option<f64>,
	pub longitude: Option<f64>,
	pub area: f64,
	pub number_of_floors: Option<i32>,
	pub year_built: Option<i32>,
	pub is_public: bool,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
	#[sqlx(skip)]
	#[serde(default)]
	pub amenities: Option<Vec<String>>,
	#[sqlx(skip)]
	#[serde(default)]
	pub units: Option<Vec<Unit>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Unit {
	pub id: Uuid,
	pub property_id: Uuid,
	pub name: String,
	pub floor: i32,
	pub area: f64,
	pub bedrooms: i32,
	pub bathrooms: i32,
	pub has_balcony: bool,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
	#[sqlx(skip)]
	#[serde(default)]
	pub amenities: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
	pub id: Uuid,
	pub creator_id: Uuid,
	pub property_id: Uuid,
	pub title: String,
	pub description: String,
	pub price: i64,
	pub security_deposit: i64,
	pub lease_term_months: i32,
	pub price_negotiable: bool,
	pub pets_allowed: bool,
	pub active: bool,
	#[serde(default, with = "crate::time_serde::option")]
	pub expires_at: Option<OffsetDateTime>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
	#[sqlx(skip)]
	#[serde(default)]
	pub unit_ids: Option<Vec<Uuid>>,
	#[sqlx(skip)]
	#[serde(default)]
	pub tags: Option<Vec<String>>,
}
impl Listing {
	/// Active and not past its expiry at `now`.
	pub fn is_visible_at(&self, now: OffsetDateTime) -> bool {
		self.active && self.expires_at.is_none_or(|expires_at| expires_at > now)
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewProperty {
	pub owner_id: Uuid,
	pub name: String,
	pub building_type: String,
	pub full_address: String,
	pub city: String,
	pub district: String,
	pub ward: String,
	pub latitude: Option<f64>,
	pub longitude: Option<f64>,
	pub area: f64,
	pub number_of_floors: Option<i32>,
	pub year_built: Option<i32>,
	#[serde(default = "default_true")]
	pub is_public: bool,
	#[serde(default)]
	pub amenities: Vec<String>,
}

/// Sparse update; absent fields keep their stored value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PropertyPatch {
	pub name: Option<String>,
	pub building_type: Option<String>,
	pub full_address: Option<String>,
	pub city: Option<String>,
	pub district: Option<String>,
	pub ward: Option<String>,
	pub area: Option<f64>,
	pub is_public: Option<bool>,
	pub amenities: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewUnit {
	pub property_id: Uuid,
	pub name: String,
	pub floor: i32,
	pub area: f64,
	pub bedrooms: i32,
	pub bathrooms: i32,
	#[serde(default)]
	pub has_balcony: bool,
	#[serde(default)]
	pub amenities: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UnitPatch {
	pub name: Option<String>,
	pub floor: Option<i32>,
	pub area: Option<f64>,
	pub bedrooms: Option<i32>,
	pub bathrooms: Option<i32>,
	pub has_balcony: Option<bool>,
	pub amenities: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewListing {
	pub creator_id: Uuid,
	pub property_id: Uuid,
	pub title: String,
	pub description: String,
	pub price: i64,
	#[serde(default)]
	pub security_deposit: i64,
	pub lease_term_months: i32,
	#[serde(default)]
	pub price_negotiable: bool,
	#[serde(default)]
	pub pets_allowed: bool,
	#[serde(default, with = "crate::time_serde::option")]
	pub expires_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub unit_ids: Vec<Uuid>,
	#[serde(default)]
	pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListingPatch {
	pub title: Option<String>,
	pub description: Option<String>,
	pub price: Option<i64>,
	pub security_deposit: Option<i64>,
	pub lease_term_months: Option<i32>,
	pub price_negotiable: Option<bool>,
	pub pets_allowed: Option<bool>,
	pub active: Option<bool>,
	#[serde(default, with = "crate::time_serde::option")]
	pub expires_at: Option<OffsetDateTime>,
	pub unit_ids: Option<Vec<Uuid>>,
	pub tags: Option<Vec<String>>,
}

/// Ids touched by removing a property: everything that cascaded with it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyRemoval {
	pub unit_ids: Vec<Uuid>,
	pub listing_ids: Vec<Uuid>,
}

/// Ids whose cached aggregates embed a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitOwners {
	pub property_id: Uuid,
	pub listing_ids: Vec<Uuid>,
}

/// Flattened listing row feeding the secondary index.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ListingDocumentRow {
	pub listing_id: Uuid,
	pub property_id: Uuid,
	pub price: i64,
	pub active: bool,
	pub expires_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub city: String,
	pub district: String,
	pub ward: String,
	pub building_type: String,
	pub property_area: f64,
	pub units_area: Option<f64>,
	pub units_bedrooms: Option<i64>,
}

fn default_true() -> bool {
	true
}
