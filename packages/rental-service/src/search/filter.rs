use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use rental_query::{Aggregate, AggregateQuery, PredicateSet};

/// Flat listing filter. Blank strings and empty lists count as absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListingFilters {
	pub city: Option<String>,
	pub district: Option<String>,
	pub ward: Option<String>,
	pub building_types: Vec<String>,
	pub address_contains: Option<String>,
	pub property_amenities: Vec<String>,
	pub min_area: Option<f64>,
	pub max_area: Option<f64>,
	pub min_bedrooms: Option<i32>,
	pub max_bedrooms: Option<i32>,
	pub unit_amenities: Vec<String>,
	pub title_contains: Option<String>,
	pub min_price: Option<i64>,
	pub max_price: Option<i64>,
	pub lease_term_months: Option<i32>,
	pub pets_allowed: Option<bool>,
	pub active: Option<bool>,
	pub tags: Vec<String>,
	#[serde(with = "rental_storage::time_serde::option")]
	pub created_after: Option<OffsetDateTime>,
	#[serde(with = "rental_storage::time_serde::option")]
	pub created_before: Option<OffsetDateTime>,
}
impl ListingFilters {
	/// Property and unit aggregates first, listing (the root) last.
	pub fn aggregates(&self) -> Vec<AggregateQuery> {
		let property = locality(PredicateSet::new(), &self.city, &self.district, &self.ward);
		let property = building(property, &self.building_types, &self.address_contains);
		let property = amenities(property, &self.property_amenities);
		let unit = units(
			PredicateSet::new(),
			(self.min_area, self.max_area),
			(self.min_bedrooms, self.max_bedrooms),
			&self.unit_amenities,
		);
		let mut listing = PredicateSet::new();

		if let Some(title) = text(&self.title_contains) {
			listing = listing.contains("title", title);
		}

		listing = range(listing, "price", self.min_price, self.max_price);

		if let Some(months) = self.lease_term_months {
			listing = listing.eq("lease_term_months", months);
		}
		if let Some(pets_allowed) = self.pets_allowed {
			listing = listing.eq("pets_allowed", pets_allowed);
		}
		if let Some(active) = self.active {
			listing = listing.eq("active", active);
		}
		if let Some(tags) = list(&self.tags) {
			listing = listing.exists("tags", PredicateSet::new().one_of("tag", tags));
		}

		listing = range(listing, "created_at", self.created_after, self.created_before);

		vec![
			AggregateQuery::new(Aggregate::Property, property),
			AggregateQuery::new(Aggregate::Unit, unit),
			AggregateQuery::new(Aggregate::Listing, listing),
		]
	}
}

/// Flat property filter. Blank strings and empty lists count as absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PropertyFilters {
	pub city: Option<String>,
	pub district: Option<String>,
	pub ward: Option<String>,
	pub building_types: Vec<String>,
	pub address_contains: Option<String>,
	pub amenities: Vec<String>,
	pub min_area: Option<f64>,
	pub max_area: Option<f64>,
	pub is_public: Option<bool>,
	pub min_bedrooms: Option<i32>,
	pub max_bedrooms: Option<i32>,
	pub unit_amenities: Vec<String>,
	/// Only properties with at least one active listing.
	pub has_active_listing: bool,
}
impl PropertyFilters {
	/// Unit and listing aggregates first, property (the root) last.
	pub fn aggregates(&self) -> Vec<AggregateQuery> {
		let property = locality(PredicateSet::new(), &self.city, &self.district, &self.ward);
		let property = building(property, &self.building_types, &self.address_contains);
		let property = amenities(property, &self.amenities);
		let mut property = range(property, "area", self.min_area, self.max_area);

		if let Some(is_public) = self.is_public {
			property = property.eq("is_public", is_public);
		}

		let unit = units(
			PredicateSet::new(),
			(None, None),
			(self.min_bedrooms, self.max_bedrooms),
			&self.unit_amenities,
		);
		let listing = if self.has_active_listing {
			PredicateSet::new().eq("active", true)
		} else {
			PredicateSet::new()
		};

		vec![
			AggregateQuery::new(Aggregate::Unit, unit),
			AggregateQuery::new(Aggregate::Listing, listing),
			AggregateQuery::new(Aggregate::Property, property),
		]
	}
}

fn locality(
	set: PredicateSet,
	city: &Option<String>,
	district: &Option<String>,
	ward: &Option<String>,
) -> PredicateSet {
	[("city", city), ("district", district), ("ward", ward)].into_iter().fold(
		set,
		|set, (field, value)| match text(value) {
			Some(value) => set.eq(field, value),
			None => set,
		},
	)
}

fn building(
	mut set: PredicateSet,
	building_types: &[String],
	address_contains: &Option<String>,
) -> PredicateSet {
	if let Some(types) = list(building_types) {
		set = set.one_of("building_type", types);
	}
	if let Some(address) = text(address_contains) {
		set = set.contains("full_address", address);
	}

	set
}

fn amenities(set: PredicateSet, amenities: &[String]) -> PredicateSet {
	match list(amenities) {
		Some(amenities) => set.exists("amenities", PredicateSet::new().one_of("amenity", amenities)),
		None => set,
	}
}

fn units(
	set: PredicateSet,
	area: (Option<f64>, Option<f64>),
	bedrooms: (Option<i32>, Option<i32>),
	unit_amenities: &[String],
) -> PredicateSet {
	let set = range(set, "area", area.0, area.1);
	let set = range(set, "bedrooms", bedrooms.0, bedrooms.1);

	amenities(set, unit_amenities)
}

fn range<V>(mut set: PredicateSet, field: &str, min: Option<V>, max: Option<V>) -> PredicateSet
where
	V: Into<rental_query::SqlValue>,
{
	if let Some(min) = min {
		set = set.at_least(field, min);
	}
	if let Some(max) = max {
		set = set.at_most(field, max);
	}

	set
}

fn text(value: &Option<String>) -> Option<&str> {
	value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn list(values: &[String]) -> Option<Vec<&str>> {
	let values: Vec<&str> =
		values.iter().map(|value| value.trim()).filter(|value| !value.is_empty()).collect();

	(!values.is_empty()).then_some(values)
}
