//! Field catalog for the three aggregates and their child tables.
//!
//! Every filterable column and every related collection is listed here; anything else is
//! rejected by the builder. Aggregates only join along the fixed containment hierarchy
//! described by [`link`].

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Aggregate {
	Property,
	Unit,
	Listing,
}
impl Aggregate {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Property => "property",
			Self::Unit => "unit",
			Self::Listing => "listing",
		}
	}

	pub fn schema(self) -> &'static TableSchema {
		match self {
			Self::Property => &PROPERTIES,
			Self::Unit => &UNITS,
			Self::Listing => &LISTINGS,
		}
	}

	pub fn table(self) -> &'static str {
		self.schema().table
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
	Uuid,
	Text,
	Int,
	Float,
	Bool,
	Timestamp,
}
impl FieldKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Uuid => "uuid",
			Self::Text => "text",
			Self::Int => "integer",
			Self::Float => "float",
			Self::Bool => "boolean",
			Self::Timestamp => "timestamp",
		}
	}

	pub fn supports_range(self) -> bool {
		matches!(self, Self::Int | Self::Float | Self::Timestamp)
	}

	pub fn supports_membership(self) -> bool {
		matches!(self, Self::Uuid | Self::Text | Self::Int)
	}

	pub fn supports_substring(self) -> bool {
		matches!(self, Self::Text)
	}
}

#[derive(Debug)]
pub struct FieldDef {
	pub name: &'static str,
	pub kind: FieldKind,
	pub sortable: bool,
}

/// A child table reachable through `<child>.<owning_key> = <parent>.id`.
#[derive(Debug)]
pub struct RelatedDef {
	pub name: &'static str,
	pub owning_key: &'static str,
	pub schema: &'static TableSchema,
}

#[derive(Debug)]
pub struct TableSchema {
	pub table: &'static str,
	pub fields: &'static [FieldDef],
	pub related: &'static [RelatedDef],
}
impl TableSchema {
	pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
		self.fields.iter().find(|field| field.name == name)
	}

	pub fn related(&self, name: &str) -> Option<&'static RelatedDef> {
		self.related.iter().find(|related| related.name == name)
	}

	pub fn column(&self, field: &FieldDef) -> String {
		format!("{}.{}", self.table, field.name)
	}
}

/// How a non-root aggregate correlates with the root row.
///
/// Each variant connects on exactly one key: either the child's own id or the child's owning
/// id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
	/// `<child>.id = <root>.<root_column>`
	ChildId { root_column: &'static str },
	/// `<child>.<child_column> = <root>.id`
	OwningId { child_column: &'static str },
	/// `<child>.id` is paired with `<root>.id` in a junction table.
	Membership { junction: &'static str, root_column: &'static str, child_column: &'static str },
}
impl Link {
	pub fn correlate(&self, root_table: &str, child_table: &str) -> String {
		match self {
			Self::ChildId { root_column } => format!("{child_table}.id = {root_table}.{root_column}"),
			Self::OwningId { child_column } =>
				format!("{child_table}.{child_column} = {root_table}.id"),
			Self::Membership { junction, root_column, child_column } => format!(
				"EXISTS (SELECT 1 FROM {junction} WHERE {junction}.{child_column} = {child_table}.id AND {junction}.{root_column} = {root_table}.id)"
			),
		}
	}
}

/// The fixed containment hierarchy. Pairs not listed here cannot be composed.
pub fn link(root: Aggregate, child: Aggregate) -> Option<Link> {
	match (root, child) {
		(Aggregate::Listing, Aggregate::Property) | (Aggregate::Unit, Aggregate::Property) =>
			Some(Link::ChildId { root_column: "property_id" }),
		(Aggregate::Listing, Aggregate::Unit) => Some(Link::Membership {
			junction: "listing_units",
			root_column: "listing_id",
			child_column: "unit_id",
		}),
		(Aggregate::Property, Aggregate::Unit) => Some(Link::OwningId { child_column: "property_id" }),
		(Aggregate::Property, Aggregate::Listing) =>
			Some(Link::OwningId { child_column: "property_id" }),
		_ => None,
	}
}

const fn field(name: &'static str, kind: FieldKind) -> FieldDef {
	FieldDef { name, kind, sortable: false }
}

const fn sortable(name: &'static str, kind: FieldKind) -> FieldDef {
	FieldDef { name, kind, sortable: true }
}

pub static PROPERTIES: TableSchema = TableSchema {
	table: "properties",
	fields: &[
		field("id", FieldKind::Uuid),
		field("owner_id", FieldKind::Uuid),
		sortable("name", FieldKind::Text),
		field("building_type", FieldKind::Text),
		field("full_address", FieldKind::Text),
		sortable("city", FieldKind::Text),
		sortable("district", FieldKind::Text),
		field("ward", FieldKind::Text),
		field("latitude", FieldKind::Float),
		field("longitude", FieldKind::Float),
		sortable("area", FieldKind::Float),
		field("number_of_floors", FieldKind::Int),
		sortable("year_built", FieldKind::Int),
		field("is_public", FieldKind::Bool),
		sortable("created_at", FieldKind::Timestamp),
		sortable("updated_at", FieldKind::Timestamp),
	],
	related: &[
		RelatedDef { name: "amenities", owning_key: "property_id", schema: &PROPERTY_AMENITIES },
		RelatedDef { name: "units", owning_key: "property_id", schema: &UNITS },
		RelatedDef { name: "listings", owning_key: "property_id", schema: &LISTINGS },
	],
};

pub static PROPERTY_AMENITIES: TableSchema = TableSchema {
	table: "property_amenities",
	fields: &[field("amenity", FieldKind::Text)],
	related: &[],
};

pub static UNITS: TableSchema = TableSchema {
	table: "units",
	fields: &[
		field("id", FieldKind::Uuid),
		field("property_id", FieldKind::Uuid),
		sortable("name", FieldKind::Text),
		sortable("floor", FieldKind::Int),
		sortable("area", FieldKind::Float),
		sortable("bedrooms", FieldKind::Int),
		sortable("bathrooms", FieldKind::Int),
		field("has_balcony", FieldKind::Bool),
		sortable("created_at", FieldKind::Timestamp),
		sortable("updated_at", FieldKind::Timestamp),
	],
	related: &[RelatedDef { name: "amenities", owning_key: "unit_id", schema: &UNIT_AMENITIES }],
};

pub static UNIT_AMENITIES: TableSchema = TableSchema {
	table: "unit_amenities",
	fields: &[field("amenity", FieldKind::Text)],
	related: &[],
};

pub static LISTINGS: TableSchema = TableSchema {
	table: "listings",
	fields: &[
		field("id", FieldKind::Uuid),
		field("creator_id", FieldKind::Uuid),
		field("property_id", FieldKind::Uuid),
		sortable("title", FieldKind::Text),
		field("description", FieldKind::Text),
		sortable("price", FieldKind::Int),
		sortable("security_deposit", FieldKind::Int),
		sortable("lease_term_months", FieldKind::Int),
		field("price_negotiable", FieldKind::Bool),
		field("pets_allowed", FieldKind::Bool),
		field("active", FieldKind::Bool),
		sortable("expires_at", FieldKind::Timestamp),
		sortable("created_at", FieldKind::Timestamp),
		sortable("updated_at", FieldKind::Timestamp),
	],
	related: &[
		RelatedDef { name: "tags", owning_key: "listing_id", schema: &LISTING_TAGS },
		RelatedDef { name: "units", owning_key: "listing_id", schema: &LISTING_UNITS },
	],
};

pub static LISTING_TAGS: TableSchema =
	TableSchema { table: "listing_tags", fields: &[field("tag", FieldKind::Text)], related: &[] };

pub static LISTING_UNITS: TableSchema = TableSchema {
	table: "listing_units",
	fields: &[field("unit_id", FieldKind::Uuid)],
	related: &[],
};

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hierarchy_is_fixed() {
		assert_eq!(
			link(Aggregate::Listing, Aggregate::Property),
			Some(Link::ChildId { root_column: "property_id" })
		);
		assert_eq!(
			link(Aggregate::Property, Aggregate::Unit),
			Some(Link::OwningId { child_column: "property_id" })
		);
		assert!(link(Aggregate::Unit, Aggregate::Listing).is_none());
		assert!(link(Aggregate::Listing, Aggregate::Listing).is_none());
	}

	#[test]
	fn membership_link_goes_through_junction() {
		let link = link(Aggregate::Listing, Aggregate::Unit).expect("Expected listing-unit link.");

		assert_eq!(
			link.correlate("listings", "units"),
			"EXISTS (SELECT 1 FROM listing_units WHERE listing_units.unit_id = units.id AND listing_units.listing_id = listings.id)"
		);
	}

	#[test]
	fn related_collections_resolve_to_child_tables() {
		let units = PROPERTIES.related("units").expect("Expected units relation.");

		assert_eq!(units.schema.table, "units");
		assert_eq!(units.owning_key, "property_id");
		assert!(PROPERTIES.field("units").is_none());
		assert!(LISTINGS.field("price").is_some_and(|field| field.sortable));
	}
}
