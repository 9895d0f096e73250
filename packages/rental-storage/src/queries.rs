use std::collections::HashMap;

use sqlx::{
	PgConnection, PgPool, Postgres, Row,
	postgres::PgArguments,
	query::Query,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{
		Listing, ListingDocumentRow, ListingPatch, NewListing, NewProperty, NewUnit, Property,
		PropertyPatch, PropertyRemoval, Unit, UnitOwners, UnitPatch,
	},
};
use rental_query::{SqlValue, Statement};

const PROPERTY_COLUMNS: &str = "\
id, owner_id, name, building_type, full_address, city, district, ward, latitude, longitude, area,
number_of_floors, year_built, is_public, created_at, updated_at";
const UNIT_COLUMNS: &str = "\
id, property_id, name, floor, area, bedrooms, bathrooms, has_balcony, created_at, updated_at";
const LISTING_COLUMNS: &str = "\
id, creator_id, property_id, title, description, price, security_deposit, lease_term_months,
price_negotiable, pets_allowed, active, expires_at, created_at, updated_at";

/// Loads fully hydrated properties (amenities, units, unit amenities). Unknown ids are skipped.
pub async fn load_properties(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Property>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let mut properties: Vec<Property> =
		sqlx::query_as(&format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ANY($1)"))
			.bind(ids)
			.fetch_all(pool)
			.await?;
	let amenities: Vec<(Uuid, String)> = sqlx::query_as(
		"\
SELECT property_id, amenity
FROM property_amenities
WHERE property_id = ANY($1)
ORDER BY amenity",
	)
	.bind(ids)
	.fetch_all(pool)
	.await?;
	let units: Vec<Unit> = sqlx::query_as(&format!(
		"SELECT {UNIT_COLUMNS} FROM units WHERE property_id = ANY($1) ORDER BY floor, name"
	))
	.bind(ids)
	.fetch_all(pool)
	.await?;
	let units = hydrate_units(pool, units).await?;
	let mut amenities = group_by_owner(amenities);
	let mut units_by_property: HashMap<Uuid, Vec<Unit>> = HashMap::new();

	for unit in units {
		units_by_property.entry(unit.property_id).or_default().push(unit);
	}
	for property in &mut properties {
		property.amenities = Some(amenities.remove(&property.id).unwrap_or_default());
		property.units = Some(units_by_property.remove(&property.id).unwrap_or_default());
	}

	Ok(properties)
}

pub async fn load_units(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Unit>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let units: Vec<Unit> =
		sqlx::query_as(&format!("SELECT {UNIT_COLUMNS} FROM units WHERE id = ANY($1)"))
			.bind(ids)
			.fetch_all(pool)
			.await?;

	hydrate_units(pool, units).await
}

pub async fn load_listings(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Listing>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let mut listings: Vec<Listing> =
		sqlx::query_as(&format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ANY($1)"))
			.bind(ids)
			.fetch_all(pool)
			.await?;
	let unit_rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
		"\
SELECT listing_id, unit_id
FROM listing_units
WHERE listing_id = ANY($1)
ORDER BY unit_id",
	)
	.bind(ids)
	.fetch_all(pool)
	.await?;
	let tag_rows: Vec<(Uuid, String)> = sqlx::query_as(
		"\
SELECT listing_id, tag
FROM listing_tags
WHERE listing_id = ANY($1)
ORDER BY tag",
	)
	.bind(ids)
	.fetch_all(pool)
	.await?;
	let mut units = group_by_owner(unit_rows);
	let mut tags = group_by_owner(tag_rows);

	for listing in &mut listings {
		listing.unit_ids = Some(units.remove(&listing.id).unwrap_or_default());
		listing.tags = Some(tags.remove(&listing.id).unwrap_or_default());
	}

	Ok(listings)
}

async fn hydrate_units(pool: &PgPool, mut units: Vec<Unit>) -> Result<Vec<Unit>> {
	let ids: Vec<Uuid> = units.iter().map(|unit| unit.id).collect();

	if ids.is_empty() {
		return Ok(units);
	}

	let rows: Vec<(Uuid, String)> = sqlx::query_as(
		"\
SELECT unit_id, amenity
FROM unit_amenities
WHERE unit_id = ANY($1)
ORDER BY amenity",
	)
	.bind(&ids)
	.fetch_all(pool)
	.await?;
	let mut amenities = group_by_owner(rows);

	for unit in &mut units {
		unit.amenities = Some(amenities.remove(&unit.id).unwrap_or_default());
	}

	Ok(units)
}

pub async fn insert_property(
	pool: &PgPool,
	id: Uuid,
	new: &NewProperty,
	now: OffsetDateTime,
) -> Result<()> {
	let mut tx = pool.begin().await?;

	sqlx::query(
		"\
INSERT INTO properties (
	id,
	owner_id,
	name,
	building_type,
	full_address,
	city,
	district,
	ward,
	latitude,
	longitude,
	area,
	number_of_floors,
	year_built,
	is_public,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)",
	)
	.bind(id)
	.bind(new.owner_id)
	.bind(new.name.as_str())
	.bind(new.building_type.as_str())
	.bind(new.full_address.as_str())
	.bind(new.city.as_str())
	.bind(new.district.as_str())
	.bind(new.ward.as_str())
	.bind(new.latitude)
	.bind(new.longitude)
	.bind(new.area)
	.bind(new.number_of_floors)
	.bind(new.year_built)
	.bind(new.is_public)
	.bind(now)
	.execute(&mut *tx)
	.await?;

	replace_children(&mut tx, "property_amenities", "property_id", "amenity", id, &new.amenities)
		.await?;

	tx.commit().await?;

	Ok(())
}

/// Returns the property's listing ids, or `None` when the property does not exist.
pub async fn update_property(
	pool: &PgPool,
	id: Uuid,
	patch: &PropertyPatch,
	now: OffsetDateTime,
) -> Result<Option<Vec<Uuid>>> {
	let mut tx = pool.begin().await?;
	let result = sqlx::query(
		"\
UPDATE properties
SET
	name = COALESCE($2, name),
	building_type = COALESCE($3, building_type),
	full_address = COALESCE($4, full_address),
	city = COALESCE($5, city),
	district = COALESCE($6, district),
	ward = COALESCE($7, ward),
	area = COALESCE($8, area),
	is_public = COALESCE($9, is_public),
	updated_at = $10
WHERE id = $1",
	)
	.bind(id)
	.bind(patch.name.as_deref())
	.bind(patch.building_type.as_deref())
	.bind(patch.full_address.as_deref())
	.bind(patch.city.as_deref())
	.bind(patch.district.as_deref())
	.bind(patch.ward.as_deref())
	.bind(patch.area)
	.bind(patch.is_public)
	.bind(now)
	.execute(&mut *tx)
	.await?;

	if result.rows_affected() == 0 {
		return Ok(None);
	}

	if let Some(amenities) = &patch.amenities {
		replace_children(&mut tx, "property_amenities", "property_id", "amenity", id, amenities)
			.await?;
	}

	let listing_ids = sqlx::query_scalar("SELECT id FROM listings WHERE property_id = $1")
		.bind(id)
		.fetch_all(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(Some(listing_ids))
}

/// Deletes a property and everything that cascades with it.
pub async fn delete_property(pool: &PgPool, id: Uuid) -> Result<Option<PropertyRemoval>> {
	let mut tx = pool.begin().await?;
	let unit_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM units WHERE property_id = $1")
		.bind(id)
		.fetch_all(&mut *tx)
		.await?;
	let listing_ids: Vec<Uuid> =
		sqlx::query_scalar("SELECT id FROM listings WHERE property_id = $1")
			.bind(id)
			.fetch_all(&mut *tx)
			.await?;
	let result = sqlx::query("DELETE FROM properties WHERE id = $1").bind(id).execute(&mut *tx).await?;

	if result.rows_affected() == 0 {
		return Ok(None);
	}

	tx.commit().await?;

	Ok(Some(PropertyRemoval { unit_ids, listing_ids }))
}

pub async fn insert_unit(pool: &PgPool, id: Uuid, new: &NewUnit, now: OffsetDateTime) -> Result<()> {
	let mut tx = pool.begin().await?;

	ensure_property_exists(&mut tx, new.property_id).await?;

	sqlx::query(
		"\
INSERT INTO units (
	id,
	property_id,
	name,
	floor,
	area,
	bedrooms,
	bathrooms,
	has_balcony,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)",
	)
	.bind(id)
	.bind(new.property_id)
	.bind(new.name.as_str())
	.bind(new.floor)
	.bind(new.area)
	.bind(new.bedrooms)
	.bind(new.bathrooms)
	.bind(new.has_balcony)
	.bind(now)
	.execute(&mut *tx)
	.await?;

	replace_children(&mut tx, "unit_amenities", "unit_id", "amenity", id, &new.amenities).await?;

	tx.commit().await?;

	Ok(())
}

/// Returns the aggregates embedding the unit, or `None` when the unit does not exist.
pub async fn update_unit(
	pool: &PgPool,
	id: Uuid,
	patch: &UnitPatch,
	now: OffsetDateTime,
) -> Result<Option<UnitOwners>> {
	let mut tx = pool.begin().await?;
	let property_id: Option<Uuid> = sqlx::query_scalar(
		"\
UPDATE units
SET
	name = COALESCE($2, name),
	floor = COALESCE($3, floor),
	area = COALESCE($4, area),
	bedrooms = COALESCE($5, bedrooms),
	bathrooms = COALESCE($6, bathrooms),
	has_balcony = COALESCE($7, has_balcony),
	updated_at = $8
WHERE id = $1
RETURNING property_id",
	)
	.bind(id)
	.bind(patch.name.as_deref())
	.bind(patch.floor)
	.bind(patch.area)
	.bind(patch.bedrooms)
	.bind(patch.bathrooms)
	.bind(patch.has_balcony)
	.bind(now)
	.fetch_optional(&mut *tx)
	.await?;
	let Some(property_id) = property_id else {
		return Ok(None);
	};

	if let Some(amenities) = &patch.amenities {
		replace_children(&mut tx, "unit_amenities", "unit_id", "amenity", id, amenities).await?;
	}

	let listing_ids = listings_referencing_unit(&mut tx, id).await?;

	tx.commit().await?;

	Ok(Some(UnitOwners { property_id, listing_ids }))
}

/// Deletes a unit. The returned listings referenced it before the delete.
pub async fn delete_unit(pool: &PgPool, id: Uuid) -> Result<Option<UnitOwners>> {
	let mut tx = pool.begin().await?;
	let listing_ids = listings_referencing_unit(&mut tx, id).await?;
	let property_id: Option<Uuid> =
		sqlx::query_scalar("DELETE FROM units WHERE id = $1 RETURNING property_id")
			.bind(id)
			.fetch_optional(&mut *tx)
			.await?;
	let Some(property_id) = property_id else {
		return Ok(None);
	};

	tx.commit().await?;

	Ok(Some(UnitOwners { property_id, listing_ids }))
}

pub async fn insert_listing(
	pool: &PgPool,
	id: Uuid,
	new: &NewListing,
	now: OffsetDateTime,
) -> Result<()> {
	let mut tx = pool.begin().await?;

	ensure_property_exists(&mut tx, new.property_id).await?;
	ensure_units_belong(&mut tx, new.property_id, &new.unit_ids).await?;

	sqlx::query(
		"\
INSERT INTO listings (
	id,
	creator_id,
	property_id,
	title,
	description,
	price,
	security_deposit,
	lease_term_months,
	price_negotiable,
	pets_allowed,
	active,
	expires_at,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, true, $11, $12, $12)",
	)
	.bind(id)
	.bind(new.creator_id)
	.bind(new.property_id)
	.bind(new.title.as_str())
	.bind(new.description.as_str())
	.bind(new.price)
	.bind(new.security_deposit)
	.bind(new.lease_term_months)
	.bind(new.price_negotiable)
	.bind(new.pets_allowed)
	.bind(new.expires_at)
	.bind(now)
	.execute(&mut *tx)
	.await?;

	replace_listing_units(&mut tx, id, &new.unit_ids).await?;
	replace_children(&mut tx, "listing_tags", "listing_id", "tag", id, &new.tags).await?;

	tx.commit().await?;

	Ok(())
}

/// Returns `false` when the listing does not exist.
pub async fn update_listing(
	pool: &PgPool,
	id: Uuid,
	patch: &ListingPatch,
	now: OffsetDateTime,
) -> Result<bool> {
	let mut tx = pool.begin().await?;
	let property_id: Option<Uuid> = sqlx::query_scalar(
		"\
UPDATE listings
SET
	title = COALESCE($2, title),
	description = COALESCE($3, description),
	price = COALESCE($4, price),
	security_deposit = COALESCE($5, security_deposit),
	lease_term_months = COALESCE($6, lease_term_months),
	price_negotiable = COALESCE($7, price_negotiable),
	pets_allowed = COALESCE($8, pets_allowed),
	active = COALESCE($9, active),
	expires_at = COALESCE($10, expires_at),
	updated_at = $11
WHERE id = $1
RETURNING property_id",
	)
	.bind(id)
	.bind(patch.title.as_deref())
	.bind(patch.description.as_deref())
	.bind(patch.price)
	.bind(patch.security_deposit)
	.bind(patch.lease_term_months)
	.bind(patch.price_negotiable)
	.bind(patch.pets_allowed)
	.bind(patch.active)
	.bind(patch.expires_at)
	.bind(now)
	.fetch_optional(&mut *tx)
	.await?;
	let Some(property_id) = property_id else {
		return Ok(false);
	};

	if let Some(unit_ids) = &patch.unit_ids {
		ensure_units_belong(&mut tx, property_id, unit_ids).await?;
		replace_listing_units(&mut tx, id, unit_ids).await?;
	}
	if let Some(tags) = &patch.tags {
		replace_children(&mut tx, "listing_tags", "listing_id", "tag", id, tags).await?;
	}

	tx.commit().await?;

	Ok(true)
}

pub async fn delete_listing(pool: &PgPool, id: Uuid) -> Result<bool> {
	let result = sqlx::query("DELETE FROM listings WHERE id = $1").bind(id).execute(pool).await?;

	Ok(result.rows_affected() > 0)
}

/// Runs a composed page statement, returning `(id, total_count)` rows in statement order.
pub async fn fetch_page(pool: &PgPool, statement: &Statement) -> Result<Vec<(Uuid, i64)>> {
	let rows = bind_all(sqlx::query(&statement.sql), &statement.args).fetch_all(pool).await?;

	rows.iter()
		.map(|row| Ok((row.try_get::<Uuid, _>("id")?, row.try_get::<i64, _>("total_count")?)))
		.collect()
}

pub async fn fetch_count(pool: &PgPool, statement: &Statement) -> Result<i64> {
	let row = bind_all(sqlx::query(&statement.sql), &statement.args).fetch_one(pool).await?;

	Ok(row.try_get("total_count")?)
}

pub async fn listing_visible(pool: &PgPool, id: Uuid, now: OffsetDateTime) -> Result<bool> {
	let visible: bool = sqlx::query_scalar(
		"\
SELECT EXISTS (
	SELECT 1
	FROM listings
	WHERE id = $1 AND active AND (expires_at IS NULL OR expires_at > $2)
)",
	)
	.bind(id)
	.bind(now)
	.fetch_one(pool)
	.await?;

	Ok(visible)
}

/// Index rows for the given listings, or for every listing when `ids` is `None`.
pub async fn load_listing_documents(
	pool: &PgPool,
	ids: Option<&[Uuid]>,
) -> Result<Vec<ListingDocumentRow>> {
	let rows = sqlx::query_as(
		"\
SELECT
	l.id AS listing_id,
	l.property_id,
	l.price,
	l.active,
	l.expires_at,
	l.created_at,
	p.city,
	p.district,
	p.ward,
	p.building_type,
	p.area AS property_area,
	u.units_area,
	u.units_bedrooms
FROM listings l
JOIN properties p ON p.id = l.property_id
LEFT JOIN LATERAL (
	SELECT SUM(units.area) AS units_area, SUM(units.bedrooms)::bigint AS units_bedrooms
	FROM listing_units lu
	JOIN units ON units.id = lu.unit_id
	WHERE lu.listing_id = l.id
) u ON true
WHERE $1::uuid[] IS NULL OR l.id = ANY($1)
ORDER BY l.created_at, l.id",
	)
	.bind(ids)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

async fn ensure_property_exists(conn: &mut PgConnection, property_id: Uuid) -> Result<()> {
	let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM properties WHERE id = $1)")
		.bind(property_id)
		.fetch_one(&mut *conn)
		.await?;

	if !exists {
		return Err(Error::NotFound(format!("property {property_id}")));
	}

	Ok(())
}

async fn ensure_units_belong(conn: &mut PgConnection, property_id: Uuid, unit_ids: &[Uuid]) -> Result<()> {
	if unit_ids.is_empty() {
		return Ok(());
	}

	let found: i64 = sqlx::query_scalar(
		"SELECT COUNT(DISTINCT id) FROM units WHERE id = ANY($1) AND property_id = $2",
	)
	.bind(unit_ids)
	.bind(property_id)
	.fetch_one(&mut *conn)
	.await?;
	let mut distinct = unit_ids.to_vec();

	distinct.sort_unstable();
	distinct.dedup();

	if found != distinct.len() as i64 {
		return Err(Error::InvalidArgument(format!(
			"unit_ids must reference units of property {property_id}."
		)));
	}

	Ok(())
}

async fn listings_referencing_unit(conn: &mut PgConnection, unit_id: Uuid) -> Result<Vec<Uuid>> {
	let ids = sqlx::query_scalar("SELECT listing_id FROM listing_units WHERE unit_id = $1")
		.bind(unit_id)
		.fetch_all(&mut *conn)
		.await?;

	Ok(ids)
}

async fn replace_listing_units(conn: &mut PgConnection, listing_id: Uuid, unit_ids: &[Uuid]) -> Result<()> {
	sqlx::query("DELETE FROM listing_units WHERE listing_id = $1")
		.bind(listing_id)
		.execute(&mut *conn)
		.await?;
	sqlx::query(
		"\
INSERT INTO listing_units (listing_id, unit_id)
SELECT $1, UNNEST($2::uuid[])
ON CONFLICT DO NOTHING",
	)
	.bind(listing_id)
	.bind(unit_ids)
	.execute(&mut *conn)
	.await?;

	Ok(())
}

/// Replaces a text child collection keyed by its owner. Table and column names are internal
/// constants, never caller input.
async fn replace_children(
	conn: &mut PgConnection,
	table: &'static str,
	owner_column: &'static str,
	value_column: &'static str,
	owner_id: Uuid,
	values: &[String],
) -> Result<()> {
	sqlx::query(&format!("DELETE FROM {table} WHERE {owner_column} = $1"))
		.bind(owner_id)
		.execute(&mut *conn)
		.await?;

	let values: Vec<&str> =
		values.iter().map(|value| value.trim()).filter(|value| !value.is_empty()).collect();

	if values.is_empty() {
		return Ok(());
	}

	sqlx::query(&format!(
		"\
INSERT INTO {table} ({owner_column}, {value_column})
SELECT $1, UNNEST($2::text[])
ON CONFLICT DO NOTHING"
	))
	.bind(owner_id)
	.bind(values)
	.execute(&mut *conn)
	.await?;

	Ok(())
}

fn bind_all<'q>(
	mut query: Query<'q, Postgres, PgArguments>,
	args: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
	for arg in args {
		query = match arg {
			SqlValue::Text(value) => query.bind(value.clone()),
			SqlValue::Int(value) => query.bind(*value),
			SqlValue::Float(value) => query.bind(*value),
			SqlValue::Bool(value) => query.bind(*value),
			SqlValue::Timestamp(value) => query.bind(*value),
			SqlValue::Uuid(value) => query.bind(*value),
		};
	}

	query
}

fn group_by_owner<V>(rows: Vec<(Uuid, V)>) -> HashMap<Uuid, Vec<V>> {
	let mut out: HashMap<Uuid, Vec<V>> = HashMap::new();

	for (owner, value) in rows {
		out.entry(owner).or_default().push(value);
	}

	out
}
