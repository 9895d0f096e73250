//! Create, update and delete for the three aggregates.
//!
//! Every path clears the affected cache entries before it returns and reports an
//! invalidation failure as an error, even though the store write has already landed. Index
//! documents are re-derived from the store afterwards; index failures are logged and left for
//! `rebuild_index`.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{CacheKey, Deadline, Error, ListingDocument, RentalService, Result};
use rental_storage::models::{
	ListingPatch, NewListing, NewProperty, NewUnit, PropertyPatch, UnitPatch,
};

impl RentalService {
	pub async fn create_property(&self, new: NewProperty, deadline: Deadline) -> Result<Uuid> {
		require_text("name", &new.name)?;
		require_text("building_type", &new.building_type)?;
		require_text("full_address", &new.full_address)?;
		require_text("city", &new.city)?;
		require_area(new.area)?;

		let id = Uuid::new_v4();
		let now = OffsetDateTime::now_utc();

		deadline
			.run("property insert", self.backends.store.insert_property(id, &new, now))
			.await?;

		Ok(id)
	}

	pub async fn update_property(
		&self,
		id: Uuid,
		patch: PropertyPatch,
		deadline: Deadline,
	) -> Result<()> {
		for (field, value) in [
			("name", &patch.name),
			("building_type", &patch.building_type),
			("full_address", &patch.full_address),
			("city", &patch.city),
		] {
			if let Some(value) = value {
				require_text(field, value)?;
			}
		}
		if let Some(area) = patch.area {
			require_area(area)?;
		}

		let now = OffsetDateTime::now_utc();
		let listing_ids = deadline
			.run("property update", self.backends.store.update_property(id, &patch, now))
			.await?
			.ok_or_else(|| Error::not_found("property", id))?;

		let invalidated = self.cache.invalidate(&[CacheKey::property(id)]).await;

		self.sync_listing_documents(&listing_ids, deadline).await;

		invalidated
	}

	/// Removes the property with its units and listings.
	pub async fn delete_property(&self, id: Uuid, deadline: Deadline) -> Result<()> {
		let removal = deadline
			.run("property delete", self.backends.store.delete_property(id))
			.await?
			.ok_or_else(|| Error::not_found("property", id))?;
		let mut keys = vec![CacheKey::property(id)];

		keys.extend(removal.unit_ids.iter().copied().map(CacheKey::unit));
		keys.extend(removal.listing_ids.iter().copied().map(CacheKey::listing));

		let invalidated = self.cache.invalidate(&keys).await;

		self.remove_listing_documents(&removal.listing_ids, deadline).await;

		invalidated
	}

	pub async fn create_unit(&self, new: NewUnit, deadline: Deadline) -> Result<Uuid> {
		require_text("name", &new.name)?;
		require_area(new.area)?;
		require_non_negative("bedrooms", new.bedrooms.into())?;
		require_non_negative("bathrooms", new.bathrooms.into())?;

		let id = Uuid::new_v4();
		let now = OffsetDateTime::now_utc();

		deadline.run("unit insert", self.backends.store.insert_unit(id, &new, now)).await?;

		self.cache.invalidate(&[CacheKey::property(new.property_id)]).await?;

		Ok(id)
	}

	pub async fn update_unit(&self, id: Uuid, patch: UnitPatch, deadline: Deadline) -> Result<()> {
		if let Some(name) = &patch.name {
			require_text("name", name)?;
		}
		if let Some(area) = patch.area {
			require_area(area)?;
		}
		if let Some(bedrooms) = patch.bedrooms {
			require_non_negative("bedrooms", bedrooms.into())?;
		}
		if let Some(bathrooms) = patch.bathrooms {
			require_non_negative("bathrooms", bathrooms.into())?;
		}

		let now = OffsetDateTime::now_utc();
		let owners = deadline
			.run("unit update", self.backends.store.update_unit(id, &patch, now))
			.await?
			.ok_or_else(|| Error::not_found("unit", id))?;

		let invalidated =
			self.cache.invalidate(&[CacheKey::unit(id), CacheKey::property(owners.property_id)]).await;

		self.sync_listing_documents(&owners.listing_ids, deadline).await;

		invalidated
	}

	/// Also invalidates every listing that referenced the unit.
	pub async fn delete_unit(&self, id: Uuid, deadline: Deadline) -> Result<()> {
		let owners = deadline
			.run("unit delete", self.backends.store.delete_unit(id))
			.await?
			.ok_or_else(|| Error::not_found("unit", id))?;
		let mut keys = vec![CacheKey::unit(id), CacheKey::property(owners.property_id)];

		keys.extend(owners.listing_ids.iter().copied().map(CacheKey::listing));

		let invalidated = self.cache.invalidate(&keys).await;

		self.sync_listing_documents(&owners.listing_ids, deadline).await;

		invalidated
	}

	pub async fn create_listing(&self, new: NewListing, deadline: Deadline) -> Result<Uuid> {
		require_text("title", &new.title)?;
		require_non_negative("price", new.price)?;
		require_non_negative("security_deposit", new.security_deposit)?;
		require_lease_term(new.lease_term_months)?;

		let id = Uuid::new_v4();
		let now = OffsetDateTime::now_utc();

		deadline.run("listing insert", self.backends.store.insert_listing(id, &new, now)).await?;

		self.sync_listing_documents(&[id], deadline).await;

		Ok(id)
	}

	pub async fn update_listing(
		&self,
		id: Uuid,
		patch: ListingPatch,
		deadline: Deadline,
	) -> Result<()> {
		if let Some(title) = &patch.title {
			require_text("title", title)?;
		}
		if let Some(price) = patch.price {
			require_non_negative("price", price)?;
		}
		if let Some(deposit) = patch.security_deposit {
			require_non_negative("security_deposit", deposit)?;
		}
		if let Some(months) = patch.lease_term_months {
			require_lease_term(months)?;
		}

		let now = OffsetDateTime::now_utc();
		let updated = deadline
			.run("listing update", self.backends.store.update_listing(id, &patch, now))
			.await?;

		if !updated {
			return Err(Error::not_found("listing", id));
		}

		let invalidated = self.cache.invalidate(&[CacheKey::listing(id)]).await;

		self.sync_listing_documents(&[id], deadline).await;

		invalidated
	}

	pub async fn delete_listing(&self, id: Uuid, deadline: Deadline) -> Result<()> {
		let deleted = deadline.run("listing delete", self.backends.store.delete_listing(id)).await?;

		if !deleted {
			return Err(Error::not_found("listing", id));
		}

		let invalidated = self.cache.invalidate(&[CacheKey::listing(id)]).await;

		self.remove_listing_documents(&[id], deadline).await;

		invalidated
	}

	async fn sync_listing_documents(&self, listing_ids: &[Uuid], deadline: Deadline) {
		if listing_ids.is_empty() {
			return;
		}

		let rows = match deadline
			.run("listing documents", self.backends.store.load_listing_documents(Some(listing_ids)))
			.await
		{
			Ok(rows) => rows,
			Err(err) => {
				tracing::warn!(error = %err, listings = listing_ids.len(), "Index document load failed.");

				return;
			},
		};
		let documents: Vec<ListingDocument> = rows.iter().map(ListingDocument::from_row).collect();

		if let Err(err) = deadline.run("index upsert", self.backends.index.upsert(&documents)).await {
			tracing::warn!(error = %err, listings = documents.len(), "Index upsert failed.");
		}
	}

	async fn remove_listing_documents(&self, listing_ids: &[Uuid], deadline: Deadline) {
		if listing_ids.is_empty() {
			return;
		}
		if let Err(err) = deadline.run("index delete", self.backends.index.delete(listing_ids)).await {
			tracing::warn!(error = %err, listings = listing_ids.len(), "Index delete failed.");
		}
	}
}

fn require_text(field: &str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(Error::invalid(format!("{field} must be non-empty.")));
	}

	Ok(())
}

fn require_area(area: f64) -> Result<()> {
	if !area.is_finite() || area <= 0.0 {
		return Err(Error::invalid("area must be a positive number."));
	}

	Ok(())
}

fn require_non_negative(field: &str, value: i64) -> Result<()> {
	if value < 0 {
		return Err(Error::invalid(format!("{field} must be zero or greater.")));
	}

	Ok(())
}

fn require_lease_term(months: i32) -> Result<()> {
	if months <= 0 {
		return Err(Error::invalid("lease_term_months must be greater than zero."));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blank_text_is_rejected() {
		assert!(require_text("name", "   ").is_err());
		assert!(require_text("name", "Tower A").is_ok());
	}

	#[test]
	fn numeric_guards() {
		assert!(require_area(f64::NAN).is_err());
		assert!(require_area(0.0).is_err());
		assert!(require_area(12.5).is_ok());
		assert!(require_non_negative("price", -1).is_err());
		assert!(require_non_negative("price", 0).is_ok());
		assert!(require_lease_term(0).is_err());
	}
}
