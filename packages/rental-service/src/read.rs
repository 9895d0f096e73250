//! Cache-aside reads: batch cache lookup, store load for the misses, write-back, union.

use futures::future;
use uuid::Uuid;

use crate::{BoxFuture, Cacheable, Deadline, EntityStore, Error, RentalService, Result};
use rental_storage::models::{Listing, Property, Unit};

/// An entity the store can load fully hydrated.
pub trait Loadable
where
	Self: Cacheable + Sized,
{
	fn load<'a>(store: &'a dyn EntityStore, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Self>>>;
}

impl Loadable for Property {
	fn load<'a>(store: &'a dyn EntityStore, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Self>>> {
		store.load_properties(ids)
	}
}

impl Loadable for Unit {
	fn load<'a>(store: &'a dyn EntityStore, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Self>>> {
		store.load_units(ids)
	}
}

impl Loadable for Listing {
	fn load<'a>(store: &'a dyn EntityStore, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Self>>> {
		store.load_listings(ids)
	}
}

impl RentalService {
	pub async fn get_property(&self, id: Uuid, deadline: Deadline) -> Result<Property> {
		self.get_one(id, "property", deadline).await
	}

	pub async fn get_properties(&self, ids: &[Uuid], deadline: Deadline) -> Result<Vec<Property>> {
		self.read_through(ids, deadline).await
	}

	pub async fn get_unit(&self, id: Uuid, deadline: Deadline) -> Result<Unit> {
		self.get_one(id, "unit", deadline).await
	}

	pub async fn get_units(&self, ids: &[Uuid], deadline: Deadline) -> Result<Vec<Unit>> {
		self.read_through(ids, deadline).await
	}

	pub async fn get_listing(&self, id: Uuid, deadline: Deadline) -> Result<Listing> {
		self.get_one(id, "listing", deadline).await
	}

	/// Unknown ids are left out. The result is not in input order.
	pub async fn get_listings(&self, ids: &[Uuid], deadline: Deadline) -> Result<Vec<Listing>> {
		self.read_through(ids, deadline).await
	}

	async fn get_one<T>(&self, id: Uuid, kind: &str, deadline: Deadline) -> Result<T>
	where
		T: Loadable,
	{
		self.read_through::<T>(&[id], deadline)
			.await?
			.into_iter()
			.next()
			.ok_or_else(|| Error::not_found(kind, id))
	}

	pub(crate) async fn read_through<T>(&self, ids: &[Uuid], deadline: Deadline) -> Result<Vec<T>>
	where
		T: Loadable,
	{
		if ids.is_empty() {
			return Ok(Vec::new());
		}

		let batch = self.cache.batch_get::<T>(ids, deadline).await;
		let mut out: Vec<T> = batch.hits.into_values().collect();

		if batch.missing.is_empty() {
			return Ok(out);
		}

		let loaded = deadline
			.run("entity load", T::load(self.backends.store.as_ref(), &batch.missing))
			.await?;

		future::join_all(loaded.iter().map(|entity| self.cache.set(entity, deadline))).await;

		out.extend(loaded);

		Ok(out)
	}
}
