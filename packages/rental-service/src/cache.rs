//! Cache-aside storage for hydrated entities.
//!
//! Entries are keyed by entity kind and id. Reads never fall through to the relational store
//! here; the read path decides what to load. Read failures, timeouts and undecodable payloads
//! are logged and reported to the caller as misses. Invalidation failures are not: a mutation
//! that cannot clear its entries reports the error.

use std::{
	collections::{HashMap, HashSet},
	fmt,
	io::{self, Write},
	sync::{Arc, Mutex},
};

use futures::future;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{BoxFuture, CacheBackend, Deadline, Error, Result};
use rental_storage::models::{Listing, Property, Unit};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKind {
	Property,
	Unit,
	Listing,
}
impl CacheKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Property => "property",
			Self::Unit => "unit",
			Self::Listing => "listing",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
	pub kind: CacheKind,
	pub id: Uuid,
}
impl CacheKey {
	pub fn new(kind: CacheKind, id: Uuid) -> Self {
		Self { kind, id }
	}

	pub fn property(id: Uuid) -> Self {
		Self::new(CacheKind::Property, id)
	}

	pub fn unit(id: Uuid) -> Self {
		Self::new(CacheKind::Unit, id)
	}

	pub fn listing(id: Uuid) -> Self {
		Self::new(CacheKind::Listing, id)
	}
}
impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.kind.as_str(), self.id)
	}
}

/// An entity that may be written to the cache.
///
/// `None` child collections mean "not loaded". Such values are never written.
pub trait Cacheable
where
	Self: Serialize + DeserializeOwned + Send + Sync,
{
	const KIND: CacheKind;

	fn id(&self) -> Uuid;

	fn is_complete(&self) -> bool;

	fn cache_key(&self) -> CacheKey {
		CacheKey::new(Self::KIND, self.id())
	}
}

impl Cacheable for Property {
	const KIND: CacheKind = CacheKind::Property;

	fn id(&self) -> Uuid {
		self.id
	}

	fn is_complete(&self) -> bool {
		self.amenities.is_some()
			&& self.units.as_ref().is_some_and(|units| units.iter().all(Cacheable::is_complete))
	}
}

impl Cacheable for Unit {
	const KIND: CacheKind = CacheKind::Unit;

	fn id(&self) -> Uuid {
		self.id
	}

	fn is_complete(&self) -> bool {
		self.amenities.is_some()
	}
}

impl Cacheable for Listing {
	const KIND: CacheKind = CacheKind::Listing;

	fn id(&self) -> Uuid {
		self.id
	}

	fn is_complete(&self) -> bool {
		self.unit_ids.is_some() && self.tags.is_some()
	}
}

/// Result of a batch lookup. `missing` keeps the order of the requested ids.
#[derive(Debug)]
pub struct BatchHit<T> {
	pub hits: HashMap<Uuid, T>,
	pub missing: Vec<Uuid>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityTtl {
	pub property: Duration,
	pub unit: Duration,
	pub listing: Duration,
}
impl EntityTtl {
	pub fn for_kind(&self, kind: CacheKind) -> Duration {
		match kind {
			CacheKind::Property => self.property,
			CacheKind::Unit => self.unit,
			CacheKind::Listing => self.listing,
		}
	}
}
impl From<&rental_config::CacheTtl> for EntityTtl {
	fn from(cfg: &rental_config::CacheTtl) -> Self {
		Self {
			property: Duration::seconds(cfg.property),
			unit: Duration::seconds(cfg.unit),
			listing: Duration::seconds(cfg.listing),
		}
	}
}

#[derive(Clone)]
pub struct CacheAsideStore {
	backend: Option<Arc<dyn CacheBackend>>,
	ttl: EntityTtl,
	max_payload_bytes: Option<u64>,
	invalidate_timeout_ms: u64,
	clock: fn() -> OffsetDateTime,
}
impl CacheAsideStore {
	pub fn new(backend: Option<Arc<dyn CacheBackend>>, cfg: &rental_config::Cache) -> Self {
		Self {
			backend,
			ttl: EntityTtl::from(&cfg.ttl_seconds),
			max_payload_bytes: cfg.max_payload_bytes,
			invalidate_timeout_ms: cfg.invalidate_timeout_ms,
			clock: OffsetDateTime::now_utc,
		}
	}

	pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
		self.clock = clock;

		self
	}

	pub fn is_enabled(&self) -> bool {
		self.backend.is_some()
	}

	pub fn ttl(&self) -> EntityTtl {
		self.ttl
	}

	pub async fn get<T>(&self, id: Uuid, deadline: Deadline) -> Option<T>
	where
		T: Cacheable,
	{
		let backend = self.backend.as_ref()?;
		let key = CacheKey::new(T::KIND, id);
		let key_text = key.to_string();
		let now = (self.clock)();

		match deadline.run("cache get", backend.get(&key_text, now)).await {
			Ok(Some(payload)) => {
				let value = decode::<T>(key, payload)?;

				tracing::info!(cache_kind = T::KIND.as_str(), cache_key = %key, hit = true, "Cache hit.");

				Some(value)
			},
			Ok(None) => {
				tracing::info!(cache_kind = T::KIND.as_str(), cache_key = %key, hit = false, "Cache miss.");

				None
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind = T::KIND.as_str(),
					cache_key = %key,
					"Cache read failed."
				);

				None
			},
		}
	}

	/// Looks up every id with one backend round trip. Duplicate ids are looked up once.
	pub async fn batch_get<T>(&self, ids: &[Uuid], deadline: Deadline) -> BatchHit<T>
	where
		T: Cacheable,
	{
		let ids = dedup(ids);
		let Some(backend) = self.backend.as_ref() else {
			return BatchHit { hits: HashMap::new(), missing: ids };
		};

		if ids.is_empty() {
			return BatchHit { hits: HashMap::new(), missing: ids };
		}

		let keys: Vec<String> = ids.iter().map(|id| CacheKey::new(T::KIND, *id).to_string()).collect();
		let now = (self.clock)();
		let rows = match deadline.run("cache batch get", backend.batch_get(&keys, now)).await {
			Ok(rows) => rows,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind = T::KIND.as_str(),
					requested = ids.len(),
					"Cache read failed."
				);

				return BatchHit { hits: HashMap::new(), missing: ids };
			},
		};
		let payloads: HashMap<String, Value> = rows.into_iter().collect();
		let mut hits = HashMap::with_capacity(payloads.len());
		let mut missing = Vec::new();

		for (id, key_text) in ids.iter().zip(&keys) {
			let key = CacheKey::new(T::KIND, *id);

			match payloads.get(key_text).cloned().and_then(|payload| decode::<T>(key, payload)) {
				Some(value) => {
					hits.insert(*id, value);
				},
				None => missing.push(*id),
			}
		}

		tracing::info!(
			cache_kind = T::KIND.as_str(),
			requested = ids.len(),
			hit_count = hits.len(),
			missing = missing.len(),
			"Cache batch lookup."
		);

		BatchHit { hits, missing }
	}

	/// Writes a hydrated entity with its kind's TTL.
	pub async fn set<T>(&self, value: &T, deadline: Deadline)
	where
		T: Cacheable,
	{
		self.set_with_ttl(value, self.ttl.for_kind(T::KIND), deadline).await;
	}

	pub async fn set_with_ttl<T>(&self, value: &T, ttl: Duration, deadline: Deadline)
	where
		T: Cacheable,
	{
		let Some(backend) = self.backend.as_ref() else {
			return;
		};
		let key = value.cache_key();

		if !value.is_complete() {
			tracing::warn!(
				cache_kind = T::KIND.as_str(),
				cache_key = %key,
				"Cache write skipped for partially hydrated entity."
			);

			return;
		}

		let payload = match serde_json::to_value(value) {
			Ok(payload) => payload,
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_kind = T::KIND.as_str(),
					cache_key = %key,
					"Cache payload encode failed."
				);

				return;
			},
		};

		if let Some(max) = self.max_payload_bytes {
			let payload_size = encoded_len(&payload);

			if payload_size > max {
				tracing::warn!(
					cache_kind = T::KIND.as_str(),
					cache_key = %key,
					payload_size,
					"Cache payload skipped due to size."
				);

				return;
			}
		}

		let now = (self.clock)();
		let key_text = key.to_string();

		match deadline.run("cache set", backend.set(&key_text, &payload, now, now + ttl)).await {
			Ok(()) => tracing::info!(
				cache_kind = T::KIND.as_str(),
				cache_key = %key,
				ttl_seconds = ttl.whole_seconds(),
				"Cache stored."
			),
			Err(err) => tracing::warn!(
				error = %err,
				cache_kind = T::KIND.as_str(),
				cache_key = %key,
				"Cache write failed."
			),
		}
	}

	/// Removes the entries, bounded by the invalidation timeout rather than any request deadline.
	///
	/// A failed delete falls back to expiring every key at the current time. When that fails
	/// as well the entries may still be served, so the error is returned.
	pub async fn invalidate(&self, keys: &[CacheKey]) -> Result<()> {
		let Some(backend) = self.backend.as_ref() else {
			return Ok(());
		};

		if keys.is_empty() {
			return Ok(());
		}

		let key_texts: Vec<String> = dedup(keys).iter().map(ToString::to_string).collect();
		let delete_err =
			match self.invalidate_deadline().run("cache invalidate", backend.delete(&key_texts)).await {
				Ok(removed) => {
					tracing::info!(keys = key_texts.len(), removed, "Cache entries invalidated.");

					return Ok(());
				},
				Err(err) => err,
			};

		tracing::warn!(
			error = %delete_err,
			keys = ?key_texts,
			"Cache delete failed. Expiring entries instead."
		);

		let now = (self.clock)();
		let expiries = key_texts.iter().map(|key| backend.expire(key, now));
		let expired = self
			.invalidate_deadline()
			.run("cache expire", async move {
				future::join_all(expiries).await.into_iter().collect::<Result<Vec<()>>>()
			})
			.await;

		match expired {
			Ok(_) => {
				tracing::info!(keys = key_texts.len(), "Cache entries expired.");

				Ok(())
			},
			Err(err) => {
				tracing::error!(error = %err, keys = ?key_texts, "Cache invalidation failed.");

				Err(Error::Cache {
					message: format!(
						"Failed to invalidate {} cache entries after delete error ({delete_err}): {err}",
						key_texts.len()
					),
				})
			},
		}
	}

	/// Drops entries already past their expiry. Returns the number removed.
	pub async fn purge_expired(&self, deadline: Deadline) -> Result<u64> {
		let Some(backend) = self.backend.as_ref() else {
			return Ok(0);
		};
		let now = (self.clock)();

		deadline.run("cache purge", backend.purge_expired(now)).await
	}

	fn invalidate_deadline(&self) -> Deadline {
		Deadline::from_timeout_ms(self.invalidate_timeout_ms)
	}
}

/// In-process backend for single-node deployments and tests.
#[derive(Default)]
pub struct MemoryCache {
	entries: Mutex<HashMap<String, (Value, OffsetDateTime)>>,
}
impl MemoryCache {
	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	pub fn contains(&self, key: &str) -> bool {
		self.lock().contains_key(key)
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Value, OffsetDateTime)>> {
		self.entries.lock().unwrap_or_else(|err| err.into_inner())
	}
}
impl CacheBackend for MemoryCache {
	fn get<'a>(&'a self, key: &'a str, now: OffsetDateTime) -> BoxFuture<'a, Result<Option<Value>>> {
		let value = self
			.lock()
			.get(key)
			.filter(|(_, expires_at)| *expires_at > now)
			.map(|(payload, _)| payload.clone());

		Box::pin(async move { Ok(value) })
	}

	fn batch_get<'a>(
		&'a self,
		keys: &'a [String],
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<(String, Value)>>> {
		let entries = self.lock();
		let rows = keys
			.iter()
			.filter_map(|key| {
				entries
					.get(key)
					.filter(|(_, expires_at)| *expires_at > now)
					.map(|(payload, _)| (key.clone(), payload.clone()))
			})
			.collect();

		Box::pin(async move { Ok(rows) })
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		payload: &'a Value,
		_now: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		self.lock().insert(key.to_string(), (payload.clone(), expires_at));

		Box::pin(async move { Ok(()) })
	}

	fn expire<'a>(&'a self, key: &'a str, expires_at: OffsetDateTime) -> BoxFuture<'a, Result<()>> {
		if let Some(entry) = self.lock().get_mut(key) {
			entry.1 = expires_at;
		}

		Box::pin(async move { Ok(()) })
	}

	fn delete<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<u64>> {
		let mut entries = self.lock();
		let removed = keys.iter().filter(|key| entries.remove(key.as_str()).is_some()).count();

		Box::pin(async move { Ok(removed as u64) })
	}

	fn purge_expired<'a>(&'a self, now: OffsetDateTime) -> BoxFuture<'a, Result<u64>> {
		let mut entries = self.lock();
		let before = entries.len();

		entries.retain(|_, (_, expires_at)| *expires_at > now);

		let removed = (before - entries.len()) as u64;

		Box::pin(async move { Ok(removed) })
	}
}

fn decode<T>(key: CacheKey, payload: Value) -> Option<T>
where
	T: Cacheable,
{
	match serde_json::from_value::<T>(payload) {
		Ok(value) if value.id() == key.id && value.is_complete() => Some(value),
		Ok(_) => {
			tracing::warn!(
				cache_kind = T::KIND.as_str(),
				cache_key = %key,
				"Cache payload does not match its key."
			);

			None
		},
		Err(err) => {
			tracing::warn!(
				error = %err,
				cache_kind = T::KIND.as_str(),
				cache_key = %key,
				"Cache payload decode failed."
			);

			None
		},
	}
}

/// Serialized size of `payload` without buffering it.
fn encoded_len(payload: &Value) -> u64 {
	let mut counter = ByteCounter::default();

	match serde_json::to_writer(&mut counter, payload) {
		Ok(()) => counter.0,
		Err(_) => u64::MAX,
	}
}

#[derive(Default)]
struct ByteCounter(u64);
impl Write for ByteCounter {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0 += buf.len() as u64;

		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

fn dedup<T>(items: &[T]) -> Vec<T>
where
	T: Copy + Eq + std::hash::Hash,
{
	let mut seen = HashSet::with_capacity(items.len());

	items.iter().copied().filter(|item| seen.insert(*item)).collect()
}
