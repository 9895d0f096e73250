pub mod admin;
pub mod cache;
pub mod deadline;
pub mod index;
pub mod mutate;
pub mod ranking;
pub mod read;
pub mod search;
pub mod similar;

mod error;

pub use admin::RebuildReport;
pub use cache::{BatchHit, CacheAsideStore, CacheKey, CacheKind, Cacheable, MemoryCache};
pub use deadline::Deadline;
pub use error::{Error, Result};
pub use index::{ListingDocument, QdrantIndex, ScanPage, rank_scan};
pub use ranking::{
	BoostMode, IndexCondition, RankedListing, RelevanceRanker, ScoreMode, ScoringRequest,
	ScoringSpec, WeightedBoost,
};
pub use search::{
	HydratedSearchResponse, ListingFilters, PropertyFilters, SearchRequest, SearchResponse,
};
pub use similar::SimilarRequest;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use rental_config::Config;
use rental_query::{PageBounds, QueryComposer, Statement};
use rental_storage::{
	cache::PgCache,
	db::Db,
	models::{
		Listing, ListingDocumentRow, ListingPatch, NewListing, NewProperty, NewUnit, Property,
		PropertyPatch, PropertyRemoval, Unit, UnitOwners, UnitPatch,
	},
	qdrant::QdrantStore,
	queries,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs composed statements against the relational store.
pub trait RelationalExecutor
where
	Self: Send + Sync,
{
	fn fetch_page<'a>(&'a self, statement: &'a Statement) -> BoxFuture<'a, Result<Vec<(Uuid, i64)>>>;

	fn fetch_count<'a>(&'a self, statement: &'a Statement) -> BoxFuture<'a, Result<i64>>;

	fn listing_visible<'a>(&'a self, id: Uuid, now: OffsetDateTime) -> BoxFuture<'a, Result<bool>>;
}

/// Hydrated entity loads and the mutation primitives behind them.
pub trait EntityStore
where
	Self: Send + Sync,
{
	fn load_properties<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Property>>>;

	fn load_units<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Unit>>>;

	fn load_listings<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Listing>>>;

	fn insert_property<'a>(
		&'a self,
		id: Uuid,
		new: &'a NewProperty,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;

	/// Returns the property's listing ids, or `None` when it does not exist.
	fn update_property<'a>(
		&'a self,
		id: Uuid,
		patch: &'a PropertyPatch,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<Vec<Uuid>>>>;

	fn delete_property<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<PropertyRemoval>>>;

	fn insert_unit<'a>(
		&'a self,
		id: Uuid,
		new: &'a NewUnit,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;

	fn update_unit<'a>(
		&'a self,
		id: Uuid,
		patch: &'a UnitPatch,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<UnitOwners>>>;

	fn delete_unit<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<UnitOwners>>>;

	fn insert_listing<'a>(
		&'a self,
		id: Uuid,
		new: &'a NewListing,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;

	fn update_listing<'a>(
		&'a self,
		id: Uuid,
		patch: &'a ListingPatch,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>>;

	fn delete_listing<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<bool>>;

	/// `None` loads every listing.
	fn load_listing_documents<'a>(
		&'a self,
		ids: Option<&'a [Uuid]>,
	) -> BoxFuture<'a, Result<Vec<ListingDocumentRow>>>;
}

/// Key/value store holding serialized entities until their expiry.
pub trait CacheBackend
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str, now: OffsetDateTime) -> BoxFuture<'a, Result<Option<Value>>>;

	/// One round trip. Absent and expired keys are left out of the result.
	fn batch_get<'a>(
		&'a self,
		keys: &'a [String],
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<(String, Value)>>>;

	fn set<'a>(
		&'a self,
		key: &'a str,
		payload: &'a Value,
		now: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;

	fn expire<'a>(&'a self, key: &'a str, expires_at: OffsetDateTime) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<u64>>;

	fn purge_expired<'a>(&'a self, now: OffsetDateTime) -> BoxFuture<'a, Result<u64>>;
}

/// Listing documents kept beside the relational store for weighted ranking.
pub trait SecondaryIndex
where
	Self: Send + Sync,
{
	fn rank<'a>(&'a self, request: &'a ScoringRequest) -> BoxFuture<'a, Result<Vec<RankedListing>>>;

	fn upsert<'a>(&'a self, documents: &'a [ListingDocument]) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, listing_ids: &'a [Uuid]) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone)]
pub struct Backends {
	pub executor: Arc<dyn RelationalExecutor>,
	pub store: Arc<dyn EntityStore>,
	/// `None` disables caching; every read goes to the store.
	pub cache: Option<Arc<dyn CacheBackend>>,
	pub index: Arc<dyn SecondaryIndex>,
}
impl Backends {
	/// Postgres for rows and cache entries (unless the config picks the memory cache), Qdrant
	/// for ranking.
	pub fn from_config(cfg: &Config, db: Db, qdrant: QdrantStore) -> Self {
		let db = Arc::new(db);
		let cache: Option<Arc<dyn CacheBackend>> = match (cfg.cache.enabled, cfg.cache.backend.as_str()) {
			(false, _) => None,
			(true, "memory") => Some(Arc::new(MemoryCache::default())),
			(true, _) => Some(Arc::new(PgCache::new(db.pool.clone()))),
		};

		Self {
			executor: db.clone(),
			store: db,
			cache,
			index: Arc::new(QdrantIndex::new(qdrant, cfg.ranking.similar.scan_batch_size)),
		}
	}
}

pub struct RentalService {
	pub cfg: Config,
	pub backends: Backends,
	pub(crate) cache: CacheAsideStore,
	pub(crate) composer: QueryComposer,
}
impl RentalService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		let backends = Backends::from_config(&cfg, db, qdrant);

		Self::with_backends(cfg, backends)
	}

	pub fn with_backends(cfg: Config, backends: Backends) -> Self {
		let cache = CacheAsideStore::new(backends.cache.clone(), &cfg.cache);
		let composer = QueryComposer::new(PageBounds {
			max_limit: cfg.search.max_limit,
			max_offset: cfg.search.max_offset,
		});

		Self { cfg, backends, cache, composer }
	}

	/// Replaces the cache-aside store, e.g. to pin its clock.
	pub fn with_cache(mut self, cache: CacheAsideStore) -> Self {
		self.cache = cache;

		self
	}

	pub fn cache(&self) -> &CacheAsideStore {
		&self.cache
	}

	/// The configured per-request deadline, starting now.
	pub fn request_deadline(&self) -> Deadline {
		Deadline::from_timeout_ms(self.cfg.search.request_timeout_ms)
	}
}

impl RelationalExecutor for Db {
	fn fetch_page<'a>(&'a self, statement: &'a Statement) -> BoxFuture<'a, Result<Vec<(Uuid, i64)>>> {
		Box::pin(async move { Ok(queries::fetch_page(&self.pool, statement).await?) })
	}

	fn fetch_count<'a>(&'a self, statement: &'a Statement) -> BoxFuture<'a, Result<i64>> {
		Box::pin(async move { Ok(queries::fetch_count(&self.pool, statement).await?) })
	}

	fn listing_visible<'a>(&'a self, id: Uuid, now: OffsetDateTime) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(queries::listing_visible(&self.pool, id, now).await?) })
	}
}

impl EntityStore for Db {
	fn load_properties<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Property>>> {
		Box::pin(async move { Ok(queries::load_properties(&self.pool, ids).await?) })
	}

	fn load_units<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Unit>>> {
		Box::pin(async move { Ok(queries::load_units(&self.pool, ids).await?) })
	}

	fn load_listings<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Listing>>> {
		Box::pin(async move { Ok(queries::load_listings(&self.pool, ids).await?) })
	}

	fn insert_property<'a>(
		&'a self,
		id: Uuid,
		new: &'a NewProperty,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(queries::insert_property(&self.pool, id, new, now).await?) })
	}

	fn update_property<'a>(
		&'a self,
		id: Uuid,
		patch: &'a PropertyPatch,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<Vec<Uuid>>>> {
		Box::pin(async move { Ok(queries::update_property(&self.pool, id, patch, now).await?) })
	}

	fn delete_property<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<PropertyRemoval>>> {
		Box::pin(async move { Ok(queries::delete_property(&self.pool, id).await?) })
	}

	fn insert_unit<'a>(
		&'a self,
		id: Uuid,
		new: &'a NewUnit,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(queries::insert_unit(&self.pool, id, new, now).await?) })
	}

	fn update_unit<'a>(
		&'a self,
		id: Uuid,
		patch: &'a UnitPatch,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<UnitOwners>>> {
		Box::pin(async move { Ok(queries::update_unit(&self.pool, id, patch, now).await?) })
	}

	fn delete_unit<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<UnitOwners>>> {
		Box::pin(async move { Ok(queries::delete_unit(&self.pool, id).await?) })
	}

	fn insert_listing<'a>(
		&'a self,
		id: Uuid,
		new: &'a NewListing,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(queries::insert_listing(&self.pool, id, new, now).await?) })
	}

	fn update_listing<'a>(
		&'a self,
		id: Uuid,
		patch: &'a ListingPatch,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(queries::update_listing(&self.pool, id, patch, now).await?) })
	}

	fn delete_listing<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(queries::delete_listing(&self.pool, id).await?) })
	}

	fn load_listing_documents<'a>(
		&'a self,
		ids: Option<&'a [Uuid]>,
	) -> BoxFuture<'a, Result<Vec<ListingDocumentRow>>> {
		Box::pin(async move { Ok(queries::load_listing_documents(&self.pool, ids).await?) })
	}
}

impl CacheBackend for PgCache {
	fn get<'a>(&'a self, key: &'a str, now: OffsetDateTime) -> BoxFuture<'a, Result<Option<Value>>> {
		Box::pin(async move { Ok(PgCache::get(self, key, now).await?) })
	}

	fn batch_get<'a>(
		&'a self,
		keys: &'a [String],
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Vec<(String, Value)>>> {
		Box::pin(async move { Ok(PgCache::batch_get(self, keys, now).await?) })
	}

	fn set<'a>(
		&'a self,
		key: &'a str,
		payload: &'a Value,
		now: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(PgCache::set(self, key, payload, now, expires_at).await?) })
	}

	fn expire<'a>(&'a self, key: &'a str, expires_at: OffsetDateTime) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(PgCache::expire(self, key, expires_at).await?) })
	}

	fn delete<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(PgCache::delete(self, keys).await?) })
	}

	fn purge_expired<'a>(&'a self, now: OffsetDateTime) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(PgCache::purge_expired(self, now).await?) })
	}
}
