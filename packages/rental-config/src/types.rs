use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub cache: Cache,
	pub search: Search,
	pub ranking: Ranking,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
	pub enabled: bool,
	/// One of "postgres" or "memory".
	#[serde(default = "default_cache_backend")]
	pub backend: String,
	/// Entries whose serialized payload exceeds this size are not written.
	pub max_payload_bytes: Option<u64>,
	/// Bound on each invalidation attempt a mutation makes before it returns.
	#[serde(default = "default_invalidate_timeout_ms")]
	pub invalidate_timeout_ms: u64,
	#[serde(default)]
	pub ttl_seconds: CacheTtl,
}
impl Default for Cache {
	fn default() -> Self {
		Self {
			enabled: true,
			backend: default_cache_backend(),
			max_payload_bytes: None,
			invalidate_timeout_ms: default_invalidate_timeout_ms(),
			ttl_seconds: CacheTtl::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct CacheTtl {
	#[serde(default = "default_ttl_seconds")]
	pub property: i64,
	#[serde(default = "default_ttl_seconds")]
	pub unit: i64,
	#[serde(default = "default_ttl_seconds")]
	pub listing: i64,
}
impl Default for CacheTtl {
	fn default() -> Self {
		Self {
			property: default_ttl_seconds(),
			unit: default_ttl_seconds(),
			listing: default_ttl_seconds(),
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub default_limit: u32,
	pub max_limit: u32,
	pub max_offset: u32,
	#[serde(default = "default_sort_field")]
	pub default_sort_field: String,
	#[serde(default = "default_sort_order")]
	pub default_sort_order: String,
	/// Per-request deadline. Zero disables it.
	#[serde(default)]
	pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Ranking {
	pub similar: SimilarRanking,
}

#[derive(Debug, Deserialize)]
pub struct SimilarRanking {
	pub default_limit: u32,
	pub max_limit: u32,
	/// Points read per page while the index scans eligible listings.
	pub scan_batch_size: u32,
	/// Half-width of the price band, relative to the reference price.
	pub price_band_ratio: f64,
	/// Half-width of the area band, relative to the reference area.
	pub area_band_ratio: f64,
	pub weights: SimilarWeights,
}

#[derive(Debug, Deserialize)]
pub struct SimilarWeights {
	pub price: f32,
	pub city: f32,
	pub district: f32,
	pub ward: f32,
	pub property_type: f32,
	pub area: f32,
	pub bedrooms: f32,
}
impl SimilarWeights {
	pub fn iter(&self) -> impl Iterator<Item = (&'static str, f32)> {
		[
			("price", self.price),
			("city", self.city),
			("district", self.district),
			("ward", self.ward),
			("property_type", self.property_type),
			("area", self.area),
			("bedrooms", self.bedrooms),
		]
		.into_iter()
	}
}

fn default_cache_backend() -> String {
	"postgres".to_string()
}

fn default_invalidate_timeout_ms() -> u64 {
	1_000
}

fn default_ttl_seconds() -> i64 {
	86_400
}

fn default_sort_field() -> String {
	"created_at".to_string()
}

fn default_sort_order() -> String {
	"desc".to_string()
}
