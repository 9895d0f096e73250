mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, CacheTtl, Config, Postgres, Qdrant, Ranking, Search, Service, SimilarRanking,
	SimilarWeights, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(invalid("service.log_level must be non-empty."));
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(invalid("storage.postgres.dsn must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(invalid("storage.postgres.pool_max_conns must be greater than zero."));
	}
	if cfg.storage.qdrant.url.trim().is_empty() {
		return Err(invalid("storage.qdrant.url must be non-empty."));
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(invalid("storage.qdrant.collection must be non-empty."));
	}

	validate_cache(cfg)?;
	validate_search(cfg)?;
	validate_ranking(cfg)?;

	Ok(())
}

fn validate_cache(cfg: &Config) -> Result<()> {
	let cache = &cfg.cache;

	if !matches!(cache.backend.as_str(), "postgres" | "memory") {
		return Err(invalid("cache.backend must be one of postgres or memory."));
	}

	if let Some(max) = cache.max_payload_bytes
		&& max == 0
	{
		return Err(invalid("cache.max_payload_bytes must be greater than zero."));
	}
	if cache.invalidate_timeout_ms == 0 {
		return Err(invalid("cache.invalidate_timeout_ms must be greater than zero."));
	}

	for (name, ttl) in [
		("property", cache.ttl_seconds.property),
		("unit", cache.ttl_seconds.unit),
		("listing", cache.ttl_seconds.listing),
	] {
		if ttl <= 0 {
			return Err(Error::Validation {
				message: format!("cache.ttl_seconds.{name} must be greater than zero."),
			});
		}
	}

	Ok(())
}

fn validate_search(cfg: &Config) -> Result<()> {
	let search = &cfg.search;

	if search.default_limit == 0 {
		return Err(invalid("search.default_limit must be greater than zero."));
	}
	if search.default_limit > search.max_limit {
		return Err(invalid("search.default_limit must not exceed search.max_limit."));
	}
	if search.default_sort_field.trim().is_empty() {
		return Err(invalid("search.default_sort_field must be non-empty."));
	}
	if !matches!(search.default_sort_order.as_str(), "asc" | "desc") {
		return Err(invalid("search.default_sort_order must be one of asc or desc."));
	}

	Ok(())
}

fn validate_ranking(cfg: &Config) -> Result<()> {
	let similar = &cfg.ranking.similar;

	if similar.default_limit == 0 {
		return Err(invalid("ranking.similar.default_limit must be greater than zero."));
	}
	if similar.default_limit > similar.max_limit {
		return Err(invalid("ranking.similar.default_limit must not exceed ranking.similar.max_limit."));
	}
	if similar.scan_batch_size == 0 {
		return Err(invalid("ranking.similar.scan_batch_size must be greater than zero."));
	}

	for (name, ratio) in
		[("price_band_ratio", similar.price_band_ratio), ("area_band_ratio", similar.area_band_ratio)]
	{
		if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
			return Err(Error::Validation {
				message: format!("ranking.similar.{name} must be in the range (0.0, 1.0]."),
			});
		}
	}
	for (name, weight) in similar.weights.iter() {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("ranking.similar.weights.{name} must be a finite number."),
			});
		}
		if weight < 0.0 {
			return Err(Error::Validation {
				message: format!("ranking.similar.weights.{name} must be zero or greater."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.cache.backend = cfg.cache.backend.trim().to_ascii_lowercase();
	cfg.search.default_sort_field = cfg.search.default_sort_field.trim().to_string();
	cfg.search.default_sort_order = cfg.search.default_sort_order.trim().to_ascii_lowercase();
}

fn invalid(message: &str) -> Error {
	Error::Validation { message: message.to_string() }
}
