use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::Result;

/// Postgres-backed key/value cache over the `entity_cache` table.
#[derive(Clone)]
pub struct PgCache {
	pool: PgPool,
}
impl PgCache {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn get(&self, key: &str, now: OffsetDateTime) -> Result<Option<Value>> {
		let payload = sqlx::query_scalar(
			"SELECT payload FROM entity_cache WHERE cache_key = $1 AND expires_at > $2",
		)
		.bind(key)
		.bind(now)
		.fetch_optional(&self.pool)
		.await?;

		Ok(payload)
	}

	/// One round trip for every key. Expired rows are left out.
	pub async fn batch_get(&self, keys: &[String], now: OffsetDateTime) -> Result<Vec<(String, Value)>> {
		if keys.is_empty() {
			return Ok(Vec::new());
		}

		let rows = sqlx::query_as(
			"\
SELECT cache_key, payload
FROM entity_cache
WHERE cache_key = ANY($1) AND expires_at > $2",
		)
		.bind(keys)
		.bind(now)
		.fetch_all(&self.pool)
		.await?;

		Ok(rows)
	}

	pub async fn set(
		&self,
		key: &str,
		payload: &Value,
		now: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Result<()> {
		sqlx::query(
			"\
INSERT INTO entity_cache (cache_key, payload, created_at, expires_at)
VALUES ($1, $2, $3, $4)
ON CONFLICT (cache_key) DO UPDATE
SET
	payload = EXCLUDED.payload,
	created_at = EXCLUDED.created_at,
	expires_at = EXCLUDED.expires_at",
		)
		.bind(key)
		.bind(payload)
		.bind(now)
		.bind(expires_at)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	/// Moves the expiry of an existing entry. Absent keys are a no-op.
	pub async fn expire(&self, key: &str, expires_at: OffsetDateTime) -> Result<()> {
		sqlx::query("UPDATE entity_cache SET expires_at = $2 WHERE cache_key = $1")
			.bind(key)
			.bind(expires_at)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	pub async fn delete(&self, keys: &[String]) -> Result<u64> {
		if keys.is_empty() {
			return Ok(0);
		}

		let result = sqlx::query("DELETE FROM entity_cache WHERE cache_key = ANY($1)")
			.bind(keys)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}

	pub async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64> {
		let result = sqlx::query("DELETE FROM entity_cache WHERE expires_at <= $1")
			.bind(now)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected())
	}
}
