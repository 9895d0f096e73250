use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, schema};

const SCHEMA_LOCK_ID: i64 = 4_118_207;

#[derive(Clone)]
pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &rental_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	pub fn from_pool(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Applies the bundled schema. Concurrent callers serialize on an advisory lock.
	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema();
		// Advisory locks are held per connection; the transaction pins the lock to one connection.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(SCHEMA_LOCK_ID).execute(&mut *tx).await?;

		for statement in schema::statements(&sql) {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
