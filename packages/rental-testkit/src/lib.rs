//! Throwaway Postgres databases and Qdrant collections for ignored integration tests.
//!
//! Tests read `RENTAL_PG_DSN` (and optionally `RENTAL_QDRANT_URL`) and skip themselves when the
//! variables are absent.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, sync::Mutex, thread, time::Duration};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

pub const PG_DSN_VAR: &str = "RENTAL_PG_DSN";
pub const QDRANT_URL_VAR: &str = "RENTAL_QDRANT_URL";

const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];
const QDRANT_TIMEOUT: Duration = Duration::from_secs(10);

/// A uniquely named database created from `RENTAL_PG_DSN`, dropped on cleanup or drop.
pub struct TestDatabase {
	name: String,
	dsn: String,
	admin_options: PgConnectOptions,
	collections: Mutex<Vec<String>>,
	cleaned: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse {PG_DSN_VAR}: {err}.")))?;
		let (admin_options, mut admin_conn) = connect_admin(&base_options).await?;
		let name = format!("rental_test_{}", Uuid::new_v4().simple());

		admin_conn
			.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create test database: {err}.")))?;

		let dsn = base_options.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, admin_options, collections: Mutex::new(Vec::new()), cleaned: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// A collection name scoped to this database, deleted again on cleanup.
	pub fn collection_name(&self, prefix: &str) -> String {
		let collection = format!("{prefix}_{}", self.name);
		let mut tracked = self.collections.lock().unwrap_or_else(|err| err.into_inner());

		if !tracked.contains(&collection) {
			tracked.push(collection.clone());
		}

		collection
	}

	pub async fn cleanup(mut self) -> Result<()> {
		let collections = self.tracked_collections();
		let qdrant_result = drop_collections(&collections).await;

		drop_database(&self.name, &self.admin_options).await?;
		qdrant_result?;

		self.cleaned = true;

		Ok(())
	}

	fn tracked_collections(&self) -> Vec<String> {
		self.collections.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let name = self.name.clone();
		let admin_options = self.admin_options.clone();
		let collections = self.tracked_collections();
		// Drop may run inside a runtime; cleanup gets its own thread and runtime.
		let handle = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test database cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(drop_collections(&collections)) {
				eprintln!("Test Qdrant cleanup failed: {err}.");
			}
			if let Err(err) = runtime.block_on(drop_database(&name, &admin_options)) {
				eprintln!("Test database cleanup failed: {err}.");
			}
		});
		let _ = handle.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var(PG_DSN_VAR).ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var(QDRANT_URL_VAR).ok()
}

async fn connect_admin(base: &PgConnectOptions) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in ADMIN_DATABASES {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => last_err = Some(err),
		}
	}

	Err(Error::Message(format!("Failed to connect to an admin database: {last_err:?}.")))
}

async fn drop_database(name: &str, admin_options: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(admin_options).await.map_err(|err| {
		Error::Message(format!("Failed to connect to admin database for cleanup: {err}."))
	})?;
	let _ = sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await;

	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str())
		.await
		.map_err(|err| Error::Message(format!("Failed to drop test database: {err}.")))?;

	Ok(())
}

async fn drop_collections(collections: &[String]) -> Result<()> {
	if collections.is_empty() {
		return Ok(());
	}

	let Some(url) = env_qdrant_url() else {
		eprintln!("Skipping Qdrant cleanup; set {QDRANT_URL_VAR} to delete test collections.");

		return Ok(());
	};
	let client = Qdrant::from_url(&url).build()?;

	for collection in collections {
		match time::timeout(QDRANT_TIMEOUT, client.delete_collection(collection.clone())).await {
			Ok(Ok(_)) => {},
			Ok(Err(err)) =>
				return Err(Error::Message(format!(
					"Failed to delete Qdrant collection {collection:?}: {err}."
				))),
			Err(_) =>
				return Err(Error::Message(format!(
					"Timed out deleting Qdrant collection {collection:?}."
				))),
		}
	}

	Ok(())
}
