use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre;
use serde::{Serialize, de::DeserializeOwned};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use rental_service::{
	Deadline, ListingFilters, PropertyFilters, RentalService, SearchRequest, SimilarRequest,
};
use rental_storage::{db::Db, qdrant::QdrantStore};

#[derive(Debug, Parser)]
#[command(
	version = rental_cli::VERSION,
	rename_all = "kebab",
	styles = rental_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Run a filtered, sorted, paginated search and print the matching ids.
	Search {
		#[arg(long, value_enum, default_value_t = Target::Listings)]
		target: Target,
		/// Search request as JSON: `{"filters": {...}, "sort_fields": [...], "limit": 20}`.
		#[arg(long, short = 'r', value_name = "JSON")]
		request: Option<String>,
		/// Print full listings instead of ids. Listing searches only.
		#[arg(long)]
		hydrate: bool,
	},
	/// Print listings similar to a reference listing, best first.
	Similar {
		listing_id: Uuid,
		#[arg(long)]
		limit: Option<u32>,
	},
	/// Read entities through the cache.
	Get {
		#[arg(value_enum)]
		kind: EntityKind,
		#[arg(required = true)]
		ids: Vec<Uuid>,
	},
	/// Re-derive every listing document in the secondary index.
	RebuildIndex,
	/// Drop expired cache entries.
	PurgeCache,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Target {
	Listings,
	Properties,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EntityKind {
	Property,
	Unit,
	Listing,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = rental_config::load(&args.config)?;

	init_tracing(&config)?;

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let qdrant = QdrantStore::new(&config.storage.qdrant)?;

	if matches!(args.command, Command::RebuildIndex) {
		let created = qdrant.ensure_collection().await?;

		tracing::info!(created, collection = %qdrant.collection, "Listing collection checked.");
	}

	let service = RentalService::new(config, db, qdrant);

	execute(&service, args.command).await
}

async fn execute(service: &RentalService, command: Command) -> color_eyre::Result<()> {
	let deadline = service.request_deadline();

	match command {
		Command::Search { target: Target::Listings, request, hydrate } => {
			let req: SearchRequest<ListingFilters> = parse_request(request.as_deref())?;

			if hydrate {
				print_json(&service.search_listings_hydrated(&req, deadline).await?)
			} else {
				print_json(&service.search_listings(&req, deadline).await?)
			}
		},
		Command::Search { target: Target::Properties, request, hydrate } => {
			if hydrate {
				return Err(eyre::eyre!("--hydrate is only supported for listing searches."));
			}

			let req: SearchRequest<PropertyFilters> = parse_request(request.as_deref())?;

			print_json(&service.search_properties(&req, deadline).await?)
		},
		Command::Similar { listing_id, limit } => {
			let req = SimilarRequest { listing_id, limit };

			print_json(&service.find_similar(&req, deadline).await?)
		},
		Command::Get { kind: EntityKind::Property, ids } =>
			print_json(&service.get_properties(&ids, deadline).await?),
		Command::Get { kind: EntityKind::Unit, ids } =>
			print_json(&service.get_units(&ids, deadline).await?),
		Command::Get { kind: EntityKind::Listing, ids } =>
			print_json(&service.get_listings(&ids, deadline).await?),
		Command::RebuildIndex => print_json(&service.rebuild_index(Deadline::none()).await?),
		Command::PurgeCache => {
			let removed = service.purge_cache(deadline).await?;

			print_json(&serde_json::json!({ "removed": removed }))
		},
	}
}

fn parse_request<F>(raw: Option<&str>) -> color_eyre::Result<SearchRequest<F>>
where
	F: Default + DeserializeOwned,
{
	match raw {
		Some(raw) => Ok(serde_json::from_str(raw)?),
		None => Ok(SearchRequest::new(F::default())),
	}
}

fn print_json<T>(value: &T) -> color_eyre::Result<()>
where
	T: Serialize,
{
	println!("{}", serde_json::to_string_pretty(value)?);

	Ok(())
}

fn init_tracing(config: &rental_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	Ok(())
}
