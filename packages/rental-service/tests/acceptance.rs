mod support;

use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use rental_config::{Postgres, Qdrant};
use rental_service::{
	Backends, Deadline, ListingFilters, QdrantIndex, RentalService, SearchRequest, SecondaryIndex,
	SimilarRequest,
};
use rental_storage::{cache::PgCache, db::Db, qdrant::QdrantStore};
use rental_testkit::TestDatabase;
use support::{MemoryIndex, new_listing, new_property, new_unit, test_config};

async fn build_service(test_db: &TestDatabase) -> RentalService {
	build_service_with_index(test_db, Arc::new(MemoryIndex::default())).await
}

async fn build_service_with_index(
	test_db: &TestDatabase,
	index: Arc<dyn SecondaryIndex>,
) -> RentalService {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let db = Arc::new(db);
	let backends = Backends {
		executor: db.clone(),
		store: db.clone(),
		cache: Some(Arc::new(PgCache::new(db.pool.clone()))),
		index,
	};

	RentalService::with_backends(test_config(), backends)
}

/// Five listings, oldest first: HCM at 3M, HCM at 9M, then Hanoi at 4M, 6M and 2M.
async fn seed(service: &RentalService) -> Vec<Uuid> {
	let hcm = service
		.create_property(new_property("HCM", "District 1"), Deadline::none())
		.await
		.expect("Failed to create property.");
	let hanoi = service
		.create_property(new_property("Hanoi", "Ba Dinh"), Deadline::none())
		.await
		.expect("Failed to create property.");
	let hcm_unit =
		service.create_unit(new_unit(hcm, 40.0, 1), Deadline::none()).await.expect("Failed to create unit.");
	let mut ids = Vec::new();

	for (property_id, price, unit_ids) in [
		(hcm, 3_000_000, vec![hcm_unit]),
		(hcm, 9_000_000, Vec::new()),
		(hanoi, 4_000_000, Vec::new()),
		(hanoi, 6_000_000, Vec::new()),
		(hanoi, 2_000_000, Vec::new()),
	] {
		let id = service
			.create_listing(new_listing(property_id, price, unit_ids), Deadline::none())
			.await
			.expect("Failed to create listing.");

		ids.push(id);

		tokio::time::sleep(Duration::from_millis(5)).await;
	}

	ids
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RENTAL_PG_DSN to run."]
async fn city_and_price_filters_narrow_the_listing_search() {
	let Some(base_dsn) = rental_testkit::env_dsn() else {
		eprintln!(
			"Skipping city_and_price_filters_narrow_the_listing_search; set RENTAL_PG_DSN to run this test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = build_service(&test_db).await;
	let ids = seed(&service).await;
	let req = SearchRequest::new(ListingFilters {
		city: Some("HCM".to_string()),
		min_price: Some(1_000_000),
		max_price: Some(5_000_000),
		..Default::default()
	});
	let response = service.search_listings(&req, Deadline::none()).await.expect("Search failed.");

	assert_eq!(response.total, 1);
	assert_eq!(response.ids, vec![ids[0]]);

	let hydrated =
		service.search_listings_hydrated(&req, Deadline::none()).await.expect("Search failed.");

	assert_eq!(hydrated.items.len(), 1);
	assert_eq!(hydrated.items[0].price, 3_000_000);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RENTAL_PG_DSN to run."]
async fn default_sort_returns_the_newest_listings_first() {
	let Some(base_dsn) = rental_testkit::env_dsn() else {
		eprintln!(
			"Skipping default_sort_returns_the_newest_listings_first; set RENTAL_PG_DSN to run this test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = build_service(&test_db).await;
	let ids = seed(&service).await;
	let first = SearchRequest::new(ListingFilters::default()).page(2, 0);
	let response = service.search_listings(&first, Deadline::none()).await.expect("Search failed.");

	assert_eq!(response.total, 5);
	assert_eq!(response.ids, vec![ids[4], ids[3]]);

	let past_the_end = SearchRequest::new(ListingFilters::default()).page(2, 10);
	let response =
		service.search_listings(&past_the_end, Deadline::none()).await.expect("Search failed.");

	assert_eq!(response.total, 5);
	assert!(response.ids.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set RENTAL_PG_DSN to run."]
async fn unit_update_reaches_cached_property_reads() {
	let Some(base_dsn) = rental_testkit::env_dsn() else {
		eprintln!("Skipping unit_update_reaches_cached_property_reads; set RENTAL_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = build_service(&test_db).await;
	let property_id = service
		.create_property(new_property("HCM", "District 7"), Deadline::none())
		.await
		.expect("Failed to create property.");
	let unit_id = service
		.create_unit(new_unit(property_id, 60.0, 2), Deadline::none())
		.await
		.expect("Failed to create unit.");
	let cached =
		service.get_property(property_id, Deadline::none()).await.expect("Failed to read property.");

	assert_eq!(cached.units.map(|units| units.len()), Some(1));

	service
		.update_unit(
			unit_id,
			rental_storage::models::UnitPatch { bedrooms: Some(3), ..Default::default() },
			Deadline::none(),
		)
		.await
		.expect("Failed to update unit.");

	let fresh =
		service.get_property(property_id, Deadline::none()).await.expect("Failed to read property.");

	assert_eq!(fresh.units.map(|units| units[0].bedrooms), Some(3));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set RENTAL_PG_DSN and RENTAL_QDRANT_URL to run."]
async fn qdrant_ranking_reaches_candidates_past_the_first_scroll_page() {
	let (Some(base_dsn), Some(qdrant_url)) = (rental_testkit::env_dsn(), rental_testkit::env_qdrant_url())
	else {
		eprintln!(
			"Skipping qdrant_ranking_reaches_candidates_past_the_first_scroll_page; set RENTAL_PG_DSN and RENTAL_QDRANT_URL to run this test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let qdrant = QdrantStore::new(&Qdrant {
		url: qdrant_url,
		collection: test_db.collection_name("rental_listings"),
	})
	.expect("Failed to build Qdrant client.");

	qdrant.ensure_collection().await.expect("Failed to create collection.");

	let service = build_service_with_index(&test_db, Arc::new(QdrantIndex::new(qdrant, 4))).await;
	let downtown = service
		.create_property(new_property("HCM", "District 1"), Deadline::none())
		.await
		.expect("Failed to create property.");
	let uptown = service
		.create_property(new_property("Hanoi", "Ba Dinh"), Deadline::none())
		.await
		.expect("Failed to create property.");
	let studio =
		service.create_unit(new_unit(downtown, 50.0, 2), Deadline::none()).await.expect("Failed to create unit.");
	let penthouse = service
		.create_unit(new_unit(downtown, 200.0, 2), Deadline::none())
		.await
		.expect("Failed to create unit.");
	let flat =
		service.create_unit(new_unit(uptown, 50.0, 2), Deadline::none()).await.expect("Failed to create unit.");
	let reference = service
		.create_listing(new_listing(downtown, 10_000_000, vec![studio]), Deadline::none())
		.await
		.expect("Failed to create listing.");

	for _ in 0..20 {
		service
			.create_listing(new_listing(uptown, 10_000_000, vec![flat]), Deadline::none())
			.await
			.expect("Failed to create listing.");
	}

	let best = service
		.create_listing(new_listing(downtown, 10_500_000, vec![penthouse]), Deadline::none())
		.await
		.expect("Failed to create listing.");
	let ranked = service
		.find_similar(&SimilarRequest { listing_id: reference, limit: Some(3) }, Deadline::none())
		.await
		.expect("Similar search failed.");

	assert_eq!(ranked.len(), 3);
	assert_eq!(ranked[0].listing_id, best);
	assert_eq!(ranked[0].score, 16.0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
