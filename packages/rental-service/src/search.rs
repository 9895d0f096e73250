mod filter;

pub use filter::{ListingFilters, PropertyFilters};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Deadline, RentalService, Result};
use rental_query::{AggregateQuery, ComposedQuery, Page, SortSpec};
use rental_storage::models::Listing;

/// Filters plus optional sort and pagination. Unset values fall back to the search config.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchRequest<F> {
	#[serde(default)]
	pub filters: F,
	#[serde(default)]
	pub sort_fields: Vec<String>,
	#[serde(default)]
	pub sort_directions: Vec<String>,
	pub limit: Option<u32>,
	pub offset: Option<u32>,
}
impl<F> SearchRequest<F> {
	pub fn new(filters: F) -> Self {
		Self { filters, sort_fields: Vec::new(), sort_directions: Vec::new(), limit: None, offset: None }
	}

	pub fn sort(mut self, field: impl Into<String>, direction: impl Into<String>) -> Self {
		self.sort_fields.push(field.into());
		self.sort_directions.push(direction.into());

		self
	}

	pub fn page(mut self, limit: u32, offset: u32) -> Self {
		self.limit = Some(limit);
		self.offset = Some(offset);

		self
	}
}

/// Matching ids in page order and the unpaginated match count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
	pub total: i64,
	pub ids: Vec<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HydratedSearchResponse<T> {
	pub total: i64,
	pub items: Vec<T>,
}

impl RentalService {
	pub async fn search_listings(
		&self,
		req: &SearchRequest<ListingFilters>,
		deadline: Deadline,
	) -> Result<SearchResponse> {
		let query = self.composed_query(req, req.filters.aggregates());

		self.run_search(&query, deadline).await
	}

	pub async fn search_properties(
		&self,
		req: &SearchRequest<PropertyFilters>,
		deadline: Deadline,
	) -> Result<SearchResponse> {
		let query = self.composed_query(req, req.filters.aggregates());

		self.run_search(&query, deadline).await
	}

	/// Listing search followed by a cache-aside read, returned in page order.
	pub async fn search_listings_hydrated(
		&self,
		req: &SearchRequest<ListingFilters>,
		deadline: Deadline,
	) -> Result<HydratedSearchResponse<Listing>> {
		let SearchResponse { total, ids } = self.search_listings(req, deadline).await?;
		let positions: HashMap<Uuid, usize> =
			ids.iter().enumerate().map(|(position, id)| (*id, position)).collect();
		let mut items = self.get_listings(&ids, deadline).await?;

		items.sort_by_key(|listing| positions.get(&listing.id).copied().unwrap_or(usize::MAX));

		Ok(HydratedSearchResponse { total, items })
	}

	fn composed_query<F>(&self, req: &SearchRequest<F>, aggregates: Vec<AggregateQuery>) -> ComposedQuery {
		let cfg = &self.cfg.search;
		let sort = if req.sort_fields.is_empty() && req.sort_directions.is_empty() {
			SortSpec::single(cfg.default_sort_field.clone(), cfg.default_sort_order.clone())
		} else {
			SortSpec::new(req.sort_fields.clone(), req.sort_directions.clone())
		};
		let page =
			Page { limit: req.limit.unwrap_or(cfg.default_limit), offset: req.offset.unwrap_or(0) };

		ComposedQuery { aggregates, sort, page: Some(page) }
	}

	async fn run_search(&self, query: &ComposedQuery, deadline: Deadline) -> Result<SearchResponse> {
		let statement = self.composer.compose(query)?;
		let rows = deadline.run("search", self.backends.executor.fetch_page(&statement)).await?;
		let total = match rows.first() {
			Some((_, total)) => *total,
			None if query.page.is_some_and(|page| page.offset > 0) => {
				let count = self.composer.compose_count(query)?;

				deadline.run("search count", self.backends.executor.fetch_count(&count)).await?
			},
			None => 0,
		};

		Ok(SearchResponse { total, ids: rows.into_iter().map(|(id, _)| id).collect() })
	}
}
