use std::{collections::HashMap, future::Future};

use qdrant_client::{
	client::Payload,
	qdrant::{
		Condition, DeletePointsBuilder, Filter, PointId, PointStruct, Range, ScrollPointsBuilder,
		UpsertPointsBuilder, Value, Vector, point_id::PointIdOptions, value::Kind,
	},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	BoxFuture, Error, Result, SecondaryIndex,
	ranking::{IndexCondition, RankedListing, ScoringRequest},
};
use rental_storage::{
	models::{Listing, ListingDocumentRow, Property},
	qdrant::QdrantStore,
};

/// Scanned documents carry no relevance of their own.
const SCAN_BASE_SCORE: f32 = 1.0;

/// Flattened listing as stored in the secondary index.
///
/// Area and bedrooms sum over the listing's units, falling back to the property area when the
/// listing names no units. Timestamps are unix seconds; an open-ended listing stores
/// `i64::MAX`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingDocument {
	pub listing_id: Uuid,
	pub property_id: Uuid,
	pub price: i64,
	pub active: bool,
	pub expires_at: i64,
	pub created_at: i64,
	pub city: String,
	pub district: String,
	pub ward: String,
	pub building_type: String,
	pub area: f64,
	pub bedrooms: i64,
}
impl ListingDocument {
	pub fn from_row(row: &ListingDocumentRow) -> Self {
		Self {
			listing_id: row.listing_id,
			property_id: row.property_id,
			price: row.price,
			active: row.active,
			expires_at: expiry_seconds(row.expires_at),
			created_at: row.created_at.unix_timestamp(),
			city: row.city.clone(),
			district: row.district.clone(),
			ward: row.ward.clone(),
			building_type: row.building_type.clone(),
			area: row.units_area.unwrap_or(row.property_area),
			bedrooms: row.units_bedrooms.unwrap_or(0),
		}
	}

	/// Builds the document from hydrated entities. The property must carry its units.
	pub fn from_aggregates(listing: &Listing, property: &Property) -> Result<Self> {
		if listing.property_id != property.id {
			return Err(Error::InvalidRequest {
				message: format!("Listing {} does not belong to property {}.", listing.id, property.id),
			});
		}

		let (Some(unit_ids), Some(units)) = (listing.unit_ids.as_ref(), property.units.as_ref()) else {
			return Err(Error::InvalidRequest {
				message: format!("Listing {} is not fully hydrated.", listing.id),
			});
		};
		let listed: Vec<_> = units.iter().filter(|unit| unit_ids.contains(&unit.id)).collect();
		let (area, bedrooms) = if listed.is_empty() {
			(property.area, 0)
		} else {
			(
				listed.iter().map(|unit| unit.area).sum::<f64>(),
				listed.iter().map(|unit| i64::from(unit.bedrooms)).sum::<i64>(),
			)
		};

		Ok(Self {
			listing_id: listing.id,
			property_id: property.id,
			price: listing.price,
			active: listing.active,
			expires_at: expiry_seconds(listing.expires_at),
			created_at: listing.created_at.unix_timestamp(),
			city: property.city.clone(),
			district: property.district.clone(),
			ward: property.ward.clone(),
			building_type: property.building_type.clone(),
			area,
			bedrooms,
		})
	}

	pub(crate) fn keyword(&self, field: &str) -> Option<String> {
		match field {
			"listing_id" => Some(self.listing_id.to_string()),
			"property_id" => Some(self.property_id.to_string()),
			"city" => Some(self.city.clone()),
			"district" => Some(self.district.clone()),
			"ward" => Some(self.ward.clone()),
			"building_type" => Some(self.building_type.clone()),
			_ => None,
		}
	}

	pub(crate) fn number(&self, field: &str) -> Option<f64> {
		match field {
			"price" => Some(self.price as f64),
			"expires_at" => Some(self.expires_at as f64),
			"created_at" => Some(self.created_at as f64),
			"area" => Some(self.area),
			"bedrooms" => Some(self.bedrooms as f64),
			_ => None,
		}
	}

	pub(crate) fn flag(&self, field: &str) -> Option<bool> {
		match field {
			"active" => Some(self.active),
			_ => None,
		}
	}

	fn payload(&self) -> Payload {
		let mut payload = Payload::new();

		payload.insert("listing_id", self.listing_id.to_string());
		payload.insert("property_id", self.property_id.to_string());
		payload.insert("price", serde_json::Value::from(self.price));
		payload.insert("active", serde_json::Value::from(self.active));
		payload.insert("expires_at", serde_json::Value::from(self.expires_at));
		payload.insert("created_at", serde_json::Value::from(self.created_at));
		payload.insert("city", self.city.clone());
		payload.insert("district", self.district.clone());
		payload.insert("ward", self.ward.clone());
		payload.insert("building_type", self.building_type.clone());
		payload.insert("area", serde_json::Value::from(self.area));
		payload.insert("bedrooms", serde_json::Value::from(self.bedrooms));

		payload
	}

	fn from_payload(id: Option<&PointId>, payload: &HashMap<String, Value>) -> Option<Self> {
		let listing_id = id.and_then(point_id_to_uuid).or_else(|| payload_uuid(payload, "listing_id"))?;

		Some(Self {
			listing_id,
			property_id: payload_uuid(payload, "property_id")?,
			price: payload_i64(payload, "price")?,
			active: payload_bool(payload, "active")?,
			expires_at: payload_i64(payload, "expires_at")?,
			created_at: payload_i64(payload, "created_at")?,
			city: payload_string(payload, "city")?,
			district: payload_string(payload, "district")?,
			ward: payload_string(payload, "ward")?,
			building_type: payload_string(payload, "building_type")?,
			area: payload_f64(payload, "area")?,
			bedrooms: payload_i64(payload, "bedrooms")?,
		})
	}
}

/// One page of an index scan and the cursor of the page after it.
#[derive(Debug)]
pub struct ScanPage<C> {
	pub documents: Vec<ListingDocument>,
	pub next: Option<C>,
}

/// Scores every document `fetch` yields, page by page, keeping only the best `request.limit`
/// between pages. `fetch` receives `None` for the first page.
pub async fn rank_scan<C, F, Fut>(request: &ScoringRequest, mut fetch: F) -> Result<Vec<RankedListing>>
where
	F: FnMut(Option<C>) -> Fut,
	Fut: Future<Output = Result<ScanPage<C>>>,
{
	let mut best = Vec::with_capacity(request.limit);
	let mut cursor = None;

	loop {
		let page = fetch(cursor.take()).await?;

		best.extend(request.rank(page.documents.into_iter().map(|doc| (doc, SCAN_BASE_SCORE))));
		request.keep_best(&mut best);

		match page.next {
			Some(next) => cursor = Some(next),
			None => return Ok(best),
		}
	}
}

/// Qdrant-backed listing index.
///
/// Ranking scrolls every point that passes the request's filter, `scan_batch_size` points per
/// page, and applies the weighted boosts to each payload.
pub struct QdrantIndex {
	store: QdrantStore,
	scan_batch_size: u32,
}
impl QdrantIndex {
	pub fn new(store: QdrantStore, scan_batch_size: u32) -> Self {
		Self { store, scan_batch_size: scan_batch_size.max(1) }
	}

	async fn rank_candidates(&self, request: &ScoringRequest) -> Result<Vec<RankedListing>> {
		let filter = Filter {
			must: request.must.iter().map(to_condition).collect(),
			must_not: request.must_not.iter().map(to_condition).collect(),
			..Default::default()
		};
		let filter = &filter;

		rank_scan(request, move |offset| self.scroll_page(filter, offset)).await
	}

	async fn scroll_page(
		&self,
		filter: &Filter,
		offset: Option<PointId>,
	) -> Result<ScanPage<PointId>> {
		let mut scroll = ScrollPointsBuilder::new(self.store.collection.clone())
			.filter(filter.clone())
			.limit(self.scan_batch_size)
			.with_payload(true);

		if let Some(offset) = offset {
			scroll = scroll.offset(offset);
		}

		let response = self
			.store
			.client
			.scroll(scroll)
			.await
			.map_err(|err| Error::Index { message: err.to_string() })?;
		let mut documents = Vec::with_capacity(response.result.len());

		for point in response.result {
			match ListingDocument::from_payload(point.id.as_ref(), &point.payload) {
				Some(doc) => documents.push(doc),
				None => tracing::warn!(point_id = ?point.id, "Skipping index point with incomplete payload."),
			}
		}

		Ok(ScanPage { documents, next: response.next_page_offset })
	}

	async fn upsert_documents(&self, documents: &[ListingDocument]) -> Result<()> {
		if documents.is_empty() {
			return Ok(());
		}

		let points: Vec<PointStruct> = documents
			.iter()
			.map(|doc| {
				PointStruct::new(
					doc.listing_id.to_string(),
					HashMap::<String, Vector>::new(),
					doc.payload(),
				)
			})
			.collect();

		self.store
			.client
			.upsert_points(UpsertPointsBuilder::new(self.store.collection.clone(), points).wait(true))
			.await
			.map_err(|err| Error::Index { message: err.to_string() })?;

		Ok(())
	}

	async fn delete_documents(&self, listing_ids: &[Uuid]) -> Result<()> {
		if listing_ids.is_empty() {
			return Ok(());
		}

		let ids: Vec<String> = listing_ids.iter().map(ToString::to_string).collect();
		let filter = Filter::must([Condition::matches("listing_id", ids)]);

		self.store
			.client
			.delete_points(
				DeletePointsBuilder::new(self.store.collection.clone()).points(filter).wait(true),
			)
			.await
			.map_err(|err| Error::Index { message: err.to_string() })?;

		Ok(())
	}
}
impl SecondaryIndex for QdrantIndex {
	fn rank<'a>(&'a self, request: &'a ScoringRequest) -> BoxFuture<'a, Result<Vec<RankedListing>>> {
		Box::pin(self.rank_candidates(request))
	}

	fn upsert<'a>(&'a self, documents: &'a [ListingDocument]) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_documents(documents))
	}

	fn delete<'a>(&'a self, listing_ids: &'a [Uuid]) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.delete_documents(listing_ids))
	}
}

fn to_condition(condition: &IndexCondition) -> Condition {
	match condition {
		IndexCondition::Keyword { field, value } => Condition::matches(*field, value.clone()),
		IndexCondition::Flag { field, value } => Condition::matches(*field, *value),
		IndexCondition::Range { field, gt, gte, lte } =>
			Condition::range(*field, Range { gt: *gt, gte: *gte, lte: *lte, lt: None }),
	}
}

fn expiry_seconds(expires_at: Option<OffsetDateTime>) -> i64 {
	expires_at.map_or(i64::MAX, OffsetDateTime::unix_timestamp)
}

fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		_ => None,
	}
}

fn payload_uuid(payload: &HashMap<String, Value>, key: &str) -> Option<Uuid> {
	Uuid::parse_str(&payload_string(payload, key)?).ok()
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
	match &payload.get(key)?.kind {
		Some(Kind::IntegerValue(value)) => Some(*value),
		Some(Kind::DoubleValue(value)) if value.fract() == 0.0 => Some(*value as i64),
		_ => None,
	}
}

fn payload_f64(payload: &HashMap<String, Value>, key: &str) -> Option<f64> {
	match &payload.get(key)?.kind {
		Some(Kind::DoubleValue(value)) => Some(*value),
		Some(Kind::IntegerValue(value)) => Some(*value as f64),
		_ => None,
	}
}

fn payload_bool(payload: &HashMap<String, Value>, key: &str) -> Option<bool> {
	match &payload.get(key)?.kind {
		Some(Kind::BoolValue(value)) => Some(*value),
		_ => None,
	}
}
