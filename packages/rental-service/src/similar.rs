use futures::future;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Deadline, Error, ListingDocument, RankedListing, RelevanceRanker, RentalService, Result,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimilarRequest {
	pub listing_id: Uuid,
	pub limit: Option<u32>,
}

impl RentalService {
	/// Listings ranked by weighted similarity to the reference listing, best first.
	///
	/// The reference is read through the cache. Candidates the store no longer considers
	/// visible are dropped after ranking.
	pub async fn find_similar(
		&self,
		req: &SimilarRequest,
		deadline: Deadline,
	) -> Result<Vec<RankedListing>> {
		let cfg = &self.cfg.ranking.similar;
		let limit = req.limit.unwrap_or(cfg.default_limit).min(cfg.max_limit);

		if limit == 0 {
			return Err(Error::invalid("limit must be greater than zero."));
		}

		let listing = self.get_listing(req.listing_id, deadline).await?;
		let property = self.get_property(listing.property_id, deadline).await?;
		let reference = ListingDocument::from_aggregates(&listing, &property)?;
		let ranker = RelevanceRanker::new(cfg);
		let now = OffsetDateTime::now_utc();
		let request = ranker.request(ranker.spec(&reference), limit as usize, now);
		let ranked = deadline.run("similar rank", self.backends.index.rank(&request)).await?;
		let ids: Vec<Uuid> = ranked.iter().map(|item| item.listing_id).collect();
		let visible = self.visible_listings(&ids, now, deadline).await?;

		Ok(ranked.into_iter().zip(visible).filter_map(|(item, visible)| visible.then_some(item)).collect())
	}

	/// One store query per id, all in flight at once. Any failure fails the batch.
	pub async fn visible_listings(
		&self,
		ids: &[Uuid],
		now: OffsetDateTime,
		deadline: Deadline,
	) -> Result<Vec<bool>> {
		let checks = ids.iter().map(|id| self.backends.executor.listing_visible(*id, now));

		deadline.run("visibility check", future::try_join_all(checks)).await
	}
}
