use serde::{Deserialize, Serialize};

use crate::{Deadline, ListingDocument, RentalService, Result};

const REBUILD_BATCH_SIZE: usize = 128;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
	pub rebuilt_count: u64,
	pub error_count: u64,
}

impl RentalService {
	/// Re-derives every listing document from the store and upserts it in batches.
	pub async fn rebuild_index(&self, deadline: Deadline) -> Result<RebuildReport> {
		let rows = deadline
			.run("listing documents", self.backends.store.load_listing_documents(None))
			.await?;
		let documents: Vec<ListingDocument> = rows.iter().map(ListingDocument::from_row).collect();
		let mut report = RebuildReport::default();

		for batch in documents.chunks(REBUILD_BATCH_SIZE) {
			match deadline.run("index upsert", self.backends.index.upsert(batch)).await {
				Ok(()) => report.rebuilt_count += batch.len() as u64,
				Err(err) => {
					tracing::warn!(error = %err, batch = batch.len(), "Index rebuild batch failed.");

					report.error_count += batch.len() as u64;
				},
			}
		}

		tracing::info!(
			rebuilt_count = report.rebuilt_count,
			error_count = report.error_count,
			"Index rebuild finished."
		);

		Ok(report)
	}

	/// Drops expired cache entries. Returns the number removed.
	pub async fn purge_cache(&self, deadline: Deadline) -> Result<u64> {
		let removed = self.cache.purge_expired(deadline).await?;

		tracing::info!(removed, "Expired cache entries purged.");

		Ok(removed)
	}
}
