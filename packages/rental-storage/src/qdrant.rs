use qdrant_client::qdrant::{CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, FieldType};

use crate::Result;

/// Payload fields the ranker filters or scores on.
pub const PAYLOAD_INDEXES: [(&str, FieldType); 10] = [
	("listing_id", FieldType::Keyword),
	("city", FieldType::Keyword),
	("district", FieldType::Keyword),
	("ward", FieldType::Keyword),
	("building_type", FieldType::Keyword),
	("active", FieldType::Bool),
	("price", FieldType::Integer),
	("expires_at", FieldType::Integer),
	("area", FieldType::Float),
	("bedrooms", FieldType::Integer),
];

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
}
impl QdrantStore {
	pub fn new(cfg: &rental_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone() })
	}

	/// Creates the listings collection and its payload indexes when missing. Points carry a
	/// payload only; ranking filters and scores on the indexed fields.
	pub async fn ensure_collection(&self) -> Result<bool> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(false);
		}

		self.client.create_collection(CreateCollectionBuilder::new(self.collection.clone())).await?;

		for (field, field_type) in PAYLOAD_INDEXES {
			self.client
				.create_field_index(
					CreateFieldIndexCollectionBuilder::new(self.collection.clone(), field, field_type)
						.wait(true),
				)
				.await?;
		}

		Ok(true)
	}
}
