//! Qdrant adapter: one collection of memory embeddings under cosine
//! distance, keyed by the memory id.

use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{
		CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct, Query,
		QueryPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
		point_id::PointIdOptions, value::Kind,
	},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Result;

pub struct VectorStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}

/// Payload stored alongside each vector and returned on query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
	pub created_at: Option<i64>,
	pub primary_tag: Option<String>,
	pub priority_rank: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorMatch {
	pub id: Uuid,
	pub score: f32,
	pub metadata: VectorMetadata,
}

impl VectorStore {
	pub fn new(cfg: &engram_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the collection on first start. Dimensionality and distance are
	/// fixed for the lifetime of the collection.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(&self.collection)
					.vectors_config(VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine)),
			)
			.await?;

		Ok(())
	}

	/// Idempotent: upserting the same id overwrites the previous point.
	pub async fn upsert(&self, id: Uuid, vector: Vec<f32>, metadata: &VectorMetadata) -> Result<()> {
		let point = PointStruct::new(id.to_string(), vector, Payload::from(payload_from_metadata(metadata)));
		let upsert = UpsertPointsBuilder::new(&self.collection, vec![point]).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	pub async fn query(&self, vector: &[f32], top_k: u32) -> Result<Vec<VectorMatch>> {
		let response = self
			.client
			.query(
				QueryPointsBuilder::new(&self.collection)
					.query(Query::new_nearest(vector.to_vec()))
					.limit(top_k as u64)
					.with_payload(true),
			)
			.await?;
		let mut matches = Vec::with_capacity(response.result.len());

		for point in response.result {
			let Some(id) = point.id.as_ref().and_then(point_id_to_uuid) else {
				tracing::warn!("Vector match has a non-UUID point id. Skipping.");

				continue;
			};

			matches.push(VectorMatch {
				id,
				score: point.score,
				metadata: metadata_from_payload(&point.payload),
			});
		}

		Ok(matches)
	}

	/// Missing points are not an error; deletes are replayed on redelivery
	/// and curator re-runs.
	pub async fn delete(&self, ids: &[Uuid]) -> Result<()> {
		if ids.is_empty() {
			return Ok(());
		}

		let points = ids.iter().map(ToString::to_string).collect::<Vec<_>>();
		let delete = DeletePointsBuilder::new(&self.collection).points(points).wait(true);

		match self.client.delete_points(delete).await {
			Ok(_) => Ok(()),
			Err(err) if is_not_found_error(&err) => {
				tracing::info!("Vector points already absent during delete.");

				Ok(())
			},
			Err(err) => Err(err.into()),
		}
	}
}

fn payload_from_metadata(metadata: &VectorMetadata) -> HashMap<String, Value> {
	let mut map = HashMap::new();

	if let Some(created_at) = metadata.created_at {
		map.insert("created_at".to_string(), Value::from(created_at));
	}
	if let Some(primary_tag) = metadata.primary_tag.as_deref() {
		map.insert("primary_tag".to_string(), Value::from(primary_tag));
	}
	if let Some(priority_rank) = metadata.priority_rank {
		map.insert("priority_rank".to_string(), Value::from(priority_rank));
	}

	map
}

pub(crate) fn metadata_from_payload(payload: &HashMap<String, Value>) -> VectorMetadata {
	VectorMetadata {
		created_at: payload_i64(payload, "created_at"),
		primary_tag: payload_string(payload, "primary_tag"),
		priority_rank: payload_i64(payload, "priority_rank"),
	}
}

pub(crate) fn point_id_to_uuid(id: &PointId) -> Option<Uuid> {
	match id.point_id_options.as_ref()? {
		PointIdOptions::Uuid(raw) => Uuid::parse_str(raw).ok(),
		PointIdOptions::Num(_) => None,
	}
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match payload.get(key)?.kind.as_ref()? {
		Kind::StringValue(value) => Some(value.clone()),
		_ => None,
	}
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
	match payload.get(key)?.kind.as_ref()? {
		Kind::IntegerValue(value) => Some(*value),
		Kind::DoubleValue(value) => Some(*value as i64),
		_ => None,
	}
}

fn is_not_found_error(err: &qdrant_client::QdrantError) -> bool {
	let message = err.to_string().to_lowercase();

	(message.contains("not found") || message.contains("404")) && message.contains("point")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn metadata_round_trips_through_payload() {
		let metadata = VectorMetadata {
			created_at: Some(1_720_000_000_000),
			primary_tag: Some("general".to_string()),
			priority_rank: Some(0),
		};
		let payload = payload_from_metadata(&metadata);

		assert_eq!(metadata_from_payload(&payload), metadata);
	}

	#[test]
	fn missing_payload_keys_become_none() {
		let payload = HashMap::new();
		let metadata = metadata_from_payload(&payload);

		assert!(metadata.created_at.is_none());
		assert!(metadata.primary_tag.is_none());
		assert!(metadata.priority_rank.is_none());
	}

	#[test]
	fn numeric_point_ids_are_rejected() {
		let id = PointId { point_id_options: Some(PointIdOptions::Num(7)) };

		assert!(point_id_to_uuid(&id).is_none());

		let uuid = Uuid::new_v4();
		let id = PointId { point_id_options: Some(PointIdOptions::Uuid(uuid.to_string())) };

		assert_eq!(point_id_to_uuid(&id), Some(uuid));
	}
}
