//! Ingestion: the accept-and-enqueue front door and the envelope processor
//! the worker drives. The front door's latency is one queue insert; all
//! embedding and store writes happen on the consumer side.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use engram_storage::{
	memories,
	models::{ENVELOPE_VERSION, Envelope, MemoryRecord, MemoryStatus},
	queue,
	vector::VectorMetadata,
};

use crate::{EngramService, Error, Result, SignalKind};

/// Bounded in-process retry around embed + dual write. Redelivery beyond
/// this is the queue's job.
pub const INGEST_MAX_ATTEMPTS: u32 = 3;

const RETRY_BASE_MS: u64 = 100;

pub const DEFAULT_PRIMARY_TAG: &str = "general";
pub const CONSOLIDATED_PRIMARY_TAG: &str = "consolidated";

pub const PRIORITY_RAW: i64 = 0;
pub const PRIORITY_CONSOLIDATED: i64 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
	pub text: String,
	#[serde(default)]
	pub source_app: Option<String>,
	#[serde(default)]
	pub session_id: Option<String>,
	#[serde(default)]
	pub context_tags: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitAck {
	pub status: &'static str,
}

impl EngramService {
	/// Validates, stamps, enqueues, acks. Never embeds or writes the stores
	/// inline.
	pub async fn submit(&self, req: SubmitRequest) -> Result<SubmitAck> {
		if req.text.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "text is required.".to_string() });
		}

		let envelope = Envelope {
			version: ENVELOPE_VERSION,
			text: req.text,
			context_tags: req.context_tags,
			timestamp: crate::now_ms(),
			source_app: req.source_app,
			session_id: req.session_id,
		};

		queue::enqueue(&self.db, &envelope).await?;
		self.signals.record(SignalKind::Info, "Memory queued for ingestion.");

		Ok(SubmitAck { status: "queued" })
	}

	/// Consumer side: assign the id, embed, write vector then row, under
	/// bounded retry for transient failures. Returns the assigned memory id.
	pub async fn process_envelope(&self, envelope: &Envelope) -> Result<Uuid> {
		let id = Uuid::new_v4();
		let metadata = VectorMetadata {
			created_at: Some(envelope.timestamp),
			primary_tag: Some(primary_tag(&envelope.context_tags).to_string()),
			priority_rank: Some(PRIORITY_RAW),
		};
		let mut failures = 0;

		self.signals.record(SignalKind::Process, "Processing ingest envelope.");

		loop {
			match self.ingest_once(id, envelope, &metadata).await {
				Ok(()) => {
					self.signals.record(SignalKind::Success, format!("Memory {id} stored."));

					return Ok(id);
				},
				Err(err) if err.is_transient() && failures + 1 < INGEST_MAX_ATTEMPTS => {
					failures += 1;

					tracing::warn!(
						error = %err,
						attempt = failures,
						"Transient ingest failure. Backing off."
					);
					tokio::time::sleep(ingest_backoff(failures)).await;
				},
				Err(err) => {
					self.signals
						.record(SignalKind::Error, format!("Ingest failed after retries: {err}"));

					return Err(err);
				},
			}
		}
	}

	async fn ingest_once(
		&self,
		id: Uuid,
		envelope: &Envelope,
		metadata: &VectorMetadata,
	) -> Result<()> {
		let vector = self.providers.embedding.embed(&self.cfg.ai, &envelope.text).await?;

		if vector.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(Error::Provider {
				message: format!(
					"Embedding dimension {} does not match configured vector_dim {}.",
					vector.len(),
					self.cfg.storage.qdrant.vector_dim
				),
				transient: false,
			});
		}

		// Vector before row: a row without a vector would be unreachable from
		// search, and this write order keeps that window closed.
		self.vector.upsert(id, vector, metadata).await?;

		let record = MemoryRecord {
			id,
			text: envelope.text.clone(),
			tags: json!(envelope.context_tags),
			source_app: envelope.source_app.clone(),
			session_id: envelope.session_id.clone(),
			status: MemoryStatus::Raw.as_str().to_string(),
			created_at: envelope.timestamp,
			updated_at: envelope.timestamp,
		};

		// A duplicate id means a redelivered envelope already landed; both
		// writes are idempotent, so this pass counts as success.
		memories::insert_memory(&self.db, &record).await?;

		Ok(())
	}
}

pub fn primary_tag(context_tags: &[String]) -> &str {
	context_tags
		.first()
		.map(String::as_str)
		.filter(|tag| !tag.trim().is_empty())
		.unwrap_or(DEFAULT_PRIMARY_TAG)
}

/// Backoff after the i-th failure: `2^(i-1) * 100ms`, so 100ms, 200ms, ...
pub fn ingest_backoff(failures: u32) -> Duration {
	let exp = failures.saturating_sub(1).min(6);

	Duration::from_millis(RETRY_BASE_MS << exp)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn primary_tag_prefers_first_context_tag() {
		let tags = vec!["typescript".to_string(), "preferences".to_string()];

		assert_eq!(primary_tag(&tags), "typescript");
		assert_eq!(primary_tag(&[]), DEFAULT_PRIMARY_TAG);
		assert_eq!(primary_tag(&[" ".to_string()]), DEFAULT_PRIMARY_TAG);
	}

	#[test]
	fn backoff_doubles_per_failure() {
		assert_eq!(ingest_backoff(1), Duration::from_millis(100));
		assert_eq!(ingest_backoff(2), Duration::from_millis(200));
		assert_eq!(ingest_backoff(3), Duration::from_millis(400));
	}
}
