//! Basic semantic search: embed the query, take the top-K vector matches,
//! hydrate rows from the memory store, and merge score-ordered.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use engram_storage::{memories, models::MemoryRecord, vector::VectorMatch};

use crate::{EngramService, Result};

pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchItem {
	pub id: Uuid,
	pub text: String,
	pub tags: Vec<String>,
	pub score: f32,
	pub created_at: i64,
	pub source_app: Option<String>,
	pub session_id: Option<String>,
	pub status: String,
}

impl EngramService {
	pub async fn search(&self, query: &str, limit: Option<u32>) -> Result<Vec<SearchItem>> {
		let limit = limit.unwrap_or(self.cfg.memory.top_k).max(1);
		let embedding = self.providers.embedding.embed(&self.cfg.ai, query).await?;
		let matches = self.vector.query(&embedding, limit).await?;
		let ids = matches.iter().map(|m| m.id).collect::<Vec<_>>();
		let rows = memories::get_memories_by_ids(&self.db, &ids).await?;

		Ok(merge_matches(&matches, rows))
	}
}

/// Left-join vector matches with hydrated rows by id. Matches without a row
/// are vector orphans and are dropped, not errors. Output is score
/// descending with a stable created_at-descending tie-break.
pub fn merge_matches(matches: &[VectorMatch], rows: Vec<MemoryRecord>) -> Vec<SearchItem> {
	let mut items = Vec::with_capacity(matches.len());

	for m in matches {
		let Some(row) = rows.iter().find(|row| row.id == m.id) else {
			tracing::debug!(id = %m.id, "Vector match has no memory row. Dropping.");

			continue;
		};

		items.push(SearchItem {
			id: row.id,
			text: row.text.clone(),
			tags: row.tag_list(),
			score: m.score,
			created_at: row.created_at,
			source_app: row.source_app.clone(),
			session_id: row.session_id.clone(),
			status: row.status.clone(),
		});
	}

	items.sort_by(|a, b| {
		b.score
			.partial_cmp(&a.score)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then_with(|| b.created_at.cmp(&a.created_at))
	});

	items
}

#[cfg(test)]
mod tests {
	use engram_storage::vector::VectorMetadata;

	use super::*;

	fn row(id: Uuid, text: &str, created_at: i64) -> MemoryRecord {
		MemoryRecord {
			id,
			text: text.to_string(),
			tags: serde_json::json!([]),
			source_app: None,
			session_id: None,
			status: "raw".to_string(),
			created_at,
			updated_at: created_at,
		}
	}

	fn vector_match(id: Uuid, score: f32) -> VectorMatch {
		VectorMatch { id, score, metadata: VectorMetadata::default() }
	}

	#[test]
	fn orphan_matches_are_dropped() {
		let hydrated = Uuid::new_v4();
		let orphan = Uuid::new_v4();
		let matches = vec![vector_match(hydrated, 0.9), vector_match(orphan, 0.8)];
		let rows = vec![row(hydrated, "kept", 1)];
		let items = merge_matches(&matches, rows);

		assert_eq!(items.len(), 1);
		assert_eq!(items[0].id, hydrated);
	}

	#[test]
	fn items_sort_by_score_descending() {
		let a = Uuid::new_v4();
		let b = Uuid::new_v4();
		let matches = vec![vector_match(a, 0.4), vector_match(b, 0.8)];
		let rows = vec![row(a, "a", 1), row(b, "b", 2)];
		let items = merge_matches(&matches, rows);

		assert_eq!(items[0].id, b);
		assert_eq!(items[1].id, a);
	}

	#[test]
	fn ties_break_on_created_at_descending() {
		let older = Uuid::new_v4();
		let newer = Uuid::new_v4();
		let matches = vec![vector_match(older, 0.7), vector_match(newer, 0.7)];
		let rows = vec![row(older, "older", 100), row(newer, "newer", 200)];
		let items = merge_matches(&matches, rows);

		assert_eq!(items[0].id, newer);
		assert_eq!(items[1].id, older);
	}

	#[test]
	fn rows_carry_hydrated_fields() {
		let id = Uuid::new_v4();
		let mut record = row(id, "body", 42);

		record.tags = serde_json::json!(["x", "y"]);
		record.source_app = Some("cli".to_string());

		let items = merge_matches(&[vector_match(id, 0.5)], vec![record]);

		assert_eq!(items[0].tags, vec!["x".to_string(), "y".to_string()]);
		assert_eq!(items[0].source_app.as_deref(), Some("cli"));
		assert_eq!(items[0].created_at, 42);
	}
}
