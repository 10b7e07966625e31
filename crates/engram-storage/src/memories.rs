//! Queries over the `memories` table. The relational store owns durable
//! metadata; embeddings live in the vector store under the same ids.

use uuid::Uuid;

use crate::{Result, db::Db, models::MemoryRecord};

/// Inserts a memory row. Returns `false` when a row with the same id already
/// exists; at-least-once redelivery makes that a success, not a conflict.
pub async fn insert_memory(db: &Db, record: &MemoryRecord) -> Result<bool> {
	let result = sqlx::query(
		"\
INSERT INTO memories (
	id,
	text,
	tags,
	source_app,
	session_id,
	status,
	created_at,
	updated_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
ON CONFLICT (id) DO NOTHING",
	)
	.bind(record.id)
	.bind(record.text.as_str())
	.bind(&record.tags)
	.bind(record.source_app.as_deref())
	.bind(record.session_id.as_deref())
	.bind(record.status.as_str())
	.bind(record.created_at)
	.bind(record.updated_at)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn get_memory(db: &Db, id: Uuid) -> Result<Option<MemoryRecord>> {
	let record = sqlx::query_as::<_, MemoryRecord>(
		"\
SELECT id, text, tags, source_app, session_id, status, created_at, updated_at
FROM memories
WHERE id = $1",
	)
	.bind(id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(record)
}

pub async fn get_memories_by_ids(db: &Db, ids: &[Uuid]) -> Result<Vec<MemoryRecord>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let records = sqlx::query_as::<_, MemoryRecord>(
		"\
SELECT id, text, tags, source_app, session_id, status, created_at, updated_at
FROM memories
WHERE id = ANY($1)",
	)
	.bind(ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(records)
}

/// Oldest-first batch of curator candidates.
pub async fn fetch_raw_batch(db: &Db, limit: u32) -> Result<Vec<MemoryRecord>> {
	let records = sqlx::query_as::<_, MemoryRecord>(
		"\
SELECT id, text, tags, source_app, session_id, status, created_at, updated_at
FROM memories
WHERE status = 'raw'
ORDER BY created_at ASC
LIMIT $1",
	)
	.bind(limit as i64)
	.fetch_all(&db.pool)
	.await?;

	Ok(records)
}

/// Replaces the anchor's text with the consolidated body. `created_at` is
/// never touched.
pub async fn apply_consolidation(db: &Db, id: Uuid, text: &str, updated_at: i64) -> Result<()> {
	sqlx::query(
		"\
UPDATE memories
SET text = $1, status = 'consolidated', updated_at = $2
WHERE id = $3",
	)
	.bind(text)
	.bind(updated_at)
	.bind(id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn mark_processed(db: &Db, id: Uuid, updated_at: i64) -> Result<()> {
	sqlx::query(
		"\
UPDATE memories
SET status = 'processed', updated_at = $1
WHERE id = $2",
	)
	.bind(updated_at)
	.bind(id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn delete_memories(db: &Db, ids: &[Uuid]) -> Result<u64> {
	if ids.is_empty() {
		return Ok(0);
	}

	let result =
		sqlx::query("DELETE FROM memories WHERE id = ANY($1)").bind(ids).execute(&db.pool).await?;

	Ok(result.rows_affected())
}
