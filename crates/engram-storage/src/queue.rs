//! Ingest queue over Postgres: at-least-once, unordered, lease-based
//! claiming. Failure marks the row `FAILED` with exponential backoff on
//! `available_at`, which is the redelivery mechanism; rows are never dropped
//! by the queue itself.

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Result, db::Db, models::{Envelope, QueueJob}};

const BASE_BACKOFF_MS: i64 = 500;
const MAX_BACKOFF_MS: i64 = 30_000;

pub async fn enqueue(db: &Db, envelope: &Envelope) -> Result<Uuid> {
	let queue_id = Uuid::new_v4();
	let now = OffsetDateTime::now_utc();

	sqlx::query(
		"\
INSERT INTO ingest_queue (
	queue_id,
	payload,
	status,
	attempts,
	available_at,
	created_at,
	updated_at
)
VALUES ($1,$2,'PENDING',0,$3,$4,$5)",
	)
	.bind(queue_id)
	.bind(serde_json::to_value(envelope)?)
	.bind(now)
	.bind(now)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(queue_id)
}

/// Claims the next due job and pushes its `available_at` forward by the
/// lease, so a crashed worker's claim expires on its own. `FOR UPDATE SKIP
/// LOCKED` keeps concurrent workers off the same row.
pub async fn claim_next(db: &Db, lease_seconds: i64) -> Result<Option<QueueJob>> {
	let now = OffsetDateTime::now_utc();
	let mut tx = db.pool.begin().await?;
	let job = sqlx::query_as::<_, QueueJob>(
		"\
SELECT queue_id, payload, attempts, available_at
FROM ingest_queue
WHERE status IN ('PENDING','FAILED') AND available_at <= $1
ORDER BY available_at ASC
LIMIT 1
FOR UPDATE SKIP LOCKED",
	)
	.bind(now)
	.fetch_optional(&mut *tx)
	.await?;

	if let Some(job) = job.as_ref() {
		let lease_until = now + Duration::seconds(lease_seconds);

		sqlx::query("UPDATE ingest_queue SET available_at = $1, updated_at = $2 WHERE queue_id = $3")
			.bind(lease_until)
			.bind(now)
			.bind(job.queue_id)
			.execute(&mut *tx)
			.await?;
	}

	tx.commit().await?;

	Ok(job)
}

pub async fn mark_done(db: &Db, queue_id: Uuid) -> Result<()> {
	let now = OffsetDateTime::now_utc();

	sqlx::query("UPDATE ingest_queue SET status = 'DONE', updated_at = $1 WHERE queue_id = $2")
		.bind(now)
		.bind(queue_id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

/// Requests redelivery: bumps the attempt count and reschedules the row with
/// capped exponential backoff.
pub async fn mark_failed(db: &Db, queue_id: Uuid, attempts: i32, error: &str) -> Result<()> {
	let next_attempts = attempts.saturating_add(1);
	let now = OffsetDateTime::now_utc();
	let available_at = now + backoff_for_attempt(next_attempts);

	sqlx::query(
		"\
UPDATE ingest_queue
SET status = 'FAILED', attempts = $1, last_error = $2, available_at = $3, updated_at = $4
WHERE queue_id = $5",
	)
	.bind(next_attempts)
	.bind(error)
	.bind(available_at)
	.bind(now)
	.bind(queue_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub fn backoff_for_attempt(attempt: i32) -> Duration {
	let attempts = attempt.max(1) as u32;
	let exp = attempts.saturating_sub(1).min(6);
	let base = BASE_BACKOFF_MS.saturating_mul(1 << exp);
	let capped = base.min(MAX_BACKOFF_MS);

	Duration::milliseconds(capped)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_grows_exponentially_and_caps() {
		assert_eq!(backoff_for_attempt(1), Duration::milliseconds(500));
		assert_eq!(backoff_for_attempt(2), Duration::milliseconds(1_000));
		assert_eq!(backoff_for_attempt(3), Duration::milliseconds(2_000));
		assert_eq!(backoff_for_attempt(7), Duration::milliseconds(30_000));
		assert_eq!(backoff_for_attempt(100), Duration::milliseconds(30_000));
	}

	#[test]
	fn backoff_tolerates_non_positive_attempts() {
		assert_eq!(backoff_for_attempt(0), Duration::milliseconds(500));
		assert_eq!(backoff_for_attempt(-5), Duration::milliseconds(500));
	}
}
