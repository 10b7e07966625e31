mod helpers;

use std::sync::{Arc, atomic::Ordering};

use engram_service::{Error, Providers, SubmitRequest};
use engram_storage::memories;
use helpers::{EchoRewrite, MapEmbedding, StaticGeneration, axis_vector, drain_queue};

fn submit_request(text: &str) -> SubmitRequest {
	SubmitRequest {
		text: text.to_string(),
		source_app: Some("cli".to_string()),
		session_id: Some("session-1".to_string()),
		context_tags: vec!["preferences".to_string()],
	}
}

fn providers(embedding: Arc<MapEmbedding>) -> Providers {
	Providers::new(
		embedding,
		Arc::new(StaticGeneration::new("unused")),
		Arc::new(EchoRewrite::new()),
	)
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set ENGRAM_PG_DSN and ENGRAM_QDRANT_URL to run."]
async fn ingest_then_recall() {
	let Some((test_db, qdrant_url, collection)) = helpers::test_env("ingest_then_recall").await
	else {
		return;
	};
	let embedding = Arc::new(MapEmbedding::new());

	embedding.assign("Christian prefers TypeScript over JavaScript", axis_vector(0));
	embedding.assign("language preferences", helpers::near_axis_vector(0, 0.1));

	let cfg = helpers::test_config(test_db.dsn().to_string(), qdrant_url, collection);
	let svc = helpers::build_service(cfg, providers(embedding)).await;
	let ack = svc
		.submit(submit_request("Christian prefers TypeScript over JavaScript"))
		.await
		.expect("Submit failed.");

	assert_eq!(ack.status, "queued");

	// The front door only enqueues; nothing is in the store yet.
	let raw = memories::fetch_raw_batch(&svc.db, 10).await.expect("Fetch failed.");

	assert!(raw.is_empty());

	let processed = drain_queue(&svc).await;

	assert_eq!(processed.len(), 1);

	let id = processed[0];
	let items = svc.search("language preferences", Some(5)).await.expect("Search failed.");

	assert_eq!(items.len(), 1);
	assert_eq!(items[0].id, id);
	assert!(items[0].score >= 0.5, "Expected a relevant score, got {}.", items[0].score);
	assert_eq!(items[0].text, "Christian prefers TypeScript over JavaScript");
	assert_eq!(items[0].tags, vec!["preferences".to_string()]);
	assert_eq!(items[0].source_app.as_deref(), Some("cli"));
	assert_eq!(items[0].status, "raw");

	// Self-match: querying by the stored text itself is a perfect hit.
	let self_items = svc
		.search("Christian prefers TypeScript over JavaScript", Some(1))
		.await
		.expect("Self search failed.");

	assert_eq!(self_items[0].id, id);
	assert!(self_items[0].score > 0.99);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set ENGRAM_PG_DSN and ENGRAM_QDRANT_URL to run."]
async fn front_door_rejects_empty_text() {
	let Some((test_db, qdrant_url, collection)) =
		helpers::test_env("front_door_rejects_empty_text").await
	else {
		return;
	};
	let cfg = helpers::test_config(test_db.dsn().to_string(), qdrant_url, collection);
	let svc = helpers::build_service(cfg, providers(Arc::new(MapEmbedding::new()))).await;

	for text in ["", "   ", "\n"] {
		let err = svc.submit(submit_request(text)).await.expect_err("Expected a rejection.");

		assert!(matches!(err, Error::InvalidRequest { .. }), "Unexpected error: {err}");
	}

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres and Qdrant. Set ENGRAM_PG_DSN and ENGRAM_QDRANT_URL to run."]
async fn transient_failures_retry_then_ack() {
	let Some((test_db, qdrant_url, collection)) =
		helpers::test_env("transient_failures_retry_then_ack").await
	else {
		return;
	};
	let embedding = Arc::new(MapEmbedding::new());

	embedding.assign("flaky note", axis_vector(2));
	// Two consecutive failures; the third in-process attempt must succeed.
	embedding.inject_transient_failures(2);

	let cfg = helpers::test_config(test_db.dsn().to_string(), qdrant_url, collection);
	let svc = helpers::build_service(cfg, providers(embedding.clone())).await;

	svc.submit(submit_request("flaky note")).await.expect("Submit failed.");

	let processed = drain_queue(&svc).await;

	assert_eq!(processed.len(), 1, "Message must be acked exactly once.");
	assert_eq!(embedding.calls.load(Ordering::SeqCst), 3);

	let row = memories::get_memory(&svc.db, processed[0])
		.await
		.expect("Fetch failed.")
		.expect("Row must exist after retries.");

	assert_eq!(row.text, "flaky note");

	// Nothing left to deliver.
	let leftover = engram_storage::queue::claim_next(&svc.db, svc.cfg.queue.lease_seconds)
		.await
		.expect("Claim failed.");

	assert!(leftover.is_none());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
