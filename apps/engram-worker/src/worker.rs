//! Worker loop: drain the ingest queue one claimed envelope at a time, and
//! fire the curator on its schedule. Queue redelivery handles everything the
//! in-process retry gives up on.

use std::time::{Duration, Instant};

use tracing::{error, info};

use engram_service::EngramService;
use engram_storage::queue;

pub async fn run_worker(service: EngramService) -> color_eyre::Result<()> {
	let poll_interval = Duration::from_millis(service.cfg.queue.poll_interval_ms);
	let curator_interval = Duration::from_secs(service.cfg.memory.curator_interval_seconds);
	let mut last_curator_run = Instant::now();

	info!("Worker started.");

	loop {
		match process_queue_once(&service).await {
			Ok(true) => {
				// More work may be waiting; skip the idle sleep.
				continue;
			},
			Ok(false) => {},
			Err(err) => {
				error!(error = %err, "Queue processing failed.");
			},
		}

		if last_curator_run.elapsed() >= curator_interval {
			match service.run_curator().await {
				Ok(report) => {
					info!(
						consolidated = report.consolidated,
						marked_processed = report.marked_processed,
						failed = report.failed,
						"Scheduled curator run finished."
					);
				},
				Err(err) => {
					error!(error = %err, "Scheduled curator run failed.");
				},
			}

			last_curator_run = Instant::now();
		}

		tokio::time::sleep(poll_interval).await;
	}
}

/// Claims and processes at most one envelope. Returns whether a job was
/// claimed.
async fn process_queue_once(service: &EngramService) -> color_eyre::Result<bool> {
	let Some(job) = queue::claim_next(&service.db, service.cfg.queue.lease_seconds).await? else {
		return Ok(false);
	};
	let envelope = match job.envelope() {
		Ok(envelope) => envelope,
		Err(err) => {
			// Undecodable payloads stay on the queue as FAILED with the
			// decode error attached for the operator.
			error!(error = %err, queue_id = %job.queue_id, "Envelope decode failed.");
			queue::mark_failed(&service.db, job.queue_id, job.attempts, &err.to_string()).await?;

			return Ok(true);
		},
	};

	match service.process_envelope(&envelope).await {
		Ok(id) => {
			queue::mark_done(&service.db, job.queue_id).await?;
			info!(memory_id = %id, "Envelope processed.");
		},
		Err(err) => {
			error!(error = %err, queue_id = %job.queue_id, "Envelope processing failed.");
			queue::mark_failed(&service.db, job.queue_id, job.attempts, &err.to_string()).await?;
		},
	}

	Ok(true)
}
