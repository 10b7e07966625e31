//! Scheduled consolidation: sweep a batch of raw memories, merge
//! near-duplicate groups through the LLM, and replace each group with a
//! single consolidated memory in both stores.
//!
//! Every candidate is independent; a partial consolidation self-heals on the
//! next run because the survivors re-match their remaining duplicates.

use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use engram_providers::GenerateOptions;
use engram_storage::{
	memories,
	models::MemoryRecord,
	vector::{VectorMatch, VectorMetadata},
};

use crate::{
	EngramService, Result, SignalKind,
	ingest::{CONSOLIDATED_PRIMARY_TAG, PRIORITY_CONSOLIDATED},
};

/// Nearest neighbors fetched per candidate: the candidate's own self-match
/// plus up to two duplicates.
const CURATOR_TOP_K: u32 = 3;

const CURATOR_SYSTEM: &str = "You are a memory curator. Merge these memories accurately.";

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct CuratorReport {
	pub examined: u32,
	pub consolidated: u32,
	pub marked_processed: u32,
	pub skipped: u32,
	pub failed: u32,
}

enum CandidateOutcome {
	Consolidated { removed: usize },
	Processed,
	Skipped,
}

impl EngramService {
	pub async fn run_curator(&self) -> Result<CuratorReport> {
		let deadline = Duration::from_secs(self.cfg.memory.curator_deadline_seconds);
		let started = Instant::now();
		let batch = memories::fetch_raw_batch(&self.db, self.cfg.memory.curator_batch).await?;
		let mut report = CuratorReport::default();

		self.signals
			.record(SignalKind::Process, format!("Curator examining {} candidates.", batch.len()));

		for candidate in batch {
			if report.consolidated >= self.cfg.memory.curator_max_consolidations {
				break;
			}
			if started.elapsed() >= deadline {
				self.signals.record(SignalKind::Info, "Curator deadline reached. Exiting.");

				break;
			}

			report.examined += 1;

			match self.curate_candidate(&candidate).await {
				Ok(CandidateOutcome::Consolidated { removed }) => {
					report.consolidated += 1;

					self.signals.record(
						SignalKind::Success,
						format!("Consolidated {removed} duplicates into {}.", candidate.id),
					);
				},
				Ok(CandidateOutcome::Processed) => {
					report.marked_processed += 1;
				},
				Ok(CandidateOutcome::Skipped) => {
					report.skipped += 1;
				},
				Err(err) => {
					report.failed += 1;

					tracing::error!(error = %err, id = %candidate.id, "Curator candidate failed.");
					self.signals.record(
						SignalKind::Error,
						format!("Curator skipped {}: {err}", candidate.id),
					);
				},
			}
		}

		self.signals.record(
			SignalKind::Info,
			format!(
				"Curator finished: {} consolidated, {} processed, {} failed.",
				report.consolidated, report.marked_processed, report.failed
			),
		);

		Ok(report)
	}

	async fn curate_candidate(&self, candidate: &MemoryRecord) -> Result<CandidateOutcome> {
		// The batch is a snapshot; an earlier consolidation in this run may
		// have deleted or transitioned this candidate already.
		let current = memories::get_memory(&self.db, candidate.id).await?;
		let Some(current) = current else {
			return Ok(CandidateOutcome::Skipped);
		};

		if current.status != "raw" {
			return Ok(CandidateOutcome::Skipped);
		}

		let embedding = self.providers.embedding.embed(&self.cfg.ai, &candidate.text).await?;
		let similar = self.vector.query(&embedding, CURATOR_TOP_K).await?;
		let duplicate_ids =
			duplicate_ids(&similar, candidate.id, self.cfg.memory.similarity_threshold);

		if duplicate_ids.is_empty() {
			memories::mark_processed(&self.db, candidate.id, crate::now_ms()).await?;

			return Ok(CandidateOutcome::Processed);
		}

		let duplicates = memories::get_memories_by_ids(&self.db, &duplicate_ids).await?;

		if duplicates.is_empty() {
			// Orphan vectors with no backing rows; nothing to merge.
			memories::mark_processed(&self.db, candidate.id, crate::now_ms()).await?;

			return Ok(CandidateOutcome::Processed);
		}

		let combined = combined_text(&candidate.text, &duplicates);
		let consolidated = self
			.providers
			.generation
			.generate(
				&self.cfg.ai,
				&consolidation_prompt(&combined),
				Some(CURATOR_SYSTEM),
				&GenerateOptions::default(),
			)
			.await?;

		memories::apply_consolidation(&self.db, candidate.id, &consolidated, crate::now_ms())
			.await?;

		let fresh = self.providers.embedding.embed(&self.cfg.ai, &consolidated).await?;

		self.vector
			.upsert(candidate.id, fresh, &VectorMetadata {
				created_at: Some(candidate.created_at),
				primary_tag: Some(CONSOLIDATED_PRIMARY_TAG.to_string()),
				priority_rank: Some(PRIORITY_CONSOLIDATED),
			})
			.await?;

		let removed_ids = duplicates.iter().map(|d| d.id).collect::<Vec<_>>();

		memories::delete_memories(&self.db, &removed_ids).await?;
		self.vector.delete(&removed_ids).await?;

		Ok(CandidateOutcome::Consolidated { removed: removed_ids.len() })
	}
}

/// Other ids scoring above the similarity threshold. The candidate's own
/// self-match is always excluded.
pub fn duplicate_ids(similar: &[VectorMatch], anchor: Uuid, threshold: f32) -> Vec<Uuid> {
	similar
		.iter()
		.filter(|m| m.id != anchor && m.score > threshold)
		.map(|m| m.id)
		.collect()
}

pub fn combined_text(anchor: &str, duplicates: &[MemoryRecord]) -> String {
	let mut parts = Vec::with_capacity(duplicates.len() + 1);

	parts.push(anchor);
	parts.extend(duplicates.iter().map(|d| d.text.as_str()));

	parts.join("\n---\n")
}

fn consolidation_prompt(combined: &str) -> String {
	format!(
		"Merge the following overlapping memories into a single memory that \
		 preserves every distinct fact. Respond with the merged memory text \
		 only.\n\n{combined}"
	)
}
