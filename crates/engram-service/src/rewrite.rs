//! Rewritten search: every input query is rewritten by the AI gateway,
//! embedded, and run against the vector index, all queries in parallel. A
//! failing query degrades to the original text and then to empty matches;
//! it never takes its siblings down with it.

use futures::future;
use serde::{Deserialize, Serialize};

use engram_providers::{GenerateOptions, Provider, RewriteContext};
use engram_storage::vector::VectorMatch;

use crate::{EngramService, Result, SignalKind};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewrittenSearchRequest {
	pub queries: Vec<String>,
	#[serde(default)]
	pub context: Option<RewriteContext>,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub provider: Option<Provider>,
	#[serde(default)]
	pub model: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VectorResults {
	pub matches: Vec<VectorMatch>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewrittenQueryResult {
	pub original_query: String,
	pub rewritten_query: String,
	pub vector_results: VectorResults,
}

impl EngramService {
	/// Results are aligned with the input order; de-duplication across
	/// queries is the caller's concern.
	pub async fn rewritten_search(
		&self,
		req: RewrittenSearchRequest,
	) -> Result<Vec<RewrittenQueryResult>> {
		if req.queries.is_empty() {
			return Ok(Vec::new());
		}

		let top_k = req.top_k.unwrap_or(self.cfg.memory.top_k).max(1);
		let opts = GenerateOptions {
			provider: req.provider.unwrap_or_default(),
			model: req.model.clone(),
			..Default::default()
		};
		let futures = req
			.queries
			.iter()
			.map(|query| self.rewritten_single(query, req.context.as_ref(), top_k, &opts));

		Ok(future::join_all(futures).await)
	}

	async fn rewritten_single(
		&self,
		original: &str,
		context: Option<&RewriteContext>,
		top_k: u32,
		opts: &GenerateOptions,
	) -> RewrittenQueryResult {
		match self.rewrite_and_query(original, context, top_k, opts).await {
			Ok((rewritten_query, matches)) => RewrittenQueryResult {
				original_query: original.to_string(),
				rewritten_query,
				vector_results: VectorResults { matches },
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					query = original,
					"Rewrite pipeline failed. Falling back to the original query."
				);

				self.fallback_single(original, top_k).await
			},
		}
	}

	async fn rewrite_and_query(
		&self,
		original: &str,
		context: Option<&RewriteContext>,
		top_k: u32,
		opts: &GenerateOptions,
	) -> Result<(String, Vec<VectorMatch>)> {
		let rewritten =
			self.providers.rewrite.rewrite(&self.cfg.ai, original, context, opts).await?;
		let matches = self.embed_and_query(&rewritten, top_k).await?;

		Ok((rewritten, matches))
	}

	async fn fallback_single(&self, original: &str, top_k: u32) -> RewrittenQueryResult {
		let matches = match self.embed_and_query(original, top_k).await {
			Ok(matches) => matches,
			Err(err) => {
				self.signals.record(
					SignalKind::Error,
					format!("Rewritten search query degraded to empty results: {err}"),
				);

				Vec::new()
			},
		};

		RewrittenQueryResult {
			original_query: original.to_string(),
			rewritten_query: original.to_string(),
			vector_results: VectorResults { matches },
		}
	}

	async fn embed_and_query(&self, text: &str, top_k: u32) -> Result<Vec<VectorMatch>> {
		let embedding = self.providers.embedding.embed(&self.cfg.ai, text).await?;

		self.vector.query(&embedding, top_k).await.map_err(Into::into)
	}
}
