//! Core memory pipeline: ingestion front door and envelope processing,
//! retrieval (basic and rewritten), the consolidation curator, and the
//! signal log.
//!
//! AI calls go through narrow provider traits so tests can substitute stubs;
//! the default implementations delegate to `engram-providers`.

pub mod curator;
pub mod ingest;
pub mod rewrite;
pub mod search;
pub mod signal;

mod error;

pub use self::{
	curator::CuratorReport,
	error::{Error, Result},
	ingest::{SubmitAck, SubmitRequest},
	rewrite::{RewrittenQueryResult, RewrittenSearchRequest, VectorResults},
	search::SearchItem,
	signal::{SignalEntry, SignalKind, SignalLog},
};

use std::{future::Future, pin::Pin, sync::Arc};

use time::OffsetDateTime;

use engram_config::{Ai, Config};
use engram_providers::{GenerateOptions, RewriteContext};
use engram_storage::{db::Db, vector::VectorStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, cfg: &'a Ai, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a Ai,
		prompt: &'a str,
		system: Option<&'a str>,
		opts: &'a GenerateOptions,
	) -> BoxFuture<'a, Result<String>>;
}

pub trait RewriteProvider
where
	Self: Send + Sync,
{
	fn rewrite<'a>(
		&'a self,
		cfg: &'a Ai,
		query: &'a str,
		context: Option<&'a RewriteContext>,
		opts: &'a GenerateOptions,
	) -> BoxFuture<'a, Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generation: Arc<dyn GenerationProvider>,
	pub rewrite: Arc<dyn RewriteProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		generation: Arc<dyn GenerationProvider>,
		rewrite: Arc<dyn RewriteProvider>,
	) -> Self {
		Self { embedding, generation, rewrite }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), generation: provider.clone(), rewrite: provider }
	}
}

pub struct EngramService {
	pub cfg: Config,
	pub db: Db,
	pub vector: VectorStore,
	pub providers: Providers,
	pub signals: SignalLog,
}
impl EngramService {
	pub fn new(cfg: Config, db: Db, vector: VectorStore) -> Self {
		Self::with_providers(cfg, db, vector, Providers::default())
	}

	pub fn with_providers(cfg: Config, db: Db, vector: VectorStore, providers: Providers) -> Self {
		Self { cfg, db, vector, providers, signals: SignalLog::new() }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(&'a self, cfg: &'a Ai, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(engram_providers::generate_embeddings(cfg, text).await?) })
	}
}
impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a Ai,
		prompt: &'a str,
		system: Option<&'a str>,
		opts: &'a GenerateOptions,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(engram_providers::generate_text(cfg, prompt, system, opts).await?) })
	}
}
impl RewriteProvider for DefaultProviders {
	fn rewrite<'a>(
		&'a self,
		cfg: &'a Ai,
		query: &'a str,
		context: Option<&'a RewriteContext>,
		opts: &'a GenerateOptions,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(
			async move { Ok(engram_providers::rewrite_question(cfg, query, context, opts).await?) },
		)
	}
}

pub fn now_ms() -> i64 {
	(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
