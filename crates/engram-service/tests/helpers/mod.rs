//! Shared scaffolding for the acceptance tests: config builders, stub
//! providers with controllable embeddings and failure injection, and a
//! helper that drains the ingest queue the way the worker does.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::{
	collections::{HashMap, HashSet},
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use uuid::Uuid;

use engram_config::{Ai, AiBackend, Config, Memory, Postgres, Qdrant, Queue, Service, Storage};
use engram_providers::{GenerateOptions, RewriteContext};
use engram_service::{
	BoxFuture, EmbeddingProvider, EngramService, Error, GenerationProvider, Providers, Result,
	RewriteProvider,
};
use engram_storage::{db::Db, models::Envelope, queue, vector::VectorStore};
use engram_testkit::TestDatabase;

pub const TEST_DIM: u32 = 8;

pub async fn test_env(test_name: &str) -> Option<(TestDatabase, String, String)> {
	let Some(base_dsn) = engram_testkit::env_dsn() else {
		eprintln!("Skipping {test_name}; set ENGRAM_PG_DSN to run this test.");

		return None;
	};
	let Some(qdrant_url) = engram_testkit::env_qdrant_url() else {
		eprintln!("Skipping {test_name}; set ENGRAM_QDRANT_URL to run this test.");

		return None;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let collection = test_db.collection_name("engram_acceptance");

	Some((test_db, qdrant_url, collection))
}

pub fn test_config(dsn: String, qdrant_url: String, collection: String) -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres { dsn, pool_max_conns: 2 },
			qdrant: Qdrant { url: qdrant_url, collection, vector_dim: TEST_DIM },
		},
		queue: Queue::default(),
		memory: Memory::default(),
		ai: Ai {
			gateway_url: None,
			edge: disabled_backend(),
			gemini: disabled_backend(),
			openai: disabled_backend(),
		},
	}
}

fn disabled_backend() -> AiBackend {
	AiBackend {
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: None,
		model: None,
		embedding_model: None,
		timeout_ms: 1_000,
	}
}

pub async fn build_service(cfg: Config, providers: Providers) -> EngramService {
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to apply schema.");

	let vector = VectorStore::new(&cfg.storage.qdrant).expect("Failed to build vector store.");

	vector.ensure_collection().await.expect("Failed to create collection.");

	EngramService::with_providers(cfg, db, vector, providers)
}

/// Unit vector along one axis.
pub fn axis_vector(axis: usize) -> Vec<f32> {
	let mut v = vec![0.0; TEST_DIM as usize];

	v[axis % TEST_DIM as usize] = 1.0;

	v
}

/// Normalized vector near `axis_vector(axis)`; cosine similarity to it is
/// `1 / sqrt(1 + eps^2)`, i.e. ~0.995 for eps = 0.1.
pub fn near_axis_vector(axis: usize, eps: f32) -> Vec<f32> {
	let mut v = vec![0.0; TEST_DIM as usize];

	v[axis % TEST_DIM as usize] = 1.0;
	v[(axis + 1) % TEST_DIM as usize] = eps;

	let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();

	v.iter_mut().for_each(|x| *x /= norm);

	v
}

/// Embedding stub with per-text vector assignments, deterministic fallback
/// vectors, per-text failure injection, and a global transient-failure
/// countdown for retry tests.
pub struct MapEmbedding {
	assignments: Mutex<HashMap<String, Vec<f32>>>,
	fail_texts: Mutex<HashSet<String>>,
	transient_failures: AtomicUsize,
	pub calls: AtomicUsize,
}
impl MapEmbedding {
	pub fn new() -> Self {
		Self {
			assignments: Mutex::new(HashMap::new()),
			fail_texts: Mutex::new(HashSet::new()),
			transient_failures: AtomicUsize::new(0),
			calls: AtomicUsize::new(0),
		}
	}

	pub fn assign(&self, text: &str, vector: Vec<f32>) {
		self.assignments.lock().unwrap().insert(text.to_string(), vector);
	}

	pub fn fail_on(&self, text: &str) {
		self.fail_texts.lock().unwrap().insert(text.to_string());
	}

	pub fn inject_transient_failures(&self, count: usize) {
		self.transient_failures.store(count, Ordering::SeqCst);
	}

	fn vector_for(&self, text: &str) -> Vec<f32> {
		if let Some(vector) = self.assignments.lock().unwrap().get(text) {
			return vector.clone();
		}

		// Unassigned texts land on a hash-derived axis so distinct texts are
		// usually orthogonal.
		let axis = text.bytes().fold(0_usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));

		axis_vector(axis)
	}
}
impl EmbeddingProvider for MapEmbedding {
	fn embed<'a>(&'a self, _cfg: &'a Ai, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let injected = self
			.transient_failures
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok();
		let failing = self.fail_texts.lock().unwrap().contains(text);
		let result = if injected {
			Err(Error::Provider { message: "Injected transient failure.".to_string(), transient: true })
		} else if failing {
			Err(Error::Provider { message: "Embedding backend unreachable.".to_string(), transient: true })
		} else {
			Ok(self.vector_for(text))
		};

		Box::pin(async move { result })
	}
}

pub struct StaticGeneration {
	pub response: String,
	pub calls: AtomicUsize,
}
impl StaticGeneration {
	pub fn new(response: &str) -> Self {
		Self { response: response.to_string(), calls: AtomicUsize::new(0) }
	}
}
impl GenerationProvider for StaticGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a Ai,
		_prompt: &'a str,
		_system: Option<&'a str>,
		_opts: &'a GenerateOptions,
	) -> BoxFuture<'a, Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { Ok(self.response.clone()) })
	}
}

/// Rewrites `q` to `expanded q`; queries in the fail set error instead.
pub struct EchoRewrite {
	fail_queries: Mutex<HashSet<String>>,
}
impl EchoRewrite {
	pub fn new() -> Self {
		Self { fail_queries: Mutex::new(HashSet::new()) }
	}

	pub fn fail_on(&self, query: &str) {
		self.fail_queries.lock().unwrap().insert(query.to_string());
	}
}
impl RewriteProvider for EchoRewrite {
	fn rewrite<'a>(
		&'a self,
		_cfg: &'a Ai,
		query: &'a str,
		_context: Option<&'a RewriteContext>,
		_opts: &'a GenerateOptions,
	) -> BoxFuture<'a, Result<String>> {
		let result = if self.fail_queries.lock().unwrap().contains(query) {
			Err(Error::Provider { message: "Rewrite backend unreachable.".to_string(), transient: true })
		} else {
			Ok(format!("expanded {query}"))
		};

		Box::pin(async move { result })
	}
}

pub fn envelope(text: &str, timestamp: i64, tags: &[&str]) -> Envelope {
	Envelope {
		version: engram_storage::models::ENVELOPE_VERSION,
		text: text.to_string(),
		context_tags: tags.iter().map(ToString::to_string).collect(),
		timestamp,
		source_app: Some("acceptance".to_string()),
		session_id: None,
	}
}

/// Drives the queue the way the worker does: claim, process, ack or mark
/// failed. Returns the ids of successfully processed memories.
pub async fn drain_queue(svc: &EngramService) -> Vec<Uuid> {
	let mut processed = Vec::new();

	loop {
		let Some(job) =
			queue::claim_next(&svc.db, svc.cfg.queue.lease_seconds).await.expect("Claim failed.")
		else {
			break;
		};
		let envelope = job.envelope().expect("Envelope decode failed.");

		match svc.process_envelope(&envelope).await {
			Ok(id) => {
				queue::mark_done(&svc.db, job.queue_id).await.expect("Ack failed.");
				processed.push(id);
			},
			Err(err) => {
				queue::mark_failed(&svc.db, job.queue_id, job.attempts, &err.to_string())
					.await
					.expect("Mark failed failed.");
			},
		}
	}

	processed
}
