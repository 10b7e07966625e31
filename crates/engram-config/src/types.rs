use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub queue: Queue,
	#[serde(default)]
	pub memory: Memory,
	pub ai: Ai,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Queue {
	pub poll_interval_ms: u64,
	pub lease_seconds: i64,
}
impl Default for Queue {
	fn default() -> Self {
		Self { poll_interval_ms: 500, lease_seconds: 30 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Memory {
	pub similarity_threshold: f32,
	pub top_k: u32,
	pub curator_batch: u32,
	pub curator_max_consolidations: u32,
	pub curator_deadline_seconds: u64,
	pub curator_interval_seconds: u64,
}
impl Default for Memory {
	fn default() -> Self {
		Self {
			similarity_threshold: 0.92,
			top_k: 10,
			curator_batch: 20,
			curator_max_consolidations: 10,
			curator_deadline_seconds: 60,
			curator_interval_seconds: 86_400,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Ai {
	/// Optional URL prefix routing edge calls through an AI gateway proxy.
	pub gateway_url: Option<String>,
	pub edge: AiBackend,
	pub gemini: AiBackend,
	pub openai: AiBackend,
}
impl Ai {
	/// Base URL for edge calls, honoring the optional gateway prefix.
	pub fn edge_base(&self) -> &str {
		self.gateway_url
			.as_deref()
			.filter(|url| !url.trim().is_empty())
			.unwrap_or(self.edge.api_base.as_str())
	}
}

/// One AI backend. A missing or empty `api_key` disables the backend;
/// calls dispatched to it fail without retry.
#[derive(Clone, Debug, Deserialize)]
pub struct AiBackend {
	pub api_base: String,
	#[serde(default)]
	pub api_key: Option<String>,
	/// Overrides the backend's built-in default text model.
	#[serde(default)]
	pub model: Option<String>,
	/// Overrides the built-in default embedding model (edge only).
	#[serde(default)]
	pub embedding_model: Option<String>,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
}
impl AiBackend {
	pub fn enabled(&self) -> bool {
		self.api_key.as_deref().map(|key| !key.trim().is_empty()).unwrap_or(false)
	}
}

fn default_timeout_ms() -> u64 {
	30_000
}
