//! Engram configuration: TOML file, environment overrides, validation.

mod types;

use std::{env, fs, path::Path};

use color_eyre::eyre;

pub use types::{Ai, AiBackend, Config, Memory, Postgres, Qdrant, Queue, Service, Storage};

/// Embedding model widths the validator knows about. Other models are
/// accepted as long as the configured `vector_dim` matches what the provider
/// actually returns, which the worker checks per vector.
const KNOWN_EMBEDDING_WIDTHS: &[(&str, u32)] = &[
	("@cf/baai/bge-base-en-v1.5", 768),
	("@cf/baai/bge-large-en-v1.5", 1024),
	("@cf/baai/bge-m3", 1024),
];

pub fn load(path: &Path) -> color_eyre::Result<Config> {
	let raw = fs::read_to_string(path)?;

	let mut cfg: Config = toml::from_str(&raw)?;

	apply_env_overrides(&mut cfg, |key| env::var(key).ok());

	validate(&cfg)?;

	Ok(cfg)
}

/// Environment variables take precedence over file values, so deployments can
/// inject secrets and tuning without editing the config file.
pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F)
where
	F: Fn(&str) -> Option<String>,
{
	if let Some(raw) = lookup("SIMILARITY_THRESHOLD")
		&& let Ok(threshold) = raw.trim().parse::<f32>()
	{
		cfg.memory.similarity_threshold = threshold;
	}
	if let Some(key) = lookup("EDGE_API_KEY") {
		cfg.ai.edge.api_key = Some(key);
	}
	if let Some(key) = lookup("GEMINI_API_KEY") {
		cfg.ai.gemini.api_key = Some(key);
	}
	if let Some(key) = lookup("OPENAI_API_KEY") {
		cfg.ai.openai.api_key = Some(key);
	}
	if let Some(url) = lookup("AI_GATEWAY_URL") {
		cfg.ai.gateway_url = Some(url);
	}
}

pub fn validate(cfg: &Config) -> color_eyre::Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(eyre::eyre!("service.http_bind must be non-empty."));
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(eyre::eyre!("storage.postgres.dsn must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(eyre::eyre!("storage.postgres.pool_max_conns must be greater than zero."));
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(eyre::eyre!("storage.qdrant.collection must be non-empty."));
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(eyre::eyre!("storage.qdrant.vector_dim must be greater than zero."));
	}
	if cfg.queue.poll_interval_ms == 0 {
		return Err(eyre::eyre!("queue.poll_interval_ms must be greater than zero."));
	}
	if cfg.queue.lease_seconds <= 0 {
		return Err(eyre::eyre!("queue.lease_seconds must be greater than zero."));
	}
	if !(0.0..=1.0).contains(&cfg.memory.similarity_threshold)
		|| cfg.memory.similarity_threshold == 0.0
	{
		return Err(eyre::eyre!("memory.similarity_threshold must be in (0.0, 1.0]."));
	}
	if cfg.memory.top_k == 0 {
		return Err(eyre::eyre!("memory.top_k must be greater than zero."));
	}
	if cfg.memory.curator_batch == 0 {
		return Err(eyre::eyre!("memory.curator_batch must be greater than zero."));
	}
	if cfg.memory.curator_max_consolidations == 0 {
		return Err(eyre::eyre!("memory.curator_max_consolidations must be greater than zero."));
	}
	if cfg.memory.curator_deadline_seconds == 0 {
		return Err(eyre::eyre!("memory.curator_deadline_seconds must be greater than zero."));
	}

	if let Some(model) = cfg.ai.edge.embedding_model.as_deref()
		&& let Some(width) = known_embedding_width(model)
		&& width != cfg.storage.qdrant.vector_dim
	{
		return Err(eyre::eyre!(
			"ai.edge.embedding_model {model} produces {width}-dimensional vectors but storage.qdrant.vector_dim is {}.",
			cfg.storage.qdrant.vector_dim
		));
	}

	for (label, backend) in
		[("edge", &cfg.ai.edge), ("gemini", &cfg.ai.gemini), ("openai", &cfg.ai.openai)]
	{
		if backend.api_base.trim().is_empty() {
			return Err(eyre::eyre!("ai.{label}.api_base must be non-empty."));
		}
		if backend.timeout_ms == 0 {
			return Err(eyre::eyre!("ai.{label}.timeout_ms must be greater than zero."));
		}
	}

	Ok(())
}

pub fn known_embedding_width(model: &str) -> Option<u32> {
	KNOWN_EMBEDDING_WIDTHS
		.iter()
		.find(|(known, _)| *known == model)
		.map(|(_, width)| *width)
}
