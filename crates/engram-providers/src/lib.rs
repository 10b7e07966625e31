//! Provider-agnostic AI gateway: text generation, structured generation,
//! embeddings, and query rewriting over the edge, Gemini, and OpenAI
//! backends.
//!
//! Each backend module owns its default model constants and its response
//! parsing; parsing is kept in pure functions so it is testable without a
//! network. Errors carry the HTTP status so callers can classify transient
//! against permanent failures; retry policy lives with the callers.

pub mod edge;
pub mod gemini;
pub mod openai;

mod error;
mod rewrite;
mod sanitize;

pub use error::{Error, Result, retryable_status};
pub use rewrite::{RewriteContext, rewrite_prompt, rewrite_question};
pub use sanitize::sanitize;

use std::{str::FromStr, time::Duration};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use engram_config::{Ai, AiBackend};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
	#[default]
	Edge,
	Gemini,
	OpenAi,
}
impl Provider {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Edge => "edge",
			Self::Gemini => "gemini",
			Self::OpenAi => "openai",
		}
	}
}
impl FromStr for Provider {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"edge" => Ok(Self::Edge),
			"gemini" => Ok(Self::Gemini),
			"openai" => Ok(Self::OpenAi),
			other => Err(Error::UnknownProvider(other.to_string())),
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
	Low,
	#[default]
	Medium,
	High,
}
impl ReasoningEffort {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Low => "low",
			Self::Medium => "medium",
			Self::High => "high",
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct GenerateOptions {
	pub provider: Provider,
	pub model: Option<String>,
	pub reasoning_effort: ReasoningEffort,
	pub sanitize: bool,
}

pub async fn generate_text(
	cfg: &Ai,
	prompt: &str,
	system: Option<&str>,
	opts: &GenerateOptions,
) -> Result<String> {
	let text = match opts.provider {
		Provider::Edge => edge::generate_text(cfg, prompt, system, opts).await?,
		Provider::Gemini => gemini::generate_text(&cfg.gemini, prompt, system, opts).await?,
		Provider::OpenAi => openai::generate_text(&cfg.openai, prompt, system, opts).await?,
	};

	if opts.sanitize { Ok(sanitize(&text)) } else { Ok(text) }
}

/// Returns an instance conforming to `schema` (a JSON Schema). The edge
/// backend runs a two-step reason-then-structure pipeline; Gemini and OpenAI
/// use their native schema-constrained decoding in a single step.
pub async fn generate_structured(
	cfg: &Ai,
	prompt: &str,
	schema: &Value,
	opts: &GenerateOptions,
) -> Result<Value> {
	match opts.provider {
		Provider::Edge => edge::generate_structured(cfg, prompt, schema, opts).await,
		Provider::Gemini => gemini::generate_structured(&cfg.gemini, prompt, schema, opts).await,
		Provider::OpenAi => openai::generate_structured(&cfg.openai, prompt, schema, opts).await,
	}
}

/// Embeddings always come from the edge backend so the vector space stays
/// stable for the lifetime of an index.
pub async fn generate_embeddings(cfg: &Ai, text: &str) -> Result<Vec<f32>> {
	edge::embed(cfg, text).await
}

pub(crate) fn http_client(backend: &AiBackend) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(backend.timeout_ms)).build()?)
}

pub(crate) fn require_key<'a>(
	backend: &'a AiBackend,
	provider: &'static str,
) -> Result<&'a str> {
	backend
		.api_key
		.as_deref()
		.filter(|key| !key.trim().is_empty())
		.ok_or(Error::MissingCredentials { provider })
}

pub(crate) async fn read_json(res: reqwest::Response) -> Result<Value> {
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Status { status: status.as_u16(), body });
	}

	Ok(res.json().await?)
}

/// Final parse step shared by every structured path: parse, on failure
/// sanitize and parse once more, then give up.
pub(crate) fn parse_structured(raw: &str) -> Result<Value> {
	if let Ok(value) = serde_json::from_str(raw) {
		return Ok(value);
	}

	let repaired = sanitize(raw);

	serde_json::from_str(&repaired).map_err(|_| {
		tracing::debug!(payload = raw, "Structured output failed to parse after sanitize.");

		Error::StructuredGeneration { payload: raw.to_string() }
	})
}
