//! Edge backend: an OpenAI-compatible inference endpoint close to the
//! workload, used for embeddings and as the default text provider. Calls can
//! be routed through an AI gateway prefix when one is configured.

use serde_json::{Value, json};

use engram_config::Ai;

use crate::{Error, GenerateOptions, Result};

const TEXT_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";
const REASONING_MODEL: &str = "@cf/deepseek-ai/deepseek-r1-distill-qwen-32b";
const STRUCTURING_MODEL: &str = "@cf/meta/llama-3.3-70b-instruct-fp8-fast";
const EMBEDDING_MODEL: &str = "@cf/baai/bge-base-en-v1.5";

const REASONING_SYSTEM: &str = "Analyze comprehensively.";
const STRUCTURING_SYSTEM: &str = "Return only JSON matching the requested schema.";

pub async fn generate_text(
	cfg: &Ai,
	prompt: &str,
	system: Option<&str>,
	opts: &GenerateOptions,
) -> Result<String> {
	let model = opts.model.as_deref().or(cfg.edge.model.as_deref()).unwrap_or(TEXT_MODEL);
	let body = json!({
		"model": model,
		"messages": chat_messages(system, prompt),
	});
	let json = post_chat(cfg, &body).await?;

	message_content(&json)
}

/// Two-step structured pipeline: a reasoning-oriented model works the prompt
/// over in free text, then a schema-adherent model condenses that analysis
/// under strict JSON-schema decoding.
pub async fn generate_structured(
	cfg: &Ai,
	prompt: &str,
	schema: &Value,
	opts: &GenerateOptions,
) -> Result<Value> {
	let reasoning_model = opts.model.as_deref().unwrap_or(REASONING_MODEL);
	let reasoning_body = json!({
		"model": reasoning_model,
		"messages": chat_messages(Some(REASONING_SYSTEM), prompt),
	});
	let reasoning = message_content(&post_chat(cfg, &reasoning_body).await?)?;

	let structuring_body = json!({
		"model": STRUCTURING_MODEL,
		"messages": chat_messages(Some(STRUCTURING_SYSTEM), &reasoning),
		"response_format": {
			"type": "json_schema",
			"json_schema": {
				"name": "structured_output",
				"strict": true,
				"schema": schema,
			},
		},
	});
	let raw = message_content(&post_chat(cfg, &structuring_body).await?)?;

	crate::parse_structured(&raw)
}

pub async fn embed(cfg: &Ai, text: &str) -> Result<Vec<f32>> {
	let backend = &cfg.edge;
	let key = crate::require_key(backend, "edge")?;
	let client = crate::http_client(backend)?;
	let model = backend.embedding_model.as_deref().unwrap_or(EMBEDDING_MODEL);
	let url = format!("{}/v1/embeddings", base_url(cfg));
	let body = json!({
		"model": model,
		"input": [text],
	});
	let res = client.post(url).bearer_auth(key).json(&body).send().await?;
	let json = crate::read_json(res).await?;
	let mut vectors = parse_embedding_response(&json)?;

	if vectors.is_empty() {
		return Err(Error::EmptyResponse);
	}

	Ok(vectors.swap_remove(0))
}

async fn post_chat(cfg: &Ai, body: &Value) -> Result<Value> {
	let backend = &cfg.edge;
	let key = crate::require_key(backend, "edge")?;
	let client = crate::http_client(backend)?;
	let url = format!("{}/v1/chat/completions", base_url(cfg));
	let res = client.post(url).bearer_auth(key).json(body).send().await?;

	crate::read_json(res).await
}

fn base_url(cfg: &Ai) -> &str {
	cfg.edge_base()
}

fn chat_messages(system: Option<&str>, prompt: &str) -> Vec<Value> {
	let mut messages = Vec::with_capacity(2);

	if let Some(system) = system {
		messages.push(json!({ "role": "system", "content": system }));
	}

	messages.push(json!({ "role": "user", "content": prompt }));

	messages
}

pub(crate) fn message_content(json: &Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|content| content.as_str())
		.map(ToString::to_string)
		.ok_or(Error::EmptyResponse)
}

pub(crate) fn parse_embedding_response(json: &Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or(Error::EmptyResponse)?;
	let mut indexed = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding =
			item.get("embedding").and_then(|v| v.as_array()).ok_or(Error::EmptyResponse)?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or(Error::EmptyResponse)?;

			vec.push(number as f32);
		}

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_message_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "hello" } }
			]
		});

		assert_eq!(message_content(&json).unwrap(), "hello");
	}

	#[test]
	fn missing_content_is_empty_response() {
		let json = serde_json::json!({ "choices": [] });

		assert!(matches!(message_content(&json), Err(Error::EmptyResponse)));
	}

	#[test]
	fn parses_embeddings_in_index_order() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		});
		let parsed = parse_embedding_response(&json).expect("parse failed");

		assert_eq!(parsed.len(), 2);
		assert_eq!(parsed[0], vec![0.5, 1.5]);
		assert_eq!(parsed[1], vec![2.0, 3.0]);
	}

	#[test]
	fn chat_messages_include_system_when_present() {
		let messages = chat_messages(Some("sys"), "hi");

		assert_eq!(messages.len(), 2);
		assert_eq!(messages[0]["role"], "system");
		assert_eq!(messages[1]["content"], "hi");
	}
}
