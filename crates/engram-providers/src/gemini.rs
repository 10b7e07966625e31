//! Gemini backend over the `generateContent` REST API. Structured output
//! uses the native `responseJsonSchema` constraint in a single step.

use serde_json::{Value, json};

use engram_config::AiBackend;

use crate::{Error, GenerateOptions, Result};

const TEXT_MODEL: &str = "gemini-2.0-flash";

pub async fn generate_text(
	backend: &AiBackend,
	prompt: &str,
	system: Option<&str>,
	opts: &GenerateOptions,
) -> Result<String> {
	let body = request_body(prompt, system, None);
	let json = post_generate(backend, model(backend, opts), &body).await?;

	candidate_text(&json)
}

pub async fn generate_structured(
	backend: &AiBackend,
	prompt: &str,
	schema: &Value,
	opts: &GenerateOptions,
) -> Result<Value> {
	let body = request_body(prompt, None, Some(schema));
	let json = post_generate(backend, model(backend, opts), &body).await?;
	let raw = candidate_text(&json)?;

	crate::parse_structured(&raw)
}

fn model<'a>(backend: &'a AiBackend, opts: &'a GenerateOptions) -> &'a str {
	opts.model.as_deref().or(backend.model.as_deref()).unwrap_or(TEXT_MODEL)
}

async fn post_generate(backend: &AiBackend, model: &str, body: &Value) -> Result<Value> {
	let key = crate::require_key(backend, "gemini")?;
	let client = crate::http_client(backend)?;
	let url = format!("{}/v1beta/models/{model}:generateContent", backend.api_base);
	let res = client.post(url).header("x-goog-api-key", key).json(body).send().await?;

	crate::read_json(res).await
}

fn request_body(prompt: &str, system: Option<&str>, schema: Option<&Value>) -> Value {
	let mut body = json!({
		"contents": [
			{ "role": "user", "parts": [{ "text": prompt }] }
		],
	});

	if let Some(system) = system {
		body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
	}
	if let Some(schema) = schema {
		body["generationConfig"] = json!({
			"responseMimeType": "application/json",
			"responseJsonSchema": schema,
		});
	}

	body
}

pub(crate) fn candidate_text(json: &Value) -> Result<String> {
	let parts = json
		.get("candidates")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|candidate| candidate.get("content"))
		.and_then(|content| content.get("parts"))
		.and_then(|v| v.as_array())
		.ok_or(Error::EmptyResponse)?;
	let text = parts
		.iter()
		.filter_map(|part| part.get("text").and_then(|v| v.as_str()))
		.collect::<Vec<_>>()
		.join("");

	if text.is_empty() { Err(Error::EmptyResponse) } else { Ok(text) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn joins_candidate_parts() {
		let json = serde_json::json!({
			"candidates": [{
				"content": { "parts": [{ "text": "foo " }, { "text": "bar" }] }
			}]
		});

		assert_eq!(candidate_text(&json).unwrap(), "foo bar");
	}

	#[test]
	fn empty_candidates_is_empty_response() {
		let json = serde_json::json!({ "candidates": [] });

		assert!(matches!(candidate_text(&json), Err(Error::EmptyResponse)));
	}

	#[test]
	fn request_body_carries_schema_constraint() {
		let schema = serde_json::json!({ "type": "object" });
		let body = request_body("q", Some("sys"), Some(&schema));

		assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
		assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
		assert_eq!(body["generationConfig"]["responseJsonSchema"]["type"], "object");
	}
}
