//! OpenAI backend over chat completions. Structured output uses the native
//! strict `json_schema` response format in a single step.

use serde_json::{Value, json};

use engram_config::AiBackend;

use crate::{GenerateOptions, Result, edge};

const TEXT_MODEL: &str = "gpt-4o-mini";

pub async fn generate_text(
	backend: &AiBackend,
	prompt: &str,
	system: Option<&str>,
	opts: &GenerateOptions,
) -> Result<String> {
	let body = request_body(backend, prompt, system, None, opts);
	let json = post_chat(backend, &body).await?;

	edge::message_content(&json)
}

pub async fn generate_structured(
	backend: &AiBackend,
	prompt: &str,
	schema: &Value,
	opts: &GenerateOptions,
) -> Result<Value> {
	let body = request_body(backend, prompt, None, Some(schema), opts);
	let json = post_chat(backend, &body).await?;
	let raw = edge::message_content(&json)?;

	crate::parse_structured(&raw)
}

async fn post_chat(backend: &AiBackend, body: &Value) -> Result<Value> {
	let key = crate::require_key(backend, "openai")?;
	let client = crate::http_client(backend)?;
	let url = format!("{}/v1/chat/completions", backend.api_base);
	let res = client.post(url).bearer_auth(key).json(body).send().await?;

	crate::read_json(res).await
}

fn request_body(
	backend: &AiBackend,
	prompt: &str,
	system: Option<&str>,
	schema: Option<&Value>,
	opts: &GenerateOptions,
) -> Value {
	let model = opts.model.as_deref().or(backend.model.as_deref()).unwrap_or(TEXT_MODEL);
	let mut messages = Vec::with_capacity(2);

	if let Some(system) = system {
		messages.push(json!({ "role": "system", "content": system }));
	}

	messages.push(json!({ "role": "user", "content": prompt }));

	let mut body = json!({
		"model": model,
		"messages": messages,
	});

	// Only reasoning models accept the effort knob; it rides on an explicit
	// model override rather than the chat default.
	if opts.model.is_some() {
		body["reasoning_effort"] = json!(opts.reasoning_effort.as_str());
	}
	if let Some(schema) = schema {
		body["response_format"] = json!({
			"type": "json_schema",
			"json_schema": {
				"name": "structured_output",
				"strict": true,
				"schema": schema,
			},
		});
	}

	body
}
