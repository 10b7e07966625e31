//! Query rewriting: reformulate a natural-language question into a more
//! retrieval-friendly form, optionally steered by structured caller context.

use serde::{Deserialize, Serialize};

use engram_config::Ai;

use crate::{Error, GenerateOptions, Result};

const REWRITE_SYSTEM: &str = "You rewrite questions so a semantic memory search finds the most \
                              relevant results. Respond with the rewritten question only.";

/// Context a caller can attach to steer the rewrite. All fields optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteContext {
	#[serde(default)]
	pub bindings: Vec<String>,
	#[serde(default)]
	pub libraries: Vec<String>,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub code_snippets: Vec<String>,
}
impl RewriteContext {
	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
			&& self.libraries.is_empty()
			&& self.tags.is_empty()
			&& self.code_snippets.is_empty()
	}
}

pub async fn rewrite_question(
	cfg: &Ai,
	query: &str,
	context: Option<&RewriteContext>,
	opts: &GenerateOptions,
) -> Result<String> {
	let prompt = rewrite_prompt(query, context);
	let text = crate::generate_text(cfg, &prompt, Some(REWRITE_SYSTEM), opts).await?;
	let rewritten = text.trim().trim_matches('"').trim();

	if rewritten.is_empty() {
		return Err(Error::EmptyResponse);
	}

	Ok(rewritten.to_string())
}

pub fn rewrite_prompt(query: &str, context: Option<&RewriteContext>) -> String {
	let mut prompt = format!("Rewrite this question for semantic search:\n{query}");
	let Some(context) = context.filter(|ctx| !ctx.is_empty()) else {
		return prompt;
	};

	prompt.push_str("\n\nContext:");

	push_section(&mut prompt, "Bindings", &context.bindings);
	push_section(&mut prompt, "Libraries", &context.libraries);
	push_section(&mut prompt, "Tags", &context.tags);

	if !context.code_snippets.is_empty() {
		prompt.push_str("\nCode snippets:");

		for snippet in &context.code_snippets {
			prompt.push_str("\n```\n");
			prompt.push_str(snippet);
			prompt.push_str("\n```");
		}
	}

	prompt
}

fn push_section(prompt: &mut String, label: &str, items: &[String]) {
	if items.is_empty() {
		return;
	}

	prompt.push('\n');
	prompt.push_str(label);
	prompt.push_str(": ");
	prompt.push_str(&items.join(", "));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bare_prompt_without_context() {
		let prompt = rewrite_prompt("coffee habits", None);

		assert!(prompt.contains("coffee habits"));
		assert!(!prompt.contains("Context:"));
	}

	#[test]
	fn empty_context_is_ignored() {
		let prompt = rewrite_prompt("q", Some(&RewriteContext::default()));

		assert!(!prompt.contains("Context:"));
	}

	#[test]
	fn context_sections_appear_when_present() {
		let context = RewriteContext {
			bindings: vec!["vector-index".to_string()],
			libraries: vec!["serde".to_string(), "sqlx".to_string()],
			tags: vec![],
			code_snippets: vec!["fn main() {}".to_string()],
		};
		let prompt = rewrite_prompt("q", Some(&context));

		assert!(prompt.contains("Bindings: vector-index"));
		assert!(prompt.contains("Libraries: serde, sqlx"));
		assert!(!prompt.contains("Tags:"));
		assert!(prompt.contains("fn main() {}"));
	}

	#[test]
	fn context_deserializes_camel_case() {
		let context: RewriteContext = serde_json::from_str(
			r#"{ "codeSnippets": ["let x = 1;"], "tags": ["rust"] }"#,
		)
		.unwrap();

		assert_eq!(context.code_snippets.len(), 1);
		assert_eq!(context.tags[0], "rust");
	}
}
