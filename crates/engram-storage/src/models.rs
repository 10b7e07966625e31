use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle of a memory row. `Raw` rows are curator candidates;
/// `Consolidated` rows are merge survivors; `Processed` rows were examined
/// and found to have no near-duplicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
	Raw,
	Consolidated,
	Processed,
}
impl MemoryStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Raw => "raw",
			Self::Consolidated => "consolidated",
			Self::Processed => "processed",
		}
	}
}
impl FromStr for MemoryStatus {
	type Err = crate::Error;

	fn from_str(raw: &str) -> crate::Result<Self> {
		match raw {
			"raw" => Ok(Self::Raw),
			"consolidated" => Ok(Self::Consolidated),
			"processed" => Ok(Self::Processed),
			other => Err(crate::Error::InvalidArgument(format!("Unknown memory status: {other}."))),
		}
	}
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MemoryRecord {
	pub id: Uuid,
	pub text: String,
	/// JSON array of strings; stored as JSONB.
	pub tags: Value,
	pub source_app: Option<String>,
	pub session_id: Option<String>,
	pub status: String,
	pub created_at: i64,
	pub updated_at: i64,
}
impl MemoryRecord {
	pub fn tag_list(&self) -> Vec<String> {
		self.tags
			.as_array()
			.map(|items| {
				items.iter().filter_map(|v| v.as_str()).map(ToString::to_string).collect()
			})
			.unwrap_or_default()
	}
}

/// Immutable unit placed on the ingest queue. `version` exists for forward
/// compatibility of the payload format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
	#[serde(default = "default_envelope_version")]
	pub version: i32,
	pub text: String,
	#[serde(default)]
	pub context_tags: Vec<String>,
	/// Epoch millis stamped by the front door.
	pub timestamp: i64,
	#[serde(default)]
	pub source_app: Option<String>,
	#[serde(default)]
	pub session_id: Option<String>,
}

pub const ENVELOPE_VERSION: i32 = 1;

fn default_envelope_version() -> i32 {
	ENVELOPE_VERSION
}

#[derive(Debug, sqlx::FromRow)]
pub struct QueueJob {
	pub queue_id: Uuid,
	pub payload: Value,
	pub attempts: i32,
	pub available_at: OffsetDateTime,
}
impl QueueJob {
	pub fn envelope(&self) -> crate::Result<Envelope> {
		Ok(serde_json::from_value(self.payload.clone())?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_round_trips() {
		for status in [MemoryStatus::Raw, MemoryStatus::Consolidated, MemoryStatus::Processed] {
			assert_eq!(status.as_str().parse::<MemoryStatus>().unwrap(), status);
		}
		assert!("active".parse::<MemoryStatus>().is_err());
	}

	#[test]
	fn envelope_defaults_apply_on_decode() {
		let envelope: Envelope =
			serde_json::from_str(r#"{ "text": "note", "timestamp": 1720000000000 }"#).unwrap();

		assert_eq!(envelope.version, ENVELOPE_VERSION);
		assert!(envelope.context_tags.is_empty());
		assert!(envelope.source_app.is_none());
	}

	#[test]
	fn tag_list_filters_non_strings() {
		let record = MemoryRecord {
			id: Uuid::new_v4(),
			text: "t".to_string(),
			tags: serde_json::json!(["a", 1, "b"]),
			source_app: None,
			session_id: None,
			status: "raw".to_string(),
			created_at: 0,
			updated_at: 0,
		};

		assert_eq!(record.tag_list(), vec!["a".to_string(), "b".to_string()]);
	}
}
