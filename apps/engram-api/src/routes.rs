use std::convert::Infallible;

use axum::{
	Json, Router,
	extract::{Query, State},
	http::StatusCode,
	response::{
		IntoResponse, Response,
		sse::{Event, KeepAlive, Sse},
	},
	routing::{get, post},
};
use futures::{Stream, StreamExt, future, stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::BroadcastStream;

use engram_providers::{GenerateOptions, Provider};
use engram_service::{
	RewrittenQueryResult, RewrittenSearchRequest, SearchItem, SignalEntry, SubmitRequest,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/api/memory", post(submit_memory))
		.route("/api/search", get(search))
		.route("/api/search/rewritten", post(rewritten_search))
		.route("/api/ai/generate", post(ai_generate))
		.route("/api/ai/sanitize", post(ai_sanitize))
		.route("/api/sse/logs", get(sse_logs))
		.route("/trigger-curator", post(trigger_curator))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
	success: bool,
	status: &'static str,
}

async fn submit_memory(
	State(state): State<AppState>,
	Json(payload): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
	let ack = state.service.submit(payload).await?;

	Ok((StatusCode::ACCEPTED, Json(SubmitResponse { success: true, status: ack.status })))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
	q: Option<String>,
	limit: Option<u32>,
}

async fn search(
	State(state): State<AppState>,
	Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchItem>>, ApiError> {
	let query = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()).ok_or_else(|| {
		json_error(StatusCode::BAD_REQUEST, "Query parameter q is required.")
	})?;
	let items = state.service.search(query, params.limit).await?;

	Ok(Json(items))
}

#[derive(Debug, Serialize)]
struct RewrittenSearchResponse {
	success: bool,
	results: Vec<RewrittenQueryResult>,
}

async fn rewritten_search(
	State(state): State<AppState>,
	Json(payload): Json<RewrittenSearchRequest>,
) -> Result<Json<RewrittenSearchResponse>, ApiError> {
	let results = state.service.rewritten_search(payload).await?;

	Ok(Json(RewrittenSearchResponse { success: true, results }))
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
	prompt: String,
	#[serde(default)]
	system: Option<String>,
	#[serde(default)]
	provider: Option<Provider>,
	#[serde(default)]
	model: Option<String>,
	#[serde(default)]
	schema: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
	success: bool,
	response: String,
}

/// With a `schema`, the structured result is JSON-encoded into `response`;
/// without one, `response` is the generated text.
async fn ai_generate(
	State(state): State<AppState>,
	Json(payload): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
	if payload.prompt.trim().is_empty() {
		return Err(json_error(StatusCode::BAD_REQUEST, "prompt is required."));
	}

	let cfg = &state.service.cfg.ai;
	let opts = GenerateOptions {
		provider: payload.provider.unwrap_or_default(),
		model: payload.model.clone(),
		..Default::default()
	};
	let response = match payload.schema.as_ref() {
		Some(schema) => {
			let value = engram_providers::generate_structured(cfg, &payload.prompt, schema, &opts)
				.await
				.map_err(engram_service::Error::from)?;

			value.to_string()
		},
		None => engram_providers::generate_text(
			cfg,
			&payload.prompt,
			payload.system.as_deref(),
			&opts,
		)
		.await
		.map_err(engram_service::Error::from)?,
	};

	Ok(Json(GenerateResponse { success: true, response }))
}

#[derive(Debug, Deserialize)]
struct SanitizeRequest {
	text: String,
}

#[derive(Debug, Serialize)]
struct SanitizeResponse {
	result: String,
}

async fn ai_sanitize(Json(payload): Json<SanitizeRequest>) -> Json<SanitizeResponse> {
	Json(SanitizeResponse { result: engram_providers::sanitize(&payload.text) })
}

/// Current ring tail first, then live appends for as long as the client
/// stays connected.
async fn sse_logs(
	State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
	let snapshot = state.service.signals.snapshot();
	let live = BroadcastStream::new(state.service.signals.subscribe())
		.filter_map(|entry| future::ready(entry.ok()));
	let events = stream::iter(snapshot).chain(live).map(signal_event);

	Sse::new(events).keep_alive(KeepAlive::default())
}

fn signal_event(entry: SignalEntry) -> Result<Event, Infallible> {
	Ok(Event::default().data(serde_json::to_string(&entry).unwrap_or_default()))
}

async fn trigger_curator(State(state): State<AppState>) -> StatusCode {
	let service = state.service.clone();

	tokio::spawn(async move {
		if let Err(err) = service.run_curator().await {
			tracing::error!(error = %err, "Manually triggered curator run failed.");
		}
	});

	StatusCode::ACCEPTED
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	message: String,
}

fn json_error(status: StatusCode, message: impl Into<String>) -> ApiError {
	ApiError { status, message: message.into() }
}

impl From<engram_service::Error> for ApiError {
	fn from(err: engram_service::Error) -> Self {
		let status = match &err {
			engram_service::Error::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
			engram_service::Error::NotFound { .. } => StatusCode::NOT_FOUND,
			engram_service::Error::Provider { .. } | engram_service::Error::Qdrant { .. } =>
				StatusCode::BAD_GATEWAY,
			engram_service::Error::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		};

		json_error(status, err.to_string())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status, Json(ErrorBody { error: self.message })).into_response()
	}
}
