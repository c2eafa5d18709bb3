//! Request handlers and the error-to-status mapping.
//!
//! Storage calls block on file I/O or SQLite, so handlers hand them to the
//! blocking pool instead of running them on the async workers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use super::state::AppContext;
use crate::domain::{DurationBucket, NewAnnotation};
use crate::error::PlanboardError;
use crate::storage::{MAX_COUNT, Storage};
use crate::summary::build_summary;

// ── Error mapping ────────────────────────────────────────────

/// Handler error: caller mistakes become 400, store failures 500.
#[derive(Debug)]
pub struct ApiError(PlanboardError);

impl From<PlanboardError> for ApiError {
    fn from(err: PlanboardError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %self.0, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError(PlanboardError::InvalidInput(msg.into()))
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| bad_request(format!("Bad Request: {e}")))
}

/// Run a storage call on the blocking pool.
async fn with_storage<T, F>(ctx: &AppContext, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn Storage) -> crate::error::Result<T> + Send + 'static,
{
    let storage = ctx.storage.clone();
    let result = tokio::task::spawn_blocking(move || f(storage.as_ref()))
        .await
        .map_err(|e| ApiError(PlanboardError::Storage(format!("storage task failed: {e}"))))?;
    Ok(result?)
}

fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

// ── Health ───────────────────────────────────────────────────

pub async fn handle_health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "backend": ctx.backend(),
    }))
}

// ── GET /api/counters ────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CountersQuery {
    pub duration: Option<String>,
    /// Comma-separated ids to seed before reading
    pub ids: Option<String>,
}

pub async fn handle_get_counters(State(ctx): State<Arc<AppContext>>, Query(query): Query<CountersQuery>) -> ApiResult {
    let duration: DurationBucket = match query.duration.as_deref().filter(|d| !d.is_empty()) {
        Some(label) => label.parse()?,
        None => DurationBucket::default(),
    };

    let ids: Vec<String> = query
        .ids
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let counts = with_storage(&ctx, move |storage| {
        for id in &ids {
            storage.ensure_seed(id, duration)?;
        }
        storage.counts_for_duration(duration)
    })
    .await?;
    tracing::debug!(duration = %duration, entries = counts.len(), "Served counters");
    Ok(Json(json!({ "duration": duration, "counts": counts })))
}

// ── POST /api/counters ───────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CounterUpdate {
    #[serde(rename = "detailId")]
    pub detail_id: Option<String>,
    pub duration: Option<String>,
    pub action: Option<String>,
    pub value: Option<Value>,
}

/// What a counter update asks for once defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterAction {
    Set(i64),
    Step(i64),
}

impl CounterUpdate {
    /// `"set"` with a numeric value is an absolute set; `"dec"` steps down;
    /// anything else steps up. Set values are bounded by `MAX_COUNT`.
    pub fn resolve_action(&self) -> CounterAction {
        let numeric = self.value.as_ref().and_then(Value::as_f64);
        let bound = MAX_COUNT as f64;
        match (self.action.as_deref(), numeric) {
            (Some("set"), Some(v)) => CounterAction::Set(v.trunc().clamp(-bound, bound) as i64),
            (Some("dec"), _) => CounterAction::Step(-1),
            _ => CounterAction::Step(1),
        }
    }
}

pub async fn handle_post_counters(State(ctx): State<Arc<AppContext>>, body: String) -> ApiResult {
    let update: CounterUpdate = parse_body(&body)?;

    let (Some(detail_id), Some(duration)) = (
        update.detail_id.as_deref().filter(|s| !s.is_empty()),
        update.duration.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return Err(bad_request("Missing detailId or duration"));
    };
    let duration: DurationBucket = duration.parse()?;
    let action = update.resolve_action();
    let id = detail_id.to_string();

    with_storage(&ctx, move |storage| match action {
        CounterAction::Set(value) => storage.set_count(&id, duration, value),
        CounterAction::Step(delta) => storage.increment(&id, duration, delta),
    })
    .await?;

    tracing::debug!(detail_id, duration = %duration, action = ?action, "Updated counter");
    Ok(ok())
}

// ── /api/annotations ─────────────────────────────────────────

pub async fn handle_list_annotations(State(ctx): State<Arc<AppContext>>) -> ApiResult {
    let rows = with_storage(&ctx, |storage| storage.list_all()).await?;
    Ok(Json(json!({ "rows": rows })))
}

#[derive(Debug, Deserialize)]
pub struct AnnotationPayload {
    pub detail_id: Option<String>,
    pub item_id: Option<String>,
    pub section: Option<String>,
    pub parent_title: Option<String>,
    pub phase_title: Option<String>,
    pub allowed_durations: Option<Vec<String>>,
    pub text: Option<String>,
    pub author: Option<String>,
}

impl TryFrom<AnnotationPayload> for NewAnnotation {
    type Error = PlanboardError;

    fn try_from(p: AnnotationPayload) -> Result<Self, Self::Error> {
        let mut record = NewAnnotation::new(
            p.detail_id.unwrap_or_default(),
            p.item_id.unwrap_or_default(),
            p.section.unwrap_or_default(),
            p.text.unwrap_or_default(),
        )?;
        record.parent_title = p.parent_title;
        record.phase_title = p.phase_title;
        record.allowed_durations = p.allowed_durations;
        record.author = p.author;
        Ok(record)
    }
}

pub async fn handle_post_annotation(State(ctx): State<Arc<AppContext>>, body: String) -> ApiResult {
    let payload: AnnotationPayload = parse_body(&body)?;
    let record = NewAnnotation::try_from(payload)?;

    tracing::debug!(detail_id = %record.detail_id, item_id = %record.item_id, "Upserting annotation");
    with_storage(&ctx, move |storage| storage.upsert(&record)).await?;
    Ok(ok())
}

// ── GET /api/summary ─────────────────────────────────────────

pub async fn handle_summary(State(ctx): State<Arc<AppContext>>) -> ApiResult {
    let summary = with_storage(&ctx, build_summary).await?;
    Ok(Json(serde_json::to_value(summary).map_err(PlanboardError::from)?))
}
