//! Thin read-only HTTP surface: a JSON dashboard over `Store` state and a
//! Prometheus-style text metrics endpoint. No auth, no pagination beyond
//! a bound, no caching — this is an operator window, not a product
//! surface.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use sentinel_core::domain::{ApprovalStatus, FailureStatus};
use sentinel_core::substrate::store::ListFilter;
use sentinel_core::substrate::Store;
use sentinel_core::Explainability;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

pub fn router(store: Arc<dyn Store>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/failures", get(list_failures))
        .route("/api/failures/:id", get(get_failure))
        .route("/api/decisions/recent", get(recent_decisions))
        .route("/api/approvals/pending", get(pending_approvals))
        .route("/metrics", get(metrics))
        .with_state(AppState { store })
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

impl From<sentinel_core::CoreError> for ApiError {
    fn from(err: sentinel_core::CoreError) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
struct ListQuery {
    repository: Option<String>,
    limit: Option<u32>,
}

async fn list_failures(State(state): State<AppState>, Query(q): Query<ListQuery>) -> Result<Response, ApiError> {
    let mut filter = match q.repository {
        Some(repository) => ListFilter::for_repository(repository),
        None => ListFilter::default(),
    };
    if let Some(limit) = q.limit {
        filter = filter.with_limit(limit);
    }
    let failures = state.store.list_failures(&filter).await?;
    Ok(Json(failures).into_response())
}

async fn get_failure(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Response, ApiError> {
    match state.store.get_failure(id).await? {
        Some(failure) => Ok(Json(failure).into_response()),
        None => Err(ApiError(StatusCode::NOT_FOUND, format!("no failure with id {id}"))),
    }
}

#[derive(Deserialize)]
struct RecentQuery {
    limit: Option<u32>,
}

async fn recent_decisions(State(state): State<AppState>, Query(q): Query<RecentQuery>) -> Result<Response, ApiError> {
    let ledger = Explainability::new(state.store.clone());
    let decisions = ledger.recent(q.limit.unwrap_or(20)).await?;
    Ok(Json(decisions).into_response())
}

async fn pending_approvals(State(state): State<AppState>, Query(q): Query<ListQuery>) -> Result<Response, ApiError> {
    let filter = match q.repository {
        Some(repository) => ListFilter::for_repository(repository),
        None => ListFilter::default(),
    };
    let approvals = state.store.pending_approvals(&filter).await?;
    Ok(Json(approvals).into_response())
}

/// Prometheus text-exposition format gauges, computed live from `Store`
/// rather than tracked separately — this surface mirrors state, it
/// doesn't own any.
async fn metrics(State(state): State<AppState>) -> Result<String, ApiError> {
    let failures = state.store.list_failures(&ListFilter::default()).await?;
    let approvals = state.store.pending_approvals(&ListFilter::default()).await?;

    let mut by_status = [0u64; 8];
    for failure in &failures {
        by_status[failure_status_index(failure.status)] += 1;
    }
    let pending_approvals = approvals.iter().filter(|a| a.status == ApprovalStatus::Pending).count();

    let mut out = String::new();
    out.push_str("# HELP sentineld_failures_total Failures known to the store, by status.\n");
    out.push_str("# TYPE sentineld_failures_total gauge\n");
    for (status, count) in FAILURE_STATUS_LABELS.iter().zip(by_status) {
        out.push_str(&format!("sentineld_failures_total{{status=\"{status}\"}} {count}\n"));
    }
    out.push_str("# HELP sentineld_pending_approvals Approval requests awaiting resolution.\n");
    out.push_str("# TYPE sentineld_pending_approvals gauge\n");
    out.push_str(&format!("sentineld_pending_approvals {pending_approvals}\n"));
    Ok(out)
}

const FAILURE_STATUS_LABELS: [&str; 8] = [
    "detected",
    "analyzed",
    "gated",
    "pr_open",
    "remediated",
    "rolled_back",
    "failed",
    "developer_notified",
];

fn failure_status_index(status: FailureStatus) -> usize {
    match status {
        FailureStatus::Detected => 0,
        FailureStatus::Analyzed => 1,
        FailureStatus::Gated => 2,
        FailureStatus::PrOpen => 3,
        FailureStatus::Remediated => 4,
        FailureStatus::RolledBack => 5,
        FailureStatus::Failed => 6,
        FailureStatus::DeveloperNotified => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use sentinel_store::InMemoryStore;
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthz_reports_ok() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let app = router(store);
        let response = app.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_failure_reports_404_for_missing_id() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let app = router(store);
        let uri = format!("/api/failures/{}", Uuid::new_v4());
        let response = app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_counts_failures_by_status() {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_failure(&sentinel_core::domain::Failure::new(
                "acme/widgets",
                "main",
                "build",
                "run-1",
                "abc123",
                "log tail",
                "npm ci failed",
                Utc::now(),
            ))
            .await
            .unwrap();
        let app = router(store);
        let response = app.oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("sentineld_failures_total{status=\"detected\"} 1"));
    }
}
