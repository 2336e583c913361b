//! HTTP API over the recommender

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::DEFAULT_TOP_K;
use crate::formatter::AssessmentRecord;
use crate::recommender::Recommender;

/// Header naming the recommendation outcome (`matched`, `fallback`, `failed`)
pub const OUTCOME_HEADER: &str = "x-recommendation-outcome";

#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    pub top_k: usize,
}

impl AppState {
    pub fn new(recommender: Arc<Recommender>) -> Self {
        Self {
            recommender,
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub recommended_assessments: Vec<AssessmentRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Error processing request: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/recommend", post(recommend))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query cannot be empty".to_string()));
    }

    let recommender = Arc::clone(&state.recommender);
    let k = state.top_k;
    // The recommender does blocking I/O (dataset read, LLM call)
    let recommendation =
        tokio::task::spawn_blocking(move || recommender.recommend_assessments(&query, k))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

    let headers = [(OUTCOME_HEADER, recommendation.outcome.label())];
    let body = Json(RecommendResponse {
        recommended_assessments: recommendation.items,
    });
    Ok((headers, body).into_response())
}

/// Bind and serve until the process is stopped
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Recommender API listening on http://{}", addr);
    axum::serve(listener, app).await.context("server shutdown")?;
    Ok(())
}
