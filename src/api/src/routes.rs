//! API route handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::dispatcher::{RequestDispatcher, USAGE};
use crate::query::{parse_date, today_jst};
use crate::scraper::parsers::BeforeInfoParser;
use crate::scraper::{Clock, PageFetcher};
use crate::types::{
    AskRequest, AskResponse, BeforeInfoQuery, ErrorResponse, HealthResponse, RaceId, RaceInfo,
};

/// Application state shared across handlers.
pub struct AppState {
    pub dispatcher: RequestDispatcher,
    pub fetcher: Arc<dyn PageFetcher>,
    pub clock: Arc<dyn Clock>,
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    url: Option<String>,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
            url: None,
        }
    }

    /// Upstream page could not be fetched or parsed
    pub fn bad_gateway(msg: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.into(),
            url: Some(url.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
            url: self.url,
        });
        (self.status, body).into_response()
    }
}

/// Usage text.
pub async fn root() -> &'static str {
    USAGE
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Chat endpoint: one message in, one reply out.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Json<AskResponse> {
    let reply = state.dispatcher.handle(&req.text).await;
    Json(AskResponse { reply })
}

/// Raw extraction result for one race, bypassing the cache.
pub async fn debug_beforeinfo(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BeforeInfoQuery>,
) -> Result<Json<RaceInfo>, ApiError> {
    let date = match query.hd.as_deref() {
        Some(hd) => parse_date(hd)
            .ok_or_else(|| ApiError::bad_request(format!("Invalid hd: {} (YYYYMMDD)", hd)))?,
        None => today_jst(state.clock.now()),
    };

    let id = RaceId::new(query.jcd, query.rno, date).ok_or_else(|| {
        ApiError::bad_request(format!(
            "Invalid race: jcd={} rno={} (jcd 1-24, rno 1-12)",
            query.jcd, query.rno
        ))
    })?;

    let page = state.fetcher.fetch(&id).await.map_err(|e| {
        tracing::warn!("Debug fetch failed: {}", e);
        ApiError::bad_gateway(e.to_string(), e.url())
    })?;

    let info = BeforeInfoParser::parse(&page).map_err(|e| {
        tracing::warn!("Debug parse failed for {}: {}", page.url, e);
        ApiError::bad_gateway(e.to_string(), page.url.clone())
    })?;

    Ok(Json(info))
}
