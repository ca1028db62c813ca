use crate::app::ports::Clock;
use crate::domain::{FeedData, Party, Venue};
use crate::error::FeedError;
use crate::feed::{query, FeedCache, FeedStatus};
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use hyper::Server;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<FeedCache>,
    pub clock: Arc<dyn Clock>,
}

/// Envelope every endpoint answers with
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    fn with_message(message: &str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.to_string()),
            data,
        })
    }
}

/// Any handler failure: 500 with `{success: false, error}`
pub struct ApiError(FeedError);

impl From<FeedError> for ApiError {
    fn from(e: FeedError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        let body = serde_json::json!({
            "success": false,
            "error": self.0.to_string(),
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub status: &'static str,
    #[serde(flatten)]
    pub feed: FeedStatus,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
        "service": "partyfinder",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn complete_data(State(state): State<AppState>) -> Json<ApiResponse<Arc<FeedData>>> {
    let data = state.feed.get_data(false).await;
    info!(
        "Serving complete data: {} events, {} venues",
        data.parties.len(),
        data.venues.len()
    );
    ApiResponse::ok(data)
}

async fn parties_today(State(state): State<AppState>) -> Json<ApiResponse<Vec<Party>>> {
    let data = state.feed.get_data(false).await;
    let today = state.feed.schedule().today(state.clock.now());
    ApiResponse::ok(query::parties_on(&data, today))
}

async fn active_venues(State(state): State<AppState>) -> Json<ApiResponse<Vec<Venue>>> {
    let data = state.feed.get_data(false).await;
    ApiResponse::ok(query::active_venues(&data))
}

async fn search_parties(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<ApiResponse<Vec<Party>>> {
    let data = state.feed.get_data(false).await;
    let parties = query::search(&data, &params.q);
    info!("Search {:?}: {} results", params.q, parties.len());
    ApiResponse::ok(parties)
}

async fn force_update(State(state): State<AppState>) -> Json<ApiResponse<Arc<FeedData>>> {
    info!("Forced update requested");
    let data = state.feed.get_data(true).await;
    ApiResponse::with_message("Data updated", data)
}

async fn clear_cache(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Option<()>>>, ApiError> {
    state.feed.clear().await?;
    Ok(ApiResponse::with_message("Cache cleared", None))
}

async fn status(State(state): State<AppState>) -> Json<ApiResponse<StatusBody>> {
    // make sure a first fetch has happened
    state.feed.get_data(false).await;
    ApiResponse::ok(StatusBody {
        status: "running",
        feed: state.feed.status().await,
    })
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/data/complete", get(complete_data))
        .route("/api/parties/today", get(parties_today))
        .route("/api/venues/active", get(active_venues))
        .route("/api/parties/search", get(search_parties))
        .route("/api/update", post(force_update))
        .route("/api/clear-cache", post(clear_cache))
        .route("/api/status", get(status))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                )),
        )
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{port}");
    info!("Health check: http://localhost:{port}/api/health");

    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
