use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::Booking,
    error::{ApiError, ErrorCode},
    protocol::{BookingList, CancelAck, CancelBookingRequest, CreateBookingRequest},
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod config;
mod store;

use api::ApiContext;
use app_state::AppState;
use config::load_settings;
use store::BookingStore;

const MAX_REQUEST_BYTES: usize = 16 * 1024;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings()?;
    let template = settings.template().map_err(|error| {
        error!(
            open_at = %settings.open_at,
            close_at = %settings.close_at,
            slot_minutes = settings.slot_minutes,
            %error,
            "failed to build slot template from settings"
        );
        error
    })?;
    info!(slots = template.len(), "slot template ready");

    let state = AppState {
        api: ApiContext {
            store: BookingStore::default(),
            template,
        },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "booking store listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/all", get(http_list_bookings))
        .route("/api/create", post(http_create_booking))
        .route("/api/cancel", post(http_cancel_booking))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn into_response_error(err: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(err.code), Json(err))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_list_bookings(State(state): State<Arc<AppState>>) -> Json<BookingList> {
    Json(api::list_bookings(&state.api).await)
}

async fn http_create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingRequest>,
) -> ApiResult<Booking> {
    api::create_booking(&state.api, req)
        .await
        .map(Json)
        .map_err(into_response_error)
}

async fn http_cancel_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CancelBookingRequest>,
) -> ApiResult<CancelAck> {
    api::cancel_booking(&state.api, req)
        .await
        .map(Json)
        .map_err(into_response_error)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
