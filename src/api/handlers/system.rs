//! System endpoints: health check and catalog.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::day_name;
use crate::app_state::AppState;
use crate::domain::{Category, ListingKind, LocationMode, ServiceType};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health`: service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Listing kind with its public id prefix.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListingKindInfo {
    kind: String,
    public_id_prefix: String,
}

/// Enumerations and schedule clients need to build forms.
#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogResponse {
    listing_kinds: Vec<ListingKindInfo>,
    service_types: Vec<String>,
    categories: Vec<String>,
    location_modes: Vec<String>,
    working_windows: Vec<String>,
    working_days: Vec<String>,
    utc_offset_seconds: i32,
}

fn names<T: Copy>(values: &[T], name: fn(T) -> &'static str) -> Vec<String> {
    values.iter().map(|v| name(*v).to_string()).collect()
}

/// `GET /config/catalog`: accepted enumerations and working schedule.
#[utoipa::path(
    get,
    path = "/config/catalog",
    tag = "System",
    summary = "Listing catalog",
    description = "Returns listing kinds, service types, categories, location modes and the business working windows used for slot generation.",
    responses(
        (status = 200, description = "Catalog", body = CatalogResponse),
    )
)]
pub async fn catalog_handler(State(state): State<AppState>) -> impl IntoResponse {
    let hours = state.booking_service.working_hours();
    let catalog = CatalogResponse {
        listing_kinds: ListingKind::ALL
            .iter()
            .map(|k| ListingKindInfo {
                kind: k.as_str().to_string(),
                public_id_prefix: k.prefix().to_string(),
            })
            .collect(),
        service_types: names(ServiceType::ALL, ServiceType::as_str),
        categories: names(Category::ALL, Category::as_str),
        location_modes: names(LocationMode::ALL, LocationMode::as_str),
        working_windows: hours.windows().iter().map(ToString::to_string).collect(),
        working_days: names(hours.days(), day_name),
        utc_offset_seconds: hours.offset().local_minus_utc(),
    };
    (StatusCode::OK, Json(catalog))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/catalog", get(catalog_handler))
}
