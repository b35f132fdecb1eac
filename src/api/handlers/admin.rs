//! Admin review handlers: pending queue, decisions and audit history.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::dto::{
    AuditEntryDto, DecisionRequest, DecisionResponse, HistoryResponse, ListingResponse,
    ReasonRequest, optional_body,
};
use crate::app_state::AppState;
use crate::auth::Caller;
use crate::domain::ListingId;
use crate::error::{ErrorResponse, MarketError};

/// `GET /admin/listings/pending`: listings awaiting a decision.
///
/// # Errors
///
/// Returns [`MarketError::Forbidden`] unless the caller is an admin.
#[utoipa::path(
    get,
    path = "/api/v1/admin/listings/pending",
    tag = "Admin",
    summary = "Pending review queue",
    description = "Listings with a first submission or a staged provider request, oldest request first.",
    responses(
        (status = 200, description = "Pending listings", body = Vec<ListingResponse>),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
    )
)]
pub async fn pending_listings(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, MarketError> {
    let listings = state.listing_service.pending(&caller).await?;
    let body: Vec<ListingResponse> = listings.iter().map(ListingResponse::detailed).collect();
    Ok(Json(body))
}

/// `POST /admin/listings/{id}/approve`: approve the pending request.
///
/// # Errors
///
/// Returns [`MarketError`] when nothing is pending, the request id does
/// not match, or a public id cannot be allocated.
#[utoipa::path(
    post,
    path = "/api/v1/admin/listings/{id}/approve",
    tag = "Admin",
    summary = "Approve a listing request",
    description = "Applies the staged request. A first approval assigns the next `SRV_###` or `PKG_###` id. Repeating the same decision is reported as a replay.",
    params(("id" = Uuid, Path, description = "Listing UUID")),
    request_body(content = DecisionRequest, description = "Optional request id and note"),
    responses(
        (status = 200, description = "Request approved", body = DecisionResponse),
        (status = 404, description = "Listing not found", body = ErrorResponse),
        (status = 409, description = "No pending request", body = ErrorResponse),
        (status = 503, description = "Public id allocation failed", body = ErrorResponse),
    )
)]
pub async fn approve_listing(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let req = optional_body(payload)?;
    let (listing, outcome) = state
        .listing_service
        .approve(&caller, ListingId::from_uuid(id), req.request_id, req.reason)
        .await?;
    Ok(Json(DecisionResponse::new(&listing, &outcome)))
}

/// `POST /admin/listings/{id}/reject`: reject the pending request.
///
/// # Errors
///
/// Returns [`MarketError`] when nothing is pending or the reason is
/// missing or out of bounds.
#[utoipa::path(
    post,
    path = "/api/v1/admin/listings/{id}/reject",
    tag = "Admin",
    summary = "Reject a listing request",
    description = "Discards the staged request. A reason of 5 to 500 characters is required.",
    params(("id" = Uuid, Path, description = "Listing UUID")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Request rejected", body = DecisionResponse),
        (status = 400, description = "Missing or invalid reason", body = ErrorResponse),
        (status = 409, description = "No pending request", body = ErrorResponse),
    )
)]
pub async fn reject_listing(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let req = optional_body(payload)?;
    let (listing, outcome) = state
        .listing_service
        .reject(&caller, ListingId::from_uuid(id), req.request_id, req.reason)
        .await?;
    Ok(Json(DecisionResponse::new(&listing, &outcome)))
}

/// `POST /admin/listings/{id}/deactivate`: suspend a live listing.
///
/// # Errors
///
/// Returns [`MarketError::InvalidTransition`] unless the listing is
/// approved, or [`MarketError::PendingChangesExist`].
#[utoipa::path(
    post,
    path = "/api/v1/admin/listings/{id}/deactivate",
    tag = "Admin",
    summary = "Deactivate a listing",
    description = "Takes an approved listing offline. The provider may later request reactivation.",
    params(("id" = Uuid, Path, description = "Listing UUID")),
    request_body(content = ReasonRequest, description = "Optional note"),
    responses(
        (status = 200, description = "Listing deactivated", body = ListingResponse),
        (status = 409, description = "Listing cannot be deactivated", body = ErrorResponse),
    )
)]
pub async fn deactivate_listing(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<ReasonRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let body = optional_body(payload)?;
    let listing = state
        .listing_service
        .deactivate(&caller, ListingId::from_uuid(id), body.reason)
        .await?;
    Ok(Json(ListingResponse::detailed(&listing)))
}

/// `GET /admin/listings/{id}/history`: audit trail.
///
/// # Errors
///
/// Returns [`MarketError::Forbidden`] unless the caller is an admin, or
/// [`MarketError::ListingNotFound`].
#[utoipa::path(
    get,
    path = "/api/v1/admin/listings/{id}/history",
    tag = "Admin",
    summary = "Listing audit trail",
    description = "Every recorded action on the listing, oldest first, with the state captured before each change.",
    params(("id" = Uuid, Path, description = "Listing UUID")),
    responses(
        (status = 200, description = "Audit trail", body = HistoryResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 404, description = "Listing not found", body = ErrorResponse),
    )
)]
pub async fn listing_history(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MarketError> {
    let (listing, trail) = state
        .listing_service
        .history(&caller, ListingId::from_uuid(id))
        .await?;
    Ok(Json(HistoryResponse {
        listing_id: *listing.id().as_uuid(),
        public_id: listing.public_id().map(|p| p.to_string()),
        entries: trail.entries().iter().map(AuditEntryDto::from).collect(),
    }))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/listings/pending", get(pending_listings))
        .route("/admin/listings/{id}/approve", post(approve_listing))
        .route("/admin/listings/{id}/reject", post(reject_listing))
        .route("/admin/listings/{id}/deactivate", post(deactivate_listing))
        .route("/admin/listings/{id}/history", get(listing_history))
}
