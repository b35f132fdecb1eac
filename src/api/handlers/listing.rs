//! Listing handlers: submission, provider requests and public reads.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::dto::{
    FeedbackSummaryResponse, ListingRequest, ListingResponse, ListingsQuery, ReasonRequest,
    StatusResponse, optional_body,
};
use crate::app_state::AppState;
use crate::auth::Caller;
use crate::domain::{Listing, ListingId, ListingKind};
use crate::error::{ErrorResponse, MarketError};

/// Header carrying a client-chosen idempotency key on submissions.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Owners and admins get the review details; everyone else the public view.
fn view(caller: Option<&Caller>, listing: &Listing) -> ListingResponse {
    if caller.is_some_and(|c| c.is_admin() || c.user_id == listing.owner_id()) {
        ListingResponse::detailed(listing)
    } else {
        ListingResponse::public(listing)
    }
}

async fn submit(
    state: &AppState,
    caller: &Caller,
    kind: ListingKind,
    headers: &HeaderMap,
    req: ListingRequest,
) -> Result<(StatusCode, Json<ListingResponse>), MarketError> {
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty());
    let (draft, _reason) = req.into_draft();
    let listing = state
        .listing_service
        .submit(caller, kind, &draft, key)
        .await?;
    Ok((StatusCode::CREATED, Json(ListingResponse::detailed(&listing))))
}

/// `POST /services`: submit a new service for review.
///
/// # Errors
///
/// Returns [`MarketError`] on validation failure or a non-provider caller.
#[utoipa::path(
    post,
    path = "/api/v1/services",
    tag = "Listings",
    summary = "Submit a service",
    description = "Validates the payload and stores the service as `pending_approval`. A repeated `Idempotency-Key` returns the listing created by the first call.",
    request_body = ListingRequest,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Client-chosen deduplication key"),
    ),
    responses(
        (status = 201, description = "Service submitted", body = ListingResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Missing identity", body = ErrorResponse),
        (status = 403, description = "Caller is not a provider", body = ErrorResponse),
        (status = 409, description = "Duplicate request in flight", body = ErrorResponse),
    )
)]
pub async fn create_service(
    State(state): State<AppState>,
    caller: Caller,
    headers: HeaderMap,
    payload: Result<Json<ListingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let Json(req) = payload?;
    submit(&state, &caller, ListingKind::Service, &headers, req).await
}

/// `POST /packages`: submit a new package for review.
///
/// # Errors
///
/// Returns [`MarketError`] on validation failure or a non-provider caller.
#[utoipa::path(
    post,
    path = "/api/v1/packages",
    tag = "Listings",
    summary = "Submit a package",
    description = "Same as submitting a service; packages may also list `included_services`.",
    request_body = ListingRequest,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Client-chosen deduplication key"),
    ),
    responses(
        (status = 201, description = "Package submitted", body = ListingResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Caller is not a provider", body = ErrorResponse),
    )
)]
pub async fn create_package(
    State(state): State<AppState>,
    caller: Caller,
    headers: HeaderMap,
    payload: Result<Json<ListingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let Json(req) = payload?;
    submit(&state, &caller, ListingKind::Package, &headers, req).await
}

/// `GET /listings`: public catalogue of live listings.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] for an unknown `kind`.
#[utoipa::path(
    get,
    path = "/api/v1/listings",
    tag = "Listings",
    summary = "List live listings",
    description = "Returns approved, active listings ordered by public id, optionally filtered by kind.",
    params(ListingsQuery),
    responses(
        (status = 200, description = "Live listings", body = Vec<ListingResponse>),
        (status = 400, description = "Unknown kind", body = ErrorResponse),
    )
)]
pub async fn list_listings(
    State(state): State<AppState>,
    query: Result<Query<ListingsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let Query(query) = query?;
    let kind = query
        .kind
        .as_deref()
        .map(str::parse::<ListingKind>)
        .transpose()
        .map_err(MarketError::InvalidRequest)?;
    let listings = state.listing_service.list_public(kind).await;
    let body: Vec<ListingResponse> = listings.iter().map(ListingResponse::public).collect();
    Ok(Json(body))
}

/// `GET /listings/mine`: the caller's own listings.
///
/// # Errors
///
/// Returns [`MarketError::Forbidden`] unless the caller is a provider.
#[utoipa::path(
    get,
    path = "/api/v1/listings/mine",
    tag = "Listings",
    summary = "List my listings",
    description = "Returns every listing the calling provider can still see, newest submission first.",
    responses(
        (status = 200, description = "Own listings", body = Vec<ListingResponse>),
        (status = 403, description = "Caller is not a provider", body = ErrorResponse),
    )
)]
pub async fn list_mine(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, MarketError> {
    let listings = state.listing_service.list_mine(&caller).await?;
    let body: Vec<ListingResponse> = listings.iter().map(ListingResponse::detailed).collect();
    Ok(Json(body))
}

/// `GET /listings/{id}`: listing details.
///
/// # Errors
///
/// Returns [`MarketError::ListingNotFound`] if the caller may not see it.
#[utoipa::path(
    get,
    path = "/api/v1/listings/{id}",
    tag = "Listings",
    summary = "Get a listing",
    description = "Anonymous callers see live listings only; owners also see their unpublished listings and admins see everything.",
    params(("id" = Uuid, Path, description = "Listing UUID")),
    responses(
        (status = 200, description = "Listing details", body = ListingResponse),
        (status = 404, description = "Listing not found", body = ErrorResponse),
    )
)]
pub async fn get_listing(
    State(state): State<AppState>,
    caller: Option<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MarketError> {
    let listing = state
        .listing_service
        .get(caller.as_ref(), ListingId::from_uuid(id))
        .await?;
    Ok(Json(view(caller.as_ref(), &listing)))
}

/// `PUT /listings/{id}`: stage an update for review.
///
/// # Errors
///
/// Returns [`MarketError`] when the caller is not the owner, the listing
/// is not approved, a request is already pending, or validation fails.
#[utoipa::path(
    put,
    path = "/api/v1/listings/{id}",
    tag = "Listings",
    summary = "Request an update",
    description = "Validates the supplied fields and stages them; the live content changes only when an admin approves.",
    params(("id" = Uuid, Path, description = "Listing UUID")),
    request_body = ListingRequest,
    responses(
        (status = 200, description = "Update staged", body = ListingResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 409, description = "Request already pending or wrong status", body = ErrorResponse),
    )
)]
pub async fn update_listing(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<ListingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let Json(req) = payload?;
    let (draft, reason) = req.into_draft();
    let listing = state
        .listing_service
        .submit_update(&caller, ListingId::from_uuid(id), &draft, reason)
        .await?;
    Ok(Json(ListingResponse::detailed(&listing)))
}

/// `DELETE /listings/{id}`: request deletion.
///
/// # Errors
///
/// Returns [`MarketError`] when the caller is not the owner or the
/// listing cannot be deleted from its current status.
#[utoipa::path(
    delete,
    path = "/api/v1/listings/{id}",
    tag = "Listings",
    summary = "Request deletion",
    description = "Stages a soft deletion for admin review. The body is optional.",
    params(("id" = Uuid, Path, description = "Listing UUID")),
    request_body(content = ReasonRequest, description = "Optional note"),
    responses(
        (status = 200, description = "Deletion staged", body = ListingResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 409, description = "Request already pending or wrong status", body = ErrorResponse),
    )
)]
pub async fn delete_listing(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<ReasonRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let body = optional_body(payload)?;
    let listing = state
        .listing_service
        .submit_delete(&caller, ListingId::from_uuid(id), body.reason)
        .await?;
    Ok(Json(ListingResponse::detailed(&listing)))
}

/// `POST /listings/{id}/reactivate`: request reactivation.
///
/// # Errors
///
/// Returns [`MarketError`] unless the caller owns an inactive or deleted
/// listing without a pending request.
#[utoipa::path(
    post,
    path = "/api/v1/listings/{id}/reactivate",
    tag = "Listings",
    summary = "Request reactivation",
    description = "Stages the return of an inactive or deleted listing for admin review.",
    params(("id" = Uuid, Path, description = "Listing UUID")),
    request_body(content = ReasonRequest, description = "Optional note"),
    responses(
        (status = 200, description = "Reactivation staged", body = ListingResponse),
        (status = 409, description = "Request already pending or wrong status", body = ErrorResponse),
    )
)]
pub async fn reactivate_listing(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<ReasonRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let body = optional_body(payload)?;
    let listing = state
        .listing_service
        .submit_reactivate(&caller, ListingId::from_uuid(id), body.reason)
        .await?;
    Ok(Json(ListingResponse::detailed(&listing)))
}

/// `POST /listings/{id}/resubmit`: resubmit a rejected listing.
///
/// # Errors
///
/// Returns [`MarketError`] unless the caller owns a rejected listing and
/// the merged content validates.
#[utoipa::path(
    post,
    path = "/api/v1/listings/{id}/resubmit",
    tag = "Listings",
    summary = "Resubmit a rejected listing",
    description = "Applies the supplied corrections on top of the rejected content and sends it back for first approval.",
    params(("id" = Uuid, Path, description = "Listing UUID")),
    request_body = ListingRequest,
    responses(
        (status = 200, description = "Listing resubmitted", body = ListingResponse),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 409, description = "Listing is not rejected", body = ErrorResponse),
    )
)]
pub async fn resubmit_listing(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<ListingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let req = optional_body(payload)?;
    let (draft, reason) = req.into_draft();
    let listing = state
        .listing_service
        .resubmit(&caller, ListingId::from_uuid(id), &draft, reason)
        .await?;
    Ok(Json(ListingResponse::detailed(&listing)))
}

/// `GET /listings/{id}/status`: status with pending-request label.
///
/// # Errors
///
/// Returns [`MarketError::ListingNotFound`] if the caller may not see it.
#[utoipa::path(
    get,
    path = "/api/v1/listings/{id}/status",
    tag = "Listings",
    summary = "Get listing status",
    description = "Returns the lifecycle status and a label such as `Approved (Update Pending)`.",
    params(("id" = Uuid, Path, description = "Listing UUID")),
    responses(
        (status = 200, description = "Status", body = StatusResponse),
        (status = 404, description = "Listing not found", body = ErrorResponse),
    )
)]
pub async fn listing_status(
    State(state): State<AppState>,
    caller: Option<Caller>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MarketError> {
    let (listing, display) = state
        .listing_service
        .status(caller.as_ref(), ListingId::from_uuid(id))
        .await?;
    Ok(Json(StatusResponse::new(&listing, &display)))
}

/// `GET /listings/{id}/feedback`: ratings left on a listing.
///
/// # Errors
///
/// Returns [`MarketError::ListingNotFound`] if the listing does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/listings/{id}/feedback",
    tag = "Listings",
    summary = "Get listing feedback",
    description = "Returns feedback entries, newest first, with the average rating.",
    params(("id" = Uuid, Path, description = "Listing UUID")),
    responses(
        (status = 200, description = "Feedback summary", body = FeedbackSummaryResponse),
        (status = 404, description = "Listing not found", body = ErrorResponse),
    )
)]
pub async fn listing_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MarketError> {
    let listing_id = ListingId::from_uuid(id);
    let summary = state.booking_service.listing_feedback(listing_id).await?;
    Ok(Json(FeedbackSummaryResponse::new(listing_id, &summary)))
}

/// Listing routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/services", post(create_service))
        .route("/packages", post(create_package))
        .route("/listings", get(list_listings))
        .route("/listings/mine", get(list_mine))
        .route(
            "/listings/{id}",
            get(get_listing).put(update_listing).delete(delete_listing),
        )
        .route("/listings/{id}/reactivate", post(reactivate_listing))
        .route("/listings/{id}/resubmit", post(resubmit_listing))
        .route("/listings/{id}/status", get(listing_status))
        .route("/listings/{id}/feedback", get(listing_feedback))
}
