//! Availability, booking and feedback handlers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveTime;
use uuid::Uuid;

use crate::api::dto::{
    AvailabilityQuery, AvailabilityResponse, BookRequest, BookingResponse, FeedbackRequest,
    FeedbackResponse, ReasonRequest, SlotDto, optional_body,
};
use crate::app_state::AppState;
use crate::auth::Caller;
use crate::domain::{BookingId, ListingId};
use crate::error::{ErrorResponse, FieldError, MarketError, ValidationErrors};

/// `GET /availability`: free slots of a listing on a date.
///
/// # Errors
///
/// Returns [`MarketError::ListingNotFound`] unless the listing is live.
#[utoipa::path(
    get,
    path = "/api/v1/availability",
    tag = "Bookings",
    summary = "List free slots",
    description = "Slots are generated from the configured working windows and the listing's duration; slots overlapping a booking or already started are omitted.",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Free slots", body = AvailabilityResponse),
        (status = 400, description = "Malformed query", body = ErrorResponse),
        (status = 404, description = "Listing not bookable", body = ErrorResponse),
    )
)]
pub async fn availability(
    State(state): State<AppState>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let Query(query) = query?;
    let slots = state
        .booking_service
        .available_slots(ListingId::from_uuid(query.listing_id), query.date)
        .await?;
    let offset = state.booking_service.working_hours().offset();
    Ok(Json(AvailabilityResponse {
        listing_id: query.listing_id,
        date: query.date,
        slots: slots.iter().map(|s| SlotDto::new(s, offset)).collect(),
    }))
}

/// `POST /bookings`: book a free slot.
///
/// # Errors
///
/// Returns [`MarketError::SlotUnavailable`] when the slot is taken or not
/// offered, or [`MarketError::Forbidden`] for non-customers.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    tag = "Bookings",
    summary = "Book an appointment",
    description = "Books the slot starting at `time` on `date` (business-local). The start must be one of the slots returned by `/availability`.",
    request_body = BookRequest,
    responses(
        (status = 201, description = "Booking confirmed", body = BookingResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Caller is not a customer", body = ErrorResponse),
        (status = 404, description = "Listing not bookable", body = ErrorResponse),
        (status = 409, description = "Slot unavailable", body = ErrorResponse),
    )
)]
pub async fn create_booking(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<BookRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let Json(req) = payload?;
    let time = NaiveTime::parse_from_str(req.time.trim(), "%H:%M").map_err(|_| {
        MarketError::Validation(ValidationErrors(vec![FieldError::new(
            "time",
            "must be HH:MM",
        )]))
    })?;
    let booking = state
        .booking_service
        .book(
            &caller,
            ListingId::from_uuid(req.listing_id),
            req.date,
            time,
            req.notes,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(BookingResponse::from(&booking))))
}

/// `GET /bookings`: bookings visible to the caller.
///
/// # Errors
///
/// Returns [`MarketError::Unauthenticated`] without identity headers.
#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    tag = "Bookings",
    summary = "List bookings",
    description = "Customers see their own bookings, providers the bookings on their listings, admins all bookings; ordered by start time.",
    responses(
        (status = 200, description = "Bookings", body = Vec<BookingResponse>),
        (status = 401, description = "Missing identity", body = ErrorResponse),
    )
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<impl IntoResponse, MarketError> {
    let bookings = state.booking_service.list_for(&caller).await;
    let body: Vec<BookingResponse> = bookings.iter().map(BookingResponse::from).collect();
    Ok(Json(body))
}

/// `POST /bookings/{id}/cancel`: cancel a booking.
///
/// # Errors
///
/// Returns [`MarketError::Forbidden`] for unrelated callers or
/// [`MarketError::Conflict`] once the booking no longer holds its slot.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/cancel",
    tag = "Bookings",
    summary = "Cancel a booking",
    description = "The customer, the listing's provider or an admin may cancel a pending or confirmed booking. The slot becomes free again.",
    params(("id" = Uuid, Path, description = "Booking UUID")),
    request_body(content = ReasonRequest, description = "Optional note"),
    responses(
        (status = 200, description = "Booking cancelled", body = BookingResponse),
        (status = 403, description = "Not a party to the booking", body = ErrorResponse),
        (status = 404, description = "Booking not found", body = ErrorResponse),
        (status = 409, description = "Booking already closed", body = ErrorResponse),
    )
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<ReasonRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let body = optional_body(payload)?;
    let booking = state
        .booking_service
        .cancel(&caller, BookingId::from_uuid(id), body.reason)
        .await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// `POST /bookings/{id}/complete`: mark an appointment as done.
///
/// # Errors
///
/// Returns [`MarketError::Conflict`] unless the booking is confirmed and
/// has started.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/complete",
    tag = "Bookings",
    summary = "Complete a booking",
    description = "The listing's provider or an admin marks a confirmed appointment as completed once its start time has passed.",
    params(("id" = Uuid, Path, description = "Booking UUID")),
    responses(
        (status = 200, description = "Booking completed", body = BookingResponse),
        (status = 403, description = "Not the provider", body = ErrorResponse),
        (status = 409, description = "Booking cannot be completed yet", body = ErrorResponse),
    )
)]
pub async fn complete_booking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, MarketError> {
    let booking = state
        .booking_service
        .complete(&caller, BookingId::from_uuid(id))
        .await?;
    Ok(Json(BookingResponse::from(&booking)))
}

/// `POST /bookings/{id}/feedback`: rate a completed appointment.
///
/// # Errors
///
/// Returns [`MarketError::Conflict`] if the booking is not completed or
/// already rated, or [`MarketError::Validation`] for a bad rating.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/feedback",
    tag = "Bookings",
    summary = "Leave feedback",
    description = "One rating (1 to 5) with an optional comment per completed booking, by the booking's customer.",
    params(("id" = Uuid, Path, description = "Booking UUID")),
    request_body = FeedbackRequest,
    responses(
        (status = 201, description = "Feedback recorded", body = FeedbackResponse),
        (status = 400, description = "Invalid rating or comment", body = ErrorResponse),
        (status = 403, description = "Not the booking's customer", body = ErrorResponse),
        (status = 409, description = "Not completed or already rated", body = ErrorResponse),
    )
)]
pub async fn leave_feedback(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<impl IntoResponse, MarketError> {
    let Json(req) = payload?;
    let entry = state
        .booking_service
        .leave_feedback(&caller, BookingId::from_uuid(id), req.rating, req.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(FeedbackResponse::from(&entry))))
}

/// Availability and booking routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/availability", get(availability))
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route("/bookings/{id}/complete", post(complete_booking))
        .route("/bookings/{id}/feedback", post(leave_feedback))
}
