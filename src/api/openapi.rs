//! `OpenAPI` document and Swagger UI routes.

use utoipa::OpenApi;

use super::dto::{
    AuditEntryDto, AvailabilityResponse, BookRequest, BookingResponse, DecisionRequest,
    DecisionResponse, FeedbackRequest, FeedbackResponse, FeedbackSummaryResponse,
    HistoryResponse, ListingRequest, ListingResponse, MessageResponse, PendingChangeDto,
    PricedOptionDto, PricingDto, PricingRequest, ReasonRequest, SendMessageRequest, SlotDto,
    StatusResponse, UnreadCountResponse,
};
use super::handlers::system::{CatalogResponse, HealthResponse, ListingKindInfo};
use super::handlers::{admin, booking, listing, message, system};
use crate::error::{ErrorBody, ErrorResponse, FieldError};

/// Complete `OpenAPI` description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "Salon Marketplace API",
        description = "Listings with admin approval, appointment booking, feedback and direct messages."
    ),
    paths(
        listing::create_service,
        listing::create_package,
        listing::list_listings,
        listing::list_mine,
        listing::get_listing,
        listing::update_listing,
        listing::delete_listing,
        listing::reactivate_listing,
        listing::resubmit_listing,
        listing::listing_status,
        listing::listing_feedback,
        admin::pending_listings,
        admin::approve_listing,
        admin::reject_listing,
        admin::deactivate_listing,
        admin::listing_history,
        booking::availability,
        booking::create_booking,
        booking::list_bookings,
        booking::cancel_booking,
        booking::complete_booking,
        booking::leave_feedback,
        message::send_message,
        message::conversation,
        message::mark_read,
        message::unread_count,
        system::health_handler,
        system::catalog_handler,
    ),
    components(schemas(
        ListingRequest,
        PricingRequest,
        PricedOptionDto,
        ListingResponse,
        PricingDto,
        PendingChangeDto,
        StatusResponse,
        DecisionRequest,
        DecisionResponse,
        AuditEntryDto,
        HistoryResponse,
        ReasonRequest,
        AvailabilityResponse,
        SlotDto,
        BookRequest,
        BookingResponse,
        FeedbackRequest,
        FeedbackResponse,
        FeedbackSummaryResponse,
        SendMessageRequest,
        MessageResponse,
        UnreadCountResponse,
        HealthResponse,
        CatalogResponse,
        ListingKindInfo,
        ErrorResponse,
        ErrorBody,
        FieldError,
    )),
    tags(
        (name = "Listings", description = "Service and package submission and reads"),
        (name = "Admin", description = "Listing review"),
        (name = "Bookings", description = "Availability, appointments and feedback"),
        (name = "Messages", description = "Direct messages"),
        (name = "System", description = "Health and catalog"),
    )
)]
pub struct ApiDoc;

/// Swagger UI at `/swagger-ui` serving `/api-docs/openapi.json`.
#[cfg(feature = "swagger-ui")]
pub fn swagger_routes<S>() -> axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    axum::Router::new().merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
}
