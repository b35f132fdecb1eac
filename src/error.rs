//! Marketplace error types with HTTP status code mapping.
//!
//! [`MarketError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use std::fmt;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ListingId, ListingKind, ListingStatus};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "validation failed: 2 field error(s)",
///     "details": [{ "field": "name", "message": "..." }]
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details (field errors for validation failures).
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g. `pricing.base_price`).
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Batch of field errors collected by a validator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    /// Returns `true` if no errors were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the collected field errors.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Returns `true` if some error targets `field`.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field error(s)", self.0.len())
    }
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                  |
/// |-----------|-------------------|------------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request              |
/// | 2000–2999 | Not Found / State | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server / Store    | 500 / 503                    |
/// | 4000–4999 | Auth              | 401 / 403                    |
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// One or more fields failed validation.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Request is malformed in a way not covered by field validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No usable caller identity on the request.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Caller's role lacks the required capability.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Caller is not the owning provider of the listing.
    #[error("caller does not own listing {0}")]
    NotOwner(ListingId),

    /// Listing with the given ID was not found (or is not visible).
    #[error("listing not found: {0}")]
    ListingNotFound(ListingId),

    /// Some other resource was not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A request is already waiting for admin review.
    #[error("listing {0} already has a request awaiting review")]
    PendingChangesExist(ListingId),

    /// Admin decision issued while nothing awaits review.
    #[error("listing {0} has no pending action")]
    NoPendingAction(ListingId),

    /// Requested action is not permitted from the listing's current status.
    #[error("cannot {action} listing {listing_id} while it is {status}")]
    InvalidTransition {
        /// Target listing.
        listing_id: ListingId,
        /// Status at the time of the request.
        status: ListingStatus,
        /// Attempted action.
        action: &'static str,
    },

    /// Requested booking slot is not available.
    #[error("slot unavailable: {0}")]
    SlotUnavailable(String),

    /// Some other state conflict (duplicate feedback, message already handled, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A request with the same idempotency key is still being processed.
    #[error("duplicate request in flight for idempotency key {0}")]
    DuplicateRequest(String),

    /// Public identifier could not be allocated; the approval was aborted.
    #[error("could not allocate {kind} public id: {source}")]
    Allocation {
        /// Entity class being allocated for.
        kind: ListingKind,
        /// Underlying store failure.
        #[source]
        source: Box<MarketError>,
    },

    /// A store call did not complete within the configured timeout.
    #[error("store operation timed out: {0}")]
    StoreTimeout(&'static str),

    /// Optimistic version check failed on write.
    #[error("version conflict on document {0}")]
    VersionConflict(uuid::Uuid),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Returns `true` for failures the caller may retry unchanged.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Allocation { .. }
                | Self::StoreTimeout(_)
                | Self::VersionConflict(_)
                | Self::Persistence(_)
        )
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::InvalidRequest(_) => 1002,
            Self::ListingNotFound(_) => 2001,
            Self::NotFound(_) => 2002,
            Self::PendingChangesExist(_) => 2101,
            Self::NoPendingAction(_) => 2102,
            Self::InvalidTransition { .. } => 2103,
            Self::SlotUnavailable(_) => 2104,
            Self::Conflict(_) => 2105,
            Self::DuplicateRequest(_) => 2106,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::StoreTimeout(_) => 3002,
            Self::VersionConflict(_) => 3003,
            Self::Allocation { .. } => 3004,
            Self::Unauthenticated(_) => 4001,
            Self::Forbidden(_) => 4003,
            Self::NotOwner(_) => 4004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::NotOwner(_) => StatusCode::FORBIDDEN,
            Self::ListingNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PendingChangesExist(_)
            | Self::NoPendingAction(_)
            | Self::InvalidTransition { .. }
            | Self::SlotUnavailable(_)
            | Self::Conflict(_)
            | Self::DuplicateRequest(_) => StatusCode::CONFLICT,
            Self::Allocation { .. } | Self::StoreTimeout(_) | Self::VersionConflict(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation(errors) => serde_json::to_value(errors.errors()).ok(),
            _ => None,
        }
    }
}

impl From<ValidationErrors> for MarketError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<JsonRejection> for MarketError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for MarketError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, code = self.error_code(), "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request_with_details() {
        let err = MarketError::Validation(ValidationErrors(vec![FieldError::new(
            "name",
            "must be between 2 and 100 characters",
        )]));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let Some(details) = err.details() else {
            panic!("validation errors carry details");
        };
        assert_eq!(details[0]["field"], "name");
    }

    #[test]
    fn allocation_keeps_source_and_is_transient() {
        let err = MarketError::Allocation {
            kind: ListingKind::Package,
            source: Box::new(MarketError::StoreTimeout("max public id")),
        };
        assert!(err.is_transient());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("store operation timed out: max public id")
        );
    }

    #[test]
    fn state_conflicts_map_to_409() {
        let id = ListingId::new();
        assert_eq!(
            MarketError::PendingChangesExist(id).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            MarketError::NoPendingAction(id).status_code(),
            StatusCode::CONFLICT
        );
        assert!(!MarketError::NotOwner(id).is_transient());
    }
}
