//! Shared DTO types used across multiple endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::MarketError;

/// Body carrying only an optional note (delete, reactivate, deactivate,
/// cancel).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ReasonRequest {
    /// Free-text note.
    pub reason: Option<String>,
}

/// Unwraps a JSON body that clients may omit entirely.
///
/// A request without a JSON content type yields `T::default()`; a body
/// that is present but malformed is still rejected.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] for a malformed body.
pub fn optional_body<T: Default>(payload: Result<Json<T>, JsonRejection>) -> Result<T, MarketError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection.into()),
    }
}
