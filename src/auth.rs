//! Caller identity and the capability policy.
//!
//! Authentication happens upstream; this service trusts the `x-user-id`
//! and `x-user-role` headers set by the edge proxy. Every mutating entry
//! point asks [`authorize`] whether the caller's role grants the needed
//! [`Capability`]. Ownership checks (e.g. "is this my listing") are done
//! by the domain on top of that.

use std::fmt;
use std::str::FromStr;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::domain::UserId;
use crate::error::MarketError;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Marketplace role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Books appointments and leaves feedback.
    Customer,
    /// Offers services and packages.
    ServiceProvider,
    /// Reviews listings.
    Admin,
}

impl Role {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::ServiceProvider => "service_provider",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "customer" => Ok(Self::Customer),
            "service_provider" | "serviceProvider" | "provider" => Ok(Self::ServiceProvider),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

/// Something a caller may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Create, update, delete, reactivate or resubmit own listings.
    SubmitListing,
    /// Approve, reject or deactivate listings.
    ReviewListing,
    /// Read pending queues and audit trails.
    ViewListingHistory,
    /// Book an appointment.
    BookAppointment,
    /// Complete appointments on one's listings.
    ManageAppointment,
    /// Cancel an appointment one takes part in.
    CancelAppointment,
    /// Rate a completed appointment.
    LeaveFeedback,
    /// Send direct messages.
    SendMessage,
    /// Mark received messages read.
    ReadMessage,
}

/// Authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Who is calling.
    pub user_id: UserId,
    /// In which role.
    pub role: Role,
}

impl Caller {
    /// Creates a caller.
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Returns `true` for admins.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Returns `true` if `role` carries `capability`.
#[must_use]
pub const fn grants(role: Role, capability: Capability) -> bool {
    match capability {
        Capability::SubmitListing => matches!(role, Role::ServiceProvider),
        Capability::ReviewListing | Capability::ViewListingHistory => matches!(role, Role::Admin),
        Capability::BookAppointment | Capability::LeaveFeedback => matches!(role, Role::Customer),
        Capability::ManageAppointment => matches!(role, Role::ServiceProvider | Role::Admin),
        Capability::CancelAppointment | Capability::SendMessage | Capability::ReadMessage => true,
    }
}

/// Checks that `caller` holds `capability`.
///
/// # Errors
///
/// Returns [`MarketError::Forbidden`] when the role lacks it.
pub fn authorize(caller: &Caller, capability: Capability) -> Result<(), MarketError> {
    if grants(caller.role, capability) {
        Ok(())
    } else {
        tracing::debug!(user_id = %caller.user_id, role = %caller.role, ?capability, "capability denied");
        Err(MarketError::Forbidden(format!(
            "role {} may not {capability:?}",
            caller.role
        )))
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let user_id = header(USER_ID_HEADER)
            .ok_or_else(|| MarketError::Unauthenticated(format!("missing {USER_ID_HEADER} header")))?
            .parse::<uuid::Uuid>()
            .map_err(|_| MarketError::Unauthenticated(format!("{USER_ID_HEADER} is not a UUID")))?;
        let role = header(USER_ROLE_HEADER)
            .ok_or_else(|| MarketError::Unauthenticated(format!("missing {USER_ROLE_HEADER} header")))?
            .parse::<Role>()
            .map_err(MarketError::Unauthenticated)?;
        Ok(Self::new(UserId::from_uuid(user_id), role))
    }
}

/// Anonymous requests carry neither identity header; headers that are
/// present must still be valid.
impl<S> OptionalFromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(USER_ID_HEADER) && !parts.headers.contains_key(USER_ROLE_HEADER) {
            return Ok(None);
        }
        <Self as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}
