//! Data Transfer Objects for REST request/response serialization.
//!
//! Identifiers travel as plain UUIDs and enums as their snake_case wire
//! names; domain types never cross the HTTP boundary directly.

pub mod booking_dto;
pub mod common_dto;
pub mod listing_dto;
pub mod message_dto;

pub use booking_dto::*;
pub use common_dto::*;
pub use listing_dto::*;
pub use message_dto::*;
