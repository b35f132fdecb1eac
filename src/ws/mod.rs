//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The endpoint at `/ws` streams [`crate::domain::ListingEvent`]s for
//! the listings a client subscribed to and answers status queries.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
