//! # salon-gateway
//!
//! REST and WebSocket backend for a beauty-services marketplace.
//!
//! Providers submit services and packages, admins approve them (assigning
//! public ids such as `SRV_001`), customers book free slots, leave
//! feedback and message providers.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── ListingService / BookingService / MessageService (service/)
//!     ├── Caller + capability policy (auth)
//!     ├── EventBus (domain/)
//!     │
//!     ├── Listing aggregate, approval workflow, slot engine (domain/)
//!     │
//!     └── Versioned collections → PostgreSQL (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
