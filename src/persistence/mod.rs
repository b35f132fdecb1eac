//! Persistence layer: versioned document collections and the PostgreSQL
//! backend behind them.
//!
//! Documents live in memory in [`Collection`]s and are written through to
//! a `documents` table with an optimistic version check. Domain events are
//! appended to an `events` table by a background recorder. The backend is
//! optional; without it the collections are purely in-memory.

pub mod collection;
pub mod documents;
pub mod models;
pub mod postgres;

pub use collection::{Collection, DEFAULT_STORE_TIMEOUT, Document};
pub use postgres::PostgresPersistence;
