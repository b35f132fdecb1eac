//! Service layer: business logic orchestration.
//!
//! Services check capabilities, run domain transitions against the
//! persistence collections and emit events through the
//! [`super::domain::EventBus`].

pub mod booking_service;
pub mod event_recorder;
pub mod id_allocator;
pub mod idempotency;
pub mod listing_service;
pub mod message_service;

pub use booking_service::BookingService;
pub use id_allocator::IdAllocator;
pub use idempotency::IdempotencyCache;
pub use listing_service::ListingService;
pub use message_service::MessageService;
