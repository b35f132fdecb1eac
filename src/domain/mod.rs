//! Domain layer: listings, the approval workflow, bookings and events.
//!
//! Everything here is synchronous and storage-agnostic. Services in
//! [`crate::service`] load documents from the store, call these methods
//! under the document lock and write the result back.

pub mod approval;
pub mod audit;
pub mod availability;
pub mod booking;
pub mod event_bus;
pub mod feedback;
pub mod ids;
pub mod listing;
pub mod listing_event;
pub mod message;
pub mod public_id;
pub mod validation;

pub use approval::{AdminAction, AdminDecision, Decision, DecisionOutcome, PendingChange, RequestType};
pub use audit::{AuditAction, AuditEntry, AuditSnapshot, AuditTrail};
pub use availability::{TimeSlot, WorkingHours, WorkingWindow};
pub use booking::{Booking, BookingStatus};
pub use event_bus::EventBus;
pub use feedback::{Feedback, FeedbackSummary};
pub use ids::{BookingId, FeedbackId, ListingId, MessageId, UserId};
pub use listing::{
    Category, Listing, ListingContent, ListingPatch, ListingStatus, LocationMode, PricedOption,
    Pricing, ServiceType, StatusDisplay,
};
pub use listing_event::ListingEvent;
pub use message::Message;
pub use public_id::{ListingKind, PublicId};
pub use validation::{ListingDraft, PricingDraft};
