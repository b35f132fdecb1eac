//! [`Document`] implementations for the stored aggregates.

use uuid::Uuid;

use super::collection::Document;
use crate::domain::{Booking, Feedback, Listing, ListingId, Message};
use crate::error::MarketError;

impl Document for Listing {
    const COLLECTION: &'static str = "listings";

    fn key(&self) -> Uuid {
        *self.id().as_uuid()
    }

    fn public_id(&self) -> Option<String> {
        Listing::public_id(self).map(|p| p.to_string())
    }

    fn not_found(id: Uuid) -> MarketError {
        MarketError::ListingNotFound(ListingId::from_uuid(id))
    }
}

impl Document for Booking {
    const COLLECTION: &'static str = "bookings";

    fn key(&self) -> Uuid {
        *self.id().as_uuid()
    }

    fn not_found(id: Uuid) -> MarketError {
        MarketError::NotFound(format!("booking {id}"))
    }
}

impl Document for Feedback {
    const COLLECTION: &'static str = "feedback";

    fn key(&self) -> Uuid {
        *self.id.as_uuid()
    }
}

impl Document for Message {
    const COLLECTION: &'static str = "messages";

    fn key(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn not_found(id: Uuid) -> MarketError {
        MarketError::NotFound(format!("message {id}"))
    }
}
