//! Collaborators the lifecycle calls out to: payments and search.

use async_trait::async_trait;
use rentora_core::{Booking, ListingId, RentoraResult};
use tracing::{debug, info};

/// Releases a completed booking's held payment to its owner.
///
/// Implementations must be idempotent by booking id: the payment job may be
/// delivered more than once.
#[async_trait]
pub trait PaymentReleaser: Send + Sync {
    async fn release(&self, booking: &Booking) -> RentoraResult<()>;
}

/// Logs the release; used until a payment gateway is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPaymentReleaser;

#[async_trait]
impl PaymentReleaser for LoggingPaymentReleaser {
    async fn release(&self, booking: &Booking) -> RentoraResult<()> {
        info!(
            booking_id = %booking.id,
            owner_id = %booking.owner_id,
            "Payment released"
        );
        Ok(())
    }
}

/// Keeps the listing search index current.
#[async_trait]
pub trait SearchIndexer: Send + Sync {
    async fn upsert_listing(&self, listing_id: ListingId) -> RentoraResult<()>;

    async fn remove_listing(&self, listing_id: ListingId) -> RentoraResult<()>;
}

/// No search backend is deployed yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSearchIndexer;

#[async_trait]
impl SearchIndexer for NoopSearchIndexer {
    async fn upsert_listing(&self, listing_id: ListingId) -> RentoraResult<()> {
        debug!(listing_id = %listing_id, "Search indexing disabled, skipping upsert");
        Ok(())
    }

    async fn remove_listing(&self, listing_id: ListingId) -> RentoraResult<()> {
        debug!(listing_id = %listing_id, "Search indexing disabled, skipping removal");
        Ok(())
    }
}
