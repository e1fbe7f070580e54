//! Reviews and aggregated ratings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BookingId, ListingId, ReviewId, UserId};

/// A review left after a completed booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub booking_id: BookingId,
    pub reviewer_id: UserId,
    pub reviewee_id: UserId,
    /// Set when the review also rates the listing.
    pub listing_id: Option<ListingId>,
    /// Rating from 1 to 5.
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Subjects whose rating this review contributes to.
    #[must_use]
    pub fn subjects(&self) -> Vec<RatingSubject> {
        let mut subjects = vec![RatingSubject::User(self.reviewee_id)];
        if let Some(listing_id) = self.listing_id {
            subjects.push(RatingSubject::Listing(listing_id));
        }
        subjects
    }
}

/// Entity carrying an aggregated rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum RatingSubject {
    User(UserId),
    Listing(ListingId),
}

impl fmt::Display for RatingSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Listing(id) => write!(f, "listing:{id}"),
        }
    }
}

/// Running sum and count of ratings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub sum: u64,
    pub count: u64,
}

impl RatingSummary {
    /// Folds a rating into the summary.
    pub fn add(&mut self, rating: u8) {
        self.sum += u64::from(rating);
        self.count += 1;
    }

    /// Recomputes a summary from a set of reviews.
    #[must_use]
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let mut summary = Self::default();
        for rating in ratings {
            summary.add(rating);
        }
        summary
    }

    /// Average rating, `None` when nothing has been rated.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}
