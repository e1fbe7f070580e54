#![allow(dead_code)]

use chrono::{TimeDelta, Utc};
use rentora_core::{
    Booking, BookingStatus, Clock, ConditionReport, DamageEntry, DamageSeverity, ListingId,
    ManualClock, ReportId, ReportKind, User, UserRole,
};
use rentora_jobs::{InMemoryBroker, JobContext, JobData, JobQueue, QueueCounts};
use rentora_lifecycle::{LifecyclePolicy, LifecycleServices};
use rentora_repository::{
    BookingRepository, ConditionReportRepository, InMemoryStore, UserRepository,
};
use std::sync::Arc;
use std::time::Duration;

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub queue: JobQueue,
    pub services: LifecycleServices,
    pub renter: User,
    pub owner: User,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let broker = Arc::new(InMemoryBroker::new(100));
        let queue = JobQueue::new(broker, clock.clone(), 3);
        let services =
            LifecycleServices::from_store(store.clone(), queue.clone(), LifecyclePolicy::default());

        let renter = store
            .insert_user(User::new("Renter", UserRole::Renter).with_email("renter@example.com"))
            .await
            .unwrap();
        let owner = store
            .insert_user(User::new("Owner", UserRole::Owner).with_email("owner@example.com"))
            .await
            .unwrap();

        Self {
            store,
            clock,
            queue,
            services,
            renter,
            owner,
        }
    }

    /// Inserts a booking created `age` ago, starting in `start_in`, lasting three days.
    pub async fn booking(
        &self,
        status: BookingStatus,
        age: TimeDelta,
        start_in: TimeDelta,
    ) -> Booking {
        let now = self.clock.now();
        let start = now + start_in;
        let booking = Booking::new(
            status,
            now - age,
            start,
            start + TimeDelta::days(3),
            self.renter.id,
            self.owner.id,
            ListingId::new(),
        );
        self.store.insert_booking(booking).await.unwrap()
    }

    pub async fn return_report(&self, booking: &Booking, severities: &[DamageSeverity]) {
        self.store
            .insert_report(ConditionReport {
                id: ReportId::new(),
                booking_id: booking.id,
                kind: ReportKind::Return,
                completed: true,
                damages: severities
                    .iter()
                    .map(|s| DamageEntry {
                        description: "scuffed".into(),
                        severity: *s,
                    })
                    .collect(),
                created_at: self.clock.now(),
            })
            .await
            .unwrap();
    }

    pub async fn status(&self, booking: &Booking) -> BookingStatus {
        self.store.find_booking(booking.id).await.unwrap().unwrap().status
    }

    pub async fn counts(&self, queue: &str) -> QueueCounts {
        self.queue.counts(queue).await.unwrap()
    }
}

pub fn ctx() -> JobContext {
    let mut job = JobData::new(
        "bookings",
        "test",
        serde_json::Value::Null,
        3,
        Utc::now(),
        Duration::ZERO,
    );
    job.attempts = 1;
    JobContext::new(&job, "test-worker", Utc::now())
}
