//! Trigger scheduler with distributed leader election.
//!
//! Each named trigger fires on a fixed interval or a cron expression. Only
//! the instance holding leadership fires; the others stay idle until the
//! leader's lock lapses. A trigger is not fired at startup, and a slow run
//! does not hold back the next tick.

use crate::error::{JobError, JobResult};
use crate::metrics::JobMetrics;
use crate::redis::RedisKeys;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use deadpool_redis::Pool;
use futures::FutureExt;
use parking_lot::Mutex;
use redis::AsyncCommands;
use rentora_config::SweepSchedule;
use rentora_core::SharedClock;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval, interval_at, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// When a trigger fires.
#[derive(Debug, Clone)]
pub enum TriggerSchedule {
    Interval(Duration),
    Cron(Box<Schedule>),
}

impl TriggerSchedule {
    pub fn every(period: Duration) -> Self {
        Self::Interval(period)
    }

    /// Parses a six-field cron expression.
    pub fn cron(expr: &str) -> JobResult<Self> {
        let schedule = Schedule::from_str(expr)
            .map_err(|e| {
                JobError::Configuration(format!("Invalid cron expression '{expr}': {e}"))
            })?;
        Ok(Self::Cron(Box::new(schedule)))
    }

    /// Cron takes precedence over the interval.
    pub fn from_config(config: &SweepSchedule) -> JobResult<Self> {
        match &config.cron {
            Some(expr) => Self::cron(expr),
            None => Ok(Self::Interval(config.interval())),
        }
    }

    /// First firing strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Interval(period) => chrono::TimeDelta::from_std(*period)
                .ok()
                .and_then(|p| after.checked_add_signed(p)),
            Self::Cron(schedule) => schedule.after(&after).next(),
        }
    }
}

/// Work run when a trigger fires.
#[async_trait]
pub trait TriggerAction: Send + Sync {
    async fn fire(&self) -> JobResult<()>;
}

#[derive(Clone)]
struct Trigger {
    name: String,
    schedule: TriggerSchedule,
    action: Arc<dyn TriggerAction>,
}

/// Named triggers, unique by name.
#[derive(Clone, Default)]
pub struct TriggerTable {
    triggers: Vec<Trigger>,
}

impl TriggerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        schedule: TriggerSchedule,
        action: Arc<dyn TriggerAction>,
    ) -> JobResult<()> {
        let name = name.into();
        if self.triggers.iter().any(|t| t.name == name) {
            return Err(JobError::Scheduler(format!("Duplicate trigger: {name}")));
        }
        if matches!(schedule, TriggerSchedule::Interval(p) if p.is_zero()) {
            return Err(JobError::Scheduler(format!("Trigger {name} has a zero interval")));
        }
        info!(trigger = %name, schedule = ?schedule, "Registered trigger");
        self.triggers.push(Trigger {
            name,
            schedule,
            action,
        });
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.triggers.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    fn get(&self, name: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.name == name)
    }
}

/// Decides which instance fires triggers.
#[async_trait]
pub trait LeaderElection: Send + Sync {
    /// Acquires or refreshes leadership. Returns whether this instance leads.
    async fn try_acquire(&self) -> JobResult<bool>;

    async fn release(&self) -> JobResult<()>;

    fn is_leader(&self) -> bool;
}

/// Single-instance deployments: always the leader.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysLeader;

#[async_trait]
impl LeaderElection for AlwaysLeader {
    async fn try_acquire(&self) -> JobResult<bool> {
        Ok(true)
    }

    async fn release(&self) -> JobResult<()> {
        Ok(())
    }

    fn is_leader(&self) -> bool {
        true
    }
}

const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Leadership held as a Redis key with a TTL.
pub struct RedisLeaderLock {
    pool: Pool,
    key: String,
    id: String,
    ttl: Duration,
    is_leader: AtomicBool,
}

impl RedisLeaderLock {
    pub fn new(pool: Pool, key_prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            pool,
            key: RedisKeys::new(key_prefix).leader_lock(),
            id: format!("scheduler-{}", Uuid::new_v4()),
            ttl,
            is_leader: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl LeaderElection for RedisLeaderLock {
    async fn try_acquire(&self) -> JobResult<bool> {
        let mut conn = self.pool.get().await?;
        let ttl_secs = self.ttl.as_secs().max(1);

        let acquired: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(&self.id)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut *conn)
            .await?;

        if acquired.is_some() {
            if !self.is_leader.swap(true, Ordering::SeqCst) {
                info!(scheduler_id = %self.id, "Acquired scheduler leadership");
            }
            return Ok(true);
        }

        let current: Option<String> = conn.get(&self.key).await?;
        if current.as_deref() == Some(self.id.as_str()) {
            let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
            let _: () = conn.expire(&self.key, ttl).await?;
            self.is_leader.store(true, Ordering::SeqCst);
            return Ok(true);
        }

        if self.is_leader.swap(false, Ordering::SeqCst) {
            warn!(scheduler_id = %self.id, "Lost scheduler leadership");
        }
        Ok(false)
    }

    async fn release(&self) -> JobResult<()> {
        if !self.is_leader.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut conn = self.pool.get().await?;
        let _: i32 = redis::Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&self.id)
            .invoke_async(&mut *conn)
            .await?;
        info!(scheduler_id = %self.id, "Released scheduler leadership");
        Ok(())
    }

    fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }
}

/// Fires triggers while this instance leads.
pub struct Scheduler {
    table: Arc<TriggerTable>,
    leader: Arc<dyn LeaderElection>,
    clock: SharedClock,
    leader_refresh: Duration,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    /// In-flight trigger runs, drained on shutdown.
    runs: Arc<Mutex<JoinSet<()>>>,
}

impl Scheduler {
    pub fn new(
        table: TriggerTable,
        leader: Arc<dyn LeaderElection>,
        clock: SharedClock,
        leader_ttl: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            table: Arc::new(table),
            leader,
            clock,
            leader_refresh: (leader_ttl / 3).max(Duration::from_secs(1)),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
            runs: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub fn is_leader(&self) -> bool {
        self.leader.is_leader()
    }

    pub fn trigger_names(&self) -> Vec<&str> {
        self.table.names()
    }

    /// Spawns the leadership loop and one loop per trigger.
    pub fn start(&self) {
        let mut handles = self.handles.lock();
        handles.push(tokio::spawn(leadership_loop(
            Arc::clone(&self.leader),
            self.leader_refresh,
            self.shutdown_tx.subscribe(),
        )));

        for trigger in &self.table.triggers {
            let runner = TriggerRunner {
                trigger: trigger.clone(),
                leader: Arc::clone(&self.leader),
                runs: Arc::clone(&self.runs),
            };
            let rx = self.shutdown_tx.subscribe();
            let handle = match &trigger.schedule {
                TriggerSchedule::Interval(period) => {
                    tokio::spawn(interval_loop(runner, *period, rx))
                }
                TriggerSchedule::Cron(_) => {
                    tokio::spawn(cron_loop(runner, Arc::clone(&self.clock), rx))
                }
            };
            handles.push(handle);
        }
        info!(triggers = self.table.len(), "Scheduler started");
    }

    /// Runs a trigger's action now, regardless of leadership.
    pub async fn fire_now(&self, name: &str) -> JobResult<()> {
        let trigger = self
            .table
            .get(name)
            .ok_or_else(|| JobError::NotFound(format!("trigger {name}")))?;
        trigger.action.fire().await
    }

    pub fn stop(&self) {
        info!("Stopping scheduler...");
        let _ = self.shutdown_tx.send(());
    }

    /// Stops every loop, waits for in-flight runs and releases leadership.
    pub async fn shutdown(&self) {
        self.stop();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler task ended abnormally");
            }
        }

        // Loops are gone, so nothing adds to the set past this point.
        let mut runs = std::mem::take(&mut *self.runs.lock());
        if !runs.is_empty() {
            info!(runs = runs.len(), "Waiting for in-flight trigger runs");
        }
        while let Some(result) = runs.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Trigger run ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }
}

async fn leadership_loop(
    leader: Arc<dyn LeaderElection>,
    refresh: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(refresh);
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                match leader.try_acquire().await {
                    Ok(is_leader) => JobMetrics::leader(is_leader),
                    Err(e) => error!(error = %e, "Failed to check leadership"),
                }
            }
        }
    }
    if let Err(e) = leader.release().await {
        warn!(error = %e, "Failed to release leadership on shutdown");
    }
    JobMetrics::leader(false);
}

async fn interval_loop(
    runner: TriggerRunner,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => runner.dispatch(),
        }
    }
}

async fn cron_loop(
    runner: TriggerRunner,
    clock: SharedClock,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let now = clock.now();
        let Some(next) = runner.trigger.schedule.next_after(now) else {
            warn!(trigger = %runner.trigger.name, "Cron schedule has no further firings");
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tokio::select! {
            _ = shutdown.recv() => break,
            () = tokio::time::sleep(wait) => runner.dispatch(),
        }
    }
}

/// Everything a trigger loop needs to start a run.
struct TriggerRunner {
    trigger: Trigger,
    leader: Arc<dyn LeaderElection>,
    runs: Arc<Mutex<JoinSet<()>>>,
}

impl TriggerRunner {
    /// Starts one run in the background. Runs may overlap.
    fn dispatch(&self) {
        if !self.leader.is_leader() {
            debug!(trigger = %self.trigger.name, "Not the leader, skipping trigger");
            return;
        }
        let span = info_span!("sweep", trigger = %self.trigger.name);
        let run = fire(self.trigger.clone()).instrument(span);

        let mut runs = self.runs.lock();
        while runs.try_join_next().is_some() {}
        runs.spawn(run);
    }
}

async fn fire(trigger: Trigger) {
    let started = Instant::now();
    let outcome = AssertUnwindSafe(trigger.action.fire()).catch_unwind().await;
    let ok = match outcome {
        Ok(Ok(())) => {
            debug!(elapsed_ms = started.elapsed().as_millis(), "Trigger completed");
            true
        }
        Ok(Err(e)) => {
            error!(error = %e, "Trigger failed");
            false
        }
        Err(_) => {
            error!("Trigger panicked");
            false
        }
    };
    JobMetrics::trigger_fired(&trigger.name, started.elapsed(), ok);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentora_core::SystemClock;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct Counter(AtomicU32);

    #[async_trait]
    impl TriggerAction for Counter {
        async fn fire(&self) -> JobResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Follower;

    #[async_trait]
    impl LeaderElection for Follower {
        async fn try_acquire(&self) -> JobResult<bool> {
            Ok(false)
        }

        async fn release(&self) -> JobResult<()> {
            Ok(())
        }

        fn is_leader(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_table_rejects_duplicates_and_zero_intervals() {
        let mut table = TriggerTable::new();
        let action = Arc::new(Counter::default());
        table
            .add("expiration", TriggerSchedule::every(Duration::from_secs(300)), action.clone())
            .unwrap();
        assert!(table
            .add("expiration", TriggerSchedule::every(Duration::from_secs(60)), action.clone())
            .is_err());
        assert!(table
            .add("broken", TriggerSchedule::every(Duration::ZERO), action)
            .is_err());
        assert_eq!(table.names(), vec!["expiration"]);
    }

    #[test]
    fn test_schedule_from_config() {
        let interval = TriggerSchedule::from_config(&SweepSchedule::every_secs(60)).unwrap();
        let now = Utc::now();
        assert_eq!(interval.next_after(now), Some(now + chrono::Duration::seconds(60)));

        let cron = SweepSchedule {
            interval_secs: 60,
            cron: Some("0 0 * * * *".into()),
        };
        let schedule = TriggerSchedule::from_config(&cron).unwrap();
        assert!(matches!(schedule, TriggerSchedule::Cron(_)));
        let next = schedule.next_after(now).unwrap();
        assert!(next > now && next <= now + chrono::Duration::hours(1));

        assert!(TriggerSchedule::cron("not a cron").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_trigger_skips_startup_and_fires_per_period() {
        let counter = Arc::new(Counter::default());
        let mut table = TriggerTable::new();
        table
            .add("flush", TriggerSchedule::every(Duration::from_secs(60)), counter.clone())
            .unwrap();
        let scheduler = Scheduler::new(
            table,
            Arc::new(AlwaysLeader),
            Arc::new(SystemClock),
            Duration::from_secs(30),
        );
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        scheduler.shutdown().await;
    }

    #[derive(Default)]
    struct SlowSweep {
        started: AtomicU32,
        finished: AtomicU32,
    }

    #[async_trait]
    impl TriggerAction for SlowSweep {
        async fn fire(&self) -> JobResult<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(30)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_run() {
        let sweep = Arc::new(SlowSweep::default());
        let mut table = TriggerTable::new();
        table
            .add("expiration", TriggerSchedule::every(Duration::from_secs(10)), sweep.clone())
            .unwrap();
        let scheduler = Scheduler::new(
            table,
            Arc::new(AlwaysLeader),
            Arc::new(SystemClock),
            Duration::from_secs(30),
        );
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(sweep.started.load(Ordering::SeqCst), 1);
        assert_eq!(sweep.finished.load(Ordering::SeqCst), 0);

        scheduler.shutdown().await;
        assert_eq!(sweep.started.load(Ordering::SeqCst), 1);
        assert_eq!(sweep.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follower_never_fires() {
        let counter = Arc::new(Counter::default());
        let mut table = TriggerTable::new();
        table
            .add("flush", TriggerSchedule::every(Duration::from_secs(10)), counter.clone())
            .unwrap();
        let scheduler = Scheduler::new(
            table,
            Arc::new(Follower),
            Arc::new(SystemClock),
            Duration::from_secs(30),
        );
        scheduler.start();
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        scheduler.fire_now("flush").await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert!(scheduler.fire_now("missing").await.is_err());
        scheduler.shutdown().await;
    }
}
