//! Explicit construction of every long-lived component.

use crate::routes::{create_router, AppState};
use anyhow::Context;
use axum::Router;
use deadpool_redis::Pool;
use metrics_exporter_prometheus::PrometheusHandle;
use rentora_config::{AppConfig, StoreKind};
use rentora_core::{SharedClock, SystemClock};
use rentora_events::EventBus;
use rentora_jobs::{
    create_pool, AlwaysLeader, HandlerRegistry, InMemoryBroker, JobQueue, LeaderElection,
    QueueBroker, RedisBroker, RedisLeaderLock, Scheduler, WorkerPool,
};
use rentora_lifecycle::{LifecyclePolicy, LifecycleServices};
use rentora_notify::NotificationDispatcher;
use rentora_repository::{
    CacheInterface, CachedUserRepository, InMemoryCache, InMemoryStore, RedisCache, UserRepository,
};
use rentora_resilience::{
    InMemoryRateLimitStore, RateLimitPolicy, RateLimitStore, RateLimiter, RedisRateLimitStore,
};
use std::sync::Arc;
use tracing::info;

/// The assembled scheduler process.
pub struct App {
    pub queue: JobQueue,
    pub services: LifecycleServices,
    pub events: EventBus,
    pub workers: WorkerPool,
    pub scheduler: Scheduler,
    pub limiter: Option<RateLimiter>,
    metrics: Option<PrometheusHandle>,
}

fn needs_redis(config: &AppConfig) -> bool {
    config.jobs.broker == StoreKind::Redis
        || config.jobs.leader_election
        || (config.rate_limit.enabled && config.rate_limit.store == StoreKind::Redis)
        || (config.cache.enabled && config.cache.backend == StoreKind::Redis)
}

fn redis_pool(pool: Option<&Pool>) -> anyhow::Result<Pool> {
    pool.cloned().context("Redis pool not initialised")
}

impl App {
    /// Builds every component from `config`. Nothing runs until [`App::start`].
    pub async fn build(
        config: &AppConfig,
        metrics: Option<PrometheusHandle>,
    ) -> anyhow::Result<Self> {
        let clock: SharedClock = Arc::new(SystemClock);

        let pool = if needs_redis(config) {
            Some(create_pool(&config.redis).await.context("connecting to Redis")?)
        } else {
            None
        };

        let broker: Arc<dyn QueueBroker> = match config.jobs.broker {
            StoreKind::Memory => {
                Arc::new(InMemoryBroker::new(config.jobs.retained_terminal_jobs))
            }
            StoreKind::Redis => Arc::new(RedisBroker::new(
                redis_pool(pool.as_ref())?,
                config.jobs.key_prefix.clone(),
                config.jobs.retained_terminal_jobs,
            )),
        };
        let queue = JobQueue::from_config(Arc::clone(&broker), Arc::clone(&clock), &config.jobs);
        info!(broker = ?config.jobs.broker, "Job queue ready");

        let store = Arc::new(InMemoryStore::new());
        let users: Arc<dyn UserRepository> = if config.cache.enabled {
            let cache: Arc<dyn CacheInterface> = match config.cache.backend {
                StoreKind::Memory => Arc::new(InMemoryCache::new()),
                StoreKind::Redis => Arc::new(RedisCache::new(
                    redis_pool(pool.as_ref())?,
                    config.cache.key_prefix.clone(),
                )),
            };
            Arc::new(CachedUserRepository::new(store.clone(), cache, config.cache.ttl()))
        } else {
            store.clone()
        };

        let dispatcher = Arc::new(NotificationDispatcher::new(
            users,
            store.clone(),
            config.notifications.clone(),
            Arc::clone(&clock),
        ));
        let services = LifecycleServices::from_store(
            Arc::clone(&store),
            queue.clone(),
            LifecyclePolicy::from(&config.sweeps),
        );
        let events = services.event_registry()?.build();

        let mut handlers = HandlerRegistry::new();
        rentora_notify::register_handlers(
            &mut handlers,
            &dispatcher,
            store.clone(),
            Arc::clone(&clock),
        )?;
        services.register_handlers(&mut handlers, events.clone())?;
        info!(handlers = handlers.len(), "Job handlers registered");

        let workers = WorkerPool::from_config(
            broker,
            Arc::new(handlers),
            Arc::clone(&clock),
            &config.jobs,
            config.server.shutdown_timeout(),
        );

        let leader: Arc<dyn LeaderElection> = if config.jobs.leader_election {
            Arc::new(RedisLeaderLock::new(
                redis_pool(pool.as_ref())?,
                config.jobs.key_prefix.clone(),
                config.jobs.leader_lock_ttl(),
            ))
        } else {
            Arc::new(AlwaysLeader)
        };
        let scheduler = Scheduler::new(
            services.trigger_table(&config.sweeps)?,
            leader,
            Arc::clone(&clock),
            config.jobs.leader_lock_ttl(),
        );

        let limiter = if config.rate_limit.enabled {
            let store: Arc<dyn RateLimitStore> = match config.rate_limit.store {
                StoreKind::Memory => Arc::new(InMemoryRateLimitStore::new()),
                StoreKind::Redis => Arc::new(RedisRateLimitStore::new(
                    redis_pool(pool.as_ref())?,
                    config.rate_limit.key_prefix.clone(),
                )),
            };
            Some(RateLimiter::new(
                store,
                RateLimitPolicy::from(&config.rate_limit),
                Arc::clone(&clock),
            ))
        } else {
            None
        };

        Ok(Self {
            queue,
            services,
            events,
            workers,
            scheduler,
            limiter,
            metrics,
        })
    }

    /// Operational router over this process's queue and event bus.
    pub fn router(&self) -> Router {
        let state = AppState {
            queue: self.queue.clone(),
            queues: Arc::new(self.workers.queues()),
            events: self.events.clone(),
            metrics: self.metrics.clone(),
        };
        create_router(state, self.limiter.clone())
    }

    /// Starts the workers and the trigger scheduler.
    pub fn start(&self) {
        self.workers.start();
        self.scheduler.start();
    }

    /// Stops triggers first so no new sweep work arrives, then drains workers.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.workers.shutdown().await;
    }
}
