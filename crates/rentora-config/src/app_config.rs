//! Application configuration structures.

use rentora_core::telemetry::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Operational HTTP surface.
    #[serde(default)]
    pub server: ServerConfig,

    /// Redis connection shared by the broker, cache and rate limiter.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Job queue and worker settings.
    #[serde(default)]
    pub jobs: JobsConfig,

    /// Lifecycle sweep schedules and time windows.
    #[serde(default)]
    pub sweeps: SweepsConfig,

    /// Notification channel switches.
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// HTTP rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Read-through cache for user profiles.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetadata {
    pub name: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "rentora-scheduler".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Operational HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Time allowed for in-flight jobs to finish on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerConfig {
    /// Returns the listen address.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Redis connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

const fn default_pool_size() -> usize {
    10
}

const fn default_connect_timeout() -> u64 {
    5
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl RedisConfig {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Backing store selection shared by the broker, cache and rate limiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Redis,
}

/// Job queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Broker backing the queues.
    #[serde(default)]
    pub broker: StoreKind,

    /// Key prefix for all broker keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Jobs processed at once per queue.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-queue overrides of `concurrency`.
    #[serde(default)]
    pub queue_concurrency: HashMap<String, usize>,

    /// Idle sleep between empty polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Handler timeout.
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    /// Attempts before a job fails terminally.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_secs: u64,

    /// Adds up to 10% random jitter to retry delays.
    #[serde(default)]
    pub retry_jitter: bool,

    /// Terminal-failed jobs retained per queue for inspection.
    #[serde(default = "default_retained_terminal")]
    pub retained_terminal_jobs: usize,

    /// Use a Redis lock so only one instance fires sweeps.
    #[serde(default)]
    pub leader_election: bool,

    #[serde(default = "default_leader_ttl")]
    pub leader_lock_ttl_secs: u64,
}

fn default_key_prefix() -> String {
    "rentora".to_string()
}

const fn default_concurrency() -> usize {
    1
}

const fn default_poll_interval() -> u64 {
    250
}

const fn default_job_timeout() -> u64 {
    300
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_retry_base_delay() -> u64 {
    1000
}

const fn default_retry_max_delay() -> u64 {
    3600
}

const fn default_retained_terminal() -> usize {
    1000
}

const fn default_leader_ttl() -> u64 {
    30
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            broker: StoreKind::default(),
            key_prefix: default_key_prefix(),
            concurrency: default_concurrency(),
            queue_concurrency: HashMap::new(),
            poll_interval_ms: default_poll_interval(),
            job_timeout_secs: default_job_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_secs: default_retry_max_delay(),
            retry_jitter: false,
            retained_terminal_jobs: default_retained_terminal(),
            leader_election: false,
            leader_lock_ttl_secs: default_leader_ttl(),
        }
    }
}

impl JobsConfig {
    /// Concurrency for a named queue.
    #[must_use]
    pub fn concurrency_for(&self, queue: &str) -> usize {
        self.queue_concurrency
            .get(queue)
            .copied()
            .unwrap_or(self.concurrency)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    #[must_use]
    pub const fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    #[must_use]
    pub const fn retry_max_delay(&self) -> Duration {
        Duration::from_secs(self.retry_max_delay_secs)
    }

    #[must_use]
    pub const fn leader_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.leader_lock_ttl_secs)
    }
}

/// When a sweep fires: a fixed interval, or a cron expression if given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSchedule {
    pub interval_secs: u64,
    /// Six-field cron expression; takes precedence over the interval.
    #[serde(default)]
    pub cron: Option<String>,
}

impl SweepSchedule {
    #[must_use]
    pub const fn every_secs(interval_secs: u64) -> Self {
        Self {
            interval_secs,
            cron: None,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Lifecycle sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepsConfig {
    /// Disables every sweep trigger when false.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_expiration_schedule")]
    pub expiration: SweepSchedule,

    #[serde(default = "default_hourly")]
    pub upcoming_reminders: SweepSchedule,

    #[serde(default = "default_six_hourly")]
    pub return_reminders: SweepSchedule,

    #[serde(default = "default_hourly")]
    pub auto_completion: SweepSchedule,

    #[serde(default = "default_six_hourly")]
    pub rating_reconciliation: SweepSchedule,

    #[serde(default = "default_flush_schedule")]
    pub notification_flush: SweepSchedule,

    /// Scheduled notifications claimed per flush tick.
    #[serde(default = "default_flush_batch")]
    pub flush_batch_size: usize,

    /// Age after which an unpaid booking expires.
    #[serde(default = "default_pending_expiry")]
    pub pending_expiry_mins: u64,

    /// How far ahead of start or end a reminder goes out.
    #[serde(default = "default_reminder_lead")]
    pub reminder_lead_hours: u64,

    /// Time after `end_date` before a returned booking may auto-complete.
    #[serde(default = "default_inspection_grace")]
    pub inspection_grace_hours: u64,

    /// Delay before the payment-release job becomes eligible.
    #[serde(default = "default_payment_release_delay")]
    pub payment_release_delay_secs: u64,

    /// Bookings selected per sweep query.
    #[serde(default = "default_sweep_batch")]
    pub batch_size: usize,
}

const fn default_true() -> bool {
    true
}

const fn default_expiration_schedule() -> SweepSchedule {
    SweepSchedule::every_secs(5 * 60)
}

const fn default_hourly() -> SweepSchedule {
    SweepSchedule::every_secs(60 * 60)
}

const fn default_six_hourly() -> SweepSchedule {
    SweepSchedule::every_secs(6 * 60 * 60)
}

const fn default_flush_schedule() -> SweepSchedule {
    SweepSchedule::every_secs(60)
}

const fn default_flush_batch() -> usize {
    100
}

const fn default_pending_expiry() -> u64 {
    30
}

const fn default_reminder_lead() -> u64 {
    24
}

const fn default_inspection_grace() -> u64 {
    48
}

const fn default_payment_release_delay() -> u64 {
    5
}

const fn default_sweep_batch() -> usize {
    500
}

impl Default for SweepsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expiration: default_expiration_schedule(),
            upcoming_reminders: default_hourly(),
            return_reminders: default_six_hourly(),
            auto_completion: default_hourly(),
            rating_reconciliation: default_six_hourly(),
            notification_flush: default_flush_schedule(),
            flush_batch_size: default_flush_batch(),
            pending_expiry_mins: default_pending_expiry(),
            reminder_lead_hours: default_reminder_lead(),
            inspection_grace_hours: default_inspection_grace(),
            payment_release_delay_secs: default_payment_release_delay(),
            batch_size: default_sweep_batch(),
        }
    }
}

impl SweepsConfig {
    /// All sweep schedules paired with their trigger names.
    #[must_use]
    pub fn schedules(&self) -> [(&'static str, &SweepSchedule); 6] {
        [
            ("expiration", &self.expiration),
            ("upcoming_reminders", &self.upcoming_reminders),
            ("return_reminders", &self.return_reminders),
            ("auto_completion", &self.auto_completion),
            ("rating_reconciliation", &self.rating_reconciliation),
            ("notification_flush", &self.notification_flush),
        ]
    }
}

/// Notification channel switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub email_enabled: bool,
    #[serde(default = "default_true")]
    pub push_enabled: bool,
    #[serde(default)]
    pub sms_enabled: bool,
    #[serde(default = "default_true")]
    pub in_app_enabled: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            email_enabled: true,
            push_enabled: true,
            sms_enabled: false,
            in_app_enabled: true,
        }
    }
}

/// Sliding-window rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Block a subject for this long once it exceeds the window.
    #[serde(default)]
    pub block_duration_ms: Option<u64>,
    #[serde(default)]
    pub store: StoreKind,
    #[serde(default = "default_rate_limit_prefix")]
    pub key_prefix: String,
}

const fn default_max_requests() -> u64 {
    100
}

const fn default_window_ms() -> u64 {
    60_000
}

fn default_rate_limit_prefix() -> String {
    "rentora:ratelimit".to_string()
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            block_duration_ms: None,
            store: StoreKind::default(),
            key_prefix: default_rate_limit_prefix(),
        }
    }
}

/// Read cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub backend: StoreKind,
    #[serde(default = "default_cache_prefix")]
    pub key_prefix: String,
}

const fn default_cache_ttl() -> u64 {
    15 * 60
}

fn default_cache_prefix() -> String {
    "rentora:cache".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
            backend: StoreKind::default(),
            key_prefix: default_cache_prefix(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
