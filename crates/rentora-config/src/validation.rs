//! Startup validation of loaded configuration.

use crate::AppConfig;
use rentora_core::RentoraError;
use tracing::warn;

/// Rejects settings that would stall workers or sweeps.
pub fn validate_config(config: &AppConfig) -> Result<(), RentoraError> {
    let jobs = &config.jobs;
    if jobs.concurrency == 0 {
        return Err(invalid("jobs.concurrency must be at least 1"));
    }
    if let Some((queue, _)) = jobs.queue_concurrency.iter().find(|(_, n)| **n == 0) {
        return Err(invalid(format!(
            "jobs.queue_concurrency.{queue} must be at least 1"
        )));
    }
    if jobs.max_attempts == 0 {
        return Err(invalid("jobs.max_attempts must be at least 1"));
    }
    if jobs.poll_interval_ms == 0 || jobs.job_timeout_secs == 0 {
        return Err(invalid("jobs poll interval and timeout must be non-zero"));
    }
    if jobs.retry_base_delay_ms == 0 {
        return Err(invalid("jobs.retry_base_delay_ms must be non-zero"));
    }

    let sweeps = &config.sweeps;
    for (name, schedule) in sweeps.schedules() {
        if schedule.cron.is_none() && schedule.interval_secs == 0 {
            return Err(invalid(format!("sweeps.{name}.interval_secs must be non-zero")));
        }
    }
    if sweeps.flush_batch_size == 0 {
        return Err(invalid("sweeps.flush_batch_size must be at least 1"));
    }
    if sweeps.batch_size == 0 {
        return Err(invalid("sweeps.batch_size must be at least 1"));
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.enabled && (rate_limit.max_requests == 0 || rate_limit.window_ms == 0) {
        return Err(invalid("rate_limit max_requests and window_ms must be non-zero"));
    }

    if config.cache.enabled && config.cache.ttl_secs == 0 {
        return Err(invalid("cache.ttl_secs must be non-zero"));
    }

    if config.app.environment == "production" && !config.jobs.leader_election {
        warn!("Leader election disabled in production; every instance will fire sweeps");
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> RentoraError {
    RentoraError::Configuration(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.jobs.concurrency = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.sweeps.flush_batch_size = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.sweeps.return_reminders.interval_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.jobs.queue_concurrency.insert("bookings".into(), 0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_cron_allows_zero_interval() {
        let mut config = AppConfig::default();
        config.sweeps.auto_completion.interval_secs = 0;
        config.sweeps.auto_completion.cron = Some("0 0 * * * *".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_disabled_rate_limit_skips_checks() {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.max_requests = 0;
        assert!(validate_config(&config).is_ok());
    }
}
