//! Server startup utilities.

use tracing::info;

/// Prints the startup banner.
pub fn print_banner() {
    info!(
        r"
    ____             __
   / __ \___  ____  / /_____  _________ _
  / /_/ / _ \/ __ \/ __/ __ \/ ___/ __ `/
 / _, _/  __/ / / / /_/ /_/ / /  / /_/ /
/_/ |_|\___/_/ /_/\__/\____/_/   \__,_/

                 Booking Lifecycle Scheduler
    "
    );
}

/// Prints what this instance runs and where it listens.
pub fn print_startup_info(addr: &str, queues: &[String], triggers: &[&str]) {
    let separator = "=".repeat(60);
    info!("{}", separator);
    info!("Health:    http://{}/health", addr);
    info!("Queues:    http://{}/health/queues", addr);
    info!("Metrics:   http://{}/metrics", addr);
    info!("Workers:   {}", queues.join(", "));
    info!("Triggers:  {}", triggers.join(", "));
    info!("{}", separator);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_startup_info_does_not_panic() {
        print_banner();
        print_startup_info("0.0.0.0:8080", &["bookings".to_string()], &["expiration"]);
    }
}
