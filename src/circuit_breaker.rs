use failsafe::{backoff, failure_policy, Config, StateMachine};
use std::time::Duration;

/// Breaker type shared by the upstream HTTP clients.
pub type UpstreamBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates a circuit breaker for an upstream map or geo service.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// While OPEN, calls are rejected without reaching the network; clients
/// report the rejection as the source being unavailable.
pub fn create_upstream_circuit_breaker() -> UpstreamBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}
