//! Per-source circuit breakers with exponential backoff
//!
//! Each metadata source gets its own breaker so one failing service never
//! blocks the others. Repeated trips grow the cooldown exponentially up to
//! a ceiling; one successful half-open probe resets the backoff to base,
//! so a recovered source is not punished for historical outages.
//!
//! # State Machine
//!
//! ```text
//! Closed --[threshold consecutive failures]--> Open (trip count +1)
//! Open --[backoff(trip_count) elapsed]--> HalfOpen (one probe allowed)
//! HalfOpen --[probe succeeds]--> Closed (failures and trip count reset)
//! HalfOpen --[probe fails]--> Open (trip count +1, backoff doubles)
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests allowed
    Closed,
    /// Failing, requests blocked until the backoff elapses
    Open,
    /// Testing recovery: exactly one probing request allowed
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Breaker tuning shared by all sources
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Cooldown after the first trip
    pub backoff_base: Duration,
    /// Cooldown ceiling for repeated trips
    pub backoff_max: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            backoff_base: Duration::from_secs(300),
            backoff_max: Duration::from_secs(3600),
        }
    }
}

/// Point-in-time breaker statistics for the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub state: &'static str,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    pub trip_count: u32,
    pub seconds_until_retry: u64,
}

/// Failure tracking for a single metadata source
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: CircuitState,
    consecutive_failures: u32,
    total_failures: u64,
    total_successes: u64,
    /// Times the circuit has opened since the last recovery; scales the backoff
    trip_count: u32,
    last_failure: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            total_failures: 0,
            total_successes: 0,
            trip_count: 0,
            last_failure: None,
        }
    }

    /// Current cooldown: base * 2^(trips - 1), capped at the ceiling
    pub fn backoff(&self) -> Duration {
        if self.trip_count <= 1 {
            return self.config.backoff_base;
        }
        // Cap the shift so the multiplication cannot overflow
        let factor = 1u32 << (self.trip_count - 1).min(20);
        self.config
            .backoff_base
            .saturating_mul(factor)
            .min(self.config.backoff_max)
    }

    /// Check whether a request may go through, moving an expired Open
    /// circuit to HalfOpen (which admits exactly one probe).
    pub fn is_available(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = self
                    .last_failure
                    .map(|at| at.elapsed() >= self.backoff())
                    .unwrap_or(true);
                if cooled_down {
                    self.state = CircuitState::HalfOpen;
                    info!("Circuit breaker entering half-open state, testing service");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&mut self) {
        self.total_successes += 1;
        if self.state == CircuitState::HalfOpen {
            info!("Circuit breaker closing after successful test");
        }
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.trip_count = 0;
    }

    pub fn record_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.last_failure = Some(Instant::now());

        if self.state == CircuitState::HalfOpen {
            // Failed probe: reopen with a longer cooldown
            self.state = CircuitState::Open;
            self.trip_count += 1;
            warn!(
                "Circuit breaker reopening after failed test, backoff {:?}",
                self.backoff()
            );
        } else if self.consecutive_failures >= self.config.failure_threshold
            && self.state != CircuitState::Open
        {
            self.state = CircuitState::Open;
            self.trip_count += 1;
            warn!(
                "Circuit breaker opening after {} consecutive failures, backoff {:?}",
                self.consecutive_failures,
                self.backoff()
            );
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let seconds_until_retry = if self.state == CircuitState::Open {
            self.last_failure
                .map(|at| self.backoff().saturating_sub(at.elapsed()).as_secs())
                .unwrap_or(0)
        } else {
            0
        };

        CircuitBreakerStats {
            state: self.state.as_str(),
            consecutive_failures: self.consecutive_failures,
            total_failures: self.total_failures,
            total_successes: self.total_successes,
            trip_count: self.trip_count,
            seconds_until_retry,
        }
    }
}

/// Registry of circuit breakers, one per metadata source
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: HashMap<String, CircuitBreaker>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: HashMap::new(),
        }
    }

    fn breaker(&mut self, source_name: &str) -> &mut CircuitBreaker {
        self.breakers
            .entry(source_name.to_string())
            .or_insert_with(|| CircuitBreaker::new(self.config.clone()))
    }

    pub fn is_source_available(&mut self, source_name: &str) -> bool {
        self.breaker(source_name).is_available()
    }

    pub fn record_success(&mut self, source_name: &str) {
        self.breaker(source_name).record_success();
    }

    pub fn record_failure(&mut self, source_name: &str) {
        self.breaker(source_name).record_failure();
    }

    /// Statistics for all sources seen so far
    pub fn all_stats(&self) -> HashMap<String, CircuitBreakerStats> {
        self.breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.stats()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32, base_ms: u64, max_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            backoff_base: Duration::from_millis(base_ms),
            backoff_max: Duration::from_millis(max_ms),
        }
    }

    #[test]
    fn test_stays_closed_below_threshold() {
        let mut cb = CircuitBreaker::new(config(3, 50, 400));
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.is_available());
    }

    #[test]
    fn test_opens_at_threshold_and_blocks() {
        let mut cb = CircuitBreaker::new(config(3, 50, 400));
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.is_available());
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let mut cb = CircuitBreaker::new(config(3, 50, 400));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_after_backoff_then_closes_on_success() {
        let mut cb = CircuitBreaker::new(config(2, 30, 400));
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_available());

        std::thread::sleep(Duration::from_millis(40));
        // Cooldown elapsed: one probe allowed
        assert!(cb.is_available());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().trip_count, 0);
        // Backoff is back at base after recovery
        assert_eq!(cb.backoff(), Duration::from_millis(30));
    }

    #[test]
    fn test_backoff_doubles_on_failed_probe() {
        let mut cb = CircuitBreaker::new(config(2, 30, 400));
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.backoff(), Duration::from_millis(30));

        std::thread::sleep(Duration::from_millis(40));
        assert!(cb.is_available()); // half-open probe
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.backoff(), Duration::from_millis(60));

        // First cooldown no longer suffices
        std::thread::sleep(Duration::from_millis(40));
        assert!(!cb.is_available());
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.is_available());
    }

    #[test]
    fn test_backoff_is_capped() {
        let mut cb = CircuitBreaker::new(config(1, 100, 250));
        for _ in 0..10 {
            cb.record_failure();
            std::thread::sleep(Duration::from_millis(1));
            // Force re-open via failed probes without waiting out the
            // cooldown: drive trip count directly
            cb.state = CircuitState::HalfOpen;
        }
        assert!(cb.backoff() <= Duration::from_millis(250));
    }

    #[test]
    fn test_registry_tracks_sources_independently() {
        let mut registry = CircuitBreakerRegistry::new(config(2, 50, 400));

        registry.record_failure("HexDB.io");
        registry.record_failure("HexDB.io");
        registry.record_success("OpenSky");

        assert!(!registry.is_source_available("HexDB.io"));
        assert!(registry.is_source_available("OpenSky"));

        let stats = registry.all_stats();
        assert_eq!(stats["HexDB.io"].state, "open");
        assert_eq!(stats["HexDB.io"].trip_count, 1);
        assert_eq!(stats["OpenSky"].total_successes, 1);
    }

    #[test]
    fn test_stats_report_retry_countdown() {
        let mut cb = CircuitBreaker::new(config(1, 5000, 10000));
        cb.record_failure();
        let stats = cb.stats();
        assert_eq!(stats.state, "open");
        assert!(stats.seconds_until_retry <= 5);
    }
}
