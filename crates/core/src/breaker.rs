//! Circuit breakers for external dependencies
//!
//! Tracks failures per dependency and temporarily fast-fails calls to
//! dependencies that are down, letting the pipeline degrade to cheap
//! fallbacks instead of stacking up timeouts.

use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{Result, SearchError};

/// Breaker tuning for one dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    pub threshold: u32,
    /// How long the circuit stays open before a probe is admitted
    pub timeout: Duration,
    /// Consecutive successes in half-open required to close
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            timeout: Duration::from_secs(20),
            success_threshold: 2,
        }
    }
}

/// Circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failures: u32,
    successes: u32,
    last_failure: Option<Instant>,
    calls: u64,
    rejected: u64,
}

/// Point-in-time view of a breaker, for the health endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: BreakerState,
    pub failures: u32,
    pub calls: u64,
    pub rejected: u64,
}

/// Thread-safe circuit breaker around one dependency
///
/// State machine: CLOSED counts consecutive failures and opens at the
/// threshold; OPEN rejects everything until the timeout elapses, then the
/// next call transitions to HALF_OPEN; HALF_OPEN admits calls and closes
/// after `success_threshold` consecutive successes, re-opening on any
/// failure. Successes in CLOSED pay down the failure counter one at a time.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                successes: 0,
                last_failure: None,
                calls: 0,
                rejected: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a call may proceed right now. Counts the attempt and performs
    /// the OPEN -> HALF_OPEN transition when the cooldown has elapsed.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner
                    .last_failure
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed > self.config.timeout {
                    info!(breaker = %self.name, "circuit half-open, admitting probe");
                    inner.state = BreakerState::HalfOpen;
                    inner.successes = 0;
                    true
                } else {
                    inner.rejected += 1;
                    false
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.failures = inner.failures.saturating_sub(1);
            }
            BreakerState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    info!(breaker = %self.name, "circuit closed after successful probes");
                    inner.state = BreakerState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Record a failed call; may trip the circuit
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure = Some(Instant::now());
        match inner.state {
            BreakerState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.config.threshold {
                    warn!(
                        breaker = %self.name,
                        failures = inner.failures,
                        cooldown_ms = self.config.timeout.as_millis() as u64,
                        "circuit opened"
                    );
                    inner.state = BreakerState::Open;
                }
            }
            BreakerState::HalfOpen => {
                warn!(breaker = %self.name, "probe failed, circuit re-opened");
                inner.state = BreakerState::Open;
                inner.successes = 0;
            }
            BreakerState::Open => {}
        }
    }

    /// Current state without counting a call
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failures: inner.failures,
            calls: inner.calls,
            rejected: inner.rejected,
        }
    }

    /// Run `op` under the breaker. On success the value is returned; on
    /// failure or when the circuit rejects the call, `fallback` produces the
    /// result. The breaker never propagates an error past the fallback.
    pub async fn execute<T, Fut>(
        &self,
        op: impl FnOnce() -> Fut,
        fallback: impl FnOnce(SearchError) -> T,
    ) -> T
    where
        Fut: Future<Output = Result<T>>,
    {
        if !self.try_acquire() {
            debug!(breaker = %self.name, "call rejected while open");
            return fallback(SearchError::CircuitOpen(self.name.clone()));
        }
        match op().await {
            Ok(value) => {
                self.record_success();
                value
            }
            Err(err) => {
                self.record_failure();
                fallback(err)
            }
        }
    }
}

/// Which dependency a breaker protects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerRole {
    /// The LLM used by query understanding
    Llm,
    /// The text-search index
    Index,
    /// The database of record
    Db,
}

impl BreakerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerRole::Llm => "llm",
            BreakerRole::Index => "index",
            BreakerRole::Db => "db",
        }
    }
}

/// The process-wide set of breakers, one per protected dependency
#[derive(Debug)]
pub struct BreakerRegistry {
    llm: CircuitBreaker,
    index: CircuitBreaker,
    db: CircuitBreaker,
}

impl BreakerRegistry {
    pub fn new(llm: BreakerConfig, index: BreakerConfig, db: BreakerConfig) -> Self {
        Self {
            llm: CircuitBreaker::new("llm", llm),
            index: CircuitBreaker::new("index", index),
            db: CircuitBreaker::new("db", db),
        }
    }

    pub fn get(&self, role: BreakerRole) -> &CircuitBreaker {
        match role {
            BreakerRole::Llm => &self.llm,
            BreakerRole::Index => &self.index,
            BreakerRole::Db => &self.db,
        }
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        vec![self.llm.snapshot(), self.index.snapshot(), self.db.snapshot()]
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(
            BreakerConfig {
                threshold: 3,
                timeout: Duration::from_secs(30),
                success_threshold: 2,
            },
            BreakerConfig {
                threshold: 5,
                timeout: Duration::from_secs(20),
                success_threshold: 2,
            },
            BreakerConfig {
                threshold: 5,
                timeout: Duration::from_secs(15),
                success_threshold: 2,
            },
        )
    }
}
