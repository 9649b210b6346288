//! Per-request context
//!
//! Owns the request id, the end-to-end deadline, and the per-stage timings
//! that end up in the response `timing` block and the analytics log entry.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parts_search_core::response::Timing;

/// Request-id source: a monotonic sequence plus a random suffix, so ids stay
/// sortable within one process and unique across restarts.
#[derive(Debug, Default)]
pub struct RequestIds {
    sequence: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        format!("req-{seq:06}-{suffix}")
    }
}

/// Mutable per-request bag owned by the orchestrator; stages report their
/// durations into it and read the remaining budget from it.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: String,
    started: Instant,
    deadline: Duration,
    pub timings: Timing,
}

impl RequestContext {
    pub fn new(request_id: String, deadline: Duration) -> Self {
        Self {
            request_id,
            started: Instant::now(),
            deadline,
            timings: Timing::default(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_sub(self.started.elapsed())
    }

    /// A stage is skipped when the remaining budget cannot cover its own
    /// timeout; its passthrough default is used instead.
    pub fn should_skip_stage(&self, stage_timeout_ms: u64) -> bool {
        self.remaining() < Duration::from_millis(stage_timeout_ms)
    }

    pub fn finish(&mut self) -> Timing {
        self.timings.total = self.elapsed().as_millis() as u64;
        self.timings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_and_ordered() {
        let ids = RequestIds::new();
        let a = ids.next();
        let b = ids.next();
        assert_ne!(a, b);
        assert!(a.starts_with("req-000000-"));
        assert!(b.starts_with("req-000001-"));
    }

    #[test]
    fn test_stage_skip_on_exhausted_budget() {
        let ctx = RequestContext::new("req-1".into(), Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(10));
        assert!(ctx.should_skip_stage(1_000));

        let fresh = RequestContext::new("req-2".into(), Duration::from_secs(15));
        assert!(!fresh.should_skip_stage(5_000));
    }

    #[test]
    fn test_finish_fills_total() {
        let mut ctx = RequestContext::new("req-3".into(), Duration::from_secs(15));
        ctx.timings.retrieval = 12;
        let timing = ctx.finish();
        assert_eq!(timing.retrieval, 12);
    }
}
