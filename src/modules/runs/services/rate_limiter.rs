use crate::core::RateLimitError;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Submission limiter settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Minimum spacing between accepted calls
    pub min_interval: Duration,
    /// Cap on in-flight calls; `None` means unbounded
    pub max_concurrent: Option<NonZeroUsize>,
}

impl RateLimiterConfig {
    /// Returns `None` when `min_interval` is zero
    pub fn new(min_interval: Duration) -> Option<Self> {
        if min_interval.is_zero() {
            return None;
        }
        Some(Self {
            min_interval,
            max_concurrent: None,
        })
    }

    pub fn with_max_concurrent(mut self, max_concurrent: NonZeroUsize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    last_accepted: Option<Instant>,
    active_requests: usize,
    blocked: bool,
}

/// Fail-fast gate for side-effecting launches
///
/// Rejections are immediate: nothing is queued or retried. The in-flight
/// counter lives behind one mutex, so concurrent `execute` calls always see
/// a consistent count.
#[derive(Debug, Clone)]
pub struct SubmissionRateLimiter {
    config: RateLimiterConfig,
    state: Arc<Mutex<LimiterState>>,
}

impl SubmissionRateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(LimiterState::default())),
        }
    }

    pub fn config(&self) -> RateLimiterConfig {
        self.config
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        // Counters stay valid even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wait_for(&self, state: &LimiterState, now: Instant) -> Duration {
        match state.last_accepted {
            Some(last) => self
                .config
                .min_interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    fn permits(&self, state: &LimiterState, now: Instant) -> bool {
        let interval_ok = self.wait_for(state, now).is_zero();
        let capacity_ok = self
            .config
            .max_concurrent
            .is_none_or(|cap| state.active_requests < cap.get());
        interval_ok && capacity_ok && !state.blocked
    }

    /// Whether a call issued now would be accepted
    pub fn can_proceed(&self) -> bool {
        let state = self.lock();
        self.permits(&state, Instant::now())
    }

    /// Zero when a call would be accepted, otherwise the interval still to wait
    pub fn remaining_wait_time(&self) -> Duration {
        let state = self.lock();
        let now = Instant::now();
        if self.permits(&state, now) {
            Duration::ZERO
        } else {
            self.wait_for(&state, now)
        }
    }

    pub fn active_requests(&self) -> usize {
        self.lock().active_requests
    }

    /// Forces `can_proceed` to false until `unblock`
    pub fn block(&self) {
        self.lock().blocked = true;
        tracing::info!("Submission limiter blocked");
    }

    pub fn unblock(&self) {
        self.lock().blocked = false;
        tracing::info!("Submission limiter unblocked");
    }

    pub fn is_blocked(&self) -> bool {
        self.lock().blocked
    }

    /// Checks and records an accepted call in one critical section
    fn acquire(&self) -> Result<InFlight, RateLimitError> {
        let mut state = self.lock();
        let now = Instant::now();

        if !self.permits(&state, now) {
            let wait = self.wait_for(&state, now);
            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                active = state.active_requests,
                blocked = state.blocked,
                "Submission rejected by limiter"
            );
            return Err(RateLimitError { wait });
        }

        state.last_accepted = Some(now);
        state.active_requests += 1;

        Ok(InFlight {
            state: Arc::clone(&self.state),
        })
    }

    /// Runs `operation` if the limiter permits it
    ///
    /// The in-flight slot is released when the operation finishes, fails,
    /// panics or is dropped mid-flight.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, RateLimitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _slot = self.acquire()?;
        Ok(operation().await)
    }
}

/// Decrements the in-flight counter on drop
struct InFlight {
    state: Arc<Mutex<LimiterState>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.active_requests = state.active_requests.saturating_sub(1);
    }
}
