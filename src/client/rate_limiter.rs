//! Outbound Rate Limiting
//!
//! Sliding-window admission gate bounding how many messages are sent per
//! trailing window.

use crate::error::{Result, WahaError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

/// Length of the trailing window the limit applies to
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window rate limiter.
///
/// Admission timestamps are kept oldest-first, so eviction only touches the
/// front of the queue. The lock is never held across an await: a caller that
/// has to wait sleeps outside the critical section and re-checks the window
/// on wake, since concurrent admissions may have changed it meanwhile.
#[derive(Debug)]
pub struct RateLimiter {
    /// Max admissions per window
    capacity: usize,

    /// Window length
    window: Duration,

    /// Admission timestamps, oldest first
    timestamps: Mutex<VecDeque<Instant>>,

    /// Set once the owning client shuts down
    closed: AtomicBool,

    /// Wakes pending waiters on close
    shutdown: Notify,
}

impl RateLimiter {
    /// Create a limiter admitting `max_per_minute` sends per 60 seconds
    pub fn new(max_per_minute: u32) -> Result<Self> {
        Self::with_window(max_per_minute, RATE_WINDOW)
    }

    /// Create a limiter with a custom window length
    pub fn with_window(capacity: u32, window: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(WahaError::Config(
                "rate limit must admit at least one message per window".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(WahaError::Config(
                "rate limit window must be longer than zero".to_string(),
            ));
        }

        let capacity = capacity as usize;
        Ok(Self {
            capacity,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(capacity)),
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    /// Wait until a send may proceed, then record the admission.
    ///
    /// Only the calling task is suspended. Fails with [`WahaError::Closed`]
    /// if the limiter is closed before or while waiting.
    pub async fn acquire(&self) -> Result<()> {
        loop {
            // Register for the close notification before checking the flag so
            // a concurrent close cannot slip between the two.
            let shutdown = self.shutdown.notified();
            tokio::pin!(shutdown);
            shutdown.as_mut().enable();

            if self.is_closed() {
                return Err(WahaError::Closed);
            }

            let wait = match self.try_admit(Instant::now()) {
                None => return Ok(()),
                Some(wait) => wait,
            };

            debug!(
                wait_ms = wait.as_millis() as u64,
                capacity = self.capacity,
                "Rate limit reached, waiting"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => return Err(WahaError::Closed),
            }
        }
    }

    /// Admit immediately if the window has room.
    ///
    /// Returns `Ok(None)` on admission, or `Ok(Some(wait))` with the time
    /// until the oldest admission leaves the window.
    pub fn try_acquire(&self) -> Result<Option<Duration>> {
        if self.is_closed() {
            return Err(WahaError::Closed);
        }
        Ok(self.try_admit(Instant::now()))
    }

    /// Evict, check capacity and record under a single lock.
    fn try_admit(&self, now: Instant) -> Option<Duration> {
        let mut timestamps = self.timestamps.lock();

        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        match timestamps.front().copied() {
            Some(oldest) if timestamps.len() >= self.capacity => {
                Some(self.window - now.duration_since(oldest))
            }
            _ => {
                timestamps.push_back(now);
                None
            }
        }
    }

    /// Number of admissions still inside the trailing window
    pub fn in_window(&self) -> usize {
        let now = Instant::now();
        self.timestamps
            .lock()
            .iter()
            .filter(|&&ts| now.duration_since(ts) < self.window)
            .count()
    }

    /// Max admissions per window
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Reject all future admissions and wake every pending waiter
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.shutdown.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
