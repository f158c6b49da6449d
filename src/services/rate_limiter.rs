use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Longest window the limiter will use; longer ones are clamped so that
/// `Instant + window` cannot overflow.
pub const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    resets_at: Instant,
}

/// Time left until the caller's window resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAfter(pub Duration);

impl RetryAfter {
    /// Whole seconds, rounded up, for the `Retry-After` header.
    pub fn as_secs_ceil(&self) -> u64 {
        let secs = self.0.as_secs();
        if self.0.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

/// Fixed-window request counter keyed by user id.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<i64, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> RateLimiter {
        RateLimiter {
            max_requests,
            window: window.min(MAX_WINDOW),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, user_id: i64) -> Result<(), RetryAfter> {
        self.check_at(user_id, Instant::now())
    }

    pub fn check_at(&self, user_id: i64, now: Instant) -> Result<(), RetryAfter> {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Drop expired windows so the map does not grow with every user ever seen.
        if windows.len() > 1024 {
            windows.retain(|_, w| w.resets_at > now);
        }

        let window = windows.entry(user_id).or_insert(Window {
            count: 0,
            resets_at: now + self.window,
        });
        if now >= window.resets_at {
            window.count = 0;
            window.resets_at = now + self.window;
        }

        if window.count >= self.max_requests {
            return Err(RetryAfter(window.resets_at - now));
        }
        window.count += 1;
        Ok(())
    }
}
