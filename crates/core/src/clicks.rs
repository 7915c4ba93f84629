//! Sliding-window click rate

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;

/// Monotonic time source in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Seconds elapsed since construction
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Counts pointer-down events inside `(now - window, now]`
///
/// Registration happens on the input thread and reads on the render thread;
/// the lock is held only for a push or an evict-and-count.
pub struct ClickCounter {
    window: f64,
    clock: Box<dyn Clock>,
    clicks: Mutex<VecDeque<f64>>,
}

impl ClickCounter {
    pub const WINDOW_SECS: f64 = 1.0;

    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self::with_window(clock, Self::WINDOW_SECS)
    }

    pub fn with_window(clock: Box<dyn Clock>, window: f64) -> Self {
        Self {
            window,
            clock,
            clicks: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a click now
    pub fn register(&self) {
        self.register_at(self.clock.now());
    }

    pub fn register_at(&self, timestamp: f64) {
        self.clicks.lock().push_back(timestamp);
    }

    /// Clicks in the last window, evicting older entries
    pub fn clicks_per_second(&self) -> u32 {
        self.clicks_per_second_at(self.clock.now())
    }

    pub fn clicks_per_second_at(&self, now: f64) -> u32 {
        let cutoff = now - self.window;
        let mut clicks = self.clicks.lock();
        while clicks.front().is_some_and(|&t| t <= cutoff) {
            clicks.pop_front();
        }
        clicks.iter().filter(|&&t| t <= now).count() as u32
    }
}

impl std::fmt::Debug for ClickCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickCounter")
            .field("window", &self.window)
            .field("pending", &self.clicks.lock().len())
            .finish()
    }
}
