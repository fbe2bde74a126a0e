use std::time::Duration;
use tokio::time::Instant;

/// Lets a message through at most once per window.
///
/// Used for debug output that would otherwise repeat on every poll.
#[derive(Debug, Clone)]
pub struct LogThrottle {
    window: Duration,
    last: Option<Instant>,
}

impl LogThrottle {
    pub const fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns true (and restarts the window) when a message may be emitted now
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) <= self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
