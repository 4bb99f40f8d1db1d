use std::time::{Duration, Instant};

/// A point in time after which a blocking queue operation gives up.
///
/// Initialised once per attempt so that spurious wake-ups do not extend the
/// total wait.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    /// A deadline that never expires.
    pub fn never() -> Self {
        Self { at: None }
    }

    /// Time left before expiry, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn expired(&self) -> bool {
        matches!(self.remaining(), Some(left) if left.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_is_already_expired() {
        assert!(Deadline::after(Duration::ZERO).expired());
    }

    #[test]
    fn never_does_not_expire() {
        let deadline = Deadline::never();
        assert!(!deadline.expired());
        assert!(deadline.remaining().is_none());
    }

    #[test]
    fn remaining_counts_down() {
        let deadline = Deadline::after(Duration::from_secs(60));
        let left = deadline.remaining().unwrap();
        assert!(left <= Duration::from_secs(60));
        assert!(left > Duration::from_secs(50));
    }
}
