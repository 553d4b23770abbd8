use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Per-user admission window. Each user id maps to the instant its lock
/// expires; a user is blocked while `now < unblock`. Entries are only ever
/// overwritten, never removed, and there is no queueing: callers that find
/// themselves blocked simply get a rejection and try again later.
#[derive(Clone, Default)]
pub struct AdmissionGate {
    unblock_at: Arc<Mutex<HashMap<i64, Instant>>>,
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blocked(&self, user_id: i64) -> bool {
        self.is_blocked_at(user_id, Instant::now())
    }

    /// Arms (or extends) the lock window for `user_id`, unconditionally
    /// overwriting any earlier expiry.
    pub fn block(&self, user_id: i64, duration: Duration) {
        self.block_from(user_id, Instant::now(), duration);
    }

    fn is_blocked_at(&self, user_id: i64, now: Instant) -> bool {
        self.unblock_at
            .lock()
            .get(&user_id)
            .map(|until| now < *until)
            .unwrap_or(false)
    }

    fn block_from(&self, user_id: i64, now: Instant, duration: Duration) {
        self.unblock_at.lock().insert(user_id, now + duration);
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.unblock_at.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(10);

    #[test]
    fn unknown_user_is_not_blocked() {
        let gate = AdmissionGate::new();
        assert!(!gate.is_blocked(7));
    }

    #[test]
    fn blocked_throughout_window_and_free_at_expiry() {
        let gate = AdmissionGate::new();
        let t0 = Instant::now();
        gate.block_from(42, t0, WINDOW);

        assert!(gate.is_blocked_at(42, t0));
        assert!(gate.is_blocked_at(42, t0 + WINDOW - Duration::from_millis(1)));
        assert!(!gate.is_blocked_at(42, t0 + WINDOW));
        assert!(!gate.is_blocked_at(42, t0 + WINDOW * 2));
    }

    #[test]
    fn rearming_overwrites_the_previous_window() {
        let gate = AdmissionGate::new();
        let t0 = Instant::now();
        gate.block_from(42, t0, WINDOW);
        let t1 = t0 + Duration::from_secs(6);
        gate.block_from(42, t1, WINDOW);

        assert!(gate.is_blocked_at(42, t0 + WINDOW));
        assert!(!gate.is_blocked_at(42, t1 + WINDOW));
        assert_eq!(gate.tracked_users(), 1);
    }

    #[test]
    fn windows_are_independent_per_user() {
        let gate = AdmissionGate::new();
        let t0 = Instant::now();
        gate.block_from(1, t0, WINDOW);

        assert!(gate.is_blocked_at(1, t0));
        assert!(!gate.is_blocked_at(2, t0));
        assert_eq!(gate.tracked_users(), 1);
    }
}
