//! Rolling-window health tracking (§4.3 "Health tracking").

use std::collections::VecDeque;

use parking_lot::Mutex;

const DEFAULT_WINDOW: usize = 20;
const DEFAULT_ERROR_THRESHOLD: f64 = 0.5;
const DEFAULT_RECOVERY_STREAK: u32 = 3;

struct State {
    window: VecDeque<bool>,
    consecutive_successes: u32,
    healthy: bool,
}

/// Tracks a single provider's health from the last N call outcomes. An
/// error rate above `error_threshold` marks the provider unhealthy; it
/// stays unhealthy until `recovery_streak` consecutive successes land.
pub struct ProviderHealth {
    window_size: usize,
    error_threshold: f64,
    recovery_streak: u32,
    state: Mutex<State>,
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self::with_params(DEFAULT_WINDOW, DEFAULT_ERROR_THRESHOLD, DEFAULT_RECOVERY_STREAK)
    }

    pub fn with_params(window_size: usize, error_threshold: f64, recovery_streak: u32) -> Self {
        Self {
            window_size,
            error_threshold,
            recovery_streak,
            state: Mutex::new(State {
                window: VecDeque::with_capacity(window_size),
                consecutive_successes: 0,
                healthy: true,
            }),
        }
    }

    pub fn record_success(&self) {
        self.push(true);
    }

    pub fn record_error(&self) {
        self.push(false);
    }

    pub fn is_healthy(&self) -> bool {
        self.state.lock().healthy
    }

    fn push(&self, success: bool) {
        let mut state = self.state.lock();

        if state.window.len() >= self.window_size {
            state.window.pop_front();
        }
        state.window.push_back(success);

        if success {
            state.consecutive_successes += 1;
        } else {
            state.consecutive_successes = 0;
        }

        let errors = state.window.iter().filter(|s| !**s).count();
        let error_rate = errors as f64 / state.window.len() as f64;

        if !state.healthy {
            if state.consecutive_successes >= self.recovery_streak {
                state.healthy = true;
            }
        } else if error_rate > self.error_threshold {
            state.healthy = false;
        }
    }
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_healthy() {
        let h = ProviderHealth::new();
        assert!(h.is_healthy());
    }

    #[test]
    fn high_error_rate_marks_unhealthy() {
        let h = ProviderHealth::with_params(4, 0.5, 3);
        h.record_error();
        h.record_error();
        h.record_error();
        assert!(!h.is_healthy());
    }

    #[test]
    fn recovers_after_success_streak() {
        let h = ProviderHealth::with_params(4, 0.5, 3);
        h.record_error();
        h.record_error();
        h.record_error();
        assert!(!h.is_healthy());

        h.record_success();
        h.record_success();
        assert!(!h.is_healthy(), "streak not yet complete");

        h.record_success();
        assert!(h.is_healthy());
    }

    #[test]
    fn single_success_does_not_restore_without_full_streak() {
        let h = ProviderHealth::with_params(4, 0.5, 3);
        h.record_error();
        h.record_error();
        h.record_error();
        h.record_success();
        assert!(!h.is_healthy());
    }

    #[test]
    fn window_is_bounded() {
        let h = ProviderHealth::with_params(3, 0.9, 3);
        for _ in 0..10 {
            h.record_success();
        }
        assert_eq!(h.state.lock().window.len(), 3);
    }
}
