use std::time::{Duration, Instant};

/// Monotonic wall clock in seconds. The engine and the hotkey listener must
/// share one instance so keypress stamps and deadlines are comparable.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
    fn sleep(&self, secs: f64);
}

pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline(always)]
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    #[inline(always)]
    fn sleep(&self, secs: f64) {
        if secs > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(secs));
        }
    }
}

#[cfg(test)]
pub mod manual {
    use super::Clock;
    use std::sync::Mutex;

    /// Test clock: every `now()` advances by `tick`, `sleep` jumps ahead.
    /// Busy-waits therefore always terminate.
    pub struct ManualClock {
        state: Mutex<f64>,
        tick: f64,
    }

    impl ManualClock {
        pub fn new(start: f64, tick: f64) -> Self {
            Self { state: Mutex::new(start), tick }
        }

        pub fn peek(&self) -> f64 {
            *self.state.lock().unwrap()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> f64 {
            let mut t = self.state.lock().unwrap();
            *t += self.tick;
            *t
        }

        fn sleep(&self, secs: f64) {
            if secs > 0.0 {
                *self.state.lock().unwrap() += secs;
            }
        }
    }
}
