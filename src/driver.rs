//! Fixed-rate driver: calls `tick()` repeatedly at a target rate.
//!
//! Stopping is cooperative. A raised [`StopHandle`] is observed between
//! ticks, never during one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Something advanced once per display refresh.
pub trait Tick {
    type Error;

    fn tick(&mut self) -> Result<(), Self::Error>;
}

/// Shared flag that ends a running [`FixedRateDriver`].
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Repeats `tick()` at a fixed rate until stopped, limited, or failed.
#[derive(Debug, Clone)]
pub struct FixedRateDriver {
    interval: Option<Duration>,
    max_ticks: Option<u64>,
    stop: StopHandle,
}

impl FixedRateDriver {
    /// Drive at `rate_hz` ticks per second. A rate of zero (or anything not
    /// finite and positive) runs unthrottled.
    pub fn new(rate_hz: f64) -> Self {
        let interval = (rate_hz.is_finite() && rate_hz > 0.0)
            .then(|| Duration::from_secs_f64(1.0 / rate_hz));
        Self {
            interval,
            max_ticks: None,
            stop: StopHandle::new(),
        }
    }

    /// Stop after `max_ticks` completed ticks.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Handle that stops this driver from another thread or from inside a
    /// tick.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run until stopped or the tick limit is reached. A tick error ends the
    /// loop and is returned as is.
    ///
    /// Returns the number of completed ticks.
    pub fn run<T: Tick>(&self, target: &mut T) -> Result<u64, T::Error> {
        let mut ticks = 0u64;
        let mut next = Instant::now();
        loop {
            if self.stop.is_stopped() || self.max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }

            target.tick()?;
            ticks += 1;

            if let Some(interval) = self.interval {
                next += interval;
                let now = Instant::now();
                if next > now {
                    std::thread::sleep(next - now);
                } else {
                    // Running behind: drop the backlog instead of bursting.
                    next = now;
                }
            }
        }
        log::debug!("Driver stopped after {ticks} tick(s)");
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        count: u64,
        fail_at: Option<u64>,
        stop_at: Option<(u64, StopHandle)>,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                count: 0,
                fail_at: None,
                stop_at: None,
            }
        }
    }

    impl Tick for Counter {
        type Error = String;

        fn tick(&mut self) -> Result<(), String> {
            if self.fail_at == Some(self.count) {
                return Err(format!("failed at {}", self.count));
            }
            self.count += 1;
            if let Some((at, handle)) = &self.stop_at {
                if self.count == *at {
                    handle.stop();
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_runs_to_tick_limit() {
        let driver = FixedRateDriver::new(0.0).with_max_ticks(25);
        let mut counter = Counter::new();
        assert_eq!(driver.run(&mut counter), Ok(25));
        assert_eq!(counter.count, 25);
    }

    #[test]
    fn test_stop_observed_between_ticks() {
        let driver = FixedRateDriver::new(0.0).with_max_ticks(1000);
        let mut counter = Counter::new();
        counter.stop_at = Some((7, driver.stop_handle()));
        assert_eq!(driver.run(&mut counter), Ok(7));
    }

    #[test]
    fn test_stopped_before_start() {
        let driver = FixedRateDriver::new(60.0);
        driver.stop_handle().stop();
        let mut counter = Counter::new();
        assert_eq!(driver.run(&mut counter), Ok(0));
    }

    #[test]
    fn test_error_aborts() {
        let driver = FixedRateDriver::new(0.0).with_max_ticks(10);
        let mut counter = Counter::new();
        counter.fail_at = Some(3);
        assert_eq!(driver.run(&mut counter), Err("failed at 3".to_string()));
        assert_eq!(counter.count, 3);
    }

    #[test]
    fn test_rate_is_held() {
        let driver = FixedRateDriver::new(200.0).with_max_ticks(5);
        assert_eq!(driver.interval(), Some(Duration::from_millis(5)));
        let start = Instant::now();
        driver.run(&mut Counter::new()).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_zero_rate_is_unthrottled() {
        assert_eq!(FixedRateDriver::new(0.0).interval(), None);
        assert_eq!(FixedRateDriver::new(f64::NAN).interval(), None);
    }
}
