//! Tick scheduling for the prediction loop.
//!
//! The loop calls `next_tick` after each iteration completes, so a slow
//! iteration delays the next one instead of queueing frames behind it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::ManualClock;

pub trait TickScheduler {
    /// Block until the next tick is due. Returns false when the loop should stop.
    fn next_tick(&mut self) -> bool;
}

// ----------------------------------------------------------------------------
// IntervalScheduler: paced ticks for live capture
// ----------------------------------------------------------------------------

/// Paces ticks at a fixed rate until stopped or a tick limit is reached.
pub struct IntervalScheduler {
    period: Duration,
    last_tick: Option<Instant>,
    max_ticks: Option<u64>,
    ticks: u64,
    stop: Arc<AtomicBool>,
}

impl IntervalScheduler {
    pub fn new(target_fps: u32) -> Self {
        let period = if target_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / target_fps
        };
        Self {
            period,
            last_tick: None,
            max_ticks: None,
            ticks: 0,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_limit(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Shared flag; storing `true` ends the loop at the next tick boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl TickScheduler for IntervalScheduler {
    fn next_tick(&mut self) -> bool {
        if self.stop.load(Ordering::SeqCst) {
            return false;
        }
        if self.max_ticks.is_some_and(|max| self.ticks >= max) {
            return false;
        }
        if let Some(last) = self.last_tick {
            let elapsed = last.elapsed();
            if elapsed < self.period {
                std::thread::sleep(self.period - elapsed);
            }
        }
        self.last_tick = Some(Instant::now());
        self.ticks += 1;
        true
    }
}

// ----------------------------------------------------------------------------
// Deterministic schedulers
// ----------------------------------------------------------------------------

/// Yields a fixed number of ticks without waiting.
#[derive(Clone, Copy, Debug)]
pub struct FixedTicks {
    remaining: u64,
}

impl FixedTicks {
    pub fn new(ticks: u64) -> Self {
        Self { remaining: ticks }
    }
}

impl TickScheduler for FixedTicks {
    fn next_tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Yields a fixed number of ticks, advancing a `ManualClock` between them.
///
/// The first tick happens at the clock's current reading.
pub struct SimulatedTicks {
    clock: ManualClock,
    step: Duration,
    remaining: u64,
    started: bool,
}

impl SimulatedTicks {
    pub fn new(clock: ManualClock, step: Duration, ticks: u64) -> Self {
        Self {
            clock,
            step,
            remaining: ticks,
            started: false,
        }
    }
}

impl TickScheduler for SimulatedTicks {
    fn next_tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        if self.started {
            self.clock.advance(self.step);
        }
        self.started = true;
        self.remaining -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;

    #[test]
    fn fixed_ticks_run_out() {
        let mut ticks = FixedTicks::new(2);
        assert!(ticks.next_tick());
        assert!(ticks.next_tick());
        assert!(!ticks.next_tick());
    }

    #[test]
    fn simulated_ticks_advance_clock_between_ticks() {
        let clock = ManualClock::new();
        let mut ticks = SimulatedTicks::new(clock.clone(), Duration::from_secs(5), 3);
        let mut seen = Vec::new();
        while ticks.next_tick() {
            seen.push(clock.now().as_secs());
        }
        assert_eq!(seen, vec![0, 5, 10]);
    }

    #[test]
    fn interval_scheduler_honours_stop_and_limit() {
        let mut scheduler = IntervalScheduler::new(0).with_limit(Some(3));
        assert!(scheduler.next_tick());
        assert!(scheduler.next_tick());
        scheduler.stop_handle().store(true, Ordering::SeqCst);
        assert!(!scheduler.next_tick());

        let mut limited = IntervalScheduler::new(1000).with_limit(Some(1));
        assert!(limited.next_tick());
        assert!(!limited.next_tick());
    }

    #[test]
    fn interval_scheduler_period_matches_fps() {
        assert_eq!(
            IntervalScheduler::new(20).period(),
            Duration::from_millis(50)
        );
    }
}
