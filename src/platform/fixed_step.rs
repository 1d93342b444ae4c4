//=========================================================================
// Fixed Step Clock
//
// Converts variable frame times into a whole number of fixed-rate steps.
//
// Each frame adds the elapsed wall time to an accumulator and drains it
// in `step`-sized chunks; the remainder carries over to the next frame.
// Catch-up is capped so one long stall cannot trigger an unbounded burst
// of `FixedUpdate` dispatches.
//
//=========================================================================

use std::time::{Duration, Instant};

use log::warn;

//=== Constants ===========================================================

/// Upper bound on fixed steps fired for a single frame.
pub(crate) const MAX_STEPS_PER_FRAME: u32 = 8;

//=== FixedStep ===========================================================

#[derive(Debug)]
pub(crate) struct FixedStep {
    step: Duration,
    accumulator: Duration,
    last_frame: Option<Instant>,
}

impl FixedStep {
    /// # Panics
    ///
    /// Panics if `tps <= 0.0`.
    pub fn new(tps: f64) -> Self {
        assert!(tps > 0.0, "TPS must be positive, got {}", tps);
        Self {
            step: Duration::from_secs_f64(1.0 / tps),
            accumulator: Duration::ZERO,
            last_frame: None,
        }
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Records a frame at `now` and returns how many fixed steps are due.
    ///
    /// The first frame only starts the clock.
    pub fn tick(&mut self, now: Instant) -> u32 {
        let elapsed = match self.last_frame {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::ZERO,
        };
        self.last_frame = Some(now);
        self.advance(elapsed)
    }

    /// Adds `elapsed` and drains whole steps from the accumulator.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed;

        let mut steps = 0;
        while self.accumulator >= self.step && steps < MAX_STEPS_PER_FRAME {
            self.accumulator -= self.step;
            steps += 1;
        }

        if self.accumulator >= self.step {
            warn!(
                target: "platform",
                "Fixed step fell behind by {:?}, dropping backlog",
                self.accumulator
            );
            self.accumulator = Duration::ZERO;
        }

        steps
    }

    /// When the next fixed step becomes due, given a frame at `now`.
    pub fn next_deadline(&self, now: Instant) -> Instant {
        now + self.step.saturating_sub(self.accumulator)
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
