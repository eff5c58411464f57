use std::time::{Duration, Instant};

use crate::types::Tick;

/// Millisecond tick source for one socket or channel.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    start: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since the clock started, wrapping at 32 bits.
    pub fn now(&self) -> Tick {
        Self::tick_of(self.start.elapsed())
    }

    /// Real instant at which `tick` falls, taking `now` as the reference.
    /// Ticks behind `now` map to the current instant.
    pub fn instant_of(&self, now: Tick, tick: Tick) -> Instant {
        let ahead = crate::wrapping_number::tick_diff(now, tick).max(0);
        Instant::now() + Duration::from_millis(u64::from(ahead.unsigned_abs()))
    }

    fn tick_of(elapsed: Duration) -> Tick {
        // wrap at 2^32 ms
        elapsed.as_millis() as u32
    }
}
