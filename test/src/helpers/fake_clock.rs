use tether_shared::Tick;

/// Manually advanced tick source. Wraps at 32 bits like the real clock.
#[derive(Clone, Copy, Debug)]
pub struct FakeClock {
    now: Tick,
}

impl FakeClock {
    pub fn starting_at(now: Tick) -> Self {
        Self { now }
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn advance(&mut self, ms: u32) -> Tick {
        self.now = self.now.wrapping_add(ms);
        self.now
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::starting_at(1_000)
    }
}
