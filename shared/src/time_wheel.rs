use std::collections::{BTreeMap, HashSet};

use crate::{
    types::{ChannelId, Tick},
    wrapping_number::{tick_diff, tick_is_after},
};

// Raw ticks are lifted onto a 64-bit timeline anchored here, far enough from
// zero that deadlines up to half the 32-bit range in the past still map to a
// positive value.
const ANCHOR_EXTENDED: u64 = 1 << 32;

/// Deadline scheduler for channel updates.
///
/// Deadlines are raw 32-bit ticks. Internally each one is placed on a 64-bit
/// timeline relative to the most recent `now`, so ordering stays correct when
/// the tick counter wraps. A deadline of `0` means "run on the next pop".
///
/// A channel may be registered under several deadlines at once; each pop
/// returns it at most once.
pub struct TimeWheel {
    deadlines: BTreeMap<u64, HashSet<ChannelId>>,
    immediate: Vec<ChannelId>,
    anchor_raw: Tick,
    anchor_extended: u64,
}

impl TimeWheel {
    pub fn new(now: Tick) -> Self {
        Self {
            deadlines: BTreeMap::new(),
            immediate: Vec::new(),
            anchor_raw: now,
            anchor_extended: ANCHOR_EXTENDED,
        }
    }

    /// Registers `channel_id` to be returned by the first [`TimeWheel::pop_due`]
    /// whose `now` is at or after `when`.
    pub fn add_deadline(&mut self, channel_id: ChannelId, when: Tick) {
        if when == 0 {
            self.immediate.push(channel_id);
            return;
        }

        let extended = self.extend(when);
        self.deadlines.entry(extended).or_default().insert(channel_id);
    }

    /// Removes and returns every channel whose deadline has been reached,
    /// immediate entries first, then in deadline order.
    pub fn pop_due(&mut self, now: Tick) -> Vec<ChannelId> {
        self.advance(now);

        let mut seen = HashSet::new();
        let mut due = Vec::new();

        for channel_id in self.immediate.drain(..) {
            if seen.insert(channel_id) {
                due.push(channel_id);
            }
        }

        let later = self.deadlines.split_off(&(self.anchor_extended + 1));
        let expired = std::mem::replace(&mut self.deadlines, later);
        for channel_id in expired.into_values().flatten() {
            if seen.insert(channel_id) {
                due.push(channel_id);
            }
        }

        due
    }

    /// Earliest scheduled deadline as a raw tick. Immediate entries are
    /// reported separately by [`TimeWheel::has_immediate`].
    pub fn next_deadline(&self) -> Option<Tick> {
        self.deadlines
            .keys()
            .next()
            .map(|extended| self.to_raw(*extended))
    }

    pub fn has_immediate(&self) -> bool {
        !self.immediate.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.deadlines.is_empty()
    }

    pub fn clear(&mut self) {
        self.immediate.clear();
        self.deadlines.clear();
    }

    fn advance(&mut self, now: Tick) {
        if tick_is_after(now, self.anchor_raw) {
            // non-negative by the check above
            self.anchor_extended += u64::from(now.wrapping_sub(self.anchor_raw));
            self.anchor_raw = now;
        }
    }

    fn extend(&self, tick: Tick) -> u64 {
        let offset = i64::from(tick_diff(self.anchor_raw, tick));
        self.anchor_extended.saturating_add_signed(offset)
    }

    fn to_raw(&self, extended: u64) -> Tick {
        // truncation back onto the 32-bit timeline
        let offset = extended.wrapping_sub(self.anchor_extended) as u32;
        self.anchor_raw.wrapping_add(offset)
    }
}
