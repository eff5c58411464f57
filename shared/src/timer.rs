use std::{cmp::Reverse, collections::HashMap};

use crate::{types::Tick, wrapping_number::tick_is_after};

/// Handle returned by [`Timers::schedule_once`], used to cancel the timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerKey(u64);

struct OnceTimer<T> {
    fire_at: Tick,
    payload: T,
}

/// One-shot timers owned by a single execution context.
///
/// Nothing fires on its own: the owner calls [`Timers::take_expired`] from its
/// own update loop, so a timer's effect always runs on the owner's context.
pub struct Timers<T> {
    next_key: u64,
    timers: HashMap<TimerKey, OnceTimer<T>>,
}

impl<T> Default for Timers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Timers<T> {
    pub fn new() -> Self {
        Self {
            next_key: 0,
            timers: HashMap::new(),
        }
    }

    pub fn schedule_once(&mut self, now: Tick, delay_ms: u32, payload: T) -> TimerKey {
        let key = TimerKey(self.next_key);
        self.next_key = self.next_key.wrapping_add(1);
        self.timers.insert(
            key,
            OnceTimer {
                fire_at: now.wrapping_add(delay_ms),
                payload,
            },
        );
        key
    }

    /// Cancels a pending timer, returning its payload. Cancelling a timer
    /// that already fired or was cancelled returns `None`.
    pub fn cancel(&mut self, key: TimerKey) -> Option<T> {
        self.timers.remove(&key).map(|timer| timer.payload)
    }

    /// Removes and returns the payloads of all timers due at `now`, earliest
    /// first.
    pub fn take_expired(&mut self, now: Tick) -> Vec<T> {
        let mut due: Vec<(TimerKey, Tick)> = self
            .timers
            .iter()
            .filter(|(_, timer)| tick_is_after(now, timer.fire_at))
            .map(|(key, timer)| (*key, timer.fire_at))
            .collect();
        // the longest overdue fired first, ties in scheduling order
        due.sort_by_key(|(key, fire_at)| (Reverse(now.wrapping_sub(*fire_at)), key.0));

        due.into_iter()
            .filter_map(|(key, _)| self.timers.remove(&key))
            .map(|timer| timer.payload)
            .collect()
    }

    /// Tick of the earliest pending timer.
    pub fn next_deadline(&self, now: Tick) -> Option<Tick> {
        self.timers
            .values()
            .map(|timer| timer.fire_at)
            .min_by_key(|fire_at| fire_at.wrapping_sub(now))
    }

    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.timers.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
