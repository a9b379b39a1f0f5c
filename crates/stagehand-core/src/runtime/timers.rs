//! Deadline-ordered timer list driven by the main loop.

use std::time::{Duration, Instant};

/// Floor for the loop wait so an overdue timer never busy-spins.
pub const MIN_WAIT: Duration = Duration::from_millis(1);
/// Ceiling for the loop wait when no timer is armed or all are far off.
pub const MAX_WAIT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Forever,
    /// Fire this many more times, then drop the timer.
    Times(u32),
}

impl Repeat {
    pub const ONCE: Repeat = Repeat::Times(1);
}

#[derive(Debug, Clone)]
struct Timer<K> {
    key: K,
    interval: Duration,
    expires: Instant,
    repeat: Repeat,
}

/// Timers kept sorted ascending by expiry. Keys are unique.
#[derive(Debug, Clone)]
pub struct TimerList<K> {
    timers: Vec<Timer<K>>,
}

impl<K> Default for TimerList<K> {
    fn default() -> Self {
        Self { timers: Vec::new() }
    }
}

impl<K: Copy + PartialEq> TimerList<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, timer: Timer<K>) {
        // Equal deadlines keep insertion order.
        let index = self.timers.partition_point(|t| t.expires <= timer.expires);
        self.timers.insert(index, timer);
    }

    fn take(&mut self, key: &K) -> Option<Timer<K>> {
        let index = self.timers.iter().position(|t| t.key == *key)?;
        Some(self.timers.remove(index))
    }

    /// Arm `key`, replacing any timer already registered under it.
    pub fn add(&mut self, key: K, interval: Duration, repeat: Repeat, now: Instant) {
        self.take(&key);
        self.insert(Timer {
            key,
            interval,
            expires: now + interval,
            repeat,
        });
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.take(key).is_some()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.timers.iter().any(|t| t.key == *key)
    }

    pub fn interval(&self, key: &K) -> Option<Duration> {
        self.timers.iter().find(|t| t.key == *key).map(|t| t.interval)
    }

    /// Push the deadline of `key` a full interval past `now`.
    pub fn restart(&mut self, key: &K, now: Instant) -> bool {
        match self.take(key) {
            Some(mut timer) => {
                timer.expires = now + timer.interval;
                self.insert(timer);
                true
            }
            None => false,
        }
    }

    /// Change the interval of `key` and reschedule it from `now`.
    pub fn set_interval(&mut self, key: &K, interval: Duration, now: Instant) -> bool {
        match self.take(key) {
            Some(mut timer) => {
                timer.interval = interval;
                timer.expires = now + interval;
                self.insert(timer);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// How long the loop may wait before the earliest deadline.
    pub fn next_timeout(&self, now: Instant) -> Duration {
        self.timers
            .first()
            .map(|t| t.expires.saturating_duration_since(now))
            .unwrap_or(MAX_WAIT)
            .clamp(MIN_WAIT, MAX_WAIT)
    }

    /// Remove every timer due at `now` and return their keys in deadline
    /// order. Repeating timers are re-armed one interval past `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<K> {
        let due = self.timers.partition_point(|t| t.expires <= now);
        let fired: Vec<Timer<K>> = self.timers.drain(..due).collect();
        let mut keys = Vec::with_capacity(fired.len());
        for mut timer in fired {
            keys.push(timer.key);
            let again = match timer.repeat {
                Repeat::Forever => true,
                Repeat::Times(n) => {
                    timer.repeat = Repeat::Times(n.saturating_sub(1));
                    n > 1
                }
            };
            if again {
                timer.expires = now + timer.interval;
                self.insert(timer);
            }
        }
        keys
    }

    #[cfg(test)]
    fn is_sorted(&self) -> bool {
        self.timers.windows(2).all(|w| w[0].expires <= w[1].expires)
    }
}
