//! Deadline-driven timers.
//!
//! Nothing here sleeps. Owners schedule timers against an explicit `now`,
//! ask for [`Scheduler::next_deadline`] to know when to wake up, then drain
//! [`Scheduler::pop_due`] one timer at a time. A timer cancelled while
//! draining never fires.
//!
//! A timer is due when `now >= deadline`. Repeating timers are re-armed at
//! `deadline + interval`, so a caller that wakes up late sees every missed
//! period in order.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Timer abstraction injected into state machines.
pub trait Scheduler<T> {
    /// Fire `timer` once at `now + delay`.
    fn schedule_once(&mut self, now: Instant, delay: Duration, timer: T) -> TimerId;

    /// Fire `timer` every `interval`, first at `now + interval`.
    fn schedule_repeating(&mut self, now: Instant, interval: Duration, timer: T) -> TimerId;

    /// Cancel a timer. Unknown or already fired ids are ignored.
    fn cancel(&mut self, id: TimerId);

    /// Cancel every timer.
    fn cancel_all(&mut self);

    /// Take the earliest timer due at `now`.
    fn pop_due(&mut self, now: Instant) -> Option<T>;

    /// Earliest pending deadline.
    fn next_deadline(&self) -> Option<Instant>;

    /// Number of pending timers.
    fn pending(&self) -> usize;
}

#[derive(Debug, Clone)]
struct Entry<T> {
    id: TimerId,
    timer: T,
    interval: Option<Duration>,
}

/// Ordering key: deadline, then insertion order.
type Key = (Instant, u64);

/// Default [`Scheduler`] backed by an ordered map.
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    entries: BTreeMap<Key, Entry<T>>,
    keys: HashMap<TimerId, Key>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            keys: HashMap::new(),
            next_seq: 0,
        }
    }

    fn insert(&mut self, id: TimerId, deadline: Instant, timer: T, interval: Option<Duration>) {
        let key = (deadline, self.next_seq);
        self.next_seq += 1;
        self.keys.insert(id, key);
        self.entries.insert(
            key,
            Entry {
                id,
                timer,
                interval,
            },
        );
    }

    fn allocate_id(&mut self) -> TimerId {
        TimerId(self.next_seq)
    }
}

impl<T: Clone> Scheduler<T> for TimerQueue<T> {
    fn schedule_once(&mut self, now: Instant, delay: Duration, timer: T) -> TimerId {
        let id = self.allocate_id();
        self.insert(id, now + delay, timer, None);
        id
    }

    fn schedule_repeating(&mut self, now: Instant, interval: Duration, timer: T) -> TimerId {
        let id = self.allocate_id();
        self.insert(id, now + interval, timer, Some(interval));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(key) = self.keys.remove(&id) {
            self.entries.remove(&key);
        }
    }

    fn cancel_all(&mut self) {
        self.entries.clear();
        self.keys.clear();
    }

    fn pop_due(&mut self, now: Instant) -> Option<T> {
        let (&key, _) = self.entries.first_key_value()?;
        if key.0 > now {
            return None;
        }

        let entry = self.entries.remove(&key)?;
        self.keys.remove(&entry.id);

        match entry.interval {
            // A zero interval would fire forever within one drain.
            Some(interval) if !interval.is_zero() => {
                let timer = entry.timer.clone();
                self.insert(entry.id, key.0 + interval, entry.timer, Some(interval));
                Some(timer)
            }
            _ => Some(entry.timer),
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.entries.first_key_value().map(|(key, _)| key.0)
    }

    fn pending(&self) -> usize {
        self.entries.len()
    }
}
