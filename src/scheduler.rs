use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Handle returned by [`Scheduler::after`]; used to cancel a pending timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Deadline queue polled by the event loop.
///
/// Nothing fires on its own: the owner calls [`Scheduler::pop_due`] with the
/// current instant on every tick and receives the payloads whose deadline has
/// passed, earliest first.
#[derive(Debug)]
pub struct Scheduler<T> {
    next_id: u64,
    queue: BTreeMap<(Instant, TimerId), T>,
    deadlines: HashMap<TimerId, Instant>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn after(&mut self, now: Instant, delay: Duration, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let deadline = now + delay;
        self.queue.insert((deadline, id), payload);
        self.deadlines.insert(id, deadline);
        id
    }

    /// Returns true if the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.queue.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return the earliest timer due at `now` with its deadline.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, T)> {
        let (deadline, id) = *self.queue.keys().next()?;
        if deadline > now {
            return None;
        }
        self.deadlines.remove(&id);
        self.queue.remove(&(deadline, id)).map(|payload| (deadline, payload))
    }
}
