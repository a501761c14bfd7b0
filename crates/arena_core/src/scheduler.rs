//! Time-ordered queue of deferred battle actions.
//!
//! Events fire in `(fire_time, priority, insertion)` order. Lower priority
//! values fire first at equal times, which is how an attack resolution
//! always lands before a same-tick recovery or AI pass.
//!
//! The clock counts whole microseconds. Delays and tick deltas are
//! rounded once on the way in, so a delay of N ticks always falls due on
//! exactly the Nth tick.
//!
//! Cancellation is mark-and-skip: a cancelled event stays in the heap and
//! is discarded when it reaches the top.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use serde::{Deserialize, Serialize};

use crate::combatant::EntityId;
use crate::math::{from_micros, to_micros, Fixed};

/// Standard event priorities. Lower fires first.
pub mod priority {
    /// Attack resolution at the end of a wind-up.
    pub const ATTACK: u8 = 5;
    /// Pursuit check for a player-ordered attack.
    pub const RANGE_CHECK: u8 = 7;
    /// Periodic AI work.
    pub const AI: u8 = 10;
}

/// Opaque reference to a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventHandle(u64);

/// Actions that name the combatant they act for.
///
/// [`EventScheduler::cancel_all_for`] uses this to drop every pending
/// event of a combatant that died or was interrupted.
pub trait EventSubject {
    /// The combatant this action belongs to, if any.
    fn subject(&self) -> Option<EntityId>;
}

/// An event popped from the queue, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueEvent<A> {
    /// Handle the event was scheduled under.
    pub handle: EventHandle,
    /// Clock value the event was due at.
    pub fire_time: Fixed,
    /// Priority it was scheduled with.
    pub priority: u8,
    /// The captured action.
    pub action: A,
}

#[derive(Debug, Clone)]
struct ScheduledEvent<A> {
    fire_us: i64,
    priority: u8,
    seq: u64,
    action: A,
}

impl<A> ScheduledEvent<A> {
    fn key(&self) -> (i64, u8, u64) {
        (self.fire_us, self.priority, self.seq)
    }
}

impl<A> PartialEq for ScheduledEvent<A> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<A> Eq for ScheduledEvent<A> {}

impl<A> Ord for ScheduledEvent<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for earliest-first.
        other.key().cmp(&self.key())
    }
}

impl<A> PartialOrd for ScheduledEvent<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Simulation clock plus a priority queue of deferred actions.
#[derive(Debug, Clone)]
pub struct EventScheduler<A> {
    now_us: i64,
    queue: BinaryHeap<ScheduledEvent<A>>,
    /// Sequence numbers still in the heap and not cancelled.
    pending: HashSet<u64>,
    next_seq: u64,
}

impl<A> Default for EventScheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> EventScheduler<A> {
    /// Empty scheduler at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now_us: 0,
            queue: BinaryHeap::new(),
            pending: HashSet::new(),
            next_seq: 0,
        }
    }

    /// Current clock value in seconds.
    #[must_use]
    pub fn now(&self) -> Fixed {
        from_micros(self.now_us)
    }

    /// Current clock value in microseconds.
    #[must_use]
    pub const fn now_micros(&self) -> i64 {
        self.now_us
    }

    /// Number of live (not cancelled) events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Queue `action` to fire `delay` seconds from now.
    ///
    /// Negative delays are treated as zero.
    pub fn schedule(&mut self, delay: Fixed, priority: u8, action: A) -> EventHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledEvent {
            fire_us: self.now_us.saturating_add(to_micros(delay).max(0)),
            priority,
            seq,
            action,
        });
        self.pending.insert(seq);
        EventHandle(seq)
    }

    /// Mark an event inert. Returns `true` only the first time a pending
    /// event is cancelled; repeating the call changes nothing.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.pending.remove(&handle.0)
    }

    /// True while the event is queued and not cancelled.
    #[must_use]
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.pending.contains(&handle.0)
    }

    /// Pop the next live event due at or before `until`.
    ///
    /// The clock moves to the event's fire time, so anything the caller
    /// schedules while handling it is timed from that moment and is
    /// picked up by a later `pop_due` call with the same `until`.
    pub fn pop_due(&mut self, until: Fixed) -> Option<DueEvent<A>> {
        self.pop_due_micros(to_micros(until))
    }

    fn pop_due_micros(&mut self, until_us: i64) -> Option<DueEvent<A>> {
        while let Some(top) = self.queue.peek() {
            if top.fire_us > until_us {
                return None;
            }
            let event = self.queue.pop()?;
            if !self.pending.remove(&event.seq) {
                continue;
            }
            self.now_us = self.now_us.max(event.fire_us);
            return Some(DueEvent {
                handle: EventHandle(event.seq),
                fire_time: from_micros(event.fire_us),
                priority: event.priority,
                action: event.action,
            });
        }
        None
    }

    /// Move the clock forward to `time` (never backwards).
    pub fn advance_to(&mut self, time: Fixed) {
        self.now_us = self.now_us.max(to_micros(time));
    }

    /// Advance the clock by `dt` and run every due event in order.
    ///
    /// The handler gets the scheduler back so it can queue follow-ups.
    /// Follow-ups that fall due before the new clock value run in the
    /// same call.
    pub fn update<F>(&mut self, dt: Fixed, mut handler: F)
    where
        F: FnMut(&mut Self, DueEvent<A>),
    {
        let until_us = self.now_us.saturating_add(to_micros(dt).max(0));
        while let Some(event) = self.pop_due_micros(until_us) {
            handler(self, event);
        }
        self.now_us = self.now_us.max(until_us);
    }

    /// True when every live handle still has its event in the heap and
    /// nothing in the heap is due before the clock.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let queued: HashSet<u64> = self.queue.iter().map(|event| event.seq).collect();
        self.pending.iter().all(|seq| queued.contains(seq))
            && self
                .queue
                .iter()
                .filter(|event| self.pending.contains(&event.seq))
                .all(|event| event.fire_us >= self.now_us)
    }

    /// Drop every queued event. The clock is kept.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending.clear();
    }
}

impl<A: EventSubject> EventScheduler<A> {
    /// Cancel every live event whose action belongs to `entity`.
    ///
    /// Returns how many events were cancelled.
    pub fn cancel_all_for(&mut self, entity: EntityId) -> usize {
        let doomed: Vec<u64> = self
            .queue
            .iter()
            .filter(|event| event.action.subject() == Some(entity))
            .map(|event| event.seq)
            .filter(|seq| self.pending.contains(seq))
            .collect();
        for seq in &doomed {
            self.pending.remove(seq);
        }
        if !doomed.is_empty() {
            tracing::trace!(entity, cancelled = doomed.len(), "cancelled pending events");
        }
        doomed.len()
    }

    /// Number of live events belonging to `entity`.
    #[must_use]
    pub fn live_events_for(&self, entity: EntityId) -> usize {
        self.queue
            .iter()
            .filter(|event| self.pending.contains(&event.seq))
            .filter(|event| event.action.subject() == Some(entity))
            .count()
    }
}
