use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::component::Id;
use crate::event::{Event, EventData, EventId};

/// Epsilon to compare floating point values for equality.
pub const EPSILON: f64 = 1e-12;

struct Pending(Event);

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.0.key() == other.0.key()
    }
}

impl Eq for Pending {}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.key().cmp(&other.0.key())
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Clock, random generator and the queue of pending events.
///
/// Delays are validated by [`SimulationContext`](crate::SimulationContext) before events get here,
/// so the queue only ever holds events at or after the current time.
pub struct SimulationState {
    clock: f64,
    rand: Pcg64,
    events: BinaryHeap<Reverse<Pending>>,
    event_count: u64,
}

impl SimulationState {
    pub fn new(seed: u64) -> Self {
        Self {
            clock: 0.0,
            rand: Pcg64::seed_from_u64(seed),
            events: BinaryHeap::new(),
            event_count: 0,
        }
    }

    pub fn time(&self) -> f64 {
        self.clock
    }

    pub fn rand(&mut self) -> f64 {
        self.rand.gen_range(0.0..1.0)
    }

    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.rand.gen_range(range)
    }

    /// Creates an event occurring at `time` without enqueuing it.
    pub fn make_event<T>(&self, data: T, src: Id, dst: Id, time: f64) -> Event
    where
        T: EventData,
    {
        Event {
            id: self.event_count,
            time,
            src,
            dst,
            data: Box::new(data),
        }
    }

    pub fn push_event(&mut self, event: Event) -> EventId {
        let id = event.id;
        self.events.push(Reverse(Pending(event)));
        self.event_count += 1;
        id
    }

    pub fn next_event(&mut self) -> Option<Event> {
        let Reverse(Pending(event)) = self.events.pop()?;
        self.clock = event.time;
        Some(event)
    }

    pub fn peek_event(&self) -> Option<&Event> {
        self.events.peek().map(|Reverse(Pending(event))| event)
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }
}
