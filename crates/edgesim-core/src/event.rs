//! Simulation events.

use std::cmp::Ordering;

use downcast_rs::{impl_downcast, Downcast};
use serde::ser::Serialize;

use crate::component::Id;

/// Event identifier, assigned sequentially in order of event creation.
pub type EventId = u64;

/// Trait that should be implemented by event payload.
///
/// It is implemented automatically for every serializable type, so any `#[derive(Serialize)]` struct can be
/// used as a payload.
pub trait EventData: Downcast + erased_serde::Serialize {}

impl_downcast!(EventData);

erased_serde::serialize_trait_object!(EventData);

impl<T: Serialize + 'static> EventData for T {}

/// Represents a simulation event.
pub struct Event {
    /// Unique event identifier.
    pub id: EventId,
    /// Time of event occurrence.
    pub time: f64,
    /// Identifier of event source component.
    pub src: Id,
    /// Identifier of event destination component.
    pub dst: Id,
    /// Event payload.
    pub data: Box<dyn EventData>,
}

impl Event {
    /// Returns the position of the event in the delivery order.
    pub fn key(&self) -> EventKey {
        EventKey {
            time: self.time,
            id: self.id,
        }
    }
}

/// Delivery order of events: by time, then by creation.
///
/// Ids grow with every created event, so events with equal time are delivered first-in first-out.
#[derive(Clone, Copy, Debug)]
pub struct EventKey {
    /// Time of event occurrence.
    pub time: f64,
    /// Event identifier.
    pub id: EventId,
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventKey {}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.total_cmp(&other.time).then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
