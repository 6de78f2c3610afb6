//! Component view of the simulation.

use std::cell::RefCell;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};

use crate::component::Id;
use crate::event::{EventData, EventId};
use crate::log::log_rejected_event;
use crate::state::{SimulationState, EPSILON};

/// Handle given to each component for reading the clock, drawing random numbers and scheduling events.
///
/// Every event a component creates passes through [`emit()`](Self::emit()) or one of its shortcuts.
/// A delay that is negative (beyond [`EPSILON`](crate::EPSILON)), infinite or NaN would put the event
/// in the past or nowhere on the timeline, so it terminates the simulation.
pub struct SimulationContext {
    id: Id,
    name: String,
    sim_state: Rc<RefCell<SimulationState>>,
    names: Rc<RefCell<Vec<String>>>,
}

impl SimulationContext {
    pub(crate) fn new(
        id: Id,
        name: &str,
        sim_state: Rc<RefCell<SimulationState>>,
        names: Rc<RefCell<Vec<String>>>,
    ) -> Self {
        Self {
            id,
            name: name.to_owned(),
            sim_state,
            names,
        }
    }

    /// Returns the identifier of component associated with this context.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Returns a random float in _[0, 1)_ from the simulation-wide generator.
    pub fn rand(&mut self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }

    /// Returns a random number in the range from the simulation-wide generator.
    ///
    /// Placement policies draw from here, so runs with the same seed make the same choices.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    /// Schedules delivery of `data` to component `dst` after `delay`.
    ///
    /// Panics if the delay is negative or not finite.
    pub fn emit<T>(&mut self, data: T, dst: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.schedule(data, dst, delay)
    }

    /// Schedules delivery of `data` to component `dst` at the current time.
    pub fn emit_now<T>(&mut self, data: T, dst: Id) -> EventId
    where
        T: EventData,
    {
        self.schedule(data, dst, 0.)
    }

    /// Schedules delivery of `data` back to this component after `delay`.
    ///
    /// Panics if the delay is negative or not finite.
    pub fn emit_self<T>(&mut self, data: T, delay: f64) -> EventId
    where
        T: EventData,
    {
        self.schedule(data, self.id, delay)
    }

    /// Schedules delivery of `data` back to this component at the current time.
    pub fn emit_self_now<T>(&mut self, data: T) -> EventId
    where
        T: EventData,
    {
        self.schedule(data, self.id, 0.)
    }

    /// Lookup component name by its identifier.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names.borrow()[id as usize].clone()
    }

    fn schedule<T>(&mut self, data: T, dst: Id, delay: f64) -> EventId
    where
        T: EventData,
    {
        let mut state = self.sim_state.borrow_mut();
        let now = state.time();
        if !delay.is_finite() || delay < -EPSILON {
            let event = state.make_event(data, self.id, dst, now);
            drop(state);
            log_rejected_event(event, &format!("{} emitted it with delay {}", self.name, delay));
        }
        // delays within epsilon below zero are rounding noise
        let event = state.make_event(data, self.id, dst, now + delay.max(0.));
        state.push_event(event)
    }
}
