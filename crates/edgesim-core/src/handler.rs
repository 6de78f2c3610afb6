//! Event handling.

use crate::event::Event;

/// Trait for consuming events in simulation components.
pub trait EventHandler {
    /// Processes event.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use serde::Serialize;
    /// use edgesim_core::{cast, Event, EventHandler, Simulation, SimulationContext};
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct Ping {
    ///     seq: u32,
    /// }
    ///
    /// pub struct Component {
    ///     last_seq: u32,
    /// }
    ///
    /// impl EventHandler for Component {
    ///     fn on(&mut self, event: Event) {
    ///         cast!(match event.data {
    ///             Ping { seq } => {
    ///                 self.last_seq = seq;
    ///             }
    ///         })
    ///     }
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let mut client_ctx = sim.create_context("client");
    /// let comp = Rc::new(RefCell::new(Component { last_seq: 0 }));
    /// let comp_id = sim.add_handler("comp", comp.clone());
    /// client_ctx.emit(Ping { seq: 16 }, comp_id, 1.2);
    /// sim.step();
    /// assert_eq!(comp.borrow().last_seq, 16);
    /// ```
    fn on(&mut self, event: Event);
}

/// Enables the use of pattern matching syntax for processing different types of events
/// by downcasting the event payload from [`EventData`](crate::event::EventData) to user-defined types.
///
/// Match arms need not be exhaustive. However, an event whose payload does not match any of the arms
/// is logged under `ERROR` level and terminates the simulation, since it means that components were
/// wired incorrectly.
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                if let Ok(__value) = $event.data.downcast::<$type>() {
                    let $type { $($tt)* } = *__value;
                    $($expr)*
                }
            } else
        )*
        {
            $crate::log::log_unhandled_event($event);
        }
    }
}
