use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use edgesim_core::{cast, Event, EventHandler, EventKey, Simulation, SimulationContext, EPSILON};

#[derive(Clone, Serialize)]
struct Ping {
    seq: u32,
}

#[derive(Clone, Serialize)]
struct Unknown {}

struct Recorder {
    ctx: SimulationContext,
    received: Vec<(f64, u32)>,
}

impl EventHandler for Recorder {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            Ping { seq } => {
                self.received.push((self.ctx.time(), seq));
            }
        })
    }
}

fn recorder(sim: &mut Simulation, name: &str) -> Rc<RefCell<Recorder>> {
    let recorder = Rc::new(RefCell::new(Recorder {
        ctx: sim.create_context(name),
        received: Vec::new(),
    }));
    sim.add_handler(name, recorder.clone());
    recorder
}

#[test]
// Events are delivered in time order, and in creation order within the same time.
fn test_same_time_events_are_fifo() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    let mut client = sim.create_context("client");
    let rec_id = rec.borrow().ctx.id();

    client.emit(Ping { seq: 0 }, rec_id, 2.0);
    client.emit(Ping { seq: 1 }, rec_id, 1.0);
    client.emit(Ping { seq: 2 }, rec_id, 2.0);
    client.emit(Ping { seq: 3 }, rec_id, 1.0);
    client.emit_now(Ping { seq: 4 }, rec_id);

    sim.step_until_no_events();
    assert_eq!(
        rec.borrow().received,
        vec![(0.0, 4), (1.0, 1), (1.0, 3), (2.0, 0), (2.0, 2)]
    );
    assert_eq!(sim.time(), 2.0);
    assert_eq!(sim.event_count(), 5);
}

#[test]
fn test_step_for_duration() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    let mut ctx = sim.create_context("client");
    let rec_id = rec.borrow().ctx.id();
    ctx.emit(Ping { seq: 0 }, rec_id, 1.0);
    ctx.emit(Ping { seq: 1 }, rec_id, 2.0);
    ctx.emit(Ping { seq: 2 }, rec_id, 3.5);

    assert!(sim.step_for_duration(1.5));
    assert_eq!(sim.time(), 1.0);
    assert!(sim.step_for_duration(0.1));
    assert_eq!(sim.time(), 1.0);
    assert!(!sim.step_for_duration(3.0));
    assert_eq!(sim.time(), 3.5);
    assert_eq!(rec.borrow().received.len(), 3);
}

#[test]
fn test_component_ids_are_reused() {
    let mut sim = Simulation::new(123);
    let ctx = sim.create_context("comp");
    let rec = Rc::new(RefCell::new(Recorder {
        ctx: sim.create_context("other"),
        received: Vec::new(),
    }));
    assert_eq!(sim.add_handler("comp", rec), ctx.id());
    assert_eq!(sim.lookup_id("comp"), Some(0));
    assert_eq!(sim.lookup_id("missing"), None);
    assert_eq!(sim.lookup_name(1), "other");
}

#[test]
fn test_same_seed_gives_same_random_sequence() {
    let mut sim1 = Simulation::new(42);
    let mut sim2 = Simulation::new(42);
    for _ in 0..10 {
        assert_eq!(sim1.gen_range(0..1000), sim2.gen_range(0..1000));
    }
    let f = sim1.rand();
    assert!((0.0..1.0).contains(&f));
}

#[test]
#[should_panic(expected = "Unhandled event")]
fn test_unhandled_event_is_fatal() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    let mut ctx = sim.create_context("client");
    let rec_id = rec.borrow().ctx.id();
    ctx.emit_now(Unknown {}, rec_id);
    sim.step();
}

#[test]
#[should_panic(expected = "Undelivered event")]
fn test_event_without_handler_is_fatal() {
    let mut sim = Simulation::new(123);
    let mut ctx = sim.create_context("client");
    ctx.emit_self_now(Ping { seq: 0 });
    sim.step();
}

#[test]
#[should_panic(expected = "Invalid event delay")]
fn test_negative_delay_is_fatal() {
    let mut sim = Simulation::new(123);
    let mut ctx = sim.create_context("client");
    ctx.emit_self(Ping { seq: 0 }, -1.0);
}

#[test]
#[should_panic(expected = "Invalid event delay")]
fn test_infinite_delay_is_fatal() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    let mut ctx = sim.create_context("client");
    let rec_id = rec.borrow().ctx.id();
    ctx.emit(Ping { seq: 0 }, rec_id, f64::INFINITY);
}

#[test]
#[should_panic(expected = "Invalid event delay")]
fn test_nan_delay_is_fatal() {
    let mut sim = Simulation::new(123);
    let mut ctx = sim.create_context("client");
    ctx.emit_self(Ping { seq: 0 }, f64::NAN);
}

#[test]
fn test_rejected_delay_leaves_queue_untouched() {
    let mut sim = Simulation::new(123);
    let mut ctx = sim.create_context("client");
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        ctx.emit_self(Ping { seq: 0 }, -0.5);
    }));
    assert!(result.is_err());
    assert_eq!(sim.event_count(), 0);
    assert!(!sim.step());
}

#[test]
fn test_rounding_noise_delay_is_clamped() {
    let mut sim = Simulation::new(123);
    let rec = recorder(&mut sim, "rec");
    let mut ctx = sim.create_context("client");
    let rec_id = rec.borrow().ctx.id();
    ctx.emit(Ping { seq: 0 }, rec_id, 1.0);
    sim.step();
    ctx.emit(Ping { seq: 1 }, rec_id, -EPSILON / 2.);
    sim.step();
    assert_eq!(rec.borrow().received, vec![(1.0, 0), (1.0, 1)]);
}

#[test]
fn test_event_key_order() {
    let early = EventKey { time: 1.0, id: 5 };
    let late = EventKey { time: 2.0, id: 0 };
    let early_newer = EventKey { time: 1.0, id: 6 };
    assert!(early < late);
    assert!(early < early_newer);
    assert!(early_newer < late);
    assert_eq!(early, EventKey { time: 1.0, id: 5 });
}
