use crate::sim::{Event, SimTime, Simulator, World};
use std::any::Any;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CountingWorld {
    ticks: usize,
}

impl World for CountingWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn on_tick(&mut self, _sim: &mut Simulator) {
        self.ticks = self.ticks.saturating_add(1);
    }
}

type Log = Arc<Mutex<Vec<(u32, SimTime)>>>;

/// 记录 (id, 执行时刻)
struct Mark {
    id: u32,
    log: Log,
}

impl Event for Mark {
    fn execute(self: Box<Self>, sim: &mut Simulator, _world: &mut dyn World) {
        let Mark { id, log } = *self;
        log.lock().expect("log lock").push((id, sim.now()));
    }
}

/// 执行后在 `delay` 之后再调度一个 Mark
struct MarkThenFollow {
    id: u32,
    follow_id: u32,
    delay: SimTime,
    log: Log,
}

impl Event for MarkThenFollow {
    fn execute(self: Box<Self>, sim: &mut Simulator, _world: &mut dyn World) {
        let MarkThenFollow {
            id,
            follow_id,
            delay,
            log,
        } = *self;
        log.lock().expect("log lock").push((id, sim.now()));
        sim.schedule_in(delay, Mark { id: follow_id, log });
    }
}

struct PauseNow;

impl Event for PauseNow {
    fn execute(self: Box<Self>, sim: &mut Simulator, _world: &mut dyn World) {
        sim.pause();
    }
}

fn mark(id: u32, log: &Log) -> Mark {
    Mark {
        id,
        log: Arc::clone(log),
    }
}

fn ids(log: &Log) -> Vec<u32> {
    log.lock().expect("log lock").iter().map(|(id, _)| *id).collect()
}

#[test]
fn events_run_in_time_order_with_fifo_tie_break() {
    let log = Log::default();
    let mut sim = Simulator::default();
    sim.schedule(SimTime::from_millis(300), mark(1, &log));
    sim.schedule(SimTime::from_millis(100), mark(2, &log));
    sim.schedule(SimTime::from_millis(300), mark(3, &log));
    sim.schedule(SimTime::from_millis(100), mark(4, &log));

    let mut world = CountingWorld::default();
    sim.run(&mut world);

    assert_eq!(ids(&log), vec![2, 4, 1, 3]);
    assert_eq!(world.ticks, 4);
    assert_eq!(sim.executed(), 4);
    assert_eq!(sim.now(), SimTime::from_millis(300));
}

#[test]
fn schedule_in_is_relative_to_the_executing_event() {
    let log = Log::default();
    let mut sim = Simulator::default();
    sim.schedule(
        SimTime::from_millis(50),
        MarkThenFollow {
            id: 1,
            follow_id: 2,
            delay: SimTime::from_millis(300),
            log: Arc::clone(&log),
        },
    );

    let mut world = CountingWorld::default();
    sim.run(&mut world);

    let got = log.lock().expect("log lock").clone();
    assert_eq!(
        got,
        vec![(1, SimTime::from_millis(50)), (2, SimTime::from_millis(350))]
    );
}

#[test]
fn scheduling_into_the_past_is_clamped_to_now() {
    let log = Log::default();
    let mut sim = Simulator::default();
    let mut world = CountingWorld::default();
    sim.run_until(SimTime::from_millis(10), &mut world);

    sim.schedule(SimTime::from_millis(1), mark(7, &log));
    sim.run(&mut world);

    let got = log.lock().expect("log lock").clone();
    assert_eq!(got, vec![(7, SimTime::from_millis(10))]);
}

#[test]
fn run_until_stops_at_the_horizon_and_advances_the_clock() {
    let log = Log::default();
    let mut sim = Simulator::default();
    sim.schedule(SimTime::ZERO, mark(1, &log));
    sim.schedule(SimTime::from_millis(5), mark(2, &log));
    sim.schedule(SimTime::from_millis(10), mark(3, &log));

    let mut world = CountingWorld::default();
    sim.run_until(SimTime::from_millis(5), &mut world);
    assert_eq!(ids(&log), vec![1, 2]);
    assert_eq!(sim.now(), SimTime::from_millis(5));
    assert_eq!(sim.pending(), 1);

    sim.run_until(SimTime::from_millis(7), &mut world);
    assert_eq!(sim.now(), SimTime::from_millis(7));

    sim.run(&mut world);
    assert_eq!(ids(&log), vec![1, 2, 3]);
    assert_eq!(sim.now(), SimTime::from_millis(10));
}

#[test]
fn paused_simulator_freezes_clock_and_pending_events() {
    let log = Log::default();
    let mut sim = Simulator::default();
    sim.schedule(SimTime::from_millis(100), mark(1, &log));
    sim.pause();

    let mut world = CountingWorld::default();
    sim.run_until(SimTime::from_secs(60), &mut world);
    sim.run(&mut world);
    assert!(sim.is_paused());
    assert_eq!(sim.now(), SimTime::ZERO);
    assert_eq!(sim.pending(), 1);
    assert!(ids(&log).is_empty());

    sim.resume();
    sim.run_until(SimTime::from_millis(100), &mut world);
    assert_eq!(ids(&log), vec![1]);
    assert_eq!(sim.now(), SimTime::from_millis(100));
}

#[test]
fn pause_requested_by_an_event_stops_the_run_at_that_instant() {
    let log = Log::default();
    let mut sim = Simulator::default();
    sim.schedule(SimTime::from_millis(10), PauseNow);
    sim.schedule(SimTime::from_millis(20), mark(1, &log));

    let mut world = CountingWorld::default();
    sim.run_until(SimTime::from_millis(100), &mut world);

    assert!(sim.is_paused());
    assert_eq!(sim.now(), SimTime::from_millis(10));
    assert!(ids(&log).is_empty());
}

#[test]
fn cancel_all_discards_every_pending_event() {
    let log = Log::default();
    let mut sim = Simulator::default();
    for id in 0..5 {
        sim.schedule(SimTime::from_millis(u64::from(id)), mark(id, &log));
    }
    assert_eq!(sim.pending(), 5);

    sim.cancel_all();
    assert_eq!(sim.pending(), 0);

    let mut world = CountingWorld::default();
    sim.run(&mut world);
    assert!(ids(&log).is_empty());
    assert_eq!(world.ticks, 0);
}
