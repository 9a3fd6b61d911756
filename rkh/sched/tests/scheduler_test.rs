//! Scheduler loop tests for rkh-sched

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;

use rkh_core::{Event, Hooks, Priority, Signal, StateId, StaticEvent, TraceRecord, Tracer};
use rkh_fwk::{ActiveObject, Runnable};
use rkh_sched::{Scheduler, SchedulerConfig, SchedulerState};
use rkh_sm::{Model, StateNode, Transition};

const TICK: Signal = Signal::new(10);

#[derive(Default)]
struct Ticker {
    ticks: u32,
}

fn tick(t: &mut Ticker, _e: &dyn Event) {
    t.ticks += 1;
}

static TICKER_STATES: [StateNode<Ticker>; 1] =
    [StateNode::basic("counting", &[Transition::internal(TICK).action(tick)])];

static TICKER: Model<Ticker> = Model::new("ticker", &TICKER_STATES, StateId(0));

static EV_TICK: StaticEvent = StaticEvent::new(TICK);

#[derive(Default)]
struct Lifecycle {
    started: AtomicBool,
    exited: AtomicBool,
    entered: AtomicU32,
}

impl Tracer for Lifecycle {
    fn emit(&self, record: &TraceRecord) {
        if let TraceRecord::FwkEnter = record {
            self.entered.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Hooks for Lifecycle {
    fn on_start(&self) {
        self.started.store(true, Ordering::Relaxed);
    }

    fn on_exit(&self) {
        self.exited.store(true, Ordering::Relaxed);
    }
}

#[test]
fn test_run_dispatches_events_from_another_thread() {
    const EVENTS: u32 = 25;

    let hooks = Lifecycle::default();
    let ticker: ActiveObject<'_, Ticker, 4> =
        ActiveObject::new(Priority::new_unchecked(1), "ticker", &TICKER, Ticker::default());
    let sched = Scheduler::new(SchedulerConfig::builder().name("host").build(), &hooks);
    sched.activate(&ticker).unwrap();

    thread::scope(|s| {
        let runner = s.spawn(|| sched.run());

        for _ in 0..EVENTS {
            while sched.post_fifo(ticker.priority(), &EV_TICK).is_err() {
                thread::yield_now();
            }
        }
        while ticker.info().received < EVENTS {
            thread::yield_now();
        }

        sched.shutdown();
        runner.join().unwrap();
    });

    assert_eq!(sched.state(), SchedulerState::Shutdown);
    assert!(hooks.started.load(Ordering::Relaxed));
    assert!(hooks.exited.load(Ordering::Relaxed));
    assert_eq!(hooks.entered.load(Ordering::Relaxed), 1);
    ticker.with_machine(|_, t| assert_eq!(t.ticks, EVENTS));
}
