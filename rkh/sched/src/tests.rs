//! Scheduler tests for rkh-sched

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex as StdMutex;
use std::vec::Vec;

use critical_section::CriticalSection;
use rkh_core::{
    define_event, ErrorReport, Event, EventHeader, Hooks, Outcome, Priority, RkhError, Signal,
    StateId, StaticEvent, Tracer,
};
use rkh_fwk::{ActiveObject, Runnable};
use rkh_sm::{Model, StateNode, Transition};

use crate::{Scheduler, SchedulerConfig, SchedulerState, Step};

const WORK: Signal = Signal::new(10);
const FLIP: Signal = Signal::new(11);
const BLOCKED: Signal = Signal::new(12);
const STRAY: Signal = Signal::new(13);

const READY: StateId = StateId(0);
const BUSY: StateId = StateId(1);

#[derive(Default)]
struct Worker {
    done: u32,
}

fn work(w: &mut Worker, _e: &dyn Event) {
    w.done += 1;
}

fn never(_w: &Worker, _e: &dyn Event) -> bool {
    false
}

static WORKER_STATES: [StateNode<Worker>; 2] = [
    StateNode::basic(
        "ready",
        &[
            Transition::internal(WORK).action(work),
            Transition::to(FLIP, BUSY),
            Transition::to(BLOCKED, BUSY).guard(never),
        ],
    ),
    StateNode::basic("busy", &[Transition::to(FLIP, READY)]),
];

static WORKER: Model<Worker> = Model::new("worker", &WORKER_STATES, READY);

static EV_WORK: StaticEvent = StaticEvent::new(WORK);
static EV_FLIP: StaticEvent = StaticEvent::new(FLIP);
static EV_BLOCKED: StaticEvent = StaticEvent::new(BLOCKED);
static EV_STRAY: StaticEvent = StaticEvent::new(STRAY);

define_event!(struct Job { id: u8 });

#[derive(Default)]
struct Recorder {
    dispatched: StdMutex<Vec<u8>>,
    errors: StdMutex<Vec<ErrorReport>>,
    released: StdMutex<Vec<Signal>>,
    idles: AtomicU32,
}

impl Tracer for Recorder {}

impl Hooks for Recorder {
    fn on_idle(&self, _cs: CriticalSection<'_>) {
        self.idles.fetch_add(1, Ordering::Relaxed);
    }

    fn on_dispatch(&self, priority: Priority, _event: &dyn Event) {
        self.dispatched.lock().unwrap().push(priority.raw());
    }

    fn on_release(&self, event: &dyn Event) {
        self.released.lock().unwrap().push(event.signal());
    }

    fn on_error(&self, report: &ErrorReport) {
        self.errors.lock().unwrap().push(*report);
    }
}

fn prio(p: u8) -> Priority {
    Priority::new_unchecked(p)
}

fn worker<'a>(priority: u8) -> ActiveObject<'a, Worker, 4> {
    ActiveObject::new(prio(priority), "worker", &WORKER, Worker::default())
}

#[test]
fn test_lowest_priority_value_runs_first() {
    let hooks = Recorder::default();
    let (w7, w2, w5) = (worker(7), worker(2), worker(5));
    let sched = Scheduler::new(SchedulerConfig::default(), &hooks);
    for w in [&w7, &w2, &w5] {
        assert_eq!(sched.activate(w), Ok(Outcome::Processed));
    }

    for p in [7, 2, 5] {
        sched.post_fifo(prio(p), &EV_WORK).unwrap();
    }

    let mut order = Vec::new();
    while let Step::Dispatched { priority, outcome } = sched.run_once() {
        assert_eq!(outcome, Outcome::Processed);
        order.push(priority.raw());
    }
    assert_eq!(order, [2, 5, 7]);
    assert_eq!(*hooks.dispatched.lock().unwrap(), [2, 5, 7]);
    assert_eq!(hooks.idles.load(Ordering::Relaxed), 1);
}

#[test]
fn test_ready_bit_cleared_when_queue_drains() {
    let hooks = Recorder::default();
    let w = worker(3);
    let sched = Scheduler::new(SchedulerConfig::default(), &hooks);
    sched.activate(&w).unwrap();

    sched.post_fifo(prio(3), &EV_WORK).unwrap();
    sched.post_fifo(prio(3), &EV_FLIP).unwrap();
    assert!(sched.is_ready(prio(3)));

    sched.run_once();
    assert!(sched.is_ready(prio(3)));
    sched.run_once();
    assert!(!sched.is_ready(prio(3)));

    assert_eq!(w.state(), Some(BUSY));
    w.with_machine(|_, worker| assert_eq!(worker.done, 1));
}

#[test]
fn test_run_until_idle_skips_idle_hook() {
    let hooks = Recorder::default();
    let (a, b) = (worker(1), worker(4));
    let sched = Scheduler::new(SchedulerConfig::default(), &hooks);
    sched.activate(&a).unwrap();
    sched.activate(&b).unwrap();

    sched.post_fifo(prio(4), &EV_WORK).unwrap();
    sched.post_fifo(prio(1), &EV_WORK).unwrap();
    sched.post_lifo(prio(1), &EV_FLIP).unwrap();

    assert_eq!(sched.run_until_idle(), 3);
    assert_eq!(hooks.idles.load(Ordering::Relaxed), 0);
    assert_eq!(*hooks.dispatched.lock().unwrap(), [1, 1, 4]);
    // FLIP went first, so WORK found a state without a handler
    assert_eq!(a.state(), Some(BUSY));
    a.with_machine(|_, worker| assert_eq!(worker.done, 0));
}

#[test]
fn test_registration_errors() {
    let hooks = Recorder::default();
    let (first, twin) = (worker(6), worker(6));
    let sched = Scheduler::new(SchedulerConfig::default(), &hooks);

    sched.register(&first).unwrap();
    assert_eq!(sched.register(&twin), Err(RkhError::PriorityInUse));
    assert_eq!(sched.post_fifo(prio(9), &EV_WORK), Err(RkhError::NotRegistered));
    assert_eq!(sched.unregister(prio(9)), Err(RkhError::NotRegistered));

    assert_eq!(sched.unregister(prio(6)), Ok(()));
    assert!(sched.active(prio(6)).is_none());
    assert_eq!(sched.register(&twin), Ok(()));
    assert_eq!(sched.active(prio(6)).map(|a| a.name()), Some("worker"));
}

#[test]
fn test_activate_twice_is_rejected() {
    let hooks = Recorder::default();
    let w = worker(8);
    let sched = Scheduler::new(SchedulerConfig::default(), &hooks);

    assert_eq!(sched.activate(&w), Ok(Outcome::Processed));
    sched.unregister(prio(8)).unwrap();
    assert_eq!(sched.activate(&w), Err(RkhError::AlreadyStarted));
    // the slot was given back
    assert!(sched.active(prio(8)).is_none());
}

#[test]
fn test_error_outcomes_are_reported() {
    let hooks = Recorder::default();
    let w = worker(2);
    let sched = Scheduler::new(SchedulerConfig::default(), &hooks);
    sched.activate(&w).unwrap();

    sched.post_fifo(prio(2), &EV_STRAY).unwrap();
    sched.post_fifo(prio(2), &EV_BLOCKED).unwrap();
    assert_eq!(
        sched.run_once(),
        Step::Dispatched { priority: prio(2), outcome: Outcome::EventNotFound }
    );
    assert_eq!(
        sched.run_once(),
        Step::Dispatched { priority: prio(2), outcome: Outcome::GuardFalse }
    );
    // neither is an error by default
    assert!(hooks.errors.lock().unwrap().is_empty());
}

#[test]
fn test_unhandled_events_reported_on_request() {
    let hooks = Recorder::default();
    let w = worker(2);
    let config = SchedulerConfig::builder().name("strict").report_unhandled(true).build();
    let sched = Scheduler::new(config, &hooks);
    sched.activate(&w).unwrap();

    sched.post_fifo(prio(2), &EV_STRAY).unwrap();
    sched.run_until_idle();

    assert_eq!(
        *hooks.errors.lock().unwrap(),
        [ErrorReport {
            priority: prio(2),
            signal: STRAY,
            state: Some(READY),
            outcome: Outcome::EventNotFound,
        }]
    );
}

#[test]
fn test_dispatched_dynamic_event_is_released() {
    static JOB: Job = Job { header: EventHeader::dynamic(WORK, 1), id: 3 };

    let hooks = Recorder::default();
    let w = worker(1);
    let sched = Scheduler::new(SchedulerConfig::default(), &hooks);
    sched.activate(&w).unwrap();

    sched.post_fifo(prio(1), &JOB).unwrap();
    assert_eq!(JOB.header.nref(), 1);
    sched.run_until_idle();

    assert_eq!(JOB.header.nref(), 0);
    assert_eq!(*hooks.released.lock().unwrap(), [WORK]);
    assert_eq!(JOB.id, 3);
}

#[test]
fn test_terminate_reclaims_queued_events() {
    static LEFTOVER: Job = Job { header: EventHeader::dynamic(WORK, 1), id: 9 };

    let hooks = Recorder::default();
    let w = worker(5);
    let sched = Scheduler::new(SchedulerConfig::default(), &hooks);
    sched.activate(&w).unwrap();

    sched.post_fifo(prio(5), &LEFTOVER).unwrap();
    sched.terminate(prio(5)).unwrap();

    assert!(!sched.is_ready(prio(5)));
    assert_eq!(w.queue_len(), 0);
    assert_eq!(LEFTOVER.header.nref(), 0);
    assert_eq!(hooks.released.lock().unwrap().len(), 1);
    assert_eq!(sched.run_once(), Step::Idle);
}

#[test]
fn test_shutdown_is_terminal() {
    let hooks = Recorder::default();
    let w = worker(1);
    let sched = Scheduler::new(SchedulerConfig::default(), &hooks);
    sched.activate(&w).unwrap();
    sched.post_fifo(prio(1), &EV_WORK).unwrap();

    assert_eq!(sched.state(), SchedulerState::Idle);
    sched.shutdown();
    assert_eq!(sched.state(), SchedulerState::Shutdown);
    assert_eq!(sched.run_once(), Step::Shutdown);
    assert_eq!(sched.run_until_idle(), 0);

    // returns at once, nothing dispatched
    sched.run();
    assert!(hooks.dispatched.lock().unwrap().is_empty());
}

#[test]
fn test_state_follows_ready_set() {
    let hooks = Recorder::default();
    let w = worker(3);
    let sched = Scheduler::new(SchedulerConfig::default(), &hooks);
    sched.activate(&w).unwrap();
    assert_eq!(sched.state(), SchedulerState::Idle);

    sched.post_fifo(prio(3), &EV_WORK).unwrap();
    sched.post_fifo(prio(3), &EV_WORK).unwrap();

    assert!(matches!(sched.run_once(), Step::Dispatched { .. }));
    assert_eq!(sched.state(), SchedulerState::Running);
    assert!(matches!(sched.run_once(), Step::Dispatched { .. }));
    assert_eq!(sched.state(), SchedulerState::Idle);

    assert_eq!(sched.run_once(), Step::Idle);
    assert_eq!(sched.state(), SchedulerState::Idle);

    sched.post_fifo(prio(3), &EV_WORK).unwrap();
    sched.shutdown();
    assert_eq!(sched.run_once(), Step::Shutdown);
    assert_eq!(sched.state(), SchedulerState::Shutdown);
}

#[test]
fn test_config_builder() {
    let config = SchedulerConfig::builder()
        .name("TestScheduler")
        .report_unhandled(true)
        .build();
    assert_eq!(config.name, "TestScheduler");
    assert!(config.report_unhandled);

    let config = SchedulerConfig::default();
    assert_eq!(config.name, "RKH");
    assert!(!config.report_unhandled);
}
