//! Blinky on the host
//!
//! One active object drives an LED through two states. A timer thread posts
//! `TIMEOUT` periodically while the main thread runs the cooperative
//! scheduler; after a fixed number of blinks the timer asks the scheduler to
//! shut down.

use std::thread;
use std::time::Duration;

use critical_section::CriticalSection;
use rkh_core::{priority, Event, Hooks, Signal, StateId, StaticEvent, TraceRecord, Tracer};
use rkh_fwk::{ActiveObject, Runnable};
use rkh_sched::{Scheduler, SchedulerConfig};
use rkh_sm::{Model, StateNode, Transition};

const TIMEOUT: Signal = Signal::new(Signal::USER.raw());

const OFF: StateId = StateId(0);
const ON: StateId = StateId(1);

const BLINKS: u32 = 6;
const PERIOD: Duration = Duration::from_millis(100);

/// LED model state
#[derive(Default)]
struct Led {
    lit: bool,
    switched_on: u32,
}

fn turn_on(led: &mut Led, _e: &dyn Event) {
    led.lit = true;
    led.switched_on += 1;
    println!("LED on");
}

fn turn_off(led: &mut Led, _e: &dyn Event) {
    led.lit = false;
    println!("LED off");
}

static BLINKY_STATES: [StateNode<Led>; 2] = [
    StateNode::basic("off", &[Transition::to(TIMEOUT, ON).action(turn_on)]),
    StateNode::basic("on", &[Transition::to(TIMEOUT, OFF).action(turn_off)]),
];

static BLINKY: Model<Led> = Model::new("blinky", &BLINKY_STATES, OFF);

static EV_TIMEOUT: StaticEvent = StaticEvent::new(TIMEOUT);

/// Prints state machine transitions and scheduler lifecycle
struct Console;

impl Tracer for Console {
    fn emit(&self, record: &TraceRecord) {
        match record {
            TraceRecord::SmInit { .. }
            | TraceRecord::SmTransition { .. }
            | TraceRecord::FwkEnter
            | TraceRecord::FwkExit => println!("trace #{:02}: {:?}", record.id(), record),
            _ => {}
        }
    }
}

impl Hooks for Console {
    fn on_start(&self) {
        println!("scheduler started");
    }

    fn on_idle(&self, _cs: CriticalSection<'_>) {
        std::hint::spin_loop();
    }

    fn on_exit(&self) {
        println!("scheduler stopped");
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("RKH blinky, {} blinks every {:?}", BLINKS, PERIOD);

    static CONSOLE: Console = Console;
    let led: ActiveObject<'_, Led, 4> =
        ActiveObject::new(priority!(1), "led", &BLINKY, Led::default());
    let scheduler = Scheduler::new(SchedulerConfig::builder().name("blinky").build(), &CONSOLE);

    if let Err(err) = BLINKY.validate() {
        eprintln!("invalid model: {}", err);
        return;
    }
    if let Err(err) = scheduler.activate(&led) {
        eprintln!("activation failed: {}", err);
        return;
    }

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..BLINKS * 2 {
                thread::sleep(PERIOD);
                if let Err(err) = scheduler.post_fifo(led.priority(), &EV_TIMEOUT) {
                    eprintln!("timeout dropped: {}", err);
                }
            }
            // let the last timeout go through
            while scheduler.is_ready(led.priority()) {
                thread::yield_now();
            }
            scheduler.shutdown();
        });

        scheduler.run();
    });

    led.with_machine(|hsm, led| {
        println!(
            "done: state {}, LED {}, switched on {} times, {} events",
            hsm.model().name_of(hsm.state().unwrap_or(OFF)),
            if led.lit { "lit" } else { "dark" },
            led.switched_on,
            hsm.info().received
        );
    });
}
