use rkh_core::{NoTrace, Outcome, Signal, StateId, StaticEvent};

use super::{allowed, event, Probe};
use crate::{Hsm, Model, StateNode, Target, Transition};

const GO: Signal = Signal::new(10);
const POKE: Signal = Signal::new(12);
const AGAIN: Signal = Signal::new(13);

static EV_GO: StaticEvent = event(10);
static EV_OTHER: StaticEvent = event(11);
static EV_POKE: StaticEvent = event(12);
static EV_AGAIN: StaticEvent = event(13);

state_actions! {
    enter_done => "enter done";
    enter_next => "enter next";
    enter_open => "enter open";
}

actions! {
    parent_done => "parent done";
    any_signal => "any";
    poked => "poked";
    again => "again";
}

// P { A, F } --completion--> DONE --completion--> NEXT

const P: StateId = StateId(0);
const A: StateId = StateId(1);
const F: StateId = StateId(2);
const DONE: StateId = StateId(3);
const NEXT: StateId = StateId(4);

static CHAIN_STATES: [StateNode<Probe>; 5] = [
    StateNode::composite(
        "P",
        A,
        &[
            Transition::any(Target::Internal).action(any_signal),
            Transition::completion(DONE).action(parent_done),
        ],
    ),
    StateNode::basic("A", &[Transition::to(GO, F)]).parent(P),
    StateNode::final_state("F").parent(P),
    StateNode::basic("done", &[Transition::completion(NEXT)]).entry(enter_done),
    StateNode::basic("next", &[]).entry(enter_next),
];

static CHAIN: Model<Probe> = Model::new("completion", &CHAIN_STATES, P);

// Final state with nobody handling its completion

static LONE_STATES: [StateNode<Probe>; 2] = [
    StateNode::basic("A", &[Transition::to(GO, StateId(1))]),
    StateNode::final_state("F"),
];

static LONE: Model<Probe> = Model::new("lone-final", &LONE_STATES, StateId(0));

// Two states completing into each other forever

static PING_PONG_STATES: [StateNode<Probe>; 3] = [
    StateNode::basic("start", &[Transition::to(GO, StateId(1))]),
    StateNode::basic("ping", &[Transition::completion(StateId(2))]),
    StateNode::basic("pong", &[Transition::completion(StateId(1))]),
];

static PING_PONG: Model<Probe> = Model::new("ping-pong", &PING_PONG_STATES, StateId(0));

// WAIT completes into OPEN once `allow` holds; it also has an internal and
// a self transition

const IDLE: StateId = StateId(0);
const WAIT: StateId = StateId(1);
const OPEN: StateId = StateId(2);

static GATED_STATES: [StateNode<Probe>; 3] = [
    StateNode::basic("idle", &[Transition::to(GO, WAIT)]),
    StateNode::basic(
        "wait",
        &[
            Transition::completion(OPEN).guard(allowed),
            Transition::internal(POKE).action(poked),
            Transition::to(AGAIN, WAIT).action(again),
        ],
    ),
    StateNode::basic("open", &[]).entry(enter_open),
];

static GATED: Model<Probe> = Model::new("gated", &GATED_STATES, WAIT);
static GATED_FROM_IDLE: Model<Probe> = Model::new("gated-from-idle", &GATED_STATES, IDLE);

#[test]
fn test_models_are_valid() {
    assert_eq!(GATED.validate(), Ok(()));
    assert_eq!(GATED_FROM_IDLE.validate(), Ok(()));
    assert_eq!(CHAIN.validate(), Ok(()));
    assert_eq!(LONE.validate(), Ok(()));
    assert_eq!(PING_PONG.validate(), Ok(()));
}

#[test]
fn test_final_state_raises_completion() {
    let mut probe = Probe::new();
    let mut sm = Hsm::new(&CHAIN);
    sm.init(&mut probe, &NoTrace);

    assert_eq!(sm.dispatch(&mut probe, &EV_GO, &NoTrace), Outcome::Processed);
    // F completes P, DONE completes on its own, all in one step
    assert_eq!(probe.log, ["parent done", "enter done", "enter next"]);
    assert_eq!(sm.state(), Some(NEXT));
    assert_eq!(sm.info().received, 1);
    assert_eq!(sm.info().executed, 4);
}

#[test]
fn test_wildcard_ignores_completion() {
    let mut probe = Probe::new();
    let mut sm = Hsm::new(&CHAIN);
    sm.init(&mut probe, &NoTrace);

    assert_eq!(sm.dispatch(&mut probe, &EV_OTHER, &NoTrace), Outcome::Processed);
    assert_eq!(probe.take(), ["any"]);

    sm.dispatch(&mut probe, &EV_GO, &NoTrace);
    assert!(!probe.log.contains(&"any"));
}

#[test]
fn test_unhandled_completion_is_not_an_error() {
    let mut probe = Probe::new();
    let mut sm = Hsm::new(&LONE);
    sm.init(&mut probe, &NoTrace);

    assert_eq!(sm.dispatch(&mut probe, &EV_GO, &NoTrace), Outcome::Processed);
    assert_eq!(sm.state(), Some(StateId(1)));
}

#[test]
fn test_endless_completion_overflows() {
    let mut probe = Probe::new();
    let mut sm = Hsm::new(&PING_PONG);
    sm.init(&mut probe, &NoTrace);

    assert_eq!(
        sm.dispatch(&mut probe, &EV_GO, &NoTrace),
        Outcome::TransitionOverflow
    );
}

#[test]
fn test_internal_transition_does_not_raise_completion() {
    let mut probe = Probe::default();
    let mut sm = Hsm::new(&GATED);
    sm.init(&mut probe, &NoTrace);
    assert_eq!(sm.state(), Some(WAIT));

    probe.allow = true;
    let checks = probe.checks.get();
    assert_eq!(sm.dispatch(&mut probe, &EV_POKE, &NoTrace), Outcome::Processed);
    assert_eq!(sm.state(), Some(WAIT));
    assert_eq!(probe.log, ["poked"]);
    assert_eq!(probe.checks.get(), checks);
}

#[test]
fn test_self_transition_does_not_raise_completion() {
    let mut probe = Probe::default();
    let mut sm = Hsm::new(&GATED);
    sm.init(&mut probe, &NoTrace);

    probe.allow = true;
    let checks = probe.checks.get();
    assert_eq!(sm.dispatch(&mut probe, &EV_AGAIN, &NoTrace), Outcome::Processed);
    assert_eq!(sm.state(), Some(WAIT));
    assert_eq!(probe.log, ["again"]);
    assert_eq!(probe.checks.get(), checks);
}

#[test]
fn test_entering_a_state_raises_completion() {
    let mut probe = Probe::new();
    let mut sm = Hsm::new(&GATED_FROM_IDLE);
    sm.init(&mut probe, &NoTrace);

    assert_eq!(sm.dispatch(&mut probe, &EV_GO, &NoTrace), Outcome::Processed);
    assert_eq!(sm.state(), Some(OPEN));
    assert_eq!(probe.log, ["enter open"]);
}

#[test]
fn test_initial_completion_with_false_guard_is_processed() {
    let mut probe = Probe::default();
    let mut sm = Hsm::new(&GATED);

    assert_eq!(sm.init(&mut probe, &NoTrace), Outcome::Processed);
    assert_eq!(sm.state(), Some(WAIT));
    assert_eq!(probe.checks.get(), 1);
}

#[test]
fn test_completion_with_false_guard_keeps_new_state() {
    let mut probe = Probe::default();
    let mut sm = Hsm::new(&GATED_FROM_IDLE);
    sm.init(&mut probe, &NoTrace);
    assert_eq!(sm.state(), Some(IDLE));

    assert_eq!(sm.dispatch(&mut probe, &EV_GO, &NoTrace), Outcome::Processed);
    assert_eq!(sm.state(), Some(WAIT));
    assert_eq!(sm.info().executed, 2);
    assert!(probe.log.is_empty());
}
