//! Hierarchical state machine dispatch engine
//!
//! A dispatch is planned before anything runs: the enabled transition is
//! found, its pseudostate chain resolved, the exit and entry sets computed
//! and the target settled down to a leaf, all against a working copy of the
//! instance's [`Cells`]. Only a complete plan is executed and committed, so a
//! dispatch that fails leaves the machine exactly as it found it.

use core::fmt;

use heapless::Vec;
use rkh_core::{
    Event, Outcome, Signal, StateId, StaticEvent, TraceRecord, Tracer, MAX_HCAL_DEPTH,
    MAX_TR_SEGS,
};

use crate::cells::Cells;
use crate::model::{Action, Model, StateKind, StateNode, Target, Transition, Trigger};

static INIT_EVENT: StaticEvent = StaticEvent::new(Signal::INIT);
static COMPLETION_EVENT: StaticEvent = StaticEvent::new(Signal::COMPLETION);

/// Upper bound of exits, actions and entries in one compound transition
const PLAN_CAPACITY: usize = 2 * MAX_HCAL_DEPTH + MAX_TR_SEGS;

type Path = Vec<StateId, MAX_HCAL_DEPTH>;

enum Step<C: 'static> {
    Exit(StateId),
    Action(Action<C>),
    Enter(StateId),
}

impl<C> Clone for Step<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Step<C> {}

/// Ordered effects of one compound transition
struct Plan<C: 'static> {
    steps: Vec<Step<C>, PLAN_CAPACITY>,
    segments: usize,
    exited: u8,
    entered: u8,
}

impl<C> Plan<C> {
    const fn new() -> Self {
        Self {
            steps: Vec::new(),
            segments: 0,
            exited: 0,
            entered: 0,
        }
    }

    fn segment(&mut self) -> Result<(), Outcome> {
        self.segments += 1;
        if self.segments > MAX_TR_SEGS {
            Err(Outcome::TransitionOverflow)
        } else {
            Ok(())
        }
    }

    fn action(&mut self, action: Option<Action<C>>) -> Result<(), Outcome> {
        if let Some(action) = action {
            self.push(Step::Action(action))?;
        }
        Ok(())
    }

    fn exit(&mut self, state: StateId) -> Result<(), Outcome> {
        self.push(Step::Exit(state))?;
        self.exited += 1;
        Ok(())
    }

    fn enter(&mut self, state: StateId) -> Result<(), Outcome> {
        self.push(Step::Enter(state))?;
        self.entered += 1;
        Ok(())
    }

    /// Move the actions gathered while resolving a target behind the exits
    fn append(&mut self, other: &Plan<C>) -> Result<(), Outcome> {
        for step in other.steps.iter() {
            self.push(*step)?;
        }
        self.segments += other.segments;
        Ok(())
    }

    fn push(&mut self, step: Step<C>) -> Result<(), Outcome> {
        self.steps.push(step).map_err(|_| Outcome::TransitionOverflow)
    }
}

/// Per-instance counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmInfo {
    /// Events handed to `dispatch`
    pub received: u32,
    /// Transitions fired, completion transitions included
    pub executed: u32,
}

/// State machine instance: a shared model plus this instance's state
pub struct Hsm<C: 'static> {
    model: &'static Model<C>,
    state: Option<StateId>,
    cells: Cells,
    info: SmInfo,
    id: u8,
}

impl<C> Hsm<C> {
    /// Create an instance; it has no state until [`init`](Self::init)
    pub const fn new(model: &'static Model<C>) -> Self {
        Self {
            model,
            state: None,
            cells: Cells::new(),
            info: SmInfo { received: 0, executed: 0 },
            id: 0,
        }
    }

    /// Id written into trace records
    pub const fn with_id(mut self, id: u8) -> Self {
        self.id = id;
        self
    }

    pub fn set_id(&mut self, id: u8) {
        self.id = id;
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn model(&self) -> &'static Model<C> {
        self.model
    }

    /// Current leaf state, `None` before the initial transition
    pub fn state(&self) -> Option<StateId> {
        self.state
    }

    pub fn info(&self) -> SmInfo {
        self.info
    }

    pub fn cells(&self) -> &Cells {
        &self.cells
    }

    /// Check whether `state` is the current state or one of its ancestors
    pub fn is_in(&self, state: StateId) -> bool {
        self.state
            .and_then(|current| self.path_to(current, &self.cells).ok())
            .map_or(false, |path| path.contains(&state))
    }

    /// State recorded by a history pseudostate
    pub fn history(&self, history: StateId) -> Option<StateId> {
        match self.model.node(history).map(|node| &node.kind) {
            Some(StateKind::ShallowHistory { slot, .. }) | Some(StateKind::DeepHistory { slot, .. }) => {
                self.cells.history(*slot)
            }
            _ => None,
        }
    }

    /// Forget what a history pseudostate recorded. Returns `false` if
    /// `history` is not a history pseudostate.
    pub fn clear_history(&mut self, history: StateId) -> bool {
        match self.model.node(history).map(|node| &node.kind) {
            Some(StateKind::ShallowHistory { slot, .. }) | Some(StateKind::DeepHistory { slot, .. }) => {
                self.cells.clear_history(*slot);
                true
            }
            _ => false,
        }
    }

    /// Take the initial transition
    pub fn init<T: Tracer + ?Sized>(&mut self, ctx: &mut C, tracer: &T) -> Outcome {
        if self.state.is_some() {
            self.report(Outcome::UnknownState, Signal::INIT, tracer);
            return Outcome::UnknownState;
        }
        match self.try_init(ctx, tracer) {
            Ok(raised) => self.complete(ctx, raised, tracer),
            Err(outcome) => {
                self.report(outcome, Signal::INIT, tracer);
                outcome
            }
        }
    }

    /// Process one event to completion
    pub fn dispatch<T: Tracer + ?Sized>(
        &mut self,
        ctx: &mut C,
        event: &dyn Event,
        tracer: &T,
    ) -> Outcome {
        tracer.emit(&TraceRecord::SmDispatch {
            sm: self.id,
            signal: event.signal(),
            state: self.state,
        });
        self.info.received = self.info.received.wrapping_add(1);

        match self.try_step(ctx, event, tracer) {
            Ok(raised) => self.complete(ctx, raised, tracer),
            Err(outcome) => {
                self.report(outcome, event.signal(), tracer);
                outcome
            }
        }
    }

    /// `Ok(true)` when the state entered raises a completion event
    fn try_init<T: Tracer + ?Sized>(&mut self, ctx: &mut C, tracer: &T) -> Result<bool, Outcome> {
        let event: &dyn Event = &INIT_EVENT;
        let mut cells = self.cells;
        let mut plan = Plan::new();

        plan.segment()?;
        plan.action(self.model.initial_action)?;
        let target = self.resolve(ctx, event, self.model.initial, &mut cells, &mut plan, tracer)?;
        for state in self.path_to(target, &cells)?.iter() {
            plan.enter(*state)?;
        }

        let (leaf, raised) = self.finish(ctx, event, target, cells, plan, tracer)?;
        tracer.emit(&TraceRecord::SmInit { sm: self.id, state: leaf });
        log::debug!("{}: initial state {}", self.model.name, self.model.name_of(leaf));
        Ok(raised)
    }

    fn try_step<T: Tracer + ?Sized>(
        &mut self,
        ctx: &mut C,
        event: &dyn Event,
        tracer: &T,
    ) -> Result<bool, Outcome> {
        let current = self.state.ok_or(Outcome::UnknownState)?;
        let (source, transition) = self.find_transition(ctx, current, event)?;

        if let Some(guard) = transition.guard {
            if !guard(ctx, event) {
                return Err(Outcome::GuardFalse);
            }
        }

        let target = match transition.target {
            Target::Internal => {
                if let Some(action) = transition.action {
                    action(ctx, event);
                }
                self.info.executed = self.info.executed.wrapping_add(1);
                tracer.emit(&TraceRecord::SmEventProcessed {
                    sm: self.id,
                    signal: event.signal(),
                    state: current,
                });
                return Ok(false);
            }
            Target::State(target) => target,
        };
        tracer.emit(&TraceRecord::SmTransition { sm: self.id, source, target });

        let mut cells = self.cells;
        let mut pending = Plan::new();
        pending.segment()?;
        pending.action(transition.action)?;
        let target = self.resolve(ctx, event, target, &mut cells, &mut pending, tracer)?;

        // The source path follows the hosts of the active configuration; the
        // target path those recorded while resolving.
        let source_path = self.path_to(current, &self.cells)?;
        let target_path = self.path_to(target, &cells)?;
        let common = source_path
            .iter()
            .zip(target_path.iter())
            .take_while(|(s, t)| s == t)
            .count();

        let mut plan = Plan::new();
        for depth in (common..source_path.len()).rev() {
            let state = source_path[depth];
            plan.exit(state)?;
            if depth > 0 {
                self.record_shallow(source_path[depth - 1], state, &mut cells)?;
            }
        }
        plan.append(&pending)?;
        for state in target_path[common..].iter() {
            plan.enter(*state)?;
        }

        let (_, raised) = self.finish(ctx, event, target, cells, plan, tracer)?;
        Ok(raised)
    }

    /// Settle, record deep history, run the plan and commit. Also tells
    /// whether the settled leaf was entered and raises a completion event.
    fn finish<T: Tracer + ?Sized>(
        &mut self,
        ctx: &mut C,
        event: &dyn Event,
        target: StateId,
        mut cells: Cells,
        mut plan: Plan<C>,
        tracer: &T,
    ) -> Result<(StateId, bool), Outcome> {
        let leaf = self.settle(ctx, event, target, &mut cells, &mut plan, tracer)?;
        let entered = plan
            .steps
            .iter()
            .any(|step| matches!(step, Step::Enter(state) if *state == leaf));
        let raised = entered && self.raises_completion(leaf);

        for ancestor in self.path_to(leaf, &cells)?.iter() {
            if let StateKind::Composite { history: Some(history), .. } = &self.node(*ancestor)?.kind {
                if let StateKind::DeepHistory { slot, .. } = &self.node(*history)?.kind {
                    cells.set_history(*slot, leaf)?;
                }
            }
        }

        self.execute(ctx, event, &plan, tracer);
        self.cells = cells;
        self.state = Some(leaf);
        self.info.executed = self.info.executed.wrapping_add(1);

        tracer.emit(&TraceRecord::SmState { sm: self.id, state: leaf });
        tracer.emit(&TraceRecord::SmEventProcessed {
            sm: self.id,
            signal: event.signal(),
            state: leaf,
        });
        Ok((leaf, raised))
    }

    /// Run completion transitions while the last step entered a state that
    /// raises one. A completion nobody takes, or whose guard is false, ends
    /// the chain without undoing what already happened.
    fn complete<T: Tracer + ?Sized>(&mut self, ctx: &mut C, mut raised: bool, tracer: &T) -> Outcome {
        let mut chained = 0;
        while raised {
            if chained == MAX_TR_SEGS {
                self.report(Outcome::TransitionOverflow, Signal::COMPLETION, tracer);
                return Outcome::TransitionOverflow;
            }
            chained += 1;

            match self.try_step(ctx, &COMPLETION_EVENT, tracer) {
                Ok(next) => raised = next,
                Err(Outcome::EventNotFound) => break,
                Err(Outcome::GuardFalse) => {
                    self.report(Outcome::GuardFalse, Signal::COMPLETION, tracer);
                    break;
                }
                Err(outcome) => {
                    self.report(outcome, Signal::COMPLETION, tracer);
                    return outcome;
                }
            }
        }
        Outcome::Processed
    }

    fn raises_completion(&self, state: StateId) -> bool {
        match self.model.node(state).map(|node| &node.kind) {
            Some(StateKind::Final) => true,
            Some(StateKind::Basic { transitions, .. }) => transitions
                .iter()
                .any(|t| t.trigger == Trigger::Signal(Signal::COMPLETION)),
            _ => false,
        }
    }

    /// Closest state, from the current leaf outwards, with an entry for the
    /// event
    fn find_transition(
        &self,
        ctx: &C,
        current: StateId,
        event: &dyn Event,
    ) -> Result<(StateId, &'static Transition<C>), Outcome> {
        let mut cursor = Some(current);
        let mut depth = 0;
        while let Some(state) = cursor {
            depth += 1;
            if depth > MAX_HCAL_DEPTH {
                return Err(Outcome::HierarchyOverflow);
            }
            let (transitions, preprocessor) = self.node(state)?.kind.transitions();
            let signal = preprocessor.map_or(event.signal(), |pre| pre(ctx, event));
            if let Some(transition) = transitions.iter().find(|t| t.trigger.matches(signal)) {
                return Ok((state, transition));
            }
            cursor = self.parent_of(state, &self.cells)?;
        }
        Err(Outcome::EventNotFound)
    }

    /// Follow pseudostates from `target` until a state is reached
    fn resolve<T: Tracer + ?Sized>(
        &self,
        ctx: &C,
        event: &dyn Event,
        mut target: StateId,
        cells: &mut Cells,
        plan: &mut Plan<C>,
        tracer: &T,
    ) -> Result<StateId, Outcome> {
        loop {
            tracer.emit(&TraceRecord::SmTargetState { sm: self.id, target });
            let node = self.node(target)?;
            target = match &node.kind {
                StateKind::Basic { .. }
                | StateKind::Composite { .. }
                | StateKind::Final
                | StateKind::Submachine { .. } => return Ok(target),
                StateKind::Choice { branches } | StateKind::Junction { branches } => {
                    let branch = branches
                        .iter()
                        .find(|b| b.enabled(ctx, event))
                        .ok_or(Outcome::BranchNotFound)?;
                    plan.action(branch.action)?;
                    branch.target
                }
                StateKind::ShallowHistory { slot, default } | StateKind::DeepHistory { slot, default } => {
                    match (cells.history(*slot), default) {
                        (Some(stored), _) => stored,
                        (None, Some(branch)) => {
                            if !branch.enabled(ctx, event) {
                                return Err(Outcome::GuardFalse);
                            }
                            plan.action(branch.action)?;
                            branch.target
                        }
                        (None, None) => node.parent.ok_or(Outcome::UnknownState)?,
                    }
                }
                StateKind::EntryPoint { connection } => {
                    let host = node.parent.ok_or(Outcome::UnknownState)?;
                    let slot = self.reference_slot(host)?;
                    cells.set_host(slot, host)?;
                    plan.action(connection.action)?;
                    connection.target
                }
                StateKind::ExitPoint { index } => {
                    let reference = node.parent.ok_or(Outcome::UnknownState)?;
                    let slot = match &self.node(reference)?.kind {
                        StateKind::SubmachineRef { slot, .. } => *slot,
                        _ => return Err(Outcome::UnknownState),
                    };
                    let host = cells.host(slot).ok_or(Outcome::UnknownState)?;
                    let exits = match &self.node(host)?.kind {
                        StateKind::Submachine { exits, .. } => *exits,
                        _ => return Err(Outcome::UnknownState),
                    };
                    let connection = exits.get(*index as usize).ok_or(Outcome::UnknownState)?;
                    plan.action(connection.action)?;
                    connection.target
                }
                StateKind::SubmachineRef { .. } => return Err(Outcome::UnknownState),
            };
            plan.segment()?;
        }
    }

    /// Descend from a composite or submachine state to a leaf through the
    /// default children
    fn settle<T: Tracer + ?Sized>(
        &self,
        ctx: &C,
        event: &dyn Event,
        mut at: StateId,
        cells: &mut Cells,
        plan: &mut Plan<C>,
        tracer: &T,
    ) -> Result<StateId, Outcome> {
        for _ in 0..MAX_HCAL_DEPTH {
            let (default, initial_action) = match &self.node(at)?.kind {
                StateKind::Composite { default, initial_action, .. } => (*default, *initial_action),
                StateKind::Submachine { reference, .. } => match &self.node(*reference)?.kind {
                    StateKind::SubmachineRef { default, initial_action, slot } => {
                        cells.set_host(*slot, at)?;
                        (*default, *initial_action)
                    }
                    _ => return Err(Outcome::UnknownState),
                },
                _ => return Ok(at),
            };

            plan.action(initial_action)?;
            let next = self.resolve(ctx, event, default, cells, plan, tracer)?;

            let path = self.path_to(next, cells)?;
            let start = path
                .iter()
                .position(|state| *state == at)
                .ok_or(Outcome::UnknownState)?;
            for state in path[start + 1..].iter() {
                plan.enter(*state)?;
            }
            at = next;
        }
        Err(Outcome::HierarchyOverflow)
    }

    fn execute<T: Tracer + ?Sized>(
        &self,
        ctx: &mut C,
        event: &dyn Event,
        plan: &Plan<C>,
        tracer: &T,
    ) {
        for step in plan.steps.iter() {
            match *step {
                Step::Exit(state) => {
                    tracer.emit(&TraceRecord::SmExitState { sm: self.id, state });
                    if let Some(exit) = self.model.node(state).and_then(|node| node.exit) {
                        exit(ctx);
                    }
                }
                Step::Action(action) => action(ctx, event),
                Step::Enter(state) => {
                    tracer.emit(&TraceRecord::SmEnterState { sm: self.id, state });
                    if let Some(entry) = self.model.node(state).and_then(|node| node.entry) {
                        entry(ctx);
                    }
                }
            }
        }
        tracer.emit(&TraceRecord::SmCountEntryExit {
            sm: self.id,
            entered: plan.entered,
            exited: plan.exited,
        });
    }

    /// Remember `child` in the shallow history of `parent`, if it has one
    fn record_shallow(&self, parent: StateId, child: StateId, cells: &mut Cells) -> Result<(), Outcome> {
        if let StateKind::Composite { history: Some(history), .. } = &self.node(parent)?.kind {
            if let StateKind::ShallowHistory { slot, .. } = &self.node(*history)?.kind {
                cells.set_history(*slot, child)?;
            }
        }
        Ok(())
    }

    /// Dynamic parent: children of a submachine reference belong to the
    /// submachine state that currently hosts it
    fn parent_of(&self, state: StateId, cells: &Cells) -> Result<Option<StateId>, Outcome> {
        let Some(parent) = self.node(state)?.parent else {
            return Ok(None);
        };
        match &self.node(parent)?.kind {
            StateKind::SubmachineRef { slot, .. } => {
                cells.host(*slot).map(Some).ok_or(Outcome::UnknownState)
            }
            _ => Ok(Some(parent)),
        }
    }

    /// States from the top of the hierarchy down to `state`
    fn path_to(&self, state: StateId, cells: &Cells) -> Result<Path, Outcome> {
        let mut path = Path::new();
        let mut cursor = Some(state);
        while let Some(s) = cursor {
            path.push(s).map_err(|_| Outcome::HierarchyOverflow)?;
            cursor = self.parent_of(s, cells)?;
        }
        path.reverse();
        Ok(path)
    }

    fn reference_slot(&self, host: StateId) -> Result<u8, Outcome> {
        let reference = match &self.node(host)?.kind {
            StateKind::Submachine { reference, .. } => *reference,
            _ => return Err(Outcome::UnknownState),
        };
        match &self.node(reference)?.kind {
            StateKind::SubmachineRef { slot, .. } => Ok(*slot),
            _ => Err(Outcome::UnknownState),
        }
    }

    #[inline]
    fn node(&self, id: StateId) -> Result<&'static StateNode<C>, Outcome> {
        self.model.node(id).ok_or(Outcome::UnknownState)
    }

    fn report<T: Tracer + ?Sized>(&self, outcome: Outcome, signal: Signal, tracer: &T) {
        let sm = self.id;
        let record = match outcome {
            Outcome::Processed => return,
            Outcome::EventNotFound => TraceRecord::SmEventNotFound { sm, signal },
            Outcome::GuardFalse => TraceRecord::SmGuardFalse { sm, signal },
            Outcome::BranchNotFound => TraceRecord::SmBranchNotFound {
                sm,
                state: self.state.unwrap_or(self.model.initial),
            },
            Outcome::TransitionOverflow => TraceRecord::SmSegmentOverflow { sm },
            Outcome::HierarchyOverflow => TraceRecord::SmHierarchyOverflow { sm },
            Outcome::UnknownState => TraceRecord::SmUnknownState { sm },
        };
        tracer.emit(&record);

        let state = self.state.map_or("-", |s| self.model.name_of(s));
        if outcome.is_error() {
            log::error!("{}: {} on {} in {}", self.model.name, outcome, signal, state);
        } else {
            log::debug!("{}: {} on {} in {}", self.model.name, outcome, signal, state);
        }
    }
}

impl<C> fmt::Debug for Hsm<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hsm")
            .field("model", &self.model.name)
            .field("state", &self.state)
            .field("info", &self.info)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SmInfo {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "SmInfo {{ received: {}, executed: {} }}", self.received, self.executed);
    }
}
