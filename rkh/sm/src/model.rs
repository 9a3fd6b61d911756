//! Static description of a state machine
//!
//! A model is an arena of [`StateNode`]s that reference each other by
//! [`StateId`]. Models are immutable and are usually declared as `static`
//! items with the `const fn` builders below, so several machine instances
//! can share one model.

use core::fmt;

use rkh_core::{Event, Signal, StateId, MAX_HCAL_DEPTH, MAX_HISTORY, MAX_SUBMACHINE};

/// Guard condition evaluated before a transition or branch is taken
pub type Guard<C> = fn(&C, &dyn Event) -> bool;

/// Transition action, composite initial action, connection action
pub type Action<C> = fn(&mut C, &dyn Event);

/// Entry or exit action of a state
pub type StateAction<C> = fn(&mut C);

/// Maps an incoming event to the signal used to search a state's
/// transition table
pub type Preprocessor<C> = fn(&C, &dyn Event) -> Signal;

/// What a transition table entry reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Signal(Signal),
    /// Any signal except the completion pseudo-event
    Any,
}

impl Trigger {
    pub fn matches(self, signal: Signal) -> bool {
        match self {
            Trigger::Signal(s) => s == signal,
            Trigger::Any => signal != Signal::COMPLETION,
        }
    }
}

/// Where a transition goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    State(StateId),
    /// No exit or entry; only the transition action runs
    Internal,
}

/// One entry of a transition table
pub struct Transition<C: 'static> {
    pub trigger: Trigger,
    pub guard: Option<Guard<C>>,
    pub action: Option<Action<C>>,
    pub target: Target,
}

impl<C> Transition<C> {
    /// External or local transition on `signal`
    pub const fn to(signal: Signal, target: StateId) -> Self {
        Self {
            trigger: Trigger::Signal(signal),
            guard: None,
            action: None,
            target: Target::State(target),
        }
    }

    /// Internal transition on `signal`
    pub const fn internal(signal: Signal) -> Self {
        Self {
            trigger: Trigger::Signal(signal),
            guard: None,
            action: None,
            target: Target::Internal,
        }
    }

    /// Transition taken on any signal but the completion event
    pub const fn any(target: Target) -> Self {
        Self {
            trigger: Trigger::Any,
            guard: None,
            action: None,
            target,
        }
    }

    /// Completion transition
    pub const fn completion(target: StateId) -> Self {
        Self::to(Signal::COMPLETION, target)
    }

    pub const fn guard(mut self, guard: Guard<C>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub const fn action(mut self, action: Action<C>) -> Self {
        self.action = Some(action);
        self
    }
}

/// One entry of a choice or junction branch table
///
/// A branch without a guard is the `else` branch.
pub struct Branch<C: 'static> {
    pub guard: Option<Guard<C>>,
    pub action: Option<Action<C>>,
    pub target: StateId,
}

impl<C> Branch<C> {
    pub const fn when(guard: Guard<C>, target: StateId) -> Self {
        Self {
            guard: Some(guard),
            action: None,
            target,
        }
    }

    pub const fn otherwise(target: StateId) -> Self {
        Self {
            guard: None,
            action: None,
            target,
        }
    }

    pub const fn action(mut self, action: Action<C>) -> Self {
        self.action = Some(action);
        self
    }

    pub(crate) fn enabled(&self, ctx: &C, event: &dyn Event) -> bool {
        self.guard.map_or(true, |guard| guard(ctx, event))
    }
}

/// Connection of a submachine entry point, or of a submachine state's exit
pub struct Connection<C: 'static> {
    pub action: Option<Action<C>>,
    pub target: StateId,
}

impl<C> Connection<C> {
    pub const fn to(target: StateId) -> Self {
        Self {
            action: None,
            target,
        }
    }

    pub const fn action(mut self, action: Action<C>) -> Self {
        self.action = Some(action);
        self
    }
}

/// Kind of a node and the data that goes with it
pub enum StateKind<C: 'static> {
    Basic {
        transitions: &'static [Transition<C>],
        preprocessor: Option<Preprocessor<C>>,
    },
    Composite {
        transitions: &'static [Transition<C>],
        default: StateId,
        initial_action: Option<Action<C>>,
        history: Option<StateId>,
        preprocessor: Option<Preprocessor<C>>,
    },
    Final,
    /// State that hosts a reusable submachine
    Submachine {
        transitions: &'static [Transition<C>],
        reference: StateId,
        exits: &'static [Connection<C>],
    },
    /// Container of a reusable submachine's states. Its children resolve
    /// their parent to whichever submachine state currently hosts it.
    SubmachineRef {
        default: StateId,
        initial_action: Option<Action<C>>,
        slot: u8,
    },
    Choice {
        branches: &'static [Branch<C>],
    },
    Junction {
        branches: &'static [Branch<C>],
    },
    ShallowHistory {
        slot: u8,
        default: Option<Branch<C>>,
    },
    DeepHistory {
        slot: u8,
        default: Option<Branch<C>>,
    },
    /// Child of a submachine state
    EntryPoint {
        connection: Connection<C>,
    },
    /// Child of a submachine reference; `index` selects the hosting state's
    /// exit connection
    ExitPoint {
        index: u8,
    },
}

impl<C> StateKind<C> {
    pub const fn name(&self) -> &'static str {
        match self {
            StateKind::Basic { .. } => "basic",
            StateKind::Composite { .. } => "composite",
            StateKind::Final => "final",
            StateKind::Submachine { .. } => "submachine",
            StateKind::SubmachineRef { .. } => "submachine-ref",
            StateKind::Choice { .. } => "choice",
            StateKind::Junction { .. } => "junction",
            StateKind::ShallowHistory { .. } => "shallow-history",
            StateKind::DeepHistory { .. } => "deep-history",
            StateKind::EntryPoint { .. } => "entry-point",
            StateKind::ExitPoint { .. } => "exit-point",
        }
    }

    /// Transition table and preprocessor of a state; empty for pseudostates
    pub fn transitions(&self) -> (&'static [Transition<C>], Option<Preprocessor<C>>) {
        match self {
            StateKind::Basic { transitions, preprocessor } => (*transitions, *preprocessor),
            StateKind::Composite { transitions, preprocessor, .. } => (*transitions, *preprocessor),
            StateKind::Submachine { transitions, .. } => (*transitions, None),
            _ => (&[], None),
        }
    }

    /// Only leaves may be the current state between dispatches
    pub const fn is_leaf(&self) -> bool {
        matches!(self, StateKind::Basic { .. } | StateKind::Final)
    }

    /// States are entered and exited; pseudostates are only passed through
    pub const fn is_state(&self) -> bool {
        matches!(
            self,
            StateKind::Basic { .. }
                | StateKind::Composite { .. }
                | StateKind::Final
                | StateKind::Submachine { .. }
        )
    }
}

/// A state or pseudostate
pub struct StateNode<C: 'static> {
    pub name: &'static str,
    pub kind: StateKind<C>,
    /// `None` for top-level nodes
    pub parent: Option<StateId>,
    pub entry: Option<StateAction<C>>,
    pub exit: Option<StateAction<C>>,
}

impl<C> StateNode<C> {
    const fn with_kind(name: &'static str, kind: StateKind<C>) -> Self {
        Self {
            name,
            kind,
            parent: None,
            entry: None,
            exit: None,
        }
    }

    pub const fn basic(name: &'static str, transitions: &'static [Transition<C>]) -> Self {
        Self::with_kind(name, StateKind::Basic { transitions, preprocessor: None })
    }

    pub const fn composite(
        name: &'static str,
        default: StateId,
        transitions: &'static [Transition<C>],
    ) -> Self {
        Self::with_kind(
            name,
            StateKind::Composite {
                transitions,
                default,
                initial_action: None,
                history: None,
                preprocessor: None,
            },
        )
    }

    pub const fn final_state(name: &'static str) -> Self {
        Self::with_kind(name, StateKind::Final)
    }

    pub const fn submachine(
        name: &'static str,
        reference: StateId,
        transitions: &'static [Transition<C>],
        exits: &'static [Connection<C>],
    ) -> Self {
        Self::with_kind(name, StateKind::Submachine { transitions, reference, exits })
    }

    pub const fn submachine_ref(name: &'static str, default: StateId, slot: u8) -> Self {
        Self::with_kind(
            name,
            StateKind::SubmachineRef { default, initial_action: None, slot },
        )
    }

    pub const fn choice(name: &'static str, branches: &'static [Branch<C>]) -> Self {
        Self::with_kind(name, StateKind::Choice { branches })
    }

    pub const fn junction(name: &'static str, branches: &'static [Branch<C>]) -> Self {
        Self::with_kind(name, StateKind::Junction { branches })
    }

    pub const fn shallow_history(name: &'static str, slot: u8) -> Self {
        Self::with_kind(name, StateKind::ShallowHistory { slot, default: None })
    }

    pub const fn deep_history(name: &'static str, slot: u8) -> Self {
        Self::with_kind(name, StateKind::DeepHistory { slot, default: None })
    }

    pub const fn entry_point(name: &'static str, connection: Connection<C>) -> Self {
        Self::with_kind(name, StateKind::EntryPoint { connection })
    }

    pub const fn exit_point(name: &'static str, index: u8) -> Self {
        Self::with_kind(name, StateKind::ExitPoint { index })
    }

    pub const fn parent(mut self, parent: StateId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub const fn entry(mut self, entry: StateAction<C>) -> Self {
        self.entry = Some(entry);
        self
    }

    pub const fn exit(mut self, exit: StateAction<C>) -> Self {
        self.exit = Some(exit);
        self
    }

    /// Attach a history pseudostate to a composite state
    pub const fn history(self, history: StateId) -> Self {
        let StateNode { name, kind, parent, entry, exit } = self;
        let kind = match kind {
            StateKind::Composite { transitions, default, initial_action, preprocessor, .. } => {
                StateKind::Composite {
                    transitions,
                    default,
                    initial_action,
                    history: Some(history),
                    preprocessor,
                }
            }
            kind => kind,
        };
        StateNode { name, kind, parent, entry, exit }
    }

    /// Initial action of a composite state or submachine reference
    pub const fn initial_action(self, action: Action<C>) -> Self {
        let StateNode { name, kind, parent, entry, exit } = self;
        let kind = match kind {
            StateKind::Composite { transitions, default, history, preprocessor, .. } => {
                StateKind::Composite {
                    transitions,
                    default,
                    initial_action: Some(action),
                    history,
                    preprocessor,
                }
            }
            StateKind::SubmachineRef { default, slot, .. } => {
                StateKind::SubmachineRef { default, initial_action: Some(action), slot }
            }
            kind => kind,
        };
        StateNode { name, kind, parent, entry, exit }
    }

    /// Event preprocessor of a basic or composite state
    pub const fn preprocessor(self, preprocessor: Preprocessor<C>) -> Self {
        let StateNode { name, kind, parent, entry, exit } = self;
        let kind = match kind {
            StateKind::Basic { transitions, .. } => {
                StateKind::Basic { transitions, preprocessor: Some(preprocessor) }
            }
            StateKind::Composite { transitions, default, initial_action, history, .. } => {
                StateKind::Composite {
                    transitions,
                    default,
                    initial_action,
                    history,
                    preprocessor: Some(preprocessor),
                }
            }
            kind => kind,
        };
        StateNode { name, kind, parent, entry, exit }
    }

    /// Default branch of a history pseudostate, taken while it is empty
    pub const fn history_default(self, branch: Branch<C>) -> Self {
        let StateNode { name, kind, parent, entry, exit } = self;
        let kind = match kind {
            StateKind::ShallowHistory { slot, .. } => {
                StateKind::ShallowHistory { slot, default: Some(branch) }
            }
            StateKind::DeepHistory { slot, .. } => {
                StateKind::DeepHistory { slot, default: Some(branch) }
            }
            kind => kind,
        };
        StateNode { name, kind, parent, entry, exit }
    }
}

impl<C> fmt::Debug for StateNode<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("name", &self.name)
            .field("kind", &self.kind.name())
            .field("parent", &self.parent)
            .finish()
    }
}

/// Configuration defect found by [`Model::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelError {
    /// The model has no states
    Empty,
    /// More nodes than a `StateId` can address
    TooLarge,
    /// A node refers to an id outside the arena
    DanglingId { node: StateId },
    /// A node hangs from a node that cannot contain it
    BadParent { node: StateId },
    /// The parent chain of a node loops
    CyclicHierarchy { node: StateId },
    /// The parent chain of a node is longer than `MAX_HCAL_DEPTH`
    TooDeep { node: StateId },
    /// A composite default or submachine default is not its own child
    BadDefault { node: StateId },
    /// A composite names a history node that is not its own history child
    BadHistory { node: StateId },
    /// History or submachine slot out of range, or shared by two nodes
    BadSlot { node: StateId },
    /// A submachine state does not reference a submachine container
    BadReference { node: StateId },
    /// An exit point index has no matching exit connection
    BadExitIndex { node: StateId },
    /// The initial target is a submachine container, an exit point or out of
    /// range
    BadInitial,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Empty => write!(f, "model has no states"),
            ModelError::TooLarge => write!(f, "model has more nodes than state ids"),
            ModelError::DanglingId { node } => write!(f, "{} refers to a missing node", node),
            ModelError::BadParent { node } => write!(f, "{} has an invalid parent", node),
            ModelError::CyclicHierarchy { node } => write!(f, "{} is part of a parent cycle", node),
            ModelError::TooDeep { node } => write!(f, "{} is nested too deep", node),
            ModelError::BadDefault { node } => write!(f, "{} has an invalid default child", node),
            ModelError::BadHistory { node } => write!(f, "{} has an invalid history node", node),
            ModelError::BadSlot { node } => write!(f, "{} uses an invalid slot", node),
            ModelError::BadReference { node } => {
                write!(f, "{} does not reference a submachine", node)
            }
            ModelError::BadExitIndex { node } => write!(f, "{} has no exit connection", node),
            ModelError::BadInitial => write!(f, "invalid initial target"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ModelError {}

#[cfg(feature = "defmt")]
impl defmt::Format for ModelError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ModelError::Empty => defmt::write!(fmt, "Empty"),
            ModelError::TooLarge => defmt::write!(fmt, "TooLarge"),
            ModelError::DanglingId { node } => defmt::write!(fmt, "DanglingId({})", node),
            ModelError::BadParent { node } => defmt::write!(fmt, "BadParent({})", node),
            ModelError::CyclicHierarchy { node } => defmt::write!(fmt, "CyclicHierarchy({})", node),
            ModelError::TooDeep { node } => defmt::write!(fmt, "TooDeep({})", node),
            ModelError::BadDefault { node } => defmt::write!(fmt, "BadDefault({})", node),
            ModelError::BadHistory { node } => defmt::write!(fmt, "BadHistory({})", node),
            ModelError::BadSlot { node } => defmt::write!(fmt, "BadSlot({})", node),
            ModelError::BadReference { node } => defmt::write!(fmt, "BadReference({})", node),
            ModelError::BadExitIndex { node } => defmt::write!(fmt, "BadExitIndex({})", node),
            ModelError::BadInitial => defmt::write!(fmt, "BadInitial"),
        }
    }
}

/// A complete state machine description
pub struct Model<C: 'static> {
    pub name: &'static str,
    pub states: &'static [StateNode<C>],
    pub initial: StateId,
    pub initial_action: Option<Action<C>>,
}

impl<C> Model<C> {
    pub const fn new(name: &'static str, states: &'static [StateNode<C>], initial: StateId) -> Self {
        Self {
            name,
            states,
            initial,
            initial_action: None,
        }
    }

    pub const fn initial_action(mut self, action: Action<C>) -> Self {
        self.initial_action = Some(action);
        self
    }

    /// Look up a node by id
    #[inline]
    pub fn node(&self, id: StateId) -> Option<&'static StateNode<C>> {
        self.states.get(id.index())
    }

    /// Look up a node by name
    pub fn find(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|node| node.name == name)
            .and_then(|index| u16::try_from(index).ok())
            .map(StateId)
    }

    /// Name of a node, `"?"` for unknown ids
    pub fn name_of(&self, id: StateId) -> &'static str {
        self.node(id).map_or("?", |node| node.name)
    }

    /// Check the structural invariants the dispatch engine relies on
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.states.is_empty() {
            return Err(ModelError::Empty);
        }
        if self.states.len() > usize::from(u16::MAX) + 1 {
            return Err(ModelError::TooLarge);
        }

        let mut history_slots = [false; MAX_HISTORY];
        let mut host_slots = [false; MAX_SUBMACHINE];

        for (index, node) in self.states.iter().enumerate() {
            let id = StateId(u16::try_from(index).map_err(|_| ModelError::TooLarge)?);
            self.check_hierarchy(id)?;
            self.check_parent(id, node)?;

            let (transitions, _) = node.kind.transitions();
            for t in transitions {
                if let Target::State(target) = t.target {
                    self.check_id(id, target)?;
                }
            }

            match &node.kind {
                StateKind::Composite { default, history, .. } => {
                    self.check_child(id, *default, ModelError::BadDefault { node: id })?;
                    if let Some(h) = history {
                        self.check_id(id, *h)?;
                        let owned = self.states[h.index()].parent == Some(id);
                        let is_history = matches!(
                            self.states[h.index()].kind,
                            StateKind::ShallowHistory { .. } | StateKind::DeepHistory { .. }
                        );
                        if !owned || !is_history {
                            return Err(ModelError::BadHistory { node: id });
                        }
                    }
                }
                StateKind::Submachine { reference, exits, .. } => {
                    self.check_id(id, *reference)?;
                    if !matches!(self.states[reference.index()].kind, StateKind::SubmachineRef { .. }) {
                        return Err(ModelError::BadReference { node: id });
                    }
                    for exit in exits.iter() {
                        self.check_id(id, exit.target)?;
                    }
                }
                StateKind::SubmachineRef { default, slot, .. } => {
                    self.check_child(id, *default, ModelError::BadDefault { node: id })?;
                    claim_slot(&mut host_slots, *slot, id)?;
                }
                StateKind::Choice { branches } | StateKind::Junction { branches } => {
                    for b in branches.iter() {
                        self.check_id(id, b.target)?;
                    }
                }
                StateKind::ShallowHistory { slot, default }
                | StateKind::DeepHistory { slot, default } => {
                    claim_slot(&mut history_slots, *slot, id)?;
                    if let Some(b) = default {
                        self.check_id(id, b.target)?;
                    }
                }
                StateKind::EntryPoint { connection } => {
                    self.check_id(id, connection.target)?;
                }
                StateKind::ExitPoint { index } => {
                    self.check_exit_index(id, node, *index)?;
                }
                StateKind::Basic { .. } | StateKind::Final => {}
            }
        }

        match self.node(self.initial) {
            Some(node)
                if !matches!(
                    node.kind,
                    StateKind::SubmachineRef { .. }
                        | StateKind::ExitPoint { .. }
                        | StateKind::EntryPoint { .. }
                ) =>
            {
                Ok(())
            }
            _ => Err(ModelError::BadInitial),
        }
    }

    fn check_id(&self, node: StateId, id: StateId) -> Result<(), ModelError> {
        if id.index() < self.states.len() {
            Ok(())
        } else {
            Err(ModelError::DanglingId { node })
        }
    }

    fn check_child(&self, node: StateId, child: StateId, err: ModelError) -> Result<(), ModelError> {
        self.check_id(node, child)?;
        if self.states[child.index()].parent == Some(node) {
            Ok(())
        } else {
            Err(err)
        }
    }

    fn check_hierarchy(&self, id: StateId) -> Result<(), ModelError> {
        let mut depth = 0;
        let mut cursor = self.states[id.index()].parent;
        while let Some(parent) = cursor {
            self.check_id(id, parent)?;
            depth += 1;
            if depth > self.states.len() {
                return Err(ModelError::CyclicHierarchy { node: id });
            }
            cursor = self.states[parent.index()].parent;
        }
        // +1 for the node itself
        if depth + 1 > MAX_HCAL_DEPTH {
            return Err(ModelError::TooDeep { node: id });
        }
        Ok(())
    }

    fn check_parent(&self, id: StateId, node: &StateNode<C>) -> Result<(), ModelError> {
        let Some(parent) = node.parent else {
            return match node.kind {
                StateKind::EntryPoint { .. } | StateKind::ExitPoint { .. } => {
                    Err(ModelError::BadParent { node: id })
                }
                _ => Ok(()),
            };
        };
        let ok = match (&node.kind, &self.states[parent.index()].kind) {
            (StateKind::EntryPoint { .. }, StateKind::Submachine { .. }) => true,
            (StateKind::EntryPoint { .. }, _) => false,
            (StateKind::ExitPoint { .. }, StateKind::SubmachineRef { .. }) => true,
            (StateKind::ExitPoint { .. }, _) => false,
            (_, StateKind::Composite { .. }) | (_, StateKind::SubmachineRef { .. }) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(ModelError::BadParent { node: id })
        }
    }

    fn check_exit_index(&self, id: StateId, node: &StateNode<C>, index: u8) -> Result<(), ModelError> {
        let reference = node.parent.ok_or(ModelError::BadParent { node: id })?;
        let hosts_ok = self.states.iter().all(|host| match &host.kind {
            StateKind::Submachine { reference: r, exits, .. } if *r == reference => {
                (index as usize) < exits.len()
            }
            _ => true,
        });
        if hosts_ok {
            Ok(())
        } else {
            Err(ModelError::BadExitIndex { node: id })
        }
    }
}

fn claim_slot(slots: &mut [bool], slot: u8, node: StateId) -> Result<(), ModelError> {
    match slots.get_mut(slot as usize) {
        Some(taken) if !*taken => {
            *taken = true;
            Ok(())
        }
        _ => Err(ModelError::BadSlot { node }),
    }
}
