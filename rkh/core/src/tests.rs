use super::*;

#[test]
fn test_error_display() {
    assert_eq!(RkhError::QueueFull.to_string(), "Event queue is full");
    assert_eq!(RkhError::PriorityInUse.to_string(), "Priority already in use");
}

#[test]
fn test_outcome_classification() {
    assert!(!Outcome::Processed.is_error());
    assert!(!Outcome::EventNotFound.is_error());
    assert!(!Outcome::GuardFalse.is_error());
    assert!(Outcome::BranchNotFound.is_error());
    assert!(Outcome::TransitionOverflow.is_error());
    assert!(Outcome::HierarchyOverflow.is_error());
    assert!(Outcome::UnknownState.is_error());
}

#[test]
fn test_trace_record_groups() {
    let sm = TraceRecord::SmInit { sm: 1, state: StateId(0) };
    let ao = TraceRecord::AoRegister { priority: Priority::HIGHEST };
    assert_eq!(sm.group(), TraceGroup::StateMachine);
    assert_eq!(ao.group(), TraceGroup::ActiveObject);
    assert_eq!(TraceRecord::FwkIdle.group(), TraceGroup::Framework);
    assert_ne!(sm.id(), ao.id());
}

#[test]
#[should_panic(expected = "rkh assertion failed")]
fn test_default_assert_hook_panics() {
    NoHooks.on_assert(file!(), line!());
}
