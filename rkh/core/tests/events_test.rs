//! Event tests for rkh-core
//! These tests run on x86 host with std for testing, but verify no_std compatible code

use rkh_core::{define_event, Event, EventHeader, Signal, StaticEvent};

define_event!(
    #[derive(Debug)]
    struct Temperature {
        celsius: i16,
    }
);

static PING: StaticEvent = StaticEvent::new(Signal::new(10));

#[test]
fn test_static_event_signal() {
    assert_eq!(PING.signal(), Signal::new(10));
    assert!(!PING.header().is_dynamic());
}

#[test]
fn test_signal_equality() {
    let sig1 = Signal::new(42);
    let sig2 = Signal::new(42);
    assert_eq!(sig1, sig2);
    assert_ne!(sig1, Signal::new(43));
}

#[test]
fn test_reserved_signals() {
    assert!(Signal::INIT.is_reserved());
    assert!(Signal::COMPLETION.is_reserved());
    assert!(!Signal::USER.is_reserved());
}

#[test]
fn test_downcast_payload() {
    let evt = Temperature {
        header: EventHeader::new(Signal::new(11)),
        celsius: -4,
    };
    let dynamic: &dyn Event = &evt;

    let temp = dynamic.downcast_ref::<Temperature>().unwrap();
    assert_eq!(temp.celsius, -4);
    assert!(dynamic.downcast_ref::<StaticEvent>().is_none());
}

#[test]
fn test_reference_count_only_for_dynamic_events() {
    let evt = Temperature {
        header: EventHeader::dynamic(Signal::new(11), 1),
        celsius: 20,
    };

    critical_section::with(|cs| {
        evt.header().inc_ref(cs);
        evt.header().inc_ref(cs);
    });
    assert_eq!(evt.header().nref(), 2);

    let left = critical_section::with(|cs| evt.header().dec_ref(cs));
    assert_eq!(left, 1);

    critical_section::with(|cs| PING.header().inc_ref(cs));
    assert_eq!(PING.header().nref(), 0);
}
