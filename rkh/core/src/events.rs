//! Event types and signal definitions for the RKH framework

use core::any::Any;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use critical_section::CriticalSection;

/// Type-safe event signal identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signal(pub u16);

impl Signal {
    /// Creation pseudo-event, dispatched conceptually by the initial transition
    pub const INIT: Signal = Signal(0);
    /// Completion pseudo-event, raised when a final state (or a state with a
    /// completion transition) becomes active
    pub const COMPLETION: Signal = Signal(1);

    /// First user-defined signal
    pub const USER: Signal = Signal(4);

    /// Create a new signal from a raw value
    pub const fn new(signal: u16) -> Self {
        Signal(signal)
    }

    /// Get the raw signal value
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Check if this is a signal reserved by the framework
    pub const fn is_reserved(self) -> bool {
        self.0 < Self::USER.0
    }
}

impl From<u16> for Signal {
    #[inline]
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG({})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Signal {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "SIG({})", self.0);
    }
}

/// Metadata shared by all events.
///
/// `pool == 0` marks a static event, which is never reference counted nor
/// recycled. Dynamic events carry the (1-based) id of the pool their block
/// came from and a reference count that the framework only touches inside a
/// critical section.
#[derive(Debug)]
pub struct EventHeader {
    signal: Signal,
    pool: u8,
    nref: AtomicU8,
}

impl EventHeader {
    /// Header of a static event
    pub const fn new(signal: Signal) -> Self {
        Self {
            signal,
            pool: 0,
            nref: AtomicU8::new(0),
        }
    }

    /// Header of an event allocated from `pool` (must be non-zero)
    pub const fn dynamic(signal: Signal, pool: u8) -> Self {
        Self {
            signal,
            pool,
            nref: AtomicU8::new(0),
        }
    }

    pub const fn signal(&self) -> Signal {
        self.signal
    }

    pub const fn pool(&self) -> u8 {
        self.pool
    }

    pub const fn is_dynamic(&self) -> bool {
        self.pool != 0
    }

    /// Current number of references held by queues
    pub fn nref(&self) -> u8 {
        self.nref.load(Ordering::Relaxed)
    }

    /// Take one more reference. Static events are left untouched.
    pub fn inc_ref(&self, _cs: CriticalSection<'_>) {
        if self.is_dynamic() {
            let n = self.nref.load(Ordering::Relaxed);
            self.nref.store(n.saturating_add(1), Ordering::Relaxed);
        }
    }

    /// Drop one reference and return the remaining count.
    pub fn dec_ref(&self, _cs: CriticalSection<'_>) -> u8 {
        let n = self.nref.load(Ordering::Relaxed).saturating_sub(1);
        self.nref.store(n, Ordering::Relaxed);
        n
    }
}

/// Base trait for all events in the RKH framework
pub trait Event: Any + Sync {
    /// Event header (signal, pool and reference count)
    fn header(&self) -> &EventHeader;

    /// Upcast used by [`downcast_ref`](trait.Event.html#method.downcast_ref)
    fn as_any(&self) -> &dyn Any;

    /// Get the signal identifier for this event
    fn signal(&self) -> Signal {
        self.header().signal()
    }
}

impl dyn Event {
    /// Access the concrete event type, typically to read its payload
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for dyn Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("signal", &self.signal())
            .field("pool", &self.header().pool())
            .field("nref", &self.header().nref())
            .finish()
    }
}

/// Reference to an event as stored in queues
pub type EventRef = &'static dyn Event;

/// Static event that carries no data
#[derive(Debug)]
pub struct StaticEvent {
    header: EventHeader,
}

impl StaticEvent {
    /// Create a new static event
    pub const fn new(signal: Signal) -> Self {
        Self {
            header: EventHeader::new(signal),
        }
    }
}

impl Event for StaticEvent {
    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Macro to define an event type carrying a payload
///
/// The generated struct gets a public `header` field in front of the given
/// fields.
///
/// ```
/// use rkh_core::{define_event, Event, EventHeader, Signal};
///
/// define_event!(pub struct KeyPressed { pub key: u8 });
///
/// let evt = KeyPressed { header: EventHeader::new(Signal::new(10)), key: 3 };
/// assert_eq!(evt.signal(), Signal::new(10));
/// ```
#[macro_export]
macro_rules! define_event {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($fvis:vis $field:ident : $type:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            pub header: $crate::EventHeader,
            $($fvis $field: $type,)*
        }

        impl $crate::Event for $name {
            fn header(&self) -> &$crate::EventHeader {
                &self.header
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }
        }
    };
}
