//! Event reclaim

use rkh_core::{Event, Hooks, TraceRecord};

/// Drop the reference the scheduler held while dispatching `event`.
///
/// Static events are left alone. A dynamic event still referenced
/// elsewhere only loses one reference; the last one hands the event to
/// [`Hooks::on_release`] so its block goes back to its pool.
pub fn reclaim<H: Hooks + ?Sized>(event: &dyn Event, hooks: &H) {
    let header = event.header();
    if !header.is_dynamic() {
        return;
    }

    let released = critical_section::with(|cs| {
        if header.nref() > 1 {
            let nref = header.dec_ref(cs);
            hooks.emit(&TraceRecord::FwkGc {
                signal: header.signal(),
                pool: header.pool(),
                nref,
            });
            false
        } else {
            header.dec_ref(cs);
            hooks.emit(&TraceRecord::FwkGcRelease {
                signal: header.signal(),
                pool: header.pool(),
            });
            true
        }
    });

    if released {
        log::trace!("releasing {} to pool {}", header.signal(), header.pool());
        hooks.on_release(event);
    }
}
