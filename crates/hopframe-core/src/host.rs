//! Host capability trait.
//!
//! Decouples the protocol engine from the platform. Production hosts wrap a
//! real link layer (UDP broadcast, LoRa, ESP-NOW) and a timer wheel; test
//! hosts use a virtual clock and an in-process bus for deterministic runs.

use hopframe_proto::Ts;

/// A deferred unit of work handed to the host scheduler.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Platform capabilities the engine requires.
///
/// # Contract
///
/// Implementations MUST guarantee:
///
/// - `broadcast` is non-blocking and best-effort; it hands the frame to the
///   link layer and returns. It must NOT synchronously re-enter
///   [`crate::Node::receive`]; loopback delivery, if any, goes through
///   `schedule_after`.
/// - `now_ms` is monotonic-ish within one run. Wall-clock accuracy is not
///   required; wrapping is fine (the engine uses wrapping arithmetic).
/// - `schedule_after` runs the task exactly once on the same logical
///   executor that invokes `receive`. Tasks may schedule further tasks.
pub trait Host: 'static {
    /// Hand a fully framed payload to the link layer.
    fn broadcast(&self, frame: &[u8]);

    /// Current millisecond clock.
    fn now_ms(&self) -> Ts;

    /// Run `task` once after `delay_ms` milliseconds.
    fn schedule_after(&self, delay_ms: u32, task: Task);
}

impl<H: Host> Host for std::rc::Rc<H> {
    fn broadcast(&self, frame: &[u8]) {
        (**self).broadcast(frame);
    }

    fn now_ms(&self) -> Ts {
        (**self).now_ms()
    }

    fn schedule_after(&self, delay_ms: u32, task: Task) {
        (**self).schedule_after(delay_ms, task);
    }
}
