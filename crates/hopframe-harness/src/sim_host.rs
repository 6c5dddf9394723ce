//! [`Host`] implementation backed by the virtual executor and link.

use hopframe_core::{Host, Task};
use hopframe_proto::{Addr, Ts};

use crate::{executor::SimExecutor, link::SimLink};

/// Per-node host: broadcast goes to the shared medium under this node's
/// address, time and scheduling come from the shared executor.
#[derive(Clone)]
pub struct SimHost {
    addr: Addr,
    executor: SimExecutor,
    link: SimLink,
}

impl SimHost {
    /// Host for the node at `addr`.
    pub fn new(addr: Addr, executor: SimExecutor, link: SimLink) -> Self {
        Self { addr, executor, link }
    }
}

impl Host for SimHost {
    fn broadcast(&self, frame: &[u8]) {
        self.link.broadcast_from(self.addr, frame);
    }

    fn now_ms(&self) -> Ts {
        self.executor.now_ms()
    }

    fn schedule_after(&self, delay_ms: u32, task: Task) {
        self.executor.schedule_in(delay_ms, task);
    }
}
